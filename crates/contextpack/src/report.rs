use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Persona,
    Guidance,
    Knowledge,
    DynamicContext,
    OutputContract,
}

/// Per-section report within a prompt build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionReport {
    pub kind: SectionKind,
    pub raw_chars: usize,
    pub injected_chars: usize,
    pub truncated: bool,
}

/// Full report of a system prompt build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptReport {
    pub sections: Vec<SectionReport>,
    pub knowledge_items: usize,
    pub memories: usize,
    pub hints: usize,
    pub total_chars: usize,
}
