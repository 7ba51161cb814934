use tp_domain::conversation::KnowledgeItem;

use crate::injection;
use crate::report::{PromptReport, SectionKind, SectionReport};
use crate::truncation;

/// Inputs for one system prompt. Everything is already localized.
#[derive(Debug, Clone, Default)]
pub struct PromptInputs<'a> {
    /// Persona and behavioural rules, placeholders already substituted.
    pub persona: &'a str,
    pub guidance: &'a str,
    pub knowledge: &'a [KnowledgeItem],
    pub memories: &'a [String],
    pub hints: &'a [String],
    /// English name of the reply language ("French").
    pub language_name: &'a str,
}

/// Deterministic system prompt builder.
///
/// Sections are always emitted in the same order: persona, category
/// guidance, knowledge, dynamic context, output contract. Static content
/// comes first so provider-side prefix caching survives turn to turn.
pub struct PromptPackBuilder {
    pub max_knowledge_chars: usize,
    pub max_dynamic_chars: usize,
}

struct Section {
    kind: SectionKind,
    content: String,
    raw_chars: usize,
    truncated: bool,
}

impl Section {
    fn whole(kind: SectionKind, content: String) -> Self {
        Self {
            kind,
            raw_chars: content.len(),
            content,
            truncated: false,
        }
    }

    fn capped(kind: SectionKind, raw: String, max: usize) -> Self {
        let raw_chars = raw.len();
        let (content, truncated) = truncation::truncate_section(&raw, max);
        Self {
            kind,
            content,
            raw_chars,
            truncated,
        }
    }
}

impl PromptPackBuilder {
    pub fn new(max_knowledge_chars: usize, max_dynamic_chars: usize) -> Self {
        Self {
            max_knowledge_chars,
            max_dynamic_chars,
        }
    }

    pub fn build(&self, inputs: &PromptInputs<'_>) -> (String, PromptReport) {
        let mut sections = vec![
            Section::whole(SectionKind::Persona, inputs.persona.trim().to_string()),
            Section::whole(SectionKind::Guidance, inputs.guidance.trim().to_string()),
        ];

        if !inputs.knowledge.is_empty() {
            sections.push(Section::capped(
                SectionKind::Knowledge,
                injection::format_knowledge(inputs.knowledge),
                self.max_knowledge_chars,
            ));
        }

        let mut dynamic: Vec<String> = Vec::new();
        if !inputs.memories.is_empty() {
            dynamic.push(injection::format_memories(inputs.memories));
        }
        for hint in inputs.hints {
            dynamic.push(injection::format_hint(hint));
        }
        if !dynamic.is_empty() {
            sections.push(Section::capped(
                SectionKind::DynamicContext,
                dynamic.join("\n\n"),
                self.max_dynamic_chars,
            ));
        }

        sections.push(Section::whole(
            SectionKind::OutputContract,
            injection::format_output_contract(inputs.language_name),
        ));

        let mut assembled = String::new();
        let mut reports = Vec::with_capacity(sections.len());
        for section in &sections {
            if section.content.is_empty() {
                continue;
            }
            if !assembled.is_empty() {
                assembled.push_str("\n\n");
            }
            assembled.push_str(&section.content);
            reports.push(SectionReport {
                kind: section.kind,
                raw_chars: section.raw_chars,
                injected_chars: section.content.len(),
                truncated: section.truncated,
            });
        }

        let report = PromptReport {
            sections: reports,
            knowledge_items: inputs.knowledge.len(),
            memories: inputs.memories.len(),
            hints: inputs.hints.len(),
            total_chars: assembled.len(),
        };
        (assembled, report)
    }
}
