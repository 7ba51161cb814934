use std::collections::BTreeMap;

use tp_domain::conversation::KnowledgeItem;

/// Heading that introduces the knowledge base in every prompt.
pub const KNOWLEDGE_HEADING: &str = "Store Facts:";

/// Render knowledge grouped by category.
///
/// Categories are sorted and items keep their input order inside a
/// category, so the same snippets always render to the same bytes.
pub fn format_knowledge(items: &[KnowledgeItem]) -> String {
    let mut groups: BTreeMap<&str, Vec<&KnowledgeItem>> = BTreeMap::new();
    for item in items {
        groups.entry(item.category.as_str()).or_default().push(item);
    }

    let mut out = String::from(KNOWLEDGE_HEADING);
    for (category, items) in groups {
        out.push_str(&format!("\n[{category}]"));
        for item in items {
            out.push_str(&format!("\n- {}: {}", item.key, item.value));
        }
    }
    out
}

pub fn format_memories(memories: &[String]) -> String {
    let mut out = String::from("You know this about the client:");
    for m in memories {
        out.push_str("\n- ");
        out.push_str(m);
    }
    out
}

pub fn format_hint(hint: &str) -> String {
    format!("PROACTIVE HINT: Based on the conversation, consider suggesting: {hint}")
}

/// The JSON reply contract. Always last in the prompt.
pub fn format_output_contract(language_name: &str) -> String {
    format!(
        "\
CRITICAL: You MUST answer with ONLY a JSON object. No markdown, no extra text. Language for 'response': {language_name}
JSON Fields Explanation:
- \"response\": Your direct chat message to the user.
- \"needs_escalation\": MUST be true if the user asks for a human, manager, refund, or if it's a partnership/collab request.
- \"escalation_reason\": Brief English reason if needs_escalation is true (e.g. \"Partnership request\", \"Requested human\").
- \"is_resolved\": True ONLY if the issue is 100% fixed and the ticket can be closed now.
Output Format: {{\"classification\":\"service_inquiry|bug_report|role_request|partnership|general_support\",\"sentiment\":\"positive|neutral|negative|frustrated\",\"priority\":1-10,\"response\":\"<msg>\",\"needs_escalation\":false,\"escalation_reason\":null,\"rename_to\":null,\"is_resolved\":false,\"todos\":[]}}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(category: &str, key: &str, value: &str) -> KnowledgeItem {
        KnowledgeItem {
            category: category.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    #[test]
    fn knowledge_is_grouped_and_sorted_by_category() {
        let out = format_knowledge(&[
            item("shipping", "eu", "3-5 days"),
            item("billing", "refunds", "within 14 days"),
            item("shipping", "us", "5-7 days"),
        ]);
        let billing = out.find("[billing]").unwrap();
        let shipping = out.find("[shipping]").unwrap();
        assert!(billing < shipping);
        assert!(out.find("- eu:").unwrap() < out.find("- us:").unwrap());
    }

    #[test]
    fn output_contract_names_the_language_and_the_fields() {
        let contract = format_output_contract("French");
        assert!(contract.contains("Language for 'response': French"));
        assert!(contract.contains("\"needs_escalation\":false"));
        assert!(contract.ends_with("\"todos\":[]}"));
    }
}
