/// Largest byte index `<= max` that falls on a char boundary of `s`.
pub fn char_boundary_at_or_before(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut idx = max;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Per-section truncation.
///
/// If `content` exceeds `max_chars` bytes, keep the longest prefix that ends
/// on a line break (falling back to a char boundary) and append
/// `\n[TRUNCATED]`.
pub fn truncate_section(content: &str, max_chars: usize) -> (String, bool) {
    if content.len() <= max_chars {
        return (content.to_string(), false);
    }
    let boundary = char_boundary_at_or_before(content, max_chars);
    let head = &content[..boundary];
    let cut = match head.rfind('\n') {
        Some(nl) if nl > 0 => nl,
        _ => boundary,
    };
    let mut result = content[..cut].to_string();
    result.push_str("\n[TRUNCATED]");
    (result, true)
}
