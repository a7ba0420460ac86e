//! String helpers for logging player input and key material safely

/// Truncate a string to at most `max_chars` characters on a char boundary
///
/// # Example
/// ```
/// use questgpt_server::utils::truncate_str;
///
/// assert_eq!(truncate_str("Hello, 世界!", 8), "Hello, 世");
/// assert_eq!(truncate_str("Hi", 10), "Hi");
/// ```
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Short single-line preview of free text for log fields
///
/// Newlines are flattened and an ellipsis marks truncation.
pub fn preview(s: &str, max_chars: usize) -> String {
    let flat: String = s
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max_chars {
        flat
    } else {
        format!("{}...", truncate_str(&flat, max_chars))
    }
}
