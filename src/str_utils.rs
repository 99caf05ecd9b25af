use std::borrow::Cow;

/// Safely returns a prefix of the string with at most `max_chars` characters.
/// This respects UTF-8 character boundaries.
pub fn prefix_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Log-friendly preview of an upstream body: the first `n` characters, with an
/// ellipsis marker when something was cut.
pub fn preview(s: &str, n: usize) -> Cow<'_, str> {
    let head = prefix_chars(s, n);
    if head.len() == s.len() {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(format!("{}...", head))
    }
}
