use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Collapses whitespace runs to one space and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Cuts `text` to `max` characters and appends `marker` when anything was cut.
pub fn truncate_with_marker(text: &str, max: usize, marker: &str) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], marker),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  Senior\n\n  Engineer\t(Rust) "), "Senior Engineer (Rust)");
        assert_eq!(normalize_whitespace("\n \t"), "");
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_with_marker("Berlin", 100, "..."), "Berlin");
        assert_eq!(truncate_with_marker("exact", 5, "..."), "exact");
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let text = "é".repeat(10);
        let cut = truncate_with_marker(&text, 4, "...");
        assert_eq!(cut, "éééé...");
    }
}
