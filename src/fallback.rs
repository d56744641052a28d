//! Pattern-based repairs for the title and location fields when the model
//! could not find them. Plain heuristics over page text; the check order is
//! fixed and callers rely on it.

use regex::Regex;
use std::sync::LazyLock;

use crate::text::truncate_with_marker;

const MAX_TITLE_LEN: usize = 150;
const MAX_LOCATION_LEN: usize = 100;

static H1_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<h1[^>]*>(.*?)</h1>").unwrap());
static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<title[^>]*>(.*?)</title>").unwrap());
static TITLE_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" at | \| | - ").unwrap());
static TITLE_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i) at .*| \| .*| - .*").unwrap());

// Substring checks: "remotely" and "hybrid-friendly" count.
static REMOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)remote").unwrap());
static HYBRID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)hybrid").unwrap());
// "New York, NY", "London, UK", "Austin, TX 78701"
static CITY_STATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z]+(?: [A-Z][a-z]+)*, (?:[A-Z]{2}|\w+)(?: \d{5})?\b").unwrap()
});
static COUNTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:United States|United Kingdom|India|Canada|Germany|France|Singapore|Australia|Ireland)\b",
    )
    .unwrap()
});
static LOCATION_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:remote|hybrid|on-site|onsite|london|new york|nyc|san francisco|sf|california|ca|texas|tx|singapore|dublin|sydney|bangalore|tokyo|berlin|paris|amsterdam|usa|uk|india|canada|germany|france)\b",
    )
    .unwrap()
});

const COMPANY_OR_REMOTE_WORDS: &[&str] = &["inc", "llc", "corp", "remote"];

/// Whether a model-provided value should go through a fallback pass.
pub fn needs_repair(value: &str) -> bool {
    value.trim().is_empty() || value.contains("N/A")
}

/// Tries the first `<h1>`, then the `<title>` tag, keeping `current` when neither helps.
pub fn infer_title(content: &str, current: &str) -> String {
    let mut title = current.to_string();

    if let Some(h1) = first_capture(&H1_TAG, content).filter(|t| t.trim().chars().count() > 5) {
        title = h1.trim().to_string();
    } else if let Some(page_title) =
        first_capture(&TITLE_TAG, content).filter(|t| t.trim().chars().count() > 5)
    {
        // "Job Title at Company | Board"
        if let Some(first) = TITLE_SEPARATORS.split(page_title).map(str::trim).next() {
            title = first.to_string();
        }
    }

    let lower = title.to_lowercase();
    if !title.is_empty() && COMPANY_OR_REMOTE_WORDS.iter().any(|w| lower.contains(w)) {
        let clean = TITLE_TAIL.replace(&title, "").trim().to_string();
        if !clean.is_empty() && clean != title {
            title = clean;
        }
    }

    truncate_with_marker(&title, MAX_TITLE_LEN, "...")
}

/// Collects every location hint in `content`, keeping `current` when there are none.
pub fn infer_location(content: &str, current: &str) -> String {
    let mut found: Vec<String> = Vec::new();

    if REMOTE.is_match(content) {
        add_unique(&mut found, "Remote");
    }
    if HYBRID.is_match(content) {
        add_unique(&mut found, "Hybrid");
    }
    for pattern in [&*CITY_STATE, &*COUNTRY, &*LOCATION_KEYWORDS] {
        for m in pattern.find_iter(content) {
            add_unique(&mut found, m.as_str());
        }
    }

    let location = if found.is_empty() {
        current.to_string()
    } else {
        found.join(", ")
    };
    truncate_with_marker(&location, MAX_LOCATION_LEN, "...")
}

fn first_capture<'a>(pattern: &Regex, content: &'a str) -> Option<&'a str> {
    pattern
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

// First spelling wins; "remote" and "Remote" are the same place.
fn add_unique(found: &mut Vec<String>, candidate: &str) {
    let candidate = candidate.trim();
    if candidate.is_empty() || found.iter().any(|f| f.eq_ignore_ascii_case(candidate)) {
        return;
    }
    found.push(candidate.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_repair() {
        assert!(needs_repair(""));
        assert!(needs_repair("   "));
        assert!(needs_repair("N/A"));
        assert!(needs_repair("N/A (AI Empty)"));
        assert!(!needs_repair("Berlin"));
    }

    #[test]
    fn test_title_from_h1() {
        let content = "<html><h1>Senior Engineer</h1><title>Other | Board</title></html>";
        assert_eq!(infer_title(content, "N/A"), "Senior Engineer");
    }

    #[test]
    fn test_title_h1_too_short_uses_title_tag() {
        let content = "<h1>Jobs</h1><title>Backend Developer at Globex | Careers</title>";
        assert_eq!(infer_title(content, "N/A"), "Backend Developer");
    }

    #[test]
    fn test_title_unchanged_when_nothing_found() {
        assert_eq!(infer_title("plain text only", "N/A (AI Empty)"), "N/A (AI Empty)");
    }

    #[test]
    fn test_title_strips_tail_when_company_word_present() {
        let content = "<h1 class=\"x\">Remote Data Engineer - Initech</h1>";
        assert_eq!(infer_title(content, ""), "Remote Data Engineer");
    }

    #[test]
    fn test_title_keeps_tail_without_company_word() {
        let content = "<h1>Data Engineer - Platform</h1>";
        assert_eq!(infer_title(content, ""), "Data Engineer - Platform");
    }

    #[test]
    fn test_title_truncated() {
        let long = "Engineer ".repeat(30);
        let content = format!("<h1>{long}</h1>");
        let title = infer_title(&content, "N/A");
        assert!(title.ends_with("..."));
        assert_eq!(title.chars().count(), 153);
    }

    #[test]
    fn test_location_remote_before_hybrid() {
        let content = "This role is Remote or Hybrid depending on team.";
        assert_eq!(infer_location(content, ""), "Remote, Hybrid");
    }

    #[test]
    fn test_location_remote_and_hybrid_match_inside_words() {
        let content = "You will work remotely with a distributed team.";
        assert_eq!(infer_location(content, "N/A (AI Empty)"), "Remote");
        assert_eq!(infer_location("A hybrid-friendly office", ""), "Hybrid");
    }

    #[test]
    fn test_location_city_state_and_country() {
        let content = "Office located in Austin, TX 78701 within the United States";
        assert_eq!(infer_location(content, "N/A"), "Austin, TX 78701, United States, TX");
    }

    #[test]
    fn test_location_keywords_need_word_boundaries() {
        // "ca" inside "care" and "uk" inside "ukulele" are not locations
        let content = "We care about ukulele players";
        assert_eq!(infer_location(content, "N/A (AI Empty)"), "N/A (AI Empty)");
    }

    #[test]
    fn test_location_dedupes_case_insensitively() {
        let content = "remote first, fully REMOTE, offices in berlin and Berlin";
        assert_eq!(infer_location(content, ""), "Remote, berlin");
    }

    #[test]
    fn test_location_truncated() {
        let content = "London Paris Berlin Tokyo Sydney Dublin Amsterdam Singapore Bangalore \
            California Texas Canada Germany France India usa nyc sf";
        let location = infer_location(content, "");
        assert!(location.ends_with("..."));
        assert_eq!(location.chars().count(), 103);
    }
}
