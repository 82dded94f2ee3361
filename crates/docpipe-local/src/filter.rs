//! Heuristics for pages that fetched fine but carry no usable content.

/// Minimum characters of extracted text for a page to count as usable.
/// Applied by the aggregator before the pattern checks below.
pub const MIN_USEFUL_CHARS: usize = 200;

/// Normalized length under which a page starting with "redirecting" is a
/// redirect stub rather than an article that merely uses the word early.
pub const REDIRECT_STUB_MAX_CHARS: usize = 200;

/// Block-wall signatures, matched case-insensitively anywhere in the text.
pub const BLOCKED_PATTERNS: [&str; 4] = [
    "enable javascript and cookies to continue",
    "please enable cookies",
    "checking if the site connection is secure",
    "access denied",
];

/// Detect JS/cookie walls and trivial "Redirecting…" pages.
///
/// Pure predicate over already-extracted, already-truncated text.
pub fn looks_like_bad_page(text: &str) -> bool {
    let lower = text.to_lowercase();
    if BLOCKED_PATTERNS.iter().any(|p| lower.contains(p)) {
        return true;
    }

    let stripped = lower.split_whitespace().collect::<Vec<_>>().join(" ");
    stripped.starts_with("redirecting") && stripped.chars().count() < REDIRECT_STUB_MAX_CHARS
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_each_block_signature_case_insensitively() {
        let filler = "surrounding article text ".repeat(20);
        for pattern in BLOCKED_PATTERNS {
            let mixed = pattern.to_uppercase();
            let text = format!("{filler}{mixed}{filler}");
            assert!(looks_like_bad_page(&text), "pattern not caught: {pattern}");
        }
    }

    #[test]
    fn rejects_short_redirect_stub() {
        assert!(looks_like_bad_page("Redirecting…"));
        assert!(looks_like_bad_page("  Redirecting\n you to the new page "));
    }

    #[test]
    fn accepts_long_text_that_starts_with_redirecting() {
        let text = format!("Redirecting traffic is a core router duty. {}", "w".repeat(250));
        assert!(!looks_like_bad_page(&text));
    }

    #[test]
    fn accepts_ordinary_article_text() {
        let text = "The two major political parties in the United States are the \
                    Democratic Party and the Republican Party.";
        assert!(!looks_like_bad_page(text));
    }

    #[test]
    fn redirect_check_normalizes_whitespace_before_measuring() {
        // Lots of whitespace padding must not push a stub over the threshold.
        let padded = format!("Redirecting{}now", " \n\t".repeat(300));
        assert!(looks_like_bad_page(&padded));
    }

    proptest! {
        #[test]
        fn any_text_containing_a_block_signature_is_rejected(
            prefix in ".{0,200}",
            suffix in ".{0,200}",
            idx in 0usize..BLOCKED_PATTERNS.len(),
        ) {
            let text = format!("{prefix}{}{suffix}", BLOCKED_PATTERNS[idx]);
            prop_assert!(looks_like_bad_page(&text));
        }
    }
}
