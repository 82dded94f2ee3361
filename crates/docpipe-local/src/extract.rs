use scraper::{ElementRef, Html, Node, Selector};

/// Maximum characters of extracted text per page.
pub const MAX_TEXT_CHARS: usize = 4000;

/// Literal marker appended when output was cut at [`MAX_TEXT_CHARS`].
pub const TRUNCATION_SUFFIX: &str = " …[truncated]";

// Structural noise removed within the selected region (not globally).
const NOISE_TAGS: [&str; 5] = ["script", "style", "nav", "header", "footer"];

/// Reduce raw HTML to normalized, truncated plain text.
///
/// Never fails: malformed input degrades to whatever text can be recovered,
/// including the empty string.
pub fn extract_main_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let region = content_region(&doc);

    let mut fragments: Vec<String> = Vec::new();
    collect_text(*region, &mut fragments);

    // One line per content fragment: trim, drop empties, single newlines.
    let joined = fragments.join("\n");
    let text = joined
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let (mut out, clipped) = truncate_to_chars(&text, MAX_TEXT_CHARS);
    if clipped {
        out.push_str(TRUNCATION_SUFFIX);
    }
    out
}

fn select_first<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(css).ok()?;
    doc.select(&sel).next()
}

// Primary content region: first of main/article/body that exists, in that
// preference order, else the whole document.
fn content_region(doc: &Html) -> ElementRef<'_> {
    select_first(doc, "main")
        .or_else(|| select_first(doc, "article"))
        .or_else(|| select_first(doc, "body"))
        .unwrap_or_else(|| doc.root_element())
}

fn collect_text(node: ego_tree::NodeRef<'_, Node>, out: &mut Vec<String>) {
    for child in node.children() {
        match child.value() {
            Node::Element(el) => {
                if NOISE_TAGS.contains(&el.name()) {
                    continue;
                }
                collect_text(child, out);
            }
            Node::Text(t) => out.push(t.to_string()),
            _ => {}
        }
    }
}

fn truncate_to_chars(s: &str, max_chars: usize) -> (String, bool) {
    let mut out = String::new();
    let mut n = 0usize;
    for ch in s.chars() {
        if n >= max_chars {
            return (out, true);
        }
        out.push(ch);
        n += 1;
    }
    (out, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_main_region_over_article_and_body() {
        let html = r#"
            <html><body>
              <p>outside</p>
              <article><p>article text</p></article>
              <main><p>main text</p></main>
            </body></html>
        "#;
        assert_eq!(extract_main_text(html), "main text");
    }

    #[test]
    fn falls_back_to_article_then_body() {
        let with_article =
            "<html><body><p>outside</p><article><p>article text</p></article></body></html>";
        assert_eq!(extract_main_text(with_article), "article text");

        let body_only = "<html><body><p>body text</p></body></html>";
        assert_eq!(extract_main_text(body_only), "body text");
    }

    #[test]
    fn strips_noise_tags_within_region() {
        let html = r#"
            <html><body>
              <header>site header</header>
              <nav>nav links</nav>
              <script>var x = 1;</script>
              <style>.a { color: red; }</style>
              <p>kept paragraph</p>
              <footer>footer text</footer>
            </body></html>
        "#;
        assert_eq!(extract_main_text(html), "kept paragraph");
    }

    #[test]
    fn inline_fragments_become_separate_lines() {
        let html = "<html><body><p>foo <b>bar</b> baz</p></body></html>";
        assert_eq!(extract_main_text(html), "foo\nbar\nbaz");
    }

    #[test]
    fn collapses_markup_whitespace_into_clean_lines() {
        let html = "<html><body>\n   <p>  first  </p>\n\n  <div>\n\n</div>  <p>second</p>\n</body></html>";
        assert_eq!(extract_main_text(html), "first\nsecond");
    }

    #[test]
    fn truncates_past_limit_and_appends_marker() {
        let long = "x".repeat(MAX_TEXT_CHARS + 500);
        let html = format!("<html><body><main>{long}</main></body></html>");
        let out = extract_main_text(&html);
        assert!(out.ends_with(TRUNCATION_SUFFIX));
        assert_eq!(
            out.chars().count(),
            MAX_TEXT_CHARS + TRUNCATION_SUFFIX.chars().count()
        );
    }

    #[test]
    fn exact_limit_is_not_marked_truncated() {
        let exact = "y".repeat(MAX_TEXT_CHARS);
        let html = format!("<html><body><main>{exact}</main></body></html>");
        let out = extract_main_text(&html);
        assert_eq!(out.chars().count(), MAX_TEXT_CHARS);
        assert!(!out.contains("[truncated]"));
    }

    #[test]
    fn unparsable_input_degrades_instead_of_failing() {
        assert_eq!(extract_main_text(""), "");
        // Tag soup still yields whatever text is recoverable.
        let out = extract_main_text("<<<div <p>fragment</i>>>");
        assert!(out.contains("fragment") || out.is_empty());
    }
}
