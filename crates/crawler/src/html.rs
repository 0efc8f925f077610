//! The DOM-like collaborator the engine needs: visible text (with
//! `<script>`/`<style>`/`<noscript>` stripped) and outgoing `<a href>`
//! links. HTML parsing itself is treated as a solved problem -- we lean on
//! `scraper`'s html5ever-backed tree rather than reimplementing a parser.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

const SKIPPED_TAGS: [&str; 3] = ["script", "style", "noscript"];

static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

pub struct ParsedPage {
    pub title: String,
    pub text: String,
    pub links: Vec<String>,
}

fn is_skipped(element: &ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| SKIPPED_TAGS.contains(&ancestor.value().name()))
}

/// Extracts title, visible body text, and raw (unresolved) `href` values.
/// Returns `None` if the body fails to parse as HTML at all.
pub fn parse(body: &str) -> Option<ParsedPage> {
    let document = Html::parse_document(body);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default();

    let text = document
        .root_element()
        .descendants()
        .filter_map(|node| node.value().as_text().map(|t| (node, t)))
        .filter(|(node, _)| {
            ElementRef::wrap(node.parent().unwrap_or(*node))
                .map(|parent| !is_skipped(&parent))
                .unwrap_or(true)
        })
        .map(|(_, text)| text.to_string())
        .collect::<Vec<_>>()
        .join(" ");

    let links = document
        .select(&LINK_SELECTOR)
        .filter(|el| !is_skipped(el))
        .filter_map(|el| el.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect();

    Some(ParsedPage { title, text, links })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_text_and_links() {
        let html = r#"
            <html>
              <head><title>Hello</title></head>
              <body>
                <p>Visible text</p>
                <script>var x = "hidden";</script>
                <style>.a { color: red; }</style>
                <a href="http://example.com/a">a</a>
                <a href="/relative">rel</a>
              </body>
            </html>
        "#;

        let parsed = parse(html).unwrap();
        assert_eq!(parsed.title, "Hello");
        assert!(parsed.text.contains("Visible text"));
        assert!(!parsed.text.contains("hidden"));
        assert!(!parsed.text.contains("color"));
        assert_eq!(
            parsed.links,
            vec!["http://example.com/a".to_string(), "/relative".to_string()]
        );
    }

    #[test]
    fn strips_noscript() {
        let html = "<html><body><noscript>no js</noscript><p>real</p></body></html>";
        let parsed = parse(html).unwrap();
        assert!(!parsed.text.contains("no js"));
        assert!(parsed.text.contains("real"));
    }
}
