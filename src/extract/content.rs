//! Article body extraction.
//!
//! Pages differ wildly in structure, so the body is found by an ordered
//! cascade of strategies. Every strategy returns text or nothing; the first
//! one whose text clears its threshold wins. If none does, the raw body text
//! is used verbatim.
//!
//! | Step | Strategy | Accepted when |
//! |------|----------|---------------|
//! | 1 | [`Strategy::SelectorCascade`] | > 100 chars |
//! | 2 | [`Strategy::ContainerScan`] | > 100 chars |
//! | 3 | [`Strategy::LineFilter`] | ≥ 50 chars |
//! | 4 | [`Strategy::Fallback`] | always |

use crate::dom;
use crate::models::RenderedPage;
use crate::utils::truncate_chars;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::debug;

/// Body text must be longer than this for the selector strategies.
pub const CONTENT_THRESHOLD: usize = 100;
/// Below this many characters the hard fallback takes over.
pub const FALLBACK_THRESHOLD: usize = 50;
/// How much raw body text the hard fallback keeps.
pub const FALLBACK_CHARS: usize = 1000;
/// Body returned when a page has no text at all.
pub const UNABLE_TO_EXTRACT: &str = "Unable to extract content";

const CONTENT_SELECTORS: &[&str] = &[
    "article",
    ".content",
    ".post-content",
    ".entry-content",
    ".main-content",
    "main",
    ".article-body",
    ".post",
    ".single-content",
    ".the-content",
    ".entry",
    r#"[class*="content"]"#,
    r#"[id*="content"]"#,
];

const CONTAINER_SELECTOR: &str = r#"div[class*="content"], div[id*="content"], div[class*="post"], div[id*="post"], div[class*="article"], div[id*="article"]"#;

/// Lines containing any of these are navigation or boilerplate.
const BOILERPLATE: &[&str] = &[
    "menu",
    "navigation",
    "footer",
    "copyright",
    "©",
    "home",
    "about",
    "contact",
    "privacy",
    "terms",
    "login",
    "register",
    "search",
    "skip to",
];

/// Lines this short or shorter are dropped by the line filter.
const MIN_LINE_CHARS: usize = 20;

// Selectors that fail to parse are skipped rather than aborting the page.
static CONTENT: Lazy<Vec<Selector>> = Lazy::new(|| {
    CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});
static CONTAINERS: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse(CONTAINER_SELECTOR).ok());

/// Which step of the cascade produced the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    SelectorCascade,
    ContainerScan,
    LineFilter,
    Fallback,
}

/// Title and body of a page.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub title: String,
    pub body: String,
    pub strategy: Strategy,
}

struct Step {
    strategy: Strategy,
    run: fn(&Html) -> Option<String>,
    /// Accepted when the text is longer than this many characters.
    accept_over: usize,
}

const CASCADE: &[Step] = &[
    Step {
        strategy: Strategy::SelectorCascade,
        run: selector_cascade,
        accept_over: CONTENT_THRESHOLD,
    },
    Step {
        strategy: Strategy::ContainerScan,
        run: container_scan,
        accept_over: CONTENT_THRESHOLD,
    },
    Step {
        strategy: Strategy::LineFilter,
        run: line_filter,
        accept_over: FALLBACK_THRESHOLD - 1,
    },
];

/// Extract the title and best-guess article body of `page`.
///
/// Never fails: when every heuristic comes up short the first
/// [`FALLBACK_CHARS`] characters of the raw body text are returned, or
/// [`UNABLE_TO_EXTRACT`] when there is no text at all.
pub fn extract(page: &RenderedPage) -> Extracted {
    let document = Html::parse_document(&page.html);

    for step in CASCADE {
        if let Some(body) = (step.run)(&document) {
            let chars = body.chars().count();
            if chars > step.accept_over {
                debug!(url = %page.url, strategy = ?step.strategy, chars, "Extracted content");
                return Extracted {
                    title: page.title.clone(),
                    body,
                    strategy: step.strategy,
                };
            }
        }
    }

    let raw = page.raw_text.trim();
    let body = if raw.is_empty() {
        UNABLE_TO_EXTRACT.to_string()
    } else {
        truncate_chars(raw, FALLBACK_CHARS).to_string()
    };
    debug!(url = %page.url, chars = body.chars().count(), "Fell back to raw body text");
    Extracted {
        title: page.title.clone(),
        body,
        strategy: Strategy::Fallback,
    }
}

/// First element of each selector in turn; the first text over the threshold.
fn selector_cascade(document: &Html) -> Option<String> {
    CONTENT
        .iter()
        .filter_map(|selector| document.select(selector).next())
        .map(dom::visible_text)
        .find(|text| text.chars().count() > CONTENT_THRESHOLD)
}

/// The longest qualifying text among generic content containers.
fn container_scan(document: &Html) -> Option<String> {
    let selector = CONTAINERS.as_ref()?;
    document
        .select(selector)
        .map(dom::visible_text)
        .map(|text| (text.chars().count(), text))
        .filter(|(chars, _)| *chars > CONTENT_THRESHOLD)
        .max_by_key(|(chars, _)| *chars)
        .map(|(_, text)| text)
}

/// Body text minus boilerplate and short lines.
fn line_filter(document: &Html) -> Option<String> {
    let text = dom::body_text(document);
    let kept: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > MIN_LINE_CHARS)
        .filter(|line| !is_boilerplate(line))
        .collect();
    Some(kept.join("\n"))
}

fn is_boilerplate(line: &str) -> bool {
    let lower = line.to_lowercase();
    BOILERPLATE.iter().any(|term| lower.contains(term))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::render_html;

    fn page(html: &str) -> RenderedPage {
        render_html("https://example.com/news/story", html)
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_article_element_wins() {
        let body = words(40);
        let html = format!(
            "<html><head><title>Story</title></head><body><nav>Home About</nav><article><p>{body}</p></article></body></html>"
        );
        let extracted = extract(&page(&html));
        assert_eq!(extracted.strategy, Strategy::SelectorCascade);
        assert_eq!(extracted.body, body);
        assert_eq!(extracted.title, "Story");
    }

    #[test]
    fn test_short_match_falls_through_to_next_selector() {
        let long = words(40);
        let html = format!(
            "<body><article>tiny</article><main><p>{long}</p></main></body>"
        );
        let extracted = extract(&page(&html));
        assert_eq!(extracted.strategy, Strategy::SelectorCascade);
        assert_eq!(extracted.body, long);
    }

    #[test]
    fn test_container_scan_keeps_longest() {
        let short = words(25);
        let long = words(60);
        // `div[class*="post"]` is not in the selector cascade, so step 1 misses.
        let html = format!(
            r#"<body><div class="postbox">{short}</div><div class="postbox">{long}</div></body>"#
        );
        let extracted = extract(&page(&html));
        assert_eq!(extracted.strategy, Strategy::ContainerScan);
        assert_eq!(extracted.body, long);
    }

    #[test]
    fn test_line_filter_drops_boilerplate_and_short_lines() {
        let html = r#"<body>
            <p>Skip to main content of this site</p>
            <p>Lumbar fusion volumes rose sharply this quarter</p>
            <p>Short line</p>
            <p>Copyright 2025 Example Media Group LLC</p>
            <p>Surgeons adopted robotic guidance at scale</p>
        </body>"#;
        let extracted = extract(&page(html));
        assert_eq!(extracted.strategy, Strategy::LineFilter);
        assert_eq!(
            extracted.body,
            "Lumbar fusion volumes rose sharply this quarter\nSurgeons adopted robotic guidance at scale"
        );
    }

    #[test]
    fn test_fallback_uses_raw_body_text() {
        let html = "<body><p>Home</p><p>Contact us</p></body>";
        let extracted = extract(&page(html));
        assert_eq!(extracted.strategy, Strategy::Fallback);
        assert_eq!(extracted.body, "Home\nContact us");
    }

    #[test]
    fn test_fallback_truncates_to_limit() {
        // One giant line of boilerplate: nothing survives the line filter.
        let html = format!("<body>menu {}</body>", "x".repeat(3000));
        let extracted = extract(&page(&html));
        assert_eq!(extracted.strategy, Strategy::Fallback);
        assert_eq!(extracted.body.chars().count(), FALLBACK_CHARS);
    }

    #[test]
    fn test_empty_page_never_fails() {
        let extracted = extract(&RenderedPage::default());
        assert_eq!(extracted.strategy, Strategy::Fallback);
        assert_eq!(extracted.body, UNABLE_TO_EXTRACT);
        assert_eq!(extracted.title, "");
    }

    #[test]
    fn test_garbage_markup_never_fails() {
        for html in ["<<<>>>", "<div class=", "\u{0}\u{1}", "<article></article>"] {
            let extracted = extract(&page(html));
            assert!(!extracted.body.is_empty());
        }
    }
}
