//! Helpers for turning parsed HTML into the text a reader would see.

use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

const INVISIBLE: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "head", "iframe", "canvas",
];

const BLOCK: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tr", "td", "th", "ul",
];

/// Visible text of an element, one block-level element per line.
///
/// Script-like elements and anything marked `hidden` are skipped. Runs of
/// whitespace inside a line collapse to one space and blank lines are
/// dropped.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    raw.lines()
        .map(|line| line.split_whitespace().join(" "))
        .filter(|line| !line.is_empty())
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let value = element.value();
    let name = value.name();
    if INVISIBLE.contains(&name) || value.attr("hidden").is_some() {
        return;
    }
    if name == "br" {
        out.push('\n');
        return;
    }

    let block = BLOCK.contains(&name);
    if block {
        out.push('\n');
    }
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            collect_text(child_element, out);
        } else if let Node::Text(text) = child.value() {
            out.push_str(text);
        }
    }
    if block {
        out.push('\n');
    }
}

/// The `<title>` text, trimmed; empty when the page has none.
pub fn title(document: &Html) -> String {
    document
        .select(&TITLE)
        .next()
        .map(|el| el.text().collect::<String>().split_whitespace().join(" "))
        .unwrap_or_default()
}

/// Visible text of `<body>`, or of the whole document when there is no body.
pub fn body_text(document: &Html) -> String {
    match document.select(&BODY).next() {
        Some(body) => visible_text(body),
        None => visible_text(document.root_element()),
    }
}

/// Every non-empty anchor `href`, in document order.
pub fn anchor_hrefs(document: &Html) -> Vec<String> {
    document
        .select(&ANCHOR)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
        .collect()
}
