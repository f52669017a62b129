//! Visible-text extraction for documentation nodes.
//!
//! Every piece of text the parser keeps goes through [`clean_text`]:
//! non-visible subtrees are skipped, whitespace runs collapse to a single
//! space, and the result is trimmed.

use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

/// Elements whose text content is never rendered.
const HIDDEN_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Elements that visually separate their content from neighbouring text.
const BLOCK_TAGS: [&str; 13] = [
    "p", "div", "li", "tr", "td", "th", "h1", "h2", "h3", "h4", "h5", "h6", "article",
];

/// Zero-width characters that survive HTML parsing but render as nothing.
const INVISIBLE_CHARS: [char; 4] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Visible text of an element, whitespace-collapsed and trimmed.
pub fn clean_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_visible_text(el, &mut raw);
    normalize(&raw)
}

/// Collapse whitespace runs, drop zero-width characters, and trim.
pub fn normalize(raw: &str) -> String {
    let visible: String = raw.chars().filter(|c| !INVISIBLE_CHARS.contains(c)).collect();
    WS_RE.replace_all(&visible, " ").trim().to_string()
}

fn collect_visible_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(&text.text);
            continue;
        }

        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child_el.value().name();

        if HIDDEN_TAGS.contains(&name) {
            continue;
        }
        if name == "br" {
            out.push(' ');
            continue;
        }

        collect_visible_text(child_el, out);

        if BLOCK_TAGS.contains(&name) {
            out.push(' ');
        }
    }
}
