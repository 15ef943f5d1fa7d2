//! Plain-text extraction from a post's HTML page.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

/// Content roots, most specific first. `body` is the last resort.
static ROOT_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["article", "main", r#"[role="main"]"#, "body"]
        .into_iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
});

/// Elements whose text never belongs to the post body.
const SKIPPED: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "noscript",
];

/// Extract the readable text of an HTML page with whitespace collapsed.
///
/// Returns an empty string when the page has no visible text.
pub fn extract_text(html: &str) -> String {
    let doc = Html::parse_document(html);

    let Some(root) = ROOT_SELECTORS
        .iter()
        .find_map(|sel| doc.select(sel).next())
    else {
        return String::new();
    };

    collapse_whitespace(&visible_text(root))
}

/// Elements that start a new line of text when rendered.
const BLOCKS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "h1",
    "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section", "table",
    "td", "th", "tr", "ul",
];

/// Text under `root` outside skipped elements, as written in the source.
///
/// Inline markup contributes no whitespace of its own; block elements and
/// `<br>` are separated by a space.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_text(root, &mut out);
    out
}

fn push_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child.value().name();
        if SKIPPED.contains(&name) {
            continue;
        }
        let block = BLOCKS.contains(&name);
        if block {
            out.push(' ');
        }
        push_text(child, out);
        if block {
            out.push(' ');
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
