//! RSS and Atom item extraction.
//!
//! Only the title and link of each item are needed, so feeds are scanned with
//! a handful of regexes rather than a full XML parser. RSS `<item>` and Atom
//! `<entry>` elements are both recognized; the results keep document order.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use postfeed_shared::FeedItem;

static ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(item|entry)\b[^>]*>(.*?)</(?:item|entry)>").expect("valid regex")
});

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<title\b[^>]*>(.*?)</title>").expect("valid regex")
});

/// RSS: `<link>https://...</link>`.
static RSS_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<link\b[^>]*>(.*?)</link>").expect("valid regex")
});

/// Atom: `<link rel="alternate" href="https://..."/>`.
static ATOM_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<link\b([^>]*?)/?>").expect("valid regex"));

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});

static REL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\brel\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});

static CDATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("valid regex"));

static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("valid regex"));

/// Extract every item with a link from an RSS or Atom document.
///
/// Items without a usable link are logged and skipped. A document with no
/// items yields an empty list.
pub fn parse_feed(xml: &str) -> Vec<FeedItem> {
    let mut items = Vec::new();

    for (position, caps) in ITEM_RE.captures_iter(xml).enumerate() {
        let is_atom = &caps[1] == "entry";
        let body = &caps[2];

        let title = TITLE_RE
            .captures(body)
            .map(|c| text_content(&c[1]))
            .unwrap_or_default();

        let link = if is_atom {
            atom_link(body)
        } else {
            RSS_LINK_RE.captures(body).map(|c| text_content(&c[1]))
        };

        match link {
            Some(link) if !link.is_empty() => items.push(FeedItem { link, title }),
            _ => warn!(position, %title, "feed item has no link, skipping"),
        }
    }

    items
}

/// The `href` of the first Atom link that is the entry's alternate page.
fn atom_link(body: &str) -> Option<String> {
    ATOM_LINK_RE.captures_iter(body).find_map(|caps| {
        let attrs = &caps[1];
        let rel = REL_RE
            .captures(attrs)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str());
        if !matches!(rel, None | Some("alternate")) {
            return None;
        }
        HREF_RE
            .captures(attrs)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| decode_entities(m.as_str()).trim().to_string())
    })
}

/// Element text with CDATA unwrapped and entities decoded.
fn text_content(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last = 0;
    for caps in CDATA_RE.captures_iter(raw) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&decode_entities(&raw[last..whole.start()]));
        out.push_str(&caps[1]);
        last = whole.end();
    }
    out.push_str(&decode_entities(&raw[last..]));
    out.trim().to_string()
}

/// Decode numeric character references and the five predefined XML entities.
pub(crate) fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let s = NUMERIC_ENTITY_RE.replace_all(s, |caps: &regex::Captures| {
        let code = &caps[1];
        let parsed = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse().ok(),
        };
        parsed
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    // `&amp;` last so that `&amp;lt;` decodes to `&lt;`, not `<`.
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
