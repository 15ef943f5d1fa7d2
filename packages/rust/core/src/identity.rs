//! Post identity derived from canonical links.

use postfeed_shared::PostId;
use url::Url;

/// Derive the stable identifier for a post from its link.
///
/// The identifier is the last path segment with its file extension removed,
/// so `http://x.com/abc123.html` becomes `abc123`. Query strings, fragments,
/// and trailing slashes are ignored. Never fails: links that do not parse as
/// URLs go through the same rule on the raw string.
pub fn identifier_of(link: &str) -> PostId {
    let path = match Url::parse(link) {
        Ok(url) => url.path().to_string(),
        Err(_) => link.split(['?', '#']).next().unwrap_or(link).to_string(),
    };

    let segment = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    let stem = match segment.rfind('.') {
        Some(dot) if dot > 0 => &segment[..dot],
        _ => segment,
    };

    if stem.is_empty() {
        // Bare origin, no path segment to key on.
        PostId::new(link.trim_end_matches('/'))
    } else {
        PostId::new(stem)
    }
}
