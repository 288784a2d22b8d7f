//! URL classification: which addresses the engine may drive.
//!
//! Must be consulted before navigating, injecting scripts, or capturing.

use regex::Regex;
use url::Url;

/// Neutral page new windows are opened at.
pub const BLANK_TARGET: &str = "about:blank";

/// Schemes belonging to browser chrome, extensions, or debugging surfaces.
const INTERNAL_SCHEMES: &[&str] = &[
    "about",
    "brave",
    "chrome",
    "chrome-extension",
    "chrome-search",
    "chrome-untrusted",
    "devtools",
    "edge",
    "firefox",
    "moz-extension",
    "opera",
    "view-source",
];

/// True when `url` belongs to the browser itself or cannot be parsed.
pub fn is_internal(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => INTERNAL_SCHEMES.contains(&parsed.scheme()),
        Err(_) => true,
    }
}

/// True only for http(s) URLs with a host.
pub fn is_valid_external_target(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

/// Prefix `https://` unless the input already names a scheme.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if has_scheme_prefix(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// An RFC 3986 scheme followed by `://`.
const SCHEME_PREFIX: &str = r"^[a-zA-Z][a-zA-Z0-9+.-]*://";

fn has_scheme_prefix(s: &str) -> bool {
    Regex::new(SCHEME_PREFIX).is_ok_and(|re| re.is_match(s))
}
