//! Cleanup of scraped lyrics pages into plain prose.
//!
//! Rules run in a fixed order. The banner goes first: the marker and URL rules
//! assume the "<title> Lyrics" attribution header is already gone. Text from
//! providers that never emit that header goes through the `*_body` variants,
//! which skip the banner rule.

use once_cell::sync::Lazy;
use regex::Regex;

/// Attribution banner up to and including the first literal "Lyrics".
static BANNER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^.*?Lyrics").unwrap());

/// "You might also like" recommendation block through end of text.
static RECOMMENDATIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)You might also like.*$").unwrap());

/// Section markers like [Chorus] or [Verse 2: Artist].
static SECTION_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]").unwrap());

/// Numbering artifacts at the start of a line ("12." / "3 ").
static LINE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\d+\.?\s*").unwrap());

static EMBED_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)Embed$").unwrap());

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<.*?>").unwrap());

static POWERED_BY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)Lyrics\s+powered\s+by\s+.*$").unwrap());

static CONTRIBUTORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)Contributors:.*$").unwrap());

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:[a-zA-Z0-9$-_@.&+!*(),]|%[0-9a-fA-F]{2})+").unwrap()
});

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());

/// Normalize optional raw lyrics.
///
/// `None` (and an empty input) stays `None`: there is nothing to clean and no
/// text is synthesized. A non-empty input may still normalize to `""`; callers
/// treat that as "no lyrics".
pub fn normalize(raw: Option<&str>) -> Option<String> {
    raw.filter(|r| !r.is_empty()).map(normalize_text)
}

/// Like `normalize`, for text without a "<title> Lyrics" banner.
pub fn normalize_body(raw: Option<&str>) -> Option<String> {
    raw.filter(|r| !r.is_empty()).map(normalize_body_text)
}

pub fn normalize_text(raw: &str) -> String {
    normalize_body_text(&BANNER.replace(raw, ""))
}

pub fn normalize_body_text(raw: &str) -> String {
    let text = RECOMMENDATIONS.replace(raw, "");
    let text = SECTION_MARKER.replace_all(&text, "");
    let text = LINE_NUMBER.replace_all(&text, "");
    let text = EMBED_MARKER.replace_all(&text, "");
    let text = HTML_TAG.replace_all(&text, "");
    let text = POWERED_BY.replace(&text, "");
    let text = CONTRIBUTORS.replace(&text, "");
    let text = URL.replace_all(&text, "");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    let text = SPACE_RUN.replace_all(&text, " ");
    text.trim().to_string()
}
