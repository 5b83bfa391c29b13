//! Genius client.
//!
//! Genius' API only returns song metadata, so lyrics come from scraping the
//! song page. The scraped text keeps the page's "<title> Lyrics" banner and
//! section markers; `normalize` deals with those.

use super::LyricsProvider;
use anyhow::Context;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use serde::Deserialize;
use std::time::Duration;

static LYRICS_CONTAINER: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[data-lyrics-container="true"]"#).unwrap());

/// Pages Genius files under songs that are not songs.
const NON_SONG_TITLES: &[&str] = &[
    "tracklist",
    "track list",
    "album art",
    "liner notes",
    "booklet",
    "credits",
    "interview",
    "skit",
    "setlist",
];

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: SearchResponse,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "type")]
    kind: String,
    result: SongHit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SongHit {
    pub title: String,
    pub url: String,
    pub primary_artist: Option<PrimaryArtist>,
    pub lyrics_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrimaryArtist {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct GeniusClient {
    http: reqwest::Client,
    token: String,
    api_url: String,
    excluded_terms: Vec<String>,
}

impl GeniusClient {
    const DEFAULT_API_URL: &'static str = "https://api.genius.com";
    const USER_AGENT: &'static str = concat!("lyricloud/", env!("CARGO_PKG_VERSION"));

    pub fn new(token: &str, timeout: Duration, excluded_terms: Vec<String>) -> anyhow::Result<Self> {
        anyhow::ensure!(!token.trim().is_empty(), "genius token is empty");

        let http = reqwest::Client::builder()
            .user_agent(Self::USER_AGENT)
            .timeout(timeout)
            .build()
            .context("build reqwest client")?;

        Ok(Self {
            http,
            token: token.trim().to_string(),
            api_url: Self::DEFAULT_API_URL.to_string(),
            excluded_terms: excluded_terms
                .into_iter()
                .map(|t| t.to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        })
    }

    async fn search_hits(&self, title: &str, artist: &str) -> anyhow::Result<Vec<SongHit>> {
        let query = format!("{} {}", title, artist);
        let url = format!("{}/search?q={}", self.api_url, urlencoding::encode(&query));

        let envelope: SearchEnvelope = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("send genius search")?
            .error_for_status()
            .context("genius search http status")?
            .json()
            .await
            .context("parse genius search json")?;

        Ok(envelope
            .response
            .hits
            .into_iter()
            .filter(|h| h.kind == "song")
            .map(|h| h.result)
            .collect())
    }

    async fn song_page(&self, url: &str) -> anyhow::Result<String> {
        self.http
            .get(url)
            .send()
            .await
            .context("send genius page request")?
            .error_for_status()
            .context("genius page http status")?
            .text()
            .await
            .context("read genius page")
    }
}

#[async_trait]
impl LyricsProvider for GeniusClient {
    fn name(&self) -> &str {
        "genius"
    }

    fn has_banner(&self) -> bool {
        true
    }

    async fn search(&self, title: &str, artist: &str) -> anyhow::Result<Option<String>> {
        let hits = self.search_hits(title, artist).await?;
        let Some(hit) = pick_hit(&hits, title, artist, &self.excluded_terms) else {
            return Ok(None);
        };

        tracing::debug!(url = %hit.url, matched = %hit.title, "genius match");
        let html = self.song_page(&hit.url).await?;
        Ok(extract_lyrics(&html).map(|body| with_banner(&hit.title, &body)))
    }
}

/// Prefix `body` with the page's "<title> Lyrics" banner.
///
/// The banner rule strips through the first "Lyrics", so the word is dropped
/// from the title to keep the whole banner inside that match.
fn with_banner(title: &str, body: &str) -> String {
    format!("{} Lyrics{}", title.replace("Lyrics", "").trim(), body)
}

/// Choose the hit to scrape.
///
/// Skips non-song pages, unfinished transcriptions and titles carrying an
/// excluded term the caller did not ask for. A hit by the requested artist
/// wins over the search ranking.
pub fn pick_hit<'a>(
    hits: &'a [SongHit],
    title: &str,
    artist: &str,
    excluded_terms: &[String],
) -> Option<&'a SongHit> {
    let wanted_title = title.to_lowercase();
    let wanted_artist = artist.trim().to_lowercase();

    let mut candidates = hits.iter().filter(|hit| {
        let hit_title = hit.title.to_lowercase();
        if NON_SONG_TITLES.iter().any(|t| hit_title.contains(t)) {
            return false;
        }
        if hit.lyrics_state.as_deref().is_some_and(|s| s != "complete") {
            return false;
        }
        !excluded_terms
            .iter()
            .any(|term| hit_title.contains(term.as_str()) && !wanted_title.contains(term.as_str()))
    });

    let first = candidates.next()?;
    let by_artist = |hit: &&SongHit| {
        hit.primary_artist
            .as_ref()
            .is_some_and(|a| a.name.trim().to_lowercase() == wanted_artist)
    };
    if by_artist(&first) {
        return Some(first);
    }
    Some(candidates.find(by_artist).unwrap_or(first))
}

/// Text of every lyrics container on a song page, `<br>` as newlines.
pub fn extract_lyrics(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);

    let mut out = String::new();
    let mut found = false;
    for container in doc.select(&LYRICS_CONTAINER) {
        found = true;
        collect_text(container, &mut out);
        out.push('\n');
    }

    if !found || out.trim().is_empty() {
        return None;
    }
    Some(out.trim_end().to_string())
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "br" => out.push('\n'),
            Node::Element(el) if el.attr("data-exclude-from-selection").is_some() => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
}
