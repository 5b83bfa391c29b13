//! LRCLIB API client
//!
//! LRCLIB is a free lyrics API. Plain lyrics are preferred; synced (LRC)
//! lyrics are used as a fallback with their timestamps stripped.
//! API Documentation: https://lrclib.net/docs

use super::LyricsProvider;
use anyhow::Context;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;

/// Leading `[mm:ss.xx]` stamps, possibly repeated.
static LRC_STAMPS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\[\d{1,3}:\d{2}(?:[.:]\d{1,3})?\])+\s*").unwrap());

/// Metadata tags like `[ti:Title]` or `[ar:Artist]`.
static LRC_METADATA: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[[a-zA-Z]{2,3}:.*\]$").unwrap());

/// LRCLIB API response
#[derive(Debug, Deserialize, Clone)]
pub struct LrclibResponse {
    #[serde(rename = "trackName")]
    pub track_name: Option<String>,
    #[serde(rename = "artistName")]
    pub artist_name: Option<String>,
    #[serde(rename = "plainLyrics")]
    pub plain_lyrics: Option<String>,
    #[serde(rename = "syncedLyrics")]
    pub synced_lyrics: Option<String>,
}

impl LrclibResponse {
    /// Plain text of the lyrics, if the response carries any.
    pub fn text(&self) -> Option<String> {
        if let Some(plain) = &self.plain_lyrics
            && !plain.trim().is_empty()
        {
            return Some(plain.clone());
        }
        if let Some(synced) = &self.synced_lyrics
            && !synced.trim().is_empty()
        {
            return Some(strip_timestamps(synced));
        }
        None
    }
}

/// Drop LRC timestamps and metadata tags, keeping the lyric lines.
pub fn strip_timestamps(lrc: &str) -> String {
    lrc.lines()
        .map(str::trim)
        .filter(|line| !LRC_METADATA.is_match(line))
        .map(|line| LRC_STAMPS.replace(line, "").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

/// LRCLIB API client
#[derive(Debug, Clone)]
pub struct LrclibClient {
    client: reqwest::Client,
    base_url: String,
}

impl LrclibClient {
    const DEFAULT_BASE_URL: &'static str = "https://lrclib.net/api";
    const USER_AGENT: &'static str = concat!("lyricloud/", env!("CARGO_PKG_VERSION"));

    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        Self::with_base_url(Self::DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(Self::USER_AGENT)
            .timeout(timeout)
            .build()
            .context("build reqwest client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get lyrics by track info: exact match first, then search.
    pub async fn get_lyrics(
        &self,
        track_name: &str,
        artist_name: &str,
    ) -> anyhow::Result<Option<LrclibResponse>> {
        if let Some(lyrics) = self.get_exact(track_name, artist_name).await? {
            return Ok(Some(lyrics));
        }

        self.search_best(track_name, artist_name).await
    }

    async fn get_exact(
        &self,
        track_name: &str,
        artist_name: &str,
    ) -> anyhow::Result<Option<LrclibResponse>> {
        let url = format!(
            "{}/get?track_name={}&artist_name={}",
            self.base_url,
            urlencoding::encode(track_name),
            urlencoding::encode(artist_name)
        );

        let response = self.client.get(&url).send().await.context("send lrclib get")?;

        if response.status().is_success() {
            let lyrics: LrclibResponse = response.json().await.context("parse lrclib get")?;
            Ok(Some(lyrics))
        } else if response.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(None)
        } else {
            anyhow::bail!("LRCLIB API error: {}", response.status());
        }
    }

    async fn search_best(
        &self,
        track_name: &str,
        artist_name: &str,
    ) -> anyhow::Result<Option<LrclibResponse>> {
        let query = format!("{} {}", track_name, artist_name);
        let url = format!("{}/search?q={}", self.base_url, urlencoding::encode(&query));

        let response = self.client.get(&url).send().await.context("send lrclib search")?;

        if response.status().is_success() {
            let results: Vec<LrclibResponse> =
                response.json().await.context("parse lrclib search")?;
            Ok(pick_best(results))
        } else if response.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(None)
        } else {
            anyhow::bail!("LRCLIB search error: {}", response.status());
        }
    }
}

/// First result with plain lyrics, else the first with any lyrics.
fn pick_best(results: Vec<LrclibResponse>) -> Option<LrclibResponse> {
    let plain = results.iter().position(|r| r.plain_lyrics.is_some());
    let any = results.iter().position(|r| r.text().is_some());
    plain.or(any).and_then(|i| results.into_iter().nth(i))
}

#[async_trait]
impl LyricsProvider for LrclibClient {
    fn name(&self) -> &str {
        "lrclib"
    }

    async fn search(&self, title: &str, artist: &str) -> anyhow::Result<Option<String>> {
        let found = self.get_lyrics(title, artist).await?;
        Ok(found.and_then(|r| r.text()))
    }
}
