//! Lyrics acquisition.
//!
//! This module provides:
//! - the `LyricsProvider` seam plus Genius and LRCLIB clients
//! - text normalization for scraped lyrics
//! - `LyricsFetcher`, which puts cache, provider, retry and pacing together

pub mod fetcher;
pub mod genius;
pub mod lrclib;
pub mod normalize;

pub use fetcher::{FetchPolicy, LyricsFetcher, Pacer};
pub use genius::GeniusClient;
pub use lrclib::LrclibClient;

use crate::tracks::TrackReference;
use async_trait::async_trait;
use serde::Serialize;

/// External lyrics source.
///
/// `Ok(None)` means the provider matched nothing; `Err` is reserved for
/// infrastructure trouble (network, status codes, decoding).
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `search` output starts with a "<title> Lyrics" banner that
    /// normalization should strip.
    fn has_banner(&self) -> bool {
        false
    }

    async fn search(&self, title: &str, artist: &str) -> anyhow::Result<Option<String>>;
}

/// How a fetch ended. Only useful for logging and reporting: every absent
/// outcome is handled the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    Cached,
    Fetched,
    NotFound,
    Empty,
    Failed,
}

/// Lyrics (or their absence) for one track of a batch.
#[derive(Debug, Clone)]
pub struct LyricsResult {
    pub track: TrackReference,
    pub lyrics: Option<String>,
    pub outcome: FetchOutcome,
}

impl LyricsResult {
    pub fn found(track: TrackReference, lyrics: String, outcome: FetchOutcome) -> Self {
        Self {
            track,
            lyrics: Some(lyrics),
            outcome,
        }
    }

    pub fn absent(track: TrackReference, outcome: FetchOutcome) -> Self {
        Self {
            track,
            lyrics: None,
            outcome,
        }
    }

    pub fn has_lyrics(&self) -> bool {
        self.lyrics.is_some()
    }
}
