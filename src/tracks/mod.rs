//! Ranked track references and the source they come from.

pub mod spotify;

pub use spotify::SpotifyClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A track in a ranked batch. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackReference {
    title: String,
    artist: String,
    rank: u32,
    provider_track_id: Option<String>,
}

impl TrackReference {
    /// Build a track reference. Title and artist must be non-blank and rank is 1-based.
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        rank: u32,
    ) -> anyhow::Result<Self> {
        let title = title.into();
        let artist = artist.into();
        anyhow::ensure!(!title.trim().is_empty(), "track title is empty");
        anyhow::ensure!(!artist.trim().is_empty(), "track artist is empty (title {title:?})");
        anyhow::ensure!(rank >= 1, "track rank must be 1-based (title {title:?})");
        Ok(Self {
            title,
            artist,
            rank,
            provider_track_id: None,
        })
    }

    pub fn with_provider_id(mut self, id: impl Into<String>) -> Self {
        self.provider_track_id = Some(id.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn rank(&self) -> u32 {
        self.rank
    }

    pub fn provider_track_id(&self) -> Option<&str> {
        self.provider_track_id.as_deref()
    }
}

/// Window over which the streaming service computes "top" tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    ShortTerm,
    #[default]
    MediumTerm,
    LongTerm,
}

impl TimeRange {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short_term" | "short" => Ok(TimeRange::ShortTerm),
            "medium_term" | "medium" => Ok(TimeRange::MediumTerm),
            "long_term" | "long" => Ok(TimeRange::LongTerm),
            other => anyhow::bail!("unknown time range {other:?} (expected short, medium or long)"),
        }
    }
}

/// Supplies a user's ranked top tracks.
#[async_trait]
pub trait TrackSource: Send + Sync {
    async fn top_tracks(
        &self,
        time_range: TimeRange,
        limit: u32,
    ) -> anyhow::Result<Vec<TrackReference>>;
}
