//! Spotify Web API client for a user's top tracks.
//!
//! The access token is issued elsewhere (OAuth is not handled here); this client
//! only spends it.

use super::{TimeRange, TrackReference, TrackSource};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::sync::Arc;

/// Spotify caps `limit` on the top-items endpoint at 50.
pub const MAX_TOP_TRACKS: u32 = 50;

#[derive(Debug, Deserialize)]
struct TopTracksPage {
    #[serde(default)]
    items: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: Option<String>,
}

#[derive(Debug)]
struct Inner {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Clone)]
pub struct SpotifyClient {
    inner: Arc<Inner>,
}

impl SpotifyClient {
    const DEFAULT_BASE_URL: &'static str = "https://api.spotify.com/v1";

    pub fn new(access_token: &str) -> anyhow::Result<Self> {
        Self::with_base_url(access_token, Self::DEFAULT_BASE_URL)
    }

    pub fn with_base_url(access_token: &str, base_url: &str) -> anyhow::Result<Self> {
        anyhow::ensure!(!access_token.trim().is_empty(), "spotify access token is empty");

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("lyricloud/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", access_token.trim()))
                .context("spotify token is not a valid header value")?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("build reqwest client")?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
            }),
        })
    }

    pub async fn top_tracks_raw(
        &self,
        time_range: TimeRange,
        limit: u32,
    ) -> anyhow::Result<serde_json::Value> {
        let url = format!(
            "{}/me/top/tracks?limit={}&time_range={}",
            self.inner.base_url,
            limit.clamp(1, MAX_TOP_TRACKS),
            time_range.as_str()
        );

        let v: serde_json::Value = self
            .inner
            .http
            .get(&url)
            .send()
            .await
            .context("send top tracks request")?
            .error_for_status()
            .context("top tracks http status")?
            .json()
            .await
            .context("parse top tracks json")?;
        Ok(v)
    }
}

#[async_trait]
impl TrackSource for SpotifyClient {
    async fn top_tracks(
        &self,
        time_range: TimeRange,
        limit: u32,
    ) -> anyhow::Result<Vec<TrackReference>> {
        let v = self.top_tracks_raw(time_range, limit).await?;
        let tracks = tracks_from_page(v)?;
        tracing::info!(count = tracks.len(), %time_range, "fetched top tracks");
        Ok(tracks)
    }
}

/// Map a top-tracks page to ranked references, skipping items without a name or artist.
fn tracks_from_page(v: serde_json::Value) -> anyhow::Result<Vec<TrackReference>> {
    let page: TopTracksPage = serde_json::from_value(v).context("decode top tracks page")?;

    let mut tracks = Vec::with_capacity(page.items.len());
    for item in page.items {
        let title = item.name.unwrap_or_default();
        let artist = item
            .artists
            .into_iter()
            .find_map(|a| a.name)
            .unwrap_or_default();
        if title.trim().is_empty() || artist.trim().is_empty() {
            tracing::debug!(?item.id, "skipping top track without title or artist");
            continue;
        }

        let rank = u32::try_from(tracks.len() + 1).context("too many tracks")?;
        let mut track = TrackReference::new(title, artist, rank)?;
        if let Some(id) = item.id {
            track = track.with_provider_id(id);
        }
        tracks.push(track);
    }
    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tracks_from_page() {
        let page = json!({
            "items": [
                { "id": "a1", "name": "Yellow", "artists": [{ "name": "Coldplay" }, { "name": "Other" }] },
                { "id": "a2", "name": "", "artists": [{ "name": "Nobody" }] },
                { "id": "a3", "name": "Creep", "artists": [{ "name": "Radiohead" }] }
            ],
            "total": 3
        });

        let tracks = tracks_from_page(page).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].title(), "Yellow");
        assert_eq!(tracks[0].artist(), "Coldplay");
        assert_eq!(tracks[0].rank(), 1);
        assert_eq!(tracks[0].provider_track_id(), Some("a1"));
        // Ranks follow the filtered order.
        assert_eq!(tracks[1].title(), "Creep");
        assert_eq!(tracks[1].rank(), 2);
    }

    #[test]
    fn test_empty_page() {
        let tracks = tracks_from_page(json!({ "items": [] })).unwrap();
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_rejects_blank_token() {
        assert!(SpotifyClient::new("   ").is_err());
    }
}
