use super::normalize::{normalize, normalize_body};
use super::{FetchOutcome, LyricsProvider, LyricsResult};
use crate::storage::LyricsCache;
use crate::tracks::TrackReference;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Timeout, retry and pacing knobs for provider calls.
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    /// Bound on a single provider attempt.
    pub timeout: Duration,
    /// Extra attempts after a failed one. "No match" is never retried.
    pub retries: u32,
    /// Minimum spacing between provider requests across all workers.
    pub pacing: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retries: 1,
            pacing: Duration::from_millis(100),
        }
    }
}

/// Hands out request slots at least `interval` apart.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Wait for the next free slot.
    pub async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }

        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

/// Cache-checked, paced, retrying lyrics lookup for a single track.
///
/// Never fails: every problem ends in an absent `LyricsResult`.
#[derive(Clone)]
pub struct LyricsFetcher {
    provider: Arc<dyn LyricsProvider>,
    cache: Arc<dyn LyricsCache>,
    policy: FetchPolicy,
    pacer: Arc<Pacer>,
}

impl LyricsFetcher {
    pub fn new(
        provider: Arc<dyn LyricsProvider>,
        cache: Arc<dyn LyricsCache>,
        policy: FetchPolicy,
    ) -> Self {
        Self {
            provider,
            cache,
            pacer: Arc::new(Pacer::new(policy.pacing)),
            policy,
        }
    }

    pub fn policy(&self) -> FetchPolicy {
        self.policy
    }

    pub async fn fetch(&self, track: &TrackReference) -> LyricsResult {
        let (title, artist) = (track.title(), track.artist());

        if let Some(lyrics) = self.cached(artist, title).await {
            tracing::debug!(rank = track.rank(), %artist, %title, "lyrics cache hit");
            return LyricsResult::found(track.clone(), lyrics, FetchOutcome::Cached);
        }

        let raw = match self.from_provider(title, artist).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(provider = self.provider.name(), %artist, %title, "no lyrics match");
                return LyricsResult::absent(track.clone(), FetchOutcome::NotFound);
            }
            Err(e) => {
                tracing::warn!(provider = self.provider.name(), %artist, %title, "lyrics fetch failed: {e:#}");
                return LyricsResult::absent(track.clone(), FetchOutcome::Failed);
            }
        };

        let normalized = if self.provider.has_banner() {
            normalize(Some(&raw))
        } else {
            normalize_body(Some(&raw))
        };
        let lyrics = match normalized {
            Some(lyrics) if !lyrics.is_empty() => lyrics,
            _ => {
                tracing::debug!(%artist, %title, "lyrics empty after normalization");
                return LyricsResult::absent(track.clone(), FetchOutcome::Empty);
            }
        };

        self.remember(artist, title, &lyrics).await;
        LyricsResult::found(track.clone(), lyrics, FetchOutcome::Fetched)
    }

    /// Cache lookup. A broken cache reads as a miss.
    async fn cached(&self, artist: &str, title: &str) -> Option<String> {
        let cache = Arc::clone(&self.cache);
        let (a, t) = (artist.to_string(), title.to_string());
        match tokio::task::spawn_blocking(move || cache.lookup(&a, &t)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                tracing::warn!(%artist, %title, "lyrics cache unavailable, fetching uncached: {e:#}");
                None
            }
            Err(e) => {
                tracing::warn!(%artist, %title, "lyrics cache lookup task failed: {e}");
                None
            }
        }
    }

    async fn remember(&self, artist: &str, title: &str, lyrics: &str) {
        let cache = Arc::clone(&self.cache);
        let (a, t, l) = (artist.to_string(), title.to_string(), lyrics.to_string());
        match tokio::task::spawn_blocking(move || cache.store(&a, &t, &l)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(%artist, %title, "lyrics not cached: {e:#}"),
            Err(e) => tracing::warn!(%artist, %title, "lyrics cache store task failed: {e}"),
        }
    }

    /// Provider call with per-attempt timeout and bounded retries.
    async fn from_provider(&self, title: &str, artist: &str) -> anyhow::Result<Option<String>> {
        let attempts = self.policy.retries.saturating_add(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            self.pacer.wait().await;

            match tokio::time::timeout(self.policy.timeout, self.provider.search(title, artist)).await {
                Ok(Ok(found)) => return Ok(found),
                Ok(Err(e)) => {
                    tracing::debug!(attempt, %artist, %title, "provider error: {e:#}");
                    last_err = Some(e);
                }
                Err(_) => {
                    tracing::debug!(attempt, %artist, %title, "provider timed out");
                    last_err = Some(anyhow::anyhow!(
                        "timed out after {:?}",
                        self.policy.timeout
                    ));
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| anyhow::anyhow!("no attempts made"))
            .context(format!("{attempts} attempt(s) exhausted")))
    }
}
