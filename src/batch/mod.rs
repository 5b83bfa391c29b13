//! Concurrent lyrics collection for a ranked track list.

use crate::lyrics::{FetchOutcome, LyricsFetcher, LyricsResult};
use crate::tracks::TrackReference;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Rejected batch input. The only error that leaves the collector.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("batch has no tracks")]
    Empty,
    #[error("rank {0} appears more than once in the batch")]
    DuplicateRank(u32),
}

/// Per-track results in rank order plus the concatenated lyrics text.
#[derive(Debug, Clone, Default)]
pub struct BatchOutput {
    pub results: Vec<LyricsResult>,
    pub text: String,
}

impl BatchOutput {
    /// Number of tracks that ended up with lyrics.
    pub fn found(&self) -> usize {
        self.results.iter().filter(|r| r.has_lyrics()).count()
    }
}

pub struct BatchLyricsCollector {
    fetcher: LyricsFetcher,
    max_concurrency: usize,
}

impl BatchLyricsCollector {
    pub fn new(fetcher: LyricsFetcher, max_concurrency: usize) -> Self {
        Self {
            fetcher,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub async fn collect(&self, tracks: Vec<TrackReference>) -> Result<BatchOutput, BatchError> {
        self.collect_with_cancel(tracks, CancellationToken::new()).await
    }

    /// Like `collect`, but stops early once `cancel` fires: tracks not yet
    /// fetched come back absent.
    pub async fn collect_with_cancel(
        &self,
        tracks: Vec<TrackReference>,
        cancel: CancellationToken,
    ) -> Result<BatchOutput, BatchError> {
        validate(&tracks)?;
        tracing::info!(
            tracks = tracks.len(),
            max_concurrency = self.max_concurrency,
            "collecting lyrics"
        );

        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut by_rank: HashMap<u32, TrackReference> =
            tracks.iter().map(|t| (t.rank(), t.clone())).collect();
        let mut tasks = JoinSet::new();

        for track in tracks {
            let fetcher = self.fetcher.clone();
            let permits = Arc::clone(&permits);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = permits.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return LyricsResult::absent(track, FetchOutcome::Failed);
                };

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => LyricsResult::absent(track.clone(), FetchOutcome::Failed),
                    result = fetcher.fetch(&track) => result,
                }
            });
        }

        let mut results = Vec::with_capacity(by_rank.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    by_rank.remove(&result.track.rank());
                    results.push(result);
                }
                Err(e) => tracing::warn!("lyrics task did not finish: {e}"),
            }
        }
        // Tasks that panicked still own a slot in the output.
        results.extend(
            by_rank
                .into_values()
                .map(|track| LyricsResult::absent(track, FetchOutcome::Failed)),
        );
        results.sort_by_key(|r| r.track.rank());

        let mut text = String::new();
        for lyrics in results.iter().filter_map(|r| r.lyrics.as_deref()) {
            text.push_str(lyrics);
            text.push('\n');
        }

        let output = BatchOutput { results, text };
        if cancel.is_cancelled() {
            tracing::warn!(found = output.found(), "lyrics batch cancelled");
        } else {
            tracing::info!(
                found = output.found(),
                total = output.results.len(),
                "lyrics batch complete"
            );
        }
        Ok(output)
    }
}

fn validate(tracks: &[TrackReference]) -> Result<(), BatchError> {
    if tracks.is_empty() {
        return Err(BatchError::Empty);
    }
    let mut seen = HashSet::with_capacity(tracks.len());
    for t in tracks {
        if !seen.insert(t.rank()) {
            return Err(BatchError::DuplicateRank(t.rank()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lyrics::{FetchPolicy, LyricsProvider};
    use crate::storage::MemoryLyricsCache;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers by title: "fail*" errors, "missing*" finds nothing, anything
    /// else gets "<title> Lyrics\nwords of <title>". Tracks in-flight calls.
    #[derive(Default)]
    struct ScriptedProvider {
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl LyricsProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn has_banner(&self) -> bool {
            true
        }

        async fn search(&self, title: &str, _artist: &str) -> anyhow::Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            // Earlier ranks finish later so completion order differs from rank order.
            let stagger = if title.ends_with('1') { 3 } else { 1 };
            tokio::time::sleep(self.delay * stagger).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if title.starts_with("fail") {
                anyhow::bail!("connection reset");
            }
            if title.starts_with("missing") {
                return Ok(None);
            }
            Ok(Some(format!("{title} Lyrics\nwords of {title}")))
        }
    }

    fn collector(provider: Arc<ScriptedProvider>, max_concurrency: usize) -> BatchLyricsCollector {
        let policy = FetchPolicy {
            timeout: Duration::from_secs(2),
            retries: 1,
            pacing: Duration::ZERO,
        };
        let fetcher = LyricsFetcher::new(provider, Arc::new(MemoryLyricsCache::new()), policy);
        BatchLyricsCollector::new(fetcher, max_concurrency)
    }

    fn track(title: &str, rank: u32) -> TrackReference {
        TrackReference::new(title, "Artist", rank).unwrap()
    }

    #[tokio::test]
    async fn test_rank_order_with_failed_middle_track() {
        let provider = Arc::new(ScriptedProvider {
            delay: Duration::from_millis(10),
            ..Default::default()
        });
        let collector = collector(provider, 3);

        // Handed over out of order on purpose.
        let tracks = vec![track("song3", 3), track("fail2", 2), track("song1", 1)];
        let out = collector.collect(tracks).await.unwrap();

        let ranks: Vec<u32> = out.results.iter().map(|r| r.track.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert!(out.results[0].has_lyrics());
        assert!(!out.results[1].has_lyrics());
        assert_eq!(out.results[1].outcome, FetchOutcome::Failed);
        assert!(out.results[2].has_lyrics());

        assert_eq!(out.text, "words of song1\nwords of song3\n");
        assert_eq!(out.found(), 2);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let provider = Arc::new(ScriptedProvider {
            delay: Duration::from_millis(5),
            ..Default::default()
        });
        let collector = collector(provider.clone(), 10);

        let tracks: Vec<_> = (1..=100).map(|i| track(&format!("song{i}"), i)).collect();
        let out = collector.collect(tracks).await.unwrap();

        assert_eq!(out.results.len(), 100);
        assert_eq!(out.found(), 100);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 100);
        // Every permit is used at once, and never more.
        let peak = provider.max_in_flight.load(Ordering::SeqCst);
        assert_eq!(peak, 10, "expected 10 fetches in flight, saw {peak}");
    }

    #[tokio::test]
    async fn test_bounded_batch_takes_minimum_time() {
        let provider = Arc::new(ScriptedProvider {
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let collector = collector(provider, 5);

        // Titles end in 0, so every call sleeps exactly one delay.
        let tracks: Vec<_> = (1..=10).map(|i| track(&format!("song{i}0"), i)).collect();
        let start = std::time::Instant::now();
        collector.collect(tracks).await.unwrap();

        // 10 calls, 5 at a time, 20ms each: two waves, far below 200ms serial.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(40), "finished too early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(150), "ran serially: {elapsed:?}");
    }

    #[tokio::test]
    async fn test_all_absent_still_completes() {
        let provider = Arc::new(ScriptedProvider::default());
        let collector = collector(provider, 2);

        let tracks = vec![track("fail1", 1), track("missing2", 2), track("fail3", 3)];
        let out = collector.collect(tracks).await.unwrap();

        assert_eq!(out.found(), 0);
        assert!(out.text.is_empty());
        assert_eq!(out.results[1].outcome, FetchOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_rejects_invalid_input() {
        let collector = collector(Arc::new(ScriptedProvider::default()), 2);

        assert_eq!(collector.collect(vec![]).await.unwrap_err(), BatchError::Empty);

        let dup = vec![track("a", 1), track("b", 2), track("c", 2)];
        assert_eq!(
            collector.collect(dup).await.unwrap_err(),
            BatchError::DuplicateRank(2)
        );
    }

    #[tokio::test]
    async fn test_cancelled_batch_skips_provider() {
        let provider = Arc::new(ScriptedProvider::default());
        let collector = collector(provider.clone(), 2);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let tracks = vec![track("song1", 1), track("song2", 2)];
        let out = collector.collect_with_cancel(tracks, cancel).await.unwrap();

        assert_eq!(out.results.len(), 2);
        assert_eq!(out.found(), 0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let c = collector(Arc::new(ScriptedProvider::default()), 0);
        assert_eq!(c.max_concurrency(), 1);
    }
}
