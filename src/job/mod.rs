//! End-to-end word-cloud generation for one user and time range.

use crate::analysis::{WordFrequencyMap, analyze};
use crate::batch::BatchLyricsCollector;
use crate::lyrics::FetchOutcome;
use crate::publish::{ImagePublisher, image_path};
use crate::render::Renderer;
use crate::tracks::{TimeRange, TrackSource};
use anyhow::Context;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize)]
pub struct ReportTrack {
    pub rank: u32,
    pub title: String,
    pub artist: String,
    pub provider_track_id: Option<String>,
    pub has_lyrics: bool,
    pub outcome: FetchOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct WordCloudReport {
    pub user: String,
    pub time_range: TimeRange,
    pub tracks: Vec<ReportTrack>,
    pub frequencies: WordFrequencyMap,
    pub image_url: Option<String>,
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
}

impl WordCloudReport {
    pub fn lyrics_found(&self) -> usize {
        self.tracks.iter().filter(|t| t.has_lyrics).count()
    }

    /// "1. Title - Artist" per line, in rank order.
    pub fn top_songs_list(&self) -> String {
        let mut out = String::new();
        for t in &self.tracks {
            let _ = writeln!(out, "{}. {} - {}", t.rank, t.title, t.artist);
        }
        out
    }
}

pub struct WordCloudJob {
    source: Arc<dyn TrackSource>,
    collector: BatchLyricsCollector,
    renderer: Arc<dyn Renderer>,
    publisher: Option<Arc<dyn ImagePublisher>>,
}

impl WordCloudJob {
    pub fn new(
        source: Arc<dyn TrackSource>,
        collector: BatchLyricsCollector,
        renderer: Arc<dyn Renderer>,
        publisher: Option<Arc<dyn ImagePublisher>>,
    ) -> Self {
        Self {
            source,
            collector,
            renderer,
            publisher,
        }
    }

    pub async fn run(
        &self,
        user: &str,
        time_range: TimeRange,
        limit: u32,
    ) -> anyhow::Result<WordCloudReport> {
        self.run_with_cancel(user, time_range, limit, CancellationToken::new())
            .await
    }

    /// Like `run`; a cancelled batch still yields a report built from what
    /// was fetched.
    pub async fn run_with_cancel(
        &self,
        user: &str,
        time_range: TimeRange,
        limit: u32,
        cancel: CancellationToken,
    ) -> anyhow::Result<WordCloudReport> {
        let tracks = self
            .source
            .top_tracks(time_range, limit)
            .await
            .context("fetch top tracks")?;

        let batch = self
            .collector
            .collect_with_cancel(tracks, cancel)
            .await
            .context("collect lyrics")?;

        let tracks: Vec<ReportTrack> = batch
            .results
            .iter()
            .map(|r| ReportTrack {
                rank: r.track.rank(),
                title: r.track.title().to_string(),
                artist: r.track.artist().to_string(),
                provider_track_id: r.track.provider_track_id().map(str::to_string),
                has_lyrics: r.has_lyrics(),
                outcome: r.outcome,
            })
            .collect();

        let mut report = WordCloudReport {
            user: user.to_string(),
            time_range,
            tracks,
            frequencies: WordFrequencyMap::new(),
            image_url: None,
            image: None,
        };

        if batch.text.is_empty() {
            tracing::info!(%user, %time_range, "no lyrics found, skipping word cloud");
            return Ok(report);
        }

        report.frequencies = analyze(&batch.text);
        tracing::info!(
            words = report.frequencies.len(),
            total = report.frequencies.total(),
            "analyzed lyrics"
        );

        let image = match self.renderer.render(&report.frequencies) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("word cloud render failed: {e:#}");
                return Ok(report);
            }
        };

        if let Some(publisher) = &self.publisher {
            let path = image_path(user, time_range.as_str(), &image, self.renderer.file_extension());
            report.image_url = self.publish(Arc::clone(publisher), path, image.clone()).await;
        }
        report.image = Some(image);
        Ok(report)
    }

    /// Upload failure means "no URL", never a failed job.
    async fn publish(
        &self,
        publisher: Arc<dyn ImagePublisher>,
        path: String,
        image: Vec<u8>,
    ) -> Option<String> {
        let content_type = self.renderer.content_type();
        match tokio::task::spawn_blocking(move || publisher.publish(&path, &image, content_type)).await {
            Ok(Ok(url)) => Some(url),
            Ok(Err(e)) => {
                tracing::warn!("word cloud upload failed: {e:#}");
                None
            }
            Err(e) => {
                tracing::warn!("word cloud upload task failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchError;
    use crate::lyrics::{FetchPolicy, LyricsFetcher, LyricsProvider};
    use crate::publish::LocalImageStore;
    use crate::render::SvgRenderer;
    use crate::storage::MemoryLyricsCache;
    use crate::tracks::TrackReference;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedSource(Vec<(&'static str, &'static str)>);

    #[async_trait]
    impl TrackSource for FixedSource {
        async fn top_tracks(
            &self,
            _time_range: TimeRange,
            limit: u32,
        ) -> anyhow::Result<Vec<TrackReference>> {
            self.0
                .iter()
                .take(limit as usize)
                .zip(1..)
                .map(|(&(title, artist), rank)| TrackReference::new(title, artist, rank))
                .collect()
        }
    }

    /// Lyrics for every title except "Silence".
    struct EchoProvider;

    #[async_trait]
    impl LyricsProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        fn has_banner(&self) -> bool {
            true
        }

        async fn search(&self, title: &str, _artist: &str) -> anyhow::Result<Option<String>> {
            if title == "Silence" {
                return Ok(None);
            }
            Ok(Some(format!("{title} Lyrics\n[Chorus]\nsweet {title} dreams dreams\nEmbed")))
        }
    }

    struct BrokenPublisher;

    impl ImagePublisher for BrokenPublisher {
        fn publish(&self, _: &str, _: &[u8], _: &str) -> anyhow::Result<String> {
            anyhow::bail!("NoCredentialsError")
        }
    }

    fn job(
        tracks: Vec<(&'static str, &'static str)>,
        publisher: Option<Arc<dyn ImagePublisher>>,
    ) -> WordCloudJob {
        let policy = FetchPolicy {
            timeout: Duration::from_secs(1),
            retries: 0,
            pacing: Duration::ZERO,
        };
        let fetcher = LyricsFetcher::new(Arc::new(EchoProvider), Arc::new(MemoryLyricsCache::new()), policy);
        WordCloudJob::new(
            Arc::new(FixedSource(tracks)),
            BatchLyricsCollector::new(fetcher, 4),
            Arc::new(SvgRenderer::default()),
            publisher,
        )
    }

    #[tokio::test]
    async fn test_full_run_publishes_image() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ImagePublisher> = Arc::new(LocalImageStore::new(dir.path()));
        let job = job(
            vec![("Summer", "Band A"), ("Silence", "Band B"), ("Winter", "Band C")],
            Some(store),
        );

        let report = job
            .run("user-1", TimeRange::ShortTerm, 50)
            .await
            .unwrap();

        assert_eq!(report.tracks.len(), 3);
        assert_eq!(report.lyrics_found(), 2);
        assert_eq!(report.tracks[1].outcome, FetchOutcome::NotFound);
        assert_eq!(report.frequencies.get("dreams"), 4);
        assert_eq!(report.frequencies.get("sweet"), 2);
        assert_eq!(report.frequencies.get("summer"), 1);
        assert_eq!(report.frequencies.get("embed"), 0);

        let url = report.image_url.as_deref().unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.contains("wordcloud/user-1/short_term/"));
        assert!(report.image.is_some());

        assert_eq!(
            report.top_songs_list(),
            "1. Summer - Band A\n2. Silence - Band B\n3. Winter - Band C\n"
        );
    }

    #[tokio::test]
    async fn test_no_lyrics_skips_render() {
        let job = job(vec![("Silence", "Band")], None);
        let report = job
            .run("u", TimeRange::LongTerm, 10)
            .await
            .unwrap();

        assert_eq!(report.lyrics_found(), 0);
        assert!(report.frequencies.is_empty());
        assert!(report.image.is_none());
        assert!(report.image_url.is_none());
    }

    #[tokio::test]
    async fn test_publish_failure_is_not_fatal() {
        let job = job(vec![("Summer", "Band")], Some(Arc::new(BrokenPublisher)));
        let report = job
            .run("u", TimeRange::MediumTerm, 10)
            .await
            .unwrap();

        assert!(report.image.is_some());
        assert!(report.image_url.is_none());
    }

    #[tokio::test]
    async fn test_no_top_tracks_is_rejected() {
        let job = job(vec![], None);
        let err = job
            .run("u", TimeRange::MediumTerm, 10)
            .await
            .unwrap_err();

        assert_eq!(err.downcast_ref::<BatchError>(), Some(&BatchError::Empty));
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_tracks_without_lyrics() {
        let job = job(vec![("Summer", "Band"), ("Winter", "Band")], None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = job
            .run_with_cancel("u", TimeRange::MediumTerm, 10, cancel)
            .await
            .unwrap();

        assert_eq!(report.tracks.len(), 2);
        assert_eq!(report.lyrics_found(), 0);
        assert!(report.image.is_none());
    }

    #[test]
    fn test_report_serializes_without_image_bytes() {
        let report = WordCloudReport {
            user: "u".into(),
            time_range: TimeRange::ShortTerm,
            tracks: vec![],
            frequencies: analyze("cat cat"),
            image_url: None,
            image: Some(vec![1, 2, 3]),
        };
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["time_range"], "short_term");
        assert_eq!(v["frequencies"]["cat"], 2);
        assert!(v.get("image").is_none());
    }
}
