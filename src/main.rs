use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use lyricloud::analysis::analyze;
use lyricloud::batch::BatchLyricsCollector;
use lyricloud::config::{self, Config, ProviderConfig, ProviderKind};
use lyricloud::job::{WordCloudJob, WordCloudReport};
use lyricloud::lyrics::{GeniusClient, LrclibClient, LyricsFetcher, LyricsProvider};
use lyricloud::publish::{ImagePublisher, LocalImageStore};
use lyricloud::render::{Renderer, SvgRenderer};
use lyricloud::storage::SqliteLyricsCache;
use lyricloud::tracks::{SpotifyClient, TimeRange, TrackReference};
use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(name = "lyricloud", version, about = "Word clouds from the lyrics of your top tracks")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch top tracks, collect lyrics and render a word cloud.
    Generate {
        /// short, medium or long (defaults to the config value).
        #[arg(long)]
        time_range: Option<TimeRange>,
        /// Number of top tracks (1-50).
        #[arg(long)]
        limit: Option<u32>,
        /// Owner name used in the published image path.
        #[arg(long, default_value = "me")]
        user: String,
        /// Also write the image, top songs list and report into this directory.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Look up the lyrics of one song (cache first).
    Lyrics { title: String, artist: String },
    /// Word frequencies of a text file (stdin when omitted).
    Analyze {
        file: Option<PathBuf>,
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut cfg = config::load(cli.config.as_deref()).context("load config")?;
    apply_env(&mut cfg);

    match cli.command {
        Command::Generate {
            time_range,
            limit,
            user,
            out,
        } => {
            let time_range = time_range.unwrap_or(cfg.spotify.time_range);
            let limit = limit.unwrap_or(cfg.spotify.limit);
            let token = cfg
                .spotify
                .access_token
                .as_deref()
                .context("no Spotify access token (set SPOTIFY_ACCESS_TOKEN or spotify.access_token)")?;

            let source = Arc::new(SpotifyClient::new(token)?);
            let collector = BatchLyricsCollector::new(make_fetcher(&cfg)?, cfg.batch.max_concurrency);
            let renderer = Arc::new(SvgRenderer::new(cfg.render.clone()));
            let publisher: Arc<dyn ImagePublisher> = Arc::new(LocalImageStore::new(cfg.images_dir()));
            let job = WordCloudJob::new(source, collector, renderer.clone(), Some(publisher));

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted, finishing with what was fetched");
                    on_signal.cancel();
                }
            });

            let report = job.run_with_cancel(&user, time_range, limit, cancel).await?;
            if let Some(dir) = out {
                write_outputs(&dir, &report, renderer.file_extension())?;
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Lyrics { title, artist } => {
            let track = TrackReference::new(title, artist, 1)?;
            let result = make_fetcher(&cfg)?.fetch(&track).await;
            match result.lyrics {
                Some(lyrics) => println!("{lyrics}"),
                None => anyhow::bail!(
                    "no lyrics for {} - {} ({:?})",
                    track.title(),
                    track.artist(),
                    result.outcome
                ),
            }
        }
        Command::Analyze { file, top } => {
            let text = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf).context("read stdin")?;
                    buf
                }
            };
            let freq = analyze(&text);
            for (word, count) in freq.top(top) {
                println!("{count:>6}  {word}");
            }
        }
    }

    Ok(())
}

/// Tokens from the environment win over the config file.
fn apply_env(cfg: &mut Config) {
    if let Ok(token) = std::env::var("GENIUS_TOKEN")
        && !token.trim().is_empty()
    {
        cfg.provider.genius_token = Some(token);
    }
    if let Ok(token) = std::env::var("SPOTIFY_ACCESS_TOKEN")
        && !token.trim().is_empty()
    {
        cfg.spotify.access_token = Some(token);
    }
}

fn make_provider(cfg: &ProviderConfig) -> anyhow::Result<Arc<dyn LyricsProvider>> {
    let provider: Arc<dyn LyricsProvider> = match cfg.kind {
        ProviderKind::Genius => {
            let token = cfg
                .genius_token
                .as_deref()
                .context("no Genius token (set GENIUS_TOKEN or provider.genius_token)")?;
            Arc::new(GeniusClient::new(token, cfg.timeout(), cfg.excluded_terms.clone())?)
        }
        ProviderKind::Lrclib => Arc::new(LrclibClient::new(cfg.timeout())?),
    };
    Ok(provider)
}

fn make_fetcher(cfg: &Config) -> anyhow::Result<LyricsFetcher> {
    let provider = make_provider(&cfg.provider)?;
    let cache = SqliteLyricsCache::open(&cfg.cache_path()).context("open lyrics cache")?;
    tracing::debug!(provider = provider.name(), cache = %cfg.cache_path().display(), "lyrics fetcher ready");
    Ok(LyricsFetcher::new(provider, Arc::new(cache), cfg.provider.fetch_policy()))
}

fn write_outputs(dir: &Path, report: &WordCloudReport, extension: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("create dir {}", dir.display()))?;

    let songs = dir.join("top_songs.txt");
    std::fs::write(&songs, report.top_songs_list())
        .with_context(|| format!("write {}", songs.display()))?;

    let json = dir.join("report.json");
    std::fs::write(&json, serde_json::to_string_pretty(report)?)
        .with_context(|| format!("write {}", json.display()))?;

    if let Some(image) = &report.image {
        let path = dir.join(format!("wordcloud.{extension}"));
        std::fs::write(&path, image).with_context(|| format!("write {}", path.display()))?;
    }
    tracing::info!(dir = %dir.display(), "wrote outputs");
    Ok(())
}
