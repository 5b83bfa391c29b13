use crate::lyrics::FetchPolicy;
use crate::render::RenderConfig;
use crate::tracks::TimeRange;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub mod defaults;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub provider: ProviderConfig,
    pub spotify: SpotifyConfig,
    pub batch: BatchConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Genius,
    Lrclib,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "genius" => Ok(Self::Genius),
            "lrclib" => Ok(Self::Lrclib),
            other => anyhow::bail!("unknown lyrics provider {other:?} (expected genius or lrclib)"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Genius API access token. `GENIUS_TOKEN` overrides it.
    pub genius_token: Option<String>,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Extra attempts after a provider error or timeout.
    pub retries: u32,
    /// Minimum spacing between provider requests.
    pub pacing_ms: u64,
    /// Title terms that disqualify a search hit unless asked for.
    pub excluded_terms: Vec<String>,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            timeout: self.timeout(),
            retries: self.retries,
            pacing: Duration::from_millis(self.pacing_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    /// Already-issued Web API token. `SPOTIFY_ACCESS_TOKEN` overrides it.
    pub access_token: Option<String>,
    pub limit: u32,
    pub time_range: TimeRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_concurrency: usize,
}

impl Config {
    pub fn cache_path(&self) -> PathBuf {
        self.paths.data_dir.join("lyrics.sqlite3")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.paths.data_dir.join("images")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let proj = ProjectDirs::from("dev", "lyricloud", "lyricloud");
        let data_dir = proj
            .as_ref()
            .map(|p| p.data_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("lyricloud"));
        Self { data_dir }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        let policy = FetchPolicy::default();
        Self {
            kind: ProviderKind::default(),
            genius_token: None,
            timeout_secs: policy.timeout.as_secs(),
            retries: policy.retries,
            pacing_ms: policy.pacing.as_millis() as u64,
            excluded_terms: defaults::excluded_terms(),
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            limit: defaults::TOP_TRACKS_LIMIT,
            time_range: TimeRange::default(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: crate::batch::DEFAULT_MAX_CONCURRENCY,
        }
    }
}

pub fn save(cfg: &Config, override_path: Option<&Path>) -> anyhow::Result<()> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    write_config(cfg, &path).context("serialize config")
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let proj = ProjectDirs::from("dev", "lyricloud", "lyricloud").context("ProjectDirs unavailable")?;
    Ok(proj.config_dir().join("config.toml"))
}

pub fn load(override_path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if !path.exists() {
        let cfg = defaults::defaults();
        write_config(&cfg, &path).context("serialize default config")?;
        tracing::info!(path = %path.display(), "wrote default config");
        return Ok(cfg);
    }

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cfg = toml::from_str::<Config>(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

/// Config may hold API tokens, so it is written owner-only.
fn write_config(cfg: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    let raw = toml::to_string_pretty(cfg)?;
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(())
}
