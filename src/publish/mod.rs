//! Where rendered images end up.

use anyhow::Context;
use sha1::{Digest, Sha1};
use std::path::{Component, Path, PathBuf};

/// Accepts image bytes under a path-like identifier and returns a URL.
pub trait ImagePublisher: Send + Sync {
    fn publish(&self, path: &str, bytes: &[u8], content_type: &str) -> anyhow::Result<String>;
}

/// Content-addressed identifier: `wordcloud/<user>/<time_range>/<sha1>.<ext>`.
pub fn image_path(user: &str, time_range: &str, bytes: &[u8], extension: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let digest = hex::encode(hasher.finalize());
    format!(
        "wordcloud/{}/{}/{}.{}",
        sanitize_segment(user),
        sanitize_segment(time_range),
        digest,
        extension
    )
}

fn sanitize_segment(s: &str) -> String {
    let cleaned: String = s
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "_".to_string() } else { cleaned }
}

/// Writes images below a root directory and hands back `file://` URLs.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> anyhow::Result<PathBuf> {
        let rel = Path::new(path);
        anyhow::ensure!(
            rel.components().all(|c| matches!(c, Component::Normal(_))),
            "image path {path:?} must be relative and must not leave the store"
        );
        Ok(self.root.join(rel))
    }
}

impl ImagePublisher for LocalImageStore {
    fn publish(&self, path: &str, bytes: &[u8], content_type: &str) -> anyhow::Result<String> {
        let dest = self.resolve(path)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        std::fs::write(&dest, bytes).with_context(|| format!("write {}", dest.display()))?;

        let absolute = dest.canonicalize().unwrap_or(dest);
        tracing::info!(path = %absolute.display(), content_type, bytes = bytes.len(), "published image");
        Ok(format!("file://{}", absolute.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_path_is_content_addressed() {
        let a = image_path("user 1", "medium_term", b"<svg/>", "svg");
        let b = image_path("user 1", "medium_term", b"<svg/>", "svg");
        let c = image_path("user 1", "medium_term", b"<svg></svg>", "svg");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("wordcloud/user_1/medium_term/"));
        assert!(a.ends_with(".svg"));
        // sha1 hex digest
        let stem = a.rsplit('/').next().unwrap().trim_end_matches(".svg");
        assert_eq!(stem.len(), 40);
    }

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("../etc"), "___etc");
        assert_eq!(sanitize_segment("  "), "_");
    }

    #[test]
    fn test_local_store_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path());

        let url = store
            .publish("wordcloud/me/short_term/abc.svg", b"<svg/>", "image/svg+xml")
            .unwrap();

        assert!(url.starts_with("file://"));
        assert!(url.ends_with("abc.svg"));
        let written = std::fs::read(dir.path().join("wordcloud/me/short_term/abc.svg")).unwrap();
        assert_eq!(written, b"<svg/>");
    }

    #[test]
    fn test_local_store_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path());

        assert!(store.publish("../outside.svg", b"x", "image/svg+xml").is_err());
        assert!(store.publish("/abs/outside.svg", b"x", "image/svg+xml").is_err());
    }
}
