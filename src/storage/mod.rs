use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Case-insensitive (artist, title) cache key.
///
/// Both parts are trimmed and lowercased. Every read and write goes through
/// this type so differently-cased callers land on the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    artist: String,
    title: String,
}

impl CacheKey {
    pub fn new(artist: &str, title: &str) -> Self {
        Self {
            artist: artist.trim().to_lowercase(),
            title: title.trim().to_lowercase(),
        }
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

/// Persistent lyrics store shared by every fetch worker in a batch.
pub trait LyricsCache: Send + Sync {
    fn lookup(&self, artist: &str, title: &str) -> anyhow::Result<Option<String>>;

    /// Upsert. Storing the same key again overwrites the entry.
    fn store(&self, artist: &str, title: &str, lyrics: &str) -> anyhow::Result<()>;
}

pub struct SqliteLyricsCache {
    conn: Mutex<Connection>,
}

impl SqliteLyricsCache {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }

        let conn = Connection::open(path).with_context(|| format!("open {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory cache")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS lyrics_cache (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  artist TEXT NOT NULL,
  title TEXT NOT NULL,
  lyrics TEXT,
  last_updated INTEGER NOT NULL,
  UNIQUE(artist, title)
);
"#,
        )
        .context("init schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("lyrics cache connection poisoned"))
    }

    /// Number of cached entries.
    pub fn len(&self) -> anyhow::Result<usize> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM lyrics_cache", [], |row| row.get(0))
            .context("count lyrics cache")?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    pub fn is_empty(&self) -> anyhow::Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl LyricsCache for SqliteLyricsCache {
    fn lookup(&self, artist: &str, title: &str) -> anyhow::Result<Option<String>> {
        let key = CacheKey::new(artist, title);
        let conn = self.conn()?;
        let lyrics: Option<Option<String>> = conn
            .query_row(
                "SELECT lyrics FROM lyrics_cache WHERE artist=?1 AND title=?2",
                params![key.artist(), key.title()],
                |row| row.get(0),
            )
            .optional()
            .context("query lyrics cache")?;
        Ok(lyrics.flatten())
    }

    fn store(&self, artist: &str, title: &str, lyrics: &str) -> anyhow::Result<()> {
        let key = CacheKey::new(artist, title);
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        self.conn()?
            .execute(
                r#"
INSERT INTO lyrics_cache(artist, title, lyrics, last_updated)
VALUES(?1, ?2, ?3, ?4)
ON CONFLICT(artist, title) DO UPDATE SET
  lyrics=excluded.lyrics,
  last_updated=excluded.last_updated
"#,
                params![key.artist(), key.title(), lyrics, now],
            )
            .context("cache lyrics")?;
        Ok(())
    }
}

/// Process-local cache, used when no database is configured.
#[derive(Default)]
pub struct MemoryLyricsCache {
    entries: Mutex<HashMap<CacheKey, String>>,
}

impl MemoryLyricsCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LyricsCache for MemoryLyricsCache {
    fn lookup(&self, artist: &str, title: &str) -> anyhow::Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory cache poisoned"))?;
        Ok(entries.get(&CacheKey::new(artist, title)).cloned())
    }

    fn store(&self, artist: &str, title: &str, lyrics: &str) -> anyhow::Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory cache poisoned"))?
            .insert(CacheKey::new(artist, title), lyrics.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_case_insensitive(cache: &dyn LyricsCache) {
        cache.store("Radiohead", "Creep", "I'm a creep").unwrap();

        assert_eq!(
            cache.lookup("radiohead", "CREEP").unwrap().as_deref(),
            Some("I'm a creep")
        );
        assert_eq!(
            cache.lookup("  RADIOHEAD ", " creep").unwrap().as_deref(),
            Some("I'm a creep")
        );
        assert!(cache.lookup("Radiohead", "Karma Police").unwrap().is_none());
    }

    #[test]
    fn test_key_normalization() {
        assert_eq!(CacheKey::new(" ABBA ", "Waterloo"), CacheKey::new("abba", "WATERLOO  "));
        assert_ne!(CacheKey::new("abba", "waterloo"), CacheKey::new("waterloo", "abba"));
    }

    #[test]
    fn test_sqlite_case_insensitive() {
        let cache = SqliteLyricsCache::open_in_memory().unwrap();
        check_case_insensitive(&cache);
    }

    #[test]
    fn test_memory_case_insensitive() {
        check_case_insensitive(&MemoryLyricsCache::new());
    }

    #[test]
    fn test_sqlite_upsert_single_entry() {
        let cache = SqliteLyricsCache::open_in_memory().unwrap();
        cache.store("Artist", "Song", "first").unwrap();
        cache.store("ARTIST", "song", "second").unwrap();

        assert_eq!(cache.len().unwrap(), 1);
        assert_eq!(cache.lookup("artist", "song").unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lyrics.sqlite3");

        SqliteLyricsCache::open(&path)
            .unwrap()
            .store("Artist", "Song", "words")
            .unwrap();

        let reopened = SqliteLyricsCache::open(&path).unwrap();
        assert_eq!(reopened.lookup("artist", "song").unwrap().as_deref(), Some("words"));
    }
}
