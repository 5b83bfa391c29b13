use super::Config;

pub const TOP_TRACKS_LIMIT: u32 = 50;

/// Versions of a song whose words rarely match the studio recording.
pub fn excluded_terms() -> Vec<String> {
    ["Remix", "Live", "Demo", "Instrumental"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Config written on first run.
pub fn defaults() -> Config {
    Config::default()
}
