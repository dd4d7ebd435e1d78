/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Provider defaults
pub const DEFAULT_REQUEST_TIMEOUT: &str = "30s";
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;
pub const DEFAULT_USER_AGENT: &str = concat!("strm-sync/", env!("CARGO_PKG_VERSION"));

// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/strm-sync.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_CONNECT_TIMEOUT: &str = "30s";

// Library output defaults
pub const DEFAULT_MOVIES_PATH: &str = "./library/movies";
pub const DEFAULT_SERIES_PATH: &str = "./library/series";
pub const DEFAULT_LIVE_PATH: &str = "./library/live";
pub const DEFAULT_WRITE_NFO: bool = true;
pub const DEFAULT_PLAYLIST_FILENAME: &str = "playlist.m3u8";
pub const DEFAULT_EPG_FILENAME: &str = "epg.xml";

// Reconciliation defaults
pub const DEFAULT_NEW_CATEGORY_VISIBLE: bool = false;
pub const DEFAULT_INHERIT_CATEGORY_VISIBILITY: bool = true;
pub const DEFAULT_GRACE_RUNS: u32 = 1;
pub const DEFAULT_ENRICH_MOVIE_METADATA: bool = true;

// Sync defaults
pub const DEFAULT_PARALLEL_DOMAINS: bool = false;

// EPG defaults
pub const DEFAULT_EPG_ENABLED: bool = true;
pub const DEFAULT_DAYS_AHEAD: u32 = 7;
pub const DEFAULT_DAYS_BEHIND: u32 = 1;

// Environment
pub const ENV_PREFIX: &str = "STRM_SYNC_";
