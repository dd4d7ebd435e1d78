use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use crate::errors::{AppError, AppResult};
use crate::models::ContentDomain;
use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub database: DatabaseConfig,
    pub library: LibraryConfig,
    pub reconciliation: ReconciliationConfig,
    pub sync: SyncConfig,
    pub epg: EpgConfig,
}

/// Provider server and credentials. Credentials are opaque to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Port appended to `base_url` when it carries none
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    #[serde(with = "duration_serde::duration")]
    pub request_timeout: Duration,
    /// Upper bound on concurrent provider requests within one domain
    pub fetch_concurrency: usize,
    pub user_agent: String,
    /// Extension for live stream URLs, e.g. "ts" or "m3u8"; none keeps the bare id
    pub live_extension: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(with = "duration_serde::duration")]
    pub connect_timeout: Duration,
}

/// Output roots, one per domain. Roots never overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub movies_path: PathBuf,
    pub series_path: PathBuf,
    pub live_path: PathBuf,
    pub write_nfo: bool,
    pub playlist_filename: String,
    pub epg_filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Visibility given to categories seen for the first time
    pub new_category_visible: bool,
    /// New items take their category's visibility; otherwise they start hidden
    pub inherit_category_visibility: bool,
    /// Number of consecutive missed runs an item survives before it is purged
    pub grace_runs: u32,
    /// Fetch the detail endpoint for new or changed movies
    pub enrich_movie_metadata: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub parallel_domains: bool,
    pub domains: Vec<ContentDomain>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EpgConfig {
    pub enabled: bool,
    pub days_behind: u32,
    pub days_ahead: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            port: None,
            username: String::new(),
            password: String::new(),
            request_timeout: duration_serde::parse_default(DEFAULT_REQUEST_TIMEOUT),
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            live_extension: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: duration_serde::parse_default(DEFAULT_CONNECT_TIMEOUT),
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            movies_path: PathBuf::from(DEFAULT_MOVIES_PATH),
            series_path: PathBuf::from(DEFAULT_SERIES_PATH),
            live_path: PathBuf::from(DEFAULT_LIVE_PATH),
            write_nfo: DEFAULT_WRITE_NFO,
            playlist_filename: DEFAULT_PLAYLIST_FILENAME.to_string(),
            epg_filename: DEFAULT_EPG_FILENAME.to_string(),
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            new_category_visible: DEFAULT_NEW_CATEGORY_VISIBLE,
            inherit_category_visibility: DEFAULT_INHERIT_CATEGORY_VISIBILITY,
            grace_runs: DEFAULT_GRACE_RUNS,
            enrich_movie_metadata: DEFAULT_ENRICH_MOVIE_METADATA,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            parallel_domains: DEFAULT_PARALLEL_DOMAINS,
            domains: ContentDomain::ALL.to_vec(),
        }
    }
}

impl Default for EpgConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_EPG_ENABLED,
            days_behind: DEFAULT_DAYS_BEHIND,
            days_ahead: DEFAULT_DAYS_AHEAD,
        }
    }
}

impl LibraryConfig {
    /// Output root owned by a domain.
    pub fn root_for(&self, domain: ContentDomain) -> &Path {
        match domain {
            ContentDomain::Movie => &self.movies_path,
            ContentDomain::Series => &self.series_path,
            ContentDomain::Live => &self.live_path,
        }
    }
}

impl Config {
    pub fn load() -> AppResult<Self> {
        let config_file =
            std::env::var("STRM_SYNC_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    /// Load defaults, then the TOML file, then `STRM_SYNC_*` environment overrides.
    ///
    /// A missing file is created from the defaults.
    pub fn load_from_file(config_file: &str) -> AppResult<Self> {
        if !Path::new(config_file).exists() {
            let contents = toml::to_string_pretty(&Self::default())
                .map_err(|e| AppError::configuration(e.to_string()))?;
            std::fs::write(config_file, contents).map_err(|e| {
                AppError::configuration(format!("Cannot write {config_file}: {e}"))
            })?;
            info!("Created default config file: {}", config_file);
        }

        Self::extract(
            Self::base_figment()
                .merge(Toml::file(config_file))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Load from an in-memory TOML document on top of the defaults.
    pub fn from_toml_str(contents: &str) -> AppResult<Self> {
        Self::extract(Self::base_figment().merge(Toml::string(contents)))
    }

    fn base_figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
    }

    fn extract(figment: Figment) -> AppResult<Self> {
        let config: Config = figment
            .extract()
            .map_err(|e| AppError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.provider.fetch_concurrency == 0 {
            return Err(AppError::configuration(
                "provider.fetch_concurrency must be at least 1",
            ));
        }

        let roots = [
            ("library.movies_path", &self.library.movies_path),
            ("library.series_path", &self.library.series_path),
            ("library.live_path", &self.library.live_path),
        ];
        for (i, (name_a, a)) in roots.iter().enumerate() {
            for (name_b, b) in roots.iter().skip(i + 1) {
                if a.starts_with(b) || b.starts_with(a) {
                    return Err(AppError::configuration(format!(
                        "{name_a} and {name_b} overlap ({} / {})",
                        a.display(),
                        b.display()
                    )));
                }
            }
        }

        for filename in [&self.library.playlist_filename, &self.library.epg_filename] {
            if filename.is_empty() || filename.contains('/') || filename.contains('\\') {
                return Err(AppError::configuration(format!(
                    "Invalid live output filename '{filename}'"
                )));
            }
        }

        Ok(())
    }

    /// Validation that only applies when talking to the provider.
    pub fn validate_provider(&self) -> AppResult<()> {
        if self.provider.base_url.trim().is_empty() {
            return Err(AppError::configuration("provider.base_url is required"));
        }
        Ok(())
    }
}
