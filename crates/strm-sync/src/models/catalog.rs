//! Cached catalog entities as seen by the rest of the engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ContentDomain;

/// Descriptive metadata shared by movies and series, used for NFO files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub plot: Option<String>,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub cast: Option<String>,
    pub rating: Option<f64>,
    pub release_date: Option<String>,
    pub duration_secs: Option<i64>,
    pub tmdb_id: Option<String>,
    pub original_title: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
}

impl MediaMetadata {
    /// Fill fields that are empty here from `other`.
    pub fn merge_missing(&mut self, other: MediaMetadata) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.plot, other.plot);
        fill(&mut self.genre, other.genre);
        fill(&mut self.director, other.director);
        fill(&mut self.cast, other.cast);
        fill(&mut self.rating, other.rating);
        fill(&mut self.release_date, other.release_date);
        fill(&mut self.duration_secs, other.duration_secs);
        fill(&mut self.tmdb_id, other.tmdb_id);
        fill(&mut self.original_title, other.original_title);
        fill(&mut self.poster_url, other.poster_url);
        fill(&mut self.backdrop_url, other.backdrop_url);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i32,
    pub domain: ContentDomain,
    pub remote_id: String,
    pub name: String,
    pub visible: bool,
    pub missing_runs: i32,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: i32,
    pub category_id: i32,
    pub remote_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub stream_url: String,
    pub content_hash: String,
    pub visible: bool,
    pub missing_runs: i32,
    pub last_seen_at: DateTime<Utc>,
    pub metadata: MediaMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: i32,
    pub category_id: i32,
    pub remote_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub content_hash: String,
    pub episodes_hash: Option<String>,
    pub visible: bool,
    pub missing_runs: i32,
    pub last_seen_at: DateTime<Utc>,
    pub metadata: MediaMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: i32,
    pub series_id: i32,
    pub remote_id: String,
    pub season: i32,
    pub episode_number: i32,
    pub title: Option<String>,
    pub stream_url: String,
    pub content_hash: String,
    pub missing_runs: i32,
    pub last_seen_at: DateTime<Utc>,
    pub plot: Option<String>,
    pub air_date: Option<String>,
    pub duration_secs: Option<i64>,
    pub rating: Option<f64>,
    pub thumbnail_url: Option<String>,
}

/// A visible series together with its episodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesWithEpisodes {
    pub series: Series,
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveChannel {
    pub id: i32,
    pub category_id: i32,
    pub remote_id: String,
    pub name: String,
    pub stream_url: String,
    pub epg_channel_id: Option<String>,
    pub logo_url: Option<String>,
    pub tv_archive: bool,
    pub content_hash: String,
    pub visible: bool,
    pub missing_runs: i32,
    pub last_seen_at: DateTime<Utc>,
}

/// A visible channel with the name of its category, for playlist grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleChannel {
    pub channel: LiveChannel,
    pub category_name: String,
}

/// One programme of the guide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpgEntry {
    pub channel_remote_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub lang: Option<String>,
}

/// Snapshot of the visible subset of one domain, read after commit.
#[derive(Debug, Clone, PartialEq)]
pub enum VisibleCatalog {
    Movies(Vec<Movie>),
    Series(Vec<SeriesWithEpisodes>),
    Live {
        channels: Vec<VisibleChannel>,
        epg: Vec<EpgEntry>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainStatistics {
    pub categories: u64,
    pub visible_categories: u64,
    pub total: u64,
    pub visible: u64,
    /// Only populated for the series domain
    pub episodes: Option<u64>,
    pub visible_episodes: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogStatistics {
    pub domains: BTreeMap<ContentDomain, DomainStatistics>,
    pub epg_entries: u64,
}
