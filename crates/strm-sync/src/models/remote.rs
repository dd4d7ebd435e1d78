//! Typed records produced by the provider client.
//!
//! Providers return loosely typed JSON; everything is parsed into these variants at the
//! client boundary so downstream code never sees raw values.

use serde::{Deserialize, Serialize};

use super::{EpgEntry, MediaMetadata};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCategory {
    pub remote_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMovie {
    pub remote_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub stream_url: String,
    pub metadata: MediaMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSeries {
    pub remote_id: String,
    pub title: String,
    pub year: Option<i32>,
    /// Provider change marker; changes when episodes are added
    pub last_modified: Option<String>,
    pub metadata: MediaMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEpisode {
    pub remote_id: String,
    pub season: i32,
    pub episode_number: i32,
    pub title: Option<String>,
    pub stream_url: String,
    pub plot: Option<String>,
    pub air_date: Option<String>,
    pub duration_secs: Option<i64>,
    pub rating: Option<f64>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteLiveChannel {
    pub remote_id: String,
    pub name: String,
    pub stream_url: String,
    pub epg_channel_id: Option<String>,
    pub logo_url: Option<String>,
    pub tv_archive: bool,
}

/// Closed set of records a provider can yield.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteRecord {
    Movie(RemoteMovie),
    Series(RemoteSeries),
    Episode(RemoteEpisode),
    LiveChannel(RemoteLiveChannel),
    EpgEntry(EpgEntry),
}

impl RemoteRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteRecord::Movie(_) => "movie",
            RemoteRecord::Series(_) => "series",
            RemoteRecord::Episode(_) => "episode",
            RemoteRecord::LiveChannel(_) => "live_channel",
            RemoteRecord::EpgEntry(_) => "epg_entry",
        }
    }
}

macro_rules! record_variant {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for RemoteRecord {
            fn from(value: $ty) -> Self {
                RemoteRecord::$variant(value)
            }
        }

        impl TryFrom<RemoteRecord> for $ty {
            type Error = RemoteRecord;

            fn try_from(record: RemoteRecord) -> Result<Self, Self::Error> {
                match record {
                    RemoteRecord::$variant(value) => Ok(value),
                    other => Err(other),
                }
            }
        }
    };
}

record_variant!(Movie, RemoteMovie);
record_variant!(Series, RemoteSeries);
record_variant!(Episode, RemoteEpisode);
record_variant!(LiveChannel, RemoteLiveChannel);
record_variant!(EpgEntry, EpgEntry);
