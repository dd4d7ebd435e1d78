//! Content hashing for change detection
//!
//! A content hash covers the mutable fields of a record. Identity fields are never part of
//! it, so a changed hash always means "same item, new content".

use std::fmt::Display;

use sha2::{Digest, Sha256};

use crate::models::{
    MediaMetadata, RemoteEpisode, RemoteLiveChannel, RemoteMovie, RemoteSeries,
};

/// Incremental SHA-256 over named fields.
///
/// Each field is framed as `name=value` followed by a unit separator, and absent optional
/// fields are framed distinctly from empty strings.
pub struct ContentHasher {
    digest: Sha256,
}

impl ContentHasher {
    pub fn new(kind: &str) -> Self {
        let mut digest = Sha256::new();
        digest.update(kind.as_bytes());
        digest.update([0x1e]);
        Self { digest }
    }

    pub fn field<T: Display>(mut self, name: &str, value: T) -> Self {
        self.digest.update(name.as_bytes());
        self.digest.update(b"=");
        self.digest.update(value.to_string().as_bytes());
        self.digest.update([0x1f]);
        self
    }

    pub fn optional<T: Display>(mut self, name: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.field(name, value),
            None => {
                self.digest.update(name.as_bytes());
                self.digest.update([0x00, 0x1f]);
                self
            }
        }
    }

    fn metadata(self, metadata: &MediaMetadata) -> Self {
        self.optional("plot", metadata.plot.as_deref())
            .optional("genre", metadata.genre.as_deref())
            .optional("director", metadata.director.as_deref())
            .optional("cast", metadata.cast.as_deref())
            .optional("rating", metadata.rating)
            .optional("release_date", metadata.release_date.as_deref())
            .optional("duration_secs", metadata.duration_secs)
            .optional("tmdb_id", metadata.tmdb_id.as_deref())
            .optional("original_title", metadata.original_title.as_deref())
            .optional("poster_url", metadata.poster_url.as_deref())
            .optional("backdrop_url", metadata.backdrop_url.as_deref())
    }

    pub fn finish(self) -> String {
        hex::encode(self.digest.finalize())
    }
}

pub fn movie_hash(movie: &RemoteMovie) -> String {
    ContentHasher::new("movie")
        .field("title", &movie.title)
        .optional("year", movie.year)
        .field("stream_url", &movie.stream_url)
        .metadata(&movie.metadata)
        .finish()
}

pub fn series_hash(series: &RemoteSeries) -> String {
    ContentHasher::new("series")
        .field("title", &series.title)
        .optional("year", series.year)
        .optional("last_modified", series.last_modified.as_deref())
        .metadata(&series.metadata)
        .finish()
}

pub fn episode_hash(episode: &RemoteEpisode) -> String {
    ContentHasher::new("episode")
        .field("season", episode.season)
        .field("episode_number", episode.episode_number)
        .optional("title", episode.title.as_deref())
        .field("stream_url", &episode.stream_url)
        .optional("plot", episode.plot.as_deref())
        .optional("air_date", episode.air_date.as_deref())
        .optional("duration_secs", episode.duration_secs)
        .optional("rating", episode.rating)
        .optional("thumbnail_url", episode.thumbnail_url.as_deref())
        .finish()
}

pub fn live_channel_hash(channel: &RemoteLiveChannel) -> String {
    ContentHasher::new("live_channel")
        .field("name", &channel.name)
        .field("stream_url", &channel.stream_url)
        .optional("epg_channel_id", channel.epg_channel_id.as_deref())
        .optional("logo_url", channel.logo_url.as_deref())
        .field("tv_archive", channel.tv_archive)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie() -> RemoteMovie {
        RemoteMovie {
            remote_id: "101".to_string(),
            title: "Heat".to_string(),
            year: Some(1995),
            stream_url: "http://p/movie/u/p/101.mkv".to_string(),
            metadata: MediaMetadata::default(),
        }
    }

    #[test]
    fn test_hash_is_stable_and_hex() {
        let a = movie_hash(&movie());
        assert_eq!(a, movie_hash(&movie()));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_ignores_remote_id() {
        let mut other = movie();
        other.remote_id = "999".to_string();
        assert_eq!(movie_hash(&movie()), movie_hash(&other));
    }

    #[test]
    fn test_hash_tracks_mutable_fields() {
        let base = movie_hash(&movie());

        let mut changed_url = movie();
        changed_url.stream_url.push('x');
        assert_ne!(base, movie_hash(&changed_url));

        let mut changed_plot = movie();
        changed_plot.metadata.plot = Some(String::new());
        assert_ne!(base, movie_hash(&changed_plot), "empty differs from absent");
    }

    #[test]
    fn test_field_framing_avoids_concatenation_collisions() {
        let a = ContentHasher::new("t").field("a", "bc").field("d", "").finish();
        let b = ContentHasher::new("t").field("a", "b").field("d", "c").finish();
        assert_ne!(a, b);
    }
}
