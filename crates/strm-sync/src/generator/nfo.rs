//! Kodi-style NFO documents.
//!
//! Output depends only on the cached row, so regenerating an unchanged item yields the
//! same bytes and the tree diff leaves the file alone.

use quick_xml::escape::escape;

use crate::models::{Episode, MediaMetadata, Movie, Series};
use crate::utils::text::release_year;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const INDENT: &str = "    ";

/// Minimal indented element writer.
struct NfoWriter {
    out: String,
    depth: usize,
}

impl NfoWriter {
    fn new(root: &str) -> Self {
        let mut out = String::with_capacity(1024);
        out.push_str(XML_DECLARATION);
        out.push('\n');
        out.push_str(&format!("<{root}>\n"));
        Self { out, depth: 1 }
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    fn attributes(attrs: &[(&str, &str)]) -> String {
        attrs
            .iter()
            .map(|(name, value)| format!(" {name}=\"{}\"", escape(*value)))
            .collect()
    }

    /// Element with text content; skipped when the value is blank.
    fn text<V: AsRef<str>>(&mut self, tag: &str, value: Option<V>) -> &mut Self {
        self.text_with(tag, &[], value)
    }

    fn text_with<V: AsRef<str>>(
        &mut self,
        tag: &str,
        attrs: &[(&str, &str)],
        value: Option<V>,
    ) -> &mut Self {
        let Some(value) = value else {
            return self;
        };
        let value = value.as_ref().trim();
        if value.is_empty() {
            return self;
        }
        self.indent();
        self.out.push_str(&format!(
            "<{tag}{}>{}</{tag}>\n",
            Self::attributes(attrs),
            escape(value)
        ));
        self
    }

    /// One element per comma separated value.
    fn list(&mut self, tag: &str, values: Option<&str>) -> &mut Self {
        for value in split_list(values) {
            self.text(tag, Some(value));
        }
        self
    }

    fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) -> &mut Self {
        self.indent();
        self.out
            .push_str(&format!("<{tag}{}>\n", Self::attributes(attrs)));
        self.depth += 1;
        self
    }

    fn close(&mut self, tag: &str) -> &mut Self {
        self.depth = self.depth.saturating_sub(1);
        self.indent();
        self.out.push_str(&format!("</{tag}>\n"));
        self
    }

    fn finish(mut self, root: &str) -> String {
        self.out.push_str(&format!("</{root}>\n"));
        self.out
    }
}

fn split_list(values: Option<&str>) -> impl Iterator<Item = &str> {
    values
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn minutes(duration_secs: Option<i64>) -> Option<String> {
    duration_secs
        .filter(|secs| *secs > 0)
        .map(|secs| (secs / 60).to_string())
}

/// Shared body of movie and show documents.
fn write_metadata(w: &mut NfoWriter, metadata: &MediaMetadata, year: Option<i32>) {
    w.text("plot", metadata.plot.as_deref())
        .text("outline", metadata.plot.as_deref())
        .text("runtime", minutes(metadata.duration_secs).as_deref())
        .text("premiered", metadata.release_date.as_deref())
        .text("year", year.map(|y| y.to_string()).as_deref());

    if let Some(rating) = metadata.rating {
        w.open("ratings", &[])
            .open(
                "rating",
                &[("name", "generic"), ("max", "10"), ("default", "true")],
            )
            .text("value", Some(&format!("{rating:.6}")))
            .close("rating")
            .close("ratings");
    }

    if let Some(tmdb_id) = metadata.tmdb_id.as_deref() {
        w.text_with(
            "uniqueid",
            &[("type", "tmdb"), ("default", "true")],
            Some(tmdb_id),
        );
    }

    w.list("genre", metadata.genre.as_deref())
        .list("director", metadata.director.as_deref());

    for actor in split_list(metadata.cast.as_deref()) {
        w.open("actor", &[]).text("name", Some(actor)).close("actor");
    }

    w.text_with(
        "thumb",
        &[("aspect", "poster")],
        metadata.poster_url.as_deref(),
    );
    if let Some(backdrop) = metadata.backdrop_url.as_deref().filter(|b| !b.is_empty()) {
        w.open("fanart", &[])
            .text("thumb", Some(backdrop))
            .close("fanart");
    }
}

pub fn movie_nfo(movie: &Movie) -> String {
    let mut w = NfoWriter::new("movie");
    let original = movie
        .metadata
        .original_title
        .as_deref()
        .unwrap_or(&movie.title);
    w.text("title", Some(&movie.title))
        .text("originaltitle", Some(original));
    let year = movie
        .year
        .or_else(|| release_year(movie.metadata.release_date.as_deref(), &movie.title));
    write_metadata(&mut w, &movie.metadata, year);
    w.finish("movie")
}

pub fn tvshow_nfo(series: &Series) -> String {
    let mut w = NfoWriter::new("tvshow");
    w.text("title", Some(&series.title))
        .text("showtitle", Some(&series.title))
        .text("originaltitle", series.metadata.original_title.as_deref());
    let year = series
        .year
        .or_else(|| release_year(series.metadata.release_date.as_deref(), &series.title));
    write_metadata(&mut w, &series.metadata, year);
    w.finish("tvshow")
}

pub fn episode_nfo(episode: &Episode, show_title: &str) -> String {
    let mut w = NfoWriter::new("episodedetails");
    let title = episode
        .title
        .clone()
        .unwrap_or_else(|| format!("Episode {}", episode.episode_number));
    w.text("title", Some(&title))
        .text("showtitle", Some(show_title))
        .text("season", Some(&episode.season.to_string()))
        .text("episode", Some(&episode.episode_number.to_string()))
        .text("plot", episode.plot.as_deref())
        .text("runtime", minutes(episode.duration_secs).as_deref())
        .text("aired", episode.air_date.as_deref());

    if let Some(rating) = episode.rating {
        w.open("ratings", &[])
            .open(
                "rating",
                &[("name", "generic"), ("max", "10"), ("default", "true")],
            )
            .text("value", Some(&format!("{rating:.6}")))
            .close("rating")
            .close("ratings");
    }
    w.text("thumb", episode.thumbnail_url.as_deref());
    w.finish("episodedetails")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn movie() -> Movie {
        Movie {
            id: 1,
            category_id: 1,
            remote_id: "101".to_string(),
            title: "Heat & Dust".to_string(),
            year: Some(1995),
            stream_url: "http://p/movie/u/p/101.mkv".to_string(),
            content_hash: "abc".to_string(),
            visible: true,
            missing_runs: 0,
            last_seen_at: Utc::now(),
            metadata: MediaMetadata {
                plot: Some("A <heist>.".to_string()),
                genre: Some("Crime, Drama,".to_string()),
                cast: Some("Al Pacino, Robert De Niro".to_string()),
                rating: Some(8.3),
                duration_secs: Some(10_200),
                tmdb_id: Some("949".to_string()),
                backdrop_url: Some("http://img/backdrop.jpg".to_string()),
                ..MediaMetadata::default()
            },
        }
    }

    #[test]
    fn test_movie_nfo_layout() {
        let nfo = movie_nfo(&movie());
        let expected = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<movie>
    <title>Heat &amp; Dust</title>
    <originaltitle>Heat &amp; Dust</originaltitle>
    <plot>A &lt;heist&gt;.</plot>
    <outline>A &lt;heist&gt;.</outline>
    <runtime>170</runtime>
    <year>1995</year>
    <ratings>
        <rating name="generic" max="10" default="true">
            <value>8.300000</value>
        </rating>
    </ratings>
    <uniqueid type="tmdb" default="true">949</uniqueid>
    <genre>Crime</genre>
    <genre>Drama</genre>
    <actor>
        <name>Al Pacino</name>
    </actor>
    <actor>
        <name>Robert De Niro</name>
    </actor>
    <fanart>
        <thumb>http://img/backdrop.jpg</thumb>
    </fanart>
</movie>
"#;
        assert_eq!(nfo, expected);
    }

    #[test]
    fn test_nfo_is_deterministic() {
        let mut later = movie();
        later.last_seen_at = Utc::now() + chrono::Duration::days(3);
        assert_eq!(movie_nfo(&movie()), movie_nfo(&later));
    }

    #[test]
    fn test_episode_nfo_defaults_title() {
        let episode = Episode {
            id: 1,
            series_id: 1,
            remote_id: "9001".to_string(),
            season: 2,
            episode_number: 5,
            title: None,
            stream_url: "http://p/series/u/p/9001.mkv".to_string(),
            content_hash: "h".to_string(),
            missing_runs: 0,
            last_seen_at: Utc::now(),
            plot: None,
            air_date: Some("2020-02-02".to_string()),
            duration_secs: None,
            rating: None,
            thumbnail_url: None,
        };
        let nfo = episode_nfo(&episode, "Show");
        assert!(nfo.starts_with(XML_DECLARATION));
        assert!(nfo.contains("<title>Episode 5</title>"));
        assert!(nfo.contains("<showtitle>Show</showtitle>"));
        assert!(nfo.contains("<season>2</season>"));
        assert!(nfo.contains("<aired>2020-02-02</aired>"));
        assert!(!nfo.contains("<ratings>"));
        assert!(nfo.ends_with("</episodedetails>\n"));
    }
}
