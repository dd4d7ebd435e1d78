//! Xtream Codes provider
//!
//! Talks to `player_api.php` for catalog listings and details and to `xmltv.php` for the
//! guide. Responses are decoded leniently element by element: a malformed element is
//! logged and skipped, while a malformed response shape fails the request.

use async_stream::try_stream;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::traits::{CatalogProvider, ProviderStream};
use crate::config::ProviderConfig;
use crate::errors::{AppError, AppResult, ProviderError, ProviderResult};
use crate::models::{
    ContentDomain, MediaMetadata, RemoteCategory, RemoteEpisode, RemoteLiveChannel,
    RemoteMovie, RemoteRecord, RemoteSeries,
};
use crate::utils::deserializers::{
    first_string, flag, lenient_object, opt_i64, opt_rating, opt_string, string_or_number,
};
use crate::utils::text::release_year;
use crate::utils::xmltv_parser::parse_xmltv_programmes;
use crate::utils::{DecompressionService, UrlUtils};

const DEFAULT_VOD_EXTENSION: &str = "mp4";

/// Xtream Codes API client
pub struct XtreamProvider {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    live_extension: Option<String>,
}

impl XtreamProvider {
    pub fn new(config: &ProviderConfig) -> AppResult<Self> {
        let base_url = UrlUtils::provider_base(&config.base_url, config.port).map_err(|e| {
            AppError::configuration(format!(
                "Invalid provider URL '{}': {e}",
                UrlUtils::obfuscate_credentials(&config.base_url)
            ))
        })?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {e}")))?;

        info!("Using Xtream provider at {}", base_url);

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            live_extension: config
                .live_extension
                .as_deref()
                .map(|ext| ext.trim_start_matches('.').to_string())
                .filter(|ext| !ext.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, action: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}/player_api.php?username={}&password={}&action={}",
            self.base_url,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password),
            action
        );
        for (key, value) in params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    fn xmltv_url(&self) -> String {
        format!(
            "{}/xmltv.php?username={}&password={}",
            self.base_url,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password)
        )
    }

    pub fn movie_stream_url(&self, stream_id: &str, extension: Option<&str>) -> String {
        format!(
            "{}/movie/{}/{}/{}.{}",
            self.base_url,
            self.username,
            self.password,
            stream_id,
            extension.unwrap_or(DEFAULT_VOD_EXTENSION)
        )
    }

    pub fn episode_stream_url(&self, episode_id: &str, extension: Option<&str>) -> String {
        format!(
            "{}/series/{}/{}/{}.{}",
            self.base_url,
            self.username,
            self.password,
            episode_id,
            extension.unwrap_or(DEFAULT_VOD_EXTENSION)
        )
    }

    pub fn live_stream_url(&self, stream_id: &str) -> String {
        match &self.live_extension {
            Some(ext) => format!(
                "{}/live/{}/{}/{}.{}",
                self.base_url, self.username, self.password, stream_id, ext
            ),
            None => format!(
                "{}/live/{}/{}/{}",
                self.base_url, self.username, self.password, stream_id
            ),
        }
    }

    async fn get_bytes(&self, url: &str) -> ProviderResult<Bytes> {
        let safe_url = UrlUtils::obfuscate_credentials(url);
        debug!("GET {}", safe_url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e.without_url(), &safe_url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status, &safe_url));
        }

        response
            .bytes()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e.without_url(), &safe_url))
    }

    async fn get_json(&self, url: &str) -> ProviderResult<Value> {
        let body = self.get_bytes(url).await?;
        let value: Value = serde_json::from_slice(&body).map_err(|e| {
            ProviderError::fatal(
                UrlUtils::obfuscate_credentials(url),
                format!("response is not valid JSON: {e}"),
            )
        })?;

        // Panels answer bad credentials with 200 and an auth flag of 0
        if let Some(auth) = value.pointer("/user_info/auth")
            && (auth.as_i64() == Some(0) || auth.as_str() == Some("0"))
        {
            return Err(ProviderError::fatal(
                UrlUtils::obfuscate_credentials(url),
                "credentials rejected",
            ));
        }

        Ok(value)
    }

    async fn get_list(&self, url: &str) -> ProviderResult<Vec<Value>> {
        match self.get_json(url).await? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            Value::Object(map) if map.is_empty() => Ok(Vec::new()),
            other => Err(ProviderError::fatal(
                UrlUtils::obfuscate_credentials(url),
                format!("expected a JSON array, got {}", json_kind(&other)),
            )),
        }
    }

    async fn get_object(&self, url: &str) -> ProviderResult<serde_json::Map<String, Value>> {
        match self.get_json(url).await? {
            Value::Object(map) => Ok(map),
            // Unknown ids come back as an empty list on some panels
            Value::Array(items) if items.is_empty() => Ok(serde_json::Map::new()),
            Value::Null => Ok(serde_json::Map::new()),
            other => Err(ProviderError::fatal(
                UrlUtils::obfuscate_credentials(url),
                format!("expected a JSON object, got {}", json_kind(&other)),
            )),
        }
    }

    fn movie_from_listing(&self, vod: XtreamVod) -> RemoteMovie {
        let stream_url = self.movie_stream_url(&vod.stream_id, vod.container_extension.as_deref());
        let metadata = MediaMetadata {
            plot: vod.plot,
            genre: vod.genre,
            director: vod.director,
            cast: vod.cast,
            rating: vod.rating,
            release_date: vod.release_date,
            duration_secs: None,
            tmdb_id: vod.tmdb,
            original_title: None,
            poster_url: vod.stream_icon,
            backdrop_url: None,
        };
        RemoteMovie {
            year: release_year(metadata.release_date.as_deref(), &vod.name),
            remote_id: vod.stream_id,
            title: vod.name,
            stream_url,
            metadata,
        }
    }

    fn movie_from_detail(&self, remote_id: &str, detail: XtreamVodInfo) -> Option<RemoteMovie> {
        let info = detail.info;
        let data = detail.movie_data;
        let title = data.name.clone().or_else(|| info.name.clone())?;
        let stream_id = data.stream_id.unwrap_or_else(|| remote_id.to_string());

        let metadata = MediaMetadata {
            plot: info.plot.or(info.description),
            genre: info.genre,
            director: info.director,
            cast: info.cast.or(info.actors),
            rating: info.rating,
            release_date: info.release_date,
            duration_secs: info.duration_secs,
            tmdb_id: info.tmdb_id,
            original_title: info.original_name,
            poster_url: info.movie_image,
            backdrop_url: info.backdrop_path,
        };

        Some(RemoteMovie {
            year: release_year(metadata.release_date.as_deref(), &title),
            stream_url: self.movie_stream_url(&stream_id, data.container_extension.as_deref()),
            remote_id: stream_id,
            title,
            metadata,
        })
    }

    fn series_from_listing(series: XtreamSeries) -> RemoteSeries {
        let metadata = MediaMetadata {
            plot: series.plot,
            genre: series.genre,
            director: series.director,
            cast: series.cast,
            rating: series.rating,
            release_date: series.release_date,
            duration_secs: None,
            tmdb_id: series.tmdb,
            original_title: None,
            poster_url: series.cover,
            backdrop_url: series.backdrop_path,
        };
        RemoteSeries {
            year: release_year(metadata.release_date.as_deref(), &series.name),
            remote_id: series.series_id,
            title: series.name,
            last_modified: series.last_modified,
            metadata,
        }
    }

    fn episode_from_detail(
        &self,
        episode: XtreamEpisode,
        season_hint: Option<i64>,
    ) -> Option<RemoteEpisode> {
        let Some(episode_number) = episode.episode_num.and_then(|n| i32::try_from(n).ok()) else {
            warn!("Skipping episode {} without an episode number", episode.id);
            return None;
        };
        let season = episode
            .season
            .or(season_hint)
            .and_then(|s| i32::try_from(s).ok())
            .unwrap_or(1);

        Some(RemoteEpisode {
            stream_url: self.episode_stream_url(&episode.id, episode.container_extension.as_deref()),
            remote_id: episode.id,
            season,
            episode_number,
            title: episode.title,
            plot: episode.info.plot,
            air_date: episode.info.air_date,
            duration_secs: episode.info.duration_secs,
            rating: episode.info.rating,
            thumbnail_url: episode.info.movie_image,
        })
    }

    fn live_from_listing(&self, live: XtreamLiveStream) -> RemoteLiveChannel {
        RemoteLiveChannel {
            stream_url: self.live_stream_url(&live.stream_id),
            remote_id: live.stream_id,
            name: live.name,
            epg_channel_id: live.epg_channel_id,
            logo_url: live.stream_icon,
            tv_archive: live.tv_archive,
        }
    }
}

impl CatalogProvider for XtreamProvider {
    fn name(&self) -> &str {
        "xtream"
    }

    fn fetch_categories(&self, domain: ContentDomain) -> ProviderStream<'_, RemoteCategory> {
        let action = match domain {
            ContentDomain::Movie => "get_vod_categories",
            ContentDomain::Series => "get_series_categories",
            ContentDomain::Live => "get_live_categories",
        };
        let url = self.api_url(action, &[]);

        try_stream! {
            let items = self.get_list(&url).await?;
            for category in decode_elements::<XtreamCategory>(items, "category") {
                let name = category
                    .category_name
                    .unwrap_or_else(|| format!("Category {}", category.category_id));
                yield RemoteCategory {
                    remote_id: category.category_id,
                    name,
                };
            }
        }
        .boxed()
    }

    fn fetch_items(
        &self,
        domain: ContentDomain,
        category_remote_id: &str,
    ) -> ProviderStream<'_, RemoteRecord> {
        let action = match domain {
            ContentDomain::Movie => "get_vod_streams",
            ContentDomain::Series => "get_series",
            ContentDomain::Live => "get_live_streams",
        };
        let url = self.api_url(action, &[("category_id", category_remote_id)]);
        let category = category_remote_id.to_string();

        try_stream! {
            let items = self.get_list(&url).await?;
            let total = items.len();
            // Some panels ignore the category filter and return the whole catalog
            let items: Vec<Value> = items
                .into_iter()
                .filter(|item| listed_under(item, &category))
                .collect();
            if items.len() != total {
                debug!(
                    "Dropped {} items listed under other categories than {}",
                    total - items.len(),
                    category
                );
            }

            match domain {
                ContentDomain::Movie => {
                    for vod in decode_elements::<XtreamVod>(items, "movie") {
                        yield RemoteRecord::Movie(self.movie_from_listing(vod));
                    }
                }
                ContentDomain::Series => {
                    for series in decode_elements::<XtreamSeries>(items, "series") {
                        yield RemoteRecord::Series(Self::series_from_listing(series));
                    }
                }
                ContentDomain::Live => {
                    for live in decode_elements::<XtreamLiveStream>(items, "live channel") {
                        yield RemoteRecord::LiveChannel(self.live_from_listing(live));
                    }
                }
            }
        }
        .boxed()
    }

    fn fetch_item_detail(
        &self,
        domain: ContentDomain,
        remote_id: &str,
    ) -> ProviderStream<'_, RemoteRecord> {
        let remote_id = remote_id.to_string();

        try_stream! {
            match domain {
                ContentDomain::Movie => {
                    let url = self.api_url("get_vod_info", &[("vod_id", &remote_id)]);
                    let object = self.get_object(&url).await?;
                    let detail: XtreamVodInfo = serde_json::from_value(Value::Object(object))
                        .map_err(|e| {
                            ProviderError::fatal(
                                UrlUtils::obfuscate_credentials(&url),
                                format!("malformed movie detail: {e}"),
                            )
                        })?;
                    if let Some(movie) = self.movie_from_detail(&remote_id, detail) {
                        yield RemoteRecord::Movie(movie);
                    } else {
                        debug!("No detail available for movie {}", remote_id);
                    }
                }
                ContentDomain::Series => {
                    let url = self.api_url("get_series_info", &[("series_id", &remote_id)]);
                    let mut object = self.get_object(&url).await?;
                    for (season_hint, value) in flatten_episodes(object.remove("episodes")) {
                        match serde_json::from_value::<XtreamEpisode>(value) {
                            Ok(episode) => {
                                if let Some(episode) = self.episode_from_detail(episode, season_hint) {
                                    yield RemoteRecord::Episode(episode);
                                }
                            }
                            Err(e) => warn!(
                                "Skipping malformed episode of series {}: {}",
                                remote_id, e
                            ),
                        }
                    }
                }
                ContentDomain::Live => {}
            }
        }
        .boxed()
    }

    fn fetch_epg(&self) -> ProviderStream<'_, RemoteRecord> {
        let url = self.xmltv_url();

        try_stream! {
            let safe_url = UrlUtils::obfuscate_credentials(&url);
            let body = self.get_bytes(&url).await?;
            let xml = DecompressionService::decompress(&body).map_err(|e| {
                ProviderError::fatal(&safe_url, format!("cannot decompress guide: {e}"))
            })?;
            let text = String::from_utf8_lossy(&xml);
            let guide = parse_xmltv_programmes(&text).map_err(|e| {
                ProviderError::fatal(&safe_url, format!("malformed XMLTV document: {e}"))
            })?;

            if guide.skipped > 0 {
                warn!("Skipped {} incomplete programmes in the guide", guide.skipped);
            }
            info!("Guide lists {} programmes", guide.entries.len());

            for entry in guide.entries {
                yield RemoteRecord::EpgEntry(entry);
            }
        }
        .boxed()
    }
}

/// Decode list elements one by one, skipping those that do not fit.
fn decode_elements<T: DeserializeOwned>(items: Vec<Value>, what: &str) -> Vec<T> {
    let mut decoded = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<T>(item) {
            Ok(value) => decoded.push(value),
            Err(e) => warn!("Skipping malformed {}: {}", what, e),
        }
    }
    decoded
}

fn listed_under(item: &Value, category: &str) -> bool {
    match item.get("category_id") {
        Some(Value::String(id)) => id.trim() == category,
        Some(Value::Number(id)) => id.to_string() == category,
        _ => true,
    }
}

/// Episodes come as `{"1": [...], "2": [...]}`, as a flat list or as a list of lists.
fn flatten_episodes(episodes: Option<Value>) -> Vec<(Option<i64>, Value)> {
    let mut flat = Vec::new();
    match episodes {
        Some(Value::Object(seasons)) => {
            for (season, value) in seasons {
                let hint = season.trim().parse().ok();
                match value {
                    Value::Array(items) => flat.extend(items.into_iter().map(|v| (hint, v))),
                    other @ Value::Object(_) => flat.push((hint, other)),
                    _ => {}
                }
            }
        }
        Some(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::Array(inner) => flat.extend(inner.into_iter().map(|v| (None, v))),
                    other => flat.push((None, other)),
                }
            }
        }
        _ => {}
    }
    flat
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Deserialize)]
struct XtreamCategory {
    #[serde(deserialize_with = "string_or_number")]
    category_id: String,
    #[serde(default, deserialize_with = "opt_string")]
    category_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XtreamVod {
    #[serde(deserialize_with = "string_or_number")]
    stream_id: String,
    name: String,
    #[serde(default, deserialize_with = "opt_string")]
    stream_icon: Option<String>,
    #[serde(default, deserialize_with = "opt_rating")]
    rating: Option<f64>,
    #[serde(default, deserialize_with = "opt_string")]
    plot: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    cast: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    director: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    genre: Option<String>,
    #[serde(default, rename = "releaseDate", alias = "release_date", deserialize_with = "opt_string")]
    release_date: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    container_extension: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    tmdb: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct XtreamVodInfo {
    #[serde(default, deserialize_with = "lenient_object")]
    info: XtreamVodDetail,
    #[serde(default, deserialize_with = "lenient_object")]
    movie_data: XtreamMovieData,
}

#[derive(Debug, Default, Deserialize)]
struct XtreamVodDetail {
    #[serde(default, deserialize_with = "opt_string")]
    tmdb_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    name: Option<String>,
    #[serde(default, rename = "o_name", deserialize_with = "opt_string")]
    original_name: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    plot: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    description: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    cast: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    actors: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    director: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    genre: Option<String>,
    #[serde(default, rename = "releasedate", alias = "release_date", deserialize_with = "opt_string")]
    release_date: Option<String>,
    #[serde(default, deserialize_with = "opt_i64")]
    duration_secs: Option<i64>,
    #[serde(default, deserialize_with = "opt_rating")]
    rating: Option<f64>,
    #[serde(default, deserialize_with = "opt_string")]
    movie_image: Option<String>,
    #[serde(default, deserialize_with = "first_string")]
    backdrop_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct XtreamMovieData {
    #[serde(default, deserialize_with = "opt_string")]
    stream_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    container_extension: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XtreamSeries {
    #[serde(deserialize_with = "string_or_number")]
    series_id: String,
    name: String,
    #[serde(default, deserialize_with = "opt_string")]
    cover: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    plot: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    cast: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    director: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    genre: Option<String>,
    #[serde(default, rename = "releaseDate", alias = "release_date", deserialize_with = "opt_string")]
    release_date: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    last_modified: Option<String>,
    #[serde(default, deserialize_with = "opt_rating")]
    rating: Option<f64>,
    #[serde(default, deserialize_with = "first_string")]
    backdrop_path: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    tmdb: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XtreamEpisode {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default, deserialize_with = "opt_i64")]
    episode_num: Option<i64>,
    #[serde(default, deserialize_with = "opt_i64")]
    season: Option<i64>,
    #[serde(default, deserialize_with = "opt_string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    container_extension: Option<String>,
    #[serde(default, deserialize_with = "lenient_object")]
    info: XtreamEpisodeInfo,
}

#[derive(Debug, Default, Deserialize)]
struct XtreamEpisodeInfo {
    #[serde(default, deserialize_with = "opt_string")]
    plot: Option<String>,
    #[serde(default, alias = "releasedate", deserialize_with = "opt_string")]
    air_date: Option<String>,
    #[serde(default, deserialize_with = "opt_i64")]
    duration_secs: Option<i64>,
    #[serde(default, deserialize_with = "opt_rating")]
    rating: Option<f64>,
    #[serde(default, deserialize_with = "opt_string")]
    movie_image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XtreamLiveStream {
    #[serde(deserialize_with = "string_or_number")]
    stream_id: String,
    name: String,
    #[serde(default, deserialize_with = "opt_string")]
    stream_icon: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    epg_channel_id: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    tv_archive: bool,
}
