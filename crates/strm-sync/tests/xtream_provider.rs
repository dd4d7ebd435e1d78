//! The Xtream client against a mock panel: decoding quirks and failure classification.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::TryStreamExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use common::test_config;
use strm_sync::config::ProviderConfig;
use strm_sync::database::{CatalogCache, Database};
use strm_sync::errors::ProviderError;
use strm_sync::models::{ContentDomain, RemoteRecord, SyncOutcome, SyncTarget};
use strm_sync::sources::{CatalogProvider, XtreamProvider};
use strm_sync::sync::SyncService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    Healthy,
    ServerError,
    Unauthorized,
    InvalidJson,
    AuthRejected,
    Slow,
}

struct Panel {
    behaviour: Behaviour,
}

const GUIDE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tv>
  <channel id="world.news"><display-name>World News</display-name></channel>
  <programme start="20240301060000 +0000" stop="20240301070000 +0000" channel="world.news">
    <title lang="en">Morning &amp; Markets</title>
    <desc>Headlines</desc>
  </programme>
  <programme start="20240301070000 +0000" channel="world.news">
    <title>No stop time</title>
  </programme>
</tv>
"#;

fn listing(action: &str, params: &HashMap<String, String>) -> Value {
    match action {
        "get_vod_categories" => json!([
            {"category_id": "1", "category_name": "Action"},
            {"category_id": 2, "category_name": null}
        ]),
        // Ignores the category filter like some panels do
        "get_vod_streams" => json!([
            {
                "stream_id": 10,
                "name": "Alpha",
                "category_id": "1",
                "container_extension": "mkv",
                "rating": "7.5",
                "releaseDate": "2019-05-01",
                "plot": "  "
            },
            {"stream_id": "11", "name": "Elsewhere", "category_id": "2"}
        ]),
        "get_series_categories" => json!([{"category_id": "3", "category_name": "Drama"}]),
        "get_series" => json!([
            {"series_id": 40, "name": "Harbor", "category_id": "3", "last_modified": "1700000000"}
        ]),
        "get_series_info" if params.get("series_id").map(String::as_str) == Some("40") => json!({
            "info": {"name": "Harbor"},
            "episodes": {
                "1": [
                    {"id": "401", "episode_num": "1", "title": "Pilot", "container_extension": "mkv",
                     "info": {"plot": "It starts", "duration_secs": "2700"}},
                    {"id": "402", "title": "No number"}
                ],
                "2": [{"id": 403, "episode_num": 1, "season": 2, "info": []}]
            }
        }),
        "get_vod_info" if params.get("vod_id").map(String::as_str) == Some("10") => json!({
            "info": {"tmdb_id": 603, "plot": "Full plot", "director": "Someone", "duration_secs": 5400},
            "movie_data": {"stream_id": 10, "name": "Alpha", "container_extension": "mkv"}
        }),
        "get_vod_info" => json!([]),
        "get_live_categories" => json!([{"category_id": "5", "category_name": "News"}]),
        "get_live_streams" => json!([
            {"stream_id": 100, "name": "World News", "category_id": 5,
             "epg_channel_id": "world.news", "tv_archive": "1"}
        ]),
        _ => json!({"user_info": {"auth": 1}}),
    }
}

async fn player_api(
    State(panel): State<Arc<Panel>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match panel.behaviour {
        Behaviour::ServerError => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        Behaviour::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        Behaviour::InvalidJson => (StatusCode::OK, "<html>maintenance</html>").into_response(),
        Behaviour::AuthRejected => {
            axum::Json(json!({"user_info": {"auth": 0}})).into_response()
        }
        Behaviour::Slow => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            axum::Json(json!([])).into_response()
        }
        Behaviour::Healthy => {
            let action = params.get("action").cloned().unwrap_or_default();
            axum::Json(listing(&action, &params)).into_response()
        }
    }
}

async fn xmltv(State(panel): State<Arc<Panel>>) -> Response {
    match panel.behaviour {
        Behaviour::ServerError => StatusCode::BAD_GATEWAY.into_response(),
        _ => ([("content-type", "application/xml")], GUIDE).into_response(),
    }
}

async fn start_panel(behaviour: Behaviour) -> String {
    let app = Router::new()
        .route("/player_api.php", get(player_api))
        .route("/xmltv.php", get(xmltv))
        .with_state(Arc::new(Panel { behaviour }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{address}")
}

fn provider_config(base_url: &str) -> ProviderConfig {
    ProviderConfig {
        base_url: base_url.to_string(),
        username: "user".to_string(),
        password: "secret".to_string(),
        request_timeout: Duration::from_millis(500),
        ..ProviderConfig::default()
    }
}

async fn provider(behaviour: Behaviour) -> XtreamProvider {
    let base_url = start_panel(behaviour).await;
    XtreamProvider::new(&provider_config(&base_url)).unwrap()
}

async fn category_error(provider: &XtreamProvider) -> ProviderError {
    provider
        .fetch_categories(ContentDomain::Movie)
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err()
}

#[tokio::test]
async fn test_listing_quirks_are_decoded() {
    let provider = provider(Behaviour::Healthy).await;

    let categories: Vec<_> = provider
        .fetch_categories(ContentDomain::Movie)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[1].remote_id, "2");
    assert_eq!(categories[1].name, "Category 2");

    let items: Vec<_> = provider
        .fetch_items(ContentDomain::Movie, "1")
        .try_collect()
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    let RemoteRecord::Movie(movie) = &items[0] else {
        panic!("expected a movie, got {:?}", items[0]);
    };
    assert_eq!(movie.remote_id, "10");
    assert_eq!(movie.year, Some(2019));
    assert_eq!(movie.metadata.rating, Some(7.5));
    assert_eq!(movie.metadata.plot, None);
    assert!(movie.stream_url.ends_with("/movie/user/secret/10.mkv"));

    let live: Vec<_> = provider
        .fetch_items(ContentDomain::Live, "5")
        .try_collect()
        .await
        .unwrap();
    let RemoteRecord::LiveChannel(channel) = &live[0] else {
        panic!("expected a channel, got {:?}", live[0]);
    };
    assert!(channel.tv_archive);
    assert_eq!(channel.epg_channel_id.as_deref(), Some("world.news"));
}

#[tokio::test]
async fn test_series_detail_flattens_seasons() {
    let provider = provider(Behaviour::Healthy).await;

    let records: Vec<_> = provider
        .fetch_item_detail(ContentDomain::Series, "40")
        .try_collect()
        .await
        .unwrap();
    let mut episodes: Vec<_> = records
        .into_iter()
        .filter_map(|record| match record {
            RemoteRecord::Episode(episode) => Some(episode),
            _ => None,
        })
        .collect();
    episodes.sort_by_key(|e| (e.season, e.episode_number));

    // The episode without a number is skipped
    assert_eq!(episodes.len(), 2);
    assert_eq!((episodes[0].season, episodes[0].episode_number), (1, 1));
    assert_eq!(episodes[0].title.as_deref(), Some("Pilot"));
    assert_eq!(episodes[0].duration_secs, Some(2700));
    assert!(episodes[0].stream_url.ends_with("/series/user/secret/401.mkv"));
    assert_eq!((episodes[1].season, episodes[1].episode_number), (2, 1));
    assert_eq!(episodes[1].remote_id, "403");
}

#[tokio::test]
async fn test_movie_detail_and_unknown_movie() {
    let provider = provider(Behaviour::Healthy).await;

    let detail: Vec<_> = provider
        .fetch_item_detail(ContentDomain::Movie, "10")
        .try_collect()
        .await
        .unwrap();
    let RemoteRecord::Movie(movie) = &detail[0] else {
        panic!("expected a movie, got {:?}", detail[0]);
    };
    assert_eq!(movie.metadata.tmdb_id.as_deref(), Some("603"));
    assert_eq!(movie.metadata.duration_secs, Some(5400));

    let unknown: Vec<_> = provider
        .fetch_item_detail(ContentDomain::Movie, "999")
        .try_collect()
        .await
        .unwrap();
    assert!(unknown.is_empty());
}

#[tokio::test]
async fn test_guide_feed_skips_incomplete_programmes() {
    let provider = provider(Behaviour::Healthy).await;

    let records: Vec<_> = provider.fetch_epg().try_collect().await.unwrap();
    assert_eq!(records.len(), 1);
    let RemoteRecord::EpgEntry(entry) = &records[0] else {
        panic!("expected a programme, got {:?}", records[0]);
    };
    assert_eq!(entry.channel_remote_id, "world.news");
    assert_eq!(entry.title, "Morning & Markets");
    assert_eq!(entry.lang.as_deref(), Some("en"));
}

#[tokio::test]
async fn test_server_errors_are_transient() {
    let provider = provider(Behaviour::ServerError).await;
    let err = category_error(&provider).await;
    assert!(err.is_transient(), "{err}");

    let err = provider.fetch_epg().try_collect::<Vec<_>>().await.unwrap_err();
    assert!(err.is_transient(), "{err}");
}

#[tokio::test]
async fn test_timeouts_are_transient() {
    let provider = provider(Behaviour::Slow).await;
    let err = category_error(&provider).await;
    assert!(err.is_transient(), "{err}");
}

#[tokio::test]
async fn test_rejected_credentials_are_fatal() {
    let err = category_error(&provider(Behaviour::Unauthorized).await).await;
    assert!(matches!(err, ProviderError::Fatal { .. }), "{err}");

    let err = category_error(&provider(Behaviour::AuthRejected).await).await;
    assert!(matches!(err, ProviderError::Fatal { .. }), "{err}");
    assert!(err.to_string().contains("credentials rejected"));
}

#[tokio::test]
async fn test_malformed_response_is_fatal() {
    let err = category_error(&provider(Behaviour::InvalidJson).await).await;
    assert!(matches!(err, ProviderError::Fatal { .. }), "{err}");
}

#[tokio::test]
async fn test_errors_do_not_leak_credentials() {
    let err = category_error(&provider(Behaviour::Unauthorized).await).await;
    assert!(!err.to_string().contains("secret"), "{err}");
}

#[tokio::test]
async fn test_full_sync_against_mock_panel() {
    let base_url = start_panel(Behaviour::Healthy).await;
    let temp = tempfile::TempDir::new().unwrap();
    let mut config = test_config(temp.path());
    config.provider = provider_config(&base_url);
    config.epg.enabled = true;
    config.epg.days_behind = 0;
    config.epg.days_ahead = 0;

    let provider = XtreamProvider::new(&config.provider).unwrap();
    let cache = CatalogCache::new(Database::in_memory().await.unwrap());
    let service = SyncService::new(cache, Arc::new(provider), &config);

    let report = service
        .trigger_sync(SyncTarget::All)
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    for domain in &report.domains {
        assert_eq!(domain.outcome, SyncOutcome::Succeeded, "{domain:?}");
    }

    let strm = std::fs::read_to_string(temp.path().join("movies/Alpha (2019)/Alpha (2019).strm"))
        .unwrap();
    assert_eq!(strm, format!("{base_url}/movie/user/secret/10.mkv\n"));
    assert!(
        temp.path()
            .join("series/Harbor/Season 02/Harbor S02E01.strm")
            .exists()
    );

    let playlist = std::fs::read_to_string(temp.path().join("live/playlist.m3u8")).unwrap();
    assert!(playlist.contains("World News"));
    let guide = std::fs::read_to_string(temp.path().join("live/epg.xml")).unwrap();
    assert!(guide.contains("Morning &amp; Markets"));
}
