//! End-to-end behaviour of a sync run: cache deltas and the files they produce.

mod common;

use common::*;
use strm_sync::errors::ProviderError;
use strm_sync::models::{ContentDomain, SyncOutcome};
use strm_sync::sources::Endpoint;

const MOVIE: ContentDomain = ContentDomain::Movie;

fn two_movies(harness: &Harness) {
    harness
        .provider
        .set_categories(MOVIE, vec![category("1", "Action")]);
    harness.provider.set_items(
        MOVIE,
        "1",
        vec![movie("10", "Alpha"), movie("11", "Bravo")],
    );
}

#[tokio::test]
async fn test_second_run_without_remote_changes_is_a_no_op() {
    let harness = Harness::new().await;
    two_movies(&harness);

    let first = harness.sync(MOVIE).await;
    assert_eq!(first.outcome, SyncOutcome::Succeeded);
    assert_eq!(first.counts.added, 2);
    assert_eq!(first.generation.as_ref().unwrap().written, 2);
    assert_eq!(
        harness.files("movies"),
        vec!["Alpha/Alpha.strm", "Bravo/Bravo.strm"]
    );
    let before = modified(&harness.path("movies/Alpha/Alpha.strm"));

    let second = harness.sync(MOVIE).await;
    assert_eq!(second.outcome, SyncOutcome::Succeeded);
    assert!(second.counts.is_empty());
    let generation = second.generation.unwrap();
    assert!(!generation.has_writes());
    assert_eq!(generation.unchanged, 2);
    assert_eq!(modified(&harness.path("movies/Alpha/Alpha.strm")), before);
}

#[tokio::test]
async fn test_missing_item_survives_one_run_then_is_removed() {
    let harness = Harness::new().await;
    two_movies(&harness);
    harness.sync(MOVIE).await;

    harness
        .provider
        .set_items(MOVIE, "1", vec![movie("10", "Alpha")]);

    let first_miss = harness.sync(MOVIE).await;
    assert_eq!(first_miss.counts.removed, 0);
    assert!(harness.path("movies/Bravo/Bravo.strm").exists());

    let second_miss = harness.sync(MOVIE).await;
    assert_eq!(second_miss.counts.removed, 1);
    assert_eq!(second_miss.generation.unwrap().deleted, 1);
    assert!(!harness.path("movies/Bravo/Bravo.strm").exists());
    assert!(!harness.path("movies/Bravo").exists());
    assert!(harness.path("movies/Alpha/Alpha.strm").exists());
}

#[tokio::test]
async fn test_reappearing_item_resets_its_strike() {
    let harness = Harness::new().await;
    two_movies(&harness);
    harness.sync(MOVIE).await;

    harness
        .provider
        .set_items(MOVIE, "1", vec![movie("10", "Alpha")]);
    harness.sync(MOVIE).await;

    two_movies(&harness);
    harness.sync(MOVIE).await;

    harness
        .provider
        .set_items(MOVIE, "1", vec![movie("10", "Alpha")]);
    let report = harness.sync(MOVIE).await;
    assert_eq!(report.counts.removed, 0);
    assert!(harness.path("movies/Bravo/Bravo.strm").exists());
}

#[tokio::test]
async fn test_hidden_category_drops_its_files_on_next_sync() {
    let harness = Harness::new().await;
    two_movies(&harness);
    harness.sync(MOVIE).await;
    assert_eq!(harness.files("movies").len(), 2);

    let category = harness
        .service
        .set_category_visibility(MOVIE, "1", false)
        .await
        .unwrap();
    assert!(!category.visible);

    harness.provider.clear_requests();
    let report = harness.sync(MOVIE).await;
    assert_eq!(report.counts.removed, 2);
    assert!(harness.files("movies").is_empty());
    assert_eq!(harness.provider.requests(), vec![Endpoint::Categories(MOVIE)]);

    // Categories themselves are kept with their visibility
    let categories = harness.service.list_categories(MOVIE).await.unwrap();
    assert_eq!(categories.len(), 1);
    assert!(!categories[0].visible);
}

#[tokio::test]
async fn test_showing_a_second_category_adds_only_its_files() {
    let harness = Harness::with_config(|config| {
        config.reconciliation.new_category_visible = false;
    })
    .await;
    harness.provider.set_categories(
        MOVIE,
        vec![category("1", "Action"), category("2", "Drama")],
    );
    harness
        .provider
        .set_items(MOVIE, "1", vec![movie("10", "Alpha")]);
    harness
        .provider
        .set_items(MOVIE, "2", vec![movie("20", "Zulu")]);

    let report = harness.sync(MOVIE).await;
    assert_eq!(report.counts.added, 0);
    assert!(harness.files("movies").is_empty());

    harness
        .service
        .set_category_visibility(MOVIE, "1", true)
        .await
        .unwrap();
    harness.sync(MOVIE).await;
    assert_eq!(harness.files("movies"), vec!["Alpha/Alpha.strm"]);
    let alpha = modified(&harness.path("movies/Alpha/Alpha.strm"));

    harness
        .service
        .set_category_visibility(MOVIE, "2", true)
        .await
        .unwrap();
    let report = harness.sync(MOVIE).await;
    assert_eq!(report.counts.added, 1);
    assert_eq!(report.generation.unwrap().written, 1);
    assert_eq!(
        harness.files("movies"),
        vec!["Alpha/Alpha.strm", "Zulu/Zulu.strm"]
    );
    assert_eq!(modified(&harness.path("movies/Alpha/Alpha.strm")), alpha);
}

#[tokio::test]
async fn test_same_name_newcomer_does_not_take_over_existing_folder() {
    let harness = Harness::with_config(|config| {
        config.reconciliation.new_category_visible = false;
    })
    .await;
    harness.provider.set_categories(
        MOVIE,
        vec![category("1", "Action"), category("2", "Drama")],
    );
    harness
        .provider
        .set_items(MOVIE, "1", vec![movie("20", "Heat")]);
    harness
        .provider
        .set_items(MOVIE, "2", vec![movie("3", "Heat")]);

    harness.sync(MOVIE).await;
    harness
        .service
        .set_category_visibility(MOVIE, "1", true)
        .await
        .unwrap();
    harness.sync(MOVIE).await;
    assert_eq!(harness.files("movies"), vec!["Heat/Heat.strm"]);
    let heat = modified(&harness.path("movies/Heat/Heat.strm"));

    harness
        .service
        .set_category_visibility(MOVIE, "2", true)
        .await
        .unwrap();
    let report = harness.sync(MOVIE).await;
    assert_eq!(report.counts.added, 1);
    let generation = report.generation.unwrap();
    assert_eq!((generation.written, generation.deleted), (1, 0));
    assert_eq!(
        harness.files("movies"),
        vec!["Heat [3]/Heat [3].strm", "Heat/Heat.strm"]
    );
    assert_eq!(
        harness.read("movies/Heat/Heat.strm"),
        "http://provider.test/movie/u/p/20.mkv\n"
    );
    assert_eq!(modified(&harness.path("movies/Heat/Heat.strm")), heat);
}

#[tokio::test]
async fn test_transient_category_failure_is_partial_and_keeps_files() {
    let harness = Harness::new().await;
    harness.provider.set_categories(
        MOVIE,
        vec![category("1", "Action"), category("2", "Drama")],
    );
    harness
        .provider
        .set_items(MOVIE, "1", vec![movie("10", "Alpha")]);
    harness
        .provider
        .set_items(MOVIE, "2", vec![movie("20", "Zulu")]);
    harness.sync(MOVIE).await;

    harness.provider.fail(
        Endpoint::Items(MOVIE, "2".to_string()),
        0,
        ProviderError::transient("http://provider.test", "HTTP 503"),
    );
    for _ in 0..3 {
        let report = harness.sync(MOVIE).await;
        assert_eq!(report.outcome, SyncOutcome::Partial);
        assert_eq!(report.omitted, vec!["Drama".to_string()]);
        assert_eq!(report.counts.removed, 0);
    }
    assert!(harness.path("movies/Zulu/Zulu.strm").exists());

    let runs = harness.service.recent_runs(Some(MOVIE), 1).await.unwrap();
    assert_eq!(runs[0].outcome, SyncOutcome::Partial);
    assert_eq!(runs[0].omitted_categories, vec!["Drama".to_string()]);
}

#[tokio::test]
async fn test_fatal_failure_keeps_previous_cache_and_files() {
    let harness = Harness::new().await;
    two_movies(&harness);
    harness.sync(MOVIE).await;

    harness
        .provider
        .set_items(MOVIE, "1", vec![movie("10", "Alpha renamed")]);
    harness.provider.fail(
        Endpoint::Items(MOVIE, "1".to_string()),
        1,
        ProviderError::fatal("http://provider.test", "credentials rejected"),
    );

    let report = harness.sync(MOVIE).await;
    assert_eq!(report.outcome, SyncOutcome::Failed);
    assert!(report.generation.is_none());
    assert!(report.error.unwrap().contains("credentials rejected"));
    assert_eq!(
        harness.files("movies"),
        vec!["Alpha/Alpha.strm", "Bravo/Bravo.strm"]
    );

    let stats = harness.service.get_statistics().await.unwrap();
    assert_eq!(stats.domains[&MOVIE].total, 2);
}

#[tokio::test]
async fn test_failed_guide_download_keeps_previous_guide() {
    let harness = Harness::with_config(|config| {
        config.epg.enabled = true;
        config.epg.days_behind = 0;
        config.epg.days_ahead = 0;
    })
    .await;
    let live = ContentDomain::Live;
    harness
        .provider
        .set_categories(live, vec![category("5", "News")]);
    harness.provider.set_items(
        live,
        "5",
        vec![channel("100", "World News", Some("world.news"))],
    );
    harness.provider.set_epg(vec![
        programme("world.news", 6, "Morning Bulletin"),
        programme("world.news", 7, "Weather"),
        programme("unknown.channel", 6, "Not ours"),
    ]);

    let first = harness.sync(live).await;
    assert_eq!(first.outcome, SyncOutcome::Succeeded);
    let guide = harness.read("live/epg.xml");
    assert!(guide.contains("Morning Bulletin"));
    assert!(guide.contains("Weather"));
    assert!(!guide.contains("Not ours"));
    let playlist = harness.read("live/playlist.m3u8");
    assert!(playlist.contains("tvg-id=\"world.news\""));

    harness
        .provider
        .set_epg(vec![programme("world.news", 8, "Replacement")]);
    harness.provider.fail(
        Endpoint::Epg,
        1,
        ProviderError::transient("http://provider.test/xmltv.php", "connection reset"),
    );

    let second = harness.sync(live).await;
    assert_eq!(second.outcome, SyncOutcome::Partial);
    assert_eq!(second.omitted, vec!["EPG".to_string()]);
    assert_eq!(harness.read("live/epg.xml"), guide);

    harness.provider.clear_failures();
    let third = harness.sync(live).await;
    assert_eq!(third.outcome, SyncOutcome::Succeeded);
    let guide = harness.read("live/epg.xml");
    assert!(guide.contains("Replacement"));
    assert!(!guide.contains("Morning Bulletin"));
}

#[tokio::test]
async fn test_episode_renumbering_and_remote_id_change() {
    let harness = Harness::new().await;
    let domain = ContentDomain::Series;
    harness
        .provider
        .set_categories(domain, vec![category("3", "Drama")]);
    harness
        .provider
        .set_items(domain, "3", vec![series("40", "Harbor", "1700000000")]);
    harness
        .provider
        .set_detail(domain, "40", vec![episode("400", 1, 1, "900")]);

    let first = harness.sync(domain).await;
    assert_eq!(first.counts.added, 2);
    assert_eq!(
        harness.files("series"),
        vec!["Harbor/Season 01/Harbor S01E01.strm"]
    );

    // Same remote id at a new position: the old path goes at once
    harness
        .provider
        .set_items(domain, "3", vec![series("40", "Harbor", "1700000100")]);
    harness
        .provider
        .set_detail(domain, "40", vec![episode("400", 1, 2, "900")]);
    let renumbered = harness.sync(domain).await;
    assert_eq!(renumbered.counts.added, 1);
    assert_eq!(renumbered.counts.removed, 1);
    assert_eq!(
        harness.files("series"),
        vec!["Harbor/Season 01/Harbor S01E02.strm"]
    );
    let path = harness.path("series/Harbor/Season 01/Harbor S01E02.strm");
    let written = modified(&path);

    // New remote id at the same position with the same stream: nothing to rewrite
    harness
        .provider
        .set_items(domain, "3", vec![series("40", "Harbor", "1700000200")]);
    harness
        .provider
        .set_detail(domain, "40", vec![episode("401", 1, 2, "900")]);
    let renamed = harness.sync(domain).await;
    assert_eq!(renamed.counts.added, 0);
    assert_eq!(renamed.counts.removed, 0);
    assert_eq!(renamed.counts.updated, 1);
    assert_eq!(renamed.generation.unwrap().written, 0);
    assert_eq!(modified(&path), written);
    assert_eq!(
        harness.read("series/Harbor/Season 01/Harbor S01E02.strm"),
        "http://provider.test/series/u/p/900.mp4\n"
    );
}

#[tokio::test]
async fn test_unchanged_series_does_not_refetch_episodes() {
    let harness = Harness::new().await;
    let domain = ContentDomain::Series;
    harness
        .provider
        .set_categories(domain, vec![category("3", "Drama")]);
    harness
        .provider
        .set_items(domain, "3", vec![series("40", "Harbor", "1700000000")]);
    harness
        .provider
        .set_detail(domain, "40", vec![episode("400", 1, 1, "900")]);
    harness.sync(domain).await;

    harness.provider.clear_requests();
    let report = harness.sync(domain).await;
    assert!(report.counts.is_empty());
    assert!(
        !harness
            .provider
            .requests()
            .contains(&Endpoint::Detail(domain, "40".to_string()))
    );
}
