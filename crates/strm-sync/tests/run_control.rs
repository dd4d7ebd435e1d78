//! Run locking and cancellation through the service facade.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use common::*;
use strm_sync::models::{
    ContentDomain, RemoteCategory, RemoteRecord, SyncOutcome, SyncStage, SyncTarget,
};
use strm_sync::sources::{CatalogProvider, Endpoint, MemoryProvider, ProviderStream};

const MOVIE: ContentDomain = ContentDomain::Movie;

fn two_categories(harness: &Harness) {
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
}

#[tokio::test]
async fn test_trigger_while_running_is_busy_not_queued() {
    let harness = Harness::new().await;
    two_categories(&harness);

    let handle = harness
        .service
        .trigger_sync(SyncTarget::Domain(MOVIE))
        .await
        .unwrap();
    assert!(harness.service.is_running(MOVIE).await);

    let err = harness
        .service
        .trigger_sync(SyncTarget::Domain(MOVIE))
        .await
        .err()
        .unwrap();
    assert!(err.is_busy());
    // A full run overlaps the running domain as well
    assert!(
        harness
            .service
            .trigger_sync(SyncTarget::All)
            .await
            .err()
            .unwrap()
            .is_busy()
    );

    let report = handle.wait().await.unwrap();
    assert_eq!(report.domains.len(), 1);
    assert_eq!(report.domains[0].outcome, SyncOutcome::Succeeded);
    assert!(!harness.service.is_running(MOVIE).await);

    // Only the accepted run reached the provider
    let category_requests = harness
        .provider
        .requests()
        .into_iter()
        .filter(|r| *r == Endpoint::Categories(MOVIE))
        .count();
    assert_eq!(category_requests, 1);

    let again = harness.sync(MOVIE).await;
    assert_eq!(again.outcome, SyncOutcome::Succeeded);
}

#[tokio::test]
async fn test_other_domains_can_run_concurrently() {
    let harness = Harness::new().await;
    two_categories(&harness);
    harness
        .provider
        .set_categories(ContentDomain::Live, vec![category("5", "News")]);
    harness
        .provider
        .set_items(ContentDomain::Live, "5", vec![channel("100", "World News", None)]);

    let movies = harness
        .service
        .trigger_sync(SyncTarget::Domain(MOVIE))
        .await
        .unwrap();
    let live = harness
        .service
        .trigger_sync(SyncTarget::Domain(ContentDomain::Live))
        .await
        .unwrap();
    assert_ne!(movies.run_id(), live.run_id());

    let movies = movies.wait().await.unwrap();
    let live = live.wait().await.unwrap();
    assert_eq!(movies.domains[0].outcome, SyncOutcome::Succeeded);
    assert_eq!(live.domains[0].outcome, SyncOutcome::Succeeded);
    assert!(harness.path("live/playlist.m3u8").exists());
}

/// Holds every movie listing until `release` fires; `reached` is signalled on each hold.
struct HeldMovieListings {
    inner: Arc<MemoryProvider>,
    reached: Arc<Notify>,
    release: CancellationToken,
}

impl CatalogProvider for HeldMovieListings {
    fn name(&self) -> &str {
        "held"
    }

    fn fetch_categories(&self, domain: ContentDomain) -> ProviderStream<'_, RemoteCategory> {
        self.inner.fetch_categories(domain)
    }

    fn fetch_items(
        &self,
        domain: ContentDomain,
        category_remote_id: &str,
    ) -> ProviderStream<'_, RemoteRecord> {
        let listing = self.inner.fetch_items(domain, category_remote_id);
        if domain != MOVIE {
            return listing;
        }
        let reached = self.reached.clone();
        let release = self.release.clone();
        Box::pin(
            stream::once(async move {
                reached.notify_one();
                release.cancelled().await;
                listing
            })
            .flatten(),
        )
    }

    fn fetch_item_detail(
        &self,
        domain: ContentDomain,
        remote_id: &str,
    ) -> ProviderStream<'_, RemoteRecord> {
        self.inner.fetch_item_detail(domain, remote_id)
    }

    fn fetch_epg(&self) -> ProviderStream<'_, RemoteRecord> {
        self.inner.fetch_epg()
    }
}

#[tokio::test]
async fn test_slow_listing_does_not_hold_up_other_domains() {
    let reached = Arc::new(Notify::new());
    let release = CancellationToken::new();
    let harness = Harness::wrapping(|inner| {
        Arc::new(HeldMovieListings {
            inner,
            reached: reached.clone(),
            release: release.clone(),
        })
    })
    .await;
    two_categories(&harness);
    harness
        .provider
        .set_categories(ContentDomain::Live, vec![category("5", "News")]);
    harness
        .provider
        .set_items(ContentDomain::Live, "5", vec![channel("100", "World News", None)]);

    let movies = harness
        .service
        .trigger_sync(SyncTarget::Domain(MOVIE))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(10), reached.notified())
        .await
        .expect("movie listing was never requested");

    let live = harness
        .service
        .trigger_sync(SyncTarget::Domain(ContentDomain::Live))
        .await
        .unwrap();
    let live = tokio::time::timeout(Duration::from_secs(10), live.wait())
        .await
        .expect("live run waited on the movie listing")
        .unwrap();
    assert_eq!(live.domains[0].outcome, SyncOutcome::Succeeded);
    assert!(harness.path("live/playlist.m3u8").exists());
    assert!(harness.service.is_running(MOVIE).await);

    release.cancel();
    let movies = movies.wait().await.unwrap();
    assert_eq!(movies.domains[0].outcome, SyncOutcome::Succeeded);
    assert_eq!(movies.domains[0].counts.added, 2);
    assert_eq!(
        harness.files("movies"),
        vec!["Alpha/Alpha.strm", "Zulu/Zulu.strm"]
    );
}

#[tokio::test]
async fn test_cancel_between_categories_commits_progress_and_skips_generation() {
    let harness = Harness::new().await;
    two_categories(&harness);

    let handle = harness
        .service
        .trigger_sync(SyncTarget::Domain(MOVIE))
        .await
        .unwrap();
    harness.provider.trip_on(
        Endpoint::Items(MOVIE, "2".to_string()),
        handle.cancellation_token(),
    );

    let report = handle.wait().await.unwrap();
    let movies = report.domain(MOVIE).unwrap();
    assert_eq!(movies.outcome, SyncOutcome::Cancelled);
    assert_eq!(movies.counts.added, 1);
    assert!(movies.generation.is_none());
    assert!(harness.files("movies").is_empty());
    assert!(!harness.service.is_running(MOVIE).await);

    let stats = harness.service.get_statistics().await.unwrap();
    assert_eq!(stats.domains[&MOVIE].total, 1);

    let runs = harness.service.recent_runs(Some(MOVIE), 5).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].outcome, SyncOutcome::Cancelled);

    // The next run picks up where the cancelled one stopped
    let next = harness.sync(MOVIE).await;
    assert_eq!(next.outcome, SyncOutcome::Succeeded);
    assert_eq!(next.counts.added, 1);
    assert_eq!(
        harness.files("movies"),
        vec!["Alpha/Alpha.strm", "Zulu/Zulu.strm"]
    );
}

#[tokio::test]
async fn test_cancel_by_run_id_after_run_ended_reports_false() {
    let harness = Harness::new().await;
    two_categories(&harness);

    let handle = harness
        .service
        .trigger_sync(SyncTarget::Domain(MOVIE))
        .await
        .unwrap();
    let run_id = handle.run_id();
    handle.wait().await.unwrap();

    assert!(!harness.service.cancel_run(run_id).await);
}

#[tokio::test]
async fn test_progress_ends_idle_for_each_domain() {
    let harness = Harness::new().await;
    two_categories(&harness);
    let mut progress = harness.service.subscribe();

    let report = harness.sync_target(SyncTarget::Domain(MOVIE)).await;

    let mut stages = Vec::new();
    while let Ok(event) = progress.try_recv() {
        assert_eq!(event.run_id, report.run_id);
        stages.push(event.stage);
    }
    assert_eq!(stages.first(), Some(&SyncStage::Fetching));
    assert_eq!(stages.last(), Some(&SyncStage::Idle));
    assert!(stages.contains(&SyncStage::Generating));
}

#[tokio::test]
async fn test_clear_cache_keeps_category_choices() {
    let harness = Harness::new().await;
    two_categories(&harness);
    harness.sync(MOVIE).await;
    harness
        .service
        .set_category_visibility(MOVIE, "2", false)
        .await
        .unwrap();

    let removed = harness.service.clear_cache(Some(MOVIE)).await.unwrap();
    assert!(removed >= 1);
    let stats = harness.service.get_statistics().await.unwrap();
    assert_eq!(stats.domains[&MOVIE].total, 0);

    let categories = harness.service.list_categories(MOVIE).await.unwrap();
    assert_eq!(categories.len(), 2);
    assert!(categories.iter().any(|c| c.remote_id == "2" && !c.visible));
}
