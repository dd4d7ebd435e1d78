//! Catalog reconciliation
//!
//! A domain run has two phases. [`Reconciler::fetch_domain`] collects everything the run
//! needs from the provider without holding the cache. [`Reconciler::apply_domain`] then
//! merges the collected data inside a single [`CacheSession`]. The same engine drives
//! every domain; domains differ only in their [`DomainStore`] and in an optional follow-up
//! step per category (movie metadata enrichment, series episode lists).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod descriptor;
pub mod engine;
pub mod fetch;
pub mod hashing;

pub use descriptor::{CachedRow, CatalogItem, DomainStore};
pub use engine::{AppliedItem, ChangeKind, ScopeReconciler};
pub use fetch::{Details, DomainFetch, FetchedScope, FetchedScopes, Snapshot};
pub use hashing::ContentHasher;

use crate::config::{Config, EpgConfig, ReconciliationConfig};
use crate::database::repositories::{
    EpisodeRepository, LiveChannelRepository, MovieRepository, SeriesRepository,
};
use crate::database::{CacheSession, CatalogCache};
use crate::errors::{AppError, AppResult, ProviderError, ProviderResult};
use crate::models::{
    Category, ContentDomain, EpgEntry, ReconcileCounts, RemoteCategory, RemoteEpisode,
    RemoteMovie, RemoteRecord, RemoteSeries, SyncStage,
};
use crate::sources::CatalogProvider;
use crate::sync::ProgressReporter;

/// What one domain reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainOutcome {
    pub counts: ReconcileCounts,
    /// Categories, series or the guide skipped after transient provider failures
    pub omitted: Vec<String>,
    /// The run stopped early; processed categories are still applied
    pub cancelled: bool,
    pub epg_changed: bool,
}

#[derive(Debug, Default)]
struct Tally {
    counts: ReconcileCounts,
    omitted: Vec<String>,
}

/// Per-domain reconciliation against a catalog provider.
pub struct Reconciler {
    provider: Arc<dyn CatalogProvider>,
    settings: ReconciliationConfig,
    epg: EpgConfig,
    fetch_concurrency: usize,
}

impl Reconciler {
    pub fn new(provider: Arc<dyn CatalogProvider>, config: &Config) -> Self {
        Self {
            provider,
            settings: config.reconciliation.clone(),
            epg: config.epg.clone(),
            fetch_concurrency: config.provider.fetch_concurrency.max(1),
        }
    }

    /// Collect the provider side of a domain run.
    ///
    /// Only reads committed cache state, so other domains keep writing meanwhile. Returns
    /// `Err` for fatal provider failures; nothing has been changed at that point.
    pub async fn fetch_domain(
        &self,
        cache: &CatalogCache,
        domain: ContentDomain,
        cancel: &CancellationToken,
        progress: Option<&ProgressReporter>,
    ) -> AppResult<DomainFetch> {
        report(progress, SyncStage::Fetching, "Fetching categories", 0, 0).await;

        let categories: Vec<RemoteCategory> = self
            .provider
            .fetch_categories(domain)
            .try_collect()
            .await?;
        info!(
            "Provider {} lists {} {} categories",
            self.provider.name(),
            categories.len(),
            domain
        );

        let mut details = Details::new();
        let mut omitted = Vec::new();
        let scopes = match domain {
            ContentDomain::Movie => {
                let enrichment = MovieEnrichment {
                    enabled: self.settings.enrich_movie_metadata,
                };
                FetchedScopes::Movies(
                    self.fetch_scopes(
                        cache,
                        domain,
                        &MovieRepository,
                        &enrichment,
                        &categories,
                        &mut details,
                        &mut omitted,
                        cancel,
                        progress,
                    )
                    .await?,
                )
            }
            ContentDomain::Series => {
                let episodes = EpisodeSync {
                    grace_runs: self.settings.grace_runs,
                };
                FetchedScopes::Series(
                    self.fetch_scopes(
                        cache,
                        domain,
                        &SeriesRepository,
                        &episodes,
                        &categories,
                        &mut details,
                        &mut omitted,
                        cancel,
                        progress,
                    )
                    .await?,
                )
            }
            ContentDomain::Live => FetchedScopes::Live(
                self.fetch_scopes(
                    cache,
                    domain,
                    &LiveChannelRepository,
                    &NoFollowUp,
                    &categories,
                    &mut details,
                    &mut omitted,
                    cancel,
                    progress,
                )
                .await?,
            ),
        };

        let cancelled = cancel.is_cancelled();
        if cancelled {
            info!(
                "{} fetch cancelled after {} categories",
                domain,
                scopes.len()
            );
        }

        let guide = if domain == ContentDomain::Live && self.epg.enabled && !cancelled {
            report(progress, SyncStage::Fetching, "Fetching guide", 0, 0).await;
            self.fetch_guide(&mut omitted).await?
        } else {
            None
        };

        Ok(DomainFetch {
            domain,
            categories,
            scopes,
            details,
            guide,
            omitted,
            cancelled,
        })
    }

    /// Merge a fetched domain into the cache through `session`.
    ///
    /// Returns `Err` for cache errors; the caller then rolls the session back.
    pub async fn apply_domain(
        &self,
        session: &CacheSession,
        fetched: DomainFetch,
        progress: Option<&ProgressReporter>,
    ) -> AppResult<DomainOutcome> {
        let DomainFetch {
            domain,
            categories: remote,
            scopes,
            mut details,
            guide,
            omitted,
            cancelled,
        } = fetched;
        if domain != session.domain() {
            return Err(AppError::internal(format!(
                "Fetched {} data applied to a {} session",
                domain,
                session.domain()
            )));
        }

        let categories = session
            .upsert_categories(
                &remote,
                self.settings.new_category_visible,
                self.settings.grace_runs,
            )
            .await?;
        if categories.added > 0 || categories.renamed > 0 || !categories.missing.is_empty() {
            info!(
                "{} categories: {} new, {} renamed, {} missing",
                domain,
                categories.added,
                categories.renamed,
                categories.missing.len()
            );
        }
        let expired: Vec<i32> = categories.expired.iter().map(|c| c.id).collect();
        let present: HashMap<String, Category> = categories
            .present
            .into_iter()
            .map(|c| (c.remote_id.clone(), c))
            .collect();

        let mut tally = Tally {
            counts: ReconcileCounts::default(),
            omitted,
        };
        let context = ApplyContext {
            session,
            expired_categories: &expired,
            present: &present,
            cancelled,
            progress,
        };
        match scopes {
            FetchedScopes::Movies(scopes) => {
                let enrichment = MovieEnrichment {
                    enabled: self.settings.enrich_movie_metadata,
                };
                self.apply_scopes(
                    &context,
                    &MovieRepository,
                    &enrichment,
                    scopes,
                    &mut details,
                    &mut tally,
                )
                .await?
            }
            FetchedScopes::Series(scopes) => {
                let episodes = EpisodeSync {
                    grace_runs: self.settings.grace_runs,
                };
                self.apply_scopes(
                    &context,
                    &SeriesRepository,
                    &episodes,
                    scopes,
                    &mut details,
                    &mut tally,
                )
                .await?
            }
            FetchedScopes::Live(scopes) => {
                self.apply_scopes(
                    &context,
                    &LiveChannelRepository,
                    &NoFollowUp,
                    scopes,
                    &mut details,
                    &mut tally,
                )
                .await?
            }
        }

        let epg_changed = match guide {
            Some(entries) => self.apply_guide(session, entries).await?,
            None => false,
        };

        Ok(DomainOutcome {
            counts: tally.counts,
            omitted: tally.omitted,
            cancelled,
            epg_changed,
        })
    }

    /// Fetch the item lists of every visible category, and the detail records the
    /// follow-up step will need.
    #[allow(clippy::too_many_arguments)]
    async fn fetch_scopes<S, F>(
        &self,
        cache: &CatalogCache,
        domain: ContentDomain,
        store: &S,
        follow_up: &F,
        categories: &[RemoteCategory],
        details: &mut Details,
        omitted: &mut Vec<String>,
        cancel: &CancellationToken,
        progress: Option<&ProgressReporter>,
    ) -> AppResult<Vec<FetchedScope<S::Item>>>
    where
        S: DomainStore,
        F: FollowUp<S::Item>,
    {
        let snapshot = Snapshot::load(cache.database(), domain, store).await?;

        let mut listed = HashSet::new();
        let targets: Vec<(RemoteCategory, Option<i32>)> = categories
            .iter()
            .filter(|c| listed.insert(c.remote_id.clone()))
            .filter_map(|c| match snapshot.category(&c.remote_id) {
                Some(cached) if cached.visible => Some((c.clone(), Some(cached.id))),
                Some(_) => None,
                None if self.settings.new_category_visible => Some((c.clone(), None)),
                None => None,
            })
            .collect();

        let total = targets.len();
        let provider = self.provider.clone();
        let mut fetches = stream::iter(targets.into_iter())
            .map(move |(category, scope_id)| {
                let provider = provider.clone();
                async move {
                    let result: ProviderResult<Vec<RemoteRecord>> = provider
                        .fetch_items(domain, &category.remote_id)
                        .try_collect()
                        .await;
                    (category, scope_id, result)
                }
            })
            .buffered(self.fetch_concurrency);

        let mut scopes = Vec::new();
        let mut seen = HashSet::new();
        let mut done = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = fetches.next() => next,
            };
            let Some((category, scope_id, result)) = next else {
                break;
            };
            if cancel.is_cancelled() {
                break;
            }
            done += 1;

            let records = match result {
                Ok(records) => records,
                Err(e) if e.is_transient() => {
                    warn!(
                        "Skipping {} category '{}' this run: {}",
                        domain, category.name, e
                    );
                    omitted.push(category.name);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            report(progress, SyncStage::Fetching, &category.name, done, total).await;

            let items = typed_items::<S::Item>(records, &category.name);
            debug!(
                "{} category '{}': {} items",
                domain,
                category.name,
                items.len()
            );

            let mut wanted = Vec::new();
            for item in &items {
                // Only the first listing of an item is applied
                if seen.insert(item.key()) && follow_up.wants_detail(&snapshot, item, scope_id) {
                    wanted.push((item.remote_id().to_string(), item.label().to_string()));
                }
            }
            self.fetch_details(domain, wanted, follow_up.detail_required(), details, cancel)
                .await?;

            scopes.push(FetchedScope {
                category_remote_id: category.remote_id,
                name: category.name,
                items,
            });
        }

        Ok(scopes)
    }

    async fn fetch_details(
        &self,
        domain: ContentDomain,
        wanted: Vec<(String, String)>,
        required: bool,
        details: &mut Details,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        if wanted.is_empty() {
            return Ok(());
        }

        let provider = self.provider.clone();
        let mut fetches = stream::iter(wanted.into_iter())
            .map(move |(remote_id, label)| {
                let provider = provider.clone();
                async move {
                    let result: ProviderResult<Vec<RemoteRecord>> = provider
                        .fetch_item_detail(domain, &remote_id)
                        .try_collect()
                        .await;
                    (remote_id, label, result)
                }
            })
            .buffered(self.fetch_concurrency);

        while let Some((remote_id, label, result)) = fetches.next().await {
            if cancel.is_cancelled() {
                break;
            }
            match result {
                Err(e) if required && !e.is_transient() => {
                    return Err(fatal_detail(e, domain, &label).into());
                }
                result => {
                    details.insert(remote_id, result);
                }
            }
        }
        Ok(())
    }

    /// The guide restricted to the configured window. `None` when a transient failure
    /// means the stored guide has to be kept.
    async fn fetch_guide(&self, omitted: &mut Vec<String>) -> AppResult<Option<Vec<EpgEntry>>> {
        let now = Utc::now();
        let earliest =
            (self.epg.days_behind > 0).then(|| now - Duration::days(i64::from(self.epg.days_behind)));
        let latest =
            (self.epg.days_ahead > 0).then(|| now + Duration::days(i64::from(self.epg.days_ahead)));

        let mut entries: Vec<EpgEntry> = Vec::new();
        let mut outside = 0usize;
        let mut feed = self.provider.fetch_epg();
        while let Some(record) = feed.next().await {
            match record {
                Ok(RemoteRecord::EpgEntry(entry)) => {
                    if earliest.is_some_and(|t| entry.end < t) || latest.is_some_and(|t| entry.start > t)
                    {
                        outside += 1;
                        continue;
                    }
                    entries.push(entry);
                }
                Ok(other) => warn!("Ignoring {} record in the guide feed", other.kind()),
                Err(e) if e.is_transient() => {
                    warn!("Keeping the previous guide: {}", e);
                    omitted.push("EPG".to_string());
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }

        debug!(
            "Guide: {} programmes fetched, {} outside the window",
            entries.len(),
            outside
        );
        Ok(Some(entries))
    }

    /// Apply the fetched categories of one domain store. Purging is skipped for
    /// cancelled runs; their unseen rows are only struck.
    async fn apply_scopes<S, F>(
        &self,
        context: &ApplyContext<'_>,
        store: &S,
        follow_up: &F,
        scopes: Vec<FetchedScope<S::Item>>,
        details: &mut Details,
        tally: &mut Tally,
    ) -> AppResult<()>
    where
        S: DomainStore,
        F: FollowUp<S::Item>,
    {
        let session = context.session;
        let domain = session.domain();

        if !context.cancelled {
            tally.counts.removed += session
                .purge_categories(store, context.expired_categories)
                .await?;
            let hidden = session.purge_hidden(store).await?;
            if hidden > 0 {
                debug!("Purged {} {} rows of hidden categories", hidden, store.entity_name());
            }
            tally.counts.removed += hidden;
        }

        let mut scope =
            ScopeReconciler::begin(store, session.transaction(), session.now(), None).await?;
        let visible = self.settings.inherit_category_visibility;

        let total = scopes.len();
        for (done, fetched) in scopes.into_iter().enumerate() {
            let Some(category) = context
                .present
                .get(&fetched.category_remote_id)
                .filter(|c| c.visible)
            else {
                debug!(
                    "{} category '{}' was hidden during the fetch; not applied",
                    domain, fetched.name
                );
                continue;
            };
            report(
                context.progress,
                SyncStage::Reconciling,
                &category.name,
                done + 1,
                total,
            )
            .await;

            let applied = scope
                .apply(category.id, fetched.items, visible && category.visible)
                .await?;
            follow_up
                .after_category(session, &applied, details, tally)
                .await?;
        }

        tally.counts += scope
            .finish(self.settings.grace_runs, !context.cancelled)
            .await?;
        Ok(())
    }

    async fn apply_guide(&self, session: &CacheSession, mut entries: Vec<EpgEntry>) -> AppResult<bool> {
        let known = LiveChannelRepository
            .epg_channel_ids(session.transaction())
            .await?;
        entries.retain(|entry| known.contains(&entry.channel_remote_id));
        entries.sort();
        entries.dedup();
        debug!(
            "Guide: {} programmes for {} channels",
            entries.len(),
            known.len()
        );

        let changed = session.replace_epg(&entries).await?;
        if changed {
            info!("Replaced guide with {} programmes", entries.len());
        }
        Ok(changed)
    }
}

/// Run-wide state of the apply phase.
struct ApplyContext<'a> {
    session: &'a CacheSession,
    expired_categories: &'a [i32],
    /// Categories listed this run, by remote id
    present: &'a HashMap<String, Category>,
    cancelled: bool,
    progress: Option<&'a ProgressReporter>,
}

async fn report(
    progress: Option<&ProgressReporter>,
    stage: SyncStage,
    message: &str,
    done: usize,
    total: usize,
) {
    if let Some(progress) = progress {
        progress.categories(stage, message, done, total).await;
    }
}

/// Keep the records of the expected kind.
fn typed_items<I>(records: Vec<RemoteRecord>, category: &str) -> Vec<I>
where
    I: TryFrom<RemoteRecord, Error = RemoteRecord>,
{
    records
        .into_iter()
        .filter_map(|record| match I::try_from(record) {
            Ok(item) => Some(item),
            Err(other) => {
                warn!(
                    "Ignoring {} record listed under category '{}'",
                    other.kind(),
                    category
                );
                None
            }
        })
        .collect()
}

/// Work done for the items of a category right after they were applied.
///
/// The detail records it consumes are fetched beforehand, for the items
/// [`wants_detail`](FollowUp::wants_detail) picks against the snapshot.
#[async_trait]
trait FollowUp<I: CatalogItem>: Send + Sync {
    /// A fatal detail failure fails the whole run
    fn detail_required(&self) -> bool {
        false
    }

    fn wants_detail(&self, snapshot: &Snapshot<I::Key>, item: &I, scope_id: Option<i32>) -> bool;

    async fn after_category(
        &self,
        session: &CacheSession,
        applied: &[AppliedItem<I>],
        details: &mut Details,
        tally: &mut Tally,
    ) -> AppResult<()>;
}

struct NoFollowUp;

#[async_trait]
impl<I: CatalogItem> FollowUp<I> for NoFollowUp {
    fn wants_detail(&self, _: &Snapshot<I::Key>, _: &I, _: Option<i32>) -> bool {
        false
    }

    async fn after_category(
        &self,
        _session: &CacheSession,
        _applied: &[AppliedItem<I>],
        _details: &mut Details,
        _tally: &mut Tally,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Merges the detail endpoint into new and changed movies. Failures keep the list data.
struct MovieEnrichment {
    enabled: bool,
}

#[async_trait]
impl FollowUp<RemoteMovie> for MovieEnrichment {
    fn wants_detail(
        &self,
        snapshot: &Snapshot<String>,
        item: &RemoteMovie,
        scope_id: Option<i32>,
    ) -> bool {
        self.enabled && snapshot.change(item, scope_id) != ChangeKind::Unchanged
    }

    async fn after_category(
        &self,
        session: &CacheSession,
        applied: &[AppliedItem<RemoteMovie>],
        details: &mut Details,
        _tally: &mut Tally,
    ) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let mut enriched = 0;
        for applied in applied.iter().filter(|a| a.change != ChangeKind::Unchanged) {
            let Some(result) = details.remove(&applied.item.remote_id) else {
                continue;
            };
            let records = match result {
                Ok(records) => records,
                Err(e) => {
                    warn!(
                        "Keeping list metadata for movie '{}': {}",
                        applied.item.title, e
                    );
                    continue;
                }
            };
            let Some(detail) = records
                .into_iter()
                .find_map(|record| RemoteMovie::try_from(record).ok())
            else {
                continue;
            };

            let mut metadata = detail.metadata;
            metadata.merge_missing(applied.item.metadata.clone());
            if metadata != applied.item.metadata {
                MovieRepository
                    .update_metadata(session.transaction(), applied.row_id, &metadata)
                    .await?;
                enriched += 1;
            }
        }
        if enriched > 0 {
            debug!("Enriched metadata of {} movies", enriched);
        }
        Ok(())
    }
}

/// Refreshes the episode lists of new and changed series.
struct EpisodeSync {
    grace_runs: u32,
}

/// Without a change marker there is no way to tell whether episodes moved on
fn needs_episodes(
    change: ChangeKind,
    series: &RemoteSeries,
    content_hash: &str,
    episodes_hash: Option<&str>,
) -> bool {
    change == ChangeKind::Inserted
        || series.last_modified.is_none()
        || episodes_hash != Some(content_hash)
}

impl EpisodeSync {
    async fn apply_episodes(
        &self,
        session: &CacheSession,
        series: &AppliedItem<RemoteSeries>,
        records: Vec<RemoteRecord>,
    ) -> AppResult<ReconcileCounts> {
        let episodes = typed_items::<RemoteEpisode>(records, &series.item.title);
        let mut scope = ScopeReconciler::begin(
            &EpisodeRepository,
            session.transaction(),
            session.now(),
            Some(&[series.row_id]),
        )
        .await?;
        scope.apply(series.row_id, episodes, true).await?;
        let counts = scope.finish(self.grace_runs, true).await?;

        SeriesRepository
            .set_episodes_hash(session.transaction(), series.row_id, &series.content_hash)
            .await?;
        Ok(counts)
    }
}

#[async_trait]
impl FollowUp<RemoteSeries> for EpisodeSync {
    fn detail_required(&self) -> bool {
        true
    }

    fn wants_detail(
        &self,
        snapshot: &Snapshot<String>,
        item: &RemoteSeries,
        scope_id: Option<i32>,
    ) -> bool {
        let episodes_hash = snapshot
            .row(&item.remote_id)
            .and_then(|row| snapshot.episodes_hash(row.id));
        needs_episodes(
            snapshot.change(item, scope_id),
            item,
            &item.content_hash(),
            episodes_hash,
        )
    }

    async fn after_category(
        &self,
        session: &CacheSession,
        applied: &[AppliedItem<RemoteSeries>],
        details: &mut Details,
        tally: &mut Tally,
    ) -> AppResult<()> {
        let ids: Vec<i32> = applied.iter().map(|a| a.row_id).collect();
        let known = SeriesRepository
            .episodes_hashes(session.transaction(), &ids)
            .await?;

        for series in applied {
            let episodes_hash = known.get(&series.row_id).and_then(|h| h.as_deref());
            if !needs_episodes(series.change, &series.item, &series.content_hash, episodes_hash) {
                continue;
            }
            match details.remove(&series.item.remote_id) {
                Some(Ok(records)) => {
                    tally.counts += self.apply_episodes(session, series, records).await?;
                }
                Some(Err(e)) => {
                    warn!(
                        "Skipping episodes of series '{}' this run: {}",
                        series.item.title, e
                    );
                    tally.omitted.push(series.item.title.clone());
                }
                None => debug!(
                    "No episode list fetched for series '{}'; retried next run",
                    series.item.title
                ),
            }
        }
        Ok(())
    }
}

fn fatal_detail(error: ProviderError, domain: ContentDomain, label: &str) -> ProviderError {
    match error {
        ProviderError::Fatal { url, message } => ProviderError::Fatal {
            url,
            message: format!("detail of {domain} '{label}': {message}"),
        },
        other => other,
    }
}
