//! Service facade over the sync engine
//!
//! [`SyncService`] is the single entry point for callers (the CLI, or an embedding
//! application): it triggers and cancels runs, and exposes the cache administration
//! operations with the same run-lock rules the orchestrator obeys.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::orchestrator::SyncOrchestrator;
use super::state_manager::{DomainRunState, SyncStateManager};
use crate::config::Config;
use crate::database::{CatalogCache, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{
    CatalogStatistics, Category, ContentDomain, SyncProgress, SyncReport, SyncRun, SyncTarget,
};
use crate::sources::{CatalogProvider, XtreamProvider};

/// A triggered run.
pub struct RunHandle {
    run_id: Uuid,
    domains: Vec<ContentDomain>,
    cancel: CancellationToken,
    task: JoinHandle<SyncReport>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn domains(&self) -> &[ContentDomain] {
        &self.domains
    }

    /// Ask the run to stop at the next category boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to end.
    pub async fn wait(self) -> AppResult<SyncReport> {
        self.task
            .await
            .map_err(|e| AppError::internal(format!("Sync run {} aborted: {e}", self.run_id)))
    }
}

#[derive(Clone)]
pub struct SyncService {
    cache: CatalogCache,
    /// `None` without a usable provider; cache operations still work
    orchestrator: Option<Arc<SyncOrchestrator>>,
    provider_error: Option<String>,
    state: SyncStateManager,
    enabled_domains: Vec<ContentDomain>,
}

impl SyncService {
    pub fn new(cache: CatalogCache, provider: Arc<dyn CatalogProvider>, config: &Config) -> Self {
        let state = SyncStateManager::new();
        let orchestrator = SyncOrchestrator::new(cache.clone(), provider, config, state.clone());
        Self {
            cache,
            orchestrator: Some(Arc::new(orchestrator)),
            provider_error: None,
            state,
            enabled_domains: config.sync.domains.clone(),
        }
    }

    /// A service over the cache alone. Triggering a sync fails with `reason`.
    pub fn offline(cache: CatalogCache, config: &Config, reason: impl Into<String>) -> Self {
        Self {
            cache,
            orchestrator: None,
            provider_error: Some(reason.into()),
            state: SyncStateManager::new(),
            enabled_domains: config.sync.domains.clone(),
        }
    }

    /// Open the configured database, migrate it and connect the Xtream provider.
    ///
    /// A missing or invalid provider only disables syncing.
    pub async fn from_config(config: &Config) -> AppResult<Self> {
        config.validate()?;
        let database = Database::new(&config.database).await?;
        database.migrate().await?;
        let cache = CatalogCache::new(database);

        match config
            .validate_provider()
            .and_then(|()| XtreamProvider::new(&config.provider))
        {
            Ok(provider) => Ok(Self::new(cache, Arc::new(provider), config)),
            Err(e) => {
                debug!("Provider unavailable, cache commands only: {}", e);
                Ok(Self::offline(cache, config, e.to_string()))
            }
        }
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    /// Start a run in the background.
    ///
    /// Fails with the busy error, without queueing, when any requested domain is already
    /// running.
    pub async fn trigger_sync(&self, target: SyncTarget) -> AppResult<RunHandle> {
        let Some(orchestrator) = self.orchestrator.clone() else {
            return Err(AppError::configuration(
                self.provider_error
                    .clone()
                    .unwrap_or_else(|| "No provider configured".to_string()),
            ));
        };
        let domains = target.domains(&self.enabled_domains);
        if domains.is_empty() {
            return Err(AppError::validation("No enabled domain to sync"));
        }

        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        self.state.try_start(run_id, &domains, &cancel).await?;
        info!("Triggered sync run {} for {:?}", run_id, domains);

        let task_domains = domains.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            orchestrator
                .run(run_id, &task_domains, &task_cancel)
                .await
        });

        Ok(RunHandle {
            run_id,
            domains,
            cancel,
            task,
        })
    }

    /// Cancel a run. Returns false when the run already ended.
    pub async fn cancel(&self, handle: &RunHandle) -> bool {
        handle.cancel();
        self.state.cancel(handle.run_id).await
    }

    pub async fn cancel_run(&self, run_id: Uuid) -> bool {
        self.state.cancel(run_id).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncProgress> {
        self.state.subscribe()
    }

    pub async fn progress(&self) -> HashMap<ContentDomain, DomainRunState> {
        self.state.get_all_progress().await
    }

    pub async fn is_running(&self, domain: ContentDomain) -> bool {
        self.state.is_running(domain).await
    }

    pub async fn get_statistics(&self) -> AppResult<CatalogStatistics> {
        self.cache.statistics().await
    }

    /// Drop cached items. Refused while an affected domain is syncing.
    ///
    /// The affected domains stay locked until the rows are gone, so no run starts on a
    /// half-cleared cache.
    pub async fn clear_cache(&self, domain: Option<ContentDomain>) -> AppResult<u64> {
        let affected = match domain {
            Some(domain) => vec![domain],
            None => ContentDomain::ALL.to_vec(),
        };
        self.state
            .try_start(Uuid::new_v4(), &affected, &CancellationToken::new())
            .await?;

        let cleared = {
            let _writer = self.cache.database().write_access().await;
            self.cache.clear(domain).await
        };
        for domain in &affected {
            self.state.finish(*domain).await;
        }
        cleared
    }

    pub async fn list_categories(&self, domain: ContentDomain) -> AppResult<Vec<Category>> {
        self.cache.list_categories(domain).await
    }

    /// Show or hide a category. Takes effect on the next sync of its domain.
    pub async fn set_category_visibility(
        &self,
        domain: ContentDomain,
        remote_id: &str,
        visible: bool,
    ) -> AppResult<Category> {
        let _writer = self.cache.database().write_access().await;
        self.cache
            .set_category_visibility(domain, remote_id, visible)
            .await
    }

    pub async fn set_item_visibility(
        &self,
        domain: ContentDomain,
        remote_id: &str,
        visible: bool,
    ) -> AppResult<()> {
        let _writer = self.cache.database().write_access().await;
        self.cache
            .set_item_visibility(domain, remote_id, visible)
            .await
    }

    pub async fn recent_runs(
        &self,
        domain: Option<ContentDomain>,
        limit: u64,
    ) -> AppResult<Vec<SyncRun>> {
        self.cache.recent_runs(domain, limit).await
    }

    pub async fn vacuum(&self) -> AppResult<()> {
        let _writer = self.cache.database().write_access().await;
        self.cache.vacuum().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RemoteCategory, RemoteLiveChannel, SyncOutcome};
    use crate::sources::MemoryProvider;
    use tempfile::TempDir;

    fn config(temp: &TempDir) -> Config {
        let mut config = Config::default();
        config.library.movies_path = temp.path().join("movies");
        config.library.series_path = temp.path().join("series");
        config.library.live_path = temp.path().join("live");
        config.reconciliation.new_category_visible = true;
        config.epg.enabled = false;
        config
    }

    async fn service(temp: &TempDir, provider: Arc<MemoryProvider>) -> SyncService {
        let cache = CatalogCache::new(Database::in_memory().await.unwrap());
        SyncService::new(cache, provider, &config(temp))
    }

    fn live_catalog(provider: &MemoryProvider) {
        provider.set_categories(
            ContentDomain::Live,
            vec![RemoteCategory {
                remote_id: "1".to_string(),
                name: "News".to_string(),
            }],
        );
        provider.set_items(
            ContentDomain::Live,
            "1",
            vec![RemoteLiveChannel {
                remote_id: "10".to_string(),
                name: "News 24".to_string(),
                stream_url: "http://p/live/u/p/10.ts".to_string(),
                epg_channel_id: None,
                logo_url: None,
                tv_archive: false,
            }],
        );
    }

    #[tokio::test]
    async fn test_second_trigger_for_running_domain_is_busy() {
        let temp = TempDir::new().unwrap();
        let provider = Arc::new(MemoryProvider::new());
        live_catalog(&provider);
        let service = service(&temp, provider).await;

        // Hold the lock as a run would
        let other = CancellationToken::new();
        service
            .state
            .try_start(Uuid::new_v4(), &[ContentDomain::Live], &other)
            .await
            .unwrap();

        let err = service
            .trigger_sync(SyncTarget::Domain(ContentDomain::Live))
            .await
            .err()
            .unwrap();
        assert!(err.is_busy());
        assert!(service.clear_cache(Some(ContentDomain::Live)).await.unwrap_err().is_busy());
        assert!(service.clear_cache(None).await.unwrap_err().is_busy());
        // Other domains are unaffected
        assert!(service.clear_cache(Some(ContentDomain::Movie)).await.is_ok());
    }

    #[tokio::test]
    async fn test_clear_cache_holds_run_locks_until_done() {
        let temp = TempDir::new().unwrap();
        let provider = Arc::new(MemoryProvider::new());
        live_catalog(&provider);
        let service = service(&temp, provider).await;

        let writer = service.cache().database().write_access().await;
        let clearing = tokio::spawn({
            let service = service.clone();
            async move { service.clear_cache(Some(ContentDomain::Live)).await }
        });
        while !service.is_running(ContentDomain::Live).await {
            tokio::task::yield_now().await;
        }
        let err = service
            .trigger_sync(SyncTarget::Domain(ContentDomain::Live))
            .await
            .err()
            .unwrap();
        assert!(err.is_busy());

        drop(writer);
        assert_eq!(clearing.await.unwrap().unwrap(), 0);
        assert!(!service.is_running(ContentDomain::Live).await);
        let handle = service
            .trigger_sync(SyncTarget::Domain(ContentDomain::Live))
            .await
            .unwrap();
        handle.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_without_provider_only_syncing_is_refused() {
        let temp = TempDir::new().unwrap();
        let mut config = config(&temp);
        config.provider.base_url = String::new();
        config.database.url = format!("sqlite://{}", temp.path().join("cache.db").display());

        let service = SyncService::from_config(&config).await.unwrap();
        assert!(service.get_statistics().await.is_ok());
        assert!(service.list_categories(ContentDomain::Movie).await.unwrap().is_empty());
        assert!(service.recent_runs(None, 5).await.unwrap().is_empty());

        let err = service.trigger_sync(SyncTarget::All).await.err().unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));
        assert!(err.to_string().contains("provider.base_url"));
    }

    #[tokio::test]
    async fn test_run_releases_lock_and_records_audit_row() {
        let temp = TempDir::new().unwrap();
        let provider = Arc::new(MemoryProvider::new());
        live_catalog(&provider);
        let service = service(&temp, provider).await;
        let mut progress = service.subscribe();

        let handle = service
            .trigger_sync(SyncTarget::Domain(ContentDomain::Live))
            .await
            .unwrap();
        let report = handle.wait().await.unwrap();

        let live = report.domain(ContentDomain::Live).unwrap();
        assert_eq!(live.outcome, SyncOutcome::Succeeded);
        assert_eq!(live.counts.added, 1);
        assert!(!service.is_running(ContentDomain::Live).await);

        let runs = service.recent_runs(Some(ContentDomain::Live), 10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].outcome, SyncOutcome::Succeeded);
        assert_eq!(runs[0].items_added, 1);

        let first = progress.recv().await.unwrap();
        assert_eq!(first.domain, ContentDomain::Live);
        assert_eq!(first.run_id, report.run_id);
    }

    #[tokio::test]
    async fn test_cancel_through_service() {
        let temp = TempDir::new().unwrap();
        let provider = Arc::new(MemoryProvider::new());
        live_catalog(&provider);
        let service = service(&temp, provider).await;

        let handle = service
            .trigger_sync(SyncTarget::Domain(ContentDomain::Live))
            .await
            .unwrap();
        assert!(service.cancel(&handle).await);
        let report = handle.wait().await.unwrap();

        assert_eq!(
            report.domain(ContentDomain::Live).unwrap().outcome,
            SyncOutcome::Cancelled
        );
        assert!(!temp.path().join("live/playlist.m3u8").exists());
    }
}
