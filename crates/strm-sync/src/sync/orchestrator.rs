//! Runs domains through fetch, reconcile and generate.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::state_manager::{ProgressReporter, SyncStateManager};
use crate::config::Config;
use crate::database::CatalogCache;
use crate::database::repositories::SyncRunRepository;
use crate::errors::{AppError, AppResult};
use crate::generator::ArtifactGenerator;
use crate::models::{
    ContentDomain, DomainReport, ReconcileCounts, SyncOutcome, SyncReport, SyncStage,
};
use crate::reconciler::{DomainOutcome, Reconciler};
use crate::sources::CatalogProvider;

/// Drives domain runs. Callers lock the domains in [`SyncStateManager`] first; each
/// domain's lock is released when its run ends.
pub struct SyncOrchestrator {
    cache: CatalogCache,
    reconciler: Reconciler,
    generator: ArtifactGenerator,
    state: SyncStateManager,
    parallel_domains: bool,
}

impl SyncOrchestrator {
    pub fn new(
        cache: CatalogCache,
        provider: Arc<dyn CatalogProvider>,
        config: &Config,
        state: SyncStateManager,
    ) -> Self {
        Self {
            cache,
            reconciler: Reconciler::new(provider, config),
            generator: ArtifactGenerator::new(config),
            state,
            parallel_domains: config.sync.parallel_domains,
        }
    }

    /// Run every domain of a triggered sync. One domain failing never stops the others.
    pub async fn run(
        &self,
        run_id: Uuid,
        domains: &[ContentDomain],
        cancel: &CancellationToken,
    ) -> SyncReport {
        info!(
            "Sync run {} started for {} domain(s)",
            run_id,
            domains.len()
        );

        let reports = if self.parallel_domains {
            join_all(
                domains
                    .iter()
                    .map(|domain| self.run_domain(run_id, *domain, cancel)),
            )
            .await
        } else {
            let mut reports = Vec::with_capacity(domains.len());
            for domain in domains {
                reports.push(self.run_domain(run_id, *domain, cancel).await);
            }
            reports
        };

        info!("Sync run {} finished", run_id);
        SyncReport {
            run_id,
            domains: reports,
        }
    }

    /// Run one domain and release its lock.
    pub async fn run_domain(
        &self,
        run_id: Uuid,
        domain: ContentDomain,
        cancel: &CancellationToken,
    ) -> DomainReport {
        let reporter = self.state.reporter(run_id, domain);
        let report = self.execute(run_id, domain, cancel, &reporter).await;

        match report.outcome {
            SyncOutcome::Failed => {
                error!(
                    "{} sync failed during {}: {}",
                    domain,
                    report.stage,
                    report.error.as_deref().unwrap_or("unknown error")
                );
                reporter
                    .stage(
                        SyncStage::Failed,
                        report.error.clone().unwrap_or_default(),
                    )
                    .await;
            }
            outcome => {
                info!(
                    "{} sync {}: {} added, {} updated, {} removed, {} omitted",
                    domain,
                    outcome,
                    report.counts.added,
                    report.counts.updated,
                    report.counts.removed,
                    report.omitted.len()
                );
                reporter.stage(SyncStage::Idle, outcome.to_string()).await;
            }
        }

        self.state.finish(domain).await;
        report
    }

    async fn execute(
        &self,
        run_id: Uuid,
        domain: ContentDomain,
        cancel: &CancellationToken,
        reporter: &ProgressReporter,
    ) -> DomainReport {
        let database = self.cache.database();
        let mut report = DomainReport {
            domain,
            outcome: SyncOutcome::Succeeded,
            stage: SyncStage::Idle,
            counts: ReconcileCounts::default(),
            omitted: Vec::new(),
            generation: None,
            error: None,
        };

        if cancel.is_cancelled() {
            report.outcome = SyncOutcome::Cancelled;
            return report;
        }

        let audit_id = {
            let _writer = database.write_access().await;
            match SyncRunRepository
                .start(&*database.connection, run_id, domain, Utc::now())
                .await
            {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("Could not record the start of the {} run: {}", domain, e);
                    None
                }
            }
        };
        reporter.stage(SyncStage::Fetching, "Starting").await;
        let reconciled = self.reconcile(domain, cancel, reporter).await;

        match reconciled {
            Err(e) => {
                report.outcome = SyncOutcome::Failed;
                report.stage = match e {
                    AppError::Provider(_) => SyncStage::Fetching,
                    _ => SyncStage::Reconciling,
                };
                report.error = Some(e.to_string());
            }
            Ok(DomainOutcome {
                counts,
                omitted,
                cancelled,
                ..
            }) => {
                report.counts = counts;
                report.omitted = omitted;
                report.stage = SyncStage::Reconciling;

                if cancelled {
                    info!("{} run cancelled; generation skipped", domain);
                    report.outcome = SyncOutcome::Cancelled;
                } else {
                    self.generate(domain, reporter, &mut report).await;
                }
            }
        }

        if let Some(id) = audit_id {
            let _writer = database.write_access().await;
            if let Err(e) = SyncRunRepository
                .finish(&*database.connection, id, &report, Utc::now())
                .await
            {
                warn!("Could not record the end of the {} run: {}", domain, e);
            }
        }

        report
    }

    /// Fetch without holding the cache, then apply inside one cache session under the
    /// write gate: commit on success, roll back on error.
    async fn reconcile(
        &self,
        domain: ContentDomain,
        cancel: &CancellationToken,
        reporter: &ProgressReporter,
    ) -> AppResult<DomainOutcome> {
        let fetched = self
            .reconciler
            .fetch_domain(&self.cache, domain, cancel, Some(reporter))
            .await?;

        let _writer = self.cache.database().write_access().await;
        let session = self.cache.begin_session(domain).await?;
        match self
            .reconciler
            .apply_domain(&session, fetched, Some(reporter))
            .await
        {
            Ok(outcome) => {
                session.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback) = session.rollback().await {
                    warn!("Rollback of the {} session failed: {}", domain, rollback);
                }
                Err(e)
            }
        }
    }

    async fn generate(
        &self,
        domain: ContentDomain,
        reporter: &ProgressReporter,
        report: &mut DomainReport,
    ) {
        report.stage = SyncStage::Generating;
        reporter
            .stage(SyncStage::Generating, "Writing library files")
            .await;

        match self.generator.generate(&self.cache, domain).await {
            Ok(summary) => {
                if summary.failed > 0 || !report.omitted.is_empty() {
                    report.outcome = SyncOutcome::Partial;
                }
                if summary.failed > 0 {
                    report.error = Some(format!("{} file(s) could not be written", summary.failed));
                }
                report.generation = Some(summary);
            }
            Err(e) => {
                report.outcome = SyncOutcome::Failed;
                report.error = Some(e.to_string());
            }
        }
    }
}
