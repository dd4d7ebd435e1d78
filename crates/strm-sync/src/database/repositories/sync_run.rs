//! SeaORM-based repository for the sync run audit log
//!
//! Rows are inserted when a domain run starts and finalized exactly once.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, NotSet, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::entities::{prelude::SyncRuns, sync_runs};
use crate::errors::{AppError, AppResult};
use crate::models::{ContentDomain, DomainReport, SyncOutcome, SyncRun};

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncRunRepository;

impl SyncRunRepository {
    /// Open a `running` row for a domain run
    pub async fn start<C: ConnectionTrait>(
        &self,
        db: &C,
        run_id: Uuid,
        domain: ContentDomain,
        started_at: DateTime<Utc>,
    ) -> AppResult<i32> {
        let active = sync_runs::ActiveModel {
            id: NotSet,
            run_id: Set(run_id.to_string()),
            domain: Set(domain.to_string()),
            started_at: Set(started_at),
            finished_at: Set(None),
            outcome: Set(SyncOutcome::Running.to_string()),
            stage: Set(None),
            error: Set(None),
            items_added: Set(0),
            items_updated: Set(0),
            items_removed: Set(0),
            categories_failed: Set(0),
            omitted_categories: Set(None),
        };
        let result = SyncRuns::insert(active).exec(db).await?;
        Ok(result.last_insert_id)
    }

    /// Record the final state of a domain run
    pub async fn finish<C: ConnectionTrait>(
        &self,
        db: &C,
        id: i32,
        report: &DomainReport,
        finished_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let omitted = if report.omitted.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&report.omitted)
                    .map_err(|e| AppError::internal(e.to_string()))?,
            )
        };

        sync_runs::ActiveModel {
            id: Set(id),
            finished_at: Set(Some(finished_at)),
            outcome: Set(report.outcome.to_string()),
            stage: Set(Some(report.stage.to_string())),
            error: Set(report.error.clone()),
            items_added: Set(clamp(report.counts.added)),
            items_updated: Set(clamp(report.counts.updated)),
            items_removed: Set(clamp(report.counts.removed)),
            categories_failed: Set(clamp(report.omitted.len() as u64)),
            omitted_categories: Set(omitted),
            ..Default::default()
        }
        .update(db)
        .await?;
        Ok(())
    }

    /// Most recent runs first, optionally for one domain
    pub async fn recent<C: ConnectionTrait>(
        &self,
        db: &C,
        domain: Option<ContentDomain>,
        limit: u64,
    ) -> AppResult<Vec<SyncRun>> {
        let mut query = SyncRuns::find();
        if let Some(domain) = domain {
            query = query.filter(sync_runs::Column::Domain.eq(domain.as_ref()));
        }
        let models = query
            .order_by_desc(sync_runs::Column::StartedAt)
            .order_by_desc(sync_runs::Column::Id)
            .limit(limit)
            .all(db)
            .await?;

        Ok(models.into_iter().map(Self::model_to_domain).collect())
    }

    fn model_to_domain(model: sync_runs::Model) -> SyncRun {
        SyncRun {
            id: model.id,
            run_id: Uuid::parse_str(&model.run_id).unwrap_or_default(),
            domain: ContentDomain::from_db(&model.domain),
            started_at: model.started_at,
            finished_at: model.finished_at,
            outcome: model.outcome.parse().unwrap_or(SyncOutcome::Failed),
            stage: model.stage.and_then(|s| s.parse().ok()),
            error: model.error,
            items_added: model.items_added,
            items_updated: model.items_updated,
            items_removed: model.items_removed,
            categories_failed: model.categories_failed,
            omitted_categories: model
                .omitted_categories
                .and_then(|json| serde_json::from_str(&json).ok())
                .unwrap_or_default(),
        }
    }
}

fn clamp(value: u64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::models::{ReconcileCounts, SyncStage};

    #[tokio::test]
    async fn test_start_finish_and_list() {
        let db = Database::in_memory().await.unwrap();
        let repo = SyncRunRepository;
        let run_id = Uuid::new_v4();

        let id = repo
            .start(&*db.connection, run_id, ContentDomain::Live, Utc::now())
            .await
            .unwrap();
        let running = repo.recent(&*db.connection, None, 10).await.unwrap();
        assert_eq!(running[0].outcome, SyncOutcome::Running);
        assert!(running[0].finished_at.is_none());

        let report = DomainReport {
            domain: ContentDomain::Live,
            outcome: SyncOutcome::Partial,
            stage: SyncStage::Idle,
            counts: ReconcileCounts {
                added: 3,
                updated: 1,
                removed: 0,
            },
            omitted: vec!["Sports".to_string()],
            generation: None,
            error: None,
        };
        repo.finish(&*db.connection, id, &report, Utc::now())
            .await
            .unwrap();

        let runs = repo
            .recent(&*db.connection, Some(ContentDomain::Live), 10)
            .await
            .unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, run_id);
        assert_eq!(runs[0].outcome, SyncOutcome::Partial);
        assert_eq!(runs[0].items_added, 3);
        assert_eq!(runs[0].categories_failed, 1);
        assert_eq!(runs[0].omitted_categories, vec!["Sports".to_string()]);

        assert!(
            repo.recent(&*db.connection, Some(ContentDomain::Movie), 10)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
