//! Transaction handle scoped to a single domain run

use chrono::{DateTime, Utc};
use sea_orm::DatabaseTransaction;
use tracing::debug;

use super::Database;
use super::repositories::{CategoryRepository, CategorySync, EpgEntryRepository};
use crate::errors::AppResult;
use crate::models::{ContentDomain, EpgEntry, RemoteCategory};
use crate::reconciler::DomainStore;

/// Exclusive cache context of one domain run.
///
/// Every change made through the session becomes visible together on [`commit`]. Dropping
/// the session without committing rolls all of it back.
///
/// [`commit`]: CacheSession::commit
pub struct CacheSession {
    txn: DatabaseTransaction,
    domain: ContentDomain,
    now: DateTime<Utc>,
}

impl CacheSession {
    pub async fn begin(database: &Database, domain: ContentDomain) -> AppResult<Self> {
        let txn = database.begin().await?;
        debug!("Opened cache session for {}", domain);
        Ok(Self {
            txn,
            domain,
            now: Utc::now(),
        })
    }

    pub fn domain(&self) -> ContentDomain {
        self.domain
    }

    /// Timestamp stamped into `last_seen_at` for everything seen during this run
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn transaction(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Merge the provider's category list, preserving operator visibility.
    pub async fn upsert_categories(
        &self,
        remote: &[RemoteCategory],
        new_visible: bool,
        grace_runs: u32,
    ) -> AppResult<CategorySync> {
        CategoryRepository
            .merge_remote(
                &self.txn,
                self.domain,
                remote,
                new_visible,
                grace_runs,
                self.now,
            )
            .await
    }

    /// Delete categories together with their items, returning the number of items removed.
    pub async fn purge_categories<S: DomainStore>(
        &self,
        store: &S,
        category_ids: &[i32],
    ) -> AppResult<u64> {
        if category_ids.is_empty() {
            return Ok(0);
        }
        let removed = store.purge_scopes(&self.txn, category_ids).await?;
        CategoryRepository.delete(&self.txn, category_ids).await?;
        Ok(removed)
    }

    /// Delete every item filed under a hidden category.
    pub async fn purge_hidden<S: DomainStore>(&self, store: &S) -> AppResult<u64> {
        let hidden = CategoryRepository.hidden_ids(&self.txn, self.domain).await?;
        if hidden.is_empty() {
            return Ok(0);
        }
        store.purge_scopes(&self.txn, &hidden).await
    }

    /// Replace the stored guide when it differs from `entries`.
    pub async fn replace_epg(&self, entries: &[EpgEntry]) -> AppResult<bool> {
        EpgEntryRepository.replace_if_changed(&self.txn, entries).await
    }

    pub async fn commit(self) -> AppResult<()> {
        self.txn.commit().await?;
        debug!("Committed cache session for {}", self.domain);
        Ok(())
    }

    pub async fn rollback(self) -> AppResult<()> {
        self.txn.rollback().await?;
        debug!("Rolled back cache session for {}", self.domain);
        Ok(())
    }
}
