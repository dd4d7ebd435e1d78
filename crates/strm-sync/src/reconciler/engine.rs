//! Delta engine shared by every domain

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sea_orm::DatabaseTransaction;
use tracing::{debug, warn};

use super::descriptor::{CachedRow, CatalogItem, DomainStore};
use crate::errors::AppResult;
use crate::models::ReconcileCounts;

/// What happened to one remote item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Unchanged,
}

/// A remote item after it has been applied to the cache.
#[derive(Debug, Clone)]
pub struct AppliedItem<I> {
    pub row_id: i32,
    pub item: I,
    pub content_hash: String,
    pub change: ChangeKind,
}

type Key<S> = <<S as DomainStore>::Item as CatalogItem>::Key;

/// Reconciles remote items against cached rows, one scope at a time.
///
/// The index covers every cached row loaded at [`begin`](Self::begin), so an item that moved
/// between scopes is updated in place rather than deleted and re-created. Stale marking
/// and purging only ever touch scopes passed to [`apply`](Self::apply).
pub struct ScopeReconciler<'a, S: DomainStore> {
    store: &'a S,
    txn: &'a DatabaseTransaction,
    now: DateTime<Utc>,
    index: HashMap<Key<S>, CachedRow<Key<S>>>,
    seen_ids: HashSet<i32>,
    seen_keys: HashSet<Key<S>>,
    seen_remote_ids: HashSet<String>,
    processed_scopes: HashSet<i32>,
    counts: ReconcileCounts,
}

impl<'a, S: DomainStore> ScopeReconciler<'a, S> {
    pub async fn begin(
        store: &'a S,
        txn: &'a DatabaseTransaction,
        now: DateTime<Utc>,
        scope_ids: Option<&[i32]>,
    ) -> AppResult<Self> {
        let rows = store.load_cached(txn, scope_ids).await?;
        debug!("Loaded {} cached {} rows", rows.len(), store.entity_name());

        Ok(Self {
            store,
            txn,
            now,
            index: rows.into_iter().map(|row| (row.key.clone(), row)).collect(),
            seen_ids: HashSet::new(),
            seen_keys: HashSet::new(),
            seen_remote_ids: HashSet::new(),
            processed_scopes: HashSet::new(),
            counts: ReconcileCounts::default(),
        })
    }

    /// Apply the complete item list of one scope.
    ///
    /// `visible` is the visibility given to newly inserted rows. Items whose key was
    /// already applied during this run are skipped; the first scope to list an item owns it.
    pub async fn apply(
        &mut self,
        scope_id: i32,
        items: Vec<S::Item>,
        visible: bool,
    ) -> AppResult<Vec<AppliedItem<S::Item>>> {
        self.processed_scopes.insert(scope_id);

        let mut applied = Vec::with_capacity(items.len());
        let mut unchanged = Vec::new();

        for item in items {
            let key = item.key();
            if !self.seen_keys.insert(key.clone()) {
                warn!(
                    "Skipping duplicate {} '{}' ({:?})",
                    self.store.entity_name(),
                    item.label(),
                    key
                );
                continue;
            }
            self.seen_remote_ids.insert(item.remote_id().to_string());

            let content_hash = item.content_hash();
            let (row_id, change) = match self.index.get(&key) {
                None => {
                    let row_id = self
                        .store
                        .insert(self.txn, scope_id, &item, &content_hash, visible, self.now)
                        .await?;
                    self.counts.added += 1;
                    (row_id, ChangeKind::Inserted)
                }
                Some(row) if row.content_hash != content_hash || row.scope_id != scope_id => {
                    self.store
                        .update(self.txn, row.id, scope_id, &item, &content_hash, self.now)
                        .await?;
                    self.counts.updated += 1;
                    (row.id, ChangeKind::Updated)
                }
                Some(row) => {
                    unchanged.push(row.id);
                    (row.id, ChangeKind::Unchanged)
                }
            };

            self.seen_ids.insert(row_id);
            applied.push(AppliedItem {
                row_id,
                item,
                content_hash,
                change,
            });
        }

        self.store.touch(self.txn, &unchanged, self.now).await?;
        Ok(applied)
    }

    /// Strike unseen rows of processed scopes and purge those past the grace period.
    ///
    /// A row whose remote id reappeared under another key was renumbered and is deleted
    /// straight away. With `purge` off, rows are only struck.
    pub async fn finish(mut self, grace_runs: u32, purge: bool) -> AppResult<ReconcileCounts> {
        let mut renumbered = Vec::new();
        let mut struck = Vec::new();
        let mut expired = Vec::new();

        for row in self.index.values() {
            if self.seen_ids.contains(&row.id) || !self.processed_scopes.contains(&row.scope_id) {
                continue;
            }
            if purge && self.seen_remote_ids.contains(&row.remote_id) {
                renumbered.push(row.id);
                continue;
            }
            struck.push(row.id);
            if purge && i64::from(row.missing_runs) + 1 > i64::from(grace_runs) {
                expired.push(row.id);
            }
        }

        self.store.mark_stale(self.txn, &struck).await?;

        if !renumbered.is_empty() {
            debug!(
                "Deleting {} renumbered {} rows",
                renumbered.len(),
                self.store.entity_name()
            );
            self.counts.removed += self.store.delete(self.txn, &renumbered).await?;
        }
        if !expired.is_empty() {
            debug!(
                "Purging {} {} rows past the grace period",
                expired.len(),
                self.store.entity_name()
            );
            self.counts.removed += self.store.delete(self.txn, &expired).await?;
        }

        Ok(self.counts)
    }

    pub fn counts(&self) -> ReconcileCounts {
        self.counts
    }
}
