//! Domain descriptors for the generic reconciler
//!
//! A domain is described by its remote item type (identity key and content hash) and by a
//! store that applies row-level changes inside the domain transaction.

use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseTransaction;

use super::hashing;
use crate::errors::AppResult;
use crate::models::{RemoteEpisode, RemoteLiveChannel, RemoteMovie, RemoteRecord, RemoteSeries};

/// A record the reconciler can match against cached rows.
pub trait CatalogItem: Debug + Send + Sync + 'static {
    /// Identity inside the domain
    type Key: Eq + Hash + Clone + Debug + Send + Sync;

    fn key(&self) -> Self::Key;
    fn remote_id(&self) -> &str;
    fn content_hash(&self) -> String;
    /// Human readable name for logs
    fn label(&self) -> &str;
}

impl CatalogItem for RemoteMovie {
    type Key = String;

    fn key(&self) -> String {
        self.remote_id.clone()
    }
    fn remote_id(&self) -> &str {
        &self.remote_id
    }
    fn content_hash(&self) -> String {
        hashing::movie_hash(self)
    }
    fn label(&self) -> &str {
        &self.title
    }
}

impl CatalogItem for RemoteSeries {
    type Key = String;

    fn key(&self) -> String {
        self.remote_id.clone()
    }
    fn remote_id(&self) -> &str {
        &self.remote_id
    }
    fn content_hash(&self) -> String {
        hashing::series_hash(self)
    }
    fn label(&self) -> &str {
        &self.title
    }
}

/// Episodes are identified by position, not by remote id.
impl CatalogItem for RemoteEpisode {
    type Key = (i32, i32);

    fn key(&self) -> (i32, i32) {
        (self.season, self.episode_number)
    }
    fn remote_id(&self) -> &str {
        &self.remote_id
    }
    fn content_hash(&self) -> String {
        hashing::episode_hash(self)
    }
    fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.remote_id)
    }
}

impl CatalogItem for RemoteLiveChannel {
    type Key = String;

    fn key(&self) -> String {
        self.remote_id.clone()
    }
    fn remote_id(&self) -> &str {
        &self.remote_id
    }
    fn content_hash(&self) -> String {
        hashing::live_channel_hash(self)
    }
    fn label(&self) -> &str {
        &self.name
    }
}

/// The bookkeeping slice of a cached row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRow<K> {
    pub id: i32,
    pub key: K,
    pub remote_id: String,
    /// Category id, or series id for episodes
    pub scope_id: i32,
    pub content_hash: String,
    pub missing_runs: i32,
}

/// Row-level persistence for one domain.
///
/// Every method runs inside the domain transaction; id lists may be arbitrarily long.
#[async_trait]
pub trait DomainStore: Send + Sync {
    type Item: CatalogItem + TryFrom<RemoteRecord, Error = RemoteRecord>;

    /// Entity name for logs and errors
    fn entity_name(&self) -> &'static str;

    /// Cached rows in the given scopes, or in the whole domain when `scope_ids` is `None`.
    async fn load_cached(
        &self,
        txn: &DatabaseTransaction,
        scope_ids: Option<&[i32]>,
    ) -> AppResult<Vec<CachedRow<<Self::Item as CatalogItem>::Key>>>;

    async fn insert(
        &self,
        txn: &DatabaseTransaction,
        scope_id: i32,
        item: &Self::Item,
        content_hash: &str,
        visible: bool,
        now: DateTime<Utc>,
    ) -> AppResult<i32>;

    /// Overwrite the mutable fields of an existing row and reset its bookkeeping.
    async fn update(
        &self,
        txn: &DatabaseTransaction,
        row_id: i32,
        scope_id: i32,
        item: &Self::Item,
        content_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Bump `last_seen_at` and reset `missing_runs` for unchanged rows.
    async fn touch(
        &self,
        txn: &DatabaseTransaction,
        ids: &[i32],
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Increment `missing_runs`.
    async fn mark_stale(&self, txn: &DatabaseTransaction, ids: &[i32]) -> AppResult<()>;

    /// Delete rows, returning how many cache rows went with them.
    async fn delete(&self, txn: &DatabaseTransaction, ids: &[i32]) -> AppResult<u64>;

    /// Delete every row in the given scopes.
    async fn purge_scopes(&self, txn: &DatabaseTransaction, scope_ids: &[i32]) -> AppResult<u64>;
}
