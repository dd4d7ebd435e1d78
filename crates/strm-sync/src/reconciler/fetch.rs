//! Provider data collected for a domain run before the cache is touched
//!
//! Fetching happens outside the cache transaction so a slow provider never holds the
//! database. The snapshot taken beforehand tells the fetch phase which items will change,
//! and therefore which detail endpoints are worth calling.

use std::collections::HashMap;
use std::hash::Hash;

use tracing::debug;

use super::descriptor::{CachedRow, CatalogItem, DomainStore};
use super::engine::ChangeKind;
use crate::database::Database;
use crate::database::repositories::{CategoryRepository, SeriesRepository};
use crate::errors::{AppResult, ProviderResult};
use crate::models::{
    Category, ContentDomain, EpgEntry, RemoteCategory, RemoteLiveChannel, RemoteMovie,
    RemoteRecord, RemoteSeries,
};

/// Detail records fetched per item remote id
pub type Details = HashMap<String, ProviderResult<Vec<RemoteRecord>>>;

/// The typed item list of one category.
#[derive(Debug, Clone)]
pub struct FetchedScope<I> {
    pub category_remote_id: String,
    pub name: String,
    pub items: Vec<I>,
}

#[derive(Debug)]
pub enum FetchedScopes {
    Movies(Vec<FetchedScope<RemoteMovie>>),
    Series(Vec<FetchedScope<RemoteSeries>>),
    Live(Vec<FetchedScope<RemoteLiveChannel>>),
}

impl FetchedScopes {
    pub fn len(&self) -> usize {
        match self {
            FetchedScopes::Movies(scopes) => scopes.len(),
            FetchedScopes::Series(scopes) => scopes.len(),
            FetchedScopes::Live(scopes) => scopes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything a domain run got from the provider.
#[derive(Debug)]
pub struct DomainFetch {
    pub domain: ContentDomain,
    /// The provider's category list, in provider order
    pub categories: Vec<RemoteCategory>,
    /// Visible categories whose listing succeeded, in fetch order
    pub scopes: FetchedScopes,
    pub details: Details,
    /// Programme guide inside the configured window; `None` keeps the stored guide
    pub guide: Option<Vec<EpgEntry>>,
    /// Categories and the guide skipped after transient failures
    pub omitted: Vec<String>,
    pub cancelled: bool,
}

/// Cache state of one domain as it was when the run started.
///
/// The domain is locked for the whole run, so the transaction applying the fetched data
/// sees exactly these rows.
#[derive(Debug)]
pub struct Snapshot<K> {
    rows: HashMap<K, CachedRow<K>>,
    categories: HashMap<String, Category>,
    episodes_hashes: HashMap<i32, Option<String>>,
}

impl<K: Eq + Hash + Clone> Snapshot<K> {
    pub async fn load<S>(database: &Database, domain: ContentDomain, store: &S) -> AppResult<Self>
    where
        S: DomainStore,
        S::Item: CatalogItem<Key = K>,
    {
        let txn = database.begin().await?;
        let categories = CategoryRepository
            .list(&txn, domain)
            .await?
            .into_iter()
            .map(|c| (c.remote_id.clone(), c))
            .collect();
        let rows = store.load_cached(&txn, None).await?;
        let episodes_hashes = if domain == ContentDomain::Series {
            let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
            SeriesRepository.episodes_hashes(&txn, &ids).await?
        } else {
            HashMap::new()
        };
        txn.commit().await?;

        debug!(
            "Snapshot of {}: {} cached {} rows",
            domain,
            rows.len(),
            store.entity_name()
        );
        Ok(Self {
            rows: rows.into_iter().map(|row| (row.key.clone(), row)).collect(),
            categories,
            episodes_hashes,
        })
    }

    pub fn category(&self, remote_id: &str) -> Option<&Category> {
        self.categories.get(remote_id)
    }

    pub fn row(&self, key: &K) -> Option<&CachedRow<K>> {
        self.rows.get(key)
    }

    /// What applying `item` under `scope_id` will do. A category without a row yet has no
    /// scope id, so every cached item listed under it moves.
    pub fn change<I>(&self, item: &I, scope_id: Option<i32>) -> ChangeKind
    where
        I: CatalogItem<Key = K>,
    {
        match self.rows.get(&item.key()) {
            None => ChangeKind::Inserted,
            Some(row)
                if Some(row.scope_id) != scope_id || row.content_hash != item.content_hash() =>
            {
                ChangeKind::Updated
            }
            Some(_) => ChangeKind::Unchanged,
        }
    }

    pub fn episodes_hash(&self, row_id: i32) -> Option<&str> {
        self.episodes_hashes.get(&row_id).and_then(|h| h.as_deref())
    }
}
