//! In-memory provider
//!
//! Serves a catalog held in memory. Used for dry runs and for exercising the engine
//! without a network: failures can be injected per endpoint, optionally after a number of
//! good elements, and a cancellation token can be tripped when an endpoint is hit.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use futures::StreamExt;
use futures::stream;
use tokio_util::sync::CancellationToken;

use super::traits::{CatalogProvider, ProviderStream};
use crate::errors::ProviderError;
use crate::models::{ContentDomain, EpgEntry, RemoteCategory, RemoteRecord};

/// One provider call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Categories(ContentDomain),
    Items(ContentDomain, String),
    Detail(ContentDomain, String),
    Epg,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    after: usize,
    error: ProviderError,
}

#[derive(Default)]
struct MemoryCatalog {
    categories: HashMap<ContentDomain, Vec<RemoteCategory>>,
    items: HashMap<(ContentDomain, String), Vec<RemoteRecord>>,
    details: HashMap<(ContentDomain, String), Vec<RemoteRecord>>,
    epg: Vec<EpgEntry>,
    failures: HashMap<Endpoint, InjectedFailure>,
    trips: HashMap<Endpoint, CancellationToken>,
    requests: Vec<Endpoint>,
}

/// Catalog provider backed by in-memory data. Mutations apply to later requests.
#[derive(Default)]
pub struct MemoryProvider {
    catalog: Mutex<MemoryCatalog>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn catalog(&self) -> MutexGuard<'_, MemoryCatalog> {
        self.catalog.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_categories(&self, domain: ContentDomain, categories: Vec<RemoteCategory>) {
        self.catalog().categories.insert(domain, categories);
    }

    /// Replace the items listed under a category.
    pub fn set_items<R: Into<RemoteRecord>>(
        &self,
        domain: ContentDomain,
        category_remote_id: &str,
        items: Vec<R>,
    ) {
        self.catalog().items.insert(
            (domain, category_remote_id.to_string()),
            items.into_iter().map(Into::into).collect(),
        );
    }

    /// Replace the detail records of an item.
    pub fn set_detail<R: Into<RemoteRecord>>(
        &self,
        domain: ContentDomain,
        remote_id: &str,
        records: Vec<R>,
    ) {
        self.catalog().details.insert(
            (domain, remote_id.to_string()),
            records.into_iter().map(Into::into).collect(),
        );
    }

    pub fn set_epg(&self, entries: Vec<EpgEntry>) {
        self.catalog().epg = entries;
    }

    /// Fail `endpoint` with `error` once `after` elements have been yielded.
    pub fn fail(&self, endpoint: Endpoint, after: usize, error: ProviderError) {
        self.catalog()
            .failures
            .insert(endpoint, InjectedFailure { after, error });
    }

    pub fn clear_failures(&self) {
        self.catalog().failures.clear();
    }

    /// Cancel `token` as soon as `endpoint` is requested.
    pub fn trip_on(&self, endpoint: Endpoint, token: CancellationToken) {
        self.catalog().trips.insert(endpoint, token);
    }

    /// Endpoints requested so far, in order.
    pub fn requests(&self) -> Vec<Endpoint> {
        self.catalog().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.catalog().requests.clear();
    }

    fn serve<T: Send + 'static>(
        &self,
        endpoint: Endpoint,
        records: Vec<T>,
    ) -> ProviderStream<'static, T> {
        let failure = {
            let mut catalog = self.catalog();
            catalog.requests.push(endpoint.clone());
            if let Some(token) = catalog.trips.get(&endpoint) {
                token.cancel();
            }
            catalog.failures.get(&endpoint).cloned()
        };

        match failure {
            None => stream::iter(records.into_iter().map(Ok)).boxed(),
            Some(failure) => {
                let good = records.into_iter().take(failure.after).map(Ok);
                stream::iter(good.chain(std::iter::once(Err(failure.error)))).boxed()
            }
        }
    }
}

impl CatalogProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch_categories(&self, domain: ContentDomain) -> ProviderStream<'_, RemoteCategory> {
        let categories = self
            .catalog()
            .categories
            .get(&domain)
            .cloned()
            .unwrap_or_default();
        self.serve(Endpoint::Categories(domain), categories)
    }

    fn fetch_items(
        &self,
        domain: ContentDomain,
        category_remote_id: &str,
    ) -> ProviderStream<'_, RemoteRecord> {
        let key = (domain, category_remote_id.to_string());
        let items = self.catalog().items.get(&key).cloned().unwrap_or_default();
        self.serve(Endpoint::Items(key.0, key.1), items)
    }

    fn fetch_item_detail(
        &self,
        domain: ContentDomain,
        remote_id: &str,
    ) -> ProviderStream<'_, RemoteRecord> {
        let key = (domain, remote_id.to_string());
        let records = self.catalog().details.get(&key).cloned().unwrap_or_default();
        self.serve(Endpoint::Detail(key.0, key.1), records)
    }

    fn fetch_epg(&self) -> ProviderStream<'_, RemoteRecord> {
        let entries = self
            .catalog()
            .epg
            .iter()
            .cloned()
            .map(RemoteRecord::EpgEntry)
            .collect();
        self.serve(Endpoint::Epg, entries)
    }
}
