//! Provider abstraction
//!
//! A provider exposes the remote catalog as streams of typed records. Every element is a
//! `Result`, so a failure half way through a listing surfaces at the exact element where
//! it happened and the consumer decides whether the partial data is usable.

use futures::stream::BoxStream;

use crate::errors::ProviderResult;
use crate::models::{ContentDomain, RemoteCategory, RemoteRecord};

/// Stream of provider results borrowed from the provider.
pub type ProviderStream<'a, T> = BoxStream<'a, ProviderResult<T>>;

/// Read access to a remote catalog.
///
/// Implementations never retry; a failed run is simply retried by the next sync.
pub trait CatalogProvider: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    fn fetch_categories(&self, domain: ContentDomain) -> ProviderStream<'_, RemoteCategory>;

    /// Items filed under one category: movies, series or live channels.
    fn fetch_items(
        &self,
        domain: ContentDomain,
        category_remote_id: &str,
    ) -> ProviderStream<'_, RemoteRecord>;

    /// Detail records of one item. For a series these are its episodes, for a movie a
    /// single enriched movie record.
    fn fetch_item_detail(
        &self,
        domain: ContentDomain,
        remote_id: &str,
    ) -> ProviderStream<'_, RemoteRecord>;

    /// The full programme guide.
    fn fetch_epg(&self) -> ProviderStream<'_, RemoteRecord>;
}
