//! Read side and maintenance operations of the catalog cache

use std::collections::HashSet;

use sea_orm::TransactionTrait;
use tracing::info;

use super::Database;
use super::repositories::{
    CategoryRepository, EpgEntryRepository, EpisodeRepository, LiveChannelRepository,
    MovieRepository, SeriesRepository, SyncRunRepository,
};
use super::session::CacheSession;
use crate::errors::{AppError, AppResult};
use crate::models::{
    CatalogStatistics, Category, ContentDomain, DomainStatistics, SyncRun, VisibleCatalog,
};

/// Facade over the cache used by the orchestrator, the generator and callers.
///
/// Reads go through the shared connection and only ever observe committed state.
#[derive(Clone)]
pub struct CatalogCache {
    database: Database,
}

impl CatalogCache {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub async fn begin_session(&self, domain: ContentDomain) -> AppResult<CacheSession> {
        CacheSession::begin(&self.database, domain).await
    }

    /// Visible rows under visible categories
    pub async fn list_visible(&self, domain: ContentDomain) -> AppResult<VisibleCatalog> {
        let db = &*self.database.connection;
        match domain {
            ContentDomain::Movie => Ok(VisibleCatalog::Movies(
                MovieRepository.find_visible(db).await?,
            )),
            ContentDomain::Series => Ok(VisibleCatalog::Series(
                SeriesRepository.find_visible_with_episodes(db).await?,
            )),
            ContentDomain::Live => {
                let channels = LiveChannelRepository.find_visible(db).await?;
                let guide_ids: HashSet<String> = channels
                    .iter()
                    .filter_map(|c| c.channel.epg_channel_id.clone())
                    .filter(|id| !id.is_empty())
                    .collect();
                let epg = EpgEntryRepository.find_for_channels(db, &guide_ids).await?;
                Ok(VisibleCatalog::Live { channels, epg })
            }
        }
    }

    pub async fn statistics(&self) -> AppResult<CatalogStatistics> {
        let db = &*self.database.connection;
        let mut stats = CatalogStatistics::default();

        for domain in ContentDomain::ALL {
            let (total, visible) = match domain {
                ContentDomain::Movie => (
                    MovieRepository.count(db, false).await?,
                    MovieRepository.count(db, true).await?,
                ),
                ContentDomain::Series => (
                    SeriesRepository.count(db, false).await?,
                    SeriesRepository.count(db, true).await?,
                ),
                ContentDomain::Live => (
                    LiveChannelRepository.count(db, false).await?,
                    LiveChannelRepository.count(db, true).await?,
                ),
            };

            let (episodes, visible_episodes) = if domain == ContentDomain::Series {
                (
                    Some(EpisodeRepository.count(db, false).await?),
                    Some(EpisodeRepository.count(db, true).await?),
                )
            } else {
                (None, None)
            };

            stats.domains.insert(
                domain,
                DomainStatistics {
                    categories: CategoryRepository.count(db, domain, false).await?,
                    visible_categories: CategoryRepository.count(db, domain, true).await?,
                    total,
                    visible,
                    episodes,
                    visible_episodes,
                },
            );
        }

        stats.epg_entries = EpgEntryRepository.count(db).await?;
        Ok(stats)
    }

    /// Delete cached items of one domain, or of all of them.
    ///
    /// Categories and their visibility flags survive so the next sync rebuilds the same
    /// selection.
    pub async fn clear(&self, domain: Option<ContentDomain>) -> AppResult<u64> {
        let domains = match domain {
            Some(domain) => vec![domain],
            None => ContentDomain::ALL.to_vec(),
        };

        let txn = self.database.connection.begin().await?;
        let mut removed = 0;
        for domain in domains {
            removed += match domain {
                ContentDomain::Movie => MovieRepository.delete_all(&txn).await?,
                ContentDomain::Series => SeriesRepository.delete_all(&txn).await?,
                ContentDomain::Live => {
                    EpgEntryRepository.delete_all(&txn).await?
                        + LiveChannelRepository.delete_all(&txn).await?
                }
            };
            CategoryRepository.reset_missing_runs(&txn, domain).await?;
        }
        txn.commit().await?;

        info!("Cleared {} cached rows", removed);
        Ok(removed)
    }

    pub async fn list_categories(&self, domain: ContentDomain) -> AppResult<Vec<Category>> {
        CategoryRepository
            .list(&*self.database.connection, domain)
            .await
    }

    pub async fn set_category_visibility(
        &self,
        domain: ContentDomain,
        remote_id: &str,
        visible: bool,
    ) -> AppResult<Category> {
        let category = CategoryRepository
            .set_visibility(&*self.database.connection, domain, remote_id, visible)
            .await?;
        info!(
            "{} category '{}' is now {}",
            domain,
            category.name,
            if visible { "visible" } else { "hidden" }
        );
        Ok(category)
    }

    /// Toggle a single item. Episodes follow their series.
    pub async fn set_item_visibility(
        &self,
        domain: ContentDomain,
        remote_id: &str,
        visible: bool,
    ) -> AppResult<()> {
        let db = &*self.database.connection;
        let affected = match domain {
            ContentDomain::Movie => MovieRepository.set_visibility(db, remote_id, visible).await?,
            ContentDomain::Series => {
                SeriesRepository
                    .set_visibility(db, remote_id, visible)
                    .await?
            }
            ContentDomain::Live => {
                LiveChannelRepository
                    .set_visibility(db, remote_id, visible)
                    .await?
            }
        };
        if affected == 0 {
            return Err(AppError::not_found(domain.to_string(), remote_id));
        }
        Ok(())
    }

    pub async fn recent_runs(
        &self,
        domain: Option<ContentDomain>,
        limit: u64,
    ) -> AppResult<Vec<SyncRun>> {
        SyncRunRepository
            .recent(&*self.database.connection, domain, limit)
            .await
    }

    pub async fn vacuum(&self) -> AppResult<()> {
        self.database.vacuum().await
    }
}
