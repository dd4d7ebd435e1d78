//! SeaORM-based EPG entry repository implementation
//!
//! The guide is stored as a whole set and replaced wholesale.

use std::collections::HashSet;

use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, NotSet, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

use super::ID_CHUNK;
use crate::entities::{epg_entries, prelude::EpgEntries};
use crate::errors::AppResult;
use crate::models::EpgEntry;

/// Rows per multi-row INSERT; eight bound columns each stays well under SQLite's limit
const INSERT_BATCH: usize = 100;

#[derive(Debug, Clone, Copy, Default)]
pub struct EpgEntryRepository;

impl EpgEntryRepository {
    /// Every stored entry in canonical order
    pub async fn find_all<C: ConnectionTrait>(&self, db: &C) -> AppResult<Vec<EpgEntry>> {
        let models = EpgEntries::find()
            .order_by_asc(epg_entries::Column::ChannelRemoteId)
            .order_by_asc(epg_entries::Column::StartTime)
            .order_by_asc(epg_entries::Column::Id)
            .all(db)
            .await?;
        let mut entries: Vec<EpgEntry> = models.into_iter().map(Self::model_to_domain).collect();
        entries.sort();
        Ok(entries)
    }

    /// Entries for the given guide channel ids, in canonical order
    pub async fn find_for_channels<C: ConnectionTrait>(
        &self,
        db: &C,
        channel_ids: &HashSet<String>,
    ) -> AppResult<Vec<EpgEntry>> {
        let ids: Vec<&String> = channel_ids.iter().collect();
        let mut entries = Vec::new();
        for chunk in ids.chunks(ID_CHUNK) {
            let models = EpgEntries::find()
                .filter(epg_entries::Column::ChannelRemoteId.is_in(chunk.iter().map(|s| s.as_str())))
                .all(db)
                .await?;
            entries.extend(models.into_iter().map(Self::model_to_domain));
        }
        entries.sort();
        Ok(entries)
    }

    /// Replace the stored guide with `entries`, which must already be sorted and deduplicated.
    ///
    /// Returns `false` without writing when the stored set is identical.
    pub async fn replace_if_changed(
        &self,
        txn: &DatabaseTransaction,
        entries: &[EpgEntry],
    ) -> AppResult<bool> {
        let stored = self.find_all(txn).await?;
        if stored.as_slice() == entries {
            return Ok(false);
        }

        EpgEntries::delete_many().exec(txn).await?;
        for batch in entries.chunks(INSERT_BATCH) {
            let models = batch.iter().map(|entry| epg_entries::ActiveModel {
                id: NotSet,
                channel_remote_id: Set(entry.channel_remote_id.clone()),
                start_time: Set(entry.start),
                end_time: Set(entry.end),
                title: Set(entry.title.clone()),
                description: Set(entry.description.clone()),
                category: Set(entry.category.clone()),
                lang: Set(entry.lang.clone()),
            });
            EpgEntries::insert_many(models).exec(txn).await?;
        }
        Ok(true)
    }

    pub async fn count<C: ConnectionTrait>(&self, db: &C) -> AppResult<u64> {
        Ok(EpgEntries::find().count(db).await?)
    }

    pub async fn delete_all<C: ConnectionTrait>(&self, db: &C) -> AppResult<u64> {
        Ok(EpgEntries::delete_many().exec(db).await?.rows_affected)
    }

    fn model_to_domain(model: epg_entries::Model) -> EpgEntry {
        EpgEntry {
            channel_remote_id: model.channel_remote_id,
            start: model.start_time,
            end: model.end_time,
            title: model.title,
            description: model.description,
            category: model.category,
            lang: model.lang,
        }
    }
}
