//! SeaORM-based Episode repository implementation

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, JoinType,
    NotSet, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};

use super::{Bookkeeping, ID_CHUNK};
use crate::entities::{categories, episodes, prelude::Episodes, series};
use crate::errors::AppResult;
use crate::models::{Episode, RemoteEpisode};
use crate::reconciler::{CachedRow, DomainStore};

/// Repository for cached episodes. Scope is the owning series.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpisodeRepository;

impl EpisodeRepository {
    fn bookkeeping() -> Bookkeeping<Episodes> {
        Bookkeeping {
            id: episodes::Column::Id,
            missing_runs: episodes::Column::MissingRuns,
            last_seen_at: episodes::Column::LastSeenAt,
        }
    }

    /// Episodes grouped by series id, each list ordered by season and episode number
    pub async fn find_by_series_ids<C: ConnectionTrait>(
        &self,
        db: &C,
        series_ids: &[i32],
    ) -> AppResult<HashMap<i32, Vec<Episode>>> {
        let mut grouped: HashMap<i32, Vec<Episode>> = HashMap::new();
        for chunk in series_ids.chunks(ID_CHUNK) {
            let models = Episodes::find()
                .filter(episodes::Column::SeriesId.is_in(chunk.iter().copied()))
                .order_by_asc(episodes::Column::SeriesId)
                .order_by_asc(episodes::Column::Season)
                .order_by_asc(episodes::Column::EpisodeNumber)
                .all(db)
                .await?;
            for model in models {
                grouped
                    .entry(model.series_id)
                    .or_default()
                    .push(Self::model_to_domain(model));
            }
        }
        Ok(grouped)
    }

    pub async fn count<C: ConnectionTrait>(&self, db: &C, visible_only: bool) -> AppResult<u64> {
        let mut query = Episodes::find();
        if visible_only {
            query = query
                .inner_join(series::Entity)
                .join(JoinType::InnerJoin, series::Relation::Category.def())
                .filter(series::Column::Visible.eq(true))
                .filter(categories::Column::Visible.eq(true));
        }
        Ok(query.count(db).await?)
    }

    fn model_to_domain(model: episodes::Model) -> Episode {
        Episode {
            id: model.id,
            series_id: model.series_id,
            remote_id: model.remote_id,
            season: model.season,
            episode_number: model.episode_number,
            title: model.title,
            stream_url: model.stream_url,
            content_hash: model.content_hash,
            missing_runs: model.missing_runs,
            last_seen_at: model.last_seen_at,
            plot: model.plot,
            air_date: model.air_date,
            duration_secs: model.duration_secs,
            rating: model.rating,
            thumbnail_url: model.thumbnail_url,
        }
    }
}

#[async_trait]
impl DomainStore for EpisodeRepository {
    type Item = RemoteEpisode;

    fn entity_name(&self) -> &'static str {
        "episode"
    }

    async fn load_cached(
        &self,
        txn: &DatabaseTransaction,
        scope_ids: Option<&[i32]>,
    ) -> AppResult<Vec<CachedRow<(i32, i32)>>> {
        let mut query = Episodes::find().select_only().columns([
            episodes::Column::Id,
            episodes::Column::Season,
            episodes::Column::EpisodeNumber,
            episodes::Column::RemoteId,
            episodes::Column::SeriesId,
            episodes::Column::ContentHash,
            episodes::Column::MissingRuns,
        ]);
        if let Some(scope_ids) = scope_ids {
            query = query.filter(episodes::Column::SeriesId.is_in(scope_ids.iter().copied()));
        }

        let rows: Vec<(i32, i32, i32, String, i32, String, i32)> =
            query.into_tuple().all(txn).await?;
        Ok(rows
            .into_iter()
            .map(
                |(id, season, episode_number, remote_id, scope_id, content_hash, missing_runs)| {
                    CachedRow {
                        id,
                        key: (season, episode_number),
                        remote_id,
                        scope_id,
                        content_hash,
                        missing_runs,
                    }
                },
            )
            .collect())
    }

    async fn insert(
        &self,
        txn: &DatabaseTransaction,
        scope_id: i32,
        item: &RemoteEpisode,
        content_hash: &str,
        _visible: bool,
        now: DateTime<Utc>,
    ) -> AppResult<i32> {
        let active = episodes::ActiveModel {
            id: NotSet,
            series_id: Set(scope_id),
            remote_id: Set(item.remote_id.clone()),
            season: Set(item.season),
            episode_number: Set(item.episode_number),
            title: Set(item.title.clone()),
            stream_url: Set(item.stream_url.clone()),
            content_hash: Set(content_hash.to_string()),
            missing_runs: Set(0),
            last_seen_at: Set(now),
            plot: Set(item.plot.clone()),
            air_date: Set(item.air_date.clone()),
            duration_secs: Set(item.duration_secs),
            rating: Set(item.rating),
            thumbnail_url: Set(item.thumbnail_url.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = Episodes::insert(active).exec(txn).await?;
        Ok(result.last_insert_id)
    }

    async fn update(
        &self,
        txn: &DatabaseTransaction,
        row_id: i32,
        scope_id: i32,
        item: &RemoteEpisode,
        content_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        episodes::ActiveModel {
            id: Set(row_id),
            series_id: Set(scope_id),
            remote_id: Set(item.remote_id.clone()),
            title: Set(item.title.clone()),
            stream_url: Set(item.stream_url.clone()),
            content_hash: Set(content_hash.to_string()),
            missing_runs: Set(0),
            last_seen_at: Set(now),
            plot: Set(item.plot.clone()),
            air_date: Set(item.air_date.clone()),
            duration_secs: Set(item.duration_secs),
            rating: Set(item.rating),
            thumbnail_url: Set(item.thumbnail_url.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .update(txn)
        .await?;
        Ok(())
    }

    async fn touch(
        &self,
        txn: &DatabaseTransaction,
        ids: &[i32],
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        Self::bookkeeping().touch(txn, ids, now).await
    }

    async fn mark_stale(&self, txn: &DatabaseTransaction, ids: &[i32]) -> AppResult<()> {
        Self::bookkeeping().mark_stale(txn, ids).await
    }

    async fn delete(&self, txn: &DatabaseTransaction, ids: &[i32]) -> AppResult<u64> {
        Self::bookkeeping().delete(txn, ids).await
    }

    async fn purge_scopes(&self, txn: &DatabaseTransaction, scope_ids: &[i32]) -> AppResult<u64> {
        Self::bookkeeping()
            .delete_where_in(txn, episodes::Column::SeriesId, scope_ids)
            .await
    }
}
