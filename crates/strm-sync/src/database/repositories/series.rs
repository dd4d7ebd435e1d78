//! SeaORM-based Series repository implementation
//!
//! Deleting a series cascades to its episodes; the counts returned here include them.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, NotSet,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use super::{Bookkeeping, EpisodeRepository, ID_CHUNK};
use crate::entities::{categories, prelude::*, series};
use crate::errors::AppResult;
use crate::models::{MediaMetadata, RemoteSeries, Series as CachedSeries, SeriesWithEpisodes};
use crate::reconciler::{CachedRow, DomainStore};

/// Repository for cached series. Scope is the category.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesRepository;

impl SeriesRepository {
    fn bookkeeping() -> Bookkeeping<Series> {
        Bookkeeping {
            id: series::Column::Id,
            missing_runs: series::Column::MissingRuns,
            last_seen_at: series::Column::LastSeenAt,
        }
    }

    /// Visible series under visible categories with all their episodes
    pub async fn find_visible_with_episodes<C: ConnectionTrait>(
        &self,
        db: &C,
    ) -> AppResult<Vec<SeriesWithEpisodes>> {
        let models = Series::find()
            .inner_join(categories::Entity)
            .filter(series::Column::Visible.eq(true))
            .filter(categories::Column::Visible.eq(true))
            .order_by_asc(series::Column::RemoteId)
            .all(db)
            .await?;

        let ids: Vec<i32> = models.iter().map(|m| m.id).collect();
        let mut episodes_by_series = EpisodeRepository.find_by_series_ids(db, &ids).await?;

        Ok(models
            .into_iter()
            .map(|model| {
                let episodes = episodes_by_series.remove(&model.id).unwrap_or_default();
                SeriesWithEpisodes {
                    series: Self::model_to_domain(model),
                    episodes,
                }
            })
            .collect())
    }

    /// `episodes_hash` of the given rows
    pub async fn episodes_hashes(
        &self,
        txn: &DatabaseTransaction,
        ids: &[i32],
    ) -> AppResult<HashMap<i32, Option<String>>> {
        let mut hashes = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(ID_CHUNK) {
            let rows: Vec<(i32, Option<String>)> = Series::find()
                .select_only()
                .columns([series::Column::Id, series::Column::EpisodesHash])
                .filter(series::Column::Id.is_in(chunk.iter().copied()))
                .into_tuple()
                .all(txn)
                .await?;
            hashes.extend(rows);
        }
        Ok(hashes)
    }

    /// Record that the episode list matching `content_hash` has been reconciled.
    pub async fn set_episodes_hash(
        &self,
        txn: &DatabaseTransaction,
        row_id: i32,
        content_hash: &str,
    ) -> AppResult<()> {
        Series::update_many()
            .col_expr(series::Column::EpisodesHash, Expr::value(content_hash))
            .filter(series::Column::Id.eq(row_id))
            .exec(txn)
            .await?;
        Ok(())
    }

    pub async fn set_visibility<C: ConnectionTrait>(
        &self,
        db: &C,
        remote_id: &str,
        visible: bool,
    ) -> AppResult<u64> {
        let result = Series::update_many()
            .col_expr(series::Column::Visible, Expr::value(visible))
            .filter(series::Column::RemoteId.eq(remote_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn count<C: ConnectionTrait>(&self, db: &C, visible_only: bool) -> AppResult<u64> {
        let mut query = Series::find();
        if visible_only {
            query = query
                .inner_join(categories::Entity)
                .filter(series::Column::Visible.eq(true))
                .filter(categories::Column::Visible.eq(true));
        }
        Ok(query.count(db).await?)
    }

    pub async fn delete_all<C: ConnectionTrait>(&self, db: &C) -> AppResult<u64> {
        let episodes = Episodes::delete_many().exec(db).await?.rows_affected;
        let series = Series::delete_many().exec(db).await?.rows_affected;
        Ok(series + episodes)
    }

    /// Episodes that a series delete would cascade to.
    async fn count_episodes_where_in(
        &self,
        txn: &DatabaseTransaction,
        column: series::Column,
        values: &[i32],
    ) -> AppResult<u64> {
        let mut total = 0;
        for chunk in values.chunks(ID_CHUNK) {
            total += Episodes::find()
                .inner_join(Series)
                .filter(column.is_in(chunk.iter().copied()))
                .count(txn)
                .await?;
        }
        Ok(total)
    }

    fn set_metadata(active: &mut series::ActiveModel, metadata: &MediaMetadata) {
        active.plot = Set(metadata.plot.clone());
        active.genre = Set(metadata.genre.clone());
        active.director = Set(metadata.director.clone());
        active.cast = Set(metadata.cast.clone());
        active.rating = Set(metadata.rating);
        active.release_date = Set(metadata.release_date.clone());
        active.duration_secs = Set(metadata.duration_secs);
        active.tmdb_id = Set(metadata.tmdb_id.clone());
        active.original_title = Set(metadata.original_title.clone());
        active.poster_url = Set(metadata.poster_url.clone());
        active.backdrop_url = Set(metadata.backdrop_url.clone());
    }

    fn model_to_domain(model: series::Model) -> CachedSeries {
        CachedSeries {
            id: model.id,
            category_id: model.category_id,
            remote_id: model.remote_id,
            title: model.title,
            year: model.year,
            content_hash: model.content_hash,
            episodes_hash: model.episodes_hash,
            visible: model.visible,
            missing_runs: model.missing_runs,
            last_seen_at: model.last_seen_at,
            metadata: MediaMetadata {
                plot: model.plot,
                genre: model.genre,
                director: model.director,
                cast: model.cast,
                rating: model.rating,
                release_date: model.release_date,
                duration_secs: model.duration_secs,
                tmdb_id: model.tmdb_id,
                original_title: model.original_title,
                poster_url: model.poster_url,
                backdrop_url: model.backdrop_url,
            },
        }
    }
}

#[async_trait]
impl DomainStore for SeriesRepository {
    type Item = RemoteSeries;

    fn entity_name(&self) -> &'static str {
        "series"
    }

    async fn load_cached(
        &self,
        txn: &DatabaseTransaction,
        scope_ids: Option<&[i32]>,
    ) -> AppResult<Vec<CachedRow<String>>> {
        let mut query = Series::find().select_only().columns([
            series::Column::Id,
            series::Column::RemoteId,
            series::Column::CategoryId,
            series::Column::ContentHash,
            series::Column::MissingRuns,
        ]);
        if let Some(scope_ids) = scope_ids {
            query = query.filter(series::Column::CategoryId.is_in(scope_ids.iter().copied()));
        }

        let rows: Vec<(i32, String, i32, String, i32)> = query.into_tuple().all(txn).await?;
        Ok(rows
            .into_iter()
            .map(
                |(id, remote_id, scope_id, content_hash, missing_runs)| CachedRow {
                    id,
                    key: remote_id.clone(),
                    remote_id,
                    scope_id,
                    content_hash,
                    missing_runs,
                },
            )
            .collect())
    }

    async fn insert(
        &self,
        txn: &DatabaseTransaction,
        scope_id: i32,
        item: &RemoteSeries,
        content_hash: &str,
        visible: bool,
        now: DateTime<Utc>,
    ) -> AppResult<i32> {
        let mut active = series::ActiveModel {
            id: NotSet,
            category_id: Set(scope_id),
            remote_id: Set(item.remote_id.clone()),
            title: Set(item.title.clone()),
            year: Set(item.year),
            content_hash: Set(content_hash.to_string()),
            episodes_hash: Set(None),
            visible: Set(visible),
            missing_runs: Set(0),
            last_seen_at: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Self::set_metadata(&mut active, &item.metadata);

        let result = Series::insert(active).exec(txn).await?;
        Ok(result.last_insert_id)
    }

    async fn update(
        &self,
        txn: &DatabaseTransaction,
        row_id: i32,
        scope_id: i32,
        item: &RemoteSeries,
        content_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut active = series::ActiveModel {
            id: Set(row_id),
            category_id: Set(scope_id),
            title: Set(item.title.clone()),
            year: Set(item.year),
            content_hash: Set(content_hash.to_string()),
            missing_runs: Set(0),
            last_seen_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Self::set_metadata(&mut active, &item.metadata);
        active.update(txn).await?;
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
        let episodes = self
            .count_episodes_where_in(txn, series::Column::Id, ids)
            .await?;
        let removed = Self::bookkeeping().delete(txn, ids).await?;
        Ok(removed + episodes)
    }

    async fn purge_scopes(&self, txn: &DatabaseTransaction, scope_ids: &[i32]) -> AppResult<u64> {
        let episodes = self
            .count_episodes_where_in(txn, series::Column::CategoryId, scope_ids)
            .await?;
        let removed = Self::bookkeeping()
            .delete_where_in(txn, series::Column::CategoryId, scope_ids)
            .await?;
        Ok(removed + episodes)
    }
}
