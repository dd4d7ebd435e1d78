//! SeaORM-based Movie repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    NotSet, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use sea_orm::sea_query::Expr;

use super::Bookkeeping;
use crate::entities::{categories, movies, prelude::Movies};
use crate::errors::AppResult;
use crate::models::{MediaMetadata, Movie, RemoteMovie};
use crate::reconciler::{CachedRow, DomainStore};

/// Repository for cached movies. Scope is the category.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovieRepository;

impl MovieRepository {
    fn bookkeeping() -> Bookkeeping<Movies> {
        Bookkeeping {
            id: movies::Column::Id,
            missing_runs: movies::Column::MissingRuns,
            last_seen_at: movies::Column::LastSeenAt,
        }
    }

    /// Visible movies under visible categories, ordered by remote id
    pub async fn find_visible<C: ConnectionTrait>(&self, db: &C) -> AppResult<Vec<Movie>> {
        let models = Movies::find()
            .inner_join(categories::Entity)
            .filter(movies::Column::Visible.eq(true))
            .filter(categories::Column::Visible.eq(true))
            .order_by_asc(movies::Column::RemoteId)
            .all(db)
            .await?;

        Ok(models.into_iter().map(Self::model_to_domain).collect())
    }

    pub async fn find_by_remote_id<C: ConnectionTrait>(
        &self,
        db: &C,
        remote_id: &str,
    ) -> AppResult<Option<Movie>> {
        let model = Movies::find()
            .filter(movies::Column::RemoteId.eq(remote_id))
            .one(db)
            .await?;
        Ok(model.map(Self::model_to_domain))
    }

    /// Store enriched metadata without touching the content hash.
    pub async fn update_metadata(
        &self,
        txn: &DatabaseTransaction,
        row_id: i32,
        metadata: &MediaMetadata,
    ) -> AppResult<()> {
        let mut active = movies::ActiveModel {
            id: Set(row_id),
            ..Default::default()
        };
        Self::set_metadata(&mut active, metadata);
        active.update(txn).await?;
        Ok(())
    }

    pub async fn set_visibility<C: ConnectionTrait>(
        &self,
        db: &C,
        remote_id: &str,
        visible: bool,
    ) -> AppResult<u64> {
        let result = Movies::update_many()
            .col_expr(movies::Column::Visible, Expr::value(visible))
            .filter(movies::Column::RemoteId.eq(remote_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn count<C: ConnectionTrait>(&self, db: &C, visible_only: bool) -> AppResult<u64> {
        let mut query = Movies::find();
        if visible_only {
            query = query
                .inner_join(categories::Entity)
                .filter(movies::Column::Visible.eq(true))
                .filter(categories::Column::Visible.eq(true));
        }
        Ok(query.count(db).await?)
    }

    pub async fn delete_all<C: ConnectionTrait>(&self, db: &C) -> AppResult<u64> {
        Ok(Movies::delete_many().exec(db).await?.rows_affected)
    }

    fn set_metadata(active: &mut movies::ActiveModel, metadata: &MediaMetadata) {
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

    fn model_to_domain(model: movies::Model) -> Movie {
        Movie {
            id: model.id,
            category_id: model.category_id,
            remote_id: model.remote_id,
            title: model.title,
            year: model.year,
            stream_url: model.stream_url,
            content_hash: model.content_hash,
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
impl DomainStore for MovieRepository {
    type Item = RemoteMovie;

    fn entity_name(&self) -> &'static str {
        "movie"
    }

    async fn load_cached(
        &self,
        txn: &DatabaseTransaction,
        scope_ids: Option<&[i32]>,
    ) -> AppResult<Vec<CachedRow<String>>> {
        let mut query = Movies::find().select_only().columns([
            movies::Column::Id,
            movies::Column::RemoteId,
            movies::Column::CategoryId,
            movies::Column::ContentHash,
            movies::Column::MissingRuns,
        ]);
        if let Some(scope_ids) = scope_ids {
            query = query.filter(movies::Column::CategoryId.is_in(scope_ids.iter().copied()));
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
        item: &RemoteMovie,
        content_hash: &str,
        visible: bool,
        now: DateTime<Utc>,
    ) -> AppResult<i32> {
        let mut active = movies::ActiveModel {
            id: NotSet,
            category_id: Set(scope_id),
            remote_id: Set(item.remote_id.clone()),
            title: Set(item.title.clone()),
            year: Set(item.year),
            stream_url: Set(item.stream_url.clone()),
            content_hash: Set(content_hash.to_string()),
            visible: Set(visible),
            missing_runs: Set(0),
            last_seen_at: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Self::set_metadata(&mut active, &item.metadata);

        let result = Movies::insert(active).exec(txn).await?;
        Ok(result.last_insert_id)
    }

    async fn update(
        &self,
        txn: &DatabaseTransaction,
        row_id: i32,
        scope_id: i32,
        item: &RemoteMovie,
        content_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut active = movies::ActiveModel {
            id: Set(row_id),
            category_id: Set(scope_id),
            title: Set(item.title.clone()),
            year: Set(item.year),
            stream_url: Set(item.stream_url.clone()),
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
        Self::bookkeeping().delete(txn, ids).await
    }

    async fn purge_scopes(&self, txn: &DatabaseTransaction, scope_ids: &[i32]) -> AppResult<u64> {
        Self::bookkeeping()
            .delete_where_in(txn, movies::Column::CategoryId, scope_ids)
            .await
    }
}
