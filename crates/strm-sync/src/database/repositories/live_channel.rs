//! SeaORM-based LiveChannel repository implementation

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, NotSet,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use super::Bookkeeping;
use crate::entities::{categories, live_channels, prelude::LiveChannels};
use crate::errors::AppResult;
use crate::models::{LiveChannel, RemoteLiveChannel, VisibleChannel};
use crate::reconciler::{CachedRow, DomainStore};

/// Repository for cached live channels. Scope is the category.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveChannelRepository;

impl LiveChannelRepository {
    fn bookkeeping() -> Bookkeeping<LiveChannels> {
        Bookkeeping {
            id: live_channels::Column::Id,
            missing_runs: live_channels::Column::MissingRuns,
            last_seen_at: live_channels::Column::LastSeenAt,
        }
    }

    /// Visible channels under visible categories, grouped by category name
    pub async fn find_visible<C: ConnectionTrait>(&self, db: &C) -> AppResult<Vec<VisibleChannel>> {
        let rows = LiveChannels::find()
            .find_also_related(categories::Entity)
            .filter(live_channels::Column::Visible.eq(true))
            .filter(categories::Column::Visible.eq(true))
            .order_by_asc(categories::Column::Name)
            .order_by_asc(live_channels::Column::Name)
            .order_by_asc(live_channels::Column::RemoteId)
            .all(db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(channel, category)| VisibleChannel {
                channel: Self::model_to_domain(channel),
                category_name: category.map(|c| c.name).unwrap_or_default(),
            })
            .collect())
    }

    /// Guide ids of every cached channel, visible or not
    pub async fn epg_channel_ids(&self, txn: &DatabaseTransaction) -> AppResult<HashSet<String>> {
        let ids: Vec<Option<String>> = LiveChannels::find()
            .select_only()
            .column(live_channels::Column::EpgChannelId)
            .filter(live_channels::Column::EpgChannelId.is_not_null())
            .into_tuple()
            .all(txn)
            .await?;
        Ok(ids
            .into_iter()
            .flatten()
            .filter(|id| !id.is_empty())
            .collect())
    }

    pub async fn set_visibility<C: ConnectionTrait>(
        &self,
        db: &C,
        remote_id: &str,
        visible: bool,
    ) -> AppResult<u64> {
        let result = LiveChannels::update_many()
            .col_expr(live_channels::Column::Visible, Expr::value(visible))
            .filter(live_channels::Column::RemoteId.eq(remote_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn count<C: ConnectionTrait>(&self, db: &C, visible_only: bool) -> AppResult<u64> {
        let mut query = LiveChannels::find();
        if visible_only {
            query = query
                .inner_join(categories::Entity)
                .filter(live_channels::Column::Visible.eq(true))
                .filter(categories::Column::Visible.eq(true));
        }
        Ok(query.count(db).await?)
    }

    pub async fn delete_all<C: ConnectionTrait>(&self, db: &C) -> AppResult<u64> {
        Ok(LiveChannels::delete_many().exec(db).await?.rows_affected)
    }

    fn model_to_domain(model: live_channels::Model) -> LiveChannel {
        LiveChannel {
            id: model.id,
            category_id: model.category_id,
            remote_id: model.remote_id,
            name: model.name,
            stream_url: model.stream_url,
            epg_channel_id: model.epg_channel_id,
            logo_url: model.logo_url,
            tv_archive: model.tv_archive,
            content_hash: model.content_hash,
            visible: model.visible,
            missing_runs: model.missing_runs,
            last_seen_at: model.last_seen_at,
        }
    }
}

#[async_trait]
impl DomainStore for LiveChannelRepository {
    type Item = RemoteLiveChannel;

    fn entity_name(&self) -> &'static str {
        "live channel"
    }

    async fn load_cached(
        &self,
        txn: &DatabaseTransaction,
        scope_ids: Option<&[i32]>,
    ) -> AppResult<Vec<CachedRow<String>>> {
        let mut query = LiveChannels::find().select_only().columns([
            live_channels::Column::Id,
            live_channels::Column::RemoteId,
            live_channels::Column::CategoryId,
            live_channels::Column::ContentHash,
            live_channels::Column::MissingRuns,
        ]);
        if let Some(scope_ids) = scope_ids {
            query =
                query.filter(live_channels::Column::CategoryId.is_in(scope_ids.iter().copied()));
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
        item: &RemoteLiveChannel,
        content_hash: &str,
        visible: bool,
        now: DateTime<Utc>,
    ) -> AppResult<i32> {
        let active = live_channels::ActiveModel {
            id: NotSet,
            category_id: Set(scope_id),
            remote_id: Set(item.remote_id.clone()),
            name: Set(item.name.clone()),
            stream_url: Set(item.stream_url.clone()),
            epg_channel_id: Set(item.epg_channel_id.clone()),
            logo_url: Set(item.logo_url.clone()),
            tv_archive: Set(item.tv_archive),
            content_hash: Set(content_hash.to_string()),
            visible: Set(visible),
            missing_runs: Set(0),
            last_seen_at: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = LiveChannels::insert(active).exec(txn).await?;
        Ok(result.last_insert_id)
    }

    async fn update(
        &self,
        txn: &DatabaseTransaction,
        row_id: i32,
        scope_id: i32,
        item: &RemoteLiveChannel,
        content_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        live_channels::ActiveModel {
            id: Set(row_id),
            category_id: Set(scope_id),
            name: Set(item.name.clone()),
            stream_url: Set(item.stream_url.clone()),
            epg_channel_id: Set(item.epg_channel_id.clone()),
            logo_url: Set(item.logo_url.clone()),
            tv_archive: Set(item.tv_archive),
            content_hash: Set(content_hash.to_string()),
            missing_runs: Set(0),
            last_seen_at: Set(now),
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
            .delete_where_in(txn, live_channels::Column::CategoryId, scope_ids)
            .await
    }
}
