//! SeaORM repository implementations
//!
//! Item repositories implement [`DomainStore`](crate::reconciler::DomainStore) so the
//! reconciler can drive them generically. The others serve the orchestrator and the
//! service facade.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::errors::AppResult;

pub mod category;
pub mod epg_entry;
pub mod episode;
pub mod live_channel;
pub mod movie;
pub mod series;
pub mod sync_run;

pub use category::{CategoryRepository, CategorySync};
pub use epg_entry::EpgEntryRepository;
pub use episode::EpisodeRepository;
pub use live_channel::LiveChannelRepository;
pub use movie::MovieRepository;
pub use series::SeriesRepository;
pub use sync_run::SyncRunRepository;

/// Upper bound on ids bound into a single `IN (...)` list
pub const ID_CHUNK: usize = 500;

/// Bookkeeping columns shared by every reconciled table.
pub(crate) struct Bookkeeping<E: EntityTrait> {
    pub id: E::Column,
    pub missing_runs: E::Column,
    pub last_seen_at: E::Column,
}

impl<E: EntityTrait> Bookkeeping<E> {
    pub async fn touch<C: ConnectionTrait>(
        &self,
        db: &C,
        ids: &[i32],
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        for chunk in ids.chunks(ID_CHUNK) {
            E::update_many()
                .col_expr(self.last_seen_at, Expr::value(now))
                .col_expr(self.missing_runs, Expr::value(0))
                .filter(self.id.is_in(chunk.iter().copied()))
                .exec(db)
                .await?;
        }
        Ok(())
    }

    pub async fn mark_stale<C: ConnectionTrait>(&self, db: &C, ids: &[i32]) -> AppResult<()> {
        for chunk in ids.chunks(ID_CHUNK) {
            E::update_many()
                .col_expr(self.missing_runs, Expr::col(self.missing_runs).add(1))
                .filter(self.id.is_in(chunk.iter().copied()))
                .exec(db)
                .await?;
        }
        Ok(())
    }

    pub async fn delete<C: ConnectionTrait>(&self, db: &C, ids: &[i32]) -> AppResult<u64> {
        self.delete_where_in(db, self.id, ids).await
    }

    /// Delete rows whose `column` is one of `values`.
    pub async fn delete_where_in<C: ConnectionTrait>(
        &self,
        db: &C,
        column: E::Column,
        values: &[i32],
    ) -> AppResult<u64> {
        let mut removed = 0;
        for chunk in values.chunks(ID_CHUNK) {
            removed += E::delete_many()
                .filter(column.is_in(chunk.iter().copied()))
                .exec(db)
                .await?
                .rows_affected;
        }
        Ok(removed)
    }
}
