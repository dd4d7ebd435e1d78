//! `SeaORM` Entity for the sync run audit log

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_runs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub run_id: String,
    pub domain: String,
    pub started_at: ChronoDateTimeUtc,
    pub finished_at: Option<ChronoDateTimeUtc>,
    pub outcome: String,
    pub stage: Option<String>,
    pub error: Option<String>,
    pub items_added: i32,
    pub items_updated: i32,
    pub items_removed: i32,
    pub categories_failed: i32,
    /// JSON array of category or series names skipped after transient failures
    pub omitted_categories: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
