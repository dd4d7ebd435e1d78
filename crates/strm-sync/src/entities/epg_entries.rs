//! `SeaORM` Entity for guide programmes
//!
//! Rows are replaced as a whole set; there is no per-row identity beyond the id.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "epg_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub channel_remote_id: String,
    pub start_time: ChronoDateTimeUtc,
    pub end_time: ChronoDateTimeUtc,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub lang: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
