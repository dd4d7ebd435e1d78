//! `SeaORM` Entity for series episodes
//!
//! Identity is `(series_id, season, episode_number)`, enforced by a unique index.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "episodes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub series_id: i32,
    pub remote_id: String,
    pub season: i32,
    pub episode_number: i32,
    pub title: Option<String>,
    pub stream_url: String,
    pub content_hash: String,
    pub missing_runs: i32,
    pub last_seen_at: ChronoDateTimeUtc,
    pub plot: Option<String>,
    pub air_date: Option<String>,
    pub duration_secs: Option<i64>,
    pub rating: Option<f64>,
    pub thumbnail_url: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::series::Entity",
        from = "Column::SeriesId",
        to = "super::series::Column::Id",
        on_delete = "Cascade"
    )]
    Series,
}

impl Related<super::series::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Series.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
