//! `SeaORM` entities for the catalog cache

pub mod prelude;

pub mod categories;
pub mod episodes;
pub mod epg_entries;
pub mod live_channels;
pub mod movies;
pub mod series;
pub mod sync_runs;
