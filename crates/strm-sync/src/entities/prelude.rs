//! `SeaORM` entity prelude

pub use super::categories::Entity as Categories;
pub use super::episodes::Entity as Episodes;
pub use super::epg_entries::Entity as EpgEntries;
pub use super::live_channels::Entity as LiveChannels;
pub use super::movies::Entity as Movies;
pub use super::series::Entity as Series;
pub use super::sync_runs::Entity as SyncRuns;
