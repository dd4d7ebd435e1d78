//! Initial catalog cache schema
//!
//! Categories own movies, series and live channels; series own episodes. EPG entries
//! and sync runs stand alone.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_categories_table(manager).await?;
        self.create_movies_table(manager).await?;
        self.create_series_table(manager).await?;
        self.create_episodes_table(manager).await?;
        self.create_live_channels_table(manager).await?;
        self.create_epg_entries_table(manager).await?;
        self.create_sync_runs_table(manager).await?;

        self.create_indexes(manager).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order to handle foreign key constraints
        manager
            .drop_table(Table::drop().table(SyncRuns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EpgEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LiveChannels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Episodes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Series::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Movies::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;

        Ok(())
    }
}

impl Migration {
    fn id_column(column_name: impl IntoIden) -> ColumnDef {
        ColumnDef::new(column_name)
            .integer()
            .not_null()
            .auto_increment()
            .primary_key()
            .to_owned()
    }

    fn timestamp_column(column_name: impl IntoIden) -> ColumnDef {
        ColumnDef::new(column_name)
            .timestamp_with_time_zone()
            .not_null()
            .to_owned()
    }

    fn bookkeeping_columns<T: IntoIden + Copy>(
        table: &mut TableCreateStatement,
        missing_runs: T,
        last_seen_at: T,
    ) {
        table
            .col(
                ColumnDef::new(missing_runs)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .col(Self::timestamp_column(last_seen_at));
    }

    fn metadata_columns<T: IntoIden + Copy>(table: &mut TableCreateStatement, columns: [T; 11]) {
        let [
            plot,
            genre,
            director,
            cast,
            rating,
            release_date,
            duration_secs,
            tmdb_id,
            original_title,
            poster_url,
            backdrop_url,
        ] = columns;
        table
            .col(ColumnDef::new(plot).text())
            .col(ColumnDef::new(genre).string())
            .col(ColumnDef::new(director).string())
            .col(ColumnDef::new(cast).text())
            .col(ColumnDef::new(rating).double())
            .col(ColumnDef::new(release_date).string())
            .col(ColumnDef::new(duration_secs).big_integer())
            .col(ColumnDef::new(tmdb_id).string())
            .col(ColumnDef::new(original_title).string())
            .col(ColumnDef::new(poster_url).string())
            .col(ColumnDef::new(backdrop_url).string());
    }

    async fn create_categories_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        let mut table = Table::create();
        table
            .table(Categories::Table)
            .if_not_exists()
            .col(Self::id_column(Categories::Id))
            .col(ColumnDef::new(Categories::Domain).string().not_null())
            .col(ColumnDef::new(Categories::RemoteId).string().not_null())
            .col(ColumnDef::new(Categories::Name).string().not_null())
            .col(
                ColumnDef::new(Categories::Visible)
                    .boolean()
                    .not_null()
                    .default(false),
            );
        Self::bookkeeping_columns(&mut table, Categories::MissingRuns, Categories::LastSeenAt);
        table
            .col(Self::timestamp_column(Categories::CreatedAt))
            .col(Self::timestamp_column(Categories::UpdatedAt));

        manager.create_table(table.to_owned()).await
    }

    async fn create_movies_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        let mut table = Table::create();
        table
            .table(Movies::Table)
            .if_not_exists()
            .col(Self::id_column(Movies::Id))
            .col(ColumnDef::new(Movies::CategoryId).integer().not_null())
            .col(ColumnDef::new(Movies::RemoteId).string().not_null())
            .col(ColumnDef::new(Movies::Title).string().not_null())
            .col(ColumnDef::new(Movies::Year).integer())
            .col(ColumnDef::new(Movies::StreamUrl).string().not_null())
            .col(ColumnDef::new(Movies::ContentHash).string().not_null())
            .col(
                ColumnDef::new(Movies::Visible)
                    .boolean()
                    .not_null()
                    .default(true),
            );
        Self::bookkeeping_columns(&mut table, Movies::MissingRuns, Movies::LastSeenAt);
        Self::metadata_columns(
            &mut table,
            [
                Movies::Plot,
                Movies::Genre,
                Movies::Director,
                Movies::Cast,
                Movies::Rating,
                Movies::ReleaseDate,
                Movies::DurationSecs,
                Movies::TmdbId,
                Movies::OriginalTitle,
                Movies::PosterUrl,
                Movies::BackdropUrl,
            ],
        );
        table
            .col(Self::timestamp_column(Movies::CreatedAt))
            .col(Self::timestamp_column(Movies::UpdatedAt))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_movies_category_id")
                    .from(Movies::Table, Movies::CategoryId)
                    .to(Categories::Table, Categories::Id)
                    .on_delete(ForeignKeyAction::Cascade)
                    .on_update(ForeignKeyAction::NoAction),
            );

        manager.create_table(table.to_owned()).await
    }

    async fn create_series_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        let mut table = Table::create();
        table
            .table(Series::Table)
            .if_not_exists()
            .col(Self::id_column(Series::Id))
            .col(ColumnDef::new(Series::CategoryId).integer().not_null())
            .col(ColumnDef::new(Series::RemoteId).string().not_null())
            .col(ColumnDef::new(Series::Title).string().not_null())
            .col(ColumnDef::new(Series::Year).integer())
            .col(ColumnDef::new(Series::ContentHash).string().not_null())
            .col(ColumnDef::new(Series::EpisodesHash).string())
            .col(
                ColumnDef::new(Series::Visible)
                    .boolean()
                    .not_null()
                    .default(true),
            );
        Self::bookkeeping_columns(&mut table, Series::MissingRuns, Series::LastSeenAt);
        Self::metadata_columns(
            &mut table,
            [
                Series::Plot,
                Series::Genre,
                Series::Director,
                Series::Cast,
                Series::Rating,
                Series::ReleaseDate,
                Series::DurationSecs,
                Series::TmdbId,
                Series::OriginalTitle,
                Series::PosterUrl,
                Series::BackdropUrl,
            ],
        );
        table
            .col(Self::timestamp_column(Series::CreatedAt))
            .col(Self::timestamp_column(Series::UpdatedAt))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_series_category_id")
                    .from(Series::Table, Series::CategoryId)
                    .to(Categories::Table, Categories::Id)
                    .on_delete(ForeignKeyAction::Cascade)
                    .on_update(ForeignKeyAction::NoAction),
            );

        manager.create_table(table.to_owned()).await
    }

    async fn create_episodes_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        let mut table = Table::create();
        table
            .table(Episodes::Table)
            .if_not_exists()
            .col(Self::id_column(Episodes::Id))
            .col(ColumnDef::new(Episodes::SeriesId).integer().not_null())
            .col(ColumnDef::new(Episodes::RemoteId).string().not_null())
            .col(ColumnDef::new(Episodes::Season).integer().not_null())
            .col(ColumnDef::new(Episodes::EpisodeNumber).integer().not_null())
            .col(ColumnDef::new(Episodes::Title).string())
            .col(ColumnDef::new(Episodes::StreamUrl).string().not_null())
            .col(ColumnDef::new(Episodes::ContentHash).string().not_null());
        Self::bookkeeping_columns(&mut table, Episodes::MissingRuns, Episodes::LastSeenAt);
        table
            .col(ColumnDef::new(Episodes::Plot).text())
            .col(ColumnDef::new(Episodes::AirDate).string())
            .col(ColumnDef::new(Episodes::DurationSecs).big_integer())
            .col(ColumnDef::new(Episodes::Rating).double())
            .col(ColumnDef::new(Episodes::ThumbnailUrl).string())
            .col(Self::timestamp_column(Episodes::CreatedAt))
            .col(Self::timestamp_column(Episodes::UpdatedAt))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_episodes_series_id")
                    .from(Episodes::Table, Episodes::SeriesId)
                    .to(Series::Table, Series::Id)
                    .on_delete(ForeignKeyAction::Cascade)
                    .on_update(ForeignKeyAction::NoAction),
            );

        manager.create_table(table.to_owned()).await
    }

    async fn create_live_channels_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        let mut table = Table::create();
        table
            .table(LiveChannels::Table)
            .if_not_exists()
            .col(Self::id_column(LiveChannels::Id))
            .col(ColumnDef::new(LiveChannels::CategoryId).integer().not_null())
            .col(ColumnDef::new(LiveChannels::RemoteId).string().not_null())
            .col(ColumnDef::new(LiveChannels::Name).string().not_null())
            .col(ColumnDef::new(LiveChannels::StreamUrl).string().not_null())
            .col(ColumnDef::new(LiveChannels::EpgChannelId).string())
            .col(ColumnDef::new(LiveChannels::LogoUrl).string())
            .col(
                ColumnDef::new(LiveChannels::TvArchive)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(ColumnDef::new(LiveChannels::ContentHash).string().not_null())
            .col(
                ColumnDef::new(LiveChannels::Visible)
                    .boolean()
                    .not_null()
                    .default(true),
            );
        Self::bookkeeping_columns(
            &mut table,
            LiveChannels::MissingRuns,
            LiveChannels::LastSeenAt,
        );
        table
            .col(Self::timestamp_column(LiveChannels::CreatedAt))
            .col(Self::timestamp_column(LiveChannels::UpdatedAt))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_live_channels_category_id")
                    .from(LiveChannels::Table, LiveChannels::CategoryId)
                    .to(Categories::Table, Categories::Id)
                    .on_delete(ForeignKeyAction::Cascade)
                    .on_update(ForeignKeyAction::NoAction),
            );

        manager.create_table(table.to_owned()).await
    }

    async fn create_epg_entries_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EpgEntries::Table)
                    .if_not_exists()
                    .col(Self::id_column(EpgEntries::Id))
                    .col(ColumnDef::new(EpgEntries::ChannelRemoteId).string().not_null())
                    .col(Self::timestamp_column(EpgEntries::StartTime))
                    .col(Self::timestamp_column(EpgEntries::EndTime))
                    .col(ColumnDef::new(EpgEntries::Title).string().not_null())
                    .col(ColumnDef::new(EpgEntries::Description).text())
                    .col(ColumnDef::new(EpgEntries::Category).string())
                    .col(ColumnDef::new(EpgEntries::Lang).string())
                    .to_owned(),
            )
            .await
    }

    async fn create_sync_runs_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncRuns::Table)
                    .if_not_exists()
                    .col(Self::id_column(SyncRuns::Id))
                    .col(ColumnDef::new(SyncRuns::RunId).string().not_null())
                    .col(ColumnDef::new(SyncRuns::Domain).string().not_null())
                    .col(Self::timestamp_column(SyncRuns::StartedAt))
                    .col(ColumnDef::new(SyncRuns::FinishedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(SyncRuns::Outcome).string().not_null())
                    .col(ColumnDef::new(SyncRuns::Stage).string())
                    .col(ColumnDef::new(SyncRuns::Error).text())
                    .col(
                        ColumnDef::new(SyncRuns::ItemsAdded)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncRuns::ItemsUpdated)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncRuns::ItemsRemoved)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncRuns::CategoriesFailed)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SyncRuns::OmittedCategories).text())
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_categories_domain_remote_id")
                    .table(Categories::Table)
                    .col(Categories::Domain)
                    .col(Categories::RemoteId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movies_remote_id")
                    .table(Movies::Table)
                    .col(Movies::RemoteId)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_movies_category_id")
                    .table(Movies::Table)
                    .col(Movies::CategoryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_series_remote_id")
                    .table(Series::Table)
                    .col(Series::RemoteId)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_series_category_id")
                    .table(Series::Table)
                    .col(Series::CategoryId)
                    .to_owned(),
            )
            .await?;

        // Episode identity
        manager
            .create_index(
                Index::create()
                    .name("idx_episodes_identity")
                    .table(Episodes::Table)
                    .col(Episodes::SeriesId)
                    .col(Episodes::Season)
                    .col(Episodes::EpisodeNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_live_channels_remote_id")
                    .table(LiveChannels::Table)
                    .col(LiveChannels::RemoteId)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_live_channels_category_id")
                    .table(LiveChannels::Table)
                    .col(LiveChannels::CategoryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_epg_entries_channel_start")
                    .table(EpgEntries::Table)
                    .col(EpgEntries::ChannelRemoteId)
                    .col(EpgEntries::StartTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_runs_domain_started_at")
                    .table(SyncRuns::Table)
                    .col(SyncRuns::Domain)
                    .col(SyncRuns::StartedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

// Table identifiers
#[derive(DeriveIden, Clone, Copy)]
enum Categories {
    Table,
    Id,
    Domain,
    RemoteId,
    Name,
    Visible,
    MissingRuns,
    LastSeenAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden, Clone, Copy)]
enum Movies {
    Table,
    Id,
    CategoryId,
    RemoteId,
    Title,
    Year,
    StreamUrl,
    ContentHash,
    Visible,
    MissingRuns,
    LastSeenAt,
    Plot,
    Genre,
    Director,
    Cast,
    Rating,
    ReleaseDate,
    DurationSecs,
    TmdbId,
    OriginalTitle,
    PosterUrl,
    BackdropUrl,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden, Clone, Copy)]
enum Series {
    Table,
    Id,
    CategoryId,
    RemoteId,
    Title,
    Year,
    ContentHash,
    EpisodesHash,
    Visible,
    MissingRuns,
    LastSeenAt,
    Plot,
    Genre,
    Director,
    Cast,
    Rating,
    ReleaseDate,
    DurationSecs,
    TmdbId,
    OriginalTitle,
    PosterUrl,
    BackdropUrl,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden, Clone, Copy)]
enum Episodes {
    Table,
    Id,
    SeriesId,
    RemoteId,
    Season,
    EpisodeNumber,
    Title,
    StreamUrl,
    ContentHash,
    MissingRuns,
    LastSeenAt,
    Plot,
    AirDate,
    DurationSecs,
    Rating,
    ThumbnailUrl,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden, Clone, Copy)]
enum LiveChannels {
    Table,
    Id,
    CategoryId,
    RemoteId,
    Name,
    StreamUrl,
    EpgChannelId,
    LogoUrl,
    TvArchive,
    ContentHash,
    Visible,
    MissingRuns,
    LastSeenAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden, Clone, Copy)]
enum EpgEntries {
    Table,
    Id,
    ChannelRemoteId,
    StartTime,
    EndTime,
    Title,
    Description,
    Category,
    Lang,
}

#[derive(DeriveIden, Clone, Copy)]
enum SyncRuns {
    Table,
    Id,
    RunId,
    Domain,
    StartedAt,
    FinishedAt,
    Outcome,
    Stage,
    Error,
    ItemsAdded,
    ItemsUpdated,
    ItemsRemoved,
    CategoriesFailed,
    OmittedCategories,
}
