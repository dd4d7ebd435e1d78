//! Shared harness for the integration tests: a temporary library, an in-memory cache
//! and a [`MemoryProvider`] wired into a [`SyncService`].

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use strm_sync::config::Config;
use strm_sync::database::{CatalogCache, Database};
use strm_sync::models::{
    ContentDomain, DomainReport, EpgEntry, MediaMetadata, RemoteCategory, RemoteEpisode,
    RemoteLiveChannel, RemoteMovie, RemoteSeries, SyncReport, SyncTarget,
};
use strm_sync::sources::{CatalogProvider, MemoryProvider};
use strm_sync::sync::SyncService;

pub struct Harness {
    pub temp: TempDir,
    pub provider: Arc<MemoryProvider>,
    pub service: SyncService,
}

/// Library roots under `temp`, new categories shown, guide off, one fetch at a time.
pub fn test_config(temp: &Path) -> Config {
    let mut config = Config::default();
    config.library.movies_path = temp.join("movies");
    config.library.series_path = temp.join("series");
    config.library.live_path = temp.join("live");
    config.library.write_nfo = false;
    config.reconciliation.new_category_visible = true;
    config.reconciliation.enrich_movie_metadata = false;
    config.provider.fetch_concurrency = 1;
    config.epg.enabled = false;
    config
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(temp.path());
        adjust(&mut config);

        let database = Database::in_memory().await.unwrap();
        let provider = Arc::new(MemoryProvider::new());
        let service = SyncService::new(CatalogCache::new(database), provider.clone(), &config);
        Self {
            temp,
            provider,
            service,
        }
    }

    /// A file-backed cache, with the memory provider seen through `wrap`.
    pub async fn wrapping(
        wrap: impl FnOnce(Arc<MemoryProvider>) -> Arc<dyn CatalogProvider>,
    ) -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(temp.path());
        config.database.url = format!("sqlite://{}", temp.path().join("cache.db").display());

        let database = Database::new(&config.database).await.unwrap();
        database.migrate().await.unwrap();
        let provider = Arc::new(MemoryProvider::new());
        let service = SyncService::new(
            CatalogCache::new(database),
            wrap(provider.clone()),
            &config,
        );
        Self {
            temp,
            provider,
            service,
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp.path().join(relative)
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).unwrap()
    }

    /// Run one domain to completion.
    pub async fn sync(&self, domain: ContentDomain) -> DomainReport {
        let report = self.sync_target(SyncTarget::Domain(domain)).await;
        report.domain(domain).cloned().unwrap()
    }

    pub async fn sync_target(&self, target: SyncTarget) -> SyncReport {
        self.service
            .trigger_sync(target)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap()
    }

    /// Relative paths of the files below a library root, sorted.
    pub fn files(&self, root: &str) -> Vec<String> {
        let base = self.path(root);
        let mut found = Vec::new();
        collect_files(&base, &base, &mut found);
        found.sort();
        found
    }
}

fn collect_files(base: &Path, dir: &Path, found: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect_files(base, &path, found);
        } else {
            let relative = path.strip_prefix(base).unwrap();
            found.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
}

pub fn category(remote_id: &str, name: &str) -> RemoteCategory {
    RemoteCategory {
        remote_id: remote_id.to_string(),
        name: name.to_string(),
    }
}

pub fn movie(remote_id: &str, title: &str) -> RemoteMovie {
    RemoteMovie {
        remote_id: remote_id.to_string(),
        title: title.to_string(),
        year: None,
        stream_url: format!("http://provider.test/movie/u/p/{remote_id}.mkv"),
        metadata: MediaMetadata::default(),
    }
}

pub fn series(remote_id: &str, title: &str, last_modified: &str) -> RemoteSeries {
    RemoteSeries {
        remote_id: remote_id.to_string(),
        title: title.to_string(),
        year: None,
        last_modified: Some(last_modified.to_string()),
        metadata: MediaMetadata::default(),
    }
}

pub fn episode(remote_id: &str, season: i32, number: i32, stream_id: &str) -> RemoteEpisode {
    RemoteEpisode {
        remote_id: remote_id.to_string(),
        season,
        episode_number: number,
        title: None,
        stream_url: format!("http://provider.test/series/u/p/{stream_id}.mp4"),
        plot: None,
        air_date: None,
        duration_secs: None,
        rating: None,
        thumbnail_url: None,
    }
}

pub fn channel(remote_id: &str, name: &str, epg_id: Option<&str>) -> RemoteLiveChannel {
    RemoteLiveChannel {
        remote_id: remote_id.to_string(),
        name: name.to_string(),
        stream_url: format!("http://provider.test/live/u/p/{remote_id}.ts"),
        epg_channel_id: epg_id.map(str::to_string),
        logo_url: None,
        tv_archive: false,
    }
}

pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
}

pub fn programme(channel: &str, hour: u32, title: &str) -> EpgEntry {
    EpgEntry {
        channel_remote_id: channel.to_string(),
        start: at(hour),
        end: at(hour + 1),
        title: title.to_string(),
        description: None,
        category: None,
        lang: None,
    }
}

pub fn modified(path: &Path) -> std::time::SystemTime {
    std::fs::metadata(path).unwrap().modified().unwrap()
}
