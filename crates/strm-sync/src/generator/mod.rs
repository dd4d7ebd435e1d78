//! Artifact generation
//!
//! Materializes the visible catalog as files a media center reads: `.strm` pointers and
//! NFO documents for movies and series, an M3U playlist and an XMLTV guide for live TV.
//!
//! Movie and series roots are managed as a whole. The desired tree is derived from the
//! cache, the actual tree is listed from disk, and only the difference is applied:
//! missing files are written, stale ones removed (with their emptied folders) and files
//! in both sets are rewritten only when their bytes changed. Live artifacts are single
//! files rewritten when their content changed. Every write goes through
//! [`SandboxedManager::write_atomic`], so readers never see a truncated file.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use sandboxed_output::{SandboxedFileError, SandboxedManager};
use tracing::{debug, info, warn};

pub mod naming;
pub mod nfo;
pub mod playlist;
pub mod xmltv;

use crate::config::{Config, LibraryConfig};
use crate::database::CatalogCache;
use crate::errors::{AppResult, FilesystemError};
use crate::models::{ContentDomain, GenerationSummary, Movie, SeriesWithEpisodes, VisibleCatalog};
use crate::utils::text::release_year;
use naming::{disambiguate, episode_stem, sanitize_name, season_folder, titled};

/// Extensions of the files this crate owns inside a movie or series root.
const MANAGED_EXTENSIONS: [&str; 2] = ["strm", "nfo"];

/// Desired file tree of one root: relative path to file content.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TreeLayout {
    files: BTreeMap<String, String>,
    folders: HashSet<String>,
}

impl TreeLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a top-level folder name. A name already taken (ignoring case) gets the
    /// remote id appended.
    pub fn claim_folder(&mut self, base: &str, remote_id: &str) -> String {
        let name = if self.folders.contains(&base.to_lowercase()) {
            disambiguate(base, remote_id)
        } else {
            base.to_string()
        };
        self.folders.insert(name.to_lowercase());
        name
    }

    pub fn insert(&mut self, path: String, content: String) {
        self.files.insert(path, content);
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Content of a `.strm` file: the URL and a single newline.
pub fn strm_content(stream_url: &str) -> String {
    format!("{}\n", stream_url.trim())
}

/// Sanitized display name, falling back to the remote id when nothing is left.
fn display_name(title: &str, remote_id: &str) -> String {
    let name = sanitize_name(title);
    if name.is_empty() {
        remote_id.to_string()
    } else {
        name
    }
}

fn is_managed(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            MANAGED_EXTENSIONS
                .iter()
                .any(|managed| ext.eq_ignore_ascii_case(managed))
        })
}

/// Desired movie tree: `Title (Year)/Title (Year).strm` plus an optional NFO.
///
/// Names are claimed in cache insertion order, so an item already on disk keeps its
/// folder when a newcomer sanitizes to the same name.
pub fn movie_layout(movies: &[Movie], write_nfo: bool) -> TreeLayout {
    let mut ordered: Vec<&Movie> = movies.iter().collect();
    ordered.sort_by_key(|movie| movie.id);

    let mut layout = TreeLayout::new();
    for movie in ordered {
        let year = movie
            .year
            .or_else(|| release_year(movie.metadata.release_date.as_deref(), &movie.title));
        let base = titled(&display_name(&movie.title, &movie.remote_id), year);
        let folder = layout.claim_folder(&base, &movie.remote_id);

        layout.insert(
            format!("{folder}/{folder}.strm"),
            strm_content(&movie.stream_url),
        );
        if write_nfo {
            layout.insert(format!("{folder}/{folder}.nfo"), nfo::movie_nfo(movie));
        }
    }
    layout
}

/// Desired series tree: `Title (Year)/tvshow.nfo` and
/// `Title (Year)/Season 01/Title S01E03.strm`. Series without episodes are left out.
pub fn series_layout(series: &[SeriesWithEpisodes], write_nfo: bool) -> TreeLayout {
    let mut ordered: Vec<&SeriesWithEpisodes> =
        series.iter().filter(|s| !s.episodes.is_empty()).collect();
    ordered.sort_by_key(|s| s.series.id);

    let mut layout = TreeLayout::new();
    for SeriesWithEpisodes { series, episodes } in ordered {
        let name = display_name(&series.title, &series.remote_id);
        let year = series
            .year
            .or_else(|| release_year(series.metadata.release_date.as_deref(), &series.title));
        let folder = layout.claim_folder(&titled(&name, year), &series.remote_id);

        if write_nfo {
            layout.insert(format!("{folder}/tvshow.nfo"), nfo::tvshow_nfo(series));
        }
        for episode in episodes {
            let stem = episode_stem(&name, episode.season, episode.episode_number);
            let dir = format!("{folder}/{}", season_folder(episode.season));
            layout.insert(
                format!("{dir}/{stem}.strm"),
                strm_content(&episode.stream_url),
            );
            if write_nfo {
                layout.insert(
                    format!("{dir}/{stem}.nfo"),
                    nfo::episode_nfo(episode, &series.title),
                );
            }
        }
    }
    layout
}

/// Writes the visible catalog of a domain to its output root.
#[derive(Debug, Clone)]
pub struct ArtifactGenerator {
    library: LibraryConfig,
    epg_enabled: bool,
}

impl ArtifactGenerator {
    pub fn new(config: &Config) -> Self {
        Self {
            library: config.library.clone(),
            epg_enabled: config.epg.enabled,
        }
    }

    /// Regenerate a domain from the committed cache.
    ///
    /// Per-file failures are collected in the summary. An unusable root fails the whole
    /// pass with [`FilesystemError::Root`].
    pub async fn generate(
        &self,
        cache: &CatalogCache,
        domain: ContentDomain,
    ) -> AppResult<GenerationSummary> {
        let catalog = cache.list_visible(domain).await?;
        let summary = self.generate_catalog(domain, &catalog).await?;
        info!(
            "Generated {}: {} written, {} deleted, {} unchanged, {} failed",
            domain, summary.written, summary.deleted, summary.unchanged, summary.failed
        );
        Ok(summary)
    }

    /// Materialize an already loaded catalog snapshot.
    pub async fn generate_catalog(
        &self,
        domain: ContentDomain,
        catalog: &VisibleCatalog,
    ) -> Result<GenerationSummary, FilesystemError> {
        let root = self.open_root(domain).await?;
        match catalog {
            VisibleCatalog::Movies(movies) => {
                let layout = movie_layout(movies, self.library.write_nfo);
                sync_tree(domain, &root, &layout).await
            }
            VisibleCatalog::Series(series) => {
                let layout = series_layout(series, self.library.write_nfo);
                sync_tree(domain, &root, &layout).await
            }
            VisibleCatalog::Live { channels, epg } => {
                let mut layout = TreeLayout::new();
                layout.insert(
                    self.library.playlist_filename.clone(),
                    playlist::render_playlist(channels),
                );
                if self.epg_enabled {
                    layout.insert(
                        self.library.epg_filename.clone(),
                        xmltv::render_guide(channels, epg),
                    );
                }
                let mut summary = GenerationSummary::default();
                write_changed(&root, &layout, &mut summary).await;
                if !self.epg_enabled {
                    remove_if_present(&root, &self.library.epg_filename, &mut summary).await;
                }
                Ok(summary)
            }
        }
    }

    async fn open_root(&self, domain: ContentDomain) -> Result<SandboxedManager, FilesystemError> {
        let root = self.library.root_for(domain).to_path_buf();
        let root_error = |source: SandboxedFileError| FilesystemError::Root {
            domain,
            root: root.clone(),
            source,
        };

        let manager = SandboxedManager::builder()
            .base_directory(&root)
            .build()
            .await
            .map_err(root_error)?;
        manager.check_writable().await.map_err(root_error)?;
        Ok(manager)
    }
}

/// Bring the managed files under `root` in line with `layout`.
async fn sync_tree(
    domain: ContentDomain,
    root: &SandboxedManager,
    layout: &TreeLayout,
) -> Result<GenerationSummary, FilesystemError> {
    let root_error = |source: SandboxedFileError| FilesystemError::Root {
        domain,
        root: root.base_directory().to_path_buf(),
        source,
    };
    let actual: Vec<String> = root
        .list_files_recursive()
        .await
        .map_err(root_error)?
        .into_iter()
        .filter(|path| is_managed(path))
        .collect();
    let case_insensitive = root.is_case_insensitive().await.map_err(root_error)?;
    debug!(
        "{} tree: {} desired, {} managed files on disk",
        domain,
        layout.len(),
        actual.len()
    );

    let mut summary = GenerationSummary::default();
    write_changed(root, layout, &mut summary).await;
    remove_stale(root, layout, &actual, case_insensitive, &mut summary).await;
    Ok(summary)
}

/// Delete the managed files `layout` no longer wants, pruning emptied folders.
///
/// On a case-insensitive volume a path differing from a desired one only in case is
/// that same file, and stays.
async fn remove_stale(
    root: &SandboxedManager,
    layout: &TreeLayout,
    actual: &[String],
    case_insensitive: bool,
    summary: &mut GenerationSummary,
) {
    let folded: HashSet<String> = if case_insensitive {
        layout.paths().map(str::to_lowercase).collect()
    } else {
        HashSet::new()
    };

    for path in actual.iter().filter(|path| !layout.contains(path)) {
        if folded.contains(&path.to_lowercase()) {
            debug!("Keeping '{}': it is a desired file under another case", path);
            continue;
        }
        match root.remove_file_and_prune(path).await {
            Ok(_) => summary.deleted += 1,
            Err(e) if e.is_not_found() => {}
            Err(source) => record_failure(summary, "delete", path, source),
        }
    }
}

async fn remove_if_present(root: &SandboxedManager, path: &str, summary: &mut GenerationSummary) {
    match root.remove_file(path).await {
        Ok(()) => {
            info!("Removed {} from {}", path, root.base_directory().display());
            summary.deleted += 1;
        }
        Err(e) if e.is_not_found() => {}
        Err(source) => record_failure(summary, "delete", path, source),
    }
}

/// Write every desired file whose content differs from what is on disk.
async fn write_changed(root: &SandboxedManager, layout: &TreeLayout, summary: &mut GenerationSummary) {
    for path in layout.paths() {
        let Some(content) = layout.get(path) else {
            continue;
        };
        match root.read_optional(path).await {
            Ok(Some(existing)) if existing == content.as_bytes() => {
                summary.unchanged += 1;
                continue;
            }
            Ok(_) => {}
            Err(source) => {
                record_failure(summary, "read", path, source);
                continue;
            }
        }
        match root.write_atomic(path, content).await {
            Ok(()) => summary.written += 1,
            Err(source) => record_failure(summary, "write", path, source),
        }
    }
}

fn record_failure(
    summary: &mut GenerationSummary,
    operation: &'static str,
    path: &str,
    source: SandboxedFileError,
) {
    let error = FilesystemError::File {
        operation,
        path: path.to_string(),
        source,
    };
    warn!("{}", error);
    summary.failed += 1;
    summary.errors.push(error.to_string());
}
