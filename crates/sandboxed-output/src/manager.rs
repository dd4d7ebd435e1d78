//! Core sandboxed output manager implementation.

use crate::{
    error::{Result, SandboxedFileError},
    security::{set_secure_permissions, validate_path_within_sandbox, validate_relative_path},
};

use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tokio::fs;

const TEMP_PREFIX: &str = ".sbx-";
const TEMP_SUFFIX: &str = ".tmp";
const DEFAULT_FILE_MODE: u32 = 0o644;

/// File operations confined to one base directory.
///
/// All paths passed in are relative to the base directory and use `/` separators.
#[derive(Debug, Clone)]
pub struct SandboxedManager {
    base_dir: PathBuf,
    file_mode: u32,
}

impl SandboxedManager {
    /// Create a new builder for configuring the manager.
    #[must_use]
    pub fn builder() -> SandboxedManagerBuilder {
        SandboxedManagerBuilder::new()
    }

    /// The canonical base directory of the sandbox.
    #[must_use]
    pub fn base_directory(&self) -> &Path {
        &self.base_dir
    }

    /// Write a file atomically.
    ///
    /// Contents go to a temp file in the target directory which is then renamed over the
    /// destination, so readers never observe a partially written file.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The path is invalid or escapes the sandbox
    /// - Parent directories cannot be created
    /// - The temp file cannot be written or renamed into place
    pub async fn write_atomic<P: AsRef<str>, C: AsRef<[u8]>>(
        &self,
        path: P,
        contents: C,
    ) -> Result<()> {
        let path_str = path.as_ref();
        let file_path = self.validate_and_get_path(path_str)?;
        let parent = file_path
            .parent()
            .ok_or_else(|| SandboxedFileError::PathValidation {
                path: file_path.clone(),
                reason: "Path has no parent directory".to_string(),
            })?
            .to_path_buf();

        fs::create_dir_all(&parent)
            .await
            .map_err(|e| SandboxedFileError::DirectoryCreation {
                path: parent.clone(),
                source: e,
            })?;
        // Re-check now that intermediate directories exist.
        validate_path_within_sandbox(&file_path, &self.base_dir)?;

        let bytes = contents.as_ref().to_vec();
        let file_mode = self.file_mode;
        let target = file_path.clone();
        tokio::task::spawn_blocking(move || persist_atomically(&parent, &target, &bytes, file_mode))
            .await
            .map_err(|e| SandboxedFileError::AtomicWrite {
                path: file_path.clone(),
                source: std::io::Error::other(e),
            })?
            .map_err(|source| SandboxedFileError::AtomicWrite {
                path: file_path.clone(),
                source,
            })?;

        tracing::trace!("Atomically wrote '{}'", file_path.display());
        Ok(())
    }

    /// Sandboxed version of `std::fs::read_to_string`.
    ///
    /// # Errors
    /// Returns an error if the path is invalid or the file cannot be read as UTF-8 text.
    pub async fn read_to_string<P: AsRef<str>>(&self, path: P) -> Result<String> {
        let file_path = self.validate_and_get_path(path.as_ref())?;
        Ok(fs::read_to_string(&file_path).await?)
    }

    /// Read a file if it exists, `None` when it does not.
    ///
    /// # Errors
    /// Returns an error if the path is invalid or reading fails for any reason other than
    /// the file being absent.
    pub async fn read_optional<P: AsRef<str>>(&self, path: P) -> Result<Option<Vec<u8>>> {
        let file_path = self.validate_and_get_path(path.as_ref())?;
        match fs::read(&file_path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Sandboxed version of `std::fs::remove_file`.
    ///
    /// # Errors
    /// Returns an error if the path is invalid or the removal fails.
    pub async fn remove_file<P: AsRef<str>>(&self, path: P) -> Result<()> {
        let file_path = self.validate_and_get_path(path.as_ref())?;
        fs::remove_file(&file_path).await?;
        Ok(())
    }

    /// Remove a file, then remove each parent directory that became empty, stopping at
    /// the sandbox base. Returns the number of directories removed.
    ///
    /// # Errors
    /// Returns an error if the path is invalid or the file removal fails. Failures to
    /// remove a parent directory end the pruning silently.
    pub async fn remove_file_and_prune<P: AsRef<str>>(&self, path: P) -> Result<usize> {
        let file_path = self.validate_and_get_path(path.as_ref())?;
        fs::remove_file(&file_path).await?;

        let mut pruned = 0;
        let mut current = file_path.parent().map(Path::to_path_buf);
        while let Some(dir) = current {
            if dir == self.base_dir || !dir.starts_with(&self.base_dir) {
                break;
            }
            if fs::remove_dir(&dir).await.is_err() {
                break;
            }
            pruned += 1;
            current = dir.parent().map(Path::to_path_buf);
        }

        Ok(pruned)
    }

    /// Sandboxed version of `std::fs::create_dir_all`. A no-op when the directory exists.
    ///
    /// # Errors
    /// Returns an error if path validation or directory creation fails.
    pub async fn create_dir_all<P: AsRef<str>>(&self, path: P) -> Result<()> {
        let dir_path = self.validate_and_get_path(path.as_ref())?;
        fs::create_dir_all(&dir_path)
            .await
            .map_err(|e| SandboxedFileError::DirectoryCreation {
                path: dir_path.clone(),
                source: e,
            })?;
        Ok(())
    }

    /// Sandboxed version of `Path::exists`.
    ///
    /// # Errors
    /// Returns an error if the path is empty, absolute, or escapes the sandbox root.
    pub async fn exists<P: AsRef<str>>(&self, path: P) -> Result<bool> {
        let file_path = self.validate_and_get_path(path.as_ref())?;
        Ok(fs::try_exists(&file_path).await?)
    }

    /// Get the full filesystem path for a file within the sandbox.
    ///
    /// # Errors
    /// Returns an error if the relative path is invalid or escapes the sandbox.
    pub fn get_full_path<P: AsRef<str>>(&self, path: P) -> Result<PathBuf> {
        self.validate_and_get_path(path.as_ref())
    }

    /// List every regular file below the sandbox base.
    ///
    /// Paths are relative, `/`-separated and sorted. Symlinks are not followed and
    /// leftover temp files from interrupted writes are skipped.
    ///
    /// # Errors
    /// Returns an error if a directory cannot be read.
    pub async fn list_files_recursive(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let mut pending = vec![self.base_dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let entry_path = entry.path();
                if file_type.is_dir() {
                    pending.push(entry_path);
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX) {
                    continue;
                }
                if let Ok(relative) = entry_path.strip_prefix(&self.base_dir) {
                    let parts: Vec<String> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    files.push(parts.join("/"));
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Verify that new files can be created directly below the base directory.
    ///
    /// # Errors
    /// Returns `Permission` when a test file cannot be created.
    pub async fn check_writable(&self) -> Result<()> {
        let base = self.base_dir.clone();
        let created = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(TEMP_PREFIX)
                .suffix(TEMP_SUFFIX)
                .tempfile_in(&base)
                .map(drop)
        })
        .await
        .map_err(|e| SandboxedFileError::Io(std::io::Error::other(e)))?;

        created.map_err(|_e| SandboxedFileError::Permission {
            operation: "create file".to_string(),
            path: self.base_dir.clone(),
        })
    }

    /// Whether names under the base directory compare case-insensitively, as on default
    /// macOS and Windows volumes.
    pub async fn is_case_insensitive(&self) -> Result<bool> {
        let base = self.base_dir.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<bool> {
            let marker = tempfile::Builder::new()
                .prefix(TEMP_PREFIX)
                .suffix(TEMP_SUFFIX)
                .tempfile_in(&base)?;
            let upper = marker
                .path()
                .file_name()
                .map(|name| name.to_string_lossy().to_uppercase())
                .unwrap_or_default();
            Ok(base.join(upper).exists())
        })
        .await
        .map_err(|e| SandboxedFileError::Io(std::io::Error::other(e)))?
        .map_err(SandboxedFileError::Io)
    }

    /// Validate a filepath and construct the full path within the sandbox.
    fn validate_and_get_path(&self, filepath: &str) -> Result<PathBuf> {
        validate_relative_path(Path::new(filepath))?;

        let full_path = self.base_dir.join(filepath);
        validate_path_within_sandbox(&full_path, &self.base_dir)?;

        tracing::trace!(
            "Path validated: '{}' -> '{}'",
            filepath,
            full_path.display()
        );

        Ok(full_path)
    }
}

fn persist_atomically(
    parent: &Path,
    target: &Path,
    bytes: &[u8],
    file_mode: u32,
) -> std::io::Result<()> {
    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(file_mode))?;
    }
    #[cfg(not(unix))]
    let _ = file_mode;

    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Builder for configuring a `SandboxedManager`.
pub struct SandboxedManagerBuilder {
    base_directory: Option<PathBuf>,
    secure_permissions: bool,
    file_mode: u32,
}

impl SandboxedManagerBuilder {
    fn new() -> Self {
        Self {
            base_directory: None,
            secure_permissions: false,
            file_mode: DEFAULT_FILE_MODE,
        }
    }

    /// Set the base directory for file storage.
    #[must_use]
    pub fn base_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.base_directory = Some(path.into());
        self
    }

    /// Restrict the base directory to its owner (mode 0700 on Unix).
    #[must_use]
    pub const fn secure_permissions(mut self, enabled: bool) -> Self {
        self.secure_permissions = enabled;
        self
    }

    /// Unix mode applied to written files.
    #[must_use]
    pub const fn file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    /// Build the `SandboxedManager`.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Base directory is not set
    /// - Base directory cannot be created, resolved or secured
    pub async fn build(self) -> Result<SandboxedManager> {
        let base_dir = self
            .base_directory
            .ok_or_else(|| SandboxedFileError::Configuration {
                message: "Base directory is required".to_string(),
            })?;

        fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| SandboxedFileError::DirectoryCreation {
                path: base_dir.clone(),
                source: e,
            })?;

        if self.secure_permissions {
            set_secure_permissions(&base_dir).await?;
        }

        let base_dir = base_dir
            .canonicalize()
            .map_err(|e| SandboxedFileError::PathValidation {
                path: base_dir.clone(),
                reason: format!("Failed to canonicalize base directory: {e}"),
            })?;

        tracing::debug!("SandboxedManager initialized - base_dir: {:?}", base_dir);

        Ok(SandboxedManager {
            base_dir,
            file_mode: self.file_mode,
        })
    }
}
