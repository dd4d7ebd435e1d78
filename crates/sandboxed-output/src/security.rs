//! Security utilities for path validation and sandboxing.

use crate::error::{Result, SandboxedFileError};
use std::path::{Component, Path};

/// Sets secure permissions on a directory (Unix only).
pub async fn set_secure_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        tokio::fs::set_permissions(path, perms)
            .await
            .map_err(|_e| SandboxedFileError::Permission {
                operation: "set secure permissions".to_string(),
                path: path.to_path_buf(),
            })?;
    }

    #[cfg(not(unix))]
    {
        if !path.exists() {
            return Err(SandboxedFileError::PathValidation {
                path: path.to_path_buf(),
                reason: "Directory does not exist".to_string(),
            });
        }
    }

    Ok(())
}

/// Validates a caller supplied relative path before it is joined to the sandbox base.
///
/// Rejects empty paths, null bytes, absolute paths and any `..` component.
pub fn validate_relative_path(path: &Path) -> Result<()> {
    let path_str = path.to_string_lossy();

    if path_str.is_empty() {
        return Err(SandboxedFileError::PathValidation {
            path: path.to_path_buf(),
            reason: "Filepath cannot be empty".to_string(),
        });
    }

    if path_str.contains('\0') {
        return Err(SandboxedFileError::PathValidation {
            path: path.to_path_buf(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    if path.is_absolute() {
        return Err(SandboxedFileError::PathValidation {
            path: path.to_path_buf(),
            reason: "Absolute paths not allowed - use relative paths within sandbox".to_string(),
        });
    }

    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return Err(SandboxedFileError::PathValidation {
            path: path.to_path_buf(),
            reason: "Parent directory components are not allowed".to_string(),
        });
    }

    Ok(())
}

/// Validates that a path is within the sandbox directory.
///
/// The path may not exist yet; the nearest existing ancestor is resolved by the OS so
/// that symlinks pointing outside the sandbox are caught.
pub fn validate_path_within_sandbox(path: &Path, canonical_base: &Path) -> Result<()> {
    let mut existing = path;
    let mut remainder = Vec::new();
    while !existing.exists() {
        let Some(name) = existing.file_name() else {
            break;
        };
        remainder.push(name.to_os_string());
        existing = match existing.parent() {
            Some(parent) => parent,
            None => break,
        };
    }

    let mut resolved =
        existing
            .canonicalize()
            .map_err(|e| SandboxedFileError::PathValidation {
                path: path.to_path_buf(),
                reason: format!("Failed to resolve path: {e}"),
            })?;
    for name in remainder.into_iter().rev() {
        resolved.push(name);
    }

    if !resolved.starts_with(canonical_base) {
        return Err(SandboxedFileError::PathValidation {
            path: path.to_path_buf(),
            reason: format!(
                "Path escapes sandbox: resolves to '{}' (outside '{}')",
                resolved.display(),
                canonical_base.display()
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_relative_path() {
        assert!(validate_relative_path(Path::new("file.strm")).is_ok());
        assert!(validate_relative_path(Path::new("Movie (2020)/Movie (2020).strm")).is_ok());
        assert!(validate_relative_path(Path::new("./nested/file.nfo")).is_ok());

        assert!(validate_relative_path(Path::new("")).is_err());
        assert!(validate_relative_path(Path::new("file\0.strm")).is_err());
        assert!(validate_relative_path(Path::new("/etc/passwd")).is_err());
        assert!(validate_relative_path(Path::new("../outside.strm")).is_err());
        assert!(validate_relative_path(Path::new("a/../../outside.strm")).is_err());
    }

    #[test]
    fn test_validate_path_within_sandbox() {
        let temp = tempfile::TempDir::new().unwrap();
        let base = temp.path().canonicalize().unwrap();

        assert!(validate_path_within_sandbox(&base.join("a/b/c.strm"), &base).is_ok());
        assert!(validate_path_within_sandbox(&base, &base).is_ok());

        let outside = tempfile::TempDir::new().unwrap();
        assert!(
            validate_path_within_sandbox(&outside.path().join("x.strm"), &base).is_err()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_rejected() {
        let temp = tempfile::TempDir::new().unwrap();
        let outside = tempfile::TempDir::new().unwrap();
        let base = temp.path().canonicalize().unwrap();

        std::os::unix::fs::symlink(outside.path(), base.join("link")).unwrap();
        assert!(validate_path_within_sandbox(&base.join("link/file.strm"), &base).is_err());
    }
}
