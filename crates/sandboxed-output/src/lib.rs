//! # Sandboxed Output
//!
//! File operations confined to a single output directory, used for library trees that
//! other software (media centers) reads while they are being updated.
//!
//! ## Features
//!
//! - **Sandboxed Operations**: All file operations are restricted to a base directory
//! - **Atomic Writes**: Temp file in the target directory, then rename
//! - **Pruning**: Removing a file also removes parent directories left empty
//! - **Path Validation**: Protection against directory traversal and symlink escapes
//!
//! ## Basic Usage
//!
//! ```rust
//! use sandboxed_output::SandboxedManager;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = SandboxedManager::builder()
//!     .base_directory("/srv/library/movies")
//!     .build()
//!     .await?;
//!
//! manager
//!     .write_atomic("Heat (1995)/Heat (1995).strm", "http://provider/movie/u/p/1.mkv\n")
//!     .await?;
//!
//! for path in manager.list_files_recursive().await? {
//!     println!("{path}");
//! }
//!
//! manager.remove_file_and_prune("Heat (1995)/Heat (1995).strm").await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod manager;
pub mod security;

pub use error::{Result, SandboxedFileError};
pub use manager::{SandboxedManager, SandboxedManagerBuilder};
