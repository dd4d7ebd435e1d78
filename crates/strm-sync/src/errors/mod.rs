//! Centralized error handling for strm-sync
//!
//! # Error Categories
//!
//! - **Provider Errors**: transient (retry next run) or fatal (abort the domain run)
//! - **Cache Integrity Errors**: database failures, always rolled back
//! - **Filesystem Errors**: per-artifact failures, fatal only for an output root
//! - **Validation / Configuration Errors**: caller input and config problems
//!
//! # Usage
//!
//! ```rust
//! use strm_sync::errors::{AppError, AppResult};
//!
//! fn grace_runs(value: i64) -> AppResult<u32> {
//!     u32::try_from(value).map_err(|_| AppError::validation("grace_runs must be positive"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for catalog cache Results
pub type CacheResult<T> = Result<T, CacheIntegrityError>;

/// Convenience type alias for provider Results
pub type ProviderResult<T> = Result<T, ProviderError>;
