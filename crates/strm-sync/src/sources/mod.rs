//! Catalog providers
//!
//! A provider turns a remote catalog into typed [`RemoteRecord`](crate::models::RemoteRecord)
//! streams. [`XtreamProvider`] speaks the Xtream Codes API; [`MemoryProvider`] serves an
//! in-memory catalog.
//!
//! # Usage
//!
//! ```rust,no_run
//! use futures::TryStreamExt;
//! use strm_sync::config::ProviderConfig;
//! use strm_sync::models::ContentDomain;
//! use strm_sync::sources::{CatalogProvider, XtreamProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = XtreamProvider::new(&ProviderConfig {
//!     base_url: "http://provider.example:8080".to_string(),
//!     username: "user".to_string(),
//!     password: "pass".to_string(),
//!     ..ProviderConfig::default()
//! })?;
//!
//! let categories: Vec<_> = provider
//!     .fetch_categories(ContentDomain::Movie)
//!     .try_collect()
//!     .await?;
//! println!("{} movie categories", categories.len());
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod traits;
pub mod xtream;

pub use memory::{Endpoint, MemoryProvider};
pub use traits::{CatalogProvider, ProviderStream};
pub use xtream::XtreamProvider;
