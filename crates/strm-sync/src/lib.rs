//! # strm-sync
//!
//! Mirrors an Xtream-style IPTV catalog into a local SQLite cache and materializes the
//! visible part of it as media-center friendly files.
//!
//! - [`sources`]: provider clients yielding typed record streams
//! - [`database`]: the catalog cache and its transactional sessions
//! - [`reconciler`]: the generic delta engine shared by every content domain
//! - [`generator`]: `.strm`, NFO, M3U and XMLTV output with minimal filesystem churn
//! - [`sync`]: run locks, the orchestrator and the [`sync::SyncService`] facade

#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod database;
pub mod entities;
pub mod errors;
pub mod generator;
pub mod models;
pub mod reconciler;
pub mod sources;
pub mod sync;
pub mod utils;
