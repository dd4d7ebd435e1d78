//! Sync orchestration
//!
//! A triggered run locks its domains, then walks each one through
//! `Fetching → Reconciling → Generating` and back to `Idle`, or to `Failed`. Stage changes
//! are broadcast to [`SyncService::subscribe`] receivers.

pub mod orchestrator;
pub mod service;
pub mod state_manager;

pub use orchestrator::SyncOrchestrator;
pub use service::{RunHandle, SyncService};
pub use state_manager::{DomainRunState, ProgressReporter, SyncStateManager};
