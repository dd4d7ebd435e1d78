use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{ContentDomain, SyncProgress, SyncStage};

/// Live state of one domain while a run holds its lock.
#[derive(Debug, Clone, Serialize)]
pub struct DomainRunState {
    pub run_id: Uuid,
    pub stage: SyncStage,
    pub message: String,
    pub categories_done: usize,
    pub categories_total: usize,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub cancel: CancellationToken,
}

/// Per-domain run locks and progress broadcasting.
///
/// A domain is locked from `try_start` until `finish`; a second trigger in between is
/// rejected, never queued.
#[derive(Clone)]
pub struct SyncStateManager {
    states: Arc<RwLock<HashMap<ContentDomain, DomainRunState>>>,
    progress_tx: broadcast::Sender<SyncProgress>,
}

impl SyncStateManager {
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(1000);
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            progress_tx,
        }
    }

    /// Lock every domain of a run, or none of them.
    pub async fn try_start(
        &self,
        run_id: Uuid,
        domains: &[ContentDomain],
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        let mut states = self.states.write().await;

        if let Some(busy) = domains.iter().find(|d| states.contains_key(d)) {
            return Err(AppError::busy(*busy));
        }

        let now = Utc::now();
        for domain in domains {
            states.insert(
                *domain,
                DomainRunState {
                    run_id,
                    stage: SyncStage::Idle,
                    message: "Queued".to_string(),
                    categories_done: 0,
                    categories_total: 0,
                    started_at: now,
                    updated_at: now,
                    cancel: cancel.clone(),
                },
            );
        }
        Ok(())
    }

    pub async fn update(
        &self,
        domain: ContentDomain,
        stage: SyncStage,
        message: String,
        categories_done: usize,
        categories_total: usize,
    ) {
        let progress = {
            let mut states = self.states.write().await;
            let Some(state) = states.get_mut(&domain) else {
                return;
            };
            state.stage = stage;
            state.message = message.clone();
            state.categories_done = categories_done;
            state.categories_total = categories_total;
            state.updated_at = Utc::now();

            SyncProgress {
                run_id: state.run_id,
                domain,
                stage,
                message,
                categories_done,
                categories_total,
            }
        };

        let _ = self.progress_tx.send(progress);
    }

    /// Release the lock of a domain.
    pub async fn finish(&self, domain: ContentDomain) {
        let mut states = self.states.write().await;
        states.remove(&domain);
    }

    pub async fn is_running(&self, domain: ContentDomain) -> bool {
        let states = self.states.read().await;
        states.contains_key(&domain)
    }

    pub async fn get_all_progress(&self) -> HashMap<ContentDomain, DomainRunState> {
        let states = self.states.read().await;
        states.clone()
    }

    /// Signal cancellation to every domain of a run. Returns false when nothing is running.
    pub async fn cancel(&self, run_id: Uuid) -> bool {
        let states = self.states.read().await;
        let mut found = false;
        for state in states.values().filter(|s| s.run_id == run_id) {
            state.cancel.cancel();
            found = true;
        }
        found
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncProgress> {
        self.progress_tx.subscribe()
    }

    pub fn reporter(&self, run_id: Uuid, domain: ContentDomain) -> ProgressReporter {
        ProgressReporter {
            manager: self.clone(),
            run_id,
            domain,
        }
    }
}

impl Default for SyncStateManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle a domain run uses to publish its stage transitions.
#[derive(Clone)]
pub struct ProgressReporter {
    manager: SyncStateManager,
    run_id: Uuid,
    domain: ContentDomain,
}

impl ProgressReporter {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn domain(&self) -> ContentDomain {
        self.domain
    }

    pub async fn stage(&self, stage: SyncStage, message: impl Into<String>) {
        self.categories(stage, message, 0, 0).await;
    }

    pub async fn categories(
        &self,
        stage: SyncStage,
        message: impl Into<String>,
        done: usize,
        total: usize,
    ) {
        self.manager
            .update(self.domain, stage, message.into(), done, total)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_start_is_busy() {
        let manager = SyncStateManager::new();
        let token = CancellationToken::new();

        manager
            .try_start(Uuid::new_v4(), &[ContentDomain::Movie], &token)
            .await
            .unwrap();

        let err = manager
            .try_start(
                Uuid::new_v4(),
                &[ContentDomain::Live, ContentDomain::Movie],
                &token,
            )
            .await
            .unwrap_err();
        assert!(err.is_busy());
        // All-or-nothing: live was not locked by the rejected attempt
        assert!(!manager.is_running(ContentDomain::Live).await);

        manager.finish(ContentDomain::Movie).await;
        assert!(
            manager
                .try_start(Uuid::new_v4(), &[ContentDomain::Movie], &token)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_progress_is_broadcast_and_cancel_reaches_token() {
        let manager = SyncStateManager::new();
        let token = CancellationToken::new();
        let run_id = Uuid::new_v4();
        let mut rx = manager.subscribe();

        manager
            .try_start(run_id, &[ContentDomain::Series], &token)
            .await
            .unwrap();
        manager
            .reporter(run_id, ContentDomain::Series)
            .categories(SyncStage::Reconciling, "Drama", 1, 4)
            .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.stage, SyncStage::Reconciling);
        assert_eq!(event.categories_total, 4);

        assert!(manager.cancel(run_id).await);
        assert!(token.is_cancelled());
        assert!(!manager.cancel(Uuid::new_v4()).await);
    }
}
