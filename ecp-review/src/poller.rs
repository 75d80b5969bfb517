//! Review session: poll task plus user actions
//!
//! One background task refreshes the snapshot. A new fetch starts only after
//! the previous one settled, results arriving after shutdown are dropped, and
//! the task goes idle once rows are final. Submitting a reprocess request or
//! validating rows wakes it up again.

use std::sync::Arc;

use ecp_common::api::ReprocessItem;
use ecp_common::models::ActivityCategory;
use tokio::sync::{watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::ReviewApi;
use crate::error::{ReviewError, ReviewResult};
use crate::state::{ReviewState, EVENT_WINDOW};

/// Shared handle on one project's review session
#[derive(Clone)]
pub struct ReviewSession {
    api: Arc<dyn ReviewApi>,
    project_id: Uuid,
    state: Arc<RwLock<ReviewState>>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    changes: Arc<watch::Sender<u64>>,
}

impl ReviewSession {
    pub fn new(api: Arc<dyn ReviewApi>, project_id: Uuid, state: ReviewState) -> Self {
        let (changes, _) = watch::channel(state.revision);
        Self {
            api,
            project_id,
            state: Arc::new(RwLock::new(state)),
            wake: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
            changes: Arc::new(changes),
        }
    }

    pub fn project_id(&self) -> Uuid {
        self.project_id
    }

    /// Revision counter, bumped whenever the state changes
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Copy of the current state for rendering
    pub async fn view(&self) -> ReviewState {
        self.state.read().await.clone()
    }

    /// Mutate local view settings (filters, sort, selection)
    pub async fn update<R>(&self, f: impl FnOnce(&mut ReviewState) -> R) -> R {
        let mut state = self.state.write().await;
        let result = f(&mut state);
        state.revision += 1;
        self.publish(&state);
        result
    }

    fn publish(&self, state: &ReviewState) {
        self.changes.send_replace(state.revision);
    }

    /// Start the poll task
    pub fn spawn_poller(&self) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move { session.poll_loop().await })
    }

    /// Run one fetch and apply it; returns whether polling should continue
    pub async fn poll_once(&self) -> bool {
        let result = tokio::try_join!(
            self.api.snapshot(self.project_id),
            self.api.events(self.project_id, EVENT_WINDOW)
        );

        if self.cancel.is_cancelled() {
            debug!(project_id = %self.project_id, "Dropping poll result after shutdown");
            return false;
        }

        let mut state = self.state.write().await;
        match result {
            Ok((snapshot, events)) => {
                state.apply_snapshot(snapshot, events, Instant::now().into_std());
            }
            Err(e) => {
                warn!(project_id = %self.project_id, "Poll failed: {}", e);
                state.apply_poll_error();
            }
        }
        self.publish(&state);
        state.should_keep_polling()
    }

    async fn poll_loop(self) {
        info!(project_id = %self.project_id, "Review poller started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let keep_polling = self.poll_once().await;
            if self.cancel.is_cancelled() {
                break;
            }

            if keep_polling {
                let delay = self.state.read().await.next_delay();
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.wake.notified() => {}
                }
            } else {
                debug!(project_id = %self.project_id, "Rows final, poller idle");
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = self.wake.notified() => {}
                }
            }
        }

        info!(project_id = %self.project_id, "Review poller stopped");
    }

    /// Validate the selected rows
    pub async fn validate_selected(&self) -> ReviewResult<u64> {
        let ids = self.state.read().await.selection.ids();
        self.validate(ids).await
    }

    /// Validate the given rows; ids not requiring verification are ignored server-side
    pub async fn validate(&self, ids: Vec<i64>) -> ReviewResult<u64> {
        if ids.is_empty() {
            return Err(ReviewError::InvalidInput("No rows selected".to_string()));
        }

        let updated = self.api.validate(self.project_id, &ids).await?;
        info!(project_id = %self.project_id, updated, "Rows validated");

        {
            let mut state = self.state.write().await;
            state.apply_validated(&ids);
            self.publish(&state);
        }
        self.wake.notify_one();
        Ok(updated)
    }

    /// Send one row back for reprocessing with a corrected category
    ///
    /// The row shows as processing right away; a refused request marks it failed.
    pub async fn submit_reprocess(
        &self,
        row_id: i64,
        category: ActivityCategory,
        hint: &str,
    ) -> ReviewResult<usize> {
        {
            let mut state = self.state.write().await;
            if !state.rows.iter().any(|r| r.id == row_id) {
                return Err(ReviewError::InvalidInput(format!(
                    "Row {} is not part of this project",
                    row_id
                )));
            }
            state.mark_reprocess_submitted(row_id, category, Instant::now().into_std());
            self.publish(&state);
        }

        let item = ReprocessItem {
            id: row_id,
            category,
            hint: hint.trim().to_string(),
        };

        match self.api.reprocess(self.project_id, vec![item]).await {
            Ok(queued) => {
                info!(project_id = %self.project_id, row_id, "Reprocess requested");
                self.wake.notify_one();
                Ok(queued)
            }
            Err(e) => {
                warn!(project_id = %self.project_id, row_id, "Reprocess refused: {}", e);
                let mut state = self.state.write().await;
                state.reprocess_rejected(row_id);
                self.publish(&state);
                Err(e)
            }
        }
    }

    /// Stop the poll task; in-flight results are discarded
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
