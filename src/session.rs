//! Session lifecycle and cooperative cancellation.
//!
//! A [`SessionController`] owns the single download session that may be
//! active at any time. The orchestrator only reads or mutates session state
//! through the controller, addressing it with the [`SessionHandle`] returned
//! by [`SessionController::begin`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{DownloadOutcome, OutcomeResult};
use crate::stats::{SessionStats, SessionStatsBuilder};

/// Lifecycle of a session: `Idle -> Active -> {Completed, Cancelled, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Active,
    /// Every item was saved.
    Completed,
    /// Cancellation stopped the session before all items were attempted.
    Cancelled,
    /// At least one item could not be saved, or the run was abandoned.
    Failed,
}

impl SessionState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Reference to one session. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    token: CancellationToken,
}

impl SessionHandle {
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Token that fires when cancellation is requested for this session.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Aggregate counts reported while a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

/// Final report of a session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: Uuid,
    pub state: SessionState,
    pub total: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    /// Items that were cancelled mid-transfer or never attempted.
    pub skipped_count: usize,
    /// One entry per item, in batch order.
    pub outcomes: Vec<DownloadOutcome>,
    pub stats: SessionStats,
}

impl SessionSummary {
    /// True only when every item was saved.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == SessionState::Completed && self.failed_count == 0
    }

    /// One-line description for the user.
    #[must_use]
    pub fn message(&self) -> String {
        match self.state {
            SessionState::Completed => {
                if self.total == 1 {
                    "Download completed".to_string()
                } else {
                    format!("All {} downloads completed", self.total)
                }
            }
            SessionState::Cancelled => format!(
                "Download cancelled: {} saved, {} failed, {} not downloaded",
                self.completed_count, self.failed_count, self.skipped_count
            ),
            SessionState::Failed => format!(
                "{} of {} downloads failed ({} saved)",
                self.failed_count, self.total, self.completed_count
            ),
            SessionState::Idle | SessionState::Active => {
                format!("{} of {} downloads finished", self.completed_count, self.total)
            }
        }
    }
}

#[derive(Debug)]
struct ActiveSession {
    id: Uuid,
    token: CancellationToken,
    total: usize,
    completed: usize,
    failed: usize,
    outcomes: Vec<DownloadOutcome>,
    stats: SessionStatsBuilder,
}

impl ActiveSession {
    const fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed,
            failed: self.failed,
            total: self.total,
        }
    }
}

#[derive(Debug)]
struct ControllerState {
    active: Option<ActiveSession>,
    last_state: SessionState,
}

/// Owner of the one session that may be active at a time.
#[derive(Debug)]
pub struct SessionController {
    inner: Mutex<ControllerState>,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionController {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(ControllerState {
                active: None,
                last_state: SessionState::Idle,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a session for `total` items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionAlreadyActive`] if another session has not
    /// reached a terminal state.
    pub fn begin(&self, total: usize) -> Result<SessionHandle> {
        self.begin_with_token(total, CancellationToken::new())
    }

    /// Starts a session that is also cancelled when `parent` is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionAlreadyActive`] if another session is active.
    pub fn begin_linked(&self, total: usize, parent: &CancellationToken) -> Result<SessionHandle> {
        self.begin_with_token(total, parent.child_token())
    }

    fn begin_with_token(&self, total: usize, token: CancellationToken) -> Result<SessionHandle> {
        let mut state = self.lock();
        if state.active.is_some() {
            return Err(Error::SessionAlreadyActive);
        }
        let id = Uuid::new_v4();
        state.active = Some(ActiveSession {
            id,
            token: token.clone(),
            total,
            completed: 0,
            failed: 0,
            outcomes: Vec::with_capacity(total),
            stats: SessionStatsBuilder::new(),
        });
        state.last_state = SessionState::Active;
        log::info!("Session {id} started with {total} item(s)");
        Ok(SessionHandle { id, token })
    }

    /// Requests cooperative cancellation of the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSession`] if `handle` is not the active session.
    pub fn request_cancel(&self, handle: &SessionHandle) -> Result<()> {
        let state = self.lock();
        match &state.active {
            Some(active) if active.id == handle.id => {
                log::info!("Cancellation requested for session {}", handle.id);
                active.token.cancel();
                Ok(())
            }
            _ => Err(Error::UnknownSession),
        }
    }

    /// Cancels whichever session is active. Returns false if none is.
    pub fn cancel_active(&self) -> bool {
        let state = self.lock();
        state.active.as_ref().is_some_and(|active| {
            log::info!("Cancellation requested for session {}", active.id);
            active.token.cancel();
            true
        })
    }

    /// Whether cancellation was requested. Stays true once it turns true.
    #[must_use]
    pub fn is_cancelled(&self, handle: &SessionHandle) -> bool {
        handle.token.is_cancelled()
    }

    /// Records the result for one item and returns the updated counts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSession`] if `handle` is not the active session.
    pub fn record_outcome(
        &self,
        handle: &SessionHandle,
        outcome: DownloadOutcome,
    ) -> Result<ProgressSnapshot> {
        let mut state = self.lock();
        let active = state
            .active
            .as_mut()
            .filter(|active| active.id == handle.id)
            .ok_or(Error::UnknownSession)?;
        match &outcome.result {
            OutcomeResult::Saved { bytes, .. } => {
                active.completed += 1;
                active.stats.add_saved(*bytes);
            }
            OutcomeResult::TransferFailed { .. } => active.failed += 1,
            OutcomeResult::Skipped { .. } => {}
        }
        active.outcomes.push(outcome);
        Ok(active.snapshot())
    }

    /// Current counts of the active session.
    #[must_use]
    pub fn snapshot(&self, handle: &SessionHandle) -> Option<ProgressSnapshot> {
        let state = self.lock();
        state
            .active
            .as_ref()
            .filter(|active| active.id == handle.id)
            .map(ActiveSession::snapshot)
    }

    /// Ends the session and reports how it went.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSession`] if `handle` is not the active session.
    pub fn finish(&self, handle: &SessionHandle) -> Result<SessionSummary> {
        let mut state = self.lock();
        if !state.active.as_ref().is_some_and(|a| a.id == handle.id) {
            return Err(Error::UnknownSession);
        }
        let Some(active) = state.active.take() else {
            return Err(Error::UnknownSession);
        };

        let skipped_count = active.total.saturating_sub(active.completed + active.failed);
        let final_state = if active.token.is_cancelled() && skipped_count > 0 {
            SessionState::Cancelled
        } else if active.failed > 0 || skipped_count > 0 {
            SessionState::Failed
        } else {
            SessionState::Completed
        };
        state.last_state = final_state;

        log::info!(
            "Session {} finished {:?}: {} saved, {} failed, {} skipped",
            active.id,
            final_state,
            active.completed,
            active.failed,
            skipped_count
        );

        Ok(SessionSummary {
            id: active.id,
            state: final_state,
            total: active.total,
            completed_count: active.completed,
            failed_count: active.failed,
            skipped_count,
            stats: active.stats.build(),
            outcomes: active.outcomes,
        })
    }

    /// Forces the session into `Failed` without a summary.
    ///
    /// Used when a run is dropped before it could finish, so the next run is
    /// not locked out.
    pub fn abandon(&self, handle: &SessionHandle) {
        let mut state = self.lock();
        if state.active.as_ref().is_some_and(|a| a.id == handle.id) {
            state.active = None;
            state.last_state = SessionState::Failed;
            handle.token.cancel();
            log::warn!("Session {} abandoned before finishing", handle.id);
        }
    }

    /// State of the active session, or the terminal state of the last one.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock().last_state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lock().active.is_some()
    }
}
