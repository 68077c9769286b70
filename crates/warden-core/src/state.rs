use crate::ProcessId;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// Lifecycle state of the supervised child process
///
/// ```text
/// Unstarted -> Running -> Stopped
/// Unstarted -> Failed            (launch error)
/// Running   -> Failed            (launch error observed late)
/// ```
///
/// `Stopped` and `Failed` are absorbing: once the child is down it never
/// spontaneously recovers, and a restart requires a fresh supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildState {
    Unstarted,
    Running {
        pid: Option<ProcessId>,
        started_at: DateTime<Utc>,
    },
    Stopped {
        exit_code: Option<i32>,
        stopped_at: DateTime<Utc>,
    },
    Failed {
        reason: String,
    },
}

impl ChildState {
    pub fn running(pid: Option<ProcessId>) -> Self {
        ChildState::Running {
            pid,
            started_at: Utc::now(),
        }
    }

    pub fn stopped(exit_code: Option<i32>) -> Self {
        ChildState::Stopped {
            exit_code,
            stopped_at: Utc::now(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        ChildState::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ChildState::Running { .. })
    }

    /// True for the absorbing states `Stopped` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChildState::Stopped { .. } | ChildState::Failed { .. })
    }

    pub fn pid(&self) -> Option<ProcessId> {
        match self {
            ChildState::Running { pid, .. } => *pid,
            _ => None,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ChildState::Stopped { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    /// Status string reported by `GET /`
    pub fn liveness(&self) -> &'static str {
        if self.is_running() { "active" } else { "inactive" }
    }

    /// Status string reported by `GET /health`
    pub fn health(&self) -> &'static str {
        if self.is_running() { "running" } else { "stopped" }
    }

    /// Whether `next` is a legal successor of this state
    fn accepts(&self, next: &ChildState) -> bool {
        match (self, next) {
            // Nothing ever goes back to Unstarted
            (_, ChildState::Unstarted) => false,
            (ChildState::Unstarted, _) => true,
            (ChildState::Running { .. }, ChildState::Running { .. }) => false,
            (ChildState::Running { .. }, _) => true,
            // Stopped and Failed absorb everything
            _ => false,
        }
    }
}

/// Shared child-state cell: one writer (the supervisor), many readers
///
/// Built on a `tokio::sync::watch` channel so status readers take a cheap
/// snapshot and waiters are notified of the terminal transition without
/// polling. Readers never block on the child process itself.
#[derive(Clone)]
pub struct StateCell {
    tx: Arc<watch::Sender<ChildState>>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ChildState::Unstarted);
        Self { tx: Arc::new(tx) }
    }

    /// Current state snapshot (non-blocking)
    pub fn snapshot(&self) -> ChildState {
        self.tx.borrow().clone()
    }

    /// Apply `next` if it is a legal transition
    ///
    /// Illegal transitions (e.g. anything after `Stopped`) are dropped with
    /// a warning, which keeps a late watcher update from resurrecting a
    /// child that is already known to be down.
    pub fn advance(&self, next: ChildState) -> bool {
        self.tx.send_if_modified(|current| {
            if current.accepts(&next) {
                *current = next;
                true
            } else {
                warn!(current = ?current, rejected = ?next, "ignoring illegal child state transition");
                false
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<ChildState> {
        self.tx.subscribe()
    }

    /// Resolve once the child state is terminal
    pub async fn wait_terminal(&self) -> ChildState {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| state.is_terminal()).await {
            Ok(state) => state.clone(),
            // The sender lives as long as this cell, so this arm is only
            // reachable if every other clone was dropped mid-wait.
            Err(_) => self.snapshot(),
        }
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
