use anyhow::Result;
use async_trait::async_trait;

use crate::{ProcessHandle, ProcessId, SupervisorConfig};

/// High-level process manager trait for platform-independent supervision
///
/// Implementations compose the low-level [`ProcessLifecycle`] and
/// [`ProcessTermination`] traits for the actual process operations and add
/// configuration-driven startup, active process tracking, and coordinated
/// cleanup. Implementations should provide emergency cleanup in `Drop`.
///
/// [`ProcessLifecycle`]: crate::ProcessLifecycle
/// [`ProcessTermination`]: crate::ProcessTermination
#[async_trait]
pub trait SupervisorProcessManager: Send + Sync {
    /// Launch the configured child process and track it for cleanup
    ///
    /// Uses the [`SupervisorConfig`] provided at construction time: command,
    /// arguments, environment, and working directory. A launch failure is
    /// returned as an error and is terminal for that attempt; the manager
    /// never retries on its own.
    async fn start_child(&self) -> Result<Box<dyn ProcessHandle>>;

    /// Terminate every tracked process tree and clear tracking state
    async fn cleanup(&self) -> Result<()>;

    /// Number of currently tracked processes
    fn active_process_count(&self) -> usize;

    /// Snapshot of tracked (pid, command) pairs, for monitoring and debugging
    fn tracked_processes(&self) -> Vec<(ProcessId, String)>;
}

/// Factory trait for creating platform-specific process managers
#[async_trait]
pub trait SupervisorProcessManagerFactory {
    /// The type of process manager this factory creates
    type Manager: SupervisorProcessManager;

    /// Create a new process manager instance for the current platform
    async fn create(config: &SupervisorConfig) -> Result<Self::Manager>;

    /// Get the platform name for logging and debugging
    fn platform_name() -> &'static str;
}
