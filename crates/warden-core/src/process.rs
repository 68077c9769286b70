use crate::OutputSink;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Operating-system process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId {
    fn from(raw: u32) -> Self {
        ProcessId(raw)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observed status of a supervised process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Process is currently running
    Running,
    /// Process exited; code is `None` when it was killed by a signal
    Exited { code: Option<i32> },
    /// Process status is unknown
    Unknown,
}

impl ProcessStatus {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessStatus::Exited { code } => *code,
            _ => None,
        }
    }
}

/// Result of a process termination operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationResult {
    /// Process was successfully terminated
    Success,
    /// Process was not found (already exited)
    ProcessNotFound,
    /// Insufficient privileges to signal the process
    AccessDenied,
    /// Operation failed with specific error message
    Failed(String),
}

/// Trait representing a handle to a launched process
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Get the process ID (None if the process has already exited)
    fn pid(&self) -> Option<ProcessId>;

    /// Get the command that started this process
    fn command(&self) -> &str;

    /// Get the arguments passed to this process
    fn args(&self) -> &[String];

    /// Check if the process is still running (non-blocking)
    async fn is_running(&self) -> bool;

    /// Try to get exit status without blocking
    async fn try_wait(&mut self) -> Result<Option<ProcessStatus>>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> Result<ProcessStatus>;

    /// Kill the process (platform-specific implementation)
    async fn kill(&mut self) -> Result<()>;
}

/// Trait for spawning child processes
#[async_trait]
pub trait ProcessLifecycle: Send + Sync {
    /// Spawn a new process with piped output forwarded to the given sinks
    async fn spawn_process(
        &self,
        command: &str,
        args: &[String],
        working_dir: Option<&Path>,
        env: &HashMap<String, String>,
        out: OutputSink,
        err: OutputSink,
    ) -> Result<Box<dyn ProcessHandle>>;
}

/// Trait for terminating processes and process trees
#[async_trait]
pub trait ProcessTermination: Send + Sync {
    /// Ask a single process to terminate (SIGTERM on Unix)
    async fn terminate_gracefully(&self, pid: ProcessId) -> TerminationResult;

    /// Force kill a single process (SIGKILL on Unix)
    async fn force_kill(&self, pid: ProcessId) -> TerminationResult;

    /// Find all descendants of a given process, deepest first
    async fn find_child_processes(&self, pid: ProcessId) -> Result<Vec<ProcessId>>;

    /// Terminate a process and all of its descendants
    ///
    /// Implementations escalate from graceful to forced termination after
    /// the given grace period.
    async fn terminate_process_tree(&self, root: ProcessId, grace: Duration) -> TerminationResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_extraction() {
        assert_eq!(ProcessStatus::Exited { code: Some(3) }.exit_code(), Some(3));
        assert_eq!(ProcessStatus::Exited { code: None }.exit_code(), None);
        assert_eq!(ProcessStatus::Running.exit_code(), None);
        assert_eq!(ProcessStatus::Unknown.exit_code(), None);
    }

    #[test]
    fn test_process_id_display() {
        let pid = ProcessId::from(4242);
        assert_eq!(pid.to_string(), "4242");
        assert_eq!(pid, ProcessId(4242));
    }
}
