use crate::process_manager::UnixProcessManager;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use warden_core::{
    OutputSink, ProcessHandle, ProcessId, ProcessLifecycle, ProcessTermination, SupervisorConfig,
    SupervisorProcessManager, SupervisorProcessManagerFactory, TerminationResult,
};

/// Unix implementation of the [`SupervisorProcessManager`] trait
///
/// Composes [`UnixProcessManager`] for the low-level operations and adds
/// configuration-driven startup, active process tracking, and coordinated
/// cleanup of the whole child process tree.
pub struct UnixSupervisorProcessManager {
    platform: Arc<UnixProcessManager>,
    tracked: Arc<Mutex<HashMap<ProcessId, String>>>,
    config: SupervisorConfig,
    stdout: OutputSink,
    stderr: OutputSink,
}

impl UnixSupervisorProcessManager {
    pub fn new(config: &SupervisorConfig) -> Self {
        Self::with_sinks(config, OutputSink::stdout(), OutputSink::stderr())
    }

    /// Construct with custom output sinks; used by tests to capture or
    /// silence the child's output
    pub fn with_sinks(config: &SupervisorConfig, stdout: OutputSink, stderr: OutputSink) -> Self {
        Self {
            platform: Arc::new(UnixProcessManager::new()),
            tracked: Arc::new(Mutex::new(HashMap::new())),
            config: config.clone(),
            stdout,
            stderr,
        }
    }
}

#[async_trait]
impl SupervisorProcessManager for UnixSupervisorProcessManager {
    async fn start_child(&self) -> Result<Box<dyn ProcessHandle>> {
        let handle = self
            .platform
            .spawn_process(
                &self.config.command,
                &self.config.args,
                self.config.working_directory.as_deref(),
                &self.config.env,
                self.stdout.clone(),
                self.stderr.clone(),
            )
            .await
            .with_context(|| {
                format!("failed to launch child with command: {}", self.config.command)
            })?;

        if let Some(pid) = handle.pid() {
            let mut tracked = self.tracked.lock().unwrap();
            tracked.insert(pid, self.config.command.clone());
        }

        Ok(handle)
    }

    async fn cleanup(&self) -> Result<()> {
        let pids = {
            let tracked = self.tracked.lock().unwrap();
            tracked.keys().copied().collect::<Vec<_>>()
        };

        for pid in pids {
            let result = self
                .platform
                .terminate_process_tree(pid, self.config.shutdown_grace())
                .await;
            match result {
                TerminationResult::Success => {
                    info!(pid = pid.0, "terminated child process tree")
                }
                TerminationResult::ProcessNotFound => {
                    info!(pid = pid.0, "child already exited")
                }
                other => {
                    warn!(pid = pid.0, result = ?other, "failed to terminate child process tree")
                }
            }
        }

        self.tracked.lock().unwrap().clear();
        Ok(())
    }

    fn active_process_count(&self) -> usize {
        self.tracked.lock().unwrap().len()
    }

    fn tracked_processes(&self) -> Vec<(ProcessId, String)> {
        let tracked = self.tracked.lock().unwrap();
        tracked
            .iter()
            .map(|(pid, command)| (*pid, command.clone()))
            .collect()
    }
}

impl Drop for UnixSupervisorProcessManager {
    fn drop(&mut self) {
        // Emergency cleanup: async machinery is gone, signal directly
        let pids = {
            let tracked = self.tracked.lock().unwrap();
            tracked.keys().copied().collect::<Vec<_>>()
        };

        if pids.is_empty() {
            return;
        }

        warn!(
            count = pids.len(),
            "emergency cleanup: signalling children during drop"
        );

        for pid in pids {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid as NixPid;

            let nix_pid = NixPid::from_raw(pid.0 as i32);
            if let Err(e) = signal::kill(nix_pid, Signal::SIGTERM) {
                warn!(pid = pid.0, error = %e, "SIGTERM during drop failed");

                if let Err(e) = signal::kill(nix_pid, Signal::SIGKILL) {
                    warn!(pid = pid.0, error = %e, "SIGKILL during drop failed");
                }
            }
        }
    }
}

/// Factory for creating Unix supervisor process managers
pub struct UnixSupervisorProcessManagerFactory;

#[async_trait]
impl SupervisorProcessManagerFactory for UnixSupervisorProcessManagerFactory {
    type Manager = UnixSupervisorProcessManager;

    async fn create(config: &SupervisorConfig) -> Result<Self::Manager> {
        Ok(UnixSupervisorProcessManager::new(config))
    }

    fn platform_name() -> &'static str {
        "unix"
    }
}
