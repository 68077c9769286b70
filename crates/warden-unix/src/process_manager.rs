use anyhow::{Context, Result};
use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid as NixPid;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use sysinfo::System;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{info, warn};
use warden_core::{
    OutputSink, ProcessHandle, ProcessId, ProcessLifecycle, ProcessStatus, ProcessTermination,
    TerminationResult,
};

/// Unix-specific process handle implementation
pub struct UnixProcessHandle {
    child: Child,
    command: String,
    args: Vec<String>,
}

impl UnixProcessHandle {
    pub fn new(child: Child, command: String, args: Vec<String>) -> Self {
        Self {
            child,
            command,
            args,
        }
    }
}

#[async_trait]
impl ProcessHandle for UnixProcessHandle {
    fn pid(&self) -> Option<ProcessId> {
        self.child.id().map(ProcessId::from)
    }

    fn command(&self) -> &str {
        &self.command
    }

    fn args(&self) -> &[String] {
        &self.args
    }

    async fn is_running(&self) -> bool {
        match self.pid() {
            // Signal 0 probes for existence without touching the process
            Some(pid) => signal::kill(NixPid::from_raw(pid.0 as i32), None).is_ok(),
            None => false,
        }
    }

    async fn try_wait(&mut self) -> Result<Option<ProcessStatus>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| ProcessStatus::Exited {
                code: status.code(),
            }))
    }

    async fn wait(&mut self) -> Result<ProcessStatus> {
        let status = self.child.wait().await?;
        Ok(ProcessStatus::Exited {
            code: status.code(),
        })
    }

    async fn kill(&mut self) -> Result<()> {
        self.child
            .kill()
            .await
            .context("failed to kill child process")
    }
}

/// Unix process manager: piped spawning plus signal-based tree termination
pub struct UnixProcessManager {
    system: std::sync::Mutex<System>,
}

impl UnixProcessManager {
    pub fn new() -> Self {
        Self {
            system: std::sync::Mutex::new(System::new_all()),
        }
    }

    /// Copy one child output stream line-by-line into a sink
    fn forward_output(
        stream: impl AsyncRead + Unpin + Send + 'static,
        sink: OutputSink,
    ) {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                sink.write_line(&line).await;
            }
        });
    }

    fn signal_pid(pid: ProcessId, sig: Signal) -> TerminationResult {
        match signal::kill(NixPid::from_raw(pid.0 as i32), sig) {
            Ok(()) => TerminationResult::Success,
            Err(nix::errno::Errno::ESRCH) => TerminationResult::ProcessNotFound,
            Err(nix::errno::Errno::EPERM) => TerminationResult::AccessDenied,
            Err(e) => TerminationResult::Failed(format!("{sig:?} failed: {e}")),
        }
    }
}

impl Default for UnixProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessLifecycle for UnixProcessManager {
    async fn spawn_process(
        &self,
        command: &str,
        args: &[String],
        working_dir: Option<&Path>,
        env: &HashMap<String, String>,
        out: OutputSink,
        err: OutputSink,
    ) -> Result<Box<dyn ProcessHandle>> {
        let mut cmd = Command::new(command);
        cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        for (key, value) in env {
            cmd.env(key, value);
        }

        // Own process group so the whole tree can be signalled at once
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn process: {command}"))?;

        if let Some(stdout) = child.stdout.take() {
            Self::forward_output(stdout, out);
        }
        if let Some(stderr) = child.stderr.take() {
            Self::forward_output(stderr, err);
        }

        if let Some(pid) = child.id() {
            info!(command = %command, pid = pid, ?args, "spawned child process");
        }

        Ok(Box::new(UnixProcessHandle::new(
            child,
            command.to_string(),
            args.to_vec(),
        )))
    }
}

#[async_trait]
impl ProcessTermination for UnixProcessManager {
    async fn terminate_gracefully(&self, pid: ProcessId) -> TerminationResult {
        let result = Self::signal_pid(pid, Signal::SIGTERM);
        match &result {
            TerminationResult::Success => info!(pid = pid.0, "sent SIGTERM"),
            TerminationResult::ProcessNotFound => {
                info!(pid = pid.0, "process already terminated")
            }
            other => warn!(pid = pid.0, result = ?other, "SIGTERM failed"),
        }
        result
    }

    async fn force_kill(&self, pid: ProcessId) -> TerminationResult {
        let result = Self::signal_pid(pid, Signal::SIGKILL);
        match &result {
            TerminationResult::Success => info!(pid = pid.0, "sent SIGKILL"),
            TerminationResult::ProcessNotFound => {
                info!(pid = pid.0, "process already terminated")
            }
            other => warn!(pid = pid.0, result = ?other, "SIGKILL failed"),
        }
        result
    }

    async fn find_child_processes(&self, parent: ProcessId) -> Result<Vec<ProcessId>> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| anyhow::anyhow!("process table lock poisoned"))?;
        system.refresh_processes_specifics(
            sysinfo::ProcessesToUpdate::All,
            true,
            sysinfo::ProcessRefreshKind::default(),
        );

        let mut found = Vec::new();
        collect_descendants(&system, parent.0, &mut found);

        Ok(found.into_iter().map(ProcessId::from).collect())
    }

    async fn terminate_process_tree(&self, root: ProcessId, grace: Duration) -> TerminationResult {
        // The child was started in its own process group, so prefer one
        // group-wide signal over walking the tree
        let pgid = NixPid::from_raw(root.0 as i32);
        match signal::killpg(pgid, Signal::SIGTERM) {
            Ok(()) => {
                info!(pid = root.0, "sent SIGTERM to process group");
                tokio::time::sleep(grace).await;

                return match signal::killpg(pgid, Signal::SIGKILL) {
                    Ok(()) | Err(nix::errno::Errno::ESRCH) => TerminationResult::Success,
                    Err(e) => {
                        TerminationResult::Failed(format!("SIGKILL to process group failed: {e}"))
                    }
                };
            }
            Err(nix::errno::Errno::ESRCH) => return TerminationResult::ProcessNotFound,
            Err(e) => {
                warn!(
                    pid = root.0,
                    error = %e,
                    "process group termination failed, falling back to per-process signals"
                );
            }
        }

        // Fallback: signal each process in the tree, deepest first
        let mut targets = match self.find_child_processes(root).await {
            Ok(children) => children,
            Err(e) => {
                return TerminationResult::Failed(format!("failed to enumerate children: {e}"));
            }
        };
        targets.push(root);

        for pid in &targets {
            let _ = Self::signal_pid(*pid, Signal::SIGTERM);
        }

        tokio::time::sleep(grace).await;

        for pid in &targets {
            match Self::signal_pid(*pid, Signal::SIGKILL) {
                TerminationResult::Success | TerminationResult::ProcessNotFound => {}
                other => {
                    warn!(pid = pid.0, result = ?other, "failed to kill process");
                    return other;
                }
            }
        }

        TerminationResult::Success
    }
}

/// Recursively collect descendants, deepest first
fn collect_descendants(system: &System, parent: u32, found: &mut Vec<u32>) {
    for (pid, process) in system.processes() {
        if process.parent().map(|p| p.as_u32()) == Some(parent) {
            let child = pid.as_u32();
            collect_descendants(system, child, found);
            found.push(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> UnixProcessManager {
        UnixProcessManager::new()
    }

    async fn spawn(
        manager: &UnixProcessManager,
        command: &str,
        args: &[&str],
    ) -> Result<Box<dyn ProcessHandle>> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        manager
            .spawn_process(
                command,
                &args,
                None,
                &HashMap::new(),
                OutputSink::null(),
                OutputSink::null(),
            )
            .await
    }

    #[tokio::test]
    async fn test_spawn_and_wait_success() {
        let manager = manager();
        let mut handle = spawn(&manager, "true", &[]).await.unwrap();

        let status = handle.wait().await.unwrap();
        assert_eq!(status.exit_code(), Some(0));
    }

    #[tokio::test]
    async fn test_exit_code_is_preserved() {
        let manager = manager();
        let mut handle = spawn(&manager, "sh", &["-c", "exit 3"]).await.unwrap();

        let status = handle.wait().await.unwrap();
        assert_eq!(status.exit_code(), Some(3));
    }

    #[tokio::test]
    async fn test_spawn_missing_command_fails() {
        let manager = manager();
        let result = spawn(&manager, "warden-test-no-such-binary", &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_kill_long_lived_child() {
        let manager = manager();
        let mut handle = spawn(&manager, "sleep", &["100"]).await.unwrap();
        assert!(handle.is_running().await);

        handle.kill().await.unwrap();
        let status = handle.wait().await.unwrap();
        // Killed by signal, so no exit code
        assert_eq!(status.exit_code(), None);
    }

    #[tokio::test]
    async fn test_terminate_process_tree() {
        let manager = manager();
        let handle = spawn(&manager, "sleep", &["100"]).await.unwrap();
        let pid = handle.pid().unwrap();

        let result = manager
            .terminate_process_tree(pid, Duration::from_millis(50))
            .await;
        assert_eq!(result, TerminationResult::Success);
    }
}
