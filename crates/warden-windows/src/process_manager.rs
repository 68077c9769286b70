use anyhow::{Context, Result};
use async_trait::async_trait;
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

/// Windows-specific process handle implementation
pub struct WindowsProcessHandle {
    child: Child,
    command: String,
    args: Vec<String>,
}

impl WindowsProcessHandle {
    pub fn new(child: Child, command: String, args: Vec<String>) -> Self {
        Self {
            child,
            command,
            args,
        }
    }
}

#[async_trait]
impl ProcessHandle for WindowsProcessHandle {
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
            Some(pid) => {
                let mut system = System::new();
                system.refresh_processes_specifics(
                    sysinfo::ProcessesToUpdate::All,
                    true,
                    sysinfo::ProcessRefreshKind::default(),
                );
                system.processes().keys().any(|p| p.as_u32() == pid.0)
            }
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

/// Windows process manager: piped spawning plus taskkill-based tree termination
pub struct WindowsProcessManager {
    system: std::sync::Mutex<System>,
}

impl WindowsProcessManager {
    pub fn new() -> Self {
        Self {
            system: std::sync::Mutex::new(System::new_all()),
        }
    }

    /// Copy one child output stream line-by-line into a sink
    fn forward_output(stream: impl AsyncRead + Unpin + Send + 'static, sink: OutputSink) {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                sink.write_line(&line).await;
            }
        });
    }

    /// Run taskkill against a PID; `force` maps to `/F`
    async fn taskkill(pid: ProcessId, tree: bool, force: bool) -> TerminationResult {
        let pid_arg = pid.0.to_string();
        let mut args = vec!["/PID", pid_arg.as_str()];
        if tree {
            args.push("/T");
        }
        if force {
            args.push("/F");
        }

        match Command::new("taskkill").args(&args).output().await {
            Ok(output) if output.status.success() => TerminationResult::Success,
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if stderr.contains("not found") {
                    TerminationResult::ProcessNotFound
                } else if stderr.contains("Access is denied") {
                    TerminationResult::AccessDenied
                } else {
                    TerminationResult::Failed(format!("taskkill failed: {}", stderr.trim()))
                }
            }
            Err(e) => TerminationResult::Failed(format!("failed to run taskkill: {e}")),
        }
    }
}

impl Default for WindowsProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessLifecycle for WindowsProcessManager {
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

        // Run the child without a console window
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

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

        Ok(Box::new(WindowsProcessHandle::new(
            child,
            command.to_string(),
            args.to_vec(),
        )))
    }
}

#[async_trait]
impl ProcessTermination for WindowsProcessManager {
    async fn terminate_gracefully(&self, pid: ProcessId) -> TerminationResult {
        let result = Self::taskkill(pid, false, false).await;
        match &result {
            TerminationResult::Success => info!(pid = pid.0, "requested termination"),
            other => warn!(pid = pid.0, result = ?other, "graceful termination failed"),
        }
        result
    }

    async fn force_kill(&self, pid: ProcessId) -> TerminationResult {
        let result = Self::taskkill(pid, false, true).await;
        match &result {
            TerminationResult::Success => info!(pid = pid.0, "force killed process"),
            other => warn!(pid = pid.0, result = ?other, "force kill failed"),
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
        // taskkill /T walks the tree for us; try the polite form first
        match Self::taskkill(root, true, false).await {
            TerminationResult::Success => {
                tokio::time::sleep(grace).await;

                match Self::taskkill(root, true, true).await {
                    TerminationResult::Success | TerminationResult::ProcessNotFound => {
                        TerminationResult::Success
                    }
                    other => other,
                }
            }
            TerminationResult::ProcessNotFound => TerminationResult::ProcessNotFound,
            _ => {
                // The polite form is refused for some processes; go straight
                // to the forced variant
                Self::taskkill(root, true, true).await
            }
        }
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
