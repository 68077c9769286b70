use crate::manager::SupervisorProcessManager;
use crate::state::{ChildState, StateCell};
use crate::{ProcessHandle, SupervisorConfig, WardenError};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct Started;

pub struct Unstarted;

/// Supervisor orchestration core, parameterized over its lifecycle phase
///
/// Owns the child process handle through the platform process manager and is
/// the only writer of the shared [`StateCell`]; status readers hold cheap
/// clones of the cell and never touch the process itself.
#[derive(Clone)]
pub struct SupervisorInner<Status> {
    cancellation_token: Arc<CancellationToken>,
    config: SupervisorConfig,
    state: StateCell,
    process_manager: Arc<RwLock<Option<Box<dyn SupervisorProcessManager>>>>,
    _status: PhantomData<Status>,
}

impl SupervisorInner<Unstarted> {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            cancellation_token: Arc::new(CancellationToken::new()),
            config,
            state: StateCell::new(),
            process_manager: Arc::new(RwLock::new(None)),
            _status: PhantomData,
        }
    }

    /// Read-only handle to the child state, for wiring into the status API
    pub fn state_cell(&self) -> StateCell {
        self.state.clone()
    }

    /// Launch the child process via the supplied platform factory
    ///
    /// A spawn error is absorbed rather than propagated: it is logged, the
    /// state advances to `Failed`, and the returned supervisor keeps serving
    /// status queries. Only infrastructure errors (the factory itself
    /// failing) are returned to the caller.
    pub async fn start_with_factory<F>(
        &self,
        factory_fn: F,
    ) -> Result<SupervisorInner<Started>, WardenError>
    where
        F: FnOnce(
            &SupervisorConfig,
        ) -> Pin<
            Box<
                dyn Future<Output = Result<Box<dyn SupervisorProcessManager>, anyhow::Error>>
                    + Send,
            >,
        >,
    {
        info!(
            name = %self.config.name,
            command = %self.config.command,
            "starting supervisor"
        );

        let manager = factory_fn(&self.config).await.map_err(|e| {
            WardenError::process_error(format!("failed to create process manager: {e}"))
        })?;

        match manager.start_child().await {
            Ok(handle) => {
                let pid = handle.pid();
                info!(name = %self.config.name, pid = ?pid, "child process launched");
                self.state.advance(ChildState::running(pid));
                self.spawn_exit_watcher(handle);
            }
            Err(e) => {
                // Terminal for this launch attempt: logged, never retried
                error!(name = %self.config.name, error = %e, "child process failed to launch");
                self.state.advance(ChildState::failed(e.to_string()));
            }
        }

        self.process_manager.write().await.replace(manager);

        Ok(SupervisorInner {
            cancellation_token: self.cancellation_token.clone(),
            config: self.config.clone(),
            state: self.state.clone(),
            process_manager: self.process_manager.clone(),
            _status: PhantomData,
        })
    }

    /// Background task that waits for child exit and records the outcome
    fn spawn_exit_watcher(&self, mut handle: Box<dyn ProcessHandle>) {
        let state = self.state.clone();
        let name = self.config.name.clone();
        tokio::spawn(async move {
            match handle.wait().await {
                Ok(status) => {
                    let code = status.exit_code();
                    info!(name = %name, exit_code = ?code, "child process exited");
                    state.advance(ChildState::stopped(code));
                }
                Err(e) => {
                    warn!(name = %name, error = %e, "failed to await child process exit");
                    state.advance(ChildState::stopped(None));
                }
            }
        });
    }
}

impl SupervisorInner<Started> {
    /// Current child state snapshot (non-blocking)
    pub fn status(&self) -> ChildState {
        self.state.snapshot()
    }

    /// Read-only handle to the child state, for wiring into the status API
    pub fn state_cell(&self) -> StateCell {
        self.state.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        (*self.cancellation_token).clone()
    }

    /// Block until the child reaches a terminal state and return it
    pub async fn wait(&self) -> ChildState {
        self.state.wait_terminal().await
    }

    /// Cancel the supervisor and terminate the child process tree
    pub async fn shutdown(&self) -> Result<(), WardenError> {
        info!(name = %self.config.name, "shutting down supervisor");
        self.cancellation_token.cancel();

        if let Some(manager) = self.process_manager.write().await.take() {
            manager.cleanup().await.map_err(|e| {
                WardenError::process_error(format!("failed to clean up child processes: {e}"))
            })?;
        }

        info!(name = %self.config.name, "supervisor shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ProcessId, ProcessStatus, SupervisorProcessManager};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::oneshot;

    struct FakeHandle {
        pid: Option<ProcessId>,
        exit_rx: Option<oneshot::Receiver<Option<i32>>>,
        command: String,
        args: Vec<String>,
    }

    #[async_trait]
    impl ProcessHandle for FakeHandle {
        fn pid(&self) -> Option<ProcessId> {
            self.pid
        }

        fn command(&self) -> &str {
            &self.command
        }

        fn args(&self) -> &[String] {
            &self.args
        }

        async fn is_running(&self) -> bool {
            self.exit_rx.is_some()
        }

        async fn try_wait(&mut self) -> Result<Option<ProcessStatus>> {
            Ok(None)
        }

        async fn wait(&mut self) -> Result<ProcessStatus> {
            match self.exit_rx.take() {
                Some(rx) => {
                    let code = rx.await.unwrap_or(None);
                    Ok(ProcessStatus::Exited { code })
                }
                None => Ok(ProcessStatus::Unknown),
            }
        }

        async fn kill(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct FakeManager {
        handle: Mutex<Option<FakeHandle>>,
        cleaned: Arc<AtomicBool>,
    }

    #[async_trait]
    impl SupervisorProcessManager for FakeManager {
        async fn start_child(&self) -> Result<Box<dyn ProcessHandle>> {
            match self.handle.lock().unwrap().take() {
                Some(handle) => Ok(Box::new(handle)),
                None => Err(anyhow::anyhow!("no such file or directory")),
            }
        }

        async fn cleanup(&self) -> Result<()> {
            self.cleaned.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn active_process_count(&self) -> usize {
            0
        }

        fn tracked_processes(&self) -> Vec<(ProcessId, String)> {
            Vec::new()
        }
    }

    fn test_config() -> SupervisorConfig {
        SupervisorConfig::builder()
            .name("test-supervisor")
            .command("backend")
            .build()
            .unwrap()
    }

    fn factory_for(
        manager: FakeManager,
    ) -> impl FnOnce(
        &SupervisorConfig,
    ) -> Pin<
        Box<dyn Future<Output = Result<Box<dyn SupervisorProcessManager>, anyhow::Error>> + Send>,
    > {
        move |_config| Box::pin(async move { Ok(Box::new(manager) as Box<dyn SupervisorProcessManager>) })
    }

    #[tokio::test]
    async fn test_launch_failure_is_absorbed() {
        let manager = FakeManager {
            handle: Mutex::new(None),
            cleaned: Arc::new(AtomicBool::new(false)),
        };

        let supervisor = SupervisorInner::new(test_config())
            .start_with_factory(factory_for(manager))
            .await
            .unwrap();

        let state = supervisor.status();
        assert!(matches!(state, ChildState::Failed { .. }));
        assert_eq!(state.health(), "stopped");
        assert_eq!(state.liveness(), "inactive");

        // wait resolves immediately since Failed is terminal
        let state = supervisor.wait().await;
        assert!(matches!(state, ChildState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_child_exit_is_recorded() {
        let (exit_tx, exit_rx) = oneshot::channel();
        let manager = FakeManager {
            handle: Mutex::new(Some(FakeHandle {
                pid: Some(ProcessId(321)),
                exit_rx: Some(exit_rx),
                command: "backend".to_string(),
                args: Vec::new(),
            })),
            cleaned: Arc::new(AtomicBool::new(false)),
        };

        let supervisor = SupervisorInner::new(test_config())
            .start_with_factory(factory_for(manager))
            .await
            .unwrap();

        let state = supervisor.status();
        assert_eq!(state.health(), "running");
        assert_eq!(state.pid(), Some(ProcessId(321)));

        exit_tx.send(Some(7)).unwrap();

        let state = supervisor.wait().await;
        assert_eq!(state.exit_code(), Some(7));
        assert_eq!(state.health(), "stopped");

        // No spontaneous recovery after exit
        assert!(matches!(supervisor.status(), ChildState::Stopped { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_runs_cleanup_and_cancels() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let (_exit_tx, exit_rx) = oneshot::channel();
        let manager = FakeManager {
            handle: Mutex::new(Some(FakeHandle {
                pid: Some(ProcessId(11)),
                exit_rx: Some(exit_rx),
                command: "backend".to_string(),
                args: Vec::new(),
            })),
            cleaned: cleaned.clone(),
        };

        let supervisor = SupervisorInner::new(test_config())
            .start_with_factory(factory_for(manager))
            .await
            .unwrap();

        let token = supervisor.cancellation_token();
        supervisor.shutdown().await.unwrap();

        assert!(cleaned.load(Ordering::SeqCst));
        assert!(token.is_cancelled());
    }
}
