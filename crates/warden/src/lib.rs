//! High-level supervisor assembly: platform selection, the [`Supervisor`]
//! API, and the HTTP status server.

pub mod api;
pub mod server;

use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;
use warden_core::{
    ChildState, StateCell, Started, SupervisorConfig, SupervisorInner, SupervisorProcessManager,
    SupervisorProcessManagerFactory, Unstarted, WardenError,
};

/// Platform-independent factory that selects the appropriate implementation at compile time
pub struct PlatformSupervisorFactory;

#[async_trait]
impl SupervisorProcessManagerFactory for PlatformSupervisorFactory {
    #[cfg(unix)]
    type Manager = warden_unix::UnixSupervisorProcessManager;

    #[cfg(windows)]
    type Manager = warden_windows::WindowsSupervisorProcessManager;

    async fn create(config: &SupervisorConfig) -> Result<Self::Manager> {
        #[cfg(unix)]
        return warden_unix::UnixSupervisorProcessManagerFactory::create(config).await;

        #[cfg(windows)]
        return warden_windows::WindowsSupervisorProcessManagerFactory::create(config).await;
    }

    fn platform_name() -> &'static str {
        #[cfg(unix)]
        return "unix";

        #[cfg(windows)]
        return "windows";
    }
}

/// Boxes a platform-appropriate process manager for the supervisor core
pub fn create_supervisor_process_manager(
    config: &SupervisorConfig,
) -> Pin<Box<dyn Future<Output = Result<Box<dyn SupervisorProcessManager>>> + Send>> {
    let config = config.clone();
    Box::pin(async move {
        let manager = PlatformSupervisorFactory::create(&config).await?;
        Ok(Box::new(manager) as Box<dyn SupervisorProcessManager>)
    })
}

/// Supervisor that has not yet launched its child
pub struct Supervisor {
    inner: SupervisorInner<Unstarted>,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            inner: SupervisorInner::new(config.clone()),
            config,
        }
    }

    /// Launch the child process using the platform process manager
    ///
    /// A spawn failure is absorbed into the `Failed` state rather than
    /// returned; the started supervisor keeps answering status queries
    /// either way.
    pub async fn start(self) -> Result<StartedSupervisor, WardenError> {
        let inner = self
            .inner
            .start_with_factory(create_supervisor_process_manager)
            .await?;
        Ok(StartedSupervisor {
            inner,
            config: self.config,
        })
    }
}

/// Supervisor with a launched (or failed-to-launch) child
pub struct StartedSupervisor {
    inner: SupervisorInner<Started>,
    config: SupervisorConfig,
}

impl StartedSupervisor {
    /// Current child state snapshot (non-blocking)
    pub fn status(&self) -> ChildState {
        self.inner.status()
    }

    /// Read-only handle to the child state, for wiring into the status API
    pub fn state_cell(&self) -> StateCell {
        self.inner.state_cell()
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancellation_token()
    }

    /// Block until the child reaches a terminal state and return it
    pub async fn wait(&self) -> ChildState {
        self.inner.wait().await
    }

    /// Cancel the supervisor and terminate the child process tree
    pub async fn shutdown(self) -> Result<(), WardenError> {
        self.inner.shutdown().await
    }
}

// Re-export core functionality
pub use warden_core::*;
