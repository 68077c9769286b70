//! Unix process management for the warden supervisor
//!
//! Spawns the supervised child with piped output, checks liveness with
//! signal 0, and terminates process trees with SIGTERM/SIGKILL escalation.

#[cfg(unix)]
mod process_manager;
#[cfg(unix)]
mod supervisor_manager;

#[cfg(unix)]
pub use process_manager::{UnixProcessHandle, UnixProcessManager};
#[cfg(unix)]
pub use supervisor_manager::{UnixSupervisorProcessManager, UnixSupervisorProcessManagerFactory};

// Stubs so the crate still compiles when pulled into a non-Unix build graph
#[cfg(not(unix))]
pub struct UnixProcessManager;

#[cfg(not(unix))]
pub struct UnixSupervisorProcessManager;
