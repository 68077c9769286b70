//! Windows process management for the warden supervisor
//!
//! Spawns the supervised child without a console window and terminates
//! process trees with `taskkill /T`.

mod process_manager;
mod supervisor_manager;

pub use process_manager::{WindowsProcessHandle, WindowsProcessManager};
pub use supervisor_manager::{
    WindowsSupervisorProcessManager, WindowsSupervisorProcessManagerFactory,
};
