//! Warden core - platform-independent supervisor building blocks
//!
//! This crate provides the configuration, error types, process abstractions,
//! and the child lifecycle state machine shared across platform-specific
//! implementations.

mod config;
mod error;
mod manager;
mod process;
mod state;
mod stdio;
mod supervisor;

pub use config::*;
pub use error::*;
pub use manager::*;
pub use process::*;
pub use state::*;
pub use stdio::*;
pub use supervisor::{Started, SupervisorInner, Unstarted};
