//! Background Tasks Module
//!
//! Contains tasks spawned alongside the lifecycle host.
//!
//! # Tasks
//! - Lifecycle: installs then activates the current generation at startup

mod lifecycle;

pub use lifecycle::spawn_lifecycle_task;
