//! Enforcement orchestration module.
//!
//! This module provides:
//! - The per-provider enforcer contract and mesh-type defaults
//! - The orchestrator handling virtual mesh lifecycle events
//! - A polling watcher producing those events from the store

mod enforcer;
mod orchestrator;
mod watch;

pub use enforcer::{MeshEnforcer, default_enforcement};
pub use orchestrator::{EnforcementOrchestrator, PolicyGroupEvent};
pub use watch::PolicyGroupWatcher;
