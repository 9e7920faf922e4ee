// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items must be documented
#![warn(dead_code)]                   // Unused code is flagged
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are flagged
#![warn(unused_variables)]            // Unused variables are flagged
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Tests assert with expect() and panic!() freely.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Mesh Enforcer
//!
//! Translates access-control policies into mesh routing resources and keeps a
//! managed service mesh converged on them.
//!
//! ## Overview
//!
//! A virtual mesh groups one or more meshes under one access-control setting.
//! For every App Mesh mesh it covers, the enforcer:
//!
//! - Resolves which workloads back which services, and which services each
//!   workload may call under the access-control policies
//! - Translates that topology into virtual services, virtual routers, default
//!   routes and virtual nodes
//! - Converges App Mesh on those resources with describe-then-write calls
//! - Reports the outcome on the virtual mesh's status
//!
//! ## Architecture
//!
//! 1. **Topology**: read fresh from the resource store each cycle
//! 2. **Desired resources**: a pure translation of that topology
//! 3. **Reconciler**: creates, updates or leaves each resource alone
//!
//! In enforced mode only policy-covered services and workloads get routing
//! resources, and stale default routes from open mode are removed first.
//!
//! ## Modules
//!
//! - [`model`]: Topology, policy and mesh objects
//! - [`store`]: Resource store backends (local, S3)
//! - [`topology`]: Service/workload graph and policy coverage
//! - [`appmesh`]: App Mesh translation, client and reconciliation
//! - [`enforcement`]: Virtual mesh event handling
//! - [`config`]: Configuration parsing and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! meshes:
//!   - metadata: { name: appmesh, namespace: mesh-system }
//!     meshType: { type: appMesh, name: prod, awsAccountId: "123456789012", region: us-east-1 }
//!
//! accessControlPolicies:
//!   - metadata: { name: web-to-reviews, namespace: bookinfo }
//!     sourceSelector:
//!       matcher: { labels: { app: web } }
//!     destinationSelector:
//!       serviceRefs:
//!         - { name: reviews, namespace: bookinfo }
//!
//! virtualMeshes:
//!   - metadata: { name: prod, namespace: mesh-system }
//!     meshes: [{ name: appmesh, namespace: mesh-system }]
//!     enforceAccessControl: ENABLED
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod appmesh;
pub mod cli;
pub mod config;
pub mod enforcement;
pub mod error;
pub mod model;
pub mod store;
pub mod topology;

#[cfg(test)]
mod testutil;

// ============================================================================
// Re-exports
// ============================================================================

pub use appmesh::{AppMeshEnforcer, AppMeshReconciler, DesiredResources, ReconcileSummary};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, EnforcerConfig, ManifestValidator};
pub use enforcement::{EnforcementOrchestrator, MeshEnforcer, PolicyGroupEvent, PolicyGroupWatcher};
pub use error::{EnforcerError, Result};
pub use store::{LocalResourceStore, ResourceStore, S3ResourceStore};
pub use topology::{ServiceWorkloadGraph, TopologyResolver, TopologySnapshot};
