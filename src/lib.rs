// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
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
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Bridge Delivery
//!
//! Declarative, rule-based delivery of services to a fleet of Bridge nodes.
//!
//! ## Overview
//!
//! A project root describes the fleet as four kinds of definitions:
//!
//! - **Domains** group nodes and name the services and solutions they run
//! - **Nodes** are management endpoints carrying labels
//! - **Solutions** map node labels to services
//! - **Services** carry a repository plus settings, preferences and
//!   deployment options whose values may be guarded by domain, node or label
//!
//! ## Architecture
//!
//! 1. **Normalization**: raw JSON/YAML definitions become canonical entities
//! 2. **Delivery tree**: every guarded value is resolved per domain, node and service
//! 3. **Filter**: the tree is narrowed to the requested nodes, labels, solutions and services
//! 4. **Task lists**: each service becomes deploy, settings, preferences and start tasks
//! 5. **Execution**: the tasks run against the nodes' management API
//!
//! ## Modules
//!
//! - [`config`]: Definition model, normalization and project reading
//! - [`planner`]: Value resolution, delivery trees, filters, task lists and execution
//! - [`bridge`]: Bridge management API client
//! - [`deliverer`]: Delivery orchestration
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! # services/Collector.yaml
//! type: xUML
//! repository: Collector.rep
//! settings:
//!   Timeout:
//!     - value: 30
//!     - label: slow
//!       value: 120
//! deploymentOptions:
//!   startup: true
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod bridge;
pub mod cli;
pub mod config;
pub mod deliverer;
pub mod error;
pub mod planner;

// ============================================================================
// Re-exports
// ============================================================================

pub use bridge::{BridgeClient, ClientFactory, ManagementClient};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, DeliveryConfiguration};
pub use deliverer::{CredentialPrompt, Deliverer, DeliveryReport, PreparedDelivery};
pub use error::{DeliveryError, Result};
pub use planner::{DeliveryFilter, DeliveryTree, Diagnostics, ExecutionOptions, NodeTaskList};
