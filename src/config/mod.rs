//! Configuration module for the Bridge delivery system.
//!
//! This module handles all configuration-related functionality:
//! - The canonical model of domains, nodes, solutions and services
//! - Normalization of loosely typed raw definitions
//! - Reading a project root from disk
//! - The deployment option vocabulary

mod model;
mod normalizer;
pub mod options;
mod parser;

pub use model::{
    DeliveryConfiguration, Domain, GuardedValue, GuardedValueMap, Location, NodeConfig, Service,
    ServiceSettings, ServiceType, Solution,
};
pub use normalizer::{
    make_string_array, normalize_domain, normalize_guarded_value, normalize_guarded_values,
    normalize_node, normalize_service, normalize_solution, parse_location, parse_service_type,
    value_kind,
};
pub use options::DeploymentOptions;
pub use parser::{ConfigParser, ENV_PASSWORD, ENV_PROJECT_ROOT, ENV_USER, parse_document};
