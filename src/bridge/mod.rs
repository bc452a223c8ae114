//! Bridge management API integration module.
//!
//! Deliveries only need four verbs from a node: deploy a repository, apply
//! settings, apply preferences and change the runtime status of a service.
//! [`ManagementClient`] is that seam; [`BridgeClient`] implements it over
//! the REST API.

mod client;
mod types;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

use crate::config::ServiceType;
use crate::config::options::DeploymentOptions;
use crate::error::BridgeError;
use crate::planner::NodeConnection;

pub use client::{BridgeClient, BridgeClientFactory};
pub use types::{
    BRIDGE_REST_API_BASE, StatusAction, deep_merge, deployment_query, service_kind_segment,
};

/// Operations the delivery needs from a node.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManagementClient: Send + Sync {
    /// Uploads and deploys a packaged repository.
    async fn deploy_service(
        &self,
        repository: &Path,
        options: &DeploymentOptions,
    ) -> Result<(), BridgeError>;

    /// Applies settings to a deployed service.
    async fn set_service_settings(
        &self,
        name: &str,
        service_type: ServiceType,
        settings: &Map<String, Value>,
    ) -> Result<(), BridgeError>;

    /// Applies preferences to a deployed service.
    async fn set_service_preferences(
        &self,
        name: &str,
        service_type: ServiceType,
        preferences: &Map<String, Value>,
    ) -> Result<(), BridgeError>;

    /// Starts, stops or kills a deployed service.
    async fn set_service_status(&self, action: StatusAction, name: &str, service_type: ServiceType)
    -> Result<(), BridgeError>;
}

/// Creates a management client for a node.
pub trait ClientFactory: Send + Sync {
    /// Creates a client connected to the node.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created.
    fn create(&self, node: &NodeConnection) -> Result<Arc<dyn ManagementClient>, BridgeError>;
}
