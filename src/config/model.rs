//! Canonical delivery definitions.
//!
//! These are the entities produced by the normalizer: every string-or-array
//! field has become a list, every setting a list of guarded values. They are
//! read once per invocation and never mutated afterwards.

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Guarded values keyed by setting, preference or option name.
pub type GuardedValueMap = BTreeMap<String, Vec<GuardedValue>>;

/// Everything read from a project root.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliveryConfiguration {
    /// All domains.
    pub domains: Vec<Domain>,
    /// All nodes.
    pub nodes: Vec<NodeConfig>,
    /// All solutions.
    pub solutions: Vec<Solution>,
    /// All services.
    pub services: Vec<Service>,
}

/// A deployable environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Domain {
    /// Unique domain name.
    pub name: String,
    /// Names of the nodes belonging to the domain.
    pub nodes: Vec<String>,
    /// Names of services deployed to every node of the domain.
    pub services: Vec<String>,
    /// Names of solutions deployed to the domain.
    pub solutions: Vec<String>,
}

/// One target host accepting deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeConfig {
    /// Unique node name.
    pub name: String,
    /// Labels used by solutions and guarded values.
    pub label: Vec<String>,
    /// Where the management endpoint listens.
    #[serde(serialize_with = "serialize_location")]
    pub location: Location,
    /// Optional user name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Optional password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Connection address of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    /// Host name or IP address.
    pub host: String,
    /// Management port.
    pub port: u16,
}

/// Named mapping from node label to the services deployed on nodes carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Solution {
    /// Unique solution name.
    pub name: String,
    /// Label to service names.
    pub services: BTreeMap<String, Vec<String>>,
}

/// The three kinds of deployable services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ServiceType {
    /// xUML service.
    #[serde(rename = "xUML")]
    Xuml,
    /// Node.js service.
    #[serde(rename = "node")]
    Node,
    /// Java service.
    #[serde(rename = "java")]
    Java,
}

/// One deployable unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Service {
    /// Unique service name.
    pub name: String,
    /// Kind of service.
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    /// Absolute path of the deployable repository.
    pub repository: PathBuf,
    /// Guarded settings.
    pub settings: ServiceSettings,
    /// Guarded preferences.
    pub preferences: GuardedValueMap,
    /// Guarded deployment options.
    #[serde(rename = "deploymentOptions")]
    pub deployment_options: GuardedValueMap,
}

/// Settings of a service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServiceSettings {
    /// One list of guarded values per setting name.
    Keyed(GuardedValueMap),
    /// Whole settings documents, one per guarded value (node services only).
    Documents(Vec<GuardedValue>),
}

/// A candidate value and the conditions under which it applies.
///
/// An empty guard list matches anything.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardedValue {
    /// Domains the value applies to.
    pub domain: Vec<String>,
    /// Labels the value applies to.
    pub label: Vec<String>,
    /// Nodes the value applies to.
    pub node: Vec<String>,
    /// The value itself.
    pub value: Value,
}

impl DeliveryConfiguration {
    /// Finds a domain by name.
    #[must_use]
    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.domains.iter().find(|d| d.name == name)
    }

    /// Finds a node by name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Finds a solution by name.
    #[must_use]
    pub fn solution(&self, name: &str) -> Option<&Solution> {
        self.solutions.iter().find(|s| s.name == name)
    }

    /// Finds a service by name.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }
}

impl NodeConfig {
    /// Returns true if the node carries the label.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.label.iter().any(|l| l == label)
    }
}

impl Location {
    /// Default management port.
    pub const DEFAULT_PORT: u16 = 8080;

    /// Scheme used to reach every node.
    pub const SCHEME: &'static str = "https";

    /// Creates a location.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the base URL of the node.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", Self::SCHEME, self.host, self.port)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl ServiceType {
    /// All service kinds, in their canonical order.
    pub const ALL: [Self; 3] = [Self::Xuml, Self::Node, Self::Java];

    /// Returns the configuration name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xuml => "xUML",
            Self::Node => "node",
            Self::Java => "java",
        }
    }

    /// Parses a configuration name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Returns true if resolved settings are a nested document rather than a flat map.
    #[must_use]
    pub const fn has_document_settings(self) -> bool {
        matches!(self, Self::Node)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::Keyed(GuardedValueMap::new())
    }
}

impl GuardedValue {
    /// Creates a value that applies everywhere.
    #[must_use]
    pub const fn unguarded(value: Value) -> Self {
        Self {
            domain: Vec::new(),
            label: Vec::new(),
            node: Vec::new(),
            value,
        }
    }

    /// Restricts the value to the given domains.
    #[must_use]
    pub fn in_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domain = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts the value to the given nodes.
    #[must_use]
    pub fn on_nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node = nodes.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts the value to nodes carrying one of the labels.
    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.label = labels.into_iter().map(Into::into).collect();
        self
    }
}

fn serialize_location<S: Serializer>(
    location: &Location,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(location)
}
