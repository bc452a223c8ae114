//! Task list generation.
//!
//! Every resolved service becomes a group of tasks that must run in order:
//! deploy, then settings, then preferences, then start. Groups are collected
//! per node together with what is needed to connect to it.

use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

use super::tree::{DomainDeliveryTree, ResolvedService};
use crate::config::options::{self, DeploymentOptions, delivery_defaults};
use crate::config::{Location, NodeConfig, ServiceType};
use crate::error::PlanError;

/// Kind of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    /// Upload and deploy the repository.
    Deploy,
    /// Apply settings.
    Settings,
    /// Apply preferences.
    Preferences,
    /// Start the service.
    Start,
}

/// What a task does, with its payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "task", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskAction {
    /// Deploy the repository with the given options.
    Deploy {
        /// Repository to upload.
        repository: PathBuf,
        /// Options sent with the upload. `startup` is always false.
        options: DeploymentOptions,
    },
    /// Apply settings.
    Settings {
        /// Settings to apply.
        settings: Map<String, Value>,
    },
    /// Apply preferences.
    Preferences {
        /// Preferences to apply.
        preferences: Map<String, Value>,
    },
    /// Start the service.
    Start,
}

/// One remote operation on one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    /// Service name.
    pub service: String,
    /// Kind of service.
    #[serde(rename = "serviceType")]
    pub service_type: ServiceType,
    /// Operation and payload.
    #[serde(flatten)]
    pub action: TaskAction,
}

/// Ordered tasks of one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceTaskGroup {
    /// Service name.
    pub service: String,
    /// Tasks, in execution order.
    pub tasks: Vec<Task>,
}

/// Connection details of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeConnection {
    /// Node name.
    pub name: String,
    /// Management endpoint.
    #[serde(serialize_with = "serialize_location")]
    pub location: Location,
    /// User name, if configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Password, if configured.
    #[serde(skip)]
    pub password: Option<String>,
}

/// Everything to do on one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeTaskList {
    /// Node to connect to.
    pub node: NodeConnection,
    /// One group per service.
    pub groups: Vec<ServiceTaskGroup>,
}

impl TaskAction {
    /// Returns the kind of the action.
    #[must_use]
    pub const fn kind(&self) -> TaskKind {
        match self {
            Self::Deploy { .. } => TaskKind::Deploy,
            Self::Settings { .. } => TaskKind::Settings,
            Self::Preferences { .. } => TaskKind::Preferences,
            Self::Start => TaskKind::Start,
        }
    }
}

impl Task {
    /// Returns the kind of the task.
    #[must_use]
    pub const fn kind(&self) -> TaskKind {
        self.action.kind()
    }

    /// Returns a short description of the payload.
    #[must_use]
    pub fn details(&self) -> String {
        match &self.action {
            TaskAction::Deploy { repository, options } => {
                format!("{} {}", repository.display(), Value::Object(options.clone()))
            }
            TaskAction::Settings { settings } => Value::Object(settings.clone()).to_string(),
            TaskAction::Preferences { preferences } => {
                Value::Object(preferences.clone()).to_string()
            }
            TaskAction::Start => String::new(),
        }
    }
}

impl NodeTaskList {
    /// Total number of tasks on the node.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.groups.iter().map(|g| g.tasks.len()).sum()
    }
}

impl From<&NodeConfig> for NodeConnection {
    fn from(node: &NodeConfig) -> Self {
        Self {
            name: node.name.clone(),
            location: node.location.clone(),
            user: node.user.clone(),
            password: node.password.clone(),
        }
    }
}

/// Creates the task group of one service.
///
/// The deployment options are the delivery defaults overlaid with the
/// service's resolved options. Startup is split off into its own task.
#[must_use]
pub fn transform_service_to_task_group(service: &ResolvedService) -> ServiceTaskGroup {
    let mut options = delivery_defaults();
    options.extend(service.deployment_options.clone());

    let startup = options.get(options::STARTUP).and_then(Value::as_bool).unwrap_or(false);
    options.insert(options::STARTUP.to_string(), Value::Bool(false));

    let task = |action| Task {
        service: service.name.clone(),
        service_type: service.service_type,
        action,
    };

    let mut tasks = vec![task(TaskAction::Deploy {
        repository: service.repository.clone(),
        options,
    })];
    if !service.settings.is_empty() {
        tasks.push(task(TaskAction::Settings {
            settings: service.settings.clone(),
        }));
    }
    if !service.preferences.is_empty() {
        tasks.push(task(TaskAction::Preferences {
            preferences: service.preferences.clone(),
        }));
    }
    if startup {
        tasks.push(task(TaskAction::Start));
    }

    ServiceTaskGroup {
        service: service.name.clone(),
        tasks,
    }
}

/// Creates the task lists of a filtered domain tree.
///
/// # Errors
///
/// Returns an error if the tree names a node with no definition.
pub fn transform_to_task_list(
    tree: &DomainDeliveryTree,
    nodes: &[NodeConfig],
) -> Result<Vec<NodeTaskList>, PlanError> {
    tree.iter()
        .map(|(name, services)| -> Result<NodeTaskList, PlanError> {
            let node = nodes
                .iter()
                .find(|n| &n.name == name)
                .ok_or_else(|| PlanError::UnknownNode { name: name.clone() })?;
            Ok(NodeTaskList {
                node: NodeConnection::from(node),
                groups: services.values().map(transform_service_to_task_group).collect(),
            })
        })
        .collect()
}

fn serialize_location<S>(location: &Location, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&location.base_url())
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Deploy => "DEPLOY",
            Self::Settings => "SETTINGS",
            Self::Preferences => "PREFERENCES",
            Self::Start => "START",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.kind(), self.service, self.service_type)
    }
}
