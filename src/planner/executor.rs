//! Task list executor.
//!
//! This module runs the task groups of one node against its management
//! client. Groups run concurrently; the tasks of a group run in order and a
//! failure skips what is left of the group.

use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::plan::{NodeTaskList, ServiceTaskGroup, Task, TaskAction};
use crate::bridge::{ManagementClient, StatusAction};
use crate::error::{BridgeError, DeliveryError, ExecutionError, Result};

/// How the task lists of several nodes are driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeSchedule {
    /// One node after the other.
    #[default]
    Sequential,
    /// All nodes at once.
    Concurrent,
}

/// Options of one delivery run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Only report what would be done.
    pub dry_run: bool,
    /// Abort the whole run on the first failing task.
    pub break_on_error: bool,
    /// Node scheduling policy.
    pub schedule: NodeSchedule,
}

impl ExecutionOptions {
    /// Creates the default options: live, collect errors, nodes in sequence.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dry_run: false,
            break_on_error: false,
            schedule: NodeSchedule::Sequential,
        }
    }

    /// Sets dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets whether the first failure aborts the run.
    #[must_use]
    pub const fn with_break_on_error(mut self, break_on_error: bool) -> Self {
        self.break_on_error = break_on_error;
        self
    }

    /// Sets the node scheduling policy.
    #[must_use]
    pub const fn with_schedule(mut self, schedule: NodeSchedule) -> Self {
        self.schedule = schedule;
        self
    }
}

/// What happened to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "message")]
pub enum TaskStatus {
    /// The task completed.
    Succeeded,
    /// The task failed.
    Failed(String),
    /// An earlier task of the group failed.
    Skipped,
    /// Dry run; nothing was executed.
    Planned,
}

/// Outcome of one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    /// The task.
    pub task: Task,
    /// What happened.
    #[serde(flatten)]
    pub status: TaskStatus,
}

/// Outcomes of the task group of one service on one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceReport {
    /// Node name.
    pub node: String,
    /// Service name.
    pub service: String,
    /// One outcome per task, in order.
    pub outcomes: Vec<TaskOutcome>,
}

impl ServiceReport {
    /// Returns the first failure of the group, if any.
    #[must_use]
    pub fn failure(&self) -> Option<(&Task, &str)> {
        self.outcomes.iter().find_map(|o| match &o.status {
            TaskStatus::Failed(message) => Some((&o.task, message.as_str())),
            _ => None,
        })
    }

    /// Returns true if a task of the group failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.failure().is_some()
    }
}

/// Reports every task of a node as planned without contacting it.
#[must_use]
pub fn plan_node_task_list(list: &NodeTaskList) -> Vec<ServiceReport> {
    list.groups
        .iter()
        .map(|group| ServiceReport {
            node: list.node.name.clone(),
            service: group.service.clone(),
            outcomes: group
                .tasks
                .iter()
                .map(|task| TaskOutcome {
                    task: task.clone(),
                    status: TaskStatus::Planned,
                })
                .collect(),
        })
        .collect()
}

/// Executes the task list of one node.
///
/// Reports are returned in the order of the groups.
///
/// # Errors
///
/// Returns an error if `break_on_error` is set and a task fails, or if a
/// task group could not be joined.
pub async fn execute_node_task_list(
    list: &NodeTaskList,
    client: Arc<dyn ManagementClient>,
    break_on_error: bool,
) -> Result<Vec<ServiceReport>> {
    info!(
        "Delivering {} services ({} tasks) to {}",
        list.groups.len(),
        list.task_count(),
        list.node.name
    );

    let mut set = JoinSet::new();
    for (index, group) in list.groups.iter().enumerate() {
        let client = Arc::clone(&client);
        let node = list.node.name.clone();
        let group = group.clone();
        set.spawn(async move { (index, run_task_group(client.as_ref(), node, group).await) });
    }

    let mut reports: Vec<Option<ServiceReport>> = vec![None; list.groups.len()];
    while let Some(joined) = set.join_next().await {
        let (index, report) = joined.map_err(|e| {
            DeliveryError::internal(format!("Task group of {} aborted: {e}", list.node.name))
        })?;

        if break_on_error {
            if let Some((task, message)) = report.failure() {
                set.abort_all();
                return Err(ExecutionError::TaskFailed {
                    node: report.node.clone(),
                    service: report.service.clone(),
                    task: task.kind().to_string(),
                    message: message.to_string(),
                }
                .into());
            }
        }
        reports[index] = Some(report);
    }

    Ok(reports.into_iter().flatten().collect())
}

/// Runs the tasks of one service in order.
async fn run_task_group(
    client: &dyn ManagementClient,
    node: String,
    group: ServiceTaskGroup,
) -> ServiceReport {
    let mut outcomes = Vec::with_capacity(group.tasks.len());
    let mut failed = false;

    for task in group.tasks {
        let status = if failed {
            TaskStatus::Skipped
        } else {
            debug!("{node}: {task}");
            match run_task(client, &task).await {
                Ok(()) => TaskStatus::Succeeded,
                Err(e) => {
                    error!("{node}: {task} failed: {e}");
                    failed = true;
                    TaskStatus::Failed(e.to_string())
                }
            }
        };
        outcomes.push(TaskOutcome { task, status });
    }

    ServiceReport {
        node,
        service: group.service,
        outcomes,
    }
}

async fn run_task(
    client: &dyn ManagementClient,
    task: &Task,
) -> std::result::Result<(), BridgeError> {
    match &task.action {
        TaskAction::Deploy {
            repository,
            options,
        } => client.deploy_service(repository, options).await,
        TaskAction::Settings { settings } => {
            client
                .set_service_settings(&task.service, task.service_type, settings)
                .await
        }
        TaskAction::Preferences { preferences } => {
            client
                .set_service_preferences(&task.service, task.service_type, preferences)
                .await
        }
        TaskAction::Start => {
            client
                .set_service_status(StatusAction::Start, &task.service, task.service_type)
                .await
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed(message) => write!(f, "failed: {message}"),
            Self::Skipped => write!(f, "skipped"),
            Self::Planned => write!(f, "planned"),
        }
    }
}
