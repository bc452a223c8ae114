//! Delivery orchestration.
//!
//! This module ties the pipeline together: build the delivery tree, filter
//! it, derive the per-node task lists, connect to the nodes and run the
//! tasks. Execution is refused as soon as an error diagnostic exists.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::bridge::{BridgeClientFactory, ClientFactory, ManagementClient};
use crate::config::{ConfigParser, DeliveryConfiguration};
use crate::error::{DeliveryError, ExecutionError, Result};
use crate::planner::{
    DeliveryFilter, Diagnostics, ExecutionOptions, NodeConnection, NodeSchedule, NodeTaskList,
    ServiceReport, create_delivery_tree, execute_node_task_list, filter_delivery_tree,
    plan_node_task_list, transform_to_task_list,
};

/// Asks the user for node credentials.
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    /// Returns the user name and password to use for a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials cannot be read.
    async fn ask(&self, node: &NodeConnection) -> Result<(String, String)>;
}

/// Outcome of the planning phase.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedDelivery {
    /// Domain being delivered.
    pub domain: String,
    /// Warnings and errors collected while planning.
    pub diagnostics: Diagnostics,
    /// Work per node.
    pub task_lists: Vec<NodeTaskList>,
}

impl PreparedDelivery {
    /// Total number of tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.task_lists.iter().map(NodeTaskList::task_count).sum()
    }
}

/// Outcome of a delivery run.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    /// Domain that was delivered.
    pub domain: String,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Start of the run.
    pub started_at: DateTime<Utc>,
    /// End of the run.
    pub finished_at: DateTime<Utc>,
    /// One report per service and node.
    pub services: Vec<ServiceReport>,
}

impl DeliveryReport {
    /// Number of services with a failed task.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.services.iter().filter(|s| s.failed()).count()
    }

    /// Returns true if no task failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Turns a report with failures into an error.
    ///
    /// # Errors
    ///
    /// Returns an error if any service failed.
    pub fn check(&self) -> Result<()> {
        match self.failed_count() {
            0 => Ok(()),
            failed => Err(ExecutionError::Unsuccessful { failed }.into()),
        }
    }
}

/// Connects to nodes, filling in missing credentials.
#[derive(Clone)]
struct Connector {
    factory: Arc<dyn ClientFactory>,
    prompt: Option<Arc<dyn CredentialPrompt>>,
    default_user: Option<String>,
    default_password: Option<String>,
}

impl Connector {
    async fn connect(&self, node: &NodeConnection) -> Result<Arc<dyn ManagementClient>> {
        let mut node = node.clone();
        if node.user.is_none() {
            node.user.clone_from(&self.default_user);
        }
        if node.password.is_none() {
            node.password.clone_from(&self.default_password);
        }

        if node.user.is_none() || node.password.is_none() {
            let Some(prompt) = &self.prompt else {
                return Err(ExecutionError::Credentials {
                    node: node.name.clone(),
                    message: String::from("no user or password configured"),
                }
                .into());
            };
            let (user, password) = prompt.ask(&node).await?;
            node.user.get_or_insert(user);
            node.password.get_or_insert(password);
        }

        debug!("Connecting to {} at {}", node.name, node.location);
        Ok(self.factory.create(&node)?)
    }

    async fn deliver(
        &self,
        list: &NodeTaskList,
        break_on_error: bool,
    ) -> Result<Vec<ServiceReport>> {
        let client = self.connect(&list.node).await?;
        execute_node_task_list(list, client, break_on_error).await
    }
}

/// Plans and runs deliveries of one configuration.
pub struct Deliverer {
    /// Canonical definitions.
    config: DeliveryConfiguration,
    /// Node connection handling.
    connector: Connector,
}

impl Deliverer {
    /// Creates a deliverer talking to real nodes.
    ///
    /// Default credentials are taken from the environment.
    #[must_use]
    pub fn new(config: DeliveryConfiguration) -> Self {
        let (default_user, default_password) = ConfigParser::default_credentials();
        Self {
            config,
            connector: Connector {
                factory: Arc::new(BridgeClientFactory),
                prompt: None,
                default_user,
                default_password,
            },
        }
    }

    /// Reads the definitions of a project root and creates a deliverer for them.
    ///
    /// # Errors
    ///
    /// Returns an error if the `.env` file or the definitions cannot be read.
    pub async fn from_project(parser: &ConfigParser) -> Result<Self> {
        parser.load_dotenv()?;
        let config = parser.read_definitions().await?;
        Ok(Self::new(config))
    }

    /// Sets the factory creating node clients.
    #[must_use]
    pub fn with_client_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.connector.factory = factory;
        self
    }

    /// Sets the prompt asked for missing credentials.
    #[must_use]
    pub fn with_prompt(mut self, prompt: Arc<dyn CredentialPrompt>) -> Self {
        self.connector.prompt = Some(prompt);
        self
    }

    /// Sets the credentials used for nodes that have none.
    #[must_use]
    pub fn with_default_credentials(
        mut self,
        user: Option<String>,
        password: Option<String>,
    ) -> Self {
        self.connector.default_user = user;
        self.connector.default_password = password;
        self
    }

    /// Plans a delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the filtered tree names a node without definition.
    pub fn prepare(&self, filter: &DeliveryFilter) -> Result<PreparedDelivery> {
        info!("Planning delivery of domain '{}'", filter.domain);

        let mut diagnostics = Diagnostics::new();
        let tree = create_delivery_tree(&self.config, &mut diagnostics);
        let filtered = filter_delivery_tree(filter, &tree, &self.config, &mut diagnostics);
        let task_lists = transform_to_task_list(&filtered, &self.config.nodes)?;

        debug!(
            "Planned {} nodes with {} warnings and {} errors",
            task_lists.len(),
            diagnostics.warning_count(),
            diagnostics.error_count()
        );

        Ok(PreparedDelivery {
            domain: filter.domain.clone(),
            diagnostics,
            task_lists,
        })
    }

    /// Runs a planned delivery.
    ///
    /// Failed services are recorded in the report; use
    /// [`DeliveryReport::check`] to turn them into an error.
    ///
    /// # Errors
    ///
    /// Returns an error if planning produced error diagnostics, if a node
    /// cannot be connected to, or if a task fails with `break_on_error` set.
    pub async fn execute(
        &self,
        prepared: &PreparedDelivery,
        options: ExecutionOptions,
    ) -> Result<DeliveryReport> {
        if prepared.diagnostics.has_errors() {
            return Err(ExecutionError::ConfigurationErrors {
                count: prepared.diagnostics.error_count(),
            }
            .into());
        }

        let started_at = Utc::now();
        let services = if options.dry_run {
            info!("Dry run: {} tasks planned", prepared.task_count());
            prepared.task_lists.iter().flat_map(plan_node_task_list).collect()
        } else {
            let lists = &prepared.task_lists;
            match options.schedule {
                NodeSchedule::Sequential => {
                    self.run_sequential(lists, options.break_on_error).await?
                }
                NodeSchedule::Concurrent => {
                    self.run_concurrent(lists, options.break_on_error).await?
                }
            }
        };

        let report = DeliveryReport {
            domain: prepared.domain.clone(),
            dry_run: options.dry_run,
            started_at,
            finished_at: Utc::now(),
            services,
        };

        if report.is_success() {
            info!("Delivery of '{}' finished", report.domain);
        } else {
            warn!("{} services of '{}' failed", report.failed_count(), report.domain);
        }
        Ok(report)
    }

    /// Plans and runs a delivery, failing if any service failed.
    ///
    /// # Errors
    ///
    /// Returns an error if planning or execution fails or a service failed.
    pub async fn deliver(
        &self,
        filter: &DeliveryFilter,
        options: ExecutionOptions,
    ) -> Result<DeliveryReport> {
        let prepared = self.prepare(filter)?;
        let report = self.execute(&prepared, options).await?;
        report.check()?;
        Ok(report)
    }

    async fn run_sequential(
        &self,
        lists: &[NodeTaskList],
        break_on_error: bool,
    ) -> Result<Vec<ServiceReport>> {
        let mut reports = Vec::new();
        for list in lists {
            reports.extend(self.connector.deliver(list, break_on_error).await?);
        }
        Ok(reports)
    }

    async fn run_concurrent(
        &self,
        lists: &[NodeTaskList],
        break_on_error: bool,
    ) -> Result<Vec<ServiceReport>> {
        let mut set = JoinSet::new();
        for (index, list) in lists.iter().enumerate() {
            let connector = self.connector.clone();
            let list = list.clone();
            set.spawn(async move { (index, connector.deliver(&list, break_on_error).await) });
        }

        let mut per_node: Vec<Vec<ServiceReport>> = vec![Vec::new(); lists.len()];
        while let Some(joined) = set.join_next().await {
            let (index, result) = joined
                .map_err(|e| DeliveryError::internal(format!("Node delivery aborted: {e}")))?;
            match result {
                Ok(reports) => per_node[index] = reports,
                Err(e) => {
                    set.abort_all();
                    return Err(e);
                }
            }
        }
        Ok(per_node.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MockManagementClient;
    use crate::config::{normalize_domain, normalize_node, normalize_service, normalize_solution};
    use crate::error::BridgeError;
    use crate::planner::{TaskKind, TaskStatus};
    use serde_json::json;
    use std::path::Path;
    use std::sync::Mutex;

    fn project() -> DeliveryConfiguration {
        let root = Path::new("/project");
        DeliveryConfiguration {
            domains: vec![
                normalize_domain(
                    "test",
                    &json!({"nodes": ["n1", "n2"], "services": "Api", "solutions": ["workers"]}),
                )
                .unwrap(),
            ],
            nodes: vec![
                normalize_node(
                    "n1",
                    &json!({
                        "location": "n1.local",
                        "label": "worker",
                        "user": "admin",
                        "password": "pw"
                    }),
                )
                .unwrap(),
                normalize_node("n2", &json!({"location": "n2.local:9090"})).unwrap(),
            ],
            solutions: vec![
                normalize_solution("workers", &json!({"services": {"worker": "Worker"}})).unwrap(),
            ],
            services: vec![
                normalize_service(
                    "Api",
                    &json!({
                        "type": "xUML",
                        "repository": "Api.rep",
                        "settings": {"Timeout": [{"node": "n1", "value": 10}, 5]},
                    }),
                    root,
                )
                .unwrap(),
                normalize_service(
                    "Worker",
                    &json!({
                        "type": "java",
                        "repository": "Worker.jar",
                        "deploymentOptions": {"startup": false}
                    }),
                    root,
                )
                .unwrap(),
            ],
        }
    }

    #[derive(Default)]
    struct RecordingFactory {
        connections: Mutex<Vec<NodeConnection>>,
        failing: Option<&'static str>,
    }

    impl ClientFactory for RecordingFactory {
        fn create(
            &self,
            node: &NodeConnection,
        ) -> std::result::Result<Arc<dyn ManagementClient>, BridgeError> {
            self.connections.lock().unwrap().push(node.clone());

            let failing = self.failing;
            let mut client = MockManagementClient::new();
            client.expect_deploy_service().returning(move |repository, _| {
                if failing.is_some_and(|name| repository.ends_with(name)) {
                    Err(BridgeError::api_error(500, "deployment failed"))
                } else {
                    Ok(())
                }
            });
            client.expect_set_service_settings().returning(|_, _, _| Ok(()));
            client.expect_set_service_preferences().returning(|_, _, _| Ok(()));
            client.expect_set_service_status().returning(|_, _, _| Ok(()));
            Ok(Arc::new(client))
        }
    }

    struct FixedPrompt;

    #[async_trait]
    impl CredentialPrompt for FixedPrompt {
        async fn ask(&self, _node: &NodeConnection) -> Result<(String, String)> {
            Ok((String::from("prompted"), String::from("typed")))
        }
    }

    fn deliverer(factory: Arc<RecordingFactory>) -> Deliverer {
        Deliverer::new(project())
            .with_client_factory(factory)
            .with_default_credentials(None, None)
    }

    #[test]
    fn test_prepare_builds_task_lists() {
        let prepared = deliverer(Arc::default()).prepare(&DeliveryFilter::new("test")).unwrap();

        assert!(prepared.diagnostics.is_empty());
        assert_eq!(prepared.task_lists.len(), 2);
        assert_eq!(prepared.task_lists[0].node.name, "n1");
        assert_eq!(prepared.task_lists[0].groups.len(), 2);
        assert_eq!(prepared.task_lists[1].groups.len(), 1);
        assert_eq!(prepared.task_count(), 7);

        let api = &prepared.task_lists[0].groups[0];
        assert_eq!(api.service, "Api");
        assert_eq!(
            api.tasks.iter().map(|t| t.kind()).collect::<Vec<_>>(),
            vec![TaskKind::Deploy, TaskKind::Settings, TaskKind::Start]
        );
    }

    #[tokio::test]
    async fn test_dry_run_contacts_no_node() {
        let factory = Arc::new(RecordingFactory::default());
        let deliverer = deliverer(Arc::clone(&factory));
        let prepared = deliverer.prepare(&DeliveryFilter::new("test")).unwrap();

        let report = deliverer
            .execute(&prepared, ExecutionOptions::new().with_dry_run(true))
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.services.len(), 3);
        assert!(
            report
                .services
                .iter()
                .flat_map(|s| &s.outcomes)
                .all(|o| o.status == TaskStatus::Planned)
        );
        assert!(factory.connections.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_configuration_errors_block_execution() {
        let mut config = project();
        config.domains[0].nodes.push(String::from("ghost"));
        let deliverer =
            Deliverer::new(config).with_client_factory(Arc::new(RecordingFactory::default()));

        let prepared = deliverer.prepare(&DeliveryFilter::new("test")).unwrap();
        assert!(prepared.diagnostics.has_errors());

        let err = deliverer
            .execute(&prepared, ExecutionOptions::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Delivery error: Configuration errors detected. Skipping execution."
        );
    }

    #[tokio::test]
    async fn test_missing_credentials_are_prompted() {
        let factory = Arc::new(RecordingFactory::default());
        let deliverer = deliverer(Arc::clone(&factory))
            .with_default_credentials(Some(String::from("envuser")), None)
            .with_prompt(Arc::new(FixedPrompt));

        let report = deliverer
            .deliver(&DeliveryFilter::new("test"), ExecutionOptions::new())
            .await
            .unwrap();
        assert_eq!(report.services.len(), 3);
        assert!(report.is_success());

        let connections = factory.connections.lock().unwrap();
        assert_eq!(connections.len(), 2);
        assert_eq!(connections[0].user.as_deref(), Some("admin"));
        assert_eq!(connections[0].password.as_deref(), Some("pw"));
        assert_eq!(connections[1].user.as_deref(), Some("envuser"));
        assert_eq!(connections[1].password.as_deref(), Some("typed"));
    }

    #[tokio::test]
    async fn test_missing_credentials_without_prompt() {
        let deliverer = deliverer(Arc::default());
        let filter = DeliveryFilter::new("test").with_nodes(vec![String::from("n2")]);

        let err = deliverer.deliver(&filter, ExecutionOptions::new()).await.unwrap_err();
        assert!(matches!(
            err,
            DeliveryError::Execution(ExecutionError::Credentials { ref node, .. }) if node == "n2"
        ));
    }

    #[tokio::test]
    async fn test_failures_are_collected_per_service() {
        let factory = Arc::new(RecordingFactory {
            failing: Some("Api.rep"),
            ..RecordingFactory::default()
        });
        let deliverer = deliverer(Arc::clone(&factory))
            .with_default_credentials(Some(String::from("u")), Some(String::from("p")));
        let prepared = deliverer.prepare(&DeliveryFilter::new("test")).unwrap();

        let options = ExecutionOptions::new().with_schedule(NodeSchedule::Concurrent);
        let report = deliverer.execute(&prepared, options).await.unwrap();

        assert_eq!(report.failed_count(), 2);
        let worker = report.services.iter().find(|s| s.service == "Worker").unwrap();
        assert!(!worker.failed());
        assert!(matches!(
            report.check(),
            Err(DeliveryError::Execution(ExecutionError::Unsuccessful { failed: 2 }))
        ));

        factory.connections.lock().unwrap().clear();
        let err = deliverer
            .execute(&prepared, ExecutionOptions::new().with_break_on_error(true))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Execution(ExecutionError::TaskFailed { .. })));

        let connected: Vec<String> = factory
            .connections
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(connected, vec!["n1"]);
    }
}
