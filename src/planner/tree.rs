//! Delivery tree construction.
//!
//! A delivery tree maps domain → node → service → [`ResolvedService`]. Every
//! guarded value of a service is resolved against each (domain, node) pair it
//! is delivered to. Services come either straight from the domain (deployed
//! to all its nodes) or from solutions (deployed to nodes carrying a label).

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::debug;

use super::diagnostics::Diagnostics;
use super::path::expand_paths;
use super::resolver::{ResolutionContext, select_best_value, select_guarded_values};
use crate::config::{
    DeliveryConfiguration, Domain, NodeConfig, Service, ServiceSettings, ServiceType, Solution,
};

/// A service with every guarded value resolved for one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedService {
    /// Service name.
    pub name: String,
    /// Kind of service.
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    /// Absolute path of the deployable repository.
    pub repository: PathBuf,
    /// Resolved settings. Nested for node services, flat otherwise.
    pub settings: Map<String, Value>,
    /// Resolved preferences.
    pub preferences: Map<String, Value>,
    /// Resolved deployment options.
    #[serde(rename = "deploymentOptions")]
    pub deployment_options: Map<String, Value>,
}

/// Services of one node, by name.
pub type NodeDeliveryTree = BTreeMap<String, ResolvedService>;

/// Node trees of one domain, by node name.
pub type DomainDeliveryTree = BTreeMap<String, NodeDeliveryTree>;

/// Domain trees, by domain name.
pub type DeliveryTree = BTreeMap<String, DomainDeliveryTree>;

/// Builds the delivery tree of every domain.
///
/// Bad references are recorded in `diagnostics` and left out of the tree.
pub fn create_delivery_tree(
    config: &DeliveryConfiguration,
    diagnostics: &mut Diagnostics,
) -> DeliveryTree {
    config
        .domains
        .iter()
        .map(|domain| {
            let tree = create_domain_delivery_tree(domain, config, diagnostics);
            (domain.name.clone(), tree)
        })
        .collect()
}

/// Builds the delivery tree of one domain.
pub fn create_domain_delivery_tree(
    domain: &Domain,
    config: &DeliveryConfiguration,
    diagnostics: &mut Diagnostics,
) -> DomainDeliveryTree {
    debug!("Building delivery tree for domain '{}'", domain.name);

    let nodes: Vec<&NodeConfig> = config
        .nodes
        .iter()
        .filter(|n| domain.nodes.contains(&n.name))
        .collect();
    for name in domain.nodes.iter().filter(|name| config.node(name).is_none()) {
        diagnostics.error(format!("Domain '{}' uses unknown node '{name}'", domain.name));
    }
    for name in domain.services.iter().filter(|name| config.service(name).is_none()) {
        diagnostics.warn(format!("Domain '{}' uses unknown service '{name}'", domain.name));
    }

    let mut tree: DomainDeliveryTree = nodes
        .iter()
        .map(|node| {
            let services = create_node_delivery_tree(
                domain,
                node,
                &config.services,
                &domain.services,
                diagnostics,
            );
            (node.name.clone(), services)
        })
        .collect();

    for name in &domain.solutions {
        let Some(solution) = config.solution(name) else {
            diagnostics.warn(format!("Domain '{}' uses unknown solution '{name}'", domain.name));
            continue;
        };
        warn_unknown_solution_services(solution, config, diagnostics);

        let solution_tree =
            create_solution_delivery_tree(domain, &nodes, solution, &config.services, diagnostics);
        tree = merge_domain_delivery_tree(tree, solution_tree);
    }

    tree
}

fn warn_unknown_solution_services(
    solution: &Solution,
    config: &DeliveryConfiguration,
    diagnostics: &mut Diagnostics,
) {
    let unknown: BTreeSet<&String> = solution
        .services
        .values()
        .flatten()
        .filter(|name| config.service(name).is_none())
        .collect();
    for name in unknown {
        diagnostics.warn(format!("Solution '{}' uses unknown service '{name}'", solution.name));
    }
}

/// Builds the tree contributed by one solution to a domain.
///
/// For every label of the solution, the listed services go to every node of
/// the domain carrying that label.
pub fn create_solution_delivery_tree(
    domain: &Domain,
    nodes: &[&NodeConfig],
    solution: &Solution,
    services: &[Service],
    diagnostics: &mut Diagnostics,
) -> DomainDeliveryTree {
    let mut tree = DomainDeliveryTree::new();
    for (label, names) in &solution.services {
        let label_tree: DomainDeliveryTree = nodes
            .iter()
            .filter(|n| n.has_label(label))
            .map(|node| {
                let node_tree =
                    create_node_delivery_tree(domain, node, services, names, diagnostics);
                (node.name.clone(), node_tree)
            })
            .collect();
        tree = merge_domain_delivery_tree(tree, label_tree);
    }
    tree
}

/// Builds the services of one node. Unknown service names are skipped.
pub fn create_node_delivery_tree(
    domain: &Domain,
    node: &NodeConfig,
    services: &[Service],
    names: &[String],
    diagnostics: &mut Diagnostics,
) -> NodeDeliveryTree {
    services
        .iter()
        .filter(|s| names.contains(&s.name))
        .map(|service| {
            let ctx = ResolutionContext::new(domain, node, service);
            let resolved = create_service_delivery_tree(ctx, diagnostics);
            (service.name.clone(), resolved)
        })
        .collect()
}

/// Resolves one service for one node.
pub fn create_service_delivery_tree(
    ctx: ResolutionContext<'_>,
    diagnostics: &mut Diagnostics,
) -> ResolvedService {
    let service = ctx.service;

    let settings = match &service.settings {
        ServiceSettings::Keyed(values) => select_guarded_values(values, ctx, diagnostics),
        ServiceSettings::Documents(documents) => {
            match select_best_value("settings", documents, ctx, diagnostics) {
                Some(Value::Object(document)) => document,
                _ => Map::new(),
            }
        }
    };

    let settings = if service.service_type.has_document_settings() {
        let (document, rejected) = expand_paths(settings);
        for e in rejected {
            diagnostics.error_once(format!(
                "service '{}': invalid settings key '{}': {}",
                service.name, e.path, e.reason
            ));
        }
        document
    } else {
        settings
    };

    ResolvedService {
        name: service.name.clone(),
        service_type: service.service_type,
        repository: service.repository.clone(),
        settings,
        preferences: select_guarded_values(&service.preferences, ctx, diagnostics),
        deployment_options: select_guarded_values(&service.deployment_options, ctx, diagnostics),
    }
}

/// Merges two domain trees.
///
/// Node entries are united; when both sides hold the same service on the
/// same node, the right-hand side wins. Both entries are resolved from the
/// same service and context, so this equals a field-by-field merge.
#[must_use]
pub fn merge_domain_delivery_tree(
    mut lhs: DomainDeliveryTree,
    rhs: DomainDeliveryTree,
) -> DomainDeliveryTree {
    for (node, services) in rhs {
        lhs.entry(node).or_default().extend(services);
    }
    lhs
}
