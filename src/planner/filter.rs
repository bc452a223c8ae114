//! Narrowing a delivery tree to what one invocation asked for.
//!
//! Filters name nodes, labels, solutions and services. Names that are not
//! part of the domain are reported as warnings and dropped; an unknown
//! domain is an error and yields an empty tree.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::diagnostics::Diagnostics;
use super::tree::{DeliveryTree, DomainDeliveryTree};
use crate::config::{DeliveryConfiguration, Domain, NodeConfig};

/// Criteria selecting part of a domain.
///
/// Empty lists select everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryFilter {
    /// Domain to deliver.
    pub domain: String,
    /// Node names to keep.
    pub nodes: Vec<String>,
    /// Node labels to keep.
    pub labels: Vec<String>,
    /// Solutions to keep.
    pub solutions: Vec<String>,
    /// Services to keep.
    pub services: Vec<String>,
}

impl DeliveryFilter {
    /// Creates a filter selecting the whole domain.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Self::default()
        }
    }

    /// Keeps only the given nodes.
    #[must_use]
    pub fn with_nodes(mut self, nodes: Vec<String>) -> Self {
        self.nodes = nodes;
        self
    }

    /// Keeps only nodes carrying one of the given labels.
    #[must_use]
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    /// Keeps only the given solutions.
    #[must_use]
    pub fn with_solutions(mut self, solutions: Vec<String>) -> Self {
        self.solutions = solutions;
        self
    }

    /// Keeps only the given services.
    #[must_use]
    pub fn with_services(mut self, services: Vec<String>) -> Self {
        self.services = services;
        self
    }
}

/// Filters the delivery tree of one domain.
pub fn filter_delivery_tree(
    filter: &DeliveryFilter,
    tree: &DeliveryTree,
    definitions: &DeliveryConfiguration,
    diagnostics: &mut Diagnostics,
) -> DomainDeliveryTree {
    let Some(domain) = definitions.domain(&filter.domain) else {
        diagnostics.error(format!(
            "domain '{}' is not defined in the configuration",
            filter.domain
        ));
        return DomainDeliveryTree::new();
    };

    let empty = DomainDeliveryTree::new();
    let domain_tree = tree.get(&domain.name).unwrap_or(&empty);
    filter_domain_delivery_tree(domain, filter, domain_tree, definitions, diagnostics)
}

fn filter_domain_delivery_tree(
    domain: &Domain,
    filter: &DeliveryFilter,
    tree: &DomainDeliveryTree,
    definitions: &DeliveryConfiguration,
    diagnostics: &mut Diagnostics,
) -> DomainDeliveryTree {
    let solution_names = retain_known(
        &domain.name,
        "solution",
        &domain.solutions,
        &filter.solutions,
        diagnostics,
    );
    if solution_names.is_empty() && !filter.solutions.is_empty() {
        debug!("Solution filter excludes everything in domain '{}'", domain.name);
        return DomainDeliveryTree::new();
    }

    let mut label_deployments: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for solution in solution_names.iter().filter_map(|name| definitions.solution(name)) {
        for (label, services) in &solution.services {
            label_deployments
                .entry(label.as_str())
                .or_default()
                .extend(services.iter().map(String::as_str));
        }
    }

    let nodes = select_nodes(domain, filter, definitions, diagnostics);

    let mut deployments = DomainDeliveryTree::new();
    let mut copy = |node: &str, service: &str| {
        if let Some(resolved) = tree.get(node).and_then(|services| services.get(service)) {
            deployments
                .entry(node.to_string())
                .or_default()
                .insert(service.to_string(), resolved.clone());
        }
    };

    for (label, services) in &label_deployments {
        for node in nodes.iter().filter(|n| n.has_label(label)) {
            for service in services {
                copy(&node.name, service);
            }
        }
    }

    if filter.solutions.is_empty() {
        for node in &nodes {
            for service in &domain.services {
                copy(&node.name, service);
            }
        }
    }

    let available: Vec<String> = tree
        .values()
        .flat_map(|services| services.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let services = retain_known(&domain.name, "service", &available, &filter.services, diagnostics);

    for node_services in deployments.values_mut() {
        node_services.retain(|name, _| services.contains(name));
    }
    deployments.retain(|_, node_services| !node_services.is_empty());
    deployments
}

/// Resolves the node filters against the nodes declared and defined for the domain.
fn select_nodes<'a>(
    domain: &Domain,
    filter: &DeliveryFilter,
    definitions: &'a DeliveryConfiguration,
    diagnostics: &mut Diagnostics,
) -> Vec<&'a NodeConfig> {
    let names = retain_known(&domain.name, "node", &domain.nodes, &filter.nodes, diagnostics);
    let domain_nodes: Vec<&NodeConfig> = definitions
        .nodes
        .iter()
        .filter(|n| domain.nodes.contains(&n.name))
        .collect();

    for label in &filter.labels {
        if !domain_nodes.iter().any(|n| n.has_label(label)) {
            diagnostics.warn(format!(
                "label '{label}' is not used by any node of the '{}' domain",
                domain.name
            ));
        }
    }

    domain_nodes
        .into_iter()
        .filter(|n| names.contains(&n.name))
        .filter(|n| filter.labels.is_empty() || filter.labels.iter().any(|l| n.has_label(l)))
        .collect()
}

/// Keeps the requested names that belong to `allowed`, warning about the others.
///
/// An empty request selects everything allowed.
fn retain_known(
    domain: &str,
    kind: &str,
    allowed: &[String],
    requested: &[String],
    diagnostics: &mut Diagnostics,
) -> Vec<String> {
    if requested.is_empty() {
        return allowed.to_vec();
    }

    let mut known = Vec::new();
    for name in requested {
        if allowed.contains(name) {
            known.push(name.clone());
        } else {
            diagnostics.warn(format!("{kind} '{name}' is not a part of the '{domain}' domain"));
        }
    }
    known
}
