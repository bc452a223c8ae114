//! Planning module for deliveries.
//!
//! This module turns canonical definitions into a delivery tree, narrows it
//! to what an invocation asked for, derives per-node task lists and runs
//! them against the nodes.

mod diagnostics;
mod executor;
mod filter;
pub mod path;
mod plan;
mod resolver;
mod tree;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use executor::{
    ExecutionOptions, NodeSchedule, ServiceReport, TaskOutcome, TaskStatus, execute_node_task_list,
    plan_node_task_list,
};
pub use filter::{DeliveryFilter, filter_delivery_tree};
pub use plan::{
    NodeConnection, NodeTaskList, ServiceTaskGroup, Task, TaskAction, TaskKind,
    transform_service_to_task_group, transform_to_task_list,
};
pub use resolver::{
    ResolutionContext, calculate_value_score, select_best_value, select_guarded_values,
};
pub use tree::{
    DeliveryTree, DomainDeliveryTree, NodeDeliveryTree, ResolvedService, create_delivery_tree,
    create_domain_delivery_tree, create_node_delivery_tree, create_service_delivery_tree,
    create_solution_delivery_tree, merge_domain_delivery_tree,
};
