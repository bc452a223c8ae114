//! Guarded value resolution.
//!
//! Each candidate value is scored against a concrete (domain, node) context.
//! Every guard axis (domain, node, label) scores 0 when it is a wildcard,
//! a positive specificity when it matches, and disqualifies the candidate
//! when it does not. A matching axis contributes `10 + specificity` to the
//! total, so the number of matching axes dominates and the size of the guard
//! lists only breaks ties between equally constrained candidates.
//!
//! Candidates with equal totals are ranked by declaration order; the first
//! one wins and a warning is recorded for every other top-ranked candidate
//! holding a different value.

use serde_json::{Map, Value};

use super::diagnostics::Diagnostics;
use crate::config::{Domain, GuardedValue, GuardedValueMap, NodeConfig, Service};

/// Baseline contributed by every matching, non-wildcard axis.
const AXIS_BASELINE: f64 = 10.0;

/// Scores closer than this are equal.
const SCORE_EPSILON: f64 = 1e-9;

/// Scores one guard axis.
///
/// Returns 0 for an empty guard, `1 / len` if the guard contains the value
/// and `-1` otherwise.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn axis_score(guard: &[String], candidate: &str) -> f64 {
    if guard.is_empty() {
        0.0
    } else if guard.iter().any(|g| g == candidate) {
        1.0 / guard.len() as f64
    } else {
        -1.0
    }
}

/// Scores the label axis.
///
/// Returns 0 for an empty guard, `1 / matches` where `matches` is the number
/// of guard labels carried by the node, and `-1` if none is carried.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn label_score(guard: &[String], node_labels: &[String]) -> f64 {
    if guard.is_empty() {
        return 0.0;
    }
    let matches = guard.iter().filter(|l| node_labels.contains(l)).count();
    if matches == 0 { -1.0 } else { 1.0 / matches as f64 }
}

/// Computes the total score of a candidate, or `None` if it is disqualified.
#[must_use]
pub fn calculate_value_score(value: &GuardedValue, domain: &str, node: &NodeConfig) -> Option<f64> {
    let scores = [
        axis_score(&value.domain, domain),
        axis_score(&value.node, &node.name),
        label_score(&value.label, &node.label),
    ];

    if scores.iter().any(|s| *s < 0.0) {
        return None;
    }

    Some(
        scores
            .iter()
            .map(|s| if *s > 0.0 { AXIS_BASELINE + s } else { 0.0 })
            .sum(),
    )
}

/// Context a value is resolved in.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
    /// Domain being built.
    pub domain: &'a Domain,
    /// Node being built.
    pub node: &'a NodeConfig,
    /// Service the values belong to.
    pub service: &'a Service,
}

impl<'a> ResolutionContext<'a> {
    /// Creates a context.
    #[must_use]
    pub const fn new(domain: &'a Domain, node: &'a NodeConfig, service: &'a Service) -> Self {
        Self { domain, node, service }
    }
}

/// Picks the best candidate for one named value.
///
/// Returns `None` if no candidate applies to the context.
pub fn select_best_value(
    name: &str,
    candidates: &[GuardedValue],
    ctx: ResolutionContext<'_>,
    diagnostics: &mut Diagnostics,
) -> Option<Value> {
    let mut scored: Vec<(usize, f64, &Value)> = candidates
        .iter()
        .enumerate()
        .filter_map(|(index, c)| {
            calculate_value_score(c, &ctx.domain.name, ctx.node)
                .map(|score| (index, score, &c.value))
        })
        .collect();

    scored.sort_by(|l, r| r.1.total_cmp(&l.1).then(l.0.cmp(&r.0)));

    let (_, best_score, best) = *scored.first()?;

    for (_, score, other) in scored.iter().skip(1) {
        if (best_score - score).abs() > SCORE_EPSILON {
            break;
        }
        if *other != best {
            diagnostics.warn(format!(
                "domain '{}', service '{}': '{}': choosing {} over {} even though they both match with the same quality",
                ctx.domain.name,
                ctx.service.name,
                name,
                render_value(best),
                render_value(other),
            ));
        }
    }

    Some(best.clone())
}

/// Resolves every named value of a map, dropping the ones with no applicable candidate.
pub fn select_guarded_values(
    values: &GuardedValueMap,
    ctx: ResolutionContext<'_>,
    diagnostics: &mut Diagnostics,
) -> Map<String, Value> {
    values
        .iter()
        .filter_map(|(name, candidates)| {
            select_best_value(name, candidates, ctx, diagnostics).map(|v| (name.clone(), v))
        })
        .collect()
}

/// Renders a value for diagnostics: strings in single quotes, the rest as JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Location, ServiceSettings, ServiceType};
    use serde_json::json;

    fn domain(name: &str) -> Domain {
        Domain {
            name: name.to_string(),
            nodes: vec![String::from("n1")],
            services: vec![String::from("svc")],
            solutions: Vec::new(),
        }
    }

    fn node(name: &str, labels: &[&str]) -> NodeConfig {
        NodeConfig {
            name: name.to_string(),
            label: labels.iter().map(ToString::to_string).collect(),
            location: Location::new("localhost", 8080),
            user: None,
            password: None,
        }
    }

    fn service() -> Service {
        Service {
            name: String::from("svc"),
            service_type: ServiceType::Xuml,
            repository: "/r/svc.rep".into(),
            settings: ServiceSettings::default(),
            preferences: GuardedValueMap::new(),
            deployment_options: GuardedValueMap::new(),
        }
    }

    #[test]
    fn test_axis_scores() {
        let guard = vec![String::from("a"), String::from("b")];
        assert!((axis_score(&[], "x")).abs() < f64::EPSILON);
        assert!((axis_score(&guard, "a") - 0.5).abs() < f64::EPSILON);
        assert!((axis_score(&guard, "c") + 1.0).abs() < f64::EPSILON);

        let labels = vec![String::from("a"), String::from("b"), String::from("c")];
        assert!((label_score(&guard, &labels) - 0.5).abs() < f64::EPSILON);
        assert!((label_score(&guard, &[String::from("z")]) + 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_score_sums_matching_axes() {
        let n = node("n1", &["slave"]);
        let wildcard = GuardedValue::unguarded(json!(1));
        assert_eq!(calculate_value_score(&wildcard, "local", &n), Some(0.0));

        let guarded = GuardedValue::unguarded(json!(1))
            .in_domains(["local"])
            .with_labels(["slave"]);
        assert_eq!(calculate_value_score(&guarded, "local", &n), Some(22.0));

        let other_node = GuardedValue::unguarded(json!(1)).on_nodes(["n2"]);
        assert_eq!(calculate_value_score(&other_node, "local", &n), None);
    }

    #[test]
    fn test_domain_guard_beats_wildcard() {
        let (d, n, s) = (domain("local"), node("n1", &[]), service());
        let mut diagnostics = Diagnostics::new();
        let candidates = vec![
            GuardedValue::unguarded(json!("any")),
            GuardedValue::unguarded(json!("local-only")).in_domains(["local"]),
        ];

        let ctx = ResolutionContext::new(&d, &n, &s);
        let value = select_best_value("Greeting", &candidates, ctx, &mut diagnostics);
        assert_eq!(value, Some(json!("local-only")));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_no_applicable_candidate() {
        let (d, n, s) = (domain("prod"), node("n1", &["master"]), service());
        let mut diagnostics = Diagnostics::new();
        let candidates = vec![
            GuardedValue::unguarded(json!(1)).in_domains(["local"]),
            GuardedValue::unguarded(json!(2)).with_labels(["slave"]),
        ];

        let ctx = ResolutionContext::new(&d, &n, &s);
        let value = select_best_value("x", &candidates, ctx, &mut diagnostics);
        assert_eq!(value, None);
        assert!(select_best_value("x", &[], ctx, &mut diagnostics).is_none());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_single_candidate_no_warning() {
        let (d, n, s) = (domain("prod"), node("n1", &[]), service());
        let mut diagnostics = Diagnostics::new();
        let candidates = vec![GuardedValue::unguarded(json!(5)).on_nodes(["n1", "n2"])];

        let ctx = ResolutionContext::new(&d, &n, &s);
        let value = select_best_value("x", &candidates, ctx, &mut diagnostics);
        assert_eq!(value, Some(json!(5)));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_tie_warns_and_keeps_declaration_order() {
        let (d, n, s) = (domain("prod"), node("n1", &["a", "b"]), service());
        let candidates = vec![
            GuardedValue::unguarded(json!("first")).with_labels(["a"]),
            GuardedValue::unguarded(json!("second")).with_labels(["b"]),
            GuardedValue::unguarded(json!("first")).with_labels(["b"]),
        ];

        for _ in 0..3 {
            let mut diagnostics = Diagnostics::new();
            let ctx = ResolutionContext::new(&d, &n, &s);
            let value = select_best_value("Mode", &candidates, ctx, &mut diagnostics);
            assert_eq!(value, Some(json!("first")));
            assert_eq!(diagnostics.len(), 1);
            let message = &diagnostics.iter().next().unwrap().message;
            assert_eq!(
                message,
                "domain 'prod', service 'svc': 'Mode': choosing 'first' over 'second' even though they both match with the same quality"
            );
        }
    }

    #[test]
    fn test_select_guarded_values_drops_unresolved() {
        let (d, n, s) = (domain("prod"), node("n1", &[]), service());
        let mut values = GuardedValueMap::new();
        values.insert(String::from("kept"), vec![GuardedValue::unguarded(json!(true))]);
        values.insert(
            String::from("dropped"),
            vec![GuardedValue::unguarded(json!(true)).in_domains(["dev"])],
        );

        let mut diagnostics = Diagnostics::new();
        let ctx = ResolutionContext::new(&d, &n, &s);
        let resolved = select_guarded_values(&values, ctx, &mut diagnostics);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.get("kept"), Some(&json!(true)));
    }
}
