//! Normalization of raw definitions.
//!
//! Raw definitions are loosely typed: a list may be a single string, a
//! guarded value may be a bare scalar, settings may be a mapping or a list.
//! Everything in this module turns a parsed [`Value`] tree into the canonical
//! entities of [`super::model`], failing on the first violated rule. Nothing
//! downstream looks at the raw shape again.

use super::model::{
    Domain, GuardedValue, GuardedValueMap, Location, NodeConfig, Service, ServiceSettings,
    ServiceType, Solution,
};
use super::options::{find_option, known_option_names, quoted_list};
use crate::error::NormalizeError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

type NormalizeResult<T> = std::result::Result<T, NormalizeError>;

/// Name of the directory holding deployable repositories.
pub const REPOSITORIES_DIR: &str = "repositories";

/// Returns the kind name of a value, as used in error messages.
#[must_use]
pub const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Normalizes a string-or-array field into a list of unique strings.
///
/// A missing, null, empty or otherwise falsy value yields an empty list.
/// The first occurrence of each string is kept.
///
/// # Errors
///
/// Returns an error if the value is neither a string nor an array, or if the
/// array holds a non-string element.
pub fn make_string_array(value: Option<&Value>) -> NormalizeResult<Vec<String>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    if is_falsy(value) {
        return Ok(Vec::new());
    }

    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => {
            let mut result: Vec<String> = Vec::with_capacity(items.len());
            for item in items {
                let Value::String(s) = item else {
                    return Err(NormalizeError::NonStringElement {
                        found: value_kind(item).to_string(),
                    });
                };
                if !result.contains(s) {
                    result.push(s.clone());
                }
            }
            Ok(result)
        }
        other => Err(NormalizeError::NotAStringOrArray {
            found: value_kind(other).to_string(),
        }),
    }
}

/// Brings a raw domain to canonical form.
///
/// # Errors
///
/// Returns an error if a list field is malformed, if no node is declared, or
/// if neither services nor solutions are declared.
pub fn normalize_domain(name: &str, raw: &Value) -> NormalizeResult<Domain> {
    let domain = Domain {
        name: name.to_string(),
        nodes: make_string_array(raw.get("nodes"))?,
        services: make_string_array(raw.get("services"))?,
        solutions: make_string_array(raw.get("solutions"))?,
    };

    if domain.nodes.is_empty() {
        return Err(NormalizeError::NoNodes);
    }
    if domain.services.is_empty() && domain.solutions.is_empty() {
        return Err(NormalizeError::NoServices);
    }
    Ok(domain)
}

/// Brings a raw node to canonical form.
///
/// # Errors
///
/// Returns an error if the labels are malformed or the location is missing or
/// not of the form `host[:port]`.
pub fn normalize_node(name: &str, raw: &Value) -> NormalizeResult<NodeConfig> {
    Ok(NodeConfig {
        name: name.to_string(),
        label: make_string_array(raw.get("label"))?,
        location: parse_location(raw.get("location"))?,
        user: optional_string(raw.get("user")),
        password: optional_string(raw.get("password")),
    })
}

/// Parses a `host[:port]` location.
///
/// # Errors
///
/// Returns an error if the location is missing, empty, not a string, or has
/// an unparsable port.
pub fn parse_location(value: Option<&Value>) -> NormalizeResult<Location> {
    let location = match value {
        Some(Value::String(s)) if !s.is_empty() => s.as_str(),
        _ => return Err(NormalizeError::MissingField { field: "location" }),
    };

    let invalid = || NormalizeError::InvalidLocation {
        location: location.to_string(),
    };

    let (host, port) = match location.split_once(':') {
        Some((host, port)) => {
            let port = match port.parse::<u16>() {
                Ok(0) => Location::DEFAULT_PORT,
                Ok(p) => p,
                Err(_) if port.is_empty() => Location::DEFAULT_PORT,
                Err(_) => return Err(invalid()),
            };
            (host, port)
        }
        None => (location, Location::DEFAULT_PORT),
    };

    if host.is_empty() {
        return Err(invalid());
    }

    Ok(Location::new(host, port))
}

/// Brings a raw solution to canonical form.
///
/// Labels mapped to an empty service list are dropped.
///
/// # Errors
///
/// Returns an error if no label mapping is declared or a service list is malformed.
pub fn normalize_solution(name: &str, raw: &Value) -> NormalizeResult<Solution> {
    let entries = match raw.get("services") {
        Some(Value::Object(map)) if !map.is_empty() => map,
        _ => return Err(NormalizeError::NoSolutionServices),
    };

    let mut services = BTreeMap::new();
    for (label, value) in entries {
        let list = make_string_array(Some(value))?;
        if !list.is_empty() {
            services.insert(label.clone(), list);
        }
    }

    if services.is_empty() {
        return Err(NormalizeError::NoSolutionServices);
    }

    Ok(Solution {
        name: name.to_string(),
        services,
    })
}

/// Brings a raw service to canonical form.
///
/// The repository is resolved against `<root>/repositories`. Settings given as
/// a list keep their file references in `value`; loading those files is left
/// to the reader.
///
/// # Errors
///
/// Returns an error if the type is unknown, the repository is missing, a
/// guarded value is malformed, or a deployment option is unknown or has the
/// wrong type.
pub fn normalize_service(name: &str, raw: &Value, root: &Path) -> NormalizeResult<Service> {
    let service_type = parse_service_type(raw.get("type"))?;

    let repository = match raw.get("repository") {
        Some(Value::String(s)) if !s.is_empty() => root.join(REPOSITORIES_DIR).join(s),
        _ => return Err(NormalizeError::MissingField { field: "repository" }),
    };

    let service = Service {
        name: name.to_string(),
        service_type,
        repository,
        settings: normalize_settings(raw.get("settings"), service_type)?,
        preferences: normalize_guarded_value_map("preferences", raw.get("preferences"))?,
        deployment_options: normalize_guarded_value_map(
            "deploymentOptions",
            raw.get("deploymentOptions"),
        )?,
    };

    check_deployment_options(&service.deployment_options)?;
    Ok(service)
}

/// Parses a service type name.
///
/// # Errors
///
/// Returns an error naming the bad value and the allowed set.
pub fn parse_service_type(value: Option<&Value>) -> NormalizeResult<ServiceType> {
    let found = match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::from("undefined"),
    };

    ServiceType::from_name(&found).ok_or_else(|| NormalizeError::UnknownServiceType {
        found,
        allowed: quoted_list(ServiceType::ALL.iter().map(|t| t.as_str())),
    })
}

fn normalize_settings(
    value: Option<&Value>,
    service_type: ServiceType,
) -> NormalizeResult<ServiceSettings> {
    match value {
        Some(Value::Array(_)) if !service_type.has_document_settings() => {
            Err(NormalizeError::SettingsListNotSupported {
                service_type: service_type.to_string(),
            })
        }
        Some(value @ Value::Array(_)) => {
            Ok(ServiceSettings::Documents(normalize_guarded_values(value)?))
        }
        other => Ok(ServiceSettings::Keyed(normalize_guarded_value_map("settings", other)?)),
    }
}

/// Normalizes a mapping from name to guarded values.
///
/// # Errors
///
/// Returns an error if the value is not a mapping or holds a malformed guarded value.
pub fn normalize_guarded_value_map(
    field: &str,
    value: Option<&Value>,
) -> NormalizeResult<GuardedValueMap> {
    let map = match value {
        None => return Ok(GuardedValueMap::new()),
        Some(v) if is_falsy(v) => return Ok(GuardedValueMap::new()),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(NormalizeError::NotAnObject {
                field: field.to_string(),
                found: value_kind(other).to_string(),
            });
        }
    };

    let mut result = GuardedValueMap::new();
    for (key, raw) in map {
        result.insert(key.clone(), normalize_guarded_values(raw)?);
    }
    Ok(result)
}

/// Normalizes one value or a list of values into guarded values.
///
/// # Errors
///
/// Returns an error if a guard list is malformed.
pub fn normalize_guarded_values(value: &Value) -> NormalizeResult<Vec<GuardedValue>> {
    match value {
        Value::Array(items) => items.iter().map(normalize_guarded_value).collect(),
        single => Ok(vec![normalize_guarded_value(single)?]),
    }
}

/// Normalizes a single guarded value.
///
/// Non-objects apply everywhere. Objects contribute only their `domain`,
/// `label`, `node` and `value` keys; a missing `value` is the empty string.
///
/// # Errors
///
/// Returns an error if a guard list is malformed.
pub fn normalize_guarded_value(value: &Value) -> NormalizeResult<GuardedValue> {
    let Value::Object(map) = value else {
        return Ok(GuardedValue::unguarded(value.clone()));
    };

    Ok(GuardedValue {
        domain: make_string_array(map.get("domain"))?,
        label: make_string_array(map.get("label"))?,
        node: make_string_array(map.get("node"))?,
        value: map
            .get("value")
            .cloned()
            .unwrap_or_else(|| Value::String(String::new())),
    })
}

fn check_deployment_options(options: &GuardedValueMap) -> NormalizeResult<()> {
    for (name, values) in options {
        let Some(known) = find_option(name) else {
            return Err(NormalizeError::UnknownDeploymentOption {
                name: name.clone(),
                allowed: known_option_names(),
            });
        };

        let Some(default) = known.default else {
            continue;
        };
        let expected = value_kind(&Value::Bool(default));
        if let Some(wrong) = values.iter().find(|v| value_kind(&v.value) != expected) {
            return Err(NormalizeError::WrongDeploymentOptionType {
                name: name.clone(),
                expected: expected.to_string(),
                found: value_kind(&wrong.value).to_string(),
            });
        }
    }
    Ok(())
}

fn optional_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Returns the raw object of a parsed file.
///
/// # Errors
///
/// Returns an error if the document is not a mapping.
pub fn expect_object<'a>(field: &str, value: &'a Value) -> NormalizeResult<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| NormalizeError::NotAnObject {
        field: field.to_string(),
        found: value_kind(value).to_string(),
    })
}
