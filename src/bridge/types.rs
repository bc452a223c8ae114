//! Bridge management API types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ServiceType;
use crate::config::options::DeploymentOptions;

/// Base path of the REST API on every node.
pub const BRIDGE_REST_API_BASE: &str = "/bridge/rest";

/// Runtime status changes of a deployed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    /// Start the service.
    Start,
    /// Stop the service.
    Stop,
    /// Kill the service (not supported by Node.js services).
    Kill,
}

impl StatusAction {
    /// Returns the endpoint segment of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Kill => "kill",
        }
    }
}

impl std::fmt::Display for StatusAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the endpoint segment of a service kind.
#[must_use]
pub const fn service_kind_segment(service_type: ServiceType) -> &'static str {
    match service_type {
        ServiceType::Xuml => "xuml",
        ServiceType::Node => "nodejs",
        ServiceType::Java => "java",
    }
}

/// Settings of an xUML service as reported by the Bridge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XumlSettings {
    /// Known settings.
    #[serde(default)]
    pub setting: Vec<XumlSettingInfo>,
}

/// One reported xUML setting.
#[derive(Debug, Clone, Deserialize)]
pub struct XumlSettingInfo {
    /// Setting identifier.
    pub id: String,
}

/// Settings update of an xUML service.
#[derive(Debug, Clone, Serialize)]
pub struct XumlSettingsUpdate {
    /// Changed settings.
    pub setting: Vec<XumlSettingValue>,
}

/// One changed xUML setting.
#[derive(Debug, Clone, Serialize)]
pub struct XumlSettingValue {
    /// Setting identifier.
    pub id: String,
    /// New value.
    #[serde(rename = "currentValue")]
    pub current_value: Value,
}

/// Converts deployment options into query parameters.
///
/// Options without a value are left out.
#[must_use]
pub fn deployment_query(options: &DeploymentOptions) -> Vec<(String, String)> {
    options
        .iter()
        .filter_map(|(name, value)| {
            let rendered = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((name.clone(), rendered))
        })
        .collect()
}

/// Merges `changes` into `target`.
///
/// Objects are merged key by key and arrays index by index; any other
/// value is replaced.
pub fn deep_merge(target: &mut Value, changes: &Value) {
    match (target, changes) {
        (Value::Object(target), Value::Object(changes)) => merge_objects(target, changes),
        (Value::Array(target), Value::Array(changes)) => {
            for (index, change) in changes.iter().enumerate() {
                match target.get_mut(index) {
                    Some(existing) => deep_merge(existing, change),
                    None => target.push(change.clone()),
                }
            }
        }
        (target, changes) => *target = changes.clone(),
    }
}

/// Merges the entries of `changes` into `target`, recursively.
pub fn merge_objects(target: &mut Map<String, Value>, changes: &Map<String, Value>) {
    for (key, change) in changes {
        match target.get_mut(key) {
            Some(existing) => deep_merge(existing, change),
            None => {
                target.insert(key.clone(), change.clone());
            }
        }
    }
}
