//! Deployment option vocabulary.
//!
//! Services may only override options the Bridge knows about. Options with a
//! default also fix the type every override must have.

use serde_json::{Map, Value};

/// Resolved deployment options, as sent to the Bridge.
pub type DeploymentOptions = Map<String, Value>;

/// Start the service after deployment.
pub const STARTUP: &str = "startup";
/// Replace an already deployed service.
pub const OVERWRITE: &str = "overwrite";
/// Overwrite the preferences of an already deployed service.
pub const OVERWRITE_PREFS: &str = "overwritePrefs";
/// Run `npm install` for Node.js services.
pub const NPM_INSTALL: &str = "npmInstall";
/// Run npm scripts for Node.js services.
pub const RUN_SCRIPTS: &str = "runScripts";
/// Deploy under a different instance name.
pub const INSTANCE_NAME: &str = "instanceName";
/// Keep `node_modules` of the previous deployment.
pub const PRESERVE_NODE_MODULES: &str = "preserveNodeModules";
/// Timeout for stopping the previous deployment.
pub const STOP_TIMEOUT: &str = "stopTimeout";
/// Allow killing the previous deployment if it does not stop.
pub const ALLOW_KILL: &str = "allowKill";

/// One known deployment option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentOptionSpec {
    /// Option name.
    pub name: &'static str,
    /// Bridge default, if the option has one.
    pub default: Option<bool>,
}

/// All options the Bridge accepts, in documentation order.
pub const KNOWN_DEPLOYMENT_OPTIONS: &[DeploymentOptionSpec] = &[
    DeploymentOptionSpec { name: STARTUP, default: Some(false) },
    DeploymentOptionSpec { name: OVERWRITE, default: Some(false) },
    DeploymentOptionSpec { name: OVERWRITE_PREFS, default: Some(false) },
    DeploymentOptionSpec { name: NPM_INSTALL, default: Some(false) },
    DeploymentOptionSpec { name: RUN_SCRIPTS, default: Some(false) },
    DeploymentOptionSpec { name: INSTANCE_NAME, default: None },
    DeploymentOptionSpec { name: PRESERVE_NODE_MODULES, default: Some(false) },
    DeploymentOptionSpec { name: STOP_TIMEOUT, default: None },
    DeploymentOptionSpec { name: ALLOW_KILL, default: Some(false) },
];

/// Looks up a known option.
#[must_use]
pub fn find_option(name: &str) -> Option<&'static DeploymentOptionSpec> {
    KNOWN_DEPLOYMENT_OPTIONS.iter().find(|o| o.name == name)
}

/// Returns the quoted list of known option names, for error messages.
#[must_use]
pub fn known_option_names() -> String {
    quoted_list(KNOWN_DEPLOYMENT_OPTIONS.iter().map(|o| o.name))
}

/// Returns the options a delivery starts from before service overrides.
///
/// Deliveries overwrite existing deployments and start them unless told otherwise.
#[must_use]
pub fn delivery_defaults() -> DeploymentOptions {
    let mut options: DeploymentOptions = KNOWN_DEPLOYMENT_OPTIONS
        .iter()
        .filter_map(|o| o.default.map(|d| (o.name.to_string(), Value::Bool(d))))
        .collect();
    options.insert(OVERWRITE.to_string(), Value::Bool(true));
    options.insert(STARTUP.to_string(), Value::Bool(true));
    options
}

/// Formats names as `'a','b','c'`.
pub(crate) fn quoted_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names
        .into_iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(",")
}
