//! Error types for the Bridge delivery system.
//!
//! This module provides the error hierarchy for every stage of a delivery:
//! reading and normalizing definitions, generating task lists, talking to the
//! Bridge management API and executing the delivery.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Bridge delivery system.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Task list generation errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Bridge management API errors.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Delivery execution errors.
    #[error("Delivery error: {0}")]
    Execution(#[from] ExecutionError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while reading the delivery definitions.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required file or directory was not found.
    #[error("Configuration path not found: {path}")]
    FileNotFound {
        /// Path to the missing file or directory.
        path: PathBuf,
    },

    /// A definition file could not be read or parsed.
    #[error("Failed to parse {path}: {message}")]
    ParseError {
        /// File that failed to parse.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// A definition violated a structural invariant.
    #[error("{}: {source}", path.display())]
    Invalid {
        /// File holding the offending definition.
        path: PathBuf,
        /// The violated rule.
        source: NormalizeError,
    },
}

/// Structural violations found while bringing raw definitions to canonical form.
///
/// The messages are part of the user-facing contract and are kept literal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// A string-or-array field held something else.
    #[error("expected list to be a string or an array but got {found}")]
    NotAStringOrArray {
        /// Kind of the value found.
        found: String,
    },

    /// A string-or-array field held a non-string element.
    #[error("expected list element to be a string but got {found}")]
    NonStringElement {
        /// Kind of the element found.
        found: String,
    },

    /// A domain declares no nodes.
    #[error("no nodes defined")]
    NoNodes,

    /// A domain declares neither services nor solutions.
    #[error("no services defined")]
    NoServices,

    /// A solution declares no label to service mapping.
    #[error("No services defined in solution.")]
    NoSolutionServices,

    /// A required scalar field is missing.
    #[error("Missing '{field}' field.")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A node location is not of the form `host[:port]`.
    #[error("Invalid 'location' field '{location}'. Expected host[:port].")]
    InvalidLocation {
        /// The offending location.
        location: String,
    },

    /// The service type is not one of the known kinds.
    #[error("Service type '{found}' is unknown. Use one of {allowed}")]
    UnknownServiceType {
        /// The offending type.
        found: String,
        /// Quoted, comma separated list of valid types.
        allowed: String,
    },

    /// A deployment option outside of the known vocabulary was used.
    #[error("The deployment option '{name}' is unknown. Use one of {allowed}")]
    UnknownDeploymentOption {
        /// The offending option name.
        name: String,
        /// Quoted, comma separated list of valid options.
        allowed: String,
    },

    /// A deployment option value does not match the type of its default.
    #[error("The type of deployment option '{name}' is wrong. Should be '{expected}' but found '{found}'")]
    WrongDeploymentOptionType {
        /// Option name.
        name: String,
        /// Type of the default value.
        expected: String,
        /// Type of the offending value.
        found: String,
    },

    /// A field that must be a mapping held something else.
    #[error("expected '{field}' to be an object but got {found}")]
    NotAnObject {
        /// Field name.
        field: String,
        /// Kind of the value found.
        found: String,
    },

    /// Settings given as a list for a service kind that only accepts a mapping.
    #[error("Settings given as a list are only supported for 'node' services, not '{service_type}'")]
    SettingsListNotSupported {
        /// The service type.
        service_type: String,
    },

    /// A settings file referenced by a guarded value does not hold an object.
    #[error("Settings file '{file}' must contain an object")]
    SettingsFileNotObject {
        /// The referenced file.
        file: String,
    },
}

/// Task list generation errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The delivery tree names a node with no definition.
    #[error("Node '{name}' has no definition")]
    UnknownNode {
        /// Name of the node.
        name: String,
    },
}

/// Bridge management API errors.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The HTTP request could not be performed.
    #[error("Network error communicating with {node}: {message}")]
    NetworkError {
        /// Node address.
        node: String,
        /// Description of the network error.
        message: String,
    },

    /// The Bridge answered with a non-success status.
    #[error("Bridge request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// The request was rejected before being sent.
    #[error("Usage error: {message}")]
    Usage {
        /// Description of the problem.
        message: String,
    },

    /// Reading the repository failed.
    #[error("Filesystem error for {}: {message}", path.display())]
    Filesystem {
        /// Repository path.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The Bridge answered with something that could not be understood.
    #[error("Invalid response from Bridge: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Delivery execution errors.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A task failed while break-on-error was requested.
    #[error("{service} on {node}: {task} failed: {message}")]
    TaskFailed {
        /// Node name.
        node: String,
        /// Service name.
        service: String,
        /// Task kind.
        task: String,
        /// Failure description.
        message: String,
    },

    /// The configuration produced error diagnostics.
    #[error("Configuration errors detected. Skipping execution.")]
    ConfigurationErrors {
        /// Number of error diagnostics.
        count: usize,
    },

    /// At least one service could not be delivered.
    #[error("Some delivery actions were unsuccessful.")]
    Unsuccessful {
        /// Number of failed services.
        failed: usize,
    },

    /// Obtaining credentials for a node failed.
    #[error("Cannot obtain credentials for {node}: {message}")]
    Credentials {
        /// Node name.
        node: String,
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

impl DeliveryError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl ConfigError {
    /// Wraps a normalization failure with the file it came from.
    #[must_use]
    pub fn invalid(path: impl Into<PathBuf>, source: NormalizeError) -> Self {
        Self::Invalid {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error for a file.
    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ParseError {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl BridgeError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NetworkError {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Creates a usage error.
    #[must_use]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }
}
