//! Reader for delivery definitions stored in a project root.
//!
//! A project root holds one directory per entity kind (`domains/`, `nodes/`,
//! `services/` and the optional `solutions/`), each containing one JSON or
//! YAML file per entity. The file stem is the entity name.

use crate::error::{ConfigError, DeliveryError, NormalizeError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::model::{DeliveryConfiguration, GuardedValue, Service, ServiceSettings};
use super::normalizer::{
    expect_object, normalize_domain, normalize_node, normalize_service, normalize_solution,
    value_kind,
};

/// Environment variable naming the project root.
pub const ENV_PROJECT_ROOT: &str = "BRIDGE_PROJECT_ROOT";
/// Environment variable providing the default node user.
pub const ENV_USER: &str = "BRIDGE_USER";
/// Environment variable providing the default node password.
pub const ENV_PASSWORD: &str = "BRIDGE_PASSWORD";

/// Directory holding domain definitions.
pub const DOMAINS_DIR: &str = "domains";
/// Directory holding node definitions.
pub const NODES_DIR: &str = "nodes";
/// Directory holding service definitions.
pub const SERVICES_DIR: &str = "services";
/// Directory holding solution definitions.
pub const SOLUTIONS_DIR: &str = "solutions";

/// Suffix of the per-service directory holding settings documents.
const SETTINGS_DIR_SUFFIX: &str = ".settings";

/// Document formats accepted for definition files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFormat {
    Json,
    Yaml,
}

/// Reads and normalizes the definitions of a project root.
#[derive(Debug, Clone)]
pub struct ConfigParser {
    /// Root directory of the configuration.
    root: PathBuf,
}

impl ConfigParser {
    /// Creates a parser for the given project root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root }
    }

    /// Returns the project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads every definition under the project root.
    ///
    /// # Errors
    ///
    /// Returns an error if a required directory is missing, a file cannot be
    /// parsed, or a definition violates a structural rule. The first failure
    /// aborts the read.
    pub async fn read_definitions(&self) -> Result<DeliveryConfiguration> {
        info!("Reading delivery definitions from: {}", self.root.display());

        let root = self.root.as_path();
        let (domains, nodes, services, solutions) = tokio::try_join!(
            read_entities(root.join(DOMAINS_DIR), false, normalize_domain),
            read_entities(root.join(NODES_DIR), false, normalize_node),
            read_entities(root.join(SERVICES_DIR), false, |name, raw| {
                normalize_service(name, raw, root)
            }),
            read_entities(root.join(SOLUTIONS_DIR), true, normalize_solution),
        )?;

        let mut services = services;
        for service in &mut services {
            self.load_settings_documents(service).await?;
        }

        info!(
            "Read {} domains, {} nodes, {} services, {} solutions",
            domains.len(),
            nodes.len(),
            services.len(),
            solutions.len()
        );

        Ok(DeliveryConfiguration {
            domains,
            nodes,
            solutions,
            services,
        })
    }

    /// Replaces settings file references by the documents they name.
    async fn load_settings_documents(&self, service: &mut Service) -> Result<()> {
        let ServiceSettings::Documents(documents) = &mut service.settings else {
            return Ok(());
        };

        let dir = self
            .root
            .join(SERVICES_DIR)
            .join(format!("{}{SETTINGS_DIR_SUFFIX}", service.name));

        for document in documents.iter_mut() {
            load_settings_document(&dir, document).await?;
        }
        Ok(())
    }

    /// Loads the `.env` file of the project root if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self.root.join(".env");

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ConfigError::parse(&env_path, format!("Failed to load .env file: {e}"))
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Gets the default node credentials from the environment.
    #[must_use]
    pub fn default_credentials() -> (Option<String>, Option<String>) {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        (non_empty(ENV_USER), non_empty(ENV_PASSWORD))
    }
}

/// Reads and normalizes every entity file of one directory.
async fn read_entities<T, F>(dir: PathBuf, optional: bool, normalize: F) -> Result<Vec<T>>
where
    F: Fn(&str, &Value) -> std::result::Result<T, NormalizeError>,
{
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if optional {
                debug!("Optional directory not found: {}", dir.display());
                return Ok(Vec::new());
            }
            return Err(ConfigError::FileNotFound { path: dir }.into());
        }
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && document_format(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();

    let mut result = Vec::with_capacity(files.len());
    for path in files {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let raw = read_document(&path).await?;
        expect_object("definition", &raw).map_err(|e| ConfigError::invalid(&path, e))?;
        debug!("Normalizing {}", path.display());
        result.push(normalize(name, &raw).map_err(|e| ConfigError::invalid(&path, e))?);
    }
    Ok(result)
}

async fn load_settings_document(dir: &Path, document: &mut GuardedValue) -> Result<()> {
    let file = match &document.value {
        Value::String(file) => file.clone(),
        Value::Object(_) => return Ok(()),
        other => {
            return Err(DeliveryError::from(ConfigError::invalid(
                dir,
                NormalizeError::SettingsFileNotObject {
                    file: format!("<{}>", value_kind(other)),
                },
            )));
        }
    };

    let path = dir.join(&file);
    let loaded = read_document(&path).await?;
    if !loaded.is_object() {
        return Err(
            ConfigError::invalid(&path, NormalizeError::SettingsFileNotObject { file }).into(),
        );
    }

    debug!("Loaded settings document {}", path.display());
    document.value = loaded;
    Ok(())
}

/// Reads a JSON or YAML document into a value tree.
async fn read_document(path: &Path) -> Result<Value> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        Err(e) => return Err(ConfigError::parse(path, format!("Failed to read file: {e}")).into()),
    };

    parse_document(&content, path)
}

/// Parses document content according to the file extension.
///
/// Files without a recognized extension are parsed as JSON.
///
/// # Errors
///
/// Returns an error if the content is not valid for its format.
pub fn parse_document(content: &str, path: &Path) -> Result<Value> {
    let value = match document_format(path).unwrap_or(DocumentFormat::Json) {
        DocumentFormat::Json => serde_json::from_str(content)
            .map_err(|e| ConfigError::parse(path, format!("JSON parse error: {e}")))?,
        DocumentFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| ConfigError::parse(path, format!("YAML parse error: {e}")))?,
    };
    Ok(value)
}

fn document_format(path: &Path) -> Option<DocumentFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Some(DocumentFormat::Json),
        Some("yaml" | "yml") => Some(DocumentFormat::Yaml),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::ServiceType;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn minimal_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "domains/local.json", r#"{"nodes": "localhost", "services": ["Hello"]}"#);
        write(root, "nodes/localhost.yaml", "location: localhost:11186\nlabel: dev\n");
        write(
            root,
            "services/Hello.json",
            r#"{"type": "xUML", "repository": "Hello.rep", "settings": {"Greeting": "Hi"}}"#,
        );
        write(root, "services/README.md", "not a definition");
        dir
    }

    #[tokio::test]
    async fn test_read_minimal_project() {
        let dir = minimal_project();
        let config = ConfigParser::new(dir.path()).read_definitions().await.unwrap();

        assert_eq!(config.domains.len(), 1);
        assert_eq!(config.domains[0].name, "local");
        assert_eq!(config.nodes[0].name, "localhost");
        assert_eq!(config.nodes[0].location.port, 11186);
        assert!(config.solutions.is_empty());

        let service = config.service("Hello").unwrap();
        assert_eq!(service.service_type, ServiceType::Xuml);
        assert!(service.repository.ends_with("repositories/Hello.rep"));
        assert!(service.repository.is_absolute());
    }

    #[tokio::test]
    async fn test_missing_required_directory() {
        let dir = minimal_project();
        std::fs::remove_dir_all(dir.path().join("nodes")).unwrap();

        let err = ConfigParser::new(dir.path()).read_definitions().await.unwrap_err();
        assert!(matches!(
            err,
            DeliveryError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_normalize_error_names_file() {
        let dir = minimal_project();
        write(dir.path(), "nodes/broken.json", r#"{"label": "x"}"#);

        let err = ConfigParser::new(dir.path()).read_definitions().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("broken.json: Missing 'location' field."), "{message}");
    }

    #[tokio::test]
    async fn test_settings_documents_loaded() {
        let dir = minimal_project();
        write(
            dir.path(),
            "services/Api.json",
            r#"{"type": "node", "repository": "Api.zip",
                "settings": [{"domain": "local", "value": "local.json"}, "default.yaml"]}"#,
        );
        write(dir.path(), "services/Api.settings/local.json", r#"{"port": 3000}"#);
        write(dir.path(), "services/Api.settings/default.yaml", "port: 80\nlog.level: info\n");

        let config = ConfigParser::new(dir.path()).read_definitions().await.unwrap();
        let ServiceSettings::Documents(documents) = &config.service("Api").unwrap().settings else {
            panic!("expected document settings");
        };
        assert_eq!(documents[0].value, json!({"port": 3000}));
        assert_eq!(documents[1].value, json!({"port": 80, "log.level": "info"}));
    }

    #[tokio::test]
    async fn test_settings_document_must_be_object() {
        let dir = minimal_project();
        write(
            dir.path(),
            "services/Api.json",
            r#"{"type": "node", "repository": "Api.zip", "settings": ["list.json"]}"#,
        );
        write(dir.path(), "services/Api.settings/list.json", "[1, 2]");

        let err = ConfigParser::new(dir.path()).read_definitions().await.unwrap_err();
        assert!(err.to_string().contains("Settings file 'list.json' must contain an object"));
    }

    #[test]
    fn test_parse_document_formats() {
        let value = parse_document("a: 1\nb: [x, y]\n", Path::new("n.yml")).unwrap();
        assert_eq!(value, json!({"a": 1, "b": ["x", "y"]}));

        let err = parse_document("{not json", Path::new("n.json")).unwrap_err();
        assert!(err.to_string().contains("JSON parse error"));
    }
}
