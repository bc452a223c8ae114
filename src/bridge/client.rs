//! Bridge management API client implementation.
//!
//! This module provides the HTTP client for the REST API every Bridge node
//! exposes under `/bridge/rest`. Nodes use self-signed certificates, so
//! certificate validation is disabled.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url, multipart};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::types::{
    BRIDGE_REST_API_BASE, StatusAction, XumlSettingValue, XumlSettings, XumlSettingsUpdate,
    deployment_query, merge_objects, service_kind_segment,
};
use super::{ClientFactory, ManagementClient};
use crate::config::options::DeploymentOptions;
use crate::config::{ServiceType, value_kind};
use crate::error::BridgeError;
use crate::planner::NodeConnection;

/// Default request timeout in seconds. Uploads of large repositories take a while.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Bridge management API client for one node.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    /// HTTP client.
    client: Client,
    /// REST API base URL of the node.
    base_url: Url,
    /// Basic auth user.
    user: Option<String>,
    /// Basic auth password.
    password: Option<String>,
}

impl BridgeClient {
    /// Creates a client for a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(node: &NodeConnection) -> BridgeResult<Self> {
        let base_url = format!("{}{BRIDGE_REST_API_BASE}", node.location.base_url());
        Self::with_base_url(&base_url, node.user.clone(), node.password.clone())
    }

    /// Creates a client for an explicit REST API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn with_base_url(
        base_url: &str,
        user: Option<String>,
        password: Option<String>,
    ) -> BridgeResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BridgeError::usage(format!("Invalid URL '{base_url}': {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| {
                BridgeError::network(
                    base_url.as_str(),
                    format!("Failed to create HTTP client: {e}"),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            user,
            password,
        })
    }

    /// Builds the URL of an endpoint below the API base.
    fn endpoint(&self, segments: &[&str]) -> BridgeResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BridgeError::usage(format!("'{}' cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn service_endpoint(
        &self,
        service_type: ServiceType,
        name: &str,
        resource: &str,
    ) -> BridgeResult<Url> {
        self.endpoint(&["services", service_kind_segment(service_type), name, resource])
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.user {
            Some(user) => builder.basic_auth(user, self.password.as_ref()),
            None => builder,
        }
    }

    /// Sends a request, turning anything but 200 into an error.
    async fn send(&self, builder: RequestBuilder) -> BridgeResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| {
                BridgeError::network(self.base_url.as_str(), format!("Request failed: {e}"))
            })?;

        let status = response.status();
        trace!("Bridge answered {status}");
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::api_error(status.as_u16(), body));
        }
        Ok(response)
    }

    async fn get_json(&self, url: Url) -> BridgeResult<Value> {
        debug!("GET {url}");
        let response = self.send(self.request(Method::GET, url)).await?;
        response.json().await.map_err(|e| BridgeError::InvalidResponse {
            message: format!("Failed to parse response: {e}"),
        })
    }

    async fn put_json(&self, url: Url, body: &impl serde::Serialize) -> BridgeResult<()> {
        debug!("PUT {url}");
        self.send(self.request(Method::PUT, url).json(body)).await?;
        Ok(())
    }

    /// Builds the settings document sent for an xUML service.
    fn xuml_settings_update(
        current: Value,
        changes: &Map<String, Value>,
    ) -> BridgeResult<XumlSettingsUpdate> {
        let current: XumlSettings =
            serde_json::from_value(current).map_err(|e| BridgeError::InvalidResponse {
                message: format!("Unexpected settings format: {e}"),
            })?;

        let mut setting = Vec::with_capacity(changes.len());
        for (id, value) in changes {
            if !current.setting.iter().any(|s| &s.id == id) {
                return Err(BridgeError::usage(format!("Setting '{id}' is unknown to the Bridge.")));
            }
            setting.push(XumlSettingValue {
                id: id.clone(),
                current_value: value.clone(),
            });
        }
        Ok(XumlSettingsUpdate { setting })
    }
}

#[async_trait]
impl ManagementClient for BridgeClient {
    async fn deploy_service(
        &self,
        repository: &Path,
        options: &DeploymentOptions,
    ) -> BridgeResult<()> {
        let filesystem_error = |message: String| BridgeError::Filesystem {
            path: repository.to_path_buf(),
            message,
        };

        let metadata = tokio::fs::metadata(repository)
            .await
            .map_err(|e| filesystem_error(e.to_string()))?;
        if metadata.is_dir() {
            return Err(BridgeError::usage(format!(
                "{} is a directory; only packaged repositories can be deployed",
                repository.display()
            )));
        }

        let content = tokio::fs::read(repository)
            .await
            .map_err(|e| filesystem_error(e.to_string()))?;
        let file_name = repository
            .file_name()
            .map_or_else(|| String::from("repository.zip"), |n| n.to_string_lossy().into_owned());

        let mut part = multipart::Part::bytes(content).file_name(file_name);
        if repository.extension().is_some_and(|e| e == "rep") {
            part = part
                .mime_str("application/zip")
                .map_err(|e| BridgeError::usage(format!("Invalid content type: {e}")))?;
        }

        let url = self.endpoint(&["services"])?;
        debug!("POST {url} ({})", repository.display());
        let builder = self
            .request(Method::POST, url)
            .query(&deployment_query(options))
            .multipart(multipart::Form::new().part("uploadFile", part));
        self.send(builder).await?;
        Ok(())
    }

    async fn set_service_settings(
        &self,
        name: &str,
        service_type: ServiceType,
        settings: &Map<String, Value>,
    ) -> BridgeResult<()> {
        let url = self.service_endpoint(service_type, name, "settings")?;
        let current = self.get_json(url.clone()).await?;

        if service_type == ServiceType::Xuml {
            let update = Self::xuml_settings_update(current, settings)?;
            self.put_json(url, &update).await
        } else {
            let mut merged = match current {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            merge_objects(&mut merged, settings);
            self.put_json(url, &merged).await
        }
    }

    async fn set_service_preferences(
        &self,
        name: &str,
        service_type: ServiceType,
        preferences: &Map<String, Value>,
    ) -> BridgeResult<()> {
        let url = self.service_endpoint(service_type, name, "preferences")?;
        let Value::Object(mut current) = self.get_json(url.clone()).await? else {
            return Err(BridgeError::InvalidResponse {
                message: String::from("Preferences are not an object"),
            });
        };

        for (key, value) in preferences {
            let Some(existing) = current.get(key) else {
                return Err(BridgeError::usage(format!(
                    "Property '{key}' is unknown to the Bridge."
                )));
            };
            if value_kind(existing) != value_kind(value) {
                return Err(BridgeError::usage(format!("Property '{key}' has a wrong type.")));
            }
        }

        current.extend(preferences.clone());
        self.put_json(url, &current).await
    }

    async fn set_service_status(
        &self,
        action: StatusAction,
        name: &str,
        service_type: ServiceType,
    ) -> BridgeResult<()> {
        let url = self.service_endpoint(service_type, name, action.as_str())?;
        debug!("PUT {url}");
        self.send(self.request(Method::PUT, url)).await?;
        Ok(())
    }
}

/// Creates [`BridgeClient`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct BridgeClientFactory;

impl ClientFactory for BridgeClientFactory {
    fn create(&self, node: &NodeConnection) -> BridgeResult<Arc<dyn ManagementClient>> {
        Ok(Arc::new(BridgeClient::new(node)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{basic_auth, body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> BridgeClient {
        BridgeClient::with_base_url(
            &format!("{}{BRIDGE_REST_API_BASE}", server.uri()),
            Some(String::from("admin")),
            Some(String::from("secret")),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_deploy_uploads_repository() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bridge/rest/services"))
            .and(query_param("overwrite", "true"))
            .and(query_param("startup", "false"))
            .and(basic_auth("admin", "secret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let repository = dir.path().join("Hello.rep");
        std::fs::write(&repository, b"PK\x03\x04").unwrap();

        let mut options = DeploymentOptions::new();
        options.insert(String::from("overwrite"), json!(true));
        options.insert(String::from("startup"), json!(false));

        client(&server).await.deploy_service(&repository, &options).await.unwrap();
    }

    #[tokio::test]
    async fn test_deploy_rejects_missing_file() {
        let server = MockServer::start().await;
        let err = client(&server)
            .await
            .deploy_service(Path::new("/nonexistent/Hello.rep"), &DeploymentOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Filesystem { .. }));
    }

    #[tokio::test]
    async fn test_xuml_settings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bridge/rest/services/xuml/Hello/settings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "setting": [
                    {"id": "Greeting", "currentValue": "Hi"},
                    {"id": "Timeout", "currentValue": 1}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/bridge/rest/services/xuml/Hello/settings"))
            .and(body_json(json!({"setting": [{"id": "Greeting", "currentValue": "Hello"}]})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).await;
        let mut settings = Map::new();
        settings.insert(String::from("Greeting"), json!("Hello"));
        client
            .set_service_settings("Hello", ServiceType::Xuml, &settings)
            .await
            .unwrap();

        settings.insert(String::from("Unknown"), json!(1));
        let err = client
            .set_service_settings("Hello", ServiceType::Xuml, &settings)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Usage error: Setting 'Unknown' is unknown to the Bridge.");
    }

    #[tokio::test]
    async fn test_node_settings_are_merged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bridge/rest/services/nodejs/Api/settings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"db": {"host": "a", "port": 1}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/bridge/rest/services/nodejs/Api/settings"))
            .and(body_json(json!({"db": {"host": "b", "port": 1}})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut settings = Map::new();
        settings.insert(String::from("db"), json!({"host": "b"}));
        client(&server)
            .await
            .set_service_settings("Api", ServiceType::Node, &settings)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_preferences_checked_and_merged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bridge/rest/services/java/Calc/preferences"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "automaticStartup": false,
                "logLevel": "Info"
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/bridge/rest/services/java/Calc/preferences"))
            .and(body_json(json!({"automaticStartup": true, "logLevel": "Info"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).await;
        let mut preferences = Map::new();
        preferences.insert(String::from("automaticStartup"), json!(true));
        client
            .set_service_preferences("Calc", ServiceType::Java, &preferences)
            .await
            .unwrap();

        preferences.insert(String::from("logLevel"), json!(3));
        let err = client
            .set_service_preferences("Calc", ServiceType::Java, &preferences)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Usage error: Property 'logLevel' has a wrong type.");
    }

    #[tokio::test]
    async fn test_status_and_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/bridge/rest/services/xuml/Hello/start"))
            .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/bridge/rest/services/nodejs/Api/kill"))
            .respond_with(ResponseTemplate::new(400).set_body_string("not supported"))
            .mount(&server)
            .await;

        let client = client(&server).await;
        client
            .set_service_status(StatusAction::Start, "Hello", ServiceType::Xuml)
            .await
            .unwrap();

        let err = client
            .set_service_status(StatusAction::Kill, "Api", ServiceType::Node)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::ApiRequestFailed { status: 400, ref message } if message == "not supported"
        ));
    }
}
