//! RESTCONF (RFC 8040) session seam and its reqwest implementation.

use async_trait::async_trait;
use ibn_protocol::{Credentials, ModelRef};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;

use crate::config::TransportConfig;
use crate::error::{TransportError, TransportResult};

/// RESTCONF media type.
pub const YANG_DATA_JSON: &str = "application/yang-data+json";
/// YANG library resource listing implemented modules.
pub const MODULES_STATE_PATH: &str = "ietf-yang-library:modules-state";

#[async_trait]
pub trait RestconfSession: Send + Sync {
    /// Modules from the device's YANG library.
    async fn get_modules(&self) -> TransportResult<Vec<ModelRef>>;

    /// `path` is relative to `{root}/data`.
    async fn get_config(&self, path: &str) -> TransportResult<Value>;

    async fn put_config(&self, path: &str, body: &Value) -> TransportResult<()>;

    async fn patch_config(&self, path: &str, body: &Value) -> TransportResult<()>;

    async fn post_config(&self, path: &str, body: &Value) -> TransportResult<()>;

    async fn delete_config(&self, path: &str) -> TransportResult<()>;

    /// Invoke `{root}/operations/{name}`.
    async fn call_rpc(&self, name: &str, input: Option<&Value>) -> TransportResult<Value>;

    async fn close(&self) -> TransportResult<()>;
}

#[derive(Debug, Deserialize)]
struct ModulesStateDoc {
    #[serde(rename = "ietf-yang-library:modules-state")]
    modules_state: ModulesState,
}

#[derive(Debug, Deserialize)]
struct ModulesState {
    #[serde(default)]
    module: Vec<LibraryModule>,
}

#[derive(Debug, Deserialize)]
struct LibraryModule {
    name: String,
    #[serde(default)]
    revision: String,
}

/// RESTCONF over HTTPS with optional basic auth.
pub struct HttpRestconfClient {
    client: reqwest::Client,
    /// `https://host:port/restconf`
    root: String,
    credentials: Option<Credentials>,
}

impl HttpRestconfClient {
    pub fn new(
        root: impl Into<String>,
        credentials: Option<Credentials>,
        config: &TransportConfig,
    ) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.rpc_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            root: root.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn data_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            format!("{}/data", self.root)
        } else {
            format!("{}/data/{}", self.root, path)
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let rb = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, YANG_DATA_JSON)
            .header(reqwest::header::CONTENT_TYPE, YANG_DATA_JSON);
        match &self.credentials {
            Some(c) => rb.basic_auth(&c.username, Some(&c.password)),
            None => rb,
        }
    }

    async fn send(&self, rb: RequestBuilder) -> TransportResult<Response> {
        let resp = rb.send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(TransportError::Http(format!("{status}: {}", body.trim())))
        }
    }

    async fn json_body(resp: Response) -> TransportResult<Value> {
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| TransportError::Protocol(format!("invalid RESTCONF JSON: {e}")))
    }

    async fn write(&self, method: Method, path: &str, body: &Value) -> TransportResult<()> {
        let url = self.data_url(path);
        tracing::debug!(method = %method, url = %url, "restconf write");
        self.send(self.request(method, &url).json(body)).await?;
        Ok(())
    }
}

#[async_trait]
impl RestconfSession for HttpRestconfClient {
    async fn get_modules(&self) -> TransportResult<Vec<ModelRef>> {
        let resp = self
            .send(self.request(Method::GET, &self.data_url(MODULES_STATE_PATH)))
            .await?;
        let doc: ModulesStateDoc = resp
            .json()
            .await
            .map_err(|e| TransportError::Protocol(format!("invalid YANG library document: {e}")))?;
        Ok(doc
            .modules_state
            .module
            .into_iter()
            .map(|m| ModelRef {
                name: m.name,
                revision: Some(m.revision).filter(|r| !r.is_empty()),
            })
            .collect())
    }

    async fn get_config(&self, path: &str) -> TransportResult<Value> {
        let resp = self
            .send(self.request(Method::GET, &self.data_url(path)))
            .await?;
        Self::json_body(resp).await
    }

    async fn put_config(&self, path: &str, body: &Value) -> TransportResult<()> {
        self.write(Method::PUT, path, body).await
    }

    async fn patch_config(&self, path: &str, body: &Value) -> TransportResult<()> {
        self.write(Method::PATCH, path, body).await
    }

    async fn post_config(&self, path: &str, body: &Value) -> TransportResult<()> {
        self.write(Method::POST, path, body).await
    }

    async fn delete_config(&self, path: &str) -> TransportResult<()> {
        self.send(self.request(Method::DELETE, &self.data_url(path)))
            .await?;
        Ok(())
    }

    async fn call_rpc(&self, name: &str, input: Option<&Value>) -> TransportResult<Value> {
        let url = format!("{}/operations/{}", self.root, name);
        let mut rb = self.request(Method::POST, &url);
        if let Some(input) = input {
            let key = match name.split_once(':') {
                Some((module, _)) => format!("{module}:input"),
                None => "input".to_string(),
            };
            let mut body = serde_json::Map::new();
            body.insert(key, input.clone());
            rb = rb.json(&Value::Object(body));
        }
        let resp = self.send(rb).await?;
        Self::json_body(resp).await
    }

    async fn close(&self) -> TransportResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, creds: Option<Credentials>) -> HttpRestconfClient {
        HttpRestconfClient::new(
            format!("{}/restconf", server.uri()),
            creds,
            &TransportConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn lists_yang_library_modules() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/restconf/data/ietf-yang-library:modules-state"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ietf-yang-library:modules-state": {
                    "module": [
                        {"name": "openconfig-network-instance", "revision": "2021-08-24"},
                        {"name": "ietf-interfaces", "revision": ""}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let modules = client(&server, None).get_modules().await.unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].to_string(), "openconfig-network-instance@2021-08-24");
        assert!(modules[1].revision.is_none());
    }

    #[tokio::test]
    async fn sends_basic_auth_and_media_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/restconf/data/openconfig-interfaces:interfaces"))
            .and(header("authorization", "Basic YWRtaW46YWRtaW4="))
            .and(header("accept", YANG_DATA_JSON))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"interface": []})))
            .mount(&server)
            .await;

        let creds = Credentials {
            username: "admin".into(),
            password: "admin".into(),
        };
        let data = client(&server, Some(creds))
            .get_config("openconfig-interfaces:interfaces")
            .await
            .unwrap();
        assert_eq!(data, json!({"interface": []}));
    }

    #[tokio::test]
    async fn error_status_maps_to_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/restconf/data"))
            .respond_with(ResponseTemplate::new(400).set_body_string("malformed message"))
            .mount(&server)
            .await;

        let err = client(&server, None)
            .patch_config("", &json!({"a": 1}))
            .await
            .unwrap_err();
        match err {
            TransportError::Http(msg) => {
                assert!(msg.contains("400"));
                assert!(msg.contains("malformed message"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn rpc_wraps_input_in_module_namespace() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/restconf/operations/example-ops:reboot"))
            .and(body_json(json!({"example-ops:input": {"delay": 5}})))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let out = client(&server, None)
            .call_rpc("example-ops:reboot", Some(&json!({"delay": 5})))
            .await
            .unwrap();
        assert_eq!(out, Value::Null);
    }

    #[tokio::test]
    async fn delete_succeeds_on_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/restconf/data/ietf-l3vpn-svc:l3vpn-svc/vpn-services/vpn-service=RED"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, None)
            .delete_config("/ietf-l3vpn-svc:l3vpn-svc/vpn-services/vpn-service=RED")
            .await
            .unwrap();
    }
}
