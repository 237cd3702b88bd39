//! Asynchronous Hetzner Cloud client implementation.

use crate::models::{
    Action, ActionList, ApplyToResourcesRequest, CreateFirewallRequest, CreateFirewallResponse,
    CreateSshKeyRequest, ErrorEnvelope, Firewall, FirewallList, ResourceRef, Server,
    ServerEnvelope, SshKey, SshKeyEnvelope, SshKeyList,
};
use crate::Result;
use hcloud_core::client::{ClientConfig, HttpClient, HttpClientBuilder};
use hcloud_core::config::{HcloudConfig, DEFAULT_API_URL};
use hcloud_core::ids::{FirewallId, ServerId};
use hcloud_core::query::{ListParams, MAX_PER_PAGE};
use hcloud_core::Error;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

const USER_AGENT: &str = concat!("hcloud-api/", env!("CARGO_PKG_VERSION"));

/// Builder for [`HcloudClient`].
#[derive(Debug)]
pub struct HcloudClientBuilder {
    inner: HttpClientBuilder,
    per_page: u32,
}

impl HcloudClientBuilder {
    /// Create a builder for the specified base URL.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let builder = HttpClientBuilder::new(base_url)?.with_user_agent(USER_AGENT);
        Ok(Self {
            inner: builder,
            per_page: MAX_PER_PAGE,
        })
    }

    /// Create a builder from a validated configuration.
    pub fn from_config(config: &HcloudConfig) -> Result<Self> {
        config.check()?;
        Ok(Self::new(&config.api_url)?
            .with_token(config.token())
            .with_http_config(config.client_config())
            .with_per_page(config.per_page))
    }

    /// Configure the API token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.inner = self.inner.with_token(token);
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.inner = self.inner.with_http_config(config);
        self
    }

    /// Page size used by the `list_all_*` methods.
    #[must_use]
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<HcloudClient> {
        let inner = self.inner.build()?;
        Ok(HcloudClient {
            inner,
            per_page: self.per_page,
        })
    }
}

/// Asynchronous Hetzner Cloud client.
#[derive(Debug, Clone)]
pub struct HcloudClient {
    inner: HttpClient,
    per_page: u32,
}

impl HcloudClient {
    /// Construct a client for the production endpoint.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        HcloudClientBuilder::new(DEFAULT_API_URL)?
            .with_token(token)
            .build()
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        self.inner.base_url()
    }

    /// List one page of SSH keys.
    pub async fn list_ssh_keys(&self, params: &ListParams) -> Result<SshKeyList> {
        self.send_json::<(), SshKeyList>(Method::GET, "ssh_keys", None, &params.to_pairs())
            .await
    }

    /// List every SSH key in the project, following pagination.
    pub async fn list_all_ssh_keys(&self) -> Result<Vec<SshKey>> {
        let mut params = ListParams::first_page(self.per_page);
        let mut keys = Vec::new();
        loop {
            let page = self.list_ssh_keys(&params).await?;
            keys.extend(page.ssh_keys);
            match advance(&params, page.meta.next_page()) {
                Some(next) => params.page = Some(next),
                None => break,
            }
        }
        debug!(count = keys.len(), "listed SSH keys");
        Ok(keys)
    }

    /// Create an SSH key.
    pub async fn create_ssh_key(&self, request: &CreateSshKeyRequest) -> Result<SshKey> {
        self.send_json::<_, SshKeyEnvelope>(Method::POST, "ssh_keys", Some(request), &[])
            .await
            .map(|envelope| envelope.ssh_key)
    }

    /// List one page of firewalls.
    pub async fn list_firewalls(&self, params: &ListParams) -> Result<FirewallList> {
        self.send_json::<(), FirewallList>(Method::GET, "firewalls", None, &params.to_pairs())
            .await
    }

    /// List every firewall in the project, following pagination.
    pub async fn list_all_firewalls(&self) -> Result<Vec<Firewall>> {
        let mut params = ListParams::first_page(self.per_page);
        let mut firewalls = Vec::new();
        loop {
            let page = self.list_firewalls(&params).await?;
            firewalls.extend(page.firewalls);
            match advance(&params, page.meta.next_page()) {
                Some(next) => params.page = Some(next),
                None => break,
            }
        }
        debug!(count = firewalls.len(), "listed firewalls");
        Ok(firewalls)
    }

    /// Create a firewall.
    pub async fn create_firewall(
        &self,
        request: &CreateFirewallRequest,
    ) -> Result<CreateFirewallResponse> {
        self.send_json(Method::POST, "firewalls", Some(request), &[])
            .await
    }

    /// Apply a firewall to the given resources.
    pub async fn apply_firewall_to_resources(
        &self,
        firewall: FirewallId,
        resources: &[ResourceRef],
    ) -> Result<Vec<Action>> {
        let path = format!("firewalls/{firewall}/actions/apply_to_resources");
        let request = ApplyToResourcesRequest {
            apply_to: resources.to_vec(),
        };
        self.send_json::<_, ActionList>(Method::POST, &path, Some(&request), &[])
            .await
            .map(|list| list.actions)
    }

    /// Fetch a server by id.
    pub async fn get_server(&self, id: ServerId) -> Result<Server> {
        let path = format!("servers/{id}");
        self.send_json::<(), ServerEnvelope>(Method::GET, &path, None, &[])
            .await
            .map(|envelope| envelope.server)
    }

    async fn send_json<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        params: &[(&'static str, String)],
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .inner
            .execute(
                method,
                path,
                params,
                |mut request| {
                    request = request.header("Accept", "application/json");
                    if let Some(payload) = body {
                        request = request.json(payload);
                    }
                    request
                },
                map_status_to_error,
            )
            .await?;

        response.json::<R>().await.map_err(Error::from)
    }
}

/// Next page to request, refusing to loop on a page already fetched.
fn advance(params: &ListParams, next: Option<u32>) -> Option<u32> {
    next.filter(|next| params.page.map_or(true, |current| *next > current))
}

/// Classify a failed response.
///
/// A parsed error envelope is classified by its code, so only the auth codes
/// become [`Error::Unauthorized`] and other 4xx rejections stay non-fatal.
/// Bare bodies fall back to the HTTP status.
fn map_status_to_error(status: StatusCode, text: String) -> Error {
    let envelope = match serde_json::from_str::<ErrorEnvelope>(&text) {
        Ok(envelope) => envelope,
        Err(_) => return map_bare_status(status, text),
    };
    let message = format!("{}: {}", envelope.error.code, envelope.error.message);

    match envelope.error.code.as_str() {
        "not_found" => Error::NotFound(message),
        "unauthorized" | "forbidden" | "token_readonly" => Error::Unauthorized(message),
        "uniqueness_error" | "conflict" | "locked" | "resource_limit_exceeded" | "protected" => {
            Error::Conflict(message)
        }
        "rate_limit_exceeded" => Error::RateLimited(message),
        _ if status.is_server_error() => {
            Error::ServiceUnavailable(format!("Hetzner API server error {status}: {message}"))
        }
        _ => Error::BadRequest(message),
    }
}

fn map_bare_status(status: StatusCode, message: String) -> Error {
    match status {
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Error::BadRequest(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Unauthorized(message),
        StatusCode::CONFLICT | StatusCode::LOCKED => Error::Conflict(message),
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited(message),
        status if status.is_server_error() => {
            Error::ServiceUnavailable(format!("Hetzner API server error {status}: {message}"))
        }
        _ => Error::HttpError(format!("Hetzner API error {status}: {message}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FirewallRule, ResourceEncoding};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> HcloudClient {
        HcloudClientBuilder::new(server.uri())
            .unwrap()
            .with_token("test-token")
            .build()
            .unwrap()
    }

    fn ssh_key_json(id: u64, name: &str, public_key: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "fingerprint": "b7:2f:30:a0:2f:6c:58:6c:21:04:58:61:ba:06:3b:2f",
            "public_key": public_key,
            "labels": {},
            "created": "2016-01-30T23:55:00+00:00"
        })
    }

    fn error_json(code: &str, message: &str) -> serde_json::Value {
        json!({"error": {"code": code, "message": message, "details": null}})
    }

    #[tokio::test]
    async fn list_all_ssh_keys_follows_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ssh_keys"))
            .and(query_param("page", "1"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ssh_keys": [ssh_key_json(1, "alice", "ssh-ed25519 AAAA alice")],
                "meta": {"pagination": {"page": 1, "per_page": 1, "next_page": 2, "last_page": 2}}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ssh_keys"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ssh_keys": [ssh_key_json(2, "bob", "ssh-ed25519 BBBB bob")],
                "meta": {"pagination": {"page": 2, "per_page": 1, "previous_page": 1, "next_page": null}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let keys = test_client(&server).list_all_ssh_keys().await.unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1].name, "bob");
    }

    #[tokio::test]
    async fn list_stops_when_next_page_does_not_advance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/firewalls"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "firewalls": [],
                "meta": {"pagination": {"page": 1, "per_page": 50, "next_page": 1}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let firewalls = test_client(&server).list_all_firewalls().await.unwrap();
        assert!(firewalls.is_empty());
    }

    #[tokio::test]
    async fn create_ssh_key_unwraps_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ssh_keys"))
            .and(body_json(json!({
                "name": "moveglobe-deploy",
                "public_key": "ssh-ed25519 AAAA deploy"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "ssh_key": ssh_key_json(2323, "moveglobe-deploy", "ssh-ed25519 AAAA deploy")
            })))
            .mount(&server)
            .await;

        let key = test_client(&server)
            .create_ssh_key(&CreateSshKeyRequest {
                name: "moveglobe-deploy".into(),
                public_key: "ssh-ed25519 AAAA deploy".into(),
                labels: None,
            })
            .await
            .unwrap();
        assert_eq!(key.id.get(), 2323);
    }

    #[tokio::test]
    async fn create_ssh_key_uniqueness_error_is_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ssh_keys"))
            .respond_with(ResponseTemplate::new(409).set_body_json(error_json(
                "uniqueness_error",
                "SSH key with the same fingerprint already exists",
            )))
            .mount(&server)
            .await;

        let err = test_client(&server)
            .create_ssh_key(&CreateSshKeyRequest {
                name: "dup".into(),
                public_key: "ssh-ed25519 AAAA".into(),
                labels: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(ref m) if m.starts_with("uniqueness_error")));
    }

    #[tokio::test]
    async fn create_firewall_sends_rules() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/firewalls"))
            .and(body_json(json!({
                "name": "web",
                "rules": [{
                    "direction": "in",
                    "protocol": "tcp",
                    "port": "22",
                    "source_ips": ["0.0.0.0/0", "::/0"]
                }]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "firewall": {
                    "id": 38,
                    "name": "web",
                    "rules": [{
                        "direction": "in",
                        "protocol": "tcp",
                        "port": "22",
                        "source_ips": ["0.0.0.0/0", "::/0"],
                        "destination_ips": []
                    }],
                    "applied_to": []
                },
                "actions": []
            })))
            .mount(&server)
            .await;

        let response = test_client(&server)
            .create_firewall(&CreateFirewallRequest {
                name: "web".into(),
                rules: vec![FirewallRule::inbound_tcp("22", &["0.0.0.0/0", "::/0"])],
                labels: None,
                apply_to: Vec::new(),
            })
            .await
            .unwrap();
        assert_eq!(response.firewall.id.get(), 38);
        assert_eq!(response.firewall.rules.len(), 1);
    }

    #[tokio::test]
    async fn apply_firewall_posts_action() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/firewalls/38/actions/apply_to_resources"))
            .and(body_json(json!({
                "apply_to": [{"type": "server", "server": {"id": 42}}]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "actions": [{
                    "id": 13,
                    "command": "apply_firewall",
                    "status": "running",
                    "progress": 0,
                    "started": "2016-01-30T23:55:00+00:00",
                    "finished": null,
                    "resources": [{"id": 42, "type": "server"}],
                    "error": null
                }]
            })))
            .mount(&server)
            .await;

        let actions = test_client(&server)
            .apply_firewall_to_resources(
                FirewallId::new(38),
                &[ResourceRef::server(ServerId::new(42), ResourceEncoding::Nested)],
            )
            .await
            .unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].command, "apply_firewall");
    }

    #[tokio::test]
    async fn get_server_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers/66631999"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(error_json("not_found", "server with ID '66631999' not found")),
            )
            .mount(&server)
            .await;

        let err = test_client(&server)
            .get_server(ServerId::new(66_631_999))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn status_mapping_without_envelope() {
        assert!(matches!(
            map_status_to_error(StatusCode::UNAUTHORIZED, "nope".into()),
            Error::Unauthorized(_)
        ));
        assert!(matches!(
            map_status_to_error(StatusCode::SERVICE_UNAVAILABLE, "down".into()),
            Error::ServiceUnavailable(_)
        ));
        assert!(matches!(
            map_status_to_error(StatusCode::IM_A_TEAPOT, "tea".into()),
            Error::HttpError(_)
        ));
    }

    #[test]
    fn quota_errors_are_conflicts_not_auth() {
        let body = error_json("resource_limit_exceeded", "firewall limit reached").to_string();
        assert!(matches!(
            map_status_to_error(StatusCode::FORBIDDEN, body),
            Error::Conflict(_)
        ));
    }

    #[test]
    fn unknown_envelope_codes_are_rejections_not_auth() {
        for (status, code) in [
            (StatusCode::FORBIDDEN, "resource_unavailable"),
            (StatusCode::GONE, "deprecated_api_endpoint"),
            (StatusCode::BAD_REQUEST, "unsupported_error"),
        ] {
            let body = error_json(code, "firewalls currently unavailable").to_string();
            let err = map_status_to_error(status, body);
            assert!(matches!(err, Error::BadRequest(_)), "{code}: {err:?}");
            assert!(!err.is_fatal());
        }

        let body = error_json("protected", "resource is protected").to_string();
        assert!(matches!(
            map_status_to_error(StatusCode::FORBIDDEN, body),
            Error::Conflict(_)
        ));
    }

    #[test]
    fn bare_forbidden_is_still_auth() {
        assert!(matches!(
            map_status_to_error(StatusCode::FORBIDDEN, "forbidden".into()),
            Error::Unauthorized(_)
        ));
        let body = error_json("token_readonly", "read-only token").to_string();
        assert!(map_status_to_error(StatusCode::FORBIDDEN, body).is_fatal());
    }

    #[test]
    fn server_errors_with_envelope_stay_fatal() {
        let body = error_json("service_error", "try again").to_string();
        let err = map_status_to_error(StatusCode::SERVICE_UNAVAILABLE, body);
        assert!(matches!(err, Error::ServiceUnavailable(_)));
    }
}
