//! Scalingo REST adapter for [`ControlPlane`].
//!
//! Endpoints used:
//!
//! ```text
//! POST {auth_url}/v1/tokens/exchange   basic auth (":<token>") → {"token"}
//! GET  {api_url}/v1/apps                                       → {"apps": [...]}
//! POST {api_url}/v1/apps/{app}/scale   {"containers": [...]}   → 202 + Location
//! GET  <Location>                                              → {"operation": {...}}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::ControlPlane;
use crate::error::{ClientError, ClientResult};
use crate::types::{App, AuthToken, ContainerFormation, Operation, OperationStatus};

/// Default token exchange endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://auth.scalingo.com";

const USER_AGENT: &str = concat!("ecomode/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct TokenExchange {
    token: String,
}

#[derive(Deserialize)]
struct AppsEnvelope {
    apps: Vec<App>,
}

#[derive(Serialize)]
struct ScaleBody<'a> {
    containers: &'a [ContainerFormation],
}

#[derive(Deserialize)]
struct OperationEnvelope {
    operation: OperationBody,
}

#[derive(Deserialize)]
struct OperationBody {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

/// HTTP client for the Scalingo API.
#[derive(Debug, Clone)]
pub struct ScalingoClient {
    http: reqwest::Client,
    auth_url: String,
}

impl ScalingoClient {
    /// Client against the public token exchange endpoint.
    pub fn new() -> ClientResult<Self> {
        Self::with_auth_url(DEFAULT_AUTH_URL)
    }

    /// Client against a custom token exchange endpoint.
    pub fn with_auth_url(auth_url: impl Into<String>) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            auth_url: trim_slash(auth_url.into()),
        })
    }
}

#[async_trait]
impl ControlPlane for ScalingoClient {
    async fn authenticate(&self, credential: &str, api_url: &str) -> ClientResult<AuthToken> {
        let url = format!("{}/v1/tokens/exchange", self.auth_url);
        let resp = self
            .http
            .post(&url)
            .basic_auth("", Some(credential))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if !resp.status().is_success() {
            let (status, message) = error_parts(resp).await;
            return Err(ClientError::Auth(format!(
                "token exchange returned {status}: {message}"
            )));
        }

        let exchange: TokenExchange = resp.json().await?;
        debug!(%api_url, "token exchanged");
        Ok(AuthToken {
            bearer: exchange.token,
            api_url: trim_slash(api_url.to_string()),
        })
    }

    async fn list_apps(&self, token: &AuthToken) -> ClientResult<Vec<App>> {
        let url = format!("{}/v1/apps", token.api_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&token.bearer)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let resp = check(resp).await?;
        let envelope: AppsEnvelope = resp.json().await?;
        Ok(envelope.apps)
    }

    async fn scale(
        &self,
        token: &AuthToken,
        app: &str,
        formation: &[ContainerFormation],
    ) -> ClientResult<Option<Operation>> {
        let url = format!("{}/v1/apps/{app}/scale", token.api_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&token.bearer)
            .header(ACCEPT, "application/json")
            .json(&ScaleBody {
                containers: formation,
            })
            .send()
            .await?;
        let resp = check(resp).await?;

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|loc| absolute_location(&token.api_url, loc));

        match (resp.status(), location) {
            (StatusCode::ACCEPTED, Some(url)) => {
                debug!(%app, operation = %url, "scale accepted");
                Ok(Some(Operation::pending(url)))
            }
            _ => Ok(None),
        }
    }

    async fn refresh(&self, token: &AuthToken, operation: &Operation) -> ClientResult<Operation> {
        let resp = self
            .http
            .get(&operation.url)
            .bearer_auth(&token.bearer)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let resp = check(resp).await?;
        let envelope: OperationEnvelope = resp.json().await?;

        Ok(Operation {
            url: operation.url.clone(),
            status: OperationStatus::from_remote(&envelope.operation.status),
            error: envelope.operation.error,
        })
    }
}

/// Turn a non-success response into [`ClientError::Api`].
async fn check(resp: Response) -> ClientResult<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let (status, message) = error_parts(resp).await;
    Err(ClientError::Api { status, message })
}

/// Extract the status code and `body.error` of a failed response. Object
/// payloads (`{"errors": {...}}`) are rendered as JSON text.
async fn error_parts(resp: Response) -> (u16, String) {
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(ErrorBody {
            error: Some(error), ..
        }) => error,
        Ok(ErrorBody {
            errors: Some(errors),
            ..
        }) => errors.to_string(),
        _ => text,
    };
    (status, message)
}

fn absolute_location(api_url: &str, location: &str) -> String {
    if location.starts_with('/') {
        format!("{api_url}{location}")
    } else {
        location.to_string()
    }
}

fn trim_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppStatus;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_for(server: &MockServer) -> AuthToken {
        AuthToken {
            bearer: "bearer-token".to_string(),
            api_url: server.uri(),
        }
    }

    #[tokio::test]
    async fn authenticate_exchanges_credential_for_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/tokens/exchange"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "your-bearer-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ScalingoClient::with_auth_url(server.uri()).unwrap();
        let token = client
            .authenticate("scalingo-token", "https://api.example/")
            .await
            .unwrap();

        assert_eq!(token.bearer, "your-bearer-token");
        assert_eq!(token.api_url, "https://api.example");
    }

    #[tokio::test]
    async fn authenticate_failure_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/tokens/exchange"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(serde_json::json!({"error": "invalid token"})),
            )
            .mount(&server)
            .await;

        let client = ScalingoClient::with_auth_url(server.uri()).unwrap();
        let err = client.authenticate("bad", "https://api.example").await.unwrap_err();
        assert!(matches!(err, ClientError::Auth(ref m) if m.contains("invalid token")));
    }

    #[tokio::test]
    async fn list_apps_sends_bearer_and_decodes_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/apps"))
            .and(header("authorization", "Bearer bearer-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "apps": [
                    {"name": "new-app-review-pr-1", "status": "new"},
                    {"name": "not-review-app", "status": "running", "region": "osc-fr1"},
                ]
            })))
            .mount(&server)
            .await;

        let client = ScalingoClient::new().unwrap();
        let apps = client.list_apps(&token_for(&server)).await.unwrap();

        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].name, "new-app-review-pr-1");
        assert_eq!(apps[0].status, AppStatus::New);
        assert_eq!(apps[1].status, AppStatus::Running);
    }

    #[tokio::test]
    async fn scale_returns_operation_from_location_header() {
        let server = MockServer::start().await;
        let op_url = format!("{}/v1/apps/my-review-app/operations/operation-id", server.uri());
        Mock::given(method("POST"))
            .and(path("/v1/apps/my-review-app/scale"))
            .and(body_json(serde_json::json!({
                "containers": [{"name": "web", "size": "S", "amount": 0}]
            })))
            .respond_with(ResponseTemplate::new(202).insert_header("Location", op_url.as_str()))
            .expect(1)
            .mount(&server)
            .await;

        let client = ScalingoClient::new().unwrap();
        let op = client
            .scale(&token_for(&server), "my-review-app", &[ContainerFormation::web(0)])
            .await
            .unwrap()
            .expect("operation handle");

        assert_eq!(op.url, op_url);
        assert_eq!(op.status, OperationStatus::Pending);
    }

    #[tokio::test]
    async fn scale_resolves_relative_location() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/apps/app-review-pr-7/scale"))
            .respond_with(
                ResponseTemplate::new(202).insert_header("Location", "/v1/apps/app-review-pr-7/operations/op-7"),
            )
            .mount(&server)
            .await;

        let client = ScalingoClient::new().unwrap();
        let op = client
            .scale(&token_for(&server), "app-review-pr-7", &[ContainerFormation::web(1)])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            op.url,
            format!("{}/v1/apps/app-review-pr-7/operations/op-7", server.uri())
        );
    }

    #[tokio::test]
    async fn scale_without_location_has_no_operation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/apps/app-review-pr-2/scale"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"containers": []})))
            .mount(&server)
            .await;

        let client = ScalingoClient::new().unwrap();
        let op = client
            .scale(&token_for(&server), "app-review-pr-2", &[ContainerFormation::web(1)])
            .await
            .unwrap();
        assert!(op.is_none());
    }

    #[tokio::test]
    async fn scale_error_carries_status_and_body_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/apps/app-review-pr-3/scale"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "error": "no change in containers formation"
            })))
            .mount(&server)
            .await;

        let client = ScalingoClient::new().unwrap();
        let err = client
            .scale(&token_for(&server), "app-review-pr-3", &[ContainerFormation::web(0)])
            .await
            .unwrap_err();

        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "no change in containers formation");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn object_error_payload_is_rendered_as_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/apps/app-review-pr-4/scale"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "errors": {"containers": ["invalid size"]}
            })))
            .mount(&server)
            .await;

        let client = ScalingoClient::new().unwrap();
        let err = client
            .scale(&token_for(&server), "app-review-pr-4", &[ContainerFormation::web(0)])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::Api { status: 400, ref message } if message.contains("invalid size")
        ));
    }

    #[tokio::test]
    async fn refresh_reads_operation_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/apps/my-review-app/operations/operation-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "operation": {"status": "error", "error": "container web-1 failed to scale"}
            })))
            .mount(&server)
            .await;

        let client = ScalingoClient::new().unwrap();
        let op = Operation::pending(format!(
            "{}/v1/apps/my-review-app/operations/operation-id",
            server.uri()
        ));
        let refreshed = client.refresh(&token_for(&server), &op).await.unwrap();

        assert_eq!(refreshed.status, OperationStatus::Error);
        assert_eq!(
            refreshed.error.as_deref(),
            Some("container web-1 failed to scale")
        );
        assert_eq!(refreshed.url, op.url);
    }

    #[test]
    fn trim_slash_strips_trailing_slashes() {
        assert_eq!(trim_slash("https://api.example//".to_string()), "https://api.example");
        assert_eq!(trim_slash("https://api.example".to_string()), "https://api.example");
    }
}
