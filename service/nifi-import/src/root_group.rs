use crate::endpoint::{pretty_body, ServerEndpoint};
use error::*;
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use term_colors::*;

pub const ROOT_FLOW_PATH: &str = "flow/process-groups/root";

const MAXIMUM_LOOKUP_TIME: Duration = Duration::from_secs(10);

/// The identifier of NiFi's root process group, under which the flow is imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessGroupId(String);

impl Display for ProcessGroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProcessGroupId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProcessGroupId {
    fn from(id: &str) -> Self {
        ProcessGroupId(id.to_string())
    }
}

/// The deserialization target of `GET /flow/process-groups/root`.
///
/// Only the single field we need is modeled. Everything else in the (very large) flow entity
/// is ignored.
///
/// ```text
/// {
///   "permissions": { ... },
///   "processGroupFlow": {
///     "id": "0b9e3a8f-0187-1000-2c5d-0c1f5ac3e06b",
///     "uri": "https://nifi:8443/nifi-api/flow/process-groups/0b9e3a8f-...",
///     "breadcrumb": { ... },
///     "flow": { ... }
///   }
/// }
/// ```
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ProcessGroupFlowEntity {
    process_group_flow: Option<ProcessGroupFlow>,
}

#[derive(Deserialize, Debug)]
struct ProcessGroupFlow {
    id: Option<String>,
}

impl ProcessGroupFlowEntity {
    fn into_id(self) -> Option<ProcessGroupId> {
        self.process_group_flow?
            .id
            .filter(|id| !id.trim().is_empty())
            .map(ProcessGroupId)
    }
}

/// Looks up the identifier of NiFi's root process group.
///
/// A response without `processGroupFlow.id` is taken to come from a NiFi version whose API
/// we do not understand, and is reported as [MissingId](ResolutionError::MissingId) along with
/// the full body that we did receive.
pub async fn resolve(endpoint: &ServerEndpoint) -> Result<ProcessGroupId, ResolutionError> {
    info!("Getting root process group ID...");
    let url = endpoint.url(ROOT_FLOW_PATH);
    let response = endpoint
        .get(ROOT_FLOW_PATH)
        .timeout(MAXIMUM_LOOKUP_TIME)
        .send()
        .await
        .map_err(|source| ResolutionError::Request {
            url: url.clone(),
            source,
        })?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| ResolutionError::Request {
            url: url.clone(),
            source,
        })?;
    if !status.is_success() {
        return Err(ResolutionError::Status { url, status, body });
    }
    let id = parse_root_flow(&body)?;
    info!("{} Root process group ID: {}", ok(), cyan(&id));
    Ok(id)
}

fn parse_root_flow(body: &str) -> Result<ProcessGroupId, ResolutionError> {
    let entity: ProcessGroupFlowEntity =
        serde_json::from_str(body).map_err(|source| ResolutionError::Malformed { source })?;
    entity.into_id().ok_or_else(|| ResolutionError::MissingId {
        body: pretty_body(body),
    })
}

#[derive(Error, PipelineError, Kind, Debug)]
pub enum ResolutionError {
    #[error("Failed to get the root process group from {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("NiFi answered the root process group lookup ({url}) with {status}. Response: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("The root process group lookup did not return a JSON flow entity")]
    Malformed {
        #[source]
        source: serde_json::Error,
    },
    #[error(
        "Could not find the root process group ID (processGroupFlow.id) in the response. \
This NiFi version may not be supported. Response: {body}"
    )]
    MissingId { body: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{test_endpoint, TEST_AUTHORIZATION};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn extracts_nested_id() {
        let body = r#"{
    "permissions": {"canRead": true, "canWrite": true},
    "processGroupFlow": {
        "id": "root-123",
        "uri": "https://nifi:8443/nifi-api/flow/process-groups/root-123",
        "flow": {"processGroups": []}
    }
}"#;
        assert_eq!(parse_root_flow(body).unwrap(), ProcessGroupId::from("root-123"));
    }

    #[test]
    fn missing_id_is_an_error() {
        for body in &[
            r#"{}"#,
            r#"{"processGroupFlow": {}}"#,
            r#"{"processGroupFlow": {"id": null}}"#,
            r#"{"processGroupFlow": {"id": ""}}"#,
            r#"{"processGroupFlow": null}"#,
        ] {
            let err = parse_root_flow(body).unwrap_err();
            assert!(
                matches!(err, ResolutionError::MissingId { .. }),
                "{} gave {:?}",
                body,
                err
            );
        }
    }

    #[test]
    fn unexpected_shape_is_malformed() {
        for body in &["<html>", r#"{"processGroupFlow": "root-123"}"#, "[]"] {
            let err = parse_root_flow(body).unwrap_err();
            assert_eq!(err.kind(), "ResolutionError::Malformed", "{}", body);
        }
    }

    #[tokio::test]
    async fn resolves_against_nifi() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nifi-api/flow/process-groups/root"))
            .and(header("Authorization", TEST_AUTHORIZATION))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "processGroupFlow": {"id": "root-123"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        let endpoint = test_endpoint(&format!("{}/nifi-api", server.uri()));
        let id = resolve(&endpoint).await.unwrap();
        assert_eq!(id.as_ref(), "root-123");
    }

    #[tokio::test]
    async fn error_status_keeps_the_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nifi-api/flow/process-groups/root"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Unable to view the flow"))
            .mount(&server)
            .await;
        let endpoint = test_endpoint(&format!("{}/nifi-api", server.uri()));
        match resolve(&endpoint).await.unwrap_err() {
            ResolutionError::Status { status, body, .. } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(body, "Unable to view the flow");
            }
            other => panic!("expected a status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_server() {
        let endpoint = test_endpoint("http://127.0.0.1:1/nifi-api");
        let err = resolve(&endpoint).await.unwrap_err();
        assert!(matches!(err, ResolutionError::Request { .. }));
    }
}
