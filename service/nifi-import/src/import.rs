use crate::definition::FlowDefinition;
use crate::endpoint::{pretty_body, ServerEndpoint};
use crate::root_group::ProcessGroupId;
use error::*;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use term_colors::*;

const MAXIMUM_IMPORT_TIME: Duration = Duration::from_secs(30);

/// The body of `POST /flow/process-groups/{id}/process-groups/import`.
///
/// Both versions are always zero. Every import creates a brand new process group, so there is
/// never an earlier revision to build upon.
///
/// ```text
/// {"version":0,"processGroupRevision":{"version":0},"flowContents":{...}}
/// ```
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ImportPayload<'a> {
    version: u64,
    process_group_revision: Revision,
    flow_contents: &'a Value,
}

#[derive(Serialize, Debug)]
struct Revision {
    version: u64,
}

impl<'a> ImportPayload<'a> {
    /// Wraps the given `flowContents`, verbatim, for a fresh import.
    pub fn fresh(flow_contents: &'a Value) -> ImportPayload<'a> {
        ImportPayload {
            version: 0,
            process_group_revision: Revision { version: 0 },
            flow_contents,
        }
    }

    pub fn from_definition(definition: &'a FlowDefinition) -> Result<ImportPayload<'a>, ImportError> {
        definition
            .flow_contents()
            .map(ImportPayload::fresh)
            .ok_or(ImportError::MissingContents)
    }
}

/// What NiFi said when it accepted the import.
#[derive(Debug)]
pub struct ImportResponse {
    pub status: StatusCode,
    pub body: String,
}

/// The body, pretty printed if NiFi answered with JSON.
impl Display for ImportResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&pretty_body(&self.body))
    }
}

fn import_segments(group: &ProcessGroupId) -> [&str; 5] {
    [
        "flow",
        "process-groups",
        group.as_ref(),
        "process-groups",
        "import",
    ]
}

/// Imports the given flow definition as a new process group under `group`.
///
/// The definition is checked for `flowContents` BEFORE anything is sent to NiFi. NiFi must
/// answer with either `200 OK` or `201 Created`, anything else is a
/// [Rejected](ImportError::Rejected) that keeps NiFi's response for the operator.
///
/// There is exactly one attempt. Retrying an import that NiFi may have partially applied would
/// risk duplicating the flow.
pub async fn apply(
    endpoint: &ServerEndpoint,
    group: &ProcessGroupId,
    definition: &FlowDefinition,
) -> Result<ImportResponse, ImportError> {
    info!("Preparing flow import payload...");
    let payload = ImportPayload::from_definition(definition)?;
    info!("{} Flow payload prepared", ok());
    info!("Importing flow into NiFi (root PG: {})...", cyan(group));
    let segments = import_segments(group);
    let url = endpoint.segments_url(&segments);
    let response = endpoint
        .post(&segments)
        .header(CONTENT_TYPE, "application/json")
        .json(&payload)
        .timeout(MAXIMUM_IMPORT_TIME)
        .send()
        .await
        .map_err(|source| ImportError::Request {
            url: url.clone(),
            source,
        })?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| ImportError::Request { url, source })?;
    match status {
        StatusCode::OK | StatusCode::CREATED => Ok(ImportResponse { status, body }),
        _ => Err(ImportError::Rejected { status, body }),
    }
}

#[derive(Error, PipelineError, Kind, Debug)]
pub enum ImportError {
    #[error("Flow file does not contain 'flowContents'")]
    MissingContents,
    /// `body` is kept exactly as NiFi sent it, the message pretty prints it.
    #[error("NiFi rejected the flow import ({}). Response:\n{}", .status, pretty_body(.body))]
    Rejected { status: StatusCode, body: String },
    #[error("Failed to send the flow import to {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}
