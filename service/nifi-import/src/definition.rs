use error::*;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::Path;
use term_colors::*;

/// The field of an exported flow that holds the flow itself.
pub const FLOW_CONTENTS: &str = "flowContents";

/// A flow definition as exported by NiFi ("Download flow definition"), that is, a JSON object
/// whose `flowContents` is the process group to import. Nothing in here is interpreted beyond
/// locating that field.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowDefinition {
    document: Map<String, Value>,
}

impl FlowDefinition {
    /// Parses a flow definition. The document MUST be a JSON object, however it is NOT
    /// required to carry `flowContents` at this point.
    pub fn parse(bytes: &[u8]) -> Result<FlowDefinition, serde_json::Error> {
        Ok(FlowDefinition {
            document: serde_json::from_slice(bytes)?,
        })
    }

    pub fn flow_contents(&self) -> Option<&Value> {
        self.document.get(FLOW_CONTENTS)
    }
}

/// Reads and parses the flow definition at `path`.
pub async fn load<P: AsRef<Path>>(path: P) -> Result<FlowDefinition, LoadError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    info!("Reading flow file: {}", cyan(&display));
    let bytes = tokio::fs::read(path).await.map_err(|source| match source.kind() {
        ErrorKind::NotFound => LoadError::NotFound {
            path: display.clone(),
        },
        _ => LoadError::Io {
            path: display.clone(),
            source,
        },
    })?;
    let definition = FlowDefinition::parse(&bytes).map_err(|source| LoadError::Parse {
        path: display.clone(),
        source,
    })?;
    info!("{} Flow file read successfully", ok());
    Ok(definition)
}

#[derive(Error, PipelineError, Kind, Debug)]
pub enum LoadError {
    #[error("Flow file not found at {path}")]
    NotFound { path: String },
    #[error("Invalid JSON in flow file {path}, expected a JSON object")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to read flow file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
