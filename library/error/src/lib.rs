pub use error_derive::PipelineError;
pub use kind::Kind;
use serde::{Serialize, Serializer};
use serde_json::json;
pub use thiserror;
pub use thiserror::Error;

/// A PipelineError is the trait by which every error raised by a provisioning step
/// MUST adhere.
///
/// The easiest way to implement this error type is to utilize the derive
/// macros re-exported by this library. Notably, [Error](thiserror::Error),
/// [PipelineError](error_derive::PipelineError) and [Kind](kind::Kind).
/// [Debug](std::fmt::Debug) is required to fulfill the standard library
/// [Error](std::error::Error).
///
/// ```
/// use error::*;
///
/// #[derive(Error, PipelineError, Kind, Debug)]
/// enum LoadError {
///     // Interpolate the data members into the message, it is what the operator reads.
///     #[error("The flow file {path} could not be read")]
///     Io {
///         path: String,
///         // Any aggregated error annotated as a source will be formatted
///         // and serialized into the 'cause' key of the error report.
///         #[source]
///         source: std::io::Error,
///     },
/// }
/// ```
pub trait PipelineError: std::error::Error + Kind + Send + Sync {}

/// This conversion supports the automatic boxing of any type that
/// implements [PipelineError](crate::PipelineError), which is what lets the
/// orchestrator funnel every step's error through a single `?`.
impl<T: 'static + PipelineError> From<T> for Box<dyn PipelineError> {
    fn from(err: T) -> Self {
        Box::new(err)
    }
}

/// The [Serialize](serde::Serialize) implementation for a boxed [PipelineError](crate::PipelineError)
/// is a flat JSON object, suitable for a single machine readable log line.
///
/// ```ignore
/// {
///     "kind": "LoadError::Io",
///     "message": "The flow file /flow/NiFi_Flow.json could not be read",
///     "cause": "Permission denied (os error 13)"
/// }
/// ```
impl Serialize for Box<dyn PipelineError> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        json!({
            "kind": self.kind(),
            "message": format!("{}", self),
            "cause": self.source().map(|cause| format!("{}", cause)),
        })
        .serialize(serializer)
    }
}
