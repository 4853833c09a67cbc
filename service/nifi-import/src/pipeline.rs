use crate::env::Config;
use crate::import::ImportResponse;
use crate::{definition, import, readiness, root_group};
use error::{Kind, PipelineError};
use std::fmt::{Display, Formatter};
use term_colors::*;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;

/// The provisioning steps, in the order in which they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Readiness,
    Resolution,
    Load,
    Import,
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Step::Readiness => "Waiting for NiFi",
            Step::Resolution => "Resolving the root process group",
            Step::Load => "Loading the flow definition",
            Step::Import => "Importing the flow",
        })
    }
}

/// The step that ended the pipeline, and why.
#[derive(Debug)]
pub struct Failure {
    pub step: Step,
    pub cause: Box<dyn PipelineError>,
}

impl Failure {
    fn at<E: PipelineError + 'static>(step: Step) -> impl FnOnce(E) -> Failure {
        move |err| Failure {
            step,
            cause: err.into(),
        }
    }
}

impl Display for Failure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed ({}): {}", self.step, self.cause.kind(), self.cause)
    }
}

/// Runs every step in order and stops at the first one that fails. Nothing is written to NiFi
/// before the final step, so there is never anything to roll back.
pub async fn pipeline(config: &Config) -> Result<ImportResponse, Failure> {
    let server = &config.server;
    readiness::wait(
        server,
        config.max_wait,
        config.poll_interval,
        &config.probe_policy,
    )
    .await
    .map_err(Failure::at(Step::Readiness))?;
    let root = root_group::resolve(server)
        .await
        .map_err(Failure::at(Step::Resolution))?;
    let definition = definition::load(&config.flow_file)
        .await
        .map_err(Failure::at(Step::Load))?;
    import::apply(server, &root, &definition)
        .await
        .map_err(Failure::at(Step::Import))
}

/// Runs the [pipeline] and reports its outcome, returning the process exit code.
pub async fn run(config: &Config) -> i32 {
    info!("{}", bold("=================================================="));
    info!("{}", bold("NiFi Flow Auto-Import"));
    info!("{}", bold("=================================================="));
    match pipeline(config).await {
        Ok(response) => {
            info!(
                "{} Flow imported successfully! (HTTP {})",
                ok(),
                green(response.status)
            );
            info!("Response:\n{}", response);
            info!("{} All done!", ok());
            SUCCESS
        }
        Err(failure) => {
            error!("{} {}", failed(), failure);
            match serde_json::to_string(&failure.cause) {
                Ok(report) => debug!("{}", report),
                Err(err) => debug!("Could not serialize the error report, {}", err),
            }
            FAILURE
        }
    }
}
