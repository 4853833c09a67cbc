use crate::endpoint::{Credentials, ServerEndpoint};
use crate::readiness::ProbePolicy;
use error::*;
use reqwest::{StatusCode, Url};
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

/// Everything the provisioner needs to know, read exactly once at startup and then only
/// ever passed around by reference.
#[derive(Debug)]
pub struct Config {
    pub server: ServerEndpoint,
    pub flow_file: PathBuf,
    pub max_wait: Duration,
    pub poll_interval: Duration,
    pub probe_policy: ProbePolicy,
}

impl Config {
    /// Builds the configuration from the process environment.
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup. Tests use this in order to
    /// avoid racing one another over the real process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let credentials = Credentials {
            username: vars.nifi_username(),
            password: vars.nifi_password()?,
        };
        let server = ServerEndpoint::new(vars.nifi_url()?, credentials, vars.nifi_verify_tls()?)
            .map_err(|source| ConfigError::Client { source })?;
        if !server.verify_tls() {
            warn!("TLS certificate verification is disabled for the NiFi API.");
        }
        Ok(Config {
            server,
            flow_file: vars.flow_file(),
            max_wait: vars.max_wait()?,
            poll_interval: vars.wait_interval()?,
            probe_policy: vars.fatal_probe_statuses()?,
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    /// If a variable is technically present, albeit empty, then we would like to
    /// take that to mean that it doesn't actually exist.
    fn get(&self, var: &'static str) -> Option<String> {
        (self.lookup)(var).filter(|value| !value.trim().is_empty())
    }

    /// The base of the NiFi REST API configured under `NIFI_URL`, including the `/nifi-api`
    /// suffix. Defaults to `https://nifi:8443/nifi-api`, which is where the NiFi container
    /// answers inside the deployment's network.
    fn nifi_url(&self) -> Result<Url, ConfigError> {
        let value = self
            .get("NIFI_URL")
            .unwrap_or_else(|| String::from("https://nifi:8443/nifi-api"));
        value.parse().map_err(|err| ConfigError::Invalid {
            var: "NIFI_URL",
            reason: format!("{}", err),
            value,
        })
    }

    /// The NiFi user configured under `NIFI_USERNAME`. Defaults to `admin`.
    fn nifi_username(&self) -> String {
        self.get("NIFI_USERNAME")
            .unwrap_or_else(|| String::from("admin"))
    }

    /// The password for [nifi_username](Vars::nifi_username) configured under `NIFI_PASSWORD`.
    ///
    /// There is NO default associated with this variable.
    fn nifi_password(&self) -> Result<Secret, ConfigError> {
        self.get("NIFI_PASSWORD")
            .map(Secret::from)
            .ok_or(ConfigError::Missing {
                var: "NIFI_PASSWORD",
            })
    }

    /// Whether the NiFi server's certificate is verified, configured under `NIFI_VERIFY_TLS`.
    /// Defaults to `false` since the NiFi container ships with a self signed certificate.
    fn nifi_verify_tls(&self) -> Result<bool, ConfigError> {
        match self.get("NIFI_VERIFY_TLS") {
            None => Ok(false),
            Some(value) => match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    var: "NIFI_VERIFY_TLS",
                    reason: "expected true or false".to_string(),
                    value,
                }),
            },
        }
    }

    /// The flow definition to import, configured under `FLOW_FILE`.
    /// Defaults to `/flow/NiFi_Flow.json`.
    fn flow_file(&self) -> PathBuf {
        self.get("FLOW_FILE")
            .unwrap_or_else(|| String::from("/flow/NiFi_Flow.json"))
            .into()
    }

    /// How long (in seconds) NiFi is given to become ready, configured under `MAX_WAIT`.
    /// Defaults to 300.
    fn max_wait(&self) -> Result<Duration, ConfigError> {
        self.seconds("MAX_WAIT", 300)
    }

    /// The spacing (in seconds) between readiness probes, configured under `WAIT_INTERVAL`.
    /// Defaults to 10. Zero is rejected as it would hammer the server.
    fn wait_interval(&self) -> Result<Duration, ConfigError> {
        let interval = self.seconds("WAIT_INTERVAL", 10)?;
        if interval.as_secs() == 0 {
            return Err(ConfigError::Invalid {
                var: "WAIT_INTERVAL",
                value: "0".to_string(),
                reason: "the poll interval must be at least one second".to_string(),
            });
        }
        Ok(interval)
    }

    /// A comma separated list of HTTP statuses, configured under `NIFI_FATAL_PROBE_STATUSES`,
    /// that abort the readiness probe on sight rather than being waited out. `401,403` is a
    /// sensible choice when credentials are likely to be misconfigured.
    ///
    /// Defaults to empty, that is, every failed probe is retried until `MAX_WAIT` runs out.
    fn fatal_probe_statuses(&self) -> Result<ProbePolicy, ConfigError> {
        let value = match self.get("NIFI_FATAL_PROBE_STATUSES") {
            None => return Ok(ProbePolicy::keep_waiting()),
            Some(value) => value,
        };
        let mut statuses = vec![];
        for code in value.split(',').map(str::trim).filter(|code| !code.is_empty()) {
            let status = code
                .parse::<u16>()
                .ok()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .ok_or_else(|| ConfigError::Invalid {
                    var: "NIFI_FATAL_PROBE_STATUSES",
                    value: value.clone(),
                    reason: format!("'{}' is not an HTTP status code", code),
                })?;
            statuses.push(status);
        }
        Ok(ProbePolicy::abort_on(statuses))
    }

    fn seconds(&self, var: &'static str, default: u64) -> Result<Duration, ConfigError> {
        match self.get(var) {
            None => Ok(Duration::from_secs(default)),
            Some(value) => value
                .trim()
                .parse()
                .map(Duration::from_secs)
                .map_err(|err| ConfigError::Invalid {
                    var,
                    reason: format!("expected a whole number of seconds, {}", err),
                    value,
                }),
        }
    }
}

#[derive(Error, PipelineError, Kind, Debug)]
pub enum ConfigError {
    #[error("The {var} environment variable is mandatory")]
    Missing { var: &'static str },
    #[error("The {var} environment variable was set to '{value}', {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("Failed to build an HTTP client for the NiFi API")]
    Client {
        #[source]
        source: reqwest::Error,
    },
}

/// A `Secret` obfuscates an underlying string from being accidentally printed to any logs.
///
/// Any attempt to format a `Secret` using the either the [Display](Display)("{}") or [Debug](Debug)
/// ("{:?}") directives will result in the string "<REDACTED>" rather than the underlying secret.
///
/// The original secret may only be retrieved by explicitly calling [raw_secret](Secret::raw_secret).
pub struct Secret {
    secret: String,
}

impl Secret {
    pub fn raw_secret(&self) -> &str {
        self.secret.as_str()
    }
}

impl Display for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("<REDACTED>")
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("<REDACTED>")
    }
}

impl From<String> for Secret {
    fn from(secret: String) -> Self {
        Self { secret }
    }
}

impl From<&str> for Secret {
    fn from(secret: &str) -> Self {
        Self::from(secret.to_string())
    }
}
