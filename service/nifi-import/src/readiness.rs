use crate::endpoint::ServerEndpoint;
use backoff::backoff::Backoff;
use error::*;
use reqwest::StatusCode;
use std::time::Duration;
use term_colors::*;
use tokio::time::Instant;

/// The lightweight endpoint used to ask NiFi whether it is up.
pub const HEALTH_PATH: &str = "system-diagnostics";

/// The longest that any single probe may take. Probes are further capped at the poll interval
/// so that a hanging server cannot stretch the overall budget by more than one interval.
pub const MAXIMUM_PROBE_TIME: Duration = Duration::from_secs(5);

/// A `ProbePolicy` decides which probe responses are worth waiting out.
///
/// By default every failure, including `401 Unauthorized`, is considered transient. A server
/// that is still booting answers with all sorts of statuses and the original deployment
/// pipeline simply waited all of them out. Statuses listed via [abort_on](ProbePolicy::abort_on)
/// instead end the wait immediately, which turns misconfigured credentials into a prompt failure
/// rather than a five minute stall.
#[derive(Debug, Clone, Default)]
pub struct ProbePolicy {
    fatal: Vec<StatusCode>,
}

impl ProbePolicy {
    pub fn keep_waiting() -> ProbePolicy {
        ProbePolicy::default()
    }

    pub fn abort_on(fatal: Vec<StatusCode>) -> ProbePolicy {
        ProbePolicy { fatal }
    }

    pub fn is_fatal(&self, status: StatusCode) -> bool {
        self.fatal.contains(&status)
    }
}

/// A `FixedInterval` hands out the pauses between readiness probes.
///
/// Probes are anchored on a fixed grid (`0, interval, 2 * interval, ...` after the schedule was
/// created), so a slow probe shortens the following pause instead of pushing every later probe
/// back. The schedule is exhausted once the next slot would land at or beyond `max_wait`, which
/// bounds the number of probes to `ceil(max_wait / interval)`.
pub struct FixedInterval {
    interval: Duration,
    max_wait: Duration,
    scheduled: Duration,
    started: Instant,
}

impl FixedInterval {
    pub fn new(max_wait: Duration, interval: Duration) -> FixedInterval {
        FixedInterval {
            interval,
            max_wait,
            scheduled: Duration::from_secs(0),
            started: Instant::now(),
        }
    }

    /// The time accumulated by the schedule so far, that is, the offset of the current slot.
    pub fn elapsed(&self) -> Duration {
        self.scheduled
    }
}

impl Backoff for FixedInterval {
    fn reset(&mut self) {
        self.scheduled = Duration::from_secs(0);
        self.started = Instant::now();
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        let next = self.scheduled.checked_add(self.interval)?;
        let actual = self.started.elapsed();
        if next >= self.max_wait || actual >= self.max_wait {
            return None;
        }
        self.scheduled = next;
        Some(next.checked_sub(actual).unwrap_or_default())
    }
}

/// Why a single probe failed.
#[derive(Debug)]
enum ProbeFailure {
    /// NiFi isn't there yet. Keep waiting.
    Transient(String),
    /// NiFi answered in a way the [ProbePolicy] says will not improve with time.
    Fatal(StatusCode),
}

/// Blocks until NiFi answers its health endpoint with a success, probing once every `interval`.
///
/// Connection refusals, timeouts and non success statuses are all the same to this procedure:
/// NiFi is not ready yet. They are logged and waited out until `max_wait` has been used up,
/// at which point a [Timeout](ReadinessError::Timeout) is returned. The only exception are
/// statuses that the given [ProbePolicy] marks as fatal.
///
/// Returns the time spent waiting on success.
pub async fn wait(
    endpoint: &ServerEndpoint,
    max_wait: Duration,
    interval: Duration,
    policy: &ProbePolicy,
) -> Result<Duration, ReadinessError> {
    let url = endpoint.url(HEALTH_PATH);
    info!("Waiting for NiFi at {} to be ready...", cyan(&url));
    let patience = interval.min(MAXIMUM_PROBE_TIME);
    let mut schedule = FixedInterval::new(max_wait, interval);
    let mut attempts = 0;
    let mut last_failure = String::from("no probe was attempted");
    while schedule.elapsed() < max_wait {
        attempts += 1;
        match probe(endpoint, patience, policy).await {
            Ok(()) => {
                info!(
                    "{} NiFi is ready! (waited {}s)",
                    ok(),
                    schedule.elapsed().as_secs()
                );
                return Ok(schedule.elapsed());
            }
            Err(ProbeFailure::Fatal(status)) => {
                return Err(ReadinessError::FatalStatus { url, status });
            }
            Err(ProbeFailure::Transient(reason)) => last_failure = reason,
        }
        let waited = schedule.elapsed();
        match schedule.next_backoff() {
            Some(pause) => {
                info!("{}", progress(waited, max_wait, &last_failure));
                tokio::time::sleep(pause).await
            }
            None => break,
        }
    }
    Err(ReadinessError::Timeout {
        url,
        max_wait,
        attempts,
        last_failure,
    })
}

fn progress(waited: Duration, max_wait: Duration, reason: &str) -> String {
    format!(
        "{} Waiting for NiFi... ({}s/{}s), {}",
        waiting(),
        waited.as_secs(),
        max_wait.as_secs(),
        reason
    )
}

async fn probe(
    endpoint: &ServerEndpoint,
    patience: Duration,
    policy: &ProbePolicy,
) -> Result<(), ProbeFailure> {
    let response = endpoint
        .get(HEALTH_PATH)
        .timeout(patience)
        .send()
        .await
        .map_err(|err| ProbeFailure::Transient(format!("{}", err)))?;
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else if policy.is_fatal(status) {
        Err(ProbeFailure::Fatal(status))
    } else {
        Err(ProbeFailure::Transient(format!("received {}", status)))
    }
}

#[derive(Error, PipelineError, Kind, Debug)]
pub enum ReadinessError {
    #[error(
        "NiFi ({url}) did not become ready within {max_wait:?} after {attempts} probes. \
The last probe failed with: {last_failure}"
    )]
    Timeout {
        url: String,
        max_wait: Duration,
        attempts: u32,
        last_failure: String,
    },
    #[error(
        "NiFi ({url}) answered its readiness probe with {status}, which is configured as fatal. \
This usually means that the configured credentials are wrong."
    )]
    FatalStatus { url: String, status: StatusCode },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::test_endpoint;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn health() -> wiremock::MockBuilder {
        Mock::given(method("GET")).and(path("/nifi-api/system-diagnostics"))
    }

    async fn nifi() -> (MockServer, ServerEndpoint) {
        let server = MockServer::start().await;
        let endpoint = test_endpoint(&format!("{}/nifi-api", server.uri()));
        (server, endpoint)
    }

    fn permitted_attempts(max_wait: u64, interval: u64) -> u32 {
        let mut schedule =
            FixedInterval::new(Duration::from_secs(max_wait), Duration::from_secs(interval));
        if max_wait == 0 {
            return 0;
        }
        let mut attempts = 1;
        while schedule.next_backoff().is_some() {
            attempts += 1;
        }
        attempts
    }

    #[test]
    fn schedule_never_exceeds_the_ceiling() {
        for (max_wait, interval) in &[(300, 10), (25, 10), (30, 10), (10, 10), (1, 10), (7, 2)] {
            let ceiling = (max_wait + interval - 1) / interval;
            assert_eq!(
                permitted_attempts(*max_wait, *interval),
                ceiling as u32,
                "max_wait={} interval={}",
                max_wait,
                interval
            );
        }
        assert_eq!(permitted_attempts(0, 10), 0);
    }

    #[test]
    fn schedule_accumulates_and_resets() {
        let mut schedule = FixedInterval::new(Duration::from_secs(30), Duration::from_secs(10));
        assert!(schedule.next_backoff().is_some());
        assert_eq!(schedule.elapsed(), Duration::from_secs(10));
        assert!(schedule.next_backoff().is_some());
        assert_eq!(schedule.elapsed(), Duration::from_secs(20));
        assert!(schedule.next_backoff().is_none());
        schedule.reset();
        assert_eq!(schedule.elapsed(), Duration::from_secs(0));
        assert!(schedule.next_backoff().is_some());
    }

    #[test]
    fn progress_names_the_failure() {
        let line = progress(
            Duration::from_secs(20),
            Duration::from_secs(300),
            "received 503 Service Unavailable",
        );
        assert!(line.ends_with("Waiting for NiFi... (20s/300s), received 503 Service Unavailable"));
    }

    #[tokio::test]
    async fn ready_on_first_probe() {
        let (server, endpoint) = nifi().await;
        health()
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let waited = wait(
            &endpoint,
            Duration::from_secs(5),
            Duration::from_millis(50),
            &ProbePolicy::keep_waiting(),
        )
        .await
        .unwrap();
        assert_eq!(waited, Duration::from_secs(0));
    }

    #[tokio::test]
    async fn waits_out_a_booting_server() {
        let (server, endpoint) = nifi().await;
        health()
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        health()
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let waited = wait(
            &endpoint,
            Duration::from_secs(5),
            Duration::from_millis(20),
            &ProbePolicy::keep_waiting(),
        )
        .await
        .unwrap();
        assert_eq!(waited, Duration::from_millis(40));
    }

    #[tokio::test]
    async fn times_out_within_budget() {
        let (server, endpoint) = nifi().await;
        health()
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let max_wait = Duration::from_millis(200);
        let interval = Duration::from_millis(50);
        let started = std::time::Instant::now();
        let err = wait(&endpoint, max_wait, interval, &ProbePolicy::keep_waiting())
            .await
            .unwrap_err();
        assert!(started.elapsed() < max_wait + interval);
        let probes = server.received_requests().await.unwrap().len() as u32;
        assert!(probes >= 1 && probes <= 4, "made {} probes", probes);
        match err {
            ReadinessError::Timeout {
                attempts,
                last_failure,
                ..
            } => {
                assert_eq!(attempts, probes);
                assert!(last_failure.contains("503"));
            }
            other => panic!("expected a timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn hanging_server_overruns_by_at_most_one_interval() {
        let (server, endpoint) = nifi().await;
        health()
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;
        let max_wait = Duration::from_millis(300);
        let interval = Duration::from_millis(100);
        let started = std::time::Instant::now();
        let err = wait(&endpoint, max_wait, interval, &ProbePolicy::keep_waiting())
            .await
            .unwrap_err();
        let elapsed = started.elapsed();
        assert!(elapsed < max_wait + interval, "took {:?}", elapsed);
        match err {
            ReadinessError::Timeout { attempts, .. } => {
                assert!(attempts <= 3, "made {} probes", attempts)
            }
            other => panic!("expected a timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn zero_budget_never_probes() {
        let (server, endpoint) = nifi().await;
        health()
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let err = wait(
            &endpoint,
            Duration::from_secs(0),
            Duration::from_millis(50),
            &ProbePolicy::keep_waiting(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReadinessError::Timeout { attempts: 0, .. }));
    }

    #[tokio::test]
    async fn unauthorized_is_waited_out_by_default() {
        let (server, endpoint) = nifi().await;
        health()
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let err = wait(
            &endpoint,
            Duration::from_millis(100),
            Duration::from_millis(50),
            &ProbePolicy::keep_waiting(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "ReadinessError::Timeout");
    }

    #[tokio::test]
    async fn fatal_status_aborts_immediately() {
        let (server, endpoint) = nifi().await;
        health()
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        let policy = ProbePolicy::abort_on(vec![StatusCode::UNAUTHORIZED]);
        let err = wait(
            &endpoint,
            Duration::from_secs(5),
            Duration::from_millis(10),
            &policy,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ReadinessError::FatalStatus {
                status: StatusCode::UNAUTHORIZED,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn connection_refused_is_transient() {
        // Nothing listens on port 1, so every probe is refused outright.
        let endpoint = test_endpoint("http://127.0.0.1:1/nifi-api");
        let err = wait(
            &endpoint,
            Duration::from_millis(100),
            Duration::from_millis(50),
            &ProbePolicy::keep_waiting(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReadinessError::Timeout { attempts: 2, .. }));
    }
}
