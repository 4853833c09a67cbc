use crate::env::Secret;
use reqwest::{Client, RequestBuilder, Url};

/// The basic auth pairing presented on every request to NiFi.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: Secret,
}

/// A `ServerEndpoint` is the one handle every provisioning step is given onto the NiFi REST API.
///
/// It is built exactly once from the [Config](crate::env::Config) and is never mutated afterwards.
/// All requests issued through it share the same connection pool and carry the configured
/// credentials.
#[derive(Debug)]
pub struct ServerEndpoint {
    base: Url,
    credentials: Credentials,
    verify_tls: bool,
    client: Client,
}

impl ServerEndpoint {
    pub fn new(
        base: Url,
        credentials: Credentials,
        verify_tls: bool,
    ) -> Result<ServerEndpoint, reqwest::Error> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!verify_tls)
            .build()?;
        Ok(ServerEndpoint {
            base,
            credentials,
            verify_tls,
            client,
        })
    }

    /// Joins the given API path onto the configured base, tolerating a slash on either side.
    ///
    /// ```ignore
    /// // NIFI_URL=https://nifi:8443/nifi-api/
    /// assert_eq!(endpoint.url("/flow/process-groups/root"),
    ///            "https://nifi:8443/nifi-api/flow/process-groups/root");
    /// ```
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Appends the given segments onto the configured base, percent encoding each one, so that
    /// an identifier taken from a response can never escape its own segment.
    pub fn segments_url(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.to_string()
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.authenticated(self.client.get(self.url(path)))
    }

    pub fn post(&self, segments: &[&str]) -> RequestBuilder {
        self.authenticated(self.client.post(self.segments_url(segments)))
    }

    #[cfg(test)]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(
            &self.credentials.username,
            Some(self.credentials.password.raw_secret()),
        )
    }
}

/// Renders a response body for the operator. JSON bodies are pretty printed, anything else
/// (an HTML error page from a proxy, say) is passed through untouched.
pub fn pretty_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| serde_json::to_string_pretty(&json).ok())
        .unwrap_or_else(|| body.to_string())
}

/// An endpoint aimed at a local mock server, authenticating as `admin:secret`.
#[cfg(test)]
pub fn test_endpoint(uri: &str) -> ServerEndpoint {
    let credentials = Credentials {
        username: "admin".to_string(),
        password: Secret::from("secret"),
    };
    ServerEndpoint::new(uri.parse().unwrap(), credentials, true).unwrap()
}

/// The `Authorization` header [test_endpoint] sends, `base64("admin:secret")`.
#[cfg(test)]
pub const TEST_AUTHORIZATION: &str = "Basic YWRtaW46c2VjcmV0";

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn joins_paths() {
        let endpoint = test_endpoint("http://nifi:8080/nifi-api/");
        assert_eq!(
            endpoint.url("/system-diagnostics"),
            "http://nifi:8080/nifi-api/system-diagnostics"
        );
        assert_eq!(
            endpoint.url("flow/process-groups/root"),
            "http://nifi:8080/nifi-api/flow/process-groups/root"
        );
    }

    #[test]
    fn encodes_segments() {
        for base in &["http://nifi:8080/nifi-api", "http://nifi:8080/nifi-api/"] {
            let endpoint = test_endpoint(base);
            assert_eq!(
                endpoint.segments_url(&["flow", "process-groups", "a b/c", "import"]),
                "http://nifi:8080/nifi-api/flow/process-groups/a%20b%2Fc/import"
            );
        }
    }

    #[test]
    fn keeps_the_tls_setting() {
        let credentials = Credentials {
            username: "admin".to_string(),
            password: Secret::from("secret"),
        };
        let endpoint =
            ServerEndpoint::new("https://nifi:8443/nifi-api".parse().unwrap(), credentials, false)
                .unwrap();
        assert!(!endpoint.verify_tls());
        assert!(test_endpoint("http://nifi:8080/nifi-api").verify_tls());
    }

    #[test]
    fn password_stays_out_of_debug() {
        let endpoint = test_endpoint("http://nifi:8080/nifi-api");
        let debug = format!("{:?}", endpoint);
        assert!(debug.contains("<REDACTED>"));
        assert!(!debug.contains("secret\""));
    }

    #[test]
    fn pretty_prints_json_only() {
        assert_eq!(pretty_body(r#"{"id":"abc"}"#), "{\n  \"id\": \"abc\"\n}");
        assert_eq!(pretty_body("<html>Bad Gateway</html>"), "<html>Bad Gateway</html>");
    }

    #[tokio::test]
    async fn sends_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nifi-api/system-diagnostics"))
            .and(header("Authorization", TEST_AUTHORIZATION))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let endpoint = test_endpoint(&format!("{}/nifi-api", server.uri()));
        let response = endpoint.get("system-diagnostics").send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
    }
}
