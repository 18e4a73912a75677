//! Live rate fetchers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use somrate_common::{constants, Currency, DurationExt};

use crate::error::{FxError, FxResult};

/// Source of the live USD/KGS rate.
#[async_trait]
pub trait RateFetcher: Send + Sync {
    /// Get the fetcher name, used in logs and errors.
    fn name(&self) -> &str;

    /// Fetch the current rate: units of the quote currency per 1 USD.
    async fn fetch(&self) -> FxResult<f64>;
}

/// A remote endpoint answering with `{ "rates": { "<CODE>": <number>, ... } }`
/// for a USD base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub url: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Endpoint named after the host of its URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let name = reqwest::Url::parse(&url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_string))
            .unwrap_or_else(|| url.clone());
        Self { name, url }
    }
}

/// The built-in endpoints, in priority order. Neither needs an API key.
pub fn default_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::new("open.er-api.com", "https://open.er-api.com/v6/latest/USD"),
        Endpoint::new(
            "api.exchangerate-api.com",
            "https://api.exchangerate-api.com/v4/latest/USD",
        ),
    ]
}

/// HTTP settings shared by all endpoint fetchers.
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub user_agent: String,
    /// Currency to pick out of the `rates` object.
    pub quote: Currency,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout: constants::fetch_connect_timeout().as_std(),
            read_timeout: constants::fetch_read_timeout().as_std(),
            user_agent: format!("somrate/{}", env!("CARGO_PKG_VERSION")),
            quote: Currency::kgs(),
        }
    }
}

impl HttpFetcherConfig {
    /// Build the HTTP client these settings describe.
    pub fn build_client(&self) -> FxResult<Client> {
        Ok(Client::builder()
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
            .user_agent(self.user_agent.clone())
            .build()?)
    }
}

/// Fetches the rate from a single endpoint. One attempt, no retries.
pub struct EndpointFetcher {
    client: Client,
    endpoint: Endpoint,
    quote: Currency,
}

impl EndpointFetcher {
    pub fn new(client: Client, endpoint: Endpoint, quote: Currency) -> Self {
        Self {
            client,
            endpoint,
            quote,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn network_error(&self, e: reqwest::Error) -> FxError {
        let message = if e.is_timeout() {
            format!("timed out: {}", e)
        } else {
            e.to_string()
        };
        FxError::Network {
            endpoint: self.endpoint.name.clone(),
            message,
        }
    }
}

#[async_trait]
impl RateFetcher for EndpointFetcher {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    async fn fetch(&self) -> FxResult<f64> {
        let response = self
            .client
            .get(&self.endpoint.url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        // Error statuses still get their body parsed; some providers put a
        // valid payload behind a non-2xx code.
        let status = response.status();
        let body = response.text().await.map_err(|e| self.network_error(e))?;

        debug!(
            endpoint = %self.endpoint.name,
            status = status.as_u16(),
            bytes = body.len(),
            "Rate endpoint responded"
        );

        if body.trim().is_empty() {
            return Err(FxError::MalformedResponse {
                endpoint: self.endpoint.name.clone(),
                reason: format!("empty body (HTTP {})", status.as_u16()),
            });
        }

        parse_rate(&body, &self.quote).map_err(|reason| FxError::MalformedResponse {
            endpoint: self.endpoint.name.clone(),
            reason: format!("{} (HTTP {})", reason, status.as_u16()),
        })
    }
}

/// Extract `rates.<quote>` from a response body.
///
/// Numeric strings are accepted as numbers. The value must be finite and
/// strictly positive.
pub fn parse_rate(body: &str, quote: &Currency) -> Result<f64, String> {
    let json: Value = serde_json::from_str(body).map_err(|e| format!("body is not JSON: {}", e))?;

    let rates = json
        .get("rates")
        .and_then(Value::as_object)
        .ok_or_else(|| "no 'rates' object in response".to_string())?;

    let value = rates
        .get(quote.code())
        .ok_or_else(|| format!("{} rate missing", quote))?;

    let rate = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| format!("{} rate is not a number: {}", quote, value))?;

    if !(rate.is_finite() && rate > 0.0) {
        return Err(format!("{} rate is not positive: {}", quote, rate));
    }
    Ok(rate)
}

/// Tries fetchers in order and returns the first rate obtained.
pub struct FallbackRateFetcher {
    fetchers: Vec<Arc<dyn RateFetcher>>,
}

impl FallbackRateFetcher {
    /// Create a fallback chain over the given fetchers, highest priority first.
    pub fn new(fetchers: Vec<Arc<dyn RateFetcher>>) -> Self {
        Self { fetchers }
    }

    /// Chain of HTTP fetchers, one per endpoint, sharing one client.
    pub fn http(endpoints: Vec<Endpoint>, config: HttpFetcherConfig) -> FxResult<Self> {
        let client = config.build_client()?;
        let fetchers = endpoints
            .into_iter()
            .map(|endpoint| {
                Arc::new(EndpointFetcher::new(
                    client.clone(),
                    endpoint,
                    config.quote.clone(),
                )) as Arc<dyn RateFetcher>
            })
            .collect();
        Ok(Self::new(fetchers))
    }

    /// Number of fetchers in the chain.
    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }
}

#[async_trait]
impl RateFetcher for FallbackRateFetcher {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn fetch(&self) -> FxResult<f64> {
        let mut last_error = None;

        for (attempt, fetcher) in self.fetchers.iter().enumerate() {
            match fetcher.fetch().await {
                Ok(rate) => {
                    info!(
                        fetcher = fetcher.name(),
                        attempt = attempt + 1,
                        rate,
                        "Fetched live rate"
                    );
                    return Ok(rate);
                }
                Err(e) => {
                    warn!(
                        fetcher = fetcher.name(),
                        attempt = attempt + 1,
                        error = %e,
                        "Rate fetcher failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(last) => Err(FxError::Fetch {
                attempts: self.fetchers.len(),
                last: Box::new(last),
            }),
            None => Err(FxError::NoEndpoints),
        }
    }
}

/// Scripted rate fetcher for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateFetcher {
    name: String,
    responses: parking_lot::Mutex<std::collections::VecDeque<Result<f64, String>>>,
    fallback: parking_lot::Mutex<Result<f64, String>>,
    delay: Option<Duration>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateFetcher {
    /// Create a mock that fails until told otherwise.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: parking_lot::Mutex::new(std::collections::VecDeque::new()),
            fallback: parking_lot::Mutex::new(Err("no rate configured".to_string())),
            delay: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Mock that always returns `rate`.
    pub fn with_rate(name: impl Into<String>, rate: f64) -> Self {
        let mock = Self::new(name);
        mock.set_rate(rate);
        mock
    }

    /// Mock that always fails with a network error.
    pub fn failing(name: impl Into<String>) -> Self {
        Self::new(name)
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer every unscripted call with `rate`.
    pub fn set_rate(&self, rate: f64) {
        *self.fallback.lock() = Ok(rate);
    }

    /// Fail every unscripted call.
    pub fn set_failing(&self, reason: impl Into<String>) {
        *self.fallback.lock() = Err(reason.into());
    }

    /// Queue a one-off answer, used before the fallback answer.
    pub fn push_rate(&self, rate: f64) {
        self.responses.lock().push_back(Ok(rate));
    }

    /// Queue a one-off failure.
    pub fn push_failure(&self, reason: impl Into<String>) {
        self.responses.lock().push_back(Err(reason.into()));
    }

    /// Number of times `fetch` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateFetcher for MockRateFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> FxResult<f64> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.responses.lock().pop_front();
        let response = scripted.unwrap_or_else(|| self.fallback.lock().clone());
        response.map_err(|message| FxError::Network {
            endpoint: self.name.clone(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints_on(server: &mockito::Server) -> Vec<Endpoint> {
        vec![
            Endpoint::new("primary", format!("{}/v6/latest/USD", server.url())),
            Endpoint::new("secondary", format!("{}/v4/latest/USD", server.url())),
        ]
    }

    #[test]
    fn test_parse_rate() {
        let kgs = Currency::kgs();
        assert_eq!(parse_rate(r#"{"rates":{"KGS":87.3}}"#, &kgs), Ok(87.3));
        assert_eq!(parse_rate(r#"{"rates":{"KGS":"86.9"}}"#, &kgs), Ok(86.9));
        assert_eq!(parse_rate(r#"{"rates":{"KGS":88}}"#, &kgs), Ok(88.0));
    }

    #[test]
    fn test_parse_rate_failures() {
        let kgs = Currency::kgs();
        assert!(parse_rate("<html>oops</html>", &kgs).is_err());
        assert!(parse_rate(r#"{"result":"error"}"#, &kgs)
            .unwrap_err()
            .contains("rates"));
        assert!(parse_rate(r#"{"rates":[]}"#, &kgs).is_err());
        assert!(parse_rate(r#"{"rates":{"EUR":0.92}}"#, &kgs)
            .unwrap_err()
            .contains("missing"));
        assert!(parse_rate(r#"{"rates":{"KGS":"n/a"}}"#, &kgs).is_err());
        assert!(parse_rate(r#"{"rates":{"KGS":null}}"#, &kgs).is_err());
        assert!(parse_rate(r#"{"rates":{"KGS":0}}"#, &kgs).is_err());
        assert!(parse_rate(r#"{"rates":{"KGS":-87.3}}"#, &kgs).is_err());
    }

    #[test]
    fn test_endpoint_from_url() {
        let endpoint = Endpoint::from_url("https://open.er-api.com/v6/latest/USD");
        assert_eq!(endpoint.name, "open.er-api.com");

        let endpoint = Endpoint::from_url("not a url");
        assert_eq!(endpoint.name, "not a url");
    }

    #[test]
    fn test_default_endpoints_order() {
        let endpoints = default_endpoints();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].url, "https://open.er-api.com/v6/latest/USD");
        assert_eq!(endpoints[1].url, "https://api.exchangerate-api.com/v4/latest/USD");
    }

    #[tokio::test]
    async fn test_server_error_falls_back_to_next_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let primary = server
            .mock("GET", "/v6/latest/USD")
            .with_status(500)
            .create_async()
            .await;
        let secondary = server
            .mock("GET", "/v4/latest/USD")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"rates":{"KGS":87.3}}"#)
            .create_async()
            .await;

        let fetcher =
            FallbackRateFetcher::http(endpoints_on(&server), HttpFetcherConfig::default()).unwrap();

        assert_eq!(fetcher.fetch().await.unwrap(), 87.3);
        primary.assert_async().await;
        secondary.assert_async().await;
    }

    #[tokio::test]
    async fn test_first_success_skips_remaining_endpoints() {
        let mut server = mockito::Server::new_async().await;
        let primary = server
            .mock("GET", "/v6/latest/USD")
            .match_header("accept", "application/json")
            .match_header("user-agent", mockito::Matcher::Regex("^somrate/".to_string()))
            .with_body(r#"{"result":"success","rates":{"USD":1,"KGS":86.75}}"#)
            .create_async()
            .await;
        let secondary = server
            .mock("GET", "/v4/latest/USD")
            .expect(0)
            .create_async()
            .await;

        let fetcher =
            FallbackRateFetcher::http(endpoints_on(&server), HttpFetcherConfig::default()).unwrap();

        assert_eq!(fetcher.fetch().await.unwrap(), 86.75);
        primary.assert_async().await;
        secondary.assert_async().await;
    }

    #[tokio::test]
    async fn test_body_parsed_regardless_of_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v6/latest/USD")
            .with_status(404)
            .with_body(r#"{"rates":{"KGS":85.5}}"#)
            .create_async()
            .await;

        let fetcher = EndpointFetcher::new(
            HttpFetcherConfig::default().build_client().unwrap(),
            Endpoint::new("primary", format!("{}/v6/latest/USD", server.url())),
            Currency::kgs(),
        );

        assert_eq!(fetcher.fetch().await.unwrap(), 85.5);
    }

    #[tokio::test]
    async fn test_all_endpoints_failing_reports_last_error() {
        let mut server = mockito::Server::new_async().await;
        let _primary = server
            .mock("GET", "/v6/latest/USD")
            .with_status(503)
            .create_async()
            .await;
        let _secondary = server
            .mock("GET", "/v4/latest/USD")
            .with_body("not json at all")
            .create_async()
            .await;

        let fetcher =
            FallbackRateFetcher::http(endpoints_on(&server), HttpFetcherConfig::default()).unwrap();

        let err = fetcher.fetch().await.unwrap_err();
        match &err {
            FxError::Fetch { attempts, last } => {
                assert_eq!(*attempts, 2);
                assert!(matches!(
                    last.as_ref(),
                    FxError::MalformedResponse { endpoint, .. } if endpoint == "secondary"
                ));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.root_cause().is_endpoint_failure());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let fetcher = EndpointFetcher::new(
            HttpFetcherConfig::default().build_client().unwrap(),
            Endpoint::new("closed", "http://127.0.0.1:1/v6/latest/USD"),
            Currency::kgs(),
        );

        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, FxError::Network { .. }));
    }

    #[tokio::test]
    async fn test_fallback_with_mocks() {
        let first = Arc::new(MockRateFetcher::failing("first"));
        let second = Arc::new(MockRateFetcher::with_rate("second", 87.3));
        let third = Arc::new(MockRateFetcher::with_rate("third", 1.0));

        let fetcher = FallbackRateFetcher::new(vec![
            first.clone() as Arc<dyn RateFetcher>,
            second.clone() as Arc<dyn RateFetcher>,
            third.clone() as Arc<dyn RateFetcher>,
        ]);

        assert_eq!(fetcher.fetch().await.unwrap(), 87.3);
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
        assert_eq!(third.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let fetcher = FallbackRateFetcher::new(Vec::new());
        assert!(fetcher.is_empty());
        assert!(matches!(fetcher.fetch().await, Err(FxError::NoEndpoints)));
    }

    #[tokio::test]
    async fn test_mock_scripted_responses() {
        let mock = MockRateFetcher::with_rate("mock", 85.0);
        mock.push_failure("boom");
        mock.push_rate(86.0);

        assert!(mock.fetch().await.is_err());
        assert_eq!(mock.fetch().await.unwrap(), 86.0);
        assert_eq!(mock.fetch().await.unwrap(), 85.0);
        assert_eq!(mock.calls(), 3);
    }
}
