//! Resilient fetcher: HTTP GET with bounded exponential backoff on 5xx.
//!
//! Only server errors are retried. Any other non-200 status is terminal on
//! the attempt that produced it. Exhausting the attempts surfaces the last
//! 5xx as the same `HttpResponse` error kind.

use super::error::DataError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Status and raw body of a single HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Transport seam. One call is one request, with no retry of its own.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpResponse, DataError>;
}

/// Blocking `reqwest` transport.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("stockset/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<HttpResponse, DataError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .map_err(|e| DataError::NetworkUnreachable(format!("reading body: {e}")))?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

/// How many times to try, and the unit of the `2^attempt` backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay slept after failed attempt `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        backoff_delay(self.base_delay, attempt)
    }
}

/// Largest exponent whose `2^exponent` fits in a `u32`.
pub const MAX_BACKOFF_EXPONENT: u32 = 31;

/// `base * 2^exponent`, saturating at `Duration::MAX`.
pub fn backoff_delay(base: Duration, exponent: u32) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }
    2u32.checked_pow(exponent)
        .and_then(|factor| base.checked_mul(factor))
        .unwrap_or(Duration::MAX)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Downloads resources through an [`HttpClient`], retrying server errors.
#[derive(Clone)]
pub struct Fetcher {
    client: Arc<dyn HttpClient>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(client: Arc<dyn HttpClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// GET `url`, returning the body of the first 200 response.
    pub fn fetch(&self, url: &str) -> Result<Vec<u8>, DataError> {
        let mut last_server_error = None;

        for attempt in 0..self.policy.max_attempts {
            let resp = self.client.get(url)?;

            if resp.is_server_error() {
                if attempt + 1 < self.policy.max_attempts {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        "Error {} - Retrying in {} seconds...",
                        resp.status,
                        delay.as_secs_f64()
                    );
                    std::thread::sleep(delay);
                }
                last_server_error = Some(resp);
                continue;
            }

            if resp.status != 200 {
                return Err(http_error(resp));
            }
            return Ok(resp.body);
        }

        Err(last_server_error
            .map(http_error)
            .unwrap_or_else(|| DataError::HttpResponse {
                status: 0,
                body: "no attempts made".into(),
            }))
    }

    /// Download `url` and write the bytes to `dest`, creating parent directories.
    pub fn fetch_and_store(&self, url: &str, dest: &Path) -> Result<(), DataError> {
        info!("Downloading {} to {}", redact_url(url), dest.display());
        let body = self.fetch(url)?;
        write_file(dest, &body)
    }
}

fn http_error(resp: HttpResponse) -> DataError {
    DataError::HttpResponse {
        status: resp.status,
        body: String::from_utf8_lossy(&resp.body).into_owned(),
    }
}

/// Write `content` to `path` atomically (temp file, then rename into place).
pub fn write_file(path: &Path, content: &[u8]) -> Result<(), DataError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir {}: {e}", dir.display())))?;
    }

    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, content)
        .map_err(|e| DataError::CacheError(format!("write {}: {e}", tmp_path.display())))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DataError::CacheError(format!("atomic rename to {} failed: {e}", path.display()))
    })
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Mask the `apikey` query parameter (any case) so URLs can be logged.
pub fn redact_url(url: &str) -> String {
    let Ok(mut parsed) = reqwest::Url::parse(url) else {
        return url.to_string();
    };
    if !parsed
        .query_pairs()
        .any(|(key, _)| key.eq_ignore_ascii_case("apikey"))
    {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(key, value)| {
            let value = if key.eq_ignore_ascii_case("apikey") {
                "***".to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        responses: Mutex<VecDeque<HttpResponse>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(responses: Vec<HttpResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl HttpClient for Scripted {
        fn get(&self, _url: &str) -> Result<HttpResponse, DataError> {
            *self.calls.lock().unwrap() += 1;
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| DataError::NetworkUnreachable("script exhausted".into()))
        }
    }

    fn instant_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::ZERO,
        }
    }

    #[test]
    fn default_backoff_doubles_from_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn retries_server_errors_then_succeeds() {
        let client = Scripted::new(vec![
            HttpResponse::new(502, "bad gateway"),
            HttpResponse::new(503, "busy"),
            HttpResponse::new(200, "ok"),
        ]);
        let fetcher = Fetcher::new(client.clone(), instant_policy());

        assert_eq!(fetcher.fetch("http://x").unwrap(), b"ok".to_vec());
        assert_eq!(client.calls(), 3);
    }

    #[test]
    fn client_error_is_terminal_immediately() {
        let client = Scripted::new(vec![
            HttpResponse::new(404, "missing"),
            HttpResponse::new(200, "never reached"),
        ]);
        let fetcher = Fetcher::new(client.clone(), instant_policy());

        match fetcher.fetch("http://x") {
            Err(DataError::HttpResponse { status, body }) => {
                assert_eq!(status, 404);
                assert_eq!(body, "missing");
            }
            other => panic!("expected HttpResponse error, got {other:?}"),
        }
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn exhausting_attempts_reports_last_server_error() {
        let client = Scripted::new(vec![
            HttpResponse::new(500, "a"),
            HttpResponse::new(500, "b"),
            HttpResponse::new(500, "c"),
            HttpResponse::new(504, "d"),
            HttpResponse::new(200, "too late"),
        ]);
        let fetcher = Fetcher::new(client.clone(), instant_policy());

        match fetcher.fetch("http://x") {
            Err(DataError::HttpResponse { status, .. }) => assert_eq!(status, 504),
            other => panic!("expected HttpResponse error, got {other:?}"),
        }
        assert_eq!(client.calls(), 4);
    }

    #[test]
    fn fetch_and_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/deeper/out.csv");
        let client = Scripted::new(vec![HttpResponse::new(200, "a,b\n1,2\n")]);
        let fetcher = Fetcher::new(client, instant_policy());

        fetcher.fetch_and_store("http://x", &dest).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "a,b\n1,2\n");
        assert!(!tmp_path_for(&dest).exists());
    }

    #[test]
    fn failed_fetch_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.csv");
        let client = Scripted::new(vec![HttpResponse::new(403, "forbidden")]);
        let fetcher = Fetcher::new(client, instant_policy());

        assert!(fetcher.fetch_and_store("http://x", &dest).is_err());
        assert!(!dest.exists());
    }

    #[test]
    fn redacts_api_key() {
        assert_eq!(
            redact_url("https://h/q?symbol=AAA&apikey=SECRET&datatype=csv"),
            "https://h/q?symbol=AAA&apikey=***&datatype=csv"
        );
        assert_eq!(redact_url("https://h/q?apikey=SECRET"), "https://h/q?apikey=***");
        assert_eq!(redact_url("https://h/q?x=1"), "https://h/q?x=1");
    }

    #[test]
    fn redacts_api_key_in_any_case() {
        assert_eq!(
            redact_url("https://h/q?symbol=AAA&APIKEY=SECRET"),
            "https://h/q?symbol=AAA&APIKEY=***"
        );
        assert_eq!(redact_url("https://h/q?ApiKey=SECRET&x=1"), "https://h/q?ApiKey=***&x=1");
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let one = Duration::from_secs(1);
        assert_eq!(backoff_delay(one, MAX_BACKOFF_EXPONENT), one * 2u32.pow(31));
        assert_eq!(backoff_delay(one, 32), Duration::MAX);
        assert_eq!(backoff_delay(Duration::MAX, 1), Duration::MAX);
        assert_eq!(backoff_delay(Duration::ZERO, 40), Duration::ZERO);

        let policy = RetryPolicy {
            max_attempts: 40,
            base_delay: one,
        };
        assert_eq!(policy.delay_for(39), Duration::MAX);
    }
}
