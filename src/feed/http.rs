use std::thread;
use std::time::Duration;

/// Browser-like agent; some raw-content hosts throttle unknown clients.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("request to {url} failed after {attempts} attempt(s): {message}")]
    Transport {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("unexpected status code {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("failed to read response body from {url}: {message}")]
    Body { url: String, message: String },
}

/// Retrieves a raw payload from a URL.
///
/// Closures of the right shape implement this too, which is how tests and
/// alternative transports plug into feed processing.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

impl<F> Fetcher for F
where
    F: Fn(&str) -> Result<Vec<u8>, FetchError>,
{
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self(url)
    }
}

/// Blocking HTTP fetcher with a fixed retry policy.
///
/// Transport failures (connection errors, timeouts) are retried up to
/// three attempts in total with a fixed delay in between. A non-success
/// status is returned immediately.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    attempts: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            attempts: MAX_ATTEMPTS,
            retry_delay: RETRY_DELAY,
        })
    }

    pub fn with_retry(mut self, attempts: u32, retry_delay: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut last_error = String::new();

        for attempt in 1..=self.attempts {
            match self.client.get(url).send() {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }

                    let body = response.bytes().map_err(|e| FetchError::Body {
                        url: url.to_string(),
                        message: e.to_string(),
                    })?;
                    tracing::debug!(url, bytes = body.len(), attempt, "fetched payload");
                    return Ok(body.to_vec());
                }
                Err(e) => {
                    tracing::warn!(url, attempt, error = %e, "request failed");
                    last_error = e.to_string();
                    if attempt < self.attempts {
                        thread::sleep(self.retry_delay);
                    }
                }
            }
        }

        Err(FetchError::Transport {
            url: url.to_string(),
            attempts: self.attempts,
            message: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Serves `response` to every connection and counts requests.
    fn serve(response: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/feed", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                counter.fetch_add(1, Ordering::SeqCst);

                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while let Ok(n) = stream.read(&mut buf) {
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                    if request.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let _ = stream.write_all(response.as_bytes());
            }
        });

        (url, hits)
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new()
            .unwrap()
            .with_retry(3, Duration::from_millis(0))
    }

    #[test]
    fn test_fetch_success() {
        let (url, hits) = serve(
            "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
        );

        let body = fetcher().fetch(&url).unwrap();
        assert_eq!(body, b"hello");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fetch_error_status_is_not_retried() {
        let (url, hits) = serve(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );

        let err = fetcher().fetch(&url).unwrap_err();
        assert_eq!(
            err,
            FetchError::Status {
                url: url.clone(),
                status: 503
            }
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    /// Accepts every connection and closes it without answering.
    fn serve_hangup() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/feed", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        (url, hits)
    }

    #[test]
    fn test_fetch_transport_failure_retries() {
        let (url, hits) = serve_hangup();

        match fetcher().fetch(&url).unwrap_err() {
            FetchError::Transport { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_fetch_single_attempt_policy() {
        let (url, hits) = serve_hangup();
        let fetcher = HttpFetcher::new()
            .unwrap()
            .with_retry(1, Duration::from_millis(0));

        assert!(matches!(
            fetcher.fetch(&url),
            Err(FetchError::Transport { attempts: 1, .. })
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closure_fetcher() {
        let fetcher = |url: &str| -> Result<Vec<u8>, FetchError> { Ok(url.as_bytes().to_vec()) };
        assert_eq!(Fetcher::fetch(&fetcher, "abc").unwrap(), b"abc");
    }
}
