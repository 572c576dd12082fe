use async_trait::async_trait;
use futures_util::StreamExt;
use glean_core::{GleanError, GleanResult, Parameters};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_BODY_SIZE: usize = 5 * 1024 * 1024; // 5MB
const MAX_REDIRECTS: usize = 5;

const PLAIN_USER_AGENT: &str = "Glean/0.3 (+https://github.com/glean-rs/glean)";
const STEALTH_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Raw response returned by a transport.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// URL after redirects.
    pub final_url: String,
    /// Response headers, lowercased names.
    pub headers: HashMap<String, String>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
}

impl FetchResponse {
    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `content-type` header, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

/// Fetches a URL on behalf of an extraction strategy.
///
/// Implementations report network failures, timeouts and oversized bodies
/// as [`GleanError::Transport`]. Non-2xx responses are returned as-is.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Performs the fetch. `options` are the task's `options` parameter.
    async fn fetch(&self, url: &str, options: &Parameters) -> GleanResult<FetchResponse>;
}

/// Redirect hop refused by the host guard.
#[derive(Debug)]
struct RedirectDenied(String);

impl fmt::Display for RedirectDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for RedirectDenied {}

/// Plain reqwest transport with an SSRF guard and a body cap.
///
/// The guard runs on the requested URL and again on every redirect hop.
pub struct HttpTransport {
    name: String,
    client: reqwest::Client,
    default_headers: Vec<(String, String)>,
    allow_private_hosts: Arc<AtomicBool>,
    max_body_size: usize,
}

impl HttpTransport {
    /// Transport with a descriptive user agent and no extra headers.
    pub fn plain() -> GleanResult<Self> {
        Self::build("http.plain", PLAIN_USER_AGENT, Vec::new())
    }

    /// Transport that presents browser-like request headers.
    pub fn stealth() -> GleanResult<Self> {
        Self::build(
            "http.stealth",
            STEALTH_USER_AGENT,
            vec![
                (
                    "accept".to_string(),
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
                ),
                ("accept-language".to_string(), "en-US,en;q=0.9".to_string()),
            ],
        )
    }

    fn build(
        name: &str,
        user_agent: &str,
        default_headers: Vec<(String, String)>,
    ) -> GleanResult<Self> {
        let allow_private_hosts = Arc::new(AtomicBool::new(false));
        let allow = Arc::clone(&allow_private_hosts);
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                return attempt.error(RedirectDenied(format!(
                    "more than {MAX_REDIRECTS} redirects"
                )));
            }
            let target = attempt.url();
            if !matches!(target.scheme(), "http" | "https") {
                let reason = format!("redirect to unsupported scheme '{}'", target.scheme());
                return attempt.error(RedirectDenied(reason));
            }
            let denied = target
                .host_str()
                .filter(|host| !host_allowed(host, allow.load(Ordering::Relaxed)))
                .map(|host| format!("redirect to private/internal address '{host}'"));
            match denied {
                Some(reason) => attempt.error(RedirectDenied(reason)),
                None => attempt.follow(),
            }
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(policy)
            .user_agent(user_agent)
            .build()
            .map_err(|e| GleanError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.to_string(),
            client,
            default_headers,
            allow_private_hosts,
            max_body_size: MAX_BODY_SIZE,
        })
    }

    /// Lets the transport reach private and loopback addresses. Only for
    /// local testing. Cloud metadata endpoints stay blocked.
    pub fn allow_private_hosts(self, allow: bool) -> Self {
        self.allow_private_hosts.store(allow, Ordering::Relaxed);
        self
    }

    /// Overrides the body size cap.
    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    fn check_url(&self, url: &str) -> GleanResult<reqwest::Url> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| GleanError::InvalidTask(format!("Invalid URL '{url}': {e}")))?;

        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(GleanError::InvalidTask(format!(
                    "Unsupported scheme '{scheme}'. Only http/https allowed."
                )))
            }
        }

        if let Some(host) = parsed.host_str() {
            if !host_allowed(host, self.allow_private_hosts.load(Ordering::Relaxed)) {
                return Err(GleanError::InvalidTask(format!(
                    "Access denied: '{host}' is a private/internal address"
                )));
            }
        }

        Ok(parsed)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, url: &str, options: &Parameters) -> GleanResult<FetchResponse> {
        let parsed = self.check_url(url)?;

        info!(url = %url, transport = %self.name, "HTTP fetch");

        let mut request = self.client.get(parsed);
        for (key, value) in &self.default_headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(ua) = options.get("user_agent").and_then(serde_json::Value::as_str) {
            request = request.header("user-agent", ua);
        }
        if let Some(headers) = options.get("headers").and_then(serde_json::Value::as_object) {
            for (key, value) in headers {
                if let Some(v) = value.as_str() {
                    request = request.header(key.as_str(), v);
                }
            }
        }

        let response = request.send().await.map_err(|e| {
            if e.is_redirect() {
                let reason = redirect_denied(&e).unwrap_or_else(|| e.to_string());
                warn!(url = %url, reason = %reason, "Redirect refused");
                GleanError::InvalidTask(format!("Redirect refused for '{url}': {reason}"))
            } else {
                GleanError::Transport(format!("HTTP request failed: {e}"))
            }
        })?;

        if let Some(len) = response.content_length() {
            if len as usize > self.max_body_size {
                return Err(GleanError::Transport(format!(
                    "Response too large: {len} bytes (max: {} bytes)",
                    self.max_body_size
                )));
            }
        }

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|val| (k.to_string(), val.to_string())))
            .collect();

        let mut body_bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| GleanError::Transport(format!("Failed to read response body: {e}")))?;
            if body_bytes.len() + chunk.len() > self.max_body_size {
                return Err(GleanError::Transport(format!(
                    "Response too large: more than {} bytes",
                    self.max_body_size
                )));
            }
            body_bytes.extend_from_slice(&chunk);
        }

        debug!(url = %final_url, status, bytes = body_bytes.len(), "HTTP fetch complete");

        Ok(FetchResponse {
            status,
            final_url,
            headers,
            body: String::from_utf8_lossy(&body_bytes).into_owned(),
        })
    }
}

/// Metadata endpoints are refused even when private hosts are allowed.
fn host_allowed(host: &str, allow_private_hosts: bool) -> bool {
    if is_metadata_host(host) {
        return false;
    }
    allow_private_hosts || !is_private_host(host)
}

fn is_metadata_host(host: &str) -> bool {
    let host_lower = host.to_lowercase();
    let bare = host_lower.trim_start_matches('[').trim_end_matches(']');
    match bare.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.is_link_local(),
        Ok(IpAddr::V6(_)) => false,
        Err(_) => bare.starts_with("metadata.google") || bare.starts_with("metadata.aws"),
    }
}

fn redirect_denied(err: &reqwest::Error) -> Option<String> {
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        if let Some(denied) = e.downcast_ref::<RedirectDenied>() {
            return Some(denied.to_string());
        }
        source = e.source();
    }
    None
}

/// Whether a host names a private, loopback or cloud-metadata address.
pub fn is_private_host(host: &str) -> bool {
    let host_lower = host.to_lowercase();
    let bare = host_lower.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = bare.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => {
                v4.is_private()
                    || v4.is_loopback()
                    || v4.is_link_local()
                    || v4.is_unspecified()
                    || v4.is_broadcast()
            }
            IpAddr::V6(v6) => {
                v6.is_loopback()
                    || v6.is_unspecified()
                    // fc00::/7 unique local, fe80::/10 link local
                    || (v6.segments()[0] & 0xfe00) == 0xfc00
                    || (v6.segments()[0] & 0xffc0) == 0xfe80
            }
        };
    }

    bare == "localhost"
        || bare.ends_with(".localhost")
        || bare.starts_with("metadata.google")
        || bare.starts_with("metadata.aws")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_host_detection() {
        assert!(is_private_host("localhost"));
        assert!(is_private_host("127.0.0.1"));
        assert!(is_private_host("192.168.1.1"));
        assert!(is_private_host("10.0.0.1"));
        assert!(is_private_host("172.20.5.5"));
        assert!(is_private_host("169.254.169.254"));
        assert!(is_private_host("[::1]"));
        assert!(is_private_host("fd00::1"));
        assert!(is_private_host("metadata.google.internal"));
        assert!(!is_private_host("172.32.0.1"));
        assert!(!is_private_host("example.com"));
        assert!(!is_private_host("8.8.8.8"));
    }

    #[test]
    fn test_metadata_hosts_blocked_even_when_private_allowed() {
        assert!(host_allowed("127.0.0.1", true));
        assert!(!host_allowed("127.0.0.1", false));
        assert!(!host_allowed("169.254.169.254", true));
        assert!(!host_allowed("metadata.google.internal", true));
        assert!(host_allowed("example.com", false));
    }

    #[tokio::test]
    async fn test_fetch_blocks_ssrf() {
        let transport = HttpTransport::plain().unwrap();
        let err = transport
            .fetch("http://169.254.169.254/latest/meta-data/", &Parameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GleanError::InvalidTask(_)));
        assert!(err.to_string().contains("private"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_scheme() {
        let transport = HttpTransport::plain().unwrap();
        let err = transport
            .fetch("file:///etc/passwd", &Parameters::new())
            .await
            .unwrap_err();
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_fetch_response_helpers() {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());
        let resp = FetchResponse {
            status: 204,
            final_url: "https://example.com".into(),
            headers,
            body: String::new(),
        };
        assert!(resp.is_success());
        assert_eq!(resp.content_type(), Some("text/html"));
    }
}
