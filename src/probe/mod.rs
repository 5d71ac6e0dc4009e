//! Stream reachability probing
//!
//! A probe performs the smallest handshake that proves a stream endpoint is
//! alive and classifies the result as a [`ProbeStatus`]. The engine never
//! retries on its own; retry policy belongs to the scheduler.
//!
//! # Handshake policy
//!
//! | Scheme                               | Handshake                                          |
//! |--------------------------------------|----------------------------------------------------|
//! | `http`, `https` (HLS)                | GET playlist, follow first variant, check segment  |
//! | `http`, `https`                      | HEAD, partial GET on 405 or HEAD transport failure |
//! | `rtmp`, `rtmps`, `rtsp`, `mms(h)`    | TCP connect                                        |
//! | `udp`, `rtp`                         | bind (join group if multicast), wait for datagram  |
//!
//! Everything else is classified as an error.

pub mod hls;
pub mod http;
pub mod socket;

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::models::{ProbeOutcome, ProbeStatus};
use crate::utils::error::ProbeError;

pub use self::http::HttpProber;

/// Reachability check for a single stream URL
///
/// Implementations must not retry internally and must be safe to call from
/// many tasks at once.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// Run a probe bounded by `timeout`
///
/// The probe future is dropped when the deadline passes, which closes any
/// socket it had open.
pub async fn probe_with_timeout<P>(prober: &P, url: &str, timeout: Duration) -> ProbeOutcome
where
    P: Probe + ?Sized,
{
    match tokio::time::timeout(timeout, prober.probe(url)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            debug!(url = %url, timeout_ms = timeout.as_millis() as u64, "Probe timed out");
            ProbeOutcome::timed_out()
        }
    }
}

/// Settings for the network prober
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Overall request timeout for HTTP requests
    pub timeout: Duration,

    /// TCP connect timeout for HTTP requests
    pub connect_timeout: Duration,

    /// User-Agent header sent with HTTP requests
    pub user_agent: String,

    /// Idle connections kept per host
    pub pool_idle_per_host: usize,

    /// Maximum number of HLS master playlists followed before giving up
    pub max_variant_depth: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: format!("iptv-checker/{}", env!("CARGO_PKG_VERSION")),
            pool_idle_per_host: 20,
            max_variant_depth: 3,
        }
    }
}

/// How a URL is probed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// HTTP Live Streaming playlist
    Hls,
    /// Direct HTTP stream
    Http,
    /// Connection oriented streaming protocol, probed by TCP connect
    Tcp { default_port: u16 },
    /// Datagram stream, probed by waiting for the first packet
    Datagram,
}

impl StreamKind {
    /// Classify a parsed URL by scheme and path
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::UnsupportedScheme` for schemes without a handshake
    pub fn classify(url: &Url) -> Result<Self, ProbeError> {
        match url.scheme() {
            "http" | "https" => {
                if is_hls_url(url) {
                    Ok(Self::Hls)
                } else {
                    Ok(Self::Http)
                }
            }
            "rtmp" => Ok(Self::Tcp { default_port: 1935 }),
            "rtmps" => Ok(Self::Tcp { default_port: 443 }),
            "rtsp" => Ok(Self::Tcp { default_port: 554 }),
            "mms" | "mmsh" => Ok(Self::Tcp { default_port: 1755 }),
            "udp" | "rtp" => Ok(Self::Datagram),
            other => Err(ProbeError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// HLS detection: `.m3u8` anywhere in the URL
pub fn is_hls_url(url: &Url) -> bool {
    url.path().ends_with(".m3u8") || url.as_str().to_lowercase().contains("m3u8")
}

impl From<ProbeError> for ProbeStatus {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::Http(e) => classify_reqwest(&e),
            ProbeError::Io(e) => match e.kind() {
                std::io::ErrorKind::ConnectionRefused => ProbeStatus::broken("connection refused"),
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
                    ProbeStatus::broken("connection reset")
                }
                std::io::ErrorKind::TimedOut => ProbeStatus::TimedOut,
                _ => ProbeStatus::error(e.to_string()),
            },
            e @ (ProbeError::Status(_)
            | ProbeError::Unreachable(_)
            | ProbeError::InvalidPlaylist(_)
            | ProbeError::EmptyResponse) => ProbeStatus::broken(e.to_string()),
            e @ (ProbeError::InvalidUrl(_) | ProbeError::UnsupportedScheme(_)) => {
                ProbeStatus::error(e.to_string())
            }
        }
    }
}

fn classify_reqwest(err: &reqwest::Error) -> ProbeStatus {
    if err.is_timeout() {
        return ProbeStatus::TimedOut;
    }
    if let Some(status) = err.status() {
        return ProbeStatus::broken(format!("HTTP {}", status.as_u16()));
    }
    if err.is_connect() {
        return ProbeStatus::broken(connect_failure_reason(err));
    }
    if err.is_builder() {
        return ProbeStatus::error(format!("invalid request: {err}"));
    }
    ProbeStatus::error(err.to_string())
}

/// Short reason for a connect failure found by walking the error chain
fn connect_failure_reason(err: &reqwest::Error) -> String {
    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return "connection refused".to_string();
            }
        }
        let text = cause.to_string().to_lowercase();
        if text.contains("dns") || text.contains("lookup") || text.contains("resolve") {
            return "DNS resolution failed".to_string();
        }
        if text.contains("refused") {
            return "connection refused".to_string();
        }
        source = cause.source();
    }
    "connection failed".to_string()
}

/// Network prober dispatching on the stream kind
pub struct StreamProber {
    http: HttpProber,
}

impl StreamProber {
    /// Create a prober with a shared HTTP client
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::Http` if the HTTP client cannot be created
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        Ok(Self {
            http: HttpProber::new(config)?,
        })
    }

    async fn handshake(&self, url: &Url) -> Result<Duration, ProbeError> {
        match StreamKind::classify(url)? {
            StreamKind::Hls => self.http.check_hls(url).await,
            StreamKind::Http => self.http.check_direct(url).await,
            StreamKind::Tcp { default_port } => socket::check_tcp(url, default_port).await,
            StreamKind::Datagram => socket::check_datagram(url).await,
        }
    }
}

#[async_trait]
impl Probe for StreamProber {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let parsed = match Url::parse(url.trim()) {
            Ok(parsed) => parsed,
            Err(e) => {
                return ProbeOutcome::failed(ProbeError::InvalidUrl(e.to_string()).into());
            }
        };

        match self.handshake(&parsed).await {
            Ok(latency) => {
                debug!(url = %url, latency_ms = latency.as_millis() as u64, "Stream reachable");
                ProbeOutcome::working(latency)
            }
            Err(e) => {
                let status = ProbeStatus::from(e);
                debug!(url = %url, status = %status, "Stream check failed");
                ProbeOutcome::failed(status)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(url: &str) -> Result<StreamKind, ProbeError> {
        StreamKind::classify(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_classify_schemes() {
        assert_eq!(kind("http://a/live.m3u8").unwrap(), StreamKind::Hls);
        assert_eq!(
            kind("https://a/play?format=m3u8&id=1").unwrap(),
            StreamKind::Hls
        );
        assert_eq!(kind("http://a/stream.ts").unwrap(), StreamKind::Http);
        assert_eq!(
            kind("rtmp://a/live").unwrap(),
            StreamKind::Tcp { default_port: 1935 }
        );
        assert_eq!(
            kind("rtsp://a/cam").unwrap(),
            StreamKind::Tcp { default_port: 554 }
        );
        assert_eq!(kind("udp://@239.0.0.1:1234").unwrap(), StreamKind::Datagram);
        assert!(matches!(
            kind("ftp://a/file"),
            Err(ProbeError::UnsupportedScheme(s)) if s == "ftp"
        ));
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            ProbeStatus::from(ProbeError::Status(404)),
            ProbeStatus::broken("HTTP 404")
        );
        let timed_out = std::io::Error::from(std::io::ErrorKind::TimedOut);
        assert_eq!(ProbeStatus::from(ProbeError::Io(timed_out)), ProbeStatus::TimedOut);
        assert!(matches!(
            ProbeStatus::from(ProbeError::UnsupportedScheme("ftp".into())),
            ProbeStatus::Error { .. }
        ));
        let refused = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert_eq!(
            ProbeStatus::from(ProbeError::Io(refused)),
            ProbeStatus::broken("connection refused")
        );
    }

    struct Never;

    #[async_trait]
    impl Probe for Never {
        async fn probe(&self, _url: &str) -> ProbeOutcome {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_probe_with_timeout_bounds_hanging_probe() {
        let started = std::time::Instant::now();
        let outcome = probe_with_timeout(&Never, "http://x", Duration::from_millis(50)).await;

        assert_eq!(outcome.status, ProbeStatus::TimedOut);
        assert!(outcome.latency.is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_invalid_url_is_error() {
        let prober = StreamProber::new(&ProbeConfig::default()).unwrap();
        let outcome = prober.probe("not a url").await;
        assert!(matches!(outcome.status, ProbeStatus::Error { .. }));
    }

    #[tokio::test]
    async fn test_unsupported_scheme_is_error() {
        let prober = StreamProber::new(&ProbeConfig::default()).unwrap();
        let outcome = prober.probe("ftp://example.com/stream").await;
        assert_eq!(
            outcome.status,
            ProbeStatus::error("Unsupported scheme: ftp")
        );
    }
}
