//! HTTP and HLS stream checks
//!
//! Direct streams are checked with a HEAD request, falling back to a partial
//! GET that reads only the first chunk of the body. HLS playlists are fetched,
//! validated, and followed down to one media segment.

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client, Response, StatusCode,
};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use super::hls::{self, HlsPlaylist};
use super::ProbeConfig;
use crate::utils::error::ProbeError;

/// Most playlist bytes read before parsing
///
/// A stream served on an HLS-looking URL would otherwise be read until the
/// probe deadline.
const MAX_PLAYLIST_BYTES: usize = 64 * 1024;

/// HTTP side of the prober
///
/// Holds one shared client so connections are pooled across probes.
pub struct HttpProber {
    /// HTTP client with configured timeouts and connection pool
    client: Client,

    /// How many master playlists may be followed before giving up
    max_variant_depth: usize,
}

impl HttpProber {
    /// Create a prober from probe settings
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::Http` if the HTTP client cannot be created
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            max_variant_depth: config.max_variant_depth,
        })
    }

    /// Check a direct HTTP stream
    ///
    /// Returns the time until the first response arrived.
    ///
    /// # Errors
    ///
    /// Returns `ProbeError` describing why the stream is not reachable
    pub async fn check_direct(&self, url: &Url) -> Result<Duration, ProbeError> {
        let started = Instant::now();

        match self.client.head(url.clone()).send().await {
            Ok(response) => {
                let latency = started.elapsed();
                let status = response.status();

                if status.is_success() {
                    return Ok(latency);
                }
                if status == StatusCode::METHOD_NOT_ALLOWED {
                    debug!(url = %url, "HEAD not allowed, trying partial GET");
                    self.partial_get(url).await?;
                    return Ok(latency);
                }
                Err(ProbeError::Status(status.as_u16()))
            }
            // A refused connection or a dead host will not answer a GET either
            Err(e) if e.is_timeout() || e.is_connect() => Err(e.into()),
            Err(e) => {
                debug!(url = %url, error = %e, "HEAD failed, trying partial GET");
                self.partial_get(url).await
            }
        }
    }

    /// GET the stream and read only its first chunk
    async fn partial_get(&self, url: &Url) -> Result<Duration, ProbeError> {
        let started = Instant::now();
        let mut response = self.client.get(url.clone()).send().await?;
        let latency = started.elapsed();

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        match response.chunk().await? {
            Some(chunk) if !chunk.is_empty() => Ok(latency),
            _ => Err(ProbeError::EmptyResponse),
        }
    }

    /// Check an HLS stream
    ///
    /// Master playlists are followed through their first variant, media
    /// playlists through their first segment. Returns the latency of the
    /// first playlist response.
    ///
    /// # Errors
    ///
    /// Returns `ProbeError` describing why the stream is not reachable
    pub async fn check_hls(&self, url: &Url) -> Result<Duration, ProbeError> {
        let mut current = url.clone();
        let mut first_latency = None;

        for _ in 0..=self.max_variant_depth {
            let started = Instant::now();
            let response = self.client.get(current.clone()).send().await?;
            let latency = *first_latency.get_or_insert(started.elapsed());

            let status = response.status();
            if !status.is_success() {
                return Err(ProbeError::Status(status.as_u16()));
            }

            // Relative references resolve against the post-redirect URL
            let base = response.url().clone();
            let body = read_playlist_body(response).await?;

            match HlsPlaylist::parse(&body)? {
                HlsPlaylist::Master { variant } => {
                    current = hls::resolve(&base, &variant)?;
                    debug!(url = %url, variant = %current, "Following HLS variant");
                }
                HlsPlaylist::Media { segment } => {
                    let segment = hls::resolve(&base, &segment)?;
                    debug!(url = %url, segment = %segment, "Checking HLS segment");
                    self.check_direct(&segment).await?;
                    return Ok(latency);
                }
                HlsPlaylist::Empty => return Ok(latency),
            }
        }

        Err(ProbeError::InvalidPlaylist(format!(
            "more than {} nested master playlists",
            self.max_variant_depth
        )))
    }
}

/// Read a playlist body, keeping at most [`MAX_PLAYLIST_BYTES`]
///
/// A capped body is cut back to its last complete line so a half-read URI
/// is never followed.
async fn read_playlist_body(mut response: Response) -> Result<String, ProbeError> {
    let mut body = Vec::new();
    let mut capped = false;

    while let Some(chunk) = response.chunk().await? {
        body.extend_from_slice(&chunk);
        if body.len() >= MAX_PLAYLIST_BYTES {
            capped = true;
            break;
        }
    }

    if capped {
        body.truncate(MAX_PLAYLIST_BYTES);
        let end = body.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
        body.truncate(end);
        debug!(bytes = body.len(), "Playlist body capped");
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}

