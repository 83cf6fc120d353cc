use std::time::Duration;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use super::types::{NearbyPlace, NearbyQuery, Summary};
use crate::config::Config;
use crate::settings::Language;
use crate::util::sanitize;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://{lang}.wikipedia.org/w/api.php";
pub const DEFAULT_SUMMARY_ENDPOINT: &str = "https://{lang}.wikipedia.org/api/rest_v1/page/summary";

/// Replaced by the language code in endpoint templates
const LANG_PLACEHOLDER: &str = "{lang}";

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

// Bounds accepted by the geosearch module
const MIN_GS_RADIUS: u32 = 10;
const MAX_GS_RADIUS: u32 = 10_000;
const MAX_GS_LIMIT: u32 = 500;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Wikipedia API error: {status}")]
    Upstream { status: u16 },
    #[error("Wikipedia API rejected the request ({code}): {info}")]
    Api { code: String, info: String },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request timed out")]
    Timeout,
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Insecure endpoint {0}: HTTPS required (except localhost for testing)")]
    InsecureEndpoint(String),
}

// ============================================================================
// Endpoints
// ============================================================================

/// Validated endpoint templates.
///
/// `{lang}` anywhere in a template is replaced by the language code, which
/// for Wikipedia selects the host subdomain.
#[derive(Debug, Clone)]
pub struct Endpoints {
    search: String,
    summary: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            search: DEFAULT_SEARCH_ENDPOINT.to_string(),
            summary: DEFAULT_SUMMARY_ENDPOINT.to_string(),
        }
    }
}

impl Endpoints {
    /// # Errors
    ///
    /// `InvalidEndpoint` if a template does not resolve to a URL,
    /// `InsecureEndpoint` for plain HTTP to anything but localhost.
    pub fn new(search: impl Into<String>, summary: impl Into<String>) -> Result<Self, ContentError> {
        let endpoints = Self {
            search: search.into(),
            summary: summary.into(),
        };
        check_endpoint(&endpoints.search)?;
        check_endpoint(&endpoints.summary)?;
        Ok(endpoints)
    }

    fn search_url(&self, language: Language) -> Result<Url, ContentError> {
        resolve(&self.search, language)
    }

    fn summary_url(&self, language: Language, title: &str) -> Result<Url, ContentError> {
        let mut url = resolve(&self.summary, language)?;
        // Page titles use underscores for spaces in URLs
        let segment = title.replace(' ', "_");
        url.path_segments_mut()
            .map_err(|_| ContentError::InvalidEndpoint(self.summary.clone()))?
            .pop_if_empty()
            .push(&segment);
        Ok(url)
    }
}

fn resolve(template: &str, language: Language) -> Result<Url, ContentError> {
    Url::parse(&template.replace(LANG_PLACEHOLDER, language.code()))
        .map_err(|e| ContentError::InvalidEndpoint(format!("{template}: {e}")))
}

fn check_endpoint(template: &str) -> Result<(), ContentError> {
    let url = resolve(template, Language::En)?;
    match url.scheme() {
        "https" => Ok(()),
        "http" if matches!(url.host_str(), Some("localhost") | Some("127.0.0.1")) => {
            tracing::warn!(endpoint = %template, "Using non-HTTPS endpoint (localhost only)");
            Ok(())
        }
        "http" => {
            tracing::error!(endpoint = %template, "Rejecting non-HTTPS endpoint");
            Err(ContentError::InsecureEndpoint(template.to_string()))
        }
        scheme => Err(ContentError::InvalidEndpoint(format!(
            "{template}: unsupported scheme {scheme}"
        ))),
    }
}

fn require_coordinate(name: &str, value: Option<f64>, bound: f64) -> Result<f64, ContentError> {
    let value = value.ok_or_else(|| ContentError::InvalidArgument(format!("{name} is required")))?;
    if !value.is_finite() || value.abs() > bound {
        return Err(ContentError::InvalidArgument(format!(
            "{name} must be within -{bound}..={bound}, got {value}"
        )));
    }
    Ok(value)
}

// ============================================================================
// Wire Format
// ============================================================================

#[derive(Debug, Deserialize)]
struct GeoSearchResponse {
    query: Option<GeoSearchQuery>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct GeoSearchQuery {
    #[serde(default)]
    geosearch: Vec<GeoSearchHit>,
}

#[derive(Debug, Deserialize)]
struct GeoSearchHit {
    pageid: i64,
    title: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    dist: f64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    pageid: Option<i64>,
    title: Option<String>,
    description: Option<String>,
    extract: Option<String>,
    originalimage: Option<ImageRef>,
    thumbnail: Option<ImageRef>,
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ImageRef {
    source: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageLink>,
    mobile: Option<PageLink>,
}

#[derive(Debug, Deserialize)]
struct PageLink {
    page: Option<String>,
}

impl GeoSearchHit {
    /// `None` when nothing printable is left of the title.
    fn into_place(self) -> Option<NearbyPlace> {
        let title = sanitize(self.title);
        if title.trim().is_empty() {
            tracing::debug!(page_id = self.pageid, "Skipping geosearch hit without title");
            return None;
        }
        Some(NearbyPlace {
            id: self.pageid,
            title,
            lat: self.lat,
            lon: self.lon,
            distance: self.dist,
        })
    }
}

impl SummaryResponse {
    /// Falls back to the requested title so the result always has one.
    fn into_summary(self, requested_title: &str) -> Summary {
        let title = self
            .title
            .map(sanitize)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| requested_title.to_string());
        let image = self.originalimage.or(self.thumbnail);
        let url = self.content_urls.and_then(|urls| {
            urls.desktop
                .and_then(|link| link.page)
                .or_else(|| urls.mobile.and_then(|link| link.page))
        });

        Summary {
            id: self.pageid,
            title,
            description: self.description.map(sanitize).filter(|d| !d.is_empty()),
            extract: self.extract.map(sanitize).unwrap_or_default(),
            image_width: image.as_ref().and_then(|i| i.width),
            image_height: image.as_ref().and_then(|i| i.height),
            image: image.map(|i| i.source),
            url,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Read-only client for geosearch and page summaries.
///
/// One request per call: no retries, no caching. Transient failures are
/// returned to the caller.
#[derive(Clone)]
pub struct WikiClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    timeout: Duration,
}

impl WikiClient {
    pub fn new(http: reqwest::Client, endpoints: Endpoints) -> Self {
        Self {
            http,
            endpoints,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Build a client with the configured endpoints, user agent and timeout.
    pub fn from_config(config: &Config) -> Result<Self, ContentError> {
        let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .pool_idle_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()?;
        let endpoints = Endpoints::new(&config.search_endpoint, &config.summary_endpoint)?;
        Ok(Self::new(http, endpoints).with_timeout(timeout))
    }

    /// Places within `query.radius` meters of `(lat, lon)`, nearest first as
    /// ordered by the service.
    ///
    /// An empty result is not an error.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if a coordinate is missing or out of range,
    /// `Upstream` on a non-success status, `Api` when the service reports an
    /// error in the body.
    pub async fn find_nearby(
        &self,
        lat: Option<f64>,
        lon: Option<f64>,
        query: &NearbyQuery,
    ) -> Result<Vec<NearbyPlace>, ContentError> {
        let lat = require_coordinate("lat", lat, 90.0)?;
        let lon = require_coordinate("lon", lon, 180.0)?;

        let mut url = self.endpoints.search_url(query.language)?;
        url.query_pairs_mut()
            .append_pair("action", "query")
            .append_pair("list", "geosearch")
            .append_pair("gscoord", &format!("{lat}|{lon}"))
            .append_pair(
                "gsradius",
                &query.radius.clamp(MIN_GS_RADIUS, MAX_GS_RADIUS).to_string(),
            )
            .append_pair("gslimit", &query.limit.clamp(1, MAX_GS_LIMIT).to_string())
            .append_pair("format", "json")
            .append_pair("origin", "*");

        let response: GeoSearchResponse = self.get_json(url).await?;
        if let Some(error) = response.error {
            return Err(ContentError::Api {
                code: error.code,
                info: error.info,
            });
        }

        let places: Vec<NearbyPlace> = response
            .query
            .map(|q| q.geosearch)
            .unwrap_or_default()
            .into_iter()
            .filter_map(GeoSearchHit::into_place)
            .collect();

        tracing::debug!(
            count = places.len(),
            language = %query.language,
            radius = query.radius,
            "Resolved nearby places"
        );
        Ok(places)
    }

    /// Summary of the page titled `title` in `language`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a blank title, `Upstream` on a non-success
    /// status (404 for an unknown page).
    pub async fn fetch_summary(
        &self,
        title: &str,
        language: Language,
    ) -> Result<Summary, ContentError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ContentError::InvalidArgument("title is required".to_string()));
        }

        let url = self.endpoints.summary_url(language, title)?;
        let response: SummaryResponse = self.get_json(url).await?;
        Ok(response.into_summary(title))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ContentError> {
        tracing::trace!(url = %url, "GET");

        let response = tokio::time::timeout(self.timeout, self.http.get(url).send())
            .await
            .map_err(|_| ContentError::Timeout)?
            .map_err(ContentError::Network)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Upstream request failed");
            return Err(ContentError::Upstream {
                status: status.as_u16(),
            });
        }

        let body = read_limited(response, MAX_RESPONSE_SIZE).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

async fn read_limited(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, ContentError> {
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(ContentError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ContentError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ContentError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
