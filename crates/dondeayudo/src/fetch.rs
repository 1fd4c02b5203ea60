//! Remote fetcher for the public list endpoint.
//!
//! `GET {base}/api/puntos?limit=N&page=P` answers with
//! `{data, total, page, limit}`. The fetcher walks the pages until the
//! dataset is exhausted, transforms each record and applies the public
//! visibility filter.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::error::NetworkError;
use crate::point::Point;
use crate::transform::{transform_batch, ApiRecord};

const LIST_PATH: &str = "api/puntos";

/// Something that can produce the current set of points.
#[async_trait]
pub trait PointSource: Send + Sync {
    /// Fetch every point.
    ///
    /// With `include_unverified` false, only publicly visible points are
    /// returned. An empty list is a valid answer.
    ///
    /// # Errors
    ///
    /// Returns a [`NetworkError`] if the data could not be retrieved.
    async fn fetch(&self, include_unverified: bool) -> Result<Vec<Point>, NetworkError>;
}

/// One page of the list endpoint.
///
/// Older deployments return a bare array with no paging metadata.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListBody {
    Bare(Vec<Value>),
    Paged {
        #[serde(default)]
        data: Vec<Value>,
        total: Option<usize>,
        limit: Option<usize>,
    },
}

/// Normalize a base URL so relative joins land under it.
pub(crate) fn base_url(raw: &str) -> Result<Url, NetworkError> {
    let mut url = Url::parse(raw).map_err(|e| NetworkError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Join an endpoint path onto a normalized base.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, NetworkError> {
    base.join(path).map_err(|e| NetworkError::InvalidUrl {
        url: format!("{base}{path}"),
        message: e.to_string(),
    })
}

/// Build an HTTP client with the given timeout.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, NetworkError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("dondeayudo/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(NetworkError::Client)
}

/// Pass a success response through, turning any other status into an error.
pub(crate) async fn check_status(
    url: &Url,
    response: reqwest::Response,
) -> Result<reqwest::Response, NetworkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(NetworkError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// Turn a response into its JSON body, mapping failures.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    url: &Url,
    response: reqwest::Response,
) -> Result<T, NetworkError> {
    check_status(url, response)
        .await?
        .json::<T>()
        .await.map_err(|source| NetworkError::Decode {
        url: url.to_string(),
        source,
    })
}

/// [`PointSource`] backed by the public HTTP API.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: reqwest::Client,
    list_url: Url,
    page_size: usize,
    max_pages: usize,
}

impl RemoteFetcher {
    /// Create a fetcher for the API at `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the client cannot be built.
    pub fn new(
        base: &str,
        page_size: usize,
        max_pages: usize,
        timeout: Duration,
    ) -> Result<Self, NetworkError> {
        let list_url = endpoint(&base_url(base)?, LIST_PATH)?;
        Ok(Self {
            client: http_client(timeout)?,
            list_url,
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
        })
    }

    /// Create a fetcher from the `[api]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the client cannot be built.
    pub fn from_config(api: &ApiConfig) -> Result<Self, NetworkError> {
        Self::new(
            &api.base_url,
            api.page_size,
            api.max_pages,
            Duration::from_secs(api.timeout_secs),
        )
    }

    async fn get_page(&self, page: usize) -> Result<ListBody, NetworkError> {
        let url = &self.list_url;
        debug!("GET {} page={} limit={}", url, page, self.page_size);

        let response = self
            .client
            .get(url.clone())
            .query(&[("limit", self.page_size), ("page", page)])
            .send()
            .await
            .map_err(|source| NetworkError::Transport {
                url: url.to_string(),
                source,
            })?;

        read_json(url, response).await
    }

    /// Download every raw record, following pagination.
    ///
    /// Stops on an empty page, a page shorter than the effective limit, once
    /// `total` records are in hand, or at the page cap.
    async fn fetch_raw(&self) -> Result<Vec<Value>, NetworkError> {
        let mut records = Vec::new();

        for page in 1..=self.max_pages {
            let (data, total, limit) = match self.get_page(page).await? {
                ListBody::Bare(data) => {
                    records.extend(data);
                    break;
                }
                ListBody::Paged { data, total, limit } => (data, total, limit),
            };

            let received = data.len();
            // The server may clamp the page size; trust the limit it echoes.
            let effective_limit = limit.filter(|l| *l > 0).unwrap_or(self.page_size);
            records.extend(data);

            // A short or empty page is the last one
            if received == 0 || received < effective_limit {
                break;
            }
            // Full page, but everything announced is already here
            if total.is_some_and(|t| records.len() >= t) {
                break;
            }
            if page == self.max_pages {
                warn!(
                    "Stopped after {} pages with {} records; more may exist",
                    self.max_pages,
                    records.len()
                );
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl PointSource for RemoteFetcher {
    async fn fetch(&self, include_unverified: bool) -> Result<Vec<Point>, NetworkError> {
        let raw = self.fetch_raw().await?;
        let received = raw.len();

        let batch = transform_batch::<ApiRecord>(raw);
        if !batch.skipped.is_empty() {
            warn!(
                "Skipped {} of {} records that could not be mapped",
                batch.skipped.len(),
                received
            );
        }

        let points: Vec<Point> = if include_unverified {
            batch.points
        } else {
            batch
                .points
                .into_iter()
                .filter(Point::is_publicly_visible)
                .collect()
        };

        info!("Fetched {} points ({} records received)", points.len(), received);
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::{Category, PublicationState};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(id: usize, categoria: &str, estado: &str) -> Value {
        json!({
            "id": format!("p{id}"),
            "nombre": format!("Punto {id}"),
            "latitud": -33.0 - (id as f64) / 10_000.0,
            "longitud": -71.5,
            "categoria": categoria,
            "estado": estado,
        })
    }

    fn published(range: std::ops::Range<usize>) -> Vec<Value> {
        range.map(|i| record(i, "acopio", "publicado")).collect()
    }

    fn fetcher(server: &MockServer, page_size: usize) -> RemoteFetcher {
        RemoteFetcher::new(&server.uri(), page_size, 10, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_follows_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/puntos"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": published(0..1000), "total": 1500, "page": 1, "limit": 1000
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/puntos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": published(1000..1500), "total": 1500, "page": 2, "limit": 1000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let points = fetcher(&server, 1000).fetch(false).await.unwrap();

        assert_eq!(points.len(), 1500);
        assert_eq!(points[0].id, "p0");
        assert_eq!(points[1499].id, "p1499");
    }

    #[tokio::test]
    async fn test_fetch_respects_server_clamped_limit() {
        let server = MockServer::start().await;
        for page in 1..=3 {
            let start = (page - 1) * 100;
            let end = (start + 100).min(250);
            Mock::given(method("GET"))
                .and(path("/api/puntos"))
                .and(query_param("page", page.to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "data": published(start..end), "total": 250, "page": page, "limit": 100
                })))
                .mount(&server)
                .await;
        }

        let points = fetcher(&server, 1000).fetch(false).await.unwrap();
        assert_eq!(points.len(), 250);
    }

    #[tokio::test]
    async fn test_fetch_sends_limit_and_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/puntos"))
            .and(query_param("limit", "50"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": published(0..3), "total": 3, "page": 1, "limit": 50
            })))
            .expect(1)
            .mount(&server)
            .await;

        let points = fetcher(&server, 50).fetch(false).await.unwrap();
        assert_eq!(points.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_stops_at_page_cap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/puntos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": published(0..2), "limit": 2
            })))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = RemoteFetcher::new(&server.uri(), 2, 3, Duration::from_secs(5)).unwrap();
        let raw = fetcher.fetch_raw().await.unwrap();
        assert_eq!(raw.len(), 6);
    }

    #[tokio::test]
    async fn test_fetch_bare_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/puntos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(published(0..4))))
            .expect(1)
            .mount(&server)
            .await;

        let points = fetcher(&server, 4).fetch(false).await.unwrap();
        assert_eq!(points.len(), 4);
    }

    #[tokio::test]
    async fn test_fetch_zero_results_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/puntos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [], "total": 0, "page": 1, "limit": 1000
            })))
            .mount(&server)
            .await;

        let points = fetcher(&server, 1000).fetch(false).await.unwrap();
        assert!(points.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/puntos"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = fetcher(&server, 1000).fetch(false).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/puntos"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": []}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let fetcher =
            RemoteFetcher::new(&server.uri(), 10, 1, Duration::from_millis(100)).unwrap();
        let err = fetcher.fetch(false).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let fetcher =
            RemoteFetcher::new("http://127.0.0.1:9", 10, 1, Duration::from_secs(1)).unwrap();
        let err = fetcher.fetch(false).await.unwrap_err();
        assert!(matches!(err, NetworkError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/puntos"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = fetcher(&server, 10).fetch(false).await.unwrap_err();
        assert!(matches!(err, NetworkError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_visibility_filter() {
        let server = MockServer::start().await;
        let data = vec![
            record(1, "acopio", "publicado"),
            record(2, "acopio", "revision"),
            record(3, "sos", "revision"),
            record(4, "sos", "oculto"),
            record(5, "informacion", "rechazado"),
            record(6, "solicitud_ayuda", "borrador"),
        ];
        Mock::given(method("GET"))
            .and(path("/api/puntos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": data, "total": 6, "page": 1, "limit": 1000
            })))
            .mount(&server)
            .await;

        let fetcher = fetcher(&server, 1000);

        let public = fetcher.fetch(false).await.unwrap();
        let ids: Vec<&str> = public.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p3"]);
        assert_eq!(public[1].category, Category::Emergency);
        assert_eq!(public[1].state, PublicationState::PendingReview);

        let everything = fetcher.fetch(true).await.unwrap();
        assert_eq!(everything.len(), 6);
    }

    #[tokio::test]
    async fn test_invalid_records_are_skipped() {
        let server = MockServer::start().await;
        let mut bad_coords = record(2, "acopio", "publicado");
        bad_coords["latitud"] = json!(0);
        let mut bad_category = record(3, "acopio", "publicado");
        bad_category["categoria"] = json!("otra");
        Mock::given(method("GET"))
            .and(path("/api/puntos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [record(1, "acopio", "publicado"), bad_coords, bad_category, "junk"],
                "total": 4
            })))
            .mount(&server)
            .await;

        let points = fetcher(&server, 1000).fetch(false).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].id, "p1");
    }

    #[test]
    fn test_base_url_keeps_path_prefix() {
        let base = base_url("https://example.org/app").unwrap();
        let url = endpoint(&base, LIST_PATH).unwrap();
        assert_eq!(url.as_str(), "https://example.org/app/api/puntos");

        let base = base_url("https://example.org").unwrap();
        let url = endpoint(&base, LIST_PATH).unwrap();
        assert_eq!(url.as_str(), "https://example.org/api/puntos");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = RemoteFetcher::new("not a url", 10, 1, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, NetworkError::InvalidUrl { .. }));
    }
}
