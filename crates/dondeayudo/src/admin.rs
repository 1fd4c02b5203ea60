//! Client for the authenticated admin endpoints.
//!
//! Every call carries the configured bearer token. Points coming back from
//! the backend go through the same transform as the public list, so callers
//! always see [`Point`]s.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

use crate::config::ApiConfig;
use crate::error::{Error, NetworkError, Result};
use crate::fetch::{base_url, check_status, endpoint, http_client, read_json};
use crate::point::{
    valid_coordinates, CapacityStatus, Category, Point, PublicationState, Urgency,
};
use crate::transform::{transform_batch, transform_one, ApiRecord};

/// Prefix the backend uses for rejection notes.
const REJECTION_PREFIX: &str = "RECHAZADO";

/// Fields for a new point, in backend wire names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPoint {
    /// Display name.
    #[serde(rename = "nombre")]
    pub name: String,
    /// Latitude in degrees.
    #[serde(rename = "latitud")]
    pub lat: f64,
    /// Longitude in degrees.
    #[serde(rename = "longitud")]
    pub lng: f64,
    /// Coarse classification; required.
    #[serde(rename = "categoria")]
    pub category: Option<Category>,
    /// Free-text subtype.
    #[serde(rename = "subtipo", default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Street address.
    #[serde(rename = "direccion", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// City or commune.
    #[serde(rename = "ciudad", default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Main contact.
    #[serde(rename = "contacto_principal", default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    /// Contact person.
    #[serde(rename = "contacto_nombre", default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    /// Opening hours as free text.
    #[serde(rename = "horario", default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    /// Initial state; the backend defaults to pending review.
    #[serde(rename = "estado", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PublicationState>,
    /// Needs as free text.
    #[serde(rename = "necesidades_raw", default, skip_serializing_if = "Option::is_none")]
    pub needs_text: Option<String>,
    /// Need tags.
    #[serde(rename = "necesidades_tags", default, skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,
    /// Depot capacity.
    #[serde(rename = "capacidad_estado", default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<CapacityStatus>,
    /// Reported urgency.
    #[serde(rename = "nivel_urgencia", default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    /// Notes visible only to admins.
    #[serde(rename = "notas_internas", default, skip_serializing_if = "Option::is_none")]
    pub internal_notes: Option<String>,
}

impl NewPoint {
    /// Check the fields the backend requires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPoint`] naming the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_point("nombre is required"));
        }
        if !valid_coordinates(self.lat, self.lng) {
            return Err(Error::invalid_point(format!(
                "coordinates ({}, {}) are not a valid non-zero location",
                self.lat, self.lng
            )));
        }
        if self.category.is_none() {
            return Err(Error::invalid_point("categoria is required"));
        }
        Ok(())
    }
}

/// A partial update; only the fields that are set are sent.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointUpdate {
    #[serde(rename = "nombre", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "latitud", default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(rename = "longitud", default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(rename = "categoria", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(rename = "subtipo", default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(rename = "direccion", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "ciudad", default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(rename = "contacto_principal", default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(rename = "horario", default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(rename = "necesidades_raw", default, skip_serializing_if = "Option::is_none")]
    pub needs_text: Option<String>,
    #[serde(rename = "capacidad_estado", default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<CapacityStatus>,
    #[serde(rename = "nivel_urgencia", default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    #[serde(rename = "notas_internas", default, skip_serializing_if = "Option::is_none")]
    pub internal_notes: Option<String>,
}

impl PointUpdate {
    /// Reject coordinates that would make the point unmappable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPoint`] for a blank name or a bad coordinate.
    pub fn validate(&self) -> Result<()> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(Error::invalid_point("nombre cannot be blank"));
        }
        if let Some(lat) = self.lat {
            if !lat.is_finite() || lat == 0.0 || !(-90.0..=90.0).contains(&lat) {
                return Err(Error::invalid_point(format!("invalid latitud {lat}")));
            }
        }
        if let Some(lng) = self.lng {
            if !lng.is_finite() || lng == 0.0 || !(-180.0..=180.0).contains(&lng) {
                return Err(Error::invalid_point(format!("invalid longitud {lng}")));
            }
        }
        Ok(())
    }
}

/// Filters for the admin list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminFilter {
    /// Only points in this state.
    pub state: Option<PublicationState>,
    /// Only points of this category.
    pub category: Option<Category>,
    /// Only points with this subtype.
    pub subtype: Option<String>,
    /// Only points in this city.
    pub city: Option<String>,
    /// Page number, starting at 1.
    pub page: usize,
    /// Page size; the backend caps it at 100.
    pub limit: usize,
}

impl Default for AdminFilter {
    fn default() -> Self {
        Self {
            state: None,
            category: None,
            subtype: None,
            city: None,
            page: 1,
            limit: 50,
        }
    }
}

impl AdminFilter {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("page", self.page.max(1).to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(state) = self.state {
            query.push(("estado", state.as_str().to_string()));
        }
        if let Some(category) = self.category {
            query.push(("categoria", category.as_str().to_string()));
        }
        if let Some(subtype) = &self.subtype {
            query.push(("subtipo", subtype.clone()));
        }
        if let Some(city) = &self.city {
            query.push(("ciudad", city.clone()));
        }
        query
    }
}

/// One page of the admin list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminPage {
    /// Points on this page, in any state.
    pub points: Vec<Point>,
    /// Records on this page that could not be mapped.
    pub skipped: usize,
    /// Total matching records, when reported.
    pub total: Option<usize>,
    /// Page number.
    pub page: usize,
    /// Page size used by the backend.
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    data: Vec<Value>,
    total: Option<usize>,
    page: Option<usize>,
    limit: Option<usize>,
}

/// Client for `/api/admin/puntos`.
#[derive(Debug, Clone)]
pub struct AdminClient {
    client: reqwest::Client,
    base: Url,
    token: String,
}

impl AdminClient {
    /// Create a client for the API at `base` using `token`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingAdminToken`] if the token is absent or blank,
    /// or a network error if the URL is invalid.
    pub fn new(base: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(Error::MissingAdminToken)?;
        Ok(Self {
            client: http_client(timeout)?,
            base: base_url(base)?,
            token: token.to_string(),
        })
    }

    /// Create a client from the `[api]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingAdminToken`] if no token is configured.
    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        Self::new(
            &api.base_url,
            api.admin_token.as_deref(),
            Duration::from_secs(api.timeout_secs),
        )
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(endpoint(&self.base, path)?)
    }

    /// `{collection}/{id}[/{action}]`, with `id` encoded as one segment.
    fn point_url(&self, collection: &str, id: &str, action: Option<&str>) -> Result<Url> {
        if id.trim().is_empty() || id == "." || id == ".." {
            return Err(Error::invalid_point(format!("invalid point id '{id}'")));
        }
        let mut url = self.url(collection)?;
        let shown = url.to_string();
        url.path_segments_mut()
            .map_err(|()| NetworkError::InvalidUrl {
                url: shown,
                message: "URL cannot take path segments".to_string(),
            })?
            .pop_if_empty()
            .push(id)
            .extend(action);
        Ok(url)
    }

    async fn execute(
        &self,
        url: &Url,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| {
                NetworkError::Transport {
                    url: url.to_string(),
                    source,
                }
                .into()
            })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        url: &Url,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = self.execute(url, request).await?;
        Ok(read_json(url, response).await?)
    }

    fn into_point(record: Value) -> Result<Point> {
        Ok(transform_one::<ApiRecord>(0, record)?)
    }

    /// List points in any state.
    ///
    /// # Errors
    ///
    /// Returns a network error if the request fails.
    pub async fn list(&self, filter: &AdminFilter) -> Result<AdminPage> {
        let url = self.url("api/admin/puntos")?;
        debug!("GET {} {:?}", url, filter);
        let body: ListResponse = self
            .send(&url, self.client.get(url.clone()).query(&filter.query()))
            .await?;

        let batch = transform_batch::<ApiRecord>(body.data);
        Ok(AdminPage {
            skipped: batch.skipped.len(),
            points: batch.points,
            total: body.total,
            page: body.page.unwrap_or(filter.page),
            limit: body.limit.unwrap_or(filter.limit),
        })
    }

    /// Fetch one point by id.
    ///
    /// # Errors
    ///
    /// Returns a network error, or a transform error if the record is not
    /// mappable.
    pub async fn get(&self, id: &str) -> Result<Point> {
        let url = self.point_url("api/puntos", id, None)?;
        let record: Value = self.send(&url, self.client.get(url.clone())).await?;
        Self::into_point(record)
    }

    /// Create a point after checking its required fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPoint`] before any request if validation
    /// fails, otherwise a network or transform error.
    pub async fn create(&self, point: &NewPoint) -> Result<Point> {
        point.validate()?;
        let url = self.url("api/admin/puntos")?;
        let record: Value = self
            .send(&url, self.client.post(url.clone()).json(point))
            .await?;
        let created = Self::into_point(record)?;
        info!("Created point {} ({})", created.id, created.name);
        Ok(created)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPoint`] for invalid fields, otherwise a
    /// network or transform error.
    pub async fn update(&self, id: &str, update: &PointUpdate) -> Result<Point> {
        update.validate()?;
        let url = self.point_url("api/admin/puntos", id, None)?;
        let record: Value = self
            .send(&url, self.client.patch(url.clone()).json(update))
            .await?;
        Self::into_point(record)
    }

    /// Move a point to another publication state.
    ///
    /// Drafts cannot be set through this endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPoint`] for [`PublicationState::Draft`],
    /// otherwise a network or transform error.
    pub async fn set_state(&self, id: &str, state: PublicationState) -> Result<Point> {
        if state == PublicationState::Draft {
            return Err(Error::invalid_point(
                "state can only be publicado, revision, oculto or rechazado",
            ));
        }
        let url = self.point_url("api/admin/puntos", id, Some("estado"))?;
        let record: Value = self
            .send(
                &url,
                self.client
                    .patch(url.clone())
                    .json(&json!({ "estado": state.as_str() })),
            )
            .await?;
        info!("Point {} is now {}", id, state);
        Self::into_point(record)
    }

    /// Publish a point. The backend stamps the verifier and time.
    ///
    /// # Errors
    ///
    /// Returns a network or transform error.
    pub async fn verify(&self, id: &str) -> Result<Point> {
        self.set_state(id, PublicationState::Published).await
    }

    /// Reject a point, recording the reason in its internal notes.
    ///
    /// # Errors
    ///
    /// Returns a network or transform error.
    pub async fn reject(&self, id: &str, reason: &str) -> Result<Point> {
        let notes = PointUpdate {
            internal_notes: Some(format!("{REJECTION_PREFIX}: {}", reason.trim())),
            ..PointUpdate::default()
        };
        self.update(id, &notes).await?;
        self.set_state(id, PublicationState::Rejected).await
    }

    /// Delete a point.
    ///
    /// # Errors
    ///
    /// Returns a network error if the request fails.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let url = self.point_url("api/admin/puntos", id, None)?;
        let response = self.execute(&url, self.client.delete(url.clone())).await?;
        check_status(&url, response).await?;
        info!("Deleted point {}", id);
        Ok(())
    }
}
