//! Canonical aid-point types.
//!
//! A [`Point`] is what the map renders. It is produced from backend or
//! legacy records by [`transform`](crate::transform) and never holds a
//! missing or out-of-range coordinate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse classification of a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Informational point (shelter, health post, fire station...).
    #[serde(rename = "informacion", alias = "information", alias = "informational")]
    Information,
    /// Supply depot collecting donations.
    #[serde(rename = "acopio")]
    SupplyDepot,
    /// A request for help from an affected zone.
    #[serde(rename = "solicitud_ayuda")]
    HelpRequest,
    /// Emergency (SOS) report.
    #[serde(rename = "sos")]
    Emergency,
}

impl Category {
    /// All categories, in display order.
    pub const ALL: [Self; 4] = [
        Self::Information,
        Self::SupplyDepot,
        Self::HelpRequest,
        Self::Emergency,
    ];

    /// Wire value used by the backend.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Information => "informacion",
            Self::SupplyDepot => "acopio",
            Self::HelpRequest => "solicitud_ayuda",
            Self::Emergency => "sos",
        }
    }

    /// Parse a wire value, accepting the English aliases for information.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "informacion" | "información" | "information" | "informational" => {
                Some(Self::Information)
            }
            "acopio" => Some(Self::SupplyDepot),
            "solicitud_ayuda" => Some(Self::HelpRequest),
            "sos" => Some(Self::Emergency),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow status controlling public visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PublicationState {
    /// Not yet submitted.
    #[serde(rename = "borrador")]
    Draft,
    /// Waiting for a verifier.
    #[serde(rename = "revision")]
    PendingReview,
    /// Visible on the public map.
    #[serde(rename = "publicado", alias = "activo")]
    Published,
    /// Removed from the public map.
    #[serde(rename = "oculto")]
    Hidden,
    /// Rejected by a verifier.
    #[serde(rename = "rechazado")]
    Rejected,
}

impl PublicationState {
    /// All states, in workflow order.
    pub const ALL: [Self; 5] = [
        Self::Draft,
        Self::PendingReview,
        Self::Published,
        Self::Hidden,
        Self::Rejected,
    ];

    /// Wire value used by the backend.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "borrador",
            Self::PendingReview => "revision",
            Self::Published => "publicado",
            Self::Hidden => "oculto",
            Self::Rejected => "rechazado",
        }
    }

    /// Parse a wire value. `activo` is the older spelling of published.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "borrador" | "draft" => Some(Self::Draft),
            "revision" | "revisión" | "pending" => Some(Self::PendingReview),
            "publicado" | "activo" | "published" => Some(Self::Published),
            "oculto" | "hidden" => Some(Self::Hidden),
            "rechazado" | "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for PublicationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How full a supply depot is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapacityStatus {
    /// Accepting donations.
    #[serde(rename = "abierto")]
    Open,
    /// Close to full.
    #[serde(rename = "por_llenar")]
    Filling,
    /// Full.
    #[serde(rename = "colapsado")]
    Full,
    /// Closed.
    #[serde(rename = "cerrado")]
    Closed,
}

impl CapacityStatus {
    /// Parse a wire value, accepting the English spellings of older exports.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "abierto" | "open" => Some(Self::Open),
            "por_llenar" | "filling" => Some(Self::Filling),
            "colapsado" | "full" => Some(Self::Full),
            "cerrado" | "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Urgency reported on a help request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Urgency {
    /// Low.
    #[serde(rename = "baja")]
    Low,
    /// Medium.
    #[serde(rename = "media")]
    Medium,
    /// High.
    #[serde(rename = "alta")]
    High,
    /// Critical.
    #[serde(rename = "critica")]
    Critical,
}

impl Urgency {
    /// Parse a wire value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "baja" => Some(Self::Low),
            "media" => Some(Self::Medium),
            "alta" => Some(Self::High),
            "critica" | "crítica" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Opening hours of a point.
///
/// `formatted` always holds the human-readable text. The other fields are
/// filled when the text follows the `"<days> | <start> - <end>"` layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Text as shown to users.
    pub formatted: String,
    /// Days of operation.
    pub days: Option<String>,
    /// Opening time.
    pub start: Option<String>,
    /// Closing time.
    pub end: Option<String>,
}

/// People living at a help-request location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupants {
    /// Children.
    pub children: u32,
    /// Teenagers.
    pub teenagers: u32,
    /// Adults.
    pub adults: u32,
    /// Elderly people.
    pub elderly: u32,
}

impl Occupants {
    /// Total number of people, saturating at `u32::MAX`.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.children
            .saturating_add(self.teenagers)
            .saturating_add(self.adults)
            .saturating_add(self.elderly)
    }
}

/// Hazards and on-site facilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteFlags {
    /// Asbestos reported on site.
    pub asbestos_risk: bool,
    /// Volunteers are needed.
    pub requires_volunteers: bool,
    /// Bathrooms available.
    pub has_bathrooms: bool,
    /// Electricity available.
    pub has_electricity: bool,
    /// Mobile signal available.
    pub has_signal: bool,
}

/// One mappable aid location or report.
///
/// Every optional field is always serialized (as `null` or `[]`), so
/// consumers can rely on key presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Opaque unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display type: the subtype when present, otherwise the category.
    #[serde(rename = "type")]
    pub point_type: String,
    /// Latitude in degrees, within [-90, 90].
    pub lat: f64,
    /// Longitude in degrees, within [-180, 180].
    pub lng: f64,
    /// Coarse classification.
    pub category: Category,
    /// Free-text subtype used for icons and aliases.
    pub subtype: Option<String>,
    /// Workflow status.
    pub state: PublicationState,
    /// Derived: state is published.
    pub verified: bool,
    /// Derived: the point is operating (published or pending review).
    pub active: bool,
    /// Street address.
    pub address: Option<String>,
    /// City or commune.
    pub city: Option<String>,
    /// Main contact (phone, email, handle).
    pub contact: Option<String>,
    /// Name of the contact person.
    pub contact_name: Option<String>,
    /// Opening hours.
    pub schedule: Option<Schedule>,
    /// Who verified the point.
    pub verifier: Option<String>,
    /// When the point was verified.
    pub verified_at: Option<DateTime<Utc>>,
    /// Normalized need tags.
    pub needs: Vec<String>,
    /// Needs as originally written.
    pub needs_text: Option<String>,
    /// Kinds of help offered or requested.
    pub help_categories: Vec<String>,
    /// Reported urgency.
    pub urgency: Option<Urgency>,
    /// Depot capacity.
    pub capacity: Option<CapacityStatus>,
    /// Name of the affected zone.
    pub zone_name: Option<String>,
    /// Whether the location is currently inhabited.
    pub inhabited: Option<bool>,
    /// Demographic counters.
    pub occupants: Occupants,
    /// Animals on site.
    pub animals: Option<String>,
    /// Hazard and facility flags.
    pub site: SiteFlags,
    /// How to get there.
    pub logistics: Option<String>,
    /// Kinds of access (road, foot, ...).
    pub access_types: Vec<String>,
    /// Evidence photo references.
    pub media: Vec<String>,
    /// Attached KML file reference.
    pub kml_file: Option<String>,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    pub updated_at: Option<DateTime<Utc>>,
    /// Creator identifier.
    pub created_by: Option<String>,
}

impl Point {
    /// Whether the point belongs on the public map.
    ///
    /// Published points are public. Emergency reports still pending review
    /// are shown too, as unverified community reports.
    #[must_use]
    pub fn is_publicly_visible(&self) -> bool {
        is_publicly_visible(self.state, self.category)
    }

    /// Whether this point matches a type filter on display type, subtype or
    /// category.
    #[must_use]
    pub fn matches_type(&self, filter: &str) -> bool {
        self.point_type == filter
            || self.subtype.as_deref() == Some(filter)
            || self.category.as_str() == filter
    }
}

/// Visibility rule shared by points and raw records.
#[must_use]
pub fn is_publicly_visible(state: PublicationState, category: Category) -> bool {
    match state {
        PublicationState::Published => true,
        PublicationState::PendingReview => category == Category::Emergency,
        _ => false,
    }
}

/// Check that a coordinate pair is finite, non-zero and within range.
#[must_use]
pub fn valid_coordinates(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && lat != 0.0
        && lng != 0.0
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_wire_values() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()), Some(category));
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
        assert_eq!(Category::parse("Informational"), Some(Category::Information));
        assert_eq!(Category::parse("otro"), None);
    }

    #[test]
    fn test_state_accepts_legacy_activo() {
        assert_eq!(
            PublicationState::parse("activo"),
            Some(PublicationState::Published)
        );
        let state: PublicationState = serde_json::from_str("\"activo\"").unwrap();
        assert_eq!(state, PublicationState::Published);
        assert_eq!(
            serde_json::to_string(&state).unwrap(),
            "\"publicado\"".to_string()
        );
    }

    #[test]
    fn test_visibility_rule() {
        use Category::{Emergency, SupplyDepot};
        use PublicationState::{Draft, Hidden, PendingReview, Published, Rejected};

        assert!(is_publicly_visible(Published, SupplyDepot));
        assert!(is_publicly_visible(PendingReview, Emergency));
        assert!(!is_publicly_visible(PendingReview, SupplyDepot));
        for state in [Draft, Hidden, Rejected] {
            assert!(!is_publicly_visible(state, Emergency));
        }
    }

    #[test]
    fn test_valid_coordinates() {
        assert!(valid_coordinates(-33.45, -70.66));
        assert!(!valid_coordinates(0.0, -70.66));
        assert!(!valid_coordinates(-33.45, 0.0));
        assert!(!valid_coordinates(91.0, -70.0));
        assert!(!valid_coordinates(-33.0, 180.5));
        assert!(!valid_coordinates(f64::NAN, -70.0));
        assert!(valid_coordinates(90.0, 180.0));
    }

    #[test]
    fn test_matches_type() {
        let point = fixtures::typed("1", "albergue", Some("albergue"), Category::Information);
        assert!(point.matches_type("albergue"));
        assert!(point.matches_type("informacion"));
        assert!(!point.matches_type("acopio"));
    }

    #[test]
    fn test_point_serializes_every_optional_key() {
        let point = fixtures::point("1");
        let value = serde_json::to_value(&point).unwrap();
        let object = value.as_object().unwrap();
        for key in ["address", "schedule", "verifier", "urgency", "created_at", "media"] {
            assert!(object.contains_key(key), "missing key {key}");
        }
        assert_eq!(object["type"], "acopio");
        assert_eq!(object["category"], "acopio");
    }

    #[test]
    fn test_occupants_total() {
        let occupants = Occupants {
            children: 2,
            teenagers: 1,
            adults: 3,
            elderly: 1,
        };
        assert_eq!(occupants.total(), 7);
    }

    #[test]
    fn test_occupants_total_saturates() {
        let occupants = Occupants {
            children: u32::MAX,
            teenagers: 5,
            adults: u32::MAX - 1,
            elderly: 1,
        };
        assert_eq!(occupants.total(), u32::MAX);
    }

    #[test]
    fn test_capacity_parse_english() {
        assert_eq!(CapacityStatus::parse("full"), Some(CapacityStatus::Full));
        assert_eq!(CapacityStatus::parse("por_llenar"), Some(CapacityStatus::Filling));
        assert_eq!(CapacityStatus::parse("?"), None);
    }
}
