//! Legacy spreadsheet-export schema used by the fallback bundle.

use serde::Deserialize;
use serde_json::Value;

use super::{
    clean_text, coerce_f64, format_schedule, normalize_tags, parse_schedule, parse_timestamp,
    split_needs, value_to_id, SourceRecord,
};
use crate::error::TransformError;
use crate::normalize::normalize_type;
use crate::point::{
    valid_coordinates, CapacityStatus, Category, Occupants, Point, PublicationState, SiteFlags,
};

/// A record from the old `data1.json` export.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LegacyRecord {
    pub id: Option<Value>,
    pub name: Option<String>,
    pub place: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub lat: Option<Value>,
    pub lng: Option<Value>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub status: Option<String>,
    pub capacity_status: Option<String>,
    pub supplies_needed: Option<Vec<String>>,
    pub info: Option<String>,
    pub schedule: Option<Value>,
    pub contact: Option<String>,
    pub verified: Option<bool>,
    pub verificator: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Category of a legacy free-text type.
///
/// Depot variants map to [`Category::SupplyDepot`]; every other type was an
/// informational point in the old exports.
#[must_use]
pub fn legacy_category(kind: &str) -> Category {
    match normalize_type(kind).as_str() {
        "acopio" | "acopio comedor solidario" | "acopio para infancias" => Category::SupplyDepot,
        _ => Category::Information,
    }
}

fn legacy_state(status: Option<&str>, verified: bool) -> PublicationState {
    if verified {
        return PublicationState::Published;
    }
    match status.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("inactive") => PublicationState::Hidden,
        _ => PublicationState::PendingReview,
    }
}

fn legacy_schedule(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => clean_text(Some(s.clone())),
        Value::Object(map) => {
            let part = |key: &str| map.get(key).and_then(Value::as_str);
            format_schedule(part("days"), part("start"), part("end"))
        }
        _ => None,
    }
}

impl SourceRecord for LegacyRecord {
    fn into_point(self) -> Result<Point, TransformError> {
        let id = value_to_id(self.id.as_ref()).ok_or(TransformError::MissingField {
            id: "<unknown>".to_string(),
            field: "id",
        })?;

        let lat = coerce_f64(self.lat.as_ref());
        let lng = coerce_f64(self.lng.as_ref());
        let (lat, lng) = match (lat, lng) {
            (Some(lat), Some(lng)) if valid_coordinates(lat, lng) => (lat, lng),
            _ => return Err(TransformError::InvalidCoordinates { id, lat, lng }),
        };

        let kind = clean_text(self.kind);
        let category = kind.as_deref().map_or(Category::Information, legacy_category);
        let subtype = Some(
            kind.map(|k| k.to_lowercase())
                .unwrap_or_else(|| "otro".to_string()),
        );
        let verified = self.verified.unwrap_or(false);
        let state = legacy_state(self.status.as_deref(), verified);

        let needs_text = clean_text(self.info);
        let mut needs = normalize_tags(self.supplies_needed.unwrap_or_default());
        if needs.is_empty() {
            needs = needs_text.as_deref().map(split_needs).unwrap_or_default();
        }

        let capacity = if category == Category::SupplyDepot {
            self.capacity_status.as_deref().and_then(CapacityStatus::parse)
        } else {
            None
        };

        Ok(Point {
            name: clean_text(self.name)
                .or_else(|| clean_text(self.place))
                .unwrap_or_else(|| "Sin nombre".to_string()),
            point_type: subtype.clone().unwrap_or_default(),
            lat,
            lng,
            category,
            subtype,
            state,
            verified: state == PublicationState::Published,
            active: matches!(
                state,
                PublicationState::Published | PublicationState::PendingReview
            ),
            address: clean_text(self.address),
            city: clean_text(self.city),
            contact: clean_text(self.contact),
            contact_name: None,
            schedule: parse_schedule(legacy_schedule(self.schedule.as_ref()).as_deref()),
            verifier: clean_text(self.verificator),
            verified_at: None,
            needs,
            needs_text,
            help_categories: Vec::new(),
            urgency: None,
            capacity,
            zone_name: None,
            inhabited: None,
            occupants: Occupants::default(),
            animals: None,
            site: SiteFlags::default(),
            logistics: None,
            access_types: Vec::new(),
            media: Vec::new(),
            kml_file: None,
            created_at: parse_timestamp(self.created_at.as_deref()),
            updated_at: parse_timestamp(self.updated_at.as_deref()),
            created_by: None,
            id,
        })
    }
}
