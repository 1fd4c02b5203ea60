//! Backend record schema.

use serde::Deserialize;
use serde_json::Value;

use super::{
    clean_text, coerce_f64, parse_flag, parse_schedule, parse_timestamp, split_needs,
    tags_from_value, normalize_tags, value_to_id, SourceRecord,
};
use crate::error::TransformError;
use crate::point::{
    valid_coordinates, CapacityStatus, Category, Occupants, Point, PublicationState, SiteFlags,
    Urgency,
};

/// A record as served by `GET /api/puntos`.
///
/// Field names follow the backend schema. Every field is optional at this
/// stage; [`SourceRecord::into_point`] decides what is required.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiRecord {
    pub id: Option<Value>,
    pub nombre: Option<String>,
    pub latitud: Option<Value>,
    pub longitud: Option<Value>,
    pub direccion: Option<String>,
    pub ciudad: Option<String>,
    pub categoria: Option<String>,
    pub subtipo: Option<String>,
    pub categorias_ayuda: Option<Vec<String>>,
    pub nivel_urgencia: Option<String>,
    pub urgencia: Option<String>,
    pub contacto_principal: Option<String>,
    pub contacto_nombre: Option<String>,
    pub horario: Option<String>,
    pub estado: Option<String>,
    pub entidad_verificadora: Option<String>,
    pub fecha_verificacion: Option<String>,
    pub capacidad_estado: Option<String>,
    pub necesidades_raw: Option<String>,
    pub necesidades_tags: Option<Value>,
    pub nombre_zona: Option<String>,
    pub habitado_actualmente: Option<bool>,
    pub cantidad_ninos: Option<i64>,
    pub cantidad_adolescentes: Option<i64>,
    pub cantidad_adultos: Option<i64>,
    pub cantidad_ancianos: Option<i64>,
    pub animales_detalle: Option<String>,
    pub riesgo_asbesto: Option<Value>,
    pub foto_asbesto: Option<String>,
    pub logistica_llegada: Option<String>,
    pub tipos_acceso: Option<Vec<String>>,
    pub requiere_voluntarios: Option<bool>,
    pub tiene_banos: Option<bool>,
    pub tiene_electricidad: Option<bool>,
    pub tiene_senal: Option<bool>,
    pub evidencia_fotos: Option<Vec<String>>,
    pub archivo_kml: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub created_by: Option<String>,
}

fn count(value: Option<i64>) -> u32 {
    value.and_then(|n| u32::try_from(n).ok()).unwrap_or(0)
}

impl SourceRecord for ApiRecord {
    fn into_point(self) -> Result<Point, TransformError> {
        let id = value_to_id(self.id.as_ref()).ok_or(TransformError::MissingField {
            id: "<unknown>".to_string(),
            field: "id",
        })?;

        let lat = coerce_f64(self.latitud.as_ref());
        let lng = coerce_f64(self.longitud.as_ref());
        let (lat, lng) = match (lat, lng) {
            (Some(lat), Some(lng)) if valid_coordinates(lat, lng) => (lat, lng),
            _ => return Err(TransformError::InvalidCoordinates { id, lat, lng }),
        };

        let raw_category = clean_text(self.categoria).ok_or_else(|| TransformError::MissingField {
            id: id.clone(),
            field: "categoria",
        })?;
        let category = Category::parse(&raw_category).ok_or_else(|| TransformError::UnknownCategory {
            id: id.clone(),
            value: raw_category,
        })?;

        let raw_state = clean_text(self.estado).ok_or_else(|| TransformError::MissingField {
            id: id.clone(),
            field: "estado",
        })?;
        let state = PublicationState::parse(&raw_state).ok_or_else(|| TransformError::UnknownState {
            id: id.clone(),
            value: raw_state,
        })?;

        let subtype = clean_text(self.subtipo);
        let point_type = subtype
            .clone()
            .unwrap_or_else(|| category.as_str().to_string());

        let needs_text = clean_text(self.necesidades_raw);
        let mut needs = tags_from_value(self.necesidades_tags.as_ref());
        if needs.is_empty() {
            needs = needs_text.as_deref().map(split_needs).unwrap_or_default();
        }

        let mut media = self.evidencia_fotos.unwrap_or_default();
        if let Some(photo) = clean_text(self.foto_asbesto) {
            media.push(photo);
        }
        media.retain(|m| !m.trim().is_empty());

        Ok(Point {
            name: clean_text(self.nombre).unwrap_or_else(|| "Sin nombre".to_string()),
            point_type,
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
            address: clean_text(self.direccion),
            city: clean_text(self.ciudad),
            contact: clean_text(self.contacto_principal),
            contact_name: clean_text(self.contacto_nombre),
            schedule: parse_schedule(self.horario.as_deref()),
            verifier: clean_text(self.entidad_verificadora),
            verified_at: parse_timestamp(self.fecha_verificacion.as_deref()),
            needs,
            needs_text,
            help_categories: normalize_tags(self.categorias_ayuda.unwrap_or_default()),
            urgency: self
                .nivel_urgencia
                .or(self.urgencia)
                .as_deref()
                .and_then(Urgency::parse),
            capacity: self.capacidad_estado.as_deref().and_then(CapacityStatus::parse),
            zone_name: clean_text(self.nombre_zona),
            inhabited: self.habitado_actualmente,
            occupants: Occupants {
                children: count(self.cantidad_ninos),
                teenagers: count(self.cantidad_adolescentes),
                adults: count(self.cantidad_adultos),
                elderly: count(self.cantidad_ancianos),
            },
            animals: clean_text(self.animales_detalle),
            site: SiteFlags {
                asbestos_risk: parse_flag(self.riesgo_asbesto.as_ref()),
                requires_volunteers: self.requiere_voluntarios.unwrap_or(false),
                has_bathrooms: self.tiene_banos.unwrap_or(false),
                has_electricity: self.tiene_electricidad.unwrap_or(false),
                has_signal: self.tiene_senal.unwrap_or(false),
            },
            logistics: clean_text(self.logistica_llegada),
            access_types: normalize_tags(self.tipos_acceso.unwrap_or_default()),
            media,
            kml_file: clean_text(self.archivo_kml),
            created_at: parse_timestamp(self.created.as_deref()),
            updated_at: parse_timestamp(self.updated.as_deref()),
            created_by: clean_text(self.created_by),
            id,
        })
    }
}
