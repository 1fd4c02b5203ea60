//! Static fallback bundle.
//!
//! A legacy-schema JSON array used only when neither the cache nor the
//! network has any points. The default bundle is compiled into the binary.

use std::path::PathBuf;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::FallbackConfig;
use crate::error::Result;
use crate::point::Point;
use crate::transform::{transform_batch, Batch, LegacyRecord};

/// The bundle shipped with the binary.
pub const EMBEDDED_BUNDLE: &str = include_str!("../data/fallback.json");

/// Where last-resort data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackBundle {
    /// The compiled-in bundle.
    Embedded,
    /// A legacy-schema JSON file on disk.
    File(PathBuf),
    /// No fallback.
    Disabled,
}

impl FallbackBundle {
    /// Pick the bundle described by the `[fallback]` section.
    #[must_use]
    pub fn from_config(config: &FallbackConfig) -> Self {
        match (&config.path, config.enabled) {
            (_, false) => Self::Disabled,
            (Some(path), true) => Self::File(path.clone()),
            (None, true) => Self::Embedded,
        }
    }

    /// Read and transform the bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON array.
    pub fn try_load(&self) -> Result<Batch> {
        let text = match self {
            Self::Embedded => EMBEDDED_BUNDLE.to_string(),
            Self::File(path) => std::fs::read_to_string(path)?,
            Self::Disabled => return Ok(Batch::default()),
        };
        let records: Vec<Value> = serde_json::from_str(&text)?;
        Ok(transform_batch::<LegacyRecord>(records))
    }

    /// Read the bundle, or nothing if it is unavailable.
    #[must_use]
    pub fn load(&self) -> Vec<Point> {
        match self.try_load() {
            Ok(batch) => {
                if !batch.skipped.is_empty() {
                    warn!("Skipped {} fallback records", batch.skipped.len());
                }
                info!("Loaded {} points from fallback bundle", batch.points.len());
                batch.points
            }
            Err(err) => {
                warn!("Fallback bundle unavailable: {}", err);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::point::{Category, PublicationState};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_embedded_bundle() {
        let batch = FallbackBundle::Embedded.try_load().unwrap();

        assert_eq!(batch.points.len(), 5);
        assert_eq!(batch.skipped.len(), 1);

        let depot = &batch.points[0];
        assert_eq!(depot.category, Category::SupplyDepot);
        assert_eq!(depot.state, PublicationState::Published);

        let vet = batch.points.iter().find(|p| p.id == "5").unwrap();
        assert_eq!(vet.state, PublicationState::Hidden);
    }

    #[test]
    fn test_embedded_string_coordinates() {
        let points = FallbackBundle::Embedded.load();
        let water = points.iter().find(|p| p.id == "3").unwrap();
        assert!((water.lat + 33.0367).abs() < f64::EPSILON);
        assert_eq!(water.needs, vec!["agua potable", "bidones"]);
    }

    #[test]
    fn test_disabled_is_empty() {
        assert!(FallbackBundle::Disabled.load().is_empty());
    }

    #[test]
    fn test_from_config() {
        let mut config = FallbackConfig::default();
        assert_eq!(FallbackBundle::from_config(&config), FallbackBundle::Embedded);

        config.path = Some(PathBuf::from("/srv/puntos.json"));
        assert_eq!(
            FallbackBundle::from_config(&config),
            FallbackBundle::File(PathBuf::from("/srv/puntos.json"))
        );

        config.enabled = false;
        assert_eq!(FallbackBundle::from_config(&config), FallbackBundle::Disabled);
    }

    #[test]
    fn test_file_bundle() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"[{{"id": 10, "name": "Bomberos Reñaca", "type": "bomberos", "lat": -32.97, "lng": -71.54, "verified": true}}]"#
        )
        .unwrap();

        let points = FallbackBundle::File(file.path().to_path_buf()).load();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].id, "10");
        assert_eq!(points[0].point_type, "bomberos");
    }

    #[test]
    fn test_missing_file() {
        let bundle = FallbackBundle::File(PathBuf::from("/nonexistent/fallback.json"));
        assert!(matches!(bundle.try_load(), Err(Error::Io(_))));
        assert!(bundle.load().is_empty());
    }

    #[test]
    fn test_not_an_array() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"data": []}}"#).unwrap();

        let bundle = FallbackBundle::File(file.path().to_path_buf());
        assert!(matches!(bundle.try_load(), Err(Error::Json(_))));
    }
}
