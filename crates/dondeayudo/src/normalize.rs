//! Type aliases, marker colors and display labels.
//!
//! Free-text types from the field come in many spellings ("Centro de
//! Acopio", "punto de acopio", "acopio"). [`normalize_type`] folds them
//! into one canonical key, which is what colors and labels are looked up by.
//!
//! # Example
//!
//! ```
//! use dondeayudo::normalize::{normalize_type, ColorMap};
//!
//! assert_eq!(normalize_type(" Centro De Acopio "), "acopio");
//!
//! let colors = ColorMap::from_types(["acopio", "bomberos", "ayuda animal"]);
//! assert_eq!(colors.color_for("Centro de acopio"), "#10B981");
//! assert_ne!(colors.color_for("bomberos"), colors.color_for("ayuda animal"));
//! ```

use std::collections::{BTreeMap, BTreeSet};

/// Canonical type for null or blank input.
pub const DEFAULT_TYPE: &str = "default";

/// Color for types with neither a predefined nor an assigned color.
pub const DEFAULT_COLOR: &str = "#6B7280";

/// Textual variants and the canonical type they stand for.
const TYPE_ALIASES: &[(&str, &str)] = &[
    ("centro de acopio", "acopio"),
    ("punto de acopio", "acopio"),
    ("centro acopio", "acopio"),
    ("acopio de donaciones", "acopio"),
    ("centro de albergue", "albergue"),
    ("refugio temporal", "albergue"),
    ("alojamiento", "albergue"),
    ("punto de hidratacion", "hidratacion"),
    ("punto de hidratación", "hidratacion"),
    ("agua", "hidratacion"),
    ("hidratación", "hidratacion"),
    ("donaciones", "donacion"),
    ("centro de donacion", "donacion"),
    ("centro de donación", "donacion"),
    ("campaña solidaria", "caridad"),
    ("evento benefico", "caridad"),
    ("evento benéfico", "caridad"),
];

/// Colors reserved for well-known canonical types.
const MARKER_COLORS: &[(&str, &str)] = &[
    ("albergue", "#3B82F6"),
    ("acopio", "#10B981"),
    ("hidratacion", "#06B6D4"),
    ("riesgo", "#EF4444"),
    ("ayuda", "#F59E0B"),
    ("donacion", "#8B5CF6"),
    ("rescate", "#EC4899"),
    ("refugio", "#14B8A6"),
    (DEFAULT_TYPE, DEFAULT_COLOR),
];

/// Palette handed out, in order, to types without a reserved color.
pub const COLOR_PALETTE: [&str; 15] = [
    "#3B82F6", "#10B981", "#06B6D4", "#EF4444", "#F59E0B", "#8B5CF6", "#EC4899", "#14B8A6",
    "#F97316", "#84CC16", "#06B6D4", "#A855F7", "#E11D48", "#0EA5E9", "#22C55E",
];

/// Human-readable labels per canonical type.
const TYPE_LABELS: &[(&str, &str)] = &[
    ("albergue", "Albergue"),
    ("acopio", "Centro de Acopio"),
    ("hidratacion", "Punto de Hidratación"),
    ("riesgo", "Zona de Riesgo"),
    ("ayuda", "Punto de Ayuda"),
    ("donacion", "Centro de Donación"),
    ("rescate", "Punto de Rescate"),
    ("refugio", "Refugio"),
    ("ayuda animal", "Atención veterinaria"),
    ("bomberos", "Bomberos"),
    ("caridad", "Evento benéfico"),
    ("atención psicosocial", "Atención psicosocial"),
    ("atencion de salud", "Atención de salud"),
    ("acopio para infancias", "Acopio para infancias"),
    ("acopio comedor solidario", "Comedor solidario"),
];

fn lookup(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Resolve a raw type to its canonical key.
///
/// Lowercases and trims, then applies the alias table. Unmapped input is
/// its own canonical key; blank input is [`DEFAULT_TYPE`].
#[must_use]
pub fn normalize_type(raw: &str) -> String {
    let key = raw.trim().to_lowercase();
    if key.is_empty() {
        return DEFAULT_TYPE.to_string();
    }
    lookup(TYPE_ALIASES, &key).map_or(key, str::to_string)
}

/// Like [`normalize_type`], for optional input.
#[must_use]
pub fn normalize_optional(raw: Option<&str>) -> String {
    raw.map_or_else(|| DEFAULT_TYPE.to_string(), normalize_type)
}

/// The reserved color of a canonical type, if it has one.
#[must_use]
pub fn reserved_color(canonical: &str) -> Option<&'static str> {
    lookup(MARKER_COLORS, canonical)
}

/// Display label for a raw type, or the raw text when none is defined.
#[must_use]
pub fn label_for(raw: &str) -> String {
    lookup(TYPE_LABELS, &normalize_type(raw)).map_or_else(|| raw.to_string(), str::to_string)
}

/// Colors for a known set of types.
///
/// Built from the whole set at once: the canonical types without a reserved
/// color are sorted and take palette entries in order, skipping entries
/// already handed out. Once the palette runs dry, assignment wraps around.
/// The same set of types always yields the same map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorMap {
    assigned: BTreeMap<String, &'static str>,
}

impl ColorMap {
    /// Build a color map for the given raw types.
    pub fn from_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pending: BTreeSet<String> = types
            .into_iter()
            .map(|t| normalize_type(t.as_ref()))
            .filter(|t| reserved_color(t).is_none())
            .collect();

        let mut assigned = BTreeMap::new();
        let mut handed_out: Vec<&'static str> = Vec::new();
        for (overflow, canonical) in pending.into_iter().enumerate() {
            // First unused palette entry, else wrap around
            let color = COLOR_PALETTE
                .iter()
                .copied()
                .find(|c| !handed_out.contains(c))
                .unwrap_or(COLOR_PALETTE[overflow % COLOR_PALETTE.len()]);
            handed_out.push(color);
            assigned.insert(canonical, color);
        }

        Self { assigned }
    }

    /// Color for a raw type.
    #[must_use]
    pub fn color_for(&self, raw: &str) -> &'static str {
        let canonical = normalize_type(raw);
        reserved_color(&canonical)
            .or_else(|| self.assigned.get(&canonical).copied())
            .unwrap_or(DEFAULT_COLOR)
    }

    /// Number of types with an assigned (non-reserved) color.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    /// Whether no type needed an assigned color.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    /// Assigned colors, ordered by canonical type.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &'static str)> {
        self.assigned.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_case_and_whitespace() {
        let a = normalize_type("Centro de Acopio");
        let b = normalize_type("centro de acopio");
        let c = normalize_type(" Centro De Acopio ");
        assert_eq!(a, "acopio");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_normalize_passthrough() {
        assert_eq!(normalize_type("  Bomberos "), "bomberos");
        assert_eq!(normalize_type("acopio"), "acopio");
    }

    #[test]
    fn test_normalize_blank_is_default() {
        assert_eq!(normalize_type(""), DEFAULT_TYPE);
        assert_eq!(normalize_type("   "), DEFAULT_TYPE);
        assert_eq!(normalize_optional(None), DEFAULT_TYPE);
    }

    #[test]
    fn test_aliases_resolve_to_reserved_colors() {
        for (alias, canonical) in TYPE_ALIASES {
            assert_eq!(normalize_type(alias), *canonical);
        }
        let colors = ColorMap::default();
        assert_eq!(colors.color_for("Refugio temporal"), "#3B82F6");
        assert_eq!(colors.color_for("agua"), "#06B6D4");
    }

    #[test]
    fn test_unknown_type_without_map_is_default_color() {
        let colors = ColorMap::default();
        assert_eq!(colors.color_for("bomberos"), DEFAULT_COLOR);
        assert_eq!(colors.color_for(""), DEFAULT_COLOR);
    }

    #[test]
    fn test_color_map_is_order_independent() {
        let a = ColorMap::from_types(["bomberos", "ayuda animal", "caridad", "acopio"]);
        let b = ColorMap::from_types(["acopio", "caridad", "Bomberos", "ayuda animal", "bomberos"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_color_map_assigns_in_sorted_order() {
        let colors = ColorMap::from_types(["bomberos", "ayuda animal"]);
        assert_eq!(colors.color_for("ayuda animal"), COLOR_PALETTE[0]);
        assert_eq!(colors.color_for("bomberos"), COLOR_PALETTE[1]);
    }

    #[test]
    fn test_color_map_skips_duplicate_palette_entries() {
        let types: Vec<String> = (0..14).map(|i| format!("tipo {i:02}")).collect();
        let colors = ColorMap::from_types(&types);
        let distinct: BTreeSet<&str> = colors.iter().map(|(_, c)| c).collect();
        assert_eq!(distinct.len(), 14);
    }

    #[test]
    fn test_color_map_wraps_when_palette_exhausted() {
        let types: Vec<String> = (0..20).map(|i| format!("tipo {i:02}")).collect();
        let colors = ColorMap::from_types(&types);
        assert_eq!(colors.len(), 20);
        for (_, color) in colors.iter() {
            assert!(COLOR_PALETTE.contains(&color));
        }
    }

    #[test]
    fn test_label_for() {
        assert_eq!(label_for("Punto de acopio"), "Centro de Acopio");
        assert_eq!(label_for("bomberos"), "Bomberos");
        assert_eq!(label_for("Olla Común"), "Olla Común");
    }
}
