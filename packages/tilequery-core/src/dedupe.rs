// Identity of a feature across tile seams
use std::sync::Arc;

use crate::models::{Candidate, GeomKind};
use crate::value::PropertyValue;

/// Two candidates with equal keys are treated as the same real-world feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupeKey {
    Id(u64),
    /// Properties are sorted so the comparison ignores tag order.
    Composite {
        layer: Arc<str>,
        geometry: GeomKind,
        properties: Vec<(String, PropertyValue)>,
    },
}

impl DedupeKey {
    pub fn from_candidate(candidate: &Candidate) -> Self {
        if let Some(id) = candidate.id {
            return DedupeKey::Id(id);
        }

        let mut properties = candidate.properties.clone();
        properties.sort();
        DedupeKey::Composite {
            layer: Arc::clone(&candidate.layer),
            geometry: candidate.geometry,
            properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TileCoord;

    fn candidate(id: Option<u64>, layer: &str, properties: Vec<(&str, PropertyValue)>) -> Candidate {
        Candidate {
            id,
            layer: Arc::from(layer),
            geometry: GeomKind::LineString,
            properties: properties.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            coordinates: [0.0, 0.0],
            distance: 1.0,
            tile: TileCoord { z: 14, x: 0, y: 0 },
        }
    }

    #[test]
    fn id_wins_over_properties() {
        let a = candidate(Some(42), "road", vec![("class", PropertyValue::String("primary".into()))]);
        let b = candidate(Some(42), "bridge", vec![]);
        assert_eq!(DedupeKey::from_candidate(&a), DedupeKey::from_candidate(&b));
    }

    #[test]
    fn composite_ignores_property_order() {
        let a = candidate(
            None,
            "road",
            vec![("class", PropertyValue::String("primary".into())), ("lanes", PropertyValue::UInt(2))],
        );
        let b = candidate(
            None,
            "road",
            vec![("lanes", PropertyValue::UInt(2)), ("class", PropertyValue::String("primary".into()))],
        );
        assert_eq!(DedupeKey::from_candidate(&a), DedupeKey::from_candidate(&b));
    }

    #[test]
    fn composite_respects_layer_and_value_type() {
        let base = candidate(None, "road", vec![("lanes", PropertyValue::UInt(2))]);
        let other_layer = candidate(None, "path", vec![("lanes", PropertyValue::UInt(2))]);
        let other_type = candidate(None, "road", vec![("lanes", PropertyValue::Int(2))]);

        let key = DedupeKey::from_candidate(&base);
        assert_ne!(key, DedupeKey::from_candidate(&other_layer));
        assert_ne!(key, DedupeKey::from_candidate(&other_type));
    }
}
