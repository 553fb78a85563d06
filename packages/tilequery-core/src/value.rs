use geozero::mvt::tile;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A single property value as stored in a layer's value table.
///
/// Every MVT value type keeps its own variant so that the original numeric
/// representation (width and signedness) survives the round trip to output.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    String(String),
    Float(f32),
    Double(f64),
    Int(i64),
    UInt(u64),
    SInt(i64),
    Bool(bool),
}

impl PropertyValue {
    /// Convert a protobuf value message, returning `None` when no field is set.
    pub fn from_mvt(value: &tile::Value) -> Option<Self> {
        if let Some(s) = &value.string_value {
            Some(PropertyValue::String(s.clone()))
        } else if let Some(f) = value.float_value {
            Some(PropertyValue::Float(f))
        } else if let Some(d) = value.double_value {
            Some(PropertyValue::Double(d))
        } else if let Some(i) = value.int_value {
            Some(PropertyValue::Int(i))
        } else if let Some(u) = value.uint_value {
            Some(PropertyValue::UInt(u))
        } else if let Some(s) = value.sint_value {
            Some(PropertyValue::SInt(s))
        } else {
            value.bool_value.map(PropertyValue::Bool)
        }
    }

    /// Numeric view used by filter comparisons. Strings and booleans have none.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            PropertyValue::Float(f) => Some(f as f64),
            PropertyValue::Double(d) => Some(d),
            PropertyValue::Int(i) | PropertyValue::SInt(i) => Some(i as f64),
            PropertyValue::UInt(u) => Some(u as f64),
            PropertyValue::String(_) | PropertyValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            PropertyValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    fn discriminant(&self) -> u8 {
        match self {
            PropertyValue::String(_) => 0,
            PropertyValue::Float(_) => 1,
            PropertyValue::Double(_) => 2,
            PropertyValue::Int(_) => 3,
            PropertyValue::UInt(_) => 4,
            PropertyValue::SInt(_) => 5,
            PropertyValue::Bool(_) => 6,
        }
    }
}

// Equality is by variant and exact bit pattern so values can key a hash map.
impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropertyValue::String(a), PropertyValue::String(b)) => a == b,
            (PropertyValue::Float(a), PropertyValue::Float(b)) => a.to_bits() == b.to_bits(),
            (PropertyValue::Double(a), PropertyValue::Double(b)) => a.to_bits() == b.to_bits(),
            (PropertyValue::Int(a), PropertyValue::Int(b)) => a == b,
            (PropertyValue::UInt(a), PropertyValue::UInt(b)) => a == b,
            (PropertyValue::SInt(a), PropertyValue::SInt(b)) => a == b,
            (PropertyValue::Bool(a), PropertyValue::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PropertyValue {}

impl Hash for PropertyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.discriminant().hash(state);
        match self {
            PropertyValue::String(s) => s.hash(state),
            PropertyValue::Float(f) => f.to_bits().hash(state),
            PropertyValue::Double(d) => d.to_bits().hash(state),
            PropertyValue::Int(i) | PropertyValue::SInt(i) => i.hash(state),
            PropertyValue::UInt(u) => u.hash(state),
            PropertyValue::Bool(b) => b.hash(state),
        }
    }
}

impl PartialOrd for PropertyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Total order used only to canonicalise property lists for dedupe keys.
impl Ord for PropertyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PropertyValue::String(a), PropertyValue::String(b)) => a.cmp(b),
            (PropertyValue::Float(a), PropertyValue::Float(b)) => a.total_cmp(b),
            (PropertyValue::Double(a), PropertyValue::Double(b)) => a.total_cmp(b),
            (PropertyValue::Int(a), PropertyValue::Int(b)) => a.cmp(b),
            (PropertyValue::UInt(a), PropertyValue::UInt(b)) => a.cmp(b),
            (PropertyValue::SInt(a), PropertyValue::SInt(b)) => a.cmp(b),
            (PropertyValue::Bool(a), PropertyValue::Bool(b)) => a.cmp(b),
            _ => self.discriminant().cmp(&other.discriminant()),
        }
    }
}

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PropertyValue::String(s) => serializer.serialize_str(s),
            PropertyValue::Float(f) => serializer.serialize_f32(*f),
            PropertyValue::Double(d) => serializer.serialize_f64(*d),
            PropertyValue::Int(i) | PropertyValue::SInt(i) => serializer.serialize_i64(*i),
            PropertyValue::UInt(u) => serializer.serialize_u64(*u),
            PropertyValue::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_every_value_type() {
        let sint = tile::Value {
            sint_value: Some(-42),
            ..Default::default()
        };
        assert_eq!(PropertyValue::from_mvt(&sint), Some(PropertyValue::SInt(-42)));

        let float = tile::Value {
            float_value: Some(1.5),
            ..Default::default()
        };
        assert_eq!(PropertyValue::from_mvt(&float), Some(PropertyValue::Float(1.5)));

        let empty = tile::Value::default();
        assert_eq!(PropertyValue::from_mvt(&empty), None);
    }

    #[test]
    fn keeps_numeric_variants_distinct() {
        assert_ne!(PropertyValue::Int(3), PropertyValue::UInt(3));
        assert_ne!(PropertyValue::Int(3), PropertyValue::SInt(3));
        assert_eq!(PropertyValue::Int(3).as_f64(), PropertyValue::UInt(3).as_f64());
    }

    #[test]
    fn serializes_with_original_type() {
        let json = serde_json::to_value(vec![
            PropertyValue::SInt(-7),
            PropertyValue::UInt(7),
            PropertyValue::Bool(true),
            PropertyValue::String("park".to_string()),
        ])
        .unwrap();
        assert_eq!(json, serde_json::json!([-7, 7, true, "park"]));

        let double = serde_json::to_value(PropertyValue::Double(2.25)).unwrap();
        assert_eq!(double.as_f64(), Some(2.25));
    }
}
