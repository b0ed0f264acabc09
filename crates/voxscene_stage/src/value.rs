//! Attribute values and authored properties.

use crate::path::SdfPath;

/// A parsed attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Explicit `None` (blocked value) or a skipped dictionary.
    None,
    /// `true` / `false`.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Floating point literal.
    Float(f64),
    /// Quoted string.
    String(String),
    /// Bare identifier used as a value.
    Token(String),
    /// Asset path `@...@`.
    Asset(String),
    /// Path reference `<...>`, as authored.
    Path(String),
    /// Parenthesised tuple, e.g. a vector.
    Tuple(Vec<Value>),
    /// Bracketed array.
    Array(Vec<Value>),
}

impl Value {
    /// Numeric view of an int or float.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Int(v) => Some(v as f64),
            Self::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Non-negative integer view.
    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Self::Int(v) => u32::try_from(v).ok(),
            _ => None,
        }
    }

    /// String view of a string or token.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Token(s) => Some(s),
            _ => None,
        }
    }

    /// Asset path text. Plain strings are accepted too.
    #[must_use]
    pub fn as_asset(&self) -> Option<&str> {
        match self {
            Self::Asset(s) | Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// A 3-tuple of numbers.
    #[must_use]
    pub fn as_vec3f(&self) -> Option<[f32; 3]> {
        match self {
            Self::Tuple(items) if items.len() == 3 => Some([
                items[0].as_f64()? as f32,
                items[1].as_f64()? as f32,
                items[2].as_f64()? as f32,
            ]),
            _ => None,
        }
    }

    /// An array of 3-tuples (`point3f[]`, `float3[]`, ...).
    #[must_use]
    pub fn as_vec3f_array(&self) -> Option<Vec<[f32; 3]>> {
        match self {
            Self::Array(items) => items.iter().map(Self::as_vec3f).collect(),
            _ => None,
        }
    }

    /// An array of non-negative integers (`int[]`, `uint[]`).
    #[must_use]
    pub fn as_uint_array(&self) -> Option<Vec<u32>> {
        match self {
            Self::Array(items) => items.iter().map(Self::as_u32).collect(),
            _ => None,
        }
    }
}

/// An authored attribute on a prim.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    /// Namespaced name, e.g. `inputs:file`.
    pub name: String,
    /// Declared type, e.g. `point3f[]`.
    pub type_name: String,
    /// `custom` qualifier was present.
    pub custom: bool,
    /// `uniform` qualifier was present.
    pub uniform: bool,
    /// Default value, if authored.
    pub default: Option<Value>,
    /// Time samples sorted by time.
    pub time_samples: Vec<(f64, Value)>,
    /// Connection sources (`.connect`).
    pub connections: Vec<SdfPath>,
}

impl Attribute {
    pub(crate) fn new(name: String, type_name: String) -> Self {
        Self {
            name,
            type_name,
            custom: false,
            uniform: false,
            default: None,
            time_samples: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Resolved value: the default, else the earliest time sample.
    ///
    /// A blocked default (`= None`) resolves to nothing.
    #[must_use]
    pub fn get(&self) -> Option<&Value> {
        match &self.default {
            Some(Value::None) => None,
            Some(value) => Some(value),
            None => self.time_samples.first().map(|(_, v)| v),
        }
    }
}

/// An authored relationship on a prim.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Relationship {
    /// Namespaced name, e.g. `material:binding`.
    pub name: String,
    /// Ordered, de-duplicated target paths.
    pub targets: Vec<SdfPath>,
}

impl Relationship {
    /// Ordered target paths.
    #[must_use]
    pub fn targets(&self) -> &[SdfPath] {
        &self.targets
    }

    pub(crate) fn add_target(&mut self, target: SdfPath) {
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
    }

    pub(crate) fn remove_target(&mut self, target: &SdfPath) {
        self.targets.retain(|t| t != target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_array_accepts_mixed_numbers() {
        let value = Value::Array(vec![
            Value::Tuple(vec![Value::Int(0), Value::Float(1.5), Value::Int(-2)]),
            Value::Tuple(vec![Value::Int(3), Value::Int(4), Value::Int(5)]),
        ]);
        assert_eq!(
            value.as_vec3f_array().unwrap(),
            vec![[0.0, 1.5, -2.0], [3.0, 4.0, 5.0]]
        );
    }

    #[test]
    fn test_vec3_array_rejects_short_tuple() {
        let value = Value::Array(vec![Value::Tuple(vec![Value::Int(0), Value::Int(1)])]);
        assert!(value.as_vec3f_array().is_none());
    }

    #[test]
    fn test_uint_array_rejects_negative() {
        let ok = Value::Array(vec![Value::Int(0), Value::Int(7)]);
        assert_eq!(ok.as_uint_array().unwrap(), vec![0, 7]);
        let bad = Value::Array(vec![Value::Int(-1)]);
        assert!(bad.as_uint_array().is_none());
    }

    #[test]
    fn test_attribute_falls_back_to_first_sample() {
        let mut attr = Attribute::new("positions".into(), "point3f[]".into());
        attr.time_samples = vec![(0.0, Value::Int(1)), (10.0, Value::Int(2))];
        assert_eq!(attr.get(), Some(&Value::Int(1)));
        attr.default = Some(Value::None);
        assert_eq!(attr.get(), None);
    }

    #[test]
    fn test_relationship_dedup() {
        let mut rel = Relationship::default();
        let a = SdfPath::parse("/a").unwrap();
        rel.add_target(a.clone());
        rel.add_target(a.clone());
        assert_eq!(rel.targets().len(), 1);
        rel.remove_target(&a);
        assert!(rel.targets().is_empty());
    }
}
