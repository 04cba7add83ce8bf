//! The closed value model carried by tag updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matrix::Matrix;

/// Wire type code of compound (vector/matrix) values.
///
/// The element type travels inside the payload, not in this code.
pub const COMPOUND_TYPE_CODE: u16 = 1024;

/// Freshness/validity classification of a tag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Quality {
    #[default]
    Good,
    Bad,
    LastGood,
    Default,
}

impl Quality {
    /// Wire form of the quality (`GOOD`, `BAD`, `LAST_GOOD`, `DEFAULT`).
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Good => "GOOD",
            Self::Bad => "BAD",
            Self::LastGood => "LAST_GOOD",
            Self::Default => "DEFAULT",
        }
    }

    /// Parse the wire form. `None` for unrecognized qualities.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "GOOD" => Some(Self::Good),
            "BAD" => Some(Self::Bad),
            "LAST_GOOD" => Some(Self::LastGood),
            "DEFAULT" => Some(Self::Default),
            _ => None,
        }
    }
}

/// Element types a scalar (and thus a vector/matrix element) can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
    Bool,
    Int32,
    Int64,
    Double,
    String,
    DateTime,
}

impl ScalarType {
    /// Fixed wire type code. Part of the external contract.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Bool => 1,
            Self::Int32 => 2,
            Self::Int64 => 4,
            Self::Double => 6,
            Self::String => 10,
            Self::DateTime => 16,
        }
    }

    /// Inverse of [`ScalarType::code`].
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Bool),
            2 => Some(Self::Int32),
            4 => Some(Self::Int64),
            6 => Some(Self::Double),
            10 => Some(Self::String),
            16 => Some(Self::DateTime),
            _ => None,
        }
    }
}

/// A single typed scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    DateTime(DateTime<Utc>),
}

impl Scalar {
    /// The element type of this scalar.
    #[must_use]
    pub const fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Bool(_) => ScalarType::Bool,
            Self::Int32(_) => ScalarType::Int32,
            Self::Int64(_) => ScalarType::Int64,
            Self::Double(_) => ScalarType::Double,
            Self::String(_) => ScalarType::String,
            Self::DateTime(_) => ScalarType::DateTime,
        }
    }
}

/// A homogeneous vector value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VectorValue {
    Bool(Vec<bool>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Double(Vec<f64>),
    String(Vec<String>),
    DateTime(Vec<DateTime<Utc>>),
}

impl VectorValue {
    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::String(v) => v.len(),
            Self::DateTime(v) => v.len(),
        }
    }

    /// True when the vector holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element type.
    #[must_use]
    pub const fn element_type(&self) -> ScalarType {
        match self {
            Self::Bool(_) => ScalarType::Bool,
            Self::Int32(_) => ScalarType::Int32,
            Self::Int64(_) => ScalarType::Int64,
            Self::Double(_) => ScalarType::Double,
            Self::String(_) => ScalarType::String,
            Self::DateTime(_) => ScalarType::DateTime,
        }
    }
}

/// A homogeneous matrix value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatrixValue {
    Bool(Matrix<bool>),
    Int32(Matrix<i32>),
    Int64(Matrix<i64>),
    Double(Matrix<f64>),
    String(Matrix<String>),
    DateTime(Matrix<DateTime<Utc>>),
}

impl MatrixValue {
    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        match self {
            Self::Bool(m) => m.rows(),
            Self::Int32(m) => m.rows(),
            Self::Int64(m) => m.rows(),
            Self::Double(m) => m.rows(),
            Self::String(m) => m.rows(),
            Self::DateTime(m) => m.rows(),
        }
    }

    /// Number of columns.
    #[must_use]
    pub const fn columns(&self) -> usize {
        match self {
            Self::Bool(m) => m.columns(),
            Self::Int32(m) => m.columns(),
            Self::Int64(m) => m.columns(),
            Self::Double(m) => m.columns(),
            Self::String(m) => m.columns(),
            Self::DateTime(m) => m.columns(),
        }
    }

    /// The element type.
    #[must_use]
    pub const fn element_type(&self) -> ScalarType {
        match self {
            Self::Bool(_) => ScalarType::Bool,
            Self::Int32(_) => ScalarType::Int32,
            Self::Int64(_) => ScalarType::Int64,
            Self::Double(_) => ScalarType::Double,
            Self::String(_) => ScalarType::String,
            Self::DateTime(_) => ScalarType::DateTime,
        }
    }
}

/// Any value a tag can carry: scalar, vector or matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedValue {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Vector(VectorValue),
    Matrix(MatrixValue),
}

impl TypedValue {
    /// The wire type code reported at the command level.
    ///
    /// Compound values always report [`COMPOUND_TYPE_CODE`].
    #[must_use]
    pub const fn type_code(&self) -> u16 {
        match self {
            Self::Bool(_) => ScalarType::Bool.code(),
            Self::Int32(_) => ScalarType::Int32.code(),
            Self::Int64(_) => ScalarType::Int64.code(),
            Self::Double(_) => ScalarType::Double.code(),
            Self::String(_) => ScalarType::String.code(),
            Self::DateTime(_) => ScalarType::DateTime.code(),
            Self::Vector(_) | Self::Matrix(_) => COMPOUND_TYPE_CODE,
        }
    }
}

impl From<Scalar> for TypedValue {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Bool(v) => Self::Bool(v),
            Scalar::Int32(v) => Self::Int32(v),
            Scalar::Int64(v) => Self::Int64(v),
            Scalar::Double(v) => Self::Double(v),
            Scalar::String(v) => Self::String(v),
            Scalar::DateTime(v) => Self::DateTime(v),
        }
    }
}

/// A timestamped tag value with unit and quality.
///
/// The tag name is deliberately not part of the value; it travels as the
/// key wherever values are stored or transmitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagValue {
    /// Milliseconds since the Unix epoch, UTC.
    pub timestamp: i64,
    pub value: TypedValue,
    pub unit: String,
    pub quality: Quality,
}

impl TagValue {
    /// Create a value with empty unit and `Good` quality.
    #[must_use]
    pub fn new(timestamp: i64, value: TypedValue) -> Self {
        Self {
            timestamp,
            value,
            unit: String::new(),
            quality: Quality::Good,
        }
    }
}

/// A tag value paired with its name, for the places where the name must
/// travel with the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagValueName {
    pub name: String,
    pub value: TagValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_wire_roundtrip() {
        for q in [
            Quality::Good,
            Quality::Bad,
            Quality::LastGood,
            Quality::Default,
        ] {
            assert_eq!(Quality::from_wire(q.as_wire()), Some(q));
        }
        assert_eq!(Quality::from_wire("good"), None);
        assert_eq!(Quality::from_wire(""), None);
    }

    #[test]
    fn test_type_codes() {
        assert_eq!(ScalarType::Bool.code(), 1);
        assert_eq!(ScalarType::Int32.code(), 2);
        assert_eq!(ScalarType::Int64.code(), 4);
        assert_eq!(ScalarType::Double.code(), 6);
        assert_eq!(ScalarType::String.code(), 10);
        assert_eq!(ScalarType::DateTime.code(), 16);
        for code in [1, 2, 4, 6, 10, 16] {
            assert_eq!(ScalarType::from_code(code).map(ScalarType::code), Some(code));
        }
        assert_eq!(ScalarType::from_code(3), None);
        assert_eq!(ScalarType::from_code(COMPOUND_TYPE_CODE), None);
    }

    #[test]
    fn test_compound_reports_generic_code() {
        let vector = TypedValue::Vector(VectorValue::Int32(vec![1, 2]));
        assert_eq!(vector.type_code(), COMPOUND_TYPE_CODE);
        let matrix = TypedValue::Matrix(MatrixValue::Bool(Matrix::new()));
        assert_eq!(matrix.type_code(), COMPOUND_TYPE_CODE);
    }

    #[test]
    fn test_container_accessors() {
        let vector = VectorValue::Double(vec![1.0, 2.0, 3.0]);
        assert_eq!(vector.len(), 3);
        assert!(!vector.is_empty());
        assert_eq!(vector.element_type(), ScalarType::Double);
        assert_eq!(Scalar::Double(1.0).scalar_type(), ScalarType::Double);

        let matrix = MatrixValue::String(Matrix::from_vec(vec!["a".into(), "b".into()], 1, 2).unwrap());
        assert_eq!((matrix.rows(), matrix.columns()), (1, 2));
        assert_eq!(matrix.element_type(), ScalarType::String);
    }

    #[test]
    fn test_tag_value_defaults() {
        let tv = TagValue::new(9, TypedValue::Bool(true));
        assert_eq!(tv.unit, "");
        assert_eq!(tv.quality, Quality::Good);
        assert_eq!(Quality::default(), Quality::Good);
    }
}
