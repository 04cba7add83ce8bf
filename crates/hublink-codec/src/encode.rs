//! Wire encoding of typed values.

use chrono::{DateTime, Utc};

use crate::escape::{escape_field, escape_hashes};
use crate::matrix::Matrix;
use crate::value::{
    MatrixValue, Scalar, ScalarType, TagValue, TagValueName, TypedValue, VectorValue,
};

/// Encode a scalar into its wire text.
///
/// Numbers render as decimal text, booleans as `true`/`false`, datetimes
/// as milliseconds since the epoch (sub-millisecond precision truncates),
/// strings with the `|`-level escaping applied.
#[must_use]
pub fn encode_scalar(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Bool(v) => encode_bool(*v),
        Scalar::Int32(v) => v.to_string(),
        Scalar::Int64(v) => v.to_string(),
        Scalar::Double(v) => v.to_string(),
        Scalar::String(v) => escape_field(v),
        Scalar::DateTime(v) => encode_datetime(*v),
    }
}

/// Encode any typed value, returning the payload and the wire type code
/// to report at the command level.
#[must_use]
pub fn encode_value(value: &TypedValue) -> (String, u16) {
    let payload = match value {
        TypedValue::Bool(v) => encode_bool(*v),
        TypedValue::Int32(v) => v.to_string(),
        TypedValue::Int64(v) => v.to_string(),
        TypedValue::Double(v) => v.to_string(),
        TypedValue::String(v) => escape_field(v),
        TypedValue::DateTime(v) => encode_datetime(*v),
        TypedValue::Vector(v) => encode_vector(v),
        TypedValue::Matrix(m) => encode_matrix(m),
    };
    (payload, value.type_code())
}

/// Encode a tag value as `<ts>|<typeCode>|<value>|<unit>|<quality>`.
#[must_use]
pub fn encode_tag_value(value: &TagValue) -> String {
    let (payload, code) = encode_value(&value.value);
    format!(
        "{}|{}|{}|{}|{}",
        value.timestamp,
        code,
        payload,
        value.unit,
        value.quality.as_wire()
    )
}

/// Encode a named tag value as `<name>|<ts>|<typeCode>|<value>|<unit>|<quality>`.
#[must_use]
pub fn encode_tag_value_name(tvn: &TagValueName) -> String {
    format!("{}|{}", tvn.name, encode_tag_value(&tvn.value))
}

fn encode_bool(v: bool) -> String {
    (if v { "true" } else { "false" }).to_owned()
}

fn encode_datetime(v: DateTime<Utc>) -> String {
    v.timestamp_millis().to_string()
}

fn encode_vector(vector: &VectorValue) -> String {
    match vector {
        VectorValue::Bool(xs) => encode_vector_items(xs, |v| encode_bool(*v), ScalarType::Bool),
        VectorValue::Int32(xs) => encode_vector_items(xs, ToString::to_string, ScalarType::Int32),
        VectorValue::Int64(xs) => encode_vector_items(xs, ToString::to_string, ScalarType::Int64),
        VectorValue::Double(xs) => encode_vector_items(xs, ToString::to_string, ScalarType::Double),
        VectorValue::String(xs) => {
            encode_vector_items(xs, |s| escape_field(s), ScalarType::String)
        }
        VectorValue::DateTime(xs) => {
            encode_vector_items(xs, |v| encode_datetime(*v), ScalarType::DateTime)
        }
    }
}

fn encode_vector_items<T>(items: &[T], encode: impl Fn(&T) -> String, ty: ScalarType) -> String {
    let mut out = format!("Vector#{}#{}", items.len(), ty.code());
    for item in items {
        out.push('#');
        out.push_str(&escape_hashes(&encode(item)));
    }
    out
}

fn encode_matrix(matrix: &MatrixValue) -> String {
    match matrix {
        MatrixValue::Bool(m) => encode_matrix_cells(m, |v| encode_bool(*v), ScalarType::Bool),
        MatrixValue::Int32(m) => encode_matrix_cells(m, ToString::to_string, ScalarType::Int32),
        MatrixValue::Int64(m) => encode_matrix_cells(m, ToString::to_string, ScalarType::Int64),
        MatrixValue::Double(m) => encode_matrix_cells(m, ToString::to_string, ScalarType::Double),
        MatrixValue::String(m) => {
            encode_matrix_cells(m, |s| escape_field(s), ScalarType::String)
        }
        MatrixValue::DateTime(m) => {
            encode_matrix_cells(m, |v| encode_datetime(*v), ScalarType::DateTime)
        }
    }
}

// Elements go out column-major: all of column 0 top to bottom, then
// column 1, and so on.
fn encode_matrix_cells<T>(
    matrix: &Matrix<T>,
    encode: impl Fn(&T) -> String,
    ty: ScalarType,
) -> String {
    if matrix.rows() == 0 || matrix.columns() == 0 {
        return format!("EDHMatrix#0#0#{}#", ty.code());
    }

    let mut out = format!(
        "EDHMatrix#{}#{}#{}",
        matrix.rows(),
        matrix.columns(),
        ty.code()
    );
    for column in 0..matrix.columns() {
        for row in 0..matrix.rows() {
            out.push('#');
            out.push_str(&escape_hashes(&encode(&matrix[(row, column)])));
        }
    }
    out
}
