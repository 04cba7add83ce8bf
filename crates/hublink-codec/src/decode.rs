//! Wire decoding of typed values.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::escape::{split_hash_list, unescape_field};
use crate::matrix::Matrix;
use crate::value::{
    COMPOUND_TYPE_CODE, MatrixValue, Scalar, ScalarType, TypedValue, VectorValue,
};

/// Decode failure. The caller is expected to drop the affected update and
/// keep processing; nothing here is fatal to a connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unrecognized type code {0}")]
    UnknownTypeCode(u16),
    #[error("unrecognized element type code {0}")]
    UnknownElementTypeCode(u16),
    #[error("compound payload is missing its type tag")]
    MissingCompoundTag,
    #[error("unrecognized compound tag {0:?}")]
    UnknownCompoundTag(String),
    #[error("compound payload is truncated")]
    TruncatedCompound,
    #[error("compound declares {declared} elements but carries {actual}")]
    ElementCountMismatch { declared: usize, actual: usize },
    #[error("invalid numeric literal {0:?}")]
    InvalidNumber(String),
    #[error("timestamp {0} is outside the representable range")]
    TimestampOutOfRange(i64),
}

/// Decode a scalar wire field of a known element type.
///
/// # Errors
/// Returns an error when a numeric or datetime field does not parse.
pub fn decode_scalar(ty: ScalarType, field: &str) -> Result<Scalar, CodecError> {
    Ok(match ty {
        ScalarType::Bool => Scalar::Bool(parse_bool(field)),
        ScalarType::Int32 => Scalar::Int32(parse_number(field)?),
        ScalarType::Int64 => Scalar::Int64(parse_number(field)?),
        ScalarType::Double => Scalar::Double(parse_number(field)?),
        ScalarType::String => Scalar::String(unescape_field(field)),
        ScalarType::DateTime => Scalar::DateTime(parse_datetime(field)?),
    })
}

/// Decode a wire value from its command-level type code and payload.
///
/// # Errors
/// Returns an error for unknown type codes, malformed compound payloads
/// (missing tag, element count mismatch, unknown element type) and
/// unparseable scalar fields.
pub fn decode_value(type_code: u16, payload: &str) -> Result<TypedValue, CodecError> {
    if type_code != COMPOUND_TYPE_CODE {
        let ty = ScalarType::from_code(type_code).ok_or(CodecError::UnknownTypeCode(type_code))?;
        return Ok(decode_scalar(ty, payload)?.into());
    }

    let tag_end = payload.find('#').ok_or(CodecError::MissingCompoundTag)?;
    match &payload[..tag_end] {
        "Vector" => decode_vector(payload).map(TypedValue::Vector),
        "EDHMatrix" => decode_matrix(payload).map(TypedValue::Matrix),
        other => Err(CodecError::UnknownCompoundTag(other.to_owned())),
    }
}

fn parse_bool(field: &str) -> bool {
    field.eq_ignore_ascii_case("true")
}

fn parse_number<T: std::str::FromStr>(field: &str) -> Result<T, CodecError> {
    field
        .parse()
        .map_err(|_| CodecError::InvalidNumber(field.to_owned()))
}

fn parse_datetime(field: &str) -> Result<DateTime<Utc>, CodecError> {
    let millis: i64 = parse_number(field)?;
    DateTime::from_timestamp_millis(millis).ok_or(CodecError::TimestampOutOfRange(millis))
}

fn parse_string(field: &str) -> String {
    unescape_field(field)
}

fn decode_vector(payload: &str) -> Result<VectorValue, CodecError> {
    let fields = split_hash_list(payload);
    if fields.len() < 3 {
        return Err(CodecError::TruncatedCompound);
    }

    let declared: usize = parse_number(&fields[1])?;
    let code: u16 = parse_number(&fields[2])?;
    let ty = ScalarType::from_code(code).ok_or(CodecError::UnknownElementTypeCode(code))?;

    // A zero-length vector may or may not carry a trailing delimiter;
    // either way there are no elements to read.
    if declared == 0 {
        return Ok(empty_vector(ty));
    }

    let elems = &fields[3..];
    if elems.len() != declared {
        return Err(CodecError::ElementCountMismatch {
            declared,
            actual: elems.len(),
        });
    }

    Ok(match ty {
        ScalarType::Bool => VectorValue::Bool(elems.iter().map(|e| parse_bool(e)).collect()),
        ScalarType::Int32 => VectorValue::Int32(decode_items(elems, |e| parse_number(e))?),
        ScalarType::Int64 => VectorValue::Int64(decode_items(elems, |e| parse_number(e))?),
        ScalarType::Double => VectorValue::Double(decode_items(elems, |e| parse_number(e))?),
        ScalarType::String => VectorValue::String(elems.iter().map(|e| parse_string(e)).collect()),
        ScalarType::DateTime => VectorValue::DateTime(decode_items(elems, |e| parse_datetime(e))?),
    })
}

fn decode_matrix(payload: &str) -> Result<MatrixValue, CodecError> {
    let fields = split_hash_list(payload);
    if fields.len() < 4 {
        return Err(CodecError::TruncatedCompound);
    }

    let rows: u32 = parse_number(&fields[1])?;
    let columns: u32 = parse_number(&fields[2])?;
    let code: u16 = parse_number(&fields[3])?;
    let ty = ScalarType::from_code(code).ok_or(CodecError::UnknownElementTypeCode(code))?;

    let (rows, columns) = (rows as usize, columns as usize);
    let size = rows * columns;

    // Either dimension being zero normalizes to the 0×0 matrix.
    if size == 0 {
        return Ok(empty_matrix(ty));
    }

    let elems = &fields[4..];
    if elems.len() != size {
        return Err(CodecError::ElementCountMismatch {
            declared: size,
            actual: elems.len(),
        });
    }

    Ok(match ty {
        ScalarType::Bool => {
            MatrixValue::Bool(decode_matrix_cells(elems, rows, columns, |e| {
                Ok(parse_bool(e))
            })?)
        }
        ScalarType::Int32 => {
            MatrixValue::Int32(decode_matrix_cells(elems, rows, columns, |e| {
                parse_number(e)
            })?)
        }
        ScalarType::Int64 => {
            MatrixValue::Int64(decode_matrix_cells(elems, rows, columns, |e| {
                parse_number(e)
            })?)
        }
        ScalarType::Double => {
            MatrixValue::Double(decode_matrix_cells(elems, rows, columns, |e| {
                parse_number(e)
            })?)
        }
        ScalarType::String => {
            MatrixValue::String(decode_matrix_cells(elems, rows, columns, |e| {
                Ok(parse_string(e))
            })?)
        }
        ScalarType::DateTime => {
            MatrixValue::DateTime(decode_matrix_cells(elems, rows, columns, |e| {
                parse_datetime(e)
            })?)
        }
    })
}

fn decode_items<T>(
    elems: &[String],
    parse: impl Fn(&str) -> Result<T, CodecError>,
) -> Result<Vec<T>, CodecError> {
    elems.iter().map(|e| parse(e)).collect()
}

// Elements arrive column-major; storage is row-major.
fn decode_matrix_cells<T: Clone>(
    elems: &[String],
    rows: usize,
    columns: usize,
    parse: impl Fn(&str) -> Result<T, CodecError>,
) -> Result<Matrix<T>, CodecError> {
    let parsed = decode_items(elems, parse)?;
    let mut cells = Vec::with_capacity(parsed.len());
    for row in 0..rows {
        for column in 0..columns {
            cells.push(parsed[column * rows + row].clone());
        }
    }
    Matrix::from_vec(cells, rows, columns).ok_or(CodecError::ElementCountMismatch {
        declared: rows * columns,
        actual: elems.len(),
    })
}

const fn empty_vector(ty: ScalarType) -> VectorValue {
    match ty {
        ScalarType::Bool => VectorValue::Bool(Vec::new()),
        ScalarType::Int32 => VectorValue::Int32(Vec::new()),
        ScalarType::Int64 => VectorValue::Int64(Vec::new()),
        ScalarType::Double => VectorValue::Double(Vec::new()),
        ScalarType::String => VectorValue::String(Vec::new()),
        ScalarType::DateTime => VectorValue::DateTime(Vec::new()),
    }
}

const fn empty_matrix(ty: ScalarType) -> MatrixValue {
    match ty {
        ScalarType::Bool => MatrixValue::Bool(Matrix::new()),
        ScalarType::Int32 => MatrixValue::Int32(Matrix::new()),
        ScalarType::Int64 => MatrixValue::Int64(Matrix::new()),
        ScalarType::Double => MatrixValue::Double(Matrix::new()),
        ScalarType::String => MatrixValue::String(Matrix::new()),
        ScalarType::DateTime => MatrixValue::DateTime(Matrix::new()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::encode::{encode_scalar, encode_value};
    use crate::escape::split_unescaped;

    fn roundtrip(value: &TypedValue) -> TypedValue {
        let (payload, code) = encode_value(value);
        decode_value(code, &payload).unwrap()
    }

    #[test]
    fn test_scalar_roundtrips() {
        for value in [
            TypedValue::Bool(true),
            TypedValue::Bool(false),
            TypedValue::Int32(-42),
            TypedValue::Int64(9_007_199_254_740_993),
            TypedValue::Double(-0.125),
            TypedValue::String("plain".into()),
            TypedValue::DateTime(Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap()),
        ] {
            assert_eq!(roundtrip(&value), value);
        }
    }

    #[test]
    fn test_datetime_truncates_to_millis() {
        let precise = DateTime::from_timestamp_millis(1_614_834_367_123).unwrap()
            + chrono::Duration::microseconds(456);
        let encoded = encode_scalar(&Scalar::DateTime(precise));
        assert_eq!(encoded, "1614834367123");
        assert_eq!(
            decode_scalar(ScalarType::DateTime, &encoded).unwrap(),
            Scalar::DateTime(DateTime::from_timestamp_millis(1_614_834_367_123).unwrap())
        );
    }

    #[test]
    fn test_hostile_string_is_one_field_and_roundtrips() {
        let hostile = "a|b#c\\d\r\ne".to_owned();
        let (payload, code) = encode_value(&TypedValue::String(hostile.clone()));
        assert_eq!(split_unescaped(&payload, b'|').len(), 1);
        // As a compound element it additionally survives the hash splitter.
        assert_eq!(
            split_unescaped(&crate::escape::escape_hashes(&payload), b'#').len(),
            1
        );
        assert_eq!(
            decode_value(code, &payload).unwrap(),
            TypedValue::String(hostile)
        );
    }

    #[test]
    fn test_hostile_string_vector_roundtrips() {
        let v = TypedValue::Vector(VectorValue::String(vec![
            "a|b".into(),
            "c#d".into(),
            "e\\f".into(),
            "g\r\nh".into(),
        ]));
        assert_eq!(roundtrip(&v), v);
    }

    #[test]
    fn test_vector_roundtrips() {
        let dt = DateTime::from_timestamp_millis(86_400_000).unwrap();
        for v in [
            TypedValue::Vector(VectorValue::Bool(vec![true, false])),
            TypedValue::Vector(VectorValue::Int32(vec![])),
            TypedValue::Vector(VectorValue::Int64(vec![i64::MIN, 0, i64::MAX])),
            TypedValue::Vector(VectorValue::Double(vec![1.5, -2.25])),
            TypedValue::Vector(VectorValue::DateTime(vec![dt])),
        ] {
            assert_eq!(roundtrip(&v), v);
        }
    }

    #[test]
    fn test_empty_vector_with_trailing_delimiter() {
        // Some emitters leave a delimiter after the type code.
        assert_eq!(
            decode_value(COMPOUND_TYPE_CODE, "Vector#0#2#").unwrap(),
            TypedValue::Vector(VectorValue::Int32(vec![]))
        );
    }

    #[test]
    fn test_matrix_roundtrips() {
        let m = Matrix::from_vec(vec![1.0, 2.0, 3.0, 4.0], 2, 2).unwrap();
        let v = TypedValue::Matrix(MatrixValue::Double(m));
        assert_eq!(roundtrip(&v), v);

        let zero = TypedValue::Matrix(MatrixValue::String(Matrix::new()));
        assert_eq!(roundtrip(&zero), zero);
    }

    #[test]
    fn test_matrix_decode_is_column_major() {
        let decoded = decode_value(COMPOUND_TYPE_CODE, "EDHMatrix#2#3#2#0#10#1#11#2#12").unwrap();
        let TypedValue::Matrix(MatrixValue::Int32(m)) = decoded else {
            panic!("expected an i32 matrix");
        };
        for row in 0..2 {
            for column in 0..3 {
                assert_eq!(m[(row, column)], i32::try_from(row * 10 + column).unwrap());
            }
        }
    }

    #[test]
    fn test_zero_matrix_normalizes_dimensions() {
        let decoded = decode_value(COMPOUND_TYPE_CODE, "EDHMatrix#5#0#2#").unwrap();
        let TypedValue::Matrix(MatrixValue::Int32(m)) = decoded else {
            panic!("expected an i32 matrix");
        };
        assert_eq!((m.rows(), m.columns()), (0, 0));
    }

    #[test]
    fn test_unknown_type_codes() {
        assert_eq!(
            decode_value(3, "1"),
            Err(CodecError::UnknownTypeCode(3))
        );
        assert_eq!(
            decode_value(COMPOUND_TYPE_CODE, "Vector#1#99#x"),
            Err(CodecError::UnknownElementTypeCode(99))
        );
    }

    #[test]
    fn test_missing_compound_tag() {
        assert_eq!(
            decode_value(COMPOUND_TYPE_CODE, "no delimiters here"),
            Err(CodecError::MissingCompoundTag)
        );
        assert_eq!(
            decode_value(COMPOUND_TYPE_CODE, "Array#1#2#7"),
            Err(CodecError::UnknownCompoundTag("Array".into()))
        );
    }

    #[test]
    fn test_element_count_mismatch() {
        assert_eq!(
            decode_value(COMPOUND_TYPE_CODE, "Vector#3#2#1#2"),
            Err(CodecError::ElementCountMismatch {
                declared: 3,
                actual: 2
            })
        );
        assert_eq!(
            decode_value(COMPOUND_TYPE_CODE, "EDHMatrix#2#2#2#1#2#3"),
            Err(CodecError::ElementCountMismatch {
                declared: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_bad_numeric_field() {
        assert!(matches!(
            decode_value(6, "not-a-number"),
            Err(CodecError::InvalidNumber(_))
        ));
    }
}
