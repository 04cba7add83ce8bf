//! Typed value codec for the hub's pipe/hash-delimited wire protocol.
//!
//! This crate provides:
//! - `TypedValue` and friends - the closed value model (scalars, vectors, matrices)
//! - `Matrix` - dense 2-D storage for matrix values
//! - Encode/decode between typed values and their escaped wire text
//! - The escaping and splitting rules shared by both framing levels

pub mod decode;
pub mod encode;
pub mod escape;
pub mod matrix;
pub mod value;

pub use decode::{CodecError, decode_scalar, decode_value};
pub use encode::{encode_scalar, encode_tag_value, encode_tag_value_name, encode_value};
pub use escape::{escape_field, escape_hashes, split_hash_list, split_unescaped, unescape_field};
pub use matrix::Matrix;
pub use value::{
    COMPOUND_TYPE_CODE, MatrixValue, Quality, Scalar, ScalarType, TagValue, TagValueName,
    TypedValue, VectorValue,
};
