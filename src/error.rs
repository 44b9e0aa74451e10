//! Error types for generation, encoding, decoding and reporting.
//!
//! Each kind maps to one recovery boundary: generation errors are fatal,
//! encode/decode errors cost one benchmark cell, report schema errors cost one
//! report group.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::record::Shape;

/// Invalid generator configuration. Never recovered.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: usize },

    #[error("no alphabets configured")]
    NoAlphabets,

    #[error("alphabet {index} contains no letters")]
    EmptyAlphabet { index: usize },

    #[error("shared group pool is empty")]
    EmptyPool,

    #[error("invalid timestamp range {min}..={max}")]
    TimeRange { min: i64, max: i64 },

    #[error("array of {rows} x {cols} elements overflows usize")]
    ArrayTooLarge { rows: usize, cols: usize },

    #[error("dataset mixes {first} and {other} records")]
    MixedShapes { first: Shape, other: Shape },

    #[error("generated model failed validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("generated record could not be converted: {0}")]
    Conversion(#[from] EncodeError),
}

/// A mapping that cannot be turned into a validated model.
#[derive(Debug, Error)]
#[error("invalid user model: {0}")]
pub struct ValidationError(#[from] serde_json::Error);

/// A library failed to encode a dataset.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("no conversion path for {shape} records")]
    Unsupported { shape: Shape },

    #[error("conversion to value tree failed: {0}")]
    Conversion(#[from] serde_json::Error),

    #[error("rmp-serde: {0}")]
    RmpSerde(#[from] rmp_serde::encode::Error),

    #[error("write failed: {0}")]
    Io(#[from] io::Error),

    #[error("collection of {0} elements exceeds the msgpack length limit")]
    LengthOverflow(usize),
}

/// A library failed to decode its input.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("rmp-serde: {0}")]
    RmpSerde(#[from] rmp_serde::decode::Error),

    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error("msgpack: {0}")]
    Value(#[from] rmp::decode::ValueReadError<io::Error>),

    #[error("msgpack: {0}")]
    Number(#[from] rmp::decode::NumValueReadError<io::Error>),

    #[error("unsupported msgpack marker {0}")]
    UnsupportedMarker(String),

    #[error("map key is not a string")]
    NonStringKey,

    #[error("string is not valid utf-8")]
    InvalidUtf8,

    #[error("nesting deeper than {0} levels")]
    DepthLimit(usize),

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
}

/// One (library, experiment) cell that could not be measured.
#[derive(Debug, Error)]
pub enum CaseError {
    #[error("{lib} failed to encode `{group}`: {source}")]
    Encode {
        lib: String,
        group: String,
        #[source]
        source: EncodeError,
    },

    #[error("{lib} failed to decode `{group}`: {source}")]
    Decode {
        lib: String,
        group: String,
        #[source]
        source: DecodeError,
    },
}

impl CaseError {
    pub fn lib(&self) -> &str {
        match self {
            CaseError::Encode { lib, .. } | CaseError::Decode { lib, .. } => lib,
        }
    }

    pub fn group(&self) -> &str {
        match self {
            CaseError::Encode { group, .. } | CaseError::Decode { group, .. } => group,
        }
    }
}

/// A persisted group whose rows do not support the columns it claims.
#[derive(Debug, Error, PartialEq)]
pub enum ReportSchemaError {
    #[error("group `{group}`: row for `{lib}` is missing `{field}`")]
    MissingField {
        group: String,
        lib: String,
        field: &'static str,
    },

    #[error("group `{group}`: `output_size` present on some rows but not on `{lib}`")]
    InconsistentOutputSize { group: String, lib: String },
}

/// Persisted results could not be loaded.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to walk results directory: {0}")]
    Walk(#[from] walkdir::Error),
}
