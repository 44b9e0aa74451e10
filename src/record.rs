//! Domain records: the values that get encoded.
//!
//! Every benchmark input is a [`Record`] (one of a closed set of shapes) or a
//! [`Dataset`] of them. Serialization of records goes through serde so that
//! native encoders and the default conversion agree field for field.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::convert;
use crate::error::{EncodeError, GenerationError};
use crate::model::UserModel;

/// Structural category of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    Mapping,
    Struct,
    Model,
    Array,
    Timestamp,
    Uuid,
    Enum,
    Opaque,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Mapping => "mapping",
            Shape::Struct => "struct",
            Shape::Model => "model",
            Shape::Array => "array",
            Shape::Timestamp => "timestamp",
            Shape::Uuid => "uuid",
            Shape::Enum => "enum",
            Shape::Opaque => "opaque",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version-4 identifier, encoded as its hyphenated string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Uid(pub uuid::Uuid);

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl Serialize for Uid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Uid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        uuid::Uuid::parse_str(&s).map(Uid).map_err(de::Error::custom)
    }
}

/// A point in time, with or without a UTC offset.
///
/// Both forms encode as ISO 8601 text; only the aware form carries an offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timestamp {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Aware(dt) => f.write_str(&dt.to_rfc3339()),
            Timestamp::Naive(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Role of a user.
///
/// Native encoders write the discriminant. Human-readable serializers, and so
/// the default conversion, get the lowercase name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum UserType {
    Admin = 1,
    User = 2,
    System = 3,
}

impl UserType {
    pub const ALL: [UserType; 3] = [UserType::Admin, UserType::User, UserType::System];

    pub fn from_value(v: u64) -> Option<Self> {
        match v {
            1 => Some(UserType::Admin),
            2 => Some(UserType::User),
            3 => Some(UserType::System),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Admin => "admin",
            UserType::User => "user",
            UserType::System => "system",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown user type `{s}`"))
    }
}

impl Serialize for UserType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(self.as_str())
        } else {
            serializer.serialize_u8(*self as u8)
        }
    }
}

struct UserTypeVisitor;

impl<'de> Visitor<'de> for UserTypeVisitor {
    type Value = UserType;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a user type name or an integer in 1..=3")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<UserType, E> {
        UserType::from_value(v).ok_or_else(|| E::invalid_value(Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<UserType, E> {
        u64::try_from(v)
            .ok()
            .and_then(UserType::from_value)
            .ok_or_else(|| E::invalid_value(Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<UserType, E> {
        v.parse()
            .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for UserType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(UserTypeVisitor)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Group {
    pub name: String,
    pub uid: Uid,
}

/// Lightweight structured record. Fields are declared in the order their
/// mapping form lists them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct User {
    pub active: bool,
    pub ctime: Timestamp,
    pub display_name: String,
    /// First entry is owned by this user; the rest are shared pool groups.
    pub groups: Vec<Arc<Group>>,
    pub name: String,
    pub score: f64,
    #[serde(rename = "type")]
    pub kind: UserType,
    pub uid: Uid,
}

/// Homogeneous element storage of a [`NumericArray`].
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayData {
    Bool(Vec<bool>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Bool(v) => v.len(),
            ArrayData::Int32(v) => v.len(),
            ArrayData::Int64(v) => v.len(),
            ArrayData::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            ArrayData::Bool(_) => "bool",
            ArrayData::Int32(_) => "int32",
            ArrayData::Int64(_) => "int64",
            ArrayData::Float64(_) => "float64",
        }
    }
}

/// Row-major bulk array with one (`cols == None`) or two dimensions.
#[derive(Clone, Debug, PartialEq)]
pub struct NumericArray {
    rows: usize,
    cols: Option<usize>,
    data: ArrayData,
}

impl NumericArray {
    /// Returns `None` when the element count does not match the shape or a
    /// dimension is zero.
    pub fn new(rows: usize, cols: Option<usize>, data: ArrayData) -> Option<Self> {
        let expected = rows.checked_mul(cols.unwrap_or(1))?;
        if rows == 0 || cols == Some(0) || data.len() != expected {
            return None;
        }
        Some(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> Option<usize> {
        self.cols
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }
}

fn serialize_rows<T, S>(data: &[T], cols: Option<usize>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match cols {
        None => data.serialize(serializer),
        Some(cols) => serializer.collect_seq(data.chunks(cols)),
    }
}

impl Serialize for NumericArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.data {
            ArrayData::Bool(v) => serialize_rows(v, self.cols, serializer),
            ArrayData::Int32(v) => serialize_rows(v, self.cols, serializer),
            ArrayData::Int64(v) => serialize_rows(v, self.cols, serializer),
            ArrayData::Float64(v) => serialize_rows(v, self.cols, serializer),
        }
    }
}

/// An object no library encodes natively; only its string form is known.
#[derive(Clone)]
pub struct Opaque(Arc<dyn fmt::Display + Send + Sync>);

impl Opaque {
    pub fn new<T: fmt::Display + Send + Sync + 'static>(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl fmt::Display for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.0)
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

/// One generated benchmark value.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Mapping(Map<String, Value>),
    Struct(User),
    Model(UserModel),
    Array(NumericArray),
    Timestamp(Timestamp),
    Uuid(Uid),
    Enum(UserType),
    Opaque(Opaque),
}

impl Record {
    pub fn shape(&self) -> Shape {
        match self {
            Record::Mapping(_) => Shape::Mapping,
            Record::Struct(_) => Shape::Struct,
            Record::Model(_) => Shape::Model,
            Record::Array(_) => Shape::Array,
            Record::Timestamp(_) => Shape::Timestamp,
            Record::Uuid(_) => Shape::Uuid,
            Record::Enum(_) => Shape::Enum,
            Record::Opaque(_) => Shape::Opaque,
        }
    }
}

/// Immutable benchmark input: a single-shape record list or one bulk array.
#[derive(Clone, Debug, PartialEq)]
pub enum Dataset {
    Records(Vec<Record>),
    Array(NumericArray),
}

impl Dataset {
    pub fn from_records(records: Vec<Record>) -> Result<Self, GenerationError> {
        if let Some(first) = records.first().map(Record::shape) {
            if let Some(other) = records.iter().map(Record::shape).find(|s| *s != first) {
                return Err(GenerationError::MixedShapes { first, other });
            }
        }
        Ok(Dataset::Records(records))
    }

    pub fn shape(&self) -> Option<Shape> {
        match self {
            Dataset::Records(records) => records.first().map(Record::shape),
            Dataset::Array(_) => Some(Shape::Array),
        }
    }

    /// Number of top-level records, or array elements.
    pub fn len(&self) -> usize {
        match self {
            Dataset::Records(records) => records.len(),
            Dataset::Array(array) => array.data().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// SHA-256 over the canonical JSON form of the default conversion.
    pub fn fingerprint(&self) -> Result<String, EncodeError> {
        let value = convert::dataset_to_value(self, Some(convert::stringify))?;
        let bytes = serde_json::to_vec(&value)?;
        let digest: [u8; 32] = Sha256::digest(&bytes).into();
        let mut s = String::with_capacity(64);
        for b in digest {
            s.push_str(&format!("{:02x}", b));
        }
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_array_shape_checked() {
        assert!(NumericArray::new(2, Some(3), ArrayData::Int32(vec![0; 6])).is_some());
        assert!(NumericArray::new(2, Some(3), ArrayData::Int32(vec![0; 5])).is_none());
        assert!(NumericArray::new(0, None, ArrayData::Bool(vec![])).is_none());
        assert!(NumericArray::new(4, Some(0), ArrayData::Bool(vec![])).is_none());
    }

    #[test]
    fn test_array_serializes_rows() {
        let a = NumericArray::new(2, Some(2), ArrayData::Int64(vec![1, -2, 3, i64::MIN])).unwrap();
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::json!([[1, -2], [3, i64::MIN]])
        );
    }

    #[test]
    fn test_timestamp_forms() {
        let dt = Utc.timestamp_opt(4_123_518_902, 0).unwrap().fixed_offset();
        assert_eq!(Timestamp::Aware(dt).to_string(), "2100-09-01T21:55:02+00:00");
        assert_eq!(
            Timestamp::Naive(dt.naive_utc()).to_string(),
            "2100-09-01T21:55:02"
        );
    }

    #[test]
    fn test_mixed_shapes_rejected() {
        let err = Dataset::from_records(vec![
            Record::Enum(UserType::Admin),
            Record::Opaque(Opaque::new("x")),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::MixedShapes {
                first: Shape::Enum,
                other: Shape::Opaque
            }
        ));
    }

    #[test]
    fn test_user_type_forms() {
        // serde_json is human readable, rmp-serde is not.
        assert_eq!(serde_json::to_value(UserType::System).unwrap(), "system");
        assert_eq!(rmp_serde::to_vec(&UserType::System).unwrap(), [0x03]);
        assert_eq!(UserType::from_value(2), Some(UserType::User));
        assert_eq!(UserType::from_value(4), None);
        assert_eq!("admin".parse::<UserType>(), Ok(UserType::Admin));
        assert!("Admin".parse::<UserType>().is_err());
    }

    #[test]
    fn test_user_type_accepts_name_or_value() {
        let from_int: UserType = serde_json::from_value(serde_json::json!(3)).unwrap();
        let from_name: UserType = serde_json::from_value(serde_json::json!("system")).unwrap();
        assert_eq!(from_int, from_name);
        assert!(serde_json::from_value::<UserType>(serde_json::json!(0)).is_err());
        assert!(serde_json::from_value::<UserType>(serde_json::json!(-1)).is_err());
    }

    #[test]
    fn test_uid_round_trips_through_text() {
        let uid = Uid(uuid::Uuid::from_u128(0x7202d115_7ff3_4c81_a7c1_2a1f067b1ece));
        let text = serde_json::to_value(uid).unwrap();
        assert_eq!(text, "7202d115-7ff3-4c81-a7c1-2a1f067b1ece");
        assert_eq!(serde_json::from_value::<Uid>(text).unwrap(), uid);
        assert!(serde_json::from_value::<Uid>(serde_json::json!("nope")).is_err());
    }
}
