//! Default conversion of records into a dynamic value tree.
//!
//! A library that cannot encode a shape natively falls back to these
//! conversions: structured records and models become mappings and arrays
//! become nested sequences. Timestamps, uuids and enums become their string
//! form. The only open end is [`Record::Opaque`], which each library handles
//! through its [`Hook`].

use serde_json::{Map, Value};

use crate::error::EncodeError;
use crate::record::{ArrayData, Dataset, NumericArray, Opaque, Record, Shape};

/// Library-specific conversion for objects without a known shape.
pub type Hook = fn(&Opaque) -> Option<Value>;

/// Converts an opaque object to its string form.
pub fn stringify(obj: &Opaque) -> Option<Value> {
    Some(Value::String(obj.to_string()))
}

fn rows<T: Copy>(data: &[T], cols: Option<usize>, leaf: impl Fn(T) -> Value) -> Value {
    match cols {
        None => Value::Array(data.iter().map(|x| leaf(*x)).collect()),
        Some(cols) => Value::Array(
            data.chunks(cols)
                .map(|row| Value::Array(row.iter().map(|x| leaf(*x)).collect()))
                .collect(),
        ),
    }
}

pub fn array_to_value(array: &NumericArray) -> Value {
    let cols = array.cols();
    match array.data() {
        ArrayData::Bool(v) => rows(v, cols, Value::Bool),
        ArrayData::Int32(v) => rows(v, cols, Value::from),
        ArrayData::Int64(v) => rows(v, cols, Value::from),
        // NaN and infinities become null, as serde_json does.
        ArrayData::Float64(v) => rows(v, cols, Value::from),
    }
}

pub fn opaque_to_value(obj: &Opaque, hook: Option<Hook>) -> Result<Value, EncodeError> {
    hook.and_then(|h| h(obj)).ok_or(EncodeError::Unsupported {
        shape: Shape::Opaque,
    })
}

pub fn record_to_value(record: &Record, hook: Option<Hook>) -> Result<Value, EncodeError> {
    Ok(match record {
        Record::Mapping(map) => Value::Object(map.clone()),
        Record::Struct(user) => serde_json::to_value(user)?,
        Record::Model(model) => serde_json::to_value(model)?,
        Record::Array(array) => array_to_value(array),
        Record::Timestamp(ts) => Value::String(ts.to_string()),
        Record::Uuid(uid) => Value::String(uid.to_string()),
        Record::Enum(kind) => Value::String(kind.to_string()),
        Record::Opaque(obj) => opaque_to_value(obj, hook)?,
    })
}

/// Converts a record that must end up as a mapping (struct, model, mapping).
pub fn record_to_mapping(record: &Record) -> Result<Map<String, Value>, EncodeError> {
    match record_to_value(record, None)? {
        Value::Object(map) => Ok(map),
        _ => Err(EncodeError::Unsupported {
            shape: record.shape(),
        }),
    }
}

pub fn dataset_to_value(dataset: &Dataset, hook: Option<Hook>) -> Result<Value, EncodeError> {
    match dataset {
        Dataset::Records(records) => records
            .iter()
            .map(|r| record_to_value(r, hook))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Dataset::Array(array) => Ok(array_to_value(array)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::Generator;
    use crate::model::UserModel;
    use serde_json::json;

    #[test]
    fn test_struct_and_model_convert_identically() {
        let mut gen = Generator::with_seed(7).unwrap();
        let user = gen.user();
        let as_struct = record_to_value(&Record::Struct(user.clone()), None).unwrap();
        let map = record_to_mapping(&Record::Struct(user)).unwrap();
        let model = UserModel::from_mapping(&map).unwrap();
        let as_model = record_to_value(&Record::Model(model), None).unwrap();
        assert_eq!(as_struct, as_model);
        assert_eq!(as_struct, Value::Object(map));
    }

    #[test]
    fn test_user_mapping_fields() {
        let mut gen = Generator::with_seed(1).unwrap();
        let map = record_to_mapping(&Record::Struct(gen.user())).unwrap();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["active", "ctime", "display_name", "groups", "name", "score", "type", "uid"]
        );
        assert!(map["type"].is_string());
        assert!(map["uid"].is_string());
    }

    #[test]
    fn test_array_becomes_nested_sequences() {
        let a = NumericArray::new(2, Some(2), ArrayData::Bool(vec![true, false, false, true])).unwrap();
        assert_eq!(array_to_value(&a), json!([[true, false], [false, true]]));
        let b = NumericArray::new(3, None, ArrayData::Float64(vec![0.5, f64::NAN, 1.0])).unwrap();
        assert_eq!(array_to_value(&b), json!([0.5, null, 1.0]));
    }

    #[test]
    fn test_opaque_needs_hook() {
        let rec = Record::Opaque(Opaque::new(std::net::Ipv4Addr::new(10, 0, 0, 1)));
        assert!(matches!(
            record_to_value(&rec, None),
            Err(EncodeError::Unsupported {
                shape: Shape::Opaque
            })
        ));
        assert_eq!(record_to_value(&rec, Some(stringify)).unwrap(), json!("10.0.0.1"));
    }

    #[test]
    fn test_enums_convert_to_names() {
        use crate::record::UserType;
        assert_eq!(record_to_value(&Record::Enum(UserType::Admin), None).unwrap(), json!("admin"));
        let mut gen = Generator::with_seed(3).unwrap();
        let user = gen.user();
        let kind = user.kind;
        let map = record_to_mapping(&Record::Struct(user)).unwrap();
        assert_eq!(map["type"], json!(kind.as_str()));
    }
}
