use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::{Library, Options};
use crate::convert::{self, Hook};
use crate::error::{DecodeError, EncodeError};
use crate::record::{Dataset, Record, Shape};

/// `rmp-serde` driven through serde derives, structs as named maps.
///
/// Arrays and models are serialized natively only when the matching
/// [`Options`] bit is set; otherwise they go through the default conversion.
pub struct RmpSerde {
    options: Options,
    hook: Option<Hook>,
}

impl RmpSerde {
    pub fn new(options: Options, hook: Option<Hook>) -> Self {
        Self { options, hook }
    }

    pub fn options(&self) -> Options {
        self.options
    }
}

struct Native<'a> {
    record: &'a Record,
    lib: &'a RmpSerde,
}

impl Serialize for Native<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let options = self.lib.options;
        match self.record {
            Record::Mapping(map) => map.serialize(serializer),
            Record::Struct(user) => user.serialize(serializer),
            Record::Model(model) if options.contains(Options::NATIVE_MODELS) => {
                model.serialize(serializer)
            }
            Record::Array(array) if options.contains(Options::NATIVE_ARRAYS) => {
                array.serialize(serializer)
            }
            Record::Timestamp(ts) => ts.serialize(serializer),
            Record::Uuid(uid) => uid.serialize(serializer),
            Record::Enum(kind) => kind.serialize(serializer),
            other => convert::record_to_value(other, self.lib.hook)
                .map_err(S::Error::custom)?
                .serialize(serializer),
        }
    }
}

struct NativeRecords<'a> {
    records: &'a [Record],
    lib: &'a RmpSerde,
}

impl Serialize for NativeRecords<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records.iter().map(|record| Native {
            record,
            lib: self.lib,
        }))
    }
}

impl Library for RmpSerde {
    fn name(&self) -> &str {
        "rmp-serde"
    }

    fn encode(&self, data: &Dataset) -> Result<Vec<u8>, EncodeError> {
        if self.hook.is_none() && data.shape() == Some(Shape::Opaque) {
            return Err(EncodeError::Unsupported {
                shape: Shape::Opaque,
            });
        }
        let bytes = match data {
            Dataset::Records(records) => rmp_serde::to_vec_named(&NativeRecords {
                records,
                lib: self,
            })?,
            Dataset::Array(array) if self.options.contains(Options::NATIVE_ARRAYS) => {
                rmp_serde::to_vec_named(array)?
            }
            Dataset::Array(array) => rmp_serde::to_vec_named(&convert::array_to_value(array))?,
        };
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::Generator;

    #[test]
    fn test_native_and_converted_arrays_agree() {
        let mut gen = Generator::with_seed(21).unwrap();
        let data = Dataset::Array(gen.int32_array(10, Some(7)).unwrap());
        let native = RmpSerde::new(Options::NATIVE_ARRAYS, None).encode(&data).unwrap();
        let converted = RmpSerde::new(Options::NONE, None).encode(&data).unwrap();
        assert_eq!(native, converted);
    }

    #[test]
    fn test_structs_encode_as_named_maps() {
        let mut gen = Generator::with_seed(22).unwrap();
        let data = Dataset::Records(vec![Record::Struct(gen.user())]);
        let bytes = RmpSerde::new(Options::NONE, None).encode(&data).unwrap();
        let value = RmpSerde::new(Options::NONE, None).decode(&bytes).unwrap();
        assert!(value[0]["groups"][0]["uid"].is_string());
        assert!(value[0]["type"].is_u64());
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let lib = RmpSerde::new(Options::NONE, None);
        assert!(lib.decode(&[0xc1]).is_err());
        assert!(lib.decode(&[0x92, 0x01]).is_err());
    }
}
