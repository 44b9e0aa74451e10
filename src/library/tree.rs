use std::io;

use rmp::decode as dec;
use rmp::encode::{self as enc, ValueWriteError};
use rmp::Marker;
use serde_json::{Map, Value};

use super::Library;
use crate::convert::{self, Hook};
use crate::error::{DecodeError, EncodeError};
use crate::record::{Dataset, Record};

/// Nesting limit of the recursive reader; well within a 2 MiB thread stack.
const MAX_DEPTH: usize = 128;

/// Plain `rmp` over a dynamic value tree.
///
/// Every record except plain mappings is converted before writing, so this
/// measures the generic path a library without native support takes.
pub struct RmpTree {
    hook: Option<Hook>,
}

impl RmpTree {
    pub fn new(hook: Option<Hook>) -> Self {
        Self { hook }
    }
}

impl Library for RmpTree {
    fn name(&self) -> &str {
        "rmp"
    }

    fn encode(&self, data: &Dataset) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::new();
        match data {
            Dataset::Records(records) => {
                enc::write_array_len(&mut buf, len32(records.len())?).map_err(write_err)?;
                for record in records {
                    match record {
                        Record::Mapping(map) => write_map(&mut buf, map)?,
                        other => write_value(&mut buf, &convert::record_to_value(other, self.hook)?)?,
                    }
                }
            }
            Dataset::Array(array) => write_value(&mut buf, &convert::array_to_value(array))?,
        }
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        let mut rd = bytes;
        let value = read_value(&mut rd, 0)?;
        if !rd.is_empty() {
            return Err(DecodeError::TrailingBytes(rd.len()));
        }
        Ok(value)
    }
}

fn write_err(e: ValueWriteError<io::Error>) -> EncodeError {
    match e {
        ValueWriteError::InvalidMarkerWrite(e) | ValueWriteError::InvalidDataWrite(e) => {
            EncodeError::Io(e)
        }
    }
}

fn len32(n: usize) -> Result<u32, EncodeError> {
    u32::try_from(n).map_err(|_| EncodeError::LengthOverflow(n))
}

fn write_map(wr: &mut Vec<u8>, map: &Map<String, Value>) -> Result<(), EncodeError> {
    enc::write_map_len(wr, len32(map.len())?).map_err(write_err)?;
    for (k, v) in map {
        enc::write_str(wr, k).map_err(write_err)?;
        write_value(wr, v)?;
    }
    Ok(())
}

fn write_value(wr: &mut Vec<u8>, value: &Value) -> Result<(), EncodeError> {
    match value {
        Value::Null => enc::write_nil(wr)?,
        Value::Bool(b) => enc::write_bool(wr, *b)?,
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                enc::write_uint(wr, u).map_err(write_err)?;
            } else if let Some(i) = n.as_i64() {
                enc::write_sint(wr, i).map_err(write_err)?;
            } else if let Some(f) = n.as_f64() {
                enc::write_f64(wr, f).map_err(write_err)?;
            }
        }
        Value::String(s) => enc::write_str(wr, s).map_err(write_err)?,
        Value::Array(items) => {
            enc::write_array_len(wr, len32(items.len())?).map_err(write_err)?;
            for item in items {
                write_value(wr, item)?;
            }
        }
        Value::Object(map) => write_map(wr, map)?,
    }
    Ok(())
}

fn eof() -> DecodeError {
    io::Error::from(io::ErrorKind::UnexpectedEof).into()
}

fn read_str(rd: &mut &[u8], len: usize) -> Result<Value, DecodeError> {
    if rd.len() < len {
        return Err(eof());
    }
    let (head, tail) = rd.split_at(len);
    let s = std::str::from_utf8(head).map_err(|_| DecodeError::InvalidUtf8)?;
    *rd = tail;
    Ok(Value::String(s.to_string()))
}

fn read_array(rd: &mut &[u8], len: usize, depth: usize) -> Result<Value, DecodeError> {
    // Every element takes at least one byte.
    let mut items = Vec::with_capacity(len.min(rd.len()));
    for _ in 0..len {
        items.push(read_value(rd, depth + 1)?);
    }
    Ok(Value::Array(items))
}

fn read_map(rd: &mut &[u8], len: usize, depth: usize) -> Result<Value, DecodeError> {
    let mut map = Map::new();
    for _ in 0..len {
        let key = match read_value(rd, depth + 1)? {
            Value::String(k) => k,
            _ => return Err(DecodeError::NonStringKey),
        };
        let value = read_value(rd, depth + 1)?;
        map.insert(key, value);
    }
    Ok(Value::Object(map))
}

/// Peeks the marker to pick the `rmp::decode` reader, which consumes it.
fn read_value(rd: &mut &[u8], depth: usize) -> Result<Value, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::DepthLimit(MAX_DEPTH));
    }
    let marker = Marker::from_u8(*rd.first().ok_or_else(eof)?);
    let value = match marker {
        Marker::Null => {
            dec::read_nil(rd)?;
            Value::Null
        }
        Marker::True | Marker::False => Value::Bool(dec::read_bool(rd)?),
        Marker::FixPos(_) | Marker::U8 | Marker::U16 | Marker::U32 | Marker::U64 => {
            Value::from(dec::read_int::<u64, _>(rd)?)
        }
        Marker::FixNeg(_) | Marker::I8 | Marker::I16 | Marker::I32 | Marker::I64 => {
            Value::from(dec::read_int::<i64, _>(rd)?)
        }
        Marker::F32 => Value::from(f64::from(dec::read_f32(rd)?)),
        Marker::F64 => Value::from(dec::read_f64(rd)?),
        Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32 => {
            let len = dec::read_str_len(rd)? as usize;
            read_str(rd, len)?
        }
        Marker::FixArray(_) | Marker::Array16 | Marker::Array32 => {
            let len = dec::read_array_len(rd)? as usize;
            read_array(rd, len, depth)?
        }
        Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => {
            let len = dec::read_map_len(rd)? as usize;
            read_map(rd, len, depth)?
        }
        other => return Err(DecodeError::UnsupportedMarker(format!("{other:?}"))),
    };
    Ok(value)
}
