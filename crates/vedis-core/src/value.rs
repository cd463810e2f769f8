//! Dynamically-typed values exchanged between commands and callers.
//!
//! Every command argument arrives as a [`Value::String`] and every command
//! result is a [`Value`] tree. Host conversions go through `From`/`TryFrom`
//! and fail with [`Error::TypeError`] when the shape does not match.

use crate::{Error, Result};
use std::fmt;

/// Codec tags, one per variant.
mod tag {
    pub const STRING: u8 = 1;
    pub const INTEGER: u8 = 2;
    pub const DOUBLE: u8 = 3;
    pub const BOOLEAN: u8 = 4;
    pub const NULL: u8 = 5;
    pub const ARRAY: u8 = 6;
}

/// A dynamically-typed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Raw bytes with explicit length
    String(Vec<u8>),
    /// 64-bit signed integer
    Integer(i64),
    /// Floating point
    Double(f64),
    /// Boolean
    Boolean(bool),
    /// Absent value
    #[default]
    Null,
    /// Ordered, possibly heterogeneous and nested sequence
    Array(Vec<Value>),
}

impl Value {
    /// Name of the variant, used in type errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::Boolean(_) => "boolean",
            Value::Null => "null",
            Value::Array(_) => "array",
        }
    }

    /// True for [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for [`Value::Array`]
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Borrow the payload of a string value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(b) => Some(b),
            _ => None,
        }
    }

    /// Borrow the elements of an array value.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Textual rendering of a scalar, as stored by the key/value layer.
    ///
    /// Integers and doubles render in decimal, booleans as `1`/`0`, null as an
    /// empty string. Arrays have no byte form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Value::String(b) => Ok(b.clone()),
            Value::Integer(i) => Ok(i.to_string().into_bytes()),
            Value::Double(d) => Ok(d.to_string().into_bytes()),
            Value::Boolean(b) => Ok(if *b { b"1".to_vec() } else { b"0".to_vec() }),
            Value::Null => Ok(Vec::new()),
            Value::Array(_) => Err(Error::TypeError(
                "array value has no byte representation".to_string(),
            )),
        }
    }

    /// Interprets the value as an integer, parsing string payloads.
    pub fn to_int(&self) -> Result<i64> {
        match self {
            Value::Integer(i) => Ok(*i),
            Value::Boolean(b) => Ok(*b as i64),
            Value::Double(d) => Ok(*d as i64),
            Value::String(b) => std::str::from_utf8(b)
                .ok()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .ok_or_else(|| {
                    Error::TypeError(format!(
                        "expected integer, got {:?}",
                        String::from_utf8_lossy(b)
                    ))
                }),
            other => Err(Error::TypeError(format!(
                "expected integer, got {}",
                other.type_name()
            ))),
        }
    }

    /// Interprets the value as a double, parsing string payloads.
    pub fn to_double(&self) -> Result<f64> {
        match self {
            Value::Double(d) => Ok(*d),
            Value::Integer(i) => Ok(*i as f64),
            Value::String(b) => std::str::from_utf8(b)
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .ok_or_else(|| Error::TypeError("expected double".to_string())),
            other => Err(Error::TypeError(format!(
                "expected double, got {}",
                other.type_name()
            ))),
        }
    }

    /// Serialize into the tagged binary form.
    ///
    /// Layout: `[tag u8]` followed by a fixed-width little-endian payload,
    /// or `[len u32 LE][bytes]` for strings and `[count u32 LE][items]` for
    /// arrays.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Value::String(b) => {
                out.push(tag::STRING);
                out.extend_from_slice(&(b.len() as u32).to_le_bytes());
                out.extend_from_slice(b);
            }
            Value::Integer(i) => {
                out.push(tag::INTEGER);
                out.extend_from_slice(&i.to_le_bytes());
            }
            Value::Double(d) => {
                out.push(tag::DOUBLE);
                out.extend_from_slice(&d.to_le_bytes());
            }
            Value::Boolean(b) => {
                out.push(tag::BOOLEAN);
                out.push(*b as u8);
            }
            Value::Null => out.push(tag::NULL),
            Value::Array(items) => {
                out.push(tag::ARRAY);
                out.extend_from_slice(&(items.len() as u32).to_le_bytes());
                for item in items {
                    item.encode_into(out);
                }
            }
        }
    }

    /// Deserialize a value produced by [`Value::encode`].
    ///
    /// An unknown tag is an invariant violation and fails with
    /// [`Error::TypeError`]; trailing or missing bytes fail with
    /// [`Error::Serialization`].
    pub fn decode(data: &[u8]) -> Result<Value> {
        let mut pos = 0;
        let value = Self::decode_at(data, &mut pos)?;
        if pos != data.len() {
            return Err(Error::Serialization(format!(
                "{} trailing bytes after value",
                data.len() - pos
            )));
        }
        Ok(value)
    }

    fn decode_at(data: &[u8], pos: &mut usize) -> Result<Value> {
        let kind = take(data, pos, 1)?[0];
        match kind {
            tag::STRING => {
                let len = read_u32(data, pos)? as usize;
                Ok(Value::String(take(data, pos, len)?.to_vec()))
            }
            tag::INTEGER => Ok(Value::Integer(i64::from_le_bytes(read_8(data, pos)?))),
            tag::DOUBLE => Ok(Value::Double(f64::from_le_bytes(read_8(data, pos)?))),
            tag::BOOLEAN => Ok(Value::Boolean(take(data, pos, 1)?[0] != 0)),
            tag::NULL => Ok(Value::Null),
            tag::ARRAY => {
                let count = read_u32(data, pos)? as usize;
                // Every element takes at least one byte.
                if count > data.len().saturating_sub(*pos) {
                    return Err(Error::Serialization(format!(
                        "array count {} exceeds remaining input",
                        count
                    )));
                }
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(Self::decode_at(data, pos)?);
                }
                Ok(Value::Array(items))
            }
            unknown => Err(Error::TypeError(format!(
                "unknown value tag {}",
                unknown
            ))),
        }
    }
}

fn take<'a>(data: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = pos
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| Error::Serialization("truncated value".to_string()))?;
    let slice = &data[*pos..end];
    *pos = end;
    Ok(slice)
}

fn read_u32(data: &[u8], pos: &mut usize) -> Result<u32> {
    let b = take(data, pos, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_8(data: &[u8], pos: &mut usize) -> Result<[u8; 8]> {
    let b = take(data, pos, 8)?;
    let mut out = [0u8; 8];
    out.copy_from_slice(b);
    Ok(out)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

// Host -> Value

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into_bytes())
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::String(b.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::String(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

// Value -> Host

fn mismatch(expected: &str, got: &Value) -> Error {
    Error::TypeError(format!("expected {}, got {}", expected, got.type_name()))
}

impl TryFrom<Value> for Vec<u8> {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(b) => Ok(b),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(b) => String::from_utf8(b)
                .map_err(|e| Error::TypeError(format!("string is not UTF-8: {}", e))),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Integer(i) => Ok(i),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Double(d) => Ok(d),
            Value::Integer(i) => Ok(i as f64),
            other => Err(mismatch("double", &other)),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Boolean(b) => Ok(b),
            Value::Integer(i) => Ok(i != 0),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl<T> TryFrom<Value> for Option<T>
where
    T: TryFrom<Value, Error = Error>,
{
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::try_from(other).map(Some),
        }
    }
}

impl<T> TryFrom<Value> for Vec<T>
where
    T: TryFrom<Value, Error = Error>,
{
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::try_from).collect(),
            other => Err(mismatch("array", &other)),
        }
    }
}
