//! Field values and field tables

use bytes::Bytes;
use indexmap::IndexMap;

pub mod codec;

/// A field table. Insertion order is preserved so that an encoded table
/// decodes back to the same sequence of entries.
pub type FieldTable = IndexMap<String, Value>;

/// A decimal value: `value * 10^(-scale)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    /// Number of decimal digits
    pub scale: u8,

    /// Unscaled value
    pub value: u32,
}

/// Values that may appear in a field table or field array.
///
/// The tags follow the RabbitMQ/Qpid errata of the 0-9-1 specification, which is
/// what brokers actually put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `t`
    Bool(bool),

    /// `b`
    I8(i8),

    /// `B`
    U8(u8),

    /// `s`
    I16(i16),

    /// `u`
    U16(u16),

    /// `I`
    I32(i32),

    /// `i`
    U32(u32),

    /// `l`
    I64(i64),

    /// `f`
    F32(f32),

    /// `d`
    F64(f64),

    /// `D`
    Decimal(Decimal),

    /// `S`, kept as raw octets since brokers do not guarantee UTF-8
    LongString(Bytes),

    /// `A`
    Array(Vec<Value>),

    /// `T`, seconds since the epoch
    Timestamp(u64),

    /// `F`
    Table(FieldTable),

    /// `V`
    Void,

    /// `x`
    ByteArray(Bytes),
}

impl Value {
    /// The tag octet that precedes the value on the wire
    pub fn tag(&self) -> u8 {
        match self {
            Value::Bool(_) => b't',
            Value::I8(_) => b'b',
            Value::U8(_) => b'B',
            Value::I16(_) => b's',
            Value::U16(_) => b'u',
            Value::I32(_) => b'I',
            Value::U32(_) => b'i',
            Value::I64(_) => b'l',
            Value::F32(_) => b'f',
            Value::F64(_) => b'd',
            Value::Decimal(_) => b'D',
            Value::LongString(_) => b'S',
            Value::Array(_) => b'A',
            Value::Timestamp(_) => b'T',
            Value::Table(_) => b'F',
            Value::Void => b'V',
            Value::ByteArray(_) => b'x',
        }
    }

    /// Returns the string if the value is a long string holding valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::LongString(s) => std::str::from_utf8(s).ok(),
            _ => None,
        }
    }

    /// Returns the boolean if the value is a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the nested table if the value is a table
    pub fn as_table(&self) -> Option<&FieldTable> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::LongString(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::LongString(Bytes::from(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<FieldTable> for Value {
    fn from(value: FieldTable) -> Self {
        Value::Table(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}
