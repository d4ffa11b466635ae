//! Reading and writing of the 0-9-1 primitive domains
//!
//! All integers are big-endian. Short strings carry a one octet length, long
//! strings and tables carry a four octet length.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::Error;

use super::{Decimal, FieldTable, Value};

#[inline]
fn ensure(src: &impl Buf, len: usize) -> Result<(), Error> {
    if src.remaining() < len {
        return Err(Error::Truncated);
    }
    Ok(())
}

/// Reads an octet
pub fn read_u8(src: &mut impl Buf) -> Result<u8, Error> {
    ensure(src, 1)?;
    Ok(src.get_u8())
}

/// Reads a short (16-bit) integer
pub fn read_u16(src: &mut impl Buf) -> Result<u16, Error> {
    ensure(src, 2)?;
    Ok(src.get_u16())
}

/// Reads a long (32-bit) integer
pub fn read_u32(src: &mut impl Buf) -> Result<u32, Error> {
    ensure(src, 4)?;
    Ok(src.get_u32())
}

/// Reads a long-long (64-bit) integer
pub fn read_u64(src: &mut impl Buf) -> Result<u64, Error> {
    ensure(src, 8)?;
    Ok(src.get_u64())
}

/// Reads a short string
pub fn read_short_str(src: &mut impl Buf) -> Result<String, Error> {
    let len = read_u8(src)? as usize;
    ensure(src, len)?;
    let bytes = src.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidUtf8("short string"))
}

/// Reads a long string as raw bytes
pub fn read_long_str(src: &mut impl Buf) -> Result<Bytes, Error> {
    let len = read_u32(src)? as usize;
    ensure(src, len)?;
    Ok(src.copy_to_bytes(len))
}

/// Reads a field table, including its length prefix
pub fn read_table(src: &mut impl Buf) -> Result<FieldTable, Error> {
    let len = read_u32(src)? as usize;
    ensure(src, len)?;
    let mut body = src.copy_to_bytes(len);

    let mut table = FieldTable::new();
    while body.has_remaining() {
        let key = read_short_str(&mut body)?;
        let value = read_value(&mut body)?;
        table.insert(key, value);
    }
    Ok(table)
}

fn read_array(src: &mut impl Buf) -> Result<Vec<Value>, Error> {
    let len = read_u32(src)? as usize;
    ensure(src, len)?;
    let mut body = src.copy_to_bytes(len);

    let mut values = Vec::new();
    while body.has_remaining() {
        values.push(read_value(&mut body)?);
    }
    Ok(values)
}

/// Reads a tagged field value
pub fn read_value(src: &mut impl Buf) -> Result<Value, Error> {
    let tag = read_u8(src)?;
    let value = match tag {
        b't' => Value::Bool(read_u8(src)? != 0),
        b'b' => Value::I8(read_u8(src)? as i8),
        b'B' => Value::U8(read_u8(src)?),
        b's' => Value::I16(read_u16(src)? as i16),
        b'u' => Value::U16(read_u16(src)?),
        b'I' => Value::I32(read_u32(src)? as i32),
        b'i' => Value::U32(read_u32(src)?),
        b'l' => Value::I64(read_u64(src)? as i64),
        b'f' => Value::F32(f32::from_bits(read_u32(src)?)),
        b'd' => Value::F64(f64::from_bits(read_u64(src)?)),
        b'D' => {
            let scale = read_u8(src)?;
            let value = read_u32(src)?;
            Value::Decimal(Decimal { scale, value })
        }
        b'S' => Value::LongString(read_long_str(src)?),
        b'A' => Value::Array(read_array(src)?),
        b'T' => Value::Timestamp(read_u64(src)?),
        b'F' => Value::Table(read_table(src)?),
        b'V' => Value::Void,
        b'x' => Value::ByteArray(read_long_str(src)?),
        _ => return Err(Error::UnknownFieldType(tag)),
    };
    Ok(value)
}

/// Writes a short string
pub fn write_short_str(dst: &mut BytesMut, value: &str) -> Result<(), Error> {
    let len = value.len();
    if len > u8::MAX as usize {
        return Err(Error::ShortStringTooLong(len));
    }
    dst.put_u8(len as u8);
    dst.put_slice(value.as_bytes());
    Ok(())
}

/// Writes a long string
pub fn write_long_str(dst: &mut BytesMut, value: &[u8]) {
    dst.put_u32(value.len() as u32);
    dst.put_slice(value);
}

/// Writes the entries of a field table without the length prefix.
///
/// This is the layout of an AMQPLAIN security response.
pub fn write_table_entries(dst: &mut BytesMut, table: &FieldTable) -> Result<(), Error> {
    for (key, value) in table {
        write_short_str(dst, key)?;
        write_value(dst, value)?;
    }
    Ok(())
}

/// Writes a field table, including its length prefix
pub fn write_table(dst: &mut BytesMut, table: &FieldTable) -> Result<(), Error> {
    let mut body = BytesMut::new();
    write_table_entries(&mut body, table)?;
    dst.put_u32(body.len() as u32);
    dst.put(body);
    Ok(())
}

/// Writes a tagged field value
pub fn write_value(dst: &mut BytesMut, value: &Value) -> Result<(), Error> {
    dst.put_u8(value.tag());
    match value {
        Value::Bool(v) => dst.put_u8(*v as u8),
        Value::I8(v) => dst.put_i8(*v),
        Value::U8(v) => dst.put_u8(*v),
        Value::I16(v) => dst.put_i16(*v),
        Value::U16(v) => dst.put_u16(*v),
        Value::I32(v) => dst.put_i32(*v),
        Value::U32(v) => dst.put_u32(*v),
        Value::I64(v) => dst.put_i64(*v),
        Value::F32(v) => dst.put_f32(*v),
        Value::F64(v) => dst.put_f64(*v),
        Value::Decimal(d) => {
            dst.put_u8(d.scale);
            dst.put_u32(d.value);
        }
        Value::LongString(s) => write_long_str(dst, s),
        Value::Array(values) => {
            let mut body = BytesMut::new();
            for v in values {
                write_value(&mut body, v)?;
            }
            dst.put_u32(body.len() as u32);
            dst.put(body);
        }
        Value::Timestamp(t) => dst.put_u64(*t),
        Value::Table(t) => write_table(dst, t)?,
        Value::Void => {}
        Value::ByteArray(b) => write_long_str(dst, b),
    }
    Ok(())
}
