//! The protocol method catalog
//!
//! Every AMQP 0-9-1 method is described by a [`MethodSpec`] record in [`CATALOG`]:
//! its class id, method id, an ordered list of fields and the methods the peer
//! answers it with. A [`Method`] pairs a record with its argument values and is
//! encoded/decoded by walking the field list.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    primitives::{codec, FieldTable},
    Error,
};

mod catalog;
pub use catalog::*;

/// Identifies a method by `(class id, method id)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodId {
    /// Class id
    pub class_id: u16,

    /// Method id within the class
    pub method_id: u16,
}

impl MethodId {
    /// Creates a new method id
    pub const fn new(class_id: u16, method_id: u16) -> Self {
        Self {
            class_id,
            method_id,
        }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match MethodSpec::find(*self) {
            Some(spec) => write!(f, "{}", spec.name),
            None => write!(f, "({}, {})", self.class_id, self.method_id),
        }
    }
}

/// Wire encoding of a method field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// 8-bit unsigned integer
    Octet,
    /// 16-bit unsigned integer
    Short,
    /// 32-bit unsigned integer
    Long,
    /// 64-bit unsigned integer
    LongLong,
    /// Single bit; consecutive bits share an octet
    Bit,
    /// Up to 255 octets of UTF-8
    ShortStr,
    /// Up to 2^32 - 1 octets
    LongStr,
    /// 64-bit POSIX time
    Timestamp,
    /// Field table
    Table,
}

/// A named field of a method
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Field name as in the protocol definition
    pub name: &'static str,

    /// Wire encoding
    pub kind: ArgKind,
}

/// Shorthand for building catalog entries
pub(crate) const fn field(name: &'static str, kind: ArgKind) -> FieldSpec {
    FieldSpec { name, kind }
}

/// Declarative description of a method
#[derive(Debug)]
pub struct MethodSpec {
    /// Class and method id
    pub id: MethodId,

    /// Dotted name, eg. `queue.declare`
    pub name: &'static str,

    /// Ordered field list
    pub fields: &'static [FieldSpec],

    /// Methods that answer this method when it is sent synchronously. Empty for
    /// asynchronous methods and for replies.
    pub replies: &'static [MethodId],
}

impl MethodSpec {
    /// Looks up the catalog entry for a method id
    pub fn find(id: MethodId) -> Option<&'static MethodSpec> {
        CATALOG.iter().find(|spec| spec.id == id)
    }
}

/// A method argument value
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// [`ArgKind::Octet`]
    Octet(u8),
    /// [`ArgKind::Short`]
    Short(u16),
    /// [`ArgKind::Long`]
    Long(u32),
    /// [`ArgKind::LongLong`]
    LongLong(u64),
    /// [`ArgKind::Bit`]
    Bit(bool),
    /// [`ArgKind::ShortStr`]
    ShortStr(String),
    /// [`ArgKind::LongStr`]
    LongStr(Bytes),
    /// [`ArgKind::Timestamp`]
    Timestamp(u64),
    /// [`ArgKind::Table`]
    Table(FieldTable),
}

impl Arg {
    /// Kind of the argument
    pub fn kind(&self) -> ArgKind {
        match self {
            Arg::Octet(_) => ArgKind::Octet,
            Arg::Short(_) => ArgKind::Short,
            Arg::Long(_) => ArgKind::Long,
            Arg::LongLong(_) => ArgKind::LongLong,
            Arg::Bit(_) => ArgKind::Bit,
            Arg::ShortStr(_) => ArgKind::ShortStr,
            Arg::LongStr(_) => ArgKind::LongStr,
            Arg::Timestamp(_) => ArgKind::Timestamp,
            Arg::Table(_) => ArgKind::Table,
        }
    }

    /// Shorthand for a short string argument
    pub fn short_str(value: impl Into<String>) -> Self {
        Arg::ShortStr(value.into())
    }

    /// Shorthand for a long string argument
    pub fn long_str(value: impl Into<Bytes>) -> Self {
        Arg::LongStr(value.into())
    }
}

/// A method together with its arguments
#[derive(Clone, PartialEq)]
pub struct Method {
    spec: &'static MethodSpec,
    args: Vec<Arg>,
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.spec.name);
        for (field, arg) in self.spec.fields.iter().zip(self.args.iter()) {
            s.field(field.name, arg);
        }
        s.finish()
    }
}

impl PartialEq for MethodSpec {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Method {
    /// Creates a method after checking the arguments against the catalog.
    ///
    /// The arguments must be given in field order and must match each field's
    /// kind. Short strings longer than 255 octets are rejected here so that a
    /// constructed method can always be written to the wire.
    pub fn new(id: MethodId, args: Vec<Arg>) -> Result<Self, Error> {
        let spec = MethodSpec::find(id).ok_or(Error::UnknownMethod(id))?;
        if spec.fields.len() != args.len() {
            return Err(Error::ArityMismatch {
                method: spec.name,
                expected: spec.fields.len(),
                found: args.len(),
            });
        }
        for (field, arg) in spec.fields.iter().zip(args.iter()) {
            if field.kind != arg.kind() {
                return Err(Error::ArgumentMismatch {
                    method: spec.name,
                    field: field.name,
                    expected: field.kind,
                });
            }
            if let Arg::ShortStr(s) = arg {
                if s.len() > u8::MAX as usize {
                    return Err(Error::ShortStringTooLong(s.len()));
                }
            }
        }
        Ok(Self { spec, args })
    }

    /// The method id
    pub fn id(&self) -> MethodId {
        self.spec.id
    }

    /// The catalog entry of the method
    pub fn spec(&self) -> &'static MethodSpec {
        self.spec
    }

    /// Dotted name of the method
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    /// All arguments in field order
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Consumes the method and returns the arguments in field order
    pub fn into_args(self) -> Vec<Arg> {
        self.args
    }

    /// Looks up an argument by field name
    pub fn arg(&self, name: &'static str) -> Result<&Arg, Error> {
        self.spec
            .fields
            .iter()
            .position(|f| f.name == name)
            .and_then(|idx| self.args.get(idx))
            .ok_or(Error::NoSuchField {
                method: self.spec.name,
                field: name,
            })
    }

    fn mismatch(&self, name: &'static str, expected: ArgKind) -> Error {
        Error::ArgumentMismatch {
            method: self.spec.name,
            field: name,
            expected,
        }
    }

    /// Gets an octet field
    pub fn octet(&self, name: &'static str) -> Result<u8, Error> {
        match self.arg(name)? {
            Arg::Octet(v) => Ok(*v),
            _ => Err(self.mismatch(name, ArgKind::Octet)),
        }
    }

    /// Gets a short field
    pub fn short(&self, name: &'static str) -> Result<u16, Error> {
        match self.arg(name)? {
            Arg::Short(v) => Ok(*v),
            _ => Err(self.mismatch(name, ArgKind::Short)),
        }
    }

    /// Gets a long field
    pub fn long(&self, name: &'static str) -> Result<u32, Error> {
        match self.arg(name)? {
            Arg::Long(v) => Ok(*v),
            _ => Err(self.mismatch(name, ArgKind::Long)),
        }
    }

    /// Gets a long-long field
    pub fn long_long(&self, name: &'static str) -> Result<u64, Error> {
        match self.arg(name)? {
            Arg::LongLong(v) => Ok(*v),
            _ => Err(self.mismatch(name, ArgKind::LongLong)),
        }
    }

    /// Gets a bit field
    pub fn bit(&self, name: &'static str) -> Result<bool, Error> {
        match self.arg(name)? {
            Arg::Bit(v) => Ok(*v),
            _ => Err(self.mismatch(name, ArgKind::Bit)),
        }
    }

    /// Gets a short string field
    pub fn short_str(&self, name: &'static str) -> Result<&str, Error> {
        match self.arg(name)? {
            Arg::ShortStr(v) => Ok(v),
            _ => Err(self.mismatch(name, ArgKind::ShortStr)),
        }
    }

    /// Gets a long string field
    pub fn long_str(&self, name: &'static str) -> Result<&Bytes, Error> {
        match self.arg(name)? {
            Arg::LongStr(v) => Ok(v),
            _ => Err(self.mismatch(name, ArgKind::LongStr)),
        }
    }

    /// Gets a table field
    pub fn table(&self, name: &'static str) -> Result<&FieldTable, Error> {
        match self.arg(name)? {
            Arg::Table(v) => Ok(v),
            _ => Err(self.mismatch(name, ArgKind::Table)),
        }
    }

    /// Writes `class id || method id || arguments`
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.spec.id.class_id);
        dst.put_u16(self.spec.id.method_id);

        let mut bits = BitWriter::default();
        for arg in &self.args {
            if let Arg::Bit(b) = arg {
                bits.push(dst, *b);
                continue;
            }
            bits.flush(dst);
            match arg {
                Arg::Octet(v) => dst.put_u8(*v),
                Arg::Short(v) => dst.put_u16(*v),
                Arg::Long(v) => dst.put_u32(*v),
                Arg::LongLong(v) | Arg::Timestamp(v) => dst.put_u64(*v),
                Arg::ShortStr(s) => codec::write_short_str(dst, s)?,
                Arg::LongStr(b) => codec::write_long_str(dst, b),
                Arg::Table(t) => codec::write_table(dst, t)?,
                Arg::Bit(_) => unreachable!("bits are handled above"),
            }
        }
        bits.flush(dst);
        Ok(())
    }

    /// Reads `class id || method id || arguments`. The whole of `src` is expected
    /// to belong to the method.
    pub fn decode(src: &mut impl Buf) -> Result<Self, Error> {
        let class_id = codec::read_u16(src)?;
        let method_id = codec::read_u16(src)?;
        let id = MethodId::new(class_id, method_id);
        let spec = MethodSpec::find(id).ok_or(Error::UnknownMethod(id))?;

        let mut args = Vec::with_capacity(spec.fields.len());
        let mut bits = BitReader::default();
        for field in spec.fields {
            if field.kind == ArgKind::Bit {
                args.push(Arg::Bit(bits.next(src)?));
                continue;
            }
            bits.reset();
            let arg = match field.kind {
                ArgKind::Octet => Arg::Octet(codec::read_u8(src)?),
                ArgKind::Short => Arg::Short(codec::read_u16(src)?),
                ArgKind::Long => Arg::Long(codec::read_u32(src)?),
                ArgKind::LongLong => Arg::LongLong(codec::read_u64(src)?),
                ArgKind::Timestamp => Arg::Timestamp(codec::read_u64(src)?),
                ArgKind::ShortStr => Arg::ShortStr(codec::read_short_str(src)?),
                ArgKind::LongStr => Arg::LongStr(codec::read_long_str(src)?),
                ArgKind::Table => Arg::Table(codec::read_table(src)?),
                ArgKind::Bit => unreachable!("bits are handled above"),
            };
            args.push(arg);
        }
        Ok(Self { spec, args })
    }
}

/// Packs consecutive bit fields into octets, least significant bit first
#[derive(Debug, Default)]
struct BitWriter {
    acc: u8,
    count: u8,
}

impl BitWriter {
    fn push(&mut self, dst: &mut BytesMut, bit: bool) {
        if self.count == 8 {
            self.flush(dst);
        }
        if bit {
            self.acc |= 1 << self.count;
        }
        self.count += 1;
    }

    fn flush(&mut self, dst: &mut BytesMut) {
        if self.count > 0 {
            dst.put_u8(self.acc);
            self.acc = 0;
            self.count = 0;
        }
    }
}

#[derive(Debug, Default)]
struct BitReader {
    octet: u8,
    // Number of bits already taken from `octet`; 0 means no octet is loaded
    taken: u8,
}

impl BitReader {
    fn next(&mut self, src: &mut impl Buf) -> Result<bool, Error> {
        if self.taken == 0 || self.taken == 8 {
            self.octet = codec::read_u8(src)?;
            self.taken = 0;
        }
        let bit = (self.octet >> self.taken) & 1 == 1;
        self.taken += 1;
        Ok(bit)
    }

    fn reset(&mut self) {
        self.taken = 0;
    }
}
