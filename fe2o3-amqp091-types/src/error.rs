//! Errors encountered when encoding or decoding AMQP 0-9-1 data types

use crate::method::{ArgKind, MethodId};

/// Errors associated with encoding/decoding field values and method arguments
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Fewer bytes are available than the encoded value requires
    #[error("Unexpected end of input")]
    Truncated,

    /// The (class id, method id) pair is not found in the method catalog
    #[error("Unknown method {0}")]
    UnknownMethod(MethodId),

    /// Field table value tag is not recognized
    #[error("Unknown field value type {0:#04x}")]
    UnknownFieldType(u8),

    /// A string field is not valid UTF-8
    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    /// Short strings are limited to 255 octets
    #[error("Short string exceeds 255 octets ({0})")]
    ShortStringTooLong(usize),

    /// The encoded frame would exceed the negotiated frame-max
    #[error("Frame of {size} octets exceeds frame-max {frame_max}")]
    FrameTooLarge {
        /// Size of the frame including header and frame end
        size: usize,
        /// Negotiated frame-max
        frame_max: usize,
    },

    /// The number of arguments does not match the method's field table
    #[error("{method} expects {expected} arguments, found {found}")]
    ArityMismatch {
        /// Method being constructed
        method: &'static str,
        /// Number of fields in the catalog
        expected: usize,
        /// Number of arguments supplied
        found: usize,
    },

    /// An argument does not have the kind required by the field table
    #[error("{method}.{field} expects {expected:?}")]
    ArgumentMismatch {
        /// Method being constructed
        method: &'static str,
        /// Name of the field
        field: &'static str,
        /// Kind declared in the catalog
        expected: ArgKind,
    },

    /// The requested field is not part of the method
    #[error("{method} has no field named {field}")]
    NoSuchField {
        /// Method being inspected
        method: &'static str,
        /// Field requested
        field: &'static str,
    },
}
