#![warn(missing_docs, missing_debug_implementations)]

//! Implements AMQP 0-9-1 data types as defined in the
//! [specification](https://www.rabbitmq.com/resources/specs/amqp0-9-1.pdf).
//!
//! Methods are not modelled as one type per method. Every method is a record in the
//! [`method`] catalog (class id, method id and an ordered field table) and a
//! [`method::Method`] is encoded and decoded generically against that record.

pub mod definitions;
pub mod method;
pub mod primitives;
pub mod properties;

mod error;
pub use error::Error;
