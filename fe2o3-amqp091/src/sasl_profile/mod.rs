//! Authentication mechanisms offered in `connection.start`

use bytes::{BufMut, Bytes, BytesMut};
use fe2o3_amqp091_types::primitives::{codec, FieldTable, Value};

/// SASL PLAIN
pub const PLAIN: &str = "PLAIN";

/// RabbitMQ's AMQPLAIN, a field table without the length prefix
pub const AMQPLAIN: &str = "AMQPLAIN";

/// A mechanism together with the credentials it carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaslProfile {
    /// SASL PLAIN: `\0username\0password`
    Plain {
        /// Username
        username: String,
        /// Password
        password: String,
    },

    /// AMQPLAIN: `LOGIN` and `PASSWORD` table entries
    AmqPlain {
        /// Username
        username: String,
        /// Password
        password: String,
    },
}

impl SaslProfile {
    /// Picks a mechanism from the space separated list offered by the broker. PLAIN is
    /// preferred over AMQPLAIN.
    pub fn select(
        mechanisms: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Option<Self> {
        let offered: Vec<&str> = mechanisms.split_whitespace().collect();
        let (username, password) = (username.into(), password.into());
        if offered.contains(&PLAIN) {
            Some(SaslProfile::Plain { username, password })
        } else if offered.contains(&AMQPLAIN) {
            Some(SaslProfile::AmqPlain { username, password })
        } else {
            None
        }
    }

    /// Name of the mechanism
    pub fn mechanism(&self) -> &'static str {
        match self {
            SaslProfile::Plain { .. } => PLAIN,
            SaslProfile::AmqPlain { .. } => AMQPLAIN,
        }
    }

    /// The security response sent in `connection.start-ok`
    pub fn response(&self) -> Result<Bytes, fe2o3_amqp091_types::Error> {
        match self {
            SaslProfile::Plain { username, password } => {
                let username = username.as_bytes();
                let password = password.as_bytes();
                let mut buf = BytesMut::with_capacity(username.len() + password.len() + 2);
                buf.put_u8(0);
                buf.put_slice(username);
                buf.put_u8(0);
                buf.put_slice(password);
                Ok(buf.freeze())
            }
            SaslProfile::AmqPlain { username, password } => {
                let mut table = FieldTable::new();
                table.insert("LOGIN".into(), Value::from(username.as_str()));
                table.insert("PASSWORD".into(), Value::from(password.as_str()));
                let mut buf = BytesMut::new();
                codec::write_table_entries(&mut buf, &table)?;
                Ok(buf.freeze())
            }
        }
    }
}
