use std::{fmt::Display, str::FromStr};

use fe2o3_amqp091_types::primitives::FieldTable;

/// Type of an exchange
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    /// `direct`
    Direct,

    /// `fanout`
    Fanout,

    /// `topic`
    Topic,

    /// `headers`
    Headers,

    /// A plugin provided type, eg. `x-delayed-message`
    Custom(String),
}

impl ExchangeKind {
    /// The name used in `exchange.declare`
    pub fn as_str(&self) -> &str {
        match self {
            ExchangeKind::Direct => "direct",
            ExchangeKind::Fanout => "fanout",
            ExchangeKind::Topic => "topic",
            ExchangeKind::Headers => "headers",
            ExchangeKind::Custom(kind) => kind,
        }
    }
}

impl Display for ExchangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "direct" => ExchangeKind::Direct,
            "fanout" => ExchangeKind::Fanout,
            "topic" => ExchangeKind::Topic,
            "headers" => ExchangeKind::Headers,
            other => ExchangeKind::Custom(other.to_string()),
        };
        Ok(kind)
    }
}

/// Options of `exchange.declare`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeOptions {
    /// Only check that the exchange exists
    pub passive: bool,

    /// Survive a broker restart
    pub durable: bool,

    /// Deleted once the last binding is removed
    pub auto_delete: bool,

    /// Cannot be published to directly
    pub internal: bool,

    /// Broker specific arguments, eg. `alternate-exchange`
    pub arguments: FieldTable,
}

/// An exchange declared on the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// Name of the exchange
    pub name: String,

    /// Type of the exchange
    pub kind: ExchangeKind,

    /// Survives a broker restart
    pub durable: bool,

    /// Deleted once the last binding is removed
    pub auto_delete: bool,

    /// Cannot be published to directly
    pub internal: bool,
}

#[cfg(test)]
mod tests {
    use super::ExchangeKind;

    #[test]
    fn test_kind_names() {
        for kind in [
            ExchangeKind::Direct,
            ExchangeKind::Fanout,
            ExchangeKind::Topic,
            ExchangeKind::Headers,
            ExchangeKind::Custom("x-delayed-message".into()),
        ] {
            assert_eq!(kind.as_str().parse::<ExchangeKind>().unwrap(), kind);
        }
        assert_eq!(ExchangeKind::Fanout.to_string(), "fanout");
    }
}
