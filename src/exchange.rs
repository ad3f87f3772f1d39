// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Options
//!
//! Types describing how `setup_queue` asserts an exchange. The exchange type
//! defaults to a topic exchange unless the caller or the client configuration
//! overrides it.

use serde::{Deserialize, Serialize};

/// Represents the types of exchanges available in RabbitMQ.
///
/// Each exchange type has specific routing behavior:
/// - Direct: Routes messages to queues based on an exact match of routing keys
/// - Fanout: Broadcasts messages to all bound queues regardless of routing keys
/// - Topic: Routes messages based on wildcard pattern matching of routing keys
/// - Headers: Routes based on message header values instead of routing keys
/// - XMessageDelayed: Extension for delayed message delivery (plugin required)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Direct,
    Fanout,
    #[default]
    Topic,
    Headers,
    #[serde(rename = "x-delayed-message")]
    XMessageDelayed,
}

impl ExchangeKind {
    /// Name of the exchange type as declared on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::Direct => "direct",
            ExchangeKind::Fanout => "fanout",
            ExchangeKind::Topic => "topic",
            ExchangeKind::Headers => "headers",
            ExchangeKind::XMessageDelayed => "x-delayed-message",
        }
    }
}

/// Options used when asserting an exchange.
///
/// Builder-style: start from `ExchangeOptions::new(kind)` or `Default` (topic).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeOptions {
    pub(crate) kind: ExchangeKind,
    pub(crate) durable: bool,
    pub(crate) auto_delete: bool,
    pub(crate) internal: bool,
    /// Underlying routing type of an `x-delayed-message` exchange.
    pub(crate) delayed_type: Option<ExchangeKind>,
}

impl ExchangeOptions {
    /// Creates non-durable, non-internal options for an exchange of type `kind`.
    ///
    /// # Parameters
    /// * `kind` - The exchange type
    ///
    /// # Returns
    /// A new ExchangeOptions instance
    pub fn new(kind: ExchangeKind) -> Self {
        ExchangeOptions {
            kind,
            ..Default::default()
        }
    }

    /// The exchange type declared on the broker.
    pub fn kind(&self) -> &ExchangeKind {
        &self.kind
    }

    /// Routing type of a delayed exchange, `None` for regular exchanges.
    pub fn delayed_type(&self) -> Option<&ExchangeKind> {
        self.delayed_type.as_ref()
    }

    /// Whether the exchange survives a broker restart.
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// Whether the exchange is deleted once its last binding is removed.
    pub fn is_auto_delete(&self) -> bool {
        self.auto_delete
    }

    /// Whether the exchange only accepts messages from other exchanges.
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    /// Makes the exchange durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Sets the exchange to auto-delete when no longer used.
    pub fn auto_delete(mut self) -> Self {
        self.auto_delete = true;
        self
    }

    /// Makes the exchange internal, preventing direct publishing.
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    /// Creates a delayed exchange routing like `kind`.
    ///
    /// This requires the x-delayed-message plugin to be installed on the RabbitMQ server.
    ///
    /// # Parameters
    /// * `kind` - The routing type applied once the delay has elapsed
    ///
    /// # Returns
    /// Self for method chaining
    pub fn delayed(mut self, kind: ExchangeKind) -> Self {
        self.kind = ExchangeKind::XMessageDelayed;
        self.delayed_type = Some(kind);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_topic() {
        let opts = ExchangeOptions::default();
        assert_eq!(opts.kind(), &ExchangeKind::Topic);
        assert!(!opts.is_durable());
        assert!(opts.delayed_type().is_none());
    }

    #[test]
    fn delayed_keeps_routing_type() {
        let opts = ExchangeOptions::new(ExchangeKind::Direct)
            .durable()
            .delayed(ExchangeKind::Direct);
        assert_eq!(opts.kind().as_str(), "x-delayed-message");
        assert_eq!(opts.delayed_type(), Some(&ExchangeKind::Direct));
        assert!(opts.is_durable());
    }

    #[test]
    fn kind_deserializes_from_wire_name() {
        let kind: ExchangeKind = serde_json::from_str("\"fanout\"").unwrap();
        assert_eq!(kind, ExchangeKind::Fanout);
        let kind: ExchangeKind = serde_json::from_str("\"x-delayed-message\"").unwrap();
        assert_eq!(kind, ExchangeKind::XMessageDelayed);
    }
}
