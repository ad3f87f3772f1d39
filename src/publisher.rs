// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Publishing
//!
//! Encodes a message as JSON and builds the outgoing message handed to the
//! transport, propagating the current OpenTelemetry context in its headers.

use crate::{
    errors::BusError,
    otel,
    transport::{MessageProperties, OutgoingMessage},
};
use opentelemetry::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::error;
use uuid::Uuid;

/// Default content type for JSON messages
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Per-message publish settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Message id; a v4 UUID is generated when absent.
    pub message_id: Option<String>,
    /// Value of the AMQP `type` property.
    pub kind: Option<String>,
    /// Publish with delivery mode 2 so the broker stores the message on disk.
    pub persistent: bool,
    /// Ask the broker to return the message when no queue is bound for it.
    pub mandatory: bool,
    /// Extra string headers, sent alongside the trace context.
    pub headers: BTreeMap<String, String>,
}

impl PublishOptions {
    /// Creates options with a generated message id and no headers.
    pub fn new() -> Self {
        PublishOptions::default()
    }

    /// Sets the message id instead of generating one.
    ///
    /// # Parameters
    /// * `id` - Message id sent in the AMQP properties
    ///
    /// # Returns
    /// The updated options
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Sets the AMQP `type` property.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Marks the message persistent.
    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    /// Marks the message mandatory.
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Adds a string header.
    ///
    /// # Parameters
    /// * `key` - Header name
    /// * `value` - Header value
    ///
    /// # Returns
    /// The updated options
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Encodes `message` and assembles the outgoing message.
///
/// Fails with `EncodingError` when `message` cannot be represented as JSON, e.g. a
/// map with non-string keys.
pub(crate) fn outgoing<T>(
    ctx: &Context,
    exchange: &str,
    routing_key: &str,
    message: &T,
    opts: &PublishOptions,
) -> Result<OutgoingMessage, BusError>
where
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_vec(message).map_err(|err| {
        error!(error = err.to_string(), "error encoding message");
        BusError::EncodingError(err.to_string())
    })?;

    let message_id = opts
        .message_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut headers = opts.headers.clone();
    otel::inject(ctx, &mut headers);

    Ok(OutgoingMessage {
        exchange: exchange.to_owned(),
        routing_key: routing_key.to_owned(),
        payload,
        properties: MessageProperties {
            content_type: Some(JSON_CONTENT_TYPE.to_owned()),
            message_id: Some(message_id),
            kind: opts.kind.clone(),
            persistent: opts.persistent,
            headers,
        },
        mandatory: opts.mandatory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn builds_json_message() {
        let opts = PublishOptions::new()
            .kind("order.created")
            .persistent()
            .header("tenant", "acme");

        let ctx = Context::new();
        let message = json!({"id": 1});
        let msg = outgoing(&ctx, "events", "order.created", &message, &opts).unwrap();

        assert_eq!(msg.exchange, "events");
        assert_eq!(msg.routing_key, "order.created");
        assert_eq!(msg.payload, br#"{"id":1}"#.to_vec());
        assert_eq!(
            msg.properties.content_type.as_deref(),
            Some(JSON_CONTENT_TYPE)
        );
        assert_eq!(msg.properties.kind.as_deref(), Some("order.created"));
        assert!(msg.properties.persistent);
        assert_eq!(msg.properties.headers["tenant"], "acme");
        assert!(msg.properties.message_id.is_some());
    }

    #[test]
    fn keeps_caller_message_id() {
        let opts = PublishOptions::new().message_id("order-1");
        let msg = outgoing(&Context::new(), "events", "k", &json!(null), &opts).unwrap();
        assert_eq!(msg.properties.message_id.as_deref(), Some("order-1"));
    }

    #[test]
    fn non_string_map_keys_are_an_encoding_error() {
        let mut message = HashMap::new();
        message.insert((1, 2), "tuple keys are not representable");

        let opts = PublishOptions::new();
        let err = outgoing(&Context::new(), "events", "k", &message, &opts).unwrap_err();
        assert!(matches!(err, BusError::EncodingError(_)));
    }
}
