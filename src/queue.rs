// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Options
//!
//! Options passed through to queue assertion, plus `SetupOptions`, the per-call
//! overrides accepted by `setup_queue` and `listen`.

use crate::exchange::ExchangeOptions;
use serde::{Deserialize, Serialize};

/// Constant for the queue argument used to specify message TTL
pub const AMQP_HEADERS_MESSAGE_TTL: &str = "x-message-ttl";
/// Constant for the queue argument used to specify maximum queue length
pub const AMQP_HEADERS_MAX_LENGTH: &str = "x-max-length";
/// Constant for the queue argument used to specify maximum queue size in bytes
pub const AMQP_HEADERS_MAX_LENGTH_BYTES: &str = "x-max-length-bytes";

/// Options used when asserting a queue.
///
/// This struct implements the builder pattern and is also part of the
/// deserializable client configuration (`queueOptions`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct QueueOptions {
    /// Whether the queue survives a broker restart
    pub durable: bool,
    /// Whether the queue is restricted to the declaring connection
    pub exclusive: bool,
    /// Whether the queue is deleted once its last consumer unsubscribes
    #[serde(alias = "autoDelete")]
    pub auto_delete: bool,
    /// Message time-to-live in milliseconds
    #[serde(alias = "messageTtl")]
    pub ttl: Option<i32>,
    /// Maximum number of ready messages
    #[serde(alias = "maxLength")]
    pub max_length: Option<i32>,
    /// Maximum total size of ready message bodies
    #[serde(alias = "maxLengthBytes")]
    pub max_length_bytes: Option<i32>,
}

impl QueueOptions {
    /// Creates options for a non-durable queue without limits.
    pub fn new() -> Self {
        QueueOptions::default()
    }

    /// Makes the queue durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Restricts the queue to the declaring connection.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Deletes the queue once its last consumer unsubscribes.
    pub fn auto_delete(mut self) -> Self {
        self.auto_delete = true;
        self
    }

    /// Sets the message time-to-live.
    ///
    /// # Parameters
    /// * `ttl` - Time-to-live in milliseconds
    ///
    /// # Returns
    /// Self for method chaining
    pub fn ttl(mut self, ttl: i32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the maximum number of ready messages.
    ///
    /// # Parameters
    /// * `max` - Maximum queue length
    ///
    /// # Returns
    /// Self for method chaining
    pub fn max_length(mut self, max: i32) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Sets the maximum total size of ready message bodies.
    ///
    /// # Parameters
    /// * `max_bytes` - Maximum queue size in bytes
    ///
    /// # Returns
    /// Self for method chaining
    pub fn max_length_bytes(mut self, max_bytes: i32) -> Self {
        self.max_length_bytes = Some(max_bytes);
        self
    }

    /// Queue arguments derived from the options, keyed by their `x-` names.
    pub fn arguments(&self) -> Vec<(&'static str, i32)> {
        [
            (AMQP_HEADERS_MESSAGE_TTL, self.ttl),
            (AMQP_HEADERS_MAX_LENGTH, self.max_length),
            (AMQP_HEADERS_MAX_LENGTH_BYTES, self.max_length_bytes),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }
}

/// Per-call overrides for `setup_queue` and `listen`.
///
/// Fields left as `None` fall back to the client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupOptions {
    pub exchange: Option<ExchangeOptions>,
    pub queue: Option<QueueOptions>,
}

impl SetupOptions {
    /// Creates options that use the client configuration for everything.
    pub fn new() -> Self {
        SetupOptions::default()
    }

    /// Overrides the exchange options.
    pub fn exchange(mut self, exchange: ExchangeOptions) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// Overrides the queue options.
    pub fn queue(mut self, queue: QueueOptions) -> Self {
        self.queue = Some(queue);
        self
    }
}
