// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Message Bus
//!
//! A JSON message bus over AMQP 0-9-1.
//!
//! - [`BusClient`] owns one connection and its channel. It publishes JSON
//!   messages, consumes queues with ack/nack semantics, reconnects after
//!   connection errors and shuts down within a bounded grace period when the
//!   connection closes.
//! - [`BusListener`] collects handlers keyed by queue and routing key and
//!   activates all of them with a single `listen` call.
//!
//! The broker is reached through the [`transport`] traits; [`channel`] provides
//! the lapin implementation used by default.

mod consumer;
mod otel;
mod topology;

pub mod channel;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod exchange;
pub mod handler;
pub mod listener;
pub mod publisher;
pub mod queue;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use client::{BusClient, ConnectionState};
pub use config::{BrokerAddress, ClientConfig};
pub use errors::{BusError, TransportError};
pub use events::{ClientEvent, ConsumeErrorKind, ConsumeFailure, ListenerEvent, SubscriptionId};
pub use exchange::{ExchangeKind, ExchangeOptions};
pub use handler::{
    callback_handler, handler_fn, BusMessage, Completion, ConsumerHandler, DiscardMessage,
    HandlerError, HandlerResult,
};
pub use listener::BusListener;
pub use publisher::PublishOptions;
pub use queue::{QueueOptions, SetupOptions};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
