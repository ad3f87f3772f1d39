// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Message Bus
//!
//! `BusError` is what callers of the client and the listener see. Errors raised
//! inside the steady-state consume loop never surface through it directly: they are
//! turned into events and the affected message is acked or nacked instead.
//!
//! `TransportError` is the error type of the transport seam and is converted into a
//! `BusError` variant carrying the operation context at the client boundary.

use thiserror::Error;

/// Errors returned by the bus client and listener.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The initial handshake with the broker failed. Not retried.
    #[error("failure to connect: {0}")]
    ConnectionError(String),

    /// The connection was opened but no channel could be created on it.
    #[error("failure to create a channel: {0}")]
    ChannelError(String),

    /// An established connection dropped. Only ever emitted as an event.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The client has no live connection (closed, or between reconnect attempts).
    #[error("client is not connected")]
    NotConnected,

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding a queue to an exchange
    #[error("failure to bind exchange `{0}` to queue `{1}`")]
    BindingExchangeToQueueError(String, String),

    /// Error subscribing to a queue
    #[error("failure to consume queue `{0}`")]
    ConsumerError(String),

    /// The message could not be represented as JSON
    #[error("failure to encode message: {0}")]
    EncodingError(String),

    /// The delivered payload is not valid JSON
    #[error("failure to parse payload: {0}")]
    DecodeError(String),

    /// The handler raised or signaled a failure
    #[error("handler failure: {0}")]
    HandlerError(String),

    /// Error publishing a message
    #[error("failure to publish: {0}")]
    PublishingError(String),

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a message
    #[error("failure to nack message")]
    NackMessageError,

    /// Error closing the connection
    #[error("failure to close connection: {0}")]
    CloseError(String),
}

impl BusError {
    /// True for the exchange/queue/binding assertion failures raised by `setup_queue`.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            BusError::DeclareExchangeError(_)
                | BusError::DeclareQueueError(_)
                | BusError::BindingExchangeToQueueError(_, _)
        )
    }
}

/// Error reported by a transport adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    /// Creates a transport error carrying `msg`.
    pub fn new(msg: impl Into<String>) -> Self {
        TransportError(msg.into())
    }
}

impl From<lapin::Error> for TransportError {
    fn from(err: lapin::Error) -> Self {
        TransportError(err.to_string())
    }
}
