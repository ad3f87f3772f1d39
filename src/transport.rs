// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Transport Seam
//!
//! The capability surface the bus client needs from an AMQP transport: connect,
//! open a channel, assert and bind topology, subscribe, settle deliveries, publish,
//! close, and connection-level event notification. The production implementation
//! lives in [`crate::channel`].

use crate::{errors::TransportError, exchange::ExchangeOptions, queue::QueueOptions};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::{collections::BTreeMap, sync::Arc};

#[cfg(test)]
use mockall::automock;

/// Stream of deliveries produced by a consumer subscription.
pub type DeliveryStream = BoxStream<'static, Result<RawDelivery, TransportError>>;

/// Callback invoked by a connection for every connection-level event.
pub type ConnectionEventHandler = Box<dyn Fn(ConnectionEvent) + Send + Sync>;

/// Settings used when opening a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Heartbeat interval in seconds; 0 disables heartbeats.
    pub heartbeat: u16,
    pub connection_name: Option<String>,
}

/// Connection-level notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection failed. An error notification without a payload is not a
    /// real failure and must not trigger a reconnect.
    Error(Option<TransportError>),
    /// The connection was closed, deliberately or by the broker.
    Closed,
}

/// Delivery metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryFields {
    pub consumer_tag: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
}

/// Message properties carried alongside the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProperties {
    pub content_type: Option<String>,
    pub message_id: Option<String>,
    pub kind: Option<String>,
    pub persistent: bool,
    /// String-valued headers; other header types are not carried.
    pub headers: BTreeMap<String, String>,
}

/// One message as delivered by the transport, before decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDelivery {
    pub data: Vec<u8>,
    pub fields: DeliveryFields,
    pub properties: MessageProperties,
}

/// One encoded message handed to the transport for publishing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub properties: MessageProperties,
    pub mandatory: bool,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a connection, suspending until the handshake completes.
    async fn connect(
        &self,
        url: &str,
        options: &ConnectOptions,
    ) -> Result<Arc<dyn TransportConnection>, TransportError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TransportConnection: Send + Sync {
    /// Opens a channel, in publisher-confirm mode when `confirm` is set.
    async fn create_channel(&self, confirm: bool)
        -> Result<Arc<dyn TransportChannel>, TransportError>;

    /// Registers the observer for connection-level errors and closes.
    fn on_event(&self, handler: ConnectionEventHandler);

    /// Closes the connection; the observer then sees `ConnectionEvent::Closed`.
    async fn close(&self) -> Result<(), TransportError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TransportChannel: Send + Sync {
    /// Declares `name`, or checks it matches when it already exists.
    async fn assert_exchange(
        &self,
        name: &str,
        options: &ExchangeOptions,
    ) -> Result<(), TransportError>;

    async fn assert_queue(&self, name: &str, options: &QueueOptions)
        -> Result<(), TransportError>;

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), TransportError>;

    /// Subscribes to `queue` with manual acknowledgement.
    async fn consume(&self, queue: &str, consumer_tag: &str)
        -> Result<DeliveryStream, TransportError>;

    /// Acknowledges a single delivery.
    async fn ack(&self, delivery_tag: u64) -> Result<(), TransportError>;

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), TransportError>;

    /// Returns `true` when the message was accepted, `false` when the caller
    /// should back off (write buffer full or broker nack on a confirm channel).
    async fn publish(&self, message: OutgoingMessage) -> Result<bool, TransportError>;
}
