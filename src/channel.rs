// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Transport over lapin
//!
//! Production implementation of the transport seam. A `LapinTransport` opens
//! connections, each `LapinConnection` opens channels and relays connection-level
//! failures, and a `LapinChannel` performs topology, consume, settle and publish
//! operations.

use crate::{
    errors::TransportError,
    exchange::{ExchangeKind, ExchangeOptions},
    queue::QueueOptions,
    transport::{
        ConnectOptions, ConnectionEvent, ConnectionEventHandler, DeliveryFields, DeliveryStream,
        MessageProperties, OutgoingMessage, RawDelivery, Transport, TransportChannel,
        TransportConnection,
    },
};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    message::Delivery,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    protocol::{AMQPErrorKind, AMQPHardError},
    types::{AMQPValue, FieldTable, LongInt, LongString, ShortString},
    uri::AMQPUri,
    BasicProperties, Channel, Connection, ConnectionProperties, ConnectionState,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error};

/// Constant for the header field used to specify the delayed exchange type
pub const AMQP_HEADERS_DELAYED_EXCHANGE_TYPE: &str = "x-delayed-type";

const PERSISTENT_DELIVERY_MODE: u8 = 2;
const REPLY_SUCCESS: u16 = 200;

/// Opens lapin connections.
#[derive(Debug, Clone, Default)]
pub struct LapinTransport;

impl LapinTransport {
    /// Creates the transport, ready to be passed to `BusClient::connect_with`.
    pub fn new() -> Arc<LapinTransport> {
        Arc::new(LapinTransport)
    }
}

#[async_trait]
impl Transport for LapinTransport {
    async fn connect(
        &self,
        url: &str,
        options: &ConnectOptions,
    ) -> Result<Arc<dyn TransportConnection>, TransportError> {
        let mut uri: AMQPUri = url.parse().map_err(|err: String| {
            error!(error = %err, "invalid amqp uri");
            TransportError::new(err)
        })?;
        uri.query.heartbeat = Some(options.heartbeat);

        let mut props = ConnectionProperties::default();
        if let Some(name) = &options.connection_name {
            props = props.with_connection_name(LongString::from(name.clone()));
        }

        debug!("creating amqp connection...");
        let connection = Connection::connect_uri(uri, props).await.map_err(|err| {
            error!(error = err.to_string(), "failure to connect");
            TransportError::from(err)
        })?;
        debug!("amqp connected");

        Ok(Arc::new(LapinConnection { connection }))
    }
}

/// An open lapin connection.
pub struct LapinConnection {
    connection: Connection,
}

#[async_trait]
impl TransportConnection for LapinConnection {
    async fn create_channel(
        &self,
        confirm: bool,
    ) -> Result<Arc<dyn TransportChannel>, TransportError> {
        debug!("creating amqp channel...");
        let channel = self.connection.create_channel().await.map_err(|err| {
            error!(error = err.to_string(), "error to create the channel");
            TransportError::from(err)
        })?;

        if confirm {
            channel
                .confirm_select(ConfirmSelectOptions::default())
                .await
                .map_err(|err| {
                    error!(error = err.to_string(), "error enabling publisher confirms");
                    TransportError::from(err)
                })?;
        }
        debug!("channel created");

        Ok(Arc::new(LapinChannel { channel }))
    }

    fn on_event(&self, handler: ConnectionEventHandler) {
        self.connection.on_error(move |err| handler(classify(err)));
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connection
            .close(REPLY_SUCCESS, "closing")
            .await
            .map_err(TransportError::from)
    }
}

/// Maps a lapin connection error onto a connection event. A broker-forced close or
/// an already-closed connection is a close, everything else is a failure.
pub(crate) fn classify(err: lapin::Error) -> ConnectionEvent {
    match &err {
        lapin::Error::ProtocolError(amqp)
            if matches!(
                amqp.kind(),
                AMQPErrorKind::Hard(AMQPHardError::CONNECTIONFORCED)
            ) =>
        {
            ConnectionEvent::Closed
        }
        lapin::Error::InvalidConnectionState(ConnectionState::Closed) => ConnectionEvent::Closed,
        _ => ConnectionEvent::Error(Some(TransportError::from(err))),
    }
}

/// A lapin channel, optionally in publisher-confirm mode.
pub struct LapinChannel {
    channel: Channel,
}

#[async_trait]
impl TransportChannel for LapinChannel {
    async fn assert_exchange(
        &self,
        name: &str,
        options: &ExchangeOptions,
    ) -> Result<(), TransportError> {
        let mut params = BTreeMap::new();
        if let Some(kind) = options.delayed_type() {
            params.insert(
                ShortString::from(AMQP_HEADERS_DELAYED_EXCHANGE_TYPE),
                AMQPValue::LongString(LongString::from(kind.as_str())),
            );
        }

        self.channel
            .exchange_declare(
                name,
                to_lapin_kind(options.kind()),
                ExchangeDeclareOptions {
                    passive: false,
                    durable: options.is_durable(),
                    auto_delete: options.is_auto_delete(),
                    internal: options.is_internal(),
                    nowait: false,
                },
                FieldTable::from(params),
            )
            .await
            .map_err(TransportError::from)
    }

    async fn assert_queue(
        &self,
        name: &str,
        options: &QueueOptions,
    ) -> Result<(), TransportError> {
        let args: BTreeMap<ShortString, AMQPValue> = options
            .arguments()
            .into_iter()
            .map(|(key, value)| {
                (
                    ShortString::from(key),
                    AMQPValue::LongInt(LongInt::from(value)),
                )
            })
            .collect();

        self.channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    passive: false,
                    durable: options.durable,
                    exclusive: options.exclusive,
                    auto_delete: options.auto_delete,
                    nowait: false,
                },
                FieldTable::from(args),
            )
            .await
            .map(|_| ())
            .map_err(TransportError::from)
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), TransportError> {
        self.channel
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions { nowait: false },
                FieldTable::default(),
            )
            .await
            .map_err(TransportError::from)
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream, TransportError> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions {
                    no_local: false,
                    no_ack: false,
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await?;

        let tag = consumer_tag.to_owned();
        Ok(consumer
            .map(move |result| {
                result
                    .map(|delivery| to_raw_delivery(&tag, delivery))
                    .map_err(TransportError::from)
            })
            .boxed())
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), TransportError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions { multiple: false })
            .await
            .map_err(TransportError::from)
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), TransportError> {
        self.channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    multiple: false,
                    requeue,
                },
            )
            .await
            .map_err(TransportError::from)
    }

    async fn publish(&self, message: OutgoingMessage) -> Result<bool, TransportError> {
        let confirm = self
            .channel
            .basic_publish(
                &message.exchange,
                &message.routing_key,
                BasicPublishOptions {
                    mandatory: message.mandatory,
                    immediate: false,
                },
                &message.payload,
                to_basic_properties(&message.properties),
            )
            .await?;

        // Resolves immediately with `NotRequested` outside confirm mode.
        let confirmation = confirm.await?;
        Ok(!confirmation.is_nack())
    }
}

fn to_lapin_kind(kind: &ExchangeKind) -> lapin::ExchangeKind {
    match kind {
        ExchangeKind::Direct => lapin::ExchangeKind::Direct,
        ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
        ExchangeKind::Headers => lapin::ExchangeKind::Headers,
        ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        ExchangeKind::XMessageDelayed => lapin::ExchangeKind::Custom(kind.as_str().to_owned()),
    }
}

fn to_basic_properties(props: &MessageProperties) -> BasicProperties {
    let headers: BTreeMap<ShortString, AMQPValue> = props
        .headers
        .iter()
        .map(|(key, value)| {
            (
                ShortString::from(key.clone()),
                AMQPValue::LongString(LongString::from(value.clone())),
            )
        })
        .collect();

    let mut basic = BasicProperties::default().with_headers(FieldTable::from(headers));
    if let Some(content_type) = &props.content_type {
        basic = basic.with_content_type(ShortString::from(content_type.clone()));
    }
    if let Some(id) = &props.message_id {
        basic = basic.with_message_id(ShortString::from(id.clone()));
    }
    if let Some(kind) = &props.kind {
        basic = basic.with_type(ShortString::from(kind.clone()));
    }
    if props.persistent {
        basic = basic.with_delivery_mode(PERSISTENT_DELIVERY_MODE);
    }
    basic
}

fn to_raw_delivery(consumer_tag: &str, delivery: Delivery) -> RawDelivery {
    let props = &delivery.properties;

    RawDelivery {
        fields: DeliveryFields {
            consumer_tag: consumer_tag.to_owned(),
            delivery_tag: delivery.delivery_tag,
            redelivered: delivery.redelivered,
            exchange: delivery.exchange.to_string(),
            routing_key: delivery.routing_key.to_string(),
        },
        properties: MessageProperties {
            content_type: props.content_type().as_ref().map(|v| v.to_string()),
            message_id: props.message_id().as_ref().map(|v| v.to_string()),
            kind: props.kind().as_ref().map(|v| v.to_string()),
            persistent: *props.delivery_mode() == Some(PERSISTENT_DELIVERY_MODE),
            headers: props
                .headers()
                .as_ref()
                .map(string_headers)
                .unwrap_or_default(),
        },
        data: delivery.data,
    }
}

fn string_headers(table: &FieldTable) -> BTreeMap<String, String> {
    table
        .inner()
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                AMQPValue::LongString(v) => String::from_utf8_lossy(v.as_bytes()).into_owned(),
                AMQPValue::ShortString(v) => v.as_str().to_owned(),
                _ => return None,
            };
            Some((key.as_str().to_owned(), value))
        })
        .collect()
}
