// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Delivery Processing
//!
//! Settles one delivery: decode the JSON payload, run the handler, then ack or
//! nack. Nothing in here propagates a decode or handler failure to the consume
//! loop; those become `ClientEvent::ConsumeError` and the message is settled.
//!
//! | outcome                      | settlement     | event kind       |
//! |------------------------------|----------------|------------------|
//! | payload is not JSON          | ack            | `InvalidContent` |
//! | handler succeeded            | ack            | none             |
//! | handler failed or panicked   | nack + requeue | `HandlerFailed`  |
//! | handler returned `DiscardMessage` | ack       | `Discarded`      |

use crate::{
    errors::BusError,
    events::{ClientEvent, ConsumeErrorKind, ConsumeFailure, EventEmitter},
    handler::{is_discard, BusMessage, ConsumerHandler},
    otel,
    transport::{RawDelivery, TransportChannel},
};
use futures_util::FutureExt;
use opentelemetry::{
    global::{BoxedSpan, BoxedTracer},
    trace::{Span, Status},
};
use serde_json::Value;
use std::{any::Any, borrow::Cow, panic::AssertUnwindSafe};
use tracing::{debug, error, warn};

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settlement {
    Acked,
    Requeued,
}

/// Consumes and settles a single delivery from `queue`.
///
/// Returns an error only when the ack or nack itself fails.
pub(crate) async fn consume(
    tracer: &BoxedTracer,
    queue: &str,
    delivery: RawDelivery,
    handler: &dyn ConsumerHandler,
    channel: &dyn TransportChannel,
    events: &EventEmitter<ClientEvent>,
) -> Result<Settlement, BusError> {
    let RawDelivery {
        data,
        fields,
        properties,
    } = delivery;
    let tag = fields.delivery_tag;

    let (ctx, mut span) = otel::new_span(&properties.headers, tracer, &fields.routing_key);

    debug!(
        queue = queue,
        routing_key = fields.routing_key.as_str(),
        delivery_tag = tag,
        "received"
    );

    let content = match serde_json::from_slice::<Value>(&data) {
        Ok(content) => content,
        Err(err) => {
            warn!(
                error = err.to_string(),
                queue = queue,
                "removing message from queue - reason: invalid content"
            );
            span.record_error(&err);
            span.set_status(Status::Error {
                description: Cow::from("invalid content"),
            });

            events.emit(&ClientEvent::ConsumeError(ConsumeFailure {
                kind: ConsumeErrorKind::InvalidContent,
                error: BusError::DecodeError(err.to_string()),
                queue: queue.to_owned(),
                content: None,
                fields,
            }));

            return ack(channel, tag, &mut span).await;
        }
    };

    let msg = BusMessage {
        queue: queue.to_owned(),
        content,
        fields,
        properties,
    };

    let outcome = AssertUnwindSafe(handler.exec(&ctx, &msg))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(panic_message(panic).into()));

    let err = match outcome {
        Ok(()) => {
            debug!("message successfully processed");
            let settled = ack(channel, tag, &mut span).await?;
            span.set_status(Status::Ok);
            return Ok(settled);
        }
        Err(err) => err,
    };

    span.record_error(&*err);
    span.set_status(Status::Error {
        description: Cow::from("handler failure"),
    });

    let discard = is_discard(&err);
    let BusMessage {
        content, fields, ..
    } = msg;
    events.emit(&ClientEvent::ConsumeError(ConsumeFailure {
        kind: if discard {
            ConsumeErrorKind::Discarded
        } else {
            ConsumeErrorKind::HandlerFailed
        },
        error: BusError::HandlerError(err.to_string()),
        queue: queue.to_owned(),
        content: Some(content),
        fields,
    }));

    if discard {
        warn!(error = err.to_string(), "handler discarded message");
        return ack(channel, tag, &mut span).await;
    }

    warn!(
        error = err.to_string(),
        "error whiling handling msg, requeuing for latter"
    );
    match channel.nack(tag, true).await {
        Ok(()) => Ok(Settlement::Requeued),
        Err(e) => {
            error!(error = e.to_string(), "error whiling nack msg");
            span.record_error(&e);
            span.set_status(Status::Error {
                description: Cow::from("error to nack msg"),
            });
            Err(BusError::NackMessageError)
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned());
    format!("handler panicked: {detail}")
}

async fn ack(
    channel: &dyn TransportChannel,
    tag: u64,
    span: &mut BoxedSpan,
) -> Result<Settlement, BusError> {
    match channel.ack(tag).await {
        Ok(()) => Ok(Settlement::Acked),
        Err(e) => {
            error!(error = e.to_string(), "error whiling ack msg");
            span.record_error(&e);
            span.set_status(Status::Error {
                description: Cow::from("error to ack msg"),
            });
            Err(BusError::AckMessageError)
        }
    }
}
