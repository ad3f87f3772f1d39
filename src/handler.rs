// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Handlers
//!
//! Every handler is stored and invoked as an `Arc<dyn ConsumerHandler>`. Closures
//! returning a future and callback-style closures that report through a
//! [`Completion`] are both adapted into that shape at registration, so the
//! dispatch path only ever awaits `exec`.

use crate::transport::{DeliveryFields, MessageProperties};
use async_trait::async_trait;
use opentelemetry::Context;
use serde_json::Value;
use std::{error::Error, fmt, future::Future, sync::Arc};
use tokio::sync::oneshot;

/// Error returned by a handler; its `Display` text ends up in `HandlerError` events.
pub type HandlerError = Box<dyn Error + Send + Sync>;
pub type HandlerResult = Result<(), HandlerError>;

/// A decoded delivery as seen by handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    /// Queue the message was consumed from
    pub queue: String,
    /// Decoded JSON payload
    pub content: Value,
    /// Delivery tag, exchange, routing key and redelivery flag
    pub fields: DeliveryFields,
    pub properties: MessageProperties,
}

impl BusMessage {
    /// Routing key the message was published with.
    pub fn routing_key(&self) -> &str {
        &self.fields.routing_key
    }
}

/// Processes one decoded message.
///
/// `Ok` acks the message; `Err` requeues it, unless the error is a
/// [`DiscardMessage`], in which case the message is acked.
#[async_trait]
pub trait ConsumerHandler: Send + Sync {
    /// Handles `msg`.
    ///
    /// # Parameters
    /// * `ctx` - Trace context extracted from the message headers
    /// * `msg` - The decoded message
    ///
    /// # Returns
    /// `Ok(())` to ack, or the failure that decides between requeue and discard
    async fn exec(&self, ctx: &Context, msg: &BusMessage) -> HandlerResult;
}

/// Handler failure that must not be redelivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscardMessage(pub String);

impl DiscardMessage {
    /// Creates a discard with a human readable `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        DiscardMessage(reason.into())
    }
}

impl fmt::Display for DiscardMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "discarded: {}", self.0)
    }
}

impl Error for DiscardMessage {}

pub(crate) fn is_discard(err: &HandlerError) -> bool {
    err.downcast_ref::<DiscardMessage>().is_some()
}

struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> ConsumerHandler for FnHandler<F>
where
    F: Fn(BusMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn exec(&self, _ctx: &Context, msg: &BusMessage) -> HandlerResult {
        (self.f)(msg.clone()).await
    }
}

/// Wraps an async closure.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ConsumerHandler>
where
    F: Fn(BusMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

/// Completion signal handed to callback-style handlers.
///
/// Dropping it without calling any method counts as a failure.
pub struct Completion {
    tx: oneshot::Sender<HandlerResult>,
}

impl Completion {
    /// Reports success; the message is acked.
    pub fn ok(self) {
        self.finish(Ok(()));
    }

    /// Reports a failure; the message is requeued unless `err` is a [`DiscardMessage`].
    pub fn fail(self, err: impl Into<HandlerError>) {
        self.finish(Err(err.into()));
    }

    pub fn finish(self, result: HandlerResult) {
        // The receiver is gone only if the delivery task was aborted.
        let _ = self.tx.send(result);
    }
}

struct CallbackHandler<F> {
    f: F,
}

#[async_trait]
impl<F> ConsumerHandler for CallbackHandler<F>
where
    F: Fn(BusMessage, Completion) + Send + Sync + 'static,
{
    async fn exec(&self, _ctx: &Context, msg: &BusMessage) -> HandlerResult {
        let (tx, rx) = oneshot::channel();
        (self.f)(msg.clone(), Completion { tx });
        match rx.await {
            Ok(result) => result,
            Err(_) => Err("handler dropped its completion without reporting".into()),
        }
    }
}

/// Wraps a closure that reports its outcome through a [`Completion`], possibly
/// from another task.
pub fn callback_handler<F>(f: F) -> Arc<dyn ConsumerHandler>
where
    F: Fn(BusMessage, Completion) + Send + Sync + 'static,
{
    Arc::new(CallbackHandler { f })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message() -> BusMessage {
        BusMessage {
            queue: "orders".to_owned(),
            content: json!({"id": 1}),
            fields: DeliveryFields {
                routing_key: "order.created".to_owned(),
                ..Default::default()
            },
            properties: MessageProperties::default(),
        }
    }

    #[tokio::test]
    async fn fn_handler_receives_message() {
        let handler = handler_fn(|msg: BusMessage| async move {
            let result: HandlerResult = if msg.content["id"] == 1 {
                Ok(())
            } else {
                Err("unexpected content".into())
            };
            result
        });

        assert!(handler.exec(&Context::new(), &message()).await.is_ok());
    }

    #[tokio::test]
    async fn callback_handler_completes_from_another_task() {
        let handler = callback_handler(|msg, done| {
            tokio::spawn(async move {
                if msg.routing_key() == "order.created" {
                    done.ok();
                } else {
                    done.fail("wrong key");
                }
            });
        });

        assert!(handler.exec(&Context::new(), &message()).await.is_ok());
    }

    #[tokio::test]
    async fn callback_failure_is_reported() {
        let handler = callback_handler(|_, done| done.fail(DiscardMessage::new("poison")));

        let ctx = Context::new();
        let err = handler.exec(&ctx, &message()).await.unwrap_err();
        assert!(is_discard(&err));
        assert_eq!(err.to_string(), "discarded: poison");
    }

    #[tokio::test]
    async fn dropped_completion_is_a_failure() {
        let handler = callback_handler(|_, done| drop(done));

        let ctx = Context::new();
        let err = handler.exec(&ctx, &message()).await.unwrap_err();
        assert!(!is_discard(&err));
    }
}
