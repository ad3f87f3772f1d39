// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Routing-Key Dispatch
//!
//! The `HandlerRegistry` maps queues to routing keys to handlers. Queues keep the
//! order in which they were first registered; registering the same queue and
//! routing key twice replaces the earlier handler.
//!
//! At activation every queue gets one `QueueDispatcher`, a `ConsumerHandler` that
//! routes each delivery on the queue to the handler registered for its routing
//! key. Messages with no matching handler are reported as
//! `ListenerEvent::Unhandled` and acked.

use crate::{
    events::{EventEmitter, ListenerEvent},
    handler::{BusMessage, ConsumerHandler, HandlerResult},
};
use async_trait::async_trait;
use opentelemetry::Context;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, warn};

#[derive(Clone, Default)]
struct QueueRoutes {
    /// Routing keys in first-registration order.
    keys: Vec<String>,
    handlers: HashMap<String, Arc<dyn ConsumerHandler>>,
}

/// Handlers keyed by queue, then routing key.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    queues: Vec<String>,
    routes: HashMap<String, QueueRoutes>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        HandlerRegistry::default()
    }

    /// Registers `handler` for `routing_key` on `queue`.
    ///
    /// # Parameters
    /// * `queue` - Queue the handler consumes from
    /// * `routing_key` - Routing key the handler is bound to
    /// * `handler` - Handler invoked for matching deliveries
    ///
    /// # Returns
    /// `true` when an earlier handler for the same pair was replaced
    pub fn add(
        &mut self,
        queue: &str,
        routing_key: &str,
        handler: Arc<dyn ConsumerHandler>,
    ) -> bool {
        let routes = match self.routes.get_mut(queue) {
            Some(routes) => routes,
            None => {
                self.queues.push(queue.to_owned());
                self.routes.entry(queue.to_owned()).or_default()
            }
        };

        let replaced = routes
            .handlers
            .insert(routing_key.to_owned(), handler)
            .is_some();
        if !replaced {
            routes.keys.push(routing_key.to_owned());
        }
        replaced
    }

    /// Queues in first-registration order.
    pub fn queues(&self) -> &[String] {
        &self.queues
    }

    /// Routing keys registered on `queue`, in first-registration order.
    pub fn routing_keys(&self, queue: &str) -> &[String] {
        self.routes
            .get(queue)
            .map(|routes| routes.keys.as_slice())
            .unwrap_or_default()
    }

    /// Handler registered for `routing_key` on `queue`, if any.
    pub fn handler(&self, queue: &str, routing_key: &str) -> Option<Arc<dyn ConsumerHandler>> {
        self.routes.get(queue)?.handlers.get(routing_key).cloned()
    }

    /// Number of registered (queue, routing key) pairs.
    pub fn len(&self) -> usize {
        self.routes.values().map(|routes| routes.keys.len()).sum()
    }

    /// Whether no handler has been registered.
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Builds the dispatcher for `queue` from the handlers registered so far.
    pub fn dispatcher(
        &self,
        queue: &str,
        events: Arc<EventEmitter<ListenerEvent>>,
    ) -> QueueDispatcher {
        QueueDispatcher {
            queue: queue.to_owned(),
            handlers: self
                .routes
                .get(queue)
                .map(|routes| routes.handlers.clone())
                .unwrap_or_default(),
            events,
        }
    }
}

/// Routes the deliveries of one queue by routing key.
pub struct QueueDispatcher {
    queue: String,
    handlers: HashMap<String, Arc<dyn ConsumerHandler>>,
    events: Arc<EventEmitter<ListenerEvent>>,
}

impl QueueDispatcher {
    /// Queue this dispatcher routes for.
    pub fn queue(&self) -> &str {
        &self.queue
    }
}

#[async_trait]
impl ConsumerHandler for QueueDispatcher {
    async fn exec(&self, ctx: &Context, msg: &BusMessage) -> HandlerResult {
        let Some(handler) = self.handlers.get(msg.routing_key()) else {
            warn!(
                queue = self.queue.as_str(),
                routing_key = msg.routing_key(),
                "no handler registered for routing key"
            );
            self.events.emit(&ListenerEvent::Unhandled(msg.clone()));
            return Ok(());
        };

        debug!(
            queue = self.queue.as_str(),
            routing_key = msg.routing_key(),
            "dispatching message"
        );
        handler.exec(ctx, msg).await
    }
}
