// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Events
//!
//! Client and listener notifications. Observers are called synchronously, in
//! subscription order, on the task that emits the event; an observer that needs
//! to do asynchronous work must spawn it.

use crate::{errors::BusError, handler::BusMessage, transport::DeliveryFields};
use serde_json::Value;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, PoisonError, RwLock,
};

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Synchronous in-process publish/subscribe for one event type.
pub struct EventEmitter<E> {
    next_id: AtomicU64,
    observers: RwLock<Vec<(SubscriptionId, Observer<E>)>>,
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        EventEmitter {
            next_id: AtomicU64::new(0),
            observers: RwLock::new(Vec::new()),
        }
    }
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `observer`; it is called for every later `emit`.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(observer)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(sub, _)| *sub != id);
        observers.len() != before
    }

    /// Notifies every observer and returns how many were notified.
    pub fn emit(&self, event: &E) -> usize {
        // Snapshot so observers can (un)subscribe while being notified.
        let observers: Vec<Observer<E>> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();

        for observer in &observers {
            observer(event);
        }
        observers.len()
    }

    /// Number of subscribed observers.
    pub fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Why a delivery did not complete normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeErrorKind {
    /// The payload is not valid JSON. The message was acked and the handler skipped.
    InvalidContent,
    /// The handler failed. The message was requeued.
    HandlerFailed,
    /// The handler failed with `DiscardMessage`. The message was acked.
    Discarded,
}

/// Details of a failed delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumeFailure {
    pub kind: ConsumeErrorKind,
    pub error: BusError,
    pub queue: String,
    /// Decoded content, absent when decoding failed.
    pub content: Option<Value>,
    pub fields: DeliveryFields,
}

/// Notifications emitted by a `BusClient`.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A connection and its channel were opened.
    Connected,
    /// A reconnect attempt succeeded. Follows a `Connected` event.
    Reconnected,
    /// The connection dropped, or a reconnect attempt failed.
    ConnectionError(BusError),
    ConsumeError(ConsumeFailure),
    /// The connection closed. Cleanup hooks are running and the client will be
    /// force closed once they finish or the grace period elapses.
    CloseCleanup,
}

/// Notifications emitted by a `BusListener`.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    /// The first `listen` call started activation.
    Connect,
    /// Relayed `ClientEvent::ConsumeError`.
    HandleError(ConsumeFailure),
    /// No handler is registered for the message's routing key on its queue.
    Unhandled(BusMessage),
}
