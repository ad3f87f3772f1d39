// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Topology
//!
//! One `QueueTopology` describes a single exchange/queue/binding triple. Installing
//! it asserts the exchange, asserts the queue and binds them under the routing key,
//! in that order. Assertions are idempotent on the broker side, so installing the
//! same topology twice is harmless.

use crate::{
    errors::BusError, exchange::ExchangeOptions, queue::QueueOptions, transport::TransportChannel,
};
use tracing::{debug, error};

/// An exchange, a queue and the binding between them.
pub(crate) struct QueueTopology<'tp> {
    /// Exchange name
    pub(crate) exchange: &'tp str,
    pub(crate) exchange_opts: &'tp ExchangeOptions,
    /// Queue name
    pub(crate) queue: &'tp str,
    pub(crate) queue_opts: &'tp QueueOptions,
    /// Key the queue is bound to the exchange with
    pub(crate) routing_key: &'tp str,
}

impl QueueTopology<'_> {
    /// Asserts the exchange and the queue, then binds them.
    ///
    /// Stops at the first failed step.
    ///
    /// # Parameters
    /// * `channel` - Channel the declarations are issued on
    ///
    /// # Returns
    /// `Ok(())` once the binding exists, or the `BusError` naming the failed step
    pub(crate) async fn install(&self, channel: &dyn TransportChannel) -> Result<(), BusError> {
        debug!(
            "creating exchange: {} ({})",
            self.exchange,
            self.exchange_opts.kind().as_str()
        );
        channel
            .assert_exchange(self.exchange, self.exchange_opts)
            .await
            .map_err(|err| {
                error!(
                    error = err.to_string(),
                    name = self.exchange,
                    "error to declare the exchange"
                );
                BusError::DeclareExchangeError(self.exchange.to_owned())
            })?;

        debug!("creating queue: {}", self.queue);
        channel
            .assert_queue(self.queue, self.queue_opts)
            .await
            .map_err(|err| {
                error!(
                    error = err.to_string(),
                    name = self.queue,
                    "error to declare the queue"
                );
                BusError::DeclareQueueError(self.queue.to_owned())
            })?;

        debug!(
            "binding queue: {} to the exchange: {} with the key: {}",
            self.queue, self.exchange, self.routing_key
        );
        channel
            .bind_queue(self.queue, self.exchange, self.routing_key)
            .await
            .map_err(|err| {
                error!(error = err.to_string(), "error to bind queue to exchange");
                BusError::BindingExchangeToQueueError(
                    self.exchange.to_owned(),
                    self.queue.to_owned(),
                )
            })
    }
}
