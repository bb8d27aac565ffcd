//! Terminal handlers, behaviors and the continuation linking them.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::Result;
use crate::message::Message;

/// The single terminal handler of a message type.
#[async_trait]
pub trait Handler<M: Message>: Send + Sync {
    async fn handle(&self, ctx: &RequestContext, message: &M) -> Result<M::Output>;
}

/// A cross-cutting wrapper around the rest of the chain.
///
/// A behavior may run code before and after `next`, call it several times,
/// or not at all.
#[async_trait]
pub trait Behavior<M: Message>: Send + Sync {
    async fn handle(
        &self,
        ctx: &RequestContext,
        message: &M,
        next: Next<'_, M>,
    ) -> Result<M::Output>;
}

/// The remainder of a behavior chain, ending in the terminal handler.
///
/// `Next` is `Copy`, so a behavior can re-run its inner chain.
pub struct Next<'a, M: Message> {
    behaviors: &'a [Arc<dyn Behavior<M>>],
    handler: &'a dyn Handler<M>,
}

impl<'a, M: Message> Next<'a, M> {
    pub(crate) fn new(behaviors: &'a [Arc<dyn Behavior<M>>], handler: &'a dyn Handler<M>) -> Self {
        Self { behaviors, handler }
    }

    /// Invokes the next behavior, or the handler when no behavior is left.
    pub async fn run(self, ctx: &RequestContext, message: &M) -> Result<M::Output> {
        match self.behaviors.split_first() {
            Some((behavior, rest)) => {
                behavior
                    .handle(ctx, message, Next::new(rest, self.handler))
                    .await
            }
            None => self.handler.handle(ctx, message).await,
        }
    }

    /// Number of behaviors still ahead of the handler.
    pub fn remaining(&self) -> usize {
        self.behaviors.len()
    }
}

impl<M: Message> Clone for Next<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: Message> Copy for Next<'_, M> {}
