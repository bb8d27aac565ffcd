//! Static composition of behaviors around a terminal handler.

use std::sync::Arc;

use event_store::TransactionManager;

use crate::behavior::{Behavior, Handler, Next};
use crate::behaviors::{
    LoggingBehavior, RetryBehavior, TransactionBehavior, ValidationBehavior, Validator,
};
use crate::context::RequestContext;
use crate::error::Result;
use crate::message::Message;
use crate::retry::RetryStrategy;

/// The behaviors and terminal handler of one message type.
///
/// Behaviors run in registration order: the first registered is the
/// outermost wrapper.
pub struct Pipeline<M: Message> {
    behaviors: Vec<Arc<dyn Behavior<M>>>,
    handler: Arc<dyn Handler<M>>,
}

impl<M: Message> Pipeline<M> {
    pub fn builder(handler: impl Handler<M> + 'static) -> PipelineBuilder<M> {
        PipelineBuilder {
            behaviors: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    /// Runs `message` through every behavior and the handler.
    pub async fn execute(&self, ctx: &RequestContext, message: &M) -> Result<M::Output> {
        Next::new(&self.behaviors, self.handler.as_ref())
            .run(ctx, message)
            .await
    }

    pub fn behavior_count(&self) -> usize {
        self.behaviors.len()
    }
}

impl<M: Message> std::fmt::Debug for Pipeline<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("message_type", &M::message_type())
            .field("behaviors", &self.behaviors.len())
            .finish()
    }
}

/// Builder for [`Pipeline`].
///
/// The conventional order is logging, validation, retry, transaction:
/// logging sees validation failures, validation runs before any side
/// effect, each retry opens a fresh transaction, and the transaction wraps
/// exactly the handler's work.
pub struct PipelineBuilder<M: Message> {
    behaviors: Vec<Arc<dyn Behavior<M>>>,
    handler: Arc<dyn Handler<M>>,
}

impl<M: Message> PipelineBuilder<M> {
    /// Appends a behavior inside every behavior registered so far.
    pub fn with(mut self, behavior: impl Behavior<M> + 'static) -> Self {
        self.behaviors.push(Arc::new(behavior));
        self
    }

    pub fn logging(self) -> Self {
        self.with(LoggingBehavior)
    }

    pub fn validation(self, validators: Vec<Arc<dyn Validator<M>>>) -> Self {
        self.with(ValidationBehavior::new(validators))
    }

    pub fn retry(self, strategy: RetryStrategy) -> Self {
        self.with(RetryBehavior::new(strategy))
    }

    pub fn transaction(self, manager: Arc<dyn TransactionManager>) -> Self {
        self.with(TransactionBehavior::new(manager))
    }

    pub fn build(self) -> Pipeline<M> {
        Pipeline {
            behaviors: self.behaviors,
            handler: self.handler,
        }
    }
}
