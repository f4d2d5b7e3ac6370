//! Collaborators the host injects: a token estimator and a summarizer.
//!
//! The history core never talks to a tokenizer or model itself. Both traits
//! are dyn-compatible so a pipeline can hold them as `Arc<dyn ...>`, and both
//! are implemented for plain closures.

use std::future::Future;
use std::sync::Arc;

use crate::error::SummarizationError;
use crate::future::BoxFuture;
use crate::types::Message;

/// Estimates how many tokens a message costs the model.
///
/// # Example
///
/// ```
/// use chronicle_types::{Message, TokenEstimator};
///
/// let by_length = |m: &Message| m.content().render().len();
/// assert_eq!(by_length.estimate(&Message::user("m1", "four")), 4);
/// ```
pub trait TokenEstimator: Send + Sync {
    /// Token cost of a single message.
    fn estimate(&self, message: &Message) -> usize;
}

impl<F> TokenEstimator for F
where
    F: Fn(&Message) -> usize + Send + Sync,
{
    fn estimate(&self, message: &Message) -> usize {
        self(message)
    }
}

/// Condenses a run of messages into one message.
///
/// Implementations usually call a model. The returned message's content is
/// used as the summary text; its id and role are replaced by the caller.
/// Timeouts and cancellation are applied by the caller around the returned
/// future.
pub trait Summarizer: Send + Sync {
    /// Summarize `messages`, oldest first.
    fn summarize<'a>(
        &'a self,
        messages: &'a [Arc<Message>],
    ) -> BoxFuture<'a, Result<Message, SummarizationError>>;
}

impl<F, Fut> Summarizer for F
where
    F: Fn(Vec<Arc<Message>>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Message, SummarizationError>> + Send + 'static,
{
    fn summarize<'a>(
        &'a self,
        messages: &'a [Arc<Message>],
    ) -> BoxFuture<'a, Result<Message, SummarizationError>> {
        Box::pin(self(messages.to_vec()))
    }
}
