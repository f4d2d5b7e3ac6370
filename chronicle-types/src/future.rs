//! Boxed future type shared by the collaborator traits.

use std::future::Future;
use std::pin::Pin;

/// A `Send` future a dyn-compatible trait method can return.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
