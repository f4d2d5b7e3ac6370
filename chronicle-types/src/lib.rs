#![doc = include_str!("../README.md")]

pub mod counter;
pub mod duration;
pub mod error;
pub mod future;
pub mod id;
pub mod traits;
pub mod types;

pub use counter::TokenCounter;
pub use duration::DurationMs;
pub use error::*;
pub use future::BoxFuture;
pub use id::{MessageId, ToolCallId};
pub use traits::*;
pub use types::*;
