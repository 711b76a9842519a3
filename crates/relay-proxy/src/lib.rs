//! Transparent interception of message-listener deliveries.

mod dispatch;
mod proxy;
mod summarize;

pub use dispatch::{Dispatch, ListenerTarget, MessageListener, MESSAGE_LISTENER, ON_MESSAGE};
pub use proxy::{intercept, Intercepted, ListenerProxy};
pub use summarize::{Summarize, TruncatingSummarizer, DEFAULT_SUMMARY_LIMIT};
