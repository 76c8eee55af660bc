//! Side-effecting half of the loop: trades and posts

mod action;
mod sinks;

pub use action::ActionExecutor;
pub use sinks::{ContentSink, PostReceipt, TradeReceipt, TradeSink};
