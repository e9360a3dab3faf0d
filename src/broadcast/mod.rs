//! Subscriber fan-out and caption ordering.

pub mod hub;
pub mod reorder;

pub use hub::{
    BroadcastHub, ChannelSubscriber, CollectorSubscriber, StdoutSubscriber, Subscriber,
};
pub use reorder::ReorderBuffer;
