//! Publish/subscribe coordinator for cross-assistant events.
//!
//! A thin WebSocket client over the shared broker with two roles:
//! publisher for outgoing events (task lifecycle, insights, coordination
//! and review requests) and subscriber for inbound sync/coordination/task
//! channels. Delivery is at-most-once with no acknowledgement; ordering is
//! guaranteed only within a single channel/subscriber pairing.

mod coordinator;
mod pattern;

pub use coordinator::{BusMessage, Coordinator, Envelope};
pub use pattern::{channels, ChannelPattern};
