//! Task queue, lifecycle state machine and execution handlers.
//!
//! Tasks move `pending → in_progress → completed`, with `blocked` entered
//! only by explicit update. The queue is ordered by priority (critical
//! first, ties by insertion order), mirrored to the shared backend on
//! every mutation, and lifecycle events are broadcast over the bus.

pub mod handlers;
pub mod manager;
pub mod store;

pub use handlers::{default_handlers, TaskHandler};
pub use manager::{Progress, StatusBreakdown, TaskManager};
pub use store::{BackendTaskStore, BusPublisher, EventPublisher, TaskStore};
