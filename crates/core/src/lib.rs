pub mod config;
pub mod env;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{AdapterConfig, BridgeConfig};
pub use error::{Error, Result};
pub use paths::Paths;
pub use types::{
    CoordinationMessage, InsightMessage, MemoryMetadata, MemoryRecord, Task, TaskInput,
    TaskPriority, TaskStatus, TaskType, TaskUpdate,
};
