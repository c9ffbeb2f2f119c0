//! Type-specific task execution handlers.
//!
//! Each handler receives the task and returns a JSON result that the
//! manager stores under `metadata.result`. The defaults produce structured
//! work plans; hosts that want real side effects register their own
//! handlers before the manager is shared.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use aibridge_core::{Result, Task, TaskType};

#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, task: &Task) -> Result<Value>;
}

pub struct FeatureHandler;

#[async_trait]
impl TaskHandler for FeatureHandler {
    async fn run(&self, task: &Task) -> Result<Value> {
        Ok(json!({
            "kind": "implementation_plan",
            "summary": format!("Implement: {}", task.title),
            "steps": [
                "survey existing modules touched by the change",
                "implement behind the narrowest public surface",
                "add tests for the new paths",
            ],
            "depends_on": task.dependencies,
        }))
    }
}

pub struct BugHandler;

#[async_trait]
impl TaskHandler for BugHandler {
    async fn run(&self, task: &Task) -> Result<Value> {
        Ok(json!({
            "kind": "fix_plan",
            "summary": format!("Diagnose and fix: {}", task.title),
            "steps": [
                "reproduce from the report",
                "bisect to the faulty change",
                "fix and add a regression test",
            ],
        }))
    }
}

pub struct RefactorHandler;

#[async_trait]
impl TaskHandler for RefactorHandler {
    async fn run(&self, task: &Task) -> Result<Value> {
        Ok(json!({
            "kind": "refactor_plan",
            "summary": format!("Refactor: {}", task.title),
            "steps": [
                "pin current behavior with characterization tests",
                "restructure in behavior-preserving steps",
                "verify no public API changed",
            ],
        }))
    }
}

pub struct TestHandler;

#[async_trait]
impl TaskHandler for TestHandler {
    async fn run(&self, task: &Task) -> Result<Value> {
        Ok(json!({
            "kind": "test_plan",
            "summary": format!("Add coverage: {}", task.title),
            "targets": task.description.lines().take(5).collect::<Vec<_>>(),
        }))
    }
}

pub struct DocsHandler;

#[async_trait]
impl TaskHandler for DocsHandler {
    async fn run(&self, task: &Task) -> Result<Value> {
        Ok(json!({
            "kind": "docs_plan",
            "summary": format!("Document: {}", task.title),
            "sections": ["overview", "usage", "caveats"],
        }))
    }
}

/// The stock handler set covering every task type.
pub fn default_handlers() -> HashMap<TaskType, Arc<dyn TaskHandler>> {
    let mut handlers: HashMap<TaskType, Arc<dyn TaskHandler>> = HashMap::new();
    handlers.insert(TaskType::Feature, Arc::new(FeatureHandler));
    handlers.insert(TaskType::Bug, Arc::new(BugHandler));
    handlers.insert(TaskType::Refactor, Arc::new(RefactorHandler));
    handlers.insert(TaskType::Test, Arc::new(TestHandler));
    handlers.insert(TaskType::Docs, Arc::new(DocsHandler));
    handlers
}
