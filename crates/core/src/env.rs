//! Environment-variable contract between the orchestrator and its adapter
//! children. The orchestrator sets these at spawn time; the adapter reads
//! them before anything else.

use crate::error::{Error, Result};

pub const ASSISTANT: &str = "AIBRIDGE_ASSISTANT";
pub const PROFILE: &str = "AIBRIDGE_PROFILE";
pub const BACKEND_URL: &str = "AIBRIDGE_BACKEND_URL";
pub const BROKER_URL: &str = "AIBRIDGE_BROKER_URL";
pub const API_KEY: &str = "AIBRIDGE_API_KEY";

/// The resolved adapter environment. Missing identity or endpoint
/// variables are a config error; the process cannot come up without them.
#[derive(Debug, Clone)]
pub struct AdapterEnv {
    pub assistant: String,
    pub profile: String,
    pub backend_url: String,
    pub broker_url: String,
    pub api_key: String,
}

impl AdapterEnv {
    pub fn from_process_env() -> Result<Self> {
        Ok(Self {
            assistant: required(ASSISTANT)?,
            profile: std::env::var(PROFILE).unwrap_or_else(|_| "general".to_string()),
            backend_url: required(BACKEND_URL)?,
            broker_url: required(BROKER_URL)?,
            api_key: std::env::var(API_KEY).unwrap_or_default(),
        })
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("missing required environment variable {key}")))
}
