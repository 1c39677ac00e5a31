//! Contract of the device-side collaborator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Outcome reported by an executor that ran to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub info: Map<String, Value>,
}

impl Execution {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            info: Map::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            info: Map::new(),
        }
    }

    #[must_use]
    pub fn with_info(mut self, key: impl Into<String>, value: Value) -> Self {
        self.info.insert(key.into(), value);
        self
    }
}

/// The executor could not run the action at all.
#[derive(Debug, Error)]
#[error("action {action} raised: {message}")]
pub struct ExecutionError {
    pub action: String,
    pub message: String,
}

impl ExecutionError {
    pub fn new(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            message: message.into(),
        }
    }
}

/// Performs platform-specific side effects for catalog actions.
///
/// Implementations must accept every identifier they list, even if only as
/// a stub. A failed attempt is `Ok(Execution { success: false, .. })`;
/// `Err` is reserved for the executor itself breaking down.
pub trait Executor {
    /// Queried once when the agent is constructed.
    fn list_actions(&self) -> Vec<String>;

    fn execute(&mut self, action: &str, params: Option<&Value>)
        -> Result<Execution, ExecutionError>;
}
