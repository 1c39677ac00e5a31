//! Records handed to the decision log.
//!
//! A [`TaskRecord`] is emitted once when a task is decided and executed, and
//! again when feedback for it arrives (then with `user_feedback` set and the
//! realized `total_reward`). An [`EpisodeRecord`] closes each episode.

use crate::ScoredAction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// RFC 3339 timestamp.
    pub timestamp: String,
    pub episode_index: u64,
    pub task_id: String,
    pub intent: String,
    pub action: String,
    pub internal_reward: f64,
    pub confidence_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<String>,
    pub total_reward: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_correct_action: Option<String>,
    pub success: bool,
    pub state_key: String,
    /// Values of every tracked action in the state at the time of the record.
    pub value_snapshot: BTreeMap<String, f64>,
    pub alternatives: Vec<ScoredAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeRecord {
    pub timestamp: String,
    pub episode_index: u64,
    pub total_reward: f64,
    pub average_confidence: f64,
    pub success_rate: f64,
    pub exploration_rate: f64,
    pub tasks: usize,
}

/// Storage side of the decision log.
///
/// Opened by whoever constructs the agent; `close` is called once at
/// shutdown and must flush.
pub trait DecisionSink {
    fn record_task(&mut self, record: &TaskRecord) -> io::Result<()>;
    fn record_episode(&mut self, record: &EpisodeRecord) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}
