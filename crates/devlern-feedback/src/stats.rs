//! Session and table statistics.

use serde::{Deserialize, Serialize};

/// Counters of the running session.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Tasks processed (successes + failures).
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    /// Sum of the confidences reported for processed tasks.
    pub total_confidence: f64,
    /// Rewards realized through feedback.
    pub total_reward: f64,
    pub feedback_events: usize,
    pub positive_feedback: usize,
    pub negative_feedback: usize,
    pub episodes_completed: u64,
}

impl SessionStats {
    pub(crate) fn record_task(&mut self, success: bool, confidence: f64) {
        self.total += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.total_confidence += confidence;
    }

    pub(crate) fn record_feedback(&mut self, total_reward: f64, positive: bool, negative: bool) {
        self.feedback_events += 1;
        self.total_reward += total_reward;
        if positive {
            self.positive_feedback += 1;
        }
        if negative {
            self.negative_feedback += 1;
        }
    }

    /// Success rate in `[0, 1]`.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.successes as f64 / self.total as f64
        }
    }

    #[must_use]
    pub fn average_confidence(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.total_confidence / self.total as f64
        }
    }

    /// Mean realized reward per feedback event.
    #[must_use]
    pub fn average_reward(&self) -> f64 {
        if self.feedback_events == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.total_reward / self.feedback_events as f64
        }
    }

    /// Positive share of signed feedback, `0.0` before any.
    #[must_use]
    pub fn feedback_ratio(&self) -> f64 {
        let signed = self.positive_feedback + self.negative_feedback;
        if signed == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.positive_feedback as f64 / signed as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateVisits {
    pub state: String,
    pub visits: u64,
}

/// Snapshot of what the table has learned so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningStatistics {
    pub total_states: usize,
    pub total_state_action_pairs: usize,
    /// Up to five states, most updated first.
    pub most_visited_states: Vec<StateVisits>,
    pub exploration_rate: f64,
    pub current_episode: u64,
    pub success_rate: f64,
    pub average_reward: f64,
    pub average_confidence: f64,
    pub feedback_ratio: f64,
    pub session: SessionStats,
}
