//! In-progress episode bookkeeping.

use serde::{Deserialize, Serialize};

/// One decided task of the current episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeStep {
    pub task_id: String,
    pub intent: String,
    pub state: String,
    pub action: String,
    pub internal_reward: f64,
    pub confidence: f64,
    pub success: bool,
}

/// Aggregates reported when an episode ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeSummary {
    /// Sum of the rewards realized through feedback.
    pub total_reward: f64,
    /// Mean confidence of the tasks that received feedback, `0.0` if none did.
    pub average_confidence: f64,
    /// Share of recorded tasks whose execution succeeded.
    pub success_rate: f64,
    pub tasks: usize,
}

/// Steps in order, plus the realized rewards and confidences appended as
/// feedback arrives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Episode {
    steps: Vec<EpisodeStep>,
    rewards: Vec<f64>,
    confidences: Vec<f64>,
}

impl Episode {
    pub fn record(&mut self, step: EpisodeStep) {
        self.steps.push(step);
    }

    /// The step feedback is addressed to.
    #[must_use]
    pub fn last(&self) -> Option<&EpisodeStep> {
        self.steps.last()
    }

    pub fn realize(&mut self, total_reward: f64, confidence: f64) {
        self.rewards.push(total_reward);
        self.confidences.push(confidence);
    }

    #[must_use]
    pub fn steps(&self) -> &[EpisodeStep] {
        &self.steps
    }

    #[must_use]
    pub fn realized_rewards(&self) -> &[f64] {
        &self.rewards
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// `None` while no task has been recorded.
    #[must_use]
    pub fn summarize(&self) -> Option<EpisodeSummary> {
        if self.steps.is_empty() {
            return None;
        }
        let successes = self.steps.iter().filter(|s| s.success).count();
        #[allow(clippy::cast_precision_loss)]
        let success_rate = successes as f64 / self.steps.len() as f64;
        #[allow(clippy::cast_precision_loss)]
        let average_confidence = if self.confidences.is_empty() {
            0.0
        } else {
            self.confidences.iter().sum::<f64>() / self.confidences.len() as f64
        };
        Some(EpisodeSummary {
            total_reward: self.rewards.iter().sum(),
            average_confidence,
            success_rate,
            tasks: self.steps.len(),
        })
    }

    pub fn clear(&mut self) {
        self.steps.clear();
        self.rewards.clear();
        self.confidences.clear();
    }
}
