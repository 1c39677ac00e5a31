//! Agent configuration.

use crate::feedback::FeedbackSign;
use devlern_qlearn::LearningConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default location of the primary table file.
pub const DEFAULT_TABLE_PATH: &str = "models/qtable.json";
/// Default location of the decision log.
pub const DEFAULT_LOG_PATH: &str = "logs/decisions.jsonl";

/// Rewards the agent assigns to execution outcomes and feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardPolicy {
    pub success: f64,
    /// Reward for a successful action listed in `complex_actions`.
    pub complex_success: f64,
    pub complex_actions: Vec<String>,
    pub failure: f64,
    /// Penalty for a failed action listed in `basic_actions`.
    pub basic_failure: f64,
    pub basic_actions: Vec<String>,
    /// The executor broke down instead of reporting a result.
    pub executor_error: f64,
    pub positive_feedback: f64,
    pub negative_feedback: f64,
    /// Fixed reward given to a suggested action after negative feedback.
    pub suggestion_boost: f64,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            success: 1.0,
            complex_success: 1.5,
            complex_actions: ["take_screenshot", "show_system_info", "check_network_status"]
                .map(String::from)
                .to_vec(),
            failure: -1.0,
            basic_failure: -1.5,
            basic_actions: ["open_file_browser", "open_notepad", "mute_audio"]
                .map(String::from)
                .to_vec(),
            executor_error: -2.0,
            positive_feedback: 0.5,
            negative_feedback: -0.5,
            suggestion_boost: 1.0,
        }
    }
}

impl RewardPolicy {
    /// Internal reward for an execution that completed.
    #[must_use]
    pub fn internal_reward(&self, action: &str, success: bool) -> f64 {
        let listed = |set: &[String]| set.iter().any(|a| a == action);
        match success {
            true if listed(&self.complex_actions) => self.complex_success,
            true => self.success,
            false if listed(&self.basic_actions) => self.basic_failure,
            false => self.failure,
        }
    }

    #[must_use]
    pub fn feedback_reward(&self, sign: FeedbackSign) -> f64 {
        match sign {
            FeedbackSign::Positive => self.positive_feedback,
            FeedbackSign::Negative => self.negative_feedback,
            FeedbackSign::Neutral => 0.0,
        }
    }
}

/// Everything needed to construct an [`Agent`](crate::Agent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub learning: LearningConfig,
    pub rewards: RewardPolicy,
    pub table_path: PathBuf,
    pub log_path: PathBuf,
    /// Seed for exploration and task ids; entropy when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            learning: LearningConfig::default(),
            rewards: RewardPolicy::default(),
            table_path: PathBuf::from(DEFAULT_TABLE_PATH),
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            seed: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn internal_rewards_by_outcome() {
        let p = RewardPolicy::default();
        assert!((p.internal_reward("mute_audio", true) - 1.0).abs() < 1e-12);
        assert!((p.internal_reward("take_screenshot", true) - 1.5).abs() < 1e-12);
        assert!((p.internal_reward("lock_screen", false) + 1.0).abs() < 1e-12);
        assert!((p.internal_reward("open_notepad", false) + 1.5).abs() < 1e-12);
        assert!((p.executor_error + 2.0).abs() < 1e-12);
    }

    #[test]
    fn feedback_rewards_by_sign() {
        let p = RewardPolicy::default();
        assert!((p.feedback_reward(FeedbackSign::Positive) - 0.5).abs() < 1e-12);
        assert!((p.feedback_reward(FeedbackSign::Negative) + 0.5).abs() < 1e-12);
        assert!(p.feedback_reward(FeedbackSign::Neutral).abs() < 1e-12);
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let config: AgentConfig = serde_json::from_str(
            r#"{"learning": {"epsilon": 0.5}, "rewards": {"success": 2.0}, "log_path": "run.jsonl"}"#,
        )
        .unwrap();
        assert!((config.learning.epsilon - 0.5).abs() < 1e-12);
        assert!((config.learning.learning_rate - 0.1).abs() < 1e-12);
        assert!((config.rewards.success - 2.0).abs() < 1e-12);
        assert_eq!(config.rewards.complex_actions.len(), 3);
        assert_eq!(config.table_path, PathBuf::from(DEFAULT_TABLE_PATH));
        assert_eq!(config.log_path, PathBuf::from("run.jsonl"));
        assert!(config.seed.is_none());
    }
}
