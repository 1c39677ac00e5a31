#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Shared types and seams of devlern.
//!
//! A task string is resolved into an intent ([`intent`]), the intent plus an
//! optional context map becomes a state key ([`state`]), and a [`Policy`]
//! picks one action of the [`ActionCatalog`] for that state. The concrete
//! device side effect lives behind [`Executor`], every decision is reported
//! to a [`DecisionSink`].

pub mod catalog;
pub mod executor;
pub mod intent;
pub mod record;
pub mod state;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub use catalog::{ActionCatalog, CatalogError};
pub use executor::{Execution, ExecutionError, Executor};
pub use intent::{IntentResolver, IntentRule, Resolution, ResolvedBy, UNKNOWN_INTENT};
pub use record::{DecisionSink, EpisodeRecord, TaskRecord};
pub use state::encode_state;

/// Optional key/value context attached to a task. Only scalar entries take
/// part in the state key.
pub type Context = BTreeMap<String, Value>;

/// An action together with its current value estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAction {
    pub action: String,
    pub value: f64,
}

impl ScoredAction {
    pub fn new(action: impl Into<String>, value: f64) -> Self {
        Self {
            action: action.into(),
            value,
        }
    }
}

/// Which branch of ε-greedy produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    Explore,
    Exploit,
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMode::Explore => f.write_str("explore"),
            SelectionMode::Exploit => f.write_str("exploit"),
        }
    }
}

/// Result of asking a policy for an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub action: String,
    /// Heuristic certainty in `[0, 1]`, not the value itself.
    pub confidence: f64,
    /// Exactly two runner-up actions when the catalog allows it.
    pub alternatives: Vec<ScoredAction>,
    pub mode: SelectionMode,
}

/// A learnable action-selection policy over string state keys.
///
/// `select` is read-only; only `update` mutates learned values.
pub trait Policy {
    fn select(&self, state: &str, catalog: &ActionCatalog, rng: &mut dyn RngCore) -> Selection;
    fn confidence(&self, state: &str, action: &str) -> f64;
    fn update(&mut self, state: &str, action: &str, reward: f64, next_state: Option<&str>);
    fn exploration_rate(&self) -> f64;
    /// Applies one decay step and returns the new exploration rate.
    fn decay_exploration(&mut self) -> f64;
    /// Tracked values of `state`; empty for an unseen state.
    fn value_snapshot(&self, state: &str) -> BTreeMap<String, f64>;
    /// The `n` best actions of `state`, padded with untracked catalog actions.
    fn top_actions(&self, state: &str, catalog: &ActionCatalog, n: usize) -> Vec<ScoredAction>;
    fn visit_count(&self, state: &str, action: &str) -> u64;
    /// States with their visit totals, most visited first.
    fn most_visited(&self, n: usize) -> Vec<(String, u64)>;
    fn state_count(&self) -> usize;
    fn pair_count(&self) -> usize;
    fn snapshot(&self) -> Value;
    fn load(&mut self, snapshot: Value) -> Result<(), serde_json::Error>;
}
