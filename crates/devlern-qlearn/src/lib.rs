#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Tabular Q-learning policy for device actions.
//!
//! [`QTable`] keeps a value per `(state, action)` pair plus the visit
//! counters the confidence heuristic needs. Selection is ε-greedy over the
//! [`ActionCatalog`]; learning is the one-step Q-learning rule
//! `q += α · (r + γ · max q(s') − q)`. Absent entries read as `0.0` and reads
//! never create entries.

macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "telemetry")]
        tracing::warn!($($arg)*);
        #[cfg(not(feature = "telemetry"))]
        eprintln!($($arg)*);
    }};
}

macro_rules! log_info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "telemetry")]
        tracing::info!($($arg)*);
    }};
}

pub mod confidence;
pub mod error;
pub mod store;

use devlern_core::{ActionCatalog, Policy, ScoredAction, Selection, SelectionMode, UNKNOWN_INTENT};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub use confidence::{normalize_values, ConfidenceCategory, ConfidenceComponents};
pub use error::{QLearnError, Result};
pub use store::TableStore;

// Confidence calculation constants
/// Weight of the normalized value component.
const CONFIDENCE_VALUE_WEIGHT: f64 = 0.7;
/// Weight of the experience component.
const CONFIDENCE_EXPERIENCE_WEIGHT: f64 = 0.3;
/// Visit count at which experience stops adding confidence.
const EXPERIENCE_PLATEAU: f64 = 10.0;

/// Number of ranked candidates considered per selection.
const TOP_CANDIDATES: usize = 3;
/// Number of runner-up actions reported with a selection.
const ALTERNATIVES: usize = 2;

const FALLBACK_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

/// Hyperparameters of the learner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub learning_rate: f64,
    pub discount_factor: f64,
    /// Initial exploration rate; also the upper bound of ε.
    pub epsilon: f64,
    pub epsilon_decay: f64,
    pub epsilon_min: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.9,
            epsilon: 0.2,
            epsilon_decay: 0.995,
            epsilon_min: 0.01,
        }
    }
}

impl LearningConfig {
    /// Replaces non-finite values by defaults and clamps the rest into range.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        let pick = |v: f64, fallback: f64| if v.is_finite() { v } else { fallback };
        let epsilon = pick(self.epsilon, d.epsilon).clamp(0.0, 1.0);
        Self {
            learning_rate: pick(self.learning_rate, d.learning_rate).clamp(1e-6, 1.0),
            discount_factor: pick(self.discount_factor, d.discount_factor).clamp(0.0, 1.0),
            epsilon,
            epsilon_decay: pick(self.epsilon_decay, d.epsilon_decay).clamp(0.0, 1.0),
            epsilon_min: pick(self.epsilon_min, d.epsilon_min).clamp(0.0, epsilon),
        }
    }
}

/// Serialized form of a [`QTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    pub values: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default)]
    pub visit_counts: BTreeMap<String, BTreeMap<String, u64>>,
    #[serde(default)]
    pub state_visits: BTreeMap<String, u64>,
    pub exploration_rate: f64,
    #[serde(default)]
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotMetadata {
    pub total_states: usize,
    pub total_actions: usize,
    pub last_saved: String,
}

/// State → action → value table with visit counters and ε.
#[derive(Debug, Clone, PartialEq)]
pub struct QTable {
    config: LearningConfig,
    values: BTreeMap<String, BTreeMap<String, f64>>,
    visit_counts: BTreeMap<String, BTreeMap<String, u64>>,
    state_visits: BTreeMap<String, u64>,
    exploration_rate: f64,
}

impl Default for QTable {
    fn default() -> Self {
        Self::new(LearningConfig::default())
    }
}

impl QTable {
    #[must_use]
    pub fn new(config: LearningConfig) -> Self {
        let config = config.sanitized();
        Self {
            config,
            values: BTreeMap::new(),
            visit_counts: BTreeMap::new(),
            state_visits: BTreeMap::new(),
            exploration_rate: config.epsilon,
        }
    }

    /// Rebuilds a table from a snapshot.
    ///
    /// Non-finite values are dropped, every counted pair gets a value entry,
    /// and ε is clamped into `[epsilon_min, epsilon]`. Actions outside the
    /// current catalog are kept.
    #[must_use]
    pub fn from_snapshot(config: LearningConfig, snapshot: TableSnapshot) -> Self {
        let mut table = Self::new(config);
        for (state, actions) in snapshot.values {
            let actions: BTreeMap<String, f64> = actions
                .into_iter()
                .filter(|(action, value)| {
                    if value.is_finite() {
                        true
                    } else {
                        log_warn!("dropping non-finite value for {state}/{action}");
                        false
                    }
                })
                .collect();
            if !actions.is_empty() {
                table.values.insert(state, actions);
            }
        }
        for (state, counts) in snapshot.visit_counts {
            for (action, count) in counts {
                table
                    .values
                    .entry(state.clone())
                    .or_default()
                    .entry(action.clone())
                    .or_insert(0.0);
                table
                    .visit_counts
                    .entry(state.clone())
                    .or_default()
                    .insert(action, count);
            }
        }
        table.state_visits = snapshot.state_visits;
        table.set_exploration_rate(snapshot.exploration_rate);
        table
    }

    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            values: self.values.clone(),
            visit_counts: self.visit_counts.clone(),
            state_visits: self.state_visits.clone(),
            exploration_rate: self.exploration_rate,
            metadata: SnapshotMetadata {
                total_states: self.values.len(),
                total_actions: self.distinct_actions(),
                last_saved: iso8601_now(),
            },
        }
    }

    #[must_use]
    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    #[must_use]
    pub fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    /// Sets ε, clamped into `[epsilon_min, epsilon]`.
    pub fn set_exploration_rate(&mut self, rate: f64) {
        let rate = if rate.is_finite() {
            rate
        } else {
            self.config.epsilon
        };
        self.exploration_rate = rate.clamp(self.config.epsilon_min, self.config.epsilon);
    }

    /// Multiplies ε by the decay factor, never below `epsilon_min`.
    pub fn decay_exploration(&mut self) -> f64 {
        self.exploration_rate =
            (self.exploration_rate * self.config.epsilon_decay).max(self.config.epsilon_min);
        self.exploration_rate
    }

    /// Learned value, `0.0` when the pair was never tracked.
    #[must_use]
    pub fn value(&self, state: &str, action: &str) -> f64 {
        self.values
            .get(state)
            .and_then(|a| a.get(action))
            .copied()
            .unwrap_or(0.0)
    }

    #[must_use]
    pub fn values(&self, state: &str) -> Option<&BTreeMap<String, f64>> {
        self.values.get(state)
    }

    /// Tracked values of a state, or an empty map.
    #[must_use]
    pub fn value_snapshot(&self, state: &str) -> BTreeMap<String, f64> {
        self.values.get(state).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn visit_count(&self, state: &str, action: &str) -> u64 {
        self.visit_counts
            .get(state)
            .and_then(|a| a.get(action))
            .copied()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn state_visits(&self, state: &str) -> u64 {
        self.state_visits.get(state).copied().unwrap_or(0)
    }

    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    #[must_use]
    pub fn state_count(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.values.values().map(BTreeMap::len).sum()
    }

    fn distinct_actions(&self) -> usize {
        let mut actions: Vec<&str> = self
            .values
            .values()
            .flat_map(|a| a.keys().map(String::as_str))
            .collect();
        actions.sort_unstable();
        actions.dedup();
        actions.len()
    }

    /// States by total update count, most visited first.
    #[must_use]
    pub fn most_visited(&self, n: usize) -> Vec<(String, u64)> {
        let mut visits: Vec<(String, u64)> = self
            .state_visits
            .iter()
            .map(|(s, c)| (s.clone(), *c))
            .collect();
        visits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        visits.truncate(n);
        visits
    }

    /// Overwrites a value without touching counters.
    pub fn set_value(&mut self, state: &str, action: &str, value: f64) {
        if !value.is_finite() {
            log_warn!("ignoring non-finite value for {state}/{action}");
            return;
        }
        self.values
            .entry(state.to_string())
            .or_default()
            .insert(action.to_string(), value);
        self.visit_counts
            .entry(state.to_string())
            .or_default()
            .entry(action.to_string())
            .or_insert(0);
    }

    /// Best `n` candidates: tracked actions by value (ties by name), padded
    /// with untracked catalog actions at `0.0` in catalog order.
    #[must_use]
    pub fn top_actions(&self, state: &str, catalog: &ActionCatalog, n: usize) -> Vec<ScoredAction> {
        let mut top: Vec<ScoredAction> = match self.values.get(state) {
            Some(values) => confidence::rank(values)
                .into_iter()
                .take(n)
                .map(|(a, v)| ScoredAction::new(a, v))
                .collect(),
            None => Vec::new(),
        };
        if top.len() < n {
            let tracked = self.values.get(state);
            for action in catalog.iter() {
                if top.len() >= n {
                    break;
                }
                if tracked.is_some_and(|t| t.contains_key(action)) {
                    continue;
                }
                top.push(ScoredAction::new(action, 0.0));
            }
        }
        top
    }

    /// ε-greedy selection with confidence and two alternatives. Read-only.
    pub fn select_with<R: Rng + ?Sized>(
        &self,
        state: &str,
        catalog: &ActionCatalog,
        rng: &mut R,
    ) -> Selection {
        let top = self.top_actions(state, catalog, TOP_CANDIDATES);
        let explore = rng.gen::<f64>() < self.exploration_rate;

        let picked = if explore {
            catalog.as_slice().choose(rng).cloned()
        } else {
            top.first().map(|c| c.action.clone())
        };
        let action = picked
            .or_else(|| catalog.as_slice().first().cloned())
            .unwrap_or_else(|| UNKNOWN_INTENT.to_string());

        let confidence = self.confidence(state, &action);

        let mut alternatives: Vec<ScoredAction> = top
            .into_iter()
            .filter(|c| c.action != action)
            .take(ALTERNATIVES)
            .collect();
        for candidate in catalog.iter() {
            if alternatives.len() >= ALTERNATIVES {
                break;
            }
            if candidate == action || alternatives.iter().any(|a| a.action == candidate) {
                continue;
            }
            alternatives.push(ScoredAction::new(candidate, self.value(state, candidate)));
        }

        Selection {
            action,
            confidence,
            alternatives,
            mode: if explore {
                SelectionMode::Explore
            } else {
                SelectionMode::Exploit
            },
        }
    }

    /// Confidence in `[0, 1]`: `0.7 · normalized value + 0.3 · experience`.
    ///
    /// `0.0` for a state without tracked actions.
    #[must_use]
    pub fn confidence(&self, state: &str, action: &str) -> f64 {
        let Some(values) = self.values.get(state).filter(|v| !v.is_empty()) else {
            return 0.0;
        };
        let (min, max) = confidence::min_max(values.values().copied());
        #[allow(clippy::float_cmp)]
        let normalized = if max == min {
            confidence::NEUTRAL_SCORE
        } else {
            (self.value(state, action) - min) / (max - min)
        };
        #[allow(clippy::cast_precision_loss)]
        let experience = (self.visit_count(state, action) as f64 / EXPERIENCE_PLATEAU).min(1.0);
        (normalized * CONFIDENCE_VALUE_WEIGHT + experience * CONFIDENCE_EXPERIENCE_WEIGHT)
            .clamp(0.0, 1.0)
    }

    /// Applies one Q-learning step and returns the new value.
    ///
    /// The future term uses the best value of `next_state` when it is given
    /// and tracked, otherwise `0.0`. Counters always advance.
    pub fn update(&mut self, state: &str, action: &str, reward: f64, next_state: Option<&str>) -> f64 {
        if !reward.is_finite() {
            log_warn!("ignoring non-finite reward {reward} for {state}/{action}");
            return self.value(state, action);
        }
        let max_future = next_state
            .and_then(|s| self.values.get(s))
            .and_then(|a| a.values().copied().reduce(f64::max))
            .unwrap_or(0.0);

        let LearningConfig {
            learning_rate,
            discount_factor,
            ..
        } = self.config;
        let entry = self
            .values
            .entry(state.to_string())
            .or_default()
            .entry(action.to_string())
            .or_insert(0.0);
        let old = *entry;
        let new = old + learning_rate * (reward + discount_factor * max_future - old);
        *entry = new;

        *self
            .visit_counts
            .entry(state.to_string())
            .or_default()
            .entry(action.to_string())
            .or_insert(0) += 1;
        *self.state_visits.entry(state.to_string()).or_insert(0) += 1;

        log_info!("q({state}, {action}): {old:.4} -> {new:.4} (reward {reward})");
        new
    }
}

impl Policy for QTable {
    fn select(&self, state: &str, catalog: &ActionCatalog, rng: &mut dyn RngCore) -> Selection {
        self.select_with(state, catalog, rng)
    }

    fn confidence(&self, state: &str, action: &str) -> f64 {
        QTable::confidence(self, state, action)
    }

    fn update(&mut self, state: &str, action: &str, reward: f64, next_state: Option<&str>) {
        QTable::update(self, state, action, reward, next_state);
    }

    fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    fn decay_exploration(&mut self) -> f64 {
        QTable::decay_exploration(self)
    }

    fn value_snapshot(&self, state: &str) -> BTreeMap<String, f64> {
        QTable::value_snapshot(self, state)
    }

    fn top_actions(&self, state: &str, catalog: &ActionCatalog, n: usize) -> Vec<ScoredAction> {
        QTable::top_actions(self, state, catalog, n)
    }

    fn visit_count(&self, state: &str, action: &str) -> u64 {
        QTable::visit_count(self, state, action)
    }

    fn most_visited(&self, n: usize) -> Vec<(String, u64)> {
        QTable::most_visited(self, n)
    }

    fn state_count(&self) -> usize {
        QTable::state_count(self)
    }

    fn pair_count(&self) -> usize {
        QTable::pair_count(self)
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(QTable::snapshot(self)).unwrap_or(Value::Null)
    }

    /// Replaces the learned state, keeping the hyperparameters.
    fn load(&mut self, snapshot: Value) -> std::result::Result<(), serde_json::Error> {
        let snapshot: TableSnapshot = serde_json::from_value(snapshot)?;
        *self = QTable::from_snapshot(self.config, snapshot);
        Ok(())
    }
}

pub(crate) fn iso8601_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| FALLBACK_TIMESTAMP.to_string())
}
