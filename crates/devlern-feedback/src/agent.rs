//! The task cycle: resolve, select, execute, record, learn from feedback.

use crate::config::{AgentConfig, RewardPolicy};
use crate::episode::{Episode, EpisodeStep, EpisodeSummary};
use crate::error::{AgentError, Result};
use crate::feedback::FeedbackSign;
use crate::stats::{LearningStatistics, SessionStats, StateVisits};
use crate::store::PolicyStore;
use crate::{generate_task_id, iso8601_now};
use devlern_core::{
    encode_state, ActionCatalog, Context, DecisionSink, EpisodeRecord, Executor, IntentResolver,
    Policy, ResolvedBy, ScoredAction, SelectionMode, TaskRecord,
};
use devlern_qlearn::{
    normalize_values, ConfidenceCategory, ConfidenceComponents, QTable, TableStore,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Candidates reported by [`Agent::suggest`].
const SUGGESTIONS: usize = 3;
/// States listed in [`LearningStatistics::most_visited_states`].
const MOST_VISITED: usize = 5;
/// Confidence given to starter suggestions on an empty table.
const STARTER_CONFIDENCE: f64 = 0.5;

/// Everything a front end needs to render one decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_id: String,
    pub intent: String,
    pub resolved_by: ResolvedBy,
    pub state: String,
    pub action: String,
    pub mode: SelectionMode,
    pub confidence: f64,
    pub confidence_category: ConfidenceCategory,
    pub confidence_components: ConfidenceComponents,
    pub alternatives: Vec<ScoredAction>,
    pub success: bool,
    pub message: String,
    pub info: Map<String, Value>,
    pub internal_reward: f64,
    pub values: BTreeMap<String, f64>,
    pub normalized_values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub action: String,
    pub confidence: f64,
    pub reasoning: String,
}

/// Learning agent over an injected executor, decision log and policy.
pub struct Agent<E: Executor, S: DecisionSink, P: Policy = QTable> {
    table: P,
    catalog: ActionCatalog,
    resolver: IntentResolver,
    executor: E,
    sink: S,
    store: Option<Box<dyn PolicyStore<P>>>,
    rewards: RewardPolicy,
    episode: Episode,
    episode_index: u64,
    stats: SessionStats,
    rng: StdRng,
}

impl<E: Executor, S: DecisionSink> Agent<E, S> {
    /// Loads the table from `config.table_path` (cold start on any failure)
    /// and queries the executor's catalog once.
    pub fn new(config: &AgentConfig, executor: E, sink: S) -> Result<Self> {
        let store = TableStore::new(&config.table_path);
        let table = store.load(config.learning);
        let mut agent = Self::with_table(table, executor, sink)?
            .with_rewards(config.rewards.clone())
            .with_store(store);
        if let Some(seed) = config.seed {
            agent = agent.with_seed(seed);
        }
        Ok(agent)
    }
}

impl<E: Executor, S: DecisionSink, P: Policy> Agent<E, S, P> {
    /// In-memory agent without persistence.
    pub fn with_table(table: P, executor: E, sink: S) -> Result<Self> {
        let catalog = ActionCatalog::new(executor.list_actions())?;
        log_info!("agent ready with {} actions", catalog.len());
        Ok(Self {
            table,
            catalog,
            resolver: IntentResolver::default(),
            executor,
            sink,
            store: None,
            rewards: RewardPolicy::default(),
            episode: Episode::default(),
            episode_index: 0,
            stats: SessionStats::default(),
            rng: StdRng::from_entropy(),
        })
    }

    #[must_use]
    pub fn with_store(mut self, store: impl PolicyStore<P> + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    #[must_use]
    pub fn with_rewards(mut self, rewards: RewardPolicy) -> Self {
        self.rewards = rewards;
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: IntentResolver) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    #[must_use]
    pub fn table(&self) -> &P {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut P {
        &mut self.table
    }

    #[must_use]
    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn episode(&self) -> &Episode {
        &self.episode
    }

    #[must_use]
    pub fn episode_index(&self) -> u64 {
        self.episode_index
    }

    #[must_use]
    pub fn session_stats(&self) -> &SessionStats {
        &self.stats
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[must_use]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Decides and executes one task. The table is left untouched.
    pub fn process_task(&mut self, text: &str, context: Option<&Context>) -> TaskResult {
        let task_id = generate_task_id(&mut self.rng);
        let resolution = self.resolver.resolve_detailed(text, &self.catalog);
        let state = encode_state(&resolution.intent, context);
        let selection = self.table.select(&state, &self.catalog, &mut self.rng);

        let params = context.map(|c| Value::Object(c.clone().into_iter().collect()));
        let (success, message, info, internal_reward) =
            match self.executor.execute(&selection.action, params.as_ref()) {
                Ok(execution) => {
                    let reward = self
                        .rewards
                        .internal_reward(&selection.action, execution.success);
                    (execution.success, execution.message, execution.info, reward)
                }
                Err(e) => {
                    log_warn!("executor failed on {}: {e}", selection.action);
                    let mut info = Map::new();
                    info.insert("error".into(), Value::String(e.message.clone()));
                    (false, e.to_string(), info, self.rewards.executor_error)
                }
            };

        let values = self.table.value_snapshot(&state);
        self.emit_task(TaskRecord {
            timestamp: iso8601_now(),
            episode_index: self.episode_index,
            task_id: task_id.clone(),
            intent: resolution.intent.clone(),
            action: selection.action.clone(),
            internal_reward,
            confidence_score: selection.confidence,
            user_feedback: None,
            total_reward: internal_reward,
            suggested_correct_action: None,
            success,
            state_key: state.clone(),
            value_snapshot: values.clone(),
            alternatives: selection.alternatives.clone(),
        });
        self.episode.record(EpisodeStep {
            task_id: task_id.clone(),
            intent: resolution.intent.clone(),
            state: state.clone(),
            action: selection.action.clone(),
            internal_reward,
            confidence: selection.confidence,
            success,
        });
        self.stats.record_task(success, selection.confidence);
        log_info!(
            "{task_id}: {text:?} -> {} ({}, confidence {:.2})",
            selection.action,
            selection.mode,
            selection.confidence
        );

        TaskResult {
            task_id,
            intent: resolution.intent,
            resolved_by: resolution.via,
            confidence_category: ConfidenceCategory::from_score(selection.confidence),
            confidence_components: ConfidenceComponents::compute(&values, &selection.action),
            normalized_values: normalize_values(&values),
            values,
            state,
            action: selection.action,
            mode: selection.mode,
            confidence: selection.confidence,
            alternatives: selection.alternatives,
            success,
            message,
            info,
            internal_reward,
        }
    }

    /// Applies a judgment to the most recent task and returns the realized
    /// reward; `0.0` without touching the table when nothing was recorded.
    pub fn apply_feedback(&mut self, sign: FeedbackSign, suggested: Option<&str>) -> f64 {
        let Some(last) = self.episode.last().cloned() else {
            log_warn!("feedback {sign} ignored: no task recorded in this episode");
            return 0.0;
        };

        let total_reward = last.internal_reward + self.rewards.feedback_reward(sign);
        self.table
            .update(&last.state, &last.action, total_reward, None);

        if let Some(suggested) = suggested {
            if !sign.is_negative() {
                log_info!("suggestion {suggested} ignored for {sign} feedback");
            } else if self.catalog.contains(suggested) {
                self.table
                    .update(&last.state, suggested, self.rewards.suggestion_boost, None);
                log_info!("boosted suggested action {suggested} in {}", last.state);
            } else {
                log_warn!("suggested action {suggested:?} is not in the catalog; boost skipped");
            }
        }

        self.episode.realize(total_reward, last.confidence);
        self.stats
            .record_feedback(total_reward, sign.is_positive(), sign.is_negative());
        self.table.decay_exploration();

        let top = self
            .table
            .top_actions(&last.state, &self.catalog, SUGGESTIONS);
        self.emit_task(TaskRecord {
            timestamp: iso8601_now(),
            episode_index: self.episode_index,
            task_id: last.task_id,
            intent: last.intent,
            action: last.action.clone(),
            internal_reward: last.internal_reward,
            confidence_score: last.confidence,
            user_feedback: Some(sign.to_string()),
            total_reward,
            suggested_correct_action: suggested.map(str::to_string),
            success: last.success,
            value_snapshot: self.table.value_snapshot(&last.state),
            state_key: last.state,
            alternatives: top.into_iter().filter(|a| a.action != last.action).collect(),
        });
        log_info!(
            "feedback {sign}: total reward {total_reward:.2}, ε now {:.3}",
            self.table.exploration_rate()
        );
        total_reward
    }

    /// Closes the current episode: emits its summary, clears it and saves the
    /// table. A no-op on an empty episode.
    pub fn end_episode(&mut self) -> Option<EpisodeSummary> {
        let summary = self.episode.summarize()?;
        let record = EpisodeRecord {
            timestamp: iso8601_now(),
            episode_index: self.episode_index,
            total_reward: summary.total_reward,
            average_confidence: summary.average_confidence,
            success_rate: summary.success_rate,
            exploration_rate: self.table.exploration_rate(),
            tasks: summary.tasks,
        };
        if let Err(e) = self.sink.record_episode(&record) {
            log_warn!("failed to log episode {}: {e}", self.episode_index);
        }
        log_info!(
            "episode {} complete: reward {:.2}, confidence {:.2}, success {:.2}",
            self.episode_index,
            summary.total_reward,
            summary.average_confidence,
            summary.success_rate
        );

        self.episode.clear();
        self.episode_index += 1;
        self.stats.episodes_completed += 1;
        if self.store.is_some() {
            if let Err(e) = self.save() {
                log_warn!("table not saved, continuing in memory: {e}");
            }
        }
        Some(summary)
    }

    /// Up to three candidate actions for the state of `text`, or of the most
    /// visited state when no text is given.
    #[must_use]
    pub fn suggest(&self, text: Option<&str>) -> Vec<Suggestion> {
        let state = match text.map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => encode_state(&self.resolver.resolve(text, &self.catalog), None),
            None => match self.table.most_visited(1).into_iter().next() {
                Some((state, _)) => state,
                None => return starter_suggestions(),
            },
        };
        self.table
            .top_actions(&state, &self.catalog, SUGGESTIONS)
            .into_iter()
            .map(|candidate| Suggestion {
                confidence: self.table.confidence(&state, &candidate.action),
                reasoning: format!(
                    "value {:.2}, visited {} times",
                    candidate.value,
                    self.table.visit_count(&state, &candidate.action)
                ),
                action: candidate.action,
            })
            .collect()
    }

    #[must_use]
    pub fn learning_statistics(&self) -> LearningStatistics {
        LearningStatistics {
            total_states: self.table.state_count(),
            total_state_action_pairs: self.table.pair_count(),
            most_visited_states: self
                .table
                .most_visited(MOST_VISITED)
                .into_iter()
                .map(|(state, visits)| StateVisits { state, visits })
                .collect(),
            exploration_rate: self.table.exploration_rate(),
            current_episode: self.episode_index,
            success_rate: self.stats.success_rate(),
            average_reward: self.stats.average_reward(),
            average_confidence: self.stats.average_confidence(),
            feedback_ratio: self.stats.feedback_ratio(),
            session: self.stats.clone(),
        }
    }

    /// Writes the primary table file and the tabular export.
    pub fn save(&self) -> Result<()> {
        let store = self.store.as_ref().ok_or(AgentError::NoStore)?;
        store.save(&self.table, &self.catalog)
    }

    /// Writes only the tabular export and returns its path.
    pub fn export(&self) -> Result<PathBuf> {
        let store = self.store.as_ref().ok_or(AgentError::NoStore)?;
        store.export(&self.table, &self.catalog)
    }

    /// Ends a pending episode, closes the decision log and hands it back.
    pub fn close(mut self) -> Result<S> {
        self.end_episode();
        self.sink.close().map_err(AgentError::Close)?;
        Ok(self.sink)
    }

    fn emit_task(&mut self, record: TaskRecord) {
        if let Err(e) = self.sink.record_task(&record) {
            log_warn!("failed to log task {}: {e}", record.task_id);
        }
    }
}

fn starter_suggestions() -> Vec<Suggestion> {
    [
        ("take_screenshot", "Good starting action"),
        ("show_system_info", "Learn about the system"),
    ]
    .into_iter()
    .map(|(action, reasoning)| Suggestion {
        action: action.to_string(),
        confidence: STARTER_CONFIDENCE,
        reasoning: reasoning.to_string(),
    })
    .collect()
}
