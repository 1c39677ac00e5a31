use devlern_core::{Execution, ExecutionError, Executor};
use devlern_feedback::{Agent, AgentConfig, FeedbackSign, JsonlSink, NullSink};
use devlern_qlearn::LearningConfig;
use serde_json::Value;
use std::fs;

struct AlwaysOk;

impl Executor for AlwaysOk {
    fn list_actions(&self) -> Vec<String> {
        ["mute_audio", "volume_down", "volume_up", "lock_screen"]
            .map(String::from)
            .to_vec()
    }

    fn execute(&mut self, action: &str, _: Option<&Value>) -> Result<Execution, ExecutionError> {
        Ok(Execution::ok(format!("{action} done")).with_info("simulated", Value::Bool(true)))
    }
}

fn config(dir: &std::path::Path) -> AgentConfig {
    AgentConfig {
        learning: LearningConfig {
            epsilon: 0.0,
            epsilon_min: 0.0,
            ..LearningConfig::default()
        },
        table_path: dir.join("models/qtable.json"),
        log_path: dir.join("logs/decisions.jsonl"),
        seed: Some(42),
        ..AgentConfig::default()
    }
}

#[test]
fn learning_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    let mut first = Agent::new(&config, AlwaysOk, NullSink).unwrap();
    first.process_task("mute audio", None);
    first.apply_feedback(FeedbackSign::Negative, Some("volume_down"));
    first.end_episode().unwrap();
    assert!(config.table_path.exists());
    assert!(dir.path().join("models/qtable.csv").exists());
    let learned = first.table().clone();
    first.close().unwrap();

    let second = Agent::new(&config, AlwaysOk, NullSink).unwrap();
    let table = second.table();
    assert_eq!(table.state_count(), learned.state_count());
    assert_eq!(
        table.visit_count("intent_mute_audio", "volume_down"),
        learned.visit_count("intent_mute_audio", "volume_down")
    );
    assert!(
        (table.value("intent_mute_audio", "volume_down")
            - learned.value("intent_mute_audio", "volume_down"))
        .abs()
            < 1e-12
    );
}

#[test]
fn corrupt_table_starts_cold() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    fs::create_dir_all(config.table_path.parent().unwrap()).unwrap();
    fs::write(&config.table_path, "not a table").unwrap();

    let mut agent = Agent::new(&config, AlwaysOk, NullSink).unwrap();
    assert_eq!(agent.table().state_count(), 0);
    let result = agent.process_task("lock screen", None);
    assert_eq!(result.intent, "lock_screen");
}

#[test]
fn decision_log_records_tasks_feedback_and_episodes() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let sink = JsonlSink::open(&config.log_path).unwrap();

    let mut agent = Agent::new(&config, AlwaysOk, sink).unwrap();
    let result = agent.process_task("volume up", None);
    agent.apply_feedback(FeedbackSign::Positive, None);
    agent.close().unwrap();

    let lines: Vec<Value> = fs::read_to_string(&config.log_path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["kind"], "task");
    assert_eq!(lines[0]["taskId"], Value::String(result.task_id.clone()));
    assert!(lines[0].get("userFeedback").is_none());
    assert_eq!(lines[1]["userFeedback"], "positive");
    assert_eq!(lines[1]["taskId"], Value::String(result.task_id));
    assert_eq!(lines[2]["kind"], "episode");
    assert_eq!(lines[2]["tasks"], 1);
}

#[test]
fn export_writes_only_tabular_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let mut agent = Agent::new(&config, AlwaysOk, NullSink).unwrap();
    agent.process_task("volume down", None);
    agent.apply_feedback(FeedbackSign::Positive, None);

    let csv = agent.export().unwrap();
    assert!(csv.exists());
    assert!(dir.path().join("models/qtable_metadata.json").exists());
    assert!(!config.table_path.exists());
}
