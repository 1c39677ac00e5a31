use devlern_core::ActionCatalog;
use devlern_qlearn::store::{LoadSource, TabularMetadata};
use devlern_qlearn::{LearningConfig, QTable, TableStore};
use std::fs;

fn catalog() -> ActionCatalog {
    ActionCatalog::new(["mute_audio", "volume_down", "take_screenshot"]).unwrap()
}

fn trained() -> QTable {
    let mut table = QTable::default();
    table.update("intent_mute_audio", "mute_audio", 0.5, None);
    table.update("intent_mute_audio", "volume_down", 1.0, None);
    table.update("intent_mute_audio", "volume_down", 1.0, None);
    table.update("intent_take_screenshot", "take_screenshot", 1.5, None);
    table.update("intent_take_screenshot_ctx_1a2b3c4d", "retired_action", -2.0, None);
    for _ in 0..7 {
        table.decay_exploration();
    }
    table
}

fn assert_same_table(a: &QTable, b: &QTable) {
    assert_eq!(a.state_count(), b.state_count());
    assert_eq!(a.pair_count(), b.pair_count());
    assert!((a.exploration_rate() - b.exploration_rate()).abs() < 1e-12);
    for state in a.states() {
        assert_eq!(a.state_visits(state), b.state_visits(state));
        for (action, value) in a.values(state).unwrap() {
            assert!((value - b.value(state, action)).abs() < 1e-12);
            assert_eq!(a.visit_count(state, action), b.visit_count(state, action));
        }
    }
}

#[test]
fn primary_roundtrip_is_exact() {
    let dir = tempfile::tempdir().unwrap();
    let store = TableStore::new(dir.path().join("models/qtable.json"));
    let table = trained();

    store.save(&table, &catalog()).unwrap();
    let (loaded, source) = store.load_with_source(LearningConfig::default());

    assert_eq!(source, LoadSource::Primary);
    assert_same_table(&table, &loaded);
}

#[test]
fn second_save_keeps_backup() {
    let dir = tempfile::tempdir().unwrap();
    let store = TableStore::new(dir.path().join("qtable.json"));
    let mut table = trained();

    store.save(&table, &catalog()).unwrap();
    assert!(!store.backup_path().exists());
    table.update("intent_lock_screen", "lock_screen", 1.0, None);
    store.save(&table, &catalog()).unwrap();

    assert!(store.backup_path().exists());
    let backup = TableStore::new(store.backup_path())
        .load_primary(LearningConfig::default())
        .unwrap()
        .unwrap();
    assert_same_table(&trained(), &backup);
    assert_eq!(backup.state_count(), 3);
    assert!(!dir.path().join("qtable.json.tmp").exists());
}

#[test]
fn tabular_fallback_when_primary_missing() {
    let dir = tempfile::tempdir().unwrap();
    let store = TableStore::new(dir.path().join("qtable.json"));
    let table = trained();
    store.save(&table, &catalog()).unwrap();
    fs::remove_file(store.primary_path()).unwrap();

    let (loaded, source) = store.load_with_source(LearningConfig::default());
    assert_eq!(source, LoadSource::Tabular);
    assert_same_table(&table, &loaded);
}

#[test]
fn tabular_fallback_when_primary_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let store = TableStore::new(dir.path().join("qtable.json"));
    let table = trained();
    store.save(&table, &catalog()).unwrap();
    fs::write(store.primary_path(), b"{ not json").unwrap();

    let (loaded, source) = store.load_with_source(LearningConfig::default());
    assert_eq!(source, LoadSource::Tabular);
    assert_same_table(&table, &loaded);
}

#[test]
fn metadata_sidecar_lists_catalog_and_hyperparameters() {
    let dir = tempfile::tempdir().unwrap();
    let store = TableStore::new(dir.path().join("qtable.json"));
    let table = trained();
    store.export_tabular(&table, &catalog()).unwrap();
    assert!(!store.primary_path().exists());

    let raw = fs::read_to_string(store.metadata_path()).unwrap();
    let metadata: TabularMetadata = serde_json::from_str(&raw).unwrap();
    assert_eq!(metadata.actions, catalog().as_slice());
    assert_eq!(metadata.total_states, 3);
    assert!((metadata.exploration_rate - table.exploration_rate()).abs() < 1e-12);
    assert!((metadata.hyperparameters.learning_rate - 0.1).abs() < 1e-12);

    let csv = fs::read_to_string(store.tabular_path()).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("state,action,value,visitCount,stateVisitTotal,lastUpdated")
    );
    assert_eq!(lines.count(), 4);
}

#[test]
fn everything_missing_or_broken_starts_cold() {
    let dir = tempfile::tempdir().unwrap();
    let store = TableStore::new(dir.path().join("qtable.json"));
    let config = LearningConfig {
        epsilon: 0.3,
        ..LearningConfig::default()
    };

    let (empty, source) = store.load_with_source(config);
    assert_eq!(source, LoadSource::Empty);
    assert_eq!(empty.state_count(), 0);
    assert!((empty.exploration_rate() - 0.3).abs() < 1e-12);

    fs::write(store.primary_path(), b"garbage").unwrap();
    fs::write(store.tabular_path(), "state,action,value\nintent_x,a,not-a-number\n").unwrap();
    let (cold, source) = store.load_with_source(config);
    assert_eq!(source, LoadSource::Empty);
    assert_eq!(cold, QTable::new(config));
}

#[test]
fn csv_without_sidecar_uses_configured_epsilon() {
    let dir = tempfile::tempdir().unwrap();
    let store = TableStore::new(dir.path().join("qtable.json"));
    fs::write(
        store.tabular_path(),
        "state,action,value,visitCount,stateVisitTotal,lastUpdated\n\
         intent_mute_audio,mute_audio,0.75,4,4,2026-01-04T12:00:00Z\n",
    )
    .unwrap();

    let table = store.load(LearningConfig::default());
    assert!((table.value("intent_mute_audio", "mute_audio") - 0.75).abs() < 1e-12);
    assert_eq!(table.visit_count("intent_mute_audio", "mute_audio"), 4);
    assert!((table.exploration_rate() - 0.2).abs() < 1e-12);
}

#[test]
fn unreadable_sidecar_keeps_csv_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = TableStore::new(dir.path().join("qtable.json"));
    fs::write(
        store.tabular_path(),
        "state,action,value,visitCount,stateVisitTotal,lastUpdated\n\
         intent_mute_audio,volume_down,0.4,2,2,2026-01-04T12:00:00Z\n",
    )
    .unwrap();
    fs::write(store.metadata_path(), "{ truncated").unwrap();

    let (table, source) = store.load_with_source(LearningConfig::default());
    assert_eq!(source, LoadSource::Tabular);
    assert!((table.value("intent_mute_audio", "volume_down") - 0.4).abs() < 1e-12);
    assert_eq!(table.visit_count("intent_mute_audio", "volume_down"), 2);
    assert!((table.exploration_rate() - 0.2).abs() < 1e-12);
}
