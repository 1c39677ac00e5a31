//! On-disk persistence of a [`QTable`].
//!
//! Layout for a primary path `models/qtable.json`:
//!
//! - `models/qtable.json`: the full [`TableSnapshot`]
//! - `models/qtable.json.bak`: the previous primary file
//! - `models/qtable.csv`: one row per `(state, action)` pair
//! - `models/qtable_metadata.json`: ε, catalog and hyperparameters
//!
//! Loading prefers the primary file, falls back to the CSV export and ends
//! in an empty table. Load never fails.

use crate::error::{QLearnError, Result};
use crate::{iso8601_now, LearningConfig, QTable, TableSnapshot};
use devlern_core::ActionCatalog;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const CSV_HEADER: [&str; 6] = [
    "state",
    "action",
    "value",
    "visitCount",
    "stateVisitTotal",
    "lastUpdated",
];

/// Sidecar written next to the CSV export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabularMetadata {
    pub exploration_rate: f64,
    #[serde(default)]
    pub total_states: usize,
    #[serde(default)]
    pub total_actions: usize,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub export_timestamp: String,
    #[serde(default)]
    pub hyperparameters: Hyperparameters,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Hyperparameters {
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub epsilon_decay: f64,
    pub epsilon_min: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        LearningConfig::default().into()
    }
}

impl From<LearningConfig> for Hyperparameters {
    fn from(c: LearningConfig) -> Self {
        Self {
            learning_rate: c.learning_rate,
            discount_factor: c.discount_factor,
            epsilon_decay: c.epsilon_decay,
            epsilon_min: c.epsilon_min,
        }
    }
}

/// Where a loaded table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Primary,
    Tabular,
    Empty,
}

#[derive(Debug, Clone)]
pub struct TableStore {
    primary: PathBuf,
}

impl TableStore {
    pub fn new(primary: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
        }
    }

    #[must_use]
    pub fn primary_path(&self) -> &Path {
        &self.primary
    }

    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        with_suffix(&self.primary, ".bak")
    }

    #[must_use]
    pub fn tabular_path(&self) -> PathBuf {
        self.primary.with_extension("csv")
    }

    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        let stem = self
            .primary
            .file_stem()
            .map_or_else(|| "qtable".into(), |s| s.to_string_lossy().into_owned());
        self.primary.with_file_name(format!("{stem}_metadata.json"))
    }

    /// Writes the primary file, then the tabular export.
    pub fn save(&self, table: &QTable, catalog: &ActionCatalog) -> Result<()> {
        self.save_primary(table, catalog)?;
        self.export_tabular(table, catalog)?;
        log_info!("table saved to {}", self.primary.display());
        Ok(())
    }

    /// Replaces the primary file, keeping the previous one as backup.
    pub fn save_primary(&self, table: &QTable, catalog: &ActionCatalog) -> Result<()> {
        let mut snapshot = table.snapshot();
        snapshot.metadata.total_actions = catalog.len();
        write_replacing(&self.primary, Some(&self.backup_path()), |w| {
            serde_json::to_writer_pretty(&mut *w, &snapshot)?;
            writeln!(w).map_err(QLearnError::io(&self.primary))
        })
    }

    /// Writes the CSV rows and the metadata sidecar.
    pub fn export_tabular(&self, table: &QTable, catalog: &ActionCatalog) -> Result<()> {
        let csv_path = self.tabular_path();
        let now = iso8601_now();
        write_replacing(&csv_path, None, |w| {
            let io = QLearnError::io(&csv_path);
            let mut out = String::new();
            out.push_str(&CSV_HEADER.join(","));
            out.push('\n');
            for state in table.states() {
                let state_total = table.state_visits(state);
                for (action, value) in table.values(state).into_iter().flatten() {
                    let row = [
                        csv_field(state),
                        csv_field(action),
                        value.to_string(),
                        table.visit_count(state, action).to_string(),
                        state_total.to_string(),
                        now.clone(),
                    ];
                    out.push_str(&row.join(","));
                    out.push('\n');
                }
            }
            w.write_all(out.as_bytes()).map_err(io)
        })?;

        let metadata = TabularMetadata {
            exploration_rate: table.exploration_rate(),
            total_states: table.state_count(),
            total_actions: catalog.len(),
            actions: catalog.as_slice().to_vec(),
            export_timestamp: now,
            hyperparameters: (*table.config()).into(),
        };
        let meta_path = self.metadata_path();
        write_replacing(&meta_path, None, |w| {
            serde_json::to_writer_pretty(&mut *w, &metadata)?;
            writeln!(w).map_err(QLearnError::io(&meta_path))
        })
    }

    /// Loads the best available table; any failure degrades to a cold start.
    #[must_use]
    pub fn load(&self, config: LearningConfig) -> QTable {
        self.load_with_source(config).0
    }

    #[must_use]
    pub fn load_with_source(&self, config: LearningConfig) -> (QTable, LoadSource) {
        match self.load_primary(config) {
            Ok(Some(table)) => return (table, LoadSource::Primary),
            Ok(None) => log_info!("no table at {}, trying CSV", self.primary.display()),
            Err(e) => log_warn!("failed to load {}: {e}; trying CSV", self.primary.display()),
        }
        match self.load_tabular(config) {
            Ok(Some(table)) => (table, LoadSource::Tabular),
            Ok(None) => {
                log_info!("no stored table found, starting fresh");
                (QTable::new(config), LoadSource::Empty)
            }
            Err(e) => {
                log_warn!("failed to load CSV table: {e}; starting fresh");
                (QTable::new(config), LoadSource::Empty)
            }
        }
    }

    pub fn load_primary(&self, config: LearningConfig) -> Result<Option<QTable>> {
        if !self.primary.exists() {
            return Ok(None);
        }
        let file = File::open(&self.primary).map_err(QLearnError::io(&self.primary))?;
        let snapshot: TableSnapshot = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(QTable::from_snapshot(config, snapshot)))
    }

    pub fn load_tabular(&self, config: LearningConfig) -> Result<Option<QTable>> {
        let csv_path = self.tabular_path();
        if !csv_path.exists() {
            return Ok(None);
        }
        let file = File::open(&csv_path).map_err(QLearnError::io(&csv_path))?;
        let mut lines = BufReader::new(file).lines();

        let header = match lines.next() {
            Some(line) => split_csv_line(&line.map_err(QLearnError::io(&csv_path))?, 1)?,
            None => return Ok(Some(QTable::new(config))),
        };
        let columns = Columns::locate(&header)?;

        let mut snapshot = TableSnapshot {
            values: BTreeMap::new(),
            visit_counts: BTreeMap::new(),
            state_visits: BTreeMap::new(),
            exploration_rate: config.epsilon,
            metadata: Default::default(),
        };
        for (idx, line) in lines.enumerate() {
            let line_no = idx + 2;
            let line = line.map_err(QLearnError::io(&csv_path))?;
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_csv_line(&line, line_no)?;
            let row = columns.parse(&fields, line_no)?;
            snapshot
                .values
                .entry(row.state.clone())
                .or_default()
                .insert(row.action.clone(), row.value);
            snapshot
                .visit_counts
                .entry(row.state.clone())
                .or_default()
                .insert(row.action, row.visit_count);
            snapshot.state_visits.insert(row.state, row.state_visits);
        }

        let meta_path = self.metadata_path();
        if !meta_path.exists() {
            log_warn!("{} has no metadata sidecar", csv_path.display());
        } else {
            match read_metadata(&meta_path) {
                Ok(metadata) => snapshot.exploration_rate = metadata.exploration_rate,
                Err(e) => log_warn!("ignoring sidecar {}: {e}", meta_path.display()),
            }
        }
        Ok(Some(QTable::from_snapshot(config, snapshot)))
    }
}

fn read_metadata(path: &Path) -> Result<TabularMetadata> {
    let file = File::open(path).map_err(QLearnError::io(path))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

struct Row {
    state: String,
    action: String,
    value: f64,
    visit_count: u64,
    state_visits: u64,
}

/// Column positions; accepts the older snake_case export names too.
struct Columns {
    state: usize,
    action: usize,
    value: usize,
    visit_count: Option<usize>,
    state_visits: Option<usize>,
}

impl Columns {
    fn locate(header: &[String]) -> Result<Self> {
        let find = |names: &[&str]| header.iter().position(|h| names.contains(&h.trim()));
        let required = |names: &[&str]| {
            find(names).ok_or_else(|| QLearnError::Tabular {
                line: 1,
                reason: format!("missing column {}", names[0]),
            })
        };
        Ok(Self {
            state: required(&["state"])?,
            action: required(&["action"])?,
            value: required(&["value", "q_value"])?,
            visit_count: find(&["visitCount", "action_count"]),
            state_visits: find(&["stateVisitTotal", "state_visits"]),
        })
    }

    fn parse(&self, fields: &[String], line: usize) -> Result<Row> {
        let get = |idx: usize| {
            fields.get(idx).ok_or_else(|| QLearnError::Tabular {
                line,
                reason: format!("expected at least {} fields, found {}", idx + 1, fields.len()),
            })
        };
        let number = |idx: Option<usize>| -> Result<u64> {
            match idx {
                None => Ok(0),
                Some(i) => {
                    let raw = get(i)?.trim();
                    raw.parse::<u64>()
                        .or_else(|_| raw.parse::<f64>().map(|f| f.max(0.0) as u64))
                        .map_err(|e| QLearnError::Tabular {
                            line,
                            reason: format!("bad count {raw:?}: {e}"),
                        })
                }
            }
        };
        let raw_value = get(self.value)?.trim();
        let value = raw_value.parse::<f64>().map_err(|e| QLearnError::Tabular {
            line,
            reason: format!("bad value {raw_value:?}: {e}"),
        })?;
        Ok(Row {
            state: get(self.state)?.clone(),
            action: get(self.action)?.clone(),
            value,
            visit_count: number(self.visit_count)?,
            state_visits: number(self.state_visits)?,
        })
    }
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn split_csv_line(line: &str, line_no: usize) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            ('"', true) => quoted = false,
            ('"', false) if current.is_empty() => quoted = true,
            (',', false) => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if quoted {
        return Err(QLearnError::Tabular {
            line: line_no,
            reason: "unterminated quote".into(),
        });
    }
    fields.push(current);
    Ok(fields)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Removes the temporary file unless it was moved into place.
struct TempFile {
    path: PathBuf,
    persisted: bool,
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Writes through a sibling temp file and renames it over `path`. An existing
/// `path` is moved to `backup` first when one is given.
fn write_replacing<F>(path: &Path, backup: Option<&Path>, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(QLearnError::io(parent))?;
    }
    let mut tmp = TempFile {
        path: with_suffix(path, ".tmp"),
        persisted: false,
    };
    {
        let file = File::create(&tmp.path).map_err(QLearnError::io(&tmp.path))?;
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer.flush().map_err(QLearnError::io(&tmp.path))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(QLearnError::io(&tmp.path))?;
    }
    if let Some(backup) = backup {
        if path.exists() {
            fs::rename(path, backup).map_err(QLearnError::io(backup))?;
        }
    }
    fs::rename(&tmp.path, path).map_err(QLearnError::io(path))?;
    tmp.persisted = true;
    Ok(())
}
