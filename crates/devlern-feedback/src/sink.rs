//! Decision log sinks.

use crate::error::{AgentError, Result};
use devlern_core::{DecisionSink, EpisodeRecord, TaskRecord};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum LogLine<'a> {
    Task(&'a TaskRecord),
    Episode(&'a EpisodeRecord),
}

/// Appends one JSON object per line, tagged with `"kind": "task" | "episode"`.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl JsonlSink {
    /// Opens `path` for appending, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let err = |source| AgentError::Log {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(err)?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, line: &LogLine<'_>) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "decision log is closed"))?;
        serde_json::to_writer(&mut *writer, line)?;
        writer.write_all(b"\n")
    }
}

impl DecisionSink for JsonlSink {
    fn record_task(&mut self, record: &TaskRecord) -> io::Result<()> {
        self.write_line(&LogLine::Task(record))
    }

    fn record_episode(&mut self, record: &EpisodeRecord) -> io::Result<()> {
        self.write_line(&LogLine::Episode(record))?;
        self.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(mut w) => {
                w.flush()?;
                w.get_ref().sync_all()
            }
            None => Ok(()),
        }
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub tasks: Vec<TaskRecord>,
    pub episodes: Vec<EpisodeRecord>,
    pub closed: bool,
}

impl DecisionSink for MemorySink {
    fn record_task(&mut self, record: &TaskRecord) -> io::Result<()> {
        self.tasks.push(record.clone());
        Ok(())
    }

    fn record_episode(&mut self, record: &EpisodeRecord) -> io::Result<()> {
        self.episodes.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DecisionSink for NullSink {
    fn record_task(&mut self, _: &TaskRecord) -> io::Result<()> {
        Ok(())
    }

    fn record_episode(&mut self, _: &EpisodeRecord) -> io::Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
