//! Persistence collaborator
//!
//! The evaluator is in-memory; durability is delegated to an external
//! collaborator behind [`PersistenceSink`]. The database façade writes
//! records at commit points and can hydrate a model's rows back on
//! startup. Two implementations are provided: an in-memory sink for tests
//! and a JSON-lines file sink.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use super::record::Record;

/// External storage boundary used at commit points
pub trait PersistenceSink {
    /// Writes (upserts) one record of a model
    fn write(&mut self, model: &str, record: &Record) -> io::Result<()>;

    /// Reads back every record of a model, last write per pk winning
    fn read(&mut self, model: &str) -> io::Result<Vec<Record>>;
}

/// In-memory sink, keeps the latest record per primary key
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: HashMap<String, Vec<Record>>,
}

impl MemorySink {
    /// Creates an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held for a model
    pub fn len(&self, model: &str) -> usize {
        self.rows.get(model).map(|r| r.len()).unwrap_or(0)
    }

    /// Returns true if nothing was written for the model
    pub fn is_empty(&self, model: &str) -> bool {
        self.len(model) == 0
    }
}

impl PersistenceSink for MemorySink {
    fn write(&mut self, model: &str, record: &Record) -> io::Result<()> {
        let rows = self.rows.entry(model.to_string()).or_default();
        match rows.iter_mut().find(|r| r.pk == record.pk) {
            Some(existing) => *existing = record.clone(),
            None => rows.push(record.clone()),
        }
        Ok(())
    }

    fn read(&mut self, model: &str) -> io::Result<Vec<Record>> {
        Ok(self.rows.get(model).cloned().unwrap_or_default())
    }
}

/// Append-only JSON-lines file sink, one file per model
#[derive(Debug)]
pub struct JsonLinesSink {
    dir: PathBuf,
}

impl JsonLinesSink {
    /// Creates a sink rooted at the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn model_path(&self, model: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", model))
    }
}

impl PersistenceSink for JsonLinesSink {
    fn write(&mut self, model: &str, record: &Record) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.model_path(model))?;
        let line = serde_json::to_string(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(file, "{}", line)
    }

    fn read(&mut self, model: &str) -> io::Result<Vec<Record>> {
        let path = self.model_path(model);
        if !Path::new(&path).exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(path)?);
        // Later lines supersede earlier ones for the same pk.
        let mut latest: Vec<Record> = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(&line)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            match latest.iter_mut().find(|r| r.pk == record.pk) {
                Some(existing) => *existing = record,
                None => latest.push(record),
            }
        }
        Ok(latest)
    }
}
