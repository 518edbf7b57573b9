//! Persisted logging flag
//!
//! A single boolean under a fixed identifier records whether logging should
//! be active, so the choice survives a process restart. The first run finds
//! no value, defaults to enabled, and writes the default back.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::LoggerError;

/// Durable store for the logging-enabled flag
pub trait FlagStore {
    /// Read the persisted flag; `Ok(None)` when it has never been written
    fn read(&self) -> Result<Option<bool>, LoggerError>;

    fn write(&mut self, enabled: bool) -> Result<(), LoggerError>;
}

/// Volatile store for tests and hosts without durable storage
#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    value: Option<bool>,
    writes: usize,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already holds a value, as after a previous run
    pub fn with_value(enabled: bool) -> Self {
        Self {
            value: Some(enabled),
            writes: 0,
        }
    }

    /// Number of writes since construction
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl FlagStore for MemoryFlagStore {
    fn read(&self) -> Result<Option<bool>, LoggerError> {
        Ok(self.value)
    }

    fn write(&mut self, enabled: bool) -> Result<(), LoggerError> {
        self.value = Some(enabled);
        self.writes += 1;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FlagDocument {
    logging_enabled: bool,
}

/// JSON-file-backed store for host-side use
#[derive(Debug, Clone)]
pub struct FileFlagStore {
    path: PathBuf,
}

impl FileFlagStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl FlagStore for FileFlagStore {
    fn read(&self) -> Result<Option<bool>, LoggerError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(&self.path).map_err(|e| LoggerError::FlagRead(e.to_string()))?;
        let document: FlagDocument = serde_json::from_str(&contents)?;
        Ok(Some(document.logging_enabled))
    }

    fn write(&mut self, enabled: bool) -> Result<(), LoggerError> {
        let document = FlagDocument {
            logging_enabled: enabled,
        };
        let contents = serde_json::to_string(&document)?;
        fs::write(&self.path, contents).map_err(|e| LoggerError::FlagWrite(e.to_string()))
    }
}
