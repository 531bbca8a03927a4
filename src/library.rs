//! File-backed share library.
//!
//! An optional snapshot of every local user's catalogue, one JSON row per
//! shared file. The dispatcher flushes it on an interval and reapplies a
//! user's saved shares when they log back in, so a client does not have to
//! re-announce its whole library after a reconnect. Core catalogue
//! invariants never depend on this file existing or being current.

use crate::search::types::ContentType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

/// One persisted share row. Bitrate and sample rate are stored as plain
/// values and re-snapped to their class on reinsertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedShare {
    pub owner: String,
    pub path: String,
    pub hash: String,
    pub size: u64,
    pub bitrate: u32,
    pub sample_rate: u32,
    pub duration: u32,
    pub content_type: ContentType,
}

pub struct Library {
    path: PathBuf,
    rows: HashMap<String, Vec<SavedShare>>,
    dirty: bool,
}

impl Library {
    /// Open a library file, creating an empty library if the file does not
    /// exist yet. Unreadable rows are skipped with a warning rather than
    /// failing the load.
    pub fn open(path: PathBuf) -> io::Result<Self> {
        let mut rows: HashMap<String, Vec<SavedShare>> = HashMap::new();
        match fs::File::open(&path) {
            Ok(file) => {
                for (lineno, line) in BufReader::new(file).lines().enumerate() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<SavedShare>(&line) {
                        Ok(row) => rows
                            .entry(row.owner.to_ascii_lowercase())
                            .or_default()
                            .push(row),
                        Err(e) => {
                            tracing::warn!("library row {} unreadable: {}", lineno + 1, e)
                        }
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        let total: usize = rows.values().map(Vec::len).sum();
        tracing::info!("library: {} saved shares for {} users", total, rows.len());
        Ok(Self {
            path,
            rows,
            dirty: false,
        })
    }

    /// Saved shares for one user, if any.
    pub fn shares_for(&self, nick: &str) -> Option<&[SavedShare]> {
        self.rows
            .get(&nick.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    /// Record a share. A row already present for (owner, path) is left
    /// untouched, so reapplying saved shares at login does not duplicate.
    pub fn record(&mut self, row: SavedShare) {
        let entries = self.rows.entry(row.owner.to_ascii_lowercase()).or_default();
        if entries.iter().any(|existing| existing.path == row.path) {
            return;
        }
        entries.push(row);
        self.dirty = true;
    }

    /// Drop the row whose path ends in `basename` for one owner.
    pub fn remove(&mut self, owner: &str, basename: &str) {
        let key = owner.to_ascii_lowercase();
        if let Some(entries) = self.rows.get_mut(&key) {
            let before = entries.len();
            entries.retain(|row| {
                crate::search::types::split_path(&row.path).1 != basename
            });
            if entries.len() != before {
                self.dirty = true;
            }
            if entries.is_empty() {
                self.rows.remove(&key);
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rewrite the library file if anything changed since the last flush.
    pub fn flush(&mut self) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let mut writer = BufWriter::new(fs::File::create(&self.path)?);
        for entries in self.rows.values() {
            for row in entries {
                serde_json::to_writer(&mut writer, row)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                writer.write_all(b"\n")?;
            }
        }
        writer.flush()?;
        self.dirty = false;
        Ok(())
    }
}
