//! Time trial lap log
//!
//! Plain text, one lap time in seconds per line, appended after every lap.
//! The fastest entry is the best lap to beat.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use anyhow::{Context, Result};

/// Best and last lap of a time trial session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LapLog {
    /// Where laps are appended; `None` keeps the log in memory
    path: Option<PathBuf>,
    best: Option<f64>,
    last: Option<f64>,
}

impl LapLog {
    /// Log that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Read the log at `path`
    ///
    /// A missing file is an empty log. Lines that are not a lap time are
    /// skipped with a warning.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::info!("No lap log at {}, starting fresh", path.display());
                String::new()
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        let mut best: Option<f64> = None;
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<f64>() {
                Ok(time) if time.is_finite() && time > 0.0 => {
                    best = Some(best.map_or(time, |b| b.min(time)));
                }
                _ => log::warn!(
                    "Skipping malformed lap time '{line}' ({}:{})",
                    path.display(),
                    number + 1
                ),
            }
        }

        if let Some(best) = best {
            log::info!("Best lap on record: {best:.2} s");
        }
        Ok(Self {
            path: Some(path),
            best,
            last: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }

    pub fn last(&self) -> Option<f64> {
        self.last
    }

    /// Record a finished lap and persist it in the background
    ///
    /// Returns the writer thread so callers that care can wait for it.
    /// Write failures are logged and never reach the race.
    pub fn record(&mut self, time: f64) -> Option<JoinHandle<()>> {
        self.last = Some(time);
        if self.best.is_none_or(|best| time < best) {
            self.best = Some(time);
        }

        let path = self.path.clone()?;
        let handle = std::thread::spawn(move || {
            if let Err(err) = append_lap_time(&path, time) {
                log::error!("Failed to save lap time: {err:#}");
            }
        });
        Some(handle)
    }
}

/// Append one lap time to the log, creating the file if needed
pub fn append_lap_time(path: impl AsRef<Path>, time: f64) -> Result<()> {
    let path = path.as_ref();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{time}").with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
