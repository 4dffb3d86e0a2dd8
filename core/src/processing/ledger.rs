use crate::prelude::{Event, PipelineError, PipelineResult};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Append-only event log, one JSON record per line, in arrival order.
///
/// Reads go through [`EventLedger::read_all`] on an independent file
/// handle, so inspection never blocks the append path. Append failures are
/// reported to the caller; the pipeline treats them as degraded service,
/// not a stop condition.
pub struct EventLedger {
    path: PathBuf,
    file: Option<File>,
}

impl EventLedger {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> PipelineResult<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .map_err(|err| PipelineError::LedgerWrite(err.to_string()))?;
                }
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|err| PipelineError::LedgerWrite(err.to_string()))?;
            self.file = Some(file);
        }
        Ok(self.file.as_mut().expect("writer just opened"))
    }

    /// Appends one event, flushed before returning so the record is durable
    /// in arrival order.
    pub fn append(&mut self, event: &Event) -> PipelineResult<()> {
        let line = serde_json::to_string(event)
            .map_err(|err| PipelineError::Internal(err.to_string()))?;
        let result = (|| {
            let file = self.writer()?;
            writeln!(file, "{}", line).map_err(|err| PipelineError::LedgerWrite(err.to_string()))?;
            file.flush()
                .map_err(|err| PipelineError::LedgerWrite(err.to_string()))
        })();
        if result.is_err() {
            // Force a reopen on the next append in case the handle went bad.
            self.file = None;
        }
        result
    }

    /// Reads every event currently in the ledger, oldest first.
    pub fn read_all<P: AsRef<Path>>(path: P) -> PipelineResult<Vec<Event>> {
        let file = File::open(path.as_ref())
            .map_err(|err| PipelineError::LedgerWrite(err.to_string()))?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|err| PipelineError::LedgerWrite(err.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let event: Event = serde_json::from_str(&line)
                .map_err(|err| PipelineError::Internal(err.to_string()))?;
            events.push(event);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(mjd: f64) -> Event {
        Event {
            mjd,
            observer: "observers_save".into(),
            telescope: "telescope_save".into(),
            azimuth_deg: 180.0,
            elevation_deg: 75.0,
            frequency_mhz: 1419.0,
            bandwidth_mhz: 6.0,
            vlen: 512,
            trial: None,
            significance: 6.5,
        }
    }

    #[test]
    fn appends_preserve_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut ledger = EventLedger::new(&path);
        for i in 0..5 {
            ledger.append(&sample_event(58_000.0 + i as f64)).unwrap();
        }

        let events = EventLedger::read_all(&path).unwrap();
        assert_eq!(events.len(), 5);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.mjd, 58_000.0 + i as f64);
        }
    }

    #[test]
    fn read_does_not_disturb_open_appender() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut ledger = EventLedger::new(&path);
        ledger.append(&sample_event(1.0)).unwrap();
        let first = EventLedger::read_all(&path).unwrap();
        assert_eq!(first.len(), 1);
        // The appender keeps working after a concurrent read.
        ledger.append(&sample_event(2.0)).unwrap();
        assert_eq!(EventLedger::read_all(&path).unwrap().len(), 2);
    }

    #[test]
    fn unwritable_path_reports_error_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the target path makes the open fail.
        let path = dir.path().join("blocked");
        std::fs::create_dir(&path).unwrap();
        let mut ledger = EventLedger::new(&path);
        let err = ledger.append(&sample_event(1.0)).unwrap_err();
        assert!(matches!(err, PipelineError::LedgerWrite(_)));
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/run/events.jsonl");
        let mut ledger = EventLedger::new(&path);
        ledger.append(&sample_event(3.0)).unwrap();
        assert_eq!(EventLedger::read_all(&path).unwrap().len(), 1);
    }
}
