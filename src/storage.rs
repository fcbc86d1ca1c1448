//! Append-only voltage log.
//!
//! [`VoltageLog`] is the single source of truth for which cells have been
//! measured and for the on-disk record of measurements. On open it recovers
//! the known-cell set from any existing rows without rewriting them, then
//! keeps a single read+append handle for the whole session so each
//! measurement is one `write_record` + flush + `sync_data` away from being
//! durable.

use crate::error::AppResult;
use chrono::{DateTime, Local};
use log::{info, warn};
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Header row written exactly once, when the file is empty or new.
pub const LOG_HEADER: [&str; 3] = ["Cell Number", "Timestamp", "Open-Circuit Voltage (V)"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One measurement. Immutable once written; never mutated or deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct CellRecord {
    /// Cell number in `[1, max_cells]`.
    pub cell: u32,
    /// Local time the reading was taken.
    pub timestamp: DateTime<Local>,
    /// Measured open-circuit voltage. Recorded at full precision: precision
    /// is a recorded fact, not a display choice.
    pub volts: f64,
}

impl CellRecord {
    fn csv_fields(&self) -> [String; 3] {
        [
            self.cell.to_string(),
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            // Shortest f64 display that round-trips, no premature rounding
            self.volts.to_string(),
        ]
    }
}

/// Append-only measurement log with crash-safe recovery of prior entries.
pub struct VoltageLog {
    path: PathBuf,
    writer: csv::Writer<File>,
    known: BTreeSet<u32>,
}

impl VoltageLog {
    /// Open (or create) the log at `path` and recover the known-cell set.
    ///
    /// Existing rows are never rewritten or dropped: a malformed row is
    /// warned about and left untouched, and content missing a trailing
    /// newline is repaired so line-by-line appends stay valid.
    pub fn open<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let mut known = BTreeSet::new();
        let mut content = String::new();
        file.read_to_string(&mut content)?;

        let is_new = content.is_empty();
        if !is_new {
            for (index, line) in content.lines().enumerate() {
                if index == 0 && line == LOG_HEADER.join(",") {
                    continue;
                }
                if line.trim().is_empty() {
                    continue;
                }
                let leading = line.split(',').next().unwrap_or(line);
                match leading.trim().parse::<u32>() {
                    Ok(cell) => {
                        known.insert(cell);
                    }
                    Err(e) => {
                        warn!("Malformed cell number at csv row {:?}: {}", line, e);
                    }
                }
            }
            if !content.ends_with('\n') {
                file.write_all(b"\n")?;
                file.sync_data()?;
            }
        }

        let mut writer = csv::Writer::from_writer(file);
        if is_new {
            writer.write_record(LOG_HEADER)?;
            writer.flush()?;
            writer.get_ref().sync_data()?;
        }

        info!(
            "Voltage log open at '{}' ({} known cells)",
            path.display(),
            known.len()
        );

        Ok(Self {
            path,
            writer,
            known,
        })
    }

    /// Append one record and make it durable before returning. A crash after
    /// this call can never lose the record.
    pub fn append(&mut self, record: &CellRecord) -> AppResult<()> {
        self.writer.write_record(record.csv_fields())?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.known.insert(record.cell);
        Ok(())
    }

    /// Mark a cell as entered before any record exists for it.
    pub fn mark_known(&mut self, cell: u32) {
        self.known.insert(cell);
    }

    /// Whether `cell` has been entered in the recovered-plus-live session.
    pub fn is_known(&self, cell: u32) -> bool {
        self.known.contains(&cell)
    }

    /// The current known-cell set. Used for duplicate detection only.
    pub fn known_cells(&self) -> &BTreeSet<u32> {
        &self.known
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(cell: u32, volts: f64) -> CellRecord {
        CellRecord {
            cell,
            timestamp: Local.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            volts,
        }
    }

    #[test]
    fn test_new_file_gets_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voltages.csv");

        {
            let _log = VoltageLog::open(&path).unwrap();
        }
        {
            let _log = VoltageLog::open(&path).unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Cell Number,Timestamp,Open-Circuit Voltage (V)\n");
    }

    #[test]
    fn test_append_formats_full_precision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voltages.csv");

        let mut log = VoltageLog::open(&path).unwrap();
        log.append(&record(12, 3.7125)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Cell Number,Timestamp,Open-Circuit Voltage (V)\n\
             12,2024-01-01 10:00:00,3.7125\n"
        );
        assert!(log.is_known(12));
    }

    #[test]
    fn test_recovery_round_trip_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voltages.csv");

        {
            let mut log = VoltageLog::open(&path).unwrap();
            log.append(&record(5, 3.65)).unwrap();
            log.append(&record(9, 4.01)).unwrap();
        }

        let bytes_before = std::fs::read(&path).unwrap();
        let first: BTreeSet<u32>;
        {
            let log = VoltageLog::open(&path).unwrap();
            first = log.known_cells().clone();
        }
        let second = VoltageLog::open(&path).unwrap();

        let expected: BTreeSet<u32> = [5, 9].into_iter().collect();
        assert_eq!(first, expected);
        assert_eq!(second.known_cells(), &first);
        assert_eq!(std::fs::read(&path).unwrap(), bytes_before);
    }

    #[test]
    fn test_malformed_row_is_preserved_and_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voltages.csv");
        std::fs::write(
            &path,
            "Cell Number,Timestamp,Open-Circuit Voltage (V)\n\
             5,2024-01-01 10:00:00,3.65\n\
             garbage row that is not a record\n\
             7,2024-01-01 10:05:00,3.71\n",
        )
        .unwrap();

        let bytes_before = std::fs::read(&path).unwrap();
        let log = VoltageLog::open(&path).unwrap();

        let expected: BTreeSet<u32> = [5, 7].into_iter().collect();
        assert_eq!(log.known_cells(), &expected);
        assert_eq!(std::fs::read(&path).unwrap(), bytes_before);
    }

    #[test]
    fn test_missing_trailing_newline_is_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voltages.csv");
        std::fs::write(
            &path,
            "Cell Number,Timestamp,Open-Circuit Voltage (V)\n\
             5,2024-01-01 10:00:00,3.65",
        )
        .unwrap();

        let mut log = VoltageLog::open(&path).unwrap();
        log.append(&record(6, 3.7)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Cell Number,Timestamp,Open-Circuit Voltage (V)\n\
             5,2024-01-01 10:00:00,3.65\n\
             6,2024-01-01 10:00:00,3.7\n"
        );
    }

    #[test]
    fn test_append_to_recovered_file_keeps_prior_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voltages.csv");

        {
            let mut log = VoltageLog::open(&path).unwrap();
            log.append(&record(5, 3.65)).unwrap();
        }
        {
            let mut log = VoltageLog::open(&path).unwrap();
            assert!(log.is_known(5));
            log.append(&record(5, 3.66)).unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Cell Number,Timestamp,Open-Circuit Voltage (V)\n\
             5,2024-01-01 10:00:00,3.65\n\
             5,2024-01-01 10:00:00,3.66\n"
        );
    }

    #[test]
    fn test_mark_known_without_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voltages.csv");

        let mut log = VoltageLog::open(&path).unwrap();
        log.mark_known(42);

        assert!(log.is_known(42));
        let content = std::fs::read_to_string(&path).unwrap();
        // Marking leaves the file untouched: the set may be a superset of
        // the rows on disk, never the other way round.
        assert_eq!(content, "Cell Number,Timestamp,Open-Circuit Voltage (V)\n");
    }
}
