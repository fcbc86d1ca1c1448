//! Durability and recovery properties of the voltage log, on real files.

use chrono::{Local, TimeZone};
use ocv_logger::{CellRecord, VoltageLog};
use std::collections::BTreeSet;

const HEADER: &str = "Cell Number,Timestamp,Open-Circuit Voltage (V)\n";

fn record(cell: u32, volts: f64) -> CellRecord {
    CellRecord {
        cell,
        timestamp: Local.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
        volts,
    }
}

#[test]
fn appends_survive_a_simulated_crash() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("voltages.csv");

    let mut log = VoltageLog::open(&path).unwrap();
    log.append(&record(1, 3.71)).unwrap();
    log.append(&record(2, 3.68)).unwrap();
    // Crash: no drop, no final flush beyond what append already guaranteed
    std::mem::forget(log);

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        content,
        format!(
            "{HEADER}1,2024-01-01 10:00:00,3.71\n2,2024-01-01 10:00:00,3.68\n"
        )
    );
}

#[test]
fn recovery_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("voltages.csv");

    {
        let mut log = VoltageLog::open(&path).unwrap();
        for (cell, volts) in [(3, 3.7), (1, 4.01), (450, 2.95)] {
            log.append(&record(cell, volts)).unwrap();
        }
    }

    let bytes_first = std::fs::read(&path).unwrap();
    let known_first: BTreeSet<u32> = {
        let log = VoltageLog::open(&path).unwrap();
        log.known_cells().clone()
    };
    let bytes_second = std::fs::read(&path).unwrap();
    let known_second: BTreeSet<u32> = {
        let log = VoltageLog::open(&path).unwrap();
        log.known_cells().clone()
    };

    let expected: BTreeSet<u32> = [1, 3, 450].into_iter().collect();
    assert_eq!(known_first, expected);
    assert_eq!(known_second, expected);
    assert_eq!(bytes_first, bytes_second);
    assert_eq!(std::fs::read(&path).unwrap(), bytes_first);
}

#[test]
fn malformed_rows_are_kept_verbatim_and_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("voltages.csv");
    let original = format!(
        "{HEADER}5,2024-01-01 10:00:00,3.65\nnot-a-cell,whenever,??\n9,2024-01-01 10:02:00,3.8\n"
    );
    std::fs::write(&path, &original).unwrap();

    let mut log = VoltageLog::open(&path).unwrap();
    let expected: BTreeSet<u32> = [5, 9].into_iter().collect();
    assert_eq!(log.known_cells(), &expected);

    // Loading kept the broken row; appending still works afterwards
    log.append(&record(10, 3.9)).unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        content,
        format!("{original}10,2024-01-01 10:00:00,3.9\n")
    );
}

#[test]
fn parent_data_directory_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("voltages.csv");

    let _log = VoltageLog::open(&path).unwrap();

    assert!(path.exists());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), HEADER);
}

#[test]
fn voltage_precision_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("voltages.csv");

    let volts = 3.141592653589793;
    let mut log = VoltageLog::open(&path).unwrap();
    log.append(&record(1, volts)).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let field = content
        .lines()
        .nth(1)
        .and_then(|row| row.split(',').nth(2))
        .unwrap();
    assert_eq!(field.parse::<f64>().unwrap(), volts);
}

#[test]
fn pre_populated_log_flags_known_cells() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("voltages.csv");
    std::fs::write(&path, format!("{HEADER}5,2024-01-01 10:00:00,3.65\n")).unwrap();

    let log = VoltageLog::open(&path).unwrap();
    assert!(log.is_known(5));
    assert!(!log.is_known(6));
}
