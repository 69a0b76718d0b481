//! Race history store
//!
//! Append-only CSV, one row per day: date, value and position count per
//! tracked account, benchmark value, display names. The header is written on
//! first append and the column set must stay stable for the life of one
//! file. Appends for the same date are not deduplicated; the report always
//! treats the last row as "today".

use crate::error::Result;
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// One account's contribution to a daily snapshot
#[derive(Debug, Clone)]
pub struct AccountSnapshot {
    pub name: String,
    pub value: Decimal,
    pub positions: usize,
}

/// One loaded history row. Numeric fields that failed to parse are `None`;
/// the row itself is always kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub date: String,
    pub values: Vec<Option<Decimal>>,
    pub positions: Vec<Option<u32>>,
    pub benchmark: Option<Decimal>,
    pub account_names: Vec<String>,
}

/// Durable daily time series backed by a CSV file
pub struct HistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one day's snapshot, writing the header first if the file does
    /// not exist yet. Serialized behind a lock so two writers can never
    /// interleave a row.
    pub fn append_snapshot(
        &self,
        date: NaiveDate,
        entries: &[AccountSnapshot],
        benchmark: Option<Decimal>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let write_header = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        if write_header {
            let mut header = vec!["date".to_string()];
            for entry in entries {
                let slug = column_slug(&entry.name);
                header.push(format!("{}_value", slug));
                header.push(format!("{}_positions", slug));
            }
            header.push("benchmark_value".to_string());
            header.push("account_names".to_string());
            writer.write_record(&header)?;
        }

        let mut row = vec![date.format("%Y-%m-%d").to_string()];
        for entry in entries {
            row.push(entry.value.to_string());
            row.push(entry.positions.to_string());
        }
        row.push(benchmark.map(|b| b.to_string()).unwrap_or_default());
        row.push(
            entries
                .iter()
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>()
                .join("|"),
        );
        writer.write_record(&row)?;
        writer.flush()?;

        debug!("Appended race snapshot for {}", date);
        Ok(())
    }

    /// Load every row in file order. A numeric field that fails to parse
    /// becomes `None` rather than discarding the row.
    pub fn load_history(&self) -> Result<Vec<HistoryRow>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;

        let headers = reader.headers()?.clone();
        let mut value_cols = Vec::new();
        let mut position_cols = Vec::new();
        let mut benchmark_col = None;
        let mut names_col = None;
        for (i, name) in headers.iter().enumerate() {
            match name {
                "date" => {}
                "benchmark_value" => benchmark_col = Some(i),
                "account_names" => names_col = Some(i),
                _ if name.ends_with("_value") => value_cols.push(i),
                _ if name.ends_with("_positions") => position_cols.push(i),
                other => warn!("Unrecognized history column '{}', ignoring", other),
            }
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |i: usize| record.get(i).unwrap_or("");

            let values = value_cols
                .iter()
                .map(|&i| parse_decimal(field(i)))
                .collect();
            let positions = position_cols
                .iter()
                .map(|&i| field(i).parse::<u32>().ok())
                .collect();
            let benchmark = benchmark_col.and_then(|i| parse_decimal(field(i)));
            let account_names = names_col
                .map(|i| {
                    field(i)
                        .split('|')
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            rows.push(HistoryRow {
                date: record.get(0).unwrap_or("").to_string(),
                values,
                positions,
                benchmark,
                account_names,
            });
        }
        Ok(rows)
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw).ok()
}

fn column_slug(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn snapshot(name: &str, value: Decimal, positions: usize) -> AccountSnapshot {
        AccountSnapshot {
            name: name.to_string(),
            value,
            positions,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_append_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.csv"));

        store
            .append_snapshot(
                date(2024, 1, 1),
                &[
                    snapshot("Alice", dec!(1000.50), 5),
                    snapshot("Bob", dec!(2000), 3),
                ],
                Some(dec!(3100.25)),
            )
            .unwrap();

        let rows = store.load_history().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, "2024-01-01");
        assert_eq!(rows[0].values, vec![Some(dec!(1000.50)), Some(dec!(2000))]);
        assert_eq!(rows[0].positions, vec![Some(5), Some(3)]);
        assert_eq!(rows[0].benchmark, Some(dec!(3100.25)));
        assert_eq!(rows[0].account_names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.csv"));
        let entries = vec![snapshot("Alice", dec!(100), 1)];

        store.append_snapshot(date(2024, 1, 1), &entries, None).unwrap();
        store.append_snapshot(date(2024, 1, 2), &entries, None).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let headers = raw
            .lines()
            .filter(|l| l.starts_with("date,"))
            .count();
        assert_eq!(headers, 1);
        assert_eq!(store.load_history().unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_date_produces_two_rows() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.csv"));
        let d = date(2024, 1, 1);

        store
            .append_snapshot(d, &[snapshot("Alice", dec!(100), 1)], None)
            .unwrap();
        store
            .append_snapshot(d, &[snapshot("Alice", dec!(110), 1)], None)
            .unwrap();

        let rows = store.load_history().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].values[0], Some(dec!(110)));
    }

    #[test]
    fn test_missing_benchmark_is_none() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.csv"));

        store
            .append_snapshot(date(2024, 1, 1), &[snapshot("Alice", dec!(100), 1)], None)
            .unwrap();

        let rows = store.load_history().unwrap();
        assert_eq!(rows[0].benchmark, None);
    }

    #[test]
    fn test_bad_numeric_field_becomes_none_row_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.csv");
        std::fs::write(
            &path,
            "date,alice_value,alice_positions,benchmark_value,account_names\n\
             2024-01-01,not-a-number,5,garbage,Alice\n",
        )
        .unwrap();

        let rows = HistoryStore::new(&path).load_history().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values, vec![None]);
        assert_eq!(rows[0].positions, vec![Some(5)]);
        assert_eq!(rows[0].benchmark, None);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("never-written.csv"));
        assert!(store.load_history().unwrap().is_empty());
    }

    #[test]
    fn test_column_slug() {
        assert_eq!(column_slug("Alice B."), "alice_b_");
        assert_eq!(column_slug("acc-1"), "acc_1");
    }
}
