//! CSV-backed tick source implementations.
//!
//! Two shapes are supported, matching the two CSV schemas the original
//! market-data and live-tick loggers produce: historical
//! `market_data_*.csv` files (columns `timestamp`, `market_ticker`,
//! `implied_yes_ask`, `implied_no_ask`, `best_yes_bid`, `best_no_bid`) and a
//! single live tick-log file (already in canonical column names). `RawRow`
//! accepts both via `#[serde(alias = ...)]`.

use super::tick::Tick;
use crate::core::errors::TickSourceError;
use crate::core::types::MarketState;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(alias = "timestamp")]
    time: String,
    #[serde(alias = "market_ticker")]
    ticker: String,
    #[serde(alias = "implied_yes_ask")]
    yes_ask: Option<f64>,
    #[serde(alias = "implied_no_ask")]
    no_ask: Option<f64>,
    #[serde(alias = "best_yes_bid")]
    yes_bid: Option<f64>,
    #[serde(alias = "best_no_bid")]
    no_bid: Option<f64>,
}

fn to_cents(v: Option<f64>) -> Option<u8> {
    v.filter(|x| x.is_finite())
        .map(|x| x.round().clamp(0.0, 100.0) as u8)
}

fn parse_time(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn row_to_tick(row: RawRow, file: &str, source_row: u64) -> Result<Tick, TickSourceError> {
    let time = parse_time(&row.time).ok_or_else(|| TickSourceError::BadTimestamp {
        raw: row.time.clone(),
        file: file.to_string(),
    })?;
    let mut tick = Tick::new(
        time,
        row.ticker,
        MarketState {
            yes_bid: to_cents(row.yes_bid),
            yes_ask: to_cents(row.yes_ask),
            no_bid: to_cents(row.no_bid),
            no_ask: to_cents(row.no_ask),
        },
    );
    tick.source_file = Some(file.to_string());
    tick.source_row = Some(source_row);
    Ok(tick)
}

fn read_csv_file(path: &Path) -> Result<Vec<Tick>, TickSourceError> {
    let file_name = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| TickSourceError::Io {
            file: file_name.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        })?;

    let mut ticks = Vec::new();
    for (idx, record) in reader.deserialize::<RawRow>().enumerate() {
        match record {
            Ok(row) => match row_to_tick(row, &file_name, idx as u64 + 1) {
                Ok(tick) => ticks.push(tick),
                Err(e) => warn!(file = %file_name, row = idx + 1, error = %e, "skipping malformed tick row"),
            },
            Err(e) => {
                warn!(file = %file_name, row = idx + 1, error = %e, "skipping malformed tick row");
            }
        }
    }
    Ok(ticks)
}

/// Read all `market_data_*.csv` files in `log_dir`, sorted by time.
pub fn iter_ticks_from_market_logs(log_dir: &Path) -> Result<Vec<Tick>, TickSourceError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(log_dir)
        .map_err(|e| TickSourceError::Io {
            file: log_dir.display().to_string(),
            source: e,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("market_data_") && n.ends_with(".csv"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    let mut ticks = Vec::new();
    for file in &files {
        ticks.extend(read_csv_file(file)?);
    }
    ticks.sort_by_key(|t| t.time);
    Ok(ticks)
}

/// Read a single live tick-log CSV in full (non-tailing replay mode).
pub fn iter_ticks_from_live_log(path: &Path) -> Result<Vec<Tick>, TickSourceError> {
    let mut ticks = read_csv_file(path)?;
    ticks.sort_by_key(|t| t.time);
    Ok(ticks)
}

/// Tails a single append-only CSV file, yielding newly written ticks as they
/// land. Used for `--follow` live operation; emits a heartbeat cadence for
/// external monitors while idle (§5, §6.5 `--diag-heartbeat-s`).
pub struct TailHandle {
    path: PathBuf,
    offset: u64,
    header: Option<csv::StringRecord>,
    next_row: u64,
    last_heartbeat: Instant,
}

impl TailHandle {
    pub fn open(path: &Path) -> Result<Self, TickSourceError> {
        let mut file = File::open(path).map_err(|e| TickSourceError::Io {
            file: path.display().to_string(),
            source: e,
        })?;
        let mut reader = BufReader::new(&mut file);
        let mut header_line = String::new();
        let header = if reader.read_line(&mut header_line).unwrap_or(0) > 0 {
            let mut rdr = csv::ReaderBuilder::new()
                .has_headers(false)
                .from_reader(header_line.as_bytes());
            rdr.records().next().and_then(|r| r.ok())
        } else {
            None
        };
        let offset = header_line.len() as u64;
        Ok(Self {
            path: path.to_path_buf(),
            offset,
            header,
            next_row: 1,
            last_heartbeat: Instant::now(),
        })
    }

    /// Returns any ticks appended to the file since the last call.
    pub fn poll_new_ticks(&mut self) -> Result<Vec<Tick>, TickSourceError> {
        let Some(header) = self.header.clone() else {
            return Ok(Vec::new());
        };
        let mut file = File::open(&self.path).map_err(|e| TickSourceError::Io {
            file: self.path.display().to_string(),
            source: e,
        })?;
        file.seek(SeekFrom::Start(self.offset))
            .map_err(|e| TickSourceError::Io {
                file: self.path.display().to_string(),
                source: e,
            })?;

        use std::io::Read;
        let mut reader = BufReader::new(file);
        let mut buf = String::new();
        reader
            .read_to_string(&mut buf)
            .map_err(|e| TickSourceError::Io {
                file: self.path.display().to_string(),
                source: e,
            })?;
        if buf.is_empty() {
            return Ok(Vec::new());
        }

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(buf.as_bytes());

        let mut ticks = Vec::new();
        let mut consumed = 0u64;
        for record in csv_reader.records() {
            let record = match record {
                Ok(r) => r,
                Err(_) => break, // partial trailing line; retry next poll
            };
            consumed += 1;
            let file_name = self.path.display().to_string();
            match record.deserialize::<RawRow>(Some(&header)) {
                Ok(row) => match row_to_tick(row, &file_name, self.next_row) {
                    Ok(tick) => ticks.push(tick),
                    Err(e) => warn!(file = %file_name, error = %e, "skipping malformed tail row"),
                },
                Err(e) => warn!(file = %file_name, error = %e, "skipping malformed tail row"),
            }
            self.next_row += 1;
        }
        self.offset += buf.len() as u64;
        let _ = consumed;
        self.last_heartbeat = Instant::now();
        Ok(ticks)
    }

    /// True if `heartbeat_s` has elapsed since the last poll found data (or
    /// since open), resetting the timer.
    pub fn should_heartbeat(&mut self, heartbeat: Duration) -> bool {
        if self.last_heartbeat.elapsed() >= heartbeat {
            self.last_heartbeat = Instant::now();
            true
        } else {
            false
        }
    }
}
