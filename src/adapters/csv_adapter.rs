//! CSV ingestion for candle and tick series.
//!
//! Two candle row shapes are accepted, detected per row: epoch rows
//! `time,open,high,low,close[,volume]` and MetaTrader history rows
//! `YYYY.MM.DD,HH:MM,open,high,low,close[,volume]`. Tick rows are
//! `time,bid[,ask]` with the ask defaulting to the bid. A header line
//! is optional, blank lines are skipped, and any malformed row aborts
//! the load with its 1-based line number.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt::Display;
use std::str::FromStr;

use crate::domain::error::MqlError;
use crate::domain::market::{Candle, Tick};
use crate::ports::data_port::DataPort;

#[derive(Debug, Default)]
pub struct CsvAdapter;

impl CsvAdapter {
    pub fn new() -> Self {
        CsvAdapter
    }
}

impl DataPort for CsvAdapter {
    fn load_candles(&self, path: &str) -> Result<Vec<Candle>, MqlError> {
        parse_candles(&read(path)?)
    }

    fn load_ticks(&self, path: &str) -> Result<Vec<Tick>, MqlError> {
        parse_ticks(&read(path)?)
    }
}

fn read(path: &str) -> Result<String, MqlError> {
    std::fs::read_to_string(path)
        .map_err(|e| MqlError::Io(std::io::Error::new(e.kind(), format!("{path}: {e}"))))
}

pub fn parse_candles(content: &str) -> Result<Vec<Candle>, MqlError> {
    let mut candles = Vec::new();
    for_each_row(content, |record, line| {
        candles.push(parse_candle_row(record, line)?);
        Ok(())
    })?;
    Ok(candles)
}

pub fn parse_ticks(content: &str) -> Result<Vec<Tick>, MqlError> {
    let mut ticks = Vec::new();
    for_each_row(content, |record, line| {
        let time = number(record, 0, "time", line)?;
        let bid = number(record, 1, "bid", line)?;
        let ask = match populated(record, 2) {
            Some(raw) => parse_raw(raw, "ask", line)?,
            None => bid,
        };
        ticks.push(Tick { time, bid, ask });
        Ok(())
    })?;
    Ok(ticks)
}

/// Walk data rows, skipping blanks and a leading header line.
fn for_each_row(
    content: &str,
    mut row: impl FnMut(&csv::StringRecord, usize) -> Result<(), MqlError>,
) -> Result<(), MqlError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut first = true;
    for record in reader.records() {
        let record = record.map_err(|e| MqlError::Csv {
            line: e.position().map_or(0, |p| p.line() as usize),
            reason: e.to_string(),
        })?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if first {
            first = false;
            if looks_like_header(&record) {
                continue;
            }
        }
        row(&record, line)?;
    }
    Ok(())
}

/// A first row whose leading field is neither an epoch number nor a
/// MetaTrader date is taken as column names.
fn looks_like_header(record: &csv::StringRecord) -> bool {
    let Some(lead) = record.get(0).map(str::trim) else {
        return false;
    };
    lead.parse::<i64>().is_err() && NaiveDate::parse_from_str(lead, "%Y.%m.%d").is_err()
}

fn parse_candle_row(record: &csv::StringRecord, line: usize) -> Result<Candle, MqlError> {
    // a time-of-day in the second column marks the MetaTrader shape
    let metatrader = record.get(1).is_some_and(|f| f.contains(':'));
    let (time, base) = if metatrader {
        (metatrader_timestamp(record, line)?, 2)
    } else {
        (number(record, 0, "time", line)?, 1)
    };
    Ok(Candle {
        time,
        open: number(record, base, "open", line)?,
        high: number(record, base + 1, "high", line)?,
        low: number(record, base + 2, "low", line)?,
        close: number(record, base + 3, "close", line)?,
        volume: match populated(record, base + 4) {
            Some(raw) => parse_raw(raw, "volume", line)?,
            None => 0,
        },
    })
}

fn metatrader_timestamp(record: &csv::StringRecord, line: usize) -> Result<i64, MqlError> {
    let date_raw = field(record, 0, "date", line)?;
    let date = NaiveDate::parse_from_str(date_raw, "%Y.%m.%d").map_err(|e| MqlError::Csv {
        line,
        reason: format!("invalid date '{date_raw}': {e}"),
    })?;
    let time_raw = field(record, 1, "time", line)?;
    let tod = NaiveTime::parse_from_str(time_raw, "%H:%M").map_err(|e| MqlError::Csv {
        line,
        reason: format!("invalid time '{time_raw}': {e}"),
    })?;
    Ok(NaiveDateTime::new(date, tod).and_utc().timestamp())
}

fn populated<'a>(record: &'a csv::StringRecord, index: usize) -> Option<&'a str> {
    record.get(index).map(str::trim).filter(|f| !f.is_empty())
}

fn field<'a>(
    record: &'a csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<&'a str, MqlError> {
    populated(record, index).ok_or_else(|| MqlError::Csv {
        line,
        reason: format!("missing {name} column"),
    })
}

fn number<T>(record: &csv::StringRecord, index: usize, name: &str, line: usize) -> Result<T, MqlError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_raw(field(record, index, name, line)?, name, line)
}

fn parse_raw<T>(raw: &str, name: &str, line: usize) -> Result<T, MqlError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse().map_err(|e| MqlError::Csv {
        line,
        reason: format!("invalid {name} value '{raw}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn epoch_rows_parse_with_or_without_a_header() {
        let with_header = "time,open,high,low,close,volume\n\
            3600,1.0,1.2,0.9,1.1,40\n\
            7200,1.1,1.3,1.0,1.2,40\n";
        let bare = "3600,1.0,1.2,0.9,1.1,40\n7200,1.1,1.3,1.0,1.2,40\n";

        let a = parse_candles(with_header).unwrap();
        let b = parse_candles(bare).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].time, 3600);
        assert_eq!(a[0].high, 1.2);
        assert_eq!(a[1].volume, 40);
    }

    #[test]
    fn metatrader_rows_parse_the_two_part_timestamp() {
        let content = "2024.01.15,10:30,1.0,1.2,0.9,1.1,40\n";
        let candles = parse_candles(content).unwrap();
        assert_eq!(candles.len(), 1);
        // 2024-01-15 10:30 UTC
        assert_eq!(candles[0].time, 1_705_314_600);
        assert_eq!(candles[0].close, 1.1);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let content = "3600,1.0,1.2,0.9,1.1\n\n7200,1.1,1.3,1.0,1.2\n\n";
        let candles = parse_candles(content).unwrap();
        assert_eq!(candles.len(), 2);
    }

    #[test]
    fn the_volume_column_is_optional() {
        let candles = parse_candles("3600,1.0,1.2,0.9,1.1\n").unwrap();
        assert_eq!(candles[0].volume, 0);
    }

    #[test]
    fn a_malformed_row_names_its_line() {
        let content = "time,open,high,low,close\n\
            3600,1.0,1.2,0.9,1.1\n\
            7200,oops,1.3,1.0,1.2\n";
        match parse_candles(content) {
            Err(MqlError::Csv { line, reason }) => {
                assert_eq!(line, 3);
                assert!(reason.contains("open"), "got: {reason}");
            }
            other => panic!("expected a csv error, got {other:?}"),
        }
    }

    #[test]
    fn a_short_row_is_rejected() {
        match parse_candles("3600,1.0,1.2\n") {
            Err(MqlError::Csv { line, reason }) => {
                assert_eq!(line, 1);
                assert!(reason.contains("missing low"), "got: {reason}");
            }
            other => panic!("expected a csv error, got {other:?}"),
        }
    }

    #[test]
    fn ticks_default_the_ask_to_the_bid() {
        let ticks = parse_ticks("time,bid,ask\n10,1.5,1.52\n20,1.6\n").unwrap();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].ask, 1.52);
        assert_eq!(ticks[1].ask, 1.6);
    }

    #[test]
    fn load_candles_reads_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("EURUSD60.csv");
        std::fs::write(&path, "3600,1.0,1.2,0.9,1.1,40\n").unwrap();

        let adapter = CsvAdapter::new();
        let candles = adapter.load_candles(path.to_str().unwrap()).unwrap();
        assert_eq!(candles.len(), 1);

        let missing = adapter.load_candles(dir.path().join("nope.csv").to_str().unwrap());
        match missing {
            Err(MqlError::Io(e)) => assert!(e.to_string().contains("nope.csv")),
            other => panic!("expected an io error, got {other:?}"),
        }
    }
}
