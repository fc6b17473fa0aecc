//! Price loading for the runner.
//!
//! The core never fetches data; these adapters stand in for the data
//! collaborator:
//! 1. CSV file with a `date,open,high,low,close,volume` header
//! 2. Deterministic synthetic random walk (seeded from the symbol name)
//!
//! Both go through `PriceSeries::new`, so ordering and value checks apply.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, Weekday};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use thiserror::Error;

use stratlab_core::domain::{PriceBar, PriceSeries};
use stratlab_core::CoreError;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV row {row}: {source}")]
    Csv {
        row: u64,
        #[source]
        source: csv::Error,
    },

    #[error("no bars left in {0} after date filtering")]
    Empty(String),

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

/// Inclusive date window; `None` leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Date")]
    date: NaiveDate,
    #[serde(alias = "Open")]
    open: f64,
    #[serde(alias = "High")]
    high: f64,
    #[serde(alias = "Low")]
    low: f64,
    #[serde(alias = "Close")]
    close: f64,
    #[serde(alias = "Volume", default)]
    volume: f64,
}

/// Load and validate a CSV price file.
pub fn load_csv(path: &Path, range: DateRange) -> Result<PriceSeries, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let series = read_csv(file, range, &path.display().to_string())?;
    debug!("loaded {} bars from {}", series.len(), path.display());
    Ok(series)
}

/// Parse CSV price rows from any reader. `source_name` is used in errors.
pub fn read_csv<R: Read>(
    reader: R,
    range: DateRange,
    source_name: &str,
) -> Result<PriceSeries, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    for (i, record) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = record.map_err(|source| LoadError::Csv {
            row: i as u64 + 1,
            source,
        })?;
        if !range.contains(row.date) {
            continue;
        }
        bars.push(PriceBar {
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    if bars.is_empty() {
        return Err(LoadError::Empty(source_name.to_string()));
    }
    Ok(PriceSeries::new(bars)?)
}

/// Generate `bars` weekday bars of synthetic data starting at `start`.
///
/// Random walk from 100.0 with daily moves in ±3%, seeded from the symbol
/// name so the same symbol always yields the same series.
pub fn synthetic_series(symbol: &str, start: NaiveDate, bars: usize) -> Result<PriceSeries, LoadError> {
    warn!("generating synthetic data for {symbol}; results are not market data");
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut out = Vec::with_capacity(bars);
    let mut price = 100.0_f64;
    let mut current = start;

    while out.len() < bars {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64) as f64;

        out.push(PriceBar {
            date: current,
            open,
            high,
            low,
            close,
            volume,
        });

        price = close;
        current += chrono::Duration::days(1);
    }

    Ok(PriceSeries::new(out)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
date,open,high,low,close,volume
2024-01-02,100.0,102.0,99.0,101.0,1000
2024-01-03,101.0,103.0,100.0,102.0,1100
2024-01-04,102.0,102.5,98.0,99.0,1500
";

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn reads_all_rows() {
        let s = read_csv(CSV.as_bytes(), DateRange::default(), "mem").unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.bars()[2].close, 99.0);
        assert_eq!(s.first_date(), Some(d(2)));
    }

    #[test]
    fn filters_by_range() {
        let range = DateRange {
            start: Some(d(3)),
            end: None,
        };
        let s = read_csv(CSV.as_bytes(), range, "mem").unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.first_date(), Some(d(3)));
    }

    #[test]
    fn capitalized_headers_are_accepted() {
        let csv = "Date,Open,High,Low,Close,Volume\n2024-01-02,1,2,0.5,1.5,10\n";
        assert_eq!(read_csv(csv.as_bytes(), DateRange::default(), "mem").unwrap().len(), 1);
    }

    #[test]
    fn out_of_order_rows_are_rejected() {
        let csv = "date,open,high,low,close,volume\n2024-01-03,1,1,1,1,1\n2024-01-02,1,1,1,1,1\n";
        let err = read_csv(csv.as_bytes(), DateRange::default(), "mem").unwrap_err();
        assert!(matches!(err, LoadError::Invalid(CoreError::DataOrdering { index: 1, .. })));
    }

    #[test]
    fn bad_number_reports_row() {
        let csv = "date,open,high,low,close,volume\n2024-01-02,1,1,1,abc,1\n";
        let err = read_csv(csv.as_bytes(), DateRange::default(), "mem").unwrap_err();
        assert!(matches!(err, LoadError::Csv { row: 1, .. }));
    }

    #[test]
    fn empty_after_filter_is_an_error() {
        let range = DateRange {
            start: Some(d(20)),
            end: None,
        };
        assert!(matches!(
            read_csv(CSV.as_bytes(), range, "mem"),
            Err(LoadError::Empty(_))
        ));
    }

    #[test]
    fn synthetic_is_deterministic_per_symbol() {
        let a = synthetic_series("SPY", d(1), 50).unwrap();
        let b = synthetic_series("SPY", d(1), 50).unwrap();
        let c = synthetic_series("QQQ", d(1), 50).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 50);
        assert!(a
            .bars()
            .iter()
            .all(|bar| !matches!(bar.date.weekday(), Weekday::Sat | Weekday::Sun)));
    }
}
