//! Bar loading from exported CSV files.
//!
//! Accepts the common terminal export layout: a header row with `time`,
//! `open`, `high`, `low`, `close` and optionally `tick_volume` or `volume`,
//! separated by commas or tabs. Cleaning policy:
//! 1. Rows whose time does not parse are dropped
//! 2. Rows are sorted by time; for duplicate timestamps the first row wins
//! 3. Missing, non-finite and `f64::MAX` sentinel prices are forward filled,
//!    then back filled
//! 4. Rows still inconsistent after repair (e.g. close above high) are dropped

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};
use tradeloop_core::domain::{Bar, BarError, PriceSeries};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {source_name}: {source}")]
    Csv {
        source_name: String,
        #[source]
        source: csv::Error,
    },

    #[error("{source_name}: missing required column '{column}'")]
    MissingColumn {
        source_name: String,
        column: &'static str,
    },

    #[error("{source_name}: column '{column}' has no usable value")]
    EmptyColumn {
        source_name: String,
        column: &'static str,
    },

    #[error("{source_name}: no rows with a parsable time")]
    NoRows { source_name: String },

    #[error("{source_name}: {source}")]
    Bar {
        source_name: String,
        #[source]
        source: BarError,
    },
}

/// Time layouts accepted in the `time` column, tried in order.
const TIME_FORMATS: &[&str] = &[
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

const PRICE_COLUMNS: [&str; 4] = ["open", "high", "low", "close"];

/// What the cleaning pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows_read: usize,
    pub unparsable_time: usize,
    pub duplicates: usize,
    pub repaired_values: usize,
    pub inconsistent: usize,
}

impl LoadStats {
    /// True when no row was dropped or repaired.
    pub fn is_clean(&self) -> bool {
        self.unparsable_time + self.duplicates + self.repaired_values + self.inconsistent == 0
    }
}

/// A cleaned series plus the record of what was cleaned.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub series: PriceSeries,
    pub stats: LoadStats,
}

/// Load and clean the bar file at `path` for `symbol`.
pub fn load_price_series(path: &Path, symbol: &str) -> Result<LoadedSeries, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = parse_price_series(&content, symbol, &path.display().to_string())?;
    debug!(
        symbol,
        path = %path.display(),
        bars = loaded.series.len(),
        "loaded price series"
    );
    Ok(loaded)
}

/// Parse CSV text into a cleaned series. `source_name` labels errors.
pub fn parse_price_series(
    content: &str,
    symbol: &str,
    source_name: &str,
) -> Result<LoadedSeries, LoadError> {
    let csv_err = |source| LoadError::Csv {
        source_name: source_name.to_string(),
        source,
    };

    let delimiter = detect_delimiter(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers().map_err(csv_err)?.clone();
    let column = |names: &[&str]| {
        headers.iter().position(|h| {
            let h = h.trim_start_matches('<').trim_end_matches('>');
            names.iter().any(|n| h.eq_ignore_ascii_case(n))
        })
    };
    let missing = |name: &'static str| LoadError::MissingColumn {
        source_name: source_name.to_string(),
        column: name,
    };

    let time_idx = column(&["time", "timestamp"]).ok_or_else(|| missing("time"))?;
    let mut price_idx = [0usize; 4];
    for (slot, name) in price_idx.iter_mut().zip(PRICE_COLUMNS) {
        *slot = column(&[name]).ok_or_else(|| missing(name))?;
    }
    let volume_idx = column(&["tick_volume"]).or_else(|| column(&["volume"]));

    let mut stats = LoadStats::default();
    let mut rows: Vec<RawRow> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        stats.rows_read += 1;
        let Some(timestamp) = record.get(time_idx).and_then(parse_time) else {
            stats.unparsable_time += 1;
            continue;
        };
        let prices = price_idx.map(|i| record.get(i).and_then(parse_price));
        let volume = match volume_idx {
            Some(i) => record.get(i).and_then(parse_price),
            None => Some(0.0),
        };
        rows.push(RawRow {
            timestamp,
            values: [prices[0], prices[1], prices[2], prices[3], volume],
        });
    }
    if rows.is_empty() {
        return Err(LoadError::NoRows {
            source_name: source_name.to_string(),
        });
    }

    rows.sort_by_key(|r| r.timestamp);
    let before = rows.len();
    rows.dedup_by_key(|r| r.timestamp);
    stats.duplicates = before - rows.len();

    for col in 0..5 {
        let name = PRICE_COLUMNS.get(col).copied().unwrap_or("volume");
        let repaired = fill_column(&mut rows, col).ok_or_else(|| LoadError::EmptyColumn {
            source_name: source_name.to_string(),
            column: name,
        })?;
        stats.repaired_values += repaired;
    }

    let mut bars = Vec::with_capacity(rows.len());
    for row in rows {
        // Every slot is Some after fill_column.
        let [Some(open), Some(high), Some(low), Some(close), Some(volume)] = row.values else {
            continue;
        };
        let bar = Bar {
            symbol: symbol.to_string(),
            timestamp: row.timestamp,
            open,
            high,
            low,
            close,
            volume,
        };
        if bar.is_sane() {
            bars.push(bar);
        } else {
            stats.inconsistent += 1;
        }
    }

    if !stats.is_clean() {
        warn!(
            symbol,
            source = source_name,
            unparsable_time = stats.unparsable_time,
            duplicates = stats.duplicates,
            repaired = stats.repaired_values,
            inconsistent = stats.inconsistent,
            "bar data cleaned"
        );
    }

    let series = PriceSeries::new(symbol, bars).map_err(|source| LoadError::Bar {
        source_name: source_name.to_string(),
        source,
    })?;
    Ok(LoadedSeries { series, stats })
}

struct RawRow {
    timestamp: DateTime<Utc>,
    /// open, high, low, close, volume
    values: [Option<f64>; 5],
}

/// Comma unless the header row has no comma and does have a tab.
fn detect_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or_default();
    if !header.contains(',') && header.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

/// Finite value, or None for blanks, garbage, infinities and the `f64::MAX` sentinel.
fn parse_price(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.abs() != f64::MAX)
}

/// Forward fill then back fill one column. Returns the number of repaired
/// cells, or None if the column has no value at all.
fn fill_column(rows: &mut [RawRow], col: usize) -> Option<usize> {
    let first = rows.iter().find_map(|r| r.values[col])?;
    let mut repaired = 0;
    let mut last = first;
    for row in rows.iter_mut() {
        match row.values[col] {
            Some(v) => last = v,
            None => {
                row.values[col] = Some(last);
                repaired += 1;
            }
        }
    }
    Some(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const CLEAN: &str = "\
time,open,high,low,close,tick_volume
2024.01.02 09:00:00,100.0,101.0,99.5,100.5,120
2024.01.02 09:01:00,100.5,102.0,100.0,101.5,80
2024.01.02 09:02:00,101.5,101.8,100.9,101.0,95
";

    #[test]
    fn parses_comma_separated() {
        let loaded = parse_price_series(CLEAN, "XAUUSD", "test").unwrap();
        let bars = loaded.series.bars();
        assert_eq!(bars.len(), 3);
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap()
        );
        assert_eq!(bars[1].volume, 80.0);
        assert_eq!(loaded.stats.rows_read, 3);
        assert!(loaded.stats.is_clean());
    }

    #[test]
    fn parses_tab_separated_iso_times() {
        let text = "time\topen\thigh\tlow\tclose\n\
                    2024-01-02 09:00:00\t1.1\t1.2\t1.0\t1.15\n\
                    2024-01-02 09:01:00\t1.15\t1.25\t1.1\t1.2\n";
        let loaded = parse_price_series(text, "EURUSD", "test").unwrap();
        assert_eq!(loaded.series.len(), 2);
        assert_eq!(loaded.series.bars()[0].volume, 0.0);
    }

    #[test]
    fn drops_bad_times_sorts_and_dedupes() {
        let text = "\
time,open,high,low,close,volume
2024.01.02 09:02:00,3,3,3,3,1
not a time,9,9,9,9,1
2024.01.02 09:00:00,1,1,1,1,1
2024.01.02 09:00:00,7,7,7,7,1
2024.01.02 09:01:00,2,2,2,2,1
";
        let loaded = parse_price_series(text, "X", "test").unwrap();
        let closes: Vec<f64> = loaded.series.bars().iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);
        assert_eq!(loaded.stats.unparsable_time, 1);
        assert_eq!(loaded.stats.duplicates, 1);
    }

    #[test]
    fn repairs_sentinels_forward_then_back() {
        let text = "\
time,open,high,low,close
2024.01.02 09:00:00,inf,10,10,10
2024.01.02 09:01:00,10,10,10,1.7976931348623157e+308
2024.01.02 09:02:00,10,10,10,
";
        let loaded = parse_price_series(text, "X", "test").unwrap();
        let bars = loaded.series.bars();
        assert_eq!(bars[0].open, 10.0); // back filled
        assert_eq!(bars[1].close, 10.0); // forward filled
        assert_eq!(bars[2].close, 10.0);
        assert_eq!(loaded.stats.repaired_values, 3);
    }

    #[test]
    fn missing_column_is_an_error() {
        let text = "time,open,high,close\n2024.01.02 09:00:00,1,1,1\n";
        let err = parse_price_series(text, "X", "test").unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { column: "low", .. }));
    }

    #[test]
    fn empty_column_is_an_error() {
        let text = "time,open,high,low,close\n2024.01.02 09:00:00,1,1,1,nan\n";
        let err = parse_price_series(text, "X", "test").unwrap_err();
        assert!(matches!(err, LoadError::EmptyColumn { column: "close", .. }));
    }

    #[test]
    fn inconsistent_rows_are_dropped() {
        let text = "\
time,open,high,low,close
2024.01.02 09:00:00,1,2,0.5,1.5
2024.01.02 09:01:00,1,2,0.5,3.0
";
        let loaded = parse_price_series(text, "X", "test").unwrap();
        assert_eq!(loaded.series.len(), 1);
        assert_eq!(loaded.stats.inconsistent, 1);
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("XAUUSD.csv");
        std::fs::write(&path, CLEAN).unwrap();
        let loaded = load_price_series(&path, "XAUUSD").unwrap();
        assert_eq!(loaded.series.symbol(), "XAUUSD");
        assert_eq!(loaded.series.len(), 3);

        let err = load_price_series(&dir.path().join("missing.csv"), "XAUUSD").unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
