use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};

use crate::adapters::source_files::{LoaderError, MalformedInput, RowError, SkippedFile};
use crate::domain::intensity_table::{IntensityTable, is_hour_aligned};
use crate::domain::models::IntensityBucket;

pub const DATETIME_COLUMN: &str = "Datetime (UTC)";
pub const DIRECT_COLUMN: &str = "Carbon Intensity gCO₂eq/kWh (direct)";
pub const LCA_COLUMN: &str = "Carbon Intensity gCO₂eq/kWh (LCA)";

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone, PartialEq)]
pub struct IntensityFile {
    pub buckets: Vec<IntensityBucket>,
    pub row_errors: Vec<RowError>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntensityBatch {
    pub table: IntensityTable,
    pub row_errors: Vec<RowError>,
    pub skipped_files: Vec<SkippedFile>,
    pub files_read: usize,
    /// Hours present in more than one row; the first row read wins.
    pub duplicate_hours: usize,
}

struct ColumnIndex {
    datetime: usize,
    direct: usize,
    lca: usize,
}

impl ColumnIndex {
    fn locate(headers: &StringRecord) -> Result<Self, MalformedInput> {
        let find = |name: &'static str| {
            let wanted = normalize_header(name);
            headers
                .iter()
                .position(|header| normalize_header(header) == wanted)
                .ok_or(MalformedInput::MissingColumn(name))
        };

        Ok(Self {
            datetime: find(DATETIME_COLUMN)?,
            direct: find(DIRECT_COLUMN)?,
            lca: find(LCA_COLUMN)?,
        })
    }
}

fn normalize_header(name: &str) -> String {
    name.trim()
        .trim_start_matches('\u{feff}')
        .replace('₂', "2")
        .to_lowercase()
}

pub fn read_intensity_file(path: &Path) -> Result<IntensityFile, LoaderError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|error| LoaderError::csv(path, error))?;

    let headers = reader
        .headers()
        .map_err(|error| LoaderError::csv(path, error))?
        .clone();
    let columns =
        ColumnIndex::locate(&headers).map_err(|reason| LoaderError::malformed(path, reason))?;

    let mut buckets = Vec::new();
    let mut row_errors = Vec::new();

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(error) => {
                row_errors.push(RowError {
                    file: path.display().to_string(),
                    line: error.position().map_or(0, |position| position.line()),
                    message: error.to_string(),
                });
                continue;
            }
        };

        let line = record.position().map_or(0, |position| position.line());
        match parse_bucket(&record, &columns) {
            Ok(bucket) => buckets.push(bucket),
            Err(message) => row_errors.push(RowError {
                file: path.display().to_string(),
                line,
                message,
            }),
        }
    }

    Ok(IntensityFile {
        buckets,
        row_errors,
    })
}

fn parse_bucket(record: &StringRecord, columns: &ColumnIndex) -> Result<IntensityBucket, String> {
    let raw_datetime = record.get(columns.datetime).unwrap_or_default();
    let bucket_start = parse_intensity_timestamp(raw_datetime)
        .ok_or_else(|| format!("invalid timestamp in {DATETIME_COLUMN}: {raw_datetime:?}"))?;
    if !is_hour_aligned(bucket_start) {
        return Err(format!("timestamp {bucket_start} is not aligned to the hour"));
    }

    Ok(IntensityBucket {
        bucket_start,
        direct_intensity: parse_intensity(record, columns.direct, DIRECT_COLUMN)?,
        lca_intensity: parse_intensity(record, columns.lca, LCA_COLUMN)?,
    })
}

fn parse_intensity(record: &StringRecord, index: usize, column: &str) -> Result<f64, String> {
    let raw = record.get(index).unwrap_or_default();
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(format!("invalid intensity in {column}: {raw:?}")),
    }
}

pub fn parse_intensity_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.naive_utc());
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
}

/// Reads and merges every intensity file into one table. Unreadable files are
/// skipped; repeated hours keep the first row read.
pub fn load_intensity_files(paths: &[PathBuf]) -> Result<IntensityBatch, LoaderError> {
    let mut buckets = Vec::new();
    let mut batch = IntensityBatch::default();

    for path in paths {
        tracing::info!(file = %path.display(), "processing intensity file");

        match read_intensity_file(path) {
            Ok(file) => {
                tracing::info!(
                    file = %path.display(),
                    buckets = file.buckets.len(),
                    row_errors = file.row_errors.len(),
                    "intensity file loaded"
                );
                batch.files_read += 1;
                buckets.extend(file.buckets);
                batch.row_errors.extend(file.row_errors);
            }
            Err(error) => {
                tracing::warn!(file = %path.display(), error = %error, "intensity file skipped");
                batch.skipped_files.push(SkippedFile {
                    file: path.display().to_string(),
                    reason: error.to_string(),
                });
            }
        }
    }

    buckets.sort_by_key(|bucket| bucket.bucket_start);
    let before = buckets.len();
    buckets.dedup_by_key(|bucket| bucket.bucket_start);
    batch.duplicate_hours = before - buckets.len();
    if batch.duplicate_hours > 0 {
        tracing::warn!(
            duplicate_hours = batch.duplicate_hours,
            "duplicate intensity hours dropped"
        );
    }

    batch.table = IntensityTable::from_buckets(buckets)?;
    Ok(batch)
}
