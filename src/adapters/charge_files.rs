use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::{ByteRecord, ReaderBuilder, StringRecord, Trim};

use crate::adapters::source_files::{LoaderError, MalformedInput, RowError, SkippedFile};
use crate::domain::charge_export::{
    EXPORT_COLUMNS, NormalizeOptions, NormalizeWarning, ROWS_BEFORE_DISCLAIMER, RawChargeRow,
    is_disclaimer_cell, normalize_charge_row,
};
use crate::domain::models::ChargeSession;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeLoadOptions {
    /// Preamble lines above the header row.
    pub skip_rows: usize,
    pub delimiter: u8,
    pub normalize: NormalizeOptions,
}

impl Default for ChargeLoadOptions {
    fn default() -> Self {
        Self {
            skip_rows: 6,
            delimiter: b',',
            normalize: NormalizeOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeExport {
    pub sessions: Vec<ChargeSession>,
    pub row_errors: Vec<RowError>,
    pub disclaimer_found: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChargeBatch {
    pub sessions: Vec<ChargeSession>,
    pub row_errors: Vec<RowError>,
    pub skipped_files: Vec<SkippedFile>,
    pub files_read: usize,
}

pub fn read_charge_export(
    path: &Path,
    options: &ChargeLoadOptions,
) -> Result<ChargeExport, LoaderError> {
    let file = File::open(path).map_err(|error| LoaderError::io(path, error))?;
    let mut reader = BufReader::new(file);
    let mut preamble = String::new();
    for _ in 0..options.skip_rows {
        preamble.clear();
        let read = reader
            .read_line(&mut preamble)
            .map_err(|error| LoaderError::io(path, error))?;
        if read == 0 {
            break;
        }
    }

    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(options.delimiter)
        .from_reader(reader);

    let mut records = csv_reader.byte_records();
    let header = records
        .next()
        .ok_or_else(|| LoaderError::malformed(path, MalformedInput::MissingHeader))?
        .map_err(|error| LoaderError::csv(path, error))?;
    if header.len() != EXPORT_COLUMNS.len() {
        return Err(LoaderError::malformed(
            path,
            MalformedInput::ColumnCount {
                expected: EXPORT_COLUMNS.len(),
                found: header.len(),
            },
        ));
    }

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    for result in records {
        match result {
            Ok(record) => rows.push(decode_record(record)),
            Err(error) => row_errors.push(RowError {
                file: path.display().to_string(),
                line: error
                    .position()
                    .map_or(0, |position| position.line())
                    .saturating_add(options.skip_rows as u64),
                message: error.to_string(),
            }),
        }
    }

    let disclaimer_at = rows
        .iter()
        .position(|row| row.iter().any(is_disclaimer_cell));
    let kept = match disclaimer_at {
        Some(index) => &rows[..index.saturating_sub(ROWS_BEFORE_DISCLAIMER)],
        None => {
            tracing::warn!(
                file = %path.display(),
                "no disclaimer row found in charge export, keeping all rows"
            );
            &rows[..]
        }
    };

    let column_names = StringRecord::from(EXPORT_COLUMNS.to_vec());
    let mut sessions = Vec::new();

    for row in kept {
        if row.get(0).is_none_or(|cell| cell.is_empty()) {
            continue;
        }

        let line = row
            .position()
            .map_or(0, |position| position.line())
            .saturating_add(options.skip_rows as u64);
        let row_error = |message: String| RowError {
            file: path.display().to_string(),
            line,
            message,
        };

        let raw: RawChargeRow = match row.deserialize(Some(&column_names)) {
            Ok(raw) => raw,
            Err(error) => {
                row_errors.push(row_error(error.to_string()));
                continue;
            }
        };

        match normalize_charge_row(&raw, &options.normalize) {
            Ok(normalized) => {
                for warning in &normalized.warnings {
                    match warning {
                        NormalizeWarning::ReversedTimesCorrected { start, end } => {
                            tracing::warn!(
                                file = %path.display(),
                                line,
                                start = %start,
                                end = %end,
                                "reversed charge start/end corrected"
                            );
                        }
                    }
                }
                sessions.push(normalized.session);
            }
            Err(error) => row_errors.push(row_error(error.to_string())),
        }
    }

    Ok(ChargeExport {
        sessions,
        row_errors,
        disclaimer_found: disclaimer_at.is_some(),
    })
}

/// Spreadsheet exports are not always UTF-8; cells that are not are read as
/// Latin-1.
fn decode_record(record: ByteRecord) -> StringRecord {
    let position = record.position().cloned();
    StringRecord::from_byte_record(record).unwrap_or_else(|error| {
        let mut decoded: StringRecord = error
            .into_byte_record()
            .iter()
            .map(|field| match std::str::from_utf8(field) {
                Ok(text) => text.to_string(),
                Err(_) => field.iter().copied().map(char::from).collect(),
            })
            .collect();
        decoded.set_position(position);
        decoded
    })
}

/// Reads every export, skipping files that cannot be read instead of failing
/// the batch.
pub fn load_charge_exports(paths: &[PathBuf], options: &ChargeLoadOptions) -> ChargeBatch {
    let mut batch = ChargeBatch::default();

    for path in paths {
        tracing::info!(file = %path.display(), "processing charge export");

        match read_charge_export(path, options) {
            Ok(export) => {
                tracing::info!(
                    file = %path.display(),
                    sessions = export.sessions.len(),
                    row_errors = export.row_errors.len(),
                    "charge export loaded"
                );
                batch.files_read += 1;
                batch.sessions.extend(export.sessions);
                batch.row_errors.extend(export.row_errors);
            }
            Err(error) => {
                tracing::warn!(file = %path.display(), error = %error, "charge export skipped");
                batch.skipped_files.push(SkippedFile {
                    file: path.display().to_string(),
                    reason: error.to_string(),
                });
            }
        }
    }

    batch
}
