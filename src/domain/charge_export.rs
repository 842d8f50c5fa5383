use chrono::{NaiveDateTime, TimeDelta};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::models::{ChargeSession, SessionDetails};

/// Column names assigned, in order, to the monthly export's header row.
pub const EXPORT_COLUMNS: [&str; 13] = [
    "charge_start_time",
    "km_mileage",
    "initial_soc",
    "charge_end_time",
    "final_soc",
    "local",
    "address",
    "charge_costs",
    "kwh",
    "electricity_price1",
    "electricity_price2",
    "charge_duration_min",
    "ac_at_startup",
];

const DISCLAIMER_MARKERS: &[&str] = &["*", "mobile20chsDisclaimer"];

/// Summary lines the export places between the last charge and the disclaimer.
pub const ROWS_BEFORE_DISCLAIMER: usize = 3;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid timestamp in {field}: {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("invalid number in {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("invalid charge duration: {0:?}")]
    InvalidDuration(String),
    #[error("time offset moves {0} out of the supported range")]
    OffsetOutOfRange(NaiveDateTime),
}

/// One data row of a charge export, addressed by the renamed columns.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawChargeRow {
    pub charge_start_time: String,
    pub km_mileage: String,
    pub initial_soc: String,
    pub charge_end_time: String,
    pub final_soc: String,
    pub local: String,
    pub address: String,
    pub charge_costs: String,
    pub kwh: String,
    pub electricity_price1: String,
    pub electricity_price2: String,
    pub charge_duration_min: String,
    pub ac_at_startup: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeOptions {
    /// Drop the charging address from the session details.
    pub anonymize: bool,
    /// Added to both session timestamps to line them up with the intensity clock.
    pub time_offset: TimeDelta,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            anonymize: true,
            time_offset: TimeDelta::zero(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeWarning {
    ReversedTimesCorrected {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCharge {
    pub session: ChargeSession,
    pub warnings: Vec<NormalizeWarning>,
}

pub fn normalize_charge_row(
    raw: &RawChargeRow,
    options: &NormalizeOptions,
) -> Result<NormalizedCharge, ParseError> {
    let mut start = parse_export_timestamp("charge_start_time", &raw.charge_start_time)?;
    let mut end = parse_export_timestamp("charge_end_time", &raw.charge_end_time)?;
    let mut warnings = Vec::new();

    if end < start {
        std::mem::swap(&mut start, &mut end);
        warnings.push(NormalizeWarning::ReversedTimesCorrected { start, end });
    }

    let details = SessionDetails {
        mileage_km: parse_mileage_km(&raw.km_mileage)?,
        initial_soc: raw.initial_soc.trim().to_string(),
        final_soc: raw.final_soc.trim().to_string(),
        address: if options.anonymize {
            None
        } else {
            optional_text(&raw.address)
        },
        charge_costs: optional_text(&raw.charge_costs),
        electricity_price1: optional_text(&raw.electricity_price1),
        electricity_price2: optional_text(&raw.electricity_price2),
        ac_at_startup: optional_text(&raw.ac_at_startup),
    };

    let shift = |timestamp: NaiveDateTime| {
        timestamp
            .checked_add_signed(options.time_offset)
            .ok_or(ParseError::OffsetOutOfRange(timestamp))
    };

    let session = ChargeSession::new(
        shift(start)?,
        shift(end)?,
        parse_energy_kwh(&raw.kwh)?,
        parse_duration_minutes(&raw.charge_duration_min)?,
    )
    .with_details(details);

    Ok(NormalizedCharge { session, warnings })
}

pub fn parse_export_timestamp(field: &'static str, value: &str) -> Result<NaiveDateTime, ParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ParseError::MissingField(field));
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| ParseError::InvalidTimestamp {
            field,
            value: trimmed.to_string(),
        })
}

/// Keeps every digit, so thousands separators and units are ignored:
/// `"12.345 km"` is 12345.
pub fn parse_mileage_km(value: &str) -> Result<u32, ParseError> {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    digits.parse().map_err(|_| ParseError::InvalidNumber {
        field: "km_mileage",
        value: value.trim().to_string(),
    })
}

/// First number in the cell, accepting `,` or `.` as decimal separator.
pub fn parse_energy_kwh(value: &str) -> Result<f64, ParseError> {
    let invalid = || ParseError::InvalidNumber {
        field: "kwh",
        value: value.trim().to_string(),
    };

    let start = value.find(|c: char| c.is_ascii_digit()).ok_or_else(invalid)?;
    let number: String = value[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    number
        .trim_end_matches('.')
        .parse()
        .map_err(|_| invalid())
}

/// Reads durations such as `"1h 30min"`, `"2h"` or `"45min"`. A bare number
/// is taken as minutes and an empty cell as zero.
pub fn parse_duration_minutes(value: &str) -> Result<u32, ParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    if let Ok(minutes) = trimmed.parse::<u32>() {
        return Ok(minutes);
    }

    let invalid = || ParseError::InvalidDuration(trimmed.to_string());
    let mut total = 0_u32;
    let mut matched_unit = false;
    let mut rest = trimmed;

    while let Some(digit_start) = rest.find(|c: char| c.is_ascii_digit()) {
        rest = &rest[digit_start..];
        let digit_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let amount: u32 = rest[..digit_end].parse().map_err(|_| invalid())?;
        rest = rest[digit_end..].trim_start();

        let multiplier = if rest.starts_with("min") || rest.starts_with('m') {
            1
        } else if rest.starts_with('h') {
            60
        } else {
            return Err(invalid());
        };
        matched_unit = true;
        total = amount
            .checked_mul(multiplier)
            .and_then(|minutes| total.checked_add(minutes))
            .ok_or_else(invalid)?;
    }

    if matched_unit { Ok(total) } else { Err(invalid()) }
}

pub fn is_disclaimer_cell(value: &str) -> bool {
    let trimmed = value.trim_start();
    DISCLAIMER_MARKERS
        .iter()
        .any(|marker| trimmed.starts_with(marker))
}

pub fn has_digit(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_digit())
}

fn optional_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
