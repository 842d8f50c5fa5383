use std::path::PathBuf;

use chrono::TimeDelta;

use crate::adapters::charge_files::ChargeLoadOptions;
use crate::app::AppError;
use crate::domain::charge_export::NormalizeOptions;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub charges_dir: PathBuf,
    pub intensity_dir: PathBuf,
    pub output_path: PathBuf,
    pub summary_path: Option<PathBuf>,
    pub report_year: Option<i32>,
    pub anonymize: bool,
    pub charges_skip_rows: usize,
    pub charges_delimiter: u8,
    pub charge_time_offset: TimeDelta,
    pub worker_threads: usize,
}

impl AppConfig {
    /// Reads the process environment after loading a `.env` file if present.
    pub fn from_env() -> Result<Self, AppError> {
        if let Err(error) = dotenvy::dotenv()
            && !error.not_found()
        {
            return Err(AppError::config(error));
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            charges_dir: path_or_default(&lookup, "CHARGES_DIR", "./data/EV_charges"),
            intensity_dir: path_or_default(&lookup, "INTENSITY_DIR", "./data/CO2_data"),
            output_path: path_or_default(&lookup, "OUTPUT_PATH", "./data/charges_emissions.csv"),
            summary_path: non_empty(&lookup, "SUMMARY_PATH").map(PathBuf::from),
            report_year: parse_optional(&lookup, "REPORT_YEAR")?,
            anonymize: parse_bool_or_default(&lookup, "ANONYMIZE", true)?,
            charges_skip_rows: parse_or_default(&lookup, "CHARGES_SKIP_ROWS", 6_usize)?,
            charges_delimiter: parse_delimiter(&lookup, "CHARGES_DELIMITER", b',')?,
            charge_time_offset: parse_offset_minutes(&lookup, "CHARGE_TIME_OFFSET_MINUTES")?,
            worker_threads: parse_or_default(&lookup, "WORKER_THREADS", 1_usize)?.max(1),
        })
    }

    pub fn charge_load_options(&self) -> ChargeLoadOptions {
        ChargeLoadOptions {
            skip_rows: self.charges_skip_rows,
            delimiter: self.charges_delimiter,
            normalize: NormalizeOptions {
                anonymize: self.anonymize,
                time_offset: self.charge_time_offset,
            },
        }
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn path_or_default<F>(lookup: &F, key: &str, default: &str) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    PathBuf::from(non_empty(lookup, key).unwrap_or_else(|| default.to_string()))
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_optional(lookup, key)?.unwrap_or(default))
}

fn parse_optional<T, F>(lookup: &F, key: &str) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| AppError::config(format!("{key} must be a valid number")))
        })
        .transpose()
}

fn parse_offset_minutes<F>(lookup: &F, key: &str) -> Result<TimeDelta, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let minutes = parse_or_default(lookup, key, 0_i64)?;
    TimeDelta::try_minutes(minutes)
        .ok_or_else(|| AppError::config(format!("{key} is out of range")))
}

fn parse_bool_or_default<F>(lookup: &F, key: &str, default: bool) -> Result<bool, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, key) {
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AppError::config(format!("{key} must be a boolean"))),
        },
        None => Ok(default),
    }
}

fn parse_delimiter<F>(lookup: &F, key: &str, default: u8) -> Result<u8, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };

    match raw.as_str() {
        "\\t" | "tab" => Ok(b'\t'),
        value if value.len() == 1 && value.is_ascii() => Ok(value.as_bytes()[0]),
        _ => Err(AppError::config(format!(
            "{key} must be a single ASCII character"
        ))),
    }
}
