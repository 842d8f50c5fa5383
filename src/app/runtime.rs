use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::adapters::export::{write_report_file, write_summary_file};
use crate::adapters::source_files::{RowError, SkippedFile};
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::services::{DirectorySources, IntensitySource, SessionSource};
use crate::domain::apportion::{ApportionWarning, apportion_all};
use crate::domain::models::AnnotatedSession;
use crate::domain::report::{ReportLayout, TIMESTAMP_FORMAT, select_sessions};
use crate::domain::summary::{BatchSummary, SessionStats};

/// Rows shown at each end of the session table by the inspector.
const INSPECT_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub sessions: Vec<AnnotatedSession>,
    /// Chosen from every loaded session, before the year filter.
    pub layout: ReportLayout,
    pub summary: BatchSummary,
}

pub struct BatchRunner<S> {
    sources: S,
    report_year: Option<i32>,
    worker_threads: usize,
    address_column: bool,
}

impl<S> BatchRunner<S>
where
    S: SessionSource + IntensitySource,
{
    pub fn new(sources: S, report_year: Option<i32>, worker_threads: usize) -> Self {
        Self {
            sources,
            report_year,
            worker_threads,
            address_column: false,
        }
    }

    pub fn with_address_column(mut self, address_column: bool) -> Self {
        self.address_column = address_column;
        self
    }

    pub fn process(&self, run_id: &str) -> Result<BatchOutcome, AppError> {
        let intensity = self.sources.load_intensity().map_err(AppError::input)?;
        log_row_errors(&intensity.row_errors);
        let Some((first_hour, last_hour)) = intensity.table.coverage() else {
            return Err(AppError::input("no intensity data loaded"));
        };
        tracing::info!(
            buckets = intensity.table.len(),
            first_hour = %first_hour,
            last_hour = %last_hour,
            "intensity table ready"
        );

        let charges = self.sources.load_sessions().map_err(AppError::input)?;
        log_row_errors(&charges.row_errors);
        if charges.sessions.is_empty() {
            return Err(AppError::input("no charge sessions loaded"));
        }

        let skipped_files: Vec<SkippedFile> = intensity
            .skipped_files
            .iter()
            .chain(&charges.skipped_files)
            .cloned()
            .collect();
        if !skipped_files.is_empty() {
            tracing::warn!(
                files = ?skipped_files.iter().map(|skipped| &skipped.file).collect::<Vec<_>>(),
                "files not processed"
            );
        }

        let emissions = apportion_all(&charges.sessions, &intensity.table, self.worker_threads);
        let annotated: Vec<AnnotatedSession> = charges
            .sessions
            .into_iter()
            .zip(emissions)
            .map(|(session, emissions)| {
                emissions.warnings.iter().for_each(log_apportion_warning);
                AnnotatedSession { session, emissions }
            })
            .collect();
        let sessions_loaded = annotated.len();
        let layout = ReportLayout::for_sessions(&annotated, self.address_column);

        let sessions = select_sessions(annotated, self.report_year);

        let summary = BatchSummary {
            run_id: run_id.to_string(),
            charge_files_read: charges.files_read,
            intensity_files_read: intensity.files_read,
            skipped_files: skipped_files
                .into_iter()
                .map(|skipped| skipped.file)
                .collect(),
            row_errors: intensity.row_errors.len() + charges.row_errors.len(),
            intensity_buckets: intensity.table.len(),
            intensity_first_hour: Some(format_timestamp(first_hour)),
            intensity_last_hour: Some(format_timestamp(last_hour)),
            sessions_loaded,
            report_year: self.report_year,
            reported: SessionStats::describe(&sessions),
        };

        Ok(BatchOutcome {
            sessions,
            layout,
            summary,
        })
    }
}

pub fn run_batch(config: &AppConfig) -> Result<BatchOutcome, AppError> {
    let run_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("batch", run_id = %run_id);
    let _entered = span.enter();

    let runner = BatchRunner::new(
        DirectorySources::from_config(config),
        config.report_year,
        config.worker_threads,
    )
    .with_address_column(!config.anonymize);
    let outcome = runner.process(&run_id)?;
    log_summary(&outcome.summary);

    write_report_file(&config.output_path, &outcome.layout, &outcome.sessions)
        .map_err(AppError::output)?;
    tracing::info!(
        path = %config.output_path.display(),
        rows = outcome.sessions.len(),
        columns = outcome.layout.columns().len(),
        "emissions report written"
    );

    if let Some(summary_path) = &config.summary_path {
        write_summary_file(summary_path, &outcome.summary).map_err(AppError::output)?;
        tracing::info!(path = %summary_path.display(), "batch summary written");
    }

    Ok(outcome)
}

pub fn run_inspection(config: &AppConfig) -> Result<BatchOutcome, AppError> {
    let run_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("inspect", run_id = %run_id);
    let _entered = span.enter();

    let runner = BatchRunner::new(
        DirectorySources::from_config(config),
        config.report_year,
        config.worker_threads,
    )
    .with_address_column(!config.anonymize);
    let outcome = runner.process(&run_id)?;
    log_summary(&outcome.summary);

    let total = outcome.sessions.len();
    for (index, row) in outcome.sessions.iter().enumerate() {
        if index < INSPECT_ROWS || index + INSPECT_ROWS >= total {
            tracing::info!(
                index,
                start = %row.session.start_time,
                end = %row.session.end_time,
                energy_kwh = row.session.energy_kwh,
                duration_min = row.session.duration_min,
                co2_direct_g = row.emissions.direct_emissions_g,
                co2_lca_g = row.emissions.lca_emissions_g,
                warnings = row.emissions.warnings.len(),
                "session"
            );
        }
    }

    Ok(outcome)
}

fn log_summary(summary: &BatchSummary) {
    let reported = &summary.reported;
    tracing::info!(
        charge_files = summary.charge_files_read,
        intensity_files = summary.intensity_files_read,
        skipped_files = summary.skipped_files.len(),
        row_errors = summary.row_errors,
        intensity_buckets = summary.intensity_buckets,
        sessions_loaded = summary.sessions_loaded,
        sessions_reported = reported.sessions,
        sessions_with_warnings = reported.sessions_with_warnings,
        energy_kwh_total = reported.energy_kwh.total,
        co2_direct_g_total = reported.co2_direct_g.total,
        co2_lca_g_total = reported.co2_lca_g.total,
        "batch summary"
    );
    if reported.fractional_energy_sessions > 0 {
        tracing::info!(
            sessions = reported.fractional_energy_sessions,
            "energy kept with its decimal fraction; whole-kWh reports of the same exports differ for these sessions"
        );
    }
}

fn log_row_errors(row_errors: &[RowError]) {
    for row_error in row_errors {
        tracing::warn!(
            file = %row_error.file,
            line = row_error.line,
            error = %row_error.message,
            "row rejected"
        );
    }
}

fn log_apportion_warning(warning: &ApportionWarning) {
    match warning {
        ApportionWarning::DegenerateDuration { start, end } => {
            tracing::warn!(start = %start, end = %end, "session without positive duration, emissions set to zero");
        }
        ApportionWarning::CoverageGap { start, end } => {
            tracing::warn!(start = %start, end = %end, "no intensity coverage for session, emissions set to zero");
        }
        ApportionWarning::PartialCoverage {
            start,
            end,
            covered_hours,
            session_hours,
        } => {
            tracing::warn!(
                start = %start,
                end = %end,
                covered_hours,
                session_hours,
                "intensity coverage incomplete for session"
            );
        }
        ApportionWarning::MissingHour { start, hour } => {
            tracing::warn!(start = %start, hour = %hour, "intensity hour missing, emissions set to zero");
        }
    }
}

fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}
