pub mod config;
mod error;
mod logging;
pub mod runtime;
pub mod services;

pub use error::AppError;

fn bootstrap() -> Result<config::AppConfig, AppError> {
    logging::init()?;

    let config = config::AppConfig::from_env()?;

    tracing::info!(
        charges_dir = %config.charges_dir.display(),
        intensity_dir = %config.intensity_dir.display(),
        output_path = %config.output_path.display(),
        report_year = ?config.report_year,
        anonymize = config.anonymize,
        worker_threads = config.worker_threads,
        "application bootstrap initialized"
    );

    Ok(config)
}

/// Runs the full batch: load, apportion, write the emissions report.
pub fn run() -> Result<(), AppError> {
    let config = bootstrap()?;
    runtime::run_batch(&config).map(|_| ())
}

/// Loads and apportions the inputs, logging the result without writing files.
pub fn run_inspect() -> Result<(), AppError> {
    let config = bootstrap()?;
    runtime::run_inspection(&config).map(|_| ())
}
