use std::path::PathBuf;

use crate::adapters::charge_files::{ChargeBatch, ChargeLoadOptions, load_charge_exports};
use crate::adapters::intensity_files::{IntensityBatch, load_intensity_files};
use crate::adapters::source_files::{LoaderError, discover_files};
use crate::app::config::AppConfig;

const SOURCE_EXTENSION: &str = "csv";

/// Supplies normalized charge sessions to the batch.
pub trait SessionSource {
    fn load_sessions(&self) -> Result<ChargeBatch, LoaderError>;
}

/// Supplies the hourly intensity table to the batch.
pub trait IntensitySource {
    fn load_intensity(&self) -> Result<IntensityBatch, LoaderError>;
}

#[derive(Debug, Clone)]
pub struct DirectorySources {
    charges_dir: PathBuf,
    intensity_dir: PathBuf,
    charge_options: ChargeLoadOptions,
}

impl DirectorySources {
    pub fn new(
        charges_dir: impl Into<PathBuf>,
        intensity_dir: impl Into<PathBuf>,
        charge_options: ChargeLoadOptions,
    ) -> Self {
        Self {
            charges_dir: charges_dir.into(),
            intensity_dir: intensity_dir.into(),
            charge_options,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.charges_dir,
            &config.intensity_dir,
            config.charge_load_options(),
        )
    }
}

impl SessionSource for DirectorySources {
    fn load_sessions(&self) -> Result<ChargeBatch, LoaderError> {
        let paths = discover_files(&self.charges_dir, SOURCE_EXTENSION)?;
        tracing::info!(
            dir = %self.charges_dir.display(),
            files = paths.len(),
            "charge exports found"
        );
        Ok(load_charge_exports(&paths, &self.charge_options))
    }
}

impl IntensitySource for DirectorySources {
    fn load_intensity(&self) -> Result<IntensityBatch, LoaderError> {
        let paths = discover_files(&self.intensity_dir, SOURCE_EXTENSION)?;
        tracing::info!(
            dir = %self.intensity_dir.display(),
            files = paths.len(),
            "intensity files found"
        );
        load_intensity_files(&paths)
    }
}
