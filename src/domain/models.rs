use chrono::{NaiveDateTime, TimeDelta};

use crate::domain::apportion::SessionEmissions;

/// Descriptive columns of a charge export that ride along with a session
/// into the report but play no part in apportionment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionDetails {
    pub mileage_km: u32,
    pub initial_soc: String,
    pub final_soc: String,
    pub address: Option<String>,
    pub charge_costs: Option<String>,
    pub electricity_price1: Option<String>,
    pub electricity_price2: Option<String>,
    pub ac_at_startup: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeSession {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub energy_kwh: f64,
    /// Duration as reported by the export, which may differ from the span
    /// between plug-in and plug-out.
    pub duration_min: u32,
    pub details: SessionDetails,
}

impl ChargeSession {
    pub fn new(
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        energy_kwh: f64,
        duration_min: u32,
    ) -> Self {
        Self {
            start_time,
            end_time,
            energy_kwh,
            duration_min,
            details: SessionDetails::default(),
        }
    }

    pub fn with_details(mut self, details: SessionDetails) -> Self {
        self.details = details;
        self
    }

    pub fn span(&self) -> TimeDelta {
        self.end_time - self.start_time
    }

    /// Hours used to derive the charge rate. Falls back to the timestamp span
    /// when the export reports zero minutes.
    pub fn duration_hours(&self) -> f64 {
        if self.duration_min > 0 {
            f64::from(self.duration_min) / 60.0
        } else {
            delta_hours(self.span())
        }
    }

    pub fn charge_rate_kw(&self) -> Option<f64> {
        let hours = self.duration_hours();
        if hours > 0.0 {
            Some(self.energy_kwh / hours)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityBucket {
    pub bucket_start: NaiveDateTime,
    /// gCO2eq/kWh at the point of generation.
    pub direct_intensity: f64,
    /// gCO2eq/kWh including upstream life-cycle emissions.
    pub lca_intensity: f64,
}

impl IntensityBucket {
    pub fn length() -> TimeDelta {
        TimeDelta::hours(1)
    }

    pub fn bucket_end(&self) -> NaiveDateTime {
        self.bucket_start + Self::length()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedSession {
    pub session: ChargeSession,
    pub emissions: SessionEmissions,
}

pub fn delta_hours(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / 3_600_000.0
}
