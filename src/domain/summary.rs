use serde::Serialize;

use crate::domain::models::AnnotatedSession;
use crate::domain::report::TIMESTAMP_FORMAT;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SeriesStats {
    pub count: usize,
    pub total: f64,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl SeriesStats {
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        values.into_iter().fold(Self::default(), |mut stats, value| {
            stats.count += 1;
            stats.total += value;
            stats.min = Some(stats.min.map_or(value, |min| min.min(value)));
            stats.max = Some(stats.max.map_or(value, |max| max.max(value)));
            stats.mean = Some(stats.total / stats.count as f64);
            stats
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SessionStats {
    pub sessions: usize,
    pub sessions_with_warnings: usize,
    /// Sessions whose energy has a decimal part. Reports that read only the
    /// whole kWh of the export show different figures for these.
    pub fractional_energy_sessions: usize,
    pub first_start: Option<String>,
    pub last_start: Option<String>,
    pub energy_kwh: SeriesStats,
    pub co2_direct_g: SeriesStats,
    pub co2_lca_g: SeriesStats,
}

impl SessionStats {
    pub fn describe(rows: &[AnnotatedSession]) -> Self {
        let starts = rows.iter().map(|row| row.session.start_time);
        Self {
            sessions: rows.len(),
            sessions_with_warnings: rows
                .iter()
                .filter(|row| !row.emissions.warnings.is_empty())
                .count(),
            fractional_energy_sessions: rows
                .iter()
                .filter(|row| row.session.energy_kwh.fract() != 0.0)
                .count(),
            first_start: starts
                .clone()
                .min()
                .map(|start| start.format(TIMESTAMP_FORMAT).to_string()),
            last_start: starts
                .max()
                .map(|start| start.format(TIMESTAMP_FORMAT).to_string()),
            energy_kwh: SeriesStats::from_values(rows.iter().map(|row| row.session.energy_kwh)),
            co2_direct_g: SeriesStats::from_values(
                rows.iter().map(|row| row.emissions.direct_emissions_g),
            ),
            co2_lca_g: SeriesStats::from_values(
                rows.iter().map(|row| row.emissions.lca_emissions_g),
            ),
        }
    }
}

/// Outcome of one batch run, logged at the end and optionally written as JSON.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BatchSummary {
    pub run_id: String,
    pub charge_files_read: usize,
    pub intensity_files_read: usize,
    pub skipped_files: Vec<String>,
    pub row_errors: usize,
    pub intensity_buckets: usize,
    pub intensity_first_hour: Option<String>,
    pub intensity_last_hour: Option<String>,
    pub sessions_loaded: usize,
    pub report_year: Option<i32>,
    pub reported: SessionStats,
}

#[cfg(test)]
mod tests {
    use crate::domain::apportion::{ApportionMode, ApportionWarning, SessionEmissions};
    use crate::domain::models::{AnnotatedSession, ChargeSession};
    use crate::test_support::ts;

    use super::{SeriesStats, SessionStats};

    #[test]
    fn series_stats_of_empty_input_are_blank() {
        let stats = SeriesStats::from_values(Vec::new());

        assert_eq!(stats.count, 0);
        assert_eq!(stats.total, 0.0);
        assert_eq!(stats.mean, None);
        assert_eq!(stats.min, None);
    }

    #[test]
    fn series_stats_track_extremes_and_mean() {
        let stats = SeriesStats::from_values([4.0, 10.0, 1.0]);

        assert_eq!(stats.count, 3);
        assert_eq!(stats.total, 15.0);
        assert_eq!(stats.mean, Some(5.0));
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(10.0));
    }

    #[test]
    fn describes_sessions() {
        let rows = vec![
            AnnotatedSession {
                session: ChargeSession::new(
                    ts("2024-03-02 09:00"),
                    ts("2024-03-02 10:00"),
                    7.0,
                    60,
                ),
                emissions: SessionEmissions {
                    direct_emissions_g: 700.0,
                    lca_emissions_g: 900.0,
                    mode: ApportionMode::SingleBucket,
                    warnings: Vec::new(),
                },
            },
            AnnotatedSession {
                session: ChargeSession::new(
                    ts("2024-03-01 09:00"),
                    ts("2024-03-01 10:00"),
                    3.5,
                    60,
                ),
                emissions: SessionEmissions {
                    direct_emissions_g: 0.0,
                    lca_emissions_g: 0.0,
                    mode: ApportionMode::SingleBucket,
                    warnings: vec![ApportionWarning::CoverageGap {
                        start: ts("2024-03-01 09:00"),
                        end: ts("2024-03-01 10:00"),
                    }],
                },
            },
        ];

        let stats = SessionStats::describe(&rows);

        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.sessions_with_warnings, 1);
        assert_eq!(stats.first_start.as_deref(), Some("2024-03-01 09:00:00"));
        assert_eq!(stats.last_start.as_deref(), Some("2024-03-02 09:00:00"));
        assert_eq!(stats.fractional_energy_sessions, 1);
        assert_eq!(stats.energy_kwh.total, 10.5);
        assert_eq!(stats.co2_direct_g.max, Some(700.0));
        assert_eq!(stats.co2_lca_g.mean, Some(450.0));
    }
}
