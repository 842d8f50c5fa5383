use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};

use crate::domain::intensity_table::{IntensityTable, floor_to_hour};
use crate::domain::models::{ChargeSession, IntensityBucket, delta_hours};

/// Covered hours may fall short of the session span by float noise only.
const COVERAGE_EPSILON_HOURS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntensitySeries {
    Direct,
    Lca,
}

impl IntensitySeries {
    pub fn intensity(self, bucket: &IntensityBucket) -> f64 {
        match self {
            Self::Direct => bucket.direct_intensity,
            Self::Lca => bucket.lca_intensity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApportionMode {
    /// Session lasts at most one hour; only the hour containing the start is read.
    SingleBucket,
    /// Session longer than one hour; every overlapped hour contributes.
    MultiBucket,
    /// Nothing was apportioned because the session has no usable duration.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApportionWarning {
    DegenerateDuration {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    CoverageGap {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    PartialCoverage {
        start: NaiveDateTime,
        end: NaiveDateTime,
        covered_hours: f64,
        session_hours: f64,
    },
    MissingHour {
        start: NaiveDateTime,
        hour: NaiveDateTime,
    },
}

impl fmt::Display for ApportionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateDuration { start, end } => {
                write!(f, "session {start} - {end} has no positive duration")
            }
            Self::CoverageGap { start, end } => {
                write!(f, "no intensity data covers session {start} - {end}")
            }
            Self::PartialCoverage {
                start,
                end,
                covered_hours,
                session_hours,
            } => write!(
                f,
                "intensity data covers {covered_hours:.2}h of {session_hours:.2}h for session {start} - {end}"
            ),
            Self::MissingHour { start, hour } => {
                write!(f, "intensity hour {hour} missing for session starting {start}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Apportionment {
    pub emissions_g: f64,
    pub mode: ApportionMode,
    pub warnings: Vec<ApportionWarning>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionEmissions {
    pub direct_emissions_g: f64,
    pub lca_emissions_g: f64,
    pub mode: ApportionMode,
    pub warnings: Vec<ApportionWarning>,
}

/// Hours of a session attributed to each overlapped bucket, scaled by the
/// session's charge rate when evaluated against a series.
struct OverlapPlan<'a> {
    charge_rate_kw: f64,
    slices: Vec<(&'a IntensityBucket, f64)>,
    mode: ApportionMode,
    warnings: Vec<ApportionWarning>,
}

impl<'a> OverlapPlan<'a> {
    fn build(session: &ChargeSession, table: &'a IntensityTable) -> Self {
        let start = session.start_time;
        let end = session.end_time;
        let span = session.span();

        let charge_rate_kw = match session.charge_rate_kw() {
            Some(rate) if span > TimeDelta::zero() => rate,
            _ => {
                return Self::skipped(ApportionWarning::DegenerateDuration { start, end });
            }
        };

        let session_hours = delta_hours(span);

        if span > IntensityBucket::length() {
            let slices = overlap_slices(table, start, end);

            let mut warnings = Vec::new();
            let covered_hours: f64 = slices.iter().map(|(_, hours)| hours).sum();
            if slices.is_empty() {
                warnings.push(ApportionWarning::CoverageGap { start, end });
            } else if covered_hours + COVERAGE_EPSILON_HOURS < session_hours {
                warnings.push(ApportionWarning::PartialCoverage {
                    start,
                    end,
                    covered_hours,
                    session_hours,
                });
            }

            return Self {
                charge_rate_kw,
                slices,
                mode: ApportionMode::MultiBucket,
                warnings,
            };
        }

        let hour = floor_to_hour(start);
        match table.bucket_at(hour) {
            Some(bucket) => Self {
                charge_rate_kw,
                slices: vec![(bucket, session_hours)],
                mode: ApportionMode::SingleBucket,
                warnings: Vec::new(),
            },
            None => {
                let warning = if table.intersecting(start, end).is_empty() {
                    ApportionWarning::CoverageGap { start, end }
                } else {
                    ApportionWarning::MissingHour { start, hour }
                };
                Self {
                    charge_rate_kw,
                    slices: Vec::new(),
                    mode: ApportionMode::SingleBucket,
                    warnings: vec![warning],
                }
            }
        }
    }

    fn skipped(warning: ApportionWarning) -> Self {
        Self {
            charge_rate_kw: 0.0,
            slices: Vec::new(),
            mode: ApportionMode::Skipped,
            warnings: vec![warning],
        }
    }

    fn emissions(&self, series: IntensitySeries) -> f64 {
        self.slices
            .iter()
            .map(|(bucket, hours)| self.charge_rate_kw * hours * series.intensity(bucket))
            .sum()
    }
}

/// Every bucket overlapping `[start, end)` with the hours it shares.
fn overlap_slices(
    table: &IntensityTable,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Vec<(&IntensityBucket, f64)> {
    table
        .intersecting(start, end)
        .iter()
        .filter_map(|bucket| {
            let hours = overlap_hours(start, end, bucket);
            (hours > 0.0).then_some((bucket, hours))
        })
        .collect()
}

fn overlap_hours(start: NaiveDateTime, end: NaiveDateTime, bucket: &IntensityBucket) -> f64 {
    let overlap_start = start.max(bucket.bucket_start);
    let overlap_end = end.min(bucket.bucket_end());
    delta_hours(overlap_end - overlap_start).max(0.0)
}

/// Emissions in grams CO2eq for one session against one intensity series.
pub fn apportion(
    session: &ChargeSession,
    table: &IntensityTable,
    series: IntensitySeries,
) -> Apportionment {
    let plan = OverlapPlan::build(session, table);
    Apportionment {
        emissions_g: plan.emissions(series),
        mode: plan.mode,
        warnings: plan.warnings,
    }
}

/// Direct and LCA emissions for one session. The overlap is resolved once and
/// each series is summed on its own.
pub fn session_emissions(session: &ChargeSession, table: &IntensityTable) -> SessionEmissions {
    let plan = OverlapPlan::build(session, table);
    SessionEmissions {
        direct_emissions_g: plan.emissions(IntensitySeries::Direct),
        lca_emissions_g: plan.emissions(IntensitySeries::Lca),
        mode: plan.mode,
        warnings: plan.warnings,
    }
}

/// Computes every session, splitting the work across `workers` threads that
/// share the table. Results keep the input order.
pub fn apportion_all(
    sessions: &[ChargeSession],
    table: &IntensityTable,
    workers: usize,
) -> Vec<SessionEmissions> {
    let workers = workers.max(1);
    if workers == 1 || sessions.len() < 2 {
        return sessions
            .iter()
            .map(|session| session_emissions(session, table))
            .collect();
    }

    let chunk_size = sessions.len().div_ceil(workers);
    std::thread::scope(|scope| {
        let handles: Vec<_> = sessions
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|session| session_emissions(session, table))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use crate::domain::intensity_table::IntensityTable;
    use crate::domain::models::ChargeSession;
    use crate::test_support::{bucket, hourly_table, ts};

    use super::{
        ApportionMode, ApportionWarning, IntensitySeries, apportion, apportion_all, overlap_slices,
        session_emissions,
    };

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    fn morning_table() -> IntensityTable {
        IntensityTable::from_buckets(vec![
            bucket("2024-03-01 09:00", 100.0, 130.0),
            bucket("2024-03-01 10:00", 150.0, 180.0),
            bucket("2024-03-01 11:00", 200.0, 240.0),
        ])
        .expect("table should build")
    }

    #[test]
    fn apportions_across_partial_final_hour() {
        // 27.5 kWh over 150 minutes is 11 kW.
        let session = ChargeSession::new(
            ts("2024-03-01 09:00"),
            ts("2024-03-01 11:30"),
            27.5,
            150,
        );

        let result = apportion(&session, &morning_table(), IntensitySeries::Direct);

        assert_eq!(result.mode, ApportionMode::MultiBucket);
        assert_close(result.emissions_g, 3850.0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn uses_lca_series_when_requested() {
        let session = ChargeSession::new(
            ts("2024-03-01 09:00"),
            ts("2024-03-01 11:30"),
            27.5,
            150,
        );

        let result = apportion(&session, &morning_table(), IntensitySeries::Lca);

        assert_close(result.emissions_g, 11.0 * 130.0 + 11.0 * 180.0 + 11.0 * 0.5 * 240.0);
    }

    #[test]
    fn counts_leading_partial_hour() {
        let session = ChargeSession::new(
            ts("2024-03-01 09:30"),
            ts("2024-03-01 11:00"),
            15.0,
            90,
        );

        let result = apportion(&session, &morning_table(), IntensitySeries::Direct);

        assert_close(result.emissions_g, 10.0 * 0.5 * 100.0 + 10.0 * 1.0 * 150.0);
    }

    #[test]
    fn partition_reconstructs_whole_span_for_constant_intensity() {
        let table = hourly_table("2024-03-01 00:00", &[(240.0, 300.0); 8]);
        let session = ChargeSession::new(
            ts("2024-03-01 01:20"),
            ts("2024-03-01 06:05"),
            19.0,
            285,
        );

        let result = apportion(&session, &table, IntensitySeries::Direct);

        let rate = 19.0 / 4.75;
        assert_close(result.emissions_g, rate * 4.75 * 240.0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn single_bucket_reads_hour_of_session_start() {
        let table = IntensityTable::from_buckets(vec![
            bucket("2024-03-01 14:00", 120.0, 160.0),
            bucket("2024-03-01 15:00", 400.0, 420.0),
        ])
        .expect("table should build");
        let session = ChargeSession::new(
            ts("2024-03-01 14:10"),
            ts("2024-03-01 14:40"),
            3.5,
            30,
        );

        let result = apportion(&session, &table, IntensitySeries::Direct);

        assert_eq!(result.mode, ApportionMode::SingleBucket);
        assert_close(result.emissions_g, 420.0);
    }

    #[test]
    fn single_bucket_ignores_straddled_next_hour() {
        let table = IntensityTable::from_buckets(vec![
            bucket("2024-03-01 14:00", 120.0, 160.0),
            bucket("2024-03-01 15:00", 400.0, 420.0),
        ])
        .expect("table should build");
        let session = ChargeSession::new(
            ts("2024-03-01 14:40"),
            ts("2024-03-01 15:10"),
            3.5,
            30,
        );

        let result = apportion(&session, &table, IntensitySeries::Direct);

        assert_close(result.emissions_g, 7.0 * 0.5 * 120.0);
    }

    #[test]
    fn single_bucket_missing_hour_defaults_to_zero_with_warning() {
        let table = IntensityTable::from_buckets(vec![bucket("2024-03-01 15:00", 400.0, 420.0)])
            .expect("table should build");
        let session = ChargeSession::new(
            ts("2024-03-01 14:40"),
            ts("2024-03-01 15:10"),
            3.5,
            30,
        );

        let result = session_emissions(&session, &table);

        assert_eq!(result.direct_emissions_g, 0.0);
        assert_eq!(result.lca_emissions_g, 0.0);
        assert_eq!(
            result.warnings,
            vec![ApportionWarning::MissingHour {
                start: ts("2024-03-01 14:40"),
                hour: ts("2024-03-01 14:00"),
            }]
        );
    }

    #[test]
    fn aligned_hour_matches_in_both_modes() {
        let table = morning_table();
        let one_hour = ChargeSession::new(
            ts("2024-03-01 10:00"),
            ts("2024-03-01 11:00"),
            7.0,
            60,
        );
        let single = apportion(&one_hour, &table, IntensitySeries::Direct);

        let slices = overlap_slices(&table, one_hour.start_time, one_hour.end_time);
        assert_eq!(slices.len(), 1);
        let multi_equivalent: f64 = slices
            .iter()
            .map(|(bucket, hours)| 7.0 * hours * IntensitySeries::Direct.intensity(bucket))
            .sum();

        assert_eq!(single.mode, ApportionMode::SingleBucket);
        assert_close(single.emissions_g, multi_equivalent);
    }

    #[test]
    fn zero_duration_session_yields_nothing() {
        let session = ChargeSession::new(ts("2024-03-01 10:00"), ts("2024-03-01 10:00"), 5.0, 0);

        let result = session_emissions(&session, &morning_table());

        assert_eq!(result.direct_emissions_g, 0.0);
        assert_eq!(result.lca_emissions_g, 0.0);
        assert_eq!(result.mode, ApportionMode::Skipped);
        assert_eq!(
            result.warnings,
            vec![ApportionWarning::DegenerateDuration {
                start: ts("2024-03-01 10:00"),
                end: ts("2024-03-01 10:00"),
            }]
        );
    }

    #[test]
    fn uncovered_session_emits_single_gap_warning() {
        let session = ChargeSession::new(
            ts("2024-03-02 09:00"),
            ts("2024-03-02 12:00"),
            21.0,
            180,
        );

        let result = session_emissions(&session, &morning_table());

        assert_eq!(result.direct_emissions_g, 0.0);
        assert_eq!(result.lca_emissions_g, 0.0);
        assert_eq!(
            result.warnings,
            vec![ApportionWarning::CoverageGap {
                start: ts("2024-03-02 09:00"),
                end: ts("2024-03-02 12:00"),
            }]
        );
    }

    #[test]
    fn short_uncovered_session_reports_gap() {
        let session = ChargeSession::new(
            ts("2024-03-02 09:10"),
            ts("2024-03-02 09:40"),
            3.0,
            30,
        );

        let result = session_emissions(&session, &morning_table());

        assert_eq!(result.warnings.len(), 1);
        assert!(matches!(
            result.warnings[0],
            ApportionWarning::CoverageGap { .. }
        ));
    }

    #[test]
    fn partially_covered_session_keeps_best_effort_sum() {
        let session = ChargeSession::new(
            ts("2024-03-01 10:00"),
            ts("2024-03-01 13:00"),
            30.0,
            180,
        );

        let result = apportion(&session, &morning_table(), IntensitySeries::Direct);

        assert_close(result.emissions_g, 10.0 * 150.0 + 10.0 * 200.0);
        assert_eq!(
            result.warnings,
            vec![ApportionWarning::PartialCoverage {
                start: ts("2024-03-01 10:00"),
                end: ts("2024-03-01 13:00"),
                covered_hours: 2.0,
                session_hours: 3.0,
            }]
        );
    }

    #[test]
    fn zero_energy_session_is_zero_without_warning() {
        let session = ChargeSession::new(
            ts("2024-03-01 09:00"),
            ts("2024-03-01 11:00"),
            0.0,
            120,
        );

        let result = session_emissions(&session, &morning_table());

        assert_eq!(result.direct_emissions_g, 0.0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn series_are_independent() {
        let table = IntensityTable::from_buckets(vec![
            bucket("2024-03-01 09:00", 0.0, 300.0),
            bucket("2024-03-01 10:00", 0.0, 300.0),
        ])
        .expect("table should build");
        let session = ChargeSession::new(
            ts("2024-03-01 09:00"),
            ts("2024-03-01 11:00"),
            10.0,
            120,
        );

        let result = session_emissions(&session, &table);

        assert_eq!(result.direct_emissions_g, 0.0);
        assert_close(result.lca_emissions_g, 5.0 * 2.0 * 300.0);

        let direct_only = apportion(&session, &table, IntensitySeries::Direct);
        let lca_only = apportion(&session, &table, IntensitySeries::Lca);
        assert_eq!(direct_only.emissions_g, result.direct_emissions_g);
        assert_eq!(lca_only.emissions_g, result.lca_emissions_g);
    }

    #[test]
    fn parallel_batch_matches_sequential_order() {
        let table = hourly_table(
            "2024-03-01 00:00",
            &[
                (100.0, 120.0),
                (110.0, 130.0),
                (120.0, 140.0),
                (130.0, 150.0),
                (140.0, 160.0),
            ],
        );
        let sessions: Vec<_> = (0..4)
            .map(|hour| {
                let start = ts(&format!("2024-03-01 0{hour}:15"));
                let end = ts(&format!("2024-03-01 0{}:45", hour + 1));
                ChargeSession::new(start, end, 9.0, 90)
            })
            .collect();

        let sequential = apportion_all(&sessions, &table, 1);
        let parallel = apportion_all(&sessions, &table, 3);

        assert_eq!(sequential.len(), 4);
        assert_eq!(sequential, parallel);
    }
}
