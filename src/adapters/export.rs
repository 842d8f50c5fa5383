use std::fs::File;
use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::domain::models::AnnotatedSession;
use crate::domain::report::ReportLayout;
use crate::domain::summary::BatchSummary;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to serialize summary: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

pub fn write_report<W: Write>(
    writer: W,
    layout: &ReportLayout,
    sessions: &[AnnotatedSession],
) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(layout.headers())?;
    for session in sessions {
        csv_writer.write_record(layout.row(session))?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_report_file(
    path: &Path,
    layout: &ReportLayout,
    sessions: &[AnnotatedSession],
) -> Result<(), ExportError> {
    let file = create_with_parents(path)?;
    write_report(file, layout, sessions)
}

pub fn write_summary_file(path: &Path, summary: &BatchSummary) -> Result<(), ExportError> {
    let mut file = create_with_parents(path)?;
    serde_json::to_writer_pretty(&mut file, summary)?;
    file.write_all(b"\n")
        .map_err(|error| ExportError::io(path, error))
}

fn create_with_parents(path: &Path) -> Result<File, ExportError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|error| ExportError::io(path, error))?;
    }

    File::create(path).map_err(|error| ExportError::io(path, error))
}

#[cfg(test)]
mod tests {
    use crate::domain::apportion::{ApportionMode, SessionEmissions};
    use crate::domain::models::{AnnotatedSession, ChargeSession, SessionDetails};
    use crate::domain::report::ReportLayout;
    use crate::domain::summary::BatchSummary;
    use crate::test_support::ts;

    use super::{write_report, write_report_file, write_summary_file};

    fn sample() -> Vec<AnnotatedSession> {
        vec![AnnotatedSession {
            session: ChargeSession::new(
                ts("2024-03-01 09:00"),
                ts("2024-03-01 11:30"),
                27.5,
                150,
            )
            .with_details(SessionDetails {
                mileage_km: 12345,
                initial_soc: "20 %".to_string(),
                final_soc: "80 %".to_string(),
                ac_at_startup: Some("No".to_string()),
                ..SessionDetails::default()
            }),
            emissions: SessionEmissions {
                direct_emissions_g: 3850.0,
                lca_emissions_g: 4730.0,
                mode: ApportionMode::MultiBucket,
                warnings: Vec::new(),
            },
        }]
    }

    #[test]
    fn writes_header_and_rows_in_layout_order() {
        let sessions = sample();
        let layout = ReportLayout::for_sessions(&sessions, false);
        let mut buffer = Vec::new();

        write_report(&mut buffer, &layout, &sessions).expect("report should be written");

        let text = String::from_utf8(buffer).expect("report should be utf-8");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "start_time,end_time,mileage_km,energy_kwh,duration_min,initial_soc,final_soc,ac_at_startup,charge_rate_kw,co2_direct_emissions,co2_lca_emissions"
        );
        assert_eq!(
            lines[1],
            "2024-03-01 09:00:00,2024-03-01 11:30:00,12345,27.5,150,20 %,80 %,No,11.000,3850.000,4730.000"
        );
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("out/nested/report.csv");
        let sessions = sample();

        write_report_file(&path, &ReportLayout::for_sessions(&sessions, false), &sessions)
            .expect("report should be written");

        let text = std::fs::read_to_string(&path).expect("report should be readable");
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn writes_summary_as_json() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("summary.json");
        let summary = BatchSummary {
            run_id: "run-1".to_string(),
            sessions_loaded: 3,
            ..BatchSummary::default()
        };

        write_summary_file(&path, &summary).expect("summary should be written");

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("summary readable"))
                .expect("summary should be JSON");
        assert_eq!(value["run_id"], "run-1");
        assert_eq!(value["sessions_loaded"], 3);
        assert!(value["reported"]["energy_kwh"]["mean"].is_null());
    }
}
