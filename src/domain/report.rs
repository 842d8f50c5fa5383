use chrono::Datelike;

use crate::domain::charge_export::has_digit;
use crate::domain::models::AnnotatedSession;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportColumn {
    StartTime,
    EndTime,
    MileageKm,
    EnergyKwh,
    DurationMin,
    InitialSoc,
    FinalSoc,
    ChargeCosts,
    ElectricityPrice1,
    ElectricityPrice2,
    AcAtStartup,
    Address,
    ChargeRateKw,
    Co2DirectEmissions,
    Co2LcaEmissions,
}

impl ReportColumn {
    pub fn header(self) -> &'static str {
        match self {
            Self::StartTime => "start_time",
            Self::EndTime => "end_time",
            Self::MileageKm => "mileage_km",
            Self::EnergyKwh => "energy_kwh",
            Self::DurationMin => "duration_min",
            Self::InitialSoc => "initial_soc",
            Self::FinalSoc => "final_soc",
            Self::ChargeCosts => "charge_costs",
            Self::ElectricityPrice1 => "electricity_price1",
            Self::ElectricityPrice2 => "electricity_price2",
            Self::AcAtStartup => "ac_at_startup",
            Self::Address => "address",
            Self::ChargeRateKw => "charge_rate_kw",
            Self::Co2DirectEmissions => "co2_direct_emissions",
            Self::Co2LcaEmissions => "co2_lca_emissions",
        }
    }

    pub fn value(self, row: &AnnotatedSession) -> String {
        let session = &row.session;
        let details = &session.details;
        match self {
            Self::StartTime => session.start_time.format(TIMESTAMP_FORMAT).to_string(),
            Self::EndTime => session.end_time.format(TIMESTAMP_FORMAT).to_string(),
            Self::MileageKm => details.mileage_km.to_string(),
            Self::EnergyKwh => session.energy_kwh.to_string(),
            Self::DurationMin => session.duration_min.to_string(),
            Self::InitialSoc => details.initial_soc.clone(),
            Self::FinalSoc => details.final_soc.clone(),
            Self::ChargeCosts => details.charge_costs.clone().unwrap_or_default(),
            Self::ElectricityPrice1 => details.electricity_price1.clone().unwrap_or_default(),
            Self::ElectricityPrice2 => details.electricity_price2.clone().unwrap_or_default(),
            Self::AcAtStartup => details.ac_at_startup.clone().unwrap_or_default(),
            Self::Address => details.address.clone().unwrap_or_default(),
            Self::ChargeRateKw => session
                .charge_rate_kw()
                .map(|rate| format!("{rate:.3}"))
                .unwrap_or_default(),
            Self::Co2DirectEmissions => format!("{:.3}", row.emissions.direct_emissions_g),
            Self::Co2LcaEmissions => format!("{:.3}", row.emissions.lca_emissions_g),
        }
    }
}

/// Column set of an export. Tariff columns that never carry a price are left
/// out, and the address only appears when sessions were not anonymized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLayout {
    columns: Vec<ReportColumn>,
}

impl ReportLayout {
    pub fn for_sessions(sessions: &[AnnotatedSession], include_address: bool) -> Self {
        let any_priced = |pick: fn(&AnnotatedSession) -> Option<&String>| {
            sessions
                .iter()
                .filter_map(pick)
                .any(|value| has_digit(value))
        };
        let has_price1 = any_priced(|row| row.session.details.electricity_price1.as_ref());
        let has_price2 = any_priced(|row| row.session.details.electricity_price2.as_ref());

        let mut columns = vec![
            ReportColumn::StartTime,
            ReportColumn::EndTime,
            ReportColumn::MileageKm,
            ReportColumn::EnergyKwh,
            ReportColumn::DurationMin,
            ReportColumn::InitialSoc,
            ReportColumn::FinalSoc,
        ];
        if has_price1 {
            columns.push(ReportColumn::ChargeCosts);
            columns.push(ReportColumn::ElectricityPrice1);
        }
        if has_price2 {
            columns.push(ReportColumn::ElectricityPrice2);
        }
        columns.push(ReportColumn::AcAtStartup);
        if include_address {
            columns.push(ReportColumn::Address);
        }
        columns.extend([
            ReportColumn::ChargeRateKw,
            ReportColumn::Co2DirectEmissions,
            ReportColumn::Co2LcaEmissions,
        ]);

        Self { columns }
    }

    pub fn columns(&self) -> &[ReportColumn] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<&'static str> {
        self.columns.iter().map(|column| column.header()).collect()
    }

    pub fn row(&self, session: &AnnotatedSession) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| column.value(session))
            .collect()
    }
}

/// Keeps sessions starting in `year` (all when `None`), ordered by start time.
pub fn select_sessions(
    mut sessions: Vec<AnnotatedSession>,
    year: Option<i32>,
) -> Vec<AnnotatedSession> {
    if let Some(year) = year {
        sessions.retain(|row| row.session.start_time.year() == year);
    }
    sessions.sort_by_key(|row| row.session.start_time);
    sessions
}
