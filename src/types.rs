use chrono::NaiveDate;
use serde::Serialize;
use tabled::Tabled;

/// One feed row after parsing: a region, a month and its counts.
///
/// `value` is `None` when the attempts cell could not be read. Duplicate
/// (region, month) rows are kept as-is and summed by the aggregation code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub region: String,
    pub month: NaiveDate,
    pub value: Option<f64>,
    pub converted: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyTotal {
    pub region: String,
    pub year: i32,
    pub total: f64,
}

/// Summed point estimate of a region's forecast inside one calendar year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionEstimate {
    pub region: String,
    pub year: i32,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub month: NaiveDate,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
}

/// A labelled delta inside a ranking row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaValue {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingRow {
    pub region: String,
    /// Actual totals, one per configured year, in configured order.
    pub totals: Vec<(i32, f64)>,
    pub target_year: i32,
    pub realized: f64,
    pub projected: f64,
    pub combined: f64,
    pub deltas: Vec<DeltaValue>,
    pub sort_key: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Historical,
    Forecast,
}

/// One point of a region's chart: history has no bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub region: String,
    pub month: NaiveDate,
    pub kind: SeriesKind,
    pub value: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ProjectionExportRow {
    #[serde(rename = "UF")]
    #[tabled(rename = "UF")]
    pub region: String,
    #[serde(rename = "Mes")]
    #[tabled(rename = "Mes")]
    pub month_label: String,
    #[serde(rename = "Projecao")]
    #[tabled(rename = "Projecao")]
    pub estimate: String,
    #[serde(rename = "LimiteInferior")]
    #[tabled(rename = "LimiteInferior")]
    pub lower: String,
    #[serde(rename = "LimiteSuperior")]
    #[tabled(rename = "LimiteSuperior")]
    pub upper: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionRow {
    pub region: String,
    pub year: i32,
    pub attempts: f64,
    pub converted: f64,
    /// `converted / attempts`; `None` without attempts or converted data.
    pub rate: Option<f64>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ConversionTableRow {
    #[serde(rename = "UF")]
    #[tabled(rename = "UF")]
    pub region: String,
    #[serde(rename = "Ano")]
    #[tabled(rename = "Ano")]
    pub year: i32,
    #[serde(rename = "Tentativas")]
    #[tabled(rename = "Tentativas")]
    pub attempts: String,
    #[serde(rename = "Convertidas")]
    #[tabled(rename = "Convertidas")]
    pub converted: String,
    #[serde(rename = "Taxa")]
    #[tabled(rename = "Taxa")]
    pub rate: String,
}
