use chrono::NaiveDate;
use serde::Serialize;
use tabled::Tabled;

/// A delimited table exactly as read from a source: header names plus
/// string cells. Short rows are padded so every row has `headers.len()`
/// cells.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(move |r| r.get(index).map(String::as_str).unwrap_or(""))
    }

    pub fn cell(&self, row: usize, index: usize) -> Option<&str> {
        self.rows.get(row)?.get(index).map(String::as_str)
    }
}

/// One row of the case dataset after schema normalization. `row` points
/// back into the `RawTable` so the view layer can show the untouched
/// demographic fields.
#[derive(Debug, Clone)]
pub struct CaseRecord {
    pub department: String,
    pub department_key: String,
    pub cases: u64,
    pub date: Option<NaiveDate>,
    pub population: Option<u64>,
    pub row: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cases,
    Incidence,
}

impl Metric {
    pub fn toggled(self) -> Metric {
        match self {
            Metric::Cases => Metric::Incidence,
            Metric::Incidence => Metric::Cases,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Cases => "Total cases",
            Metric::Incidence => "Incidence per 100k",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct DepartmentAggregate {
    #[serde(rename = "Department")]
    #[tabled(rename = "Department")]
    pub department: String,
    #[serde(rename = "Key")]
    #[tabled(rename = "Key")]
    pub department_key: String,
    #[serde(rename = "TotalCases")]
    #[tabled(rename = "TotalCases")]
    pub total_cases: u64,
    #[serde(rename = "Population")]
    #[tabled(rename = "Population", display_with = "display_population")]
    pub population: Option<u64>,
    #[serde(rename = "Incidence")]
    #[tabled(rename = "Incidence", display_with = "display_incidence")]
    pub incidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct RankingRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Department")]
    #[tabled(rename = "Department")]
    pub department: String,
    #[serde(rename = "TotalCases")]
    #[tabled(rename = "TotalCases")]
    pub total_cases: u64,
    #[serde(rename = "Incidence")]
    #[tabled(rename = "Incidence", display_with = "display_incidence")]
    pub incidence: Option<f64>,
}

fn display_incidence(v: &Option<f64>) -> String {
    match v {
        Some(v) => format!("{:.1}", v),
        None => "n/a".to_string(),
    }
}

fn display_population(v: &Option<u64>) -> String {
    match v {
        Some(v) => crate::util::format_int(*v),
        None => "n/a".to_string(),
    }
}

/// A named polygon record from the boundary source. `normalized_key` is
/// produced by `util::normalize_key`, the same function used for
/// `DepartmentAggregate::department_key`.
#[derive(Debug, Clone)]
pub struct GeoBoundary {
    pub boundary_name: String,
    pub geometry: geojson::Geometry,
    pub normalized_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinedFeature {
    pub boundary_name: String,
    pub key: String,
    pub geometry: geojson::Geometry,
    pub total_cases: u64,
    /// `false` when no aggregate shared this boundary's key; `total_cases`
    /// is then 0 but means "no data" rather than "zero cases".
    pub matched: bool,
    pub incidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinStats {
    pub boundaries: usize,
    pub matched: usize,
    pub unmatched_boundaries: Vec<String>,
    pub unmatched_aggregates: Vec<String>,
    pub duplicate_boundary_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MapView {
    Available {
        features: Vec<JoinedFeature>,
        stats: JoinStats,
    },
    Unavailable {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentMarker {
    pub department: String,
    pub lat: f64,
    pub lon: f64,
    pub total_cases: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub total_cases_sum: u64,
    pub department_count: usize,
    pub mean_per_department: f64,
    pub total_population: Option<u64>,
    pub pooled_incidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Everything the presentation layer needs for one (dataset, filter)
/// pair. Rebuilt from scratch on every filter change.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub filter: Option<String>,
    pub metric: Metric,
    pub ranking: Vec<RankingRow>,
    pub aggregates: Vec<DepartmentAggregate>,
    pub kpis: KpiSummary,
    pub map: MapView,
    pub markers: Vec<DepartmentMarker>,
    pub sample: SampleTable,
}
