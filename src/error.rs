// Error taxonomy.
//
// `DashboardError` covers fatal load problems: the process does not start
// serving if one of these surfaces. `BoundaryError` covers the degraded
// path: the map is replaced by an "unavailable" signal and every other view
// keeps working.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("case source {} does not exist", .0.display())]
    CaseSourceMissing(PathBuf),
    #[error("no case source could be loaded (tried: {tried})")]
    CaseSourceUnreadable { tried: String },
    #[error("malformed delimited data: {0}")]
    Csv(#[from] csv::Error),
    #[error("no department-like column among [{columns}]")]
    NoDepartmentColumn { columns: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("datasets were already initialised")]
    AlreadyLoaded,
}

#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("no boundary source configured or found")]
    NotConfigured,
    #[error("boundary source {} could not be read: {}", .path.display(), .source)]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("boundary source {} is not valid GeoJSON: {}", .path.display(), .source)]
    Malformed {
        path: PathBuf,
        #[source]
        source: geojson::Error,
    },
    #[error("no usable boundary source (tried: {tried})")]
    Exhausted { tried: String },
    #[error("boundary source has no features with a usable name property (looked for: {looked_for})")]
    NoUsableFeatures { looked_for: String },
}

pub type DashResult<T> = Result<T, DashboardError>;
