use crate::types::Metric;
use clap::Parser;
use std::path::PathBuf;

/// Department-level COVID-19 case dashboard for Colombia: aggregates a case
/// table per department, joins it to department boundaries and exports the
/// ranking, KPI, map and sample views.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) Delimited case table (comma, semicolon or tab; UTF-8 or Latin-1).
    /// When omitted, a few default locations are tried before falling back to the
    /// built-in department table. A path given here must exist.
    #[arg(long)]
    pub cases: Option<PathBuf>,

    /// (file path) GeoJSON FeatureCollection with one polygon per department.
    /// Without it the map view is reported as unavailable.
    #[arg(long)]
    pub boundaries: Option<PathBuf>,

    /// Feature property holding the department name. Can be repeated; tried in order.
    #[arg(long = "boundary-name-property")]
    pub boundary_name_property: Vec<String>,

    /// Number of departments in the ranking.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Number of raw rows in the sample table.
    #[arg(long, default_value_t = 20)]
    pub sample: usize,

    /// Directory for exported files.
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Initial department filter.
    #[arg(long)]
    pub filter: Option<String>,

    /// Initial ranking metric.
    #[arg(long, value_enum, default_value_t = Metric::Cases)]
    pub metric: Metric,

    /// Generate the views once for --filter/--metric and exit.
    #[arg(long)]
    pub batch: bool,

    /// Fail when no department column can be detected instead of grouping
    /// everything under a single constant department.
    #[arg(long)]
    pub strict_schema: bool,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[arg(long)]
    pub verbose: bool,
}
