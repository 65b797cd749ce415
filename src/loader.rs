use crate::error::{BoundaryError, DashResult, DashboardError};
use crate::geo_join;
use crate::reference;
use crate::schema::{detect_schema, DepartmentColumn, DetectedSchema};
use crate::types::{CaseRecord, GeoBoundary, RawTable};
use crate::util::{decode_text, normalize_key, parse_count_safe, parse_date_safe, TextEncoding};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Looked up in order when no case file is given on the command line.
pub const DEFAULT_CASE_PATHS: &[&str] = &[
    "data/casos_covid_colombia.csv",
    "data/Casos_positivos_de_COVID-19_en_Colombia.csv",
    "casos_covid_colombia.csv",
];

pub const DEFAULT_BOUNDARY_PATHS: &[&str] = &[
    "data/colombia.geo.json",
    "data/departamentos.geojson",
    "colombia.geo.json",
];

/// Outcome of a single resolver in a fallback chain.
pub enum Resolution<T> {
    Loaded(T),
    NotFound(String),
}

pub type Resolver<'a, T> = Box<dyn FnOnce() -> Resolution<T> + 'a>;

/// Run resolvers left to right and stop at the first one that loads.
/// On exhaustion every "not found" reason is returned, in order.
pub fn first_resolved<T>(resolvers: Vec<Resolver<'_, T>>) -> Result<T, Vec<String>> {
    let mut misses = Vec::new();
    for resolve in resolvers {
        match resolve() {
            Resolution::Loaded(v) => return Ok(v),
            Resolution::NotFound(reason) => {
                debug!("resolver miss: {}", reason);
                misses.push(reason);
            }
        }
    }
    Err(misses)
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseSource {
    File { path: PathBuf, encoding: TextEncoding },
    Builtin,
}

impl fmt::Display for CaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseSource::File { path, encoding } => {
                write!(f, "{} ({:?})", path.display(), encoding)
            }
            CaseSource::Builtin => write!(f, "built-in department table"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub cases: Option<PathBuf>,
    pub boundaries: Option<PathBuf>,
    pub name_properties: Vec<String>,
    pub strict_schema: bool,
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub source: CaseSource,
    pub schema: DetectedSchema,
    pub total_rows: usize,
    pub skipped_rows: usize,
    pub invalid_counts: usize,
    pub unparseable_dates: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub enum BoundaryState {
    Loaded(Vec<GeoBoundary>),
    Unavailable(String),
}

/// The immutable inputs of every recomputation. Built once at startup.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub table: RawTable,
    pub records: Vec<CaseRecord>,
    pub populations: HashMap<String, u64>,
    pub centroids: HashMap<String, (f64, f64)>,
    pub boundaries: BoundaryState,
    pub report: LoadReport,
}

impl Dataset {
    pub fn load(opts: &LoadOptions) -> DashResult<Dataset> {
        let (table, source) = load_case_table(opts.cases.as_deref())?;
        info!(
            "case source: {} ({} rows, {} columns)",
            source,
            table.rows.len(),
            table.headers.len()
        );
        let schema = detect_schema(&table, opts.strict_schema)?;
        info!("detected schema: {}", schema);
        if schema.count_is_synthesized() {
            info!("no case-count column, counting one case per row");
        }

        let (records, stats) = build_records(&table, &schema);
        let populations = merge_populations(&records);

        let boundaries = match load_boundaries(opts.boundaries.as_deref(), &opts.name_properties) {
            Ok(b) => {
                info!("loaded {} department boundaries", b.len());
                BoundaryState::Loaded(b)
            }
            Err(e) => {
                warn!("map unavailable: {}", e);
                BoundaryState::Unavailable(e.to_string())
            }
        };

        let report = LoadReport {
            source,
            schema,
            total_rows: table.rows.len(),
            skipped_rows: stats.skipped_rows,
            invalid_counts: stats.invalid_counts,
            unparseable_dates: stats.unparseable_dates,
            first_date: records.iter().filter_map(|r| r.date).min(),
            last_date: records.iter().filter_map(|r| r.date).max(),
        };

        Ok(Dataset {
            table,
            records,
            populations,
            centroids: reference::centroids(),
            boundaries,
            report,
        })
    }

    /// Department display names, in first-seen order.
    pub fn departments(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.department_key.as_str()))
            .map(|r| r.department.as_str())
            .collect()
    }
}

fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    let count = |c: char| header.matches(c).count();
    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|d| (count(*d as char), *d == b','))
        .unwrap_or(b',')
}

pub fn parse_table(text: &str) -> DashResult<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .delimiter(sniff_delimiter(text))
        .from_reader(text.as_bytes());
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }
    Ok(RawTable { headers, rows })
}

pub fn read_table(path: &Path) -> DashResult<(RawTable, TextEncoding)> {
    let bytes = std::fs::read(path)?;
    let (text, encoding) = decode_text(&bytes);
    if encoding == TextEncoding::Latin1 {
        debug!("{} is not valid UTF-8, read as Latin-1", path.display());
    }
    Ok((parse_table(&text)?, encoding))
}

/// An explicit path must load; without one, the default paths are tried
/// and the built-in table closes the chain.
pub fn load_case_table(explicit: Option<&Path>) -> DashResult<(RawTable, CaseSource)> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(DashboardError::CaseSourceMissing(path.to_path_buf()));
        }
        let (table, encoding) = read_table(path)?;
        let source = CaseSource::File {
            path: path.to_path_buf(),
            encoding,
        };
        return Ok((table, source));
    }

    let mut resolvers: Vec<Resolver<'static, (RawTable, CaseSource)>> = DEFAULT_CASE_PATHS
        .iter()
        .map(|p| Box::new(move || resolve_case_file(Path::new(p))) as Resolver<'static, _>)
        .collect();
    resolvers.push(Box::new(|| {
        Resolution::Loaded((reference::builtin_case_table(), CaseSource::Builtin))
    }));

    first_resolved(resolvers).map_err(|tried| DashboardError::CaseSourceUnreadable {
        tried: tried.join("; "),
    })
}

fn resolve_case_file(path: &Path) -> Resolution<(RawTable, CaseSource)> {
    if !path.exists() {
        return Resolution::NotFound(format!("{} does not exist", path.display()));
    }
    match read_table(path) {
        Ok((table, _)) if table.headers.is_empty() => {
            Resolution::NotFound(format!("{} has no header row", path.display()))
        }
        Ok((table, encoding)) => Resolution::Loaded((
            table,
            CaseSource::File {
                path: path.to_path_buf(),
                encoding,
            },
        )),
        Err(e) => {
            warn!("skipping unreadable case file {}: {}", path.display(), e);
            Resolution::NotFound(format!("{}: {}", path.display(), e))
        }
    }
}

pub fn load_boundaries(
    explicit: Option<&Path>,
    name_properties: &[String],
) -> Result<Vec<GeoBoundary>, BoundaryError> {
    if let Some(path) = explicit {
        return geo_join::read_boundaries(path, name_properties);
    }
    let defaults: Vec<&Path> = DEFAULT_BOUNDARY_PATHS.iter().map(Path::new).collect();
    first_boundary_file(&defaults, name_properties)
}

/// Try each candidate in order; a missing or broken file falls through to
/// the next one.
fn first_boundary_file(
    candidates: &[&Path],
    name_properties: &[String],
) -> Result<Vec<GeoBoundary>, BoundaryError> {
    let resolvers: Vec<Resolver<'_, Vec<GeoBoundary>>> = candidates
        .iter()
        .map(|&path| {
            Box::new(move || {
                if !path.exists() {
                    return Resolution::NotFound(format!("{} does not exist", path.display()));
                }
                match geo_join::read_boundaries(path, name_properties) {
                    Ok(b) => Resolution::Loaded(b),
                    Err(e) => {
                        warn!("skipping boundary source: {}", e);
                        Resolution::NotFound(e.to_string())
                    }
                }
            }) as Resolver<'_, _>
        })
        .collect();

    first_resolved(resolvers).map_err(|tried| {
        if candidates.iter().any(|p| p.exists()) {
            BoundaryError::Exhausted {
                tried: tried.join("; "),
            }
        } else {
            BoundaryError::NotConfigured
        }
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStats {
    pub skipped_rows: usize,
    pub invalid_counts: usize,
    pub unparseable_dates: usize,
}

/// Turn table rows into `CaseRecord`s using the detected schema.
///
/// Rows with a blank department are skipped. When the count column is
/// synthesized every row weighs 1; otherwise unparseable counts weigh 0 and
/// are tallied in `invalid_counts`.
pub fn build_records(table: &RawTable, schema: &DetectedSchema) -> (Vec<CaseRecord>, RecordStats) {
    let mut stats = RecordStats::default();
    let mut records = Vec::with_capacity(table.rows.len());

    for row in 0..table.rows.len() {
        let department = match &schema.department {
            DepartmentColumn::Column(m) => table.cell(row, m.index).unwrap_or("").trim(),
            DepartmentColumn::Constant(c) => c.as_str(),
        };
        let department_key = normalize_key(department);
        if department_key.is_empty() {
            stats.skipped_rows += 1;
            continue;
        }

        let cases = match &schema.count {
            None => 1,
            Some(m) => match parse_count_safe(table.cell(row, m.index)) {
                Some(v) => v,
                None => {
                    stats.invalid_counts += 1;
                    0
                }
            },
        };

        let date = schema.date.as_ref().and_then(|m| {
            let raw = table.cell(row, m.index);
            let parsed = parse_date_safe(raw);
            if parsed.is_none() && raw.is_some_and(|s| !s.trim().is_empty()) {
                stats.unparseable_dates += 1;
            }
            parsed
        });

        let population = schema
            .population
            .as_ref()
            .and_then(|m| parse_count_safe(table.cell(row, m.index)))
            .filter(|p| *p > 0);

        records.push(CaseRecord {
            department: department.to_string(),
            department_key,
            cases,
            date,
            population,
            row,
        });
    }

    if stats.skipped_rows > 0 {
        warn!("{} rows skipped: blank department", stats.skipped_rows);
    }
    if stats.invalid_counts > 0 {
        warn!("{} rows with an unreadable case count", stats.invalid_counts);
    }
    if stats.unparseable_dates > 0 {
        debug!("{} dates could not be parsed", stats.unparseable_dates);
    }
    (records, stats)
}

/// Reference populations, overridden by the first positive population the
/// case source gives for a department.
pub fn merge_populations(records: &[CaseRecord]) -> HashMap<String, u64> {
    let mut merged = reference::populations();
    let mut from_source: HashMap<&str, u64> = HashMap::new();
    for r in records {
        if let Some(p) = r.population {
            from_source.entry(r.department_key.as_str()).or_insert(p);
        }
    }
    for (k, p) in from_source {
        merged.insert(k.to_string(), p);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("covid_dept_dashboard_{}_{}", std::process::id(), name))
    }

    #[test]
    fn semicolon_and_short_rows() {
        let t = parse_table("Departamento;Edad\nMeta;30\nHuila\n").unwrap();
        assert_eq!(t.headers, vec!["Departamento", "Edad"]);
        assert_eq!(t.rows[1], vec!["Huila".to_string(), String::new()]);
    }

    #[test]
    fn latin1_file_is_read() {
        let path = temp_path("latin1.csv");
        fs::write(&path, b"departamento,casos\nBogot\xE1,3\nQuind\xEDo,2\n").unwrap();
        let (t, enc) = read_table(&path).unwrap();
        assert_eq!(enc, TextEncoding::Latin1);
        assert_eq!(t.rows[0][0], "Bogotá");
        assert_eq!(t.rows[1][0], "Quindío");
        fs::remove_file(&path).ok();
    }

    #[test]
    fn explicit_missing_case_file_is_fatal() {
        let path = temp_path("does_not_exist.csv");
        let err = load_case_table(Some(&path)).unwrap_err();
        assert!(matches!(err, DashboardError::CaseSourceMissing(_)));
    }

    #[test]
    fn resolver_chain_short_circuits() {
        let resolvers: Vec<Resolver<'_, u8>> = vec![
            Box::new(|| Resolution::NotFound("first".into())),
            Box::new(|| Resolution::Loaded(2)),
            Box::new(|| -> Resolution<u8> { panic!("must not run") }),
        ];
        assert_eq!(first_resolved(resolvers), Ok(2));

        let resolvers: Vec<Resolver<'_, u8>> = vec![
            Box::new(|| Resolution::NotFound("a".into())),
            Box::new(|| Resolution::NotFound("b".into())),
        ];
        assert_eq!(first_resolved(resolvers), Err(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn rows_are_one_case_each_without_count_column() {
        let t = parse_table("departamento,edad\nA,10\nA,5\nB,3\n , 1\n").unwrap();
        let schema = detect_schema(&t, true).unwrap();
        let (records, stats) = build_records(&t, &schema);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.cases == 1));
        assert_eq!(stats.skipped_rows, 1);
    }

    #[test]
    fn bad_counts_and_dates_are_tallied() {
        let t = parse_table(
            "departamento,casos,fecha\nMeta,4,2021-01-02\nMeta,x,ayer\nHuila,2,\n",
        )
        .unwrap();
        let schema = detect_schema(&t, true).unwrap();
        let (records, stats) = build_records(&t, &schema);
        assert_eq!(records.iter().map(|r| r.cases).sum::<u64>(), 6);
        assert_eq!(stats.invalid_counts, 1);
        assert_eq!(stats.unparseable_dates, 1);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2021, 1, 2));
    }

    #[test]
    fn source_population_overrides_reference() {
        let t = parse_table("departamento,casos,poblacion\nMeta,4,2000\nMeta,1,9999\n").unwrap();
        let schema = detect_schema(&t, true).unwrap();
        let (records, _) = build_records(&t, &schema);
        let pops = merge_populations(&records);
        assert_eq!(pops.get("META"), Some(&2000));
        assert_eq!(pops.get("HUILA"), Some(&1_100_000));
    }

    const ONE_FEATURE: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"NOMBRE_DPT": "META"},
         "geometry": {"type": "Point", "coordinates": [-73.6, 4.1]}}]}"#;

    #[test]
    fn builtin_table_is_a_summed_source() {
        let t = reference::builtin_case_table();
        let schema = detect_schema(&t, true).unwrap();
        assert!(!schema.count_is_synthesized());
        assert_eq!(schema.count.as_ref().map(|m| m.name.as_str()), Some("casos"));
        assert_eq!(schema.population.as_ref().map(|m| m.name.as_str()), Some("poblacion"));

        let (records, stats) = build_records(&t, &schema);
        assert_eq!(stats, RecordStats::default());
        let refs: Vec<&CaseRecord> = records.iter().collect();
        let aggs = crate::aggregate::aggregate(&refs, &merge_populations(&records));
        assert_eq!(aggs.len(), 33);
        assert_eq!(aggs[0].department, "Bogotá D.C.");
        assert_eq!(aggs[0].total_cases, 65_908);
        assert_eq!(aggs[0].incidence, Some(823.9));
    }

    #[test]
    fn broken_boundary_file_falls_through_to_next() {
        let broken = temp_path("broken.geo.json");
        let valid = temp_path("valid.geojson");
        fs::write(&broken, "{ not json").unwrap();
        fs::write(&valid, ONE_FEATURE).unwrap();

        let b = first_boundary_file(&[broken.as_path(), valid.as_path()], &[]).unwrap();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].normalized_key, "META");

        let err = first_boundary_file(&[broken.as_path()], &[]).unwrap_err();
        assert!(matches!(err, BoundaryError::Exhausted { .. }));
        let missing = temp_path("nowhere.geojson");
        let err = first_boundary_file(&[missing.as_path()], &[]).unwrap_err();
        assert!(matches!(err, BoundaryError::NotConfigured));

        fs::remove_file(&broken).ok();
        fs::remove_file(&valid).ok();
    }

    #[test]
    fn oversized_counts_are_rejected() {
        let t = parse_table("departamento,casos\nMeta,99999999999999999999\nMeta,5\n").unwrap();
        let schema = detect_schema(&t, true).unwrap();
        let (records, stats) = build_records(&t, &schema);
        assert_eq!(stats.invalid_counts, 1);
        assert_eq!(records.iter().map(|r| r.cases).collect::<Vec<_>>(), vec![0, 5]);
    }

    #[test]
    fn dataset_without_boundaries_degrades() {
        let cases = temp_path("cases.csv");
        fs::write(&cases, "Departamento,casos\nMeta,4\nHuila,2\n").unwrap();
        let opts = LoadOptions {
            cases: Some(cases.clone()),
            boundaries: Some(temp_path("missing.geojson")),
            ..LoadOptions::default()
        };
        let ds = Dataset::load(&opts).unwrap();
        assert!(matches!(ds.boundaries, BoundaryState::Unavailable(_)));
        assert_eq!(ds.departments(), vec!["Meta", "Huila"]);
        fs::remove_file(&cases).ok();
    }
}
