// Presentation-ready views derived from one filtered aggregate set.
//
// Each view is a pure function of (dataset, filter, metric). Nothing here
// keeps state between calls; changing the filter rebuilds everything.
use crate::aggregate::{aggregate, filter_records};
use crate::geo_join::join;
use crate::loader::{BoundaryState, Dataset};
use crate::types::{
    CaseRecord, DashboardView, DepartmentAggregate, DepartmentMarker, KpiSummary, MapView,
    Metric, RankingRow, RawTable, SampleTable,
};
use crate::util::{mean_or_zero, round1};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct ViewOptions {
    pub top_n: usize,
    pub sample_rows: usize,
}

impl Default for ViewOptions {
    fn default() -> Self {
        ViewOptions {
            top_n: 10,
            sample_rows: 20,
        }
    }
}

fn ranking_rows<'a>(sorted: impl Iterator<Item = &'a DepartmentAggregate>, n: usize) -> Vec<RankingRow> {
    sorted
        .take(n)
        .enumerate()
        .map(|(idx, a)| RankingRow {
            rank: idx + 1,
            department: a.department.clone(),
            total_cases: a.total_cases,
            incidence: a.incidence,
        })
        .collect()
}

/// The `n` departments with the most cases, descending. Ties keep their
/// input order.
pub fn top_n(aggregates: &[DepartmentAggregate], n: usize) -> Vec<RankingRow> {
    let mut sorted: Vec<&DepartmentAggregate> = aggregates.iter().collect();
    sorted.sort_by(|a, b| b.total_cases.cmp(&a.total_cases));
    ranking_rows(sorted.into_iter(), n)
}

/// Like [`top_n`] but ranked by `metric`. Ranking by incidence puts
/// departments with unknown incidence after every known one.
pub fn top_n_by(aggregates: &[DepartmentAggregate], n: usize, metric: Metric) -> Vec<RankingRow> {
    if metric == Metric::Cases {
        return top_n(aggregates, n);
    }
    let mut sorted: Vec<&DepartmentAggregate> = aggregates.iter().collect();
    sorted.sort_by(|a, b| match (a.incidence, b.incidence) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    ranking_rows(sorted.into_iter(), n)
}

pub fn kpis(aggregates: &[DepartmentAggregate]) -> KpiSummary {
    let total_cases_sum = aggregates
        .iter()
        .map(|a| a.total_cases)
        .fold(0, u64::saturating_add);
    let department_count = aggregates.len();

    let with_population: Vec<(u64, u64)> = aggregates
        .iter()
        .filter_map(|a| a.population.map(|p| (a.total_cases, p)))
        .collect();
    let total_population = if with_population.is_empty() {
        None
    } else {
        Some(
            with_population
                .iter()
                .map(|(_, p)| *p)
                .fold(0, u64::saturating_add),
        )
    };
    let pooled_incidence = total_population.filter(|p| *p > 0).map(|p| {
        let cases = with_population
            .iter()
            .map(|(c, _)| *c)
            .fold(0, u64::saturating_add);
        round1(cases as f64 / p as f64 * 100_000.0)
    });

    KpiSummary {
        total_cases_sum,
        department_count,
        mean_per_department: mean_or_zero(total_cases_sum, department_count),
        total_population,
        pooled_incidence,
    }
}

/// Bubble-map points for departments with a known centroid.
pub fn markers(
    aggregates: &[DepartmentAggregate],
    centroids: &HashMap<String, (f64, f64)>,
) -> Vec<DepartmentMarker> {
    aggregates
        .iter()
        .filter_map(|a| {
            let (lat, lon) = centroids.get(&a.department_key)?;
            Some(DepartmentMarker {
                department: a.department.clone(),
                lat: *lat,
                lon: *lon,
                total_cases: a.total_cases,
            })
        })
        .collect()
}

/// The first `n` filtered rows, with every source column.
pub fn sample_rows(table: &RawTable, records: &[&CaseRecord], n: usize) -> SampleTable {
    SampleTable {
        headers: table.headers.clone(),
        rows: records
            .iter()
            .take(n)
            .filter_map(|r| table.rows.get(r.row).cloned())
            .collect(),
    }
}

pub fn map_view(boundaries: &BoundaryState, aggregates: &[DepartmentAggregate]) -> MapView {
    match boundaries {
        BoundaryState::Loaded(b) => {
            let (features, stats) = join(b, aggregates);
            MapView::Available { features, stats }
        }
        BoundaryState::Unavailable(reason) => MapView::Unavailable {
            reason: reason.clone(),
        },
    }
}

/// Rebuild every view for `filter`. An unknown department gives empty
/// rankings, zero KPIs and an all-zero map, never an error.
pub fn build_view(
    dataset: &Dataset,
    filter: Option<&str>,
    metric: Metric,
    opts: &ViewOptions,
) -> DashboardView {
    let filtered = filter_records(&dataset.records, filter);
    let aggregates = aggregate(&filtered, &dataset.populations);

    DashboardView {
        filter: filter.map(str::to_string),
        metric,
        ranking: top_n_by(&aggregates, opts.top_n, metric),
        kpis: kpis(&aggregates),
        map: map_view(&dataset.boundaries, &aggregates),
        markers: markers(&aggregates, &dataset.centroids),
        sample: sample_rows(&dataset.table, &filtered, opts.sample_rows),
        aggregates,
    }
}
