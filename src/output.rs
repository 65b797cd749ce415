use crate::types::{DashboardView, JoinedFeature, MapView, SampleTable};
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use log::info;
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn write_sample_csv(path: &Path, sample: &SampleTable) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(&sample.headers)?;
    for row in &sample.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn to_feature(f: &JoinedFeature) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("name".to_string(), JsonValue::from(f.boundary_name.clone()));
    properties.insert("key".to_string(), JsonValue::from(f.key.clone()));
    properties.insert("total_cases".to_string(), JsonValue::from(f.total_cases));
    properties.insert("matched".to_string(), JsonValue::from(f.matched));
    properties.insert(
        "incidence".to_string(),
        f.incidence.map(JsonValue::from).unwrap_or(JsonValue::Null),
    );
    Feature {
        bbox: None,
        geometry: Some(f.geometry.clone()),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

pub fn joined_collection(features: &[JoinedFeature]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: features.iter().map(to_feature).collect(),
        foreign_members: None,
    }
}

pub fn write_geojson(path: &Path, features: &[JoinedFeature]) -> Result<(), Box<dyn Error>> {
    std::fs::write(path, serde_json::to_string(&joined_collection(features))?)?;
    Ok(())
}

/// Write every view to `out_dir`. Each file is attempted independently;
/// the returned list pairs file paths with their outcome.
pub fn export_view(
    view: &DashboardView,
    out_dir: &Path,
) -> Vec<(PathBuf, Result<(), Box<dyn Error>>)> {
    let mut results = Vec::new();
    if let Err(e) = std::fs::create_dir_all(out_dir) {
        results.push((out_dir.to_path_buf(), Err(e.into())));
        return results;
    }

    let path = out_dir.join("top_departments.csv");
    let r = write_csv(&path, &view.ranking);
    results.push((path, r));

    let path = out_dir.join("aggregates.csv");
    let r = write_csv(&path, &view.aggregates);
    results.push((path, r));

    let path = out_dir.join("kpis.json");
    let r = write_json(&path, &view.kpis);
    results.push((path, r));

    match &view.map {
        MapView::Available { features, stats } => {
            let path = out_dir.join("departments_joined.geojson");
            let r = write_geojson(&path, features);
            results.push((path, r));
            let path = out_dir.join("join_stats.json");
            let r = write_json(&path, stats);
            results.push((path, r));
        }
        MapView::Unavailable { .. } => {
            let path = out_dir.join("map_status.json");
            let r = write_json(&path, &view.map);
            results.push((path, r));
            let path = out_dir.join("department_markers.csv");
            let r = write_csv(&path, &view.markers);
            results.push((path, r));
        }
    }

    let path = out_dir.join("sample_rows.csv");
    let r = write_sample_csv(&path, &view.sample);
    results.push((path, r));

    for (p, r) in &results {
        if r.is_ok() {
            info!("wrote {}", p.display());
        }
    }
    results
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}
