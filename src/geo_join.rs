// Department boundaries and the join of case aggregates onto them.
//
// Boundaries come from a GeoJSON `FeatureCollection` whose features carry
// the department name in one of a few well-known properties. The join is a
// left join on the normalized key: every boundary yields exactly one
// [`JoinedFeature`], unmatched ones with zero cases.

use crate::error::BoundaryError;
use crate::types::{DepartmentAggregate, GeoBoundary, JoinStats, JoinedFeature};
use crate::util::{decode_text, normalize_key};
use geojson::{Feature, GeoJson};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Property names holding the department name, in the order they are tried.
pub const DEFAULT_NAME_PROPERTIES: &[&str] = &[
    "NOMBRE_DPT",
    "DPTO_CNMBR",
    "DPTO_NOMBRE",
    "departamento",
    "NAME_1",
    "name",
];

fn feature_name<'a>(feature: &'a Feature, properties: &[String]) -> Option<&'a str> {
    properties
        .iter()
        .filter_map(|key| feature.property(key))
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Parse boundary records out of GeoJSON text. Features without a name or
/// without a geometry are skipped.
pub fn parse_boundaries(
    text: &str,
    name_properties: &[String],
) -> Result<Vec<GeoBoundary>, geojson::Error> {
    let properties: Vec<String> = if name_properties.is_empty() {
        DEFAULT_NAME_PROPERTIES.iter().map(|s| s.to_string()).collect()
    } else {
        name_properties.to_vec()
    };

    let features = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => Vec::new(),
    };

    let mut skipped = 0usize;
    let mut boundaries = Vec::with_capacity(features.len());
    for feature in &features {
        let (Some(name), Some(geometry)) = (feature_name(feature, &properties), &feature.geometry)
        else {
            skipped += 1;
            continue;
        };
        boundaries.push(GeoBoundary {
            boundary_name: name.to_string(),
            geometry: geometry.clone(),
            normalized_key: normalize_key(name),
        });
    }
    if skipped > 0 {
        debug!("{} boundary features without name or geometry", skipped);
    }
    Ok(boundaries)
}

pub fn read_boundaries(
    path: &Path,
    name_properties: &[String],
) -> Result<Vec<GeoBoundary>, BoundaryError> {
    let bytes = std::fs::read(path).map_err(|source| BoundaryError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let (text, _) = decode_text(&bytes);
    let boundaries =
        parse_boundaries(&text, name_properties).map_err(|source| BoundaryError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    if boundaries.is_empty() {
        let looked_for = if name_properties.is_empty() {
            DEFAULT_NAME_PROPERTIES.join(", ")
        } else {
            name_properties.join(", ")
        };
        return Err(BoundaryError::NoUsableFeatures { looked_for });
    }
    Ok(boundaries)
}

/// Left join of boundaries to aggregates on the normalized key.
///
/// The output has one feature per boundary, in boundary order. Keys present
/// on only one side are reported in the returned stats and logged.
pub fn join(
    boundaries: &[GeoBoundary],
    aggregates: &[DepartmentAggregate],
) -> (Vec<JoinedFeature>, JoinStats) {
    let by_key: HashMap<&str, &DepartmentAggregate> = aggregates
        .iter()
        .map(|a| (a.department_key.as_str(), a))
        .collect();

    let mut stats = JoinStats {
        boundaries: boundaries.len(),
        ..JoinStats::default()
    };
    let mut boundary_keys: HashSet<&str> = HashSet::new();
    let mut features = Vec::with_capacity(boundaries.len());

    for b in boundaries {
        if !boundary_keys.insert(b.normalized_key.as_str()) {
            stats.duplicate_boundary_keys.push(b.normalized_key.clone());
        }
        let agg = by_key.get(b.normalized_key.as_str());
        match agg {
            Some(_) => stats.matched += 1,
            None => stats.unmatched_boundaries.push(b.normalized_key.clone()),
        }
        features.push(JoinedFeature {
            boundary_name: b.boundary_name.clone(),
            key: b.normalized_key.clone(),
            geometry: b.geometry.clone(),
            total_cases: agg.map(|a| a.total_cases).unwrap_or(0),
            matched: agg.is_some(),
            incidence: agg.and_then(|a| a.incidence),
        });
    }

    stats.unmatched_aggregates = aggregates
        .iter()
        .filter(|a| !boundary_keys.contains(a.department_key.as_str()))
        .map(|a| a.department_key.clone())
        .collect();

    if !stats.duplicate_boundary_keys.is_empty() {
        warn!(
            "duplicate boundary keys: {}",
            stats.duplicate_boundary_keys.join(", ")
        );
    }
    if !stats.unmatched_boundaries.is_empty() || !stats.unmatched_aggregates.is_empty() {
        warn!(
            "join: {} of {} boundaries matched; {} boundaries without cases, {} departments without a boundary",
            stats.matched,
            stats.boundaries,
            stats.unmatched_boundaries.len(),
            stats.unmatched_aggregates.len()
        );
        debug!("boundaries without cases: {:?}", stats.unmatched_boundaries);
        debug!("departments without a boundary: {:?}", stats.unmatched_aggregates);
    }
    (features, stats)
}
