// Built-in department reference data.
//
// Doubles as the inline literal case table used when no case file is
// available (2021 reported cases per department), and as the population
// and centroid lookup for incidence and the scatter fallback map.
use crate::types::RawTable;
use crate::util::normalize_key;
use std::collections::HashMap;

pub struct DepartmentRef {
    pub name: &'static str,
    pub cases: u64,
    pub population: u64,
    pub lat: f64,
    pub lon: f64,
    /// Other spellings used by the national case export or boundary files.
    pub aliases: &'static [&'static str],
}

pub const DEPARTMENTS: &[DepartmentRef] = &[
    DepartmentRef { name: "Bogotá D.C.", cases: 65908, population: 8_000_000, lat: 4.7110, lon: -74.0721, aliases: &["Bogotá", "Santafé de Bogotá D.C.", "Bogotá, D.C."] },
    DepartmentRef { name: "Antioquia", cases: 39941, population: 6_400_000, lat: 6.2442, lon: -75.5812, aliases: &[] },
    DepartmentRef { name: "Valle del Cauca", cases: 27108, population: 4_500_000, lat: 3.4516, lon: -76.5320, aliases: &["Valle"] },
    DepartmentRef { name: "Atlántico", cases: 17058, population: 2_500_000, lat: 10.9685, lon: -74.7813, aliases: &[] },
    DepartmentRef { name: "Córdoba", cases: 15566, population: 1_700_000, lat: 8.7479, lon: -75.8814, aliases: &[] },
    DepartmentRef { name: "Santander", cases: 15000, population: 2_200_000, lat: 7.1193, lon: -73.1227, aliases: &[] },
    DepartmentRef { name: "Cundinamarca", cases: 14000, population: 2_800_000, lat: 5.0260, lon: -74.0300, aliases: &[] },
    DepartmentRef { name: "Bolívar", cases: 12000, population: 2_100_000, lat: 10.3910, lon: -75.4794, aliases: &[] },
    DepartmentRef { name: "Nariño", cases: 11000, population: 1_600_000, lat: 1.2136, lon: -77.2811, aliases: &[] },
    DepartmentRef { name: "Boyacá", cases: 10000, population: 1_200_000, lat: 5.5353, lon: -73.3678, aliases: &[] },
    DepartmentRef { name: "Magdalena", cases: 9500, population: 1_400_000, lat: 11.2408, lon: -74.1990, aliases: &[] },
    DepartmentRef { name: "Cesar", cases: 9000, population: 1_200_000, lat: 10.4631, lon: -73.2532, aliases: &[] },
    DepartmentRef { name: "Tolima", cases: 8500, population: 1_300_000, lat: 4.4389, lon: -75.2322, aliases: &[] },
    DepartmentRef { name: "Caldas", cases: 8000, population: 1_000_000, lat: 5.0703, lon: -75.5138, aliases: &[] },
    DepartmentRef { name: "Huila", cases: 7500, population: 1_100_000, lat: 2.9273, lon: -75.2819, aliases: &[] },
    DepartmentRef { name: "Sucre", cases: 7000, population: 850_000, lat: 9.3047, lon: -75.3978, aliases: &[] },
    DepartmentRef { name: "La Guajira", cases: 6500, population: 880_000, lat: 11.5444, lon: -72.9072, aliases: &["Guajira"] },
    DepartmentRef { name: "Cauca", cases: 6000, population: 1_300_000, lat: 2.4448, lon: -76.6147, aliases: &[] },
    DepartmentRef { name: "Risaralda", cases: 5500, population: 940_000, lat: 4.8133, lon: -75.6961, aliases: &[] },
    DepartmentRef { name: "Norte de Santander", cases: 5000, population: 1_600_000, lat: 7.8939, lon: -72.5078, aliases: &["Norte Santander"] },
    DepartmentRef { name: "Quindío", cases: 4500, population: 540_000, lat: 4.5339, lon: -75.6811, aliases: &[] },
    DepartmentRef { name: "Meta", cases: 4000, population: 1_000_000, lat: 4.1420, lon: -73.6266, aliases: &[] },
    DepartmentRef { name: "Chocó", cases: 3500, population: 500_000, lat: 5.6947, lon: -76.6611, aliases: &[] },
    DepartmentRef { name: "Casanare", cases: 3000, population: 420_000, lat: 5.3378, lon: -72.3959, aliases: &[] },
    DepartmentRef { name: "Arauca", cases: 2500, population: 300_000, lat: 7.0903, lon: -70.7617, aliases: &[] },
    DepartmentRef { name: "Putumayo", cases: 2000, population: 350_000, lat: 1.1489, lon: -76.6464, aliases: &[] },
    DepartmentRef { name: "Caquetá", cases: 1500, population: 400_000, lat: 1.6144, lon: -75.6062, aliases: &[] },
    DepartmentRef { name: "San Andrés", cases: 3000, population: 75_000, lat: 12.5847, lon: -81.7006, aliases: &["San Andrés y Providencia", "Archipiélago de San Andrés, Providencia y Santa Catalina", "Archipiélago de San Andrés"] },
    DepartmentRef { name: "Amazonas", cases: 5, population: 76_000, lat: -4.2153, lon: -69.9406, aliases: &[] },
    DepartmentRef { name: "Guainía", cases: 5, population: 48_000, lat: 3.8653, lon: -67.9239, aliases: &[] },
    DepartmentRef { name: "Guaviare", cases: 5, population: 82_000, lat: 2.5729, lon: -72.6459, aliases: &[] },
    DepartmentRef { name: "Vaupés", cases: 5, population: 44_000, lat: 1.2519, lon: -70.2339, aliases: &[] },
    DepartmentRef { name: "Vichada", cases: 5, population: 110_000, lat: 6.1892, lon: -67.4859, aliases: &[] },
];

/// The inline literal table, shaped like a pre-aggregated export so it
/// goes through the same schema detection as a real file.
pub fn builtin_case_table() -> RawTable {
    RawTable {
        headers: vec![
            "Departamento".to_string(),
            "casos".to_string(),
            "poblacion".to_string(),
        ],
        rows: DEPARTMENTS
            .iter()
            .map(|d| {
                vec![
                    d.name.to_string(),
                    d.cases.to_string(),
                    d.population.to_string(),
                ]
            })
            .collect(),
    }
}

fn keyed<T: Copy>(value: impl Fn(&DepartmentRef) -> T) -> HashMap<String, T> {
    let mut map = HashMap::new();
    for d in DEPARTMENTS {
        map.insert(normalize_key(d.name), value(d));
        for alias in d.aliases {
            map.insert(normalize_key(alias), value(d));
        }
    }
    map
}

/// Population by normalized key, aliases included.
pub fn populations() -> HashMap<String, u64> {
    keyed(|d| d.population)
}

/// (lat, lon) by normalized key, aliases included.
pub fn centroids() -> HashMap<String, (f64, f64)> {
    keyed(|d| (d.lat, d.lon))
}
