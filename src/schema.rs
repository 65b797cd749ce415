// Schema detection for case tables of unknown shape.
//
// Every target column is described by an ordered list of rules. Rules are
// evaluated in priority order, each against every column in header order,
// and the first hit wins. The chosen column (or the synthesized stand-in)
// is kept in `DetectedSchema` so callers can log and test it.
use crate::error::{DashResult, DashboardError};
use crate::types::RawTable;
use crate::util::parse_f64_safe;
use std::collections::HashSet;
use std::fmt;

/// Constant department used when no column qualifies.
pub const SYNTHETIC_DEPARTMENT: &str = "COLOMBIA";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRule {
    NameEquals(&'static str),
    NameContains(&'static str),
    /// Textual column with fewer than `max_distinct` distinct values.
    Categorical { max_distinct: usize },
}

const DEPARTMENT_RULES: &[ColumnRule] = &[
    ColumnRule::NameEquals("departamento"),
    ColumnRule::NameEquals("departamento_nom"),
    ColumnRule::NameEquals("nombre_departamento"),
    ColumnRule::NameEquals("nombre departamento"),
    ColumnRule::NameEquals("departamento o distrito"),
    ColumnRule::NameEquals("nom_dpto"),
    ColumnRule::NameEquals("dpto"),
    ColumnRule::NameEquals("department"),
    ColumnRule::NameContains("departamento"),
    ColumnRule::NameContains("depart"),
    ColumnRule::NameContains("dpto"),
    ColumnRule::NameContains("depto"),
    ColumnRule::Categorical { max_distinct: 50 },
];

const COUNT_RULES: &[ColumnRule] = &[
    ColumnRule::NameEquals("casos"),
    ColumnRule::NameEquals("total_casos"),
    ColumnRule::NameEquals("num_casos"),
    ColumnRule::NameEquals("cases"),
    ColumnRule::NameEquals("total_cases"),
    ColumnRule::NameEquals("count"),
    ColumnRule::NameEquals("conteo"),
    ColumnRule::NameEquals("cantidad"),
    ColumnRule::NameContains("casos"),
];

const DATE_RULES: &[ColumnRule] = &[
    ColumnRule::NameEquals("fecha_reporte_web"),
    ColumnRule::NameEquals("fecha reporte web"),
    ColumnRule::NameEquals("fecha de notificación"),
    ColumnRule::NameEquals("fecha_de_notificacion"),
    ColumnRule::NameEquals("fecha_diagnostico"),
    ColumnRule::NameEquals("fecha"),
    ColumnRule::NameEquals("date"),
    ColumnRule::NameContains("fecha"),
    ColumnRule::NameContains("date"),
];

const POPULATION_RULES: &[ColumnRule] = &[
    ColumnRule::NameEquals("poblacion"),
    ColumnRule::NameEquals("población"),
    ColumnRule::NameEquals("population"),
    ColumnRule::NameEquals("habitantes"),
    ColumnRule::NameContains("poblaci"),
];

/// What the rules need to know about one column.
#[derive(Debug, Clone)]
pub struct ColumnProfile {
    pub index: usize,
    pub name: String,
    name_lower: String,
    pub textual: bool,
    pub numeric: bool,
    pub distinct: usize,
}

impl ColumnProfile {
    fn build(table: &RawTable, index: usize) -> Self {
        let name = table.headers[index].trim().to_string();
        let mut non_empty = 0usize;
        let mut numeric_hits = 0usize;
        let mut seen: HashSet<&str> = HashSet::new();
        for v in table.column(index) {
            let v = v.trim();
            if v.is_empty() {
                continue;
            }
            non_empty += 1;
            if parse_f64_safe(Some(v)).is_some() {
                numeric_hits += 1;
            }
            seen.insert(v);
        }
        let numeric = non_empty > 0 && numeric_hits * 2 >= non_empty;
        ColumnProfile {
            index,
            name_lower: name.to_lowercase(),
            name,
            textual: non_empty > 0 && !numeric,
            numeric,
            distinct: seen.len(),
        }
    }
}

impl ColumnRule {
    pub fn matches(&self, col: &ColumnProfile) -> bool {
        match self {
            ColumnRule::NameEquals(n) => col.name_lower == *n,
            ColumnRule::NameContains(n) => col.name_lower.contains(n),
            ColumnRule::Categorical { max_distinct } => {
                col.textual && col.distinct > 0 && col.distinct < *max_distinct
            }
        }
    }
}

impl fmt::Display for ColumnRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRule::NameEquals(n) => write!(f, "name = {:?}", n),
            ColumnRule::NameContains(n) => write!(f, "name contains {:?}", n),
            ColumnRule::Categorical { max_distinct } => {
                write!(f, "textual, < {} distinct values", max_distinct)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMatch {
    pub index: usize,
    pub name: String,
    pub rule: ColumnRule,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DepartmentColumn {
    Column(ColumnMatch),
    Constant(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectedSchema {
    pub department: DepartmentColumn,
    /// `None` means "one row = one case".
    pub count: Option<ColumnMatch>,
    pub date: Option<ColumnMatch>,
    pub population: Option<ColumnMatch>,
}

impl DetectedSchema {
    pub fn count_is_synthesized(&self) -> bool {
        self.count.is_none()
    }
}

impl fmt::Display for DetectedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.department {
            DepartmentColumn::Column(m) => write!(f, "department={:?} ({})", m.name, m.rule)?,
            DepartmentColumn::Constant(c) => write!(f, "department=<constant {:?}>", c)?,
        }
        match &self.count {
            Some(m) => write!(f, ", count={:?}", m.name)?,
            None => write!(f, ", count=<1 per row>")?,
        }
        if let Some(m) = &self.date {
            write!(f, ", date={:?}", m.name)?;
        }
        if let Some(m) = &self.population {
            write!(f, ", population={:?}", m.name)?;
        }
        Ok(())
    }
}

/// First column satisfying the highest-priority rule, skipping columns
/// already claimed and those rejected by `accept`.
pub fn find_column(
    profiles: &[ColumnProfile],
    rules: &[ColumnRule],
    claimed: &[usize],
    accept: impl Fn(&ColumnProfile) -> bool,
) -> Option<ColumnMatch> {
    for rule in rules {
        let hit = profiles
            .iter()
            .filter(|p| !claimed.contains(&p.index))
            .find(|p| rule.matches(p) && accept(p));
        if let Some(p) = hit {
            return Some(ColumnMatch {
                index: p.index,
                name: p.name.clone(),
                rule: *rule,
            });
        }
    }
    None
}

pub fn profile_columns(table: &RawTable) -> Vec<ColumnProfile> {
    (0..table.headers.len())
        .map(|i| ColumnProfile::build(table, i))
        .collect()
}

/// Detect the department, count, date and population columns.
///
/// Only the department column can fail, and only when `strict` is set;
/// otherwise a constant department is synthesized. Missing count, date or
/// population columns are never errors.
pub fn detect_schema(table: &RawTable, strict: bool) -> DashResult<DetectedSchema> {
    let profiles = profile_columns(table);

    let department = match find_column(&profiles, DEPARTMENT_RULES, &[], |p| !p.numeric) {
        Some(m) => DepartmentColumn::Column(m),
        None if strict => {
            return Err(DashboardError::NoDepartmentColumn {
                columns: table.headers.join(", "),
            })
        }
        None => DepartmentColumn::Constant(SYNTHETIC_DEPARTMENT.to_string()),
    };
    let mut claimed: Vec<usize> = Vec::new();
    if let DepartmentColumn::Column(m) = &department {
        claimed.push(m.index);
    }

    let count = find_column(&profiles, COUNT_RULES, &claimed, |p| p.numeric);
    if let Some(m) = &count {
        claimed.push(m.index);
    }
    let population = find_column(&profiles, POPULATION_RULES, &claimed, |p| p.numeric);
    if let Some(m) = &population {
        claimed.push(m.index);
    }
    let date = find_column(&profiles, DATE_RULES, &claimed, |_| true);

    Ok(DetectedSchema {
        department,
        count,
        date,
        population,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn department_index(s: &DetectedSchema) -> Option<usize> {
        match &s.department {
            DepartmentColumn::Column(m) => Some(m.index),
            DepartmentColumn::Constant(_) => None,
        }
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn exact_names_win_over_substrings() {
        let t = table(
            &["Código DIVIPOLA departamento", "Departamento", "casos"],
            &[&["11", "Bogotá", "3"], &["5", "Antioquia", "1"]],
        );
        let s = detect_schema(&t, true).unwrap();
        assert_eq!(department_index(&s), Some(1));
        assert_eq!(s.count.as_ref().map(|m| m.index), Some(2));
        assert!(!s.count_is_synthesized());
    }

    #[test]
    fn substring_then_categorical_fallback() {
        let t = table(&["id", "nombre_depto"], &[&["1", "Meta"], &["2", "Huila"]]);
        let s = detect_schema(&t, true).unwrap();
        assert_eq!(department_index(&s), Some(1));

        let t = table(&["id", "region", "edad"], &[&["1", "Meta", "30"], &["2", "Huila", "41"]]);
        let s = detect_schema(&t, true).unwrap();
        match &s.department {
            DepartmentColumn::Column(m) => {
                assert_eq!(m.name, "region");
                assert_eq!(m.rule, ColumnRule::Categorical { max_distinct: 50 });
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_count_is_synthesized() {
        let t = table(
            &["ID de caso", "Departamento", "Edad", "Sexo"],
            &[&["1", "Meta", "30", "F"], &["2", "Meta", "41", "M"]],
        );
        let s = detect_schema(&t, false).unwrap();
        assert!(s.count_is_synthesized());
        assert!(s.date.is_none());
    }

    #[test]
    fn textual_count_candidate_is_rejected() {
        let t = table(&["departamento", "casos"], &[&["Meta", "muchos"], &["Huila", "pocos"]]);
        let s = detect_schema(&t, false).unwrap();
        assert!(s.count_is_synthesized());
    }

    #[test]
    fn no_department_column() {
        let t = table(&["a", "b"], &[&["1", "2"]]);
        let s = detect_schema(&t, false).unwrap();
        assert_eq!(
            s.department,
            DepartmentColumn::Constant(SYNTHETIC_DEPARTMENT.to_string())
        );
        assert!(matches!(
            detect_schema(&t, true),
            Err(DashboardError::NoDepartmentColumn { .. })
        ));
    }

    #[test]
    fn date_and_population_are_detected() {
        let t = table(
            &["fecha reporte web", "Departamento", "poblacion"],
            &[&["2020-03-06", "Bogotá", "8000000"]],
        );
        let s = detect_schema(&t, true).unwrap();
        assert_eq!(s.date.map(|m| m.index), Some(0));
        assert_eq!(s.population.map(|m| m.index), Some(2));
    }
}
