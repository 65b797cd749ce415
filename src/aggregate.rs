use crate::types::{CaseRecord, DepartmentAggregate};
use crate::util::{incidence, normalize_key};
use std::collections::HashMap;

/// Records of the department named by `filter`, compared by normalized key.
/// `None` keeps every record; an unknown department keeps none.
pub fn filter_records<'a>(records: &'a [CaseRecord], filter: Option<&str>) -> Vec<&'a CaseRecord> {
    match filter {
        None => records.iter().collect(),
        Some(f) => {
            let key = normalize_key(f);
            records.iter().filter(|r| r.department_key == key).collect()
        }
    }
}

/// Group records by department key and sum their case weights.
///
/// For a synthesized count column every weight is 1, so this is a row
/// count. The result is sorted by total cases, descending; ties keep the
/// order in which departments were first seen. Incidence is only set when
/// `populations` knows the department.
pub fn aggregate(
    records: &[&CaseRecord],
    populations: &HashMap<String, u64>,
) -> Vec<DepartmentAggregate> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<DepartmentAggregate> = Vec::new();

    for r in records {
        let slot = *index.entry(r.department_key.as_str()).or_insert_with(|| {
            out.push(DepartmentAggregate {
                department: r.department.clone(),
                department_key: r.department_key.clone(),
                total_cases: 0,
                population: None,
                incidence: None,
            });
            out.len() - 1
        });
        out[slot].total_cases = out[slot].total_cases.saturating_add(r.cases);
    }

    for a in &mut out {
        a.population = populations.get(&a.department_key).copied();
        a.incidence = incidence(a.total_cases, a.population);
    }

    // stable: equal totals stay in first-seen order
    out.sort_by(|a, b| b.total_cases.cmp(&a.total_cases));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(department: &str, cases: u64, row: usize) -> CaseRecord {
        CaseRecord {
            department: department.to_string(),
            department_key: normalize_key(department),
            cases,
            date: None,
            population: None,
            row,
        }
    }

    #[test]
    fn synthesized_count_is_row_count() {
        // three rows of "one row = one case", whatever other columns say
        let records = vec![rec("A", 1, 0), rec("A", 1, 1), rec("B", 1, 2)];
        let refs: Vec<&CaseRecord> = records.iter().collect();
        let aggs = aggregate(&refs, &HashMap::new());
        let totals: Vec<(&str, u64)> = aggs
            .iter()
            .map(|a| (a.department_key.as_str(), a.total_cases))
            .collect();
        assert_eq!(totals, vec![("A", 2), ("B", 1)]);
    }

    #[test]
    fn huge_totals_saturate() {
        let records = vec![rec("Meta", u64::MAX, 0), rec("Meta", 5, 1)];
        let refs: Vec<&CaseRecord> = records.iter().collect();
        let aggs = aggregate(&refs, &HashMap::new());
        assert_eq!(aggs[0].total_cases, u64::MAX);
    }

    #[test]
    fn explicit_counts_are_summed_and_sorted() {
        let records = vec![rec("Meta", 4, 0), rec("Huila", 9, 1), rec("meta ", 6, 2)];
        let refs: Vec<&CaseRecord> = records.iter().collect();
        let aggs = aggregate(&refs, &HashMap::new());
        assert_eq!(aggs[0].department_key, "META");
        assert_eq!(aggs[0].total_cases, 10);
        assert_eq!(aggs[0].department, "Meta");
        assert_eq!(aggs[1].total_cases, 9);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let records = vec![rec("C", 5, 0), rec("A", 5, 1), rec("B", 5, 2)];
        let refs: Vec<&CaseRecord> = records.iter().collect();
        let keys: Vec<String> = aggregate(&refs, &HashMap::new())
            .into_iter()
            .map(|a| a.department_key)
            .collect();
        assert_eq!(keys, vec!["C", "A", "B"]);
    }

    #[test]
    fn incidence_only_with_population() {
        let records = vec![rec("Antioquia", 39941, 0), rec("Atlantis", 10, 1)];
        let refs: Vec<&CaseRecord> = records.iter().collect();
        let pops = HashMap::from([("ANTIOQUIA".to_string(), 6_400_000u64)]);
        let aggs = aggregate(&refs, &pops);
        assert_eq!(aggs[0].incidence, Some(624.1));
        assert_eq!(aggs[1].population, None);
        assert_eq!(aggs[1].incidence, None);
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(aggregate(&[], &HashMap::new()).is_empty());
    }

    #[test]
    fn filter_matches_normalized_names() {
        let records = vec![rec("Bogotá", 1, 0), rec("Meta", 1, 1)];
        assert_eq!(filter_records(&records, Some(" bogota")).len(), 1);
        assert_eq!(filter_records(&records, None).len(), 2);
        assert!(filter_records(&records, Some("Narnia")).is_empty());
    }
}
