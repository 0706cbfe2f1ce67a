//! Work out which CSV columns the remote table lacks and add them.

use std::collections::HashSet;
use tracing::{info, warn};

use super::catalog::{TableCatalog, TableName};

/// Every added column gets this type; no inference is attempted.
pub const WIDENING_TYPE: &str = "STRING";

/// Columns present in `csv_columns` but not in `table_columns`, in CSV order.
/// Names are compared exactly (case-sensitive).
pub fn missing_columns(csv_columns: &[String], table_columns: &[String]) -> Vec<String> {
    let existing: HashSet<&str> = table_columns.iter().map(String::as_str).collect();
    csv_columns
        .iter()
        .filter(|c| !existing.contains(c.as_str()))
        .cloned()
        .collect()
}

/// Outcome of one `evolve` call.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EvolutionReport {
    pub added: Vec<String>,
    /// `(column, error)` for each alteration that failed.
    pub failed: Vec<(String, String)>,
}

/// Add each of `missing` to `table` as a `STRING` column.
///
/// Columns are attempted one by one and a failure on one never stops the
/// rest. Nothing is sent to the catalog when `missing` is empty.
pub async fn evolve(
    catalog: &dyn TableCatalog,
    table: &TableName,
    missing: &[String],
) -> EvolutionReport {
    let mut report = EvolutionReport::default();
    if missing.is_empty() {
        return report;
    }

    for column in missing {
        match catalog.add_column(table, column, WIDENING_TYPE).await {
            Ok(()) => {
                info!(table = %table, column = %column, "added column");
                report.added.push(column.clone());
            }
            Err(e) => {
                warn!(table = %table, column = %column, error = %e, "failed to add column");
                report.failed.push((column.clone(), e.to_string()));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::memory::MemoryCatalog;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn table() -> TableName {
        "main.default.t".parse().unwrap()
    }

    #[test]
    fn test_missing_is_set_difference_in_csv_order() {
        assert_eq!(
            missing_columns(&names(&["A", "B", "C"]), &names(&["A", "B"])),
            names(&["C"])
        );
        assert_eq!(
            missing_columns(&names(&["z", "a", "m"]), &names(&["a"])),
            names(&["z", "m"])
        );
    }

    #[test]
    fn test_missing_against_empty_schema_is_everything() {
        let csv = names(&["x", "y"]);
        assert_eq!(missing_columns(&csv, &[]), csv);
    }

    #[test]
    fn test_missing_is_case_sensitive() {
        assert_eq!(
            missing_columns(&names(&["Amount", "id"]), &names(&["amount", "id"])),
            names(&["Amount"])
        );
    }

    #[test]
    fn test_nothing_missing_when_table_is_superset() {
        assert!(missing_columns(&names(&["a"]), &names(&["b", "a", "c"])).is_empty());
    }

    #[tokio::test]
    async fn test_evolve_empty_is_noop() {
        let catalog = MemoryCatalog::with_table("main.default.t", &["a"]);
        let report = evolve(&catalog, &table(), &[]).await;
        assert_eq!(report, EvolutionReport::default());
        assert!(catalog.alterations().is_empty());
        assert_eq!(catalog.column_queries(), 0);
    }

    #[tokio::test]
    async fn test_evolve_adds_each_column_as_string() {
        let catalog = MemoryCatalog::with_table("main.default.t", &["a"]);
        let report = evolve(&catalog, &table(), &names(&["b", "c"])).await;

        assert_eq!(report.added, names(&["b", "c"]));
        assert!(report.failed.is_empty());
        assert_eq!(
            catalog.alterations(),
            vec![
                ("main.default.t".to_string(), "b".to_string(), "STRING".to_string()),
                ("main.default.t".to_string(), "c".to_string(), "STRING".to_string()),
            ]
        );
        assert_eq!(
            catalog.table_columns("main.default.t").unwrap(),
            names(&["a", "b", "c"])
        );
    }

    #[tokio::test]
    async fn test_evolve_continues_past_failures() {
        let catalog = MemoryCatalog::with_table("main.default.t", &[]).rejecting(&["Dup"]);
        let report = evolve(&catalog, &table(), &names(&["x", "Dup", "y"])).await;

        assert_eq!(report.added, names(&["x", "y"]));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "Dup");
        assert_eq!(catalog.alterations().len(), 3);
    }
}
