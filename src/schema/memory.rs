//! In-process `TableCatalog` used by tests. Records every call it receives.

use async_trait::async_trait;
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use super::catalog::{CatalogError, TableCatalog, TableName};

#[derive(Default)]
pub struct MemoryCatalog {
    tables: Mutex<HashMap<String, Vec<String>>>,
    reject_columns: HashSet<String>,
    unreachable: bool,
    column_queries: Mutex<usize>,
    alterations: Mutex<Vec<(String, String, String)>>,
}

impl MemoryCatalog {
    pub fn with_table(table: &str, columns: &[&str]) -> Self {
        let catalog = Self::default();
        catalog.tables.lock().unwrap().insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        catalog
    }

    /// Every query fails as if the warehouse were down.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// `add_column` fails for these names.
    pub fn rejecting(mut self, columns: &[&str]) -> Self {
        self.reject_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn column_queries(&self) -> usize {
        *self.column_queries.lock().unwrap()
    }

    /// `(table, column, type)` for every `add_column` call, in call order.
    pub fn alterations(&self) -> Vec<(String, String, String)> {
        self.alterations.lock().unwrap().clone()
    }

    pub fn table_columns(&self, table: &str) -> Option<Vec<String>> {
        self.tables.lock().unwrap().get(table).cloned()
    }
}

#[async_trait]
impl TableCatalog for MemoryCatalog {
    async fn columns(&self, table: &TableName) -> Result<Vec<String>, CatalogError> {
        *self.column_queries.lock().unwrap() += 1;
        if self.unreachable {
            return Err(CatalogError::Connection("connection refused".into()));
        }
        self.tables
            .lock()
            .unwrap()
            .get(&table.to_string())
            .cloned()
            .ok_or_else(|| CatalogError::TableNotFound(table.to_string()))
    }

    async fn add_column(
        &self,
        table: &TableName,
        column: &str,
        sql_type: &str,
    ) -> Result<(), CatalogError> {
        self.alterations.lock().unwrap().push((
            table.to_string(),
            column.to_string(),
            sql_type.to_string(),
        ));
        if self.unreachable {
            return Err(CatalogError::Connection("connection refused".into()));
        }
        if self.reject_columns.contains(column) {
            return Err(CatalogError::Statement(format!(
                "[FIELDS_ALREADY_EXISTS] Cannot add column `{}`",
                column
            )));
        }
        let mut tables = self.tables.lock().unwrap();
        let cols = tables
            .get_mut(&table.to_string())
            .ok_or_else(|| CatalogError::TableNotFound(table.to_string()))?;
        cols.push(column.to_string());
        Ok(())
    }
}
