pub mod catalog;
pub mod evolution;
pub mod types;
pub mod warehouse;

#[cfg(test)]
pub(crate) mod memory;

pub use catalog::{quote_ident, CatalogError, TableCatalog, TableName};
pub use evolution::{evolve, missing_columns, EvolutionReport, WIDENING_TYPE};
pub use warehouse::SqlWarehouse;
