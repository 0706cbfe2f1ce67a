// src/schema/types.rs

use serde::{Deserialize, Serialize};

/// Body of `POST /api/2.0/sql/statements`.
#[derive(Debug, Serialize)]
pub struct StatementRequest<'a> {
    pub statement: &'a str,
    pub warehouse_id: &'a str,
    pub wait_timeout: &'a str,
    pub on_wait_timeout: &'a str,
    pub disposition: &'a str,
    pub format: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct StatementResponse {
    #[serde(default)]
    pub statement_id: Option<String>,
    pub status: StatementStatus,
    #[serde(default)]
    pub manifest: Option<Manifest>,
}

#[derive(Debug, Deserialize)]
pub struct StatementStatus {
    pub state: String,
    #[serde(default)]
    pub error: Option<ServiceError>,
}

/// Error payload, used both inside `status` and as a top-level HTTP error body.
#[derive(Debug, Deserialize, Default)]
pub struct ServiceError {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub schema: Option<ManifestSchema>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestSchema {
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

/// A single result column as reported by the warehouse.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(default)]
    pub position: Option<u32>,
}
