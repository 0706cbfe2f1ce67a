//! The per-request pipeline: fetch → parse → schema query → diff → evolve.

use serde::{Serialize, Serializer};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::{Config, SchemaQueryPolicy},
    error::{PipelineError, Stage},
    fetch::ObjectFetcher,
    process::{parse_csv_file, Table},
    schema::{evolve, missing_columns, TableCatalog, TableName},
};

/// Query parameters accepted by `GET /read_csv`.
#[derive(Debug, Default, Clone, serde::Deserialize)]
pub struct ReadCsvRequest {
    pub file_path: Option<String>,
    pub target_table: Option<String>,
}

/// Success payload.
#[derive(Debug, Serialize)]
pub struct ReadCsvResponse {
    #[serde(serialize_with = "serialize_rows")]
    pub data: Table,
    pub csv_columns: Vec<String>,
    pub table_columns: Vec<String>,
    pub missing_columns: Vec<String>,
    pub total_rows: usize,
}

fn serialize_rows<S: Serializer>(table: &Table, serializer: S) -> Result<S::Ok, S::Error> {
    table.records().serialize(serializer)
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub default_target_table: String,
    pub schema_query_policy: SchemaQueryPolicy,
    pub request_timeout: Duration,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_target_table: config.default_target_table.clone(),
            schema_query_policy: config.schema_query_policy,
            request_timeout: config.request_timeout,
        }
    }
}

pub struct Pipeline {
    fetcher: ObjectFetcher,
    catalog: Arc<dyn TableCatalog>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        fetcher: ObjectFetcher,
        catalog: Arc<dyn TableCatalog>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fetcher,
            catalog,
            settings,
        }
    }

    /// Run one request under the configured timeout.
    pub async fn run(&self, req: ReadCsvRequest) -> Result<ReadCsvResponse, PipelineError> {
        let limit = self.settings.request_timeout;
        tokio::time::timeout(limit, self.run_stages(req))
            .await
            .map_err(|_| PipelineError::Timeout(limit))?
    }

    #[instrument(
        level = "info",
        skip(self, req),
        fields(file_path = ?req.file_path, target_table = ?req.target_table)
    )]
    async fn run_stages(&self, req: ReadCsvRequest) -> Result<ReadCsvResponse, PipelineError> {
        let file_path = req
            .file_path
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| PipelineError::InvalidRequest("file_path is required".into()))?;
        let table: TableName = req
            .target_table
            .as_deref()
            .unwrap_or(self.settings.default_target_table.as_str())
            .parse()
            .map_err(|e| PipelineError::InvalidRequest(format!("target_table: {}", e)))?;

        // Fetching
        let staged = self.fetcher.stage(&file_path).await?;

        // Parsing. The staged file moves into the blocking task and is removed
        // as soon as parsing finishes, whatever the outcome.
        let parsed = tokio::task::spawn_blocking(move || {
            let result = parse_csv_file(staged.path());
            drop(staged);
            result
        })
        .await
        .map_err(|e| PipelineError::unexpected(Stage::Parsing, e))?;
        let data = parsed?;
        info!(
            stage = %Stage::Parsing,
            columns = data.headers.len(),
            rows = data.len(),
            "parsed {}",
            file_path
        );

        // SchemaQuery
        let table_columns = match self.catalog.columns(&table).await {
            Ok(cols) => cols,
            Err(e) => match self.settings.schema_query_policy {
                SchemaQueryPolicy::Permissive => {
                    warn!(
                        stage = %Stage::SchemaQuery,
                        table = %table,
                        error = %e,
                        "schema query failed, continuing with empty schema"
                    );
                    Vec::new()
                }
                SchemaQueryPolicy::Strict => {
                    return Err(PipelineError::SchemaQueryFailed {
                        table: table.to_string(),
                        source: e,
                    })
                }
            },
        };

        // Diffing
        let missing = missing_columns(data.columns(), &table_columns);
        debug!(
            stage = %Stage::Diffing,
            table_columns = table_columns.len(),
            missing = missing.len(),
            "diffed columns"
        );

        // Evolving
        if !missing.is_empty() {
            info!(stage = %Stage::Evolving, table = %table, missing = ?missing, "evolving schema");
            let report = evolve(self.catalog.as_ref(), &table, &missing).await;
            if !report.failed.is_empty() {
                warn!(
                    stage = %Stage::Evolving,
                    table = %table,
                    added = report.added.len(),
                    failed = report.failed.len(),
                    "some columns could not be added"
                );
            }
        }

        // Responding
        debug!(stage = %Stage::Responding, rows = data.len(), "building response");
        Ok(ReadCsvResponse {
            csv_columns: data.headers.clone(),
            total_rows: data.len(),
            data,
            table_columns,
            missing_columns: missing,
        })
    }
}
