//! `TableCatalog` backed by a Databricks SQL warehouse, through the
//! Statement Execution REST API.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{
    catalog::{quote_ident, CatalogError, TableCatalog, TableName},
    types::{ServiceError, StatementRequest, StatementResponse},
};
use crate::config::WarehouseConfig;

const STATEMENTS_PATH: &str = "api/2.0/sql/statements";
/// Longest synchronous wait the API accepts.
const WAIT_TIMEOUT: &str = "50s";

pub struct SqlWarehouse {
    client: Client,
    endpoint: Url,
    token: String,
    warehouse_id: String,
}

impl SqlWarehouse {
    pub fn new(config: &WarehouseConfig, timeout: Duration) -> Result<Self> {
        let host = if config.host.starts_with("http://") || config.host.starts_with("https://") {
            config.host.clone()
        } else {
            format!("https://{}", config.host)
        };
        let base = Url::parse(&format!("{}/", host.trim_end_matches('/')))
            .with_context(|| format!("parsing warehouse host `{}`", config.host))?;
        let endpoint = base
            .join(STATEMENTS_PATH)
            .context("building statements endpoint")?;

        let warehouse_id = warehouse_id_from_path(&config.http_path).ok_or_else(|| {
            anyhow!(
                "cannot find a warehouse id in http path `{}`",
                config.http_path
            )
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building warehouse http client")?;

        Ok(Self {
            client,
            endpoint,
            token: config.token.clone(),
            warehouse_id,
        })
    }

    pub fn warehouse_id(&self) -> &str {
        &self.warehouse_id
    }

    async fn execute(
        &self,
        statement: &str,
        table: &TableName,
    ) -> Result<StatementResponse, CatalogError> {
        debug!(statement, "executing");
        let body = StatementRequest {
            statement,
            warehouse_id: &self.warehouse_id,
            wait_timeout: WAIT_TIMEOUT,
            on_wait_timeout: "CANCEL",
            disposition: "INLINE",
            format: "JSON_ARRAY",
        };

        let resp = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CatalogError::Connection(format!("POST {}: {}", self.endpoint, e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| CatalogError::Connection(format!("reading response: {}", e)))?;

        if !status.is_success() {
            let err: ServiceError = serde_json::from_str(&text).unwrap_or_default();
            return Err(classify_failure(
                table,
                err.error_code.as_deref(),
                err.message.as_deref().unwrap_or(&text),
                Some(status.as_u16()),
            ));
        }

        let parsed: StatementResponse = serde_json::from_str(&text)
            .map_err(|e| CatalogError::Connection(format!("decoding response: {}", e)))?;
        check_succeeded(table, parsed)
    }
}

#[async_trait]
impl TableCatalog for SqlWarehouse {
    #[instrument(level = "info", skip(self), fields(table = %table))]
    async fn columns(&self, table: &TableName) -> Result<Vec<String>, CatalogError> {
        let sql = format!("SELECT * FROM {} LIMIT 0", table.quoted());
        let resp = self.execute(&sql, table).await?;
        Ok(column_names(resp))
    }

    #[instrument(level = "info", skip(self), fields(table = %table))]
    async fn add_column(
        &self,
        table: &TableName,
        column: &str,
        sql_type: &str,
    ) -> Result<(), CatalogError> {
        let sql = add_column_sql(table, column, sql_type);
        self.execute(&sql, table).await.map(|_| ())
    }
}

/// `/sql/1.0/warehouses/abc123` → `abc123`
fn warehouse_id_from_path(http_path: &str) -> Option<String> {
    http_path
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn add_column_sql(table: &TableName, column: &str, sql_type: &str) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        table.quoted(),
        quote_ident(column),
        sql_type
    )
}

fn check_succeeded(
    table: &TableName,
    resp: StatementResponse,
) -> Result<StatementResponse, CatalogError> {
    if resp.status.state == "SUCCEEDED" {
        return Ok(resp);
    }
    let (code, message) = match &resp.status.error {
        Some(e) => (e.error_code.as_deref(), e.message.as_deref()),
        None => (None, None),
    };
    let message = message
        .map(str::to_string)
        .unwrap_or_else(|| format!("statement ended in state {}", resp.status.state));
    warn!(
        statement_id = ?resp.statement_id,
        state = %resp.status.state,
        "statement did not succeed"
    );
    Err(classify_failure(table, code, &message, None))
}

fn classify_failure(
    table: &TableName,
    code: Option<&str>,
    message: &str,
    http_status: Option<u16>,
) -> CatalogError {
    if message.contains("TABLE_OR_VIEW_NOT_FOUND") || code == Some("TABLE_OR_VIEW_NOT_FOUND") {
        return CatalogError::TableNotFound(table.to_string());
    }
    match http_status {
        Some(status) => CatalogError::Connection(format!(
            "HTTP {} ({}): {}",
            status,
            code.unwrap_or("UNKNOWN"),
            message
        )),
        None => CatalogError::Statement(message.to_string()),
    }
}

fn column_names(resp: StatementResponse) -> Vec<String> {
    let mut columns = resp
        .manifest
        .and_then(|m| m.schema)
        .map(|s| s.columns)
        .unwrap_or_default();
    columns.sort_by_key(|c| c.position.unwrap_or(u32::MAX));
    columns.into_iter().map(|c| c.name).collect()
}
