use anyhow::{anyhow, bail, Context, Result};
use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

pub const DEFAULT_REGION: &str = "us-east-2";
pub const DEFAULT_TARGET_TABLE: &str = "main.default.csv_ingest";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// What to do when the remote table's columns cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaQueryPolicy {
    /// Treat the table as having no columns and carry on.
    #[default]
    Permissive,
    /// Fail the request.
    Strict,
}

impl FromStr for SchemaQueryPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "strict" => Ok(Self::Strict),
            other => Err(anyhow!(
                "unknown schema query policy `{}` (expected `permissive` or `strict`)",
                other
            )),
        }
    }
}

/// S3 credentials and location of the bucket holding the CSV objects.
#[derive(Clone)]
pub struct S3Config {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
    /// Custom endpoint for S3-compatible stores.
    pub endpoint: Option<String>,
}

/// Connection details for the SQL warehouse that owns the target tables.
#[derive(Clone)]
pub struct WarehouseConfig {
    pub host: String,
    pub token: String,
    pub http_path: String,
}

/// Process-wide settings, read once at start-up.
#[derive(Clone)]
pub struct Config {
    pub s3: S3Config,
    pub warehouse: WarehouseConfig,
    pub default_target_table: String,
    pub schema_query_policy: SchemaQueryPolicy,
    pub request_timeout: Duration,
    pub staging_dir: PathBuf,
    pub port: u16,
}

impl Config {
    /// Load from the process environment, after merging a `.env` file if one exists.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut missing = Vec::new();
        let mut required = |key: &'static str| match get(key) {
            Some(v) => v,
            None => {
                missing.push(key);
                String::new()
            }
        };

        let access_key_id = required("AWS_ACCESS_KEY_ID");
        let secret_access_key = required("AWS_SECRET_ACCESS_KEY");
        let bucket = required("S3_BUCKET");
        let host = required("DATABRICKS_HOST");
        let token = required("DATABRICKS_TOKEN");
        let http_path = required("DATABRICKS_HTTP_PATH");

        if !missing.is_empty() {
            bail!(
                "missing required environment variables: {}",
                missing.join(", ")
            );
        }

        let schema_query_policy = match get("SCHEMA_QUERY_POLICY") {
            Some(v) => v
                .parse::<SchemaQueryPolicy>()
                .context("SCHEMA_QUERY_POLICY")?,
            None => SchemaQueryPolicy::default(),
        };

        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.trim()
                    .parse::<u64>()
                    .with_context(|| format!("REQUEST_TIMEOUT_SECS `{}` is not a number", v))?,
            ),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let port = match get("PORT") {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT `{}` is not a valid port", v))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            s3: S3Config {
                access_key_id,
                secret_access_key,
                region: get("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
                bucket,
                endpoint: get("S3_ENDPOINT"),
            },
            warehouse: WarehouseConfig {
                host,
                token,
                http_path,
            },
            default_target_table: get("DEFAULT_TARGET_TABLE")
                .unwrap_or_else(|| DEFAULT_TARGET_TABLE.to_string()),
            schema_query_policy,
            request_timeout,
            staging_dir: get("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            port,
        })
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .field("http_path", &self.http_path)
            .finish()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("s3", &self.s3)
            .field("warehouse", &self.warehouse)
            .field("default_target_table", &self.default_target_table)
            .field("schema_query_policy", &self.schema_query_policy)
            .field("request_timeout", &self.request_timeout)
            .field("staging_dir", &self.staging_dir)
            .field("port", &self.port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("AWS_ACCESS_KEY_ID", "AKIA123"),
            ("AWS_SECRET_ACCESS_KEY", "shh"),
            ("S3_BUCKET", "ingest"),
            ("DATABRICKS_HOST", "https://dbc-1.cloud.databricks.com"),
            ("DATABRICKS_TOKEN", "dapi-secret"),
            ("DATABRICKS_HTTP_PATH", "/sql/1.0/warehouses/abc123"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config> {
        Config::from_lookup(|k| env.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults_applied() {
        let cfg = load(&full_env()).unwrap();
        assert_eq!(cfg.s3.region, DEFAULT_REGION);
        assert_eq!(cfg.default_target_table, DEFAULT_TARGET_TABLE);
        assert_eq!(cfg.schema_query_policy, SchemaQueryPolicy::Permissive);
        assert_eq!(cfg.request_timeout, Duration::from_secs(60));
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert!(cfg.s3.endpoint.is_none());
    }

    #[test]
    fn test_missing_required_lists_every_key() {
        let mut env = full_env();
        env.remove("S3_BUCKET");
        env.insert("DATABRICKS_TOKEN", "   ");
        let err = load(&env).unwrap_err().to_string();
        assert!(err.contains("S3_BUCKET"), "{}", err);
        assert!(err.contains("DATABRICKS_TOKEN"), "{}", err);
        assert!(!err.contains("AWS_REGION"), "{}", err);
    }

    #[test]
    fn test_overrides() {
        let mut env = full_env();
        env.insert("AWS_REGION", "eu-west-1");
        env.insert("SCHEMA_QUERY_POLICY", "Strict");
        env.insert("REQUEST_TIMEOUT_SECS", "5");
        env.insert("PORT", "9090");
        env.insert("DEFAULT_TARGET_TABLE", "cat.sch.tbl");
        let cfg = load(&env).unwrap();
        assert_eq!(cfg.s3.region, "eu-west-1");
        assert_eq!(cfg.schema_query_policy, SchemaQueryPolicy::Strict);
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.default_target_table, "cat.sch.tbl");
    }

    #[test]
    fn test_bad_policy_rejected() {
        let mut env = full_env();
        env.insert("SCHEMA_QUERY_POLICY", "lenient");
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cfg = load(&full_env()).unwrap();
        let dbg = format!("{:?}", cfg);
        assert!(!dbg.contains("shh"));
        assert!(!dbg.contains("dapi-secret"));
        assert!(!dbg.contains("AKIA123"));
        assert!(dbg.contains("ingest"));
    }
}
