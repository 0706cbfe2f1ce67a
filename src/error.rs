//! Request-level error type and its mapping onto HTTP responses.

use serde::Serialize;
use std::{fmt, time::Duration};
use warp::http::StatusCode;

use crate::{fetch::FetchError, process::ParseError, schema::CatalogError};

/// Pipeline stage a request was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Parsing,
    SchemaQuery,
    Diffing,
    Evolving,
    Responding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Fetching => "fetching",
            Stage::Parsing => "parsing",
            Stage::SchemaQuery => "schema_query",
            Stage::Diffing => "diffing",
            Stage::Evolving => "evolving",
            Stage::Responding => "responding",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },

    #[error("access denied reading `{key}` from bucket `{bucket}`: {message}")]
    ObjectStoreAuth {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("malformed CSV: {0}")]
    MalformedCsv(String),

    #[error("failed to read columns of `{table}`: {source}")]
    SchemaQueryFailed {
        table: String,
        #[source]
        source: CatalogError,
    },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("{message}")]
    Unexpected { stage: Stage, message: String },
}

/// Body returned for every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl PipelineError {
    pub fn unexpected(stage: Stage, err: impl fmt::Display) -> Self {
        Self::Unexpected {
            stage,
            message: err.to_string(),
        }
    }

    /// The one place error kinds become status codes.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::ObjectNotFound { .. } => StatusCode::NOT_FOUND,
            Self::MalformedCsv(_) => StatusCode::BAD_REQUEST,
            Self::ObjectStoreAuth { .. }
            | Self::SchemaQueryFailed { .. }
            | Self::Timeout(_)
            | Self::Unexpected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stage the failure belongs to; `None` when the whole request ran out of time.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::InvalidRequest(_) | Self::ObjectNotFound { .. } | Self::ObjectStoreAuth { .. } => {
                Some(Stage::Fetching)
            }
            Self::MalformedCsv(_) => Some(Stage::Parsing),
            Self::SchemaQueryFailed { .. } => Some(Stage::SchemaQuery),
            Self::Timeout(_) => None,
            Self::Unexpected { stage, .. } => Some(*stage),
        }
    }

    pub fn body(&self) -> ErrorBody {
        let detail = match self {
            Self::Unexpected { stage, message } => format!("error while {}: {}", stage, message),
            other => other.to_string(),
        };
        ErrorBody { detail }
    }
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidKey(msg) => Self::InvalidRequest(msg),
            FetchError::NotFound { bucket, key } => Self::ObjectNotFound { bucket, key },
            FetchError::AccessDenied {
                bucket,
                key,
                message,
            } => Self::ObjectStoreAuth {
                bucket,
                key,
                message,
            },
            other @ FetchError::TransientIo { .. } => Self::unexpected(Stage::Fetching, other),
        }
    }
}

impl From<ParseError> for PipelineError {
    fn from(err: ParseError) -> Self {
        Self::MalformedCsv(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table() {
        let cases = [
            (
                PipelineError::InvalidRequest("file_path is required".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                PipelineError::ObjectNotFound {
                    bucket: "b".into(),
                    key: "k.csv".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                PipelineError::MalformedCsv("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                PipelineError::ObjectStoreAuth {
                    bucket: "b".into(),
                    key: "k".into(),
                    message: "403".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                PipelineError::Timeout(Duration::from_secs(1)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                PipelineError::unexpected(Stage::Parsing, "join error"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{:?}", err);
        }
    }

    #[test]
    fn test_stage_names() {
        let names: Vec<String> = [
            Stage::Fetching,
            Stage::Parsing,
            Stage::SchemaQuery,
            Stage::Diffing,
            Stage::Evolving,
            Stage::Responding,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        assert_eq!(
            names,
            ["fetching", "parsing", "schema_query", "diffing", "evolving", "responding"]
        );
    }

    #[test]
    fn test_fetch_errors_map_to_kinds() {
        let err: PipelineError = FetchError::NotFound {
            bucket: "b".into(),
            key: "missing.csv".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.stage(), Some(Stage::Fetching));
        assert!(err.body().detail.contains("missing.csv"));

        let err: PipelineError = FetchError::TransientIo {
            key: "k".into(),
            message: "connection reset".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.body().detail.starts_with("error while fetching"));
    }
}
