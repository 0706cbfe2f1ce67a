//! HTTP surface: `GET /read_csv` and `GET /health`.

pub mod pipeline;

use std::{convert::Infallible, sync::Arc, time::Instant};
use tracing::{error, info, warn};
use warp::{
    http::StatusCode,
    reject::{InvalidQuery, MethodNotAllowed},
    reply::{self, Reply, Response},
    Filter, Rejection,
};

use crate::error::ErrorBody;
pub use pipeline::{Pipeline, PipelineSettings, ReadCsvRequest, ReadCsvResponse};

pub const SERVICE_NAME: &str = "csvsync";

/// All routes, with rejections turned into JSON error bodies.
pub fn routes(
    pipeline: Arc<Pipeline>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(health_check);

    let read_csv = warp::path("read_csv")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<ReadCsvRequest>())
        .and(with_pipeline(pipeline))
        .and_then(read_csv);

    health.or(read_csv).recover(handle_rejection)
}

fn with_pipeline(
    pipeline: Arc<Pipeline>,
) -> impl Filter<Extract = (Arc<Pipeline>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&pipeline))
}

async fn health_check() -> Result<impl Reply, Rejection> {
    Ok(reply::json(&serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME
    })))
}

async fn read_csv(req: ReadCsvRequest, pipeline: Arc<Pipeline>) -> Result<Response, Rejection> {
    let start = Instant::now();

    match pipeline.run(req).await {
        Ok(resp) => {
            info!(
                rows = resp.total_rows,
                missing = resp.missing_columns.len(),
                elapsed = ?start.elapsed(),
                "read_csv ok"
            );
            Ok(reply::with_status(reply::json(&resp), StatusCode::OK).into_response())
        }
        Err(e) => {
            let status = e.status();
            let stage = e.stage().map(|s| s.to_string());
            if status.is_server_error() {
                error!(status = status.as_u16(), stage = ?stage, error = %e, elapsed = ?start.elapsed(), "read_csv failed");
            } else {
                warn!(status = status.as_u16(), stage = ?stage, error = %e, "read_csv rejected");
            }
            Ok(error_reply(status, e.body()))
        }
    }
}

fn error_reply(status: StatusCode, body: ErrorBody) -> Response {
    reply::with_status(reply::json(&body), status).into_response()
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, detail) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if let Some(e) = err.find::<InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method Not Allowed".to_string(),
        )
    } else {
        error!(rejection = ?err, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal server error".to_string(),
        )
    };
    Ok(error_reply(status, ErrorBody { detail }))
}
