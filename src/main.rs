use anyhow::{Context, Result};
use csvsync::{
    config::Config,
    fetch::ObjectFetcher,
    schema::SqlWarehouse,
    server::{self, Pipeline, PipelineSettings},
};
use std::{env, sync::Arc};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};
use warp::Filter;

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(log_level.parse().unwrap_or(Level::INFO.into())),
        )
        .init();

    std::panic::set_hook(Box::new(|info| {
        tracing::error!("panic: {}", info);
    }));

    // ─── 2) load configuration ───────────────────────────────────────
    let config = Config::from_env().context("loading configuration")?;
    info!(
        bucket = %config.s3.bucket,
        region = %config.s3.region,
        default_table = %config.default_target_table,
        policy = ?config.schema_query_policy,
        "starting csvsync"
    );

    // ─── 3) build collaborators ──────────────────────────────────────
    let fetcher = ObjectFetcher::s3(&config.s3, &config.staging_dir)
        .context("creating S3 client")?;
    let warehouse = SqlWarehouse::new(&config.warehouse, config.request_timeout)
        .context("creating warehouse client")?;
    info!(bucket = fetcher.bucket(), "object store ready");
    info!(warehouse_id = warehouse.warehouse_id(), "warehouse client ready");

    let pipeline = Arc::new(Pipeline::new(
        fetcher,
        Arc::new(warehouse),
        PipelineSettings::from(&config),
    ));

    // ─── 4) serve ────────────────────────────────────────────────────
    let routes = server::routes(pipeline).with(warp::trace::request());

    info!("Server starting on port {}", config.port);
    info!("Health check: http://localhost:{}/health", config.port);
    info!(
        "Read endpoint: GET http://localhost:{}/read_csv?file_path=<key>",
        config.port
    );

    warp::serve(routes).run(([0, 0, 0, 0], config.port)).await;

    Ok(())
}
