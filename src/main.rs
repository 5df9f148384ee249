//! Q&A tutor - staged question-and-answer sessions
//!
//! A Rust backend driving an LLM tutor through a fixed progression of
//! stages, with every session persisted and resumable.

mod api;
mod db;
mod oracle;
mod runtime;
mod stage;
mod state_machine;

use api::{create_router, AppState};
use db::Database;
use oracle::{build_oracle, OracleConfig, TutorOracle};
use runtime::{DatabaseStorage, SessionSettings};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qa_tutor=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let db_path = std::env::var("QA_TUTOR_DB_PATH").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        format!("{home}/.qa-tutor/qa-tutor.db")
    });

    let port: u16 = std::env::var("QA_TUTOR_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %db_path, "Opening database");
    let db = Database::open(&db_path)?;

    // Oracle
    let oracle_config = OracleConfig::from_env();
    let oracle = build_oracle(&oracle_config);
    tracing::info!(
        oracle = %oracle.name(),
        model = %oracle_config.model,
        timeout_secs = oracle_config.timeout.as_secs(),
        history_window = oracle_config.history_window,
        "Oracle initialized"
    );

    let state = AppState::new(
        Arc::new(DatabaseStorage::new(db)),
        oracle,
        SessionSettings::from(&oracle_config),
    );

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Q&A tutor listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
