//! Tutoring oracle abstraction
//!
//! The oracle is the LLM-backed service that grades answers, asks the next
//! question and declares stage progress. The core treats it as opaque.

mod anthropic;
mod error;
mod prompt;
mod types;

pub use anthropic::AnthropicOracle;
pub use error::{OracleError, OracleErrorKind};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Common interface for oracle implementations
#[async_trait]
pub trait TutorOracle: Send + Sync {
    /// Produce the next turn for a session
    async fn next_turn(&self, request: &OracleRequest) -> Result<OracleTurnResult, OracleError>;

    /// Identifier used in logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: TutorOracle + ?Sized> TutorOracle for Arc<T> {
    async fn next_turn(&self, request: &OracleRequest) -> Result<OracleTurnResult, OracleError> {
        (**self).next_turn(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Oracle configuration
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub api_key: Option<String>,
    /// Gateway base URL; when set, the gateway handles authentication
    pub gateway: Option<String>,
    pub model: String,
    /// Upper bound on one oracle call
    pub timeout: Duration,
    /// Number of trailing transcript messages sent with each request
    pub history_window: usize,
}

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_HISTORY_WINDOW: usize = 6;

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            gateway: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

impl OracleConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            gateway: std::env::var("LLM_GATEWAY").ok(),
            model: std::env::var("QA_TUTOR_MODEL").unwrap_or(defaults.model),
            timeout: std::env::var("QA_TUTOR_ORACLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map_or(defaults.timeout, Duration::from_secs),
            history_window: std::env::var("QA_TUTOR_HISTORY_WINDOW")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.history_window),
        }
    }
}

/// Logging wrapper for oracles
pub struct LoggingOracle {
    inner: Arc<dyn TutorOracle>,
    name: String,
}

impl LoggingOracle {
    pub fn new(inner: Arc<dyn TutorOracle>) -> Self {
        let name = inner.name().to_string();
        Self { inner, name }
    }
}

#[async_trait]
impl TutorOracle for LoggingOracle {
    async fn next_turn(&self, request: &OracleRequest) -> Result<OracleTurnResult, OracleError> {
        let start = std::time::Instant::now();
        let result = self.inner.next_turn(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(turn) => {
                tracing::info!(
                    oracle = %self.name,
                    duration_ms = %duration.as_millis(),
                    stage = %request.current_stage,
                    declared_stage = ?turn.declared_next_stage,
                    stage_complete = ?turn.declared_stage_complete,
                    "Oracle turn completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    oracle = %self.name,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "Oracle turn failed"
                );
            }
        }

        result
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Stand-in used when no credentials are configured; every turn fails
/// with an auth error so sessions surface the problem in their transcript.
pub struct UnavailableOracle;

#[async_trait]
impl TutorOracle for UnavailableOracle {
    async fn next_turn(&self, _request: &OracleRequest) -> Result<OracleTurnResult, OracleError> {
        Err(OracleError::auth(
            "No oracle configured. Set ANTHROPIC_API_KEY or LLM_GATEWAY.",
        ))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// Build the production oracle, wrapped with logging
pub fn build_oracle(config: &OracleConfig) -> Arc<dyn TutorOracle> {
    let inner: Arc<dyn TutorOracle> = match AnthropicOracle::new(config) {
        Ok(oracle) => Arc::new(oracle),
        Err(e) => {
            tracing::warn!(error = %e, "Oracle unavailable");
            Arc::new(UnavailableOracle)
        }
    };
    Arc::new(LoggingOracle::new(inner))
}
