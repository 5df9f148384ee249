//! HTTP request handlers

use super::types::{
    AnswerRequest, CreateSessionRequest, ErrorResponse, ListSessionsQuery, SessionListResponse,
    StageInfo, StagesResponse,
};
use super::AppState;
use crate::runtime::{RuntimeError, SessionView, StartedSession, TurnReport};
use crate::stage::Stage;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Sessions
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route("/api/sessions/:id", get(get_session))
        // Turns
        .route("/api/sessions/:id/answer", post(submit_answer))
        .route("/api/sessions/:id/reset", post(reset_session))
        // Reference data
        .route("/api/stages", get(list_stages))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Sessions
// ============================================================

async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<SessionListResponse>, AppError> {
    let conversations = state
        .sessions
        .list_conversations(query.topic.as_deref())
        .await?;
    Ok(Json(SessionListResponse { conversations }))
}

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<StartedSession>, AppError> {
    let meta = req.into_meta();
    if meta.topic.is_empty() {
        return Err(AppError::BadRequest("Topic is required".to_string()));
    }
    Ok(Json(state.sessions.create_session(meta).await?))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.sessions.open_session(&id).await?))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StartedSession>, AppError> {
    Ok(Json(state.sessions.reset_session(&id).await?))
}

// ============================================================
// Turns
// ============================================================

async fn submit_answer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<TurnReport>, AppError> {
    Ok(Json(state.sessions.submit_answer(&id, &req.text).await?))
}

// ============================================================
// Reference Data
// ============================================================

async fn list_stages() -> Json<StagesResponse> {
    Json(StagesResponse {
        stages: Stage::ALL.into_iter().map(StageInfo::from).collect(),
    })
}

async fn get_version() -> &'static str {
    concat!("qa-tutor ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::EmptyAnswer => AppError::BadRequest(err.to_string()),
            RuntimeError::NotFound(_) => AppError::NotFound(err.to_string()),
            RuntimeError::Busy => AppError::Conflict(err.to_string()),
            RuntimeError::Storage(_) => {
                tracing::error!(error = %err, "Request failed");
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{OracleTurnResult, TutorOracle};
    use crate::runtime::testing::{MemoryStore, MockOracle};
    use crate::runtime::{ConversationStore, SessionSettings};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<MockOracle>) {
        let store: Arc<dyn ConversationStore> = Arc::new(MemoryStore::new());
        let oracle = Arc::new(MockOracle::new());
        let dyn_oracle: Arc<dyn TutorOracle> = oracle.clone();
        let state = AppState::new(store, dyn_oracle, SessionSettings::default());
        (create_router(state), oracle)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn opening() -> OracleTurnResult {
        OracleTurnResult::question("What is 2 + 2?").with_stage(Stage::InitialMaterial, false)
    }

    #[tokio::test]
    async fn test_create_and_answer() {
        let (app, oracle) = app();
        oracle.queue_turn(opening());

        let (status, created) = call(
            &app,
            "POST",
            "/api/sessions",
            Some(json!({"topic": "Arithmetic", "subject": "Maths"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["conversation"]["topic"], "Arithmetic");
        assert_eq!(created["conversation"]["subject"], "Maths");
        assert_eq!(created["state"]["current_stage"], "initial_material");
        assert_eq!(created["can_accept_input"], true);
        let id = created["conversation"]["id"].as_str().unwrap().to_string();

        oracle.queue_turn(
            OracleTurnResult::question("What is 3 + 3?")
                .with_stage(Stage::InitialMaterial, false)
                .with_feedback("Correct!", Some(true)),
        );
        let (status, turn) = call(
            &app,
            "POST",
            &format!("/api/sessions/{id}/answer"),
            Some(json!({"text": "4"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(turn["outcome"], "asked");
        assert_eq!(turn["state"]["questions_answered_in_stage"], 1);
        assert_eq!(turn["messages"].as_array().unwrap().len(), 2);
        assert_eq!(turn["messages"][1]["feedback"], "Correct!");

        let (status, view) = call(&app, "GET", &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["messages"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_answer_is_bad_request() {
        let (app, oracle) = app();
        oracle.queue_turn(opening());
        let (_, created) = call(&app, "POST", "/api/sessions", Some(json!({"topic": "t"}))).await;
        let id = created["conversation"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/sessions/{id}/answer"),
            Some(json!({"text": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_missing_topic_is_bad_request() {
        let (app, _oracle) = app();
        let (status, _) = call(&app, "POST", "/api/sessions", Some(json!({"topic": " "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (app, _oracle) = app();
        let (status, _) = call(&app, "GET", "/api/sessions/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_filters_by_topic() {
        let (app, oracle) = app();
        oracle.queue_turn(opening());
        oracle.queue_turn(opening());
        call(&app, "POST", "/api/sessions", Some(json!({"topic": "Algebra"}))).await;
        call(&app, "POST", "/api/sessions", Some(json!({"topic": "Geometry"}))).await;

        let (status, body) = call(&app, "GET", "/api/sessions?topic=Algebra", None).await;
        assert_eq!(status, StatusCode::OK);
        let convs = body["conversations"].as_array().unwrap();
        assert_eq!(convs.len(), 1);
        assert_eq!(convs[0]["topic"], "Algebra");

        let (_, body) = call(&app, "GET", "/api/sessions", None).await;
        assert_eq!(body["conversations"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stage_table() {
        let (app, _oracle) = app();
        let (status, body) = call(&app, "GET", "/api/stages", None).await;
        assert_eq!(status, StatusCode::OK);
        let stages = body["stages"].as_array().unwrap();
        assert_eq!(stages.len(), 4);
        assert_eq!(stages[0]["stage"], "initial_material");
        assert_eq!(stages[0]["target_questions"], 3);
        assert_eq!(stages[3]["target_questions"], 0);
    }
}
