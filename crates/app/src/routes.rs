use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use book_qa_core::{
    AnswerError, AnswerRequest, AnswerService, DocumentTree, IndexState, QueryMode, SectionSource,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

pub const INVALID_QUESTION: &str = "Please provide a valid question.";
pub const INVALID_MODE: &str = "Invalid mode. Use 'book_scope' or 'selected_text_only'.";
pub const INTERNAL_FAILURE: &str =
    "Sorry, there was an error processing your request. Please try again.";

pub struct AppState<S: SectionSource = DocumentTree> {
    pub service: Arc<AnswerService<S>>,
}

impl<S: SectionSource> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

pub fn router<S>(state: AppState<S>, cors: CorsLayer) -> Router
where
    S: SectionSource + 'static,
{
    Router::new()
        .route("/health", get(health::<S>))
        .route("/query", post(query::<S>))
        .route("/book-scope-query", post(book_scope_query::<S>))
        .route("/selected-text-query", post(selected_text_query::<S>))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Cross-origin policy for the docs-site widget. `*` allows any origin.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, header::InvalidHeaderValue> {
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let origins = origins
            .iter()
            .map(|origin| HeaderValue::from_str(origin))
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(allow_origin))
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub selected_text: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    pub answer: String,
    pub sources: Vec<String>,
    pub module: Option<String>,
}

#[derive(Debug, Serialize)]
struct FailureResponse {
    success: bool,
    answer: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub index_state: IndexState,
    pub sections: usize,
    pub skipped_files: usize,
    pub built_at: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    InvalidQuestion,
    InvalidMode,
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, answer) = match self {
            ApiError::InvalidQuestion => (StatusCode::BAD_REQUEST, INVALID_QUESTION),
            ApiError::InvalidMode => (StatusCode::BAD_REQUEST, INVALID_MODE),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_FAILURE),
        };
        (
            status,
            Json(FailureResponse {
                success: false,
                answer,
            }),
        )
            .into_response()
    }
}

/// POST /query - rank book sections for a question and answer from them.
pub async fn query<S>(
    State(state): State<AppState<S>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError>
where
    S: SectionSource + 'static,
{
    let Ok(Json(request)) = payload else {
        return Err(ApiError::InvalidQuestion);
    };

    let question = request.query.as_deref().map(str::trim).unwrap_or_default();
    if question.is_empty() {
        return Err(ApiError::InvalidQuestion);
    }

    let mode = match request.mode.as_deref() {
        None => QueryMode::default(),
        Some(raw) => raw.parse::<QueryMode>().map_err(|_| ApiError::InvalidMode)?,
    };

    let answer_request = AnswerRequest {
        query: question.to_string(),
        mode,
        selected_text: request.selected_text.clone(),
        module: request.module.clone(),
    };

    let answer = state
        .service
        .answer(&answer_request)
        .await
        .map_err(|failure| match failure {
            AnswerError::EmptyQuery => ApiError::InvalidQuestion,
            other => {
                error!(error = %other, query = question, "query failed");
                ApiError::Internal
            }
        })?;

    Ok(Json(QueryResponse {
        success: true,
        answer: answer.text,
        sources: answer.sources,
        module: request.module,
    }))
}

/// POST /book-scope-query - `/query` with the mode fixed to book scope.
pub async fn book_scope_query<S>(
    state: State<AppState<S>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError>
where
    S: SectionSource + 'static,
{
    query(state, with_mode(payload, QueryMode::BookScope)).await
}

/// POST /selected-text-query - `/query` with the mode fixed to selected text.
pub async fn selected_text_query<S>(
    state: State<AppState<S>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError>
where
    S: SectionSource + 'static,
{
    query(state, with_mode(payload, QueryMode::SelectedTextOnly)).await
}

fn with_mode(
    payload: Result<Json<QueryRequest>, JsonRejection>,
    mode: QueryMode,
) -> Result<Json<QueryRequest>, JsonRejection> {
    payload.map(|Json(mut request)| {
        request.mode = Some(mode.as_str().to_string());
        Json(request)
    })
}

/// GET /health - index status without triggering a build.
pub async fn health<S>(State(state): State<AppState<S>>) -> Json<HealthResponse>
where
    S: SectionSource + 'static,
{
    let snapshot = state.service.snapshot();
    Json(HealthResponse {
        status: "healthy",
        index_state: state.service.state(),
        sections: snapshot.as_ref().map_or(0, |index| index.sections.len()),
        skipped_files: snapshot.as_ref().map_or(0, |index| index.skipped_files.len()),
        built_at: snapshot.map(|index| index.built_at.to_rfc3339()),
    })
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let details = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(details, "request handler panicked");
    ApiError::Internal.into_response()
}
