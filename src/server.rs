use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::catalog::MovieCatalog;
use crate::classifier::{LinearClassifier, SentimentClassifier};
use crate::error::StoreError;
use crate::models::{Movie, Review, ReviewDraft, ReviewFilter, Sentiment};
use crate::store::ReviewStore;

/// State shared across request handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ReviewStore<LinearClassifier>>,
    pub catalog: Arc<MovieCatalog>,
}

/// Build the router serving the review API
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/movies", get(list_movies))
        .route("/predict", post(predict))
        .route("/reviews", get(list_reviews).post(create_review))
        // Original submission path, kept for existing frontends
        .route("/submit_review", post(create_review))
        .route("/reviews/:position", put(update_review).delete(delete_review))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the review API on `addr` until the process exits
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(%addr, "Review API listening");

    axum::serve(listener, router).await.context("Server error")?;

    Ok(())
}

/// Error response carrying an `{"error": message}` body
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{:#}", err),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match err {
            StoreError::Validation(_) => StatusCode::BAD_REQUEST,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::ClassifierUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            StoreError::Corrupt(_) | StoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn list_movies(State(state): State<AppState>) -> Result<Json<Vec<Movie>>, ApiError> {
    let movies = state.catalog.popular().await.map_err(ApiError::internal)?;
    Ok(Json(movies))
}

#[derive(Debug, Deserialize)]
struct PredictRequest {
    #[serde(rename = "review")]
    text: String,
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    result: Sentiment,
}

async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(StoreError::Validation("review text must not be empty".into()).into());
    }

    let result = state
        .store
        .classifier()
        .classify(text)
        .map_err(|e| StoreError::ClassifierUnavailable(e.to_string()))?;

    Ok(Json(PredictResponse { result }))
}

async fn list_reviews(
    State(state): State<AppState>,
    Query(filter): Query<ReviewFilter>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let reviews = state.store.list(&filter)?;
    Ok(Json(reviews))
}

async fn create_review(
    State(state): State<AppState>,
    Json(draft): Json<ReviewDraft>,
) -> Result<Json<Review>, ApiError> {
    let review = state.store.append(draft)?;
    Ok(Json(review))
}

#[derive(Debug, Deserialize)]
struct ReviewEdit {
    #[serde(rename = "review")]
    text: String,
}

async fn update_review(
    State(state): State<AppState>,
    Path(position): Path<i64>,
    Json(edit): Json<ReviewEdit>,
) -> Result<Json<Review>, ApiError> {
    let position = parse_position(position)?;
    let review = state.store.update_at(position, &edit.text)?;
    Ok(Json(review))
}

async fn delete_review(
    State(state): State<AppState>,
    Path(position): Path<i64>,
) -> Result<Json<Review>, ApiError> {
    let position = parse_position(position)?;
    let review = state.store.delete_at(position)?;
    Ok(Json(review))
}

/// Positions arrive signed on the wire; a negative one is simply not a
/// stored position.
fn parse_position(raw: i64) -> Result<usize, ApiError> {
    usize::try_from(raw)
        .map_err(|_| StoreError::NotFound(format!("position {} out of bounds", raw)).into())
}
