//! HTTP API
//!
//! Public routes serve concepts and sentence pages; `/admin` routes require
//! an administrator address in the `x-admin-address` header.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::error::ChainError;
use crate::models::NewConcept;
use crate::service::ContentService;
use crate::validation::InputValidator;

/// Header carrying the caller's wallet address on admin routes
pub const ADMIN_HEADER: &str = "x-admin-address";

/// State shared across handlers
pub struct AppState {
    pub service: Arc<ContentService>,
    admins: HashSet<String>,
}

impl AppState {
    /// Build state; admin addresses are normalized and malformed ones dropped
    pub fn new(service: Arc<ContentService>, admins: &[String]) -> Self {
        let admins = admins
            .iter()
            .filter_map(|address| match InputValidator::validate_address(address) {
                Ok(address) => Some(address),
                Err(_) => {
                    warn!(%address, "Ignoring malformed admin address");
                    None
                },
            })
            .collect();
        Self { service, admins }
    }

    #[must_use]
    pub fn is_admin(&self, address: &str) -> bool {
        self.admins.contains(address)
    }
}

pub type SharedState = Arc<AppState>;

/// Create the API router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        // Reader endpoints
        .route("/concepts", get(list_concepts))
        .route("/concepts/:cid", get(get_concept))
        .route("/concepts/:cid/sentences", get(get_sentences))
        // Admin endpoints
        .route("/admin/concepts", get(admin_list_concepts).post(seed_concept))
        .route("/admin/drafts", get(get_draft).post(save_draft))
        .route("/admin/drafts/publish", post(publish_draft))
        // Health check
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until ctrl-c
pub async fn serve(state: SharedState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

/// Error response wrapper; clients only see summary messages
#[derive(Debug)]
pub struct ApiError(pub ChainError);

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection, "Rejected request body");
        let message = match rejection {
            JsonRejection::JsonDataError(_) => "Missing or invalid fields in request body.",
            _ => "Invalid JSON body.",
        };
        Self(ChainError::Validation(message.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ChainError::Validation(msg) | ChainError::Parsing(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ChainError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ChainError::ConceptNotFound(_) => (StatusCode::NOT_FOUND, "Concept not found.".to_string()),
            ChainError::DraftNotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ChainError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
        };

        if status.is_server_error() {
            error!(error = %self.0, kind = self.0.kind(), "Request failed");
        } else {
            debug!(error = %self.0, status = status.as_u16(), "Request rejected");
        }

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

type ApiResult = Result<Response, ApiError>;

/// Verified administrator address
#[derive(Debug, Clone)]
pub struct AdminIdentity(pub String);

#[async_trait]
impl FromRequestParts<SharedState> for AdminIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ADMIN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError(ChainError::Unauthorized))?;
        let address = InputValidator::validate_address(raw).map_err(|_| ApiError(ChainError::Unauthorized))?;
        if !state.is_admin(&address) {
            warn!(%address, "Admin route called by unknown address");
            return Err(ApiError(ChainError::Unauthorized));
        }
        Ok(Self(address))
    }
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(json!({ "success": true, "status": "ok" }))
}

/// GET /concepts
pub async fn list_concepts(State(state): State<SharedState>) -> ApiResult {
    let concepts = state.service.list_concepts().await?;
    Ok(Json(json!({ "success": true, "concepts": concepts })).into_response())
}

/// GET /concepts/:cid
pub async fn get_concept(State(state): State<SharedState>, Path(cid): Path<String>) -> ApiResult {
    let concept = state.service.get_concept(&cid).await?;
    Ok(Json(json!({ "success": true, "concept": concept })).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceQuery {
    pub start_sid: Option<String>,
    pub limit: Option<String>,
}

/// GET /concepts/:cid/sentences
pub async fn get_sentences(
    State(state): State<SharedState>,
    Path(cid): Path<String>,
    Query(query): Query<SentenceQuery>,
) -> ApiResult {
    let page = state
        .service
        .get_sentences(&cid, query.start_sid.as_deref(), query.limit.as_deref())
        .await?;
    Ok(Json(json!({
        "success": true,
        "sentences": page.sentences,
        "nextSid": page.next_sid,
    }))
    .into_response())
}

/// GET /admin/concepts
pub async fn admin_list_concepts(State(state): State<SharedState>, _admin: AdminIdentity) -> ApiResult {
    let concepts = state.service.list_concepts_admin().await?;
    Ok(Json(json!({ "success": true, "concepts": concepts })).into_response())
}

/// POST /admin/concepts
pub async fn seed_concept(
    State(state): State<SharedState>,
    AdminIdentity(admin): AdminIdentity,
    body: Result<Json<NewConcept>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    let outcome = state.service.seed_concept(request).await?;
    info!(%admin, cid = %outcome.concept.cid, "Concept seeded via API");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Concept seeded successfully",
            "concept": outcome.concept,
            "sentenceCount": outcome.sentences.len(),
        })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct DraftQuery {
    pub cid: Option<String>,
}

/// GET /admin/drafts?cid=
pub async fn get_draft(
    State(state): State<SharedState>,
    AdminIdentity(admin): AdminIdentity,
    Query(query): Query<DraftQuery>,
) -> ApiResult {
    let cid = query
        .cid
        .ok_or_else(|| ChainError::Validation("Concept ID is required.".to_string()))?;
    let draft = state.service.get_draft(&cid, &admin).await?;
    Ok(Json(json!({ "success": true, "draft": draft })).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SaveDraftRequest {
    pub cid: String,
    pub content: String,
}

/// POST /admin/drafts
pub async fn save_draft(
    State(state): State<SharedState>,
    AdminIdentity(admin): AdminIdentity,
    body: Result<Json<SaveDraftRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    let draft = state.service.save_draft(&request.cid, &admin, request.content).await?;
    Ok(Json(json!({ "success": true, "draft": draft })).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub draft_id: String,
}

/// POST /admin/drafts/publish
pub async fn publish_draft(
    State(state): State<SharedState>,
    AdminIdentity(admin): AdminIdentity,
    body: Result<Json<PublishRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    let sentences = state.service.publish_draft(&request.draft_id, &admin).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Draft published successfully",
        "sentencesAdded": sentences.len(),
    }))
    .into_response())
}
