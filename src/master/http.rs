//! HTTP API for the master
//!
//! All routes live under `/api/master`. Request bodies and query strings are
//! deserialized into typed structs; anything malformed is rejected with a
//! structured `{status, kind, message}` error before reaching the service.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Query, State,
    },
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::{Error, Result};
use crate::master::fanout::FanoutReport;
use crate::master::metadata::{ChunkPlacement, ObjectRecord};
use crate::master::service::{ClusterHealth, ClusterStats, MasterService};

pub const API_PREFIX: &str = "/api/master";

/// Shared master state for HTTP handlers.
pub type MasterState = Arc<MasterService>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.to_http_status();
        (
            status,
            Json(json!({
                "status": "error",
                "kind": self.kind(),
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

/// Request body for planning an upload
#[derive(Debug, Deserialize)]
pub struct PlanUploadRequest {
    pub object_id: String,
    /// Signed so that negative sizes reach validation instead of a serde error
    pub size_bytes: i64,
}

impl PlanUploadRequest {
    fn validated_size(&self) -> Result<u64> {
        u64::try_from(self.size_bytes).map_err(|_| {
            Error::InvalidRequest(format!("size_bytes must be >= 0, got {}", self.size_bytes))
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PlanUploadResponse {
    pub status: &'static str,
    pub object_id: String,
    pub chunks: Vec<ChunkPlacement>,
    pub replication_factor_observed: usize,
}

#[derive(Debug, Deserialize)]
pub struct ObjectQuery {
    pub object_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub report: FanoutReport,
}

#[derive(Debug, Deserialize)]
pub struct EndpointRequest {
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct EndpointResponse {
    pub status: &'static str,
    pub endpoint: String,
    /// Whether membership actually changed
    pub changed: bool,
    pub total_chunkservers: usize,
}

fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| Error::InvalidRequest(e.body_text()))
}

fn query_params<T>(params: std::result::Result<Query<T>, QueryRejection>) -> Result<T> {
    params
        .map(|Query(q)| q)
        .map_err(|e| Error::InvalidRequest(e.body_text()))
}

/// Creates the HTTP router with all public endpoints.
pub fn create_router(state: MasterState, max_body_bytes: usize) -> Router {
    let api = Router::new()
        .route("/upload", post(plan_upload))
        .route("/metadata", get(get_metadata))
        .route("/delete", delete(delete_file))
        .route("/files", get(list_files))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .route("/health/cluster", get(cluster_health))
        .route("/chunkservers", get(list_chunkservers))
        .route("/chunkservers/register", post(register_chunkserver))
        .route("/chunkservers/unregister", post(unregister_chunkserver));

    Router::new()
        .nest(API_PREFIX, api)
        .layer(axum::middleware::from_fn(request_tracing_middleware))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

async fn plan_upload(
    State(service): State<MasterState>,
    payload: std::result::Result<Json<PlanUploadRequest>, JsonRejection>,
) -> Result<Json<PlanUploadResponse>> {
    let request = json_body(payload)?;
    let size = request.validated_size()?;
    let record = service.plan_upload(&request.object_id, size)?;

    Ok(Json(PlanUploadResponse {
        status: "success",
        replication_factor_observed: record.replication_observed(),
        object_id: record.id,
        chunks: record.chunks,
    }))
}

async fn get_metadata(
    State(service): State<MasterState>,
    params: std::result::Result<Query<ObjectQuery>, QueryRejection>,
) -> Result<Json<ObjectRecord>> {
    let query = query_params(params)?;
    Ok(Json(service.get_metadata(&query.object_id)?))
}

async fn delete_file(
    State(service): State<MasterState>,
    params: std::result::Result<Query<ObjectQuery>, QueryRejection>,
) -> Result<Json<DeleteResponse>> {
    let query = query_params(params)?;
    let report = service.delete_file(&query.object_id).await?;
    Ok(Json(DeleteResponse {
        status: "success",
        report,
    }))
}

async fn list_files(State(service): State<MasterState>) -> Json<Vec<ObjectRecord>> {
    Json(service.list_files())
}

async fn stats(State(service): State<MasterState>) -> Json<ClusterStats> {
    Json(service.get_stats())
}

/// Liveness: the process is up and serving
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "UP",
        "service": "chunkmaster",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn cluster_health(State(service): State<MasterState>) -> Json<ClusterHealth> {
    Json(service.get_health_status())
}

async fn list_chunkservers(State(service): State<MasterState>) -> Json<Vec<String>> {
    Json(service.list_chunkservers())
}

async fn register_chunkserver(
    State(service): State<MasterState>,
    payload: std::result::Result<Json<EndpointRequest>, JsonRejection>,
) -> Result<Json<EndpointResponse>> {
    let request = json_body(payload)?;
    let changed = service.register_chunkserver(&request.endpoint)?;
    Ok(Json(EndpointResponse {
        status: "success",
        endpoint: request.endpoint,
        changed,
        total_chunkservers: service.list_chunkservers().len(),
    }))
}

async fn unregister_chunkserver(
    State(service): State<MasterState>,
    payload: std::result::Result<Json<EndpointRequest>, JsonRejection>,
) -> Result<Json<EndpointResponse>> {
    let request = json_body(payload)?;
    let changed = service.unregister_chunkserver(&request.endpoint);
    Ok(Json(EndpointResponse {
        status: "success",
        endpoint: request.endpoint,
        changed,
        total_chunkservers: service.list_chunkservers().len(),
    }))
}
