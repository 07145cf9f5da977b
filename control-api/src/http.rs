//! Thin HTTP surface over [`InstanceService`]. Deliberately a direct
//! pass-through: the wire protocol is explicitly out of scope of the core
//! control-plane logic, so this layer does no more than translate requests
//! into service calls and errors into status codes.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use control_shared::domain::{InstanceStatus, PlatformKind, ServerBinding};
use control_shared::patch::PatchOp;
use control_shared::ControlError;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::instance_service::InstanceService;

pub fn router(service: Arc<InstanceService>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/instances", get(list_instances).post(create_instance))
        .route("/instances/{id}", get(get_instance).delete(delete_instance))
        .route("/instances/{id}/start", post(start_instance))
        .route("/instances/{id}/stop", post(stop_instance))
        .route("/instances/{id}/restart", post(restart_instance))
        .route("/instances/{id}/configuration", get(get_configuration).patch(patch_configuration))
        .route("/instances/{id}/status", post(receive_status_update))
        .route("/status/recent", get(recent_changes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateInstanceRequest {
    name: String,
    description: Option<String>,
    platform_kind: PlatformKind,
    initial_binding: Option<ServerBinding>,
}

async fn create_instance(State(service): State<Arc<InstanceService>>, Json(req): Json<CreateInstanceRequest>) -> impl IntoResponse {
    let instance = service.create_instance(req.name, req.description, req.platform_kind, req.initial_binding);
    (StatusCode::CREATED, Json(instance))
}

async fn list_instances(State(service): State<Arc<InstanceService>>) -> impl IntoResponse {
    Json(service.list_instances())
}

async fn get_instance(State(service): State<Arc<InstanceService>>, Path(id): Path<String>) -> HttpResponse {
    match service.get_instance(&id) {
        Ok(instance) => Json(instance).into_response(),
        Err(e) => error_response(e),
    }
}

async fn delete_instance(State(service): State<Arc<InstanceService>>, Path(id): Path<String>) -> HttpResponse {
    match service.delete_instance(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize, Default)]
struct StartBody {
    configuration: Option<control_shared::domain::DeclaredConfiguration>,
}

async fn start_instance(State(service): State<Arc<InstanceService>>, Path(id): Path<String>, body: Option<Json<StartBody>>) -> HttpResponse {
    let config = body.and_then(|Json(b)| b.configuration);
    match service.start_instance(&id, config).await {
        Ok(info) => Json(info).into_response(),
        Err(e) => error_response(e),
    }
}

async fn stop_instance(State(service): State<Arc<InstanceService>>, Path(id): Path<String>) -> HttpResponse {
    match service.stop_instance(&id).await {
        Ok(info) => Json(info).into_response(),
        Err(e) => error_response(e),
    }
}

async fn restart_instance(State(service): State<Arc<InstanceService>>, Path(id): Path<String>) -> HttpResponse {
    match service.restart_instance(&id).await {
        Ok(info) => Json(info).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_configuration(State(service): State<Arc<InstanceService>>, Path(id): Path<String>) -> HttpResponse {
    match service.get_configuration(&id) {
        Ok(config) => Json(config).into_response(),
        Err(e) => error_response(e),
    }
}

async fn patch_configuration(State(service): State<Arc<InstanceService>>, Path(id): Path<String>, Json(ops): Json<Vec<PatchOp>>) -> HttpResponse {
    match service.patch_configuration(&id, &ops).await {
        Ok(config) => Json(config).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct StatusUpdateBody {
    status: InstanceStatus,
    source: String,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
}

async fn receive_status_update(State(service): State<Arc<InstanceService>>, Path(id): Path<String>, Json(body): Json<StatusUpdateBody>) -> HttpResponse {
    match service.receive_status_update(&id, body.status, body.source, body.metadata).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentChangesQuery {
    since: DateTime<Utc>,
    status_filter: Option<InstanceStatus>,
}

async fn recent_changes(State(service): State<Arc<InstanceService>>, Query(query): Query<RecentChangesQuery>) -> impl IntoResponse {
    Json(service.get_recent_changes(query.since, query.status_filter))
}

fn error_response(error: ControlError) -> HttpResponse {
    let status = match &error {
        ControlError::NotFound(_) => StatusCode::NOT_FOUND,
        ControlError::Conflict(_) => StatusCode::CONFLICT,
        ControlError::Validation(_) => StatusCode::BAD_REQUEST,
        ControlError::Timeout(_) | ControlError::Transport(_) | ControlError::PlatformFailure(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ControlError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, error.to_string()).into_response()
}
