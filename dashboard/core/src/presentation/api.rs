use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::application::buckets::{BucketError, BucketService};
use crate::application::catalog::{AppCatalogService, CatalogError};
use crate::application::lifecycle::{
    InstanceLifecycleService, LifecycleError, StartInstanceRequest,
};
use crate::application::reconciler::{ReconcileError, Reconciler};
use crate::domain::events::Topic;
use crate::domain::instance::{InstanceFilter, InstanceOptions, ObservedInstance};
use crate::domain::repository::InstanceRepository;
use crate::infrastructure::event_bus::NotificationBus;
use crate::infrastructure::logs::ServiceLogClient;

pub struct AppState {
    pub lifecycle: Arc<dyn InstanceLifecycleService>,
    pub buckets: Arc<dyn BucketService>,
    pub catalog: Arc<dyn AppCatalogService>,
    pub reconciler: Arc<Reconciler>,
    pub instances: Arc<dyn InstanceRepository>,
    pub bus: Arc<NotificationBus>,
    pub logs: Arc<ServiceLogClient>,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/instances", get(list_instances).post(start_instance))
        .route("/v1/instances/{name}/stop", post(stop_instance))
        .route(
            "/v1/instances/{name}/services/{service}/logs",
            get(service_logs),
        )
        .route("/v1/apps", get(list_apps).post(create_or_update_app))
        .route("/v1/apps/{name}/{version}", delete(remove_app))
        .route("/v1/appstore", get(appstore_apps))
        .route("/v1/buckets", get(list_buckets))
        .route("/v1/buckets/{name}", delete(delete_bucket))
        .route("/v1/buckets/{name}/copy", post(copy_bucket))
        .route("/v1/agent/state", post(agent_state))
        .route("/v1/stream", get(stream_notifications))
        .with_state(state)
}

// ============================================================================
// Error Mapping
// ============================================================================

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match &err {
            LifecycleError::AppNotFound(_) | LifecycleError::InstanceNotFound(_) => {
                Self::not_found(err.to_string())
            }
            LifecycleError::InstanceExists(_) => Self::new(StatusCode::CONFLICT, err.to_string()),
            LifecycleError::Compose(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            LifecycleError::Dispatch(_) => Self::new(StatusCode::BAD_GATEWAY, err.to_string()),
            LifecycleError::Store(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<BucketError> for ApiError {
    fn from(err: BucketError) -> Self {
        match &err {
            BucketError::BucketNotFound(_) => Self::not_found(err.to_string()),
            BucketError::BucketExists(_) => Self::new(StatusCode::CONFLICT, err.to_string()),
            BucketError::Dispatch(_) => Self::new(StatusCode::BAD_GATEWAY, err.to_string()),
            BucketError::Store(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match &err {
            CatalogError::Compose(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            CatalogError::AppStore(_) => Self::new(StatusCode::BAD_GATEWAY, err.to_string()),
            CatalogError::Store(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        Self::internal(err.to_string())
    }
}

// ============================================================================
// Instances
// ============================================================================

#[derive(Deserialize)]
struct InstanceQuery {
    name: Option<String>,
}

async fn list_instances(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InstanceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = match query.name {
        Some(name) => InstanceFilter::by_name(name),
        None => InstanceFilter::all(),
    };
    let instances = state
        .instances
        .find_all(filter)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(instances))
}

#[derive(Deserialize)]
struct StartInstanceBody {
    name: String,
    app_name: String,
    app_version: String,
    #[serde(default)]
    options: InstanceOptions,
    requested_by: Option<String>,
}

async fn start_instance(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartInstanceBody>,
) -> Result<impl IntoResponse, ApiError> {
    let instance = state
        .lifecycle
        .start_instance(StartInstanceRequest {
            name: body.name,
            app_name: body.app_name,
            app_version: body.app_version,
            options: body.options,
            requested_by: body.requested_by,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(instance)))
}

#[derive(Deserialize)]
struct StopInstanceBody {
    requested_by: Option<String>,
}

async fn stop_instance(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Option<Json<StopInstanceBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let requested_by = body.and_then(|Json(b)| b.requested_by);
    let instance = state.lifecycle.stop_instance(&name, requested_by).await?;
    Ok(Json(instance))
}

async fn service_logs(
    State(state): State<Arc<AppState>>,
    Path((name, service)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let instance = state
        .instances
        .find_all(InstanceFilter::by_name(name.as_str()))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found(format!("Instance {} does not exist", name)))?;

    let logs_url = instance
        .services
        .get(&service)
        .and_then(|info| info.logs_url.clone())
        .ok_or_else(|| {
            ApiError::not_found(format!("No logs endpoint for service {}", service))
        })?;

    let lines = state
        .logs
        .fetch_lines(&logs_url)
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_GATEWAY, e.to_string()))?;
    Ok(Json(lines))
}

// ============================================================================
// Apps
// ============================================================================

async fn list_apps(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.catalog.list_apps().await?))
}

#[derive(Deserialize)]
struct CreateAppBody {
    name: String,
    version: String,
    definition: String,
}

async fn create_or_update_app(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateAppBody>,
) -> Result<impl IntoResponse, ApiError> {
    let app = state
        .catalog
        .create_or_update_app(&body.name, &body.version, &body.definition)
        .await?;
    Ok(Json(app))
}

async fn remove_app(
    State(state): State<Arc<AppState>>,
    Path((name, version)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.catalog.remove_app(&name, &version).await?;
    Ok(Json(json!({ "removed": removed })))
}

async fn appstore_apps(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.catalog.appstore_apps().await?))
}

// ============================================================================
// Buckets
// ============================================================================

async fn list_buckets(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.buckets.list_buckets().await?))
}

async fn delete_bucket(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.buckets.delete_bucket(&name).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
struct CopyBucketBody {
    destination: String,
}

async fn copy_bucket(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<CopyBucketBody>,
) -> Result<impl IntoResponse, ApiError> {
    let bucket = state.buckets.copy_bucket(&name, &body.destination).await?;
    Ok((StatusCode::CREATED, Json(bucket)))
}

// ============================================================================
// Agent & Subscriptions
// ============================================================================

async fn agent_state(
    State(state): State<Arc<AppState>>,
    Json(snapshot): Json<HashMap<String, ObservedInstance>>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.reconciler.reconcile(snapshot).await?;
    Ok(Json(stats))
}

#[derive(Deserialize)]
struct StreamQuery {
    topic: Option<Topic>,
}

async fn stream_notifications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> impl IntoResponse {
    let receiver = state.bus.subscribe().into_inner();
    let topic = query.topic;

    let stream = BroadcastStream::new(receiver).filter_map(move |item| match item {
        Ok(notification) => {
            if let Some(topic) = topic {
                if notification.topic() != topic {
                    return None;
                }
            }
            match Event::default()
                .event(notification.topic().as_str())
                .json_data(&notification)
            {
                Ok(event) => Some(Ok::<_, Infallible>(event)),
                Err(_) => None,
            }
        }
        // A lagged subscriber just waits for the next full snapshot.
        Err(BroadcastStreamRecvError::Lagged(_)) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
