//! HTTP management API.
//!
//! | Method     | Path                                | Response                    |
//! |------------|-------------------------------------|-----------------------------|
//! | GET        | `/health`                           | status and version          |
//! | GET        | `/cache/list`                       | `[CacheInfo]`               |
//! | GET        | `/cache/{name}/keys`                | `[String]`                  |
//! | GET        | `/cache/{name}/get?key=`            | JSON value or `null`        |
//! | GET        | `/cache/{name}/json\|xml\|yaml?key=` | rendered value, `""` on miss |
//! | POST, PUT  | `/cache/{name}/put?key=`            | 204, body is the JSON value |
//! | PUT        | `/cache/{name}/refresh`             | `CacheInfo` after refresh   |

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::version::PKG_VERSION;
use crate::{CacheInfo, CacheRegistry, Format, MimirError};

/// Build the management router over `registry`.
pub fn create_router(registry: Arc<CacheRegistry>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/cache/list", get(list_handler))
        .route("/cache/{name}/keys", get(keys_handler))
        .route("/cache/{name}/get", get(get_handler))
        .route("/cache/{name}/json", get(json_handler))
        .route("/cache/{name}/xml", get(xml_handler))
        .route("/cache/{name}/yaml", get(yaml_handler))
        .route("/cache/{name}/put", post(put_handler).put(put_handler))
        .route("/cache/{name}/refresh", put(refresh_handler))
        .with_state(registry)
}

/// Error response: `{"error": "..."}` with a status derived from the error.
#[derive(Debug)]
pub struct ApiError(MimirError);

impl From<MimirError> for ApiError {
    fn from(err: MimirError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            MimirError::CacheNotFound(_) => StatusCode::NOT_FOUND,
            MimirError::IllegalState(_) => StatusCode::CONFLICT,
            MimirError::CacheLoad { .. } => StatusCode::BAD_GATEWAY,
            MimirError::Serialization { .. }
            | MimirError::Json(_)
            | MimirError::Configuration(_) => StatusCode::BAD_REQUEST,
            MimirError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self.0, "management request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct KeyParam {
    key: String,
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok", "version": PKG_VERSION }))
}

async fn list_handler(State(registry): State<Arc<CacheRegistry>>) -> Json<Vec<CacheInfo>> {
    Json(registry.list())
}

async fn keys_handler(
    State(registry): State<Arc<CacheRegistry>>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(registry.get(&name)?.keys()))
}

async fn get_handler(
    State(registry): State<Arc<CacheRegistry>>,
    Path(name): Path<String>,
    Query(param): Query<KeyParam>,
) -> ApiResult<Json<Option<Value>>> {
    Ok(Json(registry.get(&name)?.get_value(&param.key)?))
}

fn rendered(registry: &CacheRegistry, name: &str, key: &str, format: Format) -> ApiResult<Response> {
    let body = registry.get(name)?.render(key, format)?;
    let content_type = match format {
        Format::Json => "application/json",
        Format::Xml => "application/xml",
        Format::Yaml => "application/yaml",
    };
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

async fn json_handler(
    State(registry): State<Arc<CacheRegistry>>,
    Path(name): Path<String>,
    Query(param): Query<KeyParam>,
) -> ApiResult<Response> {
    rendered(&registry, &name, &param.key, Format::Json)
}

async fn xml_handler(
    State(registry): State<Arc<CacheRegistry>>,
    Path(name): Path<String>,
    Query(param): Query<KeyParam>,
) -> ApiResult<Response> {
    rendered(&registry, &name, &param.key, Format::Xml)
}

async fn yaml_handler(
    State(registry): State<Arc<CacheRegistry>>,
    Path(name): Path<String>,
    Query(param): Query<KeyParam>,
) -> ApiResult<Response> {
    rendered(&registry, &name, &param.key, Format::Yaml)
}

async fn put_handler(
    State(registry): State<Arc<CacheRegistry>>,
    Path(name): Path<String>,
    Query(param): Query<KeyParam>,
    body: String,
) -> ApiResult<StatusCode> {
    registry.get(&name)?.put_json(&param.key, &body)?;
    info!(cache = %name, key = %param.key, "entry updated");
    Ok(StatusCode::NO_CONTENT)
}

async fn refresh_handler(
    State(registry): State<Arc<CacheRegistry>>,
    Path(name): Path<String>,
) -> ApiResult<Json<CacheInfo>> {
    let cache = registry.get(&name)?;
    let refreshed = cache.refresh().await?;
    info!(cache = %name, refreshed, "refresh requested");
    Ok(Json(cache.info()))
}
