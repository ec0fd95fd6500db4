// HTTP front end
// Thin JSON layer over the registration and attendance services

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use crate::barcode::{BarcodeDecoder, BarcodeRenderer};
use crate::error::AttendanceError;
use crate::system::AttendanceSystem;

/// Shared application state; the mutex makes every request one operation
pub struct AppState<R, D> {
    system: Arc<Mutex<AttendanceSystem<R, D>>>,
}

impl<R, D> Clone for AppState<R, D> {
    fn clone(&self) -> Self {
        Self {
            system: Arc::clone(&self.system),
        }
    }
}

impl<R, D> AppState<R, D> {
    pub fn new(system: AttendanceSystem<R, D>) -> Self {
        Self {
            system: Arc::new(Mutex::new(system)),
        }
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ApiError>,
}

#[derive(Serialize)]
struct ApiError {
    kind: &'static str,
    message: String,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub matric_number: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct MarkRequest {
    pub decoded_value: String,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub image_path: PathBuf,
}

fn status_for(err: &AttendanceError) -> StatusCode {
    match err {
        AttendanceError::Validation(_) => StatusCode::BAD_REQUEST,
        AttendanceError::DuplicateBarcode { .. } => StatusCode::CONFLICT,
        AttendanceError::NoBarcodeDetected { .. } | AttendanceError::Decode { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AttendanceError::StudentNotFound { .. } => StatusCode::NOT_FOUND,
        AttendanceError::Storage(_)
        | AttendanceError::Artifact { .. }
        | AttendanceError::Render { .. }
        | AttendanceError::Config { .. }
        | AttendanceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AttendanceError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(ApiError {
                kind: self.kind(),
                message: self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

fn internal_error(message: &str) -> AttendanceError {
    AttendanceError::Internal {
        message: message.to_string(),
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/students - Register a student and generate their barcode
async fn register_student<R, D>(
    State(state): State<AppState<R, D>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AttendanceError>
where
    R: BarcodeRenderer,
    D: BarcodeDecoder,
{
    let system = state.system.lock().map_err(|_| internal_error("state lock poisoned"))?;
    let artifact = system.register(&req.name, &req.matric_number, &req.code)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(artifact))))
}

/// GET /api/students/:barcode - Look up a student by full barcode
async fn get_student<R, D>(
    State(state): State<AppState<R, D>>,
    Path(barcode): Path<String>,
) -> Result<impl IntoResponse, AttendanceError>
where
    R: BarcodeRenderer,
    D: BarcodeDecoder,
{
    let system = state.system.lock().map_err(|_| internal_error("state lock poisoned"))?;
    let student = system
        .store()
        .find_student_by_barcode(&barcode)?
        .ok_or(AttendanceError::StudentNotFound { barcode })?;

    Ok(Json(ApiResponse::ok(student)))
}

/// POST /api/attendance - Mark attendance for an already decoded value
async fn mark<R, D>(
    State(state): State<AppState<R, D>>,
    Json(req): Json<MarkRequest>,
) -> Result<impl IntoResponse, AttendanceError>
where
    R: BarcodeRenderer,
    D: BarcodeDecoder,
{
    let system = state.system.lock().map_err(|_| internal_error("state lock poisoned"))?;
    let result = system.mark_attendance(&req.decoded_value)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(result))))
}

/// POST /api/attendance/scan - Decode an image on the server's disk
async fn scan<R, D>(
    State(state): State<AppState<R, D>>,
    Json(req): Json<ScanRequest>,
) -> Result<impl IntoResponse, AttendanceError>
where
    R: BarcodeRenderer,
    D: BarcodeDecoder,
{
    let system = state.system.lock().map_err(|_| internal_error("state lock poisoned"))?;
    let result = system.scan(&req.image_path)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(result))))
}

/// Build the API router
pub fn router<R, D>(state: AppState<R, D>) -> Router
where
    R: BarcodeRenderer + Send + 'static,
    D: BarcodeDecoder + Send + 'static,
{
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/students", post(register_student::<R, D>))
        .route("/students/:barcode", get(get_student::<R, D>))
        .route("/attendance", post(mark::<R, D>))
        .route("/attendance/scan", post(scan::<R, D>))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::testing::{text_system, TextDecoder, TextRenderer};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(dir: &std::path::Path) -> Router {
        router(AppState::<TextRenderer, TextDecoder>::new(text_system(dir)))
    }

    async fn call(app: Router, method: &str, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(app(dir.path()), "GET", "/api/health", serde_json::json!(null)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_register_mark_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, body) = call(
            app.clone(),
            "POST",
            "/api/students",
            serde_json::json!({"name": "Ada Lovelace", "matric_number": "MAT001", "code": "123456789012"}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["full_code"], "1234567890128");

        let (status, body) = call(
            app.clone(),
            "POST",
            "/api/attendance",
            serde_json::json!({"decoded_value": "1234567890128"}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["name"], "Ada Lovelace");
        assert_eq!(body["data"]["matric_number"], "MAT001");

        let (status, body) =
            call(app, "GET", "/api/students/1234567890128", serde_json::json!(null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["barcode"], "1234567890128");
    }

    #[tokio::test]
    async fn test_poisoned_state_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::<TextRenderer, TextDecoder>::new(text_system(dir.path()));

        let poisoner = state.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.system.lock().unwrap();
            panic!("poison the state lock");
        })
        .join();

        let (status, body) = call(
            router(state),
            "POST",
            "/api/attendance",
            serde_json::json!({"decoded_value": "1234567890128"}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["kind"], "internal");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let ada = serde_json::json!({"name": "Ada", "matric_number": "MAT001", "code": "123456789012"});

        call(app.clone(), "POST", "/api/students", ada.clone()).await;
        let (status, body) = call(app.clone(), "POST", "/api/students", ada).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "duplicate_barcode");

        let (status, body) = call(
            app.clone(),
            "POST",
            "/api/students",
            serde_json::json!({"name": "Ada", "matric_number": "MAT001", "code": "12ab"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "validation");

        let (status, body) = call(
            app.clone(),
            "POST",
            "/api/attendance",
            serde_json::json!({"decoded_value": "0000000000000"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "student_not_found");

        let blank = dir.path().join("blank.png");
        std::fs::write(&blank, "").unwrap();
        let (status, body) = call(
            app,
            "POST",
            "/api/attendance/scan",
            serde_json::json!({"image_path": blank}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["kind"], "no_barcode_detected");
    }
}
