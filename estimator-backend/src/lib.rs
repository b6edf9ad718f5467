use axum::{
    extract::{DefaultBodyLimit, Json, State},
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use base64::Engine;
use room_estimator::{
    fuse_room, EstimatorError, FusedRoomEstimate, ImageAnalysis, ResultEntry, RoomAnalyzer,
    SpatialEstimate,
};
use room_estimator::fusion::AreaComparison;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Photos are uploaded base64-encoded inside JSON, so the limit covers a
/// handful of phone pictures
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

const DEFAULT_ALLOWED_ORIGINS: &str =
    "http://localhost:8080,http://127.0.0.1:8080,http://localhost:5173,http://127.0.0.1:5173";

pub struct AppState {
    pub analyzer: RoomAnalyzer,
}

impl AppState {
    pub fn new(analyzer: RoomAnalyzer) -> Self {
        Self { analyzer }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

fn api_error(status: StatusCode, error: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }),
    )
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Base64 image, optionally as a `data:` URI
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadedImage {
    #[serde(default)]
    pub filename: Option<String>,
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct ReconstructRequest {
    pub images: Vec<UploadedImage>,
    #[serde(default)]
    pub claimed_area: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct PhotoEstimate {
    pub filename: Option<String>,
    pub spatial: SpatialEstimate,
    pub is_calibrated: bool,
    pub image_size: [u32; 2],
}

#[derive(Debug, Serialize)]
pub struct ReconstructResponse {
    pub status: String,
    /// One result list per uploaded photo, in upload order
    pub analysis_results: Vec<Vec<ResultEntry>>,
    pub spatial_data: SpatialEstimate,
    pub is_calibrated: bool,
    pub photo_count: usize,
    pub photos: Vec<PhotoEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_comparison: Option<AreaComparison>,
}

#[derive(Debug, Deserialize)]
pub struct FuseRequest {
    pub estimates: Vec<SpatialEstimate>,
}

/// Decode a base64 payload, accepting a `data:image/...;base64,` prefix
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let trimmed = payload.trim();
    let encoded = match trimmed.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => trimmed,
    };
    base64::engine::general_purpose::STANDARD.decode(encoded)
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<ImageAnalysis>, ApiError> {
    let bytes = decode_image_payload(&request.image).map_err(|e| {
        warn!("Rejected analyze request: {}", e);
        api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_IMAGE",
            format!("Failed to decode base64 image: {}", e),
        )
    })?;

    info!("Received analyze request ({} bytes)", bytes.len());
    let analysis = state.analyzer.analyze_image_bytes(&bytes).await;
    Ok(Json(analysis))
}

async fn reconstruct_room_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReconstructRequest>,
) -> Result<Json<ReconstructResponse>, ApiError> {
    if request.images.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "NO_IMAGES",
            "At least one image is required",
        ));
    }

    // a bad payload is one unreadable photo, not a failed request; empty
    // bytes never decode, so the analyzer zeroes that photo
    let payloads: Vec<Vec<u8>> = request
        .images
        .iter()
        .enumerate()
        .map(|(idx, upload)| {
            decode_image_payload(&upload.data).unwrap_or_else(|e| {
                let name = upload.filename.as_deref().unwrap_or("<unnamed>");
                warn!("Image {} ({}) is not valid base64, treating as unreadable: {}", idx, name, e);
                Vec::new()
            })
        })
        .collect();

    info!(
        "Received reconstruct request with {} images (claimed area: {:?})",
        payloads.len(),
        request.claimed_area
    );

    let reconstruction = state
        .analyzer
        .reconstruct_room(&payloads, request.claimed_area)
        .await
        .map_err(|e| {
            warn!("Reconstruction failed: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "RECONSTRUCTION_FAILED",
                format!("Reconstruction failed: {}", e),
            )
        })?;

    let photos = request
        .images
        .into_iter()
        .zip(&reconstruction.analyses)
        .map(|(upload, analysis)| PhotoEstimate {
            filename: upload.filename,
            spatial: analysis.spatial.clone(),
            is_calibrated: analysis.is_calibrated,
            image_size: analysis.image_size,
        })
        .collect();

    let is_calibrated = reconstruction.room.is_calibrated();
    let FusedRoomEstimate {
        spatial,
        photo_count,
    } = reconstruction.room;

    Ok(Json(ReconstructResponse {
        status: "Verified".to_string(),
        analysis_results: reconstruction
            .analyses
            .into_iter()
            .map(|a| a.analysis_results)
            .collect(),
        spatial_data: spatial,
        is_calibrated,
        photo_count,
        photos,
        area_comparison: reconstruction.area_comparison,
    }))
}

async fn fuse_handler(
    Json(request): Json<FuseRequest>,
) -> Result<Json<FusedRoomEstimate>, ApiError> {
    match fuse_room(&request.estimates) {
        Ok(fused) => Ok(Json(fused)),
        Err(e @ EstimatorError::EmptyFusionInput) => Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "EMPTY_INPUT",
            e.to_string(),
        )),
        Err(e) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "FUSION_FAILED",
            e.to_string(),
        )),
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    // Configure CORS from environment or use localhost for development
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string());

    let origins: Vec<_> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let cors = if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/analyze", post(analyze_handler))
        .route("/reconstruct-room", post(reconstruct_room_handler))
        .route("/fuse", post(fuse_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
