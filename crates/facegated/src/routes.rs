use crate::config::Config;
use crate::engine::{AnalyzeError, EngineHandle, ImageSource};
use crate::error::{ApiError, Result};
use crate::upload::{allowed_file, TempUpload};
use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use facegate_core::recognizer::RecognizerError;
use facegate_core::{AnalyzedFace, Encoding, EngineError, FaceLocation, DEFAULT_TOLERANCE};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::Level;

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_content_length;

    Router::new()
        .route("/api/face/verify", post(verify_face))
        .route("/api/face/encode", post(encode_face))
        .route("/api/health", get(health))
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    image: Option<String>,
    known_encoding: Option<Encoding>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    success: bool,
    #[serde(rename = "match")]
    matched: bool,
    face_location: FaceLocation,
}

#[derive(Debug, Serialize)]
pub struct EncodeResponse {
    success: bool,
    encoding: Encoding,
}

/// Compare the face in a base64 image against a known encoding.
async fn verify_face(
    State(state): State<AppState>,
    payload: std::result::Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>> {
    let Json(req) = payload
        .map_err(|rejection| ApiError::from_json_rejection(rejection, state.config.max_content_length))?;

    let (Some(image), Some(known)) = (req.image, req.known_encoding) else {
        return Err(ApiError::validation(
            "Missing required fields: image and known_encoding are required",
        ));
    };

    let bytes = decode_image_payload(&image)?;
    let faces = state
        .engine
        .analyze(ImageSource::Bytes(bytes), Some(1))
        .await
        .map_err(|e| analyze_error(e, "Could not extract face features"))?;

    let Some(AnalyzedFace { location, encoding }) = faces.into_iter().next() else {
        return Err(ApiError::detection("No face detected in the uploaded image"));
    };

    if known.is_empty() || known.len() != encoding.len() {
        return Err(ApiError::validation(format!(
            "known_encoding has {} values, expected {}",
            known.len(),
            encoding.len()
        )));
    }

    let matched = facegate_core::matches(Some(&known), Some(&encoding), DEFAULT_TOLERANCE);
    tracing::info!(
        matched,
        distance = known.distance(&encoding).unwrap_or(f32::NAN),
        "verify completed"
    );

    Ok(Json(VerifyResponse {
        success: true,
        matched,
        face_location: location,
    }))
}

/// Compute the encoding of the first face in an uploaded image file.
async fn encode_face(
    State(state): State<AppState>,
    payload: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<EncodeResponse>> {
    let limit = state.config.max_content_length;
    let mut multipart =
        payload.map_err(|rejection| ApiError::from_multipart_rejection(rejection, limit))?;

    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::from_multipart_error(e, limit))?
    {
        // A part without a filename attribute is a plain form field, not a file.
        let filename = match (field.name(), field.file_name()) {
            (Some("file"), Some(name)) => name.to_string(),
            _ => continue,
        };
        let contents = field
            .bytes()
            .await
            .map_err(|e| ApiError::from_multipart_error(e, limit))?;
        file = Some((filename, contents));
        break;
    }

    let (filename, contents) = file.ok_or_else(|| ApiError::validation("No file part"))?;
    if filename.is_empty() {
        return Err(ApiError::validation("No selected file"));
    }
    if !allowed_file(&filename) {
        return Err(ApiError::validation("File type not allowed"));
    }

    let upload = TempUpload::create(&state.config.upload_dir, &filename, &contents)
        .await
        .map_err(ApiError::internal)?;

    let faces = state
        .engine
        .analyze(ImageSource::File(upload.path().to_path_buf()), Some(1))
        .await
        .map_err(|e| analyze_error(e, "Could not detect a face in the image"))?;
    drop(upload);

    let face = faces
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::detection("Could not detect a face in the image"))?;

    tracing::info!(filename = %filename, dims = face.encoding.len(), "encode completed");
    Ok(Json(EncodeResponse {
        success: true,
        encoding: face.encoding,
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "face-recognition",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "Not found" })),
    )
}

/// Raw base64 or a data URL (`data:image/png;base64,...`) to bytes.
fn decode_image_payload(image: &str) -> Result<Vec<u8>> {
    let data = image
        .split_once("base64,")
        .map(|(_, rest)| rest)
        .unwrap_or(image);
    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| ApiError::internal(format!("invalid base64 image data: {e}")))
}

/// A face without landmarks cannot be encoded; that is a detection problem,
/// everything else is internal.
fn analyze_error(err: AnalyzeError, no_features: &str) -> ApiError {
    match err {
        AnalyzeError::Engine(EngineError::Recognizer(RecognizerError::NoLandmarks)) => {
            ApiError::detection(no_features)
        }
        other => ApiError::internal(other),
    }
}
