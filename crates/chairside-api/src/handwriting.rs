use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};

use chairside_service::HandwritingStore;
use chairside_types::api::UploadHandwritingResponse;

use crate::AppState;
use crate::error::ApiError;

/// 5 MB cap on handwritten-note PNGs.
const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// POST /api/handwriting — accepts raw PNG bytes, returns the opaque
/// filename the reservation will reference.
pub async fn upload(
    State(state): State<AppState>,
    bytes: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::bad_request("no file uploaded"));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(ApiError::bad_request("file exceeds 5 MB limit"));
    }
    if !bytes.starts_with(&PNG_MAGIC) {
        return Err(ApiError::bad_request("only PNG files are allowed"));
    }

    let filename = state
        .service
        .files()
        .store(&bytes)
        .await
        .map_err(|e| ApiError::internal(&e))?;

    Ok((
        StatusCode::CREATED,
        Json(UploadHandwritingResponse {
            filename,
            size: bytes.len() as u64,
        }),
    ))
}

/// GET /api/handwriting/{filename}
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !HandwritingStore::is_valid_filename(&filename) {
        return Err(ApiError::bad_request("invalid handwriting filename"));
    }

    let bytes = state
        .service
        .files()
        .read(&filename)
        .await
        .map_err(|e| ApiError::internal(&e))?
        .ok_or_else(|| ApiError::not_found(format!("Handwriting {} not found", filename)))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_magic_matches_real_header() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00];
        assert!(png.starts_with(&PNG_MAGIC));
        assert!(!b"GIF89a".starts_with(&PNG_MAGIC));
    }
}
