// src/handlers/upload.rs

use axum::{Json, extract::Multipart, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::{config::Config, error::AppError};

/// A file written to the staging area but not yet published.
///
/// Owns exactly one release: either `persist` renames it into the public
/// upload directory, or dropping the guard unlinks the staging file. The
/// inner `Option` is taken on release so a second release is impossible.
struct StagedUpload {
    path: Option<PathBuf>,
}

impl StagedUpload {
    async fn write(staging_dir: &Path, file_name: &str, bytes: &[u8]) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(staging_dir).await?;
        let path = staging_dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;
        Ok(Self { path: Some(path) })
    }

    async fn persist(mut self, final_path: &Path) -> Result<(), AppError> {
        // Taking the path disarms the Drop cleanup.
        let staged = self
            .path
            .take()
            .ok_or_else(|| AppError::InternalServerError("staged file already released".into()))?;
        tokio::fs::rename(&staged, final_path).await?;
        Ok(())
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("failed to remove staged upload {:?}: {}", path, e);
            }
        }
    }
}

/// Accept a multipart image upload and return its public URL.
///
/// Validates the declared content type against the supported image formats
/// and enforces the configured size cap. The file lands in a staging
/// directory first and is renamed into the public directory only once fully
/// written, so readers of `/uploads` never observe partial files.
pub async fn upload_image(
    State(config): State<Config>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_owned)
            .ok_or_else(|| AppError::BadRequest("Missing content type on file field".to_string()))?;

        let extension = extension_for(&content_type).ok_or_else(|| {
            AppError::BadRequest(
                "Please upload only image files (JPG, PNG, GIF or WebP)".to_string(),
            )
        })?;

        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
        }
        if bytes.len() as u64 > config.max_upload_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File size must be less than {} bytes",
                config.max_upload_bytes
            )));
        }

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let upload_dir = Path::new(&config.upload_dir);
        let staging_dir = upload_dir.join(".staging");

        let staged = StagedUpload::write(&staging_dir, &file_name, &bytes).await?;
        tokio::fs::create_dir_all(upload_dir).await?;
        staged.persist(&upload_dir.join(&file_name)).await?;

        tracing::info!(%file_name, size = bytes.len(), "image uploaded");

        return Ok((
            StatusCode::CREATED,
            Json(json!({ "url": format!("/uploads/{file_name}") })),
        ));
    }

    Err(AppError::BadRequest(
        "Multipart request is missing a 'file' field".to_string(),
    ))
}

/// Map a declared content type to a file extension; unsupported types get
/// rejected rather than stored under a guessed name.
fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}
