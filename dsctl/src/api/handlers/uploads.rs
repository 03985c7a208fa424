//! CSV upload endpoint.
//!
//! Files are streamed to `storage.upload_dir` chunk by chunk. The router disables axum's default
//! body limit for this route only.

use std::path::{Path, PathBuf};

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
};
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::api::extract::Json;
use crate::{
    AppState,
    api::models::uploads::UploadResponse,
    auth::roles::{RequiresRole, Writer},
    errors::{Error, Result},
};

const FILE_FIELD: &str = "file";

/// Longest stem kept from the uploaded name.
const MAX_STEM_LENGTH: usize = 100;

/// Numbered variants tried when a stored name is already taken.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Stored name for an uploaded file: `<stem>_<timestamp>.csv`, where the stem keeps only ASCII
/// letters, digits, `-` and `_` from the original. Rejects anything not ending in `.csv`.
pub fn stored_file_name(original: &str, timestamp: &str) -> Result<String> {
    // Browsers on Windows may send the full client path
    let base = original.rsplit(['/', '\\']).next().unwrap_or(original).trim();

    let stem = match base.len().checked_sub(4) {
        Some(split) if base.is_char_boundary(split) && base[split..].eq_ignore_ascii_case(".csv") => &base[..split],
        _ => {
            return Err(Error::BadRequest {
                message: "Only .csv files are accepted".to_string(),
            });
        }
    };

    let mut sanitized: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(MAX_STEM_LENGTH)
        .collect();
    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() {
        sanitized = "upload".to_string();
    } else if trimmed.len() != sanitized.len() {
        sanitized = trimmed.to_string();
    }

    Ok(format!("{sanitized}_{timestamp}.csv"))
}

/// Create `filename` under `dir` without touching existing files. When the name is taken,
/// `<stem>_1.csv`, `<stem>_2.csv` and so on are tried. Returns the name actually used.
pub async fn create_upload_file(dir: &Path, filename: &str) -> Result<(String, PathBuf, tokio::fs::File)> {
    let stem = filename.strip_suffix(".csv").unwrap_or(filename);

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let candidate = if attempt == 0 {
            filename.to_string()
        } else {
            format!("{stem}_{attempt}.csv")
        };
        let path = dir.join(&candidate);
        match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((candidate, path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(%candidate, "upload name taken, trying the next one");
            }
            Err(e) => {
                return Err(Error::Internal {
                    operation: format!("create upload file: {e}"),
                });
            }
        }
    }

    Err(Error::Internal {
        operation: format!("find a free name for {filename}"),
    })
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "failed to remove partial upload");
    }
}

/// POST /api/uploads/csv - Store a CSV file
#[utoipa::path(
    post,
    path = "/api/uploads/csv",
    tag = "uploads",
    summary = "Upload a CSV file",
    request_body(content_type = "multipart/form-data", description = "Multipart form with a `file` field"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "Missing file or not a .csv"),
        (status = 403, description = "Viewers cannot upload"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn upload_csv(
    State(state): State<AppState>,
    RequiresRole(user, _): RequiresRole<Writer>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let upload_dir: PathBuf = state.config.storage.upload_dir.clone();

    while let Some(mut field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Invalid multipart data: {e}"),
    })? {
        if field.name() != Some(FILE_FIELD) {
            debug!(field = ?field.name(), "skipping multipart field");
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| Error::BadRequest {
                message: "The file field must carry a filename".to_string(),
            })?;
        let timestamp = Utc::now().format("%Y%m%d%H%M%S%3f").to_string();
        let filename = stored_file_name(&original_name, &timestamp)?;

        tokio::fs::create_dir_all(&upload_dir).await.map_err(|e| Error::Internal {
            operation: format!("create upload directory: {e}"),
        })?;
        let (filename, path, mut file) = create_upload_file(&upload_dir, &filename).await?;

        let mut size: u64 = 0;
        loop {
            let chunk = match field.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    remove_partial(&path).await;
                    return Err(Error::BadRequest {
                        message: format!("Failed to read file chunk: {e}"),
                    });
                }
            };
            if let Err(e) = file.write_all(&chunk).await {
                remove_partial(&path).await;
                return Err(Error::Internal {
                    operation: format!("write upload file: {e}"),
                });
            }
            size += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| Error::Internal {
            operation: format!("flush upload file: {e}"),
        })?;

        info!(user_id = user.id, %original_name, %filename, size, "csv uploaded");
        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                success: true,
                message: "File uploaded successfully".to_string(),
                filename,
                original_name,
                size,
            }),
        ));
    }

    Err(Error::BadRequest {
        message: "No file uploaded: expected a multipart field named 'file'".to_string(),
    })
}
