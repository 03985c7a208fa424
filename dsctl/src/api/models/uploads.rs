//! API response model for CSV uploads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    /// Name the file was stored under
    pub filename: String,
    pub original_name: String,
    /// Bytes written
    pub size: u64,
}
