use std::path::PathBuf;

use anyhow::Result;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, header},
};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use livewall_types::api::UploadResponse;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// Client-side rule carried to the server: images only, at most 5 MB.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// On-disk object store for uploaded images.
///
/// Objects land at `{dir}/{event}/{participant}/{uuid}.{ext}` and are served
/// back verbatim under `/media/`, so the stored key doubles as the public
/// path.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Media storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub async fn put_object(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.dir.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "img",
    }
}

pub async fn upload_image(
    State(state): State<AppState>,
    Path((event_id, participant_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<UploadResponse>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with("image/") {
        return Err(ApiError::Submit("only image uploads are accepted".into()));
    }
    if body.len() > MAX_IMAGE_BYTES {
        return Err(ApiError::Submit("image larger than 5 MB".into()));
    }

    let db = state.db.clone();
    let event = tokio::task::spawn_blocking(move || db.get_event_by_id(&event_id.to_string()))
        .await??;
    if event.is_none() {
        return Err(ApiError::NotFound);
    }

    let key = format!(
        "{}/{}/{}.{}",
        event_id,
        participant_id,
        Uuid::new_v4(),
        extension_for(&content_type)
    );
    state
        .storage
        .put_object(&key, &body)
        .await
        .map_err(|e| ApiError::Submit(format!("image upload failed: {}", e)))?;

    Ok(Json(UploadResponse {
        url: format!("{}/media/{}", state.public_url.trim_end_matches('/'), key),
    }))
}
