//! Avatar upload route

use axum::{
    extract::{Extension, Multipart, State},
    Json,
};
use serde::Serialize;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
    storage::StorageError,
};

/// Maximum accepted avatar size
const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];

#[derive(Debug, Serialize)]
pub struct UploadAvatarResponse {
    pub message: String,
    pub image_url: String,
}

/// Upload an avatar image; the file is passed through to hosted storage
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadAvatarResponse>> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Malformed multipart body".to_string()))?
    {
        if field.name() != Some("avatar") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Validation("Missing image content type".to_string()))?;

        if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
            return Err(ApiError::Validation(format!(
                "Unsupported image type: {}",
                content_type
            )));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|_| ApiError::BadRequest("Failed to read uploaded file".to_string()))?;

        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(ApiError::Validation(
                "Avatar must be at most 5 MiB".to_string(),
            ));
        }

        file = Some((content_type, bytes.to_vec()));
        break;
    }

    let (content_type, bytes) = file.ok_or_else(|| {
        ApiError::BadRequest("No file uploaded or file type invalid".to_string())
    })?;

    if bytes.is_empty() {
        return Err(ApiError::Validation("Uploaded file is empty".to_string()));
    }

    let image_url = state
        .avatar_storage
        .upload_avatar(auth_user.user_id, bytes, &content_type)
        .await
        .map_err(|e| match e {
            StorageError::NotConfigured => ApiError::ServiceUnavailable,
            StorageError::UnsupportedImageType(t) => {
                ApiError::Validation(format!("Unsupported image type: {}", t))
            }
            StorageError::Request(_)
            | StorageError::UploadRejected(_)
            | StorageError::MalformedResponse => ApiError::UploadFailed,
        })?;

    Ok(Json(UploadAvatarResponse {
        message: "Avatar uploaded successfully".to_string(),
        image_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_image_types() {
        assert!(ALLOWED_IMAGE_TYPES.contains(&"image/png"));
        assert!(ALLOWED_IMAGE_TYPES.contains(&"image/jpeg"));
        assert!(!ALLOWED_IMAGE_TYPES.contains(&"image/gif"));
        assert!(!ALLOWED_IMAGE_TYPES.contains(&"application/pdf"));
    }
}
