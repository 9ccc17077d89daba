//! Avatar storage via Cloudinary
//!
//! Uploads are passed straight through to Cloudinary's signed upload API; the
//! API never stores image bytes locally. Uploaded avatars are face-cropped to
//! 250x250 server-side by Cloudinary's transformation pipeline.

use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::Config;

const AVATAR_FOLDER: &str = "mentorhub_avatars";
const AVATAR_TRANSFORMATION: &str = "c_fill,g_face,h_250,w_250";

/// Cloudinary-backed avatar storage
#[derive(Clone)]
pub struct AvatarStorage {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    base_url: String,
}

impl AvatarStorage {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            cloud_name: config.cloudinary_cloud_name.clone(),
            api_key: config.cloudinary_api_key.clone(),
            api_secret: config.cloudinary_api_secret.clone(),
            base_url: "https://api.cloudinary.com".to_string(),
        }
    }

    /// Point the client at a different API host (used by tests)
    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Check if avatar uploads are configured
    pub fn is_enabled(&self) -> bool {
        !self.cloud_name.is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    /// Upload an avatar image, returning the hosted URL
    pub async fn upload_avatar(
        &self,
        user_id: Uuid,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        if !self.is_enabled() {
            return Err(StorageError::NotConfigured);
        }

        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        let public_id = format!("avatar-{}-{}", user_id, timestamp);

        // Every param except the file itself and api_key is signed
        let params = [
            ("folder", AVATAR_FOLDER.to_string()),
            ("public_id", public_id.clone()),
            ("timestamp", timestamp.to_string()),
            ("transformation", AVATAR_TRANSFORMATION.to_string()),
        ];
        let signature = sign_params(&params, &self.api_secret);

        let file_part = reqwest::multipart::Part::bytes(bytes)
            .file_name("avatar")
            .mime_str(content_type)
            .map_err(|_| StorageError::UnsupportedImageType(content_type.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("signature", signature)
            .text("folder", AVATAR_FOLDER)
            .text("public_id", public_id)
            .text("transformation", AVATAR_TRANSFORMATION);

        let url = format!("{}/v1_1/{}/image/upload", self.base_url, self.cloud_name);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(StorageError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Cloudinary upload rejected");
            return Err(StorageError::UploadRejected(status.as_u16()));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|_| StorageError::MalformedResponse)?;

        tracing::info!(user_id = %user_id, url = %body.secure_url, "Avatar uploaded");
        Ok(body.secure_url)
    }
}

/// SHA-256 request signature over the sorted, ampersand-joined parameters
fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<String> = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    sorted.sort();

    let to_sign = format!("{}{}", sorted.join("&"), api_secret);
    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, serde::Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Avatar storage is not configured")]
    NotConfigured,
    #[error("Unsupported image type: {0}")]
    UnsupportedImageType(String),
    #[error("Upload request failed: {0}")]
    Request(reqwest::Error),
    #[error("Upload rejected with status {0}")]
    UploadRejected(u16),
    #[error("Malformed upload response")]
    MalformedResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_config(cloud_name: &str) -> Config {
        Config {
            bind_address: "127.0.0.1:0".into(),
            client_origin: "http://localhost:3000".into(),
            database_url: "postgres://test".into(),
            database_max_connections: 1,
            jwt_secret: "test-jwt-secret-must-be-at-least-32-characters".into(),
            jwt_expiry_hours: 24,
            cloudinary_cloud_name: cloud_name.into(),
            cloudinary_api_key: "key".into(),
            cloudinary_api_secret: "secret".into(),
            openai_api_key: String::new(),
            openai_model: "gpt-3.5-turbo".into(),
            openai_base_url: "https://api.openai.com".into(),
        }
    }

    #[test]
    fn test_signature_is_deterministic_and_sorted() {
        let params = [
            ("timestamp", "123".to_string()),
            ("folder", "mentorhub_avatars".to_string()),
        ];
        // Keys are sorted before joining, so ordering in the slice is irrelevant
        let reversed = [
            ("folder", "mentorhub_avatars".to_string()),
            ("timestamp", "123".to_string()),
        ];
        assert_eq!(sign_params(&params, "s"), sign_params(&reversed, "s"));

        let mut hasher = Sha256::new();
        hasher.update(b"folder=mentorhub_avatars&timestamp=123s");
        assert_eq!(sign_params(&params, "s"), hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_disabled_without_credentials() {
        let storage = AvatarStorage::new(&test_config(""));
        assert!(!storage.is_enabled());
    }

    #[tokio::test]
    async fn test_upload_not_configured() {
        let storage = AvatarStorage::new(&test_config(""));
        let result = storage
            .upload_avatar(Uuid::new_v4(), vec![1, 2, 3], "image/png")
            .await;
        assert!(matches!(result, Err(StorageError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_upload_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1_1/test-cloud/image/upload")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"secure_url":"https://res.cloudinary.com/test-cloud/avatar.png"}"#)
            .create_async()
            .await;

        let storage = AvatarStorage::new(&test_config("test-cloud")).with_base_url(&server.url());
        let url = storage
            .upload_avatar(Uuid::new_v4(), vec![0xFF, 0xD8], "image/jpeg")
            .await
            .unwrap();

        assert_eq!(url, "https://res.cloudinary.com/test-cloud/avatar.png");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1_1/test-cloud/image/upload")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Invalid signature"}}"#)
            .create_async()
            .await;

        let storage = AvatarStorage::new(&test_config("test-cloud")).with_base_url(&server.url());
        let result = storage
            .upload_avatar(Uuid::new_v4(), vec![1], "image/png")
            .await;

        assert!(matches!(result, Err(StorageError::UploadRejected(401))));
    }
}
