use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{MediaError, MediaStore, ResourceType, StoredAsset, UploadOptions};
use crate::config::CloudinaryConfig;

const API_BASE: &str = "https://api.cloudinary.com";

/// Cloudinary upload API client. Requests are signed with SHA-256, so the
/// account must have SHA-256 signatures enabled.
pub struct CloudinaryStore {
    client: reqwest::Client,
    config: CloudinaryConfig,
    api_base: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MediaError::from(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            api_base: API_BASE.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn endpoint(&self, resource_type: ResourceType, action: &str) -> String {
        format!(
            "{}/v1_1/{}/{}/{action}",
            self.api_base.trim_end_matches('/'),
            self.config.cloud_name,
            resource_type.as_str()
        )
    }

    /// Sign `params`, then add the key and signature to them.
    fn signed_form(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        let signature = sign(&params, &self.config.api_secret);
        params.push(("api_key", self.config.api_key.clone()));
        params.push(("signature", signature));
        params.push(("signature_algorithm", "sha256".to_string()));
        params
    }

    async fn post(
        &self,
        url: &str,
        form: &[(&'static str, String)],
    ) -> Result<reqwest::Response, MediaError> {
        let resp = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| MediaError::from(format!("Storage request failed: {e}")))?;

        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let message = resp
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error.message)
            .unwrap_or_else(|_| "no error message".to_string());
        Err(MediaError::from(format!("Storage returned {status}: {message}")))
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload(
        &self,
        data_uri: &str,
        options: UploadOptions<'_>,
    ) -> Result<StoredAsset, MediaError> {
        let mut params = vec![("timestamp", Utc::now().timestamp().to_string())];
        if let Some(folder) = options.folder {
            params.push(("folder", folder.to_string()));
        }

        let mut form = self.signed_form(params);
        form.push(("file", data_uri.to_string()));

        let resp = self
            .post(&self.endpoint(options.resource_type, "upload"), &form)
            .await?;
        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| MediaError::from(format!("Invalid upload response: {e}")))?;

        Ok(StoredAsset {
            url: body.secure_url,
            public_id: body.public_id,
        })
    }

    async fn destroy(
        &self,
        public_id: &str,
        resource_type: ResourceType,
    ) -> Result<(), MediaError> {
        let form = self.signed_form(vec![
            ("public_id", public_id.to_string()),
            ("timestamp", Utc::now().timestamp().to_string()),
        ]);

        let resp = self
            .post(&self.endpoint(resource_type, "destroy"), &form)
            .await?;
        let body: DestroyResponse = resp
            .json()
            .await
            .map_err(|e| MediaError::from(format!("Invalid destroy response: {e}")))?;

        match body.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(MediaError::from(format!("Destroy of {public_id} returned '{other}'"))),
        }
    }
}

/// Cloudinary request signature: parameters sorted by name, joined as
/// `k=v&k=v`, secret appended, SHA-256 hex digest.
fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
