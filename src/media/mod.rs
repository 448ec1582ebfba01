pub mod cloudinary;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::upload::UploadedFile;

/// Resource-type hint sent to the provider. PDFs go up as `Raw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Image,
    Raw,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Image => "image",
            ResourceType::Raw => "raw",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UploadOptions<'a> {
    pub folder: Option<&'a str>,
    pub resource_type: ResourceType,
}

impl<'a> UploadOptions<'a> {
    pub fn image(folder: &'a str) -> Self {
        Self {
            folder: Some(folder),
            resource_type: ResourceType::Image,
        }
    }

    pub fn raw(folder: &'a str) -> Self {
        Self {
            folder: Some(folder),
            resource_type: ResourceType::Raw,
        }
    }
}

/// Where an uploaded asset ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAsset {
    pub url: String,
    pub public_id: String,
}

#[derive(Debug)]
pub struct MediaError {
    pub message: String,
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<String> for MediaError {
    fn from(message: String) -> Self {
        MediaError { message }
    }
}

impl From<&str> for MediaError {
    fn from(s: &str) -> Self {
        MediaError {
            message: s.to_string(),
        }
    }
}

/// Remote media storage. Uploads take a data URI and hand back a public URL
/// plus the identifier needed to delete the asset later.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(
        &self,
        data_uri: &str,
        options: UploadOptions<'_>,
    ) -> Result<StoredAsset, MediaError>;

    async fn destroy(&self, public_id: &str, resource_type: ResourceType)
        -> Result<(), MediaError>;
}

/// Stand-in used when no provider credentials are configured.
pub struct DisabledStore;

#[async_trait]
impl MediaStore for DisabledStore {
    async fn upload(
        &self,
        _data_uri: &str,
        _options: UploadOptions<'_>,
    ) -> Result<StoredAsset, MediaError> {
        Err(MediaError::from("Media storage is not configured"))
    }

    async fn destroy(
        &self,
        _public_id: &str,
        _resource_type: ResourceType,
    ) -> Result<(), MediaError> {
        Err(MediaError::from("Media storage is not configured"))
    }
}

/// `data:<mime>;base64,<payload>`
pub fn data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{content_type};base64,{}", STANDARD.encode(bytes))
}

/// Encode an uploaded file and push it to the store.
pub async fn ingest(
    store: &dyn MediaStore,
    file: &UploadedFile,
    options: UploadOptions<'_>,
) -> Result<StoredAsset, MediaError> {
    let uri = data_uri(&file.content_type, &file.data);
    let asset = store.upload(&uri, options).await?;
    tracing::debug!(
        field = %file.field,
        public_id = %asset.public_id,
        bytes = file.data.len(),
        "Uploaded file"
    );
    Ok(asset)
}

/// Best-effort delete. Failures are logged and otherwise ignored.
pub async fn discard(store: &dyn MediaStore, public_id: &str, resource_type: ResourceType) {
    if let Err(e) = store.destroy(public_id, resource_type).await {
        tracing::warn!("Failed to delete stored asset {public_id}: {e}");
    }
}
