//! Request bodies for routes that accept file uploads.
//!
//! Files are buffered in memory. Besides `multipart/form-data`, the same
//! routes accept JSON and urlencoded bodies so text-only updates don't need a
//! multipart client.

use std::collections::HashMap;
use std::marker::PhantomData;

use axum::extract::{FromRequest, Request};
use axum::http::HeaderMap;
use bytes::Bytes;
use serde_json::Value;

use crate::error::AppError;

/// A buffered file from a multipart field.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type == "application/pdf"
    }
}

/// Text fields plus files, keyed by form field name.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    lists: HashMap<String, Vec<String>>,
    files: HashMap<String, UploadedFile>,
}

impl FormData {
    /// The raw value, present even when empty.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The trimmed value, `None` when missing or blank.
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.text(name).map(str::trim).filter(|s| !s.is_empty())
    }

    /// A JSON array of strings sent for `name`.
    pub fn list(&self, name: &str) -> Option<&[String]> {
        self.lists.get(name).map(Vec::as_slice)
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }
}

/// Which file fields a route takes and what it lets through.
pub trait UploadPolicy {
    const FILE_FIELDS: &'static [&'static str];
    const MAX_FILE_SIZE: usize;

    fn accepts(content_type: &str) -> bool;
    fn rejection() -> &'static str;
}

/// One optional file in the `file` field, any type, up to 5 MiB.
pub struct SingleFile;

impl UploadPolicy for SingleFile {
    const FILE_FIELDS: &'static [&'static str] = &["file"];
    const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

    fn accepts(_content_type: &str) -> bool {
        true
    }

    fn rejection() -> &'static str {
        "Invalid file type."
    }
}

/// `profilePhoto` and `resume`, images or PDFs only, up to 10 MiB each.
/// Per-field type checks happen in the handler.
pub struct ProfileFiles;

impl UploadPolicy for ProfileFiles {
    const FILE_FIELDS: &'static [&'static str] = &["profilePhoto", "resume"];
    const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

    fn accepts(content_type: &str) -> bool {
        content_type.starts_with("image/") || content_type == "application/pdf"
    }

    fn rejection() -> &'static str {
        "Invalid file type. Only images and PDFs are allowed for profile fields."
    }
}

/// Extractor yielding [`FormData`] checked against policy `P`.
pub struct Upload<P>(pub FormData, pub PhantomData<P>);

impl<S, P> FromRequest<S> for Upload<P>
where
    S: Send + Sync,
    P: UploadPolicy + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let headers = req.headers().clone();
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read request body: {e}")))?;

        let content_type = headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let form = if content_type.contains("multipart/form-data") {
            parse_multipart::<P>(&headers, body).await?
        } else {
            parse_fields(content_type, &body)?
        };

        Ok(Upload(form, PhantomData))
    }
}

/// Parse a non-multipart body. An empty body yields an empty form.
pub fn parse_fields(content_type: &str, body: &[u8]) -> Result<FormData, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(FormData::default());
    }

    if content_type.contains("application/x-www-form-urlencoded") {
        return Ok(FormData {
            fields: form_urlencoded::parse(body)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
            ..FormData::default()
        });
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON: {e}")))?;
    json_fields(value)
}

/// Strings and numbers become text fields, arrays of strings become lists.
/// Anything else is dropped.
fn json_fields(value: Value) -> Result<FormData, AppError> {
    let Value::Object(map) = value else {
        return Err(AppError::BadRequest(
            "Request body must be a JSON object".to_string(),
        ));
    };

    let mut form = FormData::default();
    for (key, value) in map {
        match value {
            Value::String(s) => {
                form.fields.insert(key, s);
            }
            Value::Number(n) => {
                form.fields.insert(key, n.to_string());
            }
            Value::Array(items) => {
                let strings: Option<Vec<String>> = items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect();
                if let Some(strings) = strings {
                    form.lists.insert(key, strings);
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

pub async fn parse_multipart<P: UploadPolicy>(
    headers: &HeaderMap,
    body: Bytes,
) -> Result<FormData, AppError> {
    let boundary = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or_else(|| AppError::BadRequest("Missing multipart boundary".to_string()))?;

    let stream = futures_util::stream::once(async { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut form = FormData::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Field read error: {e}")))?;
            form.fields.insert(name, value);
            continue;
        };

        // Browsers send an empty, unnamed part for an untouched file input.
        if file_name.is_empty() {
            field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Field read error: {e}")))?;
            continue;
        }

        if !P::FILE_FIELDS.contains(&name.as_str()) {
            return Err(AppError::BadRequest(format!("Unexpected file field '{name}'")));
        }
        if form.files.contains_key(&name) {
            return Err(AppError::BadRequest(format!(
                "Only one file is allowed in field '{name}'"
            )));
        }

        let content_type = field
            .content_type()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        if !P::accepts(&content_type) {
            return Err(AppError::BadRequest(P::rejection().to_string()));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Field read error: {e}")))?;
        if data.len() > P::MAX_FILE_SIZE {
            return Err(AppError::BadRequest(format!(
                "File in field '{name}' exceeds {} MB",
                P::MAX_FILE_SIZE / (1024 * 1024)
            )));
        }

        form.files.insert(
            name.clone(),
            UploadedFile {
                field: name,
                file_name,
                content_type,
                data,
            },
        );
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const BOUNDARY: &str = "X-TEST-BOUNDARY";

    fn multipart_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_str(&format!("multipart/form-data; boundary={BOUNDARY}")).unwrap(),
        );
        headers
    }

    fn text_part(name: &str, value: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
    }

    fn file_part(name: &str, file_name: &str, content_type: &str, body: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n{body}\r\n"
        )
    }

    fn body(parts: &[String]) -> Bytes {
        Bytes::from(format!("{}--{BOUNDARY}--\r\n", parts.concat()))
    }

    #[tokio::test]
    async fn multipart_splits_text_and_files() {
        let body = body(&[
            text_part("bio", "Hello"),
            file_part("resume", "cv.pdf", "application/pdf", "%PDF-1.4"),
        ]);

        let form = parse_multipart::<ProfileFiles>(&multipart_headers(), body)
            .await
            .unwrap();

        assert_eq!(form.text("bio"), Some("Hello"));
        let resume = form.file("resume").unwrap();
        assert!(resume.is_pdf());
        assert_eq!(resume.file_name, "cv.pdf");
        assert_eq!(&resume.data[..], b"%PDF-1.4");
    }

    #[tokio::test]
    async fn multipart_rejects_unknown_file_field() {
        let body = body(&[file_part("avatar", "a.png", "image/png", "png")]);
        let err = parse_multipart::<ProfileFiles>(&multipart_headers(), body)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("avatar")));
    }

    #[tokio::test]
    async fn multipart_enforces_policy_types() {
        let body = body(&[file_part("resume", "cv.txt", "text/plain", "hello")]);
        let err = parse_multipart::<ProfileFiles>(&multipart_headers(), body)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn single_file_accepts_any_type() {
        let body = body(&[
            text_part("fullname", "Ada"),
            file_part("file", "notes.txt", "text/plain", "hello"),
        ]);
        let form = parse_multipart::<SingleFile>(&multipart_headers(), body)
            .await
            .unwrap();
        assert_eq!(form.file("file").unwrap().content_type, "text/plain");
    }

    #[test]
    fn json_scalars_become_text() {
        let form = parse_fields(
            "application/json",
            br#"{"fullname":"Ada","salary":12,"bio":"","gone":null}"#,
        )
        .unwrap();
        assert_eq!(form.text("fullname"), Some("Ada"));
        assert_eq!(form.text("salary"), Some("12"));
        assert_eq!(form.text("bio"), Some(""));
        assert_eq!(form.non_empty("bio"), None);
        assert_eq!(form.text("gone"), None);
    }

    #[test]
    fn json_string_arrays_become_lists() {
        let form = parse_fields(
            "application/json",
            br#"{"skills":["go","rust"],"mixed":["a",1],"fullname":["x"]}"#,
        )
        .unwrap();
        assert_eq!(form.list("skills"), Some(&["go".to_string(), "rust".to_string()][..]));
        assert_eq!(form.text("skills"), None);
        assert_eq!(form.list("mixed"), None);
        assert_eq!(form.text("fullname"), None);
    }

    #[test]
    fn json_bools_and_objects_are_dropped() {
        let form = parse_fields(
            "application/json",
            br#"{"bio":true,"fullname":{"a":1},"phoneNumber":5551234}"#,
        )
        .unwrap();
        assert_eq!(form.text("bio"), None);
        assert_eq!(form.text("fullname"), None);
        assert_eq!(form.text("phoneNumber"), Some("5551234"));
    }

    #[test]
    fn urlencoded_fields() {
        let form = parse_fields(
            "application/x-www-form-urlencoded",
            b"skills=go%2C+rust&bio=hi",
        )
        .unwrap();
        assert_eq!(form.text("skills"), Some("go, rust"));
        assert_eq!(form.text("bio"), Some("hi"));
    }

    #[test]
    fn empty_body_is_empty_form() {
        let form = parse_fields("", b"").unwrap();
        assert!(form.text("anything").is_none());
        assert!(!form.has_files());
    }

    #[test]
    fn json_array_body_is_rejected() {
        assert!(parse_fields("application/json", b"[1,2]").is_err());
    }
}
