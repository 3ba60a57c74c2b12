//! Upload Intake
//!
//! Multipart endpoints that accept a PDF artifact, validate it, and store it
//! next to a preview image. A successful call always leaves exactly two files
//! on disk: `pdfs/<name>.pdf` and `previews/<name>-preview.jpg`.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Multipart, State},
};
use poster_core::CartItemId;
use poster_media::{ArtifactName, PreviewGenerator};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Smaller PDFs are almost certainly truncated
pub const MIN_PDF_BYTES: usize = 10 * 1024;

const PDF_TYPES: &[&str] = &["application/pdf"];
const PREVIEW_TYPES: &[&str] = &["image/png", "image/jpeg"];

#[derive(Debug, Serialize)]
pub struct PosterUploadResponse {
    pub message: String,
    pub filename: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub pdf_url: String,
    pub preview_url: String,
}

/// A file part of a multipart body
struct UploadedFile {
    bytes: Vec<u8>,
    file_name: Option<String>,
    content_type: String,
}

/// All parts of a multipart body, by field name
#[derive(Default)]
struct UploadForm {
    files: HashMap<String, UploadedFile>,
    texts: HashMap<String, String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string).unwrap_or_default();

            if field.file_name().is_some() {
                if form.files.contains_key(&name) {
                    return Err(ApiError::BadRequest(format!(
                        "Multiple '{name}' files are not allowed"
                    )));
                }
                let file_name = field.file_name().map(str::to_string);
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?.to_vec();
                form.files.insert(
                    name,
                    UploadedFile {
                        bytes,
                        file_name,
                        content_type,
                    },
                );
            } else {
                let text = field.text().await?;
                form.texts.insert(name, text);
            }
        }

        Ok(form)
    }

    fn take_file(&mut self, field: &str, missing: &str) -> Result<UploadedFile, ApiError> {
        self.files
            .remove(field)
            .filter(|f| !f.bytes.is_empty())
            .ok_or_else(|| ApiError::BadRequest(missing.to_string()))
    }

    fn text(&self, field: &str) -> Option<&str> {
        self.texts
            .get(field)
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
    }
}

/// `POST /api/upload-poster-pdf`: PDF keyed by a cart item id
pub async fn upload_poster_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PosterUploadResponse>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;

    let pdf = form.take_file("pdf", "No PDF file uploaded")?;
    validate_content_type(&pdf.content_type, PDF_TYPES)?;

    let id = form
        .text("cartItemId")
        .ok_or_else(|| ApiError::BadRequest("cartItemId is required".into()))?;
    let id = CartItemId::parse(id)?;

    if pdf.bytes.len() < MIN_PDF_BYTES {
        return Err(ApiError::BadRequest(format!(
            "PDF is too small ({} bytes); the file is probably corrupt",
            pdf.bytes.len()
        )));
    }

    let name = ArtifactName::from(&id);
    let preview = PreviewGenerator::spawn_placeholder(pdf.bytes.clone()).await?;
    store_pair(&state, &name, &pdf.bytes, &preview).await?;

    tracing::info!(cart_item_id = %id, size = pdf.bytes.len(), "Stored poster PDF");

    Ok(Json(PosterUploadResponse {
        message: "PDF uploaded successfully".into(),
        filename: name.pdf_file_name(),
    }))
}

/// `POST /api/upload-pdf-with-preview`: PDF plus a client-rendered preview
pub async fn upload_pdf_with_preview(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;

    let pdf = form.take_file("file", "No PDF file uploaded")?;
    validate_content_type(&pdf.content_type, PDF_TYPES)?;

    let image = form.take_file("previewImage", "No preview image uploaded")?;
    validate_content_type(&image.content_type, PREVIEW_TYPES)?;

    let name = artifact_name(form.text("cartItemId"), pdf.file_name.as_deref())?;
    let preview = PreviewGenerator::spawn_recompress(image.bytes).await?;
    store_pair(&state, &name, &pdf.bytes, &preview).await?;

    tracing::info!(name = %name, size = pdf.bytes.len(), "Stored PDF with preview");

    Ok(Json(upload_response(&name)))
}

/// `POST /api/upload-pdf`: PDF only, placeholder preview
pub async fn upload_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;

    let pdf = form.take_file("file", "No PDF file uploaded")?;
    validate_content_type(&pdf.content_type, PDF_TYPES)?;

    let name = artifact_name(form.text("cartItemId"), pdf.file_name.as_deref())?;
    let preview = PreviewGenerator::spawn_placeholder(pdf.bytes.clone()).await?;
    store_pair(&state, &name, &pdf.bytes, &preview).await?;

    tracing::info!(name = %name, size = pdf.bytes.len(), "Stored PDF");

    Ok(Json(upload_response(&name)))
}

/// Cart item id when given (and valid), else the sanitized upload file name
fn artifact_name(
    cart_item_id: Option<&str>,
    file_name: Option<&str>,
) -> Result<ArtifactName, ApiError> {
    match cart_item_id {
        Some(raw) => Ok(ArtifactName::from(&CartItemId::parse(raw)?)),
        None => Ok(ArtifactName::from_upload(file_name.unwrap_or_default())),
    }
}

fn upload_response(name: &ArtifactName) -> UploadResponse {
    let pdf_url = if name.cart_item().is_some() {
        format!("/api/download-pdf/{name}")
    } else {
        format!("/pdfs/{}", name.pdf_file_name())
    };
    UploadResponse {
        success: true,
        pdf_url,
        preview_url: format!("/previews/{}", name.preview_file_name()),
    }
}

/// Write PDF then preview; the PDF is removed again if the preview fails
async fn store_pair(
    state: &AppState,
    name: &ArtifactName,
    pdf: &[u8],
    preview: &[u8],
) -> Result<(), ApiError> {
    state.store.save_pdf(name, pdf).await?;
    if let Err(e) = state.store.save_preview(name, preview).await {
        if let Err(cleanup) = state.store.remove_pdf(name).await {
            tracing::warn!(name = %name, error = %cleanup, "Could not remove orphaned PDF");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Compare the MIME type without parameters against an allowlist
fn validate_content_type(content_type: &str, allowed: &[&str]) -> Result<(), ApiError> {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    if allowed.contains(&normalized.as_str()) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Invalid content type '{normalized}'. Allowed types: {}",
            allowed.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_allowlist() {
        assert!(validate_content_type("application/pdf", PDF_TYPES).is_ok());
        assert!(validate_content_type("Application/PDF; charset=binary", PDF_TYPES).is_ok());
        assert!(validate_content_type("image/png", PDF_TYPES).is_err());
        assert!(validate_content_type("image/jpeg", PREVIEW_TYPES).is_ok());
        assert!(validate_content_type("image/gif", PREVIEW_TYPES).is_err());
    }

    #[test]
    fn test_artifact_name_resolution() {
        let named = artifact_name(Some("cart-1-ab"), Some("ignored.pdf")).unwrap();
        assert_eq!(named.as_str(), "cart-1-ab");

        let from_file = artifact_name(None, Some("My Poster (final).pdf")).unwrap();
        assert_eq!(from_file.as_str(), "My-Poster--final");

        assert!(artifact_name(Some("../etc/passwd"), None).is_err());
        assert_eq!(artifact_name(None, None).unwrap().as_str(), "poster");
    }

    #[test]
    fn test_upload_urls() {
        let by_cart = upload_response(&artifact_name(Some("cart-1-ab"), None).unwrap());
        assert_eq!(by_cart.pdf_url, "/api/download-pdf/cart-1-ab");
        assert_eq!(by_cart.preview_url, "/previews/cart-1-ab-preview.jpg");

        let by_file = upload_response(&ArtifactName::from_upload("flyer.pdf"));
        assert_eq!(by_file.pdf_url, "/pdfs/flyer.pdf");
        assert_eq!(by_file.preview_url, "/previews/flyer-preview.jpg");
    }
}
