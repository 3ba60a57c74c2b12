//! Artifact File Store
//!
//! PDF artifacts and preview images live in two sibling directories under a
//! storage root:
//!
//! ```text
//! <root>/pdfs/<name>.pdf
//! <root>/previews/<name>-preview.jpg
//! ```
//!
//! Writes go to a uniquely named temporary file in the target directory and
//! are renamed into place, so concurrent uploads of the same name resolve to
//! last-writer-wins without a reader ever seeing a partial file.

use std::path::{Path, PathBuf};

use poster_core::cart::PREVIEW_SUFFIX;
use poster_core::{ArtifactCatalog, CartItemId};

use crate::error::Result;

/// Directory holding PDF artifacts, relative to the storage root
pub const PDF_DIR: &str = "pdfs";

/// Directory holding preview images, relative to the storage root
pub const PREVIEW_DIR: &str = "previews";

const MAX_NAME_LEN: usize = 100;
const FALLBACK_NAME: &str = "poster";

/// Name an artifact is stored under (without extension)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactName(String);

impl ArtifactName {
    /// Name derived from a validated cart item id
    pub fn from_cart_item(id: &CartItemId) -> Self {
        Self(id.as_str().to_string())
    }

    /// Name derived from a client-supplied upload file name.
    ///
    /// Directory components and the extension are dropped; anything outside
    /// `[A-Za-z0-9_-]` becomes `-`.
    pub fn from_upload(file_name: &str) -> Self {
        let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
        let stem = base.rsplit_once('.').map_or(base, |(stem, _)| stem);

        let sanitized: String = stem
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '-'
                }
            })
            .take(MAX_NAME_LEN)
            .collect();
        let sanitized = sanitized.trim_matches('-');

        if sanitized.is_empty() {
            Self(FALLBACK_NAME.to_string())
        } else {
            Self(sanitized.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The cart item id this name encodes, if any
    pub fn cart_item(&self) -> Option<CartItemId> {
        CartItemId::parse(&self.0).ok()
    }

    pub fn pdf_file_name(&self) -> String {
        format!("{}.pdf", self.0)
    }

    pub fn preview_file_name(&self) -> String {
        format!("{}{PREVIEW_SUFFIX}", self.0)
    }
}

impl From<&CartItemId> for ArtifactName {
    fn from(id: &CartItemId) -> Self {
        Self::from_cart_item(id)
    }
}

impl std::fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local filesystem artifact store
#[derive(Clone, Debug)]
pub struct FileStore {
    pdf_dir: PathBuf,
    preview_dir: PathBuf,
}

impl FileStore {
    /// Store rooted at `root`, using the standard sub-directories
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::with_dirs(root.join(PDF_DIR), root.join(PREVIEW_DIR))
    }

    /// Store with explicit directories
    pub fn with_dirs(pdf_dir: impl Into<PathBuf>, preview_dir: impl Into<PathBuf>) -> Self {
        Self {
            pdf_dir: pdf_dir.into(),
            preview_dir: preview_dir.into(),
        }
    }

    /// Create both directories if missing
    pub async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.pdf_dir).await?;
        tokio::fs::create_dir_all(&self.preview_dir).await?;
        Ok(())
    }

    pub fn pdf_dir(&self) -> &Path {
        &self.pdf_dir
    }

    pub fn preview_dir(&self) -> &Path {
        &self.preview_dir
    }

    pub fn pdf_path(&self, name: &ArtifactName) -> PathBuf {
        self.pdf_dir.join(name.pdf_file_name())
    }

    pub fn preview_path(&self, name: &ArtifactName) -> PathBuf {
        self.preview_dir.join(name.preview_file_name())
    }

    /// Write a PDF artifact, replacing any previous one of the same name
    pub async fn save_pdf(&self, name: &ArtifactName, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.pdf_path(name);
        write_atomic(&path, bytes).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "Stored PDF artifact");
        Ok(path)
    }

    /// Write a preview image, replacing any previous one of the same name
    pub async fn save_preview(&self, name: &ArtifactName, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.preview_path(name);
        write_atomic(&path, bytes).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "Stored preview image");
        Ok(path)
    }

    /// Remove a PDF artifact; missing files are not an error
    pub async fn remove_pdf(&self, name: &ArtifactName) -> Result<()> {
        match tokio::fs::remove_file(self.pdf_path(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Open the stored PDF for a cart item.
    ///
    /// Returns `None` when no artifact exists, along with the file length
    /// otherwise.
    pub async fn open_pdf(&self, id: &CartItemId) -> Result<Option<(tokio::fs::File, u64)>> {
        let path = self.pdf_path(&ArtifactName::from(id));
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Ok(None);
        }
        Ok(Some((file, metadata.len())))
    }
}

impl ArtifactCatalog for FileStore {
    fn has_preview(&self, id: &CartItemId) -> bool {
        self.preview_path(&ArtifactName::from(id)).is_file()
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}
