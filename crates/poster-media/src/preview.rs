//! Preview Generation
//!
//! Two modes:
//!
//! 1. **Placeholder** - for a bare PDF upload. Reads the first page's size and
//!    draws a white canvas of the same aspect ratio with a static
//!    `PREVIEW PDF` label. The PDF content itself is never rasterized.
//! 2. **Recompress** - for a preview rendered by the storefront. Shrinks it to
//!    at most [`PREVIEW_MAX_WIDTH`] pixels wide and re-encodes it as JPEG.
//!
//! Both produce JPEG bytes; the caller decides where they are stored.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{GenericImageView, ImageReader, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use lopdf::{Document, Object, ObjectId};

use crate::error::{MediaError, Result};
use crate::glyphs;

/// Placeholder canvas width cap
pub const PLACEHOLDER_MAX_WIDTH: u32 = 300;

/// Recompressed preview width cap
pub const PREVIEW_MAX_WIDTH: u32 = 400;

/// JPEG quality for every stored preview
pub const JPEG_QUALITY: u8 = 70;

/// Label drawn on placeholder previews
pub const PLACEHOLDER_LABEL: &str = "PREVIEW PDF";

/// Page tree depth limit when resolving inherited attributes
const MAX_INHERIT_DEPTH: usize = 32;

/// Placeholder height cap, guards against degenerate page boxes
const PLACEHOLDER_MAX_HEIGHT: u32 = PLACEHOLDER_MAX_WIDTH * 4;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const FRAME: Rgb<u8> = Rgb([200, 200, 200]);
const INK: Rgb<u8> = Rgb([60, 60, 60]);

/// Page size in PDF points
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// ISO A4 portrait
    pub const A4: Self = Self {
        width: 595.0,
        height: 842.0,
    };
}

/// Stateless preview generator
pub struct PreviewGenerator;

impl PreviewGenerator {
    /// Render a placeholder preview for a PDF artifact.
    ///
    /// Unreadable PDFs fall back to A4 proportions; the upload itself has
    /// already been validated by content type.
    pub fn placeholder(pdf: &[u8]) -> Result<Vec<u8>> {
        let page = match Self::first_page_size(pdf) {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read PDF page size, using A4");
                PageSize::A4
            }
        };

        let canvas = Self::placeholder_canvas(page);
        Self::encode_jpeg(&canvas)
    }

    /// Shrink and recompress a storefront-rendered preview image
    pub fn recompress(image_bytes: &[u8]) -> Result<Vec<u8>> {
        let img = ImageReader::new(Cursor::new(image_bytes))
            .with_guessed_format()?
            .decode()?;

        let (width, height) = img.dimensions();
        let img = if width > PREVIEW_MAX_WIDTH {
            let scaled = u64::from(height) * u64::from(PREVIEW_MAX_WIDTH) / u64::from(width);
            let scaled = u32::try_from(scaled.max(1)).unwrap_or(u32::MAX);
            img.resize_exact(PREVIEW_MAX_WIDTH, scaled, FilterType::Lanczos3)
        } else {
            img
        };

        Self::encode_jpeg(&img.to_rgb8())
    }

    /// [`Self::placeholder`] on the blocking thread pool
    pub async fn spawn_placeholder(pdf: Vec<u8>) -> Result<Vec<u8>> {
        tokio::task::spawn_blocking(move || Self::placeholder(&pdf)).await?
    }

    /// [`Self::recompress`] on the blocking thread pool
    pub async fn spawn_recompress(image_bytes: Vec<u8>) -> Result<Vec<u8>> {
        tokio::task::spawn_blocking(move || Self::recompress(&image_bytes)).await?
    }

    /// Size of the first page, honouring inherited `MediaBox` and `Rotate`
    pub fn first_page_size(pdf: &[u8]) -> Result<PageSize> {
        let doc = Document::load_mem(pdf)?;
        let page_id = *doc
            .get_pages()
            .values()
            .next()
            .ok_or_else(|| MediaError::Pdf("document has no pages".into()))?;

        let media_box = inherited(&doc, page_id, b"MediaBox")
            .ok_or_else(|| MediaError::Pdf("first page has no MediaBox".into()))?;
        let coords = media_box
            .as_array()?
            .iter()
            .map(|o| doc.dereference(o).and_then(|(_, o)| o.as_float()))
            .collect::<std::result::Result<Vec<f32>, lopdf::Error>>()?;

        let [x0, y0, x1, y1] = coords[..] else {
            return Err(MediaError::Pdf(format!(
                "MediaBox has {} entries",
                coords.len()
            )));
        };

        let width = (x1 - x0).abs();
        let height = (y1 - y0).abs();
        if width < 1.0 || height < 1.0 {
            return Err(MediaError::Pdf("empty MediaBox".into()));
        }

        let rotate = inherited(&doc, page_id, b"Rotate")
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0);

        if rotate.rem_euclid(180) == 90 {
            Ok(PageSize {
                width: height,
                height: width,
            })
        } else {
            Ok(PageSize { width, height })
        }
    }

    /// Canvas dimensions for a page: width capped, aspect kept, never upscaled
    pub fn canvas_size(page: PageSize) -> (u32, u32) {
        let page_width = page.width.max(1.0);
        #[allow(clippy::cast_precision_loss)]
        let width = page_width.min(PLACEHOLDER_MAX_WIDTH as f32);
        let height = page.height.max(1.0) * width / page_width;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (width, height) = (width.round() as u32, height.round() as u32);
        (width.max(1), height.clamp(1, PLACEHOLDER_MAX_HEIGHT))
    }

    fn placeholder_canvas(page: PageSize) -> RgbImage {
        let (width, height) = Self::canvas_size(page);
        let mut canvas = RgbImage::from_pixel(width, height, WHITE);

        draw_hollow_rect_mut(&mut canvas, Rect::at(0, 0).of_size(width, height), FRAME);

        let text_width = glyphs::text_width(PLACEHOLDER_LABEL);
        let scale = (width.saturating_sub(20) / text_width).clamp(1, 4);
        draw_label(&mut canvas, PLACEHOLDER_LABEL, scale);

        canvas
    }

    fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(image)?;
        Ok(out)
    }
}

/// Look up a page attribute, walking up the page tree when absent
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Ok(value) = dict.get(key) {
            return doc.dereference(value).ok().map(|(_, obj)| obj);
        }
        let parent = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Draw `text` centred on the canvas
fn draw_label(canvas: &mut RgbImage, text: &str, scale: u32) {
    let text_width = glyphs::text_width(text) * scale;
    let text_height = glyphs::HEIGHT * scale;
    let origin_x = canvas.width().saturating_sub(text_width) / 2;
    let origin_y = canvas.height().saturating_sub(text_height) / 2;

    let mut pen_x = origin_x;
    for c in text.chars() {
        let Some(rows) = glyphs::glyph(c) else {
            continue;
        };
        for (row, bits) in (0u32..).zip(rows) {
            for col in 0..glyphs::WIDTH {
                if bits & (1 << (glyphs::WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let x = pen_x + col * scale;
                let y = origin_y + row * scale;
                let (Ok(x), Ok(y)) = (i32::try_from(x), i32::try_from(y)) else {
                    continue;
                };
                draw_filled_rect_mut(canvas, Rect::at(x, y).of_size(scale, scale), INK);
            }
        }
        pen_x += glyphs::ADVANCE * scale;
    }
}
