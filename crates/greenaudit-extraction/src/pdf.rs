//! PDF page rendering and layout text via Google PDFium.
//!
//! `PdfiumPageSource` is stateless. Each operation binds a fresh `Pdfium`
//! instance because the upstream type is `!Send`; the OS caches the library
//! load, so repeat binds are cheap.

use std::io::Cursor;

use image::{GenericImageView, ImageOutputFormat};
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use greenaudit_core::document::{PageSource, Region, RenderedPage, TextSpan};
use greenaudit_core::error::{AuditError, Result};

/// Largest width or height of a rendered page, in pixels.
const MAX_DIMENSION_PX: u32 = 4096;

const POINTS_PER_INCH: f32 = 72.0;

pub struct PdfiumPageSource;

impl PdfiumPageSource {
    /// Fails fast when the PDFium library cannot be found.
    pub fn new() -> Result<Self> {
        let _ = load_pdfium()?;
        Ok(Self)
    }
}

/// Bind PDFium from `PDFIUM_DYNAMIC_LIB_PATH`, the executable's directory,
/// or the system library path, in that order.
fn load_pdfium() -> Result<Pdfium> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| AuditError::PdfRendering {
            page: 0,
            reason: format!("Failed to load PDFium from {path}: {e}"),
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
    {
        let lib_path =
            Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            debug!(dir = %exe_dir.display(), "Loaded PDFium next to executable");
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| AuditError::PdfRendering {
        page: 0,
        reason: format!(
            "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
        ),
    })?;
    Ok(Pdfium::new(bindings))
}

fn load_error(e: PdfiumError) -> AuditError {
    AuditError::PdfRendering {
        page: 0,
        reason: format!("Failed to load PDF: {e}"),
    }
}

/// Pixel size for a page at `dpi`, capped to [`MAX_DIMENSION_PX`] with the
/// aspect ratio preserved. Both results are at least 1.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

/// Convert a PDF rectangle (points, origin bottom-left) to image pixels
/// (origin top-left).
fn rect_to_region(
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
    page_height_points: f32,
    scale_x: f32,
    scale_y: f32,
) -> Region {
    let x = (left.min(right) * scale_x).max(0.0);
    let y = ((page_height_points - top.max(bottom)) * scale_y).max(0.0);
    let width = ((right - left).abs() * scale_x).ceil().max(1.0);
    let height = ((top - bottom).abs() * scale_y).ceil().max(1.0);
    Region {
        x: x as u32,
        y: y as u32,
        width: width as u32,
        height: height as u32,
    }
}

impl PageSource for PdfiumPageSource {
    fn page_count(&self, document: &[u8]) -> Result<usize> {
        let pdfium = load_pdfium()?;
        let pdf = pdfium
            .load_pdf_from_byte_slice(document, None)
            .map_err(load_error)?;
        Ok(pdf.pages().len() as usize)
    }

    fn render_page(&self, document: &[u8], index: usize, dpi: u32) -> Result<RenderedPage> {
        let pdfium = load_pdfium()?;
        let pdf = pdfium
            .load_pdf_from_byte_slice(document, None)
            .map_err(load_error)?;
        let pages = pdf.pages();

        let page_index = u16::try_from(index).map_err(|_| AuditError::PdfRendering {
            page: index,
            reason: format!("Page index {index} exceeds u16 maximum"),
        })?;
        let page = pages.get(page_index).map_err(|_| AuditError::PdfRendering {
            page: index,
            reason: format!("Page {index} out of range (document has {} pages)", pages.len()),
        })?;

        let width_points = page.width().value;
        let height_points = page.height().value;
        let (target_w, target_h) = compute_render_dimensions(width_points, height_points, dpi);

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| AuditError::PdfRendering {
                page: index,
                reason: format!("Rendering failed: {e}"),
            })?;

        let image = bitmap.as_image();
        let (width, height) = image.dimensions();
        let mut cursor = Cursor::new(Vec::new());
        image
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| AuditError::ImageProcessing(format!("PNG encoding failed: {e}")))?;

        let scale_x = width as f32 / width_points.max(1.0);
        let scale_y = height as f32 / height_points.max(1.0);

        let (layout_text, spans) = match page.text() {
            Ok(text) => {
                let spans = text
                    .segments()
                    .iter()
                    .filter_map(|segment| {
                        let content = segment.text();
                        if content.trim().is_empty() {
                            return None;
                        }
                        let bounds = segment.bounds();
                        Some(TextSpan {
                            text: content,
                            bounds: rect_to_region(
                                bounds.left().value,
                                bounds.top().value,
                                bounds.right().value,
                                bounds.bottom().value,
                                height_points,
                                scale_x,
                                scale_y,
                            ),
                        })
                    })
                    .collect();
                (text.all(), spans)
            }
            Err(e) => {
                warn!(page = index, error = %e, "No text layer on page");
                (String::new(), Vec::new())
            }
        };

        let png = cursor.into_inner();
        debug!(
            page = index,
            width,
            height,
            png_size = png.len(),
            text_len = layout_text.len(),
            spans = spans.len(),
            "Rendered PDF page"
        );

        Ok(RenderedPage {
            layout_text,
            png,
            width,
            height,
            spans,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_at_150dpi() {
        let (w, h) = compute_render_dimensions(595.0, 842.0, 150);
        assert!(w > 1200 && w < 1260, "A4 width at 150dpi: got {w}");
        assert!(h > 1720 && h < 1770, "A4 height at 150dpi: got {h}");
    }

    #[test]
    fn oversized_pages_are_capped() {
        let (w, h) = compute_render_dimensions(5000.0, 10000.0, 200);
        assert!(w <= MAX_DIMENSION_PX && h <= MAX_DIMENSION_PX);
        let ratio = h as f32 / w as f32;
        assert!((ratio - 2.0).abs() < 0.15, "aspect ratio drifted: {ratio}");
    }

    #[test]
    fn zero_sized_page_is_clamped() {
        let (w, h) = compute_render_dimensions(0.0, 0.0, 150);
        assert!(w >= 1 && h >= 1);
    }

    #[test]
    fn rect_flips_y_axis() {
        // Text line near the top of a 100pt page, rendered at 2px per point.
        let region = rect_to_region(10.0, 90.0, 60.0, 80.0, 100.0, 2.0, 2.0);
        assert_eq!(region, Region { x: 20, y: 20, width: 100, height: 20 });
    }
}
