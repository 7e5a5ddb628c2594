use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb};

use greenaudit_core::document::{PageSource, Region, RenderedPage, TextSpan};
use greenaudit_core::error::{AuditError, Result};

const PAGE_WIDTH: u32 = 240;
const PAGE_HEIGHT: u32 = 320;
const MARGIN: u32 = 10;
const LINE_HEIGHT: u32 = 14;
const CHAR_WIDTH: u32 = 6;

/// Page source over fixed text, ignoring the document bytes.
///
/// Each line of a page's text becomes one span laid out top to bottom on a
/// blank white image. Used by tests and demos that run without PDFium.
pub struct InMemoryPageSource {
    pages: Vec<String>,
}

impl InMemoryPageSource {
    pub fn new<S: Into<String>>(pages: impl IntoIterator<Item = S>) -> Self {
        Self {
            pages: pages.into_iter().map(Into::into).collect(),
        }
    }
}

fn line_spans(text: &str) -> Vec<TextSpan> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let width = (line.chars().count() as u32 * CHAR_WIDTH).min(PAGE_WIDTH - 2 * MARGIN);
            TextSpan {
                text: line.to_string(),
                bounds: Region {
                    x: MARGIN,
                    y: (MARGIN + i as u32 * LINE_HEIGHT).min(PAGE_HEIGHT - LINE_HEIGHT),
                    width: width.max(1),
                    height: LINE_HEIGHT - 2,
                },
            }
        })
        .collect()
}

fn blank_png() -> Result<Vec<u8>> {
    let buffer = ImageBuffer::from_pixel(PAGE_WIDTH, PAGE_HEIGHT, Rgb([255u8, 255, 255]));
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(buffer)
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| AuditError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

impl PageSource for InMemoryPageSource {
    fn page_count(&self, _document: &[u8]) -> Result<usize> {
        Ok(self.pages.len())
    }

    fn render_page(&self, _document: &[u8], index: usize, _dpi: u32) -> Result<RenderedPage> {
        let text = self.pages.get(index).ok_or_else(|| AuditError::PdfRendering {
            page: index,
            reason: format!("Page {index} out of range ({} pages)", self.pages.len()),
        })?;

        Ok(RenderedPage {
            layout_text: text.clone(),
            png: blank_png()?,
            width: PAGE_WIDTH,
            height: PAGE_HEIGHT,
            spans: line_spans(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_png_with_line_spans() {
        let source = InMemoryPageSource::new(["Intro\n\nCO2 emissions fell 50%"]);
        let page = source.render_page(&[], 0, 150).unwrap();

        assert_eq!(&page.png[..4], &[0x89, 0x50, 0x4E, 0x47]);
        assert_eq!(page.spans.len(), 2);
        assert_eq!(page.spans[1].text, "CO2 emissions fell 50%");
        assert!(page.spans[1].bounds.y > page.spans[0].bounds.y);
    }

    #[test]
    fn out_of_range_page_errors() {
        let source = InMemoryPageSource::new(["only page"]);
        assert_eq!(source.page_count(&[]).unwrap(), 1);
        let err = source.render_page(&[], 1, 150).unwrap_err();
        assert!(matches!(err, AuditError::PdfRendering { page: 1, .. }));
    }
}
