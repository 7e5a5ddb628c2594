use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One page's processed content: layout text merged with the vision description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// 1-based page number, unique within a document.
    pub page: u32,
    pub source: String,
    pub text: String,
    pub len: usize,
    pub image_path: PathBuf,
}

impl Chunk {
    pub fn new(page: u32, source: impl Into<String>, text: String, image_path: PathBuf) -> Self {
        let len = text.chars().count();
        Self {
            page,
            source: source.into(),
            text,
            len,
            image_path,
        }
    }
}

/// Axis-aligned rectangle in rendered-image pixel coordinates, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Smallest region covering both.
    pub fn union(&self, other: &Region) -> Region {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Region {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Grow by `margin` pixels on every side, clamped to the image bounds.
    pub fn padded(&self, margin: u32, max_width: u32, max_height: u32) -> Region {
        let x = self.x.saturating_sub(margin);
        let y = self.y.saturating_sub(margin);
        let right = self.right().saturating_add(margin).min(max_width);
        let bottom = self.bottom().saturating_add(margin).min(max_height);
        Region {
            x,
            y,
            width: right.saturating_sub(x),
            height: bottom.saturating_sub(y),
        }
    }
}

/// A run of layout text with its position on the rendered page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    pub bounds: Region,
}

/// Positioned layout text for one page, kept in the cache for highlighting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page: u32,
    pub width: u32,
    pub height: u32,
    pub spans: Vec<TextSpan>,
}

/// Output of rendering one page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub layout_text: String,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub spans: Vec<TextSpan>,
}

/// Turns raw document bytes into per-page layout text and images.
///
/// Implementations are blocking; callers run them on the blocking pool.
pub trait PageSource: Send + Sync {
    fn page_count(&self, document: &[u8]) -> Result<usize>;

    /// Render the page at 0-based `index`.
    fn render_page(&self, document: &[u8], index: usize, dpi: u32) -> Result<RenderedPage>;
}
