//! Document chunking: page rendering, vision descriptions, disk cache and
//! quote highlighting.

mod cache;
mod document;
mod highlight;
mod loader;
mod memory;
mod pdf;
pub mod vision;

pub use cache::{quote_hash, CachedDocument, DocumentCache};
pub use document::{content_address, Document};
pub use highlight::{locate_quote, mark_region, render_highlight, QuoteMatch};
pub use loader::{DocumentLoader, Highlight};
pub use memory::InMemoryPageSource;
pub use pdf::PdfiumPageSource;
