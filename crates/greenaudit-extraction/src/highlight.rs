use std::path::Path;

use image::{Rgba, RgbaImage};

use greenaudit_core::document::{Region, TextSpan};
use greenaudit_core::error::{AuditError, Result};

/// Quotes shorter than this (after normalisation) are too ambiguous to place.
const MIN_QUOTE_CHARS: usize = 4;

/// Length of the leading fragment tried when the full quote is not found.
const PREFIX_CHARS: usize = 40;

const HIGHLIGHT_PADDING: u32 = 3;
const FILL: [u8; 3] = [255, 221, 0];
const FILL_ALPHA: f32 = 0.35;
const BORDER: [u8; 3] = [230, 120, 0];
const BORDER_PX: u32 = 2;

/// Where a quote sits on a page image, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuoteMatch {
    Matched(Region),
    Unmatched,
}

/// Lower-case alphanumerics only; spacing, punctuation and hyphenation drift
/// between model quotes and the layout text are ignored.
fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Locate `quote` among the page's text spans.
///
/// Tries the whole quote first, then its leading fragment. The result covers
/// every span the matched text touches.
pub fn locate_quote(spans: &[TextSpan], quote: &str) -> QuoteMatch {
    let needle = normalize(quote);
    if needle.chars().count() < MIN_QUOTE_CHARS || spans.is_empty() {
        return QuoteMatch::Unmatched;
    }

    let mut haystack = String::new();
    let mut ranges = Vec::with_capacity(spans.len());
    for span in spans {
        let start = haystack.len();
        haystack.push_str(&normalize(&span.text));
        ranges.push((start, haystack.len()));
    }

    let found = haystack
        .find(&needle)
        .map(|pos| (pos, pos + needle.len()))
        .or_else(|| {
            let prefix: String = needle.chars().take(PREFIX_CHARS).collect();
            if prefix.len() == needle.len() {
                return None;
            }
            haystack.find(&prefix).map(|pos| (pos, pos + prefix.len()))
        });

    let Some((match_start, match_end)) = found else {
        return QuoteMatch::Unmatched;
    };

    spans
        .iter()
        .zip(&ranges)
        .filter(|(_, range)| range.0 < match_end && range.1 > match_start)
        .map(|(span, _)| span.bounds)
        .reduce(|acc, r| acc.union(&r))
        .map(QuoteMatch::Matched)
        .unwrap_or(QuoteMatch::Unmatched)
}

fn blend(channel: u8, target: u8, alpha: f32) -> u8 {
    (channel as f32 * (1.0 - alpha) + target as f32 * alpha).round() as u8
}

/// Paint a translucent marker with a solid border over `region`.
pub fn mark_region(image: &mut RgbaImage, region: Region) {
    let (width, height) = image.dimensions();
    let area = region.padded(HIGHLIGHT_PADDING, width, height);

    for y in area.y..area.bottom() {
        for x in area.x..area.right() {
            let on_border = x < area.x + BORDER_PX
                || y < area.y + BORDER_PX
                || x + BORDER_PX >= area.right()
                || y + BORDER_PX >= area.bottom();
            let pixel = image.get_pixel_mut(x, y);
            let Rgba([r, g, b, a]) = *pixel;
            *pixel = if on_border {
                Rgba([BORDER[0], BORDER[1], BORDER[2], a])
            } else {
                Rgba([
                    blend(r, FILL[0], FILL_ALPHA),
                    blend(g, FILL[1], FILL_ALPHA),
                    blend(b, FILL[2], FILL_ALPHA),
                    a,
                ])
            };
        }
    }
}

/// Read `source`, mark `region` and write the result to `target`.
pub fn render_highlight(source: &Path, target: &Path, region: Region) -> Result<()> {
    let mut image = image::open(source)
        .map_err(|e| AuditError::ImageProcessing(format!("{}: {e}", source.display())))?
        .to_rgba8();
    mark_region(&mut image, region);
    image
        .save(target)
        .map_err(|e| AuditError::ImageProcessing(format!("{}: {e}", target.display())))?;
    Ok(())
}
