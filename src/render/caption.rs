//! Caption and stage-label drawing with a TrueType font.

use ab_glyph::{point, Font, FontVec, GlyphId, PxScale, ScaleFont};
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::Path;

/// Pixel height used for every label.
pub const FONT_SIZE: f32 = 50.0;
/// Captions longer than this wrap at the next space.
pub const WRAP_COLUMN: usize = 60;
/// Left margin of the stage labels.
const LABEL_X: u32 = 10;
const FIRST_LINE_Y: u32 = 10;
const SECOND_LINE_Y: u32 = 60;

/// A loaded font that draws black text onto RGB images.
pub struct CaptionFont {
    font: FontVec,
    scale: PxScale,
}

impl std::fmt::Debug for CaptionFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptionFont").field("scale", &self.scale.y).finish()
    }
}

impl CaptionFont {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read font {}", path.display()))?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = FontVec::try_from_vec(bytes).context("Invalid TrueType font")?;
        Ok(Self {
            font,
            scale: PxScale::from(FONT_SIZE),
        })
    }

    /// Draw `text` with its top-left corner at `(x, y)`.
    pub fn draw_text(&self, image: &mut RgbImage, x: u32, y: u32, text: &str) {
        let scaled = self.font.as_scaled(self.scale);
        let baseline = y as f32 + scaled.ascent();
        let mut caret = x as f32;
        let mut previous: Option<GlyphId> = None;

        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(self.scale, point(caret, baseline));
            caret += scaled.h_advance(id);
            previous = Some(id);

            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i64 + i64::from(gx);
                let py = bounds.min.y as i64 + i64::from(gy);
                let inside = (0..i64::from(image.width())).contains(&px)
                    && (0..i64::from(image.height())).contains(&py);
                if !inside {
                    return;
                }
                let pixel = image.get_pixel_mut(px as u32, py as u32);
                let keep = 1.0 - coverage.clamp(0.0, 1.0);
                for channel in pixel.0.iter_mut() {
                    *channel = (*channel as f32 * keep).round() as u8;
                }
            });
        }
    }

    /// Draw the caption into the top band and the stage label beside each row.
    pub fn annotate(
        &self,
        image: &mut RgbImage,
        caption: &str,
        labels: &[(&str, u32)],
        tile: u32,
    ) {
        for (label, y) in labels {
            self.draw_text(image, LABEL_X, *y, label);
        }
        let (first, second) = split_caption(caption);
        self.draw_text(image, tile, FIRST_LINE_Y, first);
        if let Some(second) = second {
            self.draw_text(image, tile, SECOND_LINE_Y, second);
        }
    }
}

/// Split at the first space at or after [`WRAP_COLUMN`] characters.
pub fn split_caption(caption: &str) -> (&str, Option<&str>) {
    let split = caption
        .char_indices()
        .skip(WRAP_COLUMN)
        .find(|(_, ch)| *ch == ' ')
        .map(|(idx, _)| idx);
    match split {
        Some(idx) => (&caption[..idx], Some(&caption[idx + 1..])),
        None => (caption, None),
    }
}
