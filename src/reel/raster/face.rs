use std::fs;
use std::path::{Path, PathBuf};

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};

use super::{RenderedFrame, Rgba};
use crate::reel::error::{ReelError, ReelResult};

/// Measures and paints single lines of text at a pixel size.
pub trait TextFace {
    /// Horizontal advance of `line` at `size`.
    fn line_width(&self, line: &str, size: f32) -> f32;

    /// Distance between consecutive baselines at `size`.
    fn line_height(&self, size: f32) -> f32;

    /// Paint `line` with the top of its line box at `(x, top)`.
    fn draw_line(
        &self,
        frame: &mut RenderedFrame,
        line: &str,
        size: f32,
        x: f32,
        top: f32,
        color: Rgba,
    );
}

const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub fn discover_system_font() -> Option<PathBuf> {
    SYSTEM_FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.is_file())
}

pub struct FontdueFace {
    font: Font,
}

impl FontdueFace {
    pub fn load(font_path: &Path) -> ReelResult<Self> {
        let bytes = fs::read(font_path).map_err(|err| {
            ReelError::validation(format!(
                "failed to read font '{}': {err}",
                font_path.display()
            ))
        })?;
        Self::from_bytes(bytes, font_path)
    }

    /// Load `configured`, or the first well-known system sans font when none is configured.
    pub fn load_configured(configured: Option<&Path>) -> ReelResult<Self> {
        match configured {
            Some(path) => Self::load(path),
            None => {
                let found = discover_system_font().ok_or_else(|| {
                    ReelError::validation(
                        "no system font found; set `text.font_path` in the configuration",
                    )
                })?;
                Self::load(&found)
            }
        }
    }

    fn from_bytes(bytes: Vec<u8>, origin: &Path) -> ReelResult<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|err| {
            ReelError::validation(format!("failed to parse font {}: {err}", origin.display()))
        })?;
        Ok(Self { font })
    }
}

impl TextFace for FontdueFace {
    fn line_width(&self, line: &str, size: f32) -> f32 {
        let mut width = 0.0;
        let mut previous = None;
        for ch in line.chars() {
            if let Some(prev) = previous {
                width += self.font.horizontal_kern(prev, ch, size).unwrap_or(0.0);
            }
            width += self.font.metrics(ch, size).advance_width;
            previous = Some(ch);
        }
        width
    }

    fn line_height(&self, size: f32) -> f32 {
        self.font
            .horizontal_line_metrics(size)
            .map(|metrics| metrics.new_line_size)
            .unwrap_or(size * 1.2)
    }

    fn draw_line(
        &self,
        frame: &mut RenderedFrame,
        line: &str,
        size: f32,
        x: f32,
        top: f32,
        color: Rgba,
    ) {
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x,
            y: top,
            ..LayoutSettings::default()
        });
        layout.append(&[&self.font], &TextStyle::new(line, size, 0));

        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let (_, coverage) = self.font.rasterize_config(glyph.key);
            frame.blend_mask(
                glyph.x.round() as i64,
                glyph.y.round() as i64,
                glyph.width,
                glyph.height,
                &coverage,
                color,
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Monospace stand-in: every non-space character is a solid block half as wide as the size.
    pub(crate) struct BlockFace;

    impl TextFace for BlockFace {
        fn line_width(&self, line: &str, size: f32) -> f32 {
            line.chars().count() as f32 * size * 0.5
        }

        fn line_height(&self, size: f32) -> f32 {
            size
        }

        fn draw_line(
            &self,
            frame: &mut RenderedFrame,
            line: &str,
            size: f32,
            x: f32,
            top: f32,
            color: Rgba,
        ) {
            let advance = size * 0.5;
            let cell_w = (advance.floor() as usize).max(1);
            let cell_h = (size.floor() as usize).max(1);
            let block = vec![255u8; cell_w * cell_h];
            for (i, ch) in line.chars().enumerate() {
                if ch.is_whitespace() {
                    continue;
                }
                let left = (x + i as f32 * advance).round() as i64;
                frame.blend_mask(left, top.round() as i64, cell_w, cell_h, &block, color);
            }
        }
    }
}
