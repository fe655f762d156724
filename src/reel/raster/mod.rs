mod face;

pub use face::{FontdueFace, TextFace};

#[cfg(test)]
pub(crate) use face::testing;

use super::error::{ReelError, ReelResult};
use super::segment::FrameSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);
    pub const WHITE: Rgba = Rgba([255, 255, 255, 255]);

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn parse_hex(value: &str) -> ReelResult<Self> {
        let invalid = || ReelError::validation(format!("'{value}' is not a #rrggbb colour"));
        let hex = value.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(invalid());
        }

        let mut channels = [255u8; 4];
        for (slot, chunk) in channels.iter_mut().zip(hex.as_bytes().chunks(2)) {
            let digits = std::str::from_utf8(chunk).map_err(|_| invalid())?;
            *slot = u8::from_str_radix(digits, 16).map_err(|_| invalid())?;
        }
        Ok(Rgba(channels))
    }
}

/// One RGBA raster of a job's frame size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFrame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RenderedFrame {
    pub fn filled(spec: &FrameSpec, color: Rgba) -> Self {
        let pixels = color.0.repeat(spec.width as usize * spec.height as usize);
        Self {
            width: spec.width,
            height: spec.height,
            pixels,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[idx..idx + 4].try_into().ok()
    }

    #[cfg(test)]
    pub fn is_uniform(&self, color: Rgba) -> bool {
        self.pixels.chunks_exact(4).all(|px| px == color.0)
    }

    /// Alpha-blend an 8-bit coverage mask of `mask_w` x `mask_h` with its top-left at `(x, y)`.
    /// Parts outside the frame are clipped.
    pub fn blend_mask(
        &mut self,
        x: i64,
        y: i64,
        mask_w: usize,
        mask_h: usize,
        mask: &[u8],
        color: Rgba,
    ) {
        let [r, g, b, a] = color.0;
        for row in 0..mask_h {
            let py = y + row as i64;
            if py < 0 || py >= i64::from(self.height) {
                continue;
            }
            for col in 0..mask_w {
                let px = x + col as i64;
                if px < 0 || px >= i64::from(self.width) {
                    continue;
                }
                let coverage = mask.get(row * mask_w + col).copied().unwrap_or(0);
                if coverage == 0 {
                    continue;
                }
                let alpha = u32::from(coverage) * u32::from(a) / 255;
                let idx = (py as usize * self.width as usize + px as usize) * 4;
                for (channel, source) in [r, g, b].into_iter().enumerate() {
                    let dest = u32::from(self.pixels[idx + channel]);
                    let mixed = (u32::from(source) * alpha + dest * (255 - alpha)) / 255;
                    self.pixels[idx + channel] = mixed as u8;
                }
                self.pixels[idx + 3] = 255;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextLayout {
    pub base_font_size: f32,
    pub min_font_size: f32,
    pub padding: u32,
    pub foreground: Rgba,
    pub background: Rgba,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            base_font_size: 24.0,
            min_font_size: 1.0,
            padding: 40,
            foreground: Rgba::WHITE,
            background: Rgba::BLACK,
        }
    }
}

impl TextLayout {
    pub fn validate(&self) -> ReelResult<()> {
        if !self.min_font_size.is_finite() || self.min_font_size < 1.0 {
            return Err(ReelError::validation(format!(
                "minimum font size must be at least 1, got {}",
                self.min_font_size
            )));
        }
        if !self.base_font_size.is_finite() || self.base_font_size <= 0.0 {
            return Err(ReelError::validation(format!(
                "base font size must be positive, got {}",
                self.base_font_size
            )));
        }
        Ok(())
    }
}

fn text_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

fn widest_line(face: &dyn TextFace, lines: &[&str], size: f32) -> f32 {
    lines
        .iter()
        .map(|line| face.line_width(line, size))
        .fold(0.0, f32::max)
}

/// Shrink one point at a time from `base_font_size` until the widest line fits
/// `available_width`, never going below `min_font_size`.
pub fn fit_font_size(
    face: &dyn TextFace,
    text: &str,
    base_font_size: f32,
    min_font_size: f32,
    available_width: f32,
) -> f32 {
    let lines = text_lines(text);
    let mut size = base_font_size.max(min_font_size);
    while size - 1.0 >= min_font_size && widest_line(face, &lines, size) > available_width {
        size -= 1.0;
    }
    if widest_line(face, &lines, size) > available_width {
        // Nothing fits; the smallest allowed size is the best effort.
        size = min_font_size;
    }
    size
}

pub struct TextRasterizer {
    face: Box<dyn TextFace>,
    spec: FrameSpec,
    layout: TextLayout,
}

impl TextRasterizer {
    pub fn new(face: Box<dyn TextFace>, spec: FrameSpec, layout: TextLayout) -> ReelResult<Self> {
        layout.validate()?;
        Ok(Self { face, spec, layout })
    }

    pub fn spec(&self) -> &FrameSpec {
        &self.spec
    }

    pub fn available_width(&self) -> f32 {
        self.spec.width.saturating_sub(self.layout.padding * 2) as f32
    }

    pub fn fit_font_size(&self, text: &str) -> f32 {
        fit_font_size(
            self.face.as_ref(),
            text,
            self.layout.base_font_size,
            self.layout.min_font_size,
            self.available_width(),
        )
    }

    pub fn blank(&self) -> RenderedFrame {
        RenderedFrame::filled(&self.spec, self.layout.background)
    }

    /// Render `text` centered in both axes on the background colour.
    pub fn render(&self, text: &str) -> RenderedFrame {
        let mut frame = self.blank();
        let lines = text_lines(text);
        if lines.is_empty() {
            return frame;
        }

        let size = self.fit_font_size(text);
        let line_height = self.face.line_height(size);
        let block_height = line_height * lines.len() as f32;
        let mut top = (self.spec.height as f32 - block_height) / 2.0;

        for line in lines {
            let width = self.face.line_width(line, size);
            let left = (self.spec.width as f32 - width) / 2.0;
            self.face
                .draw_line(&mut frame, line, size, left, top, self.layout.foreground);
            top += line_height;
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::testing::BlockFace;
    use super::*;

    fn rasterizer(width: u32, height: u32, base: f32) -> TextRasterizer {
        let spec = FrameSpec::new(width, height, 6).unwrap();
        let layout = TextLayout {
            base_font_size: base,
            padding: 10,
            ..TextLayout::default()
        };
        TextRasterizer::new(Box::new(BlockFace), spec, layout).unwrap()
    }

    #[test]
    fn keeps_base_size_when_text_fits() {
        let face = BlockFace;
        assert_eq!(fit_font_size(&face, "hello", 24.0, 1.0, 1200.0), 24.0);
    }

    #[test]
    fn shrinks_one_step_at_a_time_to_first_fit() {
        let face = BlockFace;
        // 10 chars at size s measure 5s; 5s <= 100 first holds at s = 20
        assert_eq!(fit_font_size(&face, "abcdefghij", 30.0, 1.0, 100.0), 20.0);
        // Not an integer boundary: 5s <= 98 first holds at s = 19 (stepping 30, 29, ...)
        assert_eq!(fit_font_size(&face, "abcdefghij", 30.0, 1.0, 98.0), 19.0);
        // Fractional base keeps its fraction while stepping
        assert_eq!(fit_font_size(&face, "abcdefghij", 24.5, 1.0, 100.0), 19.5);
    }

    #[test]
    fn never_goes_below_minimum() {
        let face = BlockFace;
        let long = "x".repeat(10_000);
        assert_eq!(fit_font_size(&face, &long, 24.0, 1.0, 100.0), 1.0);
        assert_eq!(fit_font_size(&face, &long, 24.0, 6.0, 100.0), 6.0);
    }

    #[test]
    fn fit_uses_widest_line() {
        let face = BlockFace;
        let size = fit_font_size(&face, "ab\nabcdefghij", 30.0, 1.0, 100.0);
        assert_eq!(size, 20.0);
    }

    #[test]
    fn renders_centered_text_on_background() {
        let r = rasterizer(200, 100, 20.0);
        let frame = r.render("ab");
        // Two 10px-wide blocks of height 20 centered: x in [90, 110), y in [40, 60)
        assert_eq!(frame.pixel(95, 50), Some([255, 255, 255, 255]));
        assert_eq!(frame.pixel(105, 45), Some([255, 255, 255, 255]));
        assert_eq!(frame.pixel(85, 50), Some([0, 0, 0, 255]));
        assert_eq!(frame.pixel(100, 30), Some([0, 0, 0, 255]));
        assert_eq!(frame.pixel(0, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn render_is_deterministic() {
        let r = rasterizer(320, 180, 24.0);
        assert_eq!(r.render("same text"), r.render("same text"));
    }

    #[test]
    fn overlong_text_still_renders_at_minimum_size() {
        let r = rasterizer(64, 36, 24.0);
        let frame = r.render(&"w".repeat(500));
        assert!(!frame.is_uniform(Rgba::BLACK));
        assert_eq!(r.fit_font_size(&"w".repeat(500)), 1.0);
    }

    #[test]
    fn blank_text_renders_background_only() {
        let r = rasterizer(64, 36, 24.0);
        assert!(r.render("   ").is_uniform(Rgba::BLACK));
        assert!(r.blank().is_uniform(Rgba::BLACK));
    }

    #[test]
    fn parses_hex_colours() {
        assert_eq!(Rgba::parse_hex("#ffffff").unwrap(), Rgba::WHITE);
        assert_eq!(Rgba::parse_hex("#10203040").unwrap(), Rgba([0x10, 0x20, 0x30, 0x40]));
        assert!(Rgba::parse_hex("ffffff").is_err());
        assert!(Rgba::parse_hex("#fffff").is_err());
        assert!(Rgba::parse_hex("#gggggg").is_err());
    }

    #[test]
    fn rejects_sub_pixel_minimum() {
        let layout = TextLayout {
            min_font_size: 0.0,
            ..TextLayout::default()
        };
        assert!(layout.validate().is_err());
    }
}
