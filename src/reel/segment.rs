use serde::{Deserialize, Serialize};

use super::error::{ReelError, ReelResult};

/// A time-bounded span of recognized speech, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Ordered recognizer output. An empty result means no speech was detected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptionResult {
    segments: Vec<Segment>,
}

impl TranscriptionResult {
    /// Orders segments by start time; segments sharing a start keep their input order.
    pub fn from_segments(mut segments: Vec<Segment>) -> Self {
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// End of the last spoken segment, or zero when nothing was recognized.
    pub fn speech_end(&self) -> f64 {
        self.segments
            .iter()
            .map(|segment| segment.end)
            .fold(0.0, f64::max)
    }
}

/// Whole-second shift applied to subtitle timestamps and padding inserted into the media.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LagOffset(u32);

impl LagOffset {
    pub const ZERO: LagOffset = LagOffset(0);

    pub fn from_secs(seconds: u32) -> Self {
        Self(seconds)
    }

    pub fn as_secs(self) -> u32 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        f64::from(self.0)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

/// Fixed raster geometry and frame rate of a job's synthesized video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for FrameSpec {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 6,
        }
    }
}

impl FrameSpec {
    pub fn new(width: u32, height: u32, fps: u32) -> ReelResult<Self> {
        if width == 0 || height == 0 {
            return Err(ReelError::validation(format!(
                "frame size must be non-zero, got {width}x{height}"
            )));
        }
        // yuv420p output needs even dimensions
        if width % 2 != 0 || height % 2 != 0 {
            return Err(ReelError::validation(format!(
                "frame size must use even dimensions, got {width}x{height}"
            )));
        }
        if fps == 0 {
            return Err(ReelError::validation("frame rate must be at least 1 fps"));
        }
        Ok(Self { width, height, fps })
    }

    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn size_arg(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}
