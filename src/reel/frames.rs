use std::rc::Rc;
use std::slice;

use serde::{Deserialize, Serialize};

use super::error::ReelResult;
use super::raster::{RenderedFrame, TextRasterizer};
use super::segment::{LagOffset, TranscriptionResult};

/// Number of frames covering `duration_secs` at `fps`, rounded to nearest.
/// Non-positive durations yield no frames.
pub fn frame_count(duration_secs: f64, fps: u32) -> u64 {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return 0;
    }
    (duration_secs * f64::from(fps)).round() as u64
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameLayout {
    /// Segments follow each other with no blank frames between them.
    Contiguous,
    /// Blank frames hold the place of silences so text stays under its speech.
    #[default]
    GapAligned,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameContent {
    Blank,
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameRun {
    pub content: FrameContent,
    pub frames: u64,
}

/// The ordered runs of identical frames that make up a synthesized video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    fps: u32,
    lead_in: u64,
    runs: Vec<FrameRun>,
}

impl FramePlan {
    pub fn build(
        transcription: &TranscriptionResult,
        lag: LagOffset,
        fps: u32,
        layout: FrameLayout,
    ) -> Self {
        let lead_in = frame_count(lag.as_secs_f64(), fps);
        let mut runs = Vec::with_capacity(transcription.len() + 1);
        if lead_in > 0 {
            runs.push(FrameRun {
                content: FrameContent::Blank,
                frames: lead_in,
            });
        }

        let mut emitted = 0u64;
        for segment in transcription.segments() {
            if layout == FrameLayout::GapAligned {
                let starts_at = frame_count(segment.start, fps);
                if starts_at > emitted {
                    runs.push(FrameRun {
                        content: FrameContent::Blank,
                        frames: starts_at - emitted,
                    });
                    emitted = starts_at;
                }
            }

            let frames = frame_count(segment.duration(), fps);
            runs.push(FrameRun {
                content: FrameContent::Text(segment.text.clone()),
                frames,
            });
            emitted += frames;
        }

        Self { fps, lead_in, runs }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn lead_in_frames(&self) -> u64 {
        self.lead_in
    }

    pub fn runs(&self) -> &[FrameRun] {
        &self.runs
    }

    pub fn total_frames(&self) -> u64 {
        self.runs.iter().map(|run| run.frames).sum()
    }

    pub fn duration_secs(&self) -> f64 {
        self.total_frames() as f64 / f64::from(self.fps)
    }

    /// Append blank frames until the plan holds at least `target` frames.
    /// Returns how many were added.
    pub fn pad_to(&mut self, target: u64) -> u64 {
        let missing = target.saturating_sub(self.total_frames());
        if missing > 0 {
            self.runs.push(FrameRun {
                content: FrameContent::Blank,
                frames: missing,
            });
        }
        missing
    }

    /// Start a fresh pass over the plan. Each call restarts from the first frame.
    pub fn frames<'a>(&'a self, rasterizer: &'a TextRasterizer) -> FrameSequence<'a> {
        FrameSequence {
            runs: self.runs.iter(),
            rasterizer,
            remaining: self.total_frames(),
            current: None,
            blank: None,
        }
    }
}

/// Lazily rendered frames. Each run's raster is produced once and shared by
/// every frame of the run, then released when the run ends.
pub struct FrameSequence<'a> {
    runs: slice::Iter<'a, FrameRun>,
    rasterizer: &'a TextRasterizer,
    remaining: u64,
    current: Option<(Rc<RenderedFrame>, u64)>,
    blank: Option<Rc<RenderedFrame>>,
}

impl FrameSequence<'_> {
    fn blank_frame(&mut self) -> Rc<RenderedFrame> {
        let rasterizer = self.rasterizer;
        Rc::clone(
            self.blank
                .get_or_insert_with(|| Rc::new(rasterizer.blank())),
        )
    }
}

impl Iterator for FrameSequence<'_> {
    type Item = Rc<RenderedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((frame, left)) = &mut self.current {
                if *left > 0 {
                    *left -= 1;
                    self.remaining -= 1;
                    return Some(Rc::clone(frame));
                }
                self.current = None;
            }

            let run = self.runs.next()?;
            if run.frames == 0 {
                continue;
            }
            let frame = match &run.content {
                FrameContent::Blank => self.blank_frame(),
                FrameContent::Text(text) => Rc::new(self.rasterizer.render(text)),
            };
            self.current = Some((frame, run.frames));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

/// Destination for a raw frame stream, usually an encoder's stdin.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RenderedFrame) -> ReelResult<()>;

    /// Close the stream and wait for the consumer to finish.
    fn finish(self: Box<Self>) -> ReelResult<()>;
}

/// Push every frame of `sequence` into `sink`, reporting the running count.
pub fn write_frames(
    sequence: FrameSequence<'_>,
    sink: &mut dyn FrameSink,
    mut on_frame: impl FnMut(u64),
) -> ReelResult<u64> {
    let mut written = 0u64;
    for frame in sequence {
        sink.write_frame(&frame)?;
        written += 1;
        on_frame(written);
    }
    Ok(written)
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use crate::reel::raster::TextLayout;
    use crate::reel::raster::testing::BlockFace;
    use crate::reel::segment::{FrameSpec, Segment};

    fn rasterizer() -> TextRasterizer {
        let spec = FrameSpec::new(64, 36, 6).unwrap();
        let layout = TextLayout {
            base_font_size: 8.0,
            padding: 2,
            ..TextLayout::default()
        };
        TextRasterizer::new(Box::new(BlockFace), spec, layout).unwrap()
    }

    fn scenario() -> TranscriptionResult {
        TranscriptionResult::from_segments(vec![
            Segment::new(0.0, 4.0, "hello"),
            Segment::new(4.0, 12.0, "world"),
        ])
    }

    #[test]
    fn frame_count_rounds_duration_times_fps() {
        assert_eq!(frame_count(2.5, 6), 15);
        assert_eq!(frame_count(4.0, 6), 24);
        assert_eq!(frame_count(0.25, 6), 2);
        assert_eq!(frame_count(0.2, 6), 1);
        assert_eq!(frame_count(0.0, 6), 0);
        assert_eq!(frame_count(-1.0, 6), 0);
        assert_eq!(frame_count(f64::NAN, 6), 0);
    }

    #[test]
    fn scenario_produces_seventy_two_frames() {
        let r = rasterizer();
        for layout in [FrameLayout::Contiguous, FrameLayout::GapAligned] {
            let plan = FramePlan::build(&scenario(), LagOffset::ZERO, 6, layout);
            assert_eq!(plan.total_frames(), 72);
            assert_eq!(plan.frames(&r).count(), 72);
        }
    }

    #[test]
    fn lag_prepends_blank_frames() {
        let r = rasterizer();
        let plan = FramePlan::build(&scenario(), LagOffset::from_secs(2), 6, FrameLayout::Contiguous);
        assert_eq!(plan.lead_in_frames(), 12);

        let mut sink = RecordingSink::default();
        let written = write_frames(plan.frames(&r), &mut sink, |_| {}).unwrap();
        assert_eq!(written, 84);

        let flags = sink.blank_flags();
        assert!(flags[..12].iter().all(|blank| *blank));
        assert!(flags[12..].iter().all(|blank| !*blank));
    }

    #[test]
    fn non_positive_segments_yield_no_frames() {
        let transcription = TranscriptionResult::from_segments(vec![
            Segment::new(1.0, 1.0, "instant"),
            Segment::new(2.0, 1.5, "backwards"),
            Segment::new(2.0, 2.5, "real"),
        ]);
        let plan = FramePlan::build(&transcription, LagOffset::ZERO, 6, FrameLayout::Contiguous);
        assert_eq!(plan.total_frames(), 3);
    }

    #[test]
    fn frames_within_a_segment_share_one_raster() {
        let r = rasterizer();
        let transcription = TranscriptionResult::from_segments(vec![
            Segment::new(0.0, 4.0, "hi"),
            Segment::new(4.0, 12.0, "wide world"),
        ]);
        let plan = FramePlan::build(&transcription, LagOffset::from_secs(1), 6, FrameLayout::Contiguous);
        let frames: Vec<_> = plan.frames(&r).collect();
        assert!(Rc::ptr_eq(&frames[0], &frames[5]));
        assert!(Rc::ptr_eq(&frames[6], &frames[29]));
        assert!(!Rc::ptr_eq(&frames[29], &frames[30]));
        assert_ne!(*frames[29], *frames[30]);
    }

    #[test]
    fn sequence_restarts_from_the_beginning() {
        let r = rasterizer();
        let plan = FramePlan::build(&scenario(), LagOffset::from_secs(1), 6, FrameLayout::Contiguous);
        let mut first = plan.frames(&r);
        first.next();
        first.next();
        assert_eq!(first.size_hint(), (76, Some(76)));

        let second: Vec<_> = plan.frames(&r).collect();
        assert_eq!(second.len(), 78);
    }

    #[test]
    fn gap_aligned_layout_fills_silences() {
        let transcription = TranscriptionResult::from_segments(vec![
            Segment::new(1.0, 2.0, "one"),
            Segment::new(3.5, 4.0, "two"),
        ]);
        let contiguous = FramePlan::build(&transcription, LagOffset::ZERO, 6, FrameLayout::Contiguous);
        assert_eq!(contiguous.total_frames(), 6 + 3);

        let aligned = FramePlan::build(&transcription, LagOffset::from_secs(1), 6, FrameLayout::GapAligned);
        let runs: Vec<_> = aligned
            .runs()
            .iter()
            .map(|run| (matches!(run.content, FrameContent::Blank), run.frames))
            .collect();
        assert_eq!(runs, [(true, 6), (true, 6), (false, 6), (true, 9), (false, 3)]);
        assert_eq!(aligned.total_frames(), 30);
        assert_eq!(aligned.duration_secs(), 5.0);
    }

    #[test]
    fn pad_to_appends_trailing_blanks_only_when_short() {
        let mut plan = FramePlan::build(&scenario(), LagOffset::ZERO, 6, FrameLayout::Contiguous);
        assert_eq!(plan.pad_to(60), 0);
        assert_eq!(plan.pad_to(80), 8);
        assert_eq!(plan.total_frames(), 80);
        assert_eq!(plan.runs().last().map(|run| &run.content), Some(&FrameContent::Blank));
    }
}
