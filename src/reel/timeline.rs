use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::ReelResult;
use super::ffmpeg::MediaProbe;
use super::frames::{FrameLayout, FramePlan};
use super::segment::{FrameSpec, LagOffset, TranscriptionResult};

// Keeps an exact multiple of the frame duration from rounding up a frame.
const FRAME_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Audio(PathBuf),
    Video(PathBuf),
}

impl MediaSource {
    pub fn path(&self) -> &Path {
        match self {
            MediaSource::Audio(path) | MediaSource::Video(path) => path,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaSource::Video(_))
    }
}

/// Where lag silence goes in the muxed audio track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioLagPlacement {
    /// Silence before the clip, matching the blank video lead-in.
    #[default]
    LeadIn,
    /// Silence after the clip. Speech then starts `lag` seconds before its synthesized text.
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioShift {
    None,
    LeadIn(f64),
    Trailing(f64),
}

impl AudioShift {
    fn for_lag(lag: LagOffset, placement: AudioLagPlacement) -> Self {
        if lag.is_zero() {
            return AudioShift::None;
        }
        match placement {
            AudioLagPlacement::LeadIn => AudioShift::LeadIn(lag.as_secs_f64()),
            AudioLagPlacement::Trailing => AudioShift::Trailing(lag.as_secs_f64()),
        }
    }

    pub fn added_secs(&self) -> f64 {
        match self {
            AudioShift::None => 0.0,
            AudioShift::LeadIn(secs) | AudioShift::Trailing(secs) => *secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VideoPlan {
    /// The source video stream is the output stream, untouched.
    Reuse,
    /// The source video stream followed by `pad_secs` of blank video.
    Extend { pad_secs: f64 },
    /// A stream rendered from the transcript.
    Synthesize(FramePlan),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub video: VideoPlan,
    pub audio: AudioShift,
}

impl Composition {
    pub fn describe(&self) -> String {
        let video = match &self.video {
            VideoPlan::Reuse => "reusing source video".to_string(),
            VideoPlan::Extend { pad_secs } => {
                format!("extending source video by {pad_secs}s of blank frames")
            }
            VideoPlan::Synthesize(plan) => format!(
                "synthesizing {} frames ({:.2}s in {} runs) at {} fps ({} blank lead-in)",
                plan.total_frames(),
                plan.duration_secs(),
                plan.runs().len(),
                plan.fps(),
                plan.lead_in_frames()
            ),
        };
        match self.audio {
            AudioShift::None => video,
            AudioShift::LeadIn(secs) => format!("{video}; audio delayed by {secs}s"),
            AudioShift::Trailing(secs) => format!("{video}; audio padded by {secs}s of trailing silence"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompositionOptions {
    pub spec: FrameSpec,
    pub layout: FrameLayout,
    pub audio_placement: AudioLagPlacement,
}

/// Decide how the output video stream is produced and how the audio is shifted
/// so neither track is shorter than the other.
pub fn compose(
    source: &MediaSource,
    transcription: &TranscriptionResult,
    lag: LagOffset,
    options: &CompositionOptions,
    probe: &dyn MediaProbe,
) -> ReelResult<Composition> {
    let audio = AudioShift::for_lag(lag, options.audio_placement);

    let video = match source {
        MediaSource::Video(_) if lag.is_zero() => VideoPlan::Reuse,
        // Video and audio come from one container, so equal padding keeps them equal.
        MediaSource::Video(_) => VideoPlan::Extend {
            pad_secs: lag.as_secs_f64(),
        },
        MediaSource::Audio(path) => {
            let mut plan = FramePlan::build(transcription, lag, options.spec.fps, options.layout);
            let audio_secs = probe.duration_seconds(path)? + audio.added_secs();
            plan.pad_to(frames_covering(audio_secs, options.spec.fps));
            VideoPlan::Synthesize(plan)
        }
    };

    Ok(Composition { video, audio })
}

/// Smallest frame count whose duration is at least `secs`.
fn frames_covering(secs: f64, fps: u32) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * f64::from(fps) - FRAME_EPSILON).ceil().max(0.0) as u64
}
