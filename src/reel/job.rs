use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::ui::prelude::{Level, emit};

use super::error::{ReelError, ReelResult};
use super::ffmpeg::{FfmpegRunner, FrameEncoderFactory, MediaProbe};
use super::frames::{FrameLayout, write_frames};
use super::mux::{MuxSettings, mux};
use super::progress::{ProgressObserver, ProgressTracker};
use super::raster::TextRasterizer;
use super::recognizer::SpeechRecognizer;
use super::segment::{FrameSpec, LagOffset, TranscriptionResult};
use super::srt::write_srt;
use super::store::SubtitleStore;
use super::timeline::{
    AudioLagPlacement, Composition, CompositionOptions, MediaSource, VideoPlan, compose,
};
use super::utils::{canonicalize_existing, file_stem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Audio,
    Video,
}

/// Pick the source a job runs on. Video wins when both are given and no kind is forced.
pub fn select_source(
    audio: Option<&Path>,
    video: Option<&Path>,
    kind: Option<InputKind>,
) -> ReelResult<MediaSource> {
    let chosen = match (kind, audio, video) {
        (None, None, None) => {
            return Err(ReelError::validation(
                "no input supplied; pass an audio file or a video file",
            ));
        }
        (Some(InputKind::Video), _, None) => {
            return Err(ReelError::validation(
                "video input was selected but no video file was supplied",
            ));
        }
        (Some(InputKind::Audio), None, _) => {
            return Err(ReelError::validation(
                "audio input was selected but no audio file was supplied",
            ));
        }
        (Some(InputKind::Audio), Some(audio), _) => MediaSource::Audio(audio.to_path_buf()),
        (_, _, Some(video)) => MediaSource::Video(video.to_path_buf()),
        (None, Some(audio), None) => MediaSource::Audio(audio.to_path_buf()),
    };

    let path = canonicalize_existing(chosen.path())?;
    Ok(match chosen {
        MediaSource::Audio(_) => MediaSource::Audio(path),
        MediaSource::Video(_) => MediaSource::Video(path),
    })
}

/// `<dir>/<stem>.srt` next to the source.
pub fn default_subtitle_path(source: &Path) -> ReelResult<PathBuf> {
    Ok(source.with_file_name(format!("{}.srt", file_stem(source)?)))
}

/// `<dir>/<stem>_captioned.mp4` next to the source.
pub fn default_output_path(source: &Path) -> ReelResult<PathBuf> {
    Ok(source.with_file_name(format!("{}_captioned.mp4", file_stem(source)?)))
}

/// Whether `candidate` names the already canonical `source`, however it is spelled.
pub(crate) fn refers_to(candidate: &Path, source: &Path) -> bool {
    candidate == source
        || candidate
            .canonicalize()
            .is_ok_and(|resolved| resolved == source)
}

/// One generation request. Owns nothing beyond its own paths and parameters.
#[derive(Debug, Clone)]
pub struct MediaJob {
    source: MediaSource,
    lag: LagOffset,
    frame_spec: FrameSpec,
    output: PathBuf,
    subtitles: PathBuf,
}

impl MediaJob {
    pub fn from_sources(
        audio: Option<&Path>,
        video: Option<&Path>,
        kind: Option<InputKind>,
        lag: LagOffset,
    ) -> ReelResult<Self> {
        let source = select_source(audio, video, kind)?;
        let output = default_output_path(source.path())?;
        let subtitles = default_subtitle_path(source.path())?;
        Ok(Self {
            source,
            lag,
            frame_spec: FrameSpec::default(),
            output,
            subtitles,
        })
    }

    pub fn with_frame_spec(mut self, frame_spec: FrameSpec) -> Self {
        self.frame_spec = frame_spec;
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> ReelResult<Self> {
        let output = output.into();
        if refers_to(&output, self.source.path()) {
            return Err(ReelError::validation(format!(
                "refusing to write the captioned video over its source {}",
                output.display()
            )));
        }
        self.output = output;
        Ok(self)
    }

    pub fn with_subtitles(mut self, subtitles: impl Into<PathBuf>) -> ReelResult<Self> {
        let subtitles = subtitles.into();
        if refers_to(&subtitles, self.source.path()) {
            return Err(ReelError::validation(format!(
                "refusing to write subtitles over their source {}",
                subtitles.display()
            )));
        }
        self.subtitles = subtitles;
        Ok(self)
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    pub fn lag(&self) -> LagOffset {
        self.lag
    }

    pub fn frame_spec(&self) -> &FrameSpec {
        &self.frame_spec
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn subtitles(&self) -> &Path {
        &self.subtitles
    }
}

/// Collaborators constructed and owned by the caller for the duration of a job.
pub struct JobServices<'a> {
    pub recognizer: &'a dyn SpeechRecognizer,
    pub runner: &'a dyn FfmpegRunner,
    pub probe: &'a dyn MediaProbe,
    pub encoder: &'a dyn FrameEncoderFactory,
    /// Only needed when the video stream is synthesized.
    pub rasterizer: Option<&'a TextRasterizer>,
    pub store: Option<&'a SubtitleStore>,
}

#[derive(Debug, Clone, Default)]
pub struct JobSettings {
    pub layout: FrameLayout,
    pub audio_placement: AudioLagPlacement,
    pub mux: MuxSettings,
}

#[derive(Debug, Clone)]
pub struct SubtitleOutcome {
    pub transcription: TranscriptionResult,
    pub path: PathBuf,
    pub entries: usize,
    pub stored: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub output: PathBuf,
    pub subtitles: SubtitleOutcome,
    pub composition: Composition,
    pub frames_written: Option<u64>,
}

/// Recognize `source`, write its subtitle file and register it in `store`.
pub fn generate_subtitles(
    source: &Path,
    recognizer: &dyn SpeechRecognizer,
    lag: LagOffset,
    destination: &Path,
    store: Option<&SubtitleStore>,
) -> ReelResult<SubtitleOutcome> {
    let transcription = recognizer.transcribe(source)?;
    if transcription.is_empty() {
        return Err(ReelError::EmptyTranscript);
    }
    emit(
        Level::Debug,
        "reel.job.transcribed",
        &format!("Recognized {} segments", transcription.len()),
        Some(json!({ "segments": transcription.len(), "speech_end": transcription.speech_end() })),
    );

    let entries = write_srt(destination, &transcription, lag)?;
    let stored = store
        .map(|store| store.register(source, destination))
        .transpose()?;

    emit(
        Level::Info,
        "reel.job.subtitles",
        &format!("Wrote {} subtitle entries to {}", entries.len(), destination.display()),
        Some(json!({ "path": destination.display().to_string(), "entries": entries.len(), "lag": lag.as_secs() })),
    );

    Ok(SubtitleOutcome {
        transcription,
        path: destination.to_path_buf(),
        entries: entries.len(),
        stored,
    })
}

/// Run every stage of `job` in order: recognition, subtitles, frames, composition, muxing.
pub fn run_job(
    job: &MediaJob,
    services: &JobServices<'_>,
    settings: &JobSettings,
    observer: &dyn ProgressObserver,
) -> ReelResult<JobOutcome> {
    let progress = ProgressTracker::new(observer);
    progress.report(0.0, "Preparing");

    if let Some(rasterizer) = services.rasterizer {
        if rasterizer.spec() != job.frame_spec() {
            return Err(ReelError::validation(format!(
                "renderer is configured for {}@{} but the job expects {}@{}",
                rasterizer.spec().size_arg(),
                rasterizer.spec().fps,
                job.frame_spec().size_arg(),
                job.frame_spec().fps
            )));
        }
    }

    // Removed on drop, including every early return below.
    let workspace = tempfile::Builder::new()
        .prefix("captionreel-job-")
        .tempdir()?;

    progress.report(0.1, "Transcribing");
    let subtitles = generate_subtitles(
        job.source().path(),
        services.recognizer,
        job.lag(),
        job.subtitles(),
        services.store,
    )?;
    progress.report(0.4, "Subtitles written");

    let options = CompositionOptions {
        spec: *job.frame_spec(),
        layout: settings.layout,
        audio_placement: settings.audio_placement,
    };
    let composition = compose(
        job.source(),
        &subtitles.transcription,
        job.lag(),
        &options,
        services.probe,
    )?;
    emit(
        Level::Info,
        "reel.job.plan",
        &composition.describe(),
        Some(json!({ "source": job.source().path().display().to_string(), "video": job.source().is_video() })),
    );

    let mut frames_written = None;
    let video_input = match &composition.video {
        VideoPlan::Synthesize(plan) => {
            let rasterizer = services.rasterizer.ok_or_else(|| {
                ReelError::validation("a text renderer is required to synthesize video frames")
            })?;
            let path = workspace.path().join("video.mp4");
            let total = plan.total_frames();
            let fps = u64::from(plan.fps());

            let mut sink = services.encoder.open(job.frame_spec(), &path)?;
            let written = write_frames(plan.frames(rasterizer), sink.as_mut(), |done| {
                if done % fps == 0 || done == total {
                    progress.report_span(0.4, 0.7, done, total, "Rendering frames");
                }
            })?;
            sink.finish()?;

            emit(
                Level::Debug,
                "reel.job.frames",
                &format!("Rendered {written} frames"),
                Some(json!({ "frames": written, "fps": plan.fps() })),
            );
            frames_written = Some(written);
            path
        }
        VideoPlan::Reuse | VideoPlan::Extend { .. } => job.source().path().to_path_buf(),
    };
    progress.report(0.7, "Composing");

    progress.report(0.8, "Muxing");
    mux(
        services.runner,
        &settings.mux,
        &video_input,
        job.source().path(),
        &composition,
        job.output(),
    )?;
    emit(
        Level::Success,
        "reel.mux.success",
        &format!("Captioned video written to {}", job.output().display()),
        Some(json!({
            "output": job.output().display().to_string(),
            "subtitles": job.subtitles().display().to_string(),
        })),
    );

    progress.report(1.0, "Done");
    Ok(JobOutcome {
        output: job.output().to_path_buf(),
        subtitles,
        composition,
        frames_written,
    })
}
