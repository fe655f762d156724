use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use duct::cmd;
use serde::Deserialize;

use crate::ui::prelude::{Level, emit};

use super::error::{ReelError, ReelResult};
use super::segment::{Segment, TranscriptionResult};
use super::srt::parse_srt;
use super::utils::file_stem;

/// A recognition engine constructed and owned by the caller.
pub trait SpeechRecognizer {
    fn transcribe(&self, media: &Path) -> ReelResult<TranscriptionResult>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranscriptDocument {
    Whisper { segments: Vec<RawSegment> },
    Bare(Vec<RawSegment>),
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    start: f64,
    end: f64,
    #[serde(default)]
    text: String,
}

impl From<RawSegment> for Segment {
    fn from(raw: RawSegment) -> Self {
        Segment::new(raw.start, raw.end, raw.text.trim())
    }
}

/// Parse Whisper/WhisperX JSON output or a bare array of `{start, end, text}`.
pub fn parse_transcript_json(json: &str) -> ReelResult<TranscriptionResult> {
    let document: TranscriptDocument = serde_json::from_str(json)?;
    let raw = match document {
        TranscriptDocument::Whisper { segments } => segments,
        TranscriptDocument::Bare(segments) => segments,
    };
    Ok(TranscriptionResult::from_segments(
        raw.into_iter().map(Segment::from).collect(),
    ))
}

pub fn parse_transcript_srt(input: &str) -> ReelResult<TranscriptionResult> {
    let segments = parse_srt(input)?
        .into_iter()
        .map(|cue| Segment::new(cue.start.as_secs_f64(), cue.end.as_secs_f64(), cue.text))
        .collect();
    Ok(TranscriptionResult::from_segments(segments))
}

/// Uses a transcript produced ahead of time instead of running an engine.
#[derive(Debug, Clone)]
pub struct TranscriptFileRecognizer {
    path: PathBuf,
}

impl TranscriptFileRecognizer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SpeechRecognizer for TranscriptFileRecognizer {
    fn transcribe(&self, _media: &Path) -> ReelResult<TranscriptionResult> {
        let contents = fs::read_to_string(&self.path).map_err(|err| {
            ReelError::validation(format!(
                "failed to read transcript {}: {err}",
                self.path.display()
            ))
        })?;

        let is_srt = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("srt"));
        if is_srt {
            parse_transcript_srt(&contents)
        } else {
            parse_transcript_json(&contents)
        }
    }
}

/// Runs the openai-whisper command line tool and reads its JSON output.
#[derive(Debug, Clone)]
pub struct WhisperCliRecognizer {
    program: String,
    model: String,
    language: Option<String>,
    device: Option<String>,
}

impl WhisperCliRecognizer {
    pub fn new(program: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            model: model.into(),
            language: None,
            device: None,
        }
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    pub fn with_device(mut self, device: Option<String>) -> Self {
        self.device = device;
        self
    }

    fn args(&self, media: &Path, output_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            media.as_os_str().to_os_string(),
            OsString::from("--model"),
            OsString::from(&self.model),
            OsString::from("--output_format"),
            OsString::from("json"),
            OsString::from("--output_dir"),
            output_dir.as_os_str().to_os_string(),
            OsString::from("--verbose"),
            OsString::from("False"),
        ];
        if let Some(language) = &self.language {
            args.push(OsString::from("--language"));
            args.push(OsString::from(language));
        }
        if let Some(device) = &self.device {
            args.push(OsString::from("--device"));
            args.push(OsString::from(device));
        }
        args
    }
}

impl SpeechRecognizer for WhisperCliRecognizer {
    fn transcribe(&self, media: &Path) -> ReelResult<TranscriptionResult> {
        let output_dir = tempfile::Builder::new()
            .prefix("captionreel-whisper-")
            .tempdir()?;

        emit(
            Level::Info,
            "reel.recognizer.start",
            &format!("Transcribing {} with {} ({})", media.display(), self.program, self.model),
            None,
        );

        let output = cmd(&self.program, self.args(media, output_dir.path()))
            .stdout_null()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|err| ReelError::Recognition(format!("failed to run {}: {err}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(ReelError::Recognition(format!(
                "{} exited with status {:?}: {}",
                self.program,
                output.status.code(),
                tail.into_iter().rev().collect::<Vec<_>>().join("\n")
            )));
        }

        let json_path = output_dir.path().join(format!("{}.json", file_stem(media)?));
        let json = fs::read_to_string(&json_path).map_err(|err| {
            ReelError::Recognition(format!(
                "{} did not produce {}: {err}",
                self.program,
                json_path.display()
            ))
        })?;
        parse_transcript_json(&json)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::Cell;

    use super::*;

    /// Returns a fixed result and counts how often it was asked.
    pub(crate) struct FixedRecognizer {
        pub(crate) result: TranscriptionResult,
        pub(crate) calls: Cell<usize>,
    }

    impl FixedRecognizer {
        pub(crate) fn new(segments: Vec<Segment>) -> Self {
            Self {
                result: TranscriptionResult::from_segments(segments),
                calls: Cell::new(0),
            }
        }
    }

    impl SpeechRecognizer for FixedRecognizer {
        fn transcribe(&self, _media: &Path) -> ReelResult<TranscriptionResult> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.result.clone())
        }
    }
}
