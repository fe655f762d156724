use clap::{Args, Subcommand, ValueHint};
use std::path::PathBuf;

use super::job::InputKind;

#[derive(Subcommand, Debug, Clone)]
pub enum ReelCommands {
    /// Transcribe a recording and produce subtitles plus a captioned video
    Generate(GenerateArgs),
    /// Transcribe a recording and write only its subtitle file
    Subtitles(SubtitlesArgs),
    /// Copy previously generated subtitles for a recording
    Fetch(FetchArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Audio file to caption
    #[arg(short = 'a', long, value_hint = ValueHint::FilePath)]
    pub audio: Option<PathBuf>,

    /// Video file to caption (used when both inputs are given)
    #[arg(short = 'v', long, value_hint = ValueHint::FilePath)]
    pub video: Option<PathBuf>,

    /// Force which of the supplied inputs is used
    #[arg(long, value_enum)]
    pub kind: Option<InputKind>,

    /// Seconds to delay captions and audio by
    #[arg(short = 'l', long, default_value_t = 0)]
    pub lag: u32,

    /// Pre-made transcript (Whisper JSON, segment array or SRT) instead of running whisper
    #[arg(short = 't', long, value_hint = ValueHint::FilePath)]
    pub transcript: Option<PathBuf>,

    /// Spoken language passed to whisper (detected when unset)
    #[arg(long)]
    pub language: Option<String>,

    /// Whisper model override
    #[arg(long)]
    pub model: Option<String>,

    /// Output video path; defaults to <name>_captioned.mp4 next to the input
    #[arg(short = 'o', long = "out-file", value_hint = ValueHint::FilePath)]
    pub out_file: Option<PathBuf>,

    /// Subtitle path; defaults to <name>.srt next to the input
    #[arg(long = "srt-file", value_hint = ValueHint::FilePath)]
    pub srt_file: Option<PathBuf>,

    /// Encoder timeout in seconds (0 disables it)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Overwrite an existing output video
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SubtitlesArgs {
    /// Audio or video file to transcribe
    #[arg(value_hint = ValueHint::FilePath)]
    pub source: PathBuf,

    /// Pre-made transcript (Whisper JSON, segment array or SRT) instead of running whisper
    #[arg(short = 't', long, value_hint = ValueHint::FilePath)]
    pub transcript: Option<PathBuf>,

    /// Seconds to shift every cue by
    #[arg(short = 'l', long, default_value_t = 0)]
    pub lag: u32,

    /// Spoken language passed to whisper (detected when unset)
    #[arg(long)]
    pub language: Option<String>,

    /// Whisper model override
    #[arg(long)]
    pub model: Option<String>,

    /// Subtitle path; defaults to <name>.srt next to the input
    #[arg(long = "srt-file", value_hint = ValueHint::FilePath)]
    pub srt_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Recording the subtitles were generated from
    #[arg(value_hint = ValueHint::FilePath)]
    pub source: PathBuf,

    /// Destination; defaults to <name>.srt next to the input
    #[arg(short = 'o', long = "out-file", value_hint = ValueHint::FilePath)]
    pub out_file: Option<PathBuf>,
}
