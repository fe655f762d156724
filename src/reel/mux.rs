use std::path::Path;

use super::error::ReelResult;
use super::ffmpeg::FfmpegRunner;
use super::timeline::{AudioShift, Composition, VideoPlan};
use super::utils::{persist_into_place, sibling_temp_file};

#[derive(Debug, Clone)]
pub struct MuxSettings {
    pub video_codec: String,
    pub audio_codec: String,
}

impl Default for MuxSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
        }
    }
}

fn format_secs(value: f64) -> String {
    format!("{value:.3}")
}

/// Build the encoder arguments that combine `video_input`'s first video stream
/// with `audio_input`'s first audio stream into `output`.
pub fn mux_args(
    settings: &MuxSettings,
    video_input: &Path,
    audio_input: &Path,
    composition: &Composition,
    output: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".to_string(),
        "-y".to_string(),
        "-i".to_string(),
        video_input.to_string_lossy().into_owned(),
        "-i".to_string(),
        audio_input.to_string_lossy().into_owned(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
    ];

    match &composition.video {
        // Reused streams and freshly synthesized ones are already encoded.
        VideoPlan::Reuse | VideoPlan::Synthesize(_) => {
            args.push("-c:v".to_string());
            args.push("copy".to_string());
        }
        VideoPlan::Extend { pad_secs } => {
            args.push("-vf".to_string());
            args.push(format!(
                "tpad=stop_mode=add:stop_duration={}:color=black",
                format_secs(*pad_secs)
            ));
            args.push("-c:v".to_string());
            args.push(settings.video_codec.clone());
            args.push("-pix_fmt".to_string());
            args.push("yuv420p".to_string());
        }
    }

    match composition.audio {
        AudioShift::None => {}
        AudioShift::LeadIn(secs) => {
            args.push("-af".to_string());
            args.push(format!(
                "adelay=delays={}:all=1",
                (secs * 1000.0).round() as u64
            ));
        }
        AudioShift::Trailing(secs) => {
            args.push("-af".to_string());
            args.push(format!("apad=pad_dur={}", format_secs(secs)));
        }
    }

    args.push("-c:a".to_string());
    args.push(settings.audio_codec.clone());
    args.push("-movflags".to_string());
    args.push("+faststart".to_string());

    if output.extension().is_none() {
        args.push("-f".to_string());
        args.push("mp4".to_string());
    }
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Mux into a temporary sibling of `output` and move it into place only on success.
pub fn mux(
    runner: &dyn FfmpegRunner,
    settings: &MuxSettings,
    video_input: &Path,
    audio_input: &Path,
    composition: &Composition,
    output: &Path,
) -> ReelResult<()> {
    let staging = sibling_temp_file(output)?;
    let args = mux_args(settings, video_input, audio_input, composition, staging.path());
    runner.run(&args)?;
    persist_into_place(staging, output)
}


#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::testing::FakeRunner;
    use super::*;
    use crate::reel::error::ReelError;
    use crate::reel::frames::{FrameLayout, FramePlan};
    use crate::reel::segment::{LagOffset, TranscriptionResult};

    fn composition(video: VideoPlan, audio: AudioShift) -> Composition {
        Composition { video, audio }
    }

    fn joined(args: &[String]) -> String {
        args.join(" ")
    }

    #[test]
    fn reused_video_is_copied_with_reencoded_audio() {
        let args = mux_args(
            &MuxSettings::default(),
            Path::new("talk.mp4"),
            Path::new("talk.mp4"),
            &composition(VideoPlan::Reuse, AudioShift::None),
            Path::new("out.mp4"),
        );
        let line = joined(&args);
        assert!(line.starts_with("-hide_banner -y -i talk.mp4 -i talk.mp4 -map 0:v:0 -map 1:a:0 -c:v copy"));
        assert!(line.contains("-c:a aac"));
        assert!(!line.contains("-af"));
        assert!(!line.contains("-shortest"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn extended_video_is_padded_and_reencoded() {
        let args = mux_args(
            &MuxSettings::default(),
            Path::new("talk.mp4"),
            Path::new("talk.mp4"),
            &composition(VideoPlan::Extend { pad_secs: 3.0 }, AudioShift::LeadIn(3.0)),
            Path::new("out.mp4"),
        );
        let line = joined(&args);
        assert!(line.contains("-vf tpad=stop_mode=add:stop_duration=3.000:color=black -c:v libx264"));
        assert!(line.contains("-af adelay=delays=3000:all=1"));
    }

    #[test]
    fn synthesized_video_is_copied_and_trailing_audio_padded() {
        let plan = FramePlan::build(&TranscriptionResult::default(), LagOffset::ZERO, 6, FrameLayout::Contiguous);
        let args = mux_args(
            &MuxSettings::default(),
            Path::new("/tmp/job/video.mp4"),
            Path::new("talk.wav"),
            &composition(VideoPlan::Synthesize(plan), AudioShift::Trailing(2.0)),
            Path::new("out"),
        );
        let line = joined(&args);
        assert!(line.contains("-i /tmp/job/video.mp4 -i talk.wav"));
        assert!(line.contains("-c:v copy"));
        assert!(line.contains("-af apad=pad_dur=2.000"));
        assert!(line.ends_with("-f mp4 out"));
    }

    #[test]
    fn successful_mux_moves_output_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("final.mp4");
        let runner = FakeRunner::default();

        mux(
            &runner,
            &MuxSettings::default(),
            Path::new("talk.mp4"),
            Path::new("talk.mp4"),
            &composition(VideoPlan::Reuse, AudioShift::None),
            &output,
        )
        .unwrap();

        assert_eq!(fs::read(&output).unwrap(), b"muxed");
        let staged = PathBuf::from(runner.calls.borrow()[0].last().unwrap());
        assert_ne!(staged, output);
        assert!(!staged.exists());
    }

    #[test]
    fn failed_mux_leaves_nothing_at_the_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("final.mp4");
        let runner = FakeRunner::failing(1);

        let err = mux(
            &runner,
            &MuxSettings::default(),
            Path::new("talk.mp4"),
            Path::new("talk.mp4"),
            &composition(VideoPlan::Reuse, AudioShift::None),
            &output,
        )
        .unwrap_err();

        assert!(matches!(err, ReelError::Encoding { .. }));
        assert!(!output.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
