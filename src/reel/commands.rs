use anyhow::{Context, Result, bail};
use serde_json::json;
use std::path::Path;
use std::time::Duration;

use crate::ui::prelude::{Level, OutputFormat, emit, get_output_format};

use super::cli::{FetchArgs, GenerateArgs, ReelCommands, SubtitlesArgs};
use super::config::ReelConfig;
use super::error::ReelError;
use super::ffmpeg::{FfmpegFrameEncoder, FfprobeProbe, SystemFfmpegRunner, ensure_program_available};
use super::job::{
    JobOutcome, JobServices, MediaJob, default_subtitle_path, generate_subtitles, refers_to,
    run_job,
};
use super::progress::{BarProgress, NoopProgress};
use super::raster::{FontdueFace, TextRasterizer};
use super::recognizer::{SpeechRecognizer, TranscriptFileRecognizer, WhisperCliRecognizer};
use super::segment::{FrameSpec, LagOffset};
use super::store::SubtitleStore;
use super::utils::canonicalize_existing;

pub fn handle_reel_command(command: ReelCommands, config: &ReelConfig, debug: bool) -> Result<()> {
    match command {
        ReelCommands::Generate(args) => handle_generate(args, config, debug),
        ReelCommands::Subtitles(args) => handle_subtitles(args, config),
        ReelCommands::Fetch(args) => handle_fetch(args, config),
    }
}

fn build_recognizer(
    transcript: Option<&Path>,
    language: Option<String>,
    model: Option<String>,
    config: &ReelConfig,
) -> Result<Box<dyn SpeechRecognizer>> {
    if let Some(transcript) = transcript {
        let transcript = canonicalize_existing(transcript)?;
        return Ok(Box::new(TranscriptFileRecognizer::new(transcript)));
    }

    let settings = &config.recognizer;
    ensure_program_available(&settings.program)
        .context("a speech recognizer is required when no --transcript is given")?;
    let recognizer = WhisperCliRecognizer::new(
        &settings.program,
        model.unwrap_or_else(|| settings.model.clone()),
    )
    .with_language(language.or_else(|| settings.language.clone()))
    .with_device(settings.device.clone());
    Ok(Box::new(recognizer))
}

fn build_rasterizer(config: &ReelConfig, spec: FrameSpec) -> Result<TextRasterizer> {
    let face = FontdueFace::load_configured(config.text.font_path.as_deref())?;
    Ok(TextRasterizer::new(Box::new(face), spec, config.text_layout()?)?)
}

fn open_store(config: &ReelConfig) -> Result<SubtitleStore> {
    let store = SubtitleStore::new(config.store_dir()?);
    emit(
        Level::Debug,
        "reel.store.open",
        &format!("Subtitle store at {}", store.root().display()),
        None,
    );
    Ok(store)
}

fn encoder_timeout(flag: Option<u64>, config: &ReelConfig) -> Option<Duration> {
    match flag {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.encoder.timeout(),
    }
}

fn handle_generate(args: GenerateArgs, config: &ReelConfig, debug: bool) -> Result<()> {
    config.check_lag(args.lag)?;
    let spec = config.frame_spec()?;
    let settings = config.job_settings();

    let mut job = MediaJob::from_sources(
        args.audio.as_deref(),
        args.video.as_deref(),
        args.kind,
        LagOffset::from_secs(args.lag),
    )?
    .with_frame_spec(spec);
    if let Some(out_file) = args.out_file {
        job = job.with_output(out_file)?;
    }
    if let Some(srt_file) = args.srt_file {
        job = job.with_subtitles(srt_file)?;
    }

    if job.output().exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            job.output().display()
        );
    }

    ensure_program_available(&config.encoder.ffmpeg)?;
    if !job.source().is_video() {
        ensure_program_available(&config.encoder.ffprobe)?;
    }

    let recognizer = build_recognizer(args.transcript.as_deref(), args.language, args.model, config)?;
    let timeout = encoder_timeout(args.timeout, config);
    let runner = SystemFfmpegRunner::new(&config.encoder.ffmpeg, timeout, debug);
    let encoder = FfmpegFrameEncoder::new(&config.encoder.ffmpeg, &config.encoder.video_codec, timeout);
    let probe = FfprobeProbe::new(&config.encoder.ffprobe);
    let rasterizer = if job.source().is_video() {
        None
    } else {
        Some(build_rasterizer(config, spec)?)
    };
    let store = open_store(config)?;

    let services = JobServices {
        recognizer: recognizer.as_ref(),
        runner: &runner,
        probe: &probe,
        encoder: &encoder,
        rasterizer: rasterizer.as_ref(),
        store: Some(&store),
    };

    emit(
        Level::Info,
        "reel.generate.start",
        &format!("Captioning {}...", job.source().path().display()),
        None,
    );

    let outcome = match get_output_format() {
        OutputFormat::Text => {
            let bar = BarProgress::new();
            let outcome = run_job(&job, &services, &settings, &bar);
            if outcome.is_ok() {
                bar.finish();
            }
            outcome
        }
        OutputFormat::Json => run_job(&job, &services, &settings, &NoopProgress),
    };
    if outcome.as_ref().is_err_and(|err| err.is_timeout()) {
        emit(
            Level::Warn,
            "reel.generate.timeout",
            "The encoder hit its time limit; raise encoder.timeout_secs or pass --timeout 0",
            None,
        );
    }
    let outcome =
        outcome.with_context(|| format!("captioning {}", job.source().path().display()))?;

    report_generated(&outcome);
    Ok(())
}

fn report_generated(outcome: &JobOutcome) {
    emit(
        Level::Success,
        "reel.generate.success",
        &format!(
            "Generated {} and {}",
            outcome.subtitles.path.display(),
            outcome.output.display()
        ),
        Some(json!({
            "output": outcome.output.display().to_string(),
            "subtitles": outcome.subtitles.path.display().to_string(),
            "entries": outcome.subtitles.entries,
            "frames": outcome.frames_written,
            "plan": outcome.composition.describe(),
        })),
    );
}

fn handle_subtitles(args: SubtitlesArgs, config: &ReelConfig) -> Result<()> {
    config.check_lag(args.lag)?;
    let source = canonicalize_existing(&args.source)?;
    let destination = match args.srt_file {
        Some(path) => path,
        None => default_subtitle_path(&source)?,
    };
    if refers_to(&destination, &source) {
        return Err(ReelError::validation(format!(
            "refusing to write subtitles over their source {}",
            source.display()
        ))
        .into());
    }

    let recognizer = build_recognizer(args.transcript.as_deref(), args.language, args.model, config)?;
    let store = open_store(config)?;

    let outcome = generate_subtitles(
        &source,
        recognizer.as_ref(),
        LagOffset::from_secs(args.lag),
        &destination,
        Some(&store),
    )
    .with_context(|| format!("generating subtitles for {}", source.display()))?;

    emit(
        Level::Success,
        "reel.subtitles.success",
        &format!("Subtitles written to {}", outcome.path.display()),
        Some(json!({
            "path": outcome.path.display().to_string(),
            "entries": outcome.entries,
            "stored": outcome.stored.map(|path| path.display().to_string()),
        })),
    );
    Ok(())
}

fn handle_fetch(args: FetchArgs, config: &ReelConfig) -> Result<()> {
    let source = canonicalize_existing(&args.source)?;
    let destination = match args.out_file {
        Some(path) => path,
        None => default_subtitle_path(&source)?,
    };

    let store = open_store(config)?;
    let fetched = store
        .fetch(&source, &destination)
        .with_context(|| format!("fetching subtitles for {}", source.display()))?;

    emit(
        Level::Success,
        "reel.fetch.success",
        &format!("Subtitles copied to {}", fetched.display()),
        Some(json!({ "path": fetched.display().to_string() })),
    );
    Ok(())
}
