mod common;
mod utils;

use anyhow::Result;
use common::TestEnvironment;
use std::fs;

const SCENARIO: &str = r#"{"segments": [
    {"start": 0.0, "end": 4.0, "text": " hello"},
    {"start": 4.0, "end": 12.0, "text": " world"}
]}"#;

#[test]
fn test_subtitles_from_transcript() -> Result<()> {
    let env = TestEnvironment::new()?;
    let source = env.file("talk.wav", b"not really audio")?;
    let transcript = env.file("talk.json", SCENARIO)?;

    let output = utils::run_captionreel(
        &env,
        &[
            "subtitles",
            source.to_str().unwrap(),
            "--transcript",
            transcript.to_str().unwrap(),
        ],
    )?;
    assert_eq!(output.exit_code, 0, "subtitles failed: {}", output.stderr);
    assert!(utils::event_codes(&output.stdout).contains(&"reel.subtitles.success".to_string()));

    let srt = fs::read_to_string(env.path().join("talk.srt"))?;
    assert_eq!(
        srt,
        "1\n00:00:00,000 --> 00:00:04,000\nhello\n\n2\n00:00:04,000 --> 00:00:12,000\nworld\n\n"
    );
    Ok(())
}

#[test]
fn test_subtitles_with_lag_and_custom_path() -> Result<()> {
    let env = TestEnvironment::new()?;
    let source = env.file("talk.wav", b"pcm")?;
    let transcript = env.file("talk.json", SCENARIO)?;
    let destination = env.path().join("out/shifted.srt");

    let output = utils::run_captionreel(
        &env,
        &[
            "subtitles",
            source.to_str().unwrap(),
            "--transcript",
            transcript.to_str().unwrap(),
            "--lag",
            "2",
            "--srt-file",
            destination.to_str().unwrap(),
        ],
    )?;
    assert_eq!(output.exit_code, 0, "subtitles failed: {}", output.stderr);

    let srt = fs::read_to_string(&destination)?;
    assert!(srt.starts_with("1\n00:00:02,000 --> 00:00:06,000\nhello\n\n"));
    assert!(!env.path().join("talk.srt").exists());
    Ok(())
}

#[test]
fn test_subtitles_refuse_relative_path_to_source() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.file("talk.wav", b"original pcm")?;
    env.file("talk.json", SCENARIO)?;

    let output = utils::run_captionreel(
        &env,
        &["subtitles", "talk.wav", "--transcript", "talk.json", "--srt-file", "talk.wav"],
    )?;
    assert_eq!(output.exit_code, 1);
    assert_eq!(utils::event_codes(&output.stderr), ["reel.error.validation"]);
    assert_eq!(fs::read(env.path().join("talk.wav"))?, b"original pcm");
    Ok(())
}

#[test]
fn test_fetch_requires_generated_subtitles() -> Result<()> {
    let env = TestEnvironment::new()?;
    let source = env.file("talk.wav", b"pcm")?;
    let transcript = env.file("talk.json", SCENARIO)?;
    let fetched = env.path().join("fetched.srt");

    let output = utils::run_captionreel(
        &env,
        &["fetch", source.to_str().unwrap(), "--out-file", fetched.to_str().unwrap()],
    )?;
    assert_eq!(output.exit_code, 1);
    assert_eq!(utils::event_codes(&output.stderr), ["reel.error.not_found"]);
    assert!(!fetched.exists());

    let output = utils::run_captionreel(
        &env,
        &[
            "subtitles",
            source.to_str().unwrap(),
            "--transcript",
            transcript.to_str().unwrap(),
        ],
    )?;
    assert_eq!(output.exit_code, 0, "subtitles failed: {}", output.stderr);

    let output = utils::run_captionreel(
        &env,
        &["fetch", source.to_str().unwrap(), "--out-file", fetched.to_str().unwrap()],
    )?;
    assert_eq!(output.exit_code, 0, "fetch failed: {}", output.stderr);
    assert_eq!(
        fs::read_to_string(&fetched)?,
        fs::read_to_string(env.path().join("talk.srt"))?
    );
    Ok(())
}

#[test]
fn test_empty_transcript_fails_without_output() -> Result<()> {
    let env = TestEnvironment::new()?;
    let source = env.file("quiet.wav", b"pcm")?;
    let transcript = env.file("quiet.json", r#"{"segments": []}"#)?;

    let output = utils::run_captionreel(
        &env,
        &[
            "subtitles",
            source.to_str().unwrap(),
            "--transcript",
            transcript.to_str().unwrap(),
        ],
    )?;
    assert_eq!(output.exit_code, 1);
    assert_eq!(utils::event_codes(&output.stderr), ["reel.error.empty_transcript"]);
    assert!(!env.path().join("quiet.srt").exists());
    Ok(())
}

#[test]
fn test_lag_above_configured_bound_is_rejected() -> Result<()> {
    let env = TestEnvironment::new()?;
    let source = env.file("talk.wav", b"pcm")?;
    let transcript = env.file("talk.json", SCENARIO)?;

    let output = utils::run_captionreel(
        &env,
        &[
            "subtitles",
            source.to_str().unwrap(),
            "--transcript",
            transcript.to_str().unwrap(),
            "--lag",
            "11",
        ],
    )?;
    assert_eq!(output.exit_code, 1);
    assert_eq!(utils::event_codes(&output.stderr), ["reel.error.validation"]);
    Ok(())
}

#[test]
fn test_generate_without_inputs_is_rejected() -> Result<()> {
    let env = TestEnvironment::new()?;

    let output = utils::run_captionreel(&env, &["generate"])?;
    assert_eq!(output.exit_code, 1);
    assert_eq!(utils::event_codes(&output.stderr), ["reel.error.validation"]);
    Ok(())
}
