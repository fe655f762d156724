use anyhow::{Context, Result};
use dirs::{config_dir, data_dir};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::{ReelError, ReelResult};
use super::frames::FrameLayout;
use super::job::JobSettings;
use super::mux::MuxSettings;
use super::raster::{Rgba, TextLayout};
use super::segment::FrameSpec;
use super::timeline::AudioLagPlacement;

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()
        .context("Unable to determine config directory")?
        .join("captionreel")
        .join("config.toml"))
}

pub fn default_store_dir() -> Result<PathBuf> {
    Ok(data_dir()
        .context("Unable to determine data directory for subtitle artifacts")?
        .join("captionreel")
        .join("subtitles"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        let spec = FrameSpec::default();
        Self {
            width: spec.width,
            height: spec.height,
            fps: spec.fps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Font file; the first well-known system sans font is used when unset
    pub font_path: Option<PathBuf>,
    pub base_font_size: f32,
    pub min_font_size: f32,
    pub padding: u32,
    pub foreground: String,
    pub background: String,
}

impl Default for TextConfig {
    fn default() -> Self {
        let layout = TextLayout::default();
        Self {
            font_path: None,
            base_font_size: layout.base_font_size,
            min_font_size: layout.min_font_size,
            padding: layout.padding,
            foreground: "#ffffff".to_string(),
            background: "#000000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub video_codec: String,
    pub audio_codec: String,
    /// Upper bound for a single encoder invocation; 0 disables the limit
    pub timeout_secs: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        let mux = MuxSettings::default();
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            video_codec: mux.video_codec,
            audio_codec: mux.audio_codec,
            timeout_secs: 1800,
        }
    }
}

impl EncoderConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LagConfig {
    pub max_seconds: u32,
    pub audio_placement: AudioLagPlacement,
}

impl Default for LagConfig {
    fn default() -> Self {
        Self {
            max_seconds: 10,
            audio_placement: AudioLagPlacement::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub program: String,
    pub model: String,
    pub language: Option<String>,
    pub device: Option<String>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            program: "whisper".to_string(),
            model: "base".to_string(),
            language: None,
            device: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Insert blank frames where the transcript has silences between segments
    pub fill_gaps: bool,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self { fill_gaps: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReelConfig {
    pub store_dir: Option<PathBuf>,
    pub frame: FrameConfig,
    pub text: TextConfig,
    pub encoder: EncoderConfig,
    pub lag: LagConfig,
    pub recognizer: RecognizerConfig,
    pub timeline: TimelineConfig,
}

impl ReelConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_path(default_config_path()?)
    }

    /// Read the config at `path`, writing the defaults there first if it does not exist.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let config = Self::default();
            config.save_to_path(path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading captionreel config from {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing captionreel config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }

        let toml = toml::to_string_pretty(self).context("serializing captionreel config")?;
        fs::write(path, toml)
            .with_context(|| format!("writing captionreel config to {}", path.display()))?;
        Ok(())
    }

    pub fn store_dir(&self) -> Result<PathBuf> {
        match &self.store_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_store_dir(),
        }
    }

    pub fn frame_spec(&self) -> ReelResult<FrameSpec> {
        FrameSpec::new(self.frame.width, self.frame.height, self.frame.fps)
    }

    pub fn text_layout(&self) -> ReelResult<TextLayout> {
        let layout = TextLayout {
            base_font_size: self.text.base_font_size,
            min_font_size: self.text.min_font_size,
            padding: self.text.padding,
            foreground: Rgba::parse_hex(&self.text.foreground)?,
            background: Rgba::parse_hex(&self.text.background)?,
        };
        layout.validate()?;
        Ok(layout)
    }

    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            layout: if self.timeline.fill_gaps {
                FrameLayout::GapAligned
            } else {
                FrameLayout::Contiguous
            },
            audio_placement: self.lag.audio_placement,
            mux: MuxSettings {
                video_codec: self.encoder.video_codec.clone(),
                audio_codec: self.encoder.audio_codec.clone(),
            },
        }
    }

    /// Reject lags above the configured bound.
    pub fn check_lag(&self, seconds: u32) -> ReelResult<()> {
        if seconds > self.lag.max_seconds {
            return Err(ReelError::validation(format!(
                "lag must be between 0 and {} seconds, got {seconds}",
                self.lag.max_seconds
            )));
        }
        Ok(())
    }
}
