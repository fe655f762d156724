use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Why an external encoder invocation did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodingFailure {
    ExitStatus(Option<i32>),
    Timeout(Duration),
    Spawn(String),
}

impl fmt::Display for EncodingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingFailure::ExitStatus(Some(code)) => write!(f, "exited with status {code}"),
            EncodingFailure::ExitStatus(None) => write!(f, "was terminated by a signal"),
            EncodingFailure::Timeout(after) => write!(f, "timed out after {}s", after.as_secs()),
            EncodingFailure::Spawn(reason) => write!(f, "could not be started: {reason}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReelError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("No speech segments were recognized; there is nothing to subtitle")]
    EmptyTranscript,

    #[error("Invalid time value {0}: times must be finite and non-negative")]
    InvalidTime(f64),

    #[error("{program} {failure}{}", format_diagnostics(.diagnostics))]
    Encoding {
        program: String,
        failure: EncodingFailure,
        diagnostics: String,
    },

    #[error("No subtitle file has been generated for {0}")]
    NotFound(String),

    #[error("Speech recognition failed: {0}")]
    Recognition(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_diagnostics(diagnostics: &str) -> String {
    let trimmed = diagnostics.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl ReelError {
    pub fn validation(message: impl Into<String>) -> Self {
        ReelError::Validation(message.into())
    }

    pub fn encoding(program: &str, failure: EncodingFailure, diagnostics: impl Into<String>) -> Self {
        ReelError::Encoding {
            program: program.to_string(),
            failure,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ReelError::Encoding {
                failure: EncodingFailure::Timeout(_),
                ..
            }
        )
    }

    /// Stable event code used when the error is reported to the caller.
    pub fn code(&self) -> &'static str {
        match self {
            ReelError::Validation(_) => "reel.error.validation",
            ReelError::EmptyTranscript => "reel.error.empty_transcript",
            ReelError::InvalidTime(_) => "reel.error.invalid_time",
            ReelError::Encoding { .. } => "reel.error.encoding",
            ReelError::NotFound(_) => "reel.error.not_found",
            ReelError::Recognition(_) => "reel.error.recognition",
            ReelError::Io(_) => "reel.error.io",
            ReelError::Json(_) => "reel.error.json",
        }
    }
}

pub type ReelResult<T> = std::result::Result<T, ReelError>;
