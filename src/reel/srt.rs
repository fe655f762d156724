use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use super::error::{ReelError, ReelResult};
use super::segment::{LagOffset, TranscriptionResult};
use super::timecode::{format_timecode, parse_timecode};
use super::utils::write_atomically;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    pub index: usize,
    pub start: String,
    pub end: String,
    pub text: String,
}

/// Derive one entry per segment, shifted by `lag` and numbered from 1.
pub fn build_entries(
    transcription: &TranscriptionResult,
    lag: LagOffset,
) -> ReelResult<Vec<SubtitleEntry>> {
    if transcription.is_empty() {
        return Err(ReelError::EmptyTranscript);
    }

    let shift = lag.as_secs_f64();
    transcription
        .segments()
        .iter()
        .enumerate()
        .map(|(position, segment)| {
            Ok(SubtitleEntry {
                index: position + 1,
                start: format_timecode(segment.start + shift)?,
                end: format_timecode(segment.end + shift)?,
                text: normalize_cue_text(&segment.text),
            })
        })
        .collect()
}

// A blank line terminates a cue, so text may not contain one.
fn normalize_cue_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_srt(entries: &[SubtitleEntry]) -> String {
    let mut document = String::new();
    for entry in entries {
        let _ = write!(
            document,
            "{}\n{} --> {}\n{}\n\n",
            entry.index, entry.start, entry.end, entry.text
        );
    }
    document
}

/// Serialize `transcription` and replace whatever exists at `path`.
pub fn write_srt(
    path: &Path,
    transcription: &TranscriptionResult,
    lag: LagOffset,
) -> ReelResult<Vec<SubtitleEntry>> {
    let entries = build_entries(transcription, lag)?;
    write_atomically(path, render_srt(&entries).as_bytes())?;
    Ok(entries)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SrtCue {
    pub index: Option<usize>,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

pub fn parse_srt(input: &str) -> ReelResult<Vec<SrtCue>> {
    let mut cues = Vec::new();
    let mut lines = input.lines().peekable();

    while let Some(line) = lines.next() {
        let index_line = line.trim().trim_start_matches('\u{feff}');
        if index_line.is_empty() {
            continue;
        }

        // Index line can be omitted; then the first line already holds the times
        let (index, times) = match index_line.parse::<usize>() {
            Ok(index) => {
                let times = lines.next().map(str::trim).ok_or_else(|| {
                    ReelError::validation(format!("SRT cue {index} is missing a timestamp line"))
                })?;
                (Some(index), times)
            }
            Err(_) => (None, index_line),
        };

        let (start_raw, end_raw) = times
            .split_once("-->")
            .map(|(a, b)| (a.trim(), b.trim()))
            .ok_or_else(|| {
                ReelError::validation(format!(
                    "SRT timestamp line must contain '-->', got '{times}'"
                ))
            })?;

        let start = parse_timecode(start_raw)?;
        let end = parse_timecode(end_raw)?;
        if end < start {
            return Err(ReelError::validation(format!(
                "SRT cue ends before it starts: {start_raw} --> {end_raw}"
            )));
        }

        let mut text_lines = Vec::new();
        while let Some(next) = lines.peek() {
            if next.trim().is_empty() {
                break;
            }
            text_lines.push(next.trim().to_string());
            lines.next();
        }

        cues.push(SrtCue {
            index,
            start,
            end,
            text: text_lines.join("\n"),
        });
    }

    cues.sort_by_key(|cue| cue.start);
    Ok(cues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reel::segment::Segment;

    fn scenario() -> TranscriptionResult {
        TranscriptionResult::from_segments(vec![
            Segment::new(0.0, 4.0, "hello"),
            Segment::new(4.0, 12.0, "world"),
        ])
    }

    #[test]
    fn renders_entries_in_segment_order() {
        let entries = build_entries(&scenario(), LagOffset::ZERO).unwrap();
        assert_eq!(
            render_srt(&entries),
            "1\n00:00:00,000 --> 00:00:04,000\nhello\n\n2\n00:00:04,000 --> 00:00:12,000\nworld\n\n"
        );
    }

    #[test]
    fn lag_shifts_every_timestamp() {
        let entries = build_entries(&scenario(), LagOffset::from_secs(3)).unwrap();
        assert_eq!(entries[0].start, "00:00:03,000");
        assert_eq!(entries[1].end, "00:00:15,000");
    }

    #[test]
    fn empty_transcript_is_rejected() {
        let empty = TranscriptionResult::default();
        assert!(matches!(
            build_entries(&empty, LagOffset::ZERO),
            Err(ReelError::EmptyTranscript)
        ));
    }

    #[test]
    fn any_non_empty_transcript_serializes() {
        let odd = TranscriptionResult::from_segments(vec![
            Segment::new(2.0, 2.0, ""),
            Segment::new(1.0, 0.5, "   "),
        ]);
        let entries = build_entries(&odd, LagOffset::ZERO).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn negative_segment_time_is_invalid() {
        let bad = TranscriptionResult::from_segments(vec![Segment::new(-1.0, 1.0, "early")]);
        assert!(matches!(
            build_entries(&bad, LagOffset::ZERO),
            Err(ReelError::InvalidTime(_))
        ));
    }

    #[test]
    fn serialized_document_parses_back() {
        let segments = vec![
            Segment::new(0.0, 1.25, "first line"),
            Segment::new(1.25, 3.5, "second\nspans two lines"),
            Segment::new(7.125, 9.0, "after a pause"),
            Segment::new(3725.5, 3730.0, "an hour in"),
        ];
        let transcription = TranscriptionResult::from_segments(segments.clone());

        for lag in [0u32, 1, 7, 10, 250] {
            let lag = LagOffset::from_secs(lag);
            let document = render_srt(&build_entries(&transcription, lag).unwrap());
            let cues = parse_srt(&document).unwrap();

            assert_eq!(cues.len(), segments.len());
            for (position, (cue, segment)) in cues.iter().zip(&segments).enumerate() {
                assert_eq!(cue.index, Some(position + 1));
                assert_eq!(cue.start.as_secs_f64(), segment.start + lag.as_secs_f64());
                assert_eq!(cue.end.as_secs_f64(), segment.end + lag.as_secs_f64());
                assert_eq!(cue.text, segment.text);
            }
        }
    }

    #[test]
    fn write_srt_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talk.srt");
        std::fs::write(&path, "stale contents that are much longer than the new document").unwrap();

        write_srt(&path, &scenario(), LagOffset::ZERO).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("1\n00:00:00,000 --> 00:00:04,000\nhello\n"));
        assert!(!written.contains("stale"));
    }

    #[test]
    fn parse_accepts_missing_index_and_sorts() {
        let input = "00:00:04,000 --> 00:00:05,000\nlater\n\n1\n00:00:01,000 --> 00:00:03,500\nearlier\n";
        let cues = parse_srt(input).unwrap();
        assert_eq!(cues[0].text, "earlier");
        assert_eq!(cues[1].index, None);
        assert_eq!(cues[1].start.as_millis(), 4000);
    }
}
