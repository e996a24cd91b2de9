//! Transcript export formatting (timestamped text, SRT, VTT).

use super::Transcript;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Txt,
    Srt,
    Vtt,
    Summary,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "txt" | "text" => Ok(OutputFormat::Txt),
            "srt" => Ok(OutputFormat::Srt),
            "vtt" | "webvtt" => Ok(OutputFormat::Vtt),
            "summary" | "md" => Ok(OutputFormat::Summary),
            _ => Err(format!("Unknown format: {}. Use txt, srt, vtt, or summary.", s)),
        }
    }
}

/// Format a transcript for export.
pub fn format_transcript(transcript: &Transcript, format: OutputFormat) -> String {
    match format {
        OutputFormat::Txt => format_txt(transcript),
        OutputFormat::Srt => format_srt(transcript),
        OutputFormat::Vtt => format_vtt(transcript),
        OutputFormat::Summary => super::summarize_transcript(transcript),
    }
}

/// Plain timestamped text: one `[MM:SS] text` line per segment.
fn format_txt(transcript: &Transcript) -> String {
    let mut output = String::new();

    for segment in &transcript.segments {
        output.push_str(&format!(
            "[{}] {}\n",
            format_clock(segment.start_seconds),
            segment.text.trim()
        ));
    }

    output
}

/// Format as SRT (SubRip).
fn format_srt(transcript: &Transcript) -> String {
    let mut output = String::new();

    for (i, segment) in transcript.segments.iter().enumerate() {
        // Sequence number (1-indexed)
        output.push_str(&format!("{}\n", i + 1));

        // Timestamps: 00:00:00,000 --> 00:00:00,000
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_timestamp(segment.start_seconds),
            format_srt_timestamp(segment.end_seconds)
        ));

        output.push_str(segment.text.trim());
        output.push_str("\n\n");
    }

    output
}

/// Format as WebVTT.
fn format_vtt(transcript: &Transcript) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for (i, segment) in transcript.segments.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));

        // Timestamps: 00:00:00.000 --> 00:00:00.000
        output.push_str(&format!(
            "{} --> {}\n",
            format_vtt_timestamp(segment.start_seconds),
            format_vtt_timestamp(segment.end_seconds)
        ));

        output.push_str(segment.text.trim());
        output.push_str("\n\n");
    }

    output
}

/// Format timestamp for SRT (00:00:00,000).
fn format_srt_timestamp(seconds: f64) -> String {
    let (hours, minutes, secs, ms) = split_ms(seconds);
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, ms)
}

/// Format timestamp for VTT (00:00:00.000).
fn format_vtt_timestamp(seconds: f64) -> String {
    let (hours, minutes, secs, ms) = split_ms(seconds);
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, ms)
}

fn split_ms(seconds: f64) -> (u64, u64, u64, u64) {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;
    (hours, minutes, secs, ms)
}

/// Clock-style timestamp: `HH:MM:SS` from one hour up, else `MM:SS`.
pub fn format_clock(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::TranscriptSegment;

    fn sample_transcript() -> Transcript {
        Transcript::new(
            "test123".to_string(),
            vec![
                TranscriptSegment {
                    text: "Hello world.".to_string(),
                    start_seconds: 0.0,
                    end_seconds: 2.5,
                },
                TranscriptSegment {
                    text: "This is a test.".to_string(),
                    start_seconds: 2.5,
                    end_seconds: 5.0,
                },
            ],
        )
    }

    #[test]
    fn test_format_txt() {
        let txt = format_transcript(&sample_transcript(), OutputFormat::Txt);
        assert!(txt.starts_with("[00:00] Hello world.\n"));
        assert!(txt.contains("[00:02] This is a test.\n"));
    }

    #[test]
    fn test_format_srt() {
        let srt = format_transcript(&sample_transcript(), OutputFormat::Srt);
        assert!(srt.contains("1\n00:00:00,000 --> 00:00:02,500"));
        assert!(srt.contains("Hello world."));
    }

    #[test]
    fn test_format_vtt() {
        let vtt = format_transcript(&sample_transcript(), OutputFormat::Vtt);
        assert!(vtt.starts_with("WEBVTT"));
        assert!(vtt.contains("00:00:00.000 --> 00:00:02.500"));
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("txt".parse::<OutputFormat>().unwrap(), OutputFormat::Txt);
        assert_eq!("srt".parse::<OutputFormat>().unwrap(), OutputFormat::Srt);
        assert_eq!("vtt".parse::<OutputFormat>().unwrap(), OutputFormat::Vtt);
        assert_eq!("webvtt".parse::<OutputFormat>().unwrap(), OutputFormat::Vtt);
        assert_eq!("summary".parse::<OutputFormat>().unwrap(), OutputFormat::Summary);
        assert!("pdf".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_timestamp_rendering() {
        assert_eq!(format_srt_timestamp(3661.5), "01:01:01,500");
        assert_eq!(format_vtt_timestamp(3661.5), "01:01:01.500");
        assert_eq!(format_srt_timestamp(0.0), "00:00:00,000");
    }

    #[test]
    fn test_clock_formats() {
        assert_eq!(format_clock(65.0), "01:05");
        assert_eq!(format_clock(3661.0), "01:01:01");
    }
}
