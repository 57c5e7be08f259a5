use std::io::Write;

use matroska::TrackEntry;
use tracing::warn;

use crate::error::TrackResult;
use crate::extractor::Extractor;
use crate::frame::Frame;
use crate::output::OutputSink;

const MISSING_DURATION: i64 = 1_000_000_000;

/// Writes plain text subtitles as numbered SRT entries.
#[derive(Debug)]
pub struct SrtExtractor {
    track_id: u64,
    entries: u64,
}

impl SrtExtractor {
    pub fn new(track_id: u64) -> Self {
        Self { track_id, entries: 0 }
    }
}

/// `HH:MM:SS,mmm` for a timestamp in nanoseconds.
fn format_timestamp(timestamp: i64) -> String {
    let millis = timestamp.max(0) / 1_000_000;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        millis / 3_600_000,
        millis / 60_000 % 60,
        millis / 1000 % 60,
        millis % 1000
    )
}

impl Extractor for SrtExtractor {
    fn container_name(&self) -> &'static str {
        "SRT text subtitles"
    }

    fn create_file(&mut self, _track: &TrackEntry, _sink: &mut dyn OutputSink) -> TrackResult<()> {
        Ok(())
    }

    fn handle_frame(&mut self, frame: Frame, sink: &mut dyn OutputSink) -> TrackResult<()> {
        self.entries += 1;

        let end = match frame.duration {
            Some(duration) => frame.timestamp.saturating_add(duration),
            None => {
                warn!(
                    track_id = self.track_id,
                    entry = self.entries,
                    "Subtitle entry has no duration, assuming one second"
                );
                frame.timestamp.saturating_add(MISSING_DURATION)
            }
        };

        let text = String::from_utf8_lossy(&frame.data);
        write!(
            sink,
            "{}\n{} --> {}\n{}\n\n",
            self.entries,
            format_timestamp(frame.timestamp),
            format_timestamp(end),
            text.trim_end_matches(['\r', '\n', '\0'])
        )?;

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(all(coverage_nightly, test), coverage(off))]
mod tests {
    use std::io::Cursor;

    use bytes::Bytes;

    use super::*;

    fn frame(text: &'static str, timestamp: i64, duration: Option<i64>) -> Frame {
        Frame {
            data: Bytes::from_static(text.as_bytes()),
            timestamp,
            duration,
            duration_derived: false,
            bref: None,
            fref: None,
            keyframe: true,
            discardable: false,
        }
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "00:00:00,000");
        assert_eq!(format_timestamp(3_723_004_000_000), "01:02:03,004");
        assert_eq!(format_timestamp(-5), "00:00:00,000");
    }

    #[test]
    fn test_srt_entries() {
        let mut sink = Cursor::new(Vec::new());
        let mut extractor = SrtExtractor::new(3);

        extractor
            .handle_frame(frame("Hello\r\n", 1_500_000_000, Some(2_000_000_000)), &mut sink)
            .unwrap();
        extractor
            .handle_frame(frame("Second line\nand more", 62_000_000_000, None), &mut sink)
            .unwrap();

        assert_eq!(
            String::from_utf8(sink.into_inner()).unwrap(),
            "1\n00:00:01,500 --> 00:00:03,500\nHello\n\n\
             2\n00:01:02,000 --> 00:01:03,000\nSecond line\nand more\n\n"
        );
    }

    #[test]
    fn test_end_time_saturates() {
        let mut sink = Cursor::new(Vec::new());
        let mut extractor = SrtExtractor::new(3);

        extractor
            .handle_frame(frame("end", i64::MAX, Some(1_000_000_000)), &mut sink)
            .unwrap();

        assert_eq!(
            String::from_utf8(sink.into_inner()).unwrap(),
            "1\n2562047:47:16,854 --> 2562047:47:16,854\nend\n\n"
        );
    }
}
