use std::io::{Cursor, Seek, SeekFrom, Write};

use av1::ivf::{IvfFrameHeader, IvfHeader, update_frame_count};
use av1::{AV1CodecConfigurationRecord, Av1Parser, ObuHeader, ObuType};
use bytes::Bytes;
use matroska::TrackEntry;
use tracing::{debug, warn};

use crate::config::ExtractConfig;
use crate::error::{TrackError, TrackResult};
use crate::extractor::Extractor;
use crate::frame::Frame;
use crate::output::OutputSink;

const TEMPORAL_DELIMITER: [u8; 2] = [0x12, 0x00];
const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Writes AV1 temporal units into an IVF file.
///
/// The IVF header needs the frame dimensions. They come from the first
/// sequence header, found either in the codec private data or in the
/// frames themselves; frames are held back until one shows up.
#[derive(Debug)]
pub struct IvfExtractor {
    track_id: u64,
    parser: Av1Parser,
    timebase_numerator: u32,
    timebase_denominator: u32,
    fallback_dimensions: (u16, u16),
    header_written: bool,
    deferred: Vec<Frame>,
    max_deferred: usize,
    frame_count: u32,
    keyframes: u64,
}

impl IvfExtractor {
    pub fn new(track: &TrackEntry, config: &ExtractConfig) -> Self {
        let (timebase_numerator, timebase_denominator) = timebase(track.default_duration);
        let fallback_dimensions = track.video.map_or((0, 0), |video| {
            (
                u16::try_from(video.pixel_width).unwrap_or(u16::MAX),
                u16::try_from(video.pixel_height).unwrap_or(u16::MAX),
            )
        });

        Self {
            track_id: track.number,
            parser: Av1Parser::new(),
            timebase_numerator,
            timebase_denominator,
            fallback_dimensions,
            header_written: false,
            deferred: Vec::new(),
            max_deferred: config.ivf_max_deferred_frames,
            frame_count: 0,
            keyframes: 0,
        }
    }

    fn dimensions(&self) -> (u16, u16) {
        self.parser
            .pixel_dimensions()
            .map(|(width, height)| {
                (
                    u16::try_from(width).unwrap_or(u16::MAX),
                    u16::try_from(height).unwrap_or(u16::MAX),
                )
            })
            .unwrap_or(self.fallback_dimensions)
    }

    fn write_header(&mut self, sink: &mut dyn OutputSink) -> TrackResult<()> {
        let (width, height) = self.dimensions();
        let header = IvfHeader {
            width,
            height,
            timebase_numerator: self.timebase_numerator,
            timebase_denominator: self.timebase_denominator,
            frame_count: 0,
        };
        header.mux(&mut &mut *sink)?;
        self.header_written = true;

        debug!(
            track_id = self.track_id,
            width,
            height,
            deferred = self.deferred.len(),
            "Wrote IVF header"
        );

        for frame in std::mem::take(&mut self.deferred) {
            self.write_frame(frame, sink)?;
        }
        Ok(())
    }

    fn write_frame(&mut self, frame: Frame, sink: &mut dyn OutputSink) -> TrackResult<()> {
        if self.parser.headers_parsed() && self.parser.is_keyframe(&frame.data)? {
            self.keyframes += 1;
        }

        let needs_delimiter = !starts_with_temporal_delimiter(&frame.data);
        let extra = if needs_delimiter { TEMPORAL_DELIMITER.len() } else { 0 };
        let frame_size = u32::try_from(frame.data.len() + extra)
            .map_err(|_| TrackError::State("frame too large for IVF"))?;

        let frame_header = IvfFrameHeader {
            frame_size,
            pts: self.pts(frame.timestamp),
        };
        frame_header.mux(&mut &mut *sink)?;
        if needs_delimiter {
            sink.write_all(&TEMPORAL_DELIMITER)?;
        }
        sink.write_all(&frame.data)?;

        self.frame_count = self.frame_count.saturating_add(1);
        Ok(())
    }

    /// Timestamp in nanoseconds to timebase ticks.
    fn pts(&self, timestamp: i64) -> u64 {
        let timestamp = timestamp.max(0) as u128;
        let ticks = timestamp * u128::from(self.timebase_denominator)
            / (u128::from(self.timebase_numerator) * u128::from(NANOS_PER_SECOND));
        ticks.min(u128::from(u64::MAX)) as u64
    }
}

/// IVF timebase for a default frame duration in nanoseconds, 1/1000 when
/// the track has none.
fn timebase(default_duration: Option<u64>) -> (u32, u32) {
    let Some(duration) = default_duration.filter(|duration| *duration > 0) else {
        return (1, 1000);
    };

    let divisor = gcd(duration, NANOS_PER_SECOND);
    match (
        u32::try_from(duration / divisor),
        u32::try_from(NANOS_PER_SECOND / divisor),
    ) {
        (Ok(numerator), Ok(denominator)) => (numerator, denominator),
        _ => (1, 1000),
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn starts_with_temporal_delimiter(data: &[u8]) -> bool {
    ObuHeader::parse(&mut &data[..]).is_ok_and(|header| header.obu_type == ObuType::TemporalDelimiter)
}

impl Extractor for IvfExtractor {
    fn container_name(&self) -> &'static str {
        "IVF"
    }

    fn create_file(&mut self, track: &TrackEntry, sink: &mut dyn OutputSink) -> TrackResult<()> {
        if let Some(private) = track.codec_private.as_ref().filter(|private| !private.is_empty()) {
            let record = AV1CodecConfigurationRecord::demux(&mut Cursor::new(private.clone()))
                .map_err(|err| TrackError::InvalidCodecPrivate(format!("invalid av1C record: {err}")))?;
            debug!(
                track_id = self.track_id,
                profile = record.seq_profile,
                level = record.seq_level_idx_0,
                config_obus = record.config_obu.len(),
                "AV1 codec configuration"
            );
            self.parser.parse_headers(&record.config_obu)?;
        }

        if self.parser.headers_parsed() {
            self.write_header(sink)?;
        }
        Ok(())
    }

    fn handle_codec_state(&mut self, state: &Bytes, _sink: &mut dyn OutputSink) -> TrackResult<()> {
        self.parser.parse_headers(state)?;
        Ok(())
    }

    fn handle_frame(&mut self, frame: Frame, sink: &mut dyn OutputSink) -> TrackResult<()> {
        if self.header_written {
            return self.write_frame(frame, sink);
        }

        self.parser.parse_headers(&frame.data)?;
        self.deferred.push(frame);

        if self.parser.headers_parsed() {
            self.write_header(sink)
        } else if self.deferred.len() >= self.max_deferred {
            warn!(
                track_id = self.track_id,
                frames = self.deferred.len(),
                "No AV1 sequence header found, writing IVF header with track dimensions"
            );
            self.write_header(sink)
        } else {
            Ok(())
        }
    }

    fn finish_file(&mut self, sink: &mut dyn OutputSink) -> TrackResult<()> {
        if !self.header_written {
            self.write_header(sink)?;
        }

        update_frame_count(&mut &mut *sink, self.frame_count)?;
        sink.seek(SeekFrom::End(0))?;

        debug!(
            track_id = self.track_id,
            frames = self.frame_count,
            keyframes = self.keyframes,
            "IVF file finished"
        );
        Ok(())
    }

    fn keyframes(&self) -> Option<u64> {
        Some(self.keyframes)
    }
}

#[cfg(test)]
#[cfg_attr(all(coverage_nightly, test), coverage(off))]
mod tests {
    use matroska::{TrackType, VideoSettings};

    use super::*;

    const SEQUENCE_HEADER: &[u8] = b"\n\x0f\0\0\0j\xef\xbf\xe1\xbc\x02\x19\x90\x10\x10\x10@";
    const KEY_FRAME: &[u8] = &[0x32, 0x01, 0x10];
    const INTER_FRAME: &[u8] = &[0x32, 0x01, 0x30];

    fn track(codec_private: Option<Vec<u8>>) -> TrackEntry {
        TrackEntry {
            number: 1,
            uid: None,
            track_type: TrackType::Video,
            codec_id: "V_AV1".into(),
            codec_private: codec_private.map(Bytes::from),
            default_duration: Some(40_000_000),
            name: None,
            language: None,
            video: Some(VideoSettings {
                pixel_width: 1280,
                pixel_height: 720,
            }),
            audio: None,
        }
    }

    fn av1c() -> Vec<u8> {
        [&[0x81, 0x0d, 0x0c, 0x00][..], SEQUENCE_HEADER].concat()
    }

    fn frame(data: &[u8], timestamp: i64) -> Frame {
        Frame {
            data: Bytes::copy_from_slice(data),
            timestamp,
            duration: Some(40_000_000),
            duration_derived: true,
            bref: None,
            fref: None,
            keyframe: false,
            discardable: false,
        }
    }

    fn read_output(data: Vec<u8>) -> (IvfHeader, Vec<(IvfFrameHeader, Vec<u8>)>) {
        let mut reader = Cursor::new(data);
        let header = IvfHeader::demux(&mut reader).unwrap();
        let mut frames = Vec::new();
        while (reader.position() as usize) < reader.get_ref().len() {
            let frame_header = IvfFrameHeader::demux(&mut reader).unwrap();
            let start = reader.position() as usize;
            let end = start + frame_header.frame_size as usize;
            frames.push((frame_header, reader.get_ref()[start..end].to_vec()));
            reader.set_position(end as u64);
        }
        (header, frames)
    }

    #[test]
    fn test_timebase() {
        assert_eq!(timebase(Some(40_000_000)), (1, 25));
        assert_eq!(timebase(Some(41_708_333)), (41_708_333, 1_000_000_000));
        assert_eq!(timebase(None), (1, 1000));
        assert_eq!(timebase(Some(0)), (1, 1000));
    }

    #[test]
    fn test_header_from_codec_private() {
        let track = track(Some(av1c()));
        let mut sink = Cursor::new(Vec::new());
        let mut extractor = IvfExtractor::new(&track, &ExtractConfig::default());

        extractor.create_file(&track, &mut sink).unwrap();
        extractor.handle_frame(frame(KEY_FRAME, 0), &mut sink).unwrap();
        extractor.handle_frame(frame(INTER_FRAME, 40_000_000), &mut sink).unwrap();
        extractor.finish_file(&mut sink).unwrap();

        let (header, frames) = read_output(sink.into_inner());
        insta::assert_debug_snapshot!(header, @r"
        IvfHeader {
            width: 3840,
            height: 2160,
            timebase_numerator: 1,
            timebase_denominator: 25,
            frame_count: 2,
        }
        ");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0.pts, 0);
        assert_eq!(frames[1].0.pts, 1);
        assert_eq!(frames[0].1, [&TEMPORAL_DELIMITER[..], KEY_FRAME].concat());
        assert_eq!(extractor.keyframes, 1);
    }

    #[test]
    fn test_header_deferred_until_sequence_header() {
        let track = track(None);
        let mut sink = Cursor::new(Vec::new());
        let mut extractor = IvfExtractor::new(&track, &ExtractConfig::default());

        extractor.create_file(&track, &mut sink).unwrap();
        assert!(sink.get_ref().is_empty());

        let with_header = [&TEMPORAL_DELIMITER[..], SEQUENCE_HEADER, KEY_FRAME].concat();
        extractor.handle_frame(frame(&with_header, 0), &mut sink).unwrap();
        extractor.finish_file(&mut sink).unwrap();

        let (header, frames) = read_output(sink.into_inner());
        assert_eq!((header.width, header.height), (3840, 2160));
        assert_eq!(header.frame_count, 1);
        // The delimiter is already present and not duplicated.
        assert_eq!(frames[0].1, with_header);
    }

    #[test]
    fn test_fallback_dimensions_after_deferred_limit() {
        let track = track(None);
        let config = ExtractConfig {
            ivf_max_deferred_frames: 2,
            ..ExtractConfig::default()
        };
        let mut sink = Cursor::new(Vec::new());
        let mut extractor = IvfExtractor::new(&track, &config);
        extractor.create_file(&track, &mut sink).unwrap();

        // Padding OBUs only, no sequence header anywhere.
        let padding = [0x7a, 0x01, 0x00];
        extractor.handle_frame(frame(&padding, 0), &mut sink).unwrap();
        assert!(sink.get_ref().is_empty());
        extractor.handle_frame(frame(&padding, 40_000_000), &mut sink).unwrap();
        extractor.finish_file(&mut sink).unwrap();

        let (header, frames) = read_output(sink.into_inner());
        assert_eq!((header.width, header.height), (1280, 720));
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_raw_obu_rejected() {
        let track = track(Some(av1c()));
        let mut sink = Cursor::new(Vec::new());
        let mut extractor = IvfExtractor::new(&track, &ExtractConfig::default());
        extractor.create_file(&track, &mut sink).unwrap();

        let err = extractor.handle_frame(frame(&[0x30, 0x10], 0), &mut sink).unwrap_err();
        assert!(matches!(err, TrackError::Av1(av1::Av1Error::RawObuUnsupported)));
    }
}
