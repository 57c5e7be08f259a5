use std::io::{self, Write};

use bytes::Bytes;
use h264::{AVCDecoderConfigurationRecord, AvcError, AvcParser};
use matroska::TrackEntry;
use tracing::debug;

use crate::config::ExtractConfig;
use crate::error::{TrackError, TrackResult};
use crate::extractor::Extractor;
use crate::frame::Frame;
use crate::output::OutputSink;

const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// Rewrites length-prefixed AVC into an Annex B elementary stream.
#[derive(Debug)]
pub struct AvcExtractor {
    track_id: u64,
    parser: AvcParser,
    frames: u64,
    keyframes: u64,
}

impl AvcExtractor {
    pub fn new(track: &TrackEntry, config: &ExtractConfig) -> Self {
        let mut parser = AvcParser::new();
        let default_duration = track
            .default_duration
            .map_or_else(|| config.avc_default_duration_ns(), |duration| duration as i64);
        parser.set_default_duration(default_duration);
        parser.enable_timestamp_generation(true);
        parser.set_discard_leading_non_key(!config.keep_leading_non_key);

        Self {
            track_id: track.number,
            parser,
            frames: 0,
            keyframes: 0,
        }
    }

    fn parse(&mut self, data: &[u8]) -> TrackResult<()> {
        match self.parser.parse(data) {
            Err(AvcError::NaluSizeLengthError { required }) => {
                debug!(
                    track_id = self.track_id,
                    required, "Widening NAL unit size length and retrying"
                );
                self.parser.set_output_nalu_size_length(required)?;
                self.parser.parse(data)?;
                Ok(())
            }
            result => Ok(result?),
        }
    }

    fn write_frames(&mut self, sink: &mut dyn OutputSink) -> io::Result<()> {
        while let Some(frame) = self.parser.next_frame() {
            self.frames += 1;
            if frame.is_keyframe {
                self.keyframes += 1;
            }
            for nal in frame.nal_units() {
                write_nal_unit(sink, nal)?;
            }
        }
        Ok(())
    }
}

fn write_nal_unit(sink: &mut dyn OutputSink, nal: &[u8]) -> io::Result<()> {
    sink.write_all(&START_CODE)?;
    sink.write_all(nal)
}

impl Extractor for AvcExtractor {
    fn container_name(&self) -> &'static str {
        "AVC/H.264 elementary stream"
    }

    fn create_file(&mut self, track: &TrackEntry, sink: &mut dyn OutputSink) -> TrackResult<()> {
        let private = track
            .codec_private
            .clone()
            .ok_or_else(|| TrackError::InvalidCodecPrivate("missing avcC record".into()))?;
        let record = AVCDecoderConfigurationRecord::parse(&mut io::Cursor::new(private))
            .map_err(|err| TrackError::InvalidCodecPrivate(format!("invalid avcC record: {err}")))?;

        let width = record.nalu_size_length();
        self.parser.set_nalu_size_length(width)?;
        self.parser.set_output_nalu_size_length(width)?;

        debug!(
            track_id = self.track_id,
            profile = record.profile_indication,
            level = record.level_indication,
            nalu_size_length = width,
            "Parsed avcC record"
        );

        for nal in record.sps.iter().chain(&record.pps) {
            write_nal_unit(sink, nal)?;
        }
        Ok(())
    }

    fn handle_codec_state(&mut self, state: &Bytes, sink: &mut dyn OutputSink) -> TrackResult<()> {
        let record = AVCDecoderConfigurationRecord::parse(&mut io::Cursor::new(state.clone()))
            .map_err(|err| TrackError::InvalidCodecPrivate(format!("invalid codec state: {err}")))?;
        for nal in record.sps.iter().chain(&record.pps) {
            write_nal_unit(sink, nal)?;
        }
        Ok(())
    }

    fn handle_frame(&mut self, frame: Frame, sink: &mut dyn OutputSink) -> TrackResult<()> {
        self.parser.add_timestamp(frame.timestamp);
        self.parse(&frame.data)?;
        self.write_frames(sink)?;
        Ok(())
    }

    fn finish_track(&mut self, sink: &mut dyn OutputSink) -> TrackResult<()> {
        self.parser.flush();
        self.write_frames(sink)?;
        debug!(
            track_id = self.track_id,
            frames = self.frames,
            keyframes = self.keyframes,
            "AVC track finished"
        );
        Ok(())
    }

    fn keyframes(&self) -> Option<u64> {
        Some(self.keyframes)
    }

    fn take_skipped_frames(&mut self) -> Option<usize> {
        self.parser.take_skipped_frames_report()
    }
}
