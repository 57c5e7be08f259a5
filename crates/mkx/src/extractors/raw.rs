use std::io::Write;

use matroska::TrackEntry;

use crate::error::{TrackError, TrackResult};
use crate::extractor::Extractor;
use crate::frame::Frame;
use crate::output::OutputSink;

/// Writes frame payloads back to back, optionally after a header taken
/// from the codec private data.
#[derive(Debug)]
pub struct RawExtractor {
    container: &'static str,
    header_from_private: bool,
}

impl RawExtractor {
    pub fn for_track(track: &TrackEntry) -> TrackResult<Self> {
        let container = Self::container_for(&track.codec_id)
            .ok_or_else(|| TrackError::UnsupportedCodec(track.codec_id.clone()))?;

        Ok(Self {
            container,
            header_from_private: track.codec_id == "A_FLAC",
        })
    }

    /// Output container written for a codec ID, if it is a raw format.
    pub fn container_for(codec_id: &str) -> Option<&'static str> {
        let container = match codec_id {
            "A_MPEG/L2" => "MPEG-1 Audio Layer 2",
            "A_MPEG/L3" => "MPEG-1 Audio Layer 3",
            "A_AC3" => "AC-3",
            "A_EAC3" => "E-AC-3",
            "A_DTS" => "DTS",
            "A_TRUEHD" => "TrueHD",
            "A_FLAC" => "FLAC",
            _ => return None,
        };
        Some(container)
    }
}

impl Extractor for RawExtractor {
    fn container_name(&self) -> &'static str {
        self.container
    }

    fn is_shareable(&self) -> bool {
        true
    }

    fn create_file(&mut self, track: &TrackEntry, sink: &mut dyn OutputSink) -> TrackResult<()> {
        if self.header_from_private {
            let header = track.codec_private.as_ref().ok_or_else(|| {
                TrackError::InvalidCodecPrivate("FLAC tracks need the stream header".into())
            })?;
            sink.write_all(header)?;
        }
        Ok(())
    }

    fn handle_frame(&mut self, frame: Frame, sink: &mut dyn OutputSink) -> TrackResult<()> {
        sink.write_all(&frame.data)?;
        Ok(())
    }
}
