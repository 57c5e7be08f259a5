use bytes::Bytes;
use matroska::TrackEntry;

use crate::error::TrackResult;
use crate::frame::Frame;
use crate::output::OutputSink;

/// Lifecycle of a track extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorState {
    /// Built by the registry, output not set up yet.
    Created,
    /// The output file exists and the track header was delivered.
    HeaderReceived,
    /// At least one frame was delivered.
    Extracting,
    Finished,
    /// A track error stopped this extractor.
    Failed,
}

impl ExtractorState {
    /// Whether frames may be delivered in this state.
    pub fn accepts_frames(self) -> bool {
        matches!(self, ExtractorState::HeaderReceived | ExtractorState::Extracting)
    }
}

/// Writes one track into an output container.
///
/// `create_file` is only called on the extractor that opened the output
/// file. Extractors sharing that file receive the same sink in every other
/// call.
pub trait Extractor {
    /// Human readable name of the output container.
    fn container_name(&self) -> &'static str;

    /// Whether other tracks of the same container may append to this
    /// extractor's output file.
    fn is_shareable(&self) -> bool {
        false
    }

    /// Consumes the track header and writes the file header, if the
    /// container has one.
    fn create_file(&mut self, track: &TrackEntry, sink: &mut dyn OutputSink) -> TrackResult<()>;

    fn handle_codec_state(&mut self, _state: &Bytes, _sink: &mut dyn OutputSink) -> TrackResult<()> {
        Ok(())
    }

    fn handle_frame(&mut self, frame: Frame, sink: &mut dyn OutputSink) -> TrackResult<()>;

    /// Called once after the last frame of the track.
    fn finish_track(&mut self, _sink: &mut dyn OutputSink) -> TrackResult<()> {
        Ok(())
    }

    /// Called after every track is finished, before the file is closed.
    fn finish_file(&mut self, _sink: &mut dyn OutputSink) -> TrackResult<()> {
        Ok(())
    }

    /// Key frames written, for extractors that inspect the bitstream.
    fn keyframes(&self) -> Option<u64> {
        None
    }

    /// Number of leading frames the extractor dropped, reported once.
    fn take_skipped_frames(&mut self) -> Option<usize> {
        None
    }
}
