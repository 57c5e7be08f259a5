//! Built-in extractors.

mod avc;
mod ivf;
mod raw;
mod srt;
mod wav;

pub use avc::AvcExtractor;
pub use ivf::IvfExtractor;
pub use raw::RawExtractor;
pub use srt::SrtExtractor;
pub use wav::WavExtractor;

use crate::extractor::Extractor;
use crate::registry::Registry;

pub const CODEC_AV1: &str = "V_AV1";
pub const CODEC_AVC: &str = "V_MPEG4/ISO/AVC";
pub const CODEC_TEXT_UTF8: &str = "S_TEXT/UTF8";
pub const CODEC_TEXT_ASCII: &str = "S_TEXT/ASCII";
pub const CODEC_PCM_LE: &str = "A_PCM/INT/LIT";

pub(crate) fn register_builtin(registry: &mut Registry) {
    registry
        .register(
            |codec_id| codec_id == CODEC_AV1,
            |track, config| Ok(Box::new(IvfExtractor::new(track, config)) as Box<dyn Extractor>),
        )
        .register(
            |codec_id| codec_id == CODEC_AVC,
            |track, config| Ok(Box::new(AvcExtractor::new(track, config)) as Box<dyn Extractor>),
        )
        .register(
            |codec_id| codec_id == CODEC_TEXT_UTF8 || codec_id == CODEC_TEXT_ASCII,
            |track, _| Ok(Box::new(SrtExtractor::new(track.number)) as Box<dyn Extractor>),
        )
        .register(
            |codec_id| codec_id == CODEC_PCM_LE,
            |_, _| Ok(Box::new(WavExtractor::new()) as Box<dyn Extractor>),
        )
        .register(
            |codec_id| RawExtractor::container_for(codec_id).is_some(),
            |track, _| Ok(Box::new(RawExtractor::for_track(track)?) as Box<dyn Extractor>),
        );
}
