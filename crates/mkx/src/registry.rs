//! Codec ID to extractor mapping.

use matroska::TrackEntry;

use crate::config::ExtractConfig;
use crate::error::{TrackError, TrackResult};
use crate::extractor::Extractor;
use crate::extractors;

type Matcher = Box<dyn Fn(&str) -> bool>;
type Factory = Box<dyn Fn(&TrackEntry, &ExtractConfig) -> TrackResult<Box<dyn Extractor>>>;

/// Ordered list of `(matcher, factory)` pairs. The first matching entry
/// builds the extractor.
pub struct Registry {
    entries: Vec<(Matcher, Factory)>,
}

impl Default for Registry {
    /// Registry with every built-in extractor.
    fn default() -> Self {
        let mut registry = Self::empty();
        extractors::register_builtin(&mut registry);
        registry
    }
}

impl Registry {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn register<M, F>(&mut self, matcher: M, factory: F) -> &mut Self
    where
        M: Fn(&str) -> bool + 'static,
        F: Fn(&TrackEntry, &ExtractConfig) -> TrackResult<Box<dyn Extractor>> + 'static,
    {
        self.entries.push((Box::new(matcher), Box::new(factory)));
        self
    }

    pub fn supports(&self, codec_id: &str) -> bool {
        self.entries.iter().any(|(matcher, _)| matcher(codec_id))
    }

    /// Builds the extractor for `track`.
    pub fn create(&self, track: &TrackEntry, config: &ExtractConfig) -> TrackResult<Box<dyn Extractor>> {
        if track.codec_id.is_empty() {
            return Err(TrackError::MissingCodecId);
        }

        let (_, factory) = self
            .entries
            .iter()
            .find(|(matcher, _)| matcher(&track.codec_id))
            .ok_or_else(|| TrackError::UnsupportedCodec(track.codec_id.clone()))?;

        factory(track, config)
    }
}

#[cfg(test)]
#[cfg_attr(all(coverage_nightly, test), coverage(off))]
mod tests {
    use matroska::TrackType;
    use rstest::rstest;

    use super::*;

    fn track(number: u64, codec_id: &str) -> TrackEntry {
        TrackEntry {
            number,
            uid: None,
            track_type: TrackType::Audio,
            codec_id: codec_id.to_string(),
            codec_private: None,
            default_duration: None,
            name: None,
            language: None,
            video: None,
            audio: None,
        }
    }

    #[rstest]
    #[case("A_AC3", "AC-3")]
    #[case("A_EAC3", "E-AC-3")]
    #[case("A_MPEG/L3", "MPEG-1 Audio Layer 3")]
    #[case("A_DTS", "DTS")]
    #[case("S_TEXT/UTF8", "SRT text subtitles")]
    #[case("S_TEXT/ASCII", "SRT text subtitles")]
    #[case("A_PCM/INT/LIT", "WAV")]
    #[case("V_AV1", "IVF")]
    fn test_builtin_extractors(#[case] codec_id: &str, #[case] container: &str) {
        let registry = Registry::default();
        let extractor = registry.create(&track(1, codec_id), &ExtractConfig::default()).unwrap();
        assert_eq!(extractor.container_name(), container);
    }

    #[test]
    fn test_unsupported_and_missing_codec() {
        let registry = Registry::default();
        let config = ExtractConfig::default();

        assert!(matches!(
            registry.create(&track(1, "V_MS/VFW/FOURCC"), &config),
            Err(TrackError::UnsupportedCodec(codec)) if codec == "V_MS/VFW/FOURCC"
        ));
        assert!(matches!(
            registry.create(&track(1, ""), &config),
            Err(TrackError::MissingCodecId)
        ));
        assert!(!registry.supports("V_VP9"));
        assert!(Registry::empty().create(&track(1, "A_AC3"), &config).is_err());
    }
}
