//! Requested extraction directives.

use std::{path::PathBuf, str::FromStr};

use thiserror::Error;

/// One `TID:path` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSpec {
    /// Matroska track number.
    pub track_id: u64,
    /// Output file.
    pub output: PathBuf,
    /// Whether a cue sheet should be written next to the output.
    pub cuesheet: bool,
    /// UID of the track, filled in once the track table is read.
    pub track_uid: Option<u64>,
}

impl TrackSpec {
    pub fn new(track_id: u64, output: impl Into<PathBuf>) -> Self {
        Self {
            track_id,
            output: output.into(),
            cuesheet: false,
            track_uid: None,
        }
    }

    pub fn with_cuesheet(mut self, cuesheet: bool) -> Self {
        self.cuesheet = cuesheet;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseTrackSpecError {
    #[error("invalid track specification `{0}`, expected TID:path")]
    MissingSeparator(String),

    #[error("invalid track ID `{0}`")]
    InvalidTrackId(String),

    #[error("missing output path in `{0}`")]
    EmptyPath(String),
}

impl FromStr for TrackSpec {
    type Err = ParseTrackSpecError;

    fn from_str(arg: &str) -> Result<Self, Self::Err> {
        let (track_id, path) = arg
            .split_once(':')
            .ok_or_else(|| ParseTrackSpecError::MissingSeparator(arg.to_string()))?;

        let track_id = track_id
            .trim()
            .parse::<u64>()
            .map_err(|_| ParseTrackSpecError::InvalidTrackId(track_id.to_string()))?;

        if path.is_empty() {
            return Err(ParseTrackSpecError::EmptyPath(arg.to_string()));
        }

        Ok(TrackSpec::new(track_id, path))
    }
}

#[cfg(test)]
#[cfg_attr(all(coverage_nightly, test), coverage(off))]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_parse_track_spec() {
        let spec: TrackSpec = "2:out/audio.ac3".parse().unwrap();
        assert_eq!(spec, TrackSpec::new(2, "out/audio.ac3"));

        // Only the first colon separates the track ID.
        let spec: TrackSpec = "7:C:\\media\\subs.srt".parse().unwrap();
        assert_eq!(spec.track_id, 7);
        assert_eq!(spec.output, PathBuf::from("C:\\media\\subs.srt"));
    }

    #[rstest]
    #[case("audio.ac3", ParseTrackSpecError::MissingSeparator("audio.ac3".into()))]
    #[case("x:audio.ac3", ParseTrackSpecError::InvalidTrackId("x".into()))]
    #[case("-1:audio.ac3", ParseTrackSpecError::InvalidTrackId("-1".into()))]
    #[case("3:", ParseTrackSpecError::EmptyPath("3:".into()))]
    fn test_parse_track_spec_errors(#[case] arg: &str, #[case] expected: ParseTrackSpecError) {
        assert_eq!(arg.parse::<TrackSpec>().unwrap_err(), expected);
    }
}
