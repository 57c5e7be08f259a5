use bytes::Bytes;

use crate::ebml::{Children, read_float, read_string, read_uint};
use crate::error::Result;
use crate::ids;

/// `TrackType` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackType {
    Video,
    Audio,
    Complex,
    Logo,
    Subtitle,
    Buttons,
    Control,
    Metadata,
    Unknown(u64),
}

impl From<u64> for TrackType {
    fn from(value: u64) -> Self {
        match value {
            1 => TrackType::Video,
            2 => TrackType::Audio,
            3 => TrackType::Complex,
            0x10 => TrackType::Logo,
            0x11 => TrackType::Subtitle,
            0x12 => TrackType::Buttons,
            0x20 => TrackType::Control,
            0x21 => TrackType::Metadata,
            other => TrackType::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoSettings {
    pub pixel_width: u64,
    pub pixel_height: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSettings {
    pub sampling_frequency: f64,
    pub channels: u64,
    pub bit_depth: Option<u64>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sampling_frequency: 8000.0,
            channels: 1,
            bit_depth: None,
        }
    }
}

/// One entry of the track table.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEntry {
    pub number: u64,
    pub uid: Option<u64>,
    pub track_type: TrackType,
    /// Empty when the entry carries no `CodecID`.
    pub codec_id: String,
    pub codec_private: Option<Bytes>,
    /// Nanoseconds per frame.
    pub default_duration: Option<u64>,
    pub name: Option<String>,
    pub language: Option<String>,
    pub video: Option<VideoSettings>,
    pub audio: Option<AudioSettings>,
}

impl TrackEntry {
    pub fn parse(body: Bytes) -> Result<Self> {
        let mut entry = TrackEntry {
            number: 0,
            uid: None,
            track_type: TrackType::Unknown(0),
            codec_id: String::new(),
            codec_private: None,
            default_duration: None,
            name: None,
            language: None,
            video: None,
            audio: None,
        };

        for child in Children::new(body) {
            let (id, data) = child?;
            match id {
                ids::TRACK_NUMBER => entry.number = read_uint(id, &data)?,
                ids::TRACK_UID => entry.uid = Some(read_uint(id, &data)?),
                ids::TRACK_TYPE => entry.track_type = TrackType::from(read_uint(id, &data)?),
                ids::CODEC_ID => entry.codec_id = read_string(&data),
                ids::CODEC_PRIVATE => entry.codec_private = Some(data),
                ids::DEFAULT_DURATION => {
                    entry.default_duration = Some(read_uint(id, &data)?).filter(|d| *d > 0);
                }
                ids::NAME => entry.name = Some(read_string(&data)),
                ids::LANGUAGE => entry.language = Some(read_string(&data)),
                ids::VIDEO => entry.video = Some(parse_video(data)?),
                ids::AUDIO => entry.audio = Some(parse_audio(data)?),
                _ => {}
            }
        }

        Ok(entry)
    }
}

fn parse_video(body: Bytes) -> Result<VideoSettings> {
    let mut video = VideoSettings::default();
    for child in Children::new(body) {
        let (id, data) = child?;
        match id {
            ids::PIXEL_WIDTH => video.pixel_width = read_uint(id, &data)?,
            ids::PIXEL_HEIGHT => video.pixel_height = read_uint(id, &data)?,
            _ => {}
        }
    }
    Ok(video)
}

fn parse_audio(body: Bytes) -> Result<AudioSettings> {
    let mut audio = AudioSettings::default();
    for child in Children::new(body) {
        let (id, data) = child?;
        match id {
            ids::SAMPLING_FREQUENCY => audio.sampling_frequency = read_float(id, &data)?,
            ids::CHANNELS => audio.channels = read_uint(id, &data)?,
            ids::BIT_DEPTH => audio.bit_depth = Some(read_uint(id, &data)?),
            _ => {}
        }
    }
    Ok(audio)
}

/// Parses the body of a `Tracks` element.
pub fn parse_tracks(body: Bytes) -> Result<Vec<TrackEntry>> {
    let mut entries = Vec::new();
    for child in Children::new(body) {
        let (id, data) = child?;
        if id == ids::TRACK_ENTRY {
            entries.push(TrackEntry::parse(data)?);
        }
    }
    Ok(entries)
}

#[cfg(test)]
#[cfg_attr(all(coverage_nightly, test), coverage(off))]
mod tests {
    use super::*;
    use crate::test_support::{TrackBuilder, binary_element, float_element, master, uint_element};

    #[test]
    fn test_parse_tracks() {
        let video = TrackBuilder::new(1, 1, "V_AV1")
            .uid(0xABCD)
            .default_duration(41_708_333)
            .codec_private(&[0x81, 0x0d])
            .child(master(
                ids::VIDEO,
                &[
                    uint_element(ids::PIXEL_WIDTH, 1920),
                    uint_element(ids::PIXEL_HEIGHT, 1080),
                ],
            ))
            .build();
        let audio = TrackBuilder::new(2, 2, "A_PCM/INT/LIT")
            .child(master(
                ids::AUDIO,
                &[
                    float_element(ids::SAMPLING_FREQUENCY, 48000.0),
                    uint_element(ids::CHANNELS, 2),
                    uint_element(ids::BIT_DEPTH, 16),
                ],
            ))
            .build();
        let unknown = master(ids::TRACK_ENTRY, &[binary_element(0x7777, b"x")]);

        let entries = parse_tracks(Bytes::from([video, audio, unknown].concat())).unwrap();
        assert_eq!(entries.len(), 3);

        insta::assert_debug_snapshot!(entries[0], @r#"
        TrackEntry {
            number: 1,
            uid: Some(
                43981,
            ),
            track_type: Video,
            codec_id: "V_AV1",
            codec_private: Some(
                b"\x81\r",
            ),
            default_duration: Some(
                41708333,
            ),
            name: None,
            language: None,
            video: Some(
                VideoSettings {
                    pixel_width: 1920,
                    pixel_height: 1080,
                },
            ),
            audio: None,
        }
        "#);

        let audio = entries[1].audio.unwrap();
        assert_eq!(entries[1].track_type, TrackType::Audio);
        assert_eq!(audio.sampling_frequency, 48000.0);
        assert_eq!(audio.channels, 2);
        assert_eq!(audio.bit_depth, Some(16));

        assert_eq!(entries[2].number, 0);
        assert!(entries[2].codec_id.is_empty());
    }
}
