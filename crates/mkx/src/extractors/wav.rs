use std::io::{Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use matroska::{AudioSettings, TrackEntry};

use crate::error::TrackResult;
use crate::extractor::Extractor;
use crate::frame::Frame;
use crate::output::OutputSink;

const HEADER_SIZE: u64 = 44;
const RIFF_SIZE_OFFSET: u64 = 4;
const DATA_SIZE_OFFSET: u64 = 40;
const WAVE_FORMAT_PCM: u16 = 1;

/// Writes little-endian PCM into a RIFF/WAVE file. The chunk sizes are
/// patched once all samples are written.
#[derive(Debug, Default)]
pub struct WavExtractor {
    data_len: u64,
}

impl WavExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

fn write_header(sink: &mut dyn OutputSink, audio: &AudioSettings) -> TrackResult<()> {
    let channels = u16::try_from(audio.channels).unwrap_or(u16::MAX);
    let sample_rate = audio.sampling_frequency.round() as u32;
    let bits_per_sample = audio.bit_depth.and_then(|bits| u16::try_from(bits).ok()).unwrap_or(16);
    let block_align = channels.saturating_mul(bits_per_sample.div_ceil(8));

    sink.write_all(b"RIFF")?;
    sink.write_u32::<LittleEndian>(0)?;
    sink.write_all(b"WAVE")?;

    sink.write_all(b"fmt ")?;
    sink.write_u32::<LittleEndian>(16)?;
    sink.write_u16::<LittleEndian>(WAVE_FORMAT_PCM)?;
    sink.write_u16::<LittleEndian>(channels)?;
    sink.write_u32::<LittleEndian>(sample_rate)?;
    sink.write_u32::<LittleEndian>(sample_rate.saturating_mul(u32::from(block_align)))?;
    sink.write_u16::<LittleEndian>(block_align)?;
    sink.write_u16::<LittleEndian>(bits_per_sample)?;

    sink.write_all(b"data")?;
    sink.write_u32::<LittleEndian>(0)?;
    Ok(())
}

impl Extractor for WavExtractor {
    fn container_name(&self) -> &'static str {
        "WAV"
    }

    fn create_file(&mut self, track: &TrackEntry, sink: &mut dyn OutputSink) -> TrackResult<()> {
        write_header(sink, &track.audio.unwrap_or_default())
    }

    fn handle_frame(&mut self, frame: Frame, sink: &mut dyn OutputSink) -> TrackResult<()> {
        sink.write_all(&frame.data)?;
        self.data_len += frame.data.len() as u64;
        Ok(())
    }

    fn finish_file(&mut self, sink: &mut dyn OutputSink) -> TrackResult<()> {
        let riff_size = (self.data_len + HEADER_SIZE - 8).min(u64::from(u32::MAX)) as u32;
        let data_size = self.data_len.min(u64::from(u32::MAX)) as u32;

        sink.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
        sink.write_u32::<LittleEndian>(riff_size)?;
        sink.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        sink.write_u32::<LittleEndian>(data_size)?;
        sink.seek(SeekFrom::End(0))?;
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(all(coverage_nightly, test), coverage(off))]
mod tests {
    use std::io::Cursor;

    use bytes::Bytes;
    use matroska::TrackType;

    use super::*;

    #[test]
    fn test_wav_header_and_sizes() {
        let track = TrackEntry {
            number: 4,
            uid: None,
            track_type: TrackType::Audio,
            codec_id: "A_PCM/INT/LIT".into(),
            codec_private: None,
            default_duration: None,
            name: None,
            language: None,
            video: None,
            audio: Some(AudioSettings {
                sampling_frequency: 48000.0,
                channels: 2,
                bit_depth: Some(16),
            }),
        };

        let mut sink = Cursor::new(Vec::new());
        let mut extractor = WavExtractor::new();
        extractor.create_file(&track, &mut sink).unwrap();
        for _ in 0..3 {
            let frame = Frame {
                data: Bytes::from_static(&[1, 2, 3, 4]),
                timestamp: 0,
                duration: None,
                duration_derived: false,
                bref: None,
                fref: None,
                keyframe: true,
                discardable: false,
            };
            extractor.handle_frame(frame, &mut sink).unwrap();
        }
        extractor.finish_file(&mut sink).unwrap();

        let data = sink.into_inner();
        assert_eq!(data.len(), 44 + 12);
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(data[4..8].try_into().unwrap()), 36 + 12);
        assert_eq!(u16::from_le_bytes(data[22..24].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(data[24..28].try_into().unwrap()), 48000);
        assert_eq!(u32::from_le_bytes(data[28..32].try_into().unwrap()), 192_000);
        assert_eq!(u16::from_le_bytes(data[32..34].try_into().unwrap()), 4);
        assert_eq!(u32::from_le_bytes(data[40..44].try_into().unwrap()), 12);
    }
}
