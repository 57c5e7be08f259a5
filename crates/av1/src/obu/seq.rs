//! Sequence header OBU parsing.
//! AV1-Spec-2 - 5.5

use std::io;

use bytes_util::BitReader;

use super::ObuHeader;
use super::utils::read_uvlc;
use crate::error::{Av1Error, Result};

/// `CP_BT_709`
pub const CP_BT_709: u8 = 1;
/// `CP_UNSPECIFIED`
pub const CP_UNSPECIFIED: u8 = 2;
/// `TC_UNSPECIFIED`
pub const TC_UNSPECIFIED: u8 = 2;
/// `TC_SRGB`
pub const TC_SRGB: u8 = 13;
/// `MC_IDENTITY`
pub const MC_IDENTITY: u8 = 0;
/// `MC_UNSPECIFIED`
pub const MC_UNSPECIFIED: u8 = 2;

/// Tri-state used by `seq_force_screen_content_tools` and `seq_force_integer_mv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqForce {
    /// Forced off.
    Off,
    /// Forced on.
    On,
    /// Decided per frame (`SELECT_SCREEN_CONTENT_TOOLS` / `SELECT_INTEGER_MV`).
    Select,
}

/// Sequence Header OBU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceHeaderObu {
    /// The OBU header that introduced this sequence header.
    pub header: ObuHeader,
    /// `seq_profile`
    pub seq_profile: u8,
    /// `still_picture`
    pub still_picture: bool,
    /// `reduced_still_picture_header`
    pub reduced_still_picture_header: bool,
    /// `timing_info()` when `timing_info_present_flag` is set
    pub timing_info: Option<TimingInfo>,
    /// `decoder_model_info()` when `decoder_model_info_present_flag` is set
    pub decoder_model_info: Option<DecoderModelInfo>,
    /// One entry per operating point.
    pub operating_points: Vec<OperatingPoint>,
    /// `frame_width_bits_minus_1 + 1`
    pub frame_width_bits: u8,
    /// `frame_height_bits_minus_1 + 1`
    pub frame_height_bits: u8,
    /// `max_frame_width_minus_1 + 1`
    pub max_frame_width: u64,
    /// `max_frame_height_minus_1 + 1`
    pub max_frame_height: u64,
    /// `frame_id_numbers_present_flag`
    pub frame_id_numbers_present: bool,
    /// `use_128x128_superblock`
    pub use_128x128_superblock: bool,
    /// `seq_force_screen_content_tools`
    pub seq_force_screen_content_tools: SeqForce,
    /// `seq_force_integer_mv`
    pub seq_force_integer_mv: SeqForce,
    /// `OrderHintBits`
    pub order_hint_bits: u8,
    /// `color_config()`
    pub color_config: ColorConfig,
    /// `film_grain_params_present`
    pub film_grain_params_present: bool,
}

/// `timing_info()`
/// AV1-Spec-2 - 5.5.3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingInfo {
    /// `num_units_in_display_tick`
    pub num_units_in_display_tick: u32,
    /// `time_scale`
    pub time_scale: u32,
    /// `num_ticks_per_picture_minus_1 + 1` when `equal_picture_interval` is set
    pub num_ticks_per_picture: Option<u64>,
}

/// `decoder_model_info()`
/// AV1-Spec-2 - 5.5.4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderModelInfo {
    /// `buffer_delay_length_minus_1 + 1`
    pub buffer_delay_length: u8,
    /// `num_units_in_decoding_tick`
    pub num_units_in_decoding_tick: u32,
    /// `buffer_removal_time_length_minus_1 + 1`
    pub buffer_removal_time_length: u8,
    /// `frame_presentation_time_length_minus_1 + 1`
    pub frame_presentation_time_length: u8,
}

/// Per operating point parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingPoint {
    /// `operating_point_idc`
    pub idc: u16,
    /// `seq_level_idx`
    pub seq_level_idx: u8,
    /// `seq_tier`
    pub seq_tier: bool,
    /// `operating_parameters_info()` when `decoder_model_present_for_this_op` is set
    pub parameters: Option<OperatingParameters>,
    /// `initial_display_delay_minus_1 + 1`, if present for this operating point
    pub initial_display_delay: Option<u8>,
}

/// `operating_parameters_info()`
/// AV1-Spec-2 - 5.5.5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingParameters {
    /// `decoder_buffer_delay`
    pub decoder_buffer_delay: u64,
    /// `encoder_buffer_delay`
    pub encoder_buffer_delay: u64,
    /// `low_delay_mode_flag`
    pub low_delay_mode: bool,
}

/// `color_config()`
/// AV1-Spec-2 - 5.5.2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorConfig {
    /// `BitDepth`
    pub bit_depth: u8,
    /// `mono_chrome`
    pub mono_chrome: bool,
    /// `color_primaries`
    pub color_primaries: u8,
    /// `transfer_characteristics`
    pub transfer_characteristics: u8,
    /// `matrix_coefficients`
    pub matrix_coefficients: u8,
    /// `color_range`
    pub full_color_range: bool,
    /// `subsampling_x`
    pub subsampling_x: bool,
    /// `subsampling_y`
    pub subsampling_y: bool,
    /// `chroma_sample_position`
    pub chroma_sample_position: u8,
    /// `separate_uv_delta_q`
    pub separate_uv_delta_q: bool,
}

impl SequenceHeaderObu {
    /// Parses the sequence header payload that follows `header` in `reader`.
    pub fn parse(header: ObuHeader, reader: &mut impl io::Read) -> Result<Self> {
        let mut bit_reader = BitReader::new(reader);

        let seq_profile = bit_reader.read_bits(3)? as u8;
        if seq_profile > 2 {
            return Err(Av1Error::InvalidStructure(format!(
                "unsupported seq_profile {seq_profile}"
            )));
        }

        let still_picture = bit_reader.read_bit()?;
        let reduced_still_picture_header = bit_reader.read_bit()?;

        let mut timing_info = None;
        let mut decoder_model_info = None;
        let mut operating_points = Vec::new();

        if reduced_still_picture_header {
            operating_points.push(OperatingPoint {
                idc: 0,
                seq_level_idx: bit_reader.read_bits(5)? as u8,
                seq_tier: false,
                parameters: None,
                initial_display_delay: None,
            });
        } else {
            if bit_reader.read_bit()? {
                timing_info = Some(parse_timing_info(&mut bit_reader)?);
                if bit_reader.read_bit()? {
                    decoder_model_info = Some(parse_decoder_model_info(&mut bit_reader)?);
                }
            }

            let initial_display_delay_present = bit_reader.read_bit()?;
            let operating_points_cnt = bit_reader.read_bits(5)? as usize + 1;

            for _ in 0..operating_points_cnt {
                let idc = bit_reader.read_bits(12)? as u16;
                let seq_level_idx = bit_reader.read_bits(5)? as u8;
                let seq_tier = seq_level_idx > 7 && bit_reader.read_bit()?;

                let parameters = match &decoder_model_info {
                    Some(info) if bit_reader.read_bit()? => {
                        Some(parse_operating_parameters_info(&mut bit_reader, info)?)
                    }
                    _ => None,
                };

                let initial_display_delay =
                    if initial_display_delay_present && bit_reader.read_bit()? {
                        Some(bit_reader.read_bits(4)? as u8 + 1)
                    } else {
                        None
                    };

                operating_points.push(OperatingPoint {
                    idc,
                    seq_level_idx,
                    seq_tier,
                    parameters,
                    initial_display_delay,
                });
            }
        }

        let frame_width_bits = bit_reader.read_bits(4)? as u8 + 1;
        let frame_height_bits = bit_reader.read_bits(4)? as u8 + 1;
        let max_frame_width = bit_reader.read_bits(frame_width_bits)? + 1;
        let max_frame_height = bit_reader.read_bits(frame_height_bits)? + 1;

        let frame_id_numbers_present = !reduced_still_picture_header && bit_reader.read_bit()?;
        if frame_id_numbers_present {
            bit_reader.seek_bits(4)?; // delta_frame_id_length_minus_2
            bit_reader.seek_bits(3)?; // additional_frame_id_length_minus_1
        }

        let use_128x128_superblock = bit_reader.read_bit()?;
        bit_reader.seek_bits(1)?; // enable_filter_intra
        bit_reader.seek_bits(1)?; // enable_intra_edge_filter

        let mut seq_force_screen_content_tools = SeqForce::Select;
        let mut seq_force_integer_mv = SeqForce::Select;
        let mut order_hint_bits = 0;

        if !reduced_still_picture_header {
            // enable_interintra_compound, enable_masked_compound,
            // enable_warped_motion, enable_dual_filter
            bit_reader.seek_bits(4)?;

            let enable_order_hint = bit_reader.read_bit()?;
            if enable_order_hint {
                bit_reader.seek_bits(2)?; // enable_jnt_comp, enable_ref_frame_mvs
            }

            seq_force_screen_content_tools = read_seq_force(&mut bit_reader)?;
            seq_force_integer_mv = if seq_force_screen_content_tools != SeqForce::Off {
                read_seq_force(&mut bit_reader)?
            } else {
                SeqForce::Select
            };

            if enable_order_hint {
                order_hint_bits = bit_reader.read_bits(3)? as u8 + 1;
            }
        }

        bit_reader.seek_bits(3)?; // enable_superres, enable_cdef, enable_restoration

        let color_config = parse_color_config(&mut bit_reader, seq_profile)?;
        let film_grain_params_present = bit_reader.read_bit()?;

        Ok(SequenceHeaderObu {
            header,
            seq_profile,
            still_picture,
            reduced_still_picture_header,
            timing_info,
            decoder_model_info,
            operating_points,
            frame_width_bits,
            frame_height_bits,
            max_frame_width,
            max_frame_height,
            frame_id_numbers_present,
            use_128x128_superblock,
            seq_force_screen_content_tools,
            seq_force_integer_mv,
            order_hint_bits,
            color_config,
            film_grain_params_present,
        })
    }
}

/// `seq_choose_*` followed by `seq_force_*` when not choosing.
fn read_seq_force<T: io::Read>(bit_reader: &mut BitReader<T>) -> Result<SeqForce> {
    if bit_reader.read_bit()? {
        return Ok(SeqForce::Select);
    }

    Ok(if bit_reader.read_bit()? {
        SeqForce::On
    } else {
        SeqForce::Off
    })
}

fn parse_timing_info<T: io::Read>(bit_reader: &mut BitReader<T>) -> Result<TimingInfo> {
    let num_units_in_display_tick = bit_reader.read_bits(32)? as u32;
    let time_scale = bit_reader.read_bits(32)? as u32;
    let num_ticks_per_picture = if bit_reader.read_bit()? {
        Some(read_uvlc(bit_reader)? + 1)
    } else {
        None
    };

    Ok(TimingInfo {
        num_units_in_display_tick,
        time_scale,
        num_ticks_per_picture,
    })
}

fn parse_decoder_model_info<T: io::Read>(
    bit_reader: &mut BitReader<T>,
) -> Result<DecoderModelInfo> {
    Ok(DecoderModelInfo {
        buffer_delay_length: bit_reader.read_bits(5)? as u8 + 1,
        num_units_in_decoding_tick: bit_reader.read_bits(32)? as u32,
        buffer_removal_time_length: bit_reader.read_bits(5)? as u8 + 1,
        frame_presentation_time_length: bit_reader.read_bits(5)? as u8 + 1,
    })
}

fn parse_operating_parameters_info<T: io::Read>(
    bit_reader: &mut BitReader<T>,
    info: &DecoderModelInfo,
) -> Result<OperatingParameters> {
    let n = info.buffer_delay_length;
    Ok(OperatingParameters {
        decoder_buffer_delay: bit_reader.read_bits(n)?,
        encoder_buffer_delay: bit_reader.read_bits(n)?,
        low_delay_mode: bit_reader.read_bit()?,
    })
}

fn parse_color_config<T: io::Read>(
    bit_reader: &mut BitReader<T>,
    seq_profile: u8,
) -> Result<ColorConfig> {
    let high_bitdepth = bit_reader.read_bit()?;
    let bit_depth = match (seq_profile, high_bitdepth) {
        (2, true) => {
            if bit_reader.read_bit()? {
                12
            } else {
                10
            }
        }
        (_, true) => 10,
        (_, false) => 8,
    };

    let mono_chrome = seq_profile != 1 && bit_reader.read_bit()?;

    let (color_primaries, transfer_characteristics, matrix_coefficients) =
        if bit_reader.read_bit()? {
            (
                bit_reader.read_bits(8)? as u8,
                bit_reader.read_bits(8)? as u8,
                bit_reader.read_bits(8)? as u8,
            )
        } else {
            let matrix = if mono_chrome { MC_IDENTITY } else { MC_UNSPECIFIED };
            (CP_UNSPECIFIED, TC_UNSPECIFIED, matrix)
        };

    let mut config = ColorConfig {
        bit_depth,
        mono_chrome,
        color_primaries,
        transfer_characteristics,
        matrix_coefficients,
        full_color_range: false,
        subsampling_x: true,
        subsampling_y: true,
        chroma_sample_position: 0,
        separate_uv_delta_q: false,
    };

    if mono_chrome {
        config.full_color_range = bit_reader.read_bit()?;
        return Ok(config);
    }

    if color_primaries == CP_BT_709
        && transfer_characteristics == TC_SRGB
        && matrix_coefficients == MC_IDENTITY
    {
        config.full_color_range = true;
        config.subsampling_x = false;
        config.subsampling_y = false;
    } else {
        config.full_color_range = bit_reader.read_bit()?;
        match seq_profile {
            0 => {}
            1 => {
                config.subsampling_x = false;
                config.subsampling_y = false;
            }
            _ if bit_depth == 12 => {
                config.subsampling_x = bit_reader.read_bit()?;
                config.subsampling_y = config.subsampling_x && bit_reader.read_bit()?;
            }
            _ => {
                config.subsampling_y = false;
            }
        }

        if config.subsampling_x && config.subsampling_y {
            config.chroma_sample_position = bit_reader.read_bits(2)? as u8;
        }
    }

    config.separate_uv_delta_q = bit_reader.read_bit()?;

    Ok(config)
}

#[cfg(test)]
#[cfg_attr(all(coverage_nightly, test), coverage(off))]
mod tests {
    use bytes_util::BitWriter;

    use super::*;
    use crate::ObuType;

    const SEQ_HEADER: &[u8] = b"\n\x0f\0\0\0j\xef\xbf\xe1\xbc\x02\x19\x90\x10\x10\x10@";

    #[test]
    fn test_seq_header_parse() {
        let mut cursor = io::Cursor::new(SEQ_HEADER);
        let header = ObuHeader::parse(&mut cursor).unwrap();
        let seq = SequenceHeaderObu::parse(header, &mut cursor).unwrap();

        assert_eq!(seq.header.obu_type, ObuType::SequenceHeader);
        assert_eq!(seq.seq_profile, 0);
        assert!(!seq.still_picture);
        assert!(!seq.reduced_still_picture_header);
        assert!(seq.timing_info.is_none());
        assert_eq!(seq.operating_points.len(), 1);
        assert_eq!(seq.operating_points[0].seq_level_idx, 13);
        assert_eq!(seq.max_frame_width, 3840);
        assert_eq!(seq.max_frame_height, 2160);
        assert_eq!(seq.frame_width_bits, 12);
        assert_eq!(seq.seq_force_screen_content_tools, SeqForce::Off);
        assert_eq!(seq.seq_force_integer_mv, SeqForce::Select);
        assert_eq!(seq.order_hint_bits, 7);
        assert!(!seq.film_grain_params_present);

        insta::assert_debug_snapshot!(seq.color_config, @r"
        ColorConfig {
            bit_depth: 8,
            mono_chrome: false,
            color_primaries: 1,
            transfer_characteristics: 1,
            matrix_coefficients: 1,
            full_color_range: false,
            subsampling_x: true,
            subsampling_y: true,
            chroma_sample_position: 0,
            separate_uv_delta_q: false,
        }
        ");
    }

    /// Builds a reduced still picture header for a monochrome stream without
    /// a color description.
    fn reduced_mono_header(width: u64, height: u64) -> Vec<u8> {
        let mut writer = BitWriter::new(Vec::new());
        writer.write_bits(0, 3).unwrap(); // seq_profile
        writer.write_bit(true).unwrap(); // still_picture
        writer.write_bit(true).unwrap(); // reduced_still_picture_header
        writer.write_bits(4, 5).unwrap(); // seq_level_idx[0]
        writer.write_bits(15, 4).unwrap(); // frame_width_bits_minus_1
        writer.write_bits(15, 4).unwrap(); // frame_height_bits_minus_1
        writer.write_bits(width - 1, 16).unwrap();
        writer.write_bits(height - 1, 16).unwrap();
        writer.write_bit(false).unwrap(); // use_128x128_superblock
        writer.write_bits(0, 2).unwrap(); // enable_filter_intra, enable_intra_edge_filter
        writer.write_bits(0, 3).unwrap(); // enable_superres, enable_cdef, enable_restoration
        writer.write_bit(false).unwrap(); // high_bitdepth
        writer.write_bit(true).unwrap(); // mono_chrome
        writer.write_bit(false).unwrap(); // color_description_present_flag
        writer.write_bit(true).unwrap(); // color_range
        writer.write_bit(false).unwrap(); // film_grain_params_present
        writer.finish().unwrap()
    }

    #[test]
    fn test_reduced_still_picture_monochrome_defaults() {
        let payload = reduced_mono_header(640, 480);
        let header = ObuHeader {
            obu_type: ObuType::SequenceHeader,
            size: Some(payload.len() as u64),
            extension_header: None,
        };

        let seq = SequenceHeaderObu::parse(header, &mut payload.as_slice()).unwrap();
        assert!(seq.reduced_still_picture_header);
        assert_eq!(seq.max_frame_width, 640);
        assert_eq!(seq.max_frame_height, 480);
        assert_eq!(seq.seq_force_screen_content_tools, SeqForce::Select);
        assert!(seq.color_config.mono_chrome);
        assert!(seq.color_config.full_color_range);
        assert_eq!(seq.color_config.color_primaries, CP_UNSPECIFIED);
        assert_eq!(seq.color_config.transfer_characteristics, TC_UNSPECIFIED);
        assert_eq!(seq.color_config.matrix_coefficients, MC_IDENTITY);
    }

    #[test]
    fn test_truncated_seq_header() {
        let header = ObuHeader {
            obu_type: ObuType::SequenceHeader,
            size: Some(15),
            extension_header: None,
        };
        let err = SequenceHeaderObu::parse(header, &mut &SEQ_HEADER[2..6]).unwrap_err();
        assert!(matches!(err, Av1Error::BufferExhausted));
    }
}
