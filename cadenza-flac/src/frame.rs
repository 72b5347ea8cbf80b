// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cadenza_core::errors::{decode_error, invalid_state_error, Result};
use cadenza_core::io::{BitReader, BitWriter};

use log::warn;

/// The 14-bit frame header synchronization code.
const FRAME_SYNC: u32 = 0x3ffe;

/// The largest position expressible by the UTF-8-style coded integer (36 bits).
const MAX_POSITION: u64 = 0x000f_ffff_ffff;

/// Block length code table. Columns: decoded block length in samples, 4-bit code. Codes 0, 6,
/// and 7 are not tabulated: 0 is reserved and 6/7 carry the length in a trailing field.
const BLOCK_SIZE_CODES: &[(u32, u32)] = &[
    (192, 1),
    (576, 2),
    (1152, 3),
    (2304, 4),
    (4608, 5),
    (256, 8),
    (512, 9),
    (1024, 10),
    (2048, 11),
    (4096, 12),
    (8192, 13),
    (16384, 14),
    (32768, 15),
];

/// Sample rate code table. Columns: decoded rate in Hz, 4-bit code. Code 0 defers to the
/// stream information, codes 12 to 14 carry the rate in a trailing field, and code 15 is
/// reserved.
const SAMPLE_RATE_CODES: &[(u32, u32)] = &[
    (88200, 1),
    (176400, 2),
    (192000, 3),
    (8000, 4),
    (16000, 5),
    (22050, 6),
    (24000, 7),
    (32000, 8),
    (44100, 9),
    (48000, 10),
    (96000, 11),
];

/// Sample depth code table. Columns: decoded bits per sample, 3-bit code. Code 0 defers to the
/// stream information; codes 3 and 7 are reserved.
const SAMPLE_DEPTH_CODES: &[(u32, u32)] = &[(8, 1), (12, 2), (16, 4), (20, 5), (24, 6)];

/// Finds the decoded value for a code in one of the code tables.
fn search_value(table: &[(u32, u32)], code: u32) -> Option<u32> {
    table.iter().find(|entry| entry.1 == code).map(|entry| entry.0)
}

/// Finds the code for a decoded value in one of the code tables.
fn search_code(table: &[(u32, u32)], value: u32) -> Option<u32> {
    table.iter().find(|entry| entry.0 == value).map(|entry| entry.1)
}

/// `BlockSequence` describes how a frame states its position within the stream. Fixed
/// block-size streams sequence frames by an ordinal frame number, variable block-size streams
/// by the offset of the frame's first sample.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlockSequence {
    ByFrame(u32),
    BySample(u64),
}

/// `ChannelAssignment` describes the mapping between the subframes of a frame and the channels
/// those samples belong to, and thereby the decorrelation step the decoder must apply.
///
/// For LeftSide or RightSide assignments, one channel is stored independently while the other
/// stores a difference (always Left - Right). For MidSide, an average channel and a difference
/// channel are stored.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelAssignment {
    /// All channels are independently coded and no decorrelation step is required.
    Independent(u32),
    /// Channel 0 is the Left channel, and channel 1 is a Difference channel.
    LeftSide,
    /// Channel 0 is a Difference channel, and channel 1 is the Right channel.
    RightSide,
    /// Channel 0 is the Mid (average) channel, and channel 1 is a Difference channel.
    MidSide,
}

impl ChannelAssignment {
    /// The number of channels the assignment describes.
    pub fn num_channels(&self) -> u32 {
        match *self {
            ChannelAssignment::Independent(channels) => channels,
            _ => 2,
        }
    }

    fn from_code(code: u32) -> Result<ChannelAssignment> {
        match code {
            0x0..=0x7 => Ok(ChannelAssignment::Independent(code + 1)),
            0x8 => Ok(ChannelAssignment::LeftSide),
            0x9 => Ok(ChannelAssignment::RightSide),
            0xa => Ok(ChannelAssignment::MidSide),
            _ => decode_error("flac: channel assignment set to reserved value"),
        }
    }

    fn to_code(self) -> u32 {
        match self {
            ChannelAssignment::Independent(channels) => channels - 1,
            ChannelAssignment::LeftSide => 0x8,
            ChannelAssignment::RightSide => 0x9,
            ChannelAssignment::MidSide => 0xa,
        }
    }
}

/// `FrameHeader` is one decoded (or to-be-encoded) frame header.
///
/// Fields the header defers to the stream information block are `None`. The frame byte length
/// covers the whole frame from the sync code through the trailing CRC-16 and is only known
/// once the frame body has been walked, so parsing always leaves it `None`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FrameHeader {
    pub block_sequence: BlockSequence,
    pub channel_assignment: ChannelAssignment,
    /// The number of samples per channel in the frame, in [1, 65536].
    pub block_len: u32,
    /// The sample rate in Hz, if stated by the header.
    pub sample_rate: Option<u32>,
    /// The number of bits per sample, if stated by the header.
    pub bits_per_sample: Option<u32>,
    /// The total frame length in bytes, if known.
    pub frame_byte_len: Option<u32>,
}

impl FrameHeader {
    /// Reads one frame header starting at the reader's current (byte-aligned) position.
    /// Returns `None` if the stream ends cleanly before the first header byte.
    ///
    /// The reader's CRC spans are reset at entry; on success the trailing CRC-8 has been
    /// verified over the whole header.
    pub fn read(reader: &mut BitReader<'_>) -> Result<Option<FrameHeader>> {
        reader.reset_crcs()?;

        // The first byte doubles as the end-of-stream probe.
        let sync_hi = match reader.read_byte()? {
            Some(byte) => u32::from(byte),
            None => return Ok(None),
        };

        let sync = (sync_hi << 6) | reader.read_uint(6)?;

        if sync != FRAME_SYNC {
            return decode_error("flac: missing frame sync code");
        }

        if reader.read_uint(1)? != 0 {
            return decode_error("flac: frame header reserved bit is not set to mandatory value");
        }

        let blocking_strategy = reader.read_uint(1)?;
        let block_size_enc = reader.read_uint(4)?;
        let sample_rate_enc = reader.read_uint(4)?;

        let channel_assignment = ChannelAssignment::from_code(reader.read_uint(4)?)?;

        let bits_per_sample = match reader.read_uint(3)? {
            0 => None,
            code => match search_value(SAMPLE_DEPTH_CODES, code) {
                Some(depth) => Some(depth),
                None => return decode_error("flac: bits per sample set to reserved value"),
            },
        };

        if reader.read_uint(1)? != 0 {
            return decode_error("flac: frame header reserved bit is not set to mandatory value");
        }

        let position = read_utf8_u64(reader)?;

        let block_sequence = match blocking_strategy {
            // Fixed block-size streams sequence frames by an ordinal frame number. The coded
            // integer cannot enforce the 31-bit bound itself.
            0 => {
                if position > 0x7fff_ffff {
                    return decode_error("flac: frame sequence number exceeds 31 bits");
                }
                BlockSequence::ByFrame(position as u32)
            }
            // Variable block-size streams sequence frames by a sample offset.
            _ => {
                if position > MAX_POSITION {
                    return decode_error("flac: sample sequence number exceeds 36 bits");
                }
                BlockSequence::BySample(position)
            }
        };

        let block_len = match block_size_enc {
            0 => return decode_error("flac: block size set to reserved value"),
            6 => reader.read_uint(8)? + 1,
            7 => reader.read_uint(16)? + 1,
            code => match search_value(BLOCK_SIZE_CODES, code) {
                Some(len) => len,
                None => return decode_error("flac: block size set to reserved value"),
            },
        };

        let sample_rate = match sample_rate_enc {
            0 => None,
            12 => Some(reader.read_uint(8)?),
            13 => Some(reader.read_uint(16)?),
            14 => Some(reader.read_uint(16)? * 10),
            15 => return decode_error("flac: sample rate set to reserved value"),
            code => match search_value(SAMPLE_RATE_CODES, code) {
                Some(rate) => Some(rate),
                None => return decode_error("flac: sample rate set to reserved value"),
            },
        };

        if let Some(rate) = sample_rate {
            if rate < 1 || rate > 655_350 {
                return decode_error("flac: sample rate out of bounds");
            }
        }

        // The CRC-8 closes the header. Fetch the reader's computation before the expected
        // value itself passes through it.
        let crc8_computed = reader.crc8()?;
        let crc8_expected = reader.read_uint(8)?;

        if crc8_expected != u32::from(crc8_computed) {
            warn!(
                "frame header crc mismatch (expected {:#04x}, computed {:#04x})",
                crc8_expected, crc8_computed
            );
            return decode_error("flac: computed frame header CRC does not match expected CRC");
        }

        Ok(Some(FrameHeader {
            block_sequence,
            channel_assignment,
            block_len,
            sample_rate,
            bits_per_sample,
            frame_byte_len: None,
        }))
    }

    /// Writes the frame header, including its trailing CRC-8.
    ///
    /// Encoded streams always use the variable block-size strategy, so the header must be
    /// sequenced by sample offset; a frame-sequenced header is rejected.
    pub fn write(&self, writer: &mut BitWriter<'_>) -> Result<()> {
        let sample_offset = match self.block_sequence {
            BlockSequence::BySample(offset) => offset,
            BlockSequence::ByFrame(_) => {
                return invalid_state_error("flac: frame header must be sequenced by sample");
            }
        };

        if sample_offset > MAX_POSITION {
            return invalid_state_error("flac: sample offset exceeds 36 bits");
        }

        let (block_size_code, block_size_tail) = select_block_size_code(self.block_len)?;
        let (sample_rate_code, sample_rate_tail) = select_sample_rate_code(self.sample_rate);

        let depth_code = match self.bits_per_sample {
            Some(depth) => search_code(SAMPLE_DEPTH_CODES, depth).unwrap_or(0),
            None => 0,
        };

        writer.reset_crcs()?;

        writer.write_int(14, FRAME_SYNC)?;
        writer.write_int(1, 0)?;
        // Variable block-size strategy, always.
        writer.write_int(1, 1)?;
        writer.write_int(4, block_size_code)?;
        writer.write_int(4, sample_rate_code)?;
        writer.write_int(4, self.channel_assignment.to_code())?;
        writer.write_int(3, depth_code)?;
        writer.write_int(1, 0)?;

        write_utf8_u64(writer, sample_offset)?;

        if let Some((width, value)) = block_size_tail {
            writer.write_int(width, value)?;
        }

        if let Some((width, value)) = sample_rate_tail {
            writer.write_int(width, value)?;
        }

        let crc8 = writer.crc8()?;
        writer.write_int(8, u32::from(crc8))?;

        Ok(())
    }
}

/// Selects the 4-bit block length code and, for the untabulated lengths, the trailing field
/// (width, value) that carries the length explicitly.
fn select_block_size_code(block_len: u32) -> Result<(u32, Option<(u32, u32)>)> {
    if block_len < 1 || block_len > 65536 {
        return invalid_state_error("flac: frame block length out of range");
    }

    if let Some(code) = search_code(BLOCK_SIZE_CODES, block_len) {
        Ok((code, None))
    }
    else if block_len <= 256 {
        Ok((6, Some((8, block_len - 1))))
    }
    else {
        Ok((7, Some((16, block_len - 1))))
    }
}

/// Selects the 4-bit sample rate code and, for the untabulated rates, the trailing field
/// (width, value) that carries the rate explicitly. Rates that no code can express collapse to
/// code 0, deferring to the stream information.
fn select_sample_rate_code(sample_rate: Option<u32>) -> (u32, Option<(u32, u32)>) {
    let rate = match sample_rate {
        Some(rate) => rate,
        None => return (0, None),
    };

    if let Some(code) = search_code(SAMPLE_RATE_CODES, rate) {
        (code, None)
    }
    else if rate < 256 {
        (12, Some((8, rate)))
    }
    else if rate < 65536 {
        (13, Some((16, rate)))
    }
    else if rate < 655360 && rate % 10 == 0 {
        (14, Some((16, rate / 10)))
    }
    else {
        (0, None)
    }
}

/// Decodes a big-endian unsigned integer encoded via extended UTF-8. In this context, extended
/// UTF-8 simply means the encoded value may occupy up to 7 bytes for a maximum integer width
/// of 36 bits.
pub(crate) fn read_utf8_u64(reader: &mut BitReader<'_>) -> Result<u64> {
    let head = reader.read_uint(8)?;

    // The count of leading one bits in the head byte selects the sequence length, and the
    // mask recovers the value bits it carries. A bare continuation byte (a single leading one)
    // and an all-ones head byte are not valid sequence heads.
    let (mask, n_tail) = match head {
        0x00..=0x7f => return Ok(u64::from(head)),
        0xc0..=0xdf => (0x1f, 1),
        0xe0..=0xef => (0x0f, 2),
        0xf0..=0xf7 => (0x07, 3),
        0xf8..=0xfb => (0x03, 4),
        0xfc..=0xfd => (0x01, 5),
        0xfe => (0x00, 6),
        _ => return decode_error("flac: invalid utf8-coded position"),
    };

    let mut value = u64::from(head & mask);

    // Each continuation byte is prefixed 0b10 and contributes its low six bits.
    for _ in 0..n_tail {
        let byte = reader.read_uint(8)?;

        if byte & 0xc0 != 0x80 {
            return decode_error("flac: invalid utf8-coded position continuation");
        }

        value = (value << 6) | u64::from(byte & 0x3f);
    }

    Ok(value)
}

/// Encodes a value of at most 36 bits as an extended UTF-8 integer of up to 7 bytes.
pub(crate) fn write_utf8_u64(writer: &mut BitWriter<'_>, value: u64) -> Result<()> {
    debug_assert!(value <= MAX_POSITION);

    let bit_len = u64::BITS - value.leading_zeros();

    if bit_len <= 7 {
        return writer.write_int(8, value as u32);
    }

    // Each continuation byte carries six value bits; the head byte carries the rest under a
    // prefix of (n_tail + 1) one bits and a zero bit.
    let n_tail = (bit_len - 2) / 5;

    let head = u32::from((0xff80u32 >> n_tail) as u8) | ((value >> (n_tail * 6)) as u32);
    writer.write_int(8, head)?;

    for i in (0..n_tail).rev() {
        writer.write_int(8, 0x80 | (((value >> (i * 6)) as u32) & 0x3f))?;
    }

    Ok(())
}
