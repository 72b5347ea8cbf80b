// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cadenza_core::errors::{decode_error, invalid_state_error, Result};
use cadenza_core::io::{BitReader, BitWriter};

use crate::frame::FrameHeader;

/// The byte length of a STREAMINFO block payload.
const STREAM_INFO_BLOCK_LEN: u32 = 34;

/// The byte length of one seek point on the wire.
const SEEK_POINT_LEN: u32 = 18;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetadataBlockType {
    StreamInfo,
    Padding,
    Application,
    SeekTable,
    VorbisComment,
    Cuesheet,
    Picture,
    Unknown(u8),
}

impl MetadataBlockType {
    fn from_code(code: u32) -> MetadataBlockType {
        match code {
            0 => MetadataBlockType::StreamInfo,
            1 => MetadataBlockType::Padding,
            2 => MetadataBlockType::Application,
            3 => MetadataBlockType::SeekTable,
            4 => MetadataBlockType::VorbisComment,
            5 => MetadataBlockType::Cuesheet,
            6 => MetadataBlockType::Picture,
            _ => MetadataBlockType::Unknown(code as u8),
        }
    }

    fn to_code(self) -> u32 {
        match self {
            MetadataBlockType::StreamInfo => 0,
            MetadataBlockType::Padding => 1,
            MetadataBlockType::Application => 2,
            MetadataBlockType::SeekTable => 3,
            MetadataBlockType::VorbisComment => 4,
            MetadataBlockType::Cuesheet => 5,
            MetadataBlockType::Picture => 6,
            MetadataBlockType::Unknown(code) => u32::from(code),
        }
    }
}

/// A metadata block header: the last-block flag, the block type, and the payload length.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MetadataBlockHeader {
    pub is_last: bool,
    pub block_type: MetadataBlockType,
    pub block_len: u32,
}

impl MetadataBlockHeader {
    /// Reads a metadata block header.
    pub fn read(reader: &mut BitReader<'_>) -> Result<MetadataBlockHeader> {
        let is_last = reader.read_uint(1)? == 1;
        let block_type = MetadataBlockType::from_code(reader.read_uint(7)?);
        let block_len = reader.read_uint(24)?;

        Ok(MetadataBlockHeader { is_last, block_type, block_len })
    }

    /// Writes a metadata block header.
    pub fn write(&self, writer: &mut BitWriter<'_>) -> Result<()> {
        writer.write_int(1, u32::from(self.is_last))?;
        writer.write_int(7, self.block_type.to_code())?;
        writer.write_int(24, self.block_len)?;
        Ok(())
    }
}

/// `StreamInfo` is the decoded (or to-be-encoded) STREAMINFO block: the global description of
/// the audio stream.
///
/// A default-constructed value is blank: every range-checked field starts outside its valid
/// range and must be filled in before serialization.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StreamInfo {
    /// The minimum and maximum number of decoded samples per block of audio.
    pub block_len_min: u16,
    pub block_len_max: u16,
    /// The minimum and maximum byte length of an encoded block (frame) of audio. Either value
    /// may be 0 if unknown.
    pub frame_byte_len_min: u32,
    pub frame_byte_len_max: u32,
    /// The sample rate in Hz.
    pub sample_rate: u32,
    /// The number of audio channels, 1 to 8.
    pub channels: u32,
    /// The number of bits per sample of the stream, 4 to 32.
    pub bits_per_sample: u32,
    /// The total number of samples per channel in the stream, if known.
    pub n_samples: Option<u64>,
    /// The MD5 hash of the decoded audio, if computed.
    pub md5: Option<[u8; 16]>,
}

impl StreamInfo {
    /// Reads a STREAMINFO block payload.
    pub fn read(reader: &mut BitReader<'_>) -> Result<StreamInfo> {
        let mut info = StreamInfo {
            block_len_min: 0,
            block_len_max: 0,
            frame_byte_len_min: 0,
            frame_byte_len_max: 0,
            sample_rate: 0,
            channels: 0,
            bits_per_sample: 0,
            n_samples: None,
            md5: None,
        };

        // Read the block length bounds in number of samples.
        info.block_len_min = reader.read_uint(16)? as u16;
        info.block_len_max = reader.read_uint(16)? as u16;

        // Validate the block length bounds are in the range [16, 65535] samples.
        if info.block_len_min < 16 {
            return decode_error("flac: minimum block length is 16 samples");
        }

        // Validate the maximum block length is greater than or equal to the minimum block
        // length.
        if info.block_len_max < info.block_len_min {
            return decode_error("flac: maximum block length is less than the minimum block length");
        }

        // Read the frame byte length bounds.
        info.frame_byte_len_min = reader.read_uint(24)?;
        info.frame_byte_len_max = reader.read_uint(24)?;

        // Validate the maximum frame byte length is greater than or equal to the minimum frame
        // byte length if both are known. A value of 0 for either indicates the respective byte
        // length is unknown.
        if info.frame_byte_len_min > 0
            && info.frame_byte_len_max > 0
            && info.frame_byte_len_max < info.frame_byte_len_min
        {
            return decode_error("flac: maximum frame length is less than the minimum frame length");
        }

        // Read sample rate, valid rates are [1, 655350] Hz.
        info.sample_rate = reader.read_uint(20)?;

        if info.sample_rate < 1 || info.sample_rate > 655_350 {
            return decode_error("flac: stream sample rate out of bounds");
        }

        // Read number of channels minus 1. Valid number of channels are 1-8.
        info.channels = reader.read_uint(3)? + 1;

        // Read bits per sample minus 1. Valid number of bits per sample are 4-32.
        info.bits_per_sample = reader.read_uint(5)? + 1;

        // Read the total number of samples as two 18-bit halves, high half first. A value of 0
        // indicates a stream of unknown length.
        let n_samples = (u64::from(reader.read_uint(18)?) << 18) | u64::from(reader.read_uint(18)?);

        info.n_samples = match n_samples {
            0 => None,
            n_samples => Some(n_samples),
        };

        // Read the decoded audio data MD5. If the MD5 buffer is zeroed then no checksum is
        // present.
        let mut md5 = [0; 16];
        reader.read_buf_exact(&mut md5)?;

        if md5 != [0; 16] {
            info.md5 = Some(md5);
        }

        Ok(info)
    }

    /// Writes the STREAMINFO block, including its metadata block header. Fails with
    /// `InvalidState` if any field is outside its valid range.
    pub fn write(&self, writer: &mut BitWriter<'_>, is_last: bool) -> Result<()> {
        self.check_values()?;

        let header = MetadataBlockHeader {
            is_last,
            block_type: MetadataBlockType::StreamInfo,
            block_len: STREAM_INFO_BLOCK_LEN,
        };

        header.write(writer)?;

        writer.write_int(16, u32::from(self.block_len_min))?;
        writer.write_int(16, u32::from(self.block_len_max))?;
        writer.write_int(24, self.frame_byte_len_min)?;
        writer.write_int(24, self.frame_byte_len_max)?;
        writer.write_int(20, self.sample_rate)?;
        writer.write_int(3, self.channels - 1)?;
        writer.write_int(5, self.bits_per_sample - 1)?;

        let n_samples = self.n_samples.unwrap_or(0);
        writer.write_int(18, (n_samples >> 18) as u32)?;
        writer.write_int(18, (n_samples as u32) & 0x3_ffff)?;

        for byte in self.md5.unwrap_or([0; 16]) {
            writer.write_int(8, u32::from(byte))?;
        }

        Ok(())
    }

    /// Checks that every field is within the range its wire encoding can carry.
    pub fn check_values(&self) -> Result<()> {
        if self.block_len_min < 16 {
            return invalid_state_error("flac: minimum block length is below 16 samples");
        }

        if self.block_len_max < self.block_len_min {
            return invalid_state_error("flac: maximum block length is below the minimum");
        }

        if self.frame_byte_len_min > 0xff_ffff || self.frame_byte_len_max > 0xff_ffff {
            return invalid_state_error("flac: frame byte length exceeds 24 bits");
        }

        if self.frame_byte_len_min > 0
            && self.frame_byte_len_max > 0
            && self.frame_byte_len_max < self.frame_byte_len_min
        {
            return invalid_state_error("flac: maximum frame byte length is below the minimum");
        }

        if self.sample_rate < 1 || self.sample_rate > 655_350 {
            return invalid_state_error("flac: sample rate out of bounds");
        }

        if self.channels < 1 || self.channels > 8 {
            return invalid_state_error("flac: channel count out of bounds");
        }

        if self.bits_per_sample < 4 || self.bits_per_sample > 32 {
            return invalid_state_error("flac: bits per sample out of bounds");
        }

        if let Some(n_samples) = self.n_samples {
            if n_samples > 0x000f_ffff_ffff {
                return invalid_state_error("flac: sample count exceeds 36 bits");
            }
        }

        Ok(())
    }

    /// Checks a frame header against the stream description.
    pub fn check_frame(&self, frame: &FrameHeader) -> Result<()> {
        if frame.channel_assignment.num_channels() != self.channels {
            return decode_error("flac: frame channel count does not match the stream");
        }

        if let Some(sample_rate) = frame.sample_rate {
            if sample_rate != self.sample_rate {
                return decode_error("flac: frame sample rate does not match the stream");
            }
        }

        if let Some(bits_per_sample) = frame.bits_per_sample {
            if bits_per_sample != self.bits_per_sample {
                return decode_error("flac: frame bits per sample does not match the stream");
            }
        }

        if frame.block_len > u32::from(self.block_len_max) {
            return decode_error("flac: frame block length exceeds the stream maximum");
        }

        if let Some(frame_byte_len) = frame.frame_byte_len {
            if self.frame_byte_len_min > 0 && frame_byte_len < self.frame_byte_len_min {
                return decode_error("flac: frame byte length is below the stream minimum");
            }

            if self.frame_byte_len_max > 0 && frame_byte_len > self.frame_byte_len_max {
                return decode_error("flac: frame byte length exceeds the stream maximum");
            }
        }

        if let Some(n_samples) = self.n_samples {
            if u64::from(frame.block_len) > n_samples {
                return decode_error("flac: frame block length exceeds the stream sample count");
            }
        }

        Ok(())
    }
}

/// One entry of a SEEKTABLE block.
///
/// A point whose sample offset is the all-ones sentinel is a placeholder; its file offset and
/// frame sample count carry no meaning.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SeekPoint {
    /// The offset, in samples, of the first sample of the target frame.
    pub sample_offset: u64,
    /// The offset, in bytes, of the target frame from the first frame.
    pub file_offset: u64,
    /// The number of samples per channel in the target frame.
    pub frame_samples: u16,
}

impl SeekPoint {
    /// The sample offset marking a placeholder point.
    pub const PLACEHOLDER_SAMPLE_OFFSET: u64 = u64::MAX;

    /// Returns if this point is a placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.sample_offset == SeekPoint::PLACEHOLDER_SAMPLE_OFFSET
    }
}

/// `SeekTable` is the decoded (or to-be-encoded) SEEKTABLE block: an ordered list of seek
/// points.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SeekTable {
    pub points: Vec<SeekPoint>,
}

impl SeekTable {
    /// The most seek points a 24-bit metadata block length can carry.
    pub const MAX_POINTS: usize = (0xff_ffff / SEEK_POINT_LEN) as usize;

    /// Reads a SEEKTABLE block payload of `block_len` bytes.
    ///
    /// Parsing does not enforce the ordering invariants; `check_values` does.
    pub fn read(reader: &mut BitReader<'_>, block_len: u32) -> Result<SeekTable> {
        if block_len % SEEK_POINT_LEN != 0 {
            return decode_error("flac: seek table length is not a multiple of the point length");
        }

        let count = block_len / SEEK_POINT_LEN;

        let mut points = Vec::with_capacity(count as usize);

        for _ in 0..count {
            let sample_offset =
                (u64::from(reader.read_uint(32)?) << 32) | u64::from(reader.read_uint(32)?);
            let file_offset =
                (u64::from(reader.read_uint(32)?) << 32) | u64::from(reader.read_uint(32)?);
            let frame_samples = reader.read_uint(16)? as u16;

            points.push(SeekPoint { sample_offset, file_offset, frame_samples });
        }

        Ok(SeekTable { points })
    }

    /// Writes the SEEKTABLE block, including its metadata block header.
    pub fn write(&self, writer: &mut BitWriter<'_>, is_last: bool) -> Result<()> {
        self.check_values()?;

        if self.points.len() > SeekTable::MAX_POINTS {
            return invalid_state_error("flac: too many seek points for one metadata block");
        }

        let header = MetadataBlockHeader {
            is_last,
            block_type: MetadataBlockType::SeekTable,
            block_len: SEEK_POINT_LEN * self.points.len() as u32,
        };

        header.write(writer)?;

        for point in &self.points {
            writer.write_int(32, (point.sample_offset >> 32) as u32)?;
            writer.write_int(32, point.sample_offset as u32)?;
            writer.write_int(32, (point.file_offset >> 32) as u32)?;
            writer.write_int(32, point.file_offset as u32)?;
            writer.write_int(16, u32::from(point.frame_samples))?;
        }

        Ok(())
    }

    /// Checks the table ordering invariants: placeholders, if any, form a suffix; among the
    /// real points, sample offsets strictly increase and file offsets never decrease.
    pub fn check_values(&self) -> Result<()> {
        let mut prev: Option<&SeekPoint> = None;
        let mut in_placeholders = false;

        for point in &self.points {
            if point.is_placeholder() {
                in_placeholders = true;
                continue;
            }

            if in_placeholders {
                return decode_error("flac: seek table placeholders must form a suffix");
            }

            if let Some(prev) = prev {
                if point.sample_offset <= prev.sample_offset {
                    return decode_error("flac: seek table sample offsets are not increasing");
                }

                if point.file_offset < prev.file_offset {
                    return decode_error("flac: seek table file offsets are decreasing");
                }
            }

            prev = Some(point);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{BlockSequence, ChannelAssignment};
    use cadenza_core::errors::Error;

    use std::io::Cursor;

    fn reader_over(data: Vec<u8>) -> BitReader<'static> {
        BitReader::new(Box::new(Cursor::new(data)))
    }

    fn write_to_vec<F: FnOnce(&mut BitWriter<'_>) -> Result<()>>(write: F) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut bw = BitWriter::new(Box::new(&mut buf));
            write(&mut bw).unwrap();
            bw.close().unwrap();
        }
        buf
    }

    fn test_stream_info() -> StreamInfo {
        StreamInfo {
            block_len_min: 4096,
            block_len_max: 4096,
            frame_byte_len_min: 0,
            frame_byte_len_max: 0,
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
            n_samples: None,
            md5: None,
        }
    }

    #[test]
    fn verify_metadata_block_header() {
        let header = MetadataBlockHeader {
            is_last: true,
            block_type: MetadataBlockType::SeekTable,
            block_len: 54,
        };

        let buf = write_to_vec(|bw| header.write(bw));
        assert_eq!(buf, vec![0x83, 0x00, 0x00, 0x36]);

        let mut bs = reader_over(buf);
        assert_eq!(MetadataBlockHeader::read(&mut bs).unwrap(), header);
    }

    #[test]
    fn verify_stream_info_write() {
        let info = test_stream_info();

        let buf = write_to_vec(|bw| info.write(bw, true));

        // A 4-byte block header followed by the 34-byte payload.
        assert_eq!(buf.len(), 38);
        assert_eq!(&buf[0..4], &[0x80, 0x00, 0x00, 0x22]);
        assert_eq!(&buf[4..8], &[0x10, 0x00, 0x10, 0x00]);

        // Reparsing the payload restores the original value.
        let mut bs = reader_over(buf[4..].to_vec());
        assert_eq!(StreamInfo::read(&mut bs).unwrap(), info);
    }

    #[test]
    fn verify_stream_info_round_trip_full() {
        let info = StreamInfo {
            block_len_min: 16,
            block_len_max: 65535,
            frame_byte_len_min: 100,
            frame_byte_len_max: 0xff_ffff,
            sample_rate: 655_350,
            channels: 8,
            bits_per_sample: 32,
            n_samples: Some(0x000f_ffff_ffff),
            md5: Some([0xa5; 16]),
        };

        let buf = write_to_vec(|bw| info.write(bw, false));
        assert_eq!(buf[0], 0x00);

        let mut bs = reader_over(buf[4..].to_vec());
        assert_eq!(StreamInfo::read(&mut bs).unwrap(), info);
    }

    #[test]
    fn verify_stream_info_read_errors() {
        // A minimum block length below 16 samples is invalid.
        let info = test_stream_info();
        let mut buf = write_to_vec(|bw| info.write(bw, true));
        buf[4] = 0x00;
        buf[5] = 0x0f;

        let mut bs = reader_over(buf[4..].to_vec());
        assert!(matches!(StreamInfo::read(&mut bs), Err(Error::DecodeError(_))));

        // A maximum block length below the minimum is invalid.
        let mut buf = write_to_vec(|bw| info.write(bw, true));
        buf[6] = 0x0f;
        buf[7] = 0xff;

        let mut bs = reader_over(buf[4..].to_vec());
        assert!(matches!(StreamInfo::read(&mut bs), Err(Error::DecodeError(_))));

        // A truncated payload is an end-of-stream error.
        let buf = write_to_vec(|bw| info.write(bw, true));
        let mut bs = reader_over(buf[4..20].to_vec());
        assert!(matches!(StreamInfo::read(&mut bs), Err(Error::EndOfStream)));
    }

    #[test]
    fn verify_stream_info_check_values() {
        let mut info = test_stream_info();
        assert!(info.check_values().is_ok());

        info.sample_rate = 0;
        assert!(matches!(info.check_values(), Err(Error::InvalidState(_))));

        let mut info = test_stream_info();
        info.channels = 9;
        assert!(matches!(info.check_values(), Err(Error::InvalidState(_))));

        let mut info = test_stream_info();
        info.bits_per_sample = 3;
        assert!(matches!(info.check_values(), Err(Error::InvalidState(_))));

        let mut info = test_stream_info();
        info.frame_byte_len_min = 0x100_0000;
        assert!(matches!(info.check_values(), Err(Error::InvalidState(_))));

        let mut info = test_stream_info();
        info.n_samples = Some(1u64 << 36);
        assert!(matches!(info.check_values(), Err(Error::InvalidState(_))));

        // Serialization refuses an invalid value.
        let mut info = test_stream_info();
        info.block_len_min = 8;

        let mut buf = Vec::new();
        let mut bw = BitWriter::new(Box::new(&mut buf));
        assert!(matches!(info.write(&mut bw, true), Err(Error::InvalidState(_))));
    }

    #[test]
    fn verify_check_frame() {
        let info = test_stream_info();

        let mut frame = FrameHeader {
            block_sequence: BlockSequence::BySample(0),
            channel_assignment: ChannelAssignment::Independent(2),
            block_len: 4096,
            sample_rate: Some(44100),
            bits_per_sample: Some(16),
            frame_byte_len: None,
        };

        assert!(info.check_frame(&frame).is_ok());

        // Deferred fields are not checked.
        frame.sample_rate = None;
        frame.bits_per_sample = None;
        assert!(info.check_frame(&frame).is_ok());

        // Channel count mismatch.
        frame.channel_assignment = ChannelAssignment::Independent(3);
        assert!(matches!(info.check_frame(&frame), Err(Error::DecodeError(_))));
        frame.channel_assignment = ChannelAssignment::MidSide;
        assert!(info.check_frame(&frame).is_ok());

        // Rate and depth mismatches.
        frame.sample_rate = Some(48000);
        assert!(matches!(info.check_frame(&frame), Err(Error::DecodeError(_))));
        frame.sample_rate = None;

        frame.bits_per_sample = Some(24);
        assert!(matches!(info.check_frame(&frame), Err(Error::DecodeError(_))));
        frame.bits_per_sample = None;

        // Block length beyond the stream maximum.
        frame.block_len = 4097;
        assert!(matches!(info.check_frame(&frame), Err(Error::DecodeError(_))));
        frame.block_len = 4096;

        // Frame byte length bounds apply only when the stream states them.
        frame.frame_byte_len = Some(10);
        assert!(info.check_frame(&frame).is_ok());

        let mut bounded = test_stream_info();
        bounded.frame_byte_len_min = 100;
        bounded.frame_byte_len_max = 1000;

        assert!(matches!(bounded.check_frame(&frame), Err(Error::DecodeError(_))));
        frame.frame_byte_len = Some(2000);
        assert!(matches!(bounded.check_frame(&frame), Err(Error::DecodeError(_))));
        frame.frame_byte_len = Some(500);
        assert!(bounded.check_frame(&frame).is_ok());

        // A block longer than the whole stream is invalid.
        let mut short = test_stream_info();
        short.n_samples = Some(1000);
        frame.frame_byte_len = None;
        assert!(matches!(short.check_frame(&frame), Err(Error::DecodeError(_))));
    }

    fn test_seek_table() -> SeekTable {
        SeekTable {
            points: vec![
                SeekPoint { sample_offset: 0, file_offset: 0, frame_samples: 4096 },
                SeekPoint { sample_offset: 4096, file_offset: 1024, frame_samples: 4096 },
                SeekPoint {
                    sample_offset: SeekPoint::PLACEHOLDER_SAMPLE_OFFSET,
                    file_offset: 0,
                    frame_samples: 0,
                },
            ],
        }
    }

    #[test]
    fn verify_seek_table_round_trip() {
        let table = test_seek_table();

        assert!(table.check_values().is_ok());

        let buf = write_to_vec(|bw| table.write(bw, true));

        // A 4-byte block header followed by three 18-byte points.
        assert_eq!(buf.len(), 58);
        assert_eq!(&buf[0..4], &[0x83, 0x00, 0x00, 0x36]);

        let mut bs = reader_over(buf[4..].to_vec());
        assert_eq!(SeekTable::read(&mut bs, 54).unwrap(), table);
    }

    #[test]
    fn verify_seek_table_ordering() {
        // Swapping the first two points breaks the strict sample ordering.
        let mut table = test_seek_table();
        table.points.swap(0, 1);

        assert!(matches!(table.check_values(), Err(Error::DecodeError(_))));

        let mut buf = Vec::new();
        let mut bw = BitWriter::new(Box::new(&mut buf));
        assert!(matches!(table.write(&mut bw, true), Err(Error::DecodeError(_))));

        // Equal sample offsets are not strictly increasing.
        let mut table = test_seek_table();
        table.points[1].sample_offset = 0;
        assert!(matches!(table.check_values(), Err(Error::DecodeError(_))));

        // File offsets may repeat, but must not decrease.
        let mut table = test_seek_table();
        table.points[1].file_offset = 0;
        assert!(table.check_values().is_ok());

        let mut table = test_seek_table();
        table.points[0].file_offset = 2048;
        assert!(matches!(table.check_values(), Err(Error::DecodeError(_))));

        // A placeholder may not precede a real point.
        let mut table = test_seek_table();
        table.points.swap(1, 2);
        assert!(matches!(table.check_values(), Err(Error::DecodeError(_))));

        // Multiple trailing placeholders are fine, and an empty table is valid.
        let mut table = test_seek_table();
        table.points.push(SeekPoint {
            sample_offset: SeekPoint::PLACEHOLDER_SAMPLE_OFFSET,
            file_offset: 99,
            frame_samples: 1,
        });
        assert!(table.check_values().is_ok());

        assert!(SeekTable::default().check_values().is_ok());
    }

    #[test]
    fn verify_seek_table_read_errors() {
        // The payload length must be a multiple of the point length.
        let mut bs = reader_over(vec![0; 20]);
        assert!(matches!(SeekTable::read(&mut bs, 19), Err(Error::DecodeError(_))));

        // A truncated payload is an end-of-stream error.
        let mut bs = reader_over(vec![0; 17]);
        assert!(matches!(SeekTable::read(&mut bs, 18), Err(Error::EndOfStream)));
    }
}
