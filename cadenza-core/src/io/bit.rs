// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::checksum::{Crc16Ansi, Crc8Ccitt, Monitor};
use crate::errors::{
    decode_error, end_of_stream_error, invalid_argument_error, invalid_state_error,
    not_aligned_error, unsupported_error, Error, Result,
};
use crate::io::rice::{
    rice_table, RICE_CHUNK, RICE_MAX_TABLE_PARAM, RICE_TABLE_BITS, RICE_TABLE_MASK,
};
use crate::io::{ByteSink, ByteSource};
use crate::util::bits::sign_extend_leq32_to_i32;

/// The capacity of the byte buffer a `BitReader` maintains over its source.
const READ_BUF_LEN: usize = 4096;

/// `BitReader` reads bits from most-significant to least-significant from a [`ByteSource`],
/// while simultaneously tracking a CRC-8 and a CRC-16 over a caller-delimited span of the
/// consumed bytes.
///
/// The reader maintains two levels of buffering: a byte buffer replenished from the source in
/// bulk, and a 64-bit cache holding the freshest unconsumed bits in its low-order positions.
/// CRCs are computed lazily over the byte buffer, so per-bit reads carry no checksum cost.
pub struct BitReader<'s> {
    /// The source reader.
    source: Box<dyn ByteSource + 's>,
    /// The byte buffer.
    buf: Box<[u8]>,
    /// Absolute stream position of `buf[0]`.
    buf_start_pos: u64,
    /// The number of bytes currently loaded in the byte buffer.
    buf_len: usize,
    /// Index of the next byte to transfer into the bit cache.
    buf_pos: usize,
    /// The bit cache. Only the low `n_bits` bits are valid.
    bits: u64,
    /// The number of valid bits in the bit cache, in [0, 64].
    n_bits: u32,
    /// Index into the byte buffer where the pending CRC span begins.
    crc_start: usize,
    /// Running CRC-8 over the current span.
    crc8: Crc8Ccitt,
    /// Running CRC-16 over the current span.
    crc16: Crc16Ansi,
    /// Latched once the source reports end-of-stream. Cleared by a seek.
    eof: bool,
    /// Set once the reader is closed. All further reads fail.
    closed: bool,
}

impl<'s> BitReader<'s> {
    /// Instantiate a new `BitReader` over the given source.
    pub fn new(source: Box<dyn ByteSource + 's>) -> Self {
        BitReader {
            source,
            buf: vec![0u8; READ_BUF_LEN].into_boxed_slice(),
            buf_start_pos: 0,
            buf_len: 0,
            buf_pos: 0,
            bits: 0,
            n_bits: 0,
            crc_start: 0,
            crc8: Crc8Ccitt::new(0),
            crc16: Crc16Ansi::new(0),
            eof: false,
            closed: false,
        }
    }

    /// Returns the total length of the underlying source in bytes, or an error if the source
    /// does not report a length.
    pub fn byte_len(&self) -> Result<u64> {
        match self.source.byte_len() {
            Some(len) => Ok(len),
            None => unsupported_error("source does not report a length"),
        }
    }

    /// Gets the byte position of the next bit to be read. A partially consumed byte counts as
    /// unread.
    pub fn pos(&self) -> u64 {
        self.buf_start_pos + self.buf_pos as u64 - u64::from((self.n_bits + 7) / 8)
    }

    /// Gets the number of bits consumed within the current byte, in [0, 7].
    pub fn bit_pos(&self) -> u32 {
        self.n_bits.wrapping_neg() & 0x7
    }

    /// Positions the reader such that the next read starts at byte `pos` from the start of the
    /// stream. Discards the bit cache, clears the end-of-stream latch, and resets both CRC
    /// spans. Fails with `Unsupported` if the source is not seekable.
    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        if self.closed {
            return invalid_state_error("bit reader is closed");
        }

        self.source.seek_to(pos)?;

        self.buf_start_pos = pos;
        self.buf_len = 0;
        self.buf_pos = 0;
        self.n_bits = 0;
        self.crc_start = 0;
        self.crc8 = Crc8Ccitt::new(0);
        self.crc16 = Crc16Ansi::new(0);
        self.eof = false;

        Ok(())
    }

    /// Reads an unsigned integer of `bit_width` bits, at most 32, most-significant bit first.
    /// A width of 0 reads nothing and returns 0.
    pub fn read_uint(&mut self, bit_width: u32) -> Result<u32> {
        if bit_width > u32::BITS {
            return invalid_argument_error("read width must be at most 32 bits");
        }

        // Hard-code the zero-width case so the extraction shift below is always in [0, 63].
        if bit_width == 0 {
            return Ok(0);
        }

        while self.n_bits < bit_width {
            self.feed_byte()?;
        }

        self.n_bits -= bit_width;

        let value = (self.bits >> self.n_bits) as u32;

        if bit_width < u32::BITS {
            Ok(value & ((1 << bit_width) - 1))
        }
        else {
            Ok(value)
        }
    }

    /// Reads an unsigned integer of `bit_width` bits and sign extends it to a signed 32-bit
    /// integer.
    pub fn read_signed_int(&mut self, bit_width: u32) -> Result<i32> {
        let value = self.read_uint(bit_width)?;
        Ok(sign_extend_leq32_to_i32(value, bit_width))
    }

    /// Reads the next whole byte, or `None` if the source is exhausted. The reader must be at a
    /// byte boundary.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        self.check_aligned()?;

        match self.read_uint(8) {
            Ok(value) => Ok(Some(value as u8)),
            Err(Error::EndOfStream) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Reads exactly enough bytes to fill `buf`, failing with `EndOfStream` on a short read.
    /// The reader must be at a byte boundary.
    pub fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_aligned()?;

        for byte in buf.iter_mut() {
            *byte = self.read_uint(8)? as u8;
        }

        Ok(())
    }

    /// Marks the current position as the start of both CRC spans and zeroes both CRCs. The
    /// reader must be at a byte boundary.
    pub fn reset_crcs(&mut self) -> Result<()> {
        self.check_aligned()?;

        let n_cached_bytes = (self.n_bits / 8) as usize;
        debug_assert!(n_cached_bytes <= self.buf_pos);

        self.crc_start = self.buf_pos - n_cached_bytes;
        self.crc8 = Crc8Ccitt::new(0);
        self.crc16 = Crc16Ansi::new(0);

        Ok(())
    }

    /// Gets the CRC-8 over the bytes consumed since the last CRC reset (or seek, or stream
    /// start). The reader must be at a byte boundary.
    pub fn crc8(&mut self) -> Result<u8> {
        self.check_aligned()?;
        self.update_crcs((self.n_bits / 8) as usize);
        Ok(self.crc8.crc())
    }

    /// Gets the CRC-16 over the bytes consumed since the last CRC reset (or seek, or stream
    /// start). The reader must be at a byte boundary.
    pub fn crc16(&mut self) -> Result<u16> {
        self.check_aligned()?;
        self.update_crcs((self.n_bits / 8) as usize);
        Ok(self.crc16.crc())
    }

    /// Decodes Rice-coded signed integers with the given parameter into `out`.
    ///
    /// Most symbols are resolved four at a time through the precomputed decoding tables.
    /// Symbols whose codes exceed the table index width, and stretches where too little data
    /// is buffered, fall back to bit-serial decoding. A quotient reaching `1 << (53 - param)`
    /// fails the decode, bounding every decoded value to 53 significant bits.
    pub fn read_rice_signed(&mut self, param: u32, out: &mut [i64]) -> Result<()> {
        if param > 31 {
            return invalid_argument_error("rice parameter must be at most 31");
        }

        let unary_limit = 1u64 << (53 - param);

        let table = if param <= RICE_MAX_TABLE_PARAM { Some(rice_table(param)) } else { None };

        let end = out.len();
        let mut idx = 0;

        loop {
            // Table-accelerated regime. Processes whole chunks while at least one chunk of
            // output remains and the buffered data can satisfy a full chunk of worst-case
            // table hits.
            if let Some(table) = table {
                'accel: while idx + RICE_CHUNK <= end {
                    if self.n_bits < RICE_CHUNK as u32 * RICE_TABLE_BITS {
                        if self.buf_len - self.buf_pos >= 8 {
                            self.fill_bits();
                        }
                        else {
                            break 'accel;
                        }
                    }

                    for _ in 0..RICE_CHUNK {
                        let peek =
                            (self.bits >> (self.n_bits - RICE_TABLE_BITS)) as usize
                                & RICE_TABLE_MASK;

                        let consumed = table.consumed[peek];

                        // A zero entry marks a code longer than the table index width.
                        if consumed == 0 {
                            break 'accel;
                        }

                        self.n_bits -= u32::from(consumed);

                        out[idx] = i64::from(table.values[peek]);
                        idx += 1;
                    }
                }
            }

            if idx >= end {
                break;
            }

            // Bit-serial regime. Decodes a single symbol, then returns to the accelerated
            // regime.
            let mut quotient: u64 = 0;

            while self.read_uint(1)? == 0 {
                quotient += 1;

                if quotient >= unary_limit {
                    return decode_error("rice residual value is too large");
                }
            }

            let value = (quotient << param) | u64::from(self.read_uint(param)?);

            out[idx] = ((value >> 1) as i64) ^ -((value & 1) as i64);
            idx += 1;
        }

        Ok(())
    }

    /// Closes the reader. Idempotent. All subsequent reads fail with `InvalidState`.
    pub fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.buf_len = 0;
        self.buf_pos = 0;
        self.n_bits = 0;
        Ok(())
    }

    #[inline(always)]
    fn check_aligned(&self) -> Result<()> {
        if self.n_bits % 8 != 0 {
            return not_aligned_error();
        }
        Ok(())
    }

    /// Transfers one byte from the byte buffer into the bit cache, replenishing the byte
    /// buffer from the source if it is exhausted.
    #[inline(always)]
    fn feed_byte(&mut self) -> Result<()> {
        if self.buf_pos == self.buf_len {
            self.refill()?;
        }

        debug_assert!(self.n_bits <= 56);

        self.bits = (self.bits << 8) | u64::from(self.buf[self.buf_pos]);
        self.buf_pos += 1;
        self.n_bits += 8;

        Ok(())
    }

    /// Transfers as many whole bytes from the byte buffer into the bit cache as fit. Does not
    /// touch the source.
    fn fill_bits(&mut self) {
        let count =
            std::cmp::min(((64 - self.n_bits) >> 3) as usize, self.buf_len - self.buf_pos);

        for _ in 0..count {
            self.bits = (self.bits << 8) | u64::from(self.buf[self.buf_pos]);
            self.buf_pos += 1;
        }

        self.n_bits += (count as u32) << 3;
    }

    /// Replenishes the byte buffer from the source. The pending CRC span is folded in first so
    /// checksums stay consistent across the refill.
    fn refill(&mut self) -> Result<()> {
        if self.closed {
            return invalid_state_error("bit reader is closed");
        }

        if self.eof {
            return end_of_stream_error();
        }

        self.update_crcs(0);

        self.buf_start_pos += self.buf_len as u64;
        self.buf_len = 0;
        self.buf_pos = 0;
        self.crc_start = 0;

        let count = self.source.read_into(&mut self.buf)?;

        if count == 0 {
            self.eof = true;
            return end_of_stream_error();
        }

        self.buf_len = count;

        Ok(())
    }

    /// Folds buffered bytes into both CRCs, up to but excluding the trailing `n_unused` bytes
    /// whose bits still sit unconsumed in the bit cache.
    fn update_crcs(&mut self, n_unused: usize) {
        debug_assert!(n_unused <= self.buf_pos);

        let end = self.buf_pos - n_unused;

        if end > self.crc_start {
            self.crc8.process_buf_bytes(&self.buf[self.crc_start..end]);
            self.crc16.process_buf_bytes(&self.buf[self.crc_start..end]);
            self.crc_start = end;
        }
    }
}

/// `BitWriter` writes bits from most-significant to least-significant to a [`ByteSink`], while
/// simultaneously tracking a CRC-8 and a CRC-16 over a caller-delimited span of the emitted
/// bytes.
pub struct BitWriter<'s> {
    /// The sink writer.
    sink: Box<dyn ByteSink + 's>,
    /// The bit accumulator. Only the low `n_bits` bits are valid.
    bits: u64,
    /// The number of valid bits in the accumulator, in [0, 64].
    n_bits: u32,
    /// The number of whole bytes delivered to the sink.
    n_bytes: u64,
    /// Running CRC-8 over the current span.
    crc8: Crc8Ccitt,
    /// Running CRC-16 over the current span.
    crc16: Crc16Ansi,
    /// Set once the writer is closed. All further writes fail.
    closed: bool,
}

impl<'s> BitWriter<'s> {
    /// Instantiate a new `BitWriter` over the given sink.
    pub fn new(sink: Box<dyn ByteSink + 's>) -> Self {
        BitWriter {
            sink,
            bits: 0,
            n_bits: 0,
            n_bytes: 0,
            crc8: Crc8Ccitt::new(0),
            crc16: Crc16Ansi::new(0),
            closed: false,
        }
    }

    /// Writes the low `bit_width` bits of `value`, at most 32, most-significant bit first.
    /// Bits of `value` above `bit_width` are ignored.
    pub fn write_int(&mut self, bit_width: u32, value: u32) -> Result<()> {
        if self.closed {
            return invalid_state_error("bit writer is closed");
        }

        if bit_width > u32::BITS {
            return invalid_argument_error("write width must be at most 32 bits");
        }

        if self.n_bits + bit_width > u64::BITS {
            self.flush()?;
        }

        let masked =
            if bit_width < u32::BITS { value & ((1 << bit_width) - 1) } else { value };

        self.bits = (self.bits << bit_width) | u64::from(masked);
        self.n_bits += bit_width;

        Ok(())
    }

    /// Drains whole bytes out of the accumulator to the sink, leaving 0 to 7 bits behind. Each
    /// drained byte updates both CRCs.
    pub fn flush(&mut self) -> Result<()> {
        while self.n_bits >= 8 {
            self.n_bits -= 8;

            let byte = (self.bits >> self.n_bits) as u8;

            self.crc8.process_byte(byte);
            self.crc16.process_byte(byte);

            self.sink.write_byte(byte)?;
            self.n_bytes += 1;
        }

        Ok(())
    }

    /// Writes zero bits until the writer is at a byte boundary.
    pub fn align_to_byte(&mut self) -> Result<()> {
        self.write_int(self.n_bits.wrapping_neg() & 0x7, 0)
    }

    /// Flushes whole bytes to the sink, then zeroes both CRCs.
    pub fn reset_crcs(&mut self) -> Result<()> {
        self.flush()?;
        self.crc8 = Crc8Ccitt::new(0);
        self.crc16 = Crc16Ansi::new(0);
        Ok(())
    }

    /// Gets the CRC-8 over the bytes emitted since the last CRC reset. The writer must be at a
    /// byte boundary.
    pub fn crc8(&mut self) -> Result<u8> {
        self.check_aligned()?;
        self.flush()?;
        Ok(self.crc8.crc())
    }

    /// Gets the CRC-16 over the bytes emitted since the last CRC reset. The writer must be at
    /// a byte boundary.
    pub fn crc16(&mut self) -> Result<u16> {
        self.check_aligned()?;
        self.flush()?;
        Ok(self.crc16.crc())
    }

    /// Gets the number of whole bytes written so far, counting complete bytes still in the
    /// accumulator.
    pub fn byte_count(&self) -> u64 {
        self.n_bytes + u64::from(self.n_bits / 8)
    }

    /// Flushes and closes the writer. Idempotent. The writer must be at a byte boundary.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.check_aligned()?;
        self.flush()?;
        self.sink.flush_sink()?;
        self.closed = true;

        Ok(())
    }

    #[inline(always)]
    fn check_aligned(&self) -> Result<()> {
        if self.n_bits % 8 != 0 {
            return not_aligned_error();
        }
        Ok(())
    }
}
