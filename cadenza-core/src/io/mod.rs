// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module implements composable bit- and byte-level I/O.
//!
//! Raw bytes enter and leave Cadenza through two narrow capabilities: a [`ByteSource`] supplies
//! bytes (optionally reporting its length and supporting seeks), and a [`ByteSink`] accepts
//! them. The [`BitReader`] and [`BitWriter`] build bit-level access, position accounting, and
//! CRC tracking on top of these capabilities without knowing anything else about the
//! underlying storage.

use std::fs::File;
use std::io;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::errors::{unsupported_error, Result};

mod bit;
mod rice;

pub use bit::{BitReader, BitWriter};

/// `ByteSource` is the capability through which a [`BitReader`] pulls raw bytes.
///
/// Seeking and length reporting are optional capabilities that can be queried at runtime.
/// A source that does not support them fails the respective operations with
/// [`Error::Unsupported`](crate::errors::Error::Unsupported).
pub trait ByteSource {
    /// Reads up to `buf.len()` bytes into `buf` and returns the number of bytes read. A return
    /// value of 0 indicates the end of the stream.
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Returns if the source supports `seek_to`. This may be an expensive operation.
    fn is_seekable(&self) -> bool {
        false
    }

    /// Returns the total length of the source in bytes, if known.
    fn byte_len(&self) -> Option<u64> {
        None
    }

    /// Positions the source such that the next `read_into` starts at byte `pos` from the start
    /// of the stream.
    fn seek_to(&mut self, _pos: u64) -> Result<()> {
        unsupported_error("source does not support seeking")
    }
}

impl ByteSource for File {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.read(buf)?)
    }

    /// Returns if the `File` backing the `ByteSource` is seekable.
    ///
    /// Note: This operation involves querying the underlying file descriptor for information
    /// and may be moderately expensive. Therefore it is recommended to cache this value if used
    /// often.
    fn is_seekable(&self) -> bool {
        // If the file's metadata is available, and the file is a regular file (i.e., not a
        // FIFO, etc.), then the source will be seekable. Otherwise assume it is not. Note that
        // metadata() follows symlinks.
        match self.metadata() {
            Ok(metadata) => metadata.is_file(),
            _ => false,
        }
    }

    fn byte_len(&self) -> Option<u64> {
        match self.metadata() {
            Ok(metadata) => Some(metadata.len()),
            _ => None,
        }
    }

    fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.seek(SeekFrom::Start(pos))?;
        Ok(())
    }
}

impl<T: AsRef<[u8]>> ByteSource for io::Cursor<T> {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.read(buf)?)
    }

    /// Always returns true since an `io::Cursor` is always seekable.
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.get_ref().as_ref().len() as u64)
    }

    fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.set_position(pos);
        Ok(())
    }
}

/// `ReadOnlySource` wraps any reader implementing [`std::io::Read`] in an unseekable
/// [`ByteSource`].
pub struct ReadOnlySource<R: Read> {
    inner: R,
}

impl<R: Read> ReadOnlySource<R> {
    /// Instantiates a new `ReadOnlySource<R>` by taking ownership and wrapping the provided
    /// `Read`er.
    pub fn new(inner: R) -> Self {
        ReadOnlySource { inner }
    }

    /// Gets a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Gets a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwraps this `ReadOnlySource<R>`, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ByteSource for ReadOnlySource<R> {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.inner.read(buf)?)
    }
}

/// `ByteSink` is the capability through which a [`BitWriter`] pushes raw bytes.
///
/// Any [`std::io::Write`] implementation is a `ByteSink`. Bytes are delivered one at a time as
/// the bit accumulator drains, so an unbuffered sink such as a bare `File` should be wrapped in
/// a `std::io::BufWriter`.
pub trait ByteSink {
    /// Writes a single byte to the sink.
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    /// Flushes any bytes the sink itself has buffered.
    fn flush_sink(&mut self) -> Result<()>;
}

impl<W: Write> ByteSink for W {
    #[inline(always)]
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write_all(&[byte])?;
        Ok(())
    }

    fn flush_sink(&mut self) -> Result<()> {
        self.flush()?;
        Ok(())
    }
}
