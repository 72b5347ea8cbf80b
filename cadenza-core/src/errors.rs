// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Cadenza.
#[derive(Debug)]
pub enum Error {
    /// An IO error occurred while reading, writing, or seeking the underlying byte source or
    /// sink.
    IoError(io::Error),
    /// The underlying byte source was exhausted in the middle of a read.
    EndOfStream,
    /// The stream contained data that violates a format rule and could not be decoded.
    DecodeError(&'static str),
    /// An operation was invoked on a value whose invariants do not hold, for example a
    /// serializer called on an out-of-range field, or a read from a closed reader.
    InvalidState(&'static str),
    /// The caller violated a precondition of the operation.
    InvalidArgument(&'static str),
    /// An operation that requires a byte-aligned stream position was called mid-byte.
    NotAligned,
    /// The underlying byte source does not support the requested capability.
    Unsupported(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => {
                write!(f, "io error: {}", err)
            }
            Error::EndOfStream => {
                write!(f, "unexpected end of stream")
            }
            Error::DecodeError(msg) => {
                write!(f, "malformed stream: {}", msg)
            }
            Error::InvalidState(msg) => {
                write!(f, "invalid state: {}", msg)
            }
            Error::InvalidArgument(msg) => {
                write!(f, "invalid argument: {}", msg)
            }
            Error::NotAligned => {
                write!(f, "stream position is not byte aligned")
            }
            Error::Unsupported(feature) => {
                write!(f, "unsupported feature: {}", feature)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::EndOfStream,
            _ => Error::IoError(err),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a decode error.
pub fn decode_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::DecodeError(desc))
}

/// Convenience function to create an end-of-stream error.
pub fn end_of_stream_error<T>() -> Result<T> {
    Err(Error::EndOfStream)
}

/// Convenience function to create an invalid state error.
pub fn invalid_state_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidState(desc))
}

/// Convenience function to create an invalid argument error.
pub fn invalid_argument_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidArgument(desc))
}

/// Convenience function to create a not-aligned error.
pub fn not_aligned_error<T>() -> Result<T> {
    Err(Error::NotAligned)
}

/// Convenience function to create an unsupported feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::Unsupported(feature))
}
