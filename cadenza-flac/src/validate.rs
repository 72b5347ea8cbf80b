// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp;

use cadenza_core::errors::{invalid_argument_error, Result};

/// The most samples (per channel) interleaved into the staging buffer per digest flush.
const MAX_FLUSH_SAMPLES: usize = 2048;

/// `Validator` computes the MD5 checksum of an audio stream taking into account the
/// peculiarities of FLAC's MD5 validation scheme.
///
/// The checksum is defined over interleaved samples serialized to little-endian bytes of the
/// stated width. Decoded audio is planar and widened to 32 bits internally, so each update
/// truncates the samples to their true width, interleaves them, and feeds the byte stream to
/// the digest in bounded flushes.
pub struct Validator {
    context: md5::Context,
    buf: Vec<u8>,
}

impl Validator {
    pub fn new() -> Validator {
        Validator { context: md5::Context::new(), buf: Vec::new() }
    }

    /// Processes one block of planar audio and updates the state of the validator.
    ///
    /// Every channel must hold the same number of samples, and the sample width must be a
    /// multiple of 8 bits, at most 32.
    pub fn update(&mut self, channels: &[&[i32]], bits_per_sample: u32) -> Result<()> {
        if bits_per_sample == 0 || bits_per_sample % 8 != 0 || bits_per_sample > 32 {
            return invalid_argument_error("sample width must be a non-zero multiple of 8 bits");
        }

        if channels.is_empty() {
            return invalid_argument_error("at least one channel is required");
        }

        let n_frames = channels[0].len();

        if channels.iter().any(|channel| channel.len() != n_frames) {
            return invalid_argument_error("all channels must have the same number of samples");
        }

        let bytes_per_sample = (bits_per_sample / 8) as usize;

        let mut frame = 0;

        while frame < n_frames {
            let flush_end = cmp::min(frame + MAX_FLUSH_SAMPLES, n_frames);

            self.buf.clear();

            for i in frame..flush_end {
                for channel in channels {
                    let bytes = channel[i].to_le_bytes();
                    self.buf.extend_from_slice(&bytes[..bytes_per_sample]);
                }
            }

            self.context.consume(&self.buf);

            frame = flush_end;
        }

        Ok(())
    }

    /// Get the checksum.
    pub fn md5(&self) -> [u8; 16] {
        self.context.clone().compute().0
    }
}

impl Default for Validator {
    fn default() -> Self {
        Validator::new()
    }
}

/// Computes the MD5 checksum of a complete block of planar audio in one call.
pub fn md5_of_samples(channels: &[&[i32]], bits_per_sample: u32) -> Result<[u8; 16]> {
    let mut validator = Validator::new();
    validator.update(channels, bits_per_sample)?;
    Ok(validator.md5())
}
