// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Precomputed acceleration tables for Rice-coded signed integers.
//!
//! A Rice code with parameter `k` is a quotient in unary (zero bits terminated by a one bit)
//! followed by a `k`-bit binary remainder, zig-zagged to a signed value. For every parameter a
//! pair of tables maps the next [`RICE_TABLE_BITS`] bits of the stream directly to the decoded
//! value and the number of bits the code occupies, letting the decoder resolve most symbols
//! with a single lookup instead of bit-serial unary scanning.

use once_cell::sync::Lazy;

/// The number of stream bits used to index the decoding tables.
pub const RICE_TABLE_BITS: u32 = 13;

/// Mask covering a table index.
pub const RICE_TABLE_MASK: usize = (1 << RICE_TABLE_BITS) - 1;

/// The number of symbols the accelerated decoding regime processes per iteration.
pub const RICE_CHUNK: usize = 4;

/// The largest Rice parameter with decoding tables. Codes for larger parameters never fit the
/// table index width.
pub const RICE_MAX_TABLE_PARAM: u32 = 30;

/// Decoding tables for a single Rice parameter.
pub struct RiceTable {
    /// The total code length, in bits, of the symbol whose leading bits form the index, or 0 if
    /// the code does not fit within [`RICE_TABLE_BITS`] bits.
    pub consumed: Box<[u8]>,
    /// The decoded (zig-zag decoded, signed) value of the symbol whose leading bits form the
    /// index. Only meaningful where `consumed` is non-zero.
    pub values: Box<[i32]>,
}

impl RiceTable {
    fn build(param: u32) -> RiceTable {
        let mut consumed = vec![0u8; 1 << RICE_TABLE_BITS].into_boxed_slice();
        let mut values = vec![0i32; 1 << RICE_TABLE_BITS].into_boxed_slice();

        // Enumerate unsigned symbols in increasing order until their codes no longer fit the
        // index width. Symbol `i` encodes as `i >> param` zero bits, a one bit, then the low
        // `param` bits of `i`.
        let mut i: u32 = 0;
        loop {
            let n_bits = (i >> param) + 1 + param;

            if n_bits > RICE_TABLE_BITS {
                break;
            }

            // The code word itself: the terminating one bit followed by the remainder.
            let code = (1u32 << param) | (i & ((1u32 << param) - 1));
            let shift = RICE_TABLE_BITS - n_bits;
            let value = ((i >> 1) as i32) ^ -((i & 1) as i32);

            // Every index whose leading `n_bits` bits equal the code decodes to this symbol.
            for j in 0..(1usize << shift) {
                let idx = ((code as usize) << shift) | j;
                consumed[idx] = n_bits as u8;
                values[idx] = value;
            }

            i += 1;
        }

        RiceTable { consumed, values }
    }
}

static RICE_TABLES: Lazy<Vec<RiceTable>> =
    Lazy::new(|| (0..=RICE_MAX_TABLE_PARAM).map(RiceTable::build).collect());

/// Gets the decoding table for the given Rice parameter. The parameter must be at most
/// [`RICE_MAX_TABLE_PARAM`].
pub fn rice_table(param: u32) -> &'static RiceTable {
    &RICE_TABLES[param as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_rice_table_entries() {
        // With param=0 the code `1` (a bare terminator) decodes to 0 in 1 bit. All indicies
        // with a leading one bit map to it.
        let table = rice_table(0);
        assert_eq!(table.consumed[1usize << 12], 1);
        assert_eq!(table.values[1usize << 12], 0);
        assert_eq!(table.consumed[RICE_TABLE_MASK], 1);
        assert_eq!(table.values[RICE_TABLE_MASK], 0);

        // With param=4 the symbol 4 encodes as `1 0100` (5 bits) and zig-zag decodes to 2.
        let table = rice_table(4);
        let idx = 0b10100usize << (RICE_TABLE_BITS - 5);
        assert_eq!(table.consumed[idx], 5);
        assert_eq!(table.values[idx], 2);

        // The symbol 31 encodes as `01 1111` (6 bits) and zig-zag decodes to -16.
        let idx = 0b011111usize << (RICE_TABLE_BITS - 6);
        assert_eq!(table.consumed[idx], 6);
        assert_eq!(table.values[idx], -16);

        // An all-zero index is a quotient longer than the table covers.
        assert_eq!(table.consumed[0], 0);
    }

    #[test]
    fn verify_rice_table_zigzag_alternation() {
        // Consecutive symbols alternate between non-negative and negative values.
        let table = rice_table(2);

        let lookup = |symbol: u32| {
            let n_bits = (symbol >> 2) + 1 + 2;
            let code = (1u32 << 2) | (symbol & 0x3);
            let idx = (code as usize) << (RICE_TABLE_BITS - n_bits);
            (table.consumed[idx], table.values[idx])
        };

        assert_eq!(lookup(0), (3, 0));
        assert_eq!(lookup(1), (3, -1));
        assert_eq!(lookup(2), (3, 1));
        assert_eq!(lookup(3), (3, -2));
        assert_eq!(lookup(4), (4, 2));
        assert_eq!(lookup(5), (4, -3));
    }
}
