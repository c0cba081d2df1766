/*
    FluxFox
    https://github.com/dbalsom/fluxfox

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/

//! MFM (Modified Frequency Modulation) encoding.
//!
//! Each data bit is preceded by a clock bit. The clock bit is 1 only between two 0 data bits.
//! Sync marks deliberately drop one clock bit so that they can never occur in ordinary data.

use bit_vec::BitVec;

pub const MFM_BYTE_LEN: usize = 16;
pub const MFM_MARKER_LEN: usize = 64;

/// 0xA1 with the clock bit between data bits 4 and 5 missing.
pub const MFM_SYNC: u16 = 0x4489;
/// 0xA1 as ordinary MFM would encode it.
pub const MFM_SYNC_SHIFTED: u16 = 0x44A9;
/// 0xC2 with a missing clock bit, used before the index address mark.
pub const IAM_SYNC: u16 = 0x5224;

/// The clock bits dropped from an `A1 A1 A1 xx` marker.
pub const MFM_MISSING_CLOCK: u64 = 0x0020_0020_0020_0000;

pub const IAM_MARKER: u64 = 0x5224_5224_5224_5552;
pub const IDAM_MARKER: u64 = 0x4489_4489_4489_5554;
pub const DAM_MARKER: u64 = 0x4489_4489_4489_5545;
pub const DDAM_MARKER: u64 = 0x4489_4489_4489_554A;

/// Raw encodings of single mark bytes following a sync run, which always ends in a 1 bit.
pub const IDAM_BYTE: u16 = 0x5554; // FE
pub const DAM_BYTE: u16 = 0x5545; // FB
pub const IAM_BYTE: u16 = 0x5552; // FC

/// MFM-encode a single byte. Returns the 16 raw bits and updates `last_bit`.
pub fn encode_byte(byte: u8, last_bit: &mut bool) -> u16 {
    let mut accum: u16 = 0;
    let mut previous_bit = *last_bit;

    for i in (0..8).rev() {
        let bit = (byte & (1 << i)) != 0;
        if bit {
            // 1 is encoded as 01
            accum = (accum << 2) | 0b01;
        }
        else if !previous_bit {
            // 0 is encoded as 10 if previous bit was 0
            accum = (accum << 2) | 0b10;
        }
        else {
            // otherwise 00
            accum <<= 2;
        }
        previous_bit = bit;
    }
    // The last data bit is the last emitted raw bit.
    *last_bit = accum & 1 != 0;
    accum
}

/// MFM-encode `data`, appending to `out`. `last_bit` is the final raw bit written before this
/// call and holds the final raw bit written by it on return.
pub fn encode(data: &[u8], last_bit: &mut bool, out: &mut BitVec) {
    for &byte in data {
        let word = encode_byte(byte, last_bit);
        for i in (0..16).rev() {
            out.push(word & (1 << i) != 0);
        }
    }
}

/// MFM-encode `data` into a new bit vector.
pub fn encode_bits(data: &[u8], last_bit: &mut bool) -> BitVec {
    let mut out = BitVec::with_capacity(data.len() * MFM_BYTE_LEN);
    encode(data, last_bit, &mut out);
    out
}

/// Compute the ordinary MFM encoding of up to four marker bytes as a 64-bit value.
/// A mark is always preceded by a sync block of 0's, so the previous bit is assumed to be 0.
pub fn encode_marker(data: &[u8]) -> u64 {
    debug_assert!(data.len() <= 4);
    let mut last_bit = false;
    data.iter()
        .fold(0u64, |acc, &byte| (acc << 16) | encode_byte(byte, &mut last_bit) as u64)
}

/// Decode an MFM bit sequence starting at a clock bit.
pub fn decode(bits: &BitVec, offset: usize) -> Vec<u8> {
    super::decode_fm_mfm(bits, offset)
}

/// Spread the bits of `byte` onto the data positions of a 16-bit word (clock positions 0).
fn spread(byte: u8) -> u16 {
    (0..8).fold(0u16, |acc, i| acc | ((((byte >> i) & 1) as u16) << (i * 2)))
}

/// Collect the data positions (even bit indices) of a 16-bit word into a byte.
pub(crate) fn compact(word: u16) -> u8 {
    (0..8).fold(0u8, |acc, i| acc | ((((word >> (i * 2)) & 1) as u8) << i))
}

/// Split a buffer into Amiga odd/even form: the odd bits of every 16-bit word of the whole
/// buffer, followed by the even bits. The buffer length must be even.
pub fn amiga_interleave(data: &[u8]) -> Vec<u8> {
    debug_assert!(data.len() % 2 == 0);
    let words: Vec<u16> = data
        .chunks_exact(2)
        .map(|w| u16::from_be_bytes([w[0], w[1]]))
        .collect();

    let mut out = Vec::with_capacity(data.len());
    out.extend(words.iter().map(|w| compact(w >> 1)));
    out.extend(words.iter().map(|w| compact(*w)));
    out
}

/// Reverse [amiga_interleave].
pub fn amiga_deinterleave(data: &[u8]) -> Vec<u8> {
    debug_assert!(data.len() % 2 == 0);
    let half = data.len() / 2;
    let (odd, even) = data.split_at(half);

    let mut out = Vec::with_capacity(data.len());
    for (o, e) in odd.iter().zip(even) {
        let word = (spread(*o) << 1) | spread(*e);
        out.extend_from_slice(&word.to_be_bytes());
    }
    out
}

/// Interleave and MFM-encode `data` as it is laid out in an Amiga sector.
pub fn amiga_mfm_raw(data: &[u8], last_bit: &mut bool) -> BitVec {
    encode_bits(&amiga_interleave(data), last_bit)
}
