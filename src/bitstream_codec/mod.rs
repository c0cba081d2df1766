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

//! Bit-level modulation codecs.
//!
//! [mfm] and [fm] interleave a clock bit before every data bit. They share a decoder, since
//! stripping the clock bits is the same operation for both. [gcr] holds the group-coded
//! symbol tables used by the Commodore, Victor and Apple architectures.

pub mod fm;
pub mod gcr;
pub mod mfm;

use bit_vec::BitVec;

/// Strip clock bits from an FM or MFM bit sequence, returning the data bits packed into bytes.
/// `offset` is the bit position of the first clock bit; data bits are taken from `offset + 1`,
/// `offset + 3`, and so on. Only complete bytes are returned.
pub fn decode_fm_mfm(bits: &BitVec, offset: usize) -> Vec<u8> {
    let available = bits.len().saturating_sub(offset) / 16;
    let mut bytes = Vec::with_capacity(available);

    for byte_idx in 0..available {
        let base = offset + byte_idx * 16;
        let mut byte = 0u8;
        for bit in 0..8 {
            byte = (byte << 1) | bits[base + bit * 2 + 1] as u8;
        }
        bytes.push(byte);
    }
    bytes
}

/// Pack raw bits into bytes MSB first, starting at `offset`. Only complete bytes are returned.
pub fn pack_bits(bits: &BitVec, offset: usize) -> Vec<u8> {
    let available = bits.len().saturating_sub(offset) / 8;
    let mut bytes = Vec::with_capacity(available);

    for byte_idx in 0..available {
        let base = offset + byte_idx * 8;
        let mut byte = 0u8;
        for bit in 0..8 {
            byte = (byte << 1) | bits[base + bit] as u8;
        }
        bytes.push(byte);
    }
    bytes
}

/// Read `width` (at most 64) raw bits starting at `offset` as a big-endian integer.
/// Returns `None` if the range extends past the end of `bits`.
pub fn read_bits(bits: &BitVec, offset: usize, width: usize) -> Option<u64> {
    debug_assert!(width <= 64);
    if offset + width > bits.len() {
        return None;
    }
    Some((offset..offset + width).fold(0u64, |acc, i| (acc << 1) | bits[i] as u64))
}
