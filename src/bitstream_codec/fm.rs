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

//! FM (Frequency Modulation) encoding. Every data bit is preceded by a clock bit of 1; address
//! marks replace some clock bits with 0.

use bit_vec::BitVec;

pub const FM_BYTE_LEN: usize = 16;

/// Raw address marks: data FE/FB/F8/FC/FA/FD with their reduced clock patterns.
pub const FM_IDAM: u16 = 0xF57E;
pub const FM_DAM: u16 = 0xF56F;
pub const FM_DDAM: u16 = 0xF56A;
/// Alternate data marks seen on TRS-80 disks.
pub const FM_DAM_TRS80_F9: u16 = 0xF56B;
pub const FM_DAM_TRS80_FA: u16 = 0xF56E;
pub const FM_IAM: u16 = 0xF77A;

pub const FM_MARK_CLOCK: u8 = 0xC7;
pub const FM_IAM_CLOCK: u8 = 0xD7;

/// Every raw FM marker the IBM decoder accepts as the start of a record.
pub const FM_MARKERS: [u16; 5] = [FM_IDAM, FM_DAM, FM_DDAM, FM_DAM_TRS80_F9, FM_DAM_TRS80_FA];

/// Interleave `clock` bits with `data` bits into a raw 16-bit FM word.
pub fn encode_marker(data: u8, clock: u8) -> u16 {
    (0..8).rev().fold(0u16, |acc, i| {
        let c = (clock >> i) & 1;
        let d = (data >> i) & 1;
        (acc << 2) | ((c as u16) << 1) | d as u16
    })
}

/// FM-encode `data`, appending to `out`. `last_bit` holds the final raw bit on return.
pub fn encode(data: &[u8], last_bit: &mut bool, out: &mut BitVec) {
    for &byte in data {
        let word = encode_marker(byte, 0xFF);
        for i in (0..16).rev() {
            out.push(word & (1 << i) != 0);
        }
        *last_bit = byte & 1 != 0;
    }
}

/// FM-encode `data` into a new bit vector.
pub fn encode_bits(data: &[u8], last_bit: &mut bool) -> BitVec {
    let mut out = BitVec::with_capacity(data.len() * FM_BYTE_LEN);
    encode(data, last_bit, &mut out);
    out
}

/// Decode an FM bit sequence starting at a clock bit.
pub fn decode(bits: &BitVec, offset: usize) -> Vec<u8> {
    super::decode_fm_mfm(bits, offset)
}
