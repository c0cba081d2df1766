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

    src/bitstream_codec/gcr.rs

    GCR symbol tables for Commodore, Apple II, Macintosh and Brother encodings.
*/

//! GCR (Group Coded Recording) symbol tables and bulk helpers.
//!
//! A GCR table maps short data values onto longer code words that never contain long runs of
//! zeros. Decoding a code word that is not in the table yields `None`; it is never mapped to a
//! nearby value.

use bit_vec::BitVec;
use std::fmt::{self, Display, Formatter};
use strum::EnumIter;

pub const C64_GCR_BYTE_LEN: usize = 10;
pub const APPLE2_SECTOR_LEN: usize = 256;
pub const APPLE2_ENCODED_SECTOR_LEN: usize = 342;
const APPLE2_TWOBIT_COUNT: usize = 86;
pub const MAC_SECTOR_LEN: usize = 524;
pub const MAC_ENCODED_SECTOR_LEN: usize = 703;
const MAC_GROUPS: usize = MAC_SECTOR_LEN / 3;
pub const BROTHER_DATA_ENCODED_LEN: usize = 415;

const INVALID: u8 = 0xFF;

/// 4-to-5 bit code used by Commodore 1541 drives and the Victor 9000.
static COMMODORE_GCR: [u8; 16] = [
    0x0A, 0x0B, 0x12, 0x13, 0x0E, 0x0F, 0x16, 0x17, 0x09, 0x19, 0x1A, 0x1B, 0x0D, 0x1D, 0x1E, 0x15,
];

/// 6-to-8 bit "disk byte" code used by Apple II DOS 3.3 and ProDOS.
static APPLE2_GCR: [u8; 64] = [
    0x96, 0x97, 0x9A, 0x9B, 0x9D, 0x9E, 0x9F, 0xA6, 0xA7, 0xAB, 0xAC, 0xAD, 0xAE, 0xAF, 0xB2, 0xB3,
    0xB4, 0xB5, 0xB6, 0xB7, 0xB9, 0xBA, 0xBB, 0xBC, 0xBD, 0xBE, 0xBF, 0xCB, 0xCD, 0xCE, 0xCF, 0xD3,
    0xD6, 0xD7, 0xD9, 0xDA, 0xDB, 0xDC, 0xDD, 0xDE, 0xDF, 0xE5, 0xE6, 0xE7, 0xE9, 0xEA, 0xEB, 0xEC,
    0xED, 0xEE, 0xEF, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF9, 0xFA, 0xFB, 0xFC, 0xFD, 0xFE, 0xFF,
];

/// 5-to-8 bit code used by Brother word processor data records. Every code starts with a 1 bit
/// and has no two adjacent 0 bits, so no run of 1s inside data can reach a record sync.
static BROTHER_GCR: [u8; 32] = [
    0xAA, 0xAB, 0xAD, 0xAE, 0xAF, 0xB5, 0xB6, 0xB7, 0xBA, 0xBB, 0xBD, 0xBE, 0xBF, 0xD5, 0xD6, 0xD7,
    0xDA, 0xDB, 0xDD, 0xDE, 0xDF, 0xEA, 0xEB, 0xED, 0xEE, 0xEF, 0xF5, 0xF6, 0xF7, 0xFA, 0xFB, 0xFD,
];

const fn build_reverse<const N: usize>(table: &[u8; N]) -> [u8; 256] {
    let mut reverse = [INVALID; 256];
    let mut i = 0;
    while i < N {
        reverse[table[i] as usize] = i as u8;
        i += 1;
    }
    reverse
}

static COMMODORE_REVERSE: [u8; 256] = build_reverse(&COMMODORE_GCR);
static APPLE2_REVERSE: [u8; 256] = build_reverse(&APPLE2_GCR);
static BROTHER_REVERSE: [u8; 256] = build_reverse(&BROTHER_GCR);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GcrScheme {
    Commodore4to5,
    Apple6and2,
    Brother5in8,
}

impl Display for GcrScheme {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            GcrScheme::Commodore4to5 => write!(f, "Commodore 4-to-5"),
            GcrScheme::Apple6and2 => write!(f, "Apple 6-and-2"),
            GcrScheme::Brother5in8 => write!(f, "Brother 5-in-8"),
        }
    }
}

/// A bidirectional view of one GCR table.
#[derive(Copy, Clone, Debug)]
pub struct GcrTable {
    scheme: GcrScheme,
    forward: &'static [u8],
    reverse: &'static [u8; 256],
}

impl GcrTable {
    pub fn new(scheme: GcrScheme) -> Self {
        match scheme {
            GcrScheme::Commodore4to5 => GcrTable {
                scheme,
                forward: &COMMODORE_GCR,
                reverse: &COMMODORE_REVERSE,
            },
            GcrScheme::Apple6and2 => GcrTable {
                scheme,
                forward: &APPLE2_GCR,
                reverse: &APPLE2_REVERSE,
            },
            GcrScheme::Brother5in8 => GcrTable {
                scheme,
                forward: &BROTHER_GCR,
                reverse: &BROTHER_REVERSE,
            },
        }
    }

    pub fn scheme(&self) -> GcrScheme {
        self.scheme
    }

    /// Number of data values in the table.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Width of a code word in bits.
    pub fn code_width(&self) -> usize {
        match self.scheme {
            GcrScheme::Commodore4to5 => 5,
            GcrScheme::Apple6and2 | GcrScheme::Brother5in8 => 8,
        }
    }

    pub fn encode(&self, value: u8) -> Option<u16> {
        self.forward.get(value as usize).map(|c| *c as u16)
    }

    pub fn decode(&self, code: u16) -> Option<u8> {
        match self.reverse.get(code as usize) {
            Some(&INVALID) | None => None,
            Some(v) => Some(*v),
        }
    }
}

#[inline]
fn c64_nibble(code: u16) -> Option<u8> {
    match COMMODORE_REVERSE.get(code as usize) {
        Some(&INVALID) | None => None,
        Some(v) => Some(*v),
    }
}

/// Encode one byte as a 10-bit Commodore GCR word, high nibble first.
pub fn encode_c64_byte(byte: u8) -> u16 {
    let hi = COMMODORE_GCR[(byte >> 4) as usize] as u16;
    let lo = COMMODORE_GCR[(byte & 0x0F) as usize] as u16;
    (hi << 5) | lo
}

/// Decode one 10-bit Commodore GCR word. Returns `None` if either quintuple is undefined.
pub fn decode_c64_word(word: u16) -> Option<u8> {
    let hi = c64_nibble((word >> 5) & 0x1F)?;
    let lo = c64_nibble(word & 0x1F)?;
    Some((hi << 4) | lo)
}

/// Encode `data` as Commodore GCR, appending to `out`.
pub fn encode_c64(data: &[u8], out: &mut BitVec) {
    for &byte in data {
        let word = encode_c64_byte(byte);
        for i in (0..C64_GCR_BYTE_LEN).rev() {
            out.push(word & (1 << i) != 0);
        }
    }
}

/// Encode `data` as Commodore GCR into a new bit vector.
pub fn encode_c64_bytes(data: &[u8]) -> BitVec {
    let mut out = BitVec::with_capacity(data.len() * C64_GCR_BYTE_LEN);
    encode_c64(data, &mut out);
    out
}

fn c64_word_at(bits: &BitVec, offset: usize) -> u16 {
    (offset..offset + C64_GCR_BYTE_LEN).fold(0u16, |acc, i| (acc << 1) | bits[i] as u16)
}

/// Decode `count` Commodore GCR bytes starting at bit `offset`.
/// Returns `None` if the bits run out or any quintuple is undefined.
pub fn decode_c64_bytes(bits: &BitVec, offset: usize, count: usize) -> Option<Vec<u8>> {
    if offset + count * C64_GCR_BYTE_LEN > bits.len() {
        return None;
    }
    (0..count)
        .map(|i| decode_c64_word(c64_word_at(bits, offset + i * C64_GCR_BYTE_LEN)))
        .collect()
}

/// Decode up to `count` Commodore GCR bytes starting at bit `offset`, substituting 0 for
/// undefined symbols. Returns the bytes and the number of undefined symbols found.
pub fn decode_c64_bytes_lossy(bits: &BitVec, offset: usize, count: usize) -> (Vec<u8>, usize) {
    let available = bits.len().saturating_sub(offset) / C64_GCR_BYTE_LEN;
    let mut invalid = 0;
    let bytes = (0..count.min(available))
        .map(|i| {
            let word = c64_word_at(bits, offset + i * C64_GCR_BYTE_LEN);
            decode_c64_word(word).unwrap_or_else(|| {
                invalid += 1;
                0
            })
        })
        .collect();
    (bytes, invalid)
}

/// Apple II 4-and-4 encoding: odd bits then even bits, each padded with 1 clock bits.
pub fn encode_44(value: u8) -> u16 {
    ((value as u16) << 7) | value as u16 | 0xAAAA
}

pub fn decode_44(word: u16) -> u8 {
    (word & (word >> 7)) as u8
}

/// Encode a 256-byte sector as 342 6-and-2 disk bytes plus a checksum disk byte.
pub fn encode_6and2(data: &[u8; 256]) -> Vec<u8> {
    encode_6and2_with(data, false)
}

/// Encode a 6-and-2 sector, optionally inverting the checksum so that the sector reads back
/// with a bad checksum.
pub(crate) fn encode_6and2_with(data: &[u8; 256], corrupt_checksum: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(APPLE2_ENCODED_SECTOR_LEN + 1);
    let mut previous = 0u8;

    for i in 0..APPLE2_ENCODED_SECTOR_LEN {
        let value = if i >= APPLE2_TWOBIT_COUNT {
            data[i - APPLE2_TWOBIT_COUNT] >> 2
        }
        else {
            // Three pairs of low bits, each pair swapped.
            let mut v = ((data[i] & 1) << 1) | ((data[i] & 2) >> 1);
            let d = data[i + APPLE2_TWOBIT_COUNT];
            v |= ((d & 1) << 3) | ((d & 2) << 1);
            if i + 2 * APPLE2_TWOBIT_COUNT < APPLE2_SECTOR_LEN {
                let d = data[i + 2 * APPLE2_TWOBIT_COUNT];
                v |= ((d & 1) << 5) | ((d & 2) << 3);
            }
            v
        };
        out.push(APPLE2_GCR[(value ^ previous) as usize]);
        previous = value;
    }

    let checksum = if corrupt_checksum { previous ^ 0x3F } else { previous };
    out.push(APPLE2_GCR[checksum as usize]);
    out
}

/// Decode 342 6-and-2 disk bytes plus checksum. Returns the 256 data bytes and whether the
/// checksum matched, or `None` if fewer than 343 disk bytes are supplied. An undefined disk
/// byte fails the checksum.
pub fn decode_6and2(disk_bytes: &[u8]) -> Option<(Vec<u8>, bool)> {
    if disk_bytes.len() < APPLE2_ENCODED_SECTOR_LEN + 1 {
        return None;
    }
    let mut output = vec![0u8; APPLE2_SECTOR_LEN];
    let mut checksum = 0u8;
    let mut symbols_ok = true;

    for (i, &disk_byte) in disk_bytes[..APPLE2_ENCODED_SECTOR_LEN].iter().enumerate() {
        let value = match APPLE2_REVERSE[disk_byte as usize] {
            INVALID => {
                symbols_ok = false;
                0
            }
            v => v,
        };
        checksum ^= value;

        if i >= APPLE2_TWOBIT_COUNT {
            output[i - APPLE2_TWOBIT_COUNT] |= checksum << 2;
        }
        else {
            output[i] = ((checksum >> 1) & 0x01) | ((checksum << 1) & 0x02);
            output[i + APPLE2_TWOBIT_COUNT] = ((checksum >> 3) & 0x01) | ((checksum >> 1) & 0x02);
            if i + 2 * APPLE2_TWOBIT_COUNT < APPLE2_SECTOR_LEN {
                output[i + 2 * APPLE2_TWOBIT_COUNT] = ((checksum >> 5) & 0x01) | ((checksum >> 3) & 0x02);
            }
        }
    }

    let wanted = APPLE2_REVERSE[disk_bytes[APPLE2_ENCODED_SECTOR_LEN] as usize];
    let ok = symbols_ok && wanted != INVALID && (checksum & 0x3F) == wanted;
    Some((output, ok))
}

/// Encode a Macintosh sector of 524 bytes (12 tag bytes, then 512 data bytes) as 699 disk bytes
/// plus four checksum disk bytes. Bytes are taken in threes, each XORed with a rolling
/// checksum, and their top two bits are gathered into a fourth 6-bit value.
pub fn encode_mac_6and2(data: &[u8; MAC_SECTOR_LEN]) -> Vec<u8> {
    encode_mac_6and2_with(data, false)
}

/// Encode a Macintosh sector, optionally corrupting the checksum so that the sector reads back
/// with a bad checksum.
pub(crate) fn encode_mac_6and2_with(data: &[u8; MAC_SECTOR_LEN], corrupt_checksum: bool) -> Vec<u8> {
    let mut b1 = [0u8; MAC_GROUPS + 1];
    let mut b2 = [0u8; MAC_GROUPS + 1];
    let mut b3 = [0u8; MAC_GROUPS + 1];
    let (mut c1, mut c2, mut c3) = (0u32, 0u32, 0u32);
    let mut input = data.iter().map(|b| *b as u32);
    let mut j = 0;

    while let (Some(v1), Some(v2)) = (input.next(), input.next()) {
        c1 = (c1 & 0xFF) << 1;
        if c1 & 0x100 != 0 {
            c1 += 1;
        }
        c3 += v1;
        if c1 & 0x100 != 0 {
            c3 += 1;
            c1 &= 0xFF;
        }
        b1[j] = (v1 ^ c1) as u8;

        c2 += v2;
        if c3 > 0xFF {
            c2 += 1;
            c3 &= 0xFF;
        }
        b2[j] = (v2 ^ c3) as u8;

        let Some(v3) = input.next()
        else {
            break;
        };
        c1 += v3;
        if c2 > 0xFF {
            c1 += 1;
            c2 &= 0xFF;
        }
        b3[j] = (v3 ^ c2) as u8;
        j += 1;
    }

    let mut out = Vec::with_capacity(MAC_ENCODED_SECTOR_LEN);
    for i in 0..=MAC_GROUPS {
        let w4 = ((b1[i] & 0xC0) >> 2) | ((b2[i] & 0xC0) >> 4) | ((b3[i] & 0xC0) >> 6);
        out.extend([w4, b1[i] & 0x3F, b2[i] & 0x3F]);
        if i != MAC_GROUPS {
            out.push(b3[i] & 0x3F);
        }
    }

    let c4 = ((c1 & 0xC0) >> 6) | ((c2 & 0xC0) >> 4) | ((c3 & 0xC0) >> 2);
    if corrupt_checksum {
        c1 ^= 0x3F;
    }
    out.extend([c4, c3, c2, c1].map(|c| (c & 0x3F) as u8));
    out.iter().map(|v| APPLE2_GCR[*v as usize]).collect()
}

/// Decode 703 Macintosh disk bytes. Returns the 524 sector bytes in disk order (tags first) and
/// whether the checksum matched, or `None` if too few disk bytes are supplied. An undefined disk
/// byte fails the checksum.
pub fn decode_mac_6and2(disk_bytes: &[u8]) -> Option<(Vec<u8>, bool)> {
    if disk_bytes.len() < MAC_ENCODED_SECTOR_LEN {
        return None;
    }
    let mut symbols_ok = true;
    let mut values = disk_bytes[..MAC_ENCODED_SECTOR_LEN].iter().map(|b| match APPLE2_REVERSE[*b as usize] {
        INVALID => {
            symbols_ok = false;
            0u8
        }
        v => v,
    });
    let mut next = || values.next().unwrap_or(0);

    let mut b1 = [0u8; MAC_GROUPS + 1];
    let mut b2 = [0u8; MAC_GROUPS + 1];
    let mut b3 = [0u8; MAC_GROUPS + 1];
    for i in 0..=MAC_GROUPS {
        let w4 = next();
        let w1 = next();
        let w2 = next();
        let w3 = if i != MAC_GROUPS { next() } else { 0 };
        b1[i] = (w1 & 0x3F) | ((w4 << 2) & 0xC0);
        b2[i] = (w2 & 0x3F) | ((w4 << 4) & 0xC0);
        b3[i] = (w3 & 0x3F) | ((w4 << 6) & 0xC0);
    }

    let mut output = Vec::with_capacity(MAC_SECTOR_LEN);
    let (mut c1, mut c2, mut c3) = (0u32, 0u32, 0u32);
    let mut count = 0;
    loop {
        c1 = (c1 & 0xFF) << 1;
        if c1 & 0x100 != 0 {
            c1 += 1;
        }
        let v = b1[count] ^ c1 as u8;
        c3 += v as u32;
        if c1 & 0x100 != 0 {
            c3 += 1;
            c1 &= 0xFF;
        }
        output.push(v);

        let v = b2[count] ^ c3 as u8;
        c2 += v as u32;
        if c3 > 0xFF {
            c2 += 1;
            c3 &= 0xFF;
        }
        output.push(v);

        if output.len() == MAC_SECTOR_LEN {
            break;
        }

        let v = b3[count] ^ c2 as u8;
        c1 += v as u32;
        if c2 > 0xFF {
            c1 += 1;
            c2 &= 0xFF;
        }
        output.push(v);
        count += 1;
    }

    let c4 = ((c1 & 0xC0) >> 6) | ((c2 & 0xC0) >> 4) | ((c3 & 0xC0) >> 2);
    let wanted = [next(), next(), next(), next()];
    let calculated = [c4, c3, c2, c1].map(|c| (c & 0x3F) as u8);
    Some((output, symbols_ok && wanted == calculated))
}

/// Encode one Brother header value as a 16-bit word: the 5-in-8 codes of its two nibbles.
pub fn encode_brother_header(value: u8) -> u16 {
    ((BROTHER_GCR[(value >> 4) as usize] as u16) << 8) | BROTHER_GCR[(value & 0x0F) as usize] as u16
}

/// Decode a Brother header word. Returns `None` unless both bytes are codes for a nibble.
pub fn decode_brother_header(word: u16) -> Option<u8> {
    let hi = BROTHER_REVERSE[(word >> 8) as usize];
    let lo = BROTHER_REVERSE[(word & 0xFF) as usize];
    (hi < 0x10 && lo < 0x10).then_some((hi << 4) | lo)
}

/// Encode bytes as Brother 5-in-8 disk bytes. The bit stream is padded with 0 bytes until it
/// divides into whole quintets.
pub fn encode_brother_data(data: &[u8]) -> Vec<u8> {
    let mut bytes = data.to_vec();
    while (bytes.len() * 8) % 5 != 0 {
        bytes.push(0);
    }
    let bits = BitVec::from_bytes(&bytes);
    (0..bits.len() / 5)
        .map(|q| {
            let value = (q * 5..q * 5 + 5).fold(0usize, |acc, i| (acc << 1) | bits[i] as usize);
            BROTHER_GCR[value]
        })
        .collect()
}

/// Decode Brother 5-in-8 disk bytes into packed bytes, substituting 0 for undefined codes.
/// Returns the bytes and the number of undefined codes found.
pub fn decode_brother_data(disk_bytes: &[u8]) -> (Vec<u8>, usize) {
    let mut bits = BitVec::with_capacity(disk_bytes.len() * 5);
    let mut invalid = 0;
    for byte in disk_bytes {
        let value = match BROTHER_REVERSE[*byte as usize] {
            INVALID => {
                invalid += 1;
                0
            }
            v => v,
        };
        for i in (0..5).rev() {
            bits.push(value & (1 << i) != 0);
        }
    }
    let whole = bits.len() / 8;
    bits.truncate(whole * 8);
    (bits.to_bytes(), invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn tables_are_bijective() {
        for scheme in GcrScheme::iter() {
            let table = GcrTable::new(scheme);
            for v in 0..table.len() as u8 {
                let code = table.encode(v).unwrap();
                assert_eq!(table.decode(code), Some(v), "{}", scheme);
            }
            let defined = (0..256u16).filter(|c| table.decode(*c).is_some()).count();
            assert_eq!(defined, table.len());
            assert!(table.encode(table.len() as u8).is_none());
        }
    }

    #[test]
    fn c64_words() {
        assert_eq!(encode_c64_byte(0x08), (0x0A << 5) | 0x09);
        assert_eq!(decode_c64_word(encode_c64_byte(0xA5)), Some(0xA5));
        // 00000 is never a valid quintuple.
        assert_eq!(decode_c64_word(0x0000), None);
        let bits = encode_c64_bytes(&[0x07, 0x55, 0x0F]);
        assert_eq!(decode_c64_bytes(&bits, 0, 3), Some(vec![0x07, 0x55, 0x0F]));
        assert_eq!(decode_c64_bytes(&bits, 0, 4), None);
    }

    #[test]
    fn apple_44() {
        assert_eq!(encode_44(0xFE), 0xFFFE);
        for v in 0..=255u8 {
            assert_eq!(decode_44(encode_44(v)), v);
        }
    }

    #[test]
    fn apple_6and2() {
        let mut data = [0u8; 256];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37) ^ 0x5A;
        }
        let disk = encode_6and2(&data);
        assert_eq!(disk.len(), 343);
        assert!(disk.iter().all(|b| b & 0x80 != 0));
        let (decoded, ok) = decode_6and2(&disk).unwrap();
        assert!(ok);
        assert_eq!(decoded, data.to_vec());

        let bad = encode_6and2_with(&data, true);
        let (decoded, ok) = decode_6and2(&bad).unwrap();
        assert!(!ok);
        assert_eq!(decoded, data.to_vec());

        assert!(decode_6and2(&disk[..100]).is_none());
    }

    #[test]
    fn mac_6and2() {
        let mut data = [0u8; MAC_SECTOR_LEN];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(91) ^ (i >> 8) as u8;
        }
        let disk = encode_mac_6and2(&data);
        assert_eq!(disk.len(), MAC_ENCODED_SECTOR_LEN);
        assert!(disk.iter().all(|b| APPLE2_REVERSE[*b as usize] != INVALID));
        assert_eq!(decode_mac_6and2(&disk), Some((data.to_vec(), true)));

        let (decoded, ok) = decode_mac_6and2(&encode_mac_6and2_with(&data, true)).unwrap();
        assert!(!ok);
        assert_eq!(decoded, data.to_vec());

        let (_, ok) = decode_mac_6and2(&encode_mac_6and2(&[0xFF; MAC_SECTOR_LEN])).unwrap();
        assert!(ok);
        assert!(decode_mac_6and2(&disk[..700]).is_none());
    }

    #[test]
    fn brother_header_words() {
        for v in 0..=255u8 {
            assert_eq!(decode_brother_header(encode_brother_header(v)), Some(v));
        }
        assert_eq!(encode_brother_header(0x00), 0xAAAA);
        // 0xFD is a code for 31, which is not a nibble.
        assert_eq!(decode_brother_header(0xFDAA), None);
        assert_eq!(decode_brother_header(0x00AA), None);
    }

    #[test]
    fn brother_data() {
        let data: Vec<u8> = (0..=255u8).chain([0x12, 0x34, 0x56, 0x58, 0xD4]).collect();
        let disk = encode_brother_data(&data);
        // 261 bytes pad to 265, which is 424 quintets.
        assert_eq!(disk.len(), 424);
        assert!(disk.iter().all(|b| b & 0x80 != 0));

        let (decoded, invalid) = decode_brother_data(&disk[..BROTHER_DATA_ENCODED_LEN]);
        assert_eq!(invalid, 0);
        assert_eq!(&decoded[..259], &data[..259]);

        let mut broken = disk.clone();
        broken[0] = 0x00;
        let (_, invalid) = decode_brother_data(&broken);
        assert_eq!(invalid, 1);
    }
}
