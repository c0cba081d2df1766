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

//! Checksum and CRC functions shared by the track schemas.
//!
//! Every function here is pure. Architecture modules pick the one their record format defines.

/// Calculate a CRC-16/IBM-3740 (CCITT-FALSE) over `data`: poly 0x1021, initial value 0xFFFF.
///
/// Passing the result of a previous call as `start` continues the calculation, so a CRC over
/// marker bytes and payload can be computed in two steps.
pub fn crc_ibm_3740(data: &[u8], start: Option<u16>) -> u16 {
    const POLY: u16 = 0x1021;
    let mut crc = start.unwrap_or(0xFFFF);

    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ POLY } else { crc << 1 };
        }
    }
    crc
}

/// Calculate the 24-bit CRC that protects Brother word processor data records: poly 0x864CFB,
/// initial value 0, MSB first.
pub fn crc_brother(data: &[u8]) -> u32 {
    const POLY: u32 = 0x86_4CFB;
    let mut crc = 0u32;

    for byte in data {
        crc ^= (*byte as u32) << 16;
        for _ in 0..8 {
            crc = if crc & 0x80_0000 != 0 { (crc << 1) ^ POLY } else { crc << 1 };
        }
        crc &= 0xFF_FFFF;
    }
    crc
}

/// XOR of all bytes. Used by the Commodore GCR header and data blocks and the Apple II address field.
pub fn xor_bytes(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

/// Wrapping 16-bit sum of all bytes. Used by Victor 9000 data blocks.
pub fn sum_bytes(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |acc, b| acc.wrapping_add(*b as u16))
}

/// The Amiga trackdisk checksum: XOR of big-endian 32-bit words, masked to the data bit positions.
/// A trailing partial word is ignored.
pub fn amiga_checksum(raw: &[u8]) -> u32 {
    raw.chunks_exact(4)
        .fold(0u32, |acc, w| acc ^ u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
        & 0x5555_5555
}

/// The North Star checksum: XOR each byte into the accumulator, then rotate left by one bit.
pub fn northstar_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| (acc ^ b).rotate_left(1))
}

/// The Micropolis checksum: an 8-bit sum with end-around carry.
pub fn micropolis_checksum(data: &[u8]) -> u8 {
    let mut sum: u16 = 0;
    for byte in data {
        if sum > 0xFF {
            sum -= 0xFF;
        }
        sum += *byte as u16;
    }
    (sum & 0xFF) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_check_value() {
        assert_eq!(crc_ibm_3740(b"123456789", None), 0x29B1);
    }

    #[test]
    fn crc_continues_from_seed() {
        let marks = crc_ibm_3740(&[0xA1, 0xA1, 0xA1], None);
        assert_eq!(marks, 0xCDB4);
        let idam = crc_ibm_3740(&[0xFE, 0x00, 0x00, 0x01, 0x02], Some(marks));
        assert_eq!(
            idam,
            crc_ibm_3740(&[0xA1, 0xA1, 0xA1, 0xFE, 0x00, 0x00, 0x01, 0x02], None)
        );
        assert_eq!(idam, 0xCA6F);
    }

    #[test]
    fn crc_over_own_crc_is_zero() {
        let mut data = vec![0xA1, 0xA1, 0xA1, 0xFB, 0xE5, 0xE5];
        let crc = crc_ibm_3740(&data, None);
        data.extend_from_slice(&crc.to_be_bytes());
        assert_eq!(crc_ibm_3740(&data, None), 0);
    }

    #[test]
    fn brother_crc_residue() {
        let mut data: Vec<u8> = (0..=255).collect();
        let crc = crc_brother(&data);
        assert!(crc <= 0xFF_FFFF);
        data.extend_from_slice(&crc.to_be_bytes()[1..]);
        assert_eq!(crc_brother(&data), 0);
    }

    #[test]
    fn simple_sums() {
        assert_eq!(xor_bytes(&[0x03, 0x0A, 0x41, 0x42]), 0x03 ^ 0x0A ^ 0x41 ^ 0x42);
        assert_eq!(xor_bytes(&[]), 0);
        assert_eq!(sum_bytes(&[0xFF; 200]), 0xFF * 200);
        assert_eq!(sum_bytes(&[0xFF; 512]), (0xFFu32 * 512) as u16);
    }

    #[test]
    fn amiga_checksum_masks_clock_bits() {
        assert_eq!(amiga_checksum(&[0xFF; 4]), 0x5555_5555);
        assert_eq!(amiga_checksum(&[0xFF; 8]), 0);
        assert_eq!(amiga_checksum(&[0xAA, 0xAA, 0xAA, 0xAA]), 0);
    }

    #[test]
    fn northstar_rotates() {
        assert_eq!(northstar_checksum(&[0x01]), 0x02);
        assert_eq!(northstar_checksum(&[0x80]), 0x01);
        assert_eq!(northstar_checksum(&[0x01, 0x01]), 0x06);
    }

    #[test]
    fn micropolis_end_around_carry() {
        assert_eq!(micropolis_checksum(&[0xFF, 0x02]), 0x01);
        assert_eq!(micropolis_checksum(&[0x80, 0x80, 0x01]), 0x02);
        assert_eq!(micropolis_checksum(&[0x01, 0x02, 0x03]), 0x06);
    }
}
