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

//! Apple II DOS 3.3 sixteen-sector layout.
//!
//! The address field carries volume, track, sector and checksum in 4-and-4 encoding. The data
//! field carries 342 6-and-2 disk bytes plus a checksum. Disk bytes always have their top bit
//! set; the drive controller shifts in bits until it sees one, so sync runs are written as
//! 1 bits followed by extra 0 bits that the controller skips.

use crate::{
    bitstream_codec::gcr::{decode_44, decode_6and2, encode_44, encode_6and2_with, APPLE2_ENCODED_SECTOR_LEN, APPLE2_SECTOR_LEN},
    sector::Sector,
    sync::RawRecord,
    track::writer::TrackWriter,
    track_schema::{attach_data, validate_timing, DecodeContext, HeaderState, TrackTiming},
    types::{DiskCh, DiskChs, SectorStatus},
    CodecError,
};
use bit_vec::BitVec;

pub const APPLE2_ADDRESS_RECORD: u64 = 0xD5AA96;
pub const APPLE2_DATA_RECORD: u64 = 0xD5AAAD;
pub const APPLE2_EPILOGUE: u64 = 0xDEAAEB;
pub const APPLE2_RECORD_LEN: usize = 24;
pub const APPLE2_SECTORS: u8 = 16;
pub const DEFAULT_VOLUME: u8 = 254;

/// Tracks above this are not plausible and indicate a misread header.
const MAX_TRACK: u8 = 100;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Apple2Layout {
    pub target_clock_period_us: f64,
    pub target_rotational_period_ms: f64,
    pub volume: u8,
    /// Physical cylinders per logical track: 2 on an 80-track drive, 1 on a 40-track drive.
    pub step: u16,
    /// Subtracted from the header track of sectors on side 1.
    pub side_one_track_offset: u16,
}

impl Default for Apple2Layout {
    fn default() -> Self {
        Apple2Layout {
            target_clock_period_us: 4.0,
            target_rotational_period_ms: 200.0,
            volume: DEFAULT_VOLUME,
            step: 2,
            side_one_track_offset: 0,
        }
    }
}

impl Apple2Layout {
    pub fn with_clock_period_us(mut self, period: f64) -> Self {
        self.target_clock_period_us = period;
        self
    }

    pub fn with_rotational_period_ms(mut self, period: f64) -> Self {
        self.target_rotational_period_ms = period;
        self
    }

    pub fn with_volume(mut self, volume: u8) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_step(mut self, step: u16) -> Self {
        self.step = step;
        self
    }

    pub fn with_side_one_track_offset(mut self, offset: u16) -> Self {
        self.side_one_track_offset = offset;
        self
    }

    /// The logical track stored on `physical`.
    pub fn logical_track(&self, physical: DiskCh) -> u16 {
        physical.c() / self.step.max(1)
    }
}

/// Read one self-synced disk byte: skip bits until a 1 arrives, then take eight bits.
fn read_disk_byte(bits: &BitVec, pos: &mut usize) -> Option<u8> {
    let mut value = 0u8;
    while value & 0x80 == 0 {
        let bit = bits.get(*pos)?;
        *pos += 1;
        value = (value << 1) | bit as u8;
    }
    Some(value)
}

pub struct Apple2Schema;

impl Apple2Schema {
    pub(crate) fn timing(layout: &Apple2Layout) -> TrackTiming {
        TrackTiming::new(layout.target_clock_period_us, layout.target_rotational_period_ms)
    }

    pub(crate) fn expected_sectors(layout: &Apple2Layout, physical: DiskCh) -> Vec<DiskChs> {
        let track = layout.logical_track(physical);
        (0..APPLE2_SECTORS)
            .map(|s| DiskChs::new(track, physical.h(), s))
            .collect()
    }

    pub(crate) fn match_record(fifo: u64) -> Option<usize> {
        match fifo & 0xFF_FFFF {
            APPLE2_ADDRESS_RECORD | APPLE2_DATA_RECORD => Some(APPLE2_RECORD_LEN),
            _ => None,
        }
    }

    pub(crate) fn validate(layout: &Apple2Layout) -> Result<(), CodecError> {
        validate_timing(
            "Apple2",
            layout.target_clock_period_us,
            layout.target_rotational_period_ms,
        )?;
        if layout.step == 0 {
            return Err(CodecError::InvalidLayout("Apple2: track step is 0".to_string()));
        }
        Ok(())
    }

    pub(crate) fn decode_records(layout: &Apple2Layout, ctx: &DecodeContext, records: &[RawRecord]) -> Vec<Sector> {
        let mut sectors = Vec::new();
        let mut state = HeaderState::Seeking;

        for raw in records {
            match raw.read_raw(0, APPLE2_RECORD_LEN) {
                Some(APPLE2_ADDRESS_RECORD) => {
                    state.take().flush(&mut sectors);
                    if let Some(sector) = Self::decode_address(layout, ctx, raw) {
                        state = HeaderState::HeaderFound {
                            sector,
                            data_len: APPLE2_SECTOR_LEN,
                        };
                    }
                }
                Some(APPLE2_DATA_RECORD) => match state.take() {
                    HeaderState::HeaderFound { mut sector, .. } => {
                        Self::decode_data(ctx, raw, &mut sector);
                        sectors.push(sector);
                    }
                    HeaderState::Seeking => {
                        log::trace!(
                            "Apple2Schema::decode_records(): Data field at bit {} without an address field",
                            raw.start
                        );
                    }
                },
                _ => {}
            }
        }
        state.flush(&mut sectors);
        sectors
    }

    fn decode_address(layout: &Apple2Layout, ctx: &DecodeContext, raw: &RawRecord) -> Option<Sector> {
        let mut fields = [0u8; 4];
        for (i, field) in fields.iter_mut().enumerate() {
            *field = decode_44(raw.read_raw(APPLE2_RECORD_LEN + i * 16, 16)? as u16);
        }
        let [volume, track, sector, checksum] = fields;

        if checksum != volume ^ track ^ sector {
            log::trace!(
                "Apple2Schema::decode_address(): Bad address checksum at bit {}: {:02X} calculated: {:02X}",
                raw.start,
                checksum,
                volume ^ track ^ sector
            );
            return None;
        }
        if track > MAX_TRACK {
            log::trace!(
                "Apple2Schema::decode_address(): Implausible track {} at bit {}",
                track,
                raw.start
            );
            return None;
        }

        let h = ctx.physical.h();
        let c = if h == 1 {
            (track as u16).saturating_sub(layout.side_one_track_offset)
        }
        else {
            track as u16
        };
        let record = ctx.record(raw, APPLE2_RECORD_LEN + 4 * 16, fields.to_vec());
        Some(ctx.header_sector(DiskChs::new(c, h, sector), record))
    }

    fn decode_data(ctx: &DecodeContext, raw: &RawRecord, sector: &mut Sector) {
        let mut pos = APPLE2_RECORD_LEN;
        let mut disk_bytes = Vec::with_capacity(APPLE2_ENCODED_SECTOR_LEN + 1);
        while disk_bytes.len() < APPLE2_ENCODED_SECTOR_LEN + 1 {
            match read_disk_byte(&raw.bits, &mut pos) {
                Some(byte) => disk_bytes.push(byte),
                None => break,
            }
        }

        let (data, status) = match decode_6and2(&disk_bytes) {
            Some((data, true)) => (data, SectorStatus::Ok),
            Some((data, false)) => {
                log::debug!(
                    "Apple2Schema::decode_data(): Checksum error in sector {}",
                    sector.logical
                );
                (data, SectorStatus::BadChecksum)
            }
            None => {
                log::debug!(
                    "Apple2Schema::decode_data(): Data field for sector {} truncated at {} disk bytes",
                    sector.logical,
                    disk_bytes.len()
                );
                (Vec::new(), SectorStatus::BadChecksum)
            }
        };

        let record = ctx.record(raw, pos, disk_bytes);
        attach_data(sector, data, status, record);
    }

    pub(crate) fn encode_sectors(
        layout: &Apple2Layout,
        physical: DiskCh,
        sectors: &[Sector],
        writer: &mut TrackWriter,
    ) -> Result<(), CodecError> {
        for sector in sectors.iter().filter(|s| s.is_encodable()) {
            let data: &[u8; APPLE2_SECTOR_LEN] = sector
                .data
                .as_slice()
                .try_into()
                .map_err(|_| CodecError::UnsupportedSectorSize(sector.data.len()))?;

            let mut track = sector.logical.c();
            if sector.logical.h() == 1 {
                track = track.saturating_add(layout.side_one_track_offset);
            }
            let track = u8::try_from(track).map_err(|_| CodecError::InvalidSector(sector.logical))?;
            let s = sector.logical.s();

            // Address field
            writer.write_raw_repeat(0xFF0, 12, 4);
            writer.write_raw(0xFF, 8);
            writer.write_raw(APPLE2_ADDRESS_RECORD, APPLE2_RECORD_LEN);
            for field in [layout.volume, track, s, layout.volume ^ track ^ s] {
                writer.write_raw(encode_44(field) as u64, 16);
            }
            writer.write_raw(APPLE2_EPILOGUE, 24);
            writer.write_raw(0, 13);

            // Data field
            writer.write_raw_repeat(0xFF0, 12, 4);
            writer.write_raw(0xFF << 2, 10);
            writer.write_raw(APPLE2_DATA_RECORD, APPLE2_RECORD_LEN);
            let disk_bytes = encode_6and2_with(data, sector.status == SectorStatus::BadChecksum);
            writer.write_raw_bytes(&disk_bytes);
            writer.write_raw(APPLE2_EPILOGUE, 24);
        }

        log::trace!(
            "Apple2Schema::encode_sectors(): Wrote {} in {} bits",
            physical,
            writer.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::extract_records;

    fn round_trip(layout: &Apple2Layout, physical: DiskCh, sectors: &[Sector]) -> Vec<Sector> {
        let mut writer = TrackWriter::new(Apple2Schema::timing(layout).capacity_bits());
        Apple2Schema::encode_sectors(layout, physical, sectors, &mut writer).unwrap();
        let (bits, _) = writer.finish(0b10, 2).unwrap();
        let records = extract_records(&bits, &Apple2Schema::match_record);
        let ctx = DecodeContext::new(physical, &[], 4e-6);
        Apple2Schema::decode_records(layout, &ctx, &records)
    }

    fn track_sectors(layout: &Apple2Layout, physical: DiskCh) -> Vec<Sector> {
        Apple2Schema::expected_sectors(layout, physical)
            .into_iter()
            .map(|chs| {
                let data = (0..256).map(|i| (i as u8).wrapping_mul(7) ^ chs.s()).collect();
                Sector::new(physical, chs, data)
            })
            .collect()
    }

    #[test]
    fn self_synced_bytes() {
        // Two leading 0 bits before 0xD5, then 0xAA directly.
        let mut bits = BitVec::from_elem(2, false);
        bits.extend(BitVec::from_bytes(&[0xD5, 0xAA]).iter());
        let mut pos = 0;
        assert_eq!(read_disk_byte(&bits, &mut pos), Some(0xD5));
        assert_eq!(read_disk_byte(&bits, &mut pos), Some(0xAA));
        assert_eq!(read_disk_byte(&bits, &mut pos), None);
    }

    #[test]
    fn full_track_round_trip() {
        let layout = Apple2Layout::default();
        let physical = DiskCh::new(34, 0);
        let sectors = track_sectors(&layout, physical);
        let decoded = round_trip(&layout, physical, &sectors);

        assert_eq!(decoded.len(), 16);
        for (original, sector) in sectors.iter().zip(&decoded) {
            assert_eq!(sector.status, SectorStatus::Ok);
            assert_eq!(sector.logical, DiskChs::new(17, 0, original.logical.s()));
            assert_eq!(sector.data, original.data);
        }
    }

    #[test]
    fn bad_checksum_round_trip() {
        let layout = Apple2Layout::default().with_step(1);
        let physical = DiskCh::new(3, 0);
        let mut sectors = track_sectors(&layout, physical);
        sectors.truncate(2);
        sectors[1].status = SectorStatus::BadChecksum;
        let decoded = round_trip(&layout, physical, &sectors);
        assert_eq!(decoded[0].status, SectorStatus::Ok);
        assert_eq!(decoded[1].status, SectorStatus::BadChecksum);
        assert_eq!(decoded[1].data, sectors[1].data);
    }

    #[test]
    fn wrong_size_rejected() {
        let layout = Apple2Layout::default();
        let sector = Sector::new(DiskCh::new(0, 0), DiskChs::new(0, 0, 0), vec![0; 512]);
        let mut writer = TrackWriter::new(50_000);
        assert!(matches!(
            Apple2Schema::encode_sectors(&layout, DiskCh::new(0, 0), &[sector], &mut writer),
            Err(CodecError::UnsupportedSectorSize(512))
        ));
    }

    #[test]
    fn zero_step_invalid() {
        assert!(Apple2Schema::validate(&Apple2Layout::default().with_step(0)).is_err());
    }
}
