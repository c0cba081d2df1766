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

    src/track_schema/micropolis.rs

    Micropolis hard-sectored MFM track layout.
*/

//! Micropolis hard-sectored layout.
//!
//! Sixteen sector holes divide the track into fixed slots. Each slot holds a single MFM record
//! behind a preamble of zero bytes, with the track and sector number stored in the record.

use crate::{
    sector::Sector,
    sync::{merge_segments, RawRecord},
    track::writer::TrackWriter,
    track_schema::{validate_timing, DecodeContext, TrackTiming},
    types::{DiskCh, DiskChs, SectorStatus},
    util::micropolis_checksum,
    CodecError,
};
use binrw::{binrw, BinRead, BinWrite};
use std::io::Cursor;

/// MFM `00 FF`
pub const MICROPOLIS_SYNC: u64 = 0xAAAA_5555;
pub const MICROPOLIS_SYNC_LEN: usize = 32;
/// The record starts at the sync byte, after the last preamble byte.
const RECORD_OFFSET: usize = 16;

pub const MICROPOLIS_SECTORS: u8 = 16;
pub const MICROPOLIS_SECTOR_SIZE: usize = 256;
pub const MICROPOLIS_RECORD_LEN: usize = 275;
const MAX_SECTOR: u8 = 15;
const MAX_TRACK: u8 = 77;
const MAX_ENCODE_TRACK: u16 = 76;

const SYNC_BYTE: u8 = 0xFF;
const PREAMBLE_LEN: usize = 40;
const POSTAMBLE_LEN: usize = 40;
// Track, sector, reserved bytes and payload.
const CHECKSUM_RANGE: std::ops::Range<usize> = 1..269;

#[derive(Debug)]
#[binrw]
#[brw(big)]
pub struct MicropolisRecord {
    pub sync: u8,
    pub track: u8,
    pub sector: u8,
    /// Operating system data, usually zero.
    pub reserved: [u8; 10],
    pub data: [u8; MICROPOLIS_SECTOR_SIZE],
    pub checksum: u8,
    pub ecc: [u8; 4],
    /// Nonzero if `ecc` is present.
    pub ecc_flag: u8,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MicropolisLayout {
    pub target_clock_period_us: f64,
    pub target_rotational_period_ms: f64,
    pub sector_count: u8,
}

impl Default for MicropolisLayout {
    fn default() -> Self {
        MicropolisLayout {
            target_clock_period_us: 2.0,
            target_rotational_period_ms: 200.0,
            sector_count: MICROPOLIS_SECTORS,
        }
    }
}

impl MicropolisLayout {
    pub fn with_clock_period_us(mut self, period: f64) -> Self {
        self.target_clock_period_us = period;
        self
    }

    pub fn with_rotational_period_ms(mut self, period: f64) -> Self {
        self.target_rotational_period_ms = period;
        self
    }

    pub fn with_sector_count(mut self, count: u8) -> Self {
        self.sector_count = count;
        self
    }
}

pub struct MicropolisSchema;

impl MicropolisSchema {
    pub(crate) fn timing(layout: &MicropolisLayout) -> TrackTiming {
        TrackTiming::new(layout.target_clock_period_us, layout.target_rotational_period_ms)
    }

    pub(crate) fn expected_sectors(layout: &MicropolisLayout, physical: DiskCh) -> Vec<DiskChs> {
        (0..layout.sector_count).map(|s| physical.with_sector(s)).collect()
    }

    pub(crate) fn match_record(fifo: u64) -> Option<usize> {
        match fifo & 0xFFFF_FFFF {
            MICROPOLIS_SYNC => Some(MICROPOLIS_SYNC_LEN),
            _ => None,
        }
    }

    pub(crate) fn validate(layout: &MicropolisLayout) -> Result<(), CodecError> {
        validate_timing(
            "Micropolis",
            layout.target_clock_period_us,
            layout.target_rotational_period_ms,
        )?;
        if layout.sector_count == 0 || layout.sector_count > MICROPOLIS_SECTORS {
            return Err(CodecError::InvalidLayout(format!(
                "Micropolis: {} sectors per track",
                layout.sector_count
            )));
        }
        let slot = Self::timing(layout).capacity_bits() / layout.sector_count as usize;
        if slot < Self::sector_cells() {
            return Err(CodecError::InvalidLayout(format!(
                "Micropolis: sector slot of {} bits cannot hold a {} bit sector",
                slot,
                Self::sector_cells()
            )));
        }
        Ok(())
    }

    fn sector_cells() -> usize {
        (PREAMBLE_LEN + MICROPOLIS_RECORD_LEN + POSTAMBLE_LEN) * 16
    }

    pub(crate) fn decode_records(_layout: &MicropolisLayout, ctx: &DecodeContext, records: &[RawRecord]) -> Vec<Sector> {
        let mut sectors = Vec::new();

        for raw in &merge_segments(records) {
            if raw.read_raw(0, MICROPOLIS_SYNC_LEN) != Some(MICROPOLIS_SYNC) {
                continue;
            }
            let bytes = raw.decoded_at(RECORD_OFFSET);
            let Some(record_bytes) = bytes.get(..MICROPOLIS_RECORD_LEN)
            else {
                log::debug!(
                    "MicropolisSchema::decode_records(): Record at bit {} truncated to {} bytes",
                    raw.start,
                    bytes.len()
                );
                continue;
            };
            let record = match MicropolisRecord::read(&mut Cursor::new(record_bytes)) {
                Ok(record) => record,
                Err(e) => {
                    log::debug!(
                        "MicropolisSchema::decode_records(): Failed to read record at bit {}: {}",
                        raw.start,
                        e
                    );
                    continue;
                }
            };

            if record.sector > MAX_SECTOR || record.track > MAX_TRACK {
                log::trace!(
                    "MicropolisSchema::decode_records(): Implausible record at bit {}: track {} sector {}",
                    raw.start,
                    record.track,
                    record.sector
                );
                continue;
            }

            let calculated = micropolis_checksum(&record_bytes[CHECKSUM_RANGE]);
            let status = if record.checksum == calculated {
                SectorStatus::Ok
            }
            else {
                log::debug!(
                    "MicropolisSchema::decode_records(): Checksum error in sector {}: {:02X} calculated: {:02X}",
                    record.sector,
                    record.checksum,
                    calculated
                );
                SectorStatus::BadChecksum
            };

            if let Some(segment) = raw.segment {
                if segment != record.sector as usize {
                    log::trace!(
                        "MicropolisSchema::decode_records(): Sector {} found in slot {}",
                        record.sector,
                        segment
                    );
                }
            }

            let logical = DiskChs::new(record.track as u16, ctx.physical.h(), record.sector);
            let diagnostic = ctx.record(
                raw,
                RECORD_OFFSET + MICROPOLIS_RECORD_LEN * 16,
                record_bytes.to_vec(),
            );
            sectors.push(ctx.whole_sector(logical, diagnostic, record.data.to_vec(), status));
        }
        sectors
    }

    /// Build the 275-byte on-disk record for `sector`. A 275-byte payload is taken as an
    /// already-formed record.
    fn build_record(sector: &Sector) -> Result<Vec<u8>, CodecError> {
        let chs = sector.logical;
        match sector.data.len() {
            MICROPOLIS_RECORD_LEN => {
                if sector.data[0] != SYNC_BYTE {
                    log::error!(
                        "MicropolisSchema::build_record(): Record for sector {} does not start with a sync byte",
                        chs
                    );
                    return Err(CodecError::InvalidSector(chs));
                }
                let stored = sector.data[CHECKSUM_RANGE.end];
                if stored != micropolis_checksum(&sector.data[CHECKSUM_RANGE]) {
                    log::warn!(
                        "MicropolisSchema::build_record(): Record for sector {} has an incorrect checksum",
                        chs
                    );
                }
                Ok(sector.data.clone())
            }
            MICROPOLIS_SECTOR_SIZE => {
                let mut data = [0u8; MICROPOLIS_SECTOR_SIZE];
                data.copy_from_slice(&sector.data);
                let track = u8::try_from(chs.c()).map_err(|_| CodecError::InvalidSector(chs))?;
                let mut record = MicropolisRecord {
                    sync: SYNC_BYTE,
                    track,
                    sector: chs.s(),
                    reserved: [0; 10],
                    data,
                    checksum: 0,
                    ecc: [0; 4],
                    ecc_flag: 0,
                };

                let mut cursor = Cursor::new(Vec::with_capacity(MICROPOLIS_RECORD_LEN));
                record.write(&mut cursor)?;
                record.checksum = micropolis_checksum(&cursor.get_ref()[CHECKSUM_RANGE]);
                if sector.status == SectorStatus::BadChecksum {
                    record.checksum ^= 0xFF;
                }

                let mut cursor = Cursor::new(Vec::with_capacity(MICROPOLIS_RECORD_LEN));
                record.write(&mut cursor)?;
                Ok(cursor.into_inner())
            }
            n => Err(CodecError::UnsupportedSectorSize(n)),
        }
    }

    pub(crate) fn encode_sectors(
        layout: &MicropolisLayout,
        physical: DiskCh,
        sectors: &[Sector],
        writer: &mut TrackWriter,
    ) -> Result<(), CodecError> {
        let encodable: Vec<&Sector> = sectors.iter().filter(|s| s.is_encodable()).collect();
        for sector in &encodable {
            let chs = sector.logical;
            if chs.s() > MAX_SECTOR || chs.s() >= layout.sector_count || chs.c() > MAX_ENCODE_TRACK {
                return Err(CodecError::InvalidSector(chs));
            }
        }

        let slot_len = writer.capacity() / layout.sector_count.max(1) as usize;
        for slot in 0..layout.sector_count {
            writer.fill_to(slot as usize * slot_len, 0b10, 2)?;
            writer.mark_index();

            let Some(sector) = encodable.iter().find(|s| s.logical.s() == slot)
            else {
                continue;
            };

            let mut bytes = vec![0u8; PREAMBLE_LEN];
            bytes.extend_from_slice(&Self::build_record(sector)?);
            bytes.extend(std::iter::repeat(0).take(POSTAMBLE_LEN));
            writer.write_mfm(&bytes);
        }

        log::trace!(
            "MicropolisSchema::encode_sectors(): Wrote {} in {} bits, {} bit slots",
            physical,
            writer.len(),
            slot_len
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::extract_segmented_records;

    fn round_trip(physical: DiskCh, sectors: &[Sector]) -> Vec<Sector> {
        let layout = MicropolisLayout::default();
        let timing = MicropolisSchema::timing(&layout);
        let mut writer = TrackWriter::new(timing.capacity_bits());
        MicropolisSchema::encode_sectors(&layout, physical, sectors, &mut writer).unwrap();
        let (bits, marks) = writer.finish(0b10, 2).unwrap();
        let records = extract_segmented_records(&bits, &marks, &MicropolisSchema::match_record);
        let ctx = DecodeContext::new(physical, &[], timing.clock_period);
        MicropolisSchema::decode_records(&layout, &ctx, &records)
    }

    #[test]
    fn slots_hold_a_sector() {
        assert_eq!(MicropolisSchema::timing(&MicropolisLayout::default()).capacity_bits(), 100_000);
        assert!(MicropolisSchema::sector_cells() <= 6250);
        assert!(MicropolisSchema::validate(&MicropolisLayout::default()).is_ok());
    }

    #[test]
    fn full_track_round_trip() {
        let physical = DiskCh::new(40, 0);
        let sectors: Vec<Sector> = MicropolisSchema::expected_sectors(&MicropolisLayout::default(), physical)
            .into_iter()
            .map(|chs| Sector::new(physical, chs, vec![chs.s() * 3; 256]))
            .collect();
        let decoded = round_trip(physical, &sectors);
        assert_eq!(decoded.len(), 16);
        for (i, sector) in decoded.iter().enumerate() {
            assert_eq!(sector.logical, DiskChs::new(40, 0, i as u8));
            assert_eq!(sector.status, SectorStatus::Ok);
            assert_eq!(sector.data, vec![i as u8 * 3; 256]);
            assert_eq!(sector.records[0].raw_data.len(), MICROPOLIS_RECORD_LEN);
        }
    }

    #[test]
    fn raw_record_is_written_unchanged() {
        let physical = DiskCh::new(1, 0);
        let source = Sector::new(physical, physical.with_sector(4), vec![0x77; 256]);
        let record = MicropolisSchema::build_record(&source).unwrap();
        assert_eq!(record.len(), MICROPOLIS_RECORD_LEN);
        assert_eq!(&record[..3], &[0xFF, 1, 4]);

        let raw = Sector::new(physical, physical.with_sector(4), record.clone());
        let decoded = round_trip(physical, &[raw]);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].status, SectorStatus::Ok);
        assert_eq!(decoded[0].records[0].raw_data, record);
    }

    #[test]
    fn bad_checksum() {
        let physical = DiskCh::new(5, 0);
        let sector = Sector::new(physical, physical.with_sector(9), vec![1; 256]).with_status(SectorStatus::BadChecksum);
        let decoded = round_trip(physical, &[sector]);
        assert_eq!(decoded[0].status, SectorStatus::BadChecksum);
        assert_eq!(decoded[0].data, vec![1; 256]);
    }

    #[test]
    fn out_of_range_rejected() {
        let physical = DiskCh::new(77, 0);
        let layout = MicropolisLayout::default();
        for chs in [DiskChs::new(77, 0, 0), DiskChs::new(300, 0, 0), DiskChs::new(10, 0, 16)] {
            let sector = Sector::new(physical, chs, vec![0; 256]);
            let mut writer = TrackWriter::new(100_000);
            let result = MicropolisSchema::encode_sectors(&layout, physical, &[sector], &mut writer);
            assert!(matches!(result, Err(CodecError::InvalidSector(_))));
        }
    }
}
