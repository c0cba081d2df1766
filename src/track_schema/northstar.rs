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

    src/track_schema/northstar.rs

    North Star hard-sectored FM/MFM track layout.
*/

//! North Star hard-sectored layout.
//!
//! A North Star track is divided into ten slots by sector holes. Records carry no address: the
//! sector id is the slot the record was found in, and the track comes from the head position.
//! Single density records are FM, double density records are MFM.

use crate::{
    sector::Sector,
    sync::{merge_segments, RawRecord},
    track::writer::TrackWriter,
    track_schema::{validate_timing, DecodeContext, TrackTiming},
    types::{DiskCh, DiskChs, SectorStatus, TrackDataEncoding},
    util::northstar_checksum,
    CodecError,
};

/// MFM `00 00 00 FB`
pub const NORTHSTAR_MFM_SYNC: u64 = 0xAAAA_AAAA_AAAA_5545;
/// FM `00 00 00 FB`
pub const NORTHSTAR_FM_SYNC: u64 = 0xAAAA_AAAA_AAAA_FFEF;
pub const NORTHSTAR_SYNC_LEN: usize = 64;
/// Decoded bytes covered by the sync pattern.
const SYNC_BYTES: usize = 4;

pub const NORTHSTAR_SECTORS: u8 = 10;
pub const NORTHSTAR_SD_SECTOR_SIZE: usize = 256;
pub const NORTHSTAR_DD_SECTOR_SIZE: usize = 512;

const SYNC_BYTE: u8 = 0xFB;
const GAP_BYTE: u8 = 0x4F;
const POSTAMBLE_LEN: usize = 10;

/// Sizes in bytes of the parts of a North Star sector for one density.
#[derive(Copy, Clone, Debug)]
struct Density {
    pre_header_gap: usize,
    preamble: usize,
    sync_chars: usize,
    payload: usize,
}

const SINGLE_DENSITY: Density = Density {
    pre_header_gap: 9,
    preamble: 16,
    sync_chars: 1,
    payload: NORTHSTAR_SD_SECTOR_SIZE,
};

const DOUBLE_DENSITY: Density = Density {
    pre_header_gap: 16,
    preamble: 32,
    sync_chars: 2,
    payload: NORTHSTAR_DD_SECTOR_SIZE,
};

impl Density {
    /// Decoded length of a record from the start of the sync pattern through the checksum.
    fn record_len(&self) -> usize {
        SYNC_BYTES + (self.sync_chars - 1) + self.payload + 1
    }

    /// Offset of the payload in a decoded record.
    fn payload_offset(&self) -> usize {
        SYNC_BYTES + (self.sync_chars - 1)
    }

    /// Bit cells occupied by one encoded sector, excluding the slot fill.
    fn sector_cells(&self) -> usize {
        (self.pre_header_gap + self.preamble + self.sync_chars + self.payload + 1 + POSTAMBLE_LEN) * 16
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NorthStarLayout {
    pub double_density: bool,
    pub target_rotational_period_ms: f64,
    pub sector_count: u8,
}

impl Default for NorthStarLayout {
    fn default() -> Self {
        NorthStarLayout {
            double_density: true,
            target_rotational_period_ms: 200.0,
            sector_count: NORTHSTAR_SECTORS,
        }
    }
}

impl NorthStarLayout {
    /// A single density layout.
    pub fn single_density() -> Self {
        NorthStarLayout {
            double_density: false,
            ..Default::default()
        }
    }

    pub fn with_double_density(mut self, double_density: bool) -> Self {
        self.double_density = double_density;
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

    pub fn clock_period_us(&self) -> f64 {
        if self.double_density {
            2.0
        }
        else {
            4.0
        }
    }

    pub fn sector_size(&self) -> usize {
        self.density().payload
    }

    fn density(&self) -> Density {
        if self.double_density {
            DOUBLE_DENSITY
        }
        else {
            SINGLE_DENSITY
        }
    }
}

pub struct NorthStarSchema;

impl NorthStarSchema {
    pub(crate) fn encoding(layout: &NorthStarLayout) -> TrackDataEncoding {
        if layout.double_density {
            TrackDataEncoding::Mfm
        }
        else {
            TrackDataEncoding::Fm
        }
    }

    /// Slot fill: MFM or FM `FF`, which is valid after any previous bit.
    pub(crate) fn gap_fill(layout: &NorthStarLayout) -> (u64, usize) {
        if layout.double_density {
            (0x5555, 16)
        }
        else {
            (0xFFFF, 16)
        }
    }

    pub(crate) fn timing(layout: &NorthStarLayout) -> TrackTiming {
        TrackTiming::new(layout.clock_period_us(), layout.target_rotational_period_ms)
    }

    pub(crate) fn expected_sectors(layout: &NorthStarLayout, physical: DiskCh) -> Vec<DiskChs> {
        (0..layout.sector_count).map(|s| physical.with_sector(s)).collect()
    }

    pub(crate) fn match_record(fifo: u64) -> Option<usize> {
        match fifo {
            NORTHSTAR_MFM_SYNC | NORTHSTAR_FM_SYNC => Some(NORTHSTAR_SYNC_LEN),
            _ => None,
        }
    }

    pub(crate) fn validate(layout: &NorthStarLayout) -> Result<(), CodecError> {
        validate_timing(
            "NorthStar",
            layout.clock_period_us(),
            layout.target_rotational_period_ms,
        )?;
        if layout.sector_count == 0 {
            return Err(CodecError::InvalidLayout("NorthStar: sector count is 0".to_string()));
        }
        let slot = Self::timing(layout).capacity_bits() / layout.sector_count as usize;
        let needed = layout.density().sector_cells();
        if slot < needed {
            return Err(CodecError::InvalidLayout(format!(
                "NorthStar: sector slot of {} bits cannot hold a {} bit sector",
                slot, needed
            )));
        }
        Ok(())
    }

    pub(crate) fn decode_records(layout: &NorthStarLayout, ctx: &DecodeContext, records: &[RawRecord]) -> Vec<Sector> {
        let mut sectors = Vec::new();

        for raw in &merge_segments(records) {
            let Some(segment) = raw.segment
            else {
                log::trace!(
                    "NorthStarSchema::decode_records(): Record at bit {} is outside any sector slot",
                    raw.start
                );
                continue;
            };
            let density = match raw.read_raw(0, NORTHSTAR_SYNC_LEN) {
                Some(NORTHSTAR_MFM_SYNC) => DOUBLE_DENSITY,
                Some(NORTHSTAR_FM_SYNC) => SINGLE_DENSITY,
                _ => continue,
            };

            let mut bytes = raw.decoded();
            if bytes.len() < density.record_len() {
                log::debug!(
                    "NorthStarSchema::decode_records(): Record at bit {} truncated to {} bytes",
                    raw.start,
                    bytes.len()
                );
                continue;
            }
            bytes.truncate(density.record_len());

            let payload = &bytes[density.payload_offset()..density.payload_offset() + density.payload];
            let stored = bytes[density.record_len() - 1];
            let calculated = northstar_checksum(payload);
            let status = if stored == calculated {
                SectorStatus::Ok
            }
            else {
                log::debug!(
                    "NorthStarSchema::decode_records(): Checksum error in slot {}: {:02X} calculated: {:02X}",
                    segment,
                    stored,
                    calculated
                );
                SectorStatus::BadChecksum
            };

            let logical = ctx
                .physical
                .with_sector((segment % layout.sector_count.max(1) as usize) as u8);
            let data = payload.to_vec();
            let record = ctx.record(raw, density.record_len() * 16, bytes);
            sectors.push(ctx.whole_sector(logical, record, data, status));
        }
        sectors
    }

    pub(crate) fn encode_sectors(
        layout: &NorthStarLayout,
        physical: DiskCh,
        sectors: &[Sector],
        writer: &mut TrackWriter,
    ) -> Result<(), CodecError> {
        let density = layout.density();
        let (fill, fill_width) = Self::gap_fill(layout);
        let slot_len = writer.capacity() / layout.sector_count.max(1) as usize;

        for sector in sectors.iter().filter(|s| s.is_encodable()) {
            if sector.data.len() != density.payload {
                return Err(CodecError::UnsupportedSectorSize(sector.data.len()));
            }
            if sector.logical.s() >= layout.sector_count {
                return Err(CodecError::InvalidSector(sector.logical));
            }
        }

        for slot in 0..layout.sector_count {
            writer.fill_to(slot as usize * slot_len, fill, fill_width)?;
            writer.mark_index();

            let Some(sector) = sectors
                .iter()
                .filter(|s| s.is_encodable())
                .find(|s| s.logical.s() == slot)
            else {
                continue;
            };

            let mut checksum = northstar_checksum(&sector.data);
            if sector.status == SectorStatus::BadChecksum {
                checksum ^= 0xFF;
            }

            let mut bytes = Vec::with_capacity(density.sector_cells() / 16);
            bytes.extend(std::iter::repeat(GAP_BYTE).take(density.pre_header_gap));
            bytes.extend(std::iter::repeat(0).take(density.preamble));
            bytes.extend(std::iter::repeat(SYNC_BYTE).take(density.sync_chars));
            bytes.extend_from_slice(&sector.data);
            bytes.push(checksum);
            bytes.extend(std::iter::repeat(GAP_BYTE).take(POSTAMBLE_LEN));

            if layout.double_density {
                writer.write_mfm(&bytes);
            }
            else {
                writer.write_fm(&bytes);
            }
        }

        log::trace!(
            "NorthStarSchema::encode_sectors(): Wrote {} in {} bits, {} bit slots",
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
    use crate::{
        bitstream_codec::{fm, mfm},
        sync::extract_segmented_records,
    };
    use bit_vec::BitVec;

    fn round_trip(layout: &NorthStarLayout, physical: DiskCh, sectors: &[Sector]) -> Vec<Sector> {
        let timing = NorthStarSchema::timing(layout);
        let mut writer = TrackWriter::new(timing.capacity_bits());
        NorthStarSchema::encode_sectors(layout, physical, sectors, &mut writer).unwrap();
        let (fill, width) = NorthStarSchema::gap_fill(layout);
        let (bits, marks) = writer.finish(fill, width).unwrap();
        let records = extract_segmented_records(&bits, &marks, &NorthStarSchema::match_record);
        let ctx = DecodeContext::new(physical, &[], timing.clock_period);
        NorthStarSchema::decode_records(layout, &ctx, &records)
    }

    fn full_track(layout: &NorthStarLayout, physical: DiskCh) -> Vec<Sector> {
        NorthStarSchema::expected_sectors(layout, physical)
            .into_iter()
            .map(|chs| Sector::new(physical, chs, vec![0x30 + chs.s(); layout.sector_size()]))
            .collect()
    }

    #[test]
    fn sync_patterns() {
        let mut last = false;
        let mut bits = BitVec::new();
        mfm::encode(&[0, 0, 0, SYNC_BYTE], &mut last, &mut bits);
        assert_eq!(bits.to_bytes(), NORTHSTAR_MFM_SYNC.to_be_bytes());

        let mut last = false;
        let mut bits = BitVec::new();
        fm::encode(&[0, 0, 0, SYNC_BYTE], &mut last, &mut bits);
        assert_eq!(bits.to_bytes(), NORTHSTAR_FM_SYNC.to_be_bytes());
    }

    #[test]
    fn default_layouts_are_valid() {
        assert!(NorthStarSchema::validate(&NorthStarLayout::default()).is_ok());
        assert!(NorthStarSchema::validate(&NorthStarLayout::single_density()).is_ok());
        assert!(NorthStarSchema::validate(&NorthStarLayout::default().with_sector_count(11)).is_err());
    }

    #[test]
    fn double_density_round_trip() {
        let layout = NorthStarLayout::default();
        let physical = DiskCh::new(12, 1);
        let decoded = round_trip(&layout, physical, &full_track(&layout, physical));
        assert_eq!(decoded.len(), 10);
        for (i, sector) in decoded.iter().enumerate() {
            assert_eq!(sector.logical, DiskChs::new(12, 1, i as u8));
            assert_eq!(sector.status, SectorStatus::Ok);
            assert_eq!(sector.data, vec![0x30 + i as u8; 512]);
        }
    }

    #[test]
    fn single_density_round_trip() {
        let layout = NorthStarLayout::single_density();
        let physical = DiskCh::new(0, 0);
        let decoded = round_trip(&layout, physical, &full_track(&layout, physical));
        assert_eq!(decoded.len(), 10);
        assert!(decoded.iter().all(|s| s.status == SectorStatus::Ok && s.data.len() == 256));
    }

    #[test]
    fn sector_id_comes_from_slot() {
        let layout = NorthStarLayout::default();
        let physical = DiskCh::new(3, 0);
        let sector = Sector::new(physical, physical.with_sector(7), vec![0xE5; 512]);
        let decoded = round_trip(&layout, physical, &[sector]);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].logical.s(), 7);
    }

    #[test]
    fn bad_checksum() {
        let layout = NorthStarLayout::default();
        let physical = DiskCh::new(3, 0);
        let sector = Sector::new(physical, physical.with_sector(2), vec![9; 512]).with_status(SectorStatus::BadChecksum);
        let decoded = round_trip(&layout, physical, &[sector]);
        assert_eq!(decoded[0].status, SectorStatus::BadChecksum);
        assert_eq!(decoded[0].data, vec![9; 512]);
    }

    #[test]
    fn wrong_size_rejected() {
        let layout = NorthStarLayout::single_density();
        let physical = DiskCh::new(3, 0);
        let sector = Sector::new(physical, physical.with_sector(0), vec![0; 512]);
        let mut writer = TrackWriter::new(NorthStarSchema::timing(&layout).capacity_bits());
        let result = NorthStarSchema::encode_sectors(&layout, physical, &[sector], &mut writer);
        assert!(matches!(result, Err(CodecError::UnsupportedSectorSize(512))));
    }
}
