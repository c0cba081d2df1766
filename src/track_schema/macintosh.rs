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

    src/track_schema/macintosh.rs

    Macintosh 400K/800K GCR track layout with zoned recording.
*/

//! Macintosh 400K and 800K GCR track layout.
//!
//! The Macintosh drive shares the Apple II address and data marks and its 6-to-8 disk byte
//! table, but packs 524 bytes per sector (12 tag bytes and 512 data bytes) three at a time
//! under a rolling three-byte checksum. The drive slows down towards the hub in five zones,
//! which is expressed here as a longer bit cell at a fixed rotational period.

use crate::{
    bitstream_codec::gcr::{decode_mac_6and2, encode_mac_6and2_with, GcrScheme, GcrTable, MAC_ENCODED_SECTOR_LEN, MAC_SECTOR_LEN},
    sector::Sector,
    sync::RawRecord,
    track::writer::TrackWriter,
    track_schema::{attach_data, validate_timing, DecodeContext, HeaderState, TrackTiming},
    types::{DiskCh, DiskChs, SectorStatus},
    CodecError,
};

pub const MAC_ADDRESS_RECORD: u64 = 0xD5AA96;
pub const MAC_DATA_RECORD: u64 = 0xD5AAAD;
pub const MAC_RECORD_LEN: usize = 24;
pub const MAC_DATA_SIZE: usize = 512;
pub const MAC_TAG_SIZE: usize = MAC_SECTOR_LEN - MAC_DATA_SIZE;
pub const MAC_TRACKS: u16 = 80;
/// Double-sided, 2:1 interleave.
pub const DEFAULT_FORMAT_BYTE: u8 = 0x22;

/// Six self-sync disk bytes, each followed by two 0 bits.
const SELF_SYNC: u64 = 0xFF3F_CFF3_FCFF;
const SELF_SYNC_LEN: usize = 48;
const SELF_SYNC_COUNT: usize = 7;
const EPILOGUE: u64 = 0xDEAAFF;
const HEADER_FIELDS: usize = 5;
const MAX_SECTOR: u8 = 11;
/// Bit 0 of the side field holds bit 6 of the track number.
const SIDE_TRACK_BIT: u8 = 0x01;
const SIDE_HEAD_BIT: u8 = 0x20;

/// (first cylinder of zone, sectors per track, bit cell in µs)
pub const MAC_ZONES: [(u16, u8, f64); 5] = [
    (0, 12, 2.623),
    (16, 11, 2.861),
    (32, 10, 3.148),
    (48, 9, 3.497),
    (64, 8, 3.934),
];

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MacintoshLayout {
    /// Multiplier applied to every zone's bit cell.
    pub clock_compensation_factor: f64,
    pub target_rotational_period_ms: f64,
    pub post_index_gap_us: f64,
    /// Decode 524-byte sectors (data followed by tags) instead of 512-byte sectors.
    pub tags: bool,
    pub format_byte: u8,
}

impl Default for MacintoshLayout {
    fn default() -> Self {
        MacintoshLayout {
            clock_compensation_factor: 1.0,
            target_rotational_period_ms: 200.0,
            post_index_gap_us: 0.0,
            tags: false,
            format_byte: DEFAULT_FORMAT_BYTE,
        }
    }
}

impl MacintoshLayout {
    pub fn with_clock_compensation_factor(mut self, factor: f64) -> Self {
        self.clock_compensation_factor = factor;
        self
    }

    pub fn with_rotational_period_ms(mut self, period: f64) -> Self {
        self.target_rotational_period_ms = period;
        self
    }

    pub fn with_post_index_gap_us(mut self, gap: f64) -> Self {
        self.post_index_gap_us = gap;
        self
    }

    pub fn with_tags(mut self, tags: bool) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_format_byte(mut self, format: u8) -> Self {
        self.format_byte = format;
        self
    }

    /// Return the sector count and bit cell in µs of `cylinder`.
    pub fn zone(cylinder: u16) -> (u8, f64) {
        let (_, sectors, clock) = MAC_ZONES
            .iter()
            .rev()
            .find(|(first, _, _)| cylinder >= *first)
            .copied()
            .unwrap_or(MAC_ZONES[0]);
        (sectors, clock)
    }

    /// Size of the sectors this layout decodes.
    pub fn sector_size(&self) -> usize {
        if self.tags {
            MAC_SECTOR_LEN
        }
        else {
            MAC_DATA_SIZE
        }
    }
}

pub struct MacintoshSchema;

impl MacintoshSchema {
    pub(crate) fn timing(layout: &MacintoshLayout, physical: DiskCh) -> TrackTiming {
        let (_, clock) = MacintoshLayout::zone(physical.c());
        TrackTiming::new(
            clock * layout.clock_compensation_factor,
            layout.target_rotational_period_ms,
        )
    }

    pub(crate) fn expected_sectors(_layout: &MacintoshLayout, physical: DiskCh) -> Vec<DiskChs> {
        if physical.c() >= MAC_TRACKS {
            return Vec::new();
        }
        let (count, _) = MacintoshLayout::zone(physical.c());
        (0..count)
            .map(|s| DiskChs::new(physical.c(), physical.h(), s))
            .collect()
    }

    pub(crate) fn match_record(fifo: u64) -> Option<usize> {
        match fifo & 0xFF_FFFF {
            MAC_ADDRESS_RECORD | MAC_DATA_RECORD => Some(MAC_RECORD_LEN),
            _ => None,
        }
    }

    pub(crate) fn validate(layout: &MacintoshLayout) -> Result<(), CodecError> {
        validate_timing(
            "Macintosh",
            MAC_ZONES[0].2 * layout.clock_compensation_factor,
            layout.target_rotational_period_ms,
        )?;
        if !(layout.post_index_gap_us.is_finite() && layout.post_index_gap_us >= 0.0) {
            return Err(CodecError::InvalidLayout(format!(
                "Macintosh: post-index gap must be non-negative, got {}",
                layout.post_index_gap_us
            )));
        }
        if layout.format_byte > 0x3F {
            return Err(CodecError::InvalidLayout(format!(
                "Macintosh: format byte {:02X} does not fit in six bits",
                layout.format_byte
            )));
        }
        Ok(())
    }

    pub(crate) fn decode_records(layout: &MacintoshLayout, ctx: &DecodeContext, records: &[RawRecord]) -> Vec<Sector> {
        let mut sectors = Vec::new();
        let mut state = HeaderState::Seeking;

        for raw in records {
            match raw.read_raw(0, MAC_RECORD_LEN) {
                Some(MAC_ADDRESS_RECORD) => {
                    state.take().flush(&mut sectors);
                    if let Some(sector) = Self::decode_address(ctx, raw) {
                        state = HeaderState::HeaderFound {
                            sector,
                            data_len: layout.sector_size(),
                        };
                    }
                }
                Some(MAC_DATA_RECORD) => match state.take() {
                    HeaderState::HeaderFound { mut sector, data_len } => {
                        Self::decode_data(ctx, raw, data_len, &mut sector);
                        sectors.push(sector);
                    }
                    HeaderState::Seeking => {
                        log::trace!(
                            "MacintoshSchema::decode_records(): Data field at bit {} without an address field",
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

    fn decode_address(ctx: &DecodeContext, raw: &RawRecord) -> Option<Sector> {
        let table = GcrTable::new(GcrScheme::Apple6and2);
        let disk_bytes = raw.bytes_at(MAC_RECORD_LEN);
        let mut fields = [0u8; HEADER_FIELDS];
        for (field, disk_byte) in fields.iter_mut().zip(disk_bytes.iter()) {
            *field = table.decode(*disk_byte as u16)?;
        }
        if disk_bytes.len() < HEADER_FIELDS {
            return None;
        }
        let [track, sector, side, format, checksum] = fields;

        let calculated = (track ^ sector ^ side ^ format) & 0x3F;
        if checksum != calculated {
            log::trace!(
                "MacintoshSchema::decode_address(): Bad address checksum at bit {}: {:02X} calculated: {:02X}",
                raw.start,
                checksum,
                calculated
            );
            return None;
        }
        if track as u16 != ctx.physical.c() & 0x3F || sector > MAX_SECTOR {
            log::trace!(
                "MacintoshSchema::decode_address(): Implausible header at bit {} on {}: track {} sector {}",
                raw.start,
                ctx.physical,
                track,
                sector
            );
            return None;
        }

        let c = track as u16 | if side & SIDE_TRACK_BIT != 0 { 0x40 } else { 0 };
        let h = u8::from(side & SIDE_HEAD_BIT != 0);
        let record = ctx.record(raw, MAC_RECORD_LEN + HEADER_FIELDS * 8, fields.to_vec());
        Some(ctx.header_sector(DiskChs::new(c, h, sector), record))
    }

    fn decode_data(ctx: &DecodeContext, raw: &RawRecord, data_len: usize, sector: &mut Sector) {
        // The first disk byte repeats the sector number.
        let mut disk_bytes = raw.bytes_at(MAC_RECORD_LEN + 8);
        disk_bytes.truncate(MAC_ENCODED_SECTOR_LEN);

        let (data, status) = match decode_mac_6and2(&disk_bytes) {
            Some((wire, ok)) => {
                // Tags come first on disk and last in the sector.
                let mut data = wire[MAC_TAG_SIZE..].to_vec();
                data.extend_from_slice(&wire[..MAC_TAG_SIZE]);
                data.truncate(data_len);
                if ok {
                    (data, SectorStatus::Ok)
                }
                else {
                    log::debug!(
                        "MacintoshSchema::decode_data(): Checksum error in sector {}",
                        sector.logical
                    );
                    (data, SectorStatus::BadChecksum)
                }
            }
            None => {
                log::debug!(
                    "MacintoshSchema::decode_data(): Data field for sector {} truncated at {} disk bytes",
                    sector.logical,
                    disk_bytes.len()
                );
                (Vec::new(), SectorStatus::BadChecksum)
            }
        };

        let record = ctx.record(raw, MAC_RECORD_LEN + 8 + disk_bytes.len() * 8, disk_bytes);
        attach_data(sector, data, status, record);
    }

    fn write_disk_byte(writer: &mut TrackWriter, table: &GcrTable, value: u8) -> Result<(), CodecError> {
        let code = table.encode(value).ok_or(CodecError::InvalidSymbol {
            value: value as u16,
            table: table.scheme(),
        })?;
        writer.write_raw(code as u64, 8);
        Ok(())
    }

    pub(crate) fn encode_sectors(
        layout: &MacintoshLayout,
        physical: DiskCh,
        sectors: &[Sector],
        writer: &mut TrackWriter,
    ) -> Result<(), CodecError> {
        let table = GcrTable::new(GcrScheme::Apple6and2);
        let (_, clock_us) = MacintoshLayout::zone(physical.c());
        let gap_cells = layout.post_index_gap_us / (clock_us * layout.clock_compensation_factor);
        writer.fill_to(gap_cells as usize, 0b10, 2)?;

        for sector in sectors {
            let with_data = match sector.status {
                SectorStatus::Ok | SectorStatus::BadChecksum => true,
                SectorStatus::DataMissing => false,
                _ => continue,
            };
            let mut wire = [0u8; MAC_SECTOR_LEN];
            if with_data {
                match sector.data.len() {
                    MAC_DATA_SIZE => wire[MAC_TAG_SIZE..].copy_from_slice(&sector.data),
                    MAC_SECTOR_LEN => {
                        wire[..MAC_TAG_SIZE].copy_from_slice(&sector.data[MAC_DATA_SIZE..]);
                        wire[MAC_TAG_SIZE..].copy_from_slice(&sector.data[..MAC_DATA_SIZE]);
                    }
                    len => return Err(CodecError::UnsupportedSectorSize(len)),
                }
            }

            let chs = sector.logical;
            if chs.c() >= 0x80 || chs.h() > 1 || chs.s() > MAX_SECTOR {
                return Err(CodecError::InvalidSector(chs));
            }
            let track = (chs.c() & 0x3F) as u8;
            let mut side = if chs.h() == 1 { SIDE_HEAD_BIT } else { 0 };
            if chs.c() > 0x3F {
                side |= SIDE_TRACK_BIT;
            }
            let s = chs.s();

            // Address field
            writer.write_raw(0xFF, 8);
            writer.write_raw_repeat(SELF_SYNC, SELF_SYNC_LEN, SELF_SYNC_COUNT);
            writer.write_raw(MAC_ADDRESS_RECORD, MAC_RECORD_LEN);
            let checksum = (track ^ s ^ side ^ layout.format_byte) & 0x3F;
            for field in [track, s, side, layout.format_byte, checksum] {
                Self::write_disk_byte(writer, &table, field)?;
            }
            writer.write_raw(EPILOGUE, 24);

            if !with_data {
                continue;
            }

            // Data field
            writer.write_raw(SELF_SYNC, SELF_SYNC_LEN);
            writer.write_raw(MAC_DATA_RECORD, MAC_RECORD_LEN);
            Self::write_disk_byte(writer, &table, s)?;
            writer.write_raw_bytes(&encode_mac_6and2_with(&wire, sector.status == SectorStatus::BadChecksum));
            writer.write_raw(EPILOGUE, 24);
        }

        log::trace!(
            "MacintoshSchema::encode_sectors(): Wrote {} in {} bits",
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

    fn track_sectors(layout: &MacintoshLayout, physical: DiskCh) -> Vec<Sector> {
        MacintoshSchema::expected_sectors(layout, physical)
            .into_iter()
            .map(|chs| {
                let data = (0..layout.sector_size())
                    .map(|i| (i as u8).wrapping_mul(29) ^ chs.s())
                    .collect();
                Sector::new(physical, chs, data)
            })
            .collect()
    }

    fn round_trip(layout: &MacintoshLayout, physical: DiskCh, sectors: &[Sector]) -> Vec<Sector> {
        let timing = MacintoshSchema::timing(layout, physical);
        let mut writer = TrackWriter::new(timing.capacity_bits());
        MacintoshSchema::encode_sectors(layout, physical, sectors, &mut writer).unwrap();
        let (bits, _) = writer.finish(0b10, 2).unwrap();
        let records = extract_records(&bits, &MacintoshSchema::match_record);
        let ctx = DecodeContext::new(physical, &[], timing.clock_period);
        MacintoshSchema::decode_records(layout, &ctx, &records)
    }

    #[test]
    fn every_zone_fits() {
        let layout = MacintoshLayout::default();
        for c in [0, 16, 32, 48, 64, 79] {
            let physical = DiskCh::new(c, 1);
            let sectors = track_sectors(&layout, physical);
            let decoded = round_trip(&layout, physical, &sectors);

            assert_eq!(decoded.len(), sectors.len(), "cylinder {}", c);
            for (original, sector) in sectors.iter().zip(&decoded) {
                assert_eq!(sector.status, SectorStatus::Ok);
                assert_eq!(sector.logical, original.logical);
                assert_eq!(sector.data, original.data);
            }
        }
    }

    #[test]
    fn tags_round_trip() {
        let layout = MacintoshLayout::default().with_tags(true);
        let physical = DiskCh::new(70, 0);
        let sectors = track_sectors(&layout, physical);
        let decoded = round_trip(&layout, physical, &sectors);
        assert_eq!(decoded.len(), 8);
        assert_eq!(decoded[7].data.len(), MAC_SECTOR_LEN);
        assert_eq!(decoded[7].data, sectors[7].data);
        // Track 70 needs the high track bit from the side field.
        assert_eq!(decoded[7].logical, DiskChs::new(70, 0, 7));
    }

    #[test]
    fn bad_checksum_and_missing_data() {
        let layout = MacintoshLayout::default();
        let physical = DiskCh::new(20, 0);
        let mut sectors = track_sectors(&layout, physical);
        sectors.truncate(3);
        sectors[0].status = SectorStatus::BadChecksum;
        sectors[2].status = SectorStatus::DataMissing;

        let decoded = round_trip(&layout, physical, &sectors);
        let statuses: Vec<SectorStatus> = decoded.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![SectorStatus::BadChecksum, SectorStatus::Ok, SectorStatus::DataMissing]
        );
        assert_eq!(decoded[0].data, sectors[0].data);
    }

    #[test]
    fn header_from_another_track_is_ignored() {
        let layout = MacintoshLayout::default();
        let sectors = track_sectors(&layout, DiskCh::new(5, 0));
        let timing = MacintoshSchema::timing(&layout, DiskCh::new(5, 0));
        let mut writer = TrackWriter::new(timing.capacity_bits());
        MacintoshSchema::encode_sectors(&layout, DiskCh::new(5, 0), &sectors, &mut writer).unwrap();
        let (bits, _) = writer.finish(0b10, 2).unwrap();

        let records = extract_records(&bits, &MacintoshSchema::match_record);
        let ctx = DecodeContext::new(DiskCh::new(6, 0), &[], timing.clock_period);
        assert!(MacintoshSchema::decode_records(&layout, &ctx, &records).is_empty());
    }

    #[test]
    fn zones() {
        assert_eq!(MacintoshLayout::zone(0), (12, 2.623));
        assert_eq!(MacintoshLayout::zone(31), (11, 2.861));
        assert_eq!(MacintoshLayout::zone(79), (8, 3.934));
        assert!(MacintoshSchema::expected_sectors(&MacintoshLayout::default(), DiskCh::new(80, 0)).is_empty());
    }

    #[test]
    fn invalid_sectors_rejected() {
        let layout = MacintoshLayout::default();
        let physical = DiskCh::new(0, 0);
        let mut writer = TrackWriter::new(80_000);
        let sector = Sector::new(physical, DiskChs::new(0, 0, 0), vec![0; 256]);
        assert!(matches!(
            MacintoshSchema::encode_sectors(&layout, physical, &[sector], &mut writer),
            Err(CodecError::UnsupportedSectorSize(256))
        ));
        let sector = Sector::new(physical, DiskChs::new(0, 0, 12), vec![0; 512]);
        assert!(matches!(
            MacintoshSchema::encode_sectors(&layout, physical, &[sector], &mut writer),
            Err(CodecError::InvalidSector(_))
        ));
        assert!(MacintoshSchema::validate(&layout.clone().with_format_byte(0x40)).is_err());
        assert!(MacintoshSchema::validate(&layout.with_clock_compensation_factor(0.0)).is_err());
    }
}
