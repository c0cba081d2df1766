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

    src/track_schema/brother.rs

    Brother word processor GCR track layout.
*/

//! Brother word processor track layout (120K and 240K disks).
//!
//! Brother disks use two different GCR codes. Sector headers carry the track and sector as
//! 8-in-16 words with no checksum, and data records carry 256 bytes plus a 24-bit CRC in a 5-in-8
//! code. Both records sit behind a long run of 1 bits. Records are placed at fixed times from
//! the index rather than back to back, and only side 0 is used.

use crate::{
    bitstream_codec::gcr::{decode_brother_data, decode_brother_header, encode_brother_data, encode_brother_header, BROTHER_DATA_ENCODED_LEN},
    sector::Sector,
    sync::RawRecord,
    track::writer::TrackWriter,
    track_schema::{attach_data, validate_timing, DecodeContext, HeaderState, TrackTiming},
    types::{DiskCh, DiskChs, SectorStatus},
    util::crc_brother,
    CodecError,
};

pub const BROTHER_HEADER_SYNC: u64 = 0xFFFF_FD57;
pub const BROTHER_DATA_SYNC: u64 = 0xFFFF_FDDB;
pub const BROTHER_SYNC_LEN: usize = 32;
pub const BROTHER_SECTOR_SIZE: usize = 256;
pub const BROTHER_SECTORS: u8 = 12;
pub const BROTHER_240_TRACKS: u16 = 78;
pub const BROTHER_120_TRACKS: u16 = 39;

const MAX_SECTOR: u8 = 11;
const MAX_TRACK: u8 = 79;
const HEADER_LEN: usize = BROTHER_SYNC_LEN + 2 * 16;
/// Third header word; it is written but never read back.
const HEADER_FILLER: u8 = 0x2F;
/// Written after the CRC of every data record.
const DATA_TRAILER: [u8; 2] = [0x58, 0xD4];
const CRC_LEN: usize = 3;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BrotherLayout {
    pub target_clock_period_us: f64,
    pub target_rotational_period_ms: f64,
    /// Formatted tracks on the disk; 78 for 240K disks, 39 for 120K disks.
    pub tracks: u16,
    /// Time from the index to the first sector header.
    pub post_index_gap_ms: f64,
    /// Time from one sector header to the next.
    pub sector_spacing_ms: f64,
    /// Time from a sector header to its data record.
    pub post_header_spacing_ms: f64,
}

impl Default for BrotherLayout {
    fn default() -> Self {
        BrotherLayout {
            target_clock_period_us: 3.83,
            target_rotational_period_ms: 200.0,
            tracks: BROTHER_240_TRACKS,
            post_index_gap_ms: 1.0,
            sector_spacing_ms: 16.2,
            post_header_spacing_ms: 0.69,
        }
    }
}

impl BrotherLayout {
    /// Layout of a 120K disk.
    pub fn brother120() -> Self {
        BrotherLayout {
            tracks: BROTHER_120_TRACKS,
            ..Default::default()
        }
    }

    pub fn with_clock_period_us(mut self, period: f64) -> Self {
        self.target_clock_period_us = period;
        self
    }

    pub fn with_rotational_period_ms(mut self, period: f64) -> Self {
        self.target_rotational_period_ms = period;
        self
    }

    pub fn with_tracks(mut self, tracks: u16) -> Self {
        self.tracks = tracks;
        self
    }

    pub fn with_post_index_gap_ms(mut self, gap: f64) -> Self {
        self.post_index_gap_ms = gap;
        self
    }

    pub fn with_sector_spacing_ms(mut self, spacing: f64) -> Self {
        self.sector_spacing_ms = spacing;
        self
    }

    pub fn with_post_header_spacing_ms(mut self, spacing: f64) -> Self {
        self.post_header_spacing_ms = spacing;
        self
    }

    /// Bit cell at which the `n`th header, or its data record, starts.
    fn cell_at(&self, n: usize, data: bool) -> usize {
        let mut ms = self.post_index_gap_ms + n as f64 * self.sector_spacing_ms;
        if data {
            ms += self.post_header_spacing_ms;
        }
        (ms * 1e3 / self.target_clock_period_us) as usize
    }
}

pub struct BrotherSchema;

impl BrotherSchema {
    pub(crate) fn timing(layout: &BrotherLayout) -> TrackTiming {
        TrackTiming::new(layout.target_clock_period_us, layout.target_rotational_period_ms)
    }

    pub(crate) fn expected_sectors(layout: &BrotherLayout, physical: DiskCh) -> Vec<DiskChs> {
        if physical.h() != 0 || physical.c() >= layout.tracks {
            return Vec::new();
        }
        (0..BROTHER_SECTORS)
            .map(|s| DiskChs::new(physical.c(), 0, s))
            .collect()
    }

    pub(crate) fn match_record(fifo: u64) -> Option<usize> {
        match fifo & 0xFFFF_FFFF {
            BROTHER_HEADER_SYNC | BROTHER_DATA_SYNC => Some(BROTHER_SYNC_LEN),
            _ => None,
        }
    }

    pub(crate) fn validate(layout: &BrotherLayout) -> Result<(), CodecError> {
        validate_timing(
            "Brother",
            layout.target_clock_period_us,
            layout.target_rotational_period_ms,
        )?;
        let spacings = [
            layout.post_index_gap_ms,
            layout.sector_spacing_ms,
            layout.post_header_spacing_ms,
        ];
        if spacings.iter().any(|ms| !(ms.is_finite() && *ms >= 0.0)) {
            return Err(CodecError::InvalidLayout(format!(
                "Brother: record spacing must be non-negative, got {:?}",
                spacings
            )));
        }
        if layout.post_header_spacing_ms >= layout.sector_spacing_ms {
            return Err(CodecError::InvalidLayout(format!(
                "Brother: data record at {}ms does not precede the next header at {}ms",
                layout.post_header_spacing_ms, layout.sector_spacing_ms
            )));
        }
        Ok(())
    }

    pub(crate) fn decode_records(_layout: &BrotherLayout, ctx: &DecodeContext, records: &[RawRecord]) -> Vec<Sector> {
        let mut sectors = Vec::new();
        let mut state = HeaderState::Seeking;

        for raw in records {
            match raw.read_raw(0, BROTHER_SYNC_LEN) {
                Some(BROTHER_HEADER_SYNC) => {
                    state.take().flush(&mut sectors);
                    if let Some(sector) = Self::decode_header(ctx, raw) {
                        state = HeaderState::HeaderFound {
                            sector,
                            data_len: BROTHER_SECTOR_SIZE,
                        };
                    }
                }
                Some(BROTHER_DATA_SYNC) => match state.take() {
                    HeaderState::HeaderFound { mut sector, .. } => {
                        Self::decode_data(ctx, raw, &mut sector);
                        sectors.push(sector);
                    }
                    HeaderState::Seeking => {
                        log::trace!(
                            "BrotherSchema::decode_records(): Data record at bit {} without a header",
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

    fn decode_header(ctx: &DecodeContext, raw: &RawRecord) -> Option<Sector> {
        let track = decode_brother_header(raw.read_raw(BROTHER_SYNC_LEN, 16)? as u16);
        let sector = decode_brother_header(raw.read_raw(BROTHER_SYNC_LEN + 16, 16)? as u16);

        // There is no header checksum, so range checks are all that catch a misread.
        let (Some(track), Some(sector)) = (track, sector)
        else {
            log::trace!(
                "BrotherSchema::decode_header(): Invalid GCR in header at bit {}",
                raw.start
            );
            return None;
        };
        if track > MAX_TRACK || sector > MAX_SECTOR {
            log::trace!(
                "BrotherSchema::decode_header(): Implausible header at bit {}: track {} sector {}",
                raw.start,
                track,
                sector
            );
            return None;
        }

        let logical = DiskChs::new(track as u16, ctx.physical.h(), sector);
        let record = ctx.record(raw, HEADER_LEN, vec![track, sector]);
        Some(ctx.header_sector(logical, record))
    }

    fn decode_data(ctx: &DecodeContext, raw: &RawRecord, sector: &mut Sector) {
        let mut disk_bytes = raw.bytes_at(BROTHER_SYNC_LEN);
        disk_bytes.truncate(BROTHER_DATA_ENCODED_LEN);
        let (decoded, invalid) = decode_brother_data(&disk_bytes);
        let data = decoded.get(..BROTHER_SECTOR_SIZE).unwrap_or(&decoded[..]).to_vec();

        let status = match decoded.get(BROTHER_SECTOR_SIZE..BROTHER_SECTOR_SIZE + CRC_LEN) {
            Some(crc) if invalid == 0 => {
                let stored = u32::from_be_bytes([0, crc[0], crc[1], crc[2]]);
                let calculated = crc_brother(&data);
                if stored == calculated {
                    SectorStatus::Ok
                }
                else {
                    log::debug!(
                        "BrotherSchema::decode_data(): CRC error in sector {}: {:06X} calculated: {:06X}",
                        sector.logical,
                        stored,
                        calculated
                    );
                    SectorStatus::BadChecksum
                }
            }
            _ => {
                log::debug!(
                    "BrotherSchema::decode_data(): Sector {} has {} invalid GCR symbols in {} disk bytes",
                    sector.logical,
                    invalid,
                    disk_bytes.len()
                );
                SectorStatus::BadChecksum
            }
        };

        let record = ctx.record(raw, BROTHER_SYNC_LEN + disk_bytes.len() * 8, disk_bytes);
        attach_data(sector, data, status, record);
    }

    fn write_header(writer: &mut TrackWriter, track: u8, sector: u8) {
        writer.write_raw_repeat(1, 1, 31);
        writer.write_raw(BROTHER_HEADER_SYNC, BROTHER_SYNC_LEN);
        for value in [track, sector, HEADER_FILLER] {
            writer.write_raw(encode_brother_header(value) as u64, 16);
        }
    }

    fn write_data(writer: &mut TrackWriter, data: &[u8], corrupt_crc: bool) {
        let mut crc = crc_brother(data);
        if corrupt_crc {
            crc ^= 0xFF_FFFF;
        }
        let mut block = Vec::with_capacity(data.len() + CRC_LEN + DATA_TRAILER.len());
        block.extend_from_slice(data);
        block.extend_from_slice(&crc.to_be_bytes()[1..]);
        block.extend_from_slice(&DATA_TRAILER);

        writer.write_raw_repeat(1, 1, 32);
        writer.write_raw(BROTHER_DATA_SYNC, BROTHER_SYNC_LEN);
        writer.write_raw_bytes(&encode_brother_data(&block));
    }

    pub(crate) fn encode_sectors(
        layout: &BrotherLayout,
        physical: DiskCh,
        sectors: &[Sector],
        writer: &mut TrackWriter,
    ) -> Result<(), CodecError> {
        let mut n = 0;
        for sector in sectors {
            let with_data = match sector.status {
                SectorStatus::Ok | SectorStatus::BadChecksum => true,
                SectorStatus::DataMissing => false,
                _ => continue,
            };
            if with_data && sector.data.len() != BROTHER_SECTOR_SIZE {
                return Err(CodecError::UnsupportedSectorSize(sector.data.len()));
            }
            let chs = sector.logical;
            let track = u8::try_from(chs.c())
                .ok()
                .filter(|c| *c <= MAX_TRACK)
                .ok_or(CodecError::InvalidSector(chs))?;
            if chs.s() > MAX_SECTOR {
                return Err(CodecError::InvalidSector(chs));
            }

            writer.fill_to(layout.cell_at(n, false), 0b10, 2)?;
            Self::write_header(writer, track, chs.s());
            if with_data {
                writer.fill_to(layout.cell_at(n, true), 0b10, 2)?;
                Self::write_data(writer, &sector.data, sector.status == SectorStatus::BadChecksum);
            }
            n += 1;
        }

        log::trace!(
            "BrotherSchema::encode_sectors(): Wrote {} sectors of {} in {} bits",
            n,
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

    fn track_sectors(layout: &BrotherLayout, physical: DiskCh) -> Vec<Sector> {
        BrotherSchema::expected_sectors(layout, physical)
            .into_iter()
            .map(|chs| {
                let data = (0..256).map(|i| (i as u8).wrapping_mul(13) ^ chs.s()).collect();
                Sector::new(physical, chs, data)
            })
            .collect()
    }

    fn round_trip(layout: &BrotherLayout, physical: DiskCh, sectors: &[Sector]) -> Vec<Sector> {
        let mut writer = TrackWriter::new(BrotherSchema::timing(layout).capacity_bits());
        BrotherSchema::encode_sectors(layout, physical, sectors, &mut writer).unwrap();
        let (bits, _) = writer.finish(0b10, 2).unwrap();
        let records = extract_records(&bits, &BrotherSchema::match_record);
        let ctx = DecodeContext::new(physical, &[], 3.83e-6);
        BrotherSchema::decode_records(layout, &ctx, &records)
    }

    #[test]
    fn full_track_round_trip() {
        let layout = BrotherLayout::default();
        let physical = DiskCh::new(77, 0);
        let sectors = track_sectors(&layout, physical);
        let decoded = round_trip(&layout, physical, &sectors);

        assert_eq!(decoded.len(), 12);
        for (original, sector) in sectors.iter().zip(&decoded) {
            assert_eq!(sector.status, SectorStatus::Ok);
            assert_eq!(sector.logical, original.logical);
            assert_eq!(sector.data, original.data);
            assert_eq!(sector.records.len(), 2);
        }
    }

    #[test]
    fn records_start_at_fixed_times() {
        let layout = BrotherLayout::default();
        let physical = DiskCh::new(3, 0);
        let sectors = track_sectors(&layout, physical);
        let decoded = round_trip(&layout, physical, &sectors[..2]);
        // The sync pattern follows 31 (header) or 32 (data) leading 1 bits.
        assert_eq!(decoded[1].records[0].position, layout.cell_at(1, false) + 31);
        assert_eq!(decoded[1].records[1].position, layout.cell_at(1, true) + 32);
    }

    #[test]
    fn bad_crc_and_missing_data() {
        let layout = BrotherLayout::default();
        let physical = DiskCh::new(10, 0);
        let mut sectors = track_sectors(&layout, physical);
        sectors.truncate(3);
        sectors[1].status = SectorStatus::BadChecksum;
        sectors[2].status = SectorStatus::DataMissing;

        let decoded = round_trip(&layout, physical, &sectors);
        let statuses: Vec<SectorStatus> = decoded.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![SectorStatus::Ok, SectorStatus::BadChecksum, SectorStatus::DataMissing]
        );
        assert_eq!(decoded[1].data, sectors[1].data);
        assert!(decoded[2].data.is_empty());
    }

    #[test]
    fn flipped_data_bit_fails_crc() {
        let layout = BrotherLayout::default();
        let physical = DiskCh::new(1, 0);
        let sectors = track_sectors(&layout, physical);

        let mut writer = TrackWriter::new(BrotherSchema::timing(&layout).capacity_bits());
        BrotherSchema::encode_sectors(&layout, physical, &sectors[..1], &mut writer).unwrap();
        let (mut bits, _) = writer.finish(0b10, 2).unwrap();
        let records = extract_records(&bits, &BrotherSchema::match_record);
        // Swap one 5-in-8 code for another so the symbols stay valid.
        let pos = records[1].start + BROTHER_SYNC_LEN + 100 * 8;
        let code = crate::bitstream_codec::read_bits(&bits, pos, 8).unwrap() as u8;
        let other = if code == 0xAA { 0xABu8 } else { 0xAA };
        for i in 0..8 {
            bits.set(pos + i, other & (0x80 >> i) != 0);
        }

        let records = extract_records(&bits, &BrotherSchema::match_record);
        let ctx = DecodeContext::new(physical, &[], 3.83e-6);
        let decoded = BrotherSchema::decode_records(&layout, &ctx, &records);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].status, SectorStatus::BadChecksum);
        assert_eq!(decoded[0].data.len(), 256);
    }

    #[test]
    fn only_side_zero_is_formatted() {
        let layout = BrotherLayout::brother120();
        assert_eq!(BrotherSchema::expected_sectors(&layout, DiskCh::new(5, 1)).len(), 0);
        assert_eq!(BrotherSchema::expected_sectors(&layout, DiskCh::new(39, 0)).len(), 0);
        assert_eq!(BrotherSchema::expected_sectors(&layout, DiskCh::new(38, 0)).len(), 12);
    }

    #[test]
    fn out_of_range_sectors_rejected() {
        let layout = BrotherLayout::default();
        let physical = DiskCh::new(0, 0);
        let mut writer = TrackWriter::new(60_000);

        let sector = Sector::new(physical, DiskChs::new(0, 0, 0), vec![0; 512]);
        assert!(matches!(
            BrotherSchema::encode_sectors(&layout, physical, &[sector], &mut writer),
            Err(CodecError::UnsupportedSectorSize(512))
        ));
        let sector = Sector::new(physical, DiskChs::new(80, 0, 0), vec![0; 256]);
        assert!(matches!(
            BrotherSchema::encode_sectors(&layout, physical, &[sector], &mut writer),
            Err(CodecError::InvalidSector(_))
        ));
        let sector = Sector::new(physical, DiskChs::new(0, 0, 12), vec![0; 256]);
        assert!(matches!(
            BrotherSchema::encode_sectors(&layout, physical, &[sector], &mut writer),
            Err(CodecError::InvalidSector(_))
        ));
    }

    #[test]
    fn validation() {
        assert!(BrotherSchema::validate(&BrotherLayout::default()).is_ok());
        assert!(BrotherSchema::validate(&BrotherLayout::default().with_post_header_spacing_ms(20.0)).is_err());
        assert!(BrotherSchema::validate(&BrotherLayout::default().with_post_index_gap_ms(-1.0)).is_err());
        assert!(BrotherSchema::validate(&BrotherLayout::default().with_clock_period_us(0.0)).is_err());
    }
}
