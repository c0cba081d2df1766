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

    src/track_schema/victor9k.rs

    Victor 9000 GCR track layout with zoned recording.
*/

//! Victor 9000 / Sirius 1 track layout.
//!
//! The Victor uses the same 4-to-5 GCR code as the Commodore drives but a fixed bit cell and a
//! spindle speed that varies by zone, so that outer tracks hold more sectors. Each sector is a
//! header block and a data block, each behind a long run of 1 bits.

use crate::{
    bitstream_codec::gcr::{decode_c64_bytes, decode_c64_bytes_lossy, C64_GCR_BYTE_LEN},
    sector::Sector,
    sync::RawRecord,
    track::writer::TrackWriter,
    track_schema::{attach_data, validate_timing, DecodeContext, HeaderState, TrackTiming},
    types::{DiskCh, DiskChs, SectorStatus},
    util::sum_bytes,
    CodecError,
};
use binrw::{binrw, BinRead, BinWrite};
use std::io::Cursor;

/// Twenty-two 1 bits followed by GCR `07`.
pub const VICTOR9K_HEADER_SYNC: u64 = 0xFFFF_FD57;
/// Twenty-two 1 bits followed by GCR `08`.
pub const VICTOR9K_DATA_SYNC: u64 = 0xFFFF_FD49;
pub const VICTOR9K_SYNC_LEN: usize = 32;
/// The GCR block id is the last byte of the sync pattern.
const RECORD_OFFSET: usize = VICTOR9K_SYNC_LEN - C64_GCR_BYTE_LEN;

pub const VICTOR9K_HEADER_ID: u8 = 0x07;
pub const VICTOR9K_DATA_ID: u8 = 0x08;
pub const VICTOR9K_SECTOR_SIZE: usize = 512;
const HEADER_LEN: usize = 4;
const DATA_BLOCK_LEN: usize = 1 + VICTOR9K_SECTOR_SIZE + 2;

const MAX_SECTOR: u8 = 20;
const MAX_TRACK: u8 = 85;
const GAP_BYTE: u8 = 0x55;

/// (first cylinder of zone, sectors per track, rotational period in ms)
pub const VICTOR9K_ZONES: [(u16, u8, f64); 8] = [
    (0, 19, 237.9),
    (4, 18, 224.5),
    (16, 17, 212.2),
    (27, 16, 199.9),
    (38, 15, 187.6),
    (48, 14, 175.3),
    (60, 13, 163.0),
    (71, 12, 149.6),
];

#[derive(Debug)]
#[binrw]
#[brw(little)]
pub struct Victor9kHeader {
    pub id: u8,
    /// `track | (side << 7)`
    pub track: u8,
    pub sector: u8,
    pub checksum: u8,
}

impl Victor9kHeader {
    fn new(track: u8, sector: u8) -> Self {
        Victor9kHeader {
            id: VICTOR9K_HEADER_ID,
            track,
            sector,
            checksum: track.wrapping_add(sector),
        }
    }

    fn is_valid(&self) -> bool {
        self.id == VICTOR9K_HEADER_ID && self.checksum == self.track.wrapping_add(self.sector)
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Victor9kLayout {
    pub target_clock_period_us: f64,
    /// Length of the run of 1 bits before each block.
    pub sync_bits: usize,
    /// Gap bytes after each block.
    pub block_gap: usize,
    /// Gap bytes between the index and the first sector.
    pub post_index_gap: usize,
}

impl Default for Victor9kLayout {
    fn default() -> Self {
        Victor9kLayout {
            target_clock_period_us: 2.0,
            sync_bits: 30,
            block_gap: 8,
            post_index_gap: 0,
        }
    }
}

impl Victor9kLayout {
    pub fn with_clock_period_us(mut self, period: f64) -> Self {
        self.target_clock_period_us = period;
        self
    }

    pub fn with_sync_bits(mut self, bits: usize) -> Self {
        self.sync_bits = bits;
        self
    }

    pub fn with_block_gap(mut self, gap: usize) -> Self {
        self.block_gap = gap;
        self
    }

    pub fn with_post_index_gap(mut self, gap: usize) -> Self {
        self.post_index_gap = gap;
        self
    }

    /// Return the sector count and rotational period in ms of `cylinder`.
    pub fn zone(cylinder: u16) -> (u8, f64) {
        let (_, sectors, period) = VICTOR9K_ZONES
            .iter()
            .rev()
            .find(|(first, _, _)| cylinder >= *first)
            .copied()
            .unwrap_or(VICTOR9K_ZONES[0]);
        (sectors, period)
    }
}

pub struct Victor9kSchema;

impl Victor9kSchema {
    pub(crate) fn timing(layout: &Victor9kLayout, physical: DiskCh) -> TrackTiming {
        let (_, period) = Victor9kLayout::zone(physical.c());
        TrackTiming::new(layout.target_clock_period_us, period)
    }

    pub(crate) fn expected_sectors(_layout: &Victor9kLayout, physical: DiskCh) -> Vec<DiskChs> {
        let (count, _) = Victor9kLayout::zone(physical.c());
        (0..count)
            .map(|s| DiskChs::new(physical.c(), physical.h(), s))
            .collect()
    }

    pub(crate) fn match_record(fifo: u64) -> Option<usize> {
        match fifo & 0xFFFF_FFFF {
            VICTOR9K_HEADER_SYNC | VICTOR9K_DATA_SYNC => Some(VICTOR9K_SYNC_LEN),
            _ => None,
        }
    }

    pub(crate) fn validate(layout: &Victor9kLayout) -> Result<(), CodecError> {
        validate_timing("Victor9k", layout.target_clock_period_us, VICTOR9K_ZONES[0].2)?;
        // The sync pattern needs 22 ones ahead of the block id.
        if layout.sync_bits < RECORD_OFFSET {
            return Err(CodecError::InvalidLayout(format!(
                "Victor9k: sync run of {} bits is shorter than {}",
                layout.sync_bits, RECORD_OFFSET
            )));
        }
        Ok(())
    }

    pub(crate) fn decode_records(_layout: &Victor9kLayout, ctx: &DecodeContext, records: &[RawRecord]) -> Vec<Sector> {
        let mut sectors = Vec::new();
        let mut state = HeaderState::Seeking;

        for raw in records {
            match raw.read_raw(0, VICTOR9K_SYNC_LEN) {
                Some(VICTOR9K_HEADER_SYNC) => {
                    state.take().flush(&mut sectors);
                    if let Some(sector) = Self::decode_header(ctx, raw) {
                        state = HeaderState::HeaderFound {
                            sector,
                            data_len: VICTOR9K_SECTOR_SIZE,
                        };
                    }
                }
                Some(VICTOR9K_DATA_SYNC) => match state.take() {
                    HeaderState::HeaderFound { mut sector, data_len } => {
                        Self::decode_data(ctx, raw, data_len, &mut sector);
                        sectors.push(sector);
                    }
                    HeaderState::Seeking => {
                        log::trace!(
                            "Victor9kSchema::decode_records(): Data block at bit {} without a header",
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
        let Some(bytes) = decode_c64_bytes(&raw.bits, RECORD_OFFSET, HEADER_LEN)
        else {
            log::trace!(
                "Victor9kSchema::decode_header(): Invalid GCR in header at bit {}",
                raw.start
            );
            return None;
        };

        let header = Victor9kHeader::read(&mut Cursor::new(&bytes)).ok()?;
        if !header.is_valid() {
            log::trace!(
                "Victor9kSchema::decode_header(): Bad header checksum at bit {}: {:02X} calculated: {:02X}",
                raw.start,
                header.checksum,
                header.track.wrapping_add(header.sector)
            );
            return None;
        }

        let (track, side) = (header.track & 0x7F, header.track >> 7);
        if header.sector > MAX_SECTOR || track > MAX_TRACK {
            log::trace!(
                "Victor9kSchema::decode_header(): Implausible header at bit {}: track {} sector {}",
                raw.start,
                track,
                header.sector
            );
            return None;
        }

        let logical = DiskChs::new(track as u16, side, header.sector);
        let record = ctx.record(raw, RECORD_OFFSET + HEADER_LEN * C64_GCR_BYTE_LEN, bytes);
        Some(ctx.header_sector(logical, record))
    }

    fn decode_data(ctx: &DecodeContext, raw: &RawRecord, data_len: usize, sector: &mut Sector) {
        let (block, invalid) = decode_c64_bytes_lossy(&raw.bits, RECORD_OFFSET, 1 + data_len + 2);
        let payload_end = (1 + data_len).min(block.len());
        let data = block.get(1..payload_end).unwrap_or_default().to_vec();

        let status = if block.len() < 1 + data_len + 2 || invalid > 0 {
            log::debug!(
                "Victor9kSchema::decode_data(): Sector {} has {} invalid GCR symbols in {} bytes",
                sector.logical,
                invalid,
                block.len()
            );
            SectorStatus::BadChecksum
        }
        else {
            let stored = u16::from_le_bytes([block[1 + data_len], block[2 + data_len]]);
            let calculated = sum_bytes(&data);
            if stored != calculated {
                log::debug!(
                    "Victor9kSchema::decode_data(): Checksum error in sector {}: {:04X} calculated: {:04X}",
                    sector.logical,
                    stored,
                    calculated
                );
                SectorStatus::BadChecksum
            }
            else {
                SectorStatus::Ok
            }
        };

        let record = ctx.record(raw, RECORD_OFFSET + block.len() * C64_GCR_BYTE_LEN, block);
        attach_data(sector, data, status, record);
    }

    pub(crate) fn encode_sectors(
        layout: &Victor9kLayout,
        physical: DiskCh,
        sectors: &[Sector],
        writer: &mut TrackWriter,
    ) -> Result<(), CodecError> {
        writer.write_raw_repeat(GAP_BYTE as u64, 8, layout.post_index_gap);

        for sector in sectors.iter().filter(|s| s.is_encodable()) {
            if sector.data.len() != VICTOR9K_SECTOR_SIZE {
                return Err(CodecError::UnsupportedSectorSize(sector.data.len()));
            }
            let chs = sector.logical;
            if chs.c() > MAX_TRACK as u16 || chs.h() > 1 || chs.s() > MAX_SECTOR {
                return Err(CodecError::InvalidSector(chs));
            }

            let mut header = Cursor::new(Vec::with_capacity(HEADER_LEN));
            Victor9kHeader::new(chs.c() as u8 | (chs.h() << 7), chs.s()).write(&mut header)?;

            let mut block = Vec::with_capacity(DATA_BLOCK_LEN);
            block.push(VICTOR9K_DATA_ID);
            block.extend_from_slice(&sector.data);
            let mut checksum = sum_bytes(&sector.data);
            if sector.status == SectorStatus::BadChecksum {
                checksum ^= 0xFFFF;
            }
            block.extend_from_slice(&checksum.to_le_bytes());

            writer.write_raw_repeat(1, 1, layout.sync_bits);
            writer.write_gcr45(header.get_ref());
            writer.write_raw_repeat(GAP_BYTE as u64, 8, layout.block_gap);
            writer.write_raw_repeat(1, 1, layout.sync_bits);
            writer.write_gcr45(&block);
            writer.write_raw_repeat(GAP_BYTE as u64, 8, layout.block_gap);
        }

        log::trace!(
            "Victor9kSchema::encode_sectors(): Wrote {} in {} bits",
            physical,
            writer.len()
        );
        Ok(())
    }
}
