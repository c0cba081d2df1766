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

    src/track_schema/c64.rs

    Commodore 1541 GCR track layout.
*/

//! Commodore 1541 track layout.
//!
//! Bytes are written as 4-to-5 GCR, high nibble first. A sync is a run of at least ten 1 bits,
//! which GCR data can never contain. Each sector is a header block and a data block, each behind
//! its own sync. The drive runs at four clock rates so that outer tracks hold more sectors.

use crate::{
    bitstream_codec::gcr::{decode_c64_bytes, decode_c64_bytes_lossy, C64_GCR_BYTE_LEN},
    sector::Sector,
    sync::RawRecord,
    track::writer::TrackWriter,
    track_schema::{attach_data, validate_timing, DecodeContext, HeaderState, TrackTiming},
    types::{DiskCh, DiskChs, SectorStatus},
    util::xor_bytes,
    CodecError,
};

/// Ten 1 bits followed by GCR `08`.
pub const C64_HEADER_SYNC: u64 = 0xFFD49;
/// Ten 1 bits followed by GCR `07`.
pub const C64_DATA_SYNC: u64 = 0xFFD57;
pub const C64_SYNC_LEN: usize = 20;
/// The GCR payload of a record starts after the run of 1 bits.
const RECORD_OFFSET: usize = 10;

pub const C64_HEADER_ID: u8 = 0x08;
pub const C64_DATA_ID: u8 = 0x07;
pub const C64_SECTOR_SIZE: usize = 256;
const HEADER_LEN: usize = 8;
const DATA_BLOCK_LEN: usize = 1 + C64_SECTOR_SIZE + 1 + 2;
const PAD_BYTE: u8 = 0x0F;

const SYNC_BYTES: usize = 6;
const HEADER_GAP: usize = 9;
const GAP_BYTE: u8 = 0x55;

/// (first track of zone, clock period in µs, sectors per track), zero-based tracks.
pub const C64_SPEED_ZONES: [(u16, f64, u8); 4] = [(0, 3.25, 21), (17, 3.50, 19), (24, 3.75, 18), (30, 4.00, 17)];

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct C64Layout {
    pub target_rotational_period_ms: f64,
    /// Two-byte disk id written into every sector header.
    pub format_id: [u8; 2],
    /// Gap bytes after each data block.
    pub sector_gap: usize,
    /// Gap bytes between the index and the first sector.
    pub post_index_gap: usize,
}

impl Default for C64Layout {
    fn default() -> Self {
        C64Layout {
            target_rotational_period_ms: 200.0,
            format_id: [0x41, 0x41],
            sector_gap: 9,
            post_index_gap: 0,
        }
    }
}

impl C64Layout {
    pub fn with_rotational_period_ms(mut self, period: f64) -> Self {
        self.target_rotational_period_ms = period;
        self
    }

    pub fn with_format_id(mut self, id: [u8; 2]) -> Self {
        self.format_id = id;
        self
    }

    pub fn with_sector_gap(mut self, gap: usize) -> Self {
        self.sector_gap = gap;
        self
    }

    pub fn with_post_index_gap(mut self, gap: usize) -> Self {
        self.post_index_gap = gap;
        self
    }

    /// Return the clock period in µs and the sector count of zero-based `track`.
    pub fn zone(track: u16) -> (f64, u8) {
        let (_, clock, sectors) = C64_SPEED_ZONES
            .iter()
            .rev()
            .find(|(first, _, _)| track >= *first)
            .copied()
            .unwrap_or(C64_SPEED_ZONES[0]);
        (clock, sectors)
    }
}

pub struct C64Schema;

impl C64Schema {
    pub(crate) fn timing(layout: &C64Layout, physical: DiskCh) -> TrackTiming {
        let (clock, _) = C64Layout::zone(physical.c());
        TrackTiming::new(clock, layout.target_rotational_period_ms)
    }

    pub(crate) fn expected_sectors(_layout: &C64Layout, physical: DiskCh) -> Vec<DiskChs> {
        let (_, count) = C64Layout::zone(physical.c());
        (0..count).map(|s| DiskChs::new(physical.c(), 0, s)).collect()
    }

    pub(crate) fn match_record(fifo: u64) -> Option<usize> {
        match fifo & 0xF_FFFF {
            C64_HEADER_SYNC | C64_DATA_SYNC => Some(C64_SYNC_LEN),
            _ => None,
        }
    }

    pub(crate) fn validate(layout: &C64Layout) -> Result<(), CodecError> {
        validate_timing("C64", C64_SPEED_ZONES[0].1, layout.target_rotational_period_ms)
    }

    pub(crate) fn decode_records(_layout: &C64Layout, ctx: &DecodeContext, records: &[RawRecord]) -> Vec<Sector> {
        let mut sectors = Vec::new();
        let mut state = HeaderState::Seeking;

        for raw in records {
            match raw.read_raw(0, C64_SYNC_LEN) {
                Some(C64_HEADER_SYNC) => {
                    state.take().flush(&mut sectors);
                    if let Some(sector) = Self::decode_header(ctx, raw) {
                        state = HeaderState::HeaderFound {
                            sector,
                            data_len: C64_SECTOR_SIZE,
                        };
                    }
                }
                Some(C64_DATA_SYNC) => match state.take() {
                    HeaderState::HeaderFound { mut sector, data_len } => {
                        Self::decode_data(ctx, raw, data_len, &mut sector);
                        sectors.push(sector);
                    }
                    HeaderState::Seeking => {
                        log::trace!(
                            "C64Schema::decode_records(): Data block at bit {} without a header",
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
        let Some(header) = decode_c64_bytes(&raw.bits, RECORD_OFFSET, HEADER_LEN)
        else {
            log::trace!(
                "C64Schema::decode_header(): Invalid GCR in header at bit {}",
                raw.start
            );
            return None;
        };

        let (checksum, sector, track, id2, id1) = (header[1], header[2], header[3], header[4], header[5]);
        let calculated = xor_bytes(&[sector, track, id2, id1]);
        if checksum != calculated || track == 0 {
            log::trace!(
                "C64Schema::decode_header(): Bad header at bit {}: checksum {:02X} calculated: {:02X} track: {}",
                raw.start,
                checksum,
                calculated,
                track
            );
            return None;
        }

        let logical = DiskChs::new(track as u16 - 1, 0, sector);
        let record = ctx.record(raw, RECORD_OFFSET + HEADER_LEN * C64_GCR_BYTE_LEN, header);
        Some(ctx.header_sector(logical, record))
    }

    fn decode_data(ctx: &DecodeContext, raw: &RawRecord, data_len: usize, sector: &mut Sector) {
        let (block, invalid) = decode_c64_bytes_lossy(&raw.bits, RECORD_OFFSET, 1 + data_len + 1);
        let payload_end = (1 + data_len).min(block.len());
        let data = block.get(1..payload_end).unwrap_or_default().to_vec();

        let status = if block.len() < 1 + data_len + 1 || invalid > 0 {
            log::debug!(
                "C64Schema::decode_data(): Sector {} has {} invalid GCR symbols in {} bytes",
                sector.logical,
                invalid,
                block.len()
            );
            SectorStatus::BadChecksum
        }
        else if xor_bytes(&data) != block[1 + data_len] {
            log::debug!(
                "C64Schema::decode_data(): Checksum error in sector {}: {:02X} calculated: {:02X}",
                sector.logical,
                block[1 + data_len],
                xor_bytes(&data)
            );
            SectorStatus::BadChecksum
        }
        else {
            SectorStatus::Ok
        };

        let record = ctx.record(raw, RECORD_OFFSET + block.len() * C64_GCR_BYTE_LEN, block);
        attach_data(sector, data, status, record);
    }

    pub(crate) fn encode_sectors(
        layout: &C64Layout,
        physical: DiskCh,
        sectors: &[Sector],
        writer: &mut TrackWriter,
    ) -> Result<(), CodecError> {
        writer.write_raw_repeat(GAP_BYTE as u64, 8, layout.post_index_gap);

        for sector in sectors.iter().filter(|s| s.is_encodable()) {
            if sector.data.len() != C64_SECTOR_SIZE {
                return Err(CodecError::UnsupportedSectorSize(sector.data.len()));
            }
            let track = u8::try_from(sector.logical.c() as u32 + 1).map_err(|_| CodecError::InvalidSector(sector.logical))?;
            let s = sector.logical.s();
            let [id1, id2] = layout.format_id;
            let header = [
                C64_HEADER_ID,
                xor_bytes(&[s, track, id2, id1]),
                s,
                track,
                id2,
                id1,
                PAD_BYTE,
                PAD_BYTE,
            ];

            let mut block = Vec::with_capacity(DATA_BLOCK_LEN);
            block.push(C64_DATA_ID);
            block.extend_from_slice(&sector.data);
            let mut checksum = xor_bytes(&sector.data);
            if sector.status == SectorStatus::BadChecksum {
                checksum ^= 0xFF;
            }
            block.extend_from_slice(&[checksum, PAD_BYTE, PAD_BYTE]);

            writer.write_raw_repeat(0xFF, 8, SYNC_BYTES);
            writer.write_gcr45(&header);
            writer.write_raw_repeat(GAP_BYTE as u64, 8, HEADER_GAP);
            writer.write_raw_repeat(0xFF, 8, SYNC_BYTES);
            writer.write_gcr45(&block);
            writer.write_raw_repeat(GAP_BYTE as u64, 8, layout.sector_gap);
        }

        log::trace!(
            "C64Schema::encode_sectors(): Wrote {} in {} bits",
            physical,
            writer.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bitstream_codec::gcr::encode_c64_byte, sync::extract_records};

    fn round_trip(physical: DiskCh, sectors: &[Sector]) -> Vec<Sector> {
        let layout = C64Layout::default();
        let timing = C64Schema::timing(&layout, physical);
        let mut writer = TrackWriter::new(timing.capacity_bits());
        C64Schema::encode_sectors(&layout, physical, sectors, &mut writer).unwrap();
        let (bits, _) = writer.finish(0x55, 8).unwrap();
        let records = extract_records(&bits, &C64Schema::match_record);
        let ctx = DecodeContext::new(physical, &[], timing.clock_period);
        C64Schema::decode_records(&layout, &ctx, &records)
    }

    #[test]
    fn sync_patterns_end_in_block_ids() {
        assert_eq!(C64_HEADER_SYNC & 0x3FF, encode_c64_byte(C64_HEADER_ID) as u64);
        assert_eq!(C64_DATA_SYNC & 0x3FF, encode_c64_byte(C64_DATA_ID) as u64);
    }

    #[test]
    fn speed_zones() {
        assert_eq!(C64Layout::zone(0), (3.25, 21));
        assert_eq!(C64Layout::zone(16), (3.25, 21));
        assert_eq!(C64Layout::zone(17), (3.50, 19));
        assert_eq!(C64Layout::zone(29), (3.75, 18));
        assert_eq!(C64Layout::zone(34), (4.00, 17));
    }

    #[test]
    fn full_track_fits() {
        let physical = DiskCh::new(0, 0);
        let sectors: Vec<Sector> = C64Schema::expected_sectors(&C64Layout::default(), physical)
            .into_iter()
            .map(|chs| Sector::new(physical, chs, vec![chs.s(); 256]))
            .collect();
        let decoded = round_trip(physical, &sectors);
        assert_eq!(decoded.len(), 21);
        assert!(decoded.iter().all(|s| s.status == SectorStatus::Ok));
        assert_eq!(decoded[20].data, vec![20; 256]);
    }

    #[test]
    fn one_based_track_on_disk() {
        let physical = DiskCh::new(20, 0);
        let sector = Sector::new(physical, DiskChs::new(20, 0, 5), vec![0xA5; 256]);
        let decoded = round_trip(physical, &[sector]);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].logical, DiskChs::new(20, 0, 5));
        assert_eq!(decoded[0].records[0].raw_data[3], 21);
    }

    #[test]
    fn bad_checksum() {
        let physical = DiskCh::new(3, 0);
        let sector = Sector::new(physical, DiskChs::new(3, 0, 0), vec![1; 256]).with_status(SectorStatus::BadChecksum);
        let decoded = round_trip(physical, &[sector]);
        assert_eq!(decoded[0].status, SectorStatus::BadChecksum);
        assert_eq!(decoded[0].data, vec![1; 256]);
    }
}
