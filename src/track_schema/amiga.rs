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

//! Amiga trackdisk layout.
//!
//! Eleven sectors are written back to back after a short post-index gap. Each sector is a single
//! record beginning with two `A1` sync words. All fields are stored in odd/even form: the odd bits
//! of a whole field are MFM-encoded first, then the even bits. Checksums are computed over the
//! raw MFM words with the clock bits masked off.

use crate::{
    bitstream_codec::mfm::{amiga_deinterleave, amiga_mfm_raw},
    sector::Sector,
    sync::RawRecord,
    track::writer::TrackWriter,
    track_schema::{validate_timing, DecodeContext, TrackTiming},
    types::{DiskCh, DiskChs, SectorStatus},
    util::amiga_checksum,
    CodecError,
};
use binrw::{binrw, BinRead, BinWrite};
use std::io::Cursor;

/// `00 A1 A1` as written before each sector.
pub const AMIGA_SYNC: u64 = 0xAAAA_4489_4489;
pub const AMIGA_SYNC_LEN: usize = 48;

pub const AMIGA_SECTOR_SIZE: usize = 512;
pub const AMIGA_LABEL_SIZE: usize = 16;
pub const AMIGA_FORMAT_BYTE: u8 = 0xFF;

static EMPTY_LABEL: [u8; AMIGA_LABEL_SIZE] = [0; AMIGA_LABEL_SIZE];

// Offsets of each field in decoded bytes from the start of the record.
const HEADER_OFFSET: usize = 3;
const LABEL_OFFSET: usize = 7;
const HEADER_CHECKSUM_OFFSET: usize = 23;
const DATA_CHECKSUM_OFFSET: usize = 27;
const DATA_OFFSET: usize = 31;
const RECORD_LEN: usize = DATA_OFFSET + AMIGA_SECTOR_SIZE;

// Ranges of raw MFM bytes covered by each checksum.
const HEADER_CHECKSUM_RANGE: std::ops::Range<usize> = 6..46;
const DATA_CHECKSUM_RANGE: std::ops::Range<usize> = 62..1086;

#[derive(Debug)]
#[binrw]
#[brw(big)]
pub struct AmigaSectorHeader {
    pub format: u8,
    /// `(cylinder << 1) | head`
    pub track: u8,
    pub sector: u8,
    pub sectors_to_gap: u8,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AmigaLayout {
    pub target_clock_period_us: f64,
    pub target_rotational_period_ms: f64,
    pub sector_count: u8,
    /// Length of the filler written between the index and the first sector.
    pub post_index_gap_ms: f64,
    /// Carry each sector's 16-byte label in front of its data.
    pub label: bool,
}

impl Default for AmigaLayout {
    fn default() -> Self {
        AmigaLayout {
            target_clock_period_us: 2.0,
            target_rotational_period_ms: 200.0,
            sector_count: 11,
            post_index_gap_ms: 0.5,
            label: false,
        }
    }
}

impl AmigaLayout {
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

    pub fn with_post_index_gap_ms(mut self, gap: f64) -> Self {
        self.post_index_gap_ms = gap;
        self
    }

    pub fn with_label(mut self, label: bool) -> Self {
        self.label = label;
        self
    }

    /// Size of a [Sector]'s data under this layout.
    pub fn sector_size(&self) -> usize {
        if self.label {
            AMIGA_LABEL_SIZE + AMIGA_SECTOR_SIZE
        }
        else {
            AMIGA_SECTOR_SIZE
        }
    }
}

pub struct AmigaSchema;

impl AmigaSchema {
    pub(crate) fn timing(layout: &AmigaLayout) -> TrackTiming {
        TrackTiming::new(layout.target_clock_period_us, layout.target_rotational_period_ms)
    }

    pub(crate) fn expected_sectors(layout: &AmigaLayout, physical: DiskCh) -> Vec<DiskChs> {
        (0..layout.sector_count).map(|s| physical.with_sector(s)).collect()
    }

    pub(crate) fn match_record(fifo: u64) -> Option<usize> {
        (fifo & 0xFFFF_FFFF_FFFF == AMIGA_SYNC).then_some(AMIGA_SYNC_LEN)
    }

    pub(crate) fn validate(layout: &AmigaLayout) -> Result<(), CodecError> {
        validate_timing(
            "Amiga",
            layout.target_clock_period_us,
            layout.target_rotational_period_ms,
        )?;
        if layout.sector_count == 0 || layout.sector_count > 22 {
            return Err(CodecError::InvalidLayout(format!(
                "Amiga: unsupported sector count {}",
                layout.sector_count
            )));
        }
        if layout.post_index_gap_ms.is_nan() || layout.post_index_gap_ms < 0.0 {
            return Err(CodecError::InvalidLayout(format!(
                "Amiga: invalid post-index gap {}",
                layout.post_index_gap_ms
            )));
        }
        Ok(())
    }

    fn read_u32(decoded: &[u8]) -> u32 {
        let value = amiga_deinterleave(decoded);
        u32::from_be_bytes([value[0], value[1], value[2], value[3]])
    }

    pub(crate) fn decode_records(layout: &AmigaLayout, ctx: &DecodeContext, records: &[RawRecord]) -> Vec<Sector> {
        let mut sectors = Vec::new();

        for raw in records {
            let bytes = raw.decoded();
            if bytes.len() < DATA_OFFSET {
                log::trace!(
                    "AmigaSchema::decode_records(): Short record of {} bytes at bit {}",
                    bytes.len(),
                    raw.start
                );
                continue;
            }
            let raw_bytes = raw.bytes();

            let header_bytes = amiga_deinterleave(&bytes[HEADER_OFFSET..LABEL_OFFSET]);
            let header = match AmigaSectorHeader::read(&mut Cursor::new(&header_bytes)) {
                Ok(header) => header,
                Err(_) => continue,
            };
            let stored = Self::read_u32(&bytes[HEADER_CHECKSUM_OFFSET..DATA_CHECKSUM_OFFSET]);
            let calculated = amiga_checksum(&raw_bytes[HEADER_CHECKSUM_RANGE]);
            if stored != calculated || header.format != AMIGA_FORMAT_BYTE {
                log::trace!(
                    "AmigaSchema::decode_records(): Bad header at bit {}: format {:02X} checksum {:08X} calculated: {:08X}",
                    raw.start,
                    header.format,
                    stored,
                    calculated
                );
                continue;
            }

            let logical = DiskChs::new((header.track >> 1) as u16, header.track & 1, header.sector);

            if bytes.len() < RECORD_LEN {
                log::debug!(
                    "AmigaSchema::decode_records(): Sector {} data truncated at {} bytes",
                    logical,
                    bytes.len()
                );
                let record = ctx.record(raw, raw.len(), bytes.clone());
                sectors.push(ctx.whole_sector(logical, record, Vec::new(), SectorStatus::DataMissing));
                continue;
            }

            let stored = Self::read_u32(&bytes[DATA_CHECKSUM_OFFSET..DATA_OFFSET]);
            let calculated = amiga_checksum(&raw_bytes[DATA_CHECKSUM_RANGE]);
            let status = if stored == calculated {
                SectorStatus::Ok
            }
            else {
                log::debug!(
                    "AmigaSchema::decode_records(): Data checksum error in sector {}: {:08X} calculated: {:08X}",
                    logical,
                    stored,
                    calculated
                );
                SectorStatus::BadChecksum
            };

            let mut data = Vec::with_capacity(layout.sector_size());
            if layout.label {
                data.extend(amiga_deinterleave(&bytes[LABEL_OFFSET..HEADER_CHECKSUM_OFFSET]));
            }
            data.extend(amiga_deinterleave(&bytes[DATA_OFFSET..RECORD_LEN]));

            let record = ctx.record(raw, RECORD_LEN * 16, bytes[..RECORD_LEN].to_vec());
            sectors.push(ctx.whole_sector(logical, record, data, status));
        }
        sectors
    }

    pub(crate) fn encode_sectors(
        layout: &AmigaLayout,
        physical: DiskCh,
        sectors: &[Sector],
        writer: &mut TrackWriter,
    ) -> Result<(), CodecError> {
        let clock = layout.target_clock_period_us * 1e-6;
        let gap_cells = ((layout.post_index_gap_ms * 1e-3) / clock).round() as usize;
        writer.write_raw_repeat(0b10, 2, gap_cells / 2);

        for sector in sectors.iter().filter(|s| s.is_encodable()) {
            if sector.data.len() != layout.sector_size() {
                return Err(CodecError::UnsupportedSectorSize(sector.data.len()));
            }
            let (label, data) = if layout.label {
                sector.data.split_at(AMIGA_LABEL_SIZE)
            }
            else {
                (&EMPTY_LABEL[..], &sector.data[..])
            };

            let s = sector.logical.s();
            let track = u8::try_from(sector.logical.c())
                .ok()
                .filter(|c| *c < 0x80)
                .ok_or(CodecError::InvalidSector(sector.logical))?;
            let mut header = Cursor::new(Vec::with_capacity(4));
            AmigaSectorHeader {
                format: AMIGA_FORMAT_BYTE,
                track: (track << 1) | (sector.logical.h() & 1),
                sector: s,
                sectors_to_gap: layout.sector_count.saturating_sub(s),
            }
            .write(&mut header)?;

            // Clock bits are masked out of the checksums, so the phase they are computed in does
            // not matter.
            let header_raw = amiga_mfm_raw(header.get_ref(), &mut false);
            let label_raw = amiga_mfm_raw(label, &mut false);
            let header_checksum = amiga_checksum(&[header_raw.to_bytes(), label_raw.to_bytes()].concat());
            let mut data_checksum = amiga_checksum(&amiga_mfm_raw(data, &mut false).to_bytes());
            if sector.status == SectorStatus::BadChecksum {
                data_checksum ^= 0x5555_5555;
            }

            writer.write_mfm(&[0x00, 0x00]);
            writer.write_raw(0x4489_4489, 32);
            let header_checksum = header_checksum.to_be_bytes();
            let data_checksum = data_checksum.to_be_bytes();
            let fields: [&[u8]; 5] = [header.get_ref(), label, &header_checksum, &data_checksum, data];
            for field in fields {
                let mut last_bit = writer.last_bit();
                writer.write_bits(&amiga_mfm_raw(field, &mut last_bit));
            }
        }

        log::trace!(
            "AmigaSchema::encode_sectors(): Wrote {} to {} bits",
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

    fn encode(layout: &AmigaLayout, sectors: &[Sector]) -> bit_vec::BitVec {
        let mut writer = TrackWriter::new(AmigaSchema::timing(layout).capacity_bits());
        AmigaSchema::encode_sectors(layout, DiskCh::new(40, 1), sectors, &mut writer).unwrap();
        writer.finish(0b10, 2).unwrap().0
    }

    fn decode(layout: &AmigaLayout, bits: &bit_vec::BitVec) -> Vec<Sector> {
        let records = extract_records(bits, &AmigaSchema::match_record);
        let ctx = DecodeContext::new(DiskCh::new(40, 1), &[], 2e-6);
        AmigaSchema::decode_records(layout, &ctx, &records)
    }

    fn sectors(layout: &AmigaLayout) -> Vec<Sector> {
        let physical = DiskCh::new(40, 1);
        AmigaSchema::expected_sectors(layout, physical)
            .into_iter()
            .map(|chs| {
                let data = (0..layout.sector_size()).map(|i| (i as u8) ^ chs.s()).collect();
                Sector::new(physical, chs, data)
            })
            .collect()
    }

    #[test]
    fn full_track_round_trip() {
        let layout = AmigaLayout::default();
        let originals = sectors(&layout);
        let decoded = decode(&layout, &encode(&layout, &originals));

        assert_eq!(decoded.len(), 11);
        for (original, sector) in originals.iter().zip(&decoded) {
            assert_eq!(sector.status, SectorStatus::Ok);
            assert_eq!(sector.logical, original.logical);
            assert_eq!(sector.data, original.data);
        }
    }

    #[test]
    fn label_round_trip() {
        let layout = AmigaLayout::default().with_label(true).with_sector_count(2);
        let originals = sectors(&layout);
        let decoded = decode(&layout, &encode(&layout, &originals));
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1].data.len(), 528);
        assert_eq!(decoded[1].data, originals[1].data);
    }

    #[test]
    fn bad_data_checksum() {
        let layout = AmigaLayout::default().with_sector_count(1);
        let mut originals = sectors(&layout);
        originals[0].status = SectorStatus::BadChecksum;
        let decoded = decode(&layout, &encode(&layout, &originals));
        assert_eq!(decoded[0].status, SectorStatus::BadChecksum);
        assert_eq!(decoded[0].data, originals[0].data);
    }

    #[test]
    fn wrong_size_rejected() {
        let layout = AmigaLayout::default();
        let sector = Sector::new(DiskCh::new(0, 0), DiskChs::new(0, 0, 0), vec![0; 256]);
        let mut writer = TrackWriter::new(100_000);
        assert!(matches!(
            AmigaSchema::encode_sectors(&layout, DiskCh::new(0, 0), &[sector], &mut writer),
            Err(CodecError::UnsupportedSectorSize(256))
        ));
    }

    #[test]
    fn track_beyond_header_field_rejected() {
        let layout = AmigaLayout::default();
        let physical = DiskCh::new(128, 0);
        let sector = Sector::new(physical, physical.with_sector(0), vec![0; 512]);
        let mut writer = TrackWriter::new(100_000);
        assert!(matches!(
            AmigaSchema::encode_sectors(&layout, physical, &[sector], &mut writer),
            Err(CodecError::InvalidSector(_))
        ));
    }

    #[test]
    fn track_fits_capacity() {
        let layout = AmigaLayout::default();
        let originals = sectors(&layout);
        let mut writer = TrackWriter::new(100_000);
        AmigaSchema::encode_sectors(&layout, DiskCh::new(40, 1), &originals, &mut writer).unwrap();
        assert_eq!(writer.len(), 250 + 11 * 8704);
    }
}
