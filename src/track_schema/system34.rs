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

//! IBM System 34 track layout, as used by the PC and most other MFM and FM soft-sectored disks.
//!
//! A sector is two records: an ID record `FE C H R N CRC` and a data record `FB payload CRC`
//! (`F8` for deleted data). In MFM each record is preceded by three `A1` sync bytes written with
//! a missing clock bit (`0x4489`), which the CRC covers. FM records start directly with a mark
//! byte written with a reduced clock pattern.

use crate::{
    bitstream_codec::{
        fm::{self, FM_DAM, FM_IAM, FM_IDAM, FM_MARKERS},
        mfm::{self, DAM_BYTE, IAM_BYTE, IAM_SYNC, IDAM_BYTE, MFM_SYNC},
    },
    sector::Sector,
    sync::RawRecord,
    track::writer::TrackWriter,
    track_schema::{attach_data, validate_timing, DecodeContext, HeaderState, TrackTiming},
    types::{DiskCh, DiskChs, SectorStatus, TrackDataEncoding},
    util::crc_ibm_3740,
    CodecError,
};
use binrw::{binrw, BinRead, BinWrite};
use std::io::Cursor;

pub const GAP_BYTE: u8 = 0x4E;
pub const FM_GAP_BYTE: u8 = 0xFF;
pub const SYNC_BYTE: u8 = 0;

pub const IBM_GAP4A: usize = 80;
pub const IBM_GAP1: usize = 50;
pub const IBM_GAP2: usize = 22;
pub const IBM_GAP3: usize = 80;
pub const SYNC_LEN: usize = 12;
pub const FM_SYNC_LEN: usize = 6;

/// Three `A1` sync bytes with missing clocks, as they appear before every MFM record.
pub const MFM_RECORD_SYNC: u64 = 0x4489_4489_4489;
pub const MFM_RECORD_SYNC_LEN: usize = 48;
const MFM_SYNC_BYTES: [u8; 3] = [0xA1; 3];

const IDAM: u8 = 0xFE;
const DAM: u8 = 0xFB;
const DDAM: u8 = 0xF8;

/// The address field following an ID address mark.
#[derive(Debug)]
#[binrw]
#[brw(big)]
pub struct IdField {
    pub c: u8,
    pub h: u8,
    pub r: u8,
    pub n: u8,
    pub crc: u16,
}

const ID_FIELD_LEN: usize = 6;

/// Return the size code `N` for a sector of `len` bytes, where `len == 128 << N`.
pub fn size_code(len: usize) -> Option<u8> {
    (0..=6u8).find(|n| 128usize << n == len)
}

/// Return the sector size for size code `n`. Codes above 6 are treated as 6.
pub fn sector_size(n: u8) -> usize {
    128usize << n.min(6)
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct System34Layout {
    pub use_fm: bool,
    pub target_clock_period_us: f64,
    pub target_rotational_period_ms: f64,
    /// Gap before the index address mark (or before the first sector if there is none).
    pub gap0: usize,
    /// Gap after the index address mark.
    pub gap1: usize,
    /// Gap between the ID record and the data record.
    pub gap2: usize,
    /// Gap after each data record.
    pub gap3: usize,
    pub gap_byte: u8,
    /// Raw 16-bit word used for gap 0 and to pad the end of the track. Derived from `gap_byte`
    /// if unset.
    pub gap_fill_raw: Option<u16>,
    /// Raw encoding of the ID address mark byte. Defaults to `FE` with the standard clock.
    pub idam_byte: Option<u16>,
    /// Raw encoding of the data address mark byte. Defaults to `FB` with the standard clock.
    pub dam_byte: Option<u16>,
    pub emit_iam: bool,
    /// Sector id `R` of logical sector 0.
    pub sector_id_base: u8,
    pub sector_count: u8,
    pub sector_size: usize,
    pub invert_side_byte: bool,
    pub ignore_side_byte: bool,
    pub ignore_track_byte: bool,
}

impl Default for System34Layout {
    fn default() -> Self {
        System34Layout {
            use_fm: false,
            target_clock_period_us: 2.0,
            target_rotational_period_ms: 200.0,
            gap0: IBM_GAP4A,
            gap1: IBM_GAP1,
            gap2: IBM_GAP2,
            gap3: IBM_GAP3,
            gap_byte: GAP_BYTE,
            gap_fill_raw: None,
            idam_byte: None,
            dam_byte: None,
            emit_iam: true,
            sector_id_base: 1,
            sector_count: 9,
            sector_size: 512,
            invert_side_byte: false,
            ignore_side_byte: false,
            ignore_track_byte: false,
        }
    }
}

impl System34Layout {
    /// A single density layout: FM at 4µs, nine 256 byte sectors.
    pub fn fm() -> Self {
        System34Layout {
            use_fm: true,
            target_clock_period_us: 4.0,
            gap0: 40,
            gap1: 26,
            gap2: 11,
            gap3: 27,
            gap_byte: FM_GAP_BYTE,
            sector_size: 256,
            ..System34Layout::default()
        }
    }

    pub fn with_fm(mut self, use_fm: bool) -> Self {
        self.use_fm = use_fm;
        self
    }

    pub fn with_clock_period_us(mut self, period: f64) -> Self {
        self.target_clock_period_us = period;
        self
    }

    pub fn with_rotational_period_ms(mut self, period: f64) -> Self {
        self.target_rotational_period_ms = period;
        self
    }

    pub fn with_gaps(mut self, gap0: usize, gap1: usize, gap2: usize, gap3: usize) -> Self {
        self.gap0 = gap0;
        self.gap1 = gap1;
        self.gap2 = gap2;
        self.gap3 = gap3;
        self
    }

    pub fn with_gap_byte(mut self, byte: u8) -> Self {
        self.gap_byte = byte;
        self
    }

    pub fn with_gap_fill_raw(mut self, word: u16) -> Self {
        self.gap_fill_raw = Some(word);
        self
    }

    pub fn with_idam_byte(mut self, raw: u16) -> Self {
        self.idam_byte = Some(raw);
        self
    }

    pub fn with_dam_byte(mut self, raw: u16) -> Self {
        self.dam_byte = Some(raw);
        self
    }

    pub fn with_iam(mut self, emit_iam: bool) -> Self {
        self.emit_iam = emit_iam;
        self
    }

    pub fn with_sector_id_base(mut self, base: u8) -> Self {
        self.sector_id_base = base;
        self
    }

    pub fn with_sectors(mut self, count: u8, size: usize) -> Self {
        self.sector_count = count;
        self.sector_size = size;
        self
    }

    pub fn with_invert_side_byte(mut self, invert: bool) -> Self {
        self.invert_side_byte = invert;
        self
    }

    pub fn with_ignore_side_byte(mut self, ignore: bool) -> Self {
        self.ignore_side_byte = ignore;
        self
    }

    pub fn with_ignore_track_byte(mut self, ignore: bool) -> Self {
        self.ignore_track_byte = ignore;
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum MarkKind {
    Header,
    Data { deleted: bool },
}

pub struct System34Schema;

impl System34Schema {
    pub(crate) fn encoding(layout: &System34Layout) -> TrackDataEncoding {
        if layout.use_fm {
            TrackDataEncoding::Fm
        }
        else {
            TrackDataEncoding::Mfm
        }
    }

    pub(crate) fn timing(layout: &System34Layout) -> TrackTiming {
        TrackTiming::new(layout.target_clock_period_us, layout.target_rotational_period_ms)
    }

    pub(crate) fn expected_sectors(layout: &System34Layout, physical: DiskCh) -> Vec<DiskChs> {
        (0..layout.sector_count).map(|s| physical.with_sector(s)).collect()
    }

    /// MFM tracks are matched on the three sync words, FM tracks on the address mark itself.
    /// Neither pattern can occur in the other modulation, so both are always accepted.
    pub(crate) fn match_record(fifo: u64) -> Option<usize> {
        if fifo & 0xFFFF_FFFF_FFFF == MFM_RECORD_SYNC {
            return Some(MFM_RECORD_SYNC_LEN);
        }
        FM_MARKERS.contains(&(fifo as u16)).then_some(16)
    }

    /// The raw gap word for gap 0 and the end of track.
    pub(crate) fn gap_word(layout: &System34Layout) -> u16 {
        layout.gap_fill_raw.unwrap_or_else(|| {
            if layout.use_fm {
                fm::encode_marker(layout.gap_byte, 0xFF)
            }
            else {
                let mut last_bit = false;
                mfm::encode_byte(layout.gap_byte, &mut last_bit)
            }
        })
    }

    fn idam_raw(layout: &System34Layout) -> u16 {
        match (layout.idam_byte, layout.use_fm) {
            (Some(raw), _) => raw,
            (None, true) => FM_IDAM,
            (None, false) => IDAM_BYTE,
        }
    }

    fn dam_raw(layout: &System34Layout) -> u16 {
        match (layout.dam_byte, layout.use_fm) {
            (Some(raw), _) => raw,
            (None, true) => FM_DAM,
            (None, false) => DAM_BYTE,
        }
    }

    pub(crate) fn validate(layout: &System34Layout) -> Result<(), CodecError> {
        validate_timing(
            "System34",
            layout.target_clock_period_us,
            layout.target_rotational_period_ms,
        )?;
        if size_code(layout.sector_size).is_none() {
            return Err(CodecError::UnsupportedSectorSize(layout.sector_size));
        }
        if layout.sector_count == 0 {
            return Err(CodecError::InvalidLayout("System34: sector count is 0".to_string()));
        }
        if layout.sector_id_base as usize + layout.sector_count as usize > 256 {
            return Err(CodecError::InvalidLayout(format!(
                "System34: {} sectors from id {} exceed the sector id range",
                layout.sector_count, layout.sector_id_base
            )));
        }
        if layout.use_fm {
            for raw in [Self::idam_raw(layout), Self::dam_raw(layout)] {
                if !FM_MARKERS.contains(&raw) {
                    return Err(CodecError::InvalidLayout(format!(
                        "System34: {:04X} is not a recognized FM address mark",
                        raw
                    )));
                }
            }
        }
        Ok(())
    }

    /// Classify a record by its raw mark word and decoded mark byte.
    fn mark_kind(layout: &System34Layout, raw_mark: u16, mark: u8) -> Option<MarkKind> {
        if layout.idam_byte == Some(raw_mark) {
            return Some(MarkKind::Header);
        }
        if layout.dam_byte == Some(raw_mark) {
            return Some(MarkKind::Data { deleted: false });
        }
        match mark {
            IDAM => Some(MarkKind::Header),
            DDAM => Some(MarkKind::Data { deleted: true }),
            0xF9..=DAM => Some(MarkKind::Data { deleted: false }),
            _ => None,
        }
    }

    /// Return the bit offset of the mark and the sync bytes covered by the CRC.
    fn record_prefix(raw: &RawRecord) -> (usize, &'static [u8]) {
        if raw.read_raw(0, MFM_RECORD_SYNC_LEN) == Some(MFM_RECORD_SYNC) {
            (MFM_RECORD_SYNC_LEN, &MFM_SYNC_BYTES)
        }
        else {
            (0, &[])
        }
    }

    pub(crate) fn decode_records(layout: &System34Layout, ctx: &DecodeContext, records: &[RawRecord]) -> Vec<Sector> {
        let mut sectors = Vec::new();
        let mut state = HeaderState::Seeking;

        for raw in records {
            let (offset, prefix) = Self::record_prefix(raw);
            let bytes = raw.decoded_at(offset);
            let Some(&mark) = bytes.first()
            else {
                continue;
            };
            let raw_mark = raw.read_raw(offset, 16).unwrap_or(0) as u16;

            match Self::mark_kind(layout, raw_mark, mark) {
                Some(MarkKind::Header) => {
                    state.take().flush(&mut sectors);
                    if let Some((sector, data_len)) = Self::decode_header(layout, ctx, raw, offset, prefix, &bytes) {
                        state = HeaderState::HeaderFound { sector, data_len };
                    }
                }
                Some(MarkKind::Data { deleted }) => match state.take() {
                    HeaderState::HeaderFound { mut sector, data_len } => {
                        if deleted {
                            log::trace!(
                                "System34Schema::decode_records(): Deleted data mark for sector {}",
                                sector.logical
                            );
                        }
                        Self::decode_data(ctx, raw, offset, prefix, &bytes, data_len, &mut sector);
                        sectors.push(sector);
                    }
                    HeaderState::Seeking => {
                        log::trace!(
                            "System34Schema::decode_records(): Data record at bit {} without a header",
                            raw.start
                        );
                    }
                },
                None => {
                    log::trace!(
                        "System34Schema::decode_records(): Unknown mark {:02X} at bit {}",
                        mark,
                        raw.start
                    );
                }
            }
        }
        state.flush(&mut sectors);
        sectors
    }

    fn decode_header(
        layout: &System34Layout,
        ctx: &DecodeContext,
        raw: &RawRecord,
        offset: usize,
        prefix: &[u8],
        bytes: &[u8],
    ) -> Option<(Sector, usize)> {
        let id = match IdField::read(&mut Cursor::new(&bytes[1..])) {
            Ok(id) => id,
            Err(_) => {
                log::trace!(
                    "System34Schema::decode_header(): Truncated ID record at bit {}",
                    raw.start
                );
                return None;
            }
        };

        let calculated = crc_ibm_3740(&bytes[..5], Some(crc_ibm_3740(prefix, None)));
        if calculated != id.crc {
            log::trace!(
                "System34Schema::decode_header(): Bad ID CRC at bit {}: {:04X} calculated: {:04X}",
                raw.start,
                id.crc,
                calculated
            );
            return None;
        }

        let c = if layout.ignore_track_byte {
            ctx.physical.c()
        }
        else {
            id.c as u16
        };
        let h = if layout.ignore_side_byte {
            ctx.physical.h()
        }
        else if layout.invert_side_byte {
            id.h ^ 1
        }
        else {
            id.h
        };
        let logical = DiskChs::new(c, h, id.r.wrapping_sub(layout.sector_id_base));
        if id.n > 6 {
            log::debug!(
                "System34Schema::decode_header(): Size code {} for sector {} clamped to 6",
                id.n,
                logical
            );
        }

        let header_len = 1 + ID_FIELD_LEN;
        let record = ctx.record(raw, offset + header_len * 16, bytes[..header_len].to_vec());
        log::trace!(
            "System34Schema::decode_header(): Sector {} size {} at bit {}",
            logical,
            sector_size(id.n),
            raw.start
        );
        Some((ctx.header_sector(logical, record), sector_size(id.n)))
    }

    fn decode_data(
        ctx: &DecodeContext,
        raw: &RawRecord,
        offset: usize,
        prefix: &[u8],
        bytes: &[u8],
        data_len: usize,
        sector: &mut Sector,
    ) {
        let record_len = 1 + data_len + 2;
        let payload_end = (1 + data_len).min(bytes.len());
        let data = bytes[1..payload_end].to_vec();

        let status = if bytes.len() < record_len {
            log::debug!(
                "System34Schema::decode_data(): Data record for sector {} truncated at {} of {} bytes",
                sector.logical,
                bytes.len(),
                record_len
            );
            SectorStatus::BadChecksum
        }
        else {
            let stored = u16::from_be_bytes([bytes[1 + data_len], bytes[2 + data_len]]);
            let calculated = crc_ibm_3740(&bytes[..1 + data_len], Some(crc_ibm_3740(prefix, None)));
            if stored == calculated {
                SectorStatus::Ok
            }
            else {
                log::debug!(
                    "System34Schema::decode_data(): Data CRC error in sector {}: {:04X} calculated: {:04X}",
                    sector.logical,
                    stored,
                    calculated
                );
                SectorStatus::BadChecksum
            }
        };

        let used = record_len.min(bytes.len());
        let record = ctx.record(raw, offset + used * 16, bytes[..used].to_vec());
        attach_data(sector, data, status, record);
    }

    fn write_bytes(layout: &System34Layout, writer: &mut TrackWriter, data: &[u8]) {
        if layout.use_fm {
            writer.write_fm(data);
        }
        else {
            writer.write_mfm(data);
        }
    }

    fn write_gap(layout: &System34Layout, writer: &mut TrackWriter, len: usize) {
        Self::write_bytes(layout, writer, &vec![layout.gap_byte; len]);
    }

    fn write_sync(layout: &System34Layout, writer: &mut TrackWriter) {
        let len = if layout.use_fm { FM_SYNC_LEN } else { SYNC_LEN };
        Self::write_bytes(layout, writer, &vec![SYNC_BYTE; len]);
    }

    /// Write the sync run (MFM only) and the raw mark word.
    fn write_mark(layout: &System34Layout, writer: &mut TrackWriter, raw_mark: u16) {
        if !layout.use_fm {
            writer.write_raw_repeat(MFM_SYNC as u64, 16, 3);
        }
        writer.write_raw(raw_mark as u64, 16);
    }

    fn crc_seed(layout: &System34Layout) -> Option<u16> {
        if layout.use_fm {
            None
        }
        else {
            Some(crc_ibm_3740(&MFM_SYNC_BYTES, None))
        }
    }

    pub(crate) fn encode_sectors(
        layout: &System34Layout,
        physical: DiskCh,
        sectors: &[Sector],
        writer: &mut TrackWriter,
    ) -> Result<(), CodecError> {
        writer.write_raw_repeat(Self::gap_word(layout) as u64, 16, layout.gap0);

        if layout.emit_iam {
            Self::write_sync(layout, writer);
            if layout.use_fm {
                writer.write_raw(FM_IAM as u64, 16);
            }
            else {
                writer.write_raw_repeat(IAM_SYNC as u64, 16, 3);
                writer.write_raw(IAM_BYTE as u64, 16);
            }
            Self::write_gap(layout, writer, layout.gap1);
        }

        let idam_raw = Self::idam_raw(layout);
        let dam_raw = Self::dam_raw(layout);

        for sector in sectors {
            let with_data = match sector.status {
                SectorStatus::Ok | SectorStatus::BadChecksum => true,
                SectorStatus::DataMissing => false,
                _ => {
                    log::trace!(
                        "System34Schema::encode_sectors(): Skipping {} sector {}",
                        sector.status,
                        sector.logical
                    );
                    continue;
                }
            };
            let size = if with_data { sector.data.len() } else { layout.sector_size };
            let n = size_code(size).ok_or(CodecError::UnsupportedSectorSize(size))?;

            let h = if layout.invert_side_byte {
                sector.logical.h() ^ 1
            }
            else {
                sector.logical.h()
            };
            let r = sector.logical.s().wrapping_add(layout.sector_id_base);
            let c = u8::try_from(sector.logical.c()).map_err(|_| CodecError::InvalidSector(sector.logical))?;

            // ID record
            Self::write_sync(layout, writer);
            Self::write_mark(layout, writer, idam_raw);
            let crc = crc_ibm_3740(&[mfm::compact(idam_raw), c, h, r, n], Self::crc_seed(layout));
            let mut id_field = Cursor::new(Vec::with_capacity(ID_FIELD_LEN));
            IdField { c, h, r, n, crc }.write(&mut id_field)?;
            Self::write_bytes(layout, writer, id_field.get_ref());
            Self::write_gap(layout, writer, layout.gap2);

            if !with_data {
                log::trace!(
                    "System34Schema::encode_sectors(): Sector {} written without data",
                    sector.logical
                );
                Self::write_gap(layout, writer, layout.gap3);
                continue;
            }

            // Data record
            Self::write_sync(layout, writer);
            Self::write_mark(layout, writer, dam_raw);
            let mut crc = crc_ibm_3740(&[mfm::compact(dam_raw)], Self::crc_seed(layout));
            crc = crc_ibm_3740(&sector.data, Some(crc));
            if sector.status == SectorStatus::BadChecksum {
                crc ^= 0xFFFF;
            }
            Self::write_bytes(layout, writer, &sector.data);
            Self::write_bytes(layout, writer, &crc.to_be_bytes());
            Self::write_gap(layout, writer, layout.gap3);
        }

        log::trace!(
            "System34Schema::encode_sectors(): Wrote {} sectors to {} in {} bits",
            sectors.len(),
            physical,
            writer.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{sync::extract_records, track_schema::TrackSchemaTrait};

    fn sectors_for(layout: &System34Layout, physical: DiskCh) -> Vec<Sector> {
        System34Schema::expected_sectors(layout, physical)
            .into_iter()
            .map(|chs| Sector::new(physical, chs, vec![chs.s().wrapping_mul(17); layout.sector_size]))
            .collect()
    }

    fn round_trip(layout: &System34Layout, physical: DiskCh, sectors: &[Sector]) -> Vec<Sector> {
        let mut writer = TrackWriter::new(System34Schema::timing(layout).capacity_bits());
        System34Schema::encode_sectors(layout, physical, sectors, &mut writer).unwrap();
        let (bits, _) = writer.finish(System34Schema::gap_word(layout) as u64, 16).unwrap();
        let records = extract_records(&bits, &System34Schema::match_record);
        let ctx = DecodeContext::new(physical, &[], 2e-6);
        System34Schema::decode_records(layout, &ctx, &records)
    }

    #[test]
    fn size_codes() {
        assert_eq!(size_code(128), Some(0));
        assert_eq!(size_code(512), Some(2));
        assert_eq!(size_code(8192), Some(6));
        assert_eq!(size_code(500), None);
        assert_eq!(sector_size(9), 8192);
    }

    #[test]
    fn default_gap_words() {
        assert_eq!(System34Schema::gap_word(&System34Layout::default()), 0x9254);
        assert_eq!(System34Schema::gap_word(&System34Layout::fm()), 0xFFFF);
    }

    #[test]
    fn mfm_track_round_trip() {
        let layout = System34Layout::default();
        let physical = DiskCh::new(5, 1);
        let sectors = sectors_for(&layout, physical);
        let decoded = round_trip(&layout, physical, &sectors);

        assert_eq!(decoded.len(), 9);
        for (original, sector) in sectors.iter().zip(&decoded) {
            assert_eq!(sector.status, SectorStatus::Ok);
            assert_eq!(sector.logical, original.logical);
            assert_eq!(sector.data, original.data);
            assert_eq!(sector.records.len(), 2);
        }
    }

    #[test]
    fn fm_track_round_trip() {
        let layout = System34Layout::fm();
        let physical = DiskCh::new(0, 0);
        let sectors = sectors_for(&layout, physical);
        let decoded = round_trip(&layout, physical, &sectors);

        assert_eq!(decoded.len(), 9);
        assert!(decoded.iter().all(|s| s.status == SectorStatus::Ok));
        assert_eq!(decoded[3].data, sectors[3].data);
    }

    #[test]
    fn inverted_side_byte() {
        let layout = System34Layout::default().with_invert_side_byte(true).with_sectors(2, 256);
        let physical = DiskCh::new(1, 1);
        let sectors = sectors_for(&layout, physical);
        let decoded = round_trip(&layout, physical, &sectors);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].logical, DiskChs::new(1, 1, 0));
    }

    #[test]
    fn header_without_data() {
        let layout = System34Layout::default().with_sectors(3, 512);
        let physical = DiskCh::new(2, 0);
        let mut sectors = sectors_for(&layout, physical);
        sectors[1].status = SectorStatus::DataMissing;

        let decoded = round_trip(&layout, physical, &sectors);
        let statuses: Vec<SectorStatus> = decoded.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![SectorStatus::Ok, SectorStatus::DataMissing, SectorStatus::Ok]
        );
        assert!(decoded[1].data.is_empty());
    }

    #[test]
    fn bad_checksum_is_preserved() {
        let layout = System34Layout::default().with_sectors(1, 512);
        let physical = DiskCh::new(0, 0);
        let mut sectors = sectors_for(&layout, physical);
        sectors[0].status = SectorStatus::BadChecksum;

        let decoded = round_trip(&layout, physical, &sectors);
        assert_eq!(decoded[0].status, SectorStatus::BadChecksum);
        assert_eq!(decoded[0].data.len(), 512);
    }

    #[test]
    fn corrupt_header_drops_sector() {
        let layout = System34Layout::default().with_sectors(2, 512);
        let physical = DiskCh::new(0, 0);
        let sectors = sectors_for(&layout, physical);

        let mut writer = TrackWriter::new(100_000);
        System34Schema::encode_sectors(&layout, physical, &sectors, &mut writer).unwrap();
        let (mut bits, _) = writer.finish(0x9254, 16).unwrap();
        let records = extract_records(&bits, &System34Schema::match_record);
        // Flip a data bit of the first sector's cylinder byte.
        let pos = records[0].start + 64 + 1;
        bits.set(pos, !bits[pos]);

        let records = extract_records(&bits, &System34Schema::match_record);
        let ctx = DecodeContext::new(physical, &[], 2e-6);
        let decoded = System34Schema::decode_records(&layout, &ctx, &records);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].logical.s(), 1);
    }

    #[test]
    fn cylinder_beyond_id_field_rejected() {
        let layout = System34Layout::default().with_sectors(1, 512);
        let physical = DiskCh::new(300, 0);
        let sectors = sectors_for(&layout, physical);
        let mut writer = TrackWriter::new(100_000);
        assert!(matches!(
            System34Schema::encode_sectors(&layout, physical, &sectors, &mut writer),
            Err(CodecError::InvalidSector(chs)) if chs.c() == 300
        ));

        let physical = DiskCh::new(255, 0);
        let decoded = round_trip(&layout, physical, &sectors_for(&layout, physical));
        assert_eq!(decoded[0].logical.c(), 255);
    }

    #[test]
    fn id_field_reads_big_endian() {
        let id = IdField::read(&mut Cursor::new(&[1u8, 0, 3, 2, 0xAB, 0xCD][..])).unwrap();
        assert_eq!((id.c, id.h, id.r, id.n), (1, 0, 3, 2));
        assert_eq!(id.crc, 0xABCD);
    }

    #[test]
    fn validation() {
        assert!(System34Schema::validate(&System34Layout::default()).is_ok());
        assert!(System34Schema::validate(&System34Layout::fm()).is_ok());
        assert!(matches!(
            System34Schema::validate(&System34Layout::default().with_sectors(9, 500)),
            Err(CodecError::UnsupportedSectorSize(500))
        ));
        assert!(System34Schema::validate(&System34Layout::default().with_clock_period_us(0.0)).is_err());
        assert!(System34Schema::validate(&System34Layout::fm().with_idam_byte(0x1234)).is_err());
        let schema = crate::track_schema::TrackSchema::System34(System34Layout::default());
        assert_eq!(schema.encoding(), TrackDataEncoding::Mfm);
    }
}
