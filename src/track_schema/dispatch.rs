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

use crate::{
    sector::Sector,
    sync::{RawRecord, RecordMatcher},
    track::writer::TrackWriter,
    track_schema::{
        amiga::AmigaSchema,
        apple2::Apple2Schema,
        brother::BrotherSchema,
        c64::C64Schema,
        macintosh::MacintoshSchema,
        micropolis::MicropolisSchema,
        northstar::NorthStarSchema,
        system34::System34Schema,
        victor9k::Victor9kSchema,
        DecodeContext,
        Segmentation,
        TrackSchema,
        TrackSchemaTrait,
        TrackTiming,
    },
    types::{DiskCh, DiskChs, TrackDataEncoding},
    CodecError,
};

impl TrackSchemaTrait for TrackSchema {
    fn encoding(&self) -> TrackDataEncoding {
        match self {
            TrackSchema::System34(l) => System34Schema::encoding(l),
            TrackSchema::Amiga(_) => TrackDataEncoding::Mfm,
            TrackSchema::C64(_) => TrackDataEncoding::Gcr,
            TrackSchema::Apple2(_) => TrackDataEncoding::Gcr,
            TrackSchema::Victor9k(_) => TrackDataEncoding::Gcr,
            TrackSchema::NorthStar(l) => NorthStarSchema::encoding(l),
            TrackSchema::Micropolis(_) => TrackDataEncoding::Mfm,
            TrackSchema::Brother(_) | TrackSchema::Macintosh(_) => TrackDataEncoding::Gcr,
        }
    }

    fn segmentation(&self) -> Segmentation {
        match self {
            TrackSchema::NorthStar(_) | TrackSchema::Micropolis(_) => Segmentation::IndexPulse,
            _ => Segmentation::SyncMatch,
        }
    }

    fn timing(&self, physical: DiskCh) -> TrackTiming {
        match self {
            TrackSchema::System34(l) => System34Schema::timing(l),
            TrackSchema::Amiga(l) => AmigaSchema::timing(l),
            TrackSchema::C64(l) => C64Schema::timing(l, physical),
            TrackSchema::Apple2(l) => Apple2Schema::timing(l),
            TrackSchema::Victor9k(l) => Victor9kSchema::timing(l, physical),
            TrackSchema::NorthStar(l) => NorthStarSchema::timing(l),
            TrackSchema::Micropolis(l) => MicropolisSchema::timing(l),
            TrackSchema::Brother(l) => BrotherSchema::timing(l),
            TrackSchema::Macintosh(l) => MacintoshSchema::timing(l, physical),
        }
    }

    fn expected_sectors(&self, physical: DiskCh) -> Vec<DiskChs> {
        match self {
            TrackSchema::System34(l) => System34Schema::expected_sectors(l, physical),
            TrackSchema::Amiga(l) => AmigaSchema::expected_sectors(l, physical),
            TrackSchema::C64(l) => C64Schema::expected_sectors(l, physical),
            TrackSchema::Apple2(l) => Apple2Schema::expected_sectors(l, physical),
            TrackSchema::Victor9k(l) => Victor9kSchema::expected_sectors(l, physical),
            TrackSchema::NorthStar(l) => NorthStarSchema::expected_sectors(l, physical),
            TrackSchema::Micropolis(l) => MicropolisSchema::expected_sectors(l, physical),
            TrackSchema::Brother(l) => BrotherSchema::expected_sectors(l, physical),
            TrackSchema::Macintosh(l) => MacintoshSchema::expected_sectors(l, physical),
        }
    }

    fn decode_records(&self, ctx: &DecodeContext, records: &[RawRecord]) -> Vec<Sector> {
        match self {
            TrackSchema::System34(l) => System34Schema::decode_records(l, ctx, records),
            TrackSchema::Amiga(l) => AmigaSchema::decode_records(l, ctx, records),
            TrackSchema::C64(l) => C64Schema::decode_records(l, ctx, records),
            TrackSchema::Apple2(l) => Apple2Schema::decode_records(l, ctx, records),
            TrackSchema::Victor9k(l) => Victor9kSchema::decode_records(l, ctx, records),
            TrackSchema::NorthStar(l) => NorthStarSchema::decode_records(l, ctx, records),
            TrackSchema::Micropolis(l) => MicropolisSchema::decode_records(l, ctx, records),
            TrackSchema::Brother(l) => BrotherSchema::decode_records(l, ctx, records),
            TrackSchema::Macintosh(l) => MacintoshSchema::decode_records(l, ctx, records),
        }
    }

    fn encode_sectors(&self, physical: DiskCh, sectors: &[Sector], writer: &mut TrackWriter) -> Result<(), CodecError> {
        match self {
            TrackSchema::System34(l) => System34Schema::encode_sectors(l, physical, sectors, writer),
            TrackSchema::Amiga(l) => AmigaSchema::encode_sectors(l, physical, sectors, writer),
            TrackSchema::C64(l) => C64Schema::encode_sectors(l, physical, sectors, writer),
            TrackSchema::Apple2(l) => Apple2Schema::encode_sectors(l, physical, sectors, writer),
            TrackSchema::Victor9k(l) => Victor9kSchema::encode_sectors(l, physical, sectors, writer),
            TrackSchema::NorthStar(l) => NorthStarSchema::encode_sectors(l, physical, sectors, writer),
            TrackSchema::Micropolis(l) => MicropolisSchema::encode_sectors(l, physical, sectors, writer),
            TrackSchema::Brother(l) => BrotherSchema::encode_sectors(l, physical, sectors, writer),
            TrackSchema::Macintosh(l) => MacintoshSchema::encode_sectors(l, physical, sectors, writer),
        }
    }

    fn gap_fill(&self) -> (u64, usize) {
        match self {
            TrackSchema::System34(l) => (System34Schema::gap_word(l) as u64, 16),
            // Inter-sector gap bytes for the Commodore GCR formats, MFM 0 bits elsewhere.
            TrackSchema::C64(_) | TrackSchema::Victor9k(_) => (0x55, 8),
            TrackSchema::Apple2(_) | TrackSchema::Brother(_) | TrackSchema::Macintosh(_) => (0b10, 2),
            TrackSchema::Amiga(_) | TrackSchema::Micropolis(_) => (0b10, 2),
            TrackSchema::NorthStar(l) => NorthStarSchema::gap_fill(l),
        }
    }

    fn validate(&self) -> Result<(), CodecError> {
        match self {
            TrackSchema::System34(l) => System34Schema::validate(l),
            TrackSchema::Amiga(l) => AmigaSchema::validate(l),
            TrackSchema::C64(l) => C64Schema::validate(l),
            TrackSchema::Apple2(l) => Apple2Schema::validate(l),
            TrackSchema::Victor9k(l) => Victor9kSchema::validate(l),
            TrackSchema::NorthStar(l) => NorthStarSchema::validate(l),
            TrackSchema::Micropolis(l) => MicropolisSchema::validate(l),
            TrackSchema::Brother(l) => BrotherSchema::validate(l),
            TrackSchema::Macintosh(l) => MacintoshSchema::validate(l),
        }
    }
}

impl RecordMatcher for TrackSchema {
    fn match_record(&self, fifo: u64) -> Option<usize> {
        match self {
            TrackSchema::System34(_) => System34Schema::match_record(fifo),
            TrackSchema::Amiga(_) => AmigaSchema::match_record(fifo),
            TrackSchema::C64(_) => C64Schema::match_record(fifo),
            TrackSchema::Apple2(_) => Apple2Schema::match_record(fifo),
            TrackSchema::Victor9k(_) => Victor9kSchema::match_record(fifo),
            TrackSchema::NorthStar(_) => NorthStarSchema::match_record(fifo),
            TrackSchema::Micropolis(_) => MicropolisSchema::match_record(fifo),
            TrackSchema::Brother(_) => BrotherSchema::match_record(fifo),
            TrackSchema::Macintosh(_) => MacintoshSchema::match_record(fifo),
        }
    }
}
