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

//! # fluxcodec
//!
//! fluxcodec turns raw floppy disk flux timings into validated, addressable sectors and back
//! again. It covers clock recovery from noisy flux intervals, FM/MFM/GCR demodulation, record
//! location by sync pattern (or by hard-sector index pulse), and the record formats of several
//! historical disk architectures.
//!
//! Decoding runs Flux Timeline -> [Pll](flux::pll::Pll) -> bit sequence -> sync matcher ->
//! [TrackSchema](track_schema::TrackSchema) record decoder -> [Sector](sector::Sector)s.
//! Encoding is the mirror image and produces a new [FluxTimeline](flux::FluxTimeline).
//!
//! Per-sector corruption is reported as a [SectorStatus]. Only configuration and capacity
//! problems are returned as a [CodecError].

#[macro_use]
pub mod flux;
pub mod bitstream_codec;
pub mod sector;
pub mod sync;
pub mod track;
pub mod track_schema;
pub mod types;
pub mod util;

use thiserror::Error;

pub const MAXIMUM_SECTOR_SIZE: usize = 8192;
pub const DEFAULT_SECTOR_SIZE: usize = 512;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Track data overrun: {needed} bits needed, track capacity is {capacity} bits")]
    TrackDataOverrun { needed: usize, capacity: usize },
    #[error("Unsupported sector size: {0} bytes")]
    UnsupportedSectorSize(usize),
    #[error("Invalid track layout: {0}")]
    InvalidLayout(String),
    #[error("Sector address out of range for this architecture: {0}")]
    InvalidSector(DiskChs),
    #[error("Undefined GCR symbol {value:#04X} in table {table}")]
    InvalidSymbol { value: u16, table: GcrScheme },
    #[error("Invalid parameters were specified to a library function")]
    ParameterError,
    #[error("Binary record error: {0}")]
    BinaryError(String),
}

impl From<binrw::Error> for CodecError {
    fn from(err: binrw::Error) -> Self {
        CodecError::BinaryError(err.to_string())
    }
}

pub use crate::{
    bitstream_codec::gcr::GcrScheme,
    flux::{FluxInterval, FluxTimeline},
    sector::{consolidate_sectors, Record, Sector},
    sync::RawRecord,
    track::{decode_bits, decode_track, encode_track, DecodeOptions, EncodeOptions, EncodedTrack, TrackDecodeResult},
    track_schema::TrackSchema,
    types::{DiskCh, DiskChs, SectorStatus, TrackDataEncoding},
};

pub mod prelude {
    pub use crate::{
        flux::{pll::Pll, FluxTimeline},
        sector::{consolidate_sectors, Sector},
        track::{decode_bits, decode_track, encode_track, DecodeOptions, EncodeOptions, TrackDecodeResult},
        track_schema::{
            amiga::AmigaLayout,
            apple2::Apple2Layout,
            brother::BrotherLayout,
            c64::C64Layout,
            macintosh::MacintoshLayout,
            micropolis::MicropolisLayout,
            northstar::NorthStarLayout,
            system34::System34Layout,
            victor9k::Victor9kLayout,
            TrackSchema,
        },
        types::{DiskCh, DiskChs, SectorStatus, TrackDataEncoding},
        CodecError,
    };
}
