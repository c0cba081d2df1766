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

//! Track schemas define the record layout of a disk architecture.
//!
//! A [TrackSchema] knows how to recognize its records in a clocked bit sequence, turn them into
//! [Sector]s, and write sectors back out through a [TrackWriter]. Each variant carries the
//! layout parameters for its architecture, and every operation is dispatched through the
//! [TrackSchemaTrait] implementation in `dispatch.rs`.

mod dispatch;

pub mod amiga;
pub mod apple2;
pub mod brother;
pub mod c64;
pub mod macintosh;
pub mod micropolis;
pub mod northstar;
pub mod system34;
pub mod victor9k;

use crate::{
    sector::{Record, Sector},
    sync::RawRecord,
    track::writer::TrackWriter,
    types::{DiskCh, DiskChs, SectorStatus, TrackDataEncoding},
    CodecError,
};
use std::fmt::{self, Display, Formatter};

use amiga::AmigaLayout;
use apple2::Apple2Layout;
use brother::BrotherLayout;
use c64::C64Layout;
use macintosh::MacintoshLayout;
use micropolis::MicropolisLayout;
use northstar::NorthStarLayout;
use system34::System34Layout;
use victor9k::Victor9kLayout;

pub use TrackSchemaTrait as Schema;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackSchema {
    System34(System34Layout),
    Amiga(AmigaLayout),
    C64(C64Layout),
    Apple2(Apple2Layout),
    Victor9k(Victor9kLayout),
    NorthStar(NorthStarLayout),
    Micropolis(MicropolisLayout),
    Brother(BrotherLayout),
    Macintosh(MacintoshLayout),
}

impl Display for TrackSchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TrackSchema::System34(layout) if layout.use_fm => write!(f, "IBM System34 (FM)"),
            TrackSchema::System34(_) => write!(f, "IBM System34"),
            TrackSchema::Amiga(_) => write!(f, "Amiga"),
            TrackSchema::C64(_) => write!(f, "Commodore 1541"),
            TrackSchema::Apple2(_) => write!(f, "Apple II"),
            TrackSchema::Victor9k(_) => write!(f, "Victor 9000"),
            TrackSchema::NorthStar(_) => write!(f, "North Star"),
            TrackSchema::Micropolis(_) => write!(f, "Micropolis"),
            TrackSchema::Brother(_) => write!(f, "Brother"),
            TrackSchema::Macintosh(_) => write!(f, "Macintosh"),
        }
    }
}

impl Default for TrackSchema {
    fn default() -> Self {
        TrackSchema::System34(System34Layout::default())
    }
}

/// How records are delimited on a track.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Segmentation {
    /// Records begin at sync patterns found anywhere on the track.
    SyncMatch,
    /// Each sector occupies the span between two index pulses (hard-sectored media). Sync
    /// patterns are matched within each span.
    IndexPulse,
}

/// Nominal timing of one physical track.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TrackTiming {
    /// Bit cell period in seconds.
    pub clock_period: f64,
    /// Duration of one revolution in seconds.
    pub rotational_period: f64,
}

impl TrackTiming {
    pub fn new(clock_period_us: f64, rotational_period_ms: f64) -> Self {
        TrackTiming {
            clock_period: clock_period_us * 1e-6,
            rotational_period: rotational_period_ms * 1e-3,
        }
    }

    /// Number of bit cells that fit in one revolution.
    pub fn capacity_bits(&self) -> usize {
        if self.clock_period <= 0.0 {
            return 0;
        }
        (self.rotational_period / self.clock_period).round() as usize
    }
}

/// Timing information a record decoder needs to stamp the sectors it produces.
pub struct DecodeContext<'a> {
    pub physical: DiskCh,
    /// End time of each bit cell. May be empty, in which case times are derived from `clock`.
    pub bit_times: &'a [f64],
    pub clock: f64,
}

impl DecodeContext<'_> {
    pub fn new(physical: DiskCh, bit_times: &[f64], clock: f64) -> DecodeContext<'_> {
        DecodeContext {
            physical,
            bit_times,
            clock,
        }
    }

    /// Time in seconds at bit offset `bit`.
    pub fn time_at(&self, bit: usize) -> f64 {
        if self.bit_times.is_empty() {
            return bit as f64 * self.clock;
        }
        match self.bit_times.get(bit) {
            Some(t) => *t,
            None => self.bit_times[self.bit_times.len() - 1],
        }
    }

    /// Build a diagnostic [Record] for the first `used_bits` bits of `raw`.
    pub fn record(&self, raw: &RawRecord, used_bits: usize, raw_data: Vec<u8>) -> Record {
        let used_bits = used_bits.min(raw.len());
        Record {
            clock: self.clock,
            start_time: self.time_at(raw.start),
            end_time: self.time_at(raw.start + used_bits),
            position: raw.start,
            raw_data,
        }
    }

    /// Start a sector from a good header record. It stays [SectorStatus::DataMissing] until a
    /// data record is attached.
    pub(crate) fn header_sector(&self, logical: DiskChs, header: Record) -> Sector {
        Sector {
            clock: self.clock,
            header_start_time: header.start_time,
            header_end_time: header.end_time,
            position: header.position,
            records: vec![header],
            ..Sector::new(self.physical, logical, Vec::new()).with_status(SectorStatus::DataMissing)
        }
    }

    /// Build a sector from a record that carries both address and payload.
    pub(crate) fn whole_sector(&self, logical: DiskChs, record: Record, data: Vec<u8>, status: SectorStatus) -> Sector {
        Sector {
            clock: self.clock,
            header_start_time: record.start_time,
            header_end_time: record.start_time,
            data_start_time: record.start_time,
            data_end_time: record.end_time,
            position: record.position,
            records: vec![record],
            ..Sector::new(self.physical, logical, data).with_status(status)
        }
    }
}

/// Attach a data record to a sector started by [DecodeContext::header_sector].
pub(crate) fn attach_data(sector: &mut Sector, data: Vec<u8>, status: SectorStatus, record: Record) {
    sector.data = data;
    sector.status = status;
    sector.data_start_time = record.start_time;
    sector.data_end_time = record.end_time;
    sector.records.push(record);
}

/// Decoder state for architectures that store the sector header and payload as separate
/// records. It is owned by a single decode call and threaded through the record loop.
#[derive(Debug, Default)]
pub(crate) enum HeaderState {
    /// Waiting for a header record.
    #[default]
    Seeking,
    /// A valid header was read; the next data record belongs to it.
    HeaderFound { sector: Sector, data_len: usize },
}

impl HeaderState {
    /// Take the current state, leaving [HeaderState::Seeking] in its place.
    pub(crate) fn take(&mut self) -> HeaderState {
        std::mem::take(self)
    }

    /// Emit a pending header without a payload as [SectorStatus::DataMissing].
    pub(crate) fn flush(self, sectors: &mut Vec<Sector>) {
        if let HeaderState::HeaderFound { sector, .. } = self {
            log::trace!(
                "HeaderState::flush(): Sector {} at bit {} has no data record",
                sector.logical,
                sector.position
            );
            sectors.push(sector);
        }
    }
}

pub trait TrackSchemaTrait {
    /// The modulation used for the track's data.
    fn encoding(&self) -> TrackDataEncoding;

    fn segmentation(&self) -> Segmentation;

    /// Nominal clock and rotation for the given physical track.
    fn timing(&self, physical: DiskCh) -> TrackTiming;

    /// The logical sectors a formatted track is expected to contain.
    fn expected_sectors(&self, physical: DiskCh) -> Vec<DiskChs>;

    /// Interpret raw records, in bitstream order, as sectors.
    fn decode_records(&self, ctx: &DecodeContext, records: &[RawRecord]) -> Vec<Sector>;

    /// Write `sectors` in the order given.
    fn encode_sectors(&self, physical: DiskCh, sectors: &[Sector], writer: &mut TrackWriter) -> Result<(), CodecError>;

    /// Raw pattern and width used to pad the end of an encoded track.
    fn gap_fill(&self) -> (u64, usize);

    /// Check the layout for parameters the architecture cannot encode.
    fn validate(&self) -> Result<(), CodecError>;
}

/// Reject non-positive or non-finite timing parameters.
pub(crate) fn validate_timing(name: &str, clock_us: f64, rotation_ms: f64) -> Result<(), CodecError> {
    if !(clock_us.is_finite() && clock_us > 0.0) {
        return Err(CodecError::InvalidLayout(format!(
            "{}: clock period must be positive, got {}",
            name, clock_us
        )));
    }
    if !(rotation_ms.is_finite() && rotation_ms > 0.0) {
        return Err(CodecError::InvalidLayout(format!(
            "{}: rotational period must be positive, got {}",
            name, rotation_ms
        )));
    }
    Ok(())
}
