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

//! Track-level pipelines.
//!
//! [decode_track] runs a flux timeline through the clock tracker and the track schema's record
//! decoder. [decode_bits] starts from an already-clocked bit sequence. [encode_track] writes a
//! set of sectors through the schema's encoder and expands the result into a new timeline.
//!
//! Decoding never fails: whatever sectors are found are returned with their status. Encoding
//! either produces a complete track or returns a [CodecError].

pub mod writer;

use crate::{
    flux::{
        physical_clock_period,
        pll::{Pll, PllPreset, BASE_CLOCK},
        FluxStats,
        FluxTimeline,
        DEFAULT_TICK_PERIOD,
    },
    sector::{Record, Sector},
    sync::{extract_records, extract_segmented_records},
    track::writer::TrackWriter,
    track_schema::{DecodeContext, Schema, Segmentation, TrackSchema},
    types::{DiskCh, DiskChs, SectorStatus, TrackDataEncoding},
    CodecError,
};
use bit_vec::BitVec;

/// A seeked clock further than this fraction from the layout clock is not trusted.
pub const SEEK_CLOCK_TOLERANCE: f64 = 0.30;

#[derive(Clone, Debug)]
pub struct DecodeOptions {
    /// Estimate the clock from the timeline's transition histogram before decoding.
    pub seek_clock: bool,
    pub pll_preset: Option<PllPreset>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            seek_clock: true,
            pll_preset: None,
        }
    }
}

impl DecodeOptions {
    pub fn with_seek_clock(mut self, seek_clock: bool) -> Self {
        self.seek_clock = seek_clock;
        self
    }

    pub fn with_pll_preset(mut self, preset: PllPreset) -> Self {
        self.pll_preset = Some(preset);
        self
    }
}

/// The outcome of decoding one track.
#[derive(Clone, Debug)]
pub struct TrackDecodeResult {
    pub physical: DiskCh,
    /// Sectors in the order they were found on the track.
    pub sectors: Vec<Sector>,
    /// Every record the sync matcher delimited, demodulated, whether or not it produced a sector.
    pub records: Vec<Record>,
    pub sync_losses: u32,
    /// Nominal clock period the track was decoded with, in seconds.
    pub clock: f64,
    pub bit_count: usize,
    pub flux_stats: Option<FluxStats>,
}

impl TrackDecodeResult {
    /// Append a [SectorStatus::Missing] placeholder for each id in `expected` that no decoded
    /// sector carries.
    pub fn fill_missing(&mut self, expected: &[DiskChs]) {
        for chs in expected {
            if !self.sectors.iter().any(|s| s.logical == *chs) {
                log::debug!(
                    "TrackDecodeResult::fill_missing(): Sector {} not found on {}",
                    chs,
                    self.physical
                );
                self.sectors.push(Sector::missing(self.physical, *chs));
            }
        }
    }

    /// Find the best copy of a sector on this track: a good copy if there is one, otherwise the
    /// first found.
    pub fn find(&self, logical: DiskChs) -> Option<&Sector> {
        let mut copies = self.sectors.iter().filter(|s| s.logical == logical);
        let first = copies.next()?;
        if first.is_ok() {
            return Some(first);
        }
        copies.find(|s| s.is_ok()).or(Some(first))
    }

    /// Return the number of sectors with each status.
    pub fn count(&self, status: SectorStatus) -> usize {
        self.sectors.iter().filter(|s| s.status == status).count()
    }
}

#[derive(Clone, Debug, Default)]
pub struct EncodeOptions {
    /// Rotational period in ms of the drive the track will be written with, if it differs from
    /// the layout's. The cell period is scaled so the track still fills one revolution.
    pub drive_rotational_period_ms: Option<f64>,
    /// Tick period in seconds of the produced timeline. Defaults to [DEFAULT_TICK_PERIOD].
    pub tick_period: Option<f64>,
}

impl EncodeOptions {
    pub fn with_drive_rotational_period_ms(mut self, period: f64) -> Self {
        self.drive_rotational_period_ms = Some(period);
        self
    }

    pub fn with_tick_period(mut self, period: f64) -> Self {
        self.tick_period = Some(period);
        self
    }
}

/// An encoded track: the clocked bit sequence and the flux timeline it expands to.
#[derive(Clone, Debug)]
pub struct EncodedTrack {
    pub bits: BitVec,
    pub timeline: FluxTimeline,
    /// Bit offsets of index pulses, including one at the end of the track.
    pub index_marks: Vec<usize>,
    /// Physical cell period in seconds the timeline was written with.
    pub clock_period: f64,
}

/// Decode one revolution (or more) of flux into sectors.
pub fn decode_track(
    schema: &TrackSchema,
    physical: DiskCh,
    timeline: &FluxTimeline,
    options: &DecodeOptions,
) -> TrackDecodeResult {
    let clock = select_clock(schema, physical, timeline, options);

    let mut pll = options.pll_preset.map(Pll::from_preset).unwrap_or_default();
    pll.set_clock(clock, None);
    let decoded = pll.decode(timeline);

    let mut result = decode_clocked(
        schema,
        physical,
        &decoded.bits,
        &decoded.bit_times,
        clock,
        &decoded.index_positions,
    );
    result.sync_losses = decoded.sync_losses;
    result.flux_stats = Some(decoded.flux_stats);

    log::debug!(
        "decode_track(): {} {}: {} sectors from {} bits, {} sync losses",
        schema,
        physical,
        result.sectors.len(),
        result.bit_count,
        result.sync_losses
    );
    result
}

/// Decode an already-clocked bit sequence. `bit_period` is the cell period in seconds, used only
/// to timestamp records. `index_positions` are the bit offsets of index pulses, needed by
/// hard-sectored schemas.
pub fn decode_bits(
    schema: &TrackSchema,
    physical: DiskCh,
    bits: &BitVec,
    bit_period: f64,
    index_positions: &[usize],
) -> TrackDecodeResult {
    decode_clocked(schema, physical, bits, &[], bit_period, index_positions)
}

fn decode_clocked(
    schema: &TrackSchema,
    physical: DiskCh,
    bits: &BitVec,
    bit_times: &[f64],
    clock: f64,
    index_positions: &[usize],
) -> TrackDecodeResult {
    let raw_records = match schema.segmentation() {
        Segmentation::SyncMatch => extract_records(bits, schema),
        Segmentation::IndexPulse => extract_segmented_records(bits, index_positions, schema),
    };

    let ctx = DecodeContext::new(physical, bit_times, clock);
    let records = raw_records
        .iter()
        .map(|raw| {
            let data = match schema.encoding() {
                TrackDataEncoding::Gcr => raw.bytes(),
                TrackDataEncoding::Mfm | TrackDataEncoding::Fm => raw.decoded(),
            };
            ctx.record(raw, raw.len(), data)
        })
        .collect();

    let sectors = schema.decode_records(&ctx, &raw_records);

    TrackDecodeResult {
        physical,
        sectors,
        records,
        sync_losses: 0,
        clock,
        bit_count: bits.len(),
        flux_stats: None,
    }
}

/// Choose the clock to decode with: a seeked clock if one was requested and lies close to the
/// layout clock, otherwise the layout clock.
fn select_clock(schema: &TrackSchema, physical: DiskCh, timeline: &FluxTimeline, options: &DecodeOptions) -> f64 {
    let mut layout_clock = schema.timing(physical).clock_period;
    if !(layout_clock.is_finite() && layout_clock > 0.0) {
        log::warn!(
            "select_clock(): {} has no usable clock, assuming {}",
            schema,
            format_us!(BASE_CLOCK)
        );
        layout_clock = BASE_CLOCK;
    }

    if options.seek_clock {
        if let Some(seeked) = seek_clock_near(timeline, schema.encoding(), layout_clock) {
            return seeked;
        }
    }
    layout_clock
}

#[cfg(feature = "flux")]
fn seek_clock_near(timeline: &FluxTimeline, encoding: TrackDataEncoding, layout_clock: f64) -> Option<f64> {
    let seeked = crate::flux::seek_clock(timeline, encoding)?;
    let deviation = (seeked - layout_clock).abs() / layout_clock;
    if deviation > SEEK_CLOCK_TOLERANCE {
        log::debug!(
            "seek_clock_near(): Seeked clock {} is {:.0}% from layout clock {}, ignoring",
            format_us!(seeked),
            deviation * 100.0,
            format_us!(layout_clock)
        );
        return None;
    }
    Some(seeked)
}

#[cfg(not(feature = "flux"))]
fn seek_clock_near(_timeline: &FluxTimeline, _encoding: TrackDataEncoding, _layout_clock: f64) -> Option<f64> {
    None
}

/// Encode `sectors` onto one physical track.
///
/// Sectors with status [SectorStatus::Ok] are written intact and sectors with
/// [SectorStatus::BadChecksum] are written with a deliberately wrong checksum. Sectors of any
/// other status are skipped, except that the IBM encoder writes a lone header for
/// [SectorStatus::DataMissing].
pub fn encode_track(
    schema: &TrackSchema,
    physical: DiskCh,
    sectors: &[Sector],
    options: &EncodeOptions,
) -> Result<EncodedTrack, CodecError> {
    schema.validate()?;
    let tick_period = options.tick_period.unwrap_or(DEFAULT_TICK_PERIOD);
    if !(tick_period.is_finite() && tick_period > 0.0) {
        return Err(CodecError::ParameterError);
    }

    let timing = schema.timing(physical);
    let mut writer = TrackWriter::new(timing.capacity_bits());
    schema.encode_sectors(physical, sectors, &mut writer)?;
    let (fill, fill_width) = schema.gap_fill();
    let (bits, mut index_marks) = writer.finish(fill, fill_width)?;

    if index_marks.first() != Some(&0) {
        index_marks.insert(0, 0);
    }
    index_marks.push(bits.len());

    let clock_period = match options.drive_rotational_period_ms {
        Some(drive_ms) if drive_ms > 0.0 => {
            physical_clock_period(timing.clock_period, timing.rotational_period, drive_ms * 1e-3)
        }
        Some(_) => return Err(CodecError::ParameterError),
        None => timing.clock_period,
    };

    let mut timeline = FluxTimeline::new(tick_period);
    timeline.append_bits_indexed(&bits, clock_period, &index_marks);

    log::debug!(
        "encode_track(): {} {}: {} bits at {}, {} transitions over {}",
        schema,
        physical,
        bits.len(),
        format_us!(clock_period),
        timeline.transition_count(),
        format_ms!(timeline.duration())
    );

    Ok(EncodedTrack {
        bits,
        timeline,
        index_marks,
        clock_period,
    })
}
