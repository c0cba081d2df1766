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

    src/sync.rs

    Sync pattern matching and index pulse segmentation.
*/

//! Record location by sync pattern.
//!
//! The matcher scans a bit sequence left to right through a 64-bit shift register. Whenever the
//! register's trailing bits match a known sync pattern, the record in progress is closed and a new
//! one opens at the first bit of the pattern. Hard-sectored formats first split the sequence at
//! index pulses with [segment_by_index] and then match within each segment.

use crate::bitstream_codec::{decode_fm_mfm, pack_bits, read_bits};
use bit_vec::BitVec;
use std::ops::Range;

/// Decides whether the trailing bits of a shift register begin a record.
pub trait RecordMatcher {
    /// Return the width in bits of the matched pattern, or `None` if nothing matched.
    fn match_record(&self, fifo: u64) -> Option<usize>;
}

impl<F> RecordMatcher for F
where
    F: Fn(u64) -> Option<usize>,
{
    fn match_record(&self, fifo: u64) -> Option<usize> {
        self(fifo)
    }
}

/// A fixed bit pattern of up to 64 bits. Bits cleared in `mask` are ignored.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SyncPattern {
    pub value: u64,
    pub width: usize,
    pub mask: u64,
}

impl SyncPattern {
    pub const fn new(value: u64, width: usize) -> Self {
        debug_assert!(width > 0 && width <= 64);
        let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
        SyncPattern { value, width, mask }
    }

    pub const fn masked(value: u64, width: usize, mask: u64) -> Self {
        SyncPattern {
            value: value & mask,
            width,
            mask,
        }
    }

    #[inline]
    pub fn matches(&self, fifo: u64) -> bool {
        fifo & self.mask == self.value
    }
}

/// A set of candidate patterns; the first one that matches wins.
#[derive(Clone, Debug, Default)]
pub struct SyncPatterns(pub Vec<SyncPattern>);

impl SyncPatterns {
    pub fn new(patterns: &[SyncPattern]) -> Self {
        SyncPatterns(patterns.to_vec())
    }
}

impl RecordMatcher for SyncPatterns {
    fn match_record(&self, fifo: u64) -> Option<usize> {
        self.0.iter().find(|p| p.matches(fifo)).map(|p| p.width)
    }
}

impl RecordMatcher for SyncPattern {
    fn match_record(&self, fifo: u64) -> Option<usize> {
        self.matches(fifo).then_some(self.width)
    }
}

/// A candidate record: the raw bits from the start of its sync pattern up to the start of the
/// next record (or the end of the scanned range).
#[derive(Clone, Debug)]
pub struct RawRecord {
    /// Bit offset of the first bit of the sync pattern within the scanned sequence.
    pub start: usize,
    pub bits: BitVec,
    /// Ordinal of the index segment the record was found in, for hard-sectored formats.
    pub segment: Option<usize>,
}

impl RawRecord {
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Bit offset one past the last bit of the record.
    pub fn end(&self) -> usize {
        self.start + self.bits.len()
    }

    /// The raw bits packed into bytes, MSB first.
    pub fn bytes(&self) -> Vec<u8> {
        pack_bits(&self.bits, 0)
    }

    /// The raw bits from bit `offset` packed into bytes.
    pub fn bytes_at(&self, offset: usize) -> Vec<u8> {
        pack_bits(&self.bits, offset)
    }

    /// The FM/MFM data bits of the record.
    pub fn decoded(&self) -> Vec<u8> {
        decode_fm_mfm(&self.bits, 0)
    }

    /// The FM/MFM data bits of the record, starting at the clock bit `offset`.
    pub fn decoded_at(&self, offset: usize) -> Vec<u8> {
        decode_fm_mfm(&self.bits, offset)
    }

    /// Read `width` raw bits from `offset` as an integer.
    pub fn read_raw(&self, offset: usize, width: usize) -> Option<u64> {
        read_bits(&self.bits, offset, width)
    }
}

/// Scan all of `bits` for records.
pub fn extract_records<M: RecordMatcher + ?Sized>(bits: &BitVec, matcher: &M) -> Vec<RawRecord> {
    extract_records_in(bits, 0..bits.len(), matcher, None)
}

/// Scan `range` of `bits` for records, tagging each with `segment`.
///
/// A match is accepted only once the whole pattern lies inside the range. Record start positions
/// are absolute offsets into `bits`.
pub fn extract_records_in<M: RecordMatcher + ?Sized>(
    bits: &BitVec,
    range: Range<usize>,
    matcher: &M,
    segment: Option<usize>,
) -> Vec<RawRecord> {
    let mut records = Vec::new();
    let range = range.start.min(bits.len())..range.end.min(bits.len());
    let mut fifo: u64 = 0;
    let mut open: Option<usize> = None;

    let close = |start: usize, end: usize, records: &mut Vec<RawRecord>| {
        let mut record_bits = BitVec::with_capacity(end - start);
        for i in start..end {
            record_bits.push(bits[i]);
        }
        records.push(RawRecord {
            start,
            bits: record_bits,
            segment,
        });
    };

    for pos in range.clone() {
        fifo = (fifo << 1) | bits[pos] as u64;
        let consumed = pos + 1 - range.start;

        if let Some(width) = matcher.match_record(fifo) {
            if consumed < width {
                continue;
            }
            let start = pos + 1 - width;
            if let Some(open_start) = open {
                if start <= open_start {
                    // Overlapping match of the same sync run.
                    continue;
                }
                close(open_start, start, &mut records);
            }
            open = Some(start);
        }
    }

    if let Some(open_start) = open {
        close(open_start, range.end, &mut records);
    }

    log::trace!(
        "extract_records_in(): Found {} records in bits {:?}",
        records.len(),
        range
    );
    records
}

/// A span of a bit sequence that begins at an index pulse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSegment {
    /// Zero-based count of index pulses preceding this span.
    pub ordinal: usize,
    pub range: Range<usize>,
}

/// Split a bit sequence of `bit_len` bits at `index_positions`.
///
/// Bits before the first pulse are a partial slot and are skipped. With no pulses at all the
/// whole sequence is one segment. Empty spans are dropped but still consume an ordinal.
pub fn segment_by_index(bit_len: usize, index_positions: &[usize]) -> Vec<IndexSegment> {
    if index_positions.is_empty() {
        if bit_len == 0 {
            return Vec::new();
        }
        return vec![IndexSegment {
            ordinal: 0,
            range: 0..bit_len,
        }];
    }

    let mut segments = Vec::with_capacity(index_positions.len());
    for (ordinal, &start) in index_positions.iter().enumerate() {
        let end = index_positions.get(ordinal + 1).copied().unwrap_or(bit_len).min(bit_len);
        let start = start.min(bit_len);
        if end > start {
            segments.push(IndexSegment {
                ordinal,
                range: start..end,
            });
        }
    }
    segments
}

/// Run the matcher inside each index segment, tagging records with their segment ordinal.
pub fn extract_segmented_records<M: RecordMatcher + ?Sized>(
    bits: &BitVec,
    index_positions: &[usize],
    matcher: &M,
) -> Vec<RawRecord> {
    segment_by_index(bits.len(), index_positions)
        .into_iter()
        .flat_map(|segment| extract_records_in(bits, segment.range, matcher, Some(segment.ordinal)))
        .collect()
}

/// Merge the records of each index segment into one record that starts at the segment's first
/// match. A hard-sectored slot holds a single record, so later matches in the same slot are
/// payload bytes that happen to look like a sync pattern. Records without a segment pass through.
pub fn merge_segments(records: &[RawRecord]) -> Vec<RawRecord> {
    let mut merged: Vec<RawRecord> = Vec::with_capacity(records.len());
    for record in records {
        if let Some(last) = merged.last_mut() {
            if record.segment.is_some() && last.segment == record.segment && last.end() == record.start {
                last.bits.extend(record.bits.iter());
                continue;
            }
        }
        merged.push(record.clone());
    }
    merged
}
