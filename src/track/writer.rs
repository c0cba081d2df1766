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

    src/track/writer.rs

    Bit-level track assembly with capacity checking and index marks.
*/

//! A bit cursor for assembling encoded tracks.
//!
//! Every architecture encoder writes through a [TrackWriter], which tracks the last bit written so
//! consecutive MFM runs stay phase-consistent, records index marks for hard-sectored formats, and
//! refuses to hand out a track that is longer than its capacity.

use crate::{
    bitstream_codec::{fm, gcr, mfm},
    CodecError,
};
use bit_vec::BitVec;

#[derive(Clone, Debug)]
pub struct TrackWriter {
    bits: BitVec,
    capacity: usize,
    last_bit: bool,
    index_marks: Vec<usize>,
}

impl TrackWriter {
    /// Create a writer for a track of `capacity` bit cells.
    pub fn new(capacity: usize) -> Self {
        TrackWriter {
            bits: BitVec::with_capacity(capacity),
            capacity,
            last_bit: false,
            index_marks: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last_bit(&self) -> bool {
        self.last_bit
    }

    pub fn bits(&self) -> &BitVec {
        &self.bits
    }

    /// Write the low `width` bits of `value`, MSB first.
    pub fn write_raw(&mut self, value: u64, width: usize) {
        debug_assert!(width <= 64);
        for i in (0..width).rev() {
            self.bits.push((value >> i) & 1 != 0);
        }
        if width > 0 {
            self.last_bit = value & 1 != 0;
        }
    }

    pub fn write_raw_repeat(&mut self, value: u64, width: usize, count: usize) {
        for _ in 0..count {
            self.write_raw(value, width);
        }
    }

    pub fn write_bits(&mut self, bits: &BitVec) {
        self.bits.extend(bits.iter());
        if let Some(last) = bits.get(bits.len().wrapping_sub(1)) {
            self.last_bit = last;
        }
    }

    /// Write bytes without modulation.
    pub fn write_raw_bytes(&mut self, data: &[u8]) {
        for byte in data {
            self.write_raw(*byte as u64, 8);
        }
    }

    pub fn write_mfm(&mut self, data: &[u8]) {
        mfm::encode(data, &mut self.last_bit, &mut self.bits);
    }

    pub fn write_fm(&mut self, data: &[u8]) {
        fm::encode(data, &mut self.last_bit, &mut self.bits);
    }

    /// Write bytes through the Commodore 4-to-5 GCR table.
    pub fn write_gcr45(&mut self, data: &[u8]) {
        gcr::encode_c64(data, &mut self.bits);
        if let Some(last) = self.bits.iter().next_back() {
            self.last_bit = last;
        }
    }

    /// Record an index pulse at the current position.
    pub fn mark_index(&mut self) {
        self.index_marks.push(self.bits.len());
    }

    pub fn index_marks(&self) -> &[usize] {
        &self.index_marks
    }

    /// Repeat the low `width` bits of `pattern` until the cursor reaches `pos`. The last
    /// repetition is truncated if it does not fit.
    pub fn fill_to(&mut self, pos: usize, pattern: u64, width: usize) -> Result<(), CodecError> {
        if width == 0 || width > 64 {
            return Err(CodecError::ParameterError);
        }
        if self.bits.len() > pos {
            return Err(CodecError::TrackDataOverrun {
                needed: self.bits.len(),
                capacity: pos,
            });
        }
        while self.bits.len() < pos {
            let n = (pos - self.bits.len()).min(width);
            self.write_raw(pattern >> (width - n), n);
        }
        Ok(())
    }

    /// Fill the rest of the track with `pattern` and return the finished bits and index marks.
    pub fn finish(mut self, pattern: u64, width: usize) -> Result<(BitVec, Vec<usize>), CodecError> {
        if self.bits.len() > self.capacity {
            log::debug!(
                "TrackWriter::finish(): {} bits written to a track of {} bits",
                self.bits.len(),
                self.capacity
            );
            return Err(CodecError::TrackDataOverrun {
                needed: self.bits.len(),
                capacity: self.capacity,
            });
        }
        let capacity = self.capacity;
        self.fill_to(capacity, pattern, width)?;
        Ok((self.bits, self.index_marks))
    }
}
