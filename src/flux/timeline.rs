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

    src/flux/timeline.rs

    Flux interval storage for one or more revolutions.
*/

//! A [FluxTimeline] is an ordered list of intervals between flux transitions, with index pulses
//! interleaved at the time they occurred. Intervals are stored as integer ticks of a fixed
//! `tick_period`, the way flux capture hardware reports them.

use bit_vec::BitVec;

/// One nanosecond. Fine enough that rounding to ticks never moves a transition by a
/// meaningful fraction of a cell.
pub const DEFAULT_TICK_PERIOD: f64 = 1e-9;

/// A single timeline event. `ticks` is the time elapsed since the previous event of either kind.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FluxInterval {
    pub ticks: u32,
    /// Marks an index pulse rather than a flux transition.
    pub index: bool,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FluxTimeline {
    intervals: Vec<FluxInterval>,
    tick_period: f64,
    // Absolute tick of the last event pushed.
    event_ticks: u64,
    // Absolute time of the end of the last bit appended, in seconds. Always >= event time.
    cursor_time: f64,
}

impl Default for FluxTimeline {
    fn default() -> Self {
        FluxTimeline::new(DEFAULT_TICK_PERIOD)
    }
}

impl FluxTimeline {
    pub fn new(tick_period: f64) -> Self {
        debug_assert!(tick_period > 0.0);
        FluxTimeline {
            intervals: Vec::new(),
            tick_period,
            event_ticks: 0,
            cursor_time: 0.0,
        }
    }

    /// Build a timeline from a list of transition intervals in seconds, as a capture device
    /// might supply them.
    pub fn from_deltas(deltas: &[f64], tick_period: f64) -> Self {
        let mut timeline = FluxTimeline::new(tick_period);
        for delta in deltas {
            let ticks = (delta.max(0.0) / tick_period).round() as u32;
            timeline.push_transition(ticks);
        }
        timeline
    }

    pub fn tick_period(&self) -> f64 {
        self.tick_period
    }

    pub fn intervals(&self) -> &[FluxInterval] {
        &self.intervals
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FluxInterval> {
        self.intervals.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Append a flux transition `ticks` after the previous event.
    pub fn push_transition(&mut self, ticks: u32) {
        self.push_event(ticks, false);
    }

    /// Append an index pulse `ticks` after the previous event.
    pub fn push_index(&mut self, ticks: u32) {
        self.push_event(ticks, true);
    }

    fn push_event(&mut self, ticks: u32, index: bool) {
        self.intervals.push(FluxInterval { ticks, index });
        self.event_ticks += ticks as u64;
        self.cursor_time = self.cursor_time.max(self.event_ticks as f64 * self.tick_period);
    }

    /// Push an event at an absolute time in seconds.
    fn push_event_at(&mut self, time: f64, index: bool) {
        let abs_ticks = (time / self.tick_period).round() as u64;
        let delta = abs_ticks.saturating_sub(self.event_ticks);
        let delta = u32::try_from(delta).unwrap_or(u32::MAX);
        self.intervals.push(FluxInterval { ticks: delta, index });
        self.event_ticks += delta as u64;
    }

    /// Expand a clocked bit sequence into transitions at a fixed cell period. Every `1` bit closes
    /// an interval at the end of its cell. Transition times are derived from the absolute bit time
    /// so tick rounding never accumulates over a track.
    pub fn append_bits(&mut self, bits: &BitVec, clock_period: f64) {
        self.append_bits_indexed(bits, clock_period, &[]);
    }

    /// Like [FluxTimeline::append_bits], additionally placing an index pulse at the start of each
    /// bit offset listed in `index_marks` (ascending). A mark equal to `bits.len()` is placed at
    /// the end of the appended bits.
    pub fn append_bits_indexed(&mut self, bits: &BitVec, clock_period: f64, index_marks: &[usize]) {
        let base = self.cursor_time;
        let mut marks = index_marks.iter().peekable();

        for (i, bit) in bits.iter().enumerate() {
            while let Some(&&mark) = marks.peek() {
                if mark > i {
                    break;
                }
                self.push_event_at(base + mark as f64 * clock_period, true);
                marks.next();
            }
            if bit {
                self.push_event_at(base + (i + 1) as f64 * clock_period, false);
            }
        }
        for &mark in marks {
            if mark <= bits.len() {
                self.push_event_at(base + mark as f64 * clock_period, true);
            }
        }
        self.cursor_time = base + bits.len() as f64 * clock_period;
    }

    /// Append an index pulse at the current end of the timeline.
    pub fn append_index(&mut self) {
        self.push_event_at(self.cursor_time, true);
    }

    /// Total duration in seconds.
    pub fn duration(&self) -> f64 {
        self.cursor_time.max(self.event_ticks as f64 * self.tick_period)
    }

    /// Number of flux transitions, excluding index pulses.
    pub fn transition_count(&self) -> usize {
        self.intervals.iter().filter(|i| !i.index).count()
    }

    /// Absolute times of all index pulses, in seconds.
    pub fn index_times(&self) -> Vec<f64> {
        let mut ticks = 0u64;
        let mut times = Vec::new();
        for interval in &self.intervals {
            ticks += interval.ticks as u64;
            if interval.index {
                times.push(ticks as f64 * self.tick_period);
            }
        }
        times
    }

    /// Intervals between successive flux transitions in seconds. Index pulses are transparent:
    /// the time on either side of a pulse belongs to the same interval.
    pub fn deltas(&self) -> Vec<f64> {
        let mut deltas = Vec::with_capacity(self.intervals.len());
        let mut carry = 0u64;
        for interval in &self.intervals {
            carry += interval.ticks as u64;
            if !interval.index {
                deltas.push(carry as f64 * self.tick_period);
                carry = 0;
            }
        }
        deltas
    }

    /// Split the timeline at each index pulse. Time on either side of a pulse is kept in the
    /// first interval of the following revolution. Transitions before the first pulse form
    /// their own leading timeline if any exist.
    pub fn revolutions(&self) -> Vec<FluxTimeline> {
        let mut revolutions = Vec::new();
        let mut current = FluxTimeline::new(self.tick_period);
        let mut carry = 0u32;

        for interval in &self.intervals {
            carry = carry.saturating_add(interval.ticks);
            if interval.index {
                if !current.is_empty() {
                    revolutions.push(std::mem::replace(&mut current, FluxTimeline::new(self.tick_period)));
                }
                continue;
            }
            current.push_transition(carry);
            carry = 0;
        }
        if !current.is_empty() {
            revolutions.push(current);
        }
        revolutions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_times(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{} != {}", a, e);
        }
    }

    fn bits_from_str(s: &str) -> BitVec {
        s.chars().filter(|c| *c == '0' || *c == '1').map(|c| c == '1').collect()
    }

    #[test]
    fn append_bits_expands_cells() {
        let mut timeline = FluxTimeline::new(1e-9);
        timeline.append_bits(&bits_from_str("0101001"), 2e-6);

        let ticks: Vec<u32> = timeline.iter().map(|i| i.ticks).collect();
        assert_eq!(ticks, vec![4000, 4000, 6000]);
        assert_eq!(timeline.transition_count(), 3);
        assert!((timeline.duration() - 14e-6).abs() < 1e-12);
    }

    #[test]
    fn trailing_zeros_extend_duration() {
        let mut timeline = FluxTimeline::new(1e-9);
        timeline.append_bits(&bits_from_str("1000"), 2e-6);
        timeline.append_index();
        assert_eq!(timeline.index_times().len(), 1);
        assert!((timeline.index_times()[0] - 8e-6).abs() < 1e-12);
    }

    #[test]
    fn rounding_does_not_accumulate() {
        // 3ns ticks do not divide a 2us cell evenly.
        let tick = 3e-9;
        let mut timeline = FluxTimeline::new(tick);
        let bits: BitVec = std::iter::repeat(true).take(30_000).collect();
        timeline.append_bits(&bits, 2e-6);
        let total: u64 = timeline.iter().map(|i| i.ticks as u64).sum();
        let expected = (30_000.0 * 2e-6 / tick).round() as u64;
        assert_eq!(total, expected);
    }

    #[test]
    fn index_marks_interleave() {
        let mut timeline = FluxTimeline::new(1e-9);
        timeline.append_bits_indexed(&bits_from_str("01010101"), 1e-6, &[0, 4]);
        let events: Vec<(u32, bool)> = timeline.iter().map(|i| (i.ticks, i.index)).collect();
        assert_eq!(
            events,
            vec![(0, true), (2000, false), (2000, false), (0, true), (2000, false), (2000, false)]
        );
        assert_times(&timeline.index_times(), &[0.0, 4e-6]);
    }

    #[test]
    fn deltas_merge_across_index() {
        let mut timeline = FluxTimeline::new(1e-9);
        timeline.push_transition(4000);
        timeline.push_index(1000);
        timeline.push_transition(3000);
        assert_times(&timeline.deltas(), &[4e-6, 4e-6]);
        assert_eq!(timeline.transition_count(), 2);
    }

    #[test]
    fn revolutions_split_at_index() {
        let mut timeline = FluxTimeline::new(1e-9);
        timeline.push_index(0);
        timeline.push_transition(4000);
        timeline.push_transition(6000);
        timeline.push_index(1000);
        timeline.push_transition(3000);
        timeline.push_transition(8000);

        let revs = timeline.revolutions();
        assert_eq!(revs.len(), 2);
        assert_times(&revs[0].deltas(), &[4e-6, 6e-6]);
        assert_times(&revs[1].deltas(), &[4e-6, 8e-6]);
    }
}
