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

//! This module defines a [FluxHistogram] structure which is used to estimate the base cell
//! period of a flux track so that the [Pll](crate::flux::pll::Pll) may be properly initialized
//! for decoding.

use crate::{flux::FluxTimeline, types::TrackDataEncoding};
use histogram::{Bucket, Histogram};

/// Number of transitions sampled when seeking the clock.
pub const SEEK_SAMPLES: usize = 4000;

pub struct FluxHistogram {
    histogram: Histogram,
    maxima: Vec<(u64, std::ops::RangeInclusive<u64>)>,
    total_time: f64,
}

impl FluxHistogram {
    /// Produce a [FluxHistogram] over at most `max_samples` leading flux deltas.
    /// # Arguments
    /// * `deltas` - A slice of flux delta times in seconds
    /// * `max_samples` - The maximum number of deltas to sample
    pub fn new(deltas: &[f64], max_samples: usize) -> Option<Self> {
        // Max value power of 2^14 = 16384 (16us)
        // Grouping power of 3 produces sharp spikes without false maxima
        let mut histogram = Histogram::new(3, 14).ok()?;

        let take_count = deltas.len().min(max_samples);
        log::debug!("FluxHistogram::new(): Taking {} flux deltas", take_count);
        let mut total_time = 0.0;
        for delta_ns in deltas.iter().take(take_count).map(|d| {
            total_time += d;
            Self::delta_to_u64(*d)
        }) {
            // Values beyond the histogram range are not useful for seeking.
            _ = histogram.increment(delta_ns);
        }

        Some(FluxHistogram {
            histogram,
            maxima: Vec::new(),
            total_time,
        })
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    fn delta_to_u64(value: f64) -> u64 {
        (value * 1_000_000_000.0) as u64
    }

    fn u64_to_delta(value: u64) -> f64 {
        value as f64 / 1_000_000_000.0
    }

    /// Locate local maxima in a histogram by bucket.
    pub fn find_local_maxima(&mut self, threshold: Option<f64>) -> &Vec<(u64, std::ops::RangeInclusive<u64>)> {
        let mut peaks = vec![];
        let mut previous_bucket: Option<Bucket> = None;
        let mut current_bucket: Option<Bucket> = None;

        // Calculate total count for threshold
        let total_count: u64 = self.histogram.into_iter().map(|bucket| bucket.count()).sum();
        let threshold = (total_count as f64 * threshold.unwrap_or(0.005)).round() as u64;

        for bucket in self.histogram.into_iter() {
            if let (Some(prev), Some(curr)) = (previous_bucket.as_ref(), current_bucket.as_ref()) {
                // Identify local maximum and apply threshold check
                if curr.count() >= prev.count() && curr.count() > bucket.count() && curr.count() >= threshold {
                    peaks.push((curr.count(), curr.start()..=curr.end()));
                }
            }
            // Update previous and current buckets
            previous_bucket = current_bucket.take();
            current_bucket = Some(bucket.clone());
        }

        self.maxima = peaks;
        &self.maxima
    }

    /// Calculate the base (shortest) transition time from the first peak.
    pub fn base_transition_time(&mut self) -> Option<f64> {
        if self.maxima.is_empty() {
            self.find_local_maxima(None);
        }

        let first_peak = &self.maxima.first()?.1;
        let range_median = (first_peak.start() + first_peak.end()) / 2;

        // Convert back to seconds
        Some(Self::u64_to_delta(range_median))
    }

    pub(crate) fn print_debug(&self) {
        for peak in self.maxima.iter() {
            log::debug!(
                "FluxHistogram::print_debug(): Peak at range: {:?} ct: {}",
                peak.1,
                peak.0
            );
        }
    }
}

/// Estimate a timeline's cell period from the shortest common transition interval.
/// Returns `None` if the timeline has no usable peak.
pub fn seek_clock(timeline: &FluxTimeline, encoding: TrackDataEncoding) -> Option<f64> {
    let deltas = timeline.deltas();
    let mut histogram = FluxHistogram::new(&deltas, SEEK_SAMPLES)?;
    let base = histogram.base_transition_time();
    histogram.print_debug();

    let base = match base {
        Some(base) if base > 0.0 => base,
        _ => {
            log::warn!("seek_clock(): No transition peak found in {} deltas", deltas.len());
            return None;
        }
    };

    let clock = base / encoding.min_cells() as f64;
    log::debug!(
        "seek_clock(): Base transition {} -> {} clock: {}",
        format_us!(base),
        encoding,
        format_us!(clock)
    );
    Some(clock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mfm_peaks() {
        let deltas: Vec<f64> = [4e-6, 6e-6, 8e-6, 4e-6, 4e-6, 6e-6].repeat(300);
        let timeline = FluxTimeline::from_deltas(&deltas, 1e-9);
        let clock = seek_clock(&timeline, TrackDataEncoding::Mfm).unwrap();
        assert!((clock - 2e-6).abs() < 0.1e-6, "clock: {}", clock);
    }

    #[test]
    fn gcr_peaks() {
        let deltas: Vec<f64> = [3.25e-6, 6.5e-6, 3.25e-6, 9.75e-6].repeat(300);
        let timeline = FluxTimeline::from_deltas(&deltas, 1e-9);
        let clock = seek_clock(&timeline, TrackDataEncoding::Gcr).unwrap();
        assert!((clock - 3.25e-6).abs() < 0.15e-6, "clock: {}", clock);
    }

    #[test]
    fn empty_timeline_has_no_clock() {
        let timeline = FluxTimeline::new(1e-9);
        assert!(seek_clock(&timeline, TrackDataEncoding::Mfm).is_none());
    }
}
