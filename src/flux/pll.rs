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

//! A nearest-cell clock tracker. Each flux interval is quantized to a whole number of cells
//! against the current working period, the matching run of bits is emitted, and the working
//! period is nudged toward the observed cell length.

use crate::flux::{FluxStats, FluxTimeline};
use bit_vec::BitVec;

/// Represents the default clock for a 300RPM, 250Kbps MFM disk.
pub const BASE_CLOCK: f64 = 2e-6;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PllPreset {
    /// Follow drift quickly. Suited to worn media and drives with unstable motors.
    Aggressive,
    /// Hold the nominal clock closely.
    Conservative,
}

pub struct PllDecodeResult {
    pub bits: BitVec,
    /// Time of each bit cell's end, in seconds from the start of the timeline.
    pub bit_times: Vec<f64>,
    /// Bit offsets at which index pulses occurred.
    pub index_positions: Vec<usize>,
    pub flux_stats: FluxStats,
    /// Number of times tracking was lost and the clock reset to nominal.
    pub sync_losses: u32,
    pub final_period: f64,
}

impl PllDecodeResult {
    /// Return the time at bit offset `bit`, clamped to the decoded range.
    pub fn time_at(&self, bit: usize) -> f64 {
        match self.bit_times.get(bit) {
            Some(t) => *t,
            None => self.bit_times.last().copied().unwrap_or(0.0),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Pll {
    pub pll_period: f64,
    pub working_period: f64,
    pub max_adjust: f64,
    pub clock_gain: f64,
    pub noise_threshold: f64,
    pub debounce: f64,
    pub loss_limit: u32,
}

impl Default for Pll {
    fn default() -> Self {
        Pll::new()
    }
}

impl Pll {
    pub fn new() -> Self {
        Pll {
            pll_period: BASE_CLOCK, // 2 µs
            working_period: BASE_CLOCK,
            max_adjust: 0.15, // 15%
            clock_gain: 0.05,
            noise_threshold: 0.4,
            debounce: 0.3,
            loss_limit: 16,
        }
    }

    pub fn from_preset(preset: PllPreset) -> Pll {
        match preset {
            PllPreset::Aggressive => Pll {
                max_adjust: 0.20,
                clock_gain: 0.10,
                ..Pll::new()
            },
            PllPreset::Conservative => Pll {
                max_adjust: 0.10,
                clock_gain: 0.02,
                ..Pll::new()
            },
        }
    }

    /// Set the nominal cell period in seconds.
    pub fn set_clock(&mut self, period: f64, max_adj: Option<f64>) {
        debug_assert!(period > 0.0);
        self.pll_period = period;
        self.working_period = period;
        if let Some(adj) = max_adj {
            self.max_adjust = adj;
        }
        log::debug!(
            "Pll::set_clock(): Setting clock period to {}, max adjust: {:.2}",
            format_us!(self.pll_period),
            self.max_adjust,
        );
    }

    pub fn get_clock(&self) -> f64 {
        self.working_period
    }

    pub fn reset_clock(&mut self) {
        self.working_period = self.pll_period;
        log::debug!(
            "Pll::reset_clock(): Resetting clock to default period: {}",
            format_us!(self.pll_period)
        );
    }

    /// Decode a timeline into a bit sequence.
    ///
    /// Noise is never an error. Intervals too short to be a cell are merged into the next
    /// interval, implausible intervals are quantized without moving the clock, and a long run of
    /// implausible intervals resets the clock to nominal so tracking can resume at the next
    /// clean stretch.
    pub fn decode(&mut self, timeline: &FluxTimeline) -> PllDecodeResult {
        let capacity = (timeline.duration() / self.pll_period) as usize + 16;
        let mut bits = BitVec::with_capacity(capacity);
        let mut bit_times = Vec::with_capacity(capacity);
        let mut index_positions = Vec::new();
        let mut flux_stats = FluxStats::default();
        let mut sync_losses = 0;

        let min_clock = self.pll_period - (self.pll_period * self.max_adjust);
        let max_clock = self.pll_period + (self.pll_period * self.max_adjust);
        self.working_period = self.pll_period;

        let tick_period = timeline.tick_period();
        // Time since the last transition that produced bits.
        let mut elapsed = 0.0;
        // Absolute time of that transition.
        let mut last_flux_time = 0.0;
        let mut noisy_run = 0;
        let mut first = true;

        for interval in timeline.iter() {
            elapsed += interval.ticks as f64 * tick_period;

            if interval.index {
                let pending = (elapsed / self.working_period).round() as usize;
                index_positions.push(bits.len() + pending);
                continue;
            }

            if elapsed < self.working_period * self.debounce {
                flux_stats.too_short += 1;
                continue;
            }

            let delta_time = elapsed;
            flux_stats.total += 1;
            if first {
                flux_stats.shortest_flux = delta_time;
                first = false;
            }
            flux_stats.shortest_flux = delta_time.min(flux_stats.shortest_flux);
            flux_stats.longest_flux = delta_time.max(flux_stats.longest_flux);

            let cells = ((delta_time / self.working_period).round() as usize).max(1);
            flux_stats.count_cells(cells);

            // Emit cells - 1 zeros, then the 1 that closes the interval.
            let cell_time = delta_time / cells as f64;
            for c in 1..=cells {
                bits.push(c == cells);
                bit_times.push(last_flux_time + cell_time * c as f64);
            }
            last_flux_time += delta_time;
            elapsed = 0.0;

            // Phase error in cells, normalized per cell for long runs.
            let phase_err = (delta_time / self.working_period) - cells as f64;
            let per_cell_err = if cells > 4 {
                phase_err.abs() / cells as f64
            }
            else {
                phase_err.abs()
            };

            if per_cell_err <= self.noise_threshold {
                noisy_run = 0;
                self.working_period += self.clock_gain * (cell_time - self.working_period);
                self.working_period = self.working_period.clamp(min_clock, max_clock);
            }
            else {
                flux_stats.noisy += 1;
                noisy_run += 1;
                log::trace!(
                    "Pll::decode(): Noisy flux #{} dt: {} ({:.2} cells)",
                    flux_stats.total,
                    format_us!(delta_time),
                    delta_time / self.working_period
                );
                if noisy_run >= self.loss_limit {
                    log::debug!(
                        "Pll::decode(): Lost sync after {} noisy intervals at bit {}",
                        noisy_run,
                        bits.len()
                    );
                    sync_losses += 1;
                    noisy_run = 0;
                    self.reset_clock();
                }
            }
        }

        log::debug!(
            "Pll::decode(): Decoded {} bits over {}, final period: {} sync losses: {}",
            bits.len(),
            format_ms!(timeline.duration()),
            format_us!(self.working_period),
            sync_losses
        );
        log::trace!("Pll::decode(): {}", flux_stats);

        PllDecodeResult {
            bits,
            bit_times,
            index_positions,
            flux_stats,
            sync_losses,
            final_period: self.working_period,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline_from_cells(cells: &[u32], period: f64) -> FluxTimeline {
        let deltas: Vec<f64> = cells.iter().map(|c| *c as f64 * period).collect();
        FluxTimeline::from_deltas(&deltas, 1e-9)
    }

    #[test]
    fn decodes_exact_cells() {
        let timeline = timeline_from_cells(&[2, 3, 4, 2], 2e-6);
        let mut pll = Pll::new();
        let result = pll.decode(&timeline);
        let expected: BitVec = [0, 1, 0, 0, 1, 0, 0, 0, 1, 0, 1].iter().map(|b| *b == 1).collect();
        assert_eq!(result.bits, expected);
        assert_eq!(result.bit_times.len(), result.bits.len());
        assert_eq!(result.flux_stats.total, 4);
        assert_eq!(result.sync_losses, 0);
    }

    #[test]
    fn short_glitch_is_merged() {
        let mut timeline = FluxTimeline::new(1e-9);
        timeline.push_transition(4000);
        timeline.push_transition(200);
        timeline.push_transition(3800);
        let mut pll = Pll::new();
        let result = pll.decode(&timeline);
        assert_eq!(result.bits.len(), 4);
        assert_eq!(result.flux_stats.too_short, 1);
    }

    #[test]
    fn index_position_is_bit_offset() {
        let mut timeline = FluxTimeline::new(1e-9);
        timeline.push_transition(4000);
        timeline.push_index(2000);
        timeline.push_transition(2000);
        let mut pll = Pll::new();
        let result = pll.decode(&timeline);
        assert_eq!(result.index_positions, vec![3]);
        assert_eq!(result.bits.len(), 4);
    }

    #[test]
    fn clock_stays_within_clamp() {
        // Intervals sit between cell counts and drag the clock toward the lower bound.
        let timeline = timeline_from_cells(&[2; 2000], 2.6e-6);
        let mut pll = Pll::new();
        pll.set_clock(2e-6, Some(0.10));
        let result = pll.decode(&timeline);
        assert!(result.final_period >= 1.8e-6 - 1e-12);
        assert!(result.final_period <= 2.2e-6 + 1e-12);
    }

    #[test]
    fn follows_slow_drive() {
        // A drive 5% slow.
        let timeline = timeline_from_cells(&[2, 3, 4, 3, 2, 2, 4].repeat(500), 2.1e-6);
        let mut pll = Pll::new();
        let result = pll.decode(&timeline);
        assert!((result.final_period - 2.1e-6).abs() < 0.02e-6);
        assert_eq!(result.flux_stats.noisy, 0);
    }

    #[test]
    fn garbage_resets_clock() {
        let mut deltas = Vec::new();
        for i in 0..200 {
            deltas.push(if i % 2 == 0 { 5.0e-6 } else { 7.0e-6 });
        }
        let timeline = FluxTimeline::from_deltas(&deltas, 1e-9);
        let mut pll = Pll::new();
        let result = pll.decode(&timeline);
        assert!(result.sync_losses > 0);
        assert!(!result.bits.is_empty());
    }
}
