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

//! Flux-level primitives: the [FluxTimeline] of raw transition intervals, the [Pll](pll::Pll)
//! clock tracker that recovers a bit sequence from it, and histogram-based clock seeking.

use std::{
    fmt,
    fmt::{Display, Formatter},
};

#[doc(hidden)]
#[macro_export]
macro_rules! format_us {
    ($value:expr) => {
        format!("{:.4}μs", $value * 1_000_000.0)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! format_ms {
    ($value:expr) => {
        format!("{:.4}ms", $value * 1_000.0)
    };
}

#[cfg(feature = "flux")]
pub mod histogram;
pub mod pll;
pub mod timeline;

#[cfg(feature = "flux")]
pub use histogram::{seek_clock, FluxHistogram};
pub use timeline::{FluxInterval, FluxTimeline, DEFAULT_TICK_PERIOD};

/// Scale a layout clock period to a drive that spins at a different speed than the layout
/// assumes, so that the same number of cells fits in one revolution.
pub fn physical_clock_period(clock_period: f64, target_rotation: f64, drive_rotation: f64) -> f64 {
    if target_rotation <= 0.0 {
        return clock_period;
    }
    clock_period * drive_rotation / target_rotation
}

/// Interval statistics gathered by the clock tracker over one decode.
#[derive(Clone, Debug, Default)]
pub struct FluxStats {
    pub total: u32,
    pub one: u32,
    pub two: u32,
    pub three: u32,
    pub four: u32,
    /// Intervals spanning more than four cells.
    pub long_runs: u32,
    /// Intervals whose phase error exceeded the noise threshold.
    pub noisy: u32,
    /// Intervals short enough to be merged into the following one.
    pub too_short: u32,

    pub shortest_flux: f64,
    pub longest_flux: f64,
}

impl Display for FluxStats {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "Total: {} 1: {} 2: {} 3: {} 4: {} Long: {} Noisy: {} Too Short: {} Shortest: {} Longest: {}",
            self.total,
            self.one,
            self.two,
            self.three,
            self.four,
            self.long_runs,
            self.noisy,
            self.too_short,
            format_us!(self.shortest_flux),
            format_us!(self.longest_flux),
        )
    }
}

impl FluxStats {
    pub(crate) fn count_cells(&mut self, cells: usize) {
        match cells {
            1 => self.one += 1,
            2 => self.two += 1,
            3 => self.three += 1,
            4 => self.four += 1,
            _ => self.long_runs += 1,
        }
    }

    /// Return the fraction of intervals the tracker considered noise.
    pub fn noise_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        }
        else {
            self.noisy as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescale_clock_to_drive_speed() {
        // A 300RPM layout written on a 360RPM drive needs a shorter cell.
        let clock = physical_clock_period(2e-6, 0.2, 1.0 / 6.0);
        assert!((clock - 2e-6 * (1.0 / 6.0) / 0.2).abs() < 1e-15);
        assert_eq!(physical_clock_period(2e-6, 0.0, 0.2), 2e-6);
    }

    #[test]
    fn stats_bucket_cells() {
        let mut stats = FluxStats::default();
        for cells in [1, 2, 2, 3, 4, 9] {
            stats.count_cells(cells);
        }
        assert_eq!((stats.one, stats.two, stats.three, stats.four, stats.long_runs), (1, 2, 1, 1, 1));
    }
}
