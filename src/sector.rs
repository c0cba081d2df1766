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

//! The architecture-independent sector model and cross-read consolidation.

use crate::types::{DiskCh, DiskChs, SectorStatus};
use std::collections::BTreeMap;

/// A demodulated record as it was found on the track, kept for diagnostics.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record {
    /// Cell period the record was decoded with, in seconds.
    pub clock: f64,
    pub start_time: f64,
    pub end_time: f64,
    /// Bit offset of the record's sync pattern.
    pub position: usize,
    pub raw_data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sector {
    /// Where the sector was read from.
    pub physical: DiskCh,
    /// The address recorded in the sector header.
    pub logical: DiskChs,
    pub status: SectorStatus,
    pub data: Vec<u8>,
    pub clock: f64,
    pub header_start_time: f64,
    pub header_end_time: f64,
    pub data_start_time: f64,
    pub data_end_time: f64,
    /// Bit offset of the sector's first record.
    pub position: usize,
    pub records: Vec<Record>,
}

impl Sector {
    /// Create a good sector carrying `data`, as supplied to an encoder.
    pub fn new(physical: DiskCh, logical: DiskChs, data: Vec<u8>) -> Self {
        Sector {
            physical,
            logical,
            status: SectorStatus::Ok,
            data,
            clock: 0.0,
            header_start_time: 0.0,
            header_end_time: 0.0,
            data_start_time: 0.0,
            data_end_time: 0.0,
            position: 0,
            records: Vec::new(),
        }
    }

    /// Create a placeholder for an expected sector that produced no record.
    pub fn missing(physical: DiskCh, logical: DiskChs) -> Self {
        Sector {
            status: SectorStatus::Missing,
            ..Sector::new(physical, logical, Vec::new())
        }
    }

    pub fn with_status(mut self, status: SectorStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == SectorStatus::Ok
    }

    /// Return true if the sector should be written by an encoder.
    pub(crate) fn is_encodable(&self) -> bool {
        matches!(self.status, SectorStatus::Ok | SectorStatus::BadChecksum)
    }
}

/// Merge sectors from any number of reads of the same track(s) into one sector per logical
/// address, sorted by address.
///
/// If two or more good copies of a sector disagree, none of them can be trusted: each distinct
/// payload is returned once, marked [SectorStatus::Conflict]. Otherwise the best copy is kept.
pub fn consolidate_sectors<I>(sectors: I) -> Vec<Sector>
where
    I: IntoIterator<Item = Sector>,
{
    let mut groups: BTreeMap<DiskChs, Vec<Sector>> = BTreeMap::new();
    for sector in sectors {
        groups.entry(sector.logical).or_default().push(sector);
    }

    let mut consolidated = Vec::with_capacity(groups.len());
    for (chs, copies) in groups {
        let mut good: Vec<Sector> = Vec::new();
        for copy in copies.iter().filter(|s| s.is_ok()) {
            if !good.iter().any(|g| g.data == copy.data) {
                good.push(copy.clone());
            }
        }

        if good.len() > 1 {
            log::debug!(
                "consolidate_sectors(): {} conflicting good copies of sector {}",
                good.len(),
                chs
            );
            consolidated.extend(good.into_iter().map(|s| s.with_status(SectorStatus::Conflict)));
            continue;
        }
        if let Some(best) = good.pop() {
            consolidated.push(best);
            continue;
        }
        // min_by_key keeps the first of equally ranked copies.
        if let Some(best) = copies.into_iter().min_by_key(|s| s.status.rank()) {
            consolidated.push(best);
        }
    }
    consolidated
}
