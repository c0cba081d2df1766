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

use std::fmt::{self, Display, Formatter};
use strum::EnumIter;

/// The modulation used to record data bits on a track.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackDataEncoding {
    Fm,
    #[default]
    Mfm,
    Gcr,
}

impl Display for TrackDataEncoding {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            TrackDataEncoding::Fm => write!(f, "FM"),
            TrackDataEncoding::Mfm => write!(f, "MFM"),
            TrackDataEncoding::Gcr => write!(f, "GCR"),
        }
    }
}

impl TrackDataEncoding {
    /// Return the number of cells spanned by the shortest legal flux interval.
    /// MFM never records two adjacent 1 cells; FM and GCR may.
    pub fn min_cells(&self) -> usize {
        match self {
            TrackDataEncoding::Mfm => 2,
            TrackDataEncoding::Fm | TrackDataEncoding::Gcr => 1,
        }
    }
}

/// The decode outcome of a single sector.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SectorStatus {
    /// Header and data passed every check the architecture defines.
    Ok,
    /// Data was read but failed its checksum. The data is retained.
    BadChecksum,
    /// No record was found for an expected sector.
    #[default]
    Missing,
    /// A valid header was found without a following data record.
    DataMissing,
    /// Two good reads of the same sector disagreed.
    Conflict,
    /// The codec reached an inconsistent state while producing this sector.
    InternalError,
}

impl Display for SectorStatus {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            SectorStatus::Ok => write!(f, "OK"),
            SectorStatus::BadChecksum => write!(f, "bad checksum"),
            SectorStatus::Missing => write!(f, "missing"),
            SectorStatus::DataMissing => write!(f, "data missing"),
            SectorStatus::Conflict => write!(f, "conflicting data"),
            SectorStatus::InternalError => write!(f, "internal error"),
        }
    }
}

impl SectorStatus {
    /// Return a one-character code suitable for sector maps.
    pub fn to_char(&self) -> char {
        match self {
            SectorStatus::Ok => ' ',
            SectorStatus::BadChecksum => 'B',
            SectorStatus::Missing => '?',
            SectorStatus::DataMissing => 'D',
            SectorStatus::Conflict => 'C',
            SectorStatus::InternalError => '!',
        }
    }

    /// Rank used when choosing between copies of the same sector; lower is better.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            SectorStatus::Ok => 0,
            SectorStatus::Conflict => 1,
            SectorStatus::BadChecksum => 2,
            SectorStatus::DataMissing => 3,
            SectorStatus::Missing => 4,
            SectorStatus::InternalError => 5,
        }
    }

    /// Return true if the sector carries data that was read from disk.
    pub fn has_data(&self) -> bool {
        matches!(
            self,
            SectorStatus::Ok | SectorStatus::BadChecksum | SectorStatus::Conflict
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    #[test]
    fn status_chars_are_unique() {
        let chars: HashSet<char> = SectorStatus::iter().map(|s| s.to_char()).collect();
        assert_eq!(chars.len(), SectorStatus::iter().count());
    }

    #[test]
    fn min_cells() {
        assert_eq!(TrackDataEncoding::Mfm.min_cells(), 2);
        assert_eq!(TrackDataEncoding::Fm.min_cells(), 1);
        assert_eq!(TrackDataEncoding::Gcr.min_cells(), 1);
    }
}
