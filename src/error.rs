// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The ways a frame can fail to render.  Numeric evaluation never
//! fails; only construction of the inputs, the accelerated backend,
//! and the parallel bands can.

use failure::Fail;

/// Everything the renderer can report to its caller.  None of these
/// ever accompany a partially-drawn frame.
#[derive(Debug, Clone, PartialEq, Fail)]
pub enum RenderError {
    /// The accelerated backend could not be initialized or used.  The
    /// session falls back to the scalar backend.
    #[fail(display = "Accelerated backend unavailable: {}", _0)]
    CapabilityUnavailable(String),

    /// A band of rows failed to compute, so the whole frame is
    /// discarded.
    #[fail(display = "Band failure in rows {}..{}", start_row, end_row)]
    BandFailure {
        /// First row of the failed band.
        start_row: usize,
        /// One past the last row of the failed band.
        end_row: usize,
    },

    /// The viewport cannot be mapped onto the complex plane.
    #[fail(display = "Invalid viewport: {}", _0)]
    InvalidViewport(String),

    /// A canvas must have at least one pixel in each direction.
    #[fail(display = "Invalid dimensions {}x{}", width, height)]
    InvalidDimensions {
        /// Requested width.
        width: usize,
        /// Requested height.
        height: usize,
    },

    /// The finished frame could not be handed off for encoding.
    #[fail(display = "Export failed: {}", _0)]
    Export(String),
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_failure_names_its_rows() {
        let e = RenderError::BandFailure {
            start_row: 10,
            end_row: 20,
        };
        assert_eq!(format!("{}", e), "Band failure in rows 10..20");
    }

    #[test]
    fn dimensions_are_reported() {
        let e = RenderError::InvalidDimensions {
            width: 0,
            height: 3,
        };
        assert_eq!(format!("{}", e), "Invalid dimensions 0x3");
    }
}
