// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the Viewport, which describes a relationship between a
//! rectangle on the integral (pixel) plane with an origin at 0,0 in
//! the upper-left corner, and the complex plane.  A viewport is just
//! a center and a zoom; the canvas dimensions are supplied at mapping
//! time, so the same viewport survives a canvas resize.
//!
//! At zoom 1.0 the canvas spans four units of the complex plane in
//! each direction.  Imaginary values grow upward, pixel rows grow
//! downward.
use num::Complex;

use crate::error::{RenderError, Result};

/// A sub-pixel sample position, relative to the pixel's integral
/// coordinate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SampleOffset(pub f64, pub f64);

/// The single sample taken when anti-aliasing is off.
pub const CENTER_SAMPLE: [SampleOffset; 1] = [SampleOffset(0.0, 0.0)];

/// The four fixed sub-pixel samples taken when anti-aliasing is on.
pub const SUPERSAMPLES: [SampleOffset; 4] = [
    SampleOffset(-0.25, -0.25),
    SampleOffset(0.25, -0.25),
    SampleOffset(-0.25, 0.25),
    SampleOffset(0.25, 0.25),
];

/// Returns the sample offsets for a pixel.
pub fn sample_offsets(antialiasing: bool) -> &'static [SampleOffset] {
    if antialiasing {
        &SUPERSAMPLES
    } else {
        &CENTER_SAMPLE
    }
}

/// Where we're looking, and how closely.  Immutable; the pan and zoom
/// operations return a new Viewport.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    /// The point of the complex plane at the center of the canvas.
    pub center: Complex<f64>,
    /// Magnification.  Always finite and greater than zero.
    zoom: f64,
}

impl Default for Viewport {
    /// The classic whole-set view.
    fn default() -> Self {
        Viewport {
            center: Complex::new(-0.5, 0.0),
            zoom: 1.0,
        }
    }
}

impl Viewport {
    /// Constructor.  Rejects a center or zoom that cannot be mapped.
    pub fn new(center: Complex<f64>, zoom: f64) -> Result<Viewport> {
        if !(zoom.is_finite() && zoom > 0.0) {
            return Err(RenderError::InvalidViewport(format!(
                "zoom must be finite and greater than zero, got {}",
                zoom
            )));
        }
        if !(center.re.is_finite() && center.im.is_finite()) {
            return Err(RenderError::InvalidViewport(format!(
                "center must be finite, got {}",
                center
            )));
        }
        Ok(Viewport { center, zoom })
    }

    /// The magnification of this viewport.
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Given a pixel position plus a sub-pixel offset on a canvas of
    /// the given size, return the complex number at that position.
    pub fn pixel_to_point(
        &self,
        px: f64,
        py: f64,
        offset: SampleOffset,
        width: usize,
        height: usize,
    ) -> Complex<f64> {
        let (w, h) = (width as f64, height as f64);
        Complex::new(
            (px + offset.0 - w / 2.0) / (self.zoom * w / 4.0) + self.center.re,
            -(py + offset.1 - h / 2.0) / (self.zoom * h / 4.0) + self.center.im,
        )
    }

    /// The inverse of `pixel_to_point` with no sample offset.  The
    /// result is fractional and may lie outside the canvas.
    pub fn point_to_pixel(&self, point: &Complex<f64>, width: usize, height: usize) -> (f64, f64) {
        let (w, h) = (width as f64, height as f64);
        (
            (point.re - self.center.re) * (self.zoom * w / 4.0) + w / 2.0,
            -(point.im - self.center.im) * (self.zoom * h / 4.0) + h / 2.0,
        )
    }

    /// Drag the picture by (dx, dy) pixels.  The content follows the
    /// cursor, so the center moves the opposite way.
    pub fn pan(&self, dx: f64, dy: f64, width: usize, height: usize) -> Viewport {
        let (w, h) = (width as f64, height as f64);
        let center = Complex::new(
            self.center.re - dx / (self.zoom * w / 4.0),
            self.center.im + dy / (self.zoom * h / 4.0),
        );
        Viewport {
            center,
            zoom: self.zoom,
        }
    }

    /// Multiply the zoom by `factor`, keeping the complex point under
    /// pixel (px, py) where it is on the canvas.
    pub fn zoom_at(
        &self,
        px: f64,
        py: f64,
        factor: f64,
        width: usize,
        height: usize,
    ) -> Result<Viewport> {
        let zoomed = Viewport::new(self.center, self.zoom * factor)?;
        let anchor = self.pixel_to_point(px, py, CENTER_SAMPLE[0], width, height);
        let drifted = zoomed.pixel_to_point(px, py, CENTER_SAMPLE[0], width, height);
        Viewport::new(zoomed.center + (anchor - drifted), zoomed.zoom)
    }
}

/// Free-standing form of the mapping, for callers that carry the
/// pieces separately.
pub fn map_pixel_to_complex(
    px: f64,
    py: f64,
    offset: SampleOffset,
    width: usize,
    height: usize,
    viewport: &Viewport,
) -> Complex<f64> {
    viewport.pixel_to_point(px, py, offset, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Complex<f64>, b: Complex<f64>, tolerance: f64) -> bool {
        (a - b).norm() <= tolerance
    }

    #[test]
    fn viewport_fails_on_bad_zoom() {
        assert!(Viewport::new(Complex::new(0.0, 0.0), 0.0).is_err());
        assert!(Viewport::new(Complex::new(0.0, 0.0), -2.0).is_err());
        assert!(Viewport::new(Complex::new(0.0, 0.0), std::f64::NAN).is_err());
    }

    #[test]
    fn viewport_fails_on_bad_center() {
        assert!(Viewport::new(Complex::new(std::f64::INFINITY, 0.0), 1.0).is_err());
    }

    #[test]
    fn canvas_center_maps_to_viewport_center() {
        let vp = Viewport::new(Complex::new(-0.75, 0.1), 3.0).unwrap();
        let p = vp.pixel_to_point(320.0, 240.0, CENTER_SAMPLE[0], 640, 480);
        assert_eq!(p, Complex::new(-0.75, 0.1));
    }

    #[test]
    fn unit_zoom_spans_four_units() {
        let vp = Viewport::new(Complex::new(0.0, 0.0), 1.0).unwrap();
        assert_eq!(
            vp.pixel_to_point(0.0, 0.0, CENTER_SAMPLE[0], 400, 400),
            Complex::new(-2.0, 2.0)
        );
        assert_eq!(
            vp.pixel_to_point(400.0, 400.0, CENTER_SAMPLE[0], 400, 400),
            Complex::new(2.0, -2.0)
        );
    }

    #[test]
    fn sample_offsets_shift_by_quarter_pixels() {
        let vp = Viewport::new(Complex::new(0.0, 0.0), 1.0).unwrap();
        let p = map_pixel_to_complex(2.0, 2.0, SUPERSAMPLES[3], 4, 4, &vp);
        assert_eq!(p, Complex::new(0.25, -0.25));
        assert_eq!(sample_offsets(true).len(), 4);
        assert_eq!(sample_offsets(false), &CENTER_SAMPLE);
    }

    #[test]
    fn point_to_pixel_inverts_pixel_to_point() {
        let vp = Viewport::new(Complex::new(-1.25, 0.3), 17.0).unwrap();
        let p = vp.pixel_to_point(123.0, 45.0, CENTER_SAMPLE[0], 800, 600);
        let (px, py) = vp.point_to_pixel(&p, 800, 600);
        assert!((px - 123.0).abs() < 1e-9);
        assert!((py - 45.0).abs() < 1e-9);
    }

    #[test]
    fn pan_moves_content_with_the_cursor() {
        let vp = Viewport::default();
        let before = vp.pixel_to_point(100.0, 100.0, CENTER_SAMPLE[0], 800, 600);
        let panned = vp.pan(30.0, -20.0, 800, 600);
        let after = panned.pixel_to_point(130.0, 80.0, CENTER_SAMPLE[0], 800, 600);
        assert!(close(before, after, 1e-12));
        assert_eq!(panned.zoom(), vp.zoom());
    }

    #[test]
    fn zoom_keeps_the_point_under_the_cursor() {
        let vp = Viewport::new(Complex::new(-0.5, 0.0), 1.0).unwrap();
        let cursors = [(0.0, 0.0), (799.0, 599.0), (123.5, 456.25), (400.0, 300.0)];
        for &(px, py) in cursors.iter() {
            for &factor in [1.1, 0.5, 10.0, 1e6].iter() {
                let before = vp.pixel_to_point(px, py, CENTER_SAMPLE[0], 800, 600);
                let zoomed = vp.zoom_at(px, py, factor, 800, 600).unwrap();
                let after = zoomed.pixel_to_point(px, py, CENTER_SAMPLE[0], 800, 600);
                assert!(
                    close(before, after, 1e-9),
                    "{:?} at {}x drifted from {} to {}",
                    (px, py),
                    factor,
                    before,
                    after
                );
                assert_eq!(zoomed.zoom(), factor);
            }
        }
    }

    #[test]
    fn zoom_rejects_nonpositive_factor() {
        let vp = Viewport::default();
        assert!(vp.zoom_at(10.0, 10.0, 0.0, 100, 100).is_err());
    }
}
