// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The escape-time evaluator.  Takes a point on the complex plane and
//! repeatedly squares it and adds the original point, measuring how
//! quickly the result heads off to infinity.  Points that never leave
//! within the iteration budget are treated as members of the set.
//!
//! All arithmetic is native `f64`.  Past a zoom of roughly 1e14 the
//! spacing between adjacent pixels falls below the precision of the
//! center coordinate and the picture degrades into blocks and bands.
//! That is accepted, not reported.

use num::Complex;

/// |z|² past which a point is considered escaped.  The radius is 256,
/// not the conventional 2, so that the logarithmic correction in the
/// smooth iteration count has settled by the time we stop.
pub const ESCAPE_RADIUS_SQ: f64 = 256.0;

const D4: f64 = 1.0 / 4.0;
const D16: f64 = D4 / 4.0;

/// What we learned about a single sample.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EscapeResult {
    /// True if the orbit left the escape radius within the budget.
    pub escaped: bool,
    /// The escape time, counted as the number of iterations completed
    /// before the one that escaped, or the full budget for interior
    /// points.
    pub iterations: usize,
    /// Fractional escape time when smoothing, otherwise `iterations`.
    pub smooth_iterations: f64,
    /// The last value of z computed.
    pub final_z: Complex<f64>,
    /// How many times the loop body actually ran.  Zero for points
    /// caught by the cardioid or bulb tests.
    pub steps: usize,
}

impl EscapeResult {
    fn interior(max_iterations: usize, final_z: Complex<f64>, steps: usize) -> Self {
        EscapeResult {
            escaped: false,
            iterations: max_iterations,
            smooth_iterations: max_iterations as f64,
            final_z,
            steps,
        }
    }

    /// The escape value scaled into [0, 1] by the budget, ready for
    /// the palette.  Interior points come out as 1.0.
    pub fn normalized(&self, max_iterations: usize) -> f64 {
        if max_iterations == 0 {
            return 1.0;
        }
        num::clamp(self.smooth_iterations / max_iterations as f64, 0.0, 1.0)
    }
}

/// True if the point lies inside the main cardioid.
#[inline]
pub fn in_cardioid(c: &Complex<f64>) -> bool {
    let y = c.im * c.im;
    let q = (c.re - D4) * (c.re - D4) + y;
    q * (q + (c.re - D4)) <= D4 * y
}

/// True if the point lies inside the period-2 bulb centered on -1.
#[inline]
pub fn in_period2_bulb(c: &Complex<f64>) -> bool {
    (c.re + 1.0) * (c.re + 1.0) + c.im * c.im <= D16
}

/// Evaluate a single point against an iteration budget.  The loop is
/// bounded by `max_iterations`, so this always returns.
pub fn evaluate(c: Complex<f64>, max_iterations: usize, smoothing: bool) -> EscapeResult {
    let zero = Complex::new(0.0, 0.0);
    if in_cardioid(&c) || in_period2_bulb(&c) {
        return EscapeResult::interior(max_iterations, zero, 0);
    }

    let mut z = zero;
    for i in 0..max_iterations {
        z = z * z + c;
        if z.norm_sqr() > ESCAPE_RADIUS_SQ {
            let smooth_iterations = if smoothing {
                smooth(i, &z)
            } else {
                i as f64
            };
            return EscapeResult {
                escaped: true,
                iterations: i,
                smooth_iterations,
                final_z: z,
                steps: i + 1,
            };
        }
    }
    EscapeResult::interior(max_iterations, z, max_iterations)
}

/// μ = n + 1 - log₂(ln|z|).  Only meaningful once |z| is well past 1,
/// which the escape radius guarantees.
fn smooth(iterations: usize, z: &Complex<f64>) -> f64 {
    let modulus = z.norm();
    let nu = modulus.ln().ln() / std::f64::consts::LN_2;
    iterations as f64 + 1.0 - nu
}
