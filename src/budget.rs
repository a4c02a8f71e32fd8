// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The iteration-budget policy.  Deeper zooms need more iterations to
//! resolve the boundary, but the machine we're running on puts a
//! ceiling on how many we can afford per frame.

/// The base, step, and floor of the budget curve for one backend.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Regime {
    /// Budget before any zoom is applied.
    pub base: f64,
    /// Added per decade of zoom.
    pub step: f64,
    /// Never go below this, unless the ceiling is lower.
    pub lower_bound: usize,
}

/// The curve used on the accelerated (shader) path.
pub const ACCELERATED: Regime = Regime {
    base: 500.0,
    step: 500.0,
    lower_bound: 500,
};

/// The curve used on the scalar (software) path.
pub const SCALAR: Regime = Regime {
    base: 1000.0,
    step: 1000.0,
    lower_bound: 1000,
};

/// Coarse classes of machine, each with the largest iteration budget
/// we're willing to spend per frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PerformanceTier {
    /// Two cores or a few gigabytes.
    Low,
    /// A typical laptop.
    Medium,
    /// A workstation.
    High,
    /// Lots of everything.
    Ultra,
}

/// Memory assumed when the probe can't tell us, in GiB.
pub const DEFAULT_MEMORY_GIB: f64 = 4.0;

impl PerformanceTier {
    /// The largest iteration budget for this tier.
    pub fn ceiling(self) -> usize {
        match self {
            PerformanceTier::Low => 1000,
            PerformanceTier::Medium => 2000,
            PerformanceTier::High => 4000,
            PerformanceTier::Ultra => 8000,
        }
    }

    /// The tier whose ceiling is exactly `ceiling`, if any.
    pub fn from_ceiling(ceiling: usize) -> Option<PerformanceTier> {
        match ceiling {
            1000 => Some(PerformanceTier::Low),
            2000 => Some(PerformanceTier::Medium),
            4000 => Some(PerformanceTier::High),
            8000 => Some(PerformanceTier::Ultra),
            _ => None,
        }
    }

    /// Classify a machine by its hardware threads and memory.
    pub fn from_capabilities(parallelism: usize, memory_gib: f64) -> PerformanceTier {
        if parallelism >= 16 && memory_gib >= 16.0 {
            PerformanceTier::Ultra
        } else if parallelism >= 8 && memory_gib >= 8.0 {
            PerformanceTier::High
        } else if parallelism >= 4 && memory_gib >= 4.0 {
            PerformanceTier::Medium
        } else {
            PerformanceTier::Low
        }
    }

    /// Probe the running machine.  There's no portable way to ask for
    /// installed memory, so the caller supplies it if it knows.  With
    /// `None` the probe assumes 4 GiB, which caps the answer at
    /// `Medium`; `High` and `Ultra` need a real memory figure or an
    /// explicit tier.
    pub fn detect(memory_gib: Option<f64>) -> PerformanceTier {
        let tier = PerformanceTier::from_capabilities(
            num_cpus::get(),
            memory_gib.unwrap_or(DEFAULT_MEMORY_GIB),
        );
        debug!("Detected performance tier {:?}", tier);
        tier
    }
}

/// Given the current zoom and the per-frame ceiling, return the
/// number of iterations to spend on each sample.  Each decade of zoom
/// past 1.0 adds one step; views at or below zoom 1.0 get the base.
pub fn compute_max_iterations(zoom: f64, ceiling: usize, regime: Regime) -> usize {
    let zoom_factor = zoom.log10().max(0.0);
    let wanted = (regime.base + zoom_factor * regime.step).floor();
    let wanted = if wanted.is_finite() {
        wanted as usize
    } else {
        ceiling
    };
    wanted.max(regime.lower_bound).min(ceiling)
}
