// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The color mapper.  Each palette is a pure function from a
//! normalized escape value in [0, 1] to an RGB triple.  Members of the
//! set never reach a palette; they are always black.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use num::clamp;

use crate::escape::EscapeResult;

/// Pure black, for points inside the set.
pub const INTERIOR: [u8; 3] = [0, 0, 0];

/// The gradient functions available for exterior points.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Palette {
    /// Three phase-shifted cosine waves.
    Classic,
    /// Black through red and yellow, repeating three times.
    Fire,
    /// A linear ramp from deep to light blue-green.
    Ocean,
    /// Fast cosine waves a third of a cycle apart.
    Psychedelic,
    /// Grayscale.
    Monochrome,
    /// Four octaves of cosine, normalized.
    UltraSmooth,
}

impl Default for Palette {
    fn default() -> Self {
        Palette::Classic
    }
}

impl Palette {
    /// Every palette, in index order.
    pub const ALL: [Palette; 6] = [
        Palette::Classic,
        Palette::Fire,
        Palette::Ocean,
        Palette::Psychedelic,
        Palette::Monochrome,
        Palette::UltraSmooth,
    ];

    /// The name accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Palette::Classic => "classic",
            Palette::Fire => "fire",
            Palette::Ocean => "ocean",
            Palette::Psychedelic => "psychedelic",
            Palette::Monochrome => "monochrome",
            Palette::UltraSmooth => "ultra-smooth",
        }
    }

    /// A stable numeric id, used when the palette has to cross into
    /// a uniform block.
    pub fn index(self) -> u32 {
        match self {
            Palette::Classic => 0,
            Palette::Fire => 1,
            Palette::Ocean => 2,
            Palette::Psychedelic => 3,
            Palette::Monochrome => 4,
            Palette::UltraSmooth => 5,
        }
    }

    /// Inverse of `index`.
    pub fn from_index(index: u32) -> Option<Palette> {
        Palette::ALL.get(index as usize).cloned()
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Palette {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Palette::ALL
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .cloned()
            .ok_or_else(|| format!("Unknown palette '{}'", s))
    }
}

#[inline]
fn wave(t: f64, phase: f64) -> f64 {
    0.5 + 0.5 * (2.0 * PI * (t + phase)).cos()
}

fn classic(t: f64) -> (f64, f64, f64) {
    (wave(t, 0.0), wave(t, 0.1), wave(t, 0.2))
}

fn fire(t: f64) -> (f64, f64, f64) {
    let t = (3.0 * t) % 1.0;
    let s = 3.0 * t;
    if t < 1.0 / 3.0 {
        (s, 0.0, 0.0)
    } else if t < 2.0 / 3.0 {
        (1.0, s - 1.0, 0.0)
    } else {
        (1.0, 1.0, (s - 2.0) * 0.5)
    }
}

fn ocean(t: f64) -> (f64, f64, f64) {
    (0.0, 0.07 + 0.43 * t, 0.15 + 0.65 * t)
}

fn psychedelic(t: f64) -> (f64, f64, f64) {
    let t = 3.0 * t;
    (wave(t, 0.0), wave(t, 1.0 / 3.0), wave(t, 2.0 / 3.0))
}

fn ultra_smooth(t: f64) -> (f64, f64, f64) {
    let (mut r, mut g, mut b) = (0.0, 0.0, 0.0);
    let mut frequency = 1.0;
    let mut amplitude = 1.0;
    for octave in 0..4 {
        let phase = 0.1 * f64::from(octave);
        r += amplitude * wave(frequency * t, phase);
        g += amplitude * wave(frequency * t, phase);
        b += amplitude * wave(frequency * 1.5 * t, phase);
        frequency *= 2.0;
        amplitude *= 0.5;
    }
    (r / 1.875, g / 1.875, b / 1.875)
}

#[inline]
fn channel(v: f64) -> u8 {
    (clamp(v, 0.0, 1.0) * 255.0) as u8
}

/// Map a normalized escape value onto a palette.  Values outside
/// [0, 1] are clamped first.
pub fn colorize(t: f64, palette: Palette) -> [u8; 3] {
    let t = if t.is_nan() { 0.0 } else { clamp(t, 0.0, 1.0) };
    let (r, g, b) = match palette {
        Palette::Classic => classic(t),
        Palette::Fire => fire(t),
        Palette::Ocean => ocean(t),
        Palette::Psychedelic => psychedelic(t),
        Palette::Monochrome => (t, t, t),
        Palette::UltraSmooth => ultra_smooth(t),
    };
    [channel(r), channel(g), channel(b)]
}

/// Color a single evaluated sample: black for members of the set,
/// the palette for everything else.
pub fn shade(result: &EscapeResult, max_iterations: usize, palette: Palette) -> [u8; 3] {
    if !result.escaped {
        return INTERIOR;
    }
    colorize(result.normalized(max_iterations), palette)
}
