#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mandelbrot explorer core
//!
//! The Mandelbrot set is the set of points on the complex plane which,
//! when repeatedly squared and added back to themselves, never head
//! off to infinity.  Points outside the set are colored by how quickly
//! they leave; points inside are black.
//!
//! This crate is the engine behind a pan-and-zoom explorer.  Given a
//! viewport (a center and a zoom) and a canvas size it decides how
//! many iterations the frame deserves, picks an executor for the
//! frame, and produces an RGBA framebuffer.  The scalar executor cuts
//! the frame into bands of rows and renders each band on its own
//! thread; the accelerated executor evaluates every pixel in a single
//! dispatch.  Both run the same per-pixel program and produce the
//! same bytes.

extern crate bytemuck;
extern crate crossbeam;
extern crate failure;
extern crate itertools;
#[macro_use]
extern crate log;
extern crate num;
extern crate num_cpus;

pub mod backend;
pub mod budget;
pub mod dispatch;
pub mod error;
pub mod escape;
pub mod palette;
pub mod planes;
pub mod renderer;

pub use backend::{select_backend, Accelerator, Backend, HostShader, ShaderParams};
pub use budget::{compute_max_iterations, PerformanceTier};
pub use dispatch::{render_frame, Framebuffer, RenderRequest, RenderSettings};
pub use error::RenderError;
pub use escape::{evaluate, EscapeResult};
pub use palette::{colorize, Palette};
pub use planes::{map_pixel_to_complex, Viewport};
pub use renderer::Renderer;
