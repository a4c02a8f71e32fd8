// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The scalar renderer.  A frame's rows are cut into contiguous
//! bands, each band is rendered on its own scoped thread into a
//! buffer it owns outright, and only when every band has come back
//! are the buffers copied into a single framebuffer.  No band ever
//! writes into shared memory, so there's nothing to lock.
//!
//! Assembly is keyed by the row bounds each band reports, not by the
//! order in which bands were dispatched or finished.

use std::ops::Range;

use crossbeam::channel;
use crossbeam::thread::ScopedJoinHandle;

use crate::error::{RenderError, Result};
use crate::escape::evaluate;
use crate::palette::{shade, Palette};
use crate::planes::{sample_offsets, SampleOffset, Viewport};

/// Bands report their progress every this many rows.
pub const PROGRESS_INTERVAL: usize = 10;

/// Parallelism used when the hardware can't be probed.
pub const DEFAULT_PARALLELISM: usize = 4;

/// A contiguous, half-open range of pixel rows.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Band {
    /// First row of the band.
    pub start_row: usize,
    /// One past the last row of the band.
    pub end_row: usize,
}

impl Band {
    /// Number of rows in the band.
    pub fn len(&self) -> usize {
        self.end_row.saturating_sub(self.start_row)
    }

    /// A band with no rows does no work and is never dispatched.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The rows as a range.
    pub fn rows(&self) -> Range<usize> {
        self.start_row..self.end_row
    }
}

/// Cut `rows` into at most `parallelism` contiguous bands of
/// `ceil(rows / parallelism)` rows each.  The last band may be short;
/// bands that would be empty are left out.  Together the bands cover
/// `rows` exactly, with no overlap.
pub fn partition(rows: Range<usize>, parallelism: usize) -> Vec<Band> {
    let total = rows.end.saturating_sub(rows.start);
    let parallelism = parallelism.max(1);
    let band_size = (total + parallelism - 1) / parallelism;
    (0..parallelism)
        .map(|i| Band {
            start_row: (rows.start + i * band_size).min(rows.end),
            end_row: (rows.start + (i + 1) * band_size).min(rows.end),
        })
        .filter(|band| !band.is_empty())
        .collect()
}

/// The presentation knobs that travel with every request.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderSettings {
    /// Gradient used for exterior points.
    pub palette: Palette,
    /// Use the fractional escape count.
    pub smoothing: bool,
    /// Take four sub-pixel samples per pixel and average them.
    pub antialiasing: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            palette: Palette::default(),
            smoothing: true,
            antialiasing: false,
        }
    }
}

/// One unit of work.  A frame-level request spans every row; the
/// per-band requests handed to workers are copies narrowed with
/// `for_band`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderRequest {
    /// Canvas width in pixels.
    pub width: usize,
    /// Canvas height in pixels.
    pub height: usize,
    /// Where we're looking.
    pub viewport: Viewport,
    /// Iteration budget per sample.
    pub max_iterations: usize,
    /// Gradient used for exterior points.
    pub palette: Palette,
    /// Use the fractional escape count.
    pub smoothing: bool,
    /// Average four sub-pixel samples per pixel.
    pub antialiasing: bool,
    /// First row this request covers.
    pub band_start: usize,
    /// One past the last row this request covers.
    pub band_end: usize,
}

impl RenderRequest {
    /// A request covering the whole canvas.
    pub fn new(
        width: usize,
        height: usize,
        viewport: Viewport,
        max_iterations: usize,
        settings: RenderSettings,
    ) -> Result<RenderRequest> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        Ok(RenderRequest {
            width,
            height,
            viewport,
            max_iterations,
            palette: settings.palette,
            smoothing: settings.smoothing,
            antialiasing: settings.antialiasing,
            band_start: 0,
            band_end: height,
        })
    }

    /// The same request, narrowed to a band of rows.
    pub fn for_band(&self, band: Band) -> RenderRequest {
        RenderRequest {
            band_start: band.start_row,
            band_end: band.end_row,
            ..*self
        }
    }

    /// The rows this request covers.
    pub fn band(&self) -> Band {
        Band {
            start_row: self.band_start,
            end_row: self.band_end,
        }
    }

    /// The presentation knobs of this request.
    pub fn settings(&self) -> RenderSettings {
        RenderSettings {
            palette: self.palette,
            smoothing: self.smoothing,
            antialiasing: self.antialiasing,
        }
    }
}

/// A finished band: its pixels and the rows they belong to.
#[derive(Clone, Debug, PartialEq)]
pub struct BandResult {
    /// First row of the band.
    pub start_row: usize,
    /// One past the last row of the band.
    pub end_row: usize,
    /// RGBA8, row-major, `(end_row - start_row) * width * 4` bytes.
    pub pixels: Vec<u8>,
}

/// A finished frame.  RGBA8, row-major, no padding between rows.
#[derive(Clone, Debug, PartialEq)]
pub struct Framebuffer {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Framebuffer {
    /// Wrap a pixel buffer.  Fails if the buffer isn't exactly
    /// `width * height * 4` bytes.
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<u8>) -> Result<Framebuffer> {
        if width == 0 || height == 0 || pixels.len() != width * height * 4 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        Ok(Framebuffer {
            width,
            height,
            pixels,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The raw RGBA8 bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Give up the raw RGBA8 bytes.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// The color at (x, y).
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y * self.width + x) * 4;
        let p = &self.pixels[offset..offset + 4];
        Some([p[0], p[1], p[2], p[3]])
    }
}

/// Map, evaluate, and color one pixel, averaging over every sample
/// offset given.
pub fn shade_pixel(
    request: &RenderRequest,
    col: usize,
    row: usize,
    offsets: &[SampleOffset],
) -> [u8; 3] {
    let mut sum = [0u32; 3];
    for &offset in offsets {
        let c = request.viewport.pixel_to_point(
            col as f64,
            row as f64,
            offset,
            request.width,
            request.height,
        );
        let result = evaluate(c, request.max_iterations, request.smoothing);
        let rgb = shade(&result, request.max_iterations, request.palette);
        for (total, &channel) in sum.iter_mut().zip(rgb.iter()) {
            *total += u32::from(channel);
        }
    }
    let n = offsets.len().max(1) as u32;
    [(sum[0] / n) as u8, (sum[1] / n) as u8, (sum[2] / n) as u8]
}

/// Render every pixel of the request's band.  `report` is told how
/// many rows are done every `PROGRESS_INTERVAL` rows and once more at
/// the end.
pub fn render_band(request: &RenderRequest, report: &mut dyn FnMut(usize)) -> BandResult {
    let band = request.band();
    let offsets = sample_offsets(request.antialiasing);
    let mut pixels = Vec::with_capacity(band.len() * request.width * 4);
    for (done, row) in band.rows().enumerate() {
        for col in 0..request.width {
            let [r, g, b] = shade_pixel(request, col, row, offsets);
            pixels.extend_from_slice(&[r, g, b, 255]);
        }
        if (done + 1) % PROGRESS_INTERVAL == 0 {
            report(done + 1);
        }
    }
    report(band.len());
    BandResult {
        start_row: band.start_row,
        end_row: band.end_row,
        pixels,
    }
}

/// Copy finished bands into a framebuffer, each at the rows it says
/// it covers.  The order of `results` doesn't matter.  Fails if a band
/// is the wrong size, lands outside the frame, overlaps another band,
/// or if any row is left uncovered.
pub fn assemble(width: usize, height: usize, results: Vec<BandResult>) -> Result<Framebuffer> {
    let row_bytes = width * 4;
    let mut pixels = vec![0u8; row_bytes * height];
    let mut written = vec![false; height];
    for result in results {
        let failure = RenderError::BandFailure {
            start_row: result.start_row,
            end_row: result.end_row,
        };
        if result.start_row > result.end_row
            || result.end_row > height
            || result.pixels.len() != (result.end_row - result.start_row) * row_bytes
        {
            return Err(failure);
        }
        let rows = &mut written[result.start_row..result.end_row];
        if rows.iter().any(|&w| w) {
            return Err(failure);
        }
        for w in rows.iter_mut() {
            *w = true;
        }
        pixels[result.start_row * row_bytes..result.end_row * row_bytes]
            .copy_from_slice(&result.pixels);
    }
    if let Some(row) = written.iter().position(|&w| !w) {
        return Err(RenderError::BandFailure {
            start_row: row,
            end_row: row + 1,
        });
    }
    Framebuffer::from_pixels(width, height, pixels)
}

/// Render a whole frame on `parallelism` threads with the standard
/// pixel pipeline.  `on_progress` receives the fraction of rows done
/// across all bands, on the calling thread.
pub fn render_frame(
    request: &RenderRequest,
    parallelism: usize,
    on_progress: &mut dyn FnMut(f64),
) -> Result<Framebuffer> {
    render_frame_with(
        request,
        parallelism,
        |band, report| Ok(render_band(band, report)),
        on_progress,
    )
}

/// Scatter one task per band onto scoped threads, gather progress
/// over a channel while they run, then join every band and assemble.
/// A band that errors or panics fails the whole frame.
pub fn render_frame_with<F>(
    request: &RenderRequest,
    parallelism: usize,
    render: F,
    on_progress: &mut dyn FnMut(f64),
) -> Result<Framebuffer>
where
    F: Fn(&RenderRequest, &mut dyn FnMut(usize)) -> Result<BandResult> + Sync,
{
    let frame = Band {
        start_row: 0,
        end_row: request.height,
    };
    let bands = partition(frame.rows(), parallelism);
    debug!(
        "Rendering {}x{} at zoom {} with {} iterations in {} bands",
        request.width,
        request.height,
        request.viewport.zoom(),
        request.max_iterations,
        bands.len()
    );

    let (sender, receiver) = channel::unbounded::<(usize, usize)>();
    let render = &render;
    let gathered = crossbeam::scope(|spawner| {
        let handles: Vec<ScopedJoinHandle<Result<BandResult>>> = bands
            .iter()
            .enumerate()
            .map(|(index, band)| {
                let sender = sender.clone();
                let sub = request.for_band(*band);
                spawner.spawn(move |_| {
                    let mut report = |rows: usize| {
                        let _ = sender.send((index, rows));
                    };
                    render(&sub, &mut report)
                })
            })
            .collect();
        drop(sender);

        let mut done = vec![0usize; bands.len()];
        for (index, rows) in receiver.iter() {
            done[index] = done[index].max(rows.min(bands[index].len()));
            let total: usize = done.iter().sum();
            on_progress(total as f64 / frame.len() as f64);
        }

        handles
            .into_iter()
            .zip(bands.iter())
            .map(|(handle, band)| match handle.join() {
                Ok(result) => result,
                Err(_) => Err(RenderError::BandFailure {
                    start_row: band.start_row,
                    end_row: band.end_row,
                }),
            })
            .collect::<Vec<Result<BandResult>>>()
    })
    .map_err(|_| RenderError::BandFailure {
        start_row: frame.start_row,
        end_row: frame.end_row,
    })?;

    let mut results = Vec::with_capacity(gathered.len());
    for result in gathered {
        match result {
            Ok(band) => results.push(band),
            Err(e) => {
                warn!("Discarding frame: {}", e);
                return Err(e);
            }
        }
    }
    assemble(request.width, request.height, results)
}
