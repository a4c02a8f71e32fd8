// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Backend selection, and the contract for the accelerated path.
//!
//! The accelerated path evaluates every pixel in one parallel
//! dispatch.  It must produce exactly what the scalar path produces
//! for the same request; all it receives from us is a small uniform
//! block, `ShaderParams`, marshaled to bytes.  The device side lives
//! outside this crate behind the `Accelerator` trait.  `HostShader` is
//! the reference executor: it runs the same per-pixel program on the
//! host, one invocation per pixel, from the marshaled bytes.

use std::convert::TryFrom;

use bytemuck::{Pod, Zeroable};
use itertools::iproduct;

use crate::dispatch::{shade_pixel, Framebuffer, RenderRequest, RenderSettings};
use crate::error::{RenderError, Result};
use crate::palette::Palette;
use crate::planes::{sample_offsets, Viewport};

/// Zoom past which `f64` can no longer tell neighbouring pixels
/// apart.  Beyond it we stay on the scalar path and accept the
/// artifacts.
pub const PRECISION_CEILING: f64 = 1e14;

/// Which executor renders a frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    /// One massively parallel dispatch on the accelerator.
    Accelerated,
    /// Bands on CPU threads.
    Scalar,
}

/// Choose the executor for one frame.  Called for every frame; the
/// answer changes as the zoom crosses the precision ceiling.
pub fn select_backend(zoom: f64, accelerated_available: bool) -> Backend {
    if accelerated_available && zoom < PRECISION_CEILING {
        Backend::Accelerated
    } else {
        Backend::Scalar
    }
}

/// `flags` bit: use the fractional escape count.
pub const FLAG_SMOOTHING: u32 = 1;
/// `flags` bit: average four sub-pixel samples.
pub const FLAG_ANTIALIASING: u32 = 1 << 1;

/// The uniform block handed to the fragment program.  The layout is
/// fixed: three `f64`s followed by six `u32`s, 48 bytes, no padding.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ShaderParams {
    /// Real part of the viewport center.
    pub center_re: f64,
    /// Imaginary part of the viewport center.
    pub center_im: f64,
    /// Viewport zoom.
    pub zoom: f64,
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Iteration budget for every sample.
    pub max_iterations: u32,
    /// `Palette::index` of the gradient.
    pub palette: u32,
    /// `FLAG_SMOOTHING` and `FLAG_ANTIALIASING`.
    pub flags: u32,
    /// Keeps the block a multiple of eight bytes.
    pub _pad: u32,
}

fn to_u32(value: usize, request: &RenderRequest) -> Result<u32> {
    u32::try_from(value).map_err(|_| RenderError::InvalidDimensions {
        width: request.width,
        height: request.height,
    })
}

impl ShaderParams {
    /// Pack a frame-level request.  The iteration budget is whatever
    /// the policy chose for this frame; the program has no ceiling of
    /// its own.
    pub fn from_request(request: &RenderRequest) -> Result<ShaderParams> {
        let mut flags = 0;
        if request.smoothing {
            flags |= FLAG_SMOOTHING;
        }
        if request.antialiasing {
            flags |= FLAG_ANTIALIASING;
        }
        Ok(ShaderParams {
            center_re: request.viewport.center.re,
            center_im: request.viewport.center.im,
            zoom: request.viewport.zoom(),
            width: to_u32(request.width, request)?,
            height: to_u32(request.height, request)?,
            max_iterations: to_u32(request.max_iterations, request)?,
            palette: request.palette.index(),
            flags,
            _pad: 0,
        })
    }

    /// The bytes uploaded to the device.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Read a block back from bytes of any alignment.
    pub fn from_bytes(bytes: &[u8]) -> Result<ShaderParams> {
        bytemuck::try_pod_read_unaligned(bytes).map_err(|e| {
            RenderError::CapabilityUnavailable(format!("malformed uniform block: {:?}", e))
        })
    }

    /// Rebuild the request the block was packed from.
    pub fn to_request(&self) -> Result<RenderRequest> {
        let center = num::Complex::new(self.center_re, self.center_im);
        let viewport = Viewport::new(center, self.zoom)?;
        let palette = Palette::from_index(self.palette).ok_or_else(|| {
            RenderError::CapabilityUnavailable(format!("unknown palette id {}", self.palette))
        })?;
        let settings = RenderSettings {
            palette,
            smoothing: self.flags & FLAG_SMOOTHING != 0,
            antialiasing: self.flags & FLAG_ANTIALIASING != 0,
        };
        RenderRequest::new(
            self.width as usize,
            self.height as usize,
            viewport,
            self.max_iterations as usize,
            settings,
        )
    }
}

/// An executor for the accelerated path.  One call renders one whole
/// frame; there is no partial result.
pub trait Accelerator: Send + Sync {
    /// A short name for logs.
    fn name(&self) -> &str;

    /// Render the frame described by `params`.  Returns
    /// `CapabilityUnavailable` if the device can't do it.
    fn dispatch(&self, params: &ShaderParams) -> Result<Framebuffer>;
}

/// Runs the fragment program on the host.
#[derive(Copy, Clone, Debug, Default)]
pub struct HostShader;

impl Accelerator for HostShader {
    fn name(&self) -> &str {
        "host"
    }

    fn dispatch(&self, params: &ShaderParams) -> Result<Framebuffer> {
        let uniforms = ShaderParams::from_bytes(params.as_bytes())?;
        let request = uniforms.to_request()?;
        let offsets = sample_offsets(request.antialiasing);
        let pixels: Vec<u8> = iproduct!(0..request.height, 0..request.width)
            .flat_map(|(row, col)| {
                let [r, g, b] = shade_pixel(&request, col, row, offsets);
                vec![r, g, b, 255]
            })
            .collect();
        Framebuffer::from_pixels(request.width, request.height, pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::render_frame;
    use num::Complex;

    fn request(settings: RenderSettings) -> RenderRequest {
        let viewport = Viewport::new(Complex::new(-0.7435, 0.1314), 250.0).unwrap();
        RenderRequest::new(37, 23, viewport, 300, settings).unwrap()
    }

    #[test]
    fn accelerated_only_below_the_precision_ceiling() {
        assert_eq!(select_backend(1.0, true), Backend::Accelerated);
        assert_eq!(select_backend(9.9e13, true), Backend::Accelerated);
        assert_eq!(select_backend(1e14, true), Backend::Scalar);
        assert_eq!(select_backend(1e20, true), Backend::Scalar);
        assert_eq!(select_backend(1.0, false), Backend::Scalar);
    }

    #[test]
    fn uniform_block_is_48_bytes() {
        let params = ShaderParams::from_request(&request(RenderSettings::default())).unwrap();
        assert_eq!(params.as_bytes().len(), 48);
        assert_eq!(std::mem::size_of::<ShaderParams>(), 48);
    }

    #[test]
    fn uniform_block_survives_unaligned_bytes() {
        let settings = RenderSettings {
            palette: Palette::Fire,
            smoothing: false,
            antialiasing: true,
        };
        let req = request(settings);
        let params = ShaderParams::from_request(&req).unwrap();
        let mut shifted = vec![0u8];
        shifted.extend_from_slice(params.as_bytes());
        let read = ShaderParams::from_bytes(&shifted[1..]).unwrap();
        assert_eq!(read, params);
        assert_eq!(read.to_request().unwrap(), req);
        assert!(ShaderParams::from_bytes(&shifted[..10]).is_err());
    }

    #[test]
    fn unknown_palette_is_rejected() {
        let mut params = ShaderParams::from_request(&request(RenderSettings::default())).unwrap();
        params.palette = 99;
        assert!(params.to_request().is_err());
    }

    #[test]
    fn host_shader_matches_the_scalar_path() {
        for &palette in Palette::ALL.iter() {
            for &antialiasing in [false, true].iter() {
                let req = request(RenderSettings {
                    palette,
                    smoothing: true,
                    antialiasing,
                });
                let params = ShaderParams::from_request(&req).unwrap();
                let accelerated = HostShader.dispatch(&params).unwrap();
                let scalar = render_frame(&req, 3, &mut |_| {}).unwrap();
                assert_eq!(accelerated, scalar, "{} diverged", palette);
            }
        }
    }
}
