// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The Renderer ties the pieces together for one viewing session.
//! For each frame it picks a backend, works out an iteration budget
//! for that backend, renders, and keeps the newest finished frame
//! around for export.
//!
//! Once set up, a Renderer holds no fractal data between frames.  The
//! only state it carries is bookkeeping: whether the accelerator is
//! still usable, whether a scalar frame is already running, and which
//! frame is the newest.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::backend::{select_backend, Accelerator, Backend, ShaderParams};
use crate::budget::{compute_max_iterations, PerformanceTier, ACCELERATED, SCALAR};
use crate::dispatch::{
    render_frame, Framebuffer, RenderRequest, RenderSettings, DEFAULT_PARALLELISM,
};
use crate::error::{RenderError, Result};
use crate::planes::Viewport;

/// Proof that a frame was started, and when.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameTicket(u64);

/// Held for as long as a scalar frame is running.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<InFlight<'a>> {
        match flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => Some(InFlight(flag)),
            Err(_) => None,
        }
    }
}

impl<'a> Drop for InFlight<'a> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A rendering session.
pub struct Renderer {
    ceiling: usize,
    parallelism: usize,
    accelerator: Option<Box<dyn Accelerator>>,
    accelerator_lost: AtomicBool,
    in_flight: AtomicBool,
    started: AtomicU64,
    last: Mutex<Option<(FrameTicket, Arc<Framebuffer>)>>,
}

impl Renderer {
    /// A scalar-only renderer with the given per-frame ceiling and
    /// number of worker threads.  A parallelism of 0 means unknown and
    /// falls back to `DEFAULT_PARALLELISM`.
    pub fn new(tier: PerformanceTier, parallelism: usize) -> Renderer {
        let parallelism = match parallelism {
            0 => DEFAULT_PARALLELISM,
            n => n,
        };
        Renderer {
            ceiling: tier.ceiling(),
            parallelism,
            accelerator: None,
            accelerator_lost: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            started: AtomicU64::new(0),
            last: Mutex::new(None),
        }
    }

    /// A scalar-only renderer sized for this machine.
    pub fn detect() -> Renderer {
        Renderer::new(PerformanceTier::detect(None), num_cpus::get())
    }

    /// Offer an accelerator.  It's used until it first reports
    /// `CapabilityUnavailable`.
    pub fn with_accelerator(mut self, accelerator: Box<dyn Accelerator>) -> Renderer {
        self.accelerator = Some(accelerator);
        self
    }

    /// The per-frame iteration ceiling.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Number of bands on the scalar path.
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// True while an accelerator is attached and hasn't failed.
    pub fn accelerator_available(&self) -> bool {
        self.accelerator.is_some() && !self.accelerator_lost.load(Ordering::Acquire)
    }

    /// The backend a frame at this zoom would use right now.
    pub fn backend_for(&self, zoom: f64) -> Backend {
        select_backend(zoom, self.accelerator_available())
    }

    /// Mark the start of a new frame.  Any frame started earlier is
    /// now stale.
    pub fn begin_frame(&self) -> FrameTicket {
        FrameTicket(self.started.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Keep `frame` as the newest frame, unless another frame has been
    /// started since `ticket` was issued.  Returns the frame if it was
    /// kept.
    pub fn commit(&self, ticket: FrameTicket, frame: Framebuffer) -> Option<Arc<Framebuffer>> {
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let newest = FrameTicket(self.started.load(Ordering::Acquire));
        let superseded = last.as_ref().map_or(false, |(held, _)| *held >= ticket);
        if ticket != newest || superseded {
            debug!("Discarding stale frame {:?}; newest is {:?}", ticket, newest);
            return None;
        }
        let frame = Arc::new(frame);
        *last = Some((ticket, frame.clone()));
        Some(frame)
    }

    /// The newest committed frame, for export.
    pub fn last_frame(&self) -> Option<Arc<Framebuffer>> {
        let last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        last.as_ref().map(|(_, frame)| frame.clone())
    }

    /// Render one frame of `viewport` on a `width` x `height` canvas.
    ///
    /// Returns `Ok(None)` if the request was ignored because a scalar
    /// frame is still running, or if the finished frame was superseded
    /// before it could be committed.  `on_progress` only hears from
    /// the scalar path.
    pub fn render(
        &self,
        viewport: Viewport,
        width: usize,
        height: usize,
        settings: RenderSettings,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<Option<Arc<Framebuffer>>> {
        let zoom = viewport.zoom();
        if self.backend_for(zoom) == Backend::Accelerated {
            let ticket = self.begin_frame();
            let budget = compute_max_iterations(zoom, self.ceiling, ACCELERATED);
            let request = RenderRequest::new(width, height, viewport, budget, settings)?;
            match self.dispatch_accelerated(&request) {
                Ok(frame) => return Ok(self.commit(ticket, frame)),
                Err(RenderError::CapabilityUnavailable(reason)) => {
                    info!("Falling back to the scalar backend: {}", reason);
                    self.accelerator_lost.store(true, Ordering::Release);
                }
                Err(e) => return Err(e),
            }
        }

        let _guard = match InFlight::acquire(&self.in_flight) {
            Some(guard) => guard,
            None => {
                debug!("Scalar frame already in flight; ignoring request");
                return Ok(None);
            }
        };
        let ticket = self.begin_frame();
        let budget = compute_max_iterations(zoom, self.ceiling, SCALAR);
        let request = RenderRequest::new(width, height, viewport, budget, settings)?;
        let frame = render_frame(&request, self.parallelism, on_progress)?;
        Ok(self.commit(ticket, frame))
    }

    fn dispatch_accelerated(&self, request: &RenderRequest) -> Result<Framebuffer> {
        let accelerator = self.accelerator.as_ref().ok_or_else(|| {
            RenderError::CapabilityUnavailable("no accelerator attached".to_string())
        })?;
        let params = ShaderParams::from_request(request)?;
        debug!(
            "Dispatching {}x{} to the {} accelerator with {} iterations",
            params.width,
            params.height,
            accelerator.name(),
            params.max_iterations
        );
        let frame = accelerator.dispatch(&params)?;
        if frame.width() != request.width || frame.height() != request.height {
            return Err(RenderError::CapabilityUnavailable(format!(
                "accelerator returned a {}x{} frame for a {}x{} request",
                frame.width(),
                frame.height(),
                request.width,
                request.height
            )));
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HostShader;
    use num::Complex;
    use std::sync::atomic::AtomicUsize;

    struct BrokenDevice {
        calls: Arc<AtomicUsize>,
    }

    impl Accelerator for BrokenDevice {
        fn name(&self) -> &str {
            "broken"
        }

        fn dispatch(&self, _params: &ShaderParams) -> Result<Framebuffer> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RenderError::CapabilityUnavailable("no shader support".to_string()))
        }
    }

    struct Recorder {
        budgets: Arc<Mutex<Vec<u32>>>,
    }

    impl Accelerator for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn dispatch(&self, params: &ShaderParams) -> Result<Framebuffer> {
            self.budgets.lock().unwrap().push(params.max_iterations);
            HostShader.dispatch(params)
        }
    }

    fn viewport(zoom: f64) -> Viewport {
        Viewport::new(Complex::new(-0.5, 0.0), zoom).unwrap()
    }

    #[test]
    fn scalar_render_is_kept_for_export() {
        let renderer = Renderer::new(PerformanceTier::Low, 3);
        let frame = renderer
            .render(viewport(1.0), 20, 10, RenderSettings::default(), &mut |_| {})
            .unwrap()
            .unwrap();
        assert_eq!(frame.pixels().len(), 20 * 10 * 4);
        assert_eq!(renderer.last_frame(), Some(frame));
    }

    #[test]
    fn overlapping_scalar_requests_are_ignored() {
        let renderer = Renderer::new(PerformanceTier::Low, 2);
        let mut nested = None;
        let outer = renderer
            .render(viewport(1.0), 8, 30, RenderSettings::default(), &mut |_| {
                if nested.is_none() {
                    nested = Some(renderer.render(
                        viewport(2.0),
                        8,
                        30,
                        RenderSettings::default(),
                        &mut |_| {},
                    ));
                }
            })
            .unwrap();
        assert!(outer.is_some());
        assert_eq!(nested, Some(Ok(None)));
    }

    #[test]
    fn unknown_parallelism_uses_the_default() {
        assert_eq!(Renderer::new(PerformanceTier::Low, 0).parallelism(), 4);
        assert_eq!(Renderer::new(PerformanceTier::Low, 7).parallelism(), 7);
    }

    #[test]
    fn stale_frames_never_replace_newer_ones() {
        let renderer = Renderer::new(PerformanceTier::Low, 1);
        let old = renderer.begin_frame();
        let new = renderer.begin_frame();
        let old_frame = Framebuffer::from_pixels(1, 1, vec![1, 1, 1, 255]).unwrap();
        let new_frame = Framebuffer::from_pixels(1, 1, vec![2, 2, 2, 255]).unwrap();

        assert!(renderer.commit(old, old_frame.clone()).is_none());
        assert!(renderer.commit(new, new_frame.clone()).is_some());
        assert!(renderer.commit(old, old_frame).is_none());
        assert_eq!(renderer.last_frame().as_deref(), Some(&new_frame));
    }

    #[test]
    fn unusable_accelerator_falls_back_for_good() {
        let calls = Arc::new(AtomicUsize::new(0));
        let renderer = Renderer::new(PerformanceTier::Low, 2).with_accelerator(Box::new(
            BrokenDevice {
                calls: calls.clone(),
            },
        ));
        assert_eq!(renderer.backend_for(1.0), Backend::Accelerated);
        for _ in 0..3 {
            let frame = renderer
                .render(viewport(1.0), 6, 6, RenderSettings::default(), &mut |_| {})
                .unwrap();
            assert!(frame.is_some());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!renderer.accelerator_available());
        assert_eq!(renderer.backend_for(1.0), Backend::Scalar);
    }

    #[test]
    fn accelerator_gets_the_policy_budget() {
        let budgets = Arc::new(Mutex::new(vec![]));
        let renderer = Renderer::new(PerformanceTier::Ultra, 2).with_accelerator(Box::new(
            Recorder {
                budgets: budgets.clone(),
            },
        ));
        renderer
            .render(viewport(1.0), 4, 4, RenderSettings::default(), &mut |_| {})
            .unwrap();
        renderer
            .render(viewport(1e4), 4, 4, RenderSettings::default(), &mut |_| {})
            .unwrap();
        assert_eq!(*budgets.lock().unwrap(), vec![500, 2500]);
    }

    #[test]
    fn deep_zoom_bypasses_the_accelerator() {
        let budgets = Arc::new(Mutex::new(vec![]));
        let renderer = Renderer::new(PerformanceTier::Medium, 2).with_accelerator(Box::new(
            Recorder {
                budgets: budgets.clone(),
            },
        ));
        let frame = renderer
            .render(viewport(1e15), 4, 4, RenderSettings::default(), &mut |_| {})
            .unwrap();
        assert!(frame.is_some());
        assert!(budgets.lock().unwrap().is_empty());
        assert!(renderer.accelerator_available());
    }
}
