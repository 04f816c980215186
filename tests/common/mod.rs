//! Shared helpers for the integration tests.
//!
//! [`SimImage`] stands in for a depth-stencil image on the GPU. It keeps the physical layout and
//! the texel values of each aspect, applies the barriers the tracker asks for, and records an
//! error for every access made in a layout that does not allow it, much like the validation
//! layer would. A barrier whose old layout is `UNDEFINED` turns the contents into garbage, so a
//! transition that drops contents it should have kept shows up as a wrong texel later on.
#![allow(dead_code)]

use scoria::{
    DepthStencilTracker, ImageInfo, ResourceId, TrackerConfig,
    ash::vk::{self, Handle},
    aspect::{Aspect, AspectPair, AspectState, combined_layout},
    d3d12::{ClearFlags, DepthStencilDesc, DsvFlags, DxgiFormat, ResourceStates},
    engine::DrawIntent,
    transition::TransitionRequest,
};

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

pub fn rect(left: i32, top: i32, right: i32, bottom: i32) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: left, y: top },
        extent: vk::Extent2D {
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        },
    }
}

fn writable(layout: vk::ImageLayout, aspect: Aspect) -> bool {
    use vk::ImageLayout as L;
    match aspect {
        Aspect::Depth => matches!(
            layout,
            L::DEPTH_ATTACHMENT_OPTIMAL
                | L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
                | L::DEPTH_ATTACHMENT_STENCIL_READ_ONLY_OPTIMAL
        ),
        Aspect::Stencil => matches!(
            layout,
            L::STENCIL_ATTACHMENT_OPTIMAL
                | L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
                | L::DEPTH_READ_ONLY_STENCIL_ATTACHMENT_OPTIMAL
        ),
    }
}

fn readable(layout: vk::ImageLayout, aspect: Aspect) -> bool {
    use vk::ImageLayout as L;
    writable(layout, aspect)
        || match aspect {
            Aspect::Depth => matches!(
                layout,
                L::DEPTH_READ_ONLY_OPTIMAL
                    | L::DEPTH_STENCIL_READ_ONLY_OPTIMAL
                    | L::DEPTH_READ_ONLY_STENCIL_ATTACHMENT_OPTIMAL
            ),
            Aspect::Stencil => matches!(
                layout,
                L::STENCIL_READ_ONLY_OPTIMAL
                    | L::DEPTH_STENCIL_READ_ONLY_OPTIMAL
                    | L::DEPTH_ATTACHMENT_STENCIL_READ_ONLY_OPTIMAL
            ),
        }
}

pub struct SimImage {
    extent: vk::Extent2D,
    present: AspectPair<bool>,
    separate: bool,
    layouts: AspectPair<vk::ImageLayout>,
    depth: Vec<Option<f32>>,
    stencil: Vec<Option<u8>>,
    in_pass: bool,
    pub errors: Vec<String>,
}

impl SimImage {
    pub fn new(extent: vk::Extent2D, present: AspectPair<bool>, separate: bool) -> Self {
        let texels = (extent.width * extent.height) as usize;
        Self {
            extent,
            present,
            separate,
            layouts: AspectPair::splat(vk::ImageLayout::UNDEFINED),
            depth: vec![None; texels],
            stencil: vec![None; texels],
            in_pass: false,
            errors: Vec::new(),
        }
    }

    pub fn layout(&self, aspect: Aspect) -> vk::ImageLayout {
        self.layouts[aspect]
    }

    pub fn set_in_pass(&mut self, in_pass: bool) {
        self.in_pass = in_pass;
    }

    fn texels(&self, rect: Option<vk::Rect2D>) -> Vec<usize> {
        let rect = rect.unwrap_or(vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent: self.extent,
        });
        let x0 = rect.offset.x.max(0) as u32;
        let y0 = rect.offset.y.max(0) as u32;
        let x1 = (rect.offset.x.max(0) as u32 + rect.extent.width).min(self.extent.width);
        let y1 = (rect.offset.y.max(0) as u32 + rect.extent.height).min(self.extent.height);
        (y0..y1)
            .flat_map(|y| (x0..x1).map(move |x| (y, x)))
            .map(|(y, x)| (y * self.extent.width + x) as usize)
            .collect()
    }

    fn garbage(&mut self, aspect: Aspect) {
        match aspect {
            Aspect::Depth => self.depth.fill(None),
            Aspect::Stencil => self.stencil.fill(None),
        }
    }

    /// Records the barriers of `request`, ending the render pass first if asked to.
    pub fn record(&mut self, request: &TransitionRequest) {
        if request.ends_batch {
            self.in_pass = false;
        }
        for barrier in request.image_barriers() {
            self.barrier(&barrier);
        }
    }

    pub fn barrier(&mut self, barrier: &vk::ImageMemoryBarrier2) {
        if self.in_pass {
            self.errors
                .push("pipeline barrier recorded inside a render pass".to_string());
        }
        if barrier.new_layout == vk::ImageLayout::UNDEFINED {
            self.errors
                .push("image transitioned into UNDEFINED".to_string());
        }
        let mask = barrier.subresource_range.aspect_mask;
        let mut full = vk::ImageAspectFlags::empty();
        for aspect in Aspect::ALL {
            if self.present[aspect] {
                full |= aspect.flag();
            }
        }
        if !self.separate && mask != full {
            self.errors.push(format!(
                "aspect mask {mask:?} does not cover {full:?} without separate layouts"
            ));
        }
        for aspect in Aspect::ALL {
            if !self.present[aspect] || !mask.contains(aspect.flag()) {
                continue;
            }
            if barrier.old_layout == vk::ImageLayout::UNDEFINED {
                self.garbage(aspect);
            } else if barrier.old_layout != self.layouts[aspect] {
                self.errors.push(format!(
                    "{aspect} barrier expects {:?} but the image is in {:?}",
                    barrier.old_layout, self.layouts[aspect]
                ));
            }
            self.layouts[aspect] = barrier.new_layout;
        }
    }

    fn check(&mut self, aspect: Aspect, write: bool, what: &str) {
        let layout = self.layouts[aspect];
        let ok = if write {
            writable(layout, aspect)
        } else {
            readable(layout, aspect)
        };
        if !ok {
            self.errors.push(format!(
                "{what} {} {aspect} in {layout:?}",
                if write { "writes" } else { "reads" }
            ));
        }
    }

    pub fn draw(&mut self, intent: DrawIntent, rect: vk::Rect2D, z: f32, stencil_ref: u8) {
        self.in_pass = true;
        let texels = self.texels(Some(rect));
        for aspect in Aspect::ALL {
            if intent.reads()[aspect] {
                self.check(aspect, false, "draw");
            }
        }
        if intent.depth_write {
            self.check(Aspect::Depth, true, "draw");
            for &i in &texels {
                self.depth[i] = Some(z);
            }
        }
        if intent.stencil_write {
            self.check(Aspect::Stencil, true, "draw");
            for &i in &texels {
                self.stencil[i] = Some(stencil_ref);
            }
        }
    }

    pub fn clear(&mut self, depth: Option<f32>, stencil: Option<u8>, rect: Option<vk::Rect2D>) {
        self.in_pass = true;
        let texels = self.texels(rect);
        if let Some(z) = depth {
            self.check(Aspect::Depth, true, "clear");
            for &i in &texels {
                self.depth[i] = Some(z);
            }
        }
        if let Some(s) = stencil {
            self.check(Aspect::Stencil, true, "clear");
            for &i in &texels {
                self.stencil[i] = Some(s);
            }
        }
    }

    pub fn discard(&mut self, aspect: Aspect) {
        self.garbage(aspect);
    }

    /// Reads back the depth plane, as a copy out of a read-only layout.
    pub fn read_depth(&mut self) -> Vec<Option<f32>> {
        self.check(Aspect::Depth, false, "copy");
        self.depth.clone()
    }

    pub fn read_stencil(&mut self) -> Vec<Option<u8>> {
        self.check(Aspect::Stencil, false, "copy");
        self.stencil.clone()
    }

    /// Compares the physical layouts against what the tracker believes.
    pub fn check_beliefs(&mut self, states: AspectPair<AspectState>) {
        let present = states.map(|aspect, state| self.present[aspect].then_some(state));
        for aspect in Aspect::ALL {
            if !self.present[aspect] || !states[aspect].is_defined() {
                continue;
            }
            let expected = if self.separate {
                states[aspect].layout(aspect)
            } else {
                combined_layout(present)
            };
            if self.layouts[aspect] != expected {
                self.errors.push(format!(
                    "tracker believes {aspect} is in {expected:?}, image is in {:?}",
                    self.layouts[aspect]
                ));
            }
        }
    }
}

/// A tracker, one tracked image, and its simulation, driven through the D3D12 entry points.
pub struct Harness {
    pub tracker: DepthStencilTracker,
    pub sim: SimImage,
    pub id: ResourceId,
}

impl Harness {
    pub fn new(config: TrackerConfig, format: DxgiFormat, width: u32, height: u32) -> Self {
        init_logging();
        let separate = config.separate_depth_stencil_layouts;
        let mut tracker = DepthStencilTracker::new(config);
        let extent = vk::Extent2D { width, height };
        let vk_format = format.to_vk().expect("depth-stencil format");
        let id = tracker
            .register(ImageInfo::new(vk::Image::from_raw(0xd5), vk_format, extent))
            .unwrap();
        let present = tracker.resource(id).unwrap().permutation().presence();
        Self {
            tracker,
            sim: SimImage::new(extent, present, separate),
            id,
        }
    }

    fn apply(
        &mut self,
        requests: impl IntoIterator<Item = TransitionRequest>,
    ) -> Vec<TransitionRequest> {
        let requests: Vec<_> = requests.into_iter().collect();
        for request in &requests {
            self.sim.record(request);
        }
        requests
    }

    fn sync(&mut self) {
        let states = self.tracker.resource(self.id).unwrap().states();
        self.sim.check_beliefs(states);
        if self.tracker.batch().is_none() {
            self.sim.set_in_pass(false);
        }
    }

    pub fn barrier(&mut self, subresource: u32, after: ResourceStates) -> Vec<TransitionRequest> {
        let request = self
            .tracker
            .resource_barrier(self.id, subresource, after)
            .unwrap();
        let requests = self.apply(request);
        self.sync();
        requests
    }

    pub fn clear(
        &mut self,
        flags: ClearFlags,
        depth: f32,
        stencil: u8,
        rects: &[vk::Rect2D],
    ) -> Vec<TransitionRequest> {
        let requests = self
            .tracker
            .clear_depth_stencil_view(self.id, flags, rects)
            .unwrap();
        let requests = self.apply(requests);
        let depth = flags.contains(ClearFlags::DEPTH).then_some(depth);
        let stencil = flags.contains(ClearFlags::STENCIL).then_some(stencil);
        if rects.is_empty() {
            self.sim.clear(depth, stencil, None);
        }
        for rect in rects {
            self.sim.clear(depth, stencil, Some(*rect));
        }
        self.sync();
        requests
    }

    /// Discards whole subresources of a single-mip, single-slice image.
    pub fn discard(
        &mut self,
        first_subresource: u32,
        num_subresources: u32,
    ) -> Vec<TransitionRequest> {
        let request = self
            .tracker
            .discard_resource(self.id, first_subresource, num_subresources, false)
            .unwrap();
        let requests = self.apply(request);
        let planes: Vec<_> = self
            .tracker
            .resource(self.id)
            .unwrap()
            .permutation()
            .planes()
            .collect();
        for (plane, aspect) in planes.into_iter().enumerate() {
            let plane = plane as u32;
            if plane >= first_subresource && plane - first_subresource < num_subresources {
                self.sim.discard(aspect);
            }
        }
        self.sync();
        requests
    }

    pub fn draw(
        &mut self,
        desc: &DepthStencilDesc,
        dsv_flags: DsvFlags,
        rect: vk::Rect2D,
        z: f32,
        stencil_ref: u8,
    ) -> Vec<TransitionRequest> {
        let request = self
            .tracker
            .draw_with_pipeline(self.id, desc, dsv_flags)
            .unwrap();
        let requests = self.apply(request);
        self.sim
            .draw(DrawIntent::from_pipeline(desc, dsv_flags), rect, z, stencil_ref);
        self.sync();
        requests
    }

    /// Ends the recording.
    pub fn finish(&mut self) -> Vec<TransitionRequest> {
        self.sim.set_in_pass(false);
        let requests = self.tracker.finish();
        let requests = self.apply(requests);
        self.sync();
        requests
    }

    pub fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.sim.errors)
    }
}
