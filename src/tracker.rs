//! The tracker façade: resource registration, operation notification, and recording boundaries.
//!
//! # Quick Start
//!
//! ```
//! use scoria::prelude::*;
//! use scoria::ash::vk::{self, Handle};
//!
//! let mut tracker = DepthStencilTracker::new(TrackerConfig::default());
//! let depth = tracker
//!     .register(
//!         ImageInfo::new(
//!             vk::Image::from_raw(1),
//!             vk::Format::D32_SFLOAT_S8_UINT,
//!             vk::Extent2D { width: 1024, height: 1024 },
//!         )
//!         .with_initial(AspectState::ReadOnly, AspectState::ReadOnly),
//!     )
//!     .unwrap();
//!
//! // Depth and stencil tests without writes: the read-only layouts already serve them.
//! assert!(tracker.notify_draw(depth, false, true, false, true).unwrap().is_none());
//!
//! // Enabling depth writes promotes the depth aspect only, splitting the open pass.
//! let request = tracker.notify_draw(depth, true, true, false, true).unwrap().unwrap();
//! assert!(request.ends_batch);
//! assert_eq!(request.depth.unwrap().to, AspectState::Writable);
//! assert!(request.stencil.is_none());
//! for barrier in request.image_barriers() {
//!     // vkCmdPipelineBarrier2 with `barrier`
//! #   let _ = barrier;
//! }
//!
//! // The end of the recording relaxes the depth aspect back to read-only.
//! let decays = tracker.finish();
//! assert_eq!(decays.len(), 1);
//! ```
//!
//! # Recording model
//!
//! The tracker is consulted in program order while commands are recorded. Every `notify_*`
//! call returns the transition, if any, that has to be recorded *before* the command itself.
//! When the returned request has [`ends_batch`](TransitionRequest::ends_batch) set, the caller
//! ends its current render pass first and begins a new one after the barrier. Whether a render
//! pass is open, and with which layouts, is available from [`DepthStencilTracker::batch`].
//!
//! Beliefs about layouts are only as good as their seed. Register images with the state they are
//! known to be in, or [`seed`](DepthStencilTracker::seed) them at the start of each recording.

use crate::{
    aspect::{Aspect, AspectPair, AspectState},
    batch::{Batch, BatchDecision, BatchTracker},
    config::TrackerConfig,
    decay::DecayPolicy,
    engine::{self, AspectNeed, Change, Operation},
    error::{Result, TrackingError},
    resource::{DepthStencilResource, ImageInfo, ResourceId, ResourceTable},
    tracking::{Access, AccessHistory, MemoryBarrier},
    transition::{AspectTransition, LayoutMode, TransitionRequest},
    utils,
};

use ash::vk;

/// Counters over the lifetime of a tracker.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct TrackerStats {
    /// Transition requests returned to the caller.
    pub transitions: u64,
    /// Image barriers in those requests.
    pub image_barriers: u64,
    /// Batches opened.
    pub batches: u64,
    /// Batches ended early because an operation needed different layouts.
    pub splits: u64,
    /// Rendering operations recorded into an already-open batch.
    pub folded: u64,
    /// Aspects relaxed from `Writable`.
    pub decays: u64,
}

/// Tracks per-aspect layouts of depth-stencil images across one command recording.
pub struct DepthStencilTracker {
    config: TrackerConfig,
    decay: DecayPolicy,
    resources: ResourceTable,
    batches: BatchTracker,
    stats: TrackerStats,
}

impl DepthStencilTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            decay: DecayPolicy::new(&config),
            config,
            resources: ResourceTable::new(),
            batches: BatchTracker::default(),
            stats: TrackerStats::default(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
    pub fn stats(&self) -> TrackerStats {
        self.stats
    }
    /// The render pass currently open, if any.
    pub fn batch(&self) -> Option<&Batch> {
        self.batches.current()
    }
    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }
    pub fn resource(&self, id: ResourceId) -> Result<&DepthStencilResource> {
        self.resources
            .get(id)
            .ok_or(TrackingError::UnknownResource(id))
    }

    pub fn register(&mut self, info: ImageInfo) -> Result<ResourceId> {
        let id = self
            .resources
            .insert(&info)
            .ok_or(TrackingError::NotDepthStencilFormat(info.format))?;
        tracing::trace!(resource = %id, image = ?info.image, format = ?info.format, "register");
        Ok(id)
    }

    /// Stops tracking `id`, ending the batch open on it.
    pub fn unregister(&mut self, id: ResourceId) -> Result<DepthStencilResource> {
        if self.batches.is_open_on(id) {
            self.close_batch();
        }
        self.resources
            .remove(id)
            .ok_or(TrackingError::UnknownResource(id))
    }

    /// Overwrites the believed states of `id` without emitting transitions.
    pub fn seed(&mut self, id: ResourceId, states: AspectPair<AspectState>) -> Result<()> {
        if self.batches.is_open_on(id) {
            self.close_batch();
        }
        self.resources
            .get_mut(id)
            .ok_or(TrackingError::UnknownResource(id))?
            .seed(states);
        Ok(())
    }

    pub fn notify_draw(
        &mut self,
        id: ResourceId,
        depth_write: bool,
        depth_test: bool,
        stencil_write: bool,
        stencil_test: bool,
    ) -> Result<Option<TransitionRequest>> {
        self.notify(
            id,
            Operation::Draw(engine::DrawIntent::new(
                depth_write,
                depth_test,
                stencil_write,
                stencil_test,
            )),
        )
    }

    pub fn notify_clear(
        &mut self,
        id: ResourceId,
        depth: bool,
        stencil: bool,
        rect: Option<vk::Rect2D>,
    ) -> Result<Option<TransitionRequest>> {
        self.notify(
            id,
            Operation::Clear {
                depth,
                stencil,
                rect,
            },
        )
    }

    pub fn notify_discard(
        &mut self,
        id: ResourceId,
        depth: bool,
        stencil: bool,
    ) -> Result<Option<TransitionRequest>> {
        self.notify(id, Operation::Discard { depth, stencil })
    }

    pub fn notify_explicit_transition(
        &mut self,
        id: ResourceId,
        depth_target: Option<AspectState>,
        stencil_target: Option<AspectState>,
    ) -> Result<Option<TransitionRequest>> {
        self.notify(
            id,
            Operation::Transition {
                depth: depth_target,
                stencil: stencil_target,
            },
        )
    }

    /// Records `op` against `id` and returns the transition that has to precede it.
    pub fn notify(&mut self, id: ResourceId, op: Operation) -> Result<Option<TransitionRequest>> {
        let resource = self.resource(id)?;
        let Some((op, covers_image)) = prepare(id, resource, op)? else {
            return Ok(None);
        };
        let needs = engine::needs(&op, covers_image && self.config.discard_on_full_clear);
        let states = resource.states();
        let changes = engine::resolve(&needs, states);
        let mode = self.config.layout_mode();
        // A combined layout can absorb a state change of one aspect without moving.
        let changes_layout = !plan(id, resource, mode, &changes, false).is_empty();

        let mut ends_batch = false;
        let mut folded = false;
        if op.is_rendering() {
            match self.batches.decide(id, changes_layout) {
                BatchDecision::Fold => folded = true,
                BatchDecision::Split => {
                    tracing::debug!(resource = %id, op = op.kind(), "split batch");
                    self.stats.splits += 1;
                    ends_batch = self.close_batch().is_some();
                }
                BatchDecision::Open => ends_batch = self.close_batch().is_some(),
            }
        } else if op.is_explicit() || changes_layout {
            // Barriers are recorded outside render passes.
            ends_batch = self.close_batch().is_some();
        }

        if op.is_explicit() {
            for aspect in Aspect::ALL {
                if let Some(change) = changes[aspect]
                    && DecayPolicy::is_decay(states[aspect], change.to)
                {
                    tracing::debug!(resource = %id, %aspect, to = ?change.to, "decay");
                    self.stats.decays += 1;
                }
            }
        }

        let resource = self
            .resources
            .get_mut(id)
            .ok_or(TrackingError::UnknownResource(id))?;
        let request = apply(id, resource, mode, &needs, changes, ends_batch);

        if op.is_rendering() {
            let writes = op.writes();
            if folded {
                tracing::trace!(resource = %id, op = op.kind(), "fold into batch");
                self.stats.folded += 1;
            } else {
                self.batches.open(id, resource.states());
                self.stats.batches += 1;
            }
            resource.pending_batch_writes.depth |= writes.depth;
            resource.pending_batch_writes.stencil |= writes.stencil;
            self.batches.record(writes);
        }

        if let Some(request) = &request {
            self.stats.transitions += 1;
            self.stats.image_barriers += request.image_barriers().len() as u64;
        }
        Ok(request)
    }

    /// Ends the open render pass, for commands that cannot run inside one.
    pub fn close_batch(&mut self) -> Option<Batch> {
        let batch = self.batches.close()?;
        if let Some(resource) = self.resources.get_mut(batch.resource) {
            resource.pending_batch_writes = AspectPair::default();
        }
        tracing::trace!(
            resource = %batch.resource,
            operations = batch.operations,
            "end batch"
        );
        Some(batch)
    }

    /// Ends the recording: closes the open batch and relaxes writable aspects to the resting
    /// state. The returned transitions go at the very end of the recording.
    pub fn finish(&mut self) -> Vec<TransitionRequest> {
        self.close_batch();
        let mode = self.config.layout_mode();
        let ids: Vec<ResourceId> = self.resources.ids().collect();
        let mut requests = Vec::new();
        for id in ids {
            let Some(resource) = self.resources.get_mut(id) else {
                continue;
            };
            let Some(targets) = self.decay.finish_targets(resource.present_states()) else {
                continue;
            };
            let op = Operation::Transition {
                depth: targets.depth,
                stencil: targets.stencil,
            };
            let needs = engine::needs(&op, false);
            let changes = engine::resolve(&needs, resource.states());
            self.stats.decays += [changes.depth, changes.stencil]
                .iter()
                .filter(|change| change.is_some())
                .count() as u64;
            if let Some(request) = apply(id, resource, mode, &needs, changes, false) {
                self.stats.transitions += 1;
                self.stats.image_barriers += request.image_barriers().len() as u64;
                requests.push(request);
            }
        }
        tracing::debug!(decays = requests.len(), "finish recording");
        requests
    }
}

impl Default for DepthStencilTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl Drop for DepthStencilTracker {
    fn drop(&mut self) {
        if let Some(batch) = self.batches.current() {
            tracing::warn!(
                resource = %batch.resource,
                "DepthStencilTracker dropped with an open batch"
            );
        }
    }
}

/// Validates `op` against the aspects of `resource` and normalizes it. Returns `None` for
/// operations that touch nothing, and whether a clear covers the whole image.
fn prepare(
    id: ResourceId,
    resource: &DepthStencilResource,
    op: Operation,
) -> Result<Option<(Operation, bool)>> {
    let present = resource.permutation().presence();
    let require = |aspect: Aspect, named: bool| {
        if named && !present[aspect] {
            Err(TrackingError::MissingAspect {
                resource: id,
                aspect,
            })
        } else {
            Ok(())
        }
    };
    match op {
        Operation::Draw(intent) => {
            for (aspect, used) in intent.reads().iter() {
                if *used && !present[aspect] {
                    tracing::debug!(resource = %id, %aspect, "ignore draw usage of missing aspect");
                }
            }
            Ok(Some((Operation::Draw(intent.masked(present)), false)))
        }
        Operation::Clear {
            depth,
            stencil,
            rect,
        } => {
            require(Aspect::Depth, depth)?;
            require(Aspect::Stencil, stencil)?;
            if !depth && !stencil {
                return Ok(None);
            }
            let extent = resource.extent();
            let (rect, covers_image) = match rect {
                None => (None, true),
                Some(rect) => match utils::clip_rect(rect, extent) {
                    Some(clipped) => (Some(clipped), utils::covers_extent(clipped, extent)),
                    None => return Ok(None),
                },
            };
            Ok(Some((
                Operation::Clear {
                    depth,
                    stencil,
                    rect,
                },
                covers_image,
            )))
        }
        Operation::Discard { depth, stencil } => {
            require(Aspect::Depth, depth)?;
            require(Aspect::Stencil, stencil)?;
            if !depth && !stencil {
                return Ok(None);
            }
            Ok(Some((op, false)))
        }
        Operation::Transition { depth, stencil } => {
            require(Aspect::Depth, depth.is_some())?;
            require(Aspect::Stencil, stencil.is_some())?;
            Ok(Some((op, false)))
        }
    }
}

/// The request moving `resource` by `changes`, with empty barriers.
fn plan(
    id: ResourceId,
    resource: &DepthStencilResource,
    mode: LayoutMode,
    changes: &AspectPair<Option<Change>>,
    ends_batch: bool,
) -> TransitionRequest {
    let transition = |aspect: Aspect| {
        changes[aspect].map(|change| AspectTransition {
            from: resource.states[aspect],
            to: change.to,
            discard: change.discard,
            barrier: MemoryBarrier::default(),
        })
    };
    TransitionRequest {
        resource: id,
        image: resource.image(),
        depth: transition(Aspect::Depth),
        stencil: transition(Aspect::Stencil),
        ends_batch,
        mode,
        aspects: resource.aspects(),
        before: resource.states(),
        carried: MemoryBarrier::default(),
    }
}

/// Applies `changes` to `resource` and builds the request implementing them.
fn apply(
    id: ResourceId,
    resource: &mut DepthStencilResource,
    mode: LayoutMode,
    needs: &AspectPair<AspectNeed>,
    changes: AspectPair<Option<Change>>,
    ends_batch: bool,
) -> Option<TransitionRequest> {
    let mut request = plan(id, resource, mode, &changes, ends_batch);
    let moved = !request.is_empty();
    let after = request.after();
    for aspect in Aspect::ALL {
        let Some(change) = changes[aspect] else {
            continue;
        };
        let other = aspect.other();
        let shares_layout =
            mode == LayoutMode::Combined && resource.has(other) && after[other].is_defined();
        let barrier = if change.to.is_defined() {
            resource.history[aspect].transition(needs[aspect].access, true)
        } else if shares_layout {
            // Forgotten, but its contents still sit in the layout the other aspect keeps.
            if moved {
                let access = Access::for_state(AspectState::ReadOnly);
                resource.history[aspect].transition(access, true)
            } else {
                MemoryBarrier::default()
            }
        } else {
            resource.history[aspect] = AccessHistory::default();
            MemoryBarrier::default()
        };
        resource.states[aspect] = change.to;
        let transition = match aspect {
            Aspect::Depth => request.depth.as_mut(),
            Aspect::Stencil => request.stencil.as_mut(),
        };
        if let Some(transition) = transition {
            transition.barrier = barrier;
        }
    }
    for aspect in Aspect::ALL {
        if changes[aspect].is_some() {
            continue;
        }
        let state = resource.states[aspect];
        if moved && mode == LayoutMode::Combined && resource.has(aspect) && state.is_defined() {
            // The shared layout moves this aspect too.
            let mut access = needs[aspect].access;
            if access == Access::NONE {
                access = Access::for_state(state);
            }
            request.carried |= resource.history[aspect].transition(access, true);
        } else {
            resource.history[aspect].record(needs[aspect].access);
        }
    }
    if request.depth.is_none() && request.stencil.is_none() {
        return None;
    }
    if !moved {
        tracing::trace!(
            resource = %id,
            before = ?request.before(),
            after = ?request.after(),
            "state change without layout change"
        );
        return None;
    }
    tracing::debug!(
        resource = %id,
        before = ?request.before(),
        after = ?request.after(),
        ends_batch = request.ends_batch,
        "transition"
    );
    Some(request)
}
