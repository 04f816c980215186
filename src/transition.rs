//! Layout transitions requested by the tracker, and their Vulkan barriers.

use ash::vk;
use smallvec::SmallVec;

use crate::{
    aspect::{Aspect, AspectPair, AspectState, combined_layout},
    resource::ResourceId,
    tracking::MemoryBarrier,
};

/// How aspect states map onto image layouts.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LayoutMode {
    /// One layout per aspect, `separateDepthStencilLayouts`.
    Separate,
    /// Both aspects share one combined depth-stencil layout.
    Combined,
}

/// The state change of one aspect.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AspectTransition {
    pub from: AspectState,
    pub to: AspectState,
    /// The previous contents need not be preserved.
    pub discard: bool,
    pub barrier: MemoryBarrier,
}

/// A layout transition the caller must record before the operation that caused it.
///
/// When [`ends_batch`](Self::ends_batch) is set, the render pass currently open on the resource
/// has to be ended before the barriers from [`image_barriers`](Self::image_barriers) are
/// recorded.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TransitionRequest {
    pub resource: ResourceId,
    pub image: vk::Image,
    pub depth: Option<AspectTransition>,
    pub stencil: Option<AspectTransition>,
    pub ends_batch: bool,
    pub(crate) mode: LayoutMode,
    pub(crate) aspects: vk::ImageAspectFlags,
    pub(crate) before: AspectPair<AspectState>,
    /// Hazards of aspects a combined layout change moves without changing their state.
    pub(crate) carried: MemoryBarrier,
}

impl TransitionRequest {
    pub fn aspect(&self, aspect: Aspect) -> Option<&AspectTransition> {
        match aspect {
            Aspect::Depth => self.depth.as_ref(),
            Aspect::Stencil => self.stencil.as_ref(),
        }
    }
    pub fn transitions(&self) -> impl Iterator<Item = (Aspect, &AspectTransition)> {
        Aspect::ALL
            .into_iter()
            .filter_map(|aspect| self.aspect(aspect).map(|t| (aspect, t)))
    }
    pub fn mode(&self) -> LayoutMode {
        self.mode
    }
    /// Aspect states before the transition.
    pub fn before(&self) -> AspectPair<AspectState> {
        self.before
    }
    /// Aspect states after the transition.
    pub fn after(&self) -> AspectPair<AspectState> {
        self.before
            .map(|aspect, state| self.aspect(aspect).map_or(state, |t| t.to))
    }
    /// The union of the memory dependencies of every aspect the request moves.
    pub fn memory_barrier(&self) -> MemoryBarrier {
        self.transitions()
            .fold(self.carried, |acc, (_, t)| acc | t.barrier)
    }

    /// Returns true if recording this request would not change any layout.
    pub fn is_empty(&self) -> bool {
        self.layout_changes().is_empty()
    }

    fn present(&self, aspect: Aspect) -> bool {
        self.aspects.contains(aspect.flag())
    }

    fn present_states(&self, states: AspectPair<AspectState>) -> AspectPair<Option<AspectState>> {
        states.map(|aspect, state| self.present(aspect).then_some(state))
    }

    fn layout_changes(&self) -> SmallVec<[LayoutChange; 2]> {
        let mut changes = SmallVec::new();
        match self.mode {
            LayoutMode::Separate => {
                for (aspect, t) in self.transitions() {
                    // Nothing transitions into UNDEFINED; forgetting is free.
                    if t.to == AspectState::Undefined {
                        continue;
                    }
                    let old_layout = if t.discard {
                        vk::ImageLayout::UNDEFINED
                    } else {
                        t.from.layout(aspect)
                    };
                    let new_layout = t.to.layout(aspect);
                    if old_layout == new_layout {
                        continue;
                    }
                    changes.push(LayoutChange {
                        aspect_mask: aspect.flag(),
                        old_layout,
                        new_layout,
                        barrier: t.barrier,
                    });
                }
            }
            LayoutMode::Combined => {
                let new_layout = combined_layout(self.present_states(self.after()));
                if new_layout == vk::ImageLayout::UNDEFINED {
                    return changes;
                }
                // A shared layout may only drop contents every present aspect is willing to lose.
                let discard_all = Aspect::ALL
                    .into_iter()
                    .filter(|aspect| self.present(*aspect))
                    .all(|aspect| match self.aspect(aspect) {
                        Some(t) => t.discard,
                        None => !self.before[aspect].is_defined(),
                    });
                let old_layout = if discard_all {
                    vk::ImageLayout::UNDEFINED
                } else {
                    combined_layout(self.present_states(self.before))
                };
                if old_layout != new_layout {
                    changes.push(LayoutChange {
                        aspect_mask: self.aspects,
                        old_layout,
                        new_layout,
                        barrier: self.memory_barrier(),
                    });
                }
            }
        }
        changes
    }

    /// The image barriers implementing this request. One per aspect with separate layouts, a
    /// single one covering every aspect of the format otherwise.
    pub fn image_barriers(&self) -> SmallVec<[vk::ImageMemoryBarrier2<'static>; 2]> {
        self.layout_changes()
            .into_iter()
            .map(|change| vk::ImageMemoryBarrier2 {
                src_stage_mask: change.barrier.src.stage,
                src_access_mask: change.barrier.src.access,
                dst_stage_mask: change.barrier.dst.stage,
                dst_access_mask: change.barrier.dst.access,
                old_layout: change.old_layout,
                new_layout: change.new_layout,
                image: self.image,
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: change.aspect_mask,
                    base_mip_level: 0,
                    level_count: vk::REMAINING_MIP_LEVELS,
                    base_array_layer: 0,
                    layer_count: vk::REMAINING_ARRAY_LAYERS,
                },
                ..Default::default()
            })
            .collect()
    }
}

struct LayoutChange {
    aspect_mask: vk::ImageAspectFlags,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    barrier: MemoryBarrier,
}
