//! Per-image tracking records and the arena that owns them.
//!
//! The tracker never owns the Vulkan image. Each [`DepthStencilResource`] keeps the raw handle as
//! a back-reference so barriers can name it, and the caller stays responsible for the image's
//! lifetime. Records are addressed by [`ResourceId`], a generational index. A handle kept past
//! [`unregister`](crate::DepthStencilTracker::unregister) is rejected instead of aliasing the
//! next image registered into the same slot.

use std::fmt::Display;

use ash::vk;

use crate::{
    aspect::{Aspect, AspectPair, AspectState},
    tracking::{Access, AccessHistory},
    utils::{
        IdAlloc,
        format::{DepthStencilFormat, Permutation},
    },
};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ResourceId {
    index: u32,
    generation: u32,
}

impl ResourceId {
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Describes an image entering tracking.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub image: vk::Image,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    /// Default: 1
    pub mip_levels: u32,
    /// Default: 1
    pub array_layers: u32,
    /// The state each aspect is known to be in. Aspects the format lacks are ignored.
    ///
    /// Default: `Undefined` for both
    pub initial: AspectPair<AspectState>,
}

impl ImageInfo {
    pub fn new(image: vk::Image, format: vk::Format, extent: vk::Extent2D) -> Self {
        Self {
            image,
            format,
            extent,
            mip_levels: 1,
            array_layers: 1,
            initial: AspectPair::default(),
        }
    }
    pub fn with_initial(mut self, depth: AspectState, stencil: AspectState) -> Self {
        self.initial = AspectPair::new(depth, stencil);
        self
    }
}

/// The tracked state of one depth-stencil image.
#[derive(Clone)]
pub struct DepthStencilResource {
    image: vk::Image,
    format: DepthStencilFormat,
    extent: vk::Extent2D,
    mip_levels: u32,
    array_layers: u32,
    pub(crate) states: AspectPair<AspectState>,
    /// Aspects written inside the batch currently open on this resource.
    pub(crate) pending_batch_writes: AspectPair<bool>,
    pub(crate) history: AspectPair<AccessHistory>,
}

impl std::fmt::Debug for DepthStencilResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("DepthStencilResource");
        debug.field("image", &self.image);
        debug.field("format", &self.format);
        if self.has(Aspect::Depth) {
            debug.field("depth", &self.states.depth);
        }
        if self.has(Aspect::Stencil) {
            debug.field("stencil", &self.states.stencil);
        }
        debug.field("pending_batch_writes", &self.pending_batch_writes);
        debug.finish()
    }
}

impl DepthStencilResource {
    pub(crate) fn new(info: &ImageInfo, format: DepthStencilFormat) -> Self {
        let mut resource = Self {
            image: info.image,
            format,
            extent: info.extent,
            mip_levels: info.mip_levels.max(1),
            array_layers: info.array_layers.max(1),
            states: AspectPair::default(),
            pending_batch_writes: AspectPair::default(),
            history: AspectPair::default(),
        };
        resource.seed(info.initial);
        resource
    }

    /// Overwrites the believed states without recording any access.
    pub(crate) fn seed(&mut self, states: AspectPair<AspectState>) {
        let presence = self.permutation().presence();
        self.states = states.map(|aspect, state| {
            if presence[aspect] {
                state
            } else {
                AspectState::Undefined
            }
        });
        self.history = self.states.map(|_, state| seeded_history(state));
        self.pending_batch_writes = AspectPair::default();
    }

    pub fn image(&self) -> vk::Image {
        self.image
    }
    pub fn format(&self) -> vk::Format {
        self.format.to_vk()
    }
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
    pub fn permutation(&self) -> Permutation {
        self.format.permutation()
    }
    pub fn aspects(&self) -> vk::ImageAspectFlags {
        self.permutation().aspects()
    }
    pub fn has(&self, aspect: Aspect) -> bool {
        self.permutation().has(aspect)
    }
    pub fn has_depth(&self) -> bool {
        self.has(Aspect::Depth)
    }
    pub fn has_stencil(&self) -> bool {
        self.has(Aspect::Stencil)
    }
    pub fn state(&self, aspect: Aspect) -> AspectState {
        self.states[aspect]
    }
    pub fn states(&self) -> AspectPair<AspectState> {
        self.states
    }
    /// The states of the aspects this format has, `None` for the others.
    pub fn present_states(&self) -> AspectPair<Option<AspectState>> {
        self.states
            .map(|aspect, state| self.has(aspect).then_some(state))
    }
    pub fn pending_batch_writes(&self) -> AspectPair<bool> {
        self.pending_batch_writes
    }
    pub fn history(&self, aspect: Aspect) -> &AccessHistory {
        &self.history[aspect]
    }
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    /// The aspect D3D12 subresource index `subresource` belongs to.
    ///
    /// Subresources are numbered mip-major within an array slice, slices within a plane, and
    /// planes last, with the depth plane first.
    pub fn plane_aspect(&self, subresource: u32) -> Option<Aspect> {
        let plane = u64::from(subresource).checked_div(self.subresources_per_plane())?;
        self.permutation().planes().nth(usize::try_from(plane).ok()?)
    }

    /// Mip levels times array layers. Wider than `u32` so that the product cannot overflow.
    pub fn subresources_per_plane(&self) -> u64 {
        u64::from(self.mip_levels) * u64::from(self.array_layers)
    }
}

fn seeded_history(state: AspectState) -> AccessHistory {
    match state {
        AspectState::Undefined => AccessHistory::default(),
        AspectState::ReadOnly => AccessHistory {
            write: Access::NONE,
            reads: Access::DEPTH_STENCIL_SAMPLED_READ.stage,
        },
        AspectState::Writable => AccessHistory::new(Access::DEPTH_STENCIL_WRITE.write_part()),
    }
}

struct Slot {
    generation: u32,
    resource: Option<DepthStencilResource>,
}

/// Arena of tracked resources.
#[derive(Default)]
pub struct ResourceTable {
    ids: IdAlloc,
    slots: Vec<Slot>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the format of `info` and starts tracking it.
    pub(crate) fn insert(&mut self, info: &ImageInfo) -> Option<ResourceId> {
        let format = DepthStencilFormat::from_vk(info.format)?;
        let index = self.ids.alloc_one();
        if index as usize == self.slots.len() {
            self.slots.push(Slot {
                generation: 0,
                resource: None,
            });
        }
        let slot = &mut self.slots[index as usize];
        slot.resource = Some(DepthStencilResource::new(info, format));
        Some(ResourceId {
            index,
            generation: slot.generation,
        })
    }

    pub(crate) fn remove(&mut self, id: ResourceId) -> Option<DepthStencilResource> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let resource = slot.resource.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.ids.free(id.index);
        Some(resource)
    }

    pub fn get(&self, id: ResourceId) -> Option<&DepthStencilResource> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.resource.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: ResourceId) -> Option<&mut DepthStencilResource> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.resource.as_mut()
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.ids.iter().map(|index| ResourceId {
            index,
            generation: self.slots[index as usize].generation,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &DepthStencilResource)> {
        self.ids()
            .filter_map(|id| self.get(id).map(|resource| (id, resource)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn info(format: vk::Format) -> ImageInfo {
        ImageInfo::new(
            vk::Image::from_raw(0x10),
            format,
            vk::Extent2D {
                width: 64,
                height: 64,
            },
        )
    }

    #[test]
    fn test_insert_rejects_color_formats() {
        let mut table = ResourceTable::new();
        assert!(table.insert(&info(vk::Format::R8G8B8A8_UNORM)).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_stale_handles_are_rejected() {
        let mut table = ResourceTable::new();
        let first = table.insert(&info(vk::Format::D32_SFLOAT_S8_UINT)).unwrap();
        assert!(table.remove(first).is_some());
        assert!(table.remove(first).is_none());

        let second = table.insert(&info(vk::Format::D24_UNORM_S8_UINT)).unwrap();
        assert_eq!(first.index(), second.index());
        assert_ne!(first, second);
        assert!(table.get(first).is_none());
        assert_eq!(
            table.get(second).unwrap().format(),
            vk::Format::D24_UNORM_S8_UINT
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.iter().count(), 1);
    }

    /// Initial states on aspects the format lacks never stick.
    #[test]
    fn test_missing_aspect_stays_undefined() {
        let mut table = ResourceTable::new();
        let id = table
            .insert(
                &info(vk::Format::D32_SFLOAT)
                    .with_initial(AspectState::Writable, AspectState::Writable),
            )
            .unwrap();
        let resource = table.get(id).unwrap();
        assert!(resource.has_depth());
        assert!(!resource.has_stencil());
        assert_eq!(resource.state(Aspect::Depth), AspectState::Writable);
        assert_eq!(resource.state(Aspect::Stencil), AspectState::Undefined);
        assert_eq!(
            resource.present_states(),
            AspectPair::new(Some(AspectState::Writable), None)
        );
    }

    #[test]
    fn test_plane_aspect() {
        let mut table = ResourceTable::new();
        let mut ds = info(vk::Format::D24_UNORM_S8_UINT);
        ds.mip_levels = 3;
        ds.array_layers = 2;
        let ds = table.insert(&ds).unwrap();
        let resource = table.get(ds).unwrap();
        assert_eq!(resource.plane_aspect(0), Some(Aspect::Depth));
        assert_eq!(resource.plane_aspect(5), Some(Aspect::Depth));
        assert_eq!(resource.plane_aspect(6), Some(Aspect::Stencil));
        assert_eq!(resource.plane_aspect(12), None);

        let s8 = table.insert(&info(vk::Format::S8_UINT)).unwrap();
        assert_eq!(
            table.get(s8).unwrap().plane_aspect(0),
            Some(Aspect::Stencil)
        );
    }
}
