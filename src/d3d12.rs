//! Translation of D3D12 depth-stencil concepts onto the tracker.
//!
//! D3D12 describes a depth-stencil texture with resource states per subresource, read-only DSV
//! flags, clear flags, and the depth-stencil part of a pipeline state. This module maps each of
//! those onto the per-aspect model of the tracker. Subresources collapse onto their plane: every
//! mip level and array slice of the depth plane shares the depth aspect state.

use ash::vk;
use bitflags::bitflags;
use smallvec::{SmallVec, smallvec};

use crate::{
    aspect::{Aspect, AspectPair, AspectState},
    engine::{DrawIntent, Operation},
    error::{Result, TrackingError},
    resource::ResourceId,
    tracker::DepthStencilTracker,
    transition::TransitionRequest,
};

/// Addresses every subresource of a resource.
pub const ALL_SUBRESOURCES: u32 = 0xffff_ffff;

bitflags! {
    /// `D3D12_RESOURCE_STATES`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceStates: u32 {
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const RENDER_TARGET = 0x4;
        const UNORDERED_ACCESS = 0x8;
        const DEPTH_WRITE = 0x10;
        const DEPTH_READ = 0x20;
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        const PIXEL_SHADER_RESOURCE = 0x80;
        const STREAM_OUT = 0x100;
        const INDIRECT_ARGUMENT = 0x200;
        const COPY_DEST = 0x400;
        const COPY_SOURCE = 0x800;
        const RESOLVE_DEST = 0x1000;
        const RESOLVE_SOURCE = 0x2000;
    }
}

impl ResourceStates {
    pub const COMMON: ResourceStates = ResourceStates::empty();
    pub const ALL_SHADER_RESOURCE: ResourceStates = ResourceStates::from_bits_retain(
        ResourceStates::NON_PIXEL_SHADER_RESOURCE.bits()
            | ResourceStates::PIXEL_SHADER_RESOURCE.bits(),
    );
    /// The read states a depth-stencil texture may combine.
    const DEPTH_STENCIL_READS: ResourceStates = ResourceStates::from_bits_retain(
        ResourceStates::DEPTH_READ.bits()
            | ResourceStates::ALL_SHADER_RESOURCE.bits()
            | ResourceStates::COPY_SOURCE.bits()
            | ResourceStates::RESOLVE_SOURCE.bits(),
    );
}

/// The aspect state a depth-stencil subresource in `states` is in.
pub fn aspect_state_for(states: ResourceStates) -> Result<AspectState> {
    if states == ResourceStates::COMMON {
        Ok(AspectState::ReadOnly)
    } else if states == ResourceStates::DEPTH_WRITE {
        Ok(AspectState::Writable)
    } else if ResourceStates::DEPTH_STENCIL_READS.contains(states) {
        Ok(AspectState::ReadOnly)
    } else {
        Err(TrackingError::UnsupportedResourceState(states))
    }
}

bitflags! {
    /// `D3D12_DSV_FLAGS`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DsvFlags: u32 {
        const READ_ONLY_DEPTH = 0x1;
        const READ_ONLY_STENCIL = 0x2;
    }
}

bitflags! {
    /// `D3D12_CLEAR_FLAGS`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const DEPTH = 0x1;
        const STENCIL = 0x2;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum DepthWriteMask {
    Zero,
    #[default]
    All,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    IncrSat,
    DecrSat,
    Invert,
    Incr,
    Decr,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct StencilOpDesc {
    pub fail_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub pass_op: StencilOp,
}

impl StencilOpDesc {
    pub fn writes(&self) -> bool {
        [self.fail_op, self.depth_fail_op, self.pass_op]
            .iter()
            .any(|op| *op != StencilOp::Keep)
    }
}

/// `D3D12_DEPTH_STENCIL_DESC`, without the comparison functions.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DepthStencilDesc {
    pub depth_enable: bool,
    pub depth_write_mask: DepthWriteMask,
    pub stencil_enable: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub front_face: StencilOpDesc,
    pub back_face: StencilOpDesc,
}

impl Default for DepthStencilDesc {
    fn default() -> Self {
        Self {
            depth_enable: true,
            depth_write_mask: DepthWriteMask::All,
            stencil_enable: false,
            stencil_read_mask: 0xff,
            stencil_write_mask: 0xff,
            front_face: StencilOpDesc::default(),
            back_face: StencilOpDesc::default(),
        }
    }
}

impl DrawIntent {
    /// The usage of a draw with pipeline state `desc` against a view created with `dsv_flags`.
    ///
    /// A read-only view still allows the tests; it only takes writes away.
    pub fn from_pipeline(desc: &DepthStencilDesc, dsv_flags: DsvFlags) -> Self {
        let depth_test = desc.depth_enable;
        let depth_write = desc.depth_enable
            && desc.depth_write_mask == DepthWriteMask::All
            && !dsv_flags.contains(DsvFlags::READ_ONLY_DEPTH);
        let stencil_test = desc.stencil_enable;
        let stencil_write = desc.stencil_enable
            && desc.stencil_write_mask != 0
            && (desc.front_face.writes() || desc.back_face.writes())
            && !dsv_flags.contains(DsvFlags::READ_ONLY_STENCIL);
        DrawIntent::new(depth_write, depth_test, stencil_write, stencil_test)
    }
}

/// `DXGI_FORMAT`, restricted to the formats a depth-stencil view can be created with.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DxgiFormat(pub u32);

impl DxgiFormat {
    pub const R32G8X24_TYPELESS: DxgiFormat = DxgiFormat(19);
    pub const D32_FLOAT_S8X24_UINT: DxgiFormat = DxgiFormat(20);
    pub const R32_TYPELESS: DxgiFormat = DxgiFormat(39);
    pub const D32_FLOAT: DxgiFormat = DxgiFormat(40);
    pub const R24G8_TYPELESS: DxgiFormat = DxgiFormat(44);
    pub const D24_UNORM_S8_UINT: DxgiFormat = DxgiFormat(45);
    pub const R16_TYPELESS: DxgiFormat = DxgiFormat(53);
    pub const D16_UNORM: DxgiFormat = DxgiFormat(55);

    /// The Vulkan format backing a depth-stencil texture of this format. Typeless formats map to
    /// the depth format of the same layout.
    pub fn to_vk(self) -> Option<vk::Format> {
        Some(match self {
            Self::R32G8X24_TYPELESS | Self::D32_FLOAT_S8X24_UINT => vk::Format::D32_SFLOAT_S8_UINT,
            Self::R32_TYPELESS | Self::D32_FLOAT => vk::Format::D32_SFLOAT,
            Self::R24G8_TYPELESS | Self::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
            Self::R16_TYPELESS | Self::D16_UNORM => vk::Format::D16_UNORM,
            _ => return None,
        })
    }
}

impl DepthStencilTracker {
    fn subresource_aspects(
        &self,
        id: ResourceId,
        subresource: u32,
    ) -> Result<SmallVec<[Aspect; 2]>> {
        let resource = self.resource(id)?;
        if subresource == ALL_SUBRESOURCES {
            return Ok(resource.permutation().planes().collect());
        }
        let aspect =
            resource
                .plane_aspect(subresource)
                .ok_or(TrackingError::InvalidSubresource {
                    resource: id,
                    subresource,
                })?;
        Ok(smallvec![aspect])
    }

    /// `ResourceBarrier` with a transition barrier to `after`.
    ///
    /// The before state is not needed. The tracker already knows the state of each aspect.
    pub fn resource_barrier(
        &mut self,
        id: ResourceId,
        subresource: u32,
        after: ResourceStates,
    ) -> Result<Option<TransitionRequest>> {
        let target = aspect_state_for(after)?;
        let aspects = self.subresource_aspects(id, subresource)?;
        let pick = |aspect| aspects.contains(&aspect).then_some(target);
        self.notify_explicit_transition(id, pick(Aspect::Depth), pick(Aspect::Stencil))
    }

    /// `ClearDepthStencilView`. Flags naming an aspect the format lacks are ignored, and an
    /// empty `rects` clears the whole view.
    pub fn clear_depth_stencil_view(
        &mut self,
        id: ResourceId,
        flags: ClearFlags,
        rects: &[vk::Rect2D],
    ) -> Result<SmallVec<[TransitionRequest; 1]>> {
        let resource = self.resource(id)?;
        let depth = flags.contains(ClearFlags::DEPTH) && resource.has_depth();
        let stencil = flags.contains(ClearFlags::STENCIL) && resource.has_stencil();
        let mut requests = SmallVec::new();
        if rects.is_empty() {
            requests.extend(self.notify_clear(id, depth, stencil, None)?);
        }
        for rect in rects {
            requests.extend(self.notify_clear(id, depth, stencil, Some(*rect))?);
        }
        Ok(requests)
    }

    /// `DiscardResource`. Only planes whose every subresource is discarded without regions
    /// drop their contents. Partial discards leave the contents in place.
    pub fn discard_resource(
        &mut self,
        id: ResourceId,
        first_subresource: u32,
        num_subresources: u32,
        has_rects: bool,
    ) -> Result<Option<TransitionRequest>> {
        let resource = self.resource(id)?;
        if has_rects {
            return Ok(None);
        }
        let per_plane = resource.subresources_per_plane();
        let first = u64::from(first_subresource);
        let end = if num_subresources == ALL_SUBRESOURCES {
            u64::MAX
        } else {
            first + u64::from(num_subresources)
        };
        let mut discard = AspectPair::splat(false);
        for (plane, aspect) in (0u64..).zip(resource.permutation().planes()) {
            let start = plane.saturating_mul(per_plane);
            discard[aspect] = first <= start && end >= start.saturating_add(per_plane);
        }
        if !discard.depth && !discard.stencil {
            tracing::trace!(resource = %id, first_subresource, num_subresources, "partial discard");
            return Ok(None);
        }
        self.notify_discard(id, discard.depth, discard.stencil)
    }

    /// A draw with the depth-stencil state `desc`, rendering through a view with `dsv_flags`.
    pub fn draw_with_pipeline(
        &mut self,
        id: ResourceId,
        desc: &DepthStencilDesc,
        dsv_flags: DsvFlags,
    ) -> Result<Option<TransitionRequest>> {
        self.notify(id, Operation::Draw(DrawIntent::from_pipeline(desc, dsv_flags)))
    }
}
