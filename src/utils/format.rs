use ash::vk;

use crate::aspect::{Aspect, AspectPair};

/// Vulkan formats that carry a depth and/or a stencil plane.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthStencilFormat {
    D16_UNORM = 124,
    X8_D24_UNORM_PACK32 = 125,
    D32_SFLOAT = 126,
    S8_UINT = 127,
    D16_UNORM_S8_UINT = 128,
    D24_UNORM_S8_UINT = 129,
    D32_SFLOAT_S8_UINT = 130,
}

/// Which planes a depth-stencil format has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permutation {
    D,
    S,
    DS,
}

impl Permutation {
    pub fn aspects(self) -> vk::ImageAspectFlags {
        match self {
            Permutation::D => vk::ImageAspectFlags::DEPTH,
            Permutation::S => vk::ImageAspectFlags::STENCIL,
            Permutation::DS => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
        }
    }
    pub fn has(self, aspect: Aspect) -> bool {
        self.aspects().contains(aspect.flag())
    }
    /// Depth-stencil images address their planes in this order: depth first, then stencil.
    pub fn planes(self) -> impl Iterator<Item = Aspect> {
        Aspect::ALL.into_iter().filter(move |aspect| self.has(*aspect))
    }
    pub fn presence(self) -> AspectPair<bool> {
        AspectPair::new(self.has(Aspect::Depth), self.has(Aspect::Stencil))
    }
}

impl DepthStencilFormat {
    pub fn from_vk(format: vk::Format) -> Option<Self> {
        Some(match format {
            vk::Format::D16_UNORM => Self::D16_UNORM,
            vk::Format::X8_D24_UNORM_PACK32 => Self::X8_D24_UNORM_PACK32,
            vk::Format::D32_SFLOAT => Self::D32_SFLOAT,
            vk::Format::S8_UINT => Self::S8_UINT,
            vk::Format::D16_UNORM_S8_UINT => Self::D16_UNORM_S8_UINT,
            vk::Format::D24_UNORM_S8_UINT => Self::D24_UNORM_S8_UINT,
            vk::Format::D32_SFLOAT_S8_UINT => Self::D32_SFLOAT_S8_UINT,
            _ => return None,
        })
    }
    pub fn to_vk(self) -> vk::Format {
        vk::Format::from_raw(self as i32)
    }
    pub fn permutation(self) -> Permutation {
        match self {
            Self::D16_UNORM | Self::X8_D24_UNORM_PACK32 | Self::D32_SFLOAT => Permutation::D,
            Self::S8_UINT => Permutation::S,
            Self::D16_UNORM_S8_UINT | Self::D24_UNORM_S8_UINT | Self::D32_SFLOAT_S8_UINT => {
                Permutation::DS
            }
        }
    }
}
