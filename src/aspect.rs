//! Depth and stencil aspects, their tracked states, and the Vulkan layouts those states map to.
//!
//! A depth-stencil image carries up to two aspects. Each aspect is tracked on its own as one of
//! three [`AspectState`]s, and the pair of states decides which [`vk::ImageLayout`] the image (or
//! each of its aspects) has to be in.
//!
//! # Layout modes
//!
//! When the device supports `separateDepthStencilLayouts`, each aspect gets its own layout and
//! its own barrier:
//!
//! | state      | depth                              | stencil                              |
//! |------------|------------------------------------|--------------------------------------|
//! | `ReadOnly` | `DEPTH_READ_ONLY_OPTIMAL`          | `STENCIL_READ_ONLY_OPTIMAL`          |
//! | `Writable` | `DEPTH_ATTACHMENT_OPTIMAL`         | `STENCIL_ATTACHMENT_OPTIMAL`         |
//!
//! Otherwise the two states are folded into one of the four combined layouts by
//! [`combined_layout`]. An aspect that is still `Undefined` while the other one has a layout is
//! physically in the read-only half of the combined layout.
//!
//! ```
//! use scoria::aspect::{AspectPair, AspectState, combined_layout};
//! use scoria::ash::vk;
//!
//! let layout = combined_layout(AspectPair::new(
//!     Some(AspectState::Writable),
//!     Some(AspectState::ReadOnly),
//! ));
//! assert_eq!(layout, vk::ImageLayout::DEPTH_ATTACHMENT_STENCIL_READ_ONLY_OPTIMAL);
//! ```

use std::{
    fmt::Display,
    ops::{Index, IndexMut},
};

use ash::vk;

/// The tracked state of one aspect of a depth-stencil image.
///
/// The states are not totally ordered: [`AspectState::Writable`] satisfies a read-only need,
/// but nothing is "less" than `Undefined` in a way that would make it usable.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Hash)]
pub enum AspectState {
    /// Contents and layout are unknown. The next transition may discard them.
    #[default]
    Undefined,
    /// The aspect may be sampled or depth/stencil-tested but not written.
    ReadOnly,
    /// The aspect may be written as an attachment. Also usable for reads.
    Writable,
}

impl AspectState {
    /// Returns true if an aspect in `self` can serve an access that needs at least `required`.
    pub fn satisfies(self, required: AspectState) -> bool {
        match required {
            AspectState::Undefined => true,
            AspectState::ReadOnly => self != AspectState::Undefined,
            AspectState::Writable => self == AspectState::Writable,
        }
    }
    pub fn is_writable(self) -> bool {
        self == AspectState::Writable
    }
    pub fn is_defined(self) -> bool {
        self != AspectState::Undefined
    }

    /// The layout of `aspect` in this state when depth and stencil layouts are separate.
    pub fn layout(self, aspect: Aspect) -> vk::ImageLayout {
        match (aspect, self) {
            (_, AspectState::Undefined) => vk::ImageLayout::UNDEFINED,
            (Aspect::Depth, AspectState::ReadOnly) => vk::ImageLayout::DEPTH_READ_ONLY_OPTIMAL,
            (Aspect::Depth, AspectState::Writable) => vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            (Aspect::Stencil, AspectState::ReadOnly) => vk::ImageLayout::STENCIL_READ_ONLY_OPTIMAL,
            (Aspect::Stencil, AspectState::Writable) => {
                vk::ImageLayout::STENCIL_ATTACHMENT_OPTIMAL
            }
        }
    }
}

/// One of the two planes of a depth-stencil image.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Aspect {
    Depth,
    Stencil,
}

impl Aspect {
    pub const ALL: [Aspect; 2] = [Aspect::Depth, Aspect::Stencil];

    pub fn flag(self) -> vk::ImageAspectFlags {
        match self {
            Aspect::Depth => vk::ImageAspectFlags::DEPTH,
            Aspect::Stencil => vk::ImageAspectFlags::STENCIL,
        }
    }
    pub fn other(self) -> Aspect {
        match self {
            Aspect::Depth => Aspect::Stencil,
            Aspect::Stencil => Aspect::Depth,
        }
    }
}

impl Display for Aspect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Aspect::Depth => f.write_str("depth"),
            Aspect::Stencil => f.write_str("stencil"),
        }
    }
}

/// A value for each of the depth and stencil aspects.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Hash)]
pub struct AspectPair<T> {
    pub depth: T,
    pub stencil: T,
}

impl<T> AspectPair<T> {
    pub const fn new(depth: T, stencil: T) -> Self {
        Self { depth, stencil }
    }
    pub fn splat(value: T) -> Self
    where
        T: Clone,
    {
        Self {
            depth: value.clone(),
            stencil: value,
        }
    }
    pub fn get(&self, aspect: Aspect) -> &T {
        match aspect {
            Aspect::Depth => &self.depth,
            Aspect::Stencil => &self.stencil,
        }
    }
    pub fn get_mut(&mut self, aspect: Aspect) -> &mut T {
        match aspect {
            Aspect::Depth => &mut self.depth,
            Aspect::Stencil => &mut self.stencil,
        }
    }
    /// Applies `f` to both values, depth first.
    pub fn map<U>(self, mut f: impl FnMut(Aspect, T) -> U) -> AspectPair<U> {
        AspectPair {
            depth: f(Aspect::Depth, self.depth),
            stencil: f(Aspect::Stencil, self.stencil),
        }
    }
    pub fn as_ref(&self) -> AspectPair<&T> {
        AspectPair {
            depth: &self.depth,
            stencil: &self.stencil,
        }
    }
    pub fn iter(&self) -> impl Iterator<Item = (Aspect, &T)> {
        [(Aspect::Depth, &self.depth), (Aspect::Stencil, &self.stencil)].into_iter()
    }
}

impl<T> Index<Aspect> for AspectPair<T> {
    type Output = T;
    fn index(&self, aspect: Aspect) -> &T {
        self.get(aspect)
    }
}
impl<T> IndexMut<Aspect> for AspectPair<T> {
    fn index_mut(&mut self, aspect: Aspect) -> &mut T {
        self.get_mut(aspect)
    }
}

/// The single layout covering both aspects when separate depth/stencil layouts are unavailable.
///
/// `None` marks an aspect the format does not have; it follows the other aspect. An aspect that
/// is `Undefined` next to a defined one is placed in the read-only half.
pub fn combined_layout(states: AspectPair<Option<AspectState>>) -> vk::ImageLayout {
    let (depth, stencil) = match (states.depth, states.stencil) {
        (Some(depth), Some(stencil)) => (depth, stencil),
        (Some(depth), None) => (depth, depth),
        (None, Some(stencil)) => (stencil, stencil),
        (None, None) => return vk::ImageLayout::UNDEFINED,
    };
    match (depth.is_writable(), stencil.is_writable()) {
        _ if !depth.is_defined() && !stencil.is_defined() => vk::ImageLayout::UNDEFINED,
        (true, true) => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        (true, false) => vk::ImageLayout::DEPTH_ATTACHMENT_STENCIL_READ_ONLY_OPTIMAL,
        (false, true) => vk::ImageLayout::DEPTH_READ_ONLY_STENCIL_ATTACHMENT_OPTIMAL,
        (false, false) => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
    }
}
