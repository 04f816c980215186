//! Tracker configuration.

use ash::vk;

use crate::{aspect::AspectState, transition::LayoutMode};

/// Configuration for a [`DepthStencilTracker`](crate::DepthStencilTracker).
///
/// ```
/// use scoria::{TrackerConfig, ash::vk};
///
/// let features = vk::PhysicalDeviceVulkan12Features::default()
///     .separate_depth_stencil_layouts(true);
/// let config = TrackerConfig {
///     decay_on_finish: false,
///     ..TrackerConfig::from_features(&features)
/// };
/// assert!(config.separate_depth_stencil_layouts);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Whether the device supports `separateDepthStencilLayouts`. When enabled, each aspect is
    /// transitioned with its own barrier. Otherwise both aspects share one of the combined
    /// depth-stencil layouts.
    ///
    /// Default: `false`
    pub separate_depth_stencil_layouts: bool,

    /// Whether [`finish`](crate::DepthStencilTracker::finish) returns writable aspects to
    /// [`resting_state`](Self::resting_state).
    ///
    /// Default: `true`
    pub decay_on_finish: bool,

    /// The state an aspect is left in between recordings. `Undefined` forgets the contents
    /// without emitting a barrier.
    ///
    /// Default: `ReadOnly`
    pub resting_state: AspectState,

    /// Whether a clear covering the whole image may discard the previous contents of the cleared
    /// aspects.
    ///
    /// Default: `true`
    pub discard_on_full_clear: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            separate_depth_stencil_layouts: false,
            decay_on_finish: true,
            resting_state: AspectState::ReadOnly,
            discard_on_full_clear: true,
        }
    }
}

impl TrackerConfig {
    pub fn from_features(features: &vk::PhysicalDeviceVulkan12Features) -> Self {
        Self {
            separate_depth_stencil_layouts: features.separate_depth_stencil_layouts == vk::TRUE,
            ..Default::default()
        }
    }
    pub fn layout_mode(&self) -> LayoutMode {
        if self.separate_depth_stencil_layouts {
            LayoutMode::Separate
        } else {
            LayoutMode::Combined
        }
    }
}
