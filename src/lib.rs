//! # Scoria
//!
//! Depth-stencil layout tracking for a D3D12-on-Vulkan translation layer.
//!
//! D3D12 applications describe a depth-stencil texture with coarse resource states and per-draw
//! pipeline state. Vulkan wants every image in an explicit layout, and has separate optimal
//! layouts for a writable or read-only depth aspect and a writable or read-only stencil aspect.
//! Scoria sits between the two. It keeps a belief about the state of each aspect of each tracked
//! image, and tells the recording backend which barriers to insert and when a render pass has to
//! be split, without any read-back of GPU state.
//!
//! ## Quick Start
//!
//! ```
//! use scoria::prelude::*;
//! use scoria::ash::vk::{self, Handle};
//!
//! let mut tracker = DepthStencilTracker::default();
//! let id = tracker
//!     .register(ImageInfo::new(
//!         vk::Image::from_raw(7),
//!         vk::Format::D24_UNORM_S8_UINT,
//!         vk::Extent2D { width: 640, height: 480 },
//!     ))
//!     .unwrap();
//!
//! // A full clear of a fresh image drops the undefined contents.
//! let request = tracker.notify_clear(id, true, true, None).unwrap().unwrap();
//! let barriers = request.image_barriers();
//! assert_eq!(barriers.len(), 1);
//! assert_eq!(barriers[0].old_layout, vk::ImageLayout::UNDEFINED);
//! assert_eq!(barriers[0].new_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
//! ```
//!
//! ## Overview
//!
//! ### Aspects
//!
//! Each aspect is [`Undefined`](aspect::AspectState::Undefined),
//! [`ReadOnly`](aspect::AspectState::ReadOnly) or [`Writable`](aspect::AspectState::Writable),
//! independently of the other. Promoting depth never promotes stencil. Depending on
//! [`TrackerConfig::separate_depth_stencil_layouts`] the pair of states maps to one layout per
//! aspect or to one of the combined depth-stencil layouts, see [`aspect`].
//!
//! ### Operations
//!
//! Draws, clears, discards and explicit transitions are reported to the
//! [`DepthStencilTracker`] in recording order. The rules in [`engine`] decide what each aspect
//! needs, the [`batch`] tracker decides whether the open render pass survives, and the resulting
//! [`TransitionRequest`](transition::TransitionRequest) carries ready-to-record
//! `VkImageMemoryBarrier2`s with minimal synchronization derived from the access history kept in
//! [`tracking`].
//!
//! ### D3D12
//!
//! The [`d3d12`] module maps resource states, DSV flags, clear flags and depth-stencil pipeline
//! state onto tracker operations.

pub mod aspect;
pub mod batch;
mod config;
pub mod d3d12;
pub mod decay;
pub mod engine;
mod error;
pub mod resource;
mod tracker;
pub mod tracking;
pub mod transition;
pub mod utils;

pub use config::TrackerConfig;
pub use error::{Result, TrackingError};
pub use resource::{ImageInfo, ResourceId};
pub use tracker::{DepthStencilTracker, TrackerStats};

pub use ash;

pub mod prelude {
    pub use crate::{
        DepthStencilTracker, ImageInfo, ResourceId, TrackerConfig, TrackingError, ash,
        ash::vk,
        aspect::{Aspect, AspectPair, AspectState},
        engine::{DrawIntent, Operation},
        transition::{LayoutMode, TransitionRequest},
    };
}
