//! Errors reported by the tracker.

use ash::vk;

use crate::{aspect::Aspect, d3d12::ResourceStates, resource::ResourceId};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackingError {
    #[error("resource {0} is not tracked")]
    UnknownResource(ResourceId),
    #[error("{0:?} is not a depth-stencil format")]
    NotDepthStencilFormat(vk::Format),
    #[error("resource {resource} has no {aspect} aspect")]
    MissingAspect { resource: ResourceId, aspect: Aspect },
    #[error("subresource {subresource} is out of range for resource {resource}")]
    InvalidSubresource {
        resource: ResourceId,
        subresource: u32,
    },
    #[error("resource state {0:?} has no depth-stencil layout")]
    UnsupportedResourceState(ResourceStates),
}

pub type Result<T> = std::result::Result<T, TrackingError>;
