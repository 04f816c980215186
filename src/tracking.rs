//! Access history and pipeline barrier computation for one image aspect.
//!
//! Every layout transition the tracker emits is also a memory dependency. This module decides
//! the stage and access masks on both sides of that dependency. It keeps the smallest history
//! that gives a correct answer:
//!
//! - the last **write** to the aspect,
//! - the earliest pipeline stage that has **read** the aspect since that write.
//!
//! # Access Patterns
//!
//! An [`Access`] describes both **when** ([`vk::PipelineStageFlags2`]) and **how**
//! ([`vk::AccessFlags2`]) an aspect is used:
//!
//! ```
//! use scoria::tracking::Access;
//! use scoria::ash::vk;
//!
//! // Depth testing with writes enabled.
//! let write = Access::DEPTH_STENCIL_WRITE;
//! assert!(!write.is_readonly());
//!
//! // Sampling a depth texture in a fragment shader.
//! let sampled = Access {
//!     stage: vk::PipelineStageFlags2::FRAGMENT_SHADER,
//!     access: vk::AccessFlags2::SHADER_SAMPLED_READ,
//! };
//! assert!(sampled.is_readonly());
//! ```
//!
//! # Barriers with a layout transition
//!
//! A layout transition is itself a write. Going from a read-only layout to an attachment layout
//! therefore needs only an execution dependency on the earlier reads, but the destination access
//! mask must still cover the attachment write that follows:
//!
//! ```
//! use scoria::tracking::{Access, AccessHistory, MemoryBarrier};
//! use scoria::ash::vk;
//!
//! let mut history = AccessHistory::default();
//! history.record(Access::DEPTH_STENCIL_READ);
//! let barrier = history.transition(Access::DEPTH_STENCIL_WRITE, true);
//! assert_eq!(barrier.src.access, vk::AccessFlags2::empty());
//! assert_eq!(barrier.dst, Access::DEPTH_STENCIL_WRITE);
//! ```

use std::{
    cmp::Ordering,
    ops::{BitOr, BitOrAssign},
};

use ash::vk;

use crate::aspect::AspectState;

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Access {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
}
impl BitOr for Access {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self {
            stage: self.stage | rhs.stage,
            access: self.access | rhs.access,
        }
    }
}
impl BitOrAssign for Access {
    fn bitor_assign(&mut self, rhs: Self) {
        self.stage |= rhs.stage;
        self.access |= rhs.access;
    }
}

impl Access {
    pub const NONE: Access = Access {
        stage: vk::PipelineStageFlags2::NONE,
        access: vk::AccessFlags2::NONE,
    };
    /// Depth or stencil testing without writes.
    pub const DEPTH_STENCIL_READ: Access = Access {
        stage: FRAGMENT_TESTS,
        access: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
    };
    /// Depth or stencil testing with writes, attachment clears, and load-op clears.
    pub const DEPTH_STENCIL_WRITE: Access = Access {
        stage: FRAGMENT_TESTS,
        access: vk::AccessFlags2::from_raw(
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
                | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
        ),
    };
    /// Read-only attachment use that may also be sampled from the fragment shader.
    pub const DEPTH_STENCIL_SAMPLED_READ: Access = Access {
        stage: vk::PipelineStageFlags2::from_raw(
            FRAGMENT_TESTS.as_raw() | vk::PipelineStageFlags2::FRAGMENT_SHADER.as_raw(),
        ),
        access: vk::AccessFlags2::from_raw(
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
                | vk::AccessFlags2::SHADER_SAMPLED_READ.as_raw(),
        ),
    };

    /// The access an aspect explicitly placed in `state` is expected to see next.
    pub fn for_state(state: AspectState) -> Access {
        match state {
            AspectState::Undefined => Access::NONE,
            AspectState::ReadOnly => Access::DEPTH_STENCIL_SAMPLED_READ,
            AspectState::Writable => Access::DEPTH_STENCIL_WRITE,
        }
    }

    /// The same stages with only the write bits of the access mask.
    pub fn write_part(&self) -> Access {
        Access {
            stage: self.stage,
            access: self.access & utils::WRITE_BITS,
        }
    }

    fn only_within(&self, bits: vk::AccessFlags2) -> bool {
        !self.access.is_empty() && (self.access & !bits).is_empty()
    }

    /// Non-empty, and every access bit is a write.
    pub fn is_writeonly(&self) -> bool {
        self.only_within(utils::WRITE_BITS)
    }

    /// Non-empty, and every access bit is a read.
    pub fn is_readonly(&self) -> bool {
        self.only_within(utils::READ_BITS)
    }
}

const FRAGMENT_TESTS: vk::PipelineStageFlags2 = vk::PipelineStageFlags2::from_raw(
    vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw()
        | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw(),
);

/// The access history of one aspect of a depth-stencil image.
///
/// A layout transition consumes the history to produce the source half of its barrier and then
/// counts as the new last write.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct AccessHistory {
    /// The pipeline stage and access flags of the most recent write, layout transitions included.
    pub write: Access,

    /// Earliest stage that has read the aspect since `write`. Empty right after a write.
    pub reads: vk::PipelineStageFlags2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryBarrier {
    pub src: Access,
    pub dst: Access,
}
impl BitOr for MemoryBarrier {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self {
            src: self.src | rhs.src,
            dst: self.dst | rhs.dst,
        }
    }
}
impl BitOrAssign for MemoryBarrier {
    fn bitor_assign(&mut self, rhs: Self) {
        self.src |= rhs.src;
        self.dst |= rhs.dst;
    }
}
impl MemoryBarrier {
    pub fn is_empty(&self) -> bool {
        *self == MemoryBarrier::default()
    }

    /// A dependency that orders `src` stages before `dst` stages without making memory
    /// available.
    fn execution_only(src: vk::PipelineStageFlags2, dst: vk::PipelineStageFlags2) -> Self {
        MemoryBarrier {
            src: Access {
                stage: src,
                access: vk::AccessFlags2::NONE,
            },
            dst: Access {
                stage: dst,
                access: vk::AccessFlags2::NONE,
            },
        }
    }
}

impl AccessHistory {
    /// A history whose last write is `access`, for aspects entering tracking in a known state.
    pub fn new(access: Access) -> Self {
        Self {
            write: access,
            reads: vk::PipelineStageFlags2::empty(),
        }
    }

    /// Computes the minimal barrier between the recorded history and `next`, then records `next`.
    ///
    /// - Never accessed: nothing to wait on. With a layout transition the source is empty, and
    ///   without one no barrier is needed at all.
    /// - Read after read, no layout change: only needed if the new read happens at an earlier
    ///   stage than the reads already made visible.
    /// - Write after read: an execution dependency on the reads. The destination access is kept
    ///   when the layout changes.
    /// - Write after write: the full barrier from the last write.
    pub fn transition(&mut self, next: Access, layout_change: bool) -> MemoryBarrier {
        let after_write = MemoryBarrier {
            src: self.write,
            dst: next,
        };
        let barrier = if self.write == Access::NONE && self.reads.is_empty() {
            if layout_change {
                MemoryBarrier {
                    src: Access::NONE,
                    dst: next,
                }
            } else {
                MemoryBarrier::default()
            }
        } else if next.is_readonly() && !layout_change {
            match utils::compare_pipeline_stages(self.reads, next.stage) {
                Some(Ordering::Greater) => MemoryBarrier::execution_only(self.reads, next.stage),
                Some(_) => MemoryBarrier::default(),
                None => after_write,
            }
        } else if !self.reads.is_empty() {
            let mut barrier = MemoryBarrier::execution_only(self.reads, next.stage);
            if layout_change {
                barrier.dst.access = next.access;
            }
            barrier
        } else {
            after_write
        };

        if !layout_change {
            self.record(next);
            return barrier;
        }
        // The transition itself is the new last write, ordered before every stage of `next`.
        self.write = next.write_part();
        self.reads = if next.is_readonly() {
            next.stage
        } else {
            vk::PipelineStageFlags2::empty()
        };
        barrier
    }

    /// Records an access that needs no barrier, such as an attachment access inside the render
    /// pass that already established the layout.
    pub fn record(&mut self, next: Access) {
        if next == Access::NONE {
            return;
        }
        if next.is_readonly() {
            self.reads = utils::earlier_stage(self.reads, next.stage);
        } else {
            self.write = next.write_part();
            self.reads = vk::PipelineStageFlags2::empty();
        }
    }
}

mod utils {
    use std::cmp::Ordering;

    use ash::vk;

    /// Write bits an access to a depth-stencil aspect can carry.
    pub const WRITE_BITS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
        vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::TRANSFER_WRITE.as_raw()
            | vk::AccessFlags2::SHADER_WRITE.as_raw()
            | vk::AccessFlags2::MEMORY_WRITE.as_raw(),
    );
    /// Read bits an access to a depth-stencil aspect can carry.
    pub const READ_BITS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
        vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
            | vk::AccessFlags2::SHADER_SAMPLED_READ.as_raw()
            | vk::AccessFlags2::SHADER_READ.as_raw()
            | vk::AccessFlags2::INPUT_ATTACHMENT_READ.as_raw()
            | vk::AccessFlags2::TRANSFER_READ.as_raw()
            | vk::AccessFlags2::MEMORY_READ.as_raw(),
    );

    /// Graphics stages that may touch a depth-stencil image, in pipeline order.
    const STAGE_ORDER: [vk::PipelineStageFlags2; 7] = [
        vk::PipelineStageFlags2::VERTEX_SHADER,
        vk::PipelineStageFlags2::TESSELLATION_CONTROL_SHADER,
        vk::PipelineStageFlags2::TESSELLATION_EVALUATION_SHADER,
        vk::PipelineStageFlags2::GEOMETRY_SHADER,
        vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS,
        vk::PipelineStageFlags2::FRAGMENT_SHADER,
        vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
    ];

    fn first_stage(stages: vk::PipelineStageFlags2) -> Option<usize> {
        STAGE_ORDER.iter().position(|stage| stages.contains(*stage))
    }

    /// Orders two stage masks by the earliest stage each contains. `None` when either mask has
    /// no stage of the graphics order, such as compute or transfer.
    pub fn compare_pipeline_stages(
        a: vk::PipelineStageFlags2,
        b: vk::PipelineStageFlags2,
    ) -> Option<Ordering> {
        if a == b {
            return Some(Ordering::Equal);
        }
        Some(first_stage(a)?.cmp(&first_stage(b)?))
    }

    /// The earlier of two stage masks, or both of them when they are unordered.
    pub fn earlier_stage(
        a: vk::PipelineStageFlags2,
        b: vk::PipelineStageFlags2,
    ) -> vk::PipelineStageFlags2 {
        match compare_pipeline_stages(a, b) {
            Some(Ordering::Greater) => b,
            Some(_) => a,
            None => a | b,
        }
    }
}
