//! Render pass boundaries.
//!
//! A batch is the run of draws and clears recorded into one render pass. It belongs to one
//! depth-stencil resource and commits to one pair of aspect layouts for its whole lifetime.
//! Operations that fit the committed pair fold into the batch. One that needs different layouts
//! splits it: the pass ends, the barrier is recorded, and a new pass begins.

use crate::{
    aspect::{AspectPair, AspectState},
    resource::ResourceId,
};

/// An open render pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    pub resource: ResourceId,
    /// The layouts the pass was begun with.
    pub layouts: AspectPair<AspectState>,
    /// Operations recorded into the pass so far.
    pub operations: u32,
    /// Aspects written by any operation in the pass.
    pub writes: AspectPair<bool>,
}

/// How an operation relates to the open batch.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BatchDecision {
    /// Recorded into the open batch.
    Fold,
    /// Begins a new batch. Any batch open on another resource ends first.
    Open,
    /// Ends the batch open on the same resource and begins a new one after the transition.
    Split,
}

enum BatchState {
    OutsideBatch,
    InsideBatch(Batch),
}

pub struct BatchTracker {
    state: BatchState,
}

impl Default for BatchTracker {
    fn default() -> Self {
        Self {
            state: BatchState::OutsideBatch,
        }
    }
}

impl BatchTracker {
    pub fn current(&self) -> Option<&Batch> {
        match &self.state {
            BatchState::OutsideBatch => None,
            BatchState::InsideBatch(batch) => Some(batch),
        }
    }
    pub fn is_open_on(&self, resource: ResourceId) -> bool {
        self.current().is_some_and(|batch| batch.resource == resource)
    }

    /// Decides where a rendering operation on `resource` goes.
    pub fn decide(&self, resource: ResourceId, changes_layout: bool) -> BatchDecision {
        match self.current() {
            Some(batch) if batch.resource == resource => {
                if changes_layout {
                    BatchDecision::Split
                } else {
                    BatchDecision::Fold
                }
            }
            _ => BatchDecision::Open,
        }
    }

    /// Ends the open batch, returning it.
    pub fn close(&mut self) -> Option<Batch> {
        match std::mem::replace(&mut self.state, BatchState::OutsideBatch) {
            BatchState::OutsideBatch => None,
            BatchState::InsideBatch(batch) => Some(batch),
        }
    }

    /// Begins a batch on `resource` committed to `layouts`. The caller closes the previous one.
    pub fn open(&mut self, resource: ResourceId, layouts: AspectPair<AspectState>) {
        debug_assert!(self.current().is_none(), "a batch is already open");
        self.state = BatchState::InsideBatch(Batch {
            resource,
            layouts,
            operations: 0,
            writes: AspectPair::default(),
        });
    }

    /// Records an operation into the open batch.
    pub fn record(&mut self, writes: AspectPair<bool>) {
        if let BatchState::InsideBatch(batch) = &mut self.state {
            batch.operations += 1;
            batch.writes.depth |= writes.depth;
            batch.writes.stencil |= writes.stencil;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ImageInfo, ResourceTable};
    use ash::vk::{self, Handle};

    fn two_resources() -> (ResourceId, ResourceId) {
        let mut table = ResourceTable::new();
        let info = ImageInfo::new(
            vk::Image::from_raw(1),
            vk::Format::D24_UNORM_S8_UINT,
            vk::Extent2D {
                width: 8,
                height: 8,
            },
        );
        (table.insert(&info).unwrap(), table.insert(&info).unwrap())
    }

    #[test]
    fn test_decisions() {
        let (a, b) = two_resources();
        let mut batches = BatchTracker::default();
        assert_eq!(batches.decide(a, false), BatchDecision::Open);
        batches.open(a, AspectPair::splat(AspectState::ReadOnly));
        assert_eq!(batches.decide(a, false), BatchDecision::Fold);
        assert_eq!(batches.decide(a, true), BatchDecision::Split);
        assert_eq!(batches.decide(b, false), BatchDecision::Open);
        assert!(batches.is_open_on(a));
        assert!(!batches.is_open_on(b));
    }

    #[test]
    fn test_record_and_close() {
        let (a, _) = two_resources();
        let mut batches = BatchTracker::default();
        batches.record(AspectPair::splat(true));
        assert!(batches.close().is_none());

        batches.open(a, AspectPair::splat(AspectState::Writable));
        batches.record(AspectPair::new(true, false));
        batches.record(AspectPair::new(false, false));
        let batch = batches.close().unwrap();
        assert_eq!(batch.operations, 2);
        assert_eq!(batch.writes, AspectPair::new(true, false));
        assert!(batches.current().is_none());
    }
}
