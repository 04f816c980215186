//! Transition rules: what each operation needs from each aspect, and the state changes that
//! satisfy those needs.
//!
//! The rules are pure. They look at one operation and one state pair and never fail: an
//! operation naming an aspect the image does not have is rejected by the tracker before it gets
//! here.
//!
//! | operation            | aspect need                                                   |
//! |----------------------|---------------------------------------------------------------|
//! | draw, write enabled  | at least `Writable`                                           |
//! | draw, test only      | at least `ReadOnly`                                           |
//! | clear                | at least `Writable`, may discard when covering the whole image |
//! | discard              | at least `Writable`, discards                                 |
//! | explicit transition  | exactly the target                                            |
//!
//! "At least" needs are satisfied without a transition by a more permissive state, so a draw
//! that only tests depth never demotes an aspect promoted by an earlier write.

use ash::vk;

use crate::{
    aspect::{Aspect, AspectPair, AspectState},
    tracking::Access,
};

/// The depth and stencil usage of one draw.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct DrawIntent {
    pub depth_test: bool,
    pub depth_write: bool,
    pub stencil_test: bool,
    pub stencil_write: bool,
}

impl DrawIntent {
    pub fn new(
        depth_write: bool,
        depth_test: bool,
        stencil_write: bool,
        stencil_test: bool,
    ) -> Self {
        Self {
            depth_test,
            depth_write,
            stencil_test,
            stencil_write,
        }
    }
    pub fn writes(&self) -> AspectPair<bool> {
        AspectPair::new(self.depth_write, self.stencil_write)
    }
    /// A write implies the aspect is also read by the test.
    pub fn reads(&self) -> AspectPair<bool> {
        AspectPair::new(
            self.depth_test || self.depth_write,
            self.stencil_test || self.stencil_write,
        )
    }
    /// Drops usage of aspects for which `keep` is false.
    pub fn masked(self, keep: AspectPair<bool>) -> Self {
        Self {
            depth_test: self.depth_test && keep.depth,
            depth_write: self.depth_write && keep.depth,
            stencil_test: self.stencil_test && keep.stencil,
            stencil_write: self.stencil_write && keep.stencil,
        }
    }
}

/// A recorded command that touches a depth-stencil image.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operation {
    Draw(DrawIntent),
    /// Clears the named aspects within `rect`, or the whole image when `rect` is `None`.
    Clear {
        depth: bool,
        stencil: bool,
        rect: Option<vk::Rect2D>,
    },
    /// Marks the contents of the named aspects as no longer needed.
    Discard { depth: bool, stencil: bool },
    /// Caller-declared states. `None` leaves an aspect untouched.
    Transition {
        depth: Option<AspectState>,
        stencil: Option<AspectState>,
    },
}

impl Operation {
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Draw(_) => "draw",
            Operation::Clear { .. } => "clear",
            Operation::Discard { .. } => "discard",
            Operation::Transition { .. } => "transition",
        }
    }
    /// Aspects the operation explicitly names. Draws name the aspects they test or write.
    pub fn named_aspects(&self) -> AspectPair<bool> {
        match *self {
            Operation::Draw(intent) => intent.reads(),
            Operation::Clear { depth, stencil, .. } | Operation::Discard { depth, stencil } => {
                AspectPair::new(depth, stencil)
            }
            Operation::Transition { depth, stencil } => {
                AspectPair::new(depth.is_some(), stencil.is_some())
            }
        }
    }
    /// Aspects whose contents the operation writes.
    pub fn writes(&self) -> AspectPair<bool> {
        match *self {
            Operation::Draw(intent) => intent.writes(),
            Operation::Clear { depth, stencil, .. } => AspectPair::new(depth, stencil),
            Operation::Discard { .. } | Operation::Transition { .. } => AspectPair::default(),
        }
    }
    /// Explicit transitions always end the open batch.
    pub fn is_explicit(&self) -> bool {
        matches!(self, Operation::Transition { .. })
    }
    /// Operations recorded inside a render pass.
    pub fn is_rendering(&self) -> bool {
        matches!(self, Operation::Draw(_) | Operation::Clear { .. })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Requirement {
    None,
    /// Satisfied by the given state or a more permissive one.
    AtLeast(AspectState),
    /// Satisfied only by the given state.
    Exactly(AspectState),
}

impl Requirement {
    /// The state an aspect currently in `current` must move to, if any.
    pub fn resolve(self, current: AspectState) -> Option<AspectState> {
        match self {
            Requirement::None => None,
            Requirement::AtLeast(state) if current.satisfies(state) => None,
            Requirement::AtLeast(state) => Some(state),
            Requirement::Exactly(state) if current == state => None,
            Requirement::Exactly(state) => Some(state),
        }
    }
}

/// What an operation needs from one aspect.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AspectNeed {
    pub requirement: Requirement,
    /// A transition made for this need may drop the previous contents.
    pub discard: bool,
    /// How the operation accesses the aspect once it is in the right state.
    pub access: Access,
}

impl AspectNeed {
    pub const NONE: AspectNeed = AspectNeed {
        requirement: Requirement::None,
        discard: false,
        access: Access::NONE,
    };
}

/// A state change decided for one aspect.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Change {
    pub to: AspectState,
    pub discard: bool,
}

/// Derives per-aspect needs. `covers_image` tells whether a clear reaches every texel and may
/// therefore drop what was there before.
pub fn needs(op: &Operation, covers_image: bool) -> AspectPair<AspectNeed> {
    match *op {
        Operation::Draw(intent) => intent.writes().map(|aspect, write| {
            if write {
                AspectNeed {
                    requirement: Requirement::AtLeast(AspectState::Writable),
                    discard: false,
                    access: Access::DEPTH_STENCIL_WRITE,
                }
            } else if intent.reads()[aspect] {
                AspectNeed {
                    requirement: Requirement::AtLeast(AspectState::ReadOnly),
                    discard: false,
                    access: Access::DEPTH_STENCIL_READ,
                }
            } else {
                AspectNeed::NONE
            }
        }),
        Operation::Clear { depth, stencil, .. } => {
            AspectPair::new(depth, stencil).map(|_, cleared| {
                if cleared {
                    AspectNeed {
                        requirement: Requirement::AtLeast(AspectState::Writable),
                        discard: covers_image,
                        access: Access::DEPTH_STENCIL_WRITE,
                    }
                } else {
                    AspectNeed::NONE
                }
            })
        }
        Operation::Discard { depth, stencil } => {
            AspectPair::new(depth, stencil).map(|_, discarded| {
                if discarded {
                    AspectNeed {
                        requirement: Requirement::AtLeast(AspectState::Writable),
                        discard: true,
                        access: Access::DEPTH_STENCIL_WRITE,
                    }
                } else {
                    AspectNeed::NONE
                }
            })
        }
        Operation::Transition { depth, stencil } => {
            AspectPair::new(depth, stencil).map(|_, target| match target {
                Some(target) => AspectNeed {
                    requirement: Requirement::Exactly(target),
                    discard: false,
                    access: Access::for_state(target),
                },
                None => AspectNeed::NONE,
            })
        }
    }
}

/// Resolves `needs` against the current states. Leaving `Undefined` always discards, since
/// there is nothing to keep.
pub fn resolve(
    needs: &AspectPair<AspectNeed>,
    states: AspectPair<AspectState>,
) -> AspectPair<Option<Change>> {
    states.map(|aspect: Aspect, current| {
        let need = needs[aspect];
        need.requirement.resolve(current).map(|to| Change {
            to,
            discard: need.discard || !current.is_defined(),
        })
    })
}
