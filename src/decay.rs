//! When write-optimal layouts relax back to read-only.
//!
//! Decay never happens behind the caller's back. An aspect stays `Writable` across any number of
//! draws and batches until either an explicit transition names it with a read-only target, or
//! the recording finishes and [`TrackerConfig::decay_on_finish`](crate::TrackerConfig) asks for
//! every writable aspect to return to the resting state. The next recording then starts from the
//! read-only assumption again.

use crate::{
    aspect::{AspectPair, AspectState},
    config::TrackerConfig,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DecayPolicy {
    resting_state: AspectState,
    on_finish: bool,
}

impl DecayPolicy {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            resting_state: config.resting_state,
            on_finish: config.decay_on_finish,
        }
    }

    pub fn resting_state(&self) -> AspectState {
        self.resting_state
    }

    /// Returns true if moving an aspect from `from` to `to` relaxes a write layout.
    pub fn is_decay(from: AspectState, to: AspectState) -> bool {
        from == AspectState::Writable && to != AspectState::Writable
    }

    /// The explicit targets that normalize `states` at the end of a recording, or `None` if
    /// nothing needs to move. Absent aspects are `None` in `states`.
    pub fn finish_targets(
        &self,
        states: AspectPair<Option<AspectState>>,
    ) -> Option<AspectPair<Option<AspectState>>> {
        if !self.on_finish || self.resting_state == AspectState::Writable {
            return None;
        }
        let targets = states.map(|_, state| {
            state
                .filter(|state| state.is_writable())
                .map(|_| self.resting_state)
        });
        (targets.depth.is_some() || targets.stencil.is_some()).then_some(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AspectState::*;

    #[test]
    fn test_is_decay() {
        assert!(DecayPolicy::is_decay(Writable, ReadOnly));
        assert!(DecayPolicy::is_decay(Writable, Undefined));
        assert!(!DecayPolicy::is_decay(ReadOnly, Writable));
        assert!(!DecayPolicy::is_decay(ReadOnly, ReadOnly));
    }

    #[test]
    fn test_finish_targets_only_writable() {
        let policy = DecayPolicy::new(&TrackerConfig::default());
        assert_eq!(
            policy.finish_targets(AspectPair::new(Some(Writable), Some(ReadOnly))),
            Some(AspectPair::new(Some(ReadOnly), None))
        );
        assert_eq!(
            policy.finish_targets(AspectPair::new(Some(ReadOnly), Some(Undefined))),
            None
        );
        assert_eq!(
            policy.finish_targets(AspectPair::new(Some(Writable), None)),
            Some(AspectPair::new(Some(ReadOnly), None))
        );
    }

    #[test]
    fn test_finish_disabled() {
        let policy = DecayPolicy::new(&TrackerConfig {
            decay_on_finish: false,
            ..Default::default()
        });
        assert_eq!(
            policy.finish_targets(AspectPair::splat(Some(Writable))),
            None
        );
        let policy = DecayPolicy::new(&TrackerConfig {
            resting_state: Writable,
            ..Default::default()
        });
        assert_eq!(
            policy.finish_targets(AspectPair::splat(Some(Writable))),
            None
        );
    }
}
