/// Progress of a node through the four graph passes.
///
/// The states form a forward-only cycle: `Stale` is left by evaluation,
/// `Committed` is entered by a weight update and behaves like `Stale` for the
/// next evaluation, so an updated node is recomputed exactly once even though
/// its inputs did not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// The value buffer does not reflect the current inputs.
    Stale,
    /// The value buffer is up to date.
    Evaluated,
    /// The delta buffer holds the gradient for the current values.
    GradientsReady,
    /// A weight update was staged but not yet applied to the live parameters.
    Adjusted,
    /// The live parameters changed; the value buffer must be recomputed once.
    Committed,
}

/// Per-node memoization record deciding whether a pass may skip the node.
#[derive(Debug, Clone)]
pub(crate) struct StatusTracker {
    state: PassState,
    generation: u64,
}

impl StatusTracker {
    pub(crate) fn new() -> Self {
        StatusTracker {
            state: PassState::Stale,
            generation: 0,
        }
    }

    pub(crate) fn state(&self) -> PassState {
        self.state
    }

    /// Number of times the node's value buffer has been (re)computed.
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// True when the next evaluation pass must visit this node.
    pub(crate) fn requires_evaluation(&self) -> bool {
        matches!(self.state, PassState::Stale | PassState::Committed)
    }

    /// Resets the node so the next evaluation recomputes it. Idempotent.
    pub(crate) fn mark_stale(&mut self) {
        self.state = PassState::Stale;
    }

    pub(crate) fn mark_evaluated(&mut self) {
        assert!(
            self.requires_evaluation(),
            "evaluated a node that was already {:?}",
            self.state
        );
        self.state = PassState::Evaluated;
        self.generation += 1;
    }

    /// Invalidates prior gradient work at the start of an accumulation pass.
    ///
    /// An `Adjusted` node is accepted: a staged update leaves the live
    /// parameters untouched, so its value buffer is still current.
    ///
    /// # Panics
    ///
    /// Panics if the node was never evaluated for its current inputs, i.e. the
    /// driver skipped the evaluation pass.
    pub(crate) fn reset_gradients(&mut self) {
        match self.state {
            PassState::Evaluated => {}
            PassState::GradientsReady | PassState::Adjusted => {
                self.state = PassState::Evaluated;
            }
            other => panic!(
                "gradient accumulation requires an evaluated graph (node is {:?})",
                other
            ),
        }
    }

    pub(crate) fn mark_gradients_ready(&mut self) {
        assert!(
            self.state == PassState::Evaluated,
            "gradients accumulated out of order (node is {:?})",
            self.state
        );
        self.state = PassState::GradientsReady;
    }

    pub(crate) fn mark_adjusted(&mut self) {
        assert!(
            self.state == PassState::GradientsReady,
            "weight adjustment requires accumulated gradients (node is {:?})",
            self.state
        );
        self.state = PassState::Adjusted;
    }

    /// Records that the live parameters changed.
    ///
    /// Accepts any prior state: a staged update may be committed many passes
    /// after the adjustment that staged it, with evaluations in between.
    pub(crate) fn mark_committed(&mut self) {
        self.state = PassState::Committed;
    }
}
