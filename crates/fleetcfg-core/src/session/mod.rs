//! Node lifecycle: session entry points invoked by the graph scheduler.
//!
//! [`Reconciler`] owns the snapshot state, the derivation rules, and the
//! drop-debugging config for the node's lifetime. The scheduler calls
//! [`Reconciler::begin_session`] at each session boundary, then either the
//! full-recompute entry point or one classification handler per watched
//! source. Handlers never invoke the full path themselves; an
//! [`Verdict::Escalate`] tells the scheduler to do so.
//!
//! # Failure semantics
//!
//! A commit failure aborts the session and rolls the snapshot state back
//! to its last-committed values. The node performs no retries; the
//! scheduler re-invokes the session.

use tracing::debug;

use crate::debug::DebugConfig;
use crate::engine::{
    DefaultRules, DerivationRules, NodeState, SessionInputs, Verdict, classify_northbound,
    classify_roster, classify_southbound, recompute,
};
use crate::gate;
use crate::options::OptionMap;
use crate::state::ConfigSnapshotState;
use crate::store::{CommitError, CommitSink, WriteSet};

/// The reconciliation node.
///
/// Exactly one session owns the node at a time; all entry points are
/// synchronous and non-blocking, with store I/O delegated to the
/// [`CommitSink`] supplied per call.
#[derive(Debug)]
pub struct Reconciler<R: DerivationRules = DefaultRules> {
    state: ConfigSnapshotState,
    rules: R,
    debug: DebugConfig,
}

impl Reconciler<DefaultRules> {
    /// Node with production derivation rules.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rules(DefaultRules::new())
    }
}

impl Default for Reconciler<DefaultRules> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: DerivationRules> Reconciler<R> {
    /// Node with injected derivation rules.
    #[must_use]
    pub fn with_rules(rules: R) -> Self {
        Self {
            state: ConfigSnapshotState::new(),
            rules,
            debug: DebugConfig::new(),
        }
    }

    /// Read access to the snapshot state.
    #[must_use]
    pub fn state(&self) -> &ConfigSnapshotState {
        &self.state
    }

    /// Read access to the drop-debugging config.
    #[must_use]
    pub fn debug_config(&self) -> &DebugConfig {
        &self.debug
    }

    /// Session-boundary reset of the tracked change signals.
    pub fn begin_session(&mut self) {
        self.state.clear_tracked();
    }

    /// Full derivation pass.
    ///
    /// # Errors
    ///
    /// Propagates the first commit failure; the snapshot state is rolled
    /// back so it keeps describing what the stores actually hold.
    pub fn run_full(
        &mut self,
        inputs: SessionInputs<'_>,
        sink: &mut dyn CommitSink,
    ) -> Result<NodeState, CommitError> {
        let saved = self.state.clone();
        let outcome = recompute(inputs, &mut self.rules, &mut self.state);
        self.commit(&outcome.writes, sink, saved)?;

        if outcome.debug_refresh {
            match inputs.northbound {
                Some(nb) => self.debug.reinit(&nb.options),
                None => self.debug.reinit(&OptionMap::new()),
            }
        }
        debug!("full derivation pass committed");
        Ok(outcome.node)
    }

    /// Handles an observed northbound-record change.
    ///
    /// # Errors
    ///
    /// Propagates commit failures with the state rolled back.
    pub fn handle_northbound_change(
        &mut self,
        inputs: SessionInputs<'_>,
        sink: &mut dyn CommitSink,
    ) -> Result<Verdict, CommitError> {
        let saved = self.state.clone();
        let outcome = classify_northbound(inputs.northbound, inputs.southbound, &mut self.state);
        self.commit(&outcome.writes, sink, saved)?;

        if outcome.debug_refresh {
            if let Some(nb) = inputs.northbound {
                self.debug.reinit(&nb.options);
            }
        }
        Ok(outcome.verdict)
    }

    /// Handles an observed southbound-record change.
    ///
    /// Pure classification: either our own write echoing back (absorbed)
    /// or external tamper (escalate). Never writes.
    #[must_use]
    pub fn handle_southbound_change(&self, inputs: SessionInputs<'_>) -> Verdict {
        classify_southbound(inputs.southbound, &self.state)
    }

    /// Handles an observed fleet-roster change.
    ///
    /// # Errors
    ///
    /// Propagates commit failures with the state rolled back.
    pub fn handle_roster_change(
        &mut self,
        inputs: SessionInputs<'_>,
        sink: &mut dyn CommitSink,
    ) -> Result<Verdict, CommitError> {
        let saved = self.state.clone();
        let outcome = classify_roster(inputs.roster, inputs.southbound, &mut self.state);
        self.commit(&outcome.writes, sink, saved)?;
        Ok(outcome.verdict)
    }

    /// Downstream gate over this node's tracked signals.
    #[must_use]
    pub fn may_skip(&self) -> bool {
        gate::may_skip(&self.state)
    }

    /// Applies `writes`, restoring `saved` state on failure so an aborted
    /// session leaves the node at its last-committed values.
    fn commit(
        &mut self,
        writes: &WriteSet,
        sink: &mut dyn CommitSink,
        saved: ConfigSnapshotState,
    ) -> Result<(), CommitError> {
        match writes.apply(sink) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.state = saved;
                Err(err)
            }
        }
    }
}
