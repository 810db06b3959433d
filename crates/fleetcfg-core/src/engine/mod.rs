//! Derivation engine and change classifier.
//!
//! The engine has one full-recompute path ([`recompute`]) and three
//! classification entry points, one per watched input source. Each
//! classifier inspects the session's deltas and returns a [`Verdict`]:
//! [`Verdict::Absorb`] when the change is handled with at most a minimal
//! mirror refresh, [`Verdict::Escalate`] when only a full recompute can
//! reconcile correctly.
//!
//! Classification correctness is the load-bearing property here: a false
//! `Absorb` causes silent configuration drift across the fleet, while a
//! false `Escalate` is merely wasted work. Every derived key is therefore
//! checked explicitly against the cached mirrors.
//!
//! All entry points are pure over their snapshot inputs plus the mutable
//! node state; writes are returned as a [`WriteSet`] for the session layer
//! to commit.

mod classify;
mod mirror;
mod recompute;

#[cfg(test)]
mod tests;

pub use classify::{
    NorthboundOutcome, RosterOutcome, classify_northbound, classify_roster, classify_southbound,
};
pub use mirror::build_southbound_options;
pub use recompute::{DefaultRules, DerivationRules, RecomputeOutcome, recompute};

use crate::fleet::FleetRoster;
use crate::store::{NorthboundRecord, SouthboundRecord};

/// Classification verdict for one observed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Handled without a full recompute; at most the change flags and the
    /// southbound overlay were refreshed.
    Absorb,
    /// A full recompute pass is required.
    Escalate,
}

/// Node output signal for the surrounding graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// The node's output changed; dependents must be re-evaluated.
    Updated,
    /// The node's output is unchanged.
    Unchanged,
}

/// Read-only snapshots supplied by the graph for one session.
#[derive(Debug, Clone, Copy)]
pub struct SessionInputs<'a> {
    /// Northbound desired-state record, if it exists upstream.
    pub northbound: Option<&'a NorthboundRecord>,
    /// Southbound operational record, if it exists downstream.
    pub southbound: Option<&'a SouthboundRecord>,
    /// Fleet agent roster with per-field change markers.
    pub roster: &'a FleetRoster,
}
