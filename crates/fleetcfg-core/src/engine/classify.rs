//! Change classification for the three watched input sources.
//!
//! Each classifier decides whether an observed delta is absorbable or must
//! escalate to the full derivation path. The classifiers update the
//! session's tracked flags and return the minimal writes needed for an
//! absorbed change; they never perform derivation themselves.

use tracing::{debug, warn};

use super::{NodeState, Verdict, mirror};
use crate::features;
use crate::fleet::FleetRoster;
use crate::options::{self, keys};
use crate::state::ConfigSnapshotState;
use crate::store::{NorthboundRecord, SouthboundRecord, WriteSet};

/// Outcome of the northbound-record classification.
#[derive(Debug, Clone)]
pub struct NorthboundOutcome {
    /// Absorb or escalate.
    pub verdict: Verdict,
    /// Node output signal (only [`NodeState::Updated`] when a change was
    /// absorbed into the mirrors).
    pub node: NodeState,
    /// Writes to commit regardless of the verdict (the encryption mirror
    /// is synced even when escalating).
    pub writes: WriteSet,
    /// The drop-debugging collaborator must be reinitialized.
    pub debug_refresh: bool,
}

impl NorthboundOutcome {
    fn noop(verdict: Verdict) -> Self {
        Self {
            verdict,
            node: NodeState::Unchanged,
            writes: WriteSet::default(),
            debug_refresh: false,
        }
    }
}

/// Classifies a northbound-record change.
///
/// Escalates when the record is absent, when the southbound record it
/// mirrors into is absent, or when any self-managed key was tampered with
/// externally (those values are engine-owned and must be re-derived).
/// Passthrough-key changes are absorbed with `delta.options_changed` set.
pub fn classify_northbound(
    northbound: Option<&NorthboundRecord>,
    southbound: Option<&SouthboundRecord>,
    state: &mut ConfigSnapshotState,
) -> NorthboundOutcome {
    let Some(nb) = northbound else {
        return NorthboundOutcome::noop(Verdict::Escalate);
    };
    let Some(sb) = southbound else {
        return NorthboundOutcome::noop(Verdict::Escalate);
    };

    // Only the encryption flag and the options column matter here.
    if !nb.delta.encryption_touched && !nb.delta.options_touched {
        return NorthboundOutcome::noop(Verdict::Absorb);
    }

    let mut writes = WriteSet::default();
    if nb.encryption != sb.encryption {
        writes.southbound_encryption = Some(nb.encryption);
    }

    state.changed = true;

    if nb.options == state.nb_mirror {
        return NorthboundOutcome {
            verdict: Verdict::Absorb,
            node: NodeState::Unchanged,
            writes,
            debug_refresh: false,
        };
    }

    // Self-managed keys are derived by this node; an external edit to one
    // of them can only be reconciled by re-deriving.
    for &(key, must_be_present) in keys::SELF_MANAGED {
        if options::is_out_of_sync(&nb.options, &state.nb_mirror, key, must_be_present) {
            warn!(key, "self-managed option out of sync, escalating");
            return NorthboundOutcome {
                verdict: Verdict::Escalate,
                node: NodeState::Unchanged,
                writes,
                debug_refresh: false,
            };
        }
    }

    let mut options_changed = false;
    for &key in keys::PASSTHROUGH {
        if options::is_out_of_sync(&nb.options, &state.nb_mirror, key, false) {
            debug!(key, "passthrough option changed");
            options_changed = true;
        }
    }
    // Checked independently of the passthrough scan so an earlier hit
    // cannot mask the reinitialization.
    let debug_refresh = keys::DEBUG
        .iter()
        .any(|key| options::is_out_of_sync(&nb.options, &state.nb_mirror, key, false));

    if options_changed {
        state.delta.options_changed = true;
    }

    state.nb_mirror = nb.options.clone();

    let sb_mirror =
        mirror::build_southbound_options(&state.nb_mirror, &state.features, Some(&sb.options));
    if sb_mirror != sb.options {
        writes.southbound_options = Some(sb_mirror.clone());
    }
    state.sb_mirror = sb_mirror;

    NorthboundOutcome {
        verdict: Verdict::Absorb,
        node: NodeState::Updated,
        writes,
        debug_refresh,
    }
}

/// Classifies a southbound-record change.
///
/// The southbound options are a pure function of this node's state, so a
/// live mapping equal to the cached mirror is our own write echoing back
/// and is absorbed silently. Anything else means an external actor
/// mutated the operational mirror; never overwrite that blindly, instead
/// escalate and reconcile from scratch.
#[must_use]
pub fn classify_southbound(
    southbound: Option<&SouthboundRecord>,
    state: &ConfigSnapshotState,
) -> Verdict {
    let Some(sb) = southbound else {
        return Verdict::Escalate;
    };

    if sb.options == state.sb_mirror {
        Verdict::Absorb
    } else {
        warn!("southbound options modified externally, escalating");
        Verdict::Escalate
    }
}

/// Outcome of the roster classification.
#[derive(Debug, Clone)]
pub struct RosterOutcome {
    /// Absorb or escalate.
    pub verdict: Verdict,
    /// Node output signal.
    pub node: NodeState,
    /// Southbound overlay refresh, when the feature set changed.
    pub writes: WriteSet,
}

impl RosterOutcome {
    fn noop(verdict: Verdict) -> Self {
        Self {
            verdict,
            node: NodeState::Unchanged,
            writes: WriteSet::default(),
        }
    }
}

/// Classifies a fleet-roster change.
///
/// Agent arrivals, departures and transport changes escalate: they can
/// affect the fleet key-space and anything else derived from the roster.
/// A pure capability-advertisement change is absorbed by re-negotiating
/// the feature set from scratch (negotiation always needs the full
/// roster, never an incremental view) and refreshing the southbound
/// overlay that depends on it.
pub fn classify_roster(
    roster: &FleetRoster,
    southbound: Option<&SouthboundRecord>,
    state: &mut ConfigSnapshotState,
) -> RosterOutcome {
    // Only agents carrying change markers can affect the verdict.
    if roster.tracked().any(|a| a.transport_changed()) {
        debug!("agent roster membership or transport changed, escalating");
        return RosterOutcome::noop(Verdict::Escalate);
    }

    if state
        .nb_mirror
        .get_bool(keys::IGNORE_CHASSIS_FEATURES, false)
    {
        return RosterOutcome::noop(Verdict::Absorb);
    }

    if !roster.tracked().any(|a| a.delta.capabilities_updated) {
        return RosterOutcome::noop(Verdict::Absorb);
    }

    // Re-negotiate from the all-enabled baseline; within a pass flags only
    // ever flip to false.
    let negotiated = features::negotiate(roster);
    if !state.features.differs(&negotiated) {
        return RosterOutcome::noop(Verdict::Absorb);
    }

    // The overlay refresh needs a southbound record to compare against;
    // creating one belongs to the full path.
    let Some(sb) = southbound else {
        return RosterOutcome::noop(Verdict::Escalate);
    };

    debug!("negotiated feature set changed, refreshing overlay");
    state.features = negotiated;
    state.delta.capabilities_changed = true;
    state.changed = true;

    let mut writes = WriteSet::default();
    let sb_mirror =
        mirror::build_southbound_options(&state.nb_mirror, &state.features, Some(&sb.options));
    if sb_mirror != sb.options {
        writes.southbound_options = Some(sb_mirror.clone());
    }
    state.sb_mirror = sb_mirror;

    RosterOutcome {
        verdict: Verdict::Absorb,
        node: NodeState::Updated,
        writes,
    }
}
