//! Downstream skip gate.
//!
//! Dependent nodes consult this predicate to decide whether they may skip
//! their own recompute for the session. The gate is deliberately
//! conservative: when nothing was tracked at all, dependents must not
//! assume "no signal" means "no change"; they recompute instead.

use crate::state::ConfigSnapshotState;

/// Whether a dependent node may safely skip its own recompute.
///
/// True only when a change was absorbed this session and neither the
/// passthrough options nor the negotiated capabilities changed: something
/// happened, and none of it matters to dependents. False in
/// every other case, including a session with no tracked change.
#[must_use]
pub fn may_skip(state: &ConfigSnapshotState) -> bool {
    state.changed && !state.delta.capabilities_changed && !state.delta.options_changed
}
