//! Snapshot state owned by the reconciliation node.
//!
//! [`ConfigSnapshotState`] holds the last-reconciled copies of both option
//! mappings, the negotiated feature set, and the per-session tracked
//! delta. It is created once at node initialization, mutated by every
//! derivation or classification pass, and discarded at teardown.
//!
//! # Invariants
//!
//! - `sb_mirror` is always a pure function of `(nb_mirror, features,
//!   southbound-local overrides)`; nothing mutates it independently.
//! - `monitor_address` persists across sessions unless the upstream value
//!   is absent or malformed, in which case derivation regenerates it.
//! - `delta` flags are write-once per session: classification sets them,
//!   only [`ConfigSnapshotState::clear_tracked`] (the session-boundary
//!   reset) clears them. Full recompute never touches them.

use serde::{Deserialize, Serialize};

use crate::features::FeatureSet;
use crate::mac::EthAddr;
use crate::options::OptionMap;

/// Minimal "what changed" signal exposed to dependent nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackedDelta {
    /// A passthrough option consumed by dependents changed.
    pub options_changed: bool,
    /// The negotiated feature set changed.
    pub capabilities_changed: bool,
}

/// Last-reconciled configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSnapshotState {
    /// Last-seen northbound options; the comparison baseline for
    /// classification (not the live record).
    pub nb_mirror: OptionMap,
    /// Last-published southbound options; used to detect external tamper.
    pub sb_mirror: OptionMap,
    /// Derived service-monitor hardware address.
    pub monitor_address: Option<EthAddr>,
    /// Negotiated fleet-wide feature set.
    pub features: FeatureSet,
    /// The version marker changed during the last full derivation.
    ///
    /// Internal signal, distinct from [`TrackedDelta::options_changed`].
    pub internal_version_changed: bool,
    /// A classification pass absorbed a change this session.
    pub changed: bool,
    /// Per-session minimal change flags consumed via the downstream gate.
    pub delta: TrackedDelta,
}

impl ConfigSnapshotState {
    /// Fresh node state: empty mirrors, all features enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nb_mirror: OptionMap::new(),
            sb_mirror: OptionMap::new(),
            monitor_address: None,
            features: FeatureSet::all_enabled(),
            internal_version_changed: false,
            changed: false,
            delta: TrackedDelta::default(),
        }
    }

    /// Session-boundary reset of the tracked signals.
    ///
    /// Called by the scheduler before each session; mirrors, features and
    /// the monitor address persist.
    pub fn clear_tracked(&mut self) {
        self.changed = false;
        self.delta = TrackedDelta::default();
    }
}

impl Default for ConfigSnapshotState {
    fn default() -> Self {
        Self::new()
    }
}
