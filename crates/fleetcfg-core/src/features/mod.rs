//! Fleet-wide capability negotiation.
//!
//! Every non-remote agent advertises a fixed set of optional data-plane
//! behaviors. The control plane may rely on a behavior only if every such
//! agent supports it, so the negotiated [`FeatureSet`] is the AND-reduction
//! of all advertisements.
//!
//! # Invariants
//!
//! - Within one negotiation pass flags only flip true→false; a fresh pass
//!   always restarts from the all-enabled baseline.
//! - Remote agents never influence the result.
//! - [`FeatureSet::differs`] is exhaustive over every flag.

use serde::{Deserialize, Serialize};

use crate::fleet::FleetRoster;

/// Capability advertisement key for `ct_no_masked_label`.
pub const FEATURE_CT_NO_MASKED_LABEL: &str = "ct-no-masked-label";
/// Capability advertisement key for `mac_binding_timestamp`.
pub const FEATURE_MAC_BINDING_TIMESTAMP: &str = "mac-binding-timestamp";
/// Capability advertisement key for `ct_lb_related`.
pub const FEATURE_CT_LB_RELATED: &str = "ct-lb-related";
/// Capability advertisement key for `fdb_timestamp`.
pub const FEATURE_FDB_TIMESTAMP: &str = "fdb-timestamp";
/// Capability advertisement key for `ls_dpg_column`.
pub const FEATURE_LS_DPG_COLUMN: &str = "ls-dpg-column";
/// Capability advertisement key for `ct_commit_nat_v2`.
pub const FEATURE_CT_COMMIT_NAT_V2: &str = "ct-commit-nat-v2";
/// Capability advertisement key for `ct_commit_to_zone`.
pub const FEATURE_CT_COMMIT_TO_ZONE: &str = "ct-commit-to-zone";

/// The closed set of negotiated data-plane capabilities.
///
/// Each flag defaults to enabled and is cleared when any non-remote agent
/// fails to advertise it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureSet {
    /// Connection-tracking label matching without a mask.
    pub ct_no_masked_label: bool,
    /// Timestamped MAC-binding rows.
    pub mac_binding_timestamp: bool,
    /// Related-traffic handling for load-balanced connections.
    pub ct_lb_related: bool,
    /// Timestamped FDB rows.
    pub fdb_timestamp: bool,
    /// Datapath-group column support on logical switches.
    pub ls_dpg_column: bool,
    /// Second-generation NAT commit.
    pub ct_commit_nat_v2: bool,
    /// Zone-scoped connection commit.
    pub ct_commit_to_zone: bool,
}

impl FeatureSet {
    /// The all-enabled baseline every negotiation pass starts from.
    #[must_use]
    pub const fn all_enabled() -> Self {
        Self {
            ct_no_masked_label: true,
            mac_binding_timestamp: true,
            ct_lb_related: true,
            fdb_timestamp: true,
            ls_dpg_column: true,
            ct_commit_nat_v2: true,
            ct_commit_to_zone: true,
        }
    }

    /// Exhaustive flag-by-flag comparison.
    #[must_use]
    pub fn differs(&self, other: &Self) -> bool {
        // Destructure so a new flag cannot be forgotten here.
        let Self {
            ct_no_masked_label,
            mac_binding_timestamp,
            ct_lb_related,
            fdb_timestamp,
            ls_dpg_column,
            ct_commit_nat_v2,
            ct_commit_to_zone,
        } = *self;

        ct_no_masked_label != other.ct_no_masked_label
            || mac_binding_timestamp != other.mac_binding_timestamp
            || ct_lb_related != other.ct_lb_related
            || fdb_timestamp != other.fdb_timestamp
            || ls_dpg_column != other.ls_dpg_column
            || ct_commit_nat_v2 != other.ct_commit_nat_v2
            || ct_commit_to_zone != other.ct_commit_to_zone
    }
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self::all_enabled()
    }
}

/// Negotiates the fleet-wide feature set over `roster`.
///
/// AND-reduction: starting from the all-enabled baseline, each non-remote
/// agent that does not advertise a capability (absence reads as false)
/// clears the corresponding flag. Remote agents are skipped.
#[must_use]
pub fn negotiate(roster: &FleetRoster) -> FeatureSet {
    let mut features = FeatureSet::all_enabled();

    for agent in roster.iter() {
        // Remote agents don't consume this control plane's output.
        if agent.is_remote {
            continue;
        }

        let advertised = |key: &str| agent.capabilities.get_bool(key, false);

        features.ct_no_masked_label &= advertised(FEATURE_CT_NO_MASKED_LABEL);
        features.mac_binding_timestamp &= advertised(FEATURE_MAC_BINDING_TIMESTAMP);
        features.ct_lb_related &= advertised(FEATURE_CT_LB_RELATED);
        features.fdb_timestamp &= advertised(FEATURE_FDB_TIMESTAMP);
        features.ls_dpg_column &= advertised(FEATURE_LS_DPG_COLUMN);
        features.ct_commit_nat_v2 &= advertised(FEATURE_CT_COMMIT_NAT_V2);
        features.ct_commit_to_zone &= advertised(FEATURE_CT_COMMIT_TO_ZONE);
    }

    features
}

/// All capability advertisement keys, in [`FeatureSet`] field order.
pub const ALL_FEATURE_KEYS: &[&str] = &[
    FEATURE_CT_NO_MASKED_LABEL,
    FEATURE_MAC_BINDING_TIMESTAMP,
    FEATURE_CT_LB_RELATED,
    FEATURE_FDB_TIMESTAMP,
    FEATURE_LS_DPG_COLUMN,
    FEATURE_CT_COMMIT_NAT_V2,
    FEATURE_CT_COMMIT_TO_ZONE,
];
