//! Closed catalogues of northbound option keys the reconciler inspects.
//!
//! Self-managed keys hold values this node derives itself; any external
//! edit to one of them forces a full recompute so the value is re-derived
//! rather than trusted. Passthrough keys are operational tunables consumed
//! by dependent nodes; the reconciler only reports that they changed.

/// Derived hardware-address prefix.
pub const MAC_PREFIX: &str = "mac_prefix";
/// Generated service-monitor hardware address (self-healing).
pub const SVC_MONITOR_MAC: &str = "svc_monitor_mac";
/// Fleet-wide maximum tunnel/datapath key identifier.
pub const MAX_TUNID: &str = "max_tunid";
/// Operator override: skip capability negotiation entirely.
pub const IGNORE_CHASSIS_FEATURES: &str = "ignore_chassis_features";
/// Version marker for the software producing the derivation.
pub const INTERNAL_VERSION: &str = "northd_internal_version";

/// Southbound-only overlay: whether load-balancer flows may use ct_mark.
pub const LB_HAIRPIN_USE_CT_MARK: &str = "lb_hairpin_use_ct_mark";
/// Southbound-only passthrough: externally-set probe interval.
pub const SBCTL_PROBE_INTERVAL: &str = "sbctl_probe_interval";
/// Southbound-only marker: this node performs explicit post-processing.
pub const ARP_NS_EXPLICIT_OUTPUT: &str = "arp_ns_explicit_output";

/// Drop-debugging domain identifier (reinitializes the debug collaborator
/// on change).
pub const DEBUG_DROP_DOMAIN_ID: &str = "debug_drop_domain_id";
/// Drop-debugging collector set (reinitializes the debug collaborator on
/// change).
pub const DEBUG_DROP_COLLECTOR_SET: &str = "debug_drop_collector_set";

/// Self-managed keys with their must-be-present comparison policy, in
/// classification order.
pub const SELF_MANAGED: &[(&str, bool)] = &[
    (SVC_MONITOR_MAC, true),
    (MAX_TUNID, true),
    (MAC_PREFIX, true),
    (IGNORE_CHASSIS_FEATURES, false),
    (INTERNAL_VERSION, false),
];

/// Passthrough tunables consumed by dependent nodes. A divergence here is
/// absorbable but must be reported through the tracked delta.
pub const PASSTHROUGH: &[&str] = &[
    "mac_binding_removal_limit",
    "fdb_removal_limit",
    "controller_event",
    "ignore_lsp_down",
    "use_ct_inv_match",
    "default_acl_drop",
    DEBUG_DROP_DOMAIN_ID,
    DEBUG_DROP_COLLECTOR_SET,
    "use_common_zone",
    "install_ls_lb_from_router",
    "bcast_arp_req_flood",
];

/// The passthrough keys whose change additionally reinitializes the
/// drop-debugging collaborator.
pub const DEBUG: &[&str] = &[DEBUG_DROP_DOMAIN_ID, DEBUG_DROP_COLLECTOR_SET];
