//! Southbound options overlay builder.

use crate::features::FeatureSet;
use crate::options::{OptionMap, keys};

/// Builds the southbound options mirror from the cached northbound mirror
/// and the negotiated feature set.
///
/// The mirror is the northbound mapping with three adjustments:
/// - agents are told not to use ct_mark for hairpin load balancing unless
///   every agent supports unmasked ct labels (absence means enabled);
/// - `sbctl_probe_interval` is passed through from the live southbound
///   record when present, an intentional exception to the mirror being
///   northbound-derived, since that key is set on the southbound side
///   directly;
/// - a fixed marker advertises that this node emits explicit
///   post-processing output.
#[must_use]
pub fn build_southbound_options(
    nb_mirror: &OptionMap,
    features: &FeatureSet,
    live_southbound: Option<&OptionMap>,
) -> OptionMap {
    let mut options = nb_mirror.clone();

    if features.ct_no_masked_label {
        options.remove(keys::LB_HAIRPIN_USE_CT_MARK);
    } else {
        options.replace(keys::LB_HAIRPIN_USE_CT_MARK, "false");
    }

    if let Some(interval) = live_southbound.and_then(|sb| sb.get(keys::SBCTL_PROBE_INTERVAL)) {
        options.replace(keys::SBCTL_PROBE_INTERVAL, interval);
    }

    options.replace(keys::ARP_NS_EXPLICIT_OUTPUT, "true");

    options
}
