//! Full derivation path.
//!
//! Rebuilds every locally-owned value (hardware-address prefix, monitor
//! address, fleet key-space, version marker), replaces the cached mirrors,
//! re-negotiates the feature set, and queues the store writes needed to
//! bring both records in line. Absent records are not an error; creation
//! is queued and derivation proceeds against empty snapshots. Malformed
//! derived values are not fatal; they trigger regeneration (self-healing).

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, warn};

use super::{NodeState, SessionInputs, mirror};
use crate::features::{self, FeatureSet};
use crate::mac::EthAddr;
use crate::options::{OptionMap, keys};
use crate::state::ConfigSnapshotState;
use crate::store::{NorthboundOptionsWrite, WriteSet};

/// Revision of the derivation pipeline, folded into the version marker.
/// Bump when derivation semantics change in a way dependents must see.
const DERIVATION_REVISION: u32 = 2;

/// Injected generation rules for locally-derived values.
///
/// A seam for the collaborators that define how the prefix fallback, the
/// version marker, and fresh monitor addresses are produced.
pub trait DerivationRules {
    /// Derives the hardware-address prefix from an optional upstream hint.
    fn mac_prefix(&mut self, hint: Option<&str>) -> String;

    /// Version marker for the software producing this derivation.
    fn internal_version(&self) -> String;

    /// Generates a fresh monitor hardware address.
    fn random_monitor_address(&mut self) -> EthAddr;
}

/// Production rules.
///
/// A well-formed prefix hint is adopted verbatim (the operator's spelling
/// is preserved); otherwise a random three-octet prefix is generated once
/// and reused for the lifetime of the rules, so back-to-back recomputes
/// remain idempotent.
#[derive(Debug)]
pub struct DefaultRules {
    rng: StdRng,
    generated_prefix: Option<String>,
}

impl DefaultRules {
    /// Rules seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            generated_prefix: None,
        }
    }

    /// Deterministically seeded rules, for reproducible derivations.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            generated_prefix: None,
        }
    }
}

impl Default for DefaultRules {
    fn default() -> Self {
        Self::new()
    }
}

/// A usable prefix hint: one to three colon-separated hex octets.
fn is_well_formed_prefix(hint: &str) -> bool {
    let mut groups = 0;
    for group in hint.split(':') {
        if group.is_empty() || group.len() > 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
            return false;
        }
        groups += 1;
    }
    (1..=3).contains(&groups)
}

impl DerivationRules for DefaultRules {
    fn mac_prefix(&mut self, hint: Option<&str>) -> String {
        if let Some(hint) = hint {
            if is_well_formed_prefix(hint) {
                return hint.to_string();
            }
            warn!(hint, "ignoring malformed hardware-address prefix hint");
        }
        let rng = &mut self.rng;
        self.generated_prefix
            .get_or_insert_with(|| {
                let addr = EthAddr::random(rng);
                format!("{:02x}:{:02x}:{:02x}", addr.0[0], addr.0[1], addr.0[2])
            })
            .clone()
    }

    fn internal_version(&self) -> String {
        format!("{}-{}", env!("CARGO_PKG_VERSION"), DERIVATION_REVISION)
    }

    fn random_monitor_address(&mut self) -> EthAddr {
        EthAddr::random(&mut self.rng)
    }
}

/// Result of one full derivation pass.
#[derive(Debug, Clone)]
pub struct RecomputeOutcome {
    /// Always [`NodeState::Updated`]: a full pass re-derives the node's
    /// whole output.
    pub node: NodeState,
    /// Store writes to commit.
    pub writes: WriteSet,
    /// The drop-debugging collaborator must be reinitialized from the
    /// live northbound options (always true on the full path).
    pub debug_refresh: bool,
}

/// Full derivation pass.
///
/// Mutates `state` to the newly derived snapshot and returns the writes
/// needed to reconcile both stores with it.
pub fn recompute<R: DerivationRules>(
    inputs: SessionInputs<'_>,
    rules: &mut R,
    state: &mut ConfigSnapshotState,
) -> RecomputeOutcome {
    let mut writes = WriteSet::default();

    let (live_options, nb_encryption) = match inputs.northbound {
        Some(nb) => (nb.options.clone(), nb.encryption),
        None => {
            debug!("northbound record absent, queueing creation");
            writes.create_northbound = true;
            (OptionMap::new(), false)
        }
    };

    // Derived prefix, from the upstream hint when usable.
    let prefix = rules.mac_prefix(live_options.get(keys::MAC_PREFIX));

    // Monitor address: adopt a well-formed upstream value, otherwise
    // regenerate and push the fresh one back upstream.
    let mut generated_monitor = None;
    match live_options
        .get(keys::SVC_MONITOR_MAC)
        .map(str::parse::<EthAddr>)
    {
        Some(Ok(addr)) => state.monitor_address = Some(addr),
        upstream => {
            if let Some(Err(err)) = upstream {
                warn!(%err, "regenerating monitor address");
            }
            let addr = rules.random_monitor_address();
            state.monitor_address = Some(addr);
            generated_monitor = Some(addr);
        }
    }

    let mut options = live_options.clone();
    options.replace(keys::MAC_PREFIX, prefix);
    if let Some(addr) = generated_monitor {
        options.replace(keys::SVC_MONITOR_MAC, addr.to_string());
    }

    options.replace(
        keys::MAX_TUNID,
        inputs.roster.max_datapath_key().to_string(),
    );

    let version = rules.internal_version();
    if version != options.get_def(keys::INTERNAL_VERSION, "") {
        options.replace(keys::INTERNAL_VERSION, version);
        state.internal_version_changed = true;
    } else {
        state.internal_version_changed = false;
    }

    // Self-healing write-back, verify-then-set against the live snapshot.
    if options != live_options {
        writes.northbound_options = Some(NorthboundOptionsWrite {
            expected: live_options.clone(),
            options: options.clone(),
        });
    }
    state.nb_mirror = options;

    // Capability determination; the override switch is read from the live
    // record, not the mirror.
    state.features = if live_options.get_bool(keys::IGNORE_CHASSIS_FEATURES, false) {
        FeatureSet::all_enabled()
    } else {
        features::negotiate(inputs.roster)
    };

    let (live_sb_options, sb_encryption) = match inputs.southbound {
        Some(sb) => (Some(&sb.options), sb.encryption),
        None => {
            debug!("southbound record absent, queueing creation");
            writes.create_southbound = true;
            (None, false)
        }
    };

    if nb_encryption != sb_encryption {
        writes.southbound_encryption = Some(nb_encryption);
    }

    let sb_mirror =
        mirror::build_southbound_options(&state.nb_mirror, &state.features, live_sb_options);
    if live_sb_options != Some(&sb_mirror) {
        writes.southbound_options = Some(sb_mirror.clone());
    }
    state.sb_mirror = sb_mirror;

    RecomputeOutcome {
        node: NodeState::Updated,
        writes,
        debug_refresh: true,
    }
}
