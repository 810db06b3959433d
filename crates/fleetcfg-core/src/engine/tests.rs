//! Engine-level tests: derivation scenarios, classification verdicts, and
//! determinism properties.

use proptest::prelude::*;

use super::*;
use crate::features::{ALL_FEATURE_KEYS, FEATURE_FDB_TIMESTAMP, FeatureSet};
use crate::fleet::{FleetAgent, FleetRoster};
use crate::mac::EthAddr;
use crate::options::{OptionMap, keys};
use crate::state::ConfigSnapshotState;
use crate::store::memory::MemorySink;
use crate::store::{NorthboundRecord, RecordDelta, SouthboundRecord};

fn options(entries: &[(&str, &str)]) -> OptionMap {
    entries.iter().copied().collect()
}

fn northbound(entries: &[(&str, &str)]) -> NorthboundRecord {
    NorthboundRecord {
        encryption: false,
        options: options(entries),
        delta: RecordDelta::default(),
    }
}

fn touched(mut record: NorthboundRecord) -> NorthboundRecord {
    record.delta.options_touched = true;
    record
}

fn agent_advertising_all(name: &str) -> FleetAgent {
    let mut agent = FleetAgent::new(name);
    for key in ALL_FEATURE_KEYS {
        agent.capabilities.replace(*key, "true");
    }
    agent
}

/// Runs a full derivation against in-memory records and returns the sink
/// holding the committed state.
fn derive_into_sink(
    nb: Option<NorthboundRecord>,
    sb: Option<SouthboundRecord>,
    roster: &FleetRoster,
    rules: &mut DefaultRules,
    state: &mut ConfigSnapshotState,
) -> MemorySink {
    let mut sink = MemorySink::with_records(nb.clone(), sb.clone());
    let outcome = recompute(
        SessionInputs {
            northbound: nb.as_ref(),
            southbound: sb.as_ref(),
            roster,
        },
        rules,
        state,
    );
    assert_eq!(outcome.node, NodeState::Updated);
    outcome.writes.apply(&mut sink).unwrap();
    sink
}

// ============================================================================
// Derivation scenarios
// ============================================================================

#[test]
fn first_derivation_from_bare_prefix_hint() {
    let mut rules = DefaultRules::with_seed(42);
    let mut state = ConfigSnapshotState::new();
    let roster = FleetRoster::new();

    let sink = derive_into_sink(
        Some(northbound(&[(keys::MAC_PREFIX, "0A")])),
        None,
        &roster,
        &mut rules,
        &mut state,
    );

    // Hint adopted verbatim, all derived keys materialized southbound.
    let sb = sink.southbound.expect("southbound record created");
    assert_eq!(sb.options.get(keys::MAC_PREFIX), Some("0A"));
    assert_eq!(sb.options.get(keys::MAX_TUNID), Some("0"));
    assert_eq!(sb.options.get(keys::ARP_NS_EXPLICIT_OUTPUT), Some("true"));
    let monitor = sb.options.get(keys::SVC_MONITOR_MAC).unwrap();
    monitor.parse::<EthAddr>().expect("generated address parses");

    // The same derived values were healed back upstream.
    let nb = sink.northbound.expect("northbound record present");
    assert_eq!(nb.options.get(keys::SVC_MONITOR_MAC), Some(monitor));
    assert_eq!(nb.options.get(keys::MAC_PREFIX), Some("0A"));
    assert!(nb.options.get(keys::INTERNAL_VERSION).is_some());
    assert!(state.internal_version_changed);
}

#[test]
fn derivation_creates_absent_records() {
    let mut rules = DefaultRules::with_seed(1);
    let mut state = ConfigSnapshotState::new();
    let roster = FleetRoster::new();

    let mut sink = MemorySink::default();
    let outcome = recompute(
        SessionInputs {
            northbound: None,
            southbound: None,
            roster: &roster,
        },
        &mut rules,
        &mut state,
    );
    assert!(outcome.writes.create_northbound);
    assert!(outcome.writes.create_southbound);
    outcome.writes.apply(&mut sink).unwrap();
    assert!(sink.northbound.is_some());
    assert!(sink.southbound.is_some());
}

#[test]
fn derivation_is_idempotent() {
    let mut rules = DefaultRules::with_seed(9);
    let mut state = ConfigSnapshotState::new();
    let roster: FleetRoster = [agent_advertising_all("a0")].into_iter().collect();

    let sink = derive_into_sink(
        Some(northbound(&[("controller_event", "true")])),
        None,
        &roster,
        &mut rules,
        &mut state,
    );
    let state_after_first = state.clone();

    // Second pass over the committed records: nothing left to do.
    let outcome = recompute(
        SessionInputs {
            northbound: sink.northbound.as_ref(),
            southbound: sink.southbound.as_ref(),
            roster: &roster,
        },
        &mut rules,
        &mut state,
    );
    assert!(outcome.writes.is_empty(), "unexpected {:?}", outcome.writes);
    assert_eq!(state.nb_mirror, state_after_first.nb_mirror);
    assert_eq!(state.sb_mirror, state_after_first.sb_mirror);
    assert_eq!(state.features, state_after_first.features);
    assert_eq!(state.monitor_address, state_after_first.monitor_address);
    // The marker only moved on the first pass.
    assert!(state_after_first.internal_version_changed);
    assert!(!state.internal_version_changed);
}

#[test]
fn derivation_mirrors_encryption_flag() {
    let mut rules = DefaultRules::with_seed(2);
    let mut state = ConfigSnapshotState::new();
    let roster = FleetRoster::new();

    let mut nb = northbound(&[]);
    nb.encryption = true;
    let sink = derive_into_sink(Some(nb), None, &roster, &mut rules, &mut state);
    assert!(sink.southbound.unwrap().encryption);
}

#[test]
fn override_switch_skips_negotiation() {
    let mut rules = DefaultRules::with_seed(3);
    let mut state = ConfigSnapshotState::new();
    // A bare agent would clear every flag if negotiation ran.
    let roster: FleetRoster = [FleetAgent::new("bare")].into_iter().collect();

    derive_into_sink(
        Some(northbound(&[(keys::IGNORE_CHASSIS_FEATURES, "true")])),
        None,
        &roster,
        &mut rules,
        &mut state,
    );
    assert_eq!(state.features, FeatureSet::all_enabled());
}

#[test]
fn malformed_monitor_address_is_regenerated() {
    let mut rules = DefaultRules::with_seed(4);
    let mut state = ConfigSnapshotState::new();
    let roster = FleetRoster::new();

    let sink = derive_into_sink(
        Some(northbound(&[(keys::SVC_MONITOR_MAC, "garbage")])),
        None,
        &roster,
        &mut rules,
        &mut state,
    );
    let healed = sink.northbound.unwrap();
    let monitor = healed.options.get(keys::SVC_MONITOR_MAC).unwrap();
    let addr: EthAddr = monitor.parse().unwrap();
    assert_eq!(state.monitor_address, Some(addr));
}

// ============================================================================
// Northbound classification
// ============================================================================

/// Derives once and returns (state, committed records) ready for
/// classification passes.
fn reconciled(
    entries: &[(&str, &str)],
    roster: &FleetRoster,
) -> (ConfigSnapshotState, NorthboundRecord, SouthboundRecord) {
    let mut rules = DefaultRules::with_seed(77);
    let mut state = ConfigSnapshotState::new();
    let sink = derive_into_sink(Some(northbound(entries)), None, roster, &mut rules, &mut state);
    state.clear_tracked();
    (state, sink.northbound.unwrap(), sink.southbound.unwrap())
}

#[test]
fn absent_records_escalate() {
    let roster = FleetRoster::new();
    let (mut state, nb, sb) = reconciled(&[], &roster);

    let outcome = classify_northbound(None, Some(&sb), &mut state);
    assert_eq!(outcome.verdict, Verdict::Escalate);
    let outcome = classify_northbound(Some(&nb), None, &mut state);
    assert_eq!(outcome.verdict, Verdict::Escalate);
    assert!(!state.changed);
}

#[test]
fn untouched_columns_are_a_noop() {
    let roster = FleetRoster::new();
    let (mut state, nb, sb) = reconciled(&[], &roster);

    let outcome = classify_northbound(Some(&nb), Some(&sb), &mut state);
    assert_eq!(outcome.verdict, Verdict::Absorb);
    assert_eq!(outcome.node, NodeState::Unchanged);
    assert!(outcome.writes.is_empty());
    assert!(!state.changed);
}

#[test]
fn self_echo_options_absorb_without_work() {
    let roster = FleetRoster::new();
    let (mut state, nb, sb) = reconciled(&[], &roster);

    // Options column touched but identical to the mirror (our own
    // write-back observed again).
    let outcome = classify_northbound(Some(&touched(nb)), Some(&sb), &mut state);
    assert_eq!(outcome.verdict, Verdict::Absorb);
    assert_eq!(outcome.node, NodeState::Unchanged);
    assert!(state.changed);
    assert!(!state.delta.options_changed);
}

#[test]
fn healed_monitor_address_is_in_sync_afterwards() {
    let roster = FleetRoster::new();
    // No monitor address upstream: derivation generates and heals it.
    let (mut state, nb, sb) = reconciled(&[], &roster);
    assert!(nb.options.get(keys::SVC_MONITOR_MAC).is_some());

    let outcome = classify_northbound(Some(&touched(nb)), Some(&sb), &mut state);
    assert_eq!(outcome.verdict, Verdict::Absorb);
}

#[test]
fn tampered_self_managed_key_escalates() {
    let roster = FleetRoster::new();
    let (mut state, nb, sb) = reconciled(&[], &roster);

    for key in [keys::SVC_MONITOR_MAC, keys::MAX_TUNID, keys::MAC_PREFIX] {
        let mut edited = nb.clone();
        edited.options.replace(key, "operator-edit");
        let outcome = classify_northbound(Some(&touched(edited)), Some(&sb), &mut state);
        assert_eq!(outcome.verdict, Verdict::Escalate, "key {key}");
        assert_eq!(outcome.node, NodeState::Unchanged);
    }

    // Removal counts as tamper for must-be-present keys.
    let mut edited = nb.clone();
    edited.options.remove(keys::SVC_MONITOR_MAC);
    let outcome = classify_northbound(Some(&touched(edited)), Some(&sb), &mut state);
    assert_eq!(outcome.verdict, Verdict::Escalate);
}

#[test]
fn new_override_switch_escalates() {
    let roster = FleetRoster::new();
    let (mut state, nb, sb) = reconciled(&[], &roster);

    let mut edited = nb.clone();
    edited.options.replace(keys::IGNORE_CHASSIS_FEATURES, "true");
    let outcome = classify_northbound(Some(&touched(edited)), Some(&sb), &mut state);
    assert_eq!(outcome.verdict, Verdict::Escalate);
}

#[test]
fn passthrough_change_absorbs_with_delta_flag() {
    let roster = FleetRoster::new();
    let (mut state, nb, sb) = reconciled(&[], &roster);

    let mut edited = nb.clone();
    edited.options.replace("controller_event", "true");
    let outcome = classify_northbound(Some(&touched(edited.clone())), Some(&sb), &mut state);

    assert_eq!(outcome.verdict, Verdict::Absorb);
    assert_eq!(outcome.node, NodeState::Updated);
    assert!(state.changed);
    assert!(state.delta.options_changed);
    assert!(!outcome.debug_refresh);
    // Mirror replaced and southbound overlay refreshed.
    assert_eq!(state.nb_mirror, edited.options);
    let sb_write = outcome.writes.southbound_options.expect("overlay write");
    assert_eq!(sb_write.get("controller_event"), Some("true"));
    assert_eq!(state.sb_mirror, sb_write);
}

#[test]
fn unlisted_option_absorbs_without_delta_flag() {
    let roster = FleetRoster::new();
    let (mut state, nb, sb) = reconciled(&[], &roster);

    let mut edited = nb.clone();
    edited.options.replace("operator_note", "maintenance friday");
    let outcome = classify_northbound(Some(&touched(edited)), Some(&sb), &mut state);

    assert_eq!(outcome.verdict, Verdict::Absorb);
    assert!(state.changed);
    // Not in the closed passthrough set: absorbed without signalling.
    assert!(!state.delta.options_changed);
    // It still flows into the southbound overlay.
    assert_eq!(
        outcome.writes.southbound_options.unwrap().get("operator_note"),
        Some("maintenance friday")
    );
}

#[test]
fn debug_key_change_requests_reinit_even_after_earlier_hit() {
    let roster = FleetRoster::new();
    let (mut state, nb, sb) = reconciled(&[], &roster);

    let mut edited = nb.clone();
    // An earlier passthrough key changes too; it must not mask the
    // debug-key detection.
    edited.options.replace("mac_binding_removal_limit", "10");
    edited.options.replace(keys::DEBUG_DROP_DOMAIN_ID, "7");
    let outcome = classify_northbound(Some(&touched(edited)), Some(&sb), &mut state);

    assert_eq!(outcome.verdict, Verdict::Absorb);
    assert!(outcome.debug_refresh);
    assert!(state.delta.options_changed);
}

#[test]
fn encryption_flag_is_mirrored_even_when_escalating() {
    let roster = FleetRoster::new();
    let (mut state, nb, sb) = reconciled(&[], &roster);

    let mut edited = nb.clone();
    edited.encryption = true;
    edited.delta.encryption_touched = true;
    edited.options.replace(keys::MAC_PREFIX, "de:ad:be");
    edited.delta.options_touched = true;

    let outcome = classify_northbound(Some(&edited), Some(&sb), &mut state);
    assert_eq!(outcome.verdict, Verdict::Escalate);
    assert_eq!(outcome.writes.southbound_encryption, Some(true));
}

// ============================================================================
// Southbound classification
// ============================================================================

#[test]
fn southbound_echo_absorbs_tamper_escalates() {
    let roster = FleetRoster::new();
    let (state, _nb, sb) = reconciled(&[], &roster);

    assert_eq!(classify_southbound(Some(&sb), &state), Verdict::Absorb);

    let mut tampered = sb.clone();
    tampered.options.replace("rogue", "edit");
    assert_eq!(classify_southbound(Some(&tampered), &state), Verdict::Escalate);

    assert_eq!(classify_southbound(None, &state), Verdict::Escalate);
}

// ============================================================================
// Roster classification
// ============================================================================

#[test]
fn transport_changes_escalate() {
    let roster_base: FleetRoster = [agent_advertising_all("a0")].into_iter().collect();
    let (mut state, _nb, sb) = reconciled(&[], &roster_base);

    let mut joined = agent_advertising_all("a1");
    joined.delta.is_new = true;
    let roster: FleetRoster = [agent_advertising_all("a0"), joined].into_iter().collect();
    let outcome = classify_roster(&roster, Some(&sb), &mut state);
    assert_eq!(outcome.verdict, Verdict::Escalate);

    let mut left = agent_advertising_all("a0");
    left.delta.is_deleted = true;
    let roster: FleetRoster = [left].into_iter().collect();
    let outcome = classify_roster(&roster, Some(&sb), &mut state);
    assert_eq!(outcome.verdict, Verdict::Escalate);

    let mut retunneled = agent_advertising_all("a0");
    retunneled.delta.encaps_updated = true;
    let roster: FleetRoster = [retunneled].into_iter().collect();
    let outcome = classify_roster(&roster, Some(&sb), &mut state);
    assert_eq!(outcome.verdict, Verdict::Escalate);
}

#[test]
fn capability_only_change_with_no_net_effect_absorbs() {
    // Two agents; the dissenter keeps fdb-timestamp false, the other
    // flips its advertisement true. Negotiation still lands false.
    let mut dissenter = agent_advertising_all("a0");
    dissenter.capabilities.replace(FEATURE_FDB_TIMESTAMP, "false");
    let roster_base: FleetRoster = [dissenter.clone(), agent_advertising_all("a1")]
        .into_iter()
        .collect();
    let (mut state, _nb, sb) = reconciled(&[], &roster_base);
    assert!(!state.features.fdb_timestamp);

    let mut flipped = agent_advertising_all("a1");
    flipped.delta.capabilities_updated = true;
    let roster: FleetRoster = [dissenter, flipped].into_iter().collect();

    let outcome = classify_roster(&roster, Some(&sb), &mut state);
    assert_eq!(outcome.verdict, Verdict::Absorb);
    assert_eq!(outcome.node, NodeState::Unchanged);
    assert!(!state.delta.capabilities_changed);
    assert!(!state.features.fdb_timestamp);
}

#[test]
fn last_dissenter_flipping_reenables_via_fresh_pass() {
    let mut dissenter = agent_advertising_all("a0");
    dissenter.capabilities.replace(FEATURE_FDB_TIMESTAMP, "false");
    let roster_base: FleetRoster = [dissenter].into_iter().collect();
    let (mut state, _nb, sb) = reconciled(&[], &roster_base);
    assert!(!state.features.fdb_timestamp);

    let mut converted = agent_advertising_all("a0");
    converted.delta.capabilities_updated = true;
    let roster: FleetRoster = [converted].into_iter().collect();

    let outcome = classify_roster(&roster, Some(&sb), &mut state);
    assert_eq!(outcome.verdict, Verdict::Absorb);
    assert_eq!(outcome.node, NodeState::Updated);
    assert!(state.features.fdb_timestamp);
    assert!(state.delta.capabilities_changed);
    assert!(state.changed);
}

#[test]
fn override_switch_short_circuits_roster_classification() {
    let roster_base = FleetRoster::new();
    let (mut state, _nb, sb) =
        reconciled(&[(keys::IGNORE_CHASSIS_FEATURES, "true")], &roster_base);

    let mut bare = FleetAgent::new("bare");
    bare.delta.capabilities_updated = true;
    let roster: FleetRoster = [bare].into_iter().collect();

    let outcome = classify_roster(&roster, Some(&sb), &mut state);
    assert_eq!(outcome.verdict, Verdict::Absorb);
    assert_eq!(state.features, FeatureSet::all_enabled());
    assert!(!state.delta.capabilities_changed);
}

#[test]
fn feature_change_without_southbound_record_escalates() {
    let roster_base: FleetRoster = [agent_advertising_all("a0")].into_iter().collect();
    let (mut state, _nb, _sb) = reconciled(&[], &roster_base);

    let mut bare = FleetAgent::new("a0");
    bare.delta.capabilities_updated = true;
    let roster: FleetRoster = [bare].into_iter().collect();

    let outcome = classify_roster(&roster, None, &mut state);
    assert_eq!(outcome.verdict, Verdict::Escalate);
    // State untouched: the full pass will re-derive everything.
    assert_eq!(state.features, FeatureSet::all_enabled());
}

// ============================================================================
// Properties
// ============================================================================

fn arb_options() -> impl Strategy<Value = OptionMap> {
    proptest::collection::btree_map("[a-z_]{1,12}", "[a-z0-9:]{0,8}", 0..8)
        .prop_map(|m| m.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A mapping is never out of sync with itself under the optional
    /// presence policy.
    #[test]
    fn prop_out_of_sync_is_irreflexive(map in arb_options(), key in "[a-z_]{1,12}") {
        prop_assert!(!crate::options::is_out_of_sync(&map, &map, &key, false));
    }

    /// Negotiation is a fold over a set: roster order never matters.
    #[test]
    fn prop_negotiation_is_order_independent(
        adverts in proptest::collection::vec(
            proptest::collection::vec(any::<bool>(), ALL_FEATURE_KEYS.len()),
            0..6,
        ),
    ) {
        let agents: Vec<FleetAgent> = adverts
            .iter()
            .enumerate()
            .map(|(i, flags)| {
                let mut agent = FleetAgent::new(format!("a{i}"));
                for (key, enabled) in ALL_FEATURE_KEYS.iter().zip(flags) {
                    agent.capabilities.replace(*key, if *enabled { "true" } else { "false" });
                }
                agent
            })
            .collect();

        let forward: FleetRoster = agents.clone().into_iter().collect();
        let reversed: FleetRoster = agents.into_iter().rev().collect();
        prop_assert_eq!(
            crate::features::negotiate(&forward),
            crate::features::negotiate(&reversed)
        );
    }

    /// A second derivation over the records committed by the first is a
    /// no-op for arbitrary upstream option mappings.
    #[test]
    fn prop_derivation_is_idempotent(map in arb_options(), encryption in any::<bool>()) {
        let mut rules = DefaultRules::with_seed(5);
        let mut state = ConfigSnapshotState::new();
        let roster = FleetRoster::new();

        let nb = NorthboundRecord {
            encryption,
            options: map,
            delta: RecordDelta::default(),
        };
        let sink = derive_into_sink(Some(nb), None, &roster, &mut rules, &mut state);
        let state_after_first = state.clone();

        let outcome = recompute(
            SessionInputs {
                northbound: sink.northbound.as_ref(),
                southbound: sink.southbound.as_ref(),
                roster: &roster,
            },
            &mut rules,
            &mut state,
        );
        prop_assert!(outcome.writes.is_empty());
        prop_assert_eq!(&state.nb_mirror, &state_after_first.nb_mirror);
        prop_assert_eq!(&state.sb_mirror, &state_after_first.sb_mirror);
        prop_assert_eq!(state.features, state_after_first.features);
        prop_assert_eq!(state.monitor_address, state_after_first.monitor_address);
    }
}
