//! Incremental reconciliation core for fleet configuration stores.
//!
//! This crate is one node of a larger incremental computation graph. It
//! keeps two replicated configuration stores consistent (a northbound
//! desired-state record written by operators, a southbound operational
//! record consumed by a fleet of agents) while propagating a minimal
//! "what changed" signal so dependent nodes can skip redundant work.
//!
//! # Components
//!
//! - [`state::ConfigSnapshotState`]: last-reconciled mirrors of both
//!   option mappings plus the negotiated capability set.
//! - [`options::is_out_of_sync`]: the key-sync comparator used by every
//!   classification pass.
//! - [`features::negotiate`]: fleet-wide capability AND-reduction.
//! - [`engine::recompute`]: the full derivation path.
//! - [`engine::classify_northbound`] / [`engine::classify_southbound`] /
//!   [`engine::classify_roster`]: per-source change classification into
//!   [`engine::Verdict::Absorb`] or [`engine::Verdict::Escalate`].
//! - [`gate::may_skip`]: the conservative downstream skip gate.
//! - [`session::Reconciler`]: node lifecycle tying the above together
//!   behind the scheduler-facing entry points.
//!
//! # Safety invariants
//!
//! - The southbound mirror is always a pure function of the northbound
//!   mirror, the feature set, and the documented southbound-local
//!   overrides.
//! - A false `Absorb` is a correctness bug (silent fleet drift); a false
//!   `Escalate` is only wasted work. Classification checks every derived
//!   key explicitly.
//! - Commit failures abort the session with the snapshot state rolled
//!   back; retries belong to the scheduler.

pub mod debug;
pub mod engine;
pub mod features;
pub mod fleet;
pub mod gate;
pub mod mac;
pub mod options;
pub mod session;
pub mod state;
pub mod store;

pub use debug::DebugConfig;
pub use engine::{
    DefaultRules, DerivationRules, NodeState, SessionInputs, Verdict, build_southbound_options,
    classify_northbound, classify_roster, classify_southbound, recompute,
};
pub use features::{FeatureSet, negotiate};
pub use fleet::{AgentDelta, EncapEntry, FleetAgent, FleetRoster};
pub use gate::may_skip;
pub use mac::EthAddr;
pub use options::{OptionMap, is_out_of_sync};
pub use session::Reconciler;
pub use state::{ConfigSnapshotState, TrackedDelta};
pub use store::{
    CommitError, CommitSink, NorthboundOptionsWrite, NorthboundRecord, RecordDelta,
    SouthboundRecord, StoreSide, WriteSet,
};
