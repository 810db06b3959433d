//! Record snapshots and the commit seam to the replicated stores.
//!
//! The surrounding graph hands this node read-only snapshots of the
//! northbound desired-state record and the southbound operational record.
//! The node's pure layers never write anywhere; they accumulate pending
//! writes into a [`WriteSet`] which the session layer replays through a
//! [`CommitSink`], the transaction collaborator owned by the caller.
//!
//! # Failure semantics
//!
//! Commit failures abort the session. The node performs no retries; the
//! scheduler is expected to re-invoke the session (the snapshot state is
//! left at its last-committed values).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::options::OptionMap;

/// Change markers for the columns of the northbound record this node
/// watches, maintained by the store collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordDelta {
    /// The encryption flag column was touched this session.
    pub encryption_touched: bool,
    /// The options column was touched this session.
    pub options_touched: bool,
}

/// Read-only snapshot of the northbound desired-state record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NorthboundRecord {
    /// Fleet-wide encryption flag, mirrored southbound verbatim.
    pub encryption: bool,
    /// Operator-facing options.
    pub options: OptionMap,
    /// Per-column change markers for this session.
    #[serde(default)]
    pub delta: RecordDelta,
}

/// Read-only snapshot of the southbound operational record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SouthboundRecord {
    /// Mirrored encryption flag consumed by agents.
    pub encryption: bool,
    /// Derived options consumed by agents.
    pub options: OptionMap,
}

/// A northbound options write with its read-verify baseline.
///
/// `expected` is the live mapping observed when the write was decided; the
/// commit collaborator verifies it still matches before setting, so a
/// concurrent modification surfaces as a conflict rather than a lost
/// update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NorthboundOptionsWrite {
    /// The live options at decision time (verify baseline).
    pub expected: OptionMap,
    /// The options to set.
    pub options: OptionMap,
}

/// Pending writes produced by one derivation or classification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    /// Create the northbound record (it was absent upstream).
    pub create_northbound: bool,
    /// Create the southbound record (it was absent downstream).
    pub create_southbound: bool,
    /// Replace the northbound options (self-healing derived fields).
    pub northbound_options: Option<NorthboundOptionsWrite>,
    /// Set the southbound encryption flag.
    pub southbound_encryption: Option<bool>,
    /// Replace the southbound options.
    pub southbound_options: Option<OptionMap>,
}

impl WriteSet {
    /// Whether the pass produced no writes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.create_northbound
            && !self.create_southbound
            && self.northbound_options.is_none()
            && self.southbound_encryption.is_none()
            && self.southbound_options.is_none()
    }

    /// Replays the pending writes through the commit collaborator.
    ///
    /// Record creation is applied before any column write so a freshly
    /// created record can receive them in the same transaction.
    ///
    /// # Errors
    ///
    /// Propagates the first [`CommitError`]; remaining writes are not
    /// attempted and the session is considered aborted.
    pub fn apply(&self, sink: &mut dyn CommitSink) -> Result<(), CommitError> {
        if self.create_northbound {
            sink.create_northbound()?;
        }
        if self.create_southbound {
            sink.create_southbound()?;
        }
        if let Some(write) = &self.northbound_options {
            sink.set_northbound_options(write)?;
        }
        if let Some(enabled) = self.southbound_encryption {
            sink.set_southbound_encryption(enabled)?;
        }
        if let Some(options) = &self.southbound_options {
            sink.set_southbound_options(options)?;
        }
        Ok(())
    }
}

/// Which store a failed commit targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreSide {
    /// The northbound desired-state store.
    Northbound,
    /// The southbound operational store.
    Southbound,
}

impl std::fmt::Display for StoreSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Northbound => f.write_str("northbound"),
            Self::Southbound => f.write_str("southbound"),
        }
    }
}

/// Errors surfaced by the transaction collaborator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommitError {
    /// The surrounding transaction aborted.
    #[error("{side} transaction aborted: {reason}")]
    Aborted {
        /// The store whose transaction aborted.
        side: StoreSide,
        /// Collaborator-supplied diagnostic.
        reason: String,
    },

    /// Read-verify failed: the record changed under us.
    #[error("{side} record was concurrently modified")]
    Conflict {
        /// The store where the conflict was detected.
        side: StoreSide,
    },
}

/// Transaction collaborator seam.
///
/// Implementations wrap the replicated-store commit machinery. All methods
/// are synchronous; a returned error aborts the session.
pub trait CommitSink {
    /// Insert the northbound record (insert-if-missing path).
    fn create_northbound(&mut self) -> Result<(), CommitError>;

    /// Insert the southbound record (insert-if-missing path).
    fn create_southbound(&mut self) -> Result<(), CommitError>;

    /// Verify-then-set the northbound options.
    fn set_northbound_options(&mut self, write: &NorthboundOptionsWrite)
    -> Result<(), CommitError>;

    /// Set the southbound encryption flag.
    fn set_southbound_encryption(&mut self, enabled: bool) -> Result<(), CommitError>;

    /// Replace the southbound options.
    fn set_southbound_options(&mut self, options: &OptionMap) -> Result<(), CommitError>;
}

pub mod memory {
    //! In-memory commit sink mirroring the two records.
    //!
    //! Useful for tests and for running the reconciler against detached
    //! snapshots without a real store transaction.

    use super::{
        CommitError, CommitSink, NorthboundOptionsWrite, NorthboundRecord, OptionMap,
        SouthboundRecord, StoreSide,
    };

    /// Records every write and keeps live copies of both records.
    #[derive(Debug, Default)]
    pub struct MemorySink {
        /// Live northbound record, if it exists.
        pub northbound: Option<NorthboundRecord>,
        /// Live southbound record, if it exists.
        pub southbound: Option<SouthboundRecord>,
        /// Count of individual writes applied.
        pub writes: usize,
        /// Force every write to fail with this error side.
        pub fail: Option<StoreSide>,
    }

    impl MemorySink {
        /// Sink over pre-existing record snapshots.
        #[must_use]
        pub fn with_records(
            northbound: Option<NorthboundRecord>,
            southbound: Option<SouthboundRecord>,
        ) -> Self {
            Self {
                northbound,
                southbound,
                ..Self::default()
            }
        }

        fn check_fail(&self) -> Result<(), CommitError> {
            match self.fail {
                Some(side) => Err(CommitError::Aborted {
                    side,
                    reason: "injected failure".into(),
                }),
                None => Ok(()),
            }
        }
    }

    impl CommitSink for MemorySink {
        fn create_northbound(&mut self) -> Result<(), CommitError> {
            self.check_fail()?;
            self.northbound.get_or_insert_with(NorthboundRecord::default);
            self.writes += 1;
            Ok(())
        }

        fn create_southbound(&mut self) -> Result<(), CommitError> {
            self.check_fail()?;
            self.southbound.get_or_insert_with(SouthboundRecord::default);
            self.writes += 1;
            Ok(())
        }

        fn set_northbound_options(
            &mut self,
            write: &NorthboundOptionsWrite,
        ) -> Result<(), CommitError> {
            self.check_fail()?;
            let record = self
                .northbound
                .as_mut()
                .ok_or(CommitError::Conflict {
                    side: StoreSide::Northbound,
                })?;
            if record.options != write.expected {
                return Err(CommitError::Conflict {
                    side: StoreSide::Northbound,
                });
            }
            record.options = write.options.clone();
            self.writes += 1;
            Ok(())
        }

        fn set_southbound_encryption(&mut self, enabled: bool) -> Result<(), CommitError> {
            self.check_fail()?;
            let record = self
                .southbound
                .as_mut()
                .ok_or(CommitError::Conflict {
                    side: StoreSide::Southbound,
                })?;
            record.encryption = enabled;
            self.writes += 1;
            Ok(())
        }

        fn set_southbound_options(&mut self, options: &OptionMap) -> Result<(), CommitError> {
            self.check_fail()?;
            let record = self
                .southbound
                .as_mut()
                .ok_or(CommitError::Conflict {
                    side: StoreSide::Southbound,
                })?;
            record.options = options.clone();
            self.writes += 1;
            Ok(())
        }
    }
}
