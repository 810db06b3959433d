//! Drop-debugging collaborator configuration.
//!
//! Dependent flow-generation nodes sample dropped traffic into a
//! collector; the domain and collector-set identifiers for that sampling
//! live in the northbound options. The reconciler owns this auxiliary
//! config and reinitializes it on every full derivation and whenever one
//! of the two debug keys changes in an absorbed pass.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::options::{OptionMap, keys};

/// Parsed drop-debugging configuration.
///
/// Malformed or absent values read as 0, which disables sampling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Sampling domain identifier (0 = disabled).
    pub domain_id: u32,
    /// Collector set receiving the samples (0 = disabled).
    pub collector_set_id: u32,
}

impl DebugConfig {
    /// Disabled configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether drop sampling is active.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.domain_id != 0 && self.collector_set_id != 0
    }

    /// Reinitializes from the live northbound options.
    pub fn reinit(&mut self, nb_options: &OptionMap) {
        let parse = |key: &str| {
            nb_options
                .get(key)
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(0)
        };
        self.domain_id = parse(keys::DEBUG_DROP_DOMAIN_ID);
        self.collector_set_id = parse(keys::DEBUG_DROP_COLLECTOR_SET);
        debug!(
            domain_id = self.domain_id,
            collector_set_id = self.collector_set_id,
            "drop-debug config reinitialized"
        );
    }
}
