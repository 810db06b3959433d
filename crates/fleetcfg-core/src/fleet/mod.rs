//! Fleet agent roster snapshot.
//!
//! The roster is supplied read-only by the surrounding graph each session.
//! Each agent carries its capability advertisements, its tunnel
//! encapsulation rows, and collaborator-maintained change markers
//! ([`AgentDelta`], plus a per-encap modification marker). The reconciler
//! never mutates the roster; it only classifies it and folds it into the
//! negotiated feature set and the fleet key-space.

use serde::{Deserialize, Serialize};

use crate::options::OptionMap;

/// Tunnel key-space available to an agent using geneve/stt encapsulation.
pub const GENEVE_KEY_SPACE: u32 = (1 << 24) - 1;

/// Tunnel key-space available to an agent carrying any vxlan encapsulation.
pub const VXLAN_KEY_SPACE: u32 = (1 << 12) - 1;

/// One tunnel encapsulation row of an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncapEntry {
    /// Encapsulation type (`geneve`, `vxlan`, `stt`, …).
    pub kind: String,
    /// Tunnel endpoint address.
    pub ip: String,
    /// Collaborator marker: this row was modified since the last session.
    #[serde(default)]
    pub modified: bool,
}

/// Collaborator-supplied per-agent change markers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentDelta {
    /// The agent joined since the last session.
    pub is_new: bool,
    /// The agent left since the last session.
    pub is_deleted: bool,
    /// The agent's encapsulation column was touched.
    pub encaps_updated: bool,
    /// The agent's capability-advertisement column was touched.
    pub capabilities_updated: bool,
}

impl AgentDelta {
    /// Whether any marker is set.
    #[must_use]
    pub fn any(&self) -> bool {
        self.is_new || self.is_deleted || self.encaps_updated || self.capabilities_updated
    }
}

/// Read-only snapshot of one fleet agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FleetAgent {
    /// Stable agent identity.
    pub name: String,
    /// Remote agents do not consume this node's output and are excluded
    /// from capability negotiation.
    pub is_remote: bool,
    /// Capability advertisements (boolean options keyed by capability).
    pub capabilities: OptionMap,
    /// Tunnel encapsulation rows.
    pub encaps: Vec<EncapEntry>,
    /// Change markers for this session.
    pub delta: AgentDelta,
}

impl FleetAgent {
    /// New agent snapshot with no advertisements and no change markers.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether this agent's identity or transport changed this session
    /// (joined, left, encap column touched, or any encap row modified).
    #[must_use]
    pub fn transport_changed(&self) -> bool {
        self.delta.is_new
            || self.delta.is_deleted
            || self.delta.encaps_updated
            || self.encaps.iter().any(|e| e.modified)
    }

    /// The tunnel key-space this agent can address, bounded by its
    /// narrowest encapsulation type.
    #[must_use]
    pub fn key_space(&self) -> u32 {
        if self.encaps.iter().any(|e| e.kind == "vxlan") {
            VXLAN_KEY_SPACE
        } else {
            GENEVE_KEY_SPACE
        }
    }
}

/// Snapshot of the whole fleet roster for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FleetRoster {
    /// All known agents, remote ones included.
    pub agents: Vec<FleetAgent>,
}

impl FleetRoster {
    /// Empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates all agents.
    pub fn iter(&self) -> impl Iterator<Item = &FleetAgent> {
        self.agents.iter()
    }

    /// Iterates agents carrying any change marker this session.
    pub fn tracked(&self) -> impl Iterator<Item = &FleetAgent> {
        self.agents
            .iter()
            .filter(|a| a.delta.any() || a.encaps.iter().any(|e| e.modified))
    }

    /// Fleet-wide maximum usable tunnel/datapath key identifier.
    ///
    /// The minimum key-space over non-remote agents; 0 when no agent
    /// qualifies (an empty fleet can address no keys).
    #[must_use]
    pub fn max_datapath_key(&self) -> u32 {
        self.agents
            .iter()
            .filter(|a| !a.is_remote)
            .map(FleetAgent::key_space)
            .min()
            .unwrap_or(0)
    }
}

impl FromIterator<FleetAgent> for FleetRoster {
    fn from_iter<T: IntoIterator<Item = FleetAgent>>(iter: T) -> Self {
        Self {
            agents: iter.into_iter().collect(),
        }
    }
}
