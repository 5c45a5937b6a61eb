//! Node registry: the durable set of paired nodes.
//!
//! Sole authority for "is this sender a known peer".  Every add, remove and
//! commanded-duty change is written through to the `nodes` NVS namespace
//! immediately, so a reboot restores the full peer set before the radio
//! layer re-adds peers.  Iteration order is insertion order.

use core::fmt::Write;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::StoragePort;
use crate::config::{self, MAX_PEERS, NODES_NAMESPACE};
use crate::error::RegistryError;

pub type MacAddress = [u8; 6];
pub type NodeId = heapless::String<24>;
pub type ActuatorId = heapless::String<8>;

const TABLE_KEY: &str = "table";

/// Deration level meaning "full output allowed".
pub const FULL_OUTPUT: u8 = 100;

/// One paired remote node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub node_id: NodeId,
    /// Output driven by this node, derived from its MAC.
    pub actuator_id: ActuatorId,
    pub addr: MacAddress,
    /// Last duty (0-100) commanded to the node.
    pub last_duty: u8,
    /// Monotonic ms; not comparable across reboots.
    pub last_seen_ms: u64,
    pub temperature_c: Option<f32>,
    pub is_derated: bool,
    /// 0-100, 100 = no deration.
    pub deration_level: u8,
}

impl NodeInfo {
    fn new(node_id: NodeId, addr: MacAddress, last_duty: u8, now_ms: u64) -> Self {
        Self {
            node_id,
            actuator_id: actuator_id_for(&addr),
            addr,
            last_duty,
            last_seen_ms: now_ms,
            temperature_c: None,
            is_derated: false,
            deration_level: FULL_OUTPUT,
        }
    }
}

/// Durable subset of [`NodeInfo`].
#[derive(Debug, Serialize, Deserialize)]
struct PersistedNode {
    node_id: NodeId,
    addr: MacAddress,
    last_duty: u8,
}

/// `L` + last three MAC bytes, e.g. `LAABBCC`.
pub fn actuator_id_for(addr: &MacAddress) -> ActuatorId {
    let mut id = ActuatorId::new();
    let _ = write!(id, "L{:02X}{:02X}{:02X}", addr[3], addr[4], addr[5]);
    id
}

/// Fallback node id for senders that do not name themselves.
pub fn node_id_for(addr: &MacAddress) -> NodeId {
    let mut id = NodeId::new();
    let _ = write!(id, "T{:02X}{:02X}{:02X}", addr[3], addr[4], addr[5]);
    id
}

pub struct NodeRegistry {
    nodes: heapless::Vec<NodeInfo, MAX_PEERS>,
    capacity: usize,
}

impl NodeRegistry {
    /// `capacity` is clamped to the radio peer limit.
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: heapless::Vec::new(),
            capacity: capacity.clamp(1, MAX_PEERS),
        }
    }

    // ── Persistence ───────────────────────────────────────────

    /// Replace the in-memory table with the persisted one.
    /// Returns the number of nodes restored.
    pub fn restore(&mut self, storage: &impl StoragePort, now_ms: u64) -> Result<usize, RegistryError> {
        let table: Vec<PersistedNode> =
            match config::load_blob(storage, NODES_NAMESPACE, TABLE_KEY) {
                Ok(Some(t)) => t,
                Ok(None) => Vec::new(),
                Err(e) => {
                    warn!("registry: stored table unreadable ({e}), starting empty");
                    return Err(RegistryError::Storage);
                }
            };

        self.nodes.clear();
        for p in table.into_iter().take(self.capacity) {
            // Restored nodes count as seen at boot.
            let _ = self.nodes.push(NodeInfo::new(p.node_id, p.addr, p.last_duty, now_ms));
        }
        info!("registry: restored {} node(s)", self.nodes.len());
        Ok(self.nodes.len())
    }

    fn persist(&self, storage: &mut impl StoragePort) -> Result<(), RegistryError> {
        let table: Vec<PersistedNode> = self
            .nodes
            .iter()
            .map(|n| PersistedNode {
                node_id: n.node_id.clone(),
                addr: n.addr,
                last_duty: n.last_duty,
            })
            .collect();
        config::store_blob(storage, NODES_NAMESPACE, TABLE_KEY, &table).map_err(|e| {
            warn!("registry: persist failed: {e}");
            RegistryError::Storage
        })
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn lookup(&self, node_id: &str) -> Option<&NodeInfo> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    pub fn lookup_by_addr(&self, addr: &MacAddress) -> Option<&NodeInfo> {
        self.nodes.iter().find(|n| &n.addr == addr)
    }

    /// Node owning the given actuator output.
    pub fn node_for_actuator(&self, actuator_id: &str) -> Option<&NodeInfo> {
        self.nodes.iter().find(|n| n.actuator_id == actuator_id)
    }

    /// Every node in insertion order.
    pub fn all(&self) -> impl Iterator<Item = &NodeInfo> {
        self.nodes.iter()
    }

    /// Nodes not heard from within `stale_ms`.
    pub fn stale_nodes(&self, now_ms: u64, stale_ms: u32) -> impl Iterator<Item = &NodeInfo> {
        self.nodes
            .iter()
            .filter(move |n| now_ms.saturating_sub(n.last_seen_ms) > u64::from(stale_ms))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.nodes.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // ── Mutations ─────────────────────────────────────────────

    /// Create the node if absent, otherwise refresh its address.  Resets
    /// last-seen either way.  Fails with [`RegistryError::Full`] instead of
    /// evicting; a failed write-through rolls the insert back.
    pub fn upsert_on_pairing(
        &mut self,
        node_id: &str,
        addr: MacAddress,
        now_ms: u64,
        storage: &mut impl StoragePort,
    ) -> Result<&NodeInfo, RegistryError> {
        if let Some(idx) = self.nodes.iter().position(|n| n.node_id == node_id) {
            let addr_changed = self.nodes[idx].addr != addr;
            {
                let node = &mut self.nodes[idx];
                node.last_seen_ms = now_ms;
                if addr_changed {
                    node.addr = addr;
                    node.actuator_id = actuator_id_for(&addr);
                }
            }
            if addr_changed {
                self.persist(storage)?;
            }
            return Ok(&self.nodes[idx]);
        }

        if self.is_full() {
            warn!("registry: full ({}), rejecting {}", self.capacity, node_id);
            return Err(RegistryError::Full);
        }

        let mut id = NodeId::new();
        id.push_str(node_id).map_err(|()| RegistryError::UnknownNode)?;
        self.nodes
            .push(NodeInfo::new(id, addr, 0, now_ms))
            .map_err(|_| RegistryError::Full)?;

        if let Err(e) = self.persist(storage) {
            self.nodes.pop();
            return Err(e);
        }
        info!("registry: added {} ({} / {})", node_id, self.nodes.len(), self.capacity);
        self.nodes.last().ok_or(RegistryError::UnknownNode)
    }

    /// Record activity.  Returns `false` for unknown nodes.
    pub fn touch(&mut self, node_id: &str, now_ms: u64) -> bool {
        match self.nodes.iter_mut().find(|n| n.node_id == node_id) {
            Some(n) => {
                n.last_seen_ms = now_ms;
                true
            }
            None => false,
        }
    }

    /// Unpair.  The node is gone from memory even if the write-through fails.
    pub fn remove(
        &mut self,
        node_id: &str,
        storage: &mut impl StoragePort,
    ) -> Result<NodeInfo, RegistryError> {
        let idx = self
            .nodes
            .iter()
            .position(|n| n.node_id == node_id)
            .ok_or(RegistryError::UnknownNode)?;
        let removed = self.nodes.remove(idx);
        info!("registry: removed {}", node_id);
        self.persist(storage)?;
        Ok(removed)
    }

    /// Unpair everything.
    pub fn clear(&mut self, storage: &mut impl StoragePort) -> Result<(), RegistryError> {
        self.nodes.clear();
        info!("registry: cleared");
        self.persist(storage)
    }

    /// Remember the last duty commanded to a node.  Persisted only on change.
    pub fn record_duty(
        &mut self,
        node_id: &str,
        duty: u8,
        storage: &mut impl StoragePort,
    ) -> Result<(), RegistryError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.node_id == node_id)
            .ok_or(RegistryError::UnknownNode)?;
        if node.last_duty == duty {
            return Ok(());
        }
        node.last_duty = duty;
        self.persist(storage)
    }

    /// Store the latest temperature and deration state for a node.
    pub fn apply_thermal(&mut self, node_id: &str, temperature_c: f32, level: u8) -> bool {
        match self.nodes.iter_mut().find(|n| n.node_id == node_id) {
            Some(n) => {
                n.temperature_c = Some(temperature_c);
                n.deration_level = level;
                n.is_derated = level < FULL_OUTPUT;
                true
            }
            None => false,
        }
    }
}
