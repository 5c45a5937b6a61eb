//! Topic layout.
//!
//! Everything lives under `farm/{farm_id}/coord/{coord_id}`.  Outbound
//! topics are a pure function of the message kind and optional node id;
//! inbound topics are parsed back into a [`Route`].

/// Outbound message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    CoordinatorTelemetry,
    ReservoirTelemetry,
    TowerTelemetry,
    TowerStatus,
    TowerThermal,
    Mmwave,
    PairingStatus,
    PairingComplete,
    ConnectionStatus,
    CommandAck,
}

impl MessageKind {
    pub fn needs_node(self) -> bool {
        matches!(self, Self::TowerTelemetry | Self::TowerStatus | Self::TowerThermal)
    }

    /// Retained kinds are replayed by the broker to late subscribers.
    pub fn retained(self) -> bool {
        matches!(self, Self::ConnectionStatus)
    }
}

/// Where an inbound command should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Coordinator,
    Tower(&'a str),
    Reservoir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMap {
    prefix: String,
}

impl TopicMap {
    pub fn new(farm_id: &str, coord_id: &str) -> Self {
        Self {
            prefix: format!("farm/{farm_id}/coord/{coord_id}"),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `None` when a per-node kind is given no node id, or the id would
    /// break the topic structure.
    pub fn topic(&self, kind: MessageKind, node_id: Option<&str>) -> Option<String> {
        let p = &self.prefix;
        if kind.needs_node() {
            let id = node_id.filter(|id| is_topic_level(id))?;
            let leaf = match kind {
                MessageKind::TowerTelemetry => "telemetry",
                MessageKind::TowerStatus => "status",
                _ => "thermal",
            };
            return Some(format!("{p}/tower/{id}/{leaf}"));
        }
        let suffix = match kind {
            MessageKind::CoordinatorTelemetry => "telemetry",
            MessageKind::ReservoirTelemetry => "reservoir/telemetry",
            MessageKind::Mmwave => "mmwave",
            MessageKind::PairingStatus => "pairing/status",
            MessageKind::PairingComplete => "pairing/complete",
            MessageKind::ConnectionStatus => "status/connection",
            MessageKind::CommandAck => "cmd/ack",
            MessageKind::TowerTelemetry | MessageKind::TowerStatus | MessageKind::TowerThermal => {
                return None;
            }
        };
        Some(format!("{p}/{suffix}"))
    }

    /// Topic filters to subscribe to after every broker connect.
    pub fn subscriptions(&self) -> [String; 3] {
        let p = &self.prefix;
        [
            format!("{p}/cmd"),
            format!("{p}/tower/+/cmd"),
            format!("{p}/reservoir/cmd"),
        ]
    }

    /// Map an inbound topic to its handler.  Foreign topics yield `None`.
    pub fn route<'t>(&self, topic: &'t str) -> Option<Route<'t>> {
        let rest = topic.strip_prefix(self.prefix.as_str())?.strip_prefix('/')?;
        match rest {
            "cmd" => Some(Route::Coordinator),
            "reservoir/cmd" => Some(Route::Reservoir),
            _ => {
                let id = rest.strip_prefix("tower/")?.strip_suffix("/cmd")?;
                is_topic_level(id).then_some(Route::Tower(id))
            }
        }
    }
}

fn is_topic_level(s: &str) -> bool {
    !s.is_empty() && !s.contains(['/', '+', '#'])
}
