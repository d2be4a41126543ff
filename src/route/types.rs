//! Route table entries.

use serde::{Deserialize, Serialize};

/// One side of a route. `server_url` is empty or `local` for this bridge
/// instance, or an absolute `http://host:port` URL for a peer. `port_name`
/// is advisory; auto-open uses it to find the hardware device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteEndpoint {
    pub server_url: String,
    pub port_id: String,
    pub port_name: String,
}

impl RouteEndpoint {
    /// Whether this endpoint lives on this bridge instance.
    pub fn is_local(&self) -> bool {
        self.server_url.is_empty() || self.server_url == "local"
    }
}

/// A forwarding rule: every complete message emitted by `source` is delivered
/// to `destination` while `enabled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MidiRoute {
    pub id: String,
    pub enabled: bool,
    pub source: RouteEndpoint,
    pub destination: RouteEndpoint,
    /// Runtime counter; resets on restart.
    #[serde(skip)]
    pub messages_forwarded: u64,
}
