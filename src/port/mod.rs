//! MIDI port layer: physical and virtual endpoints behind one abstraction.

mod midi_port;
mod registry;

pub use midi_port::MidiPort;
pub use registry::PortRegistry;

use std::sync::Arc;

/// Prefix marking virtual port identifiers, e.g. `virtual:abc123`.
pub const VIRTUAL_PREFIX: &str = "virtual:";

/// Invoked with the source port id and the complete message bytes whenever a
/// port finishes reassembling an inbound message.
pub type RoutingCallback = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    pub fn is_input(self) -> bool {
        matches!(self, PortDirection::Input)
    }
}

/// Whether a port id denotes a virtual endpoint.
pub fn is_virtual_id(port_id: &str) -> bool {
    port_id.starts_with(VIRTUAL_PREFIX)
}

/// The bare id of a virtual port id (`virtual:abc` → `abc`); `None` for
/// physical ids.
pub fn strip_virtual_prefix(port_id: &str) -> Option<&str> {
    port_id.strip_prefix(VIRTUAL_PREFIX)
}

/// Direction inferred from the physical-id naming convention: `input-*` ids
/// are inputs, everything else is an output. Route auto-open relies on this.
pub fn infer_direction(port_id: &str) -> PortDirection {
    if port_id.starts_with("input-") {
        PortDirection::Input
    } else {
        PortDirection::Output
    }
}
