//! Port registry: id → live port, lifecycle, and local dispatch.

use super::{
    infer_direction, is_virtual_id, strip_virtual_prefix, MidiPort, PortDirection, RoutingCallback,
    VIRTUAL_PREFIX,
};
use crate::driver::MidiDriver;
use crate::error::{Error, Result};
use crate::route::MidiRoute;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Default)]
struct PortMaps {
    physical: HashMap<String, Arc<MidiPort>>,
    // Keyed by the bare id, without the `virtual:` prefix.
    virtual_: HashMap<String, Arc<MidiPort>>,
}

/// Owns every open port. Physical and virtual ids are disjoint namespaces;
/// the `virtual:` prefix disambiguates at dispatch time.
pub struct PortRegistry {
    driver: Arc<dyn MidiDriver>,
    maps: Mutex<PortMaps>,
    routing: Mutex<Option<RoutingCallback>>,
}

impl PortRegistry {
    pub fn new(driver: Arc<dyn MidiDriver>) -> Self {
        Self {
            driver,
            maps: Mutex::new(PortMaps::default()),
            routing: Mutex::new(None),
        }
    }

    /// Install the callback handed to every input port opened from now on.
    /// Set once at wiring time, before any port is opened.
    pub fn set_routing_callback(&self, callback: RoutingCallback) {
        *self.routing.lock() = Some(callback);
    }

    /// Open a physical port attached to the device matching `name`.
    pub fn open_physical(
        &self,
        port_id: &str,
        name: &str,
        direction: PortDirection,
    ) -> Result<()> {
        if port_id.is_empty() {
            return Err(Error::InvalidMessage("empty port id".to_string()));
        }
        if self.maps.lock().physical.contains_key(port_id) {
            return Err(Error::PortInUse(port_id.to_string()));
        }
        let port = MidiPort::open_physical(self.driver.as_ref(), port_id, name, direction)?;
        self.install_callback(&port);
        self.maps
            .lock()
            .physical
            .insert(port_id.to_string(), Arc::new(port));
        info!("Opened physical port '{}' ({})", port_id, name);
        Ok(())
    }

    /// Close and drop a physical port. Returns whether it was open.
    pub fn close_physical(&self, port_id: &str) -> bool {
        let removed = self.maps.lock().physical.remove(port_id).is_some();
        if removed {
            info!("Closed physical port '{}'", port_id);
        }
        removed
    }

    /// Create a virtual endpoint. `port_id` is the bare id; the port itself
    /// carries the `virtual:` prefix so routes match its traffic.
    pub fn create_virtual(
        &self,
        port_id: &str,
        name: &str,
        direction: PortDirection,
    ) -> Result<()> {
        if port_id.is_empty() {
            return Err(Error::InvalidMessage("empty port id".to_string()));
        }
        if self.maps.lock().virtual_.contains_key(port_id) {
            return Err(Error::PortInUse(port_id.to_string()));
        }
        let full_id = format!("{VIRTUAL_PREFIX}{port_id}");
        let port = MidiPort::open_virtual(self.driver.as_ref(), full_id, name, direction)?;
        self.install_callback(&port);
        self.maps
            .lock()
            .virtual_
            .insert(port_id.to_string(), Arc::new(port));
        info!("Created virtual port '{}' ({})", port_id, name);
        Ok(())
    }

    /// Destroy a virtual endpoint. Returns whether it existed.
    pub fn delete_virtual(&self, port_id: &str) -> bool {
        let removed = self.maps.lock().virtual_.remove(port_id).is_some();
        if removed {
            info!("Deleted virtual port '{}'", port_id);
        }
        removed
    }

    pub fn get_physical(&self, port_id: &str) -> Option<Arc<MidiPort>> {
        self.maps.lock().physical.get(port_id).cloned()
    }

    /// Look up a virtual port by its bare id.
    pub fn get_virtual(&self, port_id: &str) -> Option<Arc<MidiPort>> {
        self.maps.lock().virtual_.get(port_id).cloned()
    }

    /// Bare ids of the live virtual ports, split by direction.
    pub fn list_virtual(&self) -> (Vec<String>, Vec<String>) {
        let maps = self.maps.lock();
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for (id, port) in maps.virtual_.iter() {
            if port.direction().is_input() {
                inputs.push(id.clone());
            } else {
                outputs.push(id.clone());
            }
        }
        inputs.sort();
        outputs.sort();
        (inputs, outputs)
    }

    /// Deliver `bytes` to a local destination port. Entry point for the
    /// route manager's local forwarder; unknown destinations are dropped
    /// with a log line, never surfaced.
    pub fn send_to_local(&self, dest_port_id: &str, bytes: &[u8]) {
        let port = match strip_virtual_prefix(dest_port_id) {
            Some(bare) => self.get_virtual(bare),
            None => self.get_physical(dest_port_id),
        };
        match port {
            Some(port) => {
                if let Err(e) = port.send(bytes) {
                    warn!("Local forward to '{}' failed: {}", dest_port_id, e);
                }
            }
            None => warn!("Dropping message for unknown port '{}'", dest_port_id),
        }
    }

    /// Make sure the local physical ports a route references are open,
    /// inferring direction from the id prefix. Called at startup for every
    /// persisted route and again when a route is created.
    pub fn ensure_route_ports(&self, route: &MidiRoute) {
        for endpoint in [&route.source, &route.destination] {
            if !endpoint.is_local()
                || is_virtual_id(&endpoint.port_id)
                || endpoint.port_name.is_empty()
            {
                continue;
            }
            if self.maps.lock().physical.contains_key(&endpoint.port_id) {
                continue;
            }
            let direction = infer_direction(&endpoint.port_id);
            match self.open_physical(&endpoint.port_id, &endpoint.port_name, direction) {
                Ok(()) => debug!(
                    "Auto-opened '{}' for route {}",
                    endpoint.port_id, route.id
                ),
                Err(e) => warn!(
                    "Auto-open of '{}' for route {} failed: {}",
                    endpoint.port_id, route.id, e
                ),
            }
        }
    }

    fn install_callback(&self, port: &MidiPort) {
        if port.direction().is_input() {
            if let Some(callback) = self.routing.lock().clone() {
                port.set_routing_callback(callback);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::LoopbackDriver;
    use crate::route::RouteEndpoint;

    fn registry(driver: &LoopbackDriver) -> PortRegistry {
        PortRegistry::new(Arc::new(driver.clone()))
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let driver = LoopbackDriver::with_devices(&["Keys"], &[]);
        let registry = registry(&driver);
        registry
            .open_physical("input-0", "Keys", PortDirection::Input)
            .unwrap();
        assert!(matches!(
            registry.open_physical("input-0", "Keys", PortDirection::Input),
            Err(Error::PortInUse(_))
        ));

        registry.create_virtual("a", "Va", PortDirection::Input).unwrap();
        assert!(matches!(
            registry.create_virtual("a", "Va", PortDirection::Input),
            Err(Error::PortInUse(_))
        ));
    }

    #[test]
    fn test_open_failure_leaves_state_unchanged() {
        let driver = LoopbackDriver::new();
        let registry = registry(&driver);
        assert!(registry
            .open_physical("input-0", "Missing", PortDirection::Input)
            .is_err());
        assert!(registry.get_physical("input-0").is_none());
    }

    #[test]
    fn test_close_stops_callbacks() {
        let driver = LoopbackDriver::with_devices(&["Keys"], &[]);
        let registry = registry(&driver);
        registry
            .open_physical("input-0", "Keys", PortDirection::Input)
            .unwrap();
        assert!(driver.is_input_open("Keys"));
        assert!(registry.close_physical("input-0"));
        assert!(!driver.is_input_open("Keys"));
        assert!(!registry.close_physical("input-0"));
    }

    #[test]
    fn test_send_to_local_resolves_namespaces() {
        let driver = LoopbackDriver::with_devices(&[], &["Synth"]);
        let registry = registry(&driver);
        registry
            .open_physical("output-0", "Synth", PortDirection::Output)
            .unwrap();
        registry
            .create_virtual("vo", "Virtual Out", PortDirection::Output)
            .unwrap();

        registry.send_to_local("output-0", &[0x90, 60, 100]);
        registry.send_to_local("virtual:vo", &[0x80, 60, 0]);
        // Unknown destination: dropped silently.
        registry.send_to_local("output-9", &[0xFE]);

        assert_eq!(driver.sent("Synth"), vec![vec![0x90, 60, 100]]);
        assert_eq!(driver.sent("Virtual Out"), vec![vec![0x80, 60, 0]]);
    }

    #[test]
    fn test_auto_open_infers_direction_and_skips_open_ports() {
        let driver = LoopbackDriver::with_devices(&["Keys"], &["Synth"]);
        let registry = registry(&driver);
        let route = MidiRoute {
            id: "route-1".to_string(),
            enabled: true,
            source: RouteEndpoint {
                server_url: String::new(),
                port_id: "input-0".to_string(),
                port_name: "Keys".to_string(),
            },
            destination: RouteEndpoint {
                server_url: "local".to_string(),
                port_id: "output-0".to_string(),
                port_name: "Synth".to_string(),
            },
            messages_forwarded: 0,
        };

        registry.ensure_route_ports(&route);
        assert!(registry.get_physical("input-0").is_some());
        assert!(registry.get_physical("output-0").is_some());
        assert_eq!(
            registry.get_physical("input-0").unwrap().direction(),
            PortDirection::Input
        );
        assert_eq!(
            registry.get_physical("output-0").unwrap().direction(),
            PortDirection::Output
        );

        // Second pass is a no-op.
        registry.ensure_route_ports(&route);

        // Virtual and remote endpoints are never auto-opened.
        let remote = MidiRoute {
            id: "route-2".to_string(),
            enabled: true,
            source: RouteEndpoint {
                server_url: String::new(),
                port_id: "virtual:vi".to_string(),
                port_name: "Vi".to_string(),
            },
            destination: RouteEndpoint {
                server_url: "http://peer:7777".to_string(),
                port_id: "output-1".to_string(),
                port_name: "Elsewhere".to_string(),
            },
            messages_forwarded: 0,
        };
        registry.ensure_route_ports(&remote);
        assert!(registry.get_virtual("vi").is_none());
        assert!(registry.get_physical("output-1").is_none());
    }

    #[test]
    fn test_routing_callback_installed_on_inputs() {
        let driver = LoopbackDriver::with_devices(&["Keys"], &[]);
        let registry = registry(&driver);
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        registry.set_routing_callback(Arc::new(move |id, _| sink.lock().push(id.to_string())));

        registry
            .open_physical("input-0", "Keys", PortDirection::Input)
            .unwrap();
        driver.feed("Keys", &[0x90, 60, 100]);
        assert_eq!(seen.lock().as_slice(), &["input-0".to_string()]);
    }
}
