//! HTTP-fronted MIDI routing bridge.
//!
//! Exposes hardware and virtual MIDI endpoints as HTTP resources and
//! forwards MIDI byte streams between them, locally in-process and across
//! bridge instances over HTTP. The bridge is byte-transparent: it never
//! transforms, filters, or re-times MIDI data.
//!
//! ## Architecture
//!
//! - [`port`] — physical and virtual endpoints with inbound queuing and
//!   SysEx reassembly, owned by a [`PortRegistry`]
//! - [`route`] — the persistent forwarding table and the per-host remote
//!   forwarders, owned by a [`RouteManager`]
//! - [`driver`] — the platform MIDI seam: midir in production, an
//!   in-memory loopback for tests and headless use
//! - [`server`] — the axum HTTP surface

pub mod error;
pub use error::{Error, Result};

pub mod driver;
pub use driver::{LoopbackDriver, MidiDriver, MidirDriver};

pub mod sysex;
pub use sysex::SysexAssembler;

pub mod port;
pub use port::{MidiPort, PortDirection, PortRegistry};

pub mod route;
pub use route::{MidiRoute, RouteEndpoint, RouteManager, RouteStore};

pub mod server;
pub use server::{router, BridgeState};

use std::sync::Arc;

/// Build the core and connect the two callback slots: ports route inbound
/// messages into the manager, and the manager delivers local traffic back
/// through the registry. The registry side is held weakly so the pair never
/// forms a strong reference cycle. Local physical ports referenced by
/// persisted routes are opened before this returns.
pub fn wire(
    driver: Arc<dyn MidiDriver>,
    store: RouteStore,
) -> (Arc<PortRegistry>, Arc<RouteManager>) {
    let registry = Arc::new(PortRegistry::new(driver));
    let routes = Arc::new(RouteManager::new(store));

    let routes_for_ports = routes.clone();
    registry.set_routing_callback(Arc::new(move |port_id, bytes| {
        routes_for_ports.forward(port_id, bytes);
    }));

    let registry_for_routes = Arc::downgrade(&registry);
    routes.set_local_forwarder(Arc::new(move |dest_port_id, bytes| {
        if let Some(registry) = registry_for_routes.upgrade() {
            registry.send_to_local(dest_port_id, bytes);
        }
    }));

    for route in routes.list_routes() {
        registry.ensure_route_ports(&route);
    }

    (registry, routes)
}
