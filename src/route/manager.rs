//! Route table and dispatch.
//!
//! `forward` is the hot path: it runs on the MIDI driver's callback thread
//! for every inbound message, so it takes the routes lock only to snapshot
//! the matching rules and to bump counters, and it never blocks on I/O —
//! remote delivery is a queue push.

use super::forwarder::{parse_host_port, RemoteForwarder};
use super::{MidiRoute, RouteEndpoint, RouteStore};
use crate::error::{Error, Result};
use crate::port::strip_virtual_prefix;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Delivers a message to a local destination port; wired to the port
/// registry once at startup.
pub type LocalForwarder = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// Owns the route table, its persistence, and the per-host remote
/// forwarders.
pub struct RouteManager {
    routes: Mutex<BTreeMap<String, MidiRoute>>,
    local: Mutex<Option<LocalForwarder>>,
    forwarders: Mutex<HashMap<String, Arc<RemoteForwarder>>>,
    store: RouteStore,
}

impl RouteManager {
    /// Create a manager backed by `store`, loading any persisted table.
    pub fn new(store: RouteStore) -> Self {
        let routes = store
            .load()
            .into_iter()
            .map(|route| (route.id.clone(), route))
            .collect();
        Self {
            routes: Mutex::new(routes),
            local: Mutex::new(None),
            forwarders: Mutex::new(HashMap::new()),
            store,
        }
    }

    /// Set once at wiring time.
    pub fn set_local_forwarder(&self, forwarder: LocalForwarder) {
        *self.local.lock() = Some(forwarder);
    }

    /// Insert a route and persist. A caller-supplied id lets one logical
    /// route carry the same id on several bridge instances.
    pub fn add_route(
        &self,
        source: RouteEndpoint,
        destination: RouteEndpoint,
        enabled: bool,
        prespecified_id: Option<String>,
    ) -> Result<String> {
        if source.port_id.is_empty() || destination.port_id.is_empty() {
            return Err(Error::InvalidMessage(
                "route endpoints need a port id".to_string(),
            ));
        }
        let mut routes = self.routes.lock();
        let id = match prespecified_id {
            Some(id) if !id.is_empty() => id,
            _ => loop {
                let candidate = generate_route_id();
                if !routes.contains_key(&candidate) {
                    break candidate;
                }
            },
        };
        info!(
            "Added route {}: {}:{} -> {}:{}",
            id, source.server_url, source.port_id, destination.server_url, destination.port_id
        );
        routes.insert(
            id.clone(),
            MidiRoute {
                id: id.clone(),
                enabled,
                source,
                destination,
                messages_forwarded: 0,
            },
        );
        self.persist(&routes);
        Ok(id)
    }

    /// Remove a route and persist. Returns whether it existed.
    pub fn remove_route(&self, route_id: &str) -> bool {
        let mut routes = self.routes.lock();
        if routes.remove(route_id).is_none() {
            return false;
        }
        self.persist(&routes);
        info!("Removed route {}", route_id);
        true
    }

    /// Flip a route's enabled flag and persist. Returns whether it existed.
    pub fn set_route_enabled(&self, route_id: &str, enabled: bool) -> bool {
        let mut routes = self.routes.lock();
        let Some(route) = routes.get_mut(route_id) else {
            return false;
        };
        route.enabled = enabled;
        self.persist(&routes);
        info!("Route {} enabled={}", route_id, enabled);
        true
    }

    /// Snapshot of the table.
    pub fn list_routes(&self) -> Vec<MidiRoute> {
        self.routes.lock().values().cloned().collect()
    }

    pub fn get_route(&self, route_id: &str) -> Option<MidiRoute> {
        self.routes.lock().get(route_id).cloned()
    }

    /// Deliver one inbound message through every enabled route whose source
    /// matches. Called from the MIDI driver's thread; never fails observably.
    pub fn forward(&self, source_port_id: &str, bytes: &[u8]) {
        let matching: Vec<MidiRoute> = {
            let routes = self.routes.lock();
            routes
                .values()
                .filter(|r| r.enabled && r.source.port_id == source_port_id)
                .cloned()
                .collect()
        };
        if matching.is_empty() {
            return;
        }

        let local = self.local.lock().clone();
        for route in &matching {
            if route.destination.is_local() {
                match &local {
                    Some(forward) => forward(&route.destination.port_id, bytes),
                    None => warn!("No local forwarder wired, dropping message"),
                }
            } else {
                self.forward_remote(&route.destination, bytes);
            }

            let mut routes = self.routes.lock();
            if let Some(entry) = routes.get_mut(&route.id) {
                entry.messages_forwarded += 1;
            }
        }
    }

    fn forward_remote(&self, destination: &RouteEndpoint, bytes: &[u8]) {
        let Some((host, port)) = parse_host_port(&destination.server_url) else {
            warn!(
                "Unparseable destination URL '{}', dropping message",
                destination.server_url
            );
            return;
        };
        let path = match strip_virtual_prefix(&destination.port_id) {
            Some(bare) => format!("/virtual/{bare}/send"),
            None => format!("/port/{}/send", destination.port_id),
        };
        let body = serde_json::json!({ "message": bytes }).to_string();
        debug!("Forwarding {} bytes to {}:{}{}", bytes.len(), host, port, path);
        self.forwarder(&host, port).send(path, body);
    }

    /// The persistent forwarder for `host:port`, created on first use.
    fn forwarder(&self, host: &str, port: u16) -> Arc<RemoteForwarder> {
        let key = format!("{host}:{port}");
        let mut forwarders = self.forwarders.lock();
        forwarders
            .entry(key)
            .or_insert_with(|| {
                info!("Created persistent forwarder to {}:{}", host, port);
                Arc::new(RemoteForwarder::new(host, port))
            })
            .clone()
    }

    /// Write-through under the routes lock. Failures are logged; the
    /// in-memory table stays authoritative for this process.
    fn persist(&self, routes: &BTreeMap<String, MidiRoute>) {
        let snapshot: Vec<MidiRoute> = routes.values().cloned().collect();
        if let Err(e) = self.store.save(&snapshot) {
            warn!("Failed to save routes to {}: {}", self.store.path().display(), e);
        }
    }
}

/// `route-{unix seconds}-{7 chars of [a-z0-9]}`.
fn generate_route_id() -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut rng = rand::thread_rng();
    let suffix: String = (0..7)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect();
    format!("route-{seconds}-{suffix}")
}
