//! HTTP facade over the bridge core.

mod cors;
mod handlers;

pub use cors::CorsLayer;

use crate::driver::MidiDriver;
use crate::port::PortRegistry;
use crate::route::RouteManager;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;

/// Shared handler state.
#[derive(Clone)]
pub struct BridgeState {
    pub driver: Arc<dyn MidiDriver>,
    pub registry: Arc<PortRegistry>,
    pub routes: Arc<RouteManager>,
}

/// The full HTTP surface of the bridge.
pub fn router(state: BridgeState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ports", get(handlers::list_ports))
        .route(
            "/port/{port_id}",
            post(handlers::open_port).delete(handlers::close_port),
        )
        .route("/port/{port_id}/send", post(handlers::send_port))
        .route("/port/{port_id}/messages", get(handlers::port_messages))
        .route("/virtual", get(handlers::list_virtual))
        .route(
            "/virtual/{port_id}",
            post(handlers::create_virtual).delete(handlers::delete_virtual),
        )
        .route("/virtual/{port_id}/inject", post(handlers::inject_virtual))
        .route("/virtual/{port_id}/send", post(handlers::send_virtual))
        .route(
            "/virtual/{port_id}/messages",
            get(handlers::virtual_messages),
        )
        .route(
            "/routes",
            get(handlers::list_routes).post(handlers::create_route),
        )
        .route(
            "/routes/{route_id}",
            put(handlers::set_route_enabled).delete(handlers::delete_route),
        )
        .layer(CorsLayer::new())
        .with_state(state)
}
