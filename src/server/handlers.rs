//! HTTP handlers translating requests into core operations.

use super::BridgeState;
use crate::error::Error;
use crate::port::PortDirection;
use crate::route::RouteEndpoint;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct OpenPortRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub port_type: String,
}

#[derive(Deserialize)]
pub struct SendRequest {
    pub message: Vec<u8>,
}

#[derive(Deserialize)]
pub struct CreateRouteRequest {
    pub source: RouteEndpoint,
    pub destination: RouteEndpoint,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub id: Option<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

fn success_flag(success: bool) -> Json<Value> {
    Json(json!({ "success": success }))
}

fn error_response(error: &Error) -> Response {
    match error {
        Error::InvalidMessage(_) | Error::Misuse(_) | Error::PortInUse(_) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": error.to_string(), "success": false })),
        )
            .into_response(),
        Error::PortNotFound(_) | Error::RouteNotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": error.to_string() })),
        )
            .into_response(),
        // The platform refused the open; the request itself was fine.
        Error::Device(_) => (
            StatusCode::OK,
            Json(json!({ "success": false, "error": error.to_string() })),
        )
            .into_response(),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": error.to_string() })),
        )
            .into_response(),
    }
}

fn parse_direction(port_type: &str) -> Result<PortDirection, Error> {
    match port_type {
        "input" => Ok(PortDirection::Input),
        "output" => Ok(PortDirection::Output),
        other => Err(Error::InvalidMessage(format!(
            "port type must be 'input' or 'output', got '{other}'"
        ))),
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_ports(State(state): State<BridgeState>) -> Json<Value> {
    Json(json!({
        "inputs": state.driver.input_names(),
        "outputs": state.driver.output_names(),
    }))
}

pub async fn open_port(
    State(state): State<BridgeState>,
    Path(port_id): Path<String>,
    Json(request): Json<OpenPortRequest>,
) -> Response {
    let direction = match parse_direction(&request.port_type) {
        Ok(direction) => direction,
        Err(e) => return error_response(&e),
    };
    match state.registry.open_physical(&port_id, &request.name, direction) {
        Ok(()) => success().into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn close_port(
    State(state): State<BridgeState>,
    Path(port_id): Path<String>,
) -> Json<Value> {
    success_flag(state.registry.close_physical(&port_id))
}

pub async fn send_port(
    State(state): State<BridgeState>,
    Path(port_id): Path<String>,
    Json(request): Json<SendRequest>,
) -> Response {
    let Some(port) = state.registry.get_physical(&port_id) else {
        return error_response(&Error::PortNotFound(port_id));
    };
    match port.send(&request.message) {
        Ok(()) => success().into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn port_messages(
    State(state): State<BridgeState>,
    Path(port_id): Path<String>,
) -> Response {
    let Some(port) = state.registry.get_physical(&port_id) else {
        return error_response(&Error::PortNotFound(port_id));
    };
    Json(json!({ "messages": port.take_messages() })).into_response()
}

pub async fn list_virtual(State(state): State<BridgeState>) -> Json<Value> {
    let (inputs, outputs) = state.registry.list_virtual();
    Json(json!({ "inputs": inputs, "outputs": outputs }))
}

pub async fn create_virtual(
    State(state): State<BridgeState>,
    Path(port_id): Path<String>,
    Json(request): Json<OpenPortRequest>,
) -> Response {
    let direction = match parse_direction(&request.port_type) {
        Ok(direction) => direction,
        Err(e) => return error_response(&e),
    };
    match state.registry.create_virtual(&port_id, &request.name, direction) {
        Ok(()) => success().into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn delete_virtual(
    State(state): State<BridgeState>,
    Path(port_id): Path<String>,
) -> Json<Value> {
    success_flag(state.registry.delete_virtual(&port_id))
}

pub async fn inject_virtual(
    State(state): State<BridgeState>,
    Path(port_id): Path<String>,
    Json(request): Json<SendRequest>,
) -> Response {
    let Some(port) = state.registry.get_virtual(&port_id) else {
        return error_response(&Error::PortNotFound(port_id));
    };
    match port.inject(&request.message) {
        Ok(()) => success().into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn send_virtual(
    State(state): State<BridgeState>,
    Path(port_id): Path<String>,
    Json(request): Json<SendRequest>,
) -> Response {
    let Some(port) = state.registry.get_virtual(&port_id) else {
        return error_response(&Error::PortNotFound(port_id));
    };
    match port.send(&request.message) {
        Ok(()) => success().into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn virtual_messages(
    State(state): State<BridgeState>,
    Path(port_id): Path<String>,
) -> Response {
    let Some(port) = state.registry.get_virtual(&port_id) else {
        return error_response(&Error::PortNotFound(port_id));
    };
    Json(json!({ "messages": port.take_messages() })).into_response()
}

pub async fn list_routes(State(state): State<BridgeState>) -> Json<Value> {
    let routes: Vec<Value> = state
        .routes
        .list_routes()
        .into_iter()
        .map(|route| {
            let mut value = serde_json::to_value(&route).unwrap_or_default();
            value["status"] = json!({ "messagesForwarded": route.messages_forwarded });
            value
        })
        .collect();
    Json(json!({ "routes": routes }))
}

pub async fn create_route(
    State(state): State<BridgeState>,
    Json(request): Json<CreateRouteRequest>,
) -> Response {
    match state.routes.add_route(
        request.source,
        request.destination,
        request.enabled,
        request.id,
    ) {
        Ok(id) => {
            // A fresh route referencing local hardware starts forwarding
            // immediately, without an explicit open call.
            if let Some(route) = state.routes.get_route(&id) {
                state.registry.ensure_route_ports(&route);
            }
            (StatusCode::CREATED, Json(json!({ "success": true, "id": id }))).into_response()
        }
        Err(e) => error_response(&e),
    }
}

pub async fn set_route_enabled(
    State(state): State<BridgeState>,
    Path(route_id): Path<String>,
    Json(request): Json<SetEnabledRequest>,
) -> Response {
    if state.routes.set_route_enabled(&route_id, request.enabled) {
        success().into_response()
    } else {
        error_response(&Error::RouteNotFound(route_id))
    }
}

pub async fn delete_route(
    State(state): State<BridgeState>,
    Path(route_id): Path<String>,
) -> Response {
    if state.routes.remove_route(&route_id) {
        success().into_response()
    } else {
        error_response(&Error::RouteNotFound(route_id))
    }
}
