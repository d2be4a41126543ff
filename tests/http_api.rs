//! HTTP surface tests, including cross-instance forwarding against a second
//! bridge served on a real socket.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use midi_bridge::{
    router, wire, BridgeState, LoopbackDriver, MidiDriver, PortDirection, RouteEndpoint,
    RouteManager, RouteStore,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

fn bridge(driver: LoopbackDriver, dir: &TempDir) -> (axum::Router, BridgeState) {
    let driver: Arc<dyn MidiDriver> = Arc::new(driver);
    let (registry, routes) = wire(
        driver.clone(),
        RouteStore::new(dir.path().join("routes.json")),
    );
    let state = BridgeState {
        driver,
        registry,
        routes,
    };
    (router(state.clone()), state)
}

fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_and_cors() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = bridge(LoopbackDriver::new(), &dir);

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));

    let preflight = app
        .oneshot(request(Method::OPTIONS, "/routes", None))
        .await
        .unwrap();
    assert_eq!(preflight.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        preflight.headers()["access-control-allow-methods"],
        "GET, POST, PUT, DELETE, OPTIONS"
    );
}

#[tokio::test]
async fn ports_listing_reflects_driver() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = bridge(LoopbackDriver::with_devices(&["Keys"], &["Synth"]), &dir);

    let response = app
        .oneshot(request(Method::GET, "/ports", None))
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await,
        json!({ "inputs": ["Keys"], "outputs": ["Synth"] })
    );
}

#[tokio::test]
async fn open_failure_reports_success_false() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = bridge(LoopbackDriver::new(), &dir);

    let response = app
        .oneshot(request(
            Method::POST,
            "/port/input-0",
            Some(json!({ "name": "Missing Device", "type": "input" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn send_rejects_invalid_messages() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = bridge(LoopbackDriver::new(), &dir);

    let created = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/virtual/vo",
            Some(json!({ "name": "Out", "type": "output" })),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::OK);

    // Lone SysEx start byte.
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/virtual/vo/send",
            Some(json!({ "message": [0xF0] })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);

    // Empty message.
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/virtual/vo/send",
            Some(json!({ "message": [] })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown port.
    let response = app
        .oneshot(request(
            Method::POST,
            "/port/nope/send",
            Some(json!({ "message": [0x90, 60, 100] })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn virtual_lifecycle_inject_and_drain() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = bridge(LoopbackDriver::new(), &dir);

    let created = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/virtual/vi",
            Some(json!({ "name": "In", "type": "input" })),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::OK);

    let listing = app
        .clone()
        .oneshot(request(Method::GET, "/virtual", None))
        .await
        .unwrap();
    assert_eq!(
        body_json(listing).await,
        json!({ "inputs": ["vi"], "outputs": [] })
    );

    let injected = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/virtual/vi/inject",
            Some(json!({ "message": [0x90, 0x3C, 0x7F] })),
        ))
        .await
        .unwrap();
    assert_eq!(injected.status(), StatusCode::OK);

    let messages = app
        .clone()
        .oneshot(request(Method::GET, "/virtual/vi/messages", None))
        .await
        .unwrap();
    assert_eq!(
        body_json(messages).await,
        json!({ "messages": [[0x90, 0x3C, 0x7F]] })
    );

    // Drained: a second poll is empty.
    let messages = app
        .clone()
        .oneshot(request(Method::GET, "/virtual/vi/messages", None))
        .await
        .unwrap();
    assert_eq!(body_json(messages).await, json!({ "messages": [] }));

    // Inject on an output port is misuse.
    let out = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/virtual/vo",
            Some(json!({ "name": "Out", "type": "output" })),
        ))
        .await
        .unwrap();
    assert_eq!(out.status(), StatusCode::OK);
    let misuse = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/virtual/vo/inject",
            Some(json!({ "message": [0x90, 0x3C, 0x7F] })),
        ))
        .await
        .unwrap();
    assert_eq!(misuse.status(), StatusCode::BAD_REQUEST);

    let deleted = app
        .oneshot(request(Method::DELETE, "/virtual/vi", None))
        .await
        .unwrap();
    assert_eq!(body_json(deleted).await["success"], true);
}

#[tokio::test]
async fn route_crud_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let (app, state) = bridge(LoopbackDriver::new(), &dir);

    let created = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/routes",
            Some(json!({
                "source": { "serverUrl": "", "portId": "virtual:vi", "portName": "" },
                "destination": { "serverUrl": "local", "portId": "virtual:vo", "portName": "" }
            })),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = body_json(created).await;
    assert_eq!(created["success"], true);
    let route_id = created["id"].as_str().unwrap().to_string();

    let listing = app
        .clone()
        .oneshot(request(Method::GET, "/routes", None))
        .await
        .unwrap();
    let listing = body_json(listing).await;
    let routes = listing["routes"].as_array().unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0]["id"], route_id.as_str());
    assert_eq!(routes[0]["enabled"], true);
    assert_eq!(routes[0]["status"]["messagesForwarded"], 0);

    let toggled = app
        .clone()
        .oneshot(request(
            Method::PUT,
            &format!("/routes/{route_id}"),
            Some(json!({ "enabled": false })),
        ))
        .await
        .unwrap();
    assert_eq!(toggled.status(), StatusCode::OK);
    assert!(!state.routes.get_route(&route_id).unwrap().enabled);

    let missing = app
        .clone()
        .oneshot(request(
            Method::PUT,
            "/routes/absent",
            Some(json!({ "enabled": true })),
        ))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let deleted = app
        .oneshot(request(
            Method::DELETE,
            &format!("/routes/{route_id}"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);
    assert!(state.routes.list_routes().is_empty());
}

#[tokio::test]
async fn remote_forwarding_preserves_order() {
    // Peer bridge on a real socket, with a virtual output 'vi2'.
    let peer_dir = tempfile::tempdir().unwrap();
    let peer_driver = LoopbackDriver::new();
    let (peer_app, peer_state) = bridge(peer_driver.clone(), &peer_dir);
    peer_state
        .registry
        .create_virtual("vi2", "Peer Out", PortDirection::Output)
        .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let peer_port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, peer_app).await.unwrap();
    });

    // Local side only needs a route manager pointing at the peer.
    let dir = tempfile::tempdir().unwrap();
    let manager = RouteManager::new(RouteStore::new(dir.path().join("routes.json")));
    let route_id = manager
        .add_route(
            RouteEndpoint {
                server_url: String::new(),
                port_id: "virtual:vi".to_string(),
                port_name: String::new(),
            },
            RouteEndpoint {
                server_url: format!("http://127.0.0.1:{peer_port}"),
                port_id: "virtual:vi2".to_string(),
                port_name: String::new(),
            },
            true,
            None,
        )
        .unwrap();

    for i in 0..100u8 {
        manager.forward("virtual:vi", &[0x90, 0x3C, i]);
    }
    assert_eq!(manager.get_route(&route_id).unwrap().messages_forwarded, 100);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if peer_driver.sent("Peer Out").len() >= 100 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "peer received only {} of 100 messages",
            peer_driver.sent("Peer Out").len()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let received = peer_driver.sent("Peer Out");
    assert_eq!(received.len(), 100);
    for (i, frame) in received.iter().enumerate() {
        assert_eq!(frame, &vec![0x90, 0x3C, i as u8]);
    }
}
