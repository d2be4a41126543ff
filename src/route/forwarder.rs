//! Per-host remote forwarder.
//!
//! One forwarder exists per remote `host:port`. Enqueueing never blocks; a
//! dedicated worker thread drains the FIFO and POSTs over a single keep-alive
//! client, so messages for one peer arrive in emission order. Failed posts
//! are logged and dropped — retrying would reorder the stream.

use crossbeam_channel::{unbounded, Receiver, Sender};
use reqwest::blocking::Client;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const READ_TIMEOUT: Duration = Duration::from_secs(2);

enum Command {
    Post { path: String, body: String },
    Shutdown,
}

/// Ordered, non-blocking delivery of JSON bodies to one remote bridge.
pub struct RemoteForwarder {
    sender: Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl RemoteForwarder {
    pub fn new(host: &str, port: u16) -> Self {
        let (sender, receiver) = unbounded();
        let base_url = format!("http://{host}:{port}");
        let thread_name = format!("midi-forward-{host}-{port}");
        let worker = thread::Builder::new()
            .name(thread_name)
            .spawn(move || Self::run(base_url, receiver))
            .expect("Failed to spawn forwarder thread");
        Self {
            sender,
            worker: Some(worker),
        }
    }

    /// Queue one POST. Returns immediately; never waits on the network.
    pub fn send(&self, path: String, body: String) {
        if self.sender.send(Command::Post { path, body }).is_err() {
            warn!("Forwarder worker gone, dropping message");
        }
    }

    fn run(base_url: String, receiver: Receiver<Command>) {
        // Built on the worker thread: the blocking client owns its own
        // runtime and must not be created inside an async context.
        let client = match Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to build HTTP client for {}: {}", base_url, e);
                return;
            }
        };

        loop {
            match receiver.recv() {
                Ok(Command::Post { path, body }) => {
                    let url = format!("{base_url}{path}");
                    match client
                        .post(&url)
                        .header(reqwest::header::CONTENT_TYPE, "application/json")
                        .body(body)
                        .send()
                    {
                        Ok(response) if response.status().is_success() => {
                            debug!("Forwarded to {}", url);
                        }
                        Ok(response) => {
                            warn!("Remote forward to {} failed: {}", url, response.status());
                        }
                        Err(e) => {
                            warn!("Remote forward to {} failed: {}", url, e);
                        }
                    }
                }
                Ok(Command::Shutdown) | Err(_) => break,
            }
        }
    }
}

impl Drop for RemoteForwarder {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Split `http://host:port[/…]` into host and port (default 80). Any path
/// component is ignored; the request path is always recomputed from the
/// destination port id. `https://` is not supported and is rejected.
pub(crate) fn parse_host_port(server_url: &str) -> Option<(String, u16)> {
    if server_url.starts_with("https://") {
        warn!("https destinations are not supported: {}", server_url);
        return None;
    }
    let rest = server_url.strip_prefix("http://").unwrap_or(server_url);
    let authority = rest.split('/').next().unwrap_or("");
    if authority.is_empty() {
        return None;
    }
    match authority.split_once(':') {
        Some((host, port)) => {
            let port = port.parse().ok()?;
            Some((host.to_string(), port))
        }
        None => Some((authority.to_string(), 80)),
    }
}
