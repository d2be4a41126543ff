//! A single MIDI endpoint: inbound queue, SysEx reassembly, outbound send.
//!
//! Physical and virtual ports share this type; they differ only in how the
//! backing endpoint is acquired and in whether `inject` is allowed.

use super::{PortDirection, RoutingCallback};
use crate::driver::{FragmentCallback, InputConnection, MidiDriver, OutputConnection};
use crate::error::{Error, Result};
use crate::sysex::{SysexAssembler, SYSEX_END, SYSEX_START};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

#[derive(Default)]
struct Inbound {
    assembler: SysexAssembler,
    queue: Vec<Vec<u8>>,
}

enum Connection {
    Input(#[allow(dead_code)] Mutex<Box<dyn InputConnection>>),
    Output(Mutex<Box<dyn OutputConnection>>),
}

/// One open MIDI endpoint. Dropping the port closes it.
pub struct MidiPort {
    id: String,
    name: String,
    direction: PortDirection,
    virtual_endpoint: bool,
    // Declared before the inbound state so the driver connection closes
    // (stopping callbacks) before the queue goes away.
    connection: Connection,
    inbound: Arc<Mutex<Inbound>>,
    routing: Arc<Mutex<Option<RoutingCallback>>>,
}

impl MidiPort {
    /// Attach to an existing platform endpoint whose name contains `name`.
    pub fn open_physical(
        driver: &dyn MidiDriver,
        id: impl Into<String>,
        name: &str,
        direction: PortDirection,
    ) -> Result<Self> {
        let id = id.into();
        let inbound = Arc::new(Mutex::new(Inbound::default()));
        let routing = Arc::new(Mutex::new(None));
        let connection = match direction {
            PortDirection::Input => Connection::Input(Mutex::new(driver.open_input(
                name,
                Self::fragment_callback(id.clone(), inbound.clone(), routing.clone()),
            )?)),
            PortDirection::Output => Connection::Output(Mutex::new(driver.open_output(name)?)),
        };
        Ok(Self {
            id,
            name: name.to_string(),
            direction,
            virtual_endpoint: false,
            inbound,
            routing,
            connection,
        })
    }

    /// Create a new OS-visible endpoint named `name`. `id` carries the
    /// `virtual:` prefix so routing callbacks match route endpoints.
    pub fn open_virtual(
        driver: &dyn MidiDriver,
        id: impl Into<String>,
        name: &str,
        direction: PortDirection,
    ) -> Result<Self> {
        let id = id.into();
        let inbound = Arc::new(Mutex::new(Inbound::default()));
        let routing = Arc::new(Mutex::new(None));
        let connection = match direction {
            PortDirection::Input => Connection::Input(Mutex::new(driver.create_virtual_input(
                name,
                Self::fragment_callback(id.clone(), inbound.clone(), routing.clone()),
            )?)),
            PortDirection::Output => {
                Connection::Output(Mutex::new(driver.create_virtual_output(name)?))
            }
        };
        Ok(Self {
            id,
            name: name.to_string(),
            direction,
            virtual_endpoint: true,
            inbound,
            routing,
            connection,
        })
    }

    /// The driver-thread fragment handler. Reassembly and the FIFO push
    /// happen under the inbound lock; the routing callback fires after the
    /// lock is released so a looped-back route cannot deadlock.
    fn fragment_callback(
        id: String,
        inbound: Arc<Mutex<Inbound>>,
        routing: Arc<Mutex<Option<RoutingCallback>>>,
    ) -> FragmentCallback {
        Box::new(move |fragment| {
            let completed = {
                let mut inbound = inbound.lock();
                match inbound.assembler.feed(fragment) {
                    Some(message) => {
                        inbound.queue.push(message.clone());
                        Some(message)
                    }
                    None => None,
                }
            };
            if let Some(message) = completed {
                let callback = routing.lock().clone();
                if let Some(callback) = callback {
                    callback(&id, &message);
                }
            }
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    pub fn is_virtual(&self) -> bool {
        self.virtual_endpoint
    }

    pub fn set_routing_callback(&self, callback: RoutingCallback) {
        *self.routing.lock() = Some(callback);
    }

    /// Transmit `bytes` on this output port.
    ///
    /// `F0`-framed messages must end with `F7` and be at least 3 bytes; their
    /// interior is handed to the driver's SysEx primitive. Anything else must
    /// be a 1-3 byte short message.
    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        let Connection::Output(ref connection) = self.connection else {
            return Err(Error::Misuse(format!(
                "port '{}' is an input and cannot send",
                self.id
            )));
        };
        if bytes.is_empty() {
            warn!("Rejected empty MIDI message on '{}'", self.id);
            return Err(Error::InvalidMessage("empty message".to_string()));
        }
        if bytes[0] == SYSEX_START {
            if bytes.len() < 3 || bytes[bytes.len() - 1] != SYSEX_END {
                warn!(
                    "Rejected malformed SysEx on '{}' ({} bytes)",
                    self.id,
                    bytes.len()
                );
                return Err(Error::InvalidMessage(
                    "SysEx must be F0 … F7 with at least one interior byte".to_string(),
                ));
            }
            let payload = &bytes[1..bytes.len() - 1];
            connection.lock().send_sysex_payload(payload)
        } else {
            if bytes.len() > 3 {
                warn!(
                    "Rejected {}-byte short message on '{}'",
                    bytes.len(),
                    self.id
                );
                return Err(Error::InvalidMessage(
                    "short messages are 1-3 bytes".to_string(),
                ));
            }
            connection.lock().send_short(bytes)
        }
    }

    /// Push `bytes` as if they had arrived from the driver as one complete
    /// fragment. Virtual inputs only; the reassembler is bypassed, so a
    /// SysEx message must be whole in a single call.
    pub fn inject(&self, bytes: &[u8]) -> Result<()> {
        if !self.virtual_endpoint || !self.direction.is_input() {
            return Err(Error::Misuse(format!(
                "inject requires a virtual input port, '{}' is not one",
                self.id
            )));
        }
        if bytes.is_empty() {
            return Err(Error::InvalidMessage("empty message".to_string()));
        }
        self.inbound.lock().queue.push(bytes.to_vec());
        let callback = self.routing.lock().clone();
        if let Some(callback) = callback {
            callback(&self.id, bytes);
        }
        Ok(())
    }

    /// Drain the inbound FIFO, in emission order.
    pub fn take_messages(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.inbound.lock().queue)
    }
}
