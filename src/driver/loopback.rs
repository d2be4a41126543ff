//! In-memory loopback driver.
//!
//! Simulates the platform MIDI subsystem without hardware: configured device
//! names are enumerable, opened inputs can be fed fragments, and everything
//! transmitted on an output is recorded. Used by the test suite and for
//! running the bridge headless.

use super::{FragmentCallback, InputConnection, MidiDriver, OutputConnection};
use crate::error::{Error, Result};
use crate::sysex::{SYSEX_END, SYSEX_START};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type SharedCallback = Arc<Mutex<FragmentCallback>>;
type FrameLog = Arc<Mutex<Vec<Vec<u8>>>>;

#[derive(Default)]
struct State {
    input_devices: Vec<String>,
    output_devices: Vec<String>,
    open_inputs: HashMap<String, SharedCallback>,
    // Kept after the connection closes so tests can still inspect traffic.
    transmitted: HashMap<String, FrameLog>,
}

/// Software [`MidiDriver`]: endpoints live in memory only.
#[derive(Default, Clone)]
pub struct LoopbackDriver {
    state: Arc<Mutex<State>>,
}

impl LoopbackDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver that enumerates the given device names.
    pub fn with_devices(inputs: &[&str], outputs: &[&str]) -> Self {
        let driver = Self::new();
        {
            let mut state = driver.state.lock();
            state.input_devices = inputs.iter().map(|s| s.to_string()).collect();
            state.output_devices = outputs.iter().map(|s| s.to_string()).collect();
        }
        driver
    }

    /// Deliver a raw fragment to the open input with the given device name,
    /// as the platform driver would on its callback thread.
    pub fn feed(&self, device_name: &str, fragment: &[u8]) {
        let callback = self.state.lock().open_inputs.get(device_name).cloned();
        match callback {
            Some(callback) => {
                let mut callback = callback.lock();
                (*callback)(fragment);
            }
            None => tracing::warn!("Loopback feed to unopened input '{}'", device_name),
        }
    }

    /// Frames transmitted on the named output so far.
    pub fn sent(&self, device_name: &str) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .transmitted
            .get(device_name)
            .map(|log| log.lock().clone())
            .unwrap_or_default()
    }

    /// Whether an input with the given device name is currently open.
    pub fn is_input_open(&self, device_name: &str) -> bool {
        self.state.lock().open_inputs.contains_key(device_name)
    }

    fn resolve(devices: &[String], name_fragment: &str) -> Option<String> {
        let wanted = name_fragment.to_lowercase();
        devices
            .iter()
            .find(|name| name.to_lowercase().contains(&wanted))
            .cloned()
    }
}

struct LoopbackInput {
    state: Arc<Mutex<State>>,
    device_name: String,
    virtual_endpoint: bool,
}

impl InputConnection for LoopbackInput {}

impl Drop for LoopbackInput {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.open_inputs.remove(&self.device_name);
        if self.virtual_endpoint {
            state.input_devices.retain(|n| n != &self.device_name);
        }
    }
}

struct LoopbackOutput {
    state: Arc<Mutex<State>>,
    device_name: String,
    log: FrameLog,
    virtual_endpoint: bool,
}

impl OutputConnection for LoopbackOutput {
    fn send_short(&mut self, bytes: &[u8]) -> Result<()> {
        self.log.lock().push(bytes.to_vec());
        Ok(())
    }

    fn send_sysex_payload(&mut self, payload: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(payload.len() + 2);
        frame.push(SYSEX_START);
        frame.extend_from_slice(payload);
        frame.push(SYSEX_END);
        self.log.lock().push(frame);
        Ok(())
    }
}

impl Drop for LoopbackOutput {
    fn drop(&mut self) {
        if self.virtual_endpoint {
            let mut state = self.state.lock();
            state.output_devices.retain(|n| n != &self.device_name);
        }
    }
}

impl MidiDriver for LoopbackDriver {
    fn input_names(&self) -> Vec<String> {
        self.state.lock().input_devices.clone()
    }

    fn output_names(&self) -> Vec<String> {
        self.state.lock().output_devices.clone()
    }

    fn open_input(
        &self,
        name_fragment: &str,
        callback: FragmentCallback,
    ) -> Result<Box<dyn InputConnection>> {
        let mut state = self.state.lock();
        let device_name = Self::resolve(&state.input_devices, name_fragment).ok_or_else(|| {
            Error::Device(format!("no MIDI input device matching '{}'", name_fragment))
        })?;
        state
            .open_inputs
            .insert(device_name.clone(), Arc::new(Mutex::new(callback)));
        Ok(Box::new(LoopbackInput {
            state: self.state.clone(),
            device_name,
            virtual_endpoint: false,
        }))
    }

    fn open_output(&self, name_fragment: &str) -> Result<Box<dyn OutputConnection>> {
        let mut state = self.state.lock();
        let device_name = Self::resolve(&state.output_devices, name_fragment).ok_or_else(|| {
            Error::Device(format!(
                "no MIDI output device matching '{}'",
                name_fragment
            ))
        })?;
        let log = state
            .transmitted
            .entry(device_name.clone())
            .or_default()
            .clone();
        Ok(Box::new(LoopbackOutput {
            state: self.state.clone(),
            device_name,
            log,
            virtual_endpoint: false,
        }))
    }

    fn create_virtual_input(
        &self,
        name: &str,
        callback: FragmentCallback,
    ) -> Result<Box<dyn InputConnection>> {
        let mut state = self.state.lock();
        state.input_devices.push(name.to_string());
        state
            .open_inputs
            .insert(name.to_string(), Arc::new(Mutex::new(callback)));
        Ok(Box::new(LoopbackInput {
            state: self.state.clone(),
            device_name: name.to_string(),
            virtual_endpoint: true,
        }))
    }

    fn create_virtual_output(&self, name: &str) -> Result<Box<dyn OutputConnection>> {
        let mut state = self.state.lock();
        state.output_devices.push(name.to_string());
        let log = state.transmitted.entry(name.to_string()).or_default().clone();
        Ok(Box::new(LoopbackOutput {
            state: self.state.clone(),
            device_name: name.to_string(),
            log,
            virtual_endpoint: true,
        }))
    }
}
