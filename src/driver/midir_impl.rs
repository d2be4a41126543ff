//! midir-backed platform driver.
//!
//! Each operation creates a fresh midir client; connections own theirs for
//! their lifetime. Virtual endpoints use the unix extension traits and are
//! unavailable on other platforms.

use super::{FragmentCallback, InputConnection, MidiDriver, OutputConnection};
use crate::error::{Error, Result};
use crate::sysex::{SYSEX_END, SYSEX_START};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

#[cfg(unix)]
use midir::os::unix::{VirtualInput, VirtualOutput};

const CLIENT_NAME: &str = "midi-bridge";

/// Production [`MidiDriver`] backed by midir.
#[derive(Debug, Default)]
pub struct MidirDriver;

impl MidirDriver {
    pub fn new() -> Self {
        Self
    }

    fn input_client() -> Result<MidiInput> {
        let mut client = MidiInput::new(CLIENT_NAME)?;
        // midir ignores SysEx by default; the bridge must see everything.
        client.ignore(Ignore::None);
        Ok(client)
    }
}

struct MidirInput {
    _conn: MidiInputConnection<()>,
}

impl InputConnection for MidirInput {}

struct MidirOutput {
    conn: MidiOutputConnection,
}

impl OutputConnection for MidirOutput {
    fn send_short(&mut self, bytes: &[u8]) -> Result<()> {
        self.conn.send(bytes)?;
        Ok(())
    }

    fn send_sysex_payload(&mut self, payload: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(payload.len() + 2);
        frame.push(SYSEX_START);
        frame.extend_from_slice(payload);
        frame.push(SYSEX_END);
        self.conn.send(&frame)?;
        Ok(())
    }
}

fn wrap_callback(mut callback: FragmentCallback) -> impl FnMut(u64, &[u8], &mut ()) + Send + 'static {
    move |_timestamp, message, _| callback(message)
}

impl MidiDriver for MidirDriver {
    fn input_names(&self) -> Vec<String> {
        let Ok(client) = MidiInput::new(CLIENT_NAME) else {
            return Vec::new();
        };
        client
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                client
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index))
            })
            .collect()
    }

    fn output_names(&self) -> Vec<String> {
        let Ok(client) = MidiOutput::new(CLIENT_NAME) else {
            return Vec::new();
        };
        client
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                client
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index))
            })
            .collect()
    }

    fn open_input(
        &self,
        name_fragment: &str,
        callback: FragmentCallback,
    ) -> Result<Box<dyn InputConnection>> {
        let client = Self::input_client()?;
        let wanted = name_fragment.to_lowercase();
        let ports = client.ports();
        let port = ports
            .iter()
            .find(|p| {
                client
                    .port_name(p)
                    .map(|n| n.to_lowercase().contains(&wanted))
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                Error::Device(format!("no MIDI input device matching '{}'", name_fragment))
            })?;
        let conn = client.connect(port, CLIENT_NAME, wrap_callback(callback), ())?;
        Ok(Box::new(MidirInput { _conn: conn }))
    }

    fn open_output(&self, name_fragment: &str) -> Result<Box<dyn OutputConnection>> {
        let client = MidiOutput::new(CLIENT_NAME)?;
        let wanted = name_fragment.to_lowercase();
        let ports = client.ports();
        let port = ports
            .iter()
            .find(|p| {
                client
                    .port_name(p)
                    .map(|n| n.to_lowercase().contains(&wanted))
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                Error::Device(format!(
                    "no MIDI output device matching '{}'",
                    name_fragment
                ))
            })?;
        let conn = client.connect(port, CLIENT_NAME)?;
        Ok(Box::new(MidirOutput { conn }))
    }

    #[cfg(unix)]
    fn create_virtual_input(
        &self,
        name: &str,
        callback: FragmentCallback,
    ) -> Result<Box<dyn InputConnection>> {
        let client = Self::input_client()?;
        let conn = client.create_virtual(name, wrap_callback(callback), ())?;
        Ok(Box::new(MidirInput { _conn: conn }))
    }

    #[cfg(not(unix))]
    fn create_virtual_input(
        &self,
        _name: &str,
        _callback: FragmentCallback,
    ) -> Result<Box<dyn InputConnection>> {
        Err(Error::Device(
            "virtual MIDI endpoints are not supported on this platform".to_string(),
        ))
    }

    #[cfg(unix)]
    fn create_virtual_output(&self, name: &str) -> Result<Box<dyn OutputConnection>> {
        let client = MidiOutput::new(CLIENT_NAME)?;
        let conn = client.create_virtual(name)?;
        Ok(Box::new(MidirOutput { conn }))
    }

    #[cfg(not(unix))]
    fn create_virtual_output(&self, _name: &str) -> Result<Box<dyn OutputConnection>> {
        Err(Error::Device(
            "virtual MIDI endpoints are not supported on this platform".to_string(),
        ))
    }
}
