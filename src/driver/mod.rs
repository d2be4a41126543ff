//! Platform MIDI driver abstraction.
//!
//! The bridge core talks to the platform MIDI subsystem through [`MidiDriver`]
//! so the routing engine can be exercised without hardware. Production uses
//! the midir-backed implementation; tests and headless setups use the
//! in-memory loopback implementation.

mod loopback;
mod midir_impl;

pub use loopback::LoopbackDriver;
pub use midir_impl::MidirDriver;

use crate::error::Result;

/// Callback invoked on the driver's own thread with raw inbound fragments.
pub type FragmentCallback = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// Handle to an open input endpoint. Dropping it closes the endpoint and
/// stops the fragment callback.
pub trait InputConnection: Send {}

/// Handle to an open output endpoint.
pub trait OutputConnection: Send {
    /// Transmit a 1-3 byte MIDI message.
    fn send_short(&mut self, bytes: &[u8]) -> Result<()>;

    /// Transmit a SysEx message given its interior bytes; the driver adds
    /// the `F0`/`F7` framing.
    fn send_sysex_payload(&mut self, payload: &[u8]) -> Result<()>;
}

/// The platform MIDI subsystem: device enumeration, endpoint open, and
/// creation of OS-visible virtual endpoints.
pub trait MidiDriver: Send + Sync {
    /// Names of the available input devices.
    fn input_names(&self) -> Vec<String>;

    /// Names of the available output devices.
    fn output_names(&self) -> Vec<String>;

    /// Open the first input whose name contains `name_fragment`
    /// (case-insensitive).
    fn open_input(
        &self,
        name_fragment: &str,
        callback: FragmentCallback,
    ) -> Result<Box<dyn InputConnection>>;

    /// Open the first output whose name contains `name_fragment`
    /// (case-insensitive).
    fn open_output(&self, name_fragment: &str) -> Result<Box<dyn OutputConnection>>;

    /// Create an OS-visible virtual input; it exists until the connection is
    /// dropped.
    fn create_virtual_input(
        &self,
        name: &str,
        callback: FragmentCallback,
    ) -> Result<Box<dyn InputConnection>>;

    /// Create an OS-visible virtual output; it exists until the connection is
    /// dropped.
    fn create_virtual_output(&self, name: &str) -> Result<Box<dyn OutputConnection>>;
}
