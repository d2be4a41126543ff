//! SysEx reassembly.
//!
//! MIDI drivers may deliver a long System Exclusive message as several raw
//! fragments. This state machine folds the fragment stream back into whole
//! messages while passing short messages straight through.

/// SysEx start byte.
pub const SYSEX_START: u8 = 0xF0;
/// SysEx end byte.
pub const SYSEX_END: u8 = 0xF7;

/// Folds raw inbound fragments into complete MIDI messages.
///
/// Completed messages keep their `F0 … F7` framing. Fragment state is only
/// ever touched from the driver callback path, so the type is deliberately
/// not synchronized.
#[derive(Debug, Default)]
pub struct SysexAssembler {
    buffering: bool,
    buffer: Vec<u8>,
}

impl SysexAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw fragment; returns a complete message if one was finished.
    pub fn feed(&mut self, fragment: &[u8]) -> Option<Vec<u8>> {
        let first = *fragment.first()?;
        let last = *fragment.last()?;

        if first == SYSEX_START {
            if last == SYSEX_END {
                // A whole SysEx in one fragment. Any half-collected message
                // was abandoned by the sender; drop it.
                if self.buffering {
                    tracing::warn!(
                        "Discarding {} buffered SysEx bytes: new message started",
                        self.buffer.len()
                    );
                }
                self.reset();
                return Some(fragment.to_vec());
            }
            // Start of a split SysEx.
            self.buffering = true;
            self.buffer.clear();
            self.buffer.extend_from_slice(fragment);
            return None;
        }

        if self.buffering {
            self.buffer.extend_from_slice(fragment);
            if last == SYSEX_END {
                self.buffering = false;
                return Some(std::mem::take(&mut self.buffer));
            }
            return None;
        }

        // Regular short message.
        Some(fragment.to_vec())
    }

    /// Feed a complete SysEx payload the driver has already stripped of its
    /// framing; the emitted message is re-framed with `F0 … F7`.
    pub fn feed_sysex_payload(&mut self, payload: &[u8]) -> Option<Vec<u8>> {
        if self.buffering {
            tracing::warn!(
                "Discarding {} buffered SysEx bytes: driver delivered a complete message",
                self.buffer.len()
            );
            self.reset();
        }
        let mut message = Vec::with_capacity(payload.len() + 2);
        message.push(SYSEX_START);
        message.extend_from_slice(payload);
        message.push(SYSEX_END);
        Some(message)
    }

    fn reset(&mut self) {
        self.buffering = false;
        self.buffer.clear();
    }
}
