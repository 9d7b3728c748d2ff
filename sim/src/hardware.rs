//! The seam between the memory harness and the generated hardware model.

use crate::error::{Result, SimError};
use crate::memory::{ChannelBus, StreamBus};

/// Value of `state_out` while the checkpoint state machine is not running.
pub const CHECKPOINT_IDLE: u8 = 0;

/// The model's save-state control port.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointSignals {
    /// Slot selector, always 0 here.
    pub index: u8,
    pub do_save: bool,
    pub do_restore: bool,
    /// Driven by the model.
    pub state_out: u8,
}

impl CheckpointSignals {
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.state_out == CHECKPOINT_IDLE
    }
}

/// Memory ports of the model, one per synthetic memory channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusPorts {
    pub sdr_cpu: ChannelBus,
    pub sdr_scn_main: ChannelBus,
    pub sdr_audio: ChannelBus,
    pub ddr: StreamBus,
}

impl Default for BusPorts {
    fn default() -> Self {
        Self {
            sdr_cpu: ChannelBus::default(),
            sdr_scn_main: ChannelBus {
                rw: true,
                ..ChannelBus::default()
            },
            sdr_audio: ChannelBus {
                rw: true,
                ..ChannelBus::default()
            },
            ddr: StreamBus::new(),
        }
    }
}

/// A clocked hardware model whose memory ports are serviced by a
/// [`Session`](crate::session::Session).
pub trait HardwareModel {
    fn set_clock(&mut self, high: bool);
    fn set_reset(&mut self, active: bool);
    /// Settles the model for the current input values.
    fn eval(&mut self);

    fn ports(&self) -> &BusPorts;
    fn ports_mut(&mut self) -> &mut BusPorts;

    fn checkpoint(&self) -> &CheckpointSignals;
    fn checkpoint_mut(&mut self) -> &mut CheckpointSignals;

    /// Registers the model keeps outside its memories, stored as the first
    /// snapshot block.
    fn save_internal(&self) -> Vec<u8> {
        Vec::new()
    }

    fn internal_len(&self) -> usize {
        0
    }

    fn restore_internal(&mut self, blob: &[u8]) -> Result<()> {
        if blob.len() == self.internal_len() {
            Ok(())
        } else {
            Err(SimError::SizeMismatch {
                block: "model".to_string(),
                expected: self.internal_len(),
                found: blob.len(),
            })
        }
    }
}
