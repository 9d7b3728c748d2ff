//! The model's checkpoint handshake as a tick-driven state machine.
//!
//! The request line is raised, held until the model leaves the idle
//! status, then dropped; the handshake is over once the status returns to
//! idle. [`Handshake::poll`] is called before every tick.

use std::task::Poll;

use crate::error::{Result, SimError};
use crate::hardware::CheckpointSignals;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeKind {
    Save,
    Restore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Request raised, waiting for the model to report busy.
    AwaitBusy,
    /// Request dropped, waiting for the model to return to idle.
    AwaitIdle,
    Done,
}

#[derive(Debug)]
pub struct Handshake {
    kind: HandshakeKind,
    phase: HandshakePhase,
    ticks: u64,
}

impl Handshake {
    /// Fails if the model is already in the middle of a checkpoint.
    pub const fn ensure_idle(signals: &CheckpointSignals) -> Result<()> {
        if signals.is_idle() {
            Ok(())
        } else {
            Err(SimError::ModelBusy {
                status: signals.state_out,
            })
        }
    }

    /// Raises the request for `kind` once the model is idle.
    pub fn begin(kind: HandshakeKind, signals: &mut CheckpointSignals) -> Result<Self> {
        Self::ensure_idle(signals)?;

        signals.index = 0;
        set_request(kind, signals, true);

        Ok(Self {
            kind,
            phase: HandshakePhase::AwaitBusy,
            ticks: 0,
        })
    }

    pub fn poll(&mut self, signals: &mut CheckpointSignals) -> Poll<()> {
        if self.phase == HandshakePhase::AwaitBusy && !signals.is_idle() {
            set_request(self.kind, signals, false);
            self.phase = HandshakePhase::AwaitIdle;
        }
        if self.phase == HandshakePhase::AwaitIdle && signals.is_idle() {
            self.phase = HandshakePhase::Done;
        }

        match self.phase {
            HandshakePhase::Done => Poll::Ready(()),
            _ => Poll::Pending,
        }
    }

    pub const fn record_tick(&mut self) {
        self.ticks += 1;
    }

    /// Drops the request line, leaving the model to settle on its own.
    pub fn abort(&mut self, signals: &mut CheckpointSignals) {
        set_request(self.kind, signals, false);
    }

    #[must_use]
    pub const fn kind(&self) -> HandshakeKind {
        self.kind
    }

    #[must_use]
    pub const fn phase(&self) -> HandshakePhase {
        self.phase
    }

    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }
}

const fn set_request(kind: HandshakeKind, signals: &mut CheckpointSignals, level: bool) {
    match kind {
        HandshakeKind::Save => signals.do_save = level,
        HandshakeKind::Restore => signals.do_restore = level,
    }
}
