//! 64-bit strobe-driven memory (the DDR side of the model).
//!
//! Unlike the request/acknowledge channels this device is driven by
//! explicit `read`/`write` strobes and answers with `read_complete`.
//! Beats are eight bytes, little-endian, always 8-byte aligned.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::memory::storage::Storage;

pub const BEAT_BYTES: usize = 8;

/// Which timing contract the device follows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamProfile {
    /// Burst reads and writes with byte enables. Writes complete with no
    /// latency and `busy` is always reported low: the model's DDR
    /// controller does not gate on it.
    #[default]
    Burst,
    /// One beat per transaction, byte enables ignored, writes keep the
    /// device busy for the write latency and `busy` is reported.
    Single,
}

/// Signals of the stream port as they appear on the model.
///
/// `rdata`, `busy` and `read_complete` are driven by the device.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamBus {
    pub addr: u32,
    pub wdata: u64,
    pub rdata: u64,
    pub read: bool,
    pub write: bool,
    pub busy: bool,
    pub read_complete: bool,
    pub burst_count: u8,
    pub byte_enable: u8,
}

impl StreamBus {
    /// Sets up a single-beat request the way the model drives idle ports.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            addr: 0,
            wdata: 0,
            rdata: 0,
            read: false,
            write: false,
            busy: false,
            read_complete: false,
            burst_count: 1,
            byte_enable: 0xFF,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    BusyRead {
        base: usize,
        beat: u8,
        beats: u8,
        wait: u32,
    },
    BusyWrite {
        base: usize,
        beat: u8,
        beats: u8,
    },
    /// Single profile only: a write is settling for the write latency.
    Settling { wait: u32 },
}

pub struct StreamDevice {
    storage: Storage,
    profile: StreamProfile,
    read_latency: u32,
    write_latency: u32,
    state: StreamState,
}

impl StreamDevice {
    #[must_use]
    pub fn new(size: usize, profile: StreamProfile) -> Self {
        Self {
            storage: Storage::new(size, BEAT_BYTES),
            profile,
            read_latency: 2,
            write_latency: 1,
            state: StreamState::Idle,
        }
    }

    /// Ticks between a read being accepted (or the previous beat) and the
    /// beat's data. Clamped to at least one tick.
    pub fn set_read_latency(&mut self, cycles: u32) {
        self.read_latency = cycles.max(1);
    }

    /// Only used by [`StreamProfile::Single`].
    pub const fn set_write_latency(&mut self, cycles: u32) {
        self.write_latency = cycles;
    }

    #[must_use]
    pub const fn profile(&self) -> StreamProfile {
        self.profile
    }

    #[must_use]
    pub const fn state(&self) -> StreamState {
        self.state
    }

    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, StreamState::Idle)
    }

    #[must_use]
    pub const fn storage(&self) -> &Storage {
        &self.storage
    }

    pub const fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    /// Advances the device by one tick.
    ///
    /// `read_complete` is high for exactly the tick on which `rdata` holds a
    /// new beat; the caller has to sample it then.
    pub fn clock(&mut self, bus: &mut StreamBus) {
        let was_busy = matches!(
            self.state,
            StreamState::BusyRead { .. } | StreamState::Settling { .. }
        );

        let completed = self.advance();

        // The burst controller never accepts on the tick it was busy; the
        // single-port one accepts as soon as it turns idle.
        let may_accept = match self.profile {
            StreamProfile::Burst => !was_busy,
            StreamProfile::Single => !matches!(
                self.state,
                StreamState::BusyRead { .. } | StreamState::Settling { .. }
            ),
        };

        if may_accept {
            match self.profile {
                StreamProfile::Burst => self.accept_burst(bus),
                StreamProfile::Single => self.accept_single(bus),
            }
        }

        bus.busy = match self.profile {
            StreamProfile::Burst => false,
            StreamProfile::Single => !self.is_idle(),
        };
        bus.read_complete = completed.is_some();
        if let Some(data) = completed {
            bus.rdata = data;
        }
    }

    /// Counts down the in-flight read or write settle. Returns the beat
    /// that completed on this tick, if any.
    fn advance(&mut self) -> Option<u64> {
        match self.state {
            StreamState::BusyRead {
                base,
                beat,
                beats,
                wait,
            } => {
                if wait > 1 {
                    self.state = StreamState::BusyRead {
                        base,
                        beat,
                        beats,
                        wait: wait - 1,
                    };
                    return None;
                }

                let data = self.read_beat(base + usize::from(beat) * BEAT_BYTES);
                let beat = beat + 1;
                self.state = if beat == beats {
                    StreamState::Idle
                } else {
                    StreamState::BusyRead {
                        base,
                        beat,
                        beats,
                        wait: self.read_latency,
                    }
                };
                tracing::trace!("ddr beat {beat}/{beats} at 0x{base:08X}: {data:016X}");
                Some(data)
            }
            StreamState::Settling { wait } => {
                self.state = if wait > 1 {
                    StreamState::Settling { wait: wait - 1 }
                } else {
                    StreamState::Idle
                };
                None
            }
            StreamState::Idle | StreamState::BusyWrite { .. } => None,
        }
    }

    fn accept_burst(&mut self, bus: &StreamBus) {
        match self.state {
            StreamState::Idle if bus.read => {
                self.state = StreamState::BusyRead {
                    base: self.beat_base(bus.addr),
                    beat: 0,
                    beats: bus.burst_count.max(1),
                    wait: self.read_latency,
                };
            }
            StreamState::Idle if bus.write => {
                let base = self.beat_base(bus.addr);
                let beats = bus.burst_count.max(1);
                self.write_beat(base, bus.wdata, bus.byte_enable);
                self.state = if beats == 1 {
                    StreamState::Idle
                } else {
                    StreamState::BusyWrite {
                        base,
                        beat: 1,
                        beats,
                    }
                };
            }
            // A read cuts an unfinished write burst short.
            StreamState::BusyWrite { beat, beats, .. } if bus.read => {
                tracing::debug!("ddr write burst abandoned after {beat}/{beats} beats");
                self.state = StreamState::BusyRead {
                    base: self.beat_base(bus.addr),
                    beat: 0,
                    beats: bus.burst_count.max(1),
                    wait: self.read_latency,
                };
            }
            // The next beat of a burst ignores the address lines.
            StreamState::BusyWrite { base, beat, beats } if bus.write => {
                self.write_beat(
                    base + usize::from(beat) * BEAT_BYTES,
                    bus.wdata,
                    bus.byte_enable,
                );
                let beat = beat + 1;
                self.state = if beat == beats {
                    StreamState::Idle
                } else {
                    StreamState::BusyWrite { base, beat, beats }
                };
            }
            _ => {}
        }
    }

    fn accept_single(&mut self, bus: &StreamBus) {
        let base = self.beat_base(bus.addr);

        if bus.read {
            self.state = StreamState::BusyRead {
                base,
                beat: 0,
                beats: 1,
                wait: self.read_latency,
            };
        } else if bus.write {
            self.write_beat(base, bus.wdata, 0xFF);
            self.state = if self.write_latency > 0 {
                StreamState::Settling {
                    wait: self.write_latency,
                }
            } else {
                StreamState::Idle
            };
        }
    }

    fn beat_base(&self, addr: u32) -> usize {
        self.storage.resolve(addr) & !(BEAT_BYTES - 1)
    }

    /// Beats running past the end of the array read as zero.
    fn read_beat(&self, offset: usize) -> u64 {
        self.storage
            .read_range(offset, BEAT_BYTES)
            .map_or(0, |bytes| {
                let mut word = 0_u64;
                for (lane, byte) in (0_u8..).zip(bytes) {
                    word.set_byte(lane, *byte);
                }
                word
            })
    }

    /// Beats running past the end of the array are dropped.
    fn write_beat(&mut self, offset: usize, data: u64, byte_enable: u8) {
        if offset + BEAT_BYTES > self.storage.capacity() {
            return;
        }

        let bytes = &mut self.storage.as_bytes_mut()[offset..offset + BEAT_BYTES];
        for (lane, byte) in (0_u8..).zip(bytes.iter_mut()) {
            if byte_enable.is_bit_on(lane) {
                *byte = data.get_byte(lane);
            }
        }
    }
}
