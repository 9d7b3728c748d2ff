//! SDRAM-style request/acknowledge channels.
//!
//! Several independent bus ports of the hardware model share one backing
//! array. Each port speaks the same level handshake: a request is new while
//! `req != ack`, and the device acknowledges by copying `req` into `ack`.
//! Words are stored big-endian (most significant lane at the lowest
//! address), matching the 68000 side of the model.
//!
//! Ports must not issue conflicting transactions to the same bytes on the
//! same tick; nothing here arbitrates between them.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::memory::storage::Storage;

/// Default seed for the arbitration jitter, so runs are reproducible.
pub const DEFAULT_JITTER_SEED: u64 = 0x00F2_5D2A;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelWidth {
    Word16,
    Word32,
    Word64,
}

impl ChannelWidth {
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Word16 => 2,
            Self::Word32 => 4,
            Self::Word64 => 8,
        }
    }

    /// Clears the address bits below the word size.
    #[must_use]
    pub const fn align(self, addr: u32) -> u32 {
        addr & !(self.bytes() as u32 - 1)
    }
}

/// Signals of one request/acknowledge port as they appear on the model.
///
/// `addr`, `req`, `rw`, `be` and `data` are driven by the model; `q` and
/// `ack` are driven by the device.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBus {
    pub addr: u32,
    pub req: bool,
    /// High for a read.
    pub rw: bool,
    /// One bit per byte lane, lane 0 being the least significant byte.
    pub be: u8,
    pub data: u64,
    pub q: u64,
    pub ack: bool,
}

/// Per-port state: the word width and the optional arbitration delay.
#[derive(Debug, Clone)]
pub struct Channel {
    width: ChannelWidth,
    read_only: bool,
    max_jitter: u8,
    countdown: Option<u8>,
}

impl Channel {
    #[must_use]
    pub const fn new(width: ChannelWidth) -> Self {
        Self {
            width,
            read_only: false,
            max_jitter: 0,
            countdown: None,
        }
    }

    /// A port that can only read, whatever `rw` says (the model ties it
    /// high on fetch-only ports).
    #[must_use]
    pub const fn read_only(width: ChannelWidth) -> Self {
        Self {
            read_only: true,
            ..Self::new(width)
        }
    }

    /// Delays every request by a random 0..=`max` ticks before it is
    /// serviced, emulating contention with other masters.
    #[must_use]
    pub const fn with_jitter(mut self, max: u8) -> Self {
        self.max_jitter = max;
        self
    }

    #[must_use]
    pub const fn width(&self) -> ChannelWidth {
        self.width
    }

    /// True while a request has been seen but not yet acknowledged.
    #[must_use]
    pub const fn is_waiting(&self) -> bool {
        self.countdown.is_some()
    }
}

pub struct Sdram {
    storage: Storage,
    rng: StdRng,
}

impl Sdram {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self::with_seed(size, DEFAULT_JITTER_SEED)
    }

    #[must_use]
    pub fn with_seed(size: usize, seed: u64) -> Self {
        Self {
            storage: Storage::new(size, ChannelWidth::Word64.bytes()),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub const fn storage(&self) -> &Storage {
        &self.storage
    }

    pub const fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    /// Services one port for one tick.
    pub fn update(&mut self, channel: &mut Channel, bus: &mut ChannelBus) {
        if bus.req == bus.ack {
            channel.countdown = None;
            return;
        }

        if channel.max_jitter > 0 {
            let max = channel.max_jitter;
            let rng = &mut self.rng;
            let remaining = *channel
                .countdown
                .get_or_insert_with(|| rng.random_range(0..=max));
            if remaining > 0 {
                channel.countdown = Some(remaining - 1);
                return;
            }
            channel.countdown = None;
        }

        let width = channel.width;
        let addr = width.align(bus.addr);

        if bus.rw || channel.read_only {
            bus.q = self.read_word(width, addr);
        } else {
            self.write_word(width, addr, bus.be, bus.data);
        }
        bus.ack = bus.req;
    }

    /// Assembles the big-endian word containing `addr`.
    #[must_use]
    pub fn read_word(&self, width: ChannelWidth, addr: u32) -> u64 {
        let base = self.storage.resolve(width.align(addr));
        let bytes = &self.storage.as_bytes()[base..base + width.bytes()];

        bytes
            .iter()
            .fold(0_u64, |word, byte| (word << 8) | u64::from(*byte))
    }

    /// Writes the lanes selected by `be` into the word containing `addr`.
    pub fn write_word(&mut self, width: ChannelWidth, addr: u32, be: u8, data: u64) {
        let base = self.storage.resolve(width.align(addr));
        let last = width.bytes() - 1;
        let bytes = self.storage.as_bytes_mut();

        for lane in 0..width.bytes() {
            // `lane` < 8, the casts cannot truncate.
            #[allow(clippy::cast_possible_truncation)]
            let lane_idx = lane as u8;
            if be.is_bit_on(lane_idx) {
                bytes[base + last - lane] = data.get_byte(lane_idx);
            }
        }
    }
}
