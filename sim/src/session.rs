use crate::byte_source::ByteSource;
use crate::config::{RomLoad, SimConfig};
use crate::error::Result;
use crate::hardware::HardwareModel;
use crate::loader;
use crate::memory::{Channel, ChannelWidth, DeviceId, Sdram, Storage, StreamDevice};

/// Owns the hardware model and every synthetic memory attached to it.
pub struct Session<M> {
    model: M,
    sdram: Sdram,
    cpu: Channel,
    scn_main: Channel,
    audio: Channel,
    ddr: StreamDevice,
    ticks: u64,
    reset_until: u64,
}

impl<M: HardwareModel> Session<M> {
    #[must_use]
    pub fn new(model: M, config: &SimConfig) -> Self {
        let jitter = config.channel_latency_max;

        let mut ddr = StreamDevice::new(config.ddr_size, config.ddr_profile);
        ddr.set_read_latency(config.ddr_read_latency);
        ddr.set_write_latency(config.ddr_write_latency);

        let sdram = Sdram::with_seed(config.sdram_size, config.channel_seed);
        tracing::info!(
            "Session memories: sdram 0x{:X} bytes, ddr 0x{:X} bytes ({:?})",
            sdram.storage().capacity(),
            ddr.storage().capacity(),
            ddr.profile()
        );

        Self {
            model,
            sdram,
            cpu: Channel::new(ChannelWidth::Word16).with_jitter(jitter),
            scn_main: Channel::read_only(ChannelWidth::Word32).with_jitter(jitter),
            audio: Channel::read_only(ChannelWidth::Word16).with_jitter(jitter),
            ddr,
            ticks: 0,
            reset_until: config.reset_ticks,
        }
    }

    /// Advances the whole system by `count` full clock cycles.
    ///
    /// Memories answer the outputs the model settled to on the previous
    /// edge, in a fixed order, before the model sees the next edge.
    pub fn tick(&mut self, count: u64) {
        for _ in 0..count {
            self.ticks += 1;
            self.model.set_reset(self.ticks < self.reset_until);

            let ports = self.model.ports_mut();
            self.sdram.update(&mut self.cpu, &mut ports.sdr_cpu);
            self.sdram.update(&mut self.scn_main, &mut ports.sdr_scn_main);
            self.sdram.update(&mut self.audio, &mut ports.sdr_audio);
            self.ddr.clock(&mut ports.ddr);

            self.model.set_clock(false);
            self.model.eval();
            self.model.set_clock(true);
            self.model.eval();
        }
    }

    /// Ticks until `until` holds, checking it before every tick. Returns
    /// the number of ticks taken.
    pub fn tick_until(&mut self, mut until: impl FnMut(&M) -> bool) -> u64 {
        let start = self.ticks;
        while !until(&self.model) {
            self.tick(1);
        }
        self.ticks - start
    }

    /// Keeps reset asserted for the next `ticks` ticks.
    pub fn hold_reset(&mut self, ticks: u64) {
        self.reset_until = self.ticks + ticks;
        tracing::debug!("Reset held until tick {}", self.reset_until);
    }

    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    #[must_use]
    pub const fn model(&self) -> &M {
        &self.model
    }

    pub const fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    #[must_use]
    pub const fn sdram(&self) -> &Sdram {
        &self.sdram
    }

    #[must_use]
    pub const fn ddr(&self) -> &StreamDevice {
        &self.ddr
    }

    #[must_use]
    pub const fn storage(&self, device: DeviceId) -> &Storage {
        match device {
            DeviceId::Sdram => self.sdram.storage(),
            DeviceId::Ddr => self.ddr.storage(),
        }
    }

    pub const fn storage_mut(&mut self, device: DeviceId) -> &mut Storage {
        match device {
            DeviceId::Sdram => self.sdram.storage_mut(),
            DeviceId::Ddr => self.ddr.storage_mut(),
        }
    }

    pub fn load_rom(&mut self, source: &mut dyn ByteSource, rom: &RomLoad) -> Result<usize> {
        loader::load_rom(source, rom, self.storage_mut(rom.device))
    }

    /// Loads every image of a layout. Missing or unreadable images are
    /// logged and skipped, leaving that part of memory zero-filled.
    ///
    /// Returns how many images were loaded.
    pub fn load_layout(&mut self, source: &mut dyn ByteSource, roms: &[RomLoad]) -> usize {
        let mut loaded = 0;
        for rom in roms {
            match self.load_rom(source, rom) {
                Ok(_) => loaded += 1,
                Err(e) => tracing::warn!("Skipping {} ({}): {e}", rom.name, rom.device),
            }
        }
        loaded
    }
}
