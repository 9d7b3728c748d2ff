use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::memory::channel::DEFAULT_JITTER_SEED;
use crate::memory::{DeviceId, StreamProfile};

pub const MIB: usize = 1024 * 1024;

/// One ROM image in the load layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RomLoad {
    pub name: String,
    pub device: DeviceId,
    #[serde(default)]
    pub base: u32,
    #[serde(default = "default_stride")]
    pub stride: u32,
    /// Store big-endian 16-bit words byte-swapped. `stride` is then the
    /// distance between words.
    #[serde(default)]
    pub swap16: bool,
}

impl RomLoad {
    #[must_use]
    pub fn new(name: impl Into<String>, device: DeviceId, base: u32, stride: u32) -> Self {
        Self {
            name: name.into(),
            device,
            base,
            stride,
            swap16: false,
        }
    }

    #[must_use]
    pub const fn swapped(mut self) -> Self {
        self.swap16 = true;
        self
    }
}

/// A byte range of a device captured in every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRegion {
    pub device: DeviceId,
    #[serde(default)]
    pub offset: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub sdram_size: usize,
    pub ddr_size: usize,
    pub ddr_read_latency: u32,
    pub ddr_write_latency: u32,
    pub ddr_profile: StreamProfile,
    /// Upper bound of the random delay before an SDRAM request is
    /// acknowledged. 0 acknowledges on the first tick.
    pub channel_latency_max: u8,
    pub channel_seed: u64,
    pub reset_ticks: u64,
    /// 0 disables the limit.
    pub handshake_tick_limit: u64,
    pub snapshot_regions: Vec<SnapshotRegion>,
    pub search_paths: Vec<PathBuf>,
    pub roms: Vec<RomLoad>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            sdram_size: 128 * MIB,
            ddr_size: 8 * MIB,
            ddr_read_latency: 2,
            ddr_write_latency: 1,
            ddr_profile: StreamProfile::default(),
            channel_latency_max: 0,
            channel_seed: DEFAULT_JITTER_SEED,
            reset_ticks: 100,
            handshake_tick_limit: 10_000_000,
            snapshot_regions: vec![SnapshotRegion {
                device: DeviceId::Ddr,
                offset: 0,
                len: 256 * 1024,
            }],
            search_paths: Vec::new(),
            roms: Vec::new(),
        }
    }
}

impl SimConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// `None` when the handshake may run forever.
    #[must_use]
    pub const fn handshake_limit(&self) -> Option<u64> {
        match self.handshake_tick_limit {
            0 => None,
            limit => Some(limit),
        }
    }
}

const fn default_stride() -> u32 {
    1
}
