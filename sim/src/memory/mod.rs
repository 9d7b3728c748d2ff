pub mod channel;
pub mod storage;
pub mod stream;

use serde::{Deserialize, Serialize};

pub use channel::{Channel, ChannelBus, ChannelWidth, Sdram};
pub use storage::Storage;
pub use stream::{StreamBus, StreamDevice, StreamProfile};

/// Names one of the session's memories in configs and snapshot layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceId {
    Sdram,
    Ddr,
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sdram => write!(f, "sdram"),
            Self::Ddr => write!(f, "ddr"),
        }
    }
}

impl std::str::FromStr for DeviceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sdram" => Ok(Self::Sdram),
            "ddr" => Ok(Self::Ddr),
            other => Err(format!("unknown memory device '{other}'")),
        }
    }
}
