#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
mod bitwise;

pub mod byte_source;
pub mod config;
pub mod error;
pub mod hardware;

#[allow(clippy::missing_errors_doc)]
pub mod loader;

#[allow(clippy::unreadable_literal)]
pub mod memory;

pub mod session;

#[allow(clippy::missing_errors_doc)]
pub mod state;

pub use byte_source::{ByteSource, FileSearch, InMemorySource};
pub use config::{RomLoad, SimConfig, SnapshotRegion};
pub use error::{Result, SimError};
pub use hardware::{BusPorts, CheckpointSignals, HardwareModel};
pub use memory::DeviceId;
pub use session::Session;
pub use state::StateCoordinator;
