use std::path::PathBuf;

use thiserror::Error;

use crate::state::handshake::HandshakePhase;

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("'{name}' not found in any search path")]
    NotFound { name: String },
    #[error("invalid search path {}: {reason}", path.display())]
    InvalidSearchPath { path: PathBuf, reason: String },
    #[error("{block} size mismatch: expected {expected} bytes, found {found}")]
    SizeMismatch {
        block: String,
        expected: usize,
        found: usize,
    },
    #[error("snapshot error: {0}")]
    InvalidSnapshot(String),
    #[error("range 0x{offset:X}+0x{len:X} exceeds device capacity 0x{capacity:X}")]
    RangeOutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    #[error("checkpoint handshake requested while model status is {status}")]
    ModelBusy { status: u8 },
    #[error("checkpoint handshake stuck in {phase:?} after {ticks} ticks")]
    HandshakeTimeout { phase: HandshakePhase, ticks: u64 },
}
