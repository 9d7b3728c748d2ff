//! Save and restore of the whole simulation.
//!
//! A snapshot holds the model's internal registers plus a fixed set of
//! memory regions. The model takes part through its checkpoint handshake:
//! on save the memories are read once the model has finished its own
//! checkpoint, on restore they are written before the model is asked to
//! restore, since its restore logic reads them.

pub mod handshake;
pub mod snapshot;

use std::fs;
use std::path::Path;
use std::task::Poll;

use crate::config::{SimConfig, SnapshotRegion};
use crate::error::{Result, SimError};
use crate::hardware::HardwareModel;
use crate::session::Session;

use self::handshake::{Handshake, HandshakeKind};

pub use self::snapshot::{SNAPSHOT_SUFFIX, list_snapshots_in, snapshot_file_name};

#[derive(Debug, Clone)]
pub struct StateCoordinator {
    regions: Vec<SnapshotRegion>,
    tick_limit: Option<u64>,
}

impl StateCoordinator {
    #[must_use]
    pub const fn new(regions: Vec<SnapshotRegion>, tick_limit: Option<u64>) -> Self {
        Self {
            regions,
            tick_limit,
        }
    }

    #[must_use]
    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.snapshot_regions.clone(), config.handshake_limit())
    }

    #[must_use]
    pub fn regions(&self) -> &[SnapshotRegion] {
        &self.regions
    }

    /// Runs the save handshake, then writes the model registers and every
    /// region to `path`.
    pub fn save<M: HardwareModel>(&self, session: &mut Session<M>, path: &Path) -> Result<()> {
        self.check_ready(session)?;
        self.run_handshake(session, HandshakeKind::Save)?;

        let internal = session.model().save_internal();
        let mut blocks: Vec<&[u8]> = Vec::with_capacity(self.regions.len() + 1);
        blocks.push(&internal);
        for region in &self.regions {
            blocks.push(
                session
                    .storage(region.device)
                    .read_range(region.offset, region.len)?,
            );
        }

        let bytes = snapshot::encode(&blocks)?;
        snapshot::write_atomic(path, &bytes)?;

        tracing::info!(
            "Saved state to {} ({} bytes, tick {})",
            path.display(),
            bytes.len(),
            session.ticks()
        );
        Ok(())
    }

    /// Loads `path` into the memories and the model registers, then runs
    /// the restore handshake. Nothing is written unless the whole file
    /// matches the live layout and the model is idle.
    pub fn restore<M: HardwareModel>(&self, session: &mut Session<M>, path: &Path) -> Result<()> {
        self.check_ready(session)?;

        let bytes = fs::read(path)?;
        let blocks = snapshot::decode(&bytes)?;

        let expected = self.regions.len() + 1;
        if blocks.len() != expected {
            return Err(SimError::SizeMismatch {
                block: "snapshot".to_string(),
                expected,
                found: blocks.len(),
            });
        }

        let internal_len = session.model().internal_len();
        if blocks[0].len() != internal_len {
            return Err(SimError::SizeMismatch {
                block: "model".to_string(),
                expected: internal_len,
                found: blocks[0].len(),
            });
        }
        for (region, block) in self.regions.iter().zip(&blocks[1..]) {
            if block.len() != region.len {
                return Err(SimError::SizeMismatch {
                    block: format!("{} @ 0x{:X}", region.device, region.offset),
                    expected: region.len,
                    found: block.len(),
                });
            }
        }

        for (region, block) in self.regions.iter().zip(&blocks[1..]) {
            session
                .storage_mut(region.device)
                .write_range(region.offset, block)?;
        }
        session.model_mut().restore_internal(blocks[0])?;

        self.run_handshake(session, HandshakeKind::Restore)?;

        tracing::info!(
            "Restored state from {} (tick {})",
            path.display(),
            session.ticks()
        );
        Ok(())
    }

    /// Snapshot files in the working directory, sorted by name.
    pub fn list_snapshots(&self) -> Result<Vec<String>> {
        list_snapshots_in(Path::new("."))
    }

    /// Everything that can refuse a save or restore before memory or the
    /// model is touched.
    fn check_ready<M: HardwareModel>(&self, session: &Session<M>) -> Result<()> {
        Handshake::ensure_idle(session.model().checkpoint())?;
        for region in &self.regions {
            session
                .storage(region.device)
                .range(region.offset, region.len)?;
        }
        Ok(())
    }

    /// Clocks the session until the model has gone through one checkpoint
    /// cycle of `kind`.
    fn run_handshake<M: HardwareModel>(
        &self,
        session: &mut Session<M>,
        kind: HandshakeKind,
    ) -> Result<()> {
        let mut handshake = Handshake::begin(kind, session.model_mut().checkpoint_mut())?;

        while handshake.poll(session.model_mut().checkpoint_mut()) == Poll::Pending {
            if self.tick_limit.is_some_and(|limit| handshake.ticks() >= limit) {
                handshake.abort(session.model_mut().checkpoint_mut());
                tracing::warn!(
                    "{kind:?} handshake gave up in {:?} after {} ticks",
                    handshake.phase(),
                    handshake.ticks()
                );
                return Err(SimError::HandshakeTimeout {
                    phase: handshake.phase(),
                    ticks: handshake.ticks(),
                });
            }
            session.tick(1);
            handshake.record_tick();
        }

        tracing::debug!("{kind:?} handshake done in {} ticks", handshake.ticks());
        Ok(())
    }
}
