use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sim::hardware::CHECKPOINT_IDLE;
use sim::{
    BusPorts, CheckpointSignals, DeviceId, HardwareModel, InMemorySource, RomLoad, Session,
    SimConfig, SnapshotRegion, StateCoordinator,
};

/// Goes busy on the rising edge after a request and idle on the one after
/// the request is dropped. Keeps a frame counter as its internal state.
#[derive(Default)]
struct Checkpointer {
    clock: bool,
    ports: BusPorts,
    checkpoint: CheckpointSignals,
    frame: u32,
}

impl HardwareModel for Checkpointer {
    fn set_clock(&mut self, high: bool) {
        self.clock = high;
    }

    fn set_reset(&mut self, _active: bool) {}

    fn eval(&mut self) {
        if !self.clock {
            return;
        }
        self.clock = false;
        self.frame += 1;

        let cp = &mut self.checkpoint;
        let requested = cp.do_save || cp.do_restore;
        cp.state_out = match (cp.state_out, requested) {
            (CHECKPOINT_IDLE, true) => 1,
            (_, false) => CHECKPOINT_IDLE,
            (status, true) => status,
        };
    }

    fn ports(&self) -> &BusPorts {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut BusPorts {
        &mut self.ports
    }

    fn checkpoint(&self) -> &CheckpointSignals {
        &self.checkpoint
    }

    fn checkpoint_mut(&mut self) -> &mut CheckpointSignals {
        &mut self.checkpoint
    }

    fn save_internal(&self) -> Vec<u8> {
        self.frame.to_le_bytes().to_vec()
    }

    fn internal_len(&self) -> usize {
        4
    }

    fn restore_internal(&mut self, blob: &[u8]) -> sim::Result<()> {
        let mut raw = [0; 4];
        raw.copy_from_slice(blob);
        self.frame = u32::from_le_bytes(raw);
        Ok(())
    }
}

fn config() -> SimConfig {
    SimConfig {
        sdram_size: 0x2_0000,
        ddr_size: 0x4_0000,
        reset_ticks: 10,
        snapshot_regions: vec![
            SnapshotRegion {
                device: DeviceId::Ddr,
                offset: 0,
                len: 0x4_0000,
            },
            SnapshotRegion {
                device: DeviceId::Sdram,
                offset: 0x1_0000,
                len: 0x8000,
            },
        ],
        ..SimConfig::default()
    }
}

#[test]
fn save_mutate_restore_is_byte_identical() {
    let config = config();
    let mut rng = StdRng::seed_from_u64(0xF2);

    let chip: Vec<u8> = (0..0x4000).map(|_| rng.random()).collect();
    let mut source = InMemorySource::new().with("b82-03.ic9", chip);

    let mut session = Session::new(Checkpointer::default(), &config);
    session
        .load_rom(&mut source, &RomLoad::new("b82-03.ic9", DeviceId::Ddr, 0, 4))
        .unwrap();
    rng.fill(
        session
            .storage_mut(DeviceId::Sdram)
            .as_bytes_mut(),
    );
    session.tick(100);

    let coordinator = StateCoordinator::from_config(&config);
    let path: PathBuf = std::env::temp_dir().join(format!(
        "f2sim-roundtrip-{}.f2state",
        std::process::id()
    ));

    coordinator.save(&mut session, &path).unwrap();
    let ddr_at_save = session.storage(DeviceId::Ddr).as_bytes().to_vec();
    let sdram_at_save = session
        .storage(DeviceId::Sdram)
        .read_range(0x1_0000, 0x8000)
        .unwrap()
        .to_vec();
    let frame_at_save = session.model().frame;

    session.tick(1000);
    rng.fill(session.storage_mut(DeviceId::Ddr).as_bytes_mut());
    session
        .storage_mut(DeviceId::Sdram)
        .write_range(0x1_0000, &[0xFF; 0x100])
        .unwrap();

    coordinator.restore(&mut session, &path).unwrap();

    assert!(session.storage(DeviceId::Ddr).as_bytes() == ddr_at_save.as_slice());
    assert!(
        session
            .storage(DeviceId::Sdram)
            .read_range(0x1_0000, 0x8000)
            .unwrap()
            == sdram_at_save.as_slice()
    );
    // The restore handshake itself takes two rising edges.
    assert_eq!(session.model().frame, frame_at_save + 2);
    assert_eq!(session.model().checkpoint().state_out, CHECKPOINT_IDLE);

    fs::remove_file(path).unwrap();
}

#[test]
fn restore_of_missing_file_fails_without_ticking() {
    let config = config();
    let mut session = Session::new(Checkpointer::default(), &config);
    let coordinator = StateCoordinator::from_config(&config);

    let missing = std::env::temp_dir().join("f2sim-does-not-exist.f2state");
    assert!(matches!(
        coordinator.restore(&mut session, &missing),
        Err(sim::SimError::Io(_))
    ));
    assert_eq!(session.ticks(), 0);
}
