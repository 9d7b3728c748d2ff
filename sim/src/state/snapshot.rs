//! On-disk snapshot layout.
//!
//! ```text
//! magic "F2SS" | version: u32 | blocks: u32 | (len: u64, payload) * blocks
//! ```
//!
//! All integers are little-endian. Block 0 holds the model's internal
//! registers, the rest hold memory regions in layout order.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, SimError};

pub const SNAPSHOT_SUFFIX: &str = ".f2state";
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"F2SS";
pub const SNAPSHOT_VERSION: u32 = 1;

const HEADER_LEN: usize = 12;

pub fn encode(blocks: &[&[u8]]) -> Result<Vec<u8>> {
    let payload: usize = blocks.iter().map(|b| b.len() + 8).sum();
    let mut out = Vec::with_capacity(HEADER_LEN + payload);

    out.write_all(&SNAPSHOT_MAGIC)?;
    out.write_u32::<LittleEndian>(SNAPSHOT_VERSION)?;
    // Block counts are tiny, a layout never has 2^32 regions.
    #[allow(clippy::cast_possible_truncation)]
    out.write_u32::<LittleEndian>(blocks.len() as u32)?;

    for block in blocks {
        out.write_u64::<LittleEndian>(block.len() as u64)?;
        out.write_all(block)?;
    }

    Ok(out)
}

/// Splits a snapshot into its blocks, checking the header and that every
/// declared length is present. Trailing bytes are an error.
pub fn decode(bytes: &[u8]) -> Result<Vec<&[u8]>> {
    let mut cursor = Cursor::new(bytes);

    let mut magic = [0; 4];
    cursor
        .read_exact(&mut magic)
        .map_err(|_| truncated("magic"))?;
    if magic != SNAPSHOT_MAGIC {
        return Err(SimError::InvalidSnapshot("not a snapshot file".to_string()));
    }

    let version = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| truncated("version"))?;
    if version != SNAPSHOT_VERSION {
        return Err(SimError::InvalidSnapshot(format!(
            "unsupported version {version}, expected {SNAPSHOT_VERSION}"
        )));
    }

    let count = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| truncated("block count"))?;
    let mut blocks = Vec::new();
    for _ in 0..count {
        let len = cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| truncated("block length"))?;
        let start = position(&cursor);
        let end = usize::try_from(len)
            .ok()
            .and_then(|len| start.checked_add(len))
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| truncated("block payload"))?;
        blocks.push(&bytes[start..end]);
        cursor.set_position(end as u64);
    }

    let pos = position(&cursor);
    if pos != bytes.len() {
        return Err(SimError::InvalidSnapshot(format!(
            "{} trailing bytes",
            bytes.len() - pos
        )));
    }

    Ok(blocks)
}

// The cursor never moves past the end of the slice it wraps.
#[allow(clippy::cast_possible_truncation)]
fn position(cursor: &Cursor<&[u8]>) -> usize {
    cursor.position() as usize
}

fn truncated(what: &str) -> SimError {
    SimError::InvalidSnapshot(format!("truncated {what}"))
}

/// Replaces `path` with `bytes` through a temporary sibling file, so a
/// failed write never leaves a half-written snapshot behind.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    if let Err(e) = fs::write(&tmp, bytes).and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Adds the snapshot suffix unless `name` already has it.
#[must_use]
pub fn snapshot_file_name(name: &str) -> String {
    if name.ends_with(SNAPSHOT_SUFFIX) {
        name.to_string()
    } else {
        format!("{name}{SNAPSHOT_SUFFIX}")
    }
}

/// Names of the snapshot files in `dir`, sorted. A bare `.f2state` does
/// not count.
pub fn list_snapshots_in(dir: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.len() > SNAPSHOT_SUFFIX.len() && name.ends_with(SNAPSHOT_SUFFIX))
        .collect();

    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn layout_is_stable() {
        let bytes = encode(&[&[0xAA], &[]]).unwrap();

        assert_eq!(
            bytes,
            vec![
                b'F', b'2', b'S', b'S', 1, 0, 0, 0, 2, 0, 0, 0, //
                1, 0, 0, 0, 0, 0, 0, 0, 0xAA, //
                0, 0, 0, 0, 0, 0, 0, 0,
            ]
        );
        assert_eq!(decode(&bytes).unwrap(), vec![&[0xAA_u8][..], &[][..]]);
    }

    #[test]
    fn rejects_damaged_files() {
        let good = encode(&[&[1, 2, 3], &[4; 16]]).unwrap();

        let mut bad_magic = good.clone();
        bad_magic[0] = b'X';
        assert!(matches!(decode(&bad_magic), Err(SimError::InvalidSnapshot(_))));

        let mut bad_version = good.clone();
        bad_version[4] = 2;
        assert!(matches!(decode(&bad_version), Err(SimError::InvalidSnapshot(_))));

        for cut in [0, 3, 11, 15, 22, good.len() - 1] {
            assert!(decode(&good[..cut]).is_err(), "cut at {cut} accepted");
        }

        let mut trailing = good;
        trailing.push(0);
        assert!(decode(&trailing).is_err());
    }

    #[test]
    fn huge_length_is_truncation_not_panic() {
        let mut bytes = encode(&[&[]]).unwrap();
        let len_at = HEADER_LEN;
        bytes[len_at..len_at + 8].copy_from_slice(&u64::MAX.to_le_bytes());

        assert!(matches!(decode(&bytes), Err(SimError::InvalidSnapshot(_))));
    }

    #[test]
    fn file_names() {
        assert_eq!(snapshot_file_name("finalb"), "finalb.f2state");
        assert_eq!(snapshot_file_name("finalb.f2state"), "finalb.f2state");
    }

    #[test]
    fn lists_sorted_snapshots() {
        let dir = std::env::temp_dir().join(format!("f2sim-list-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        for name in ["b.f2state", "a.f2state", ".f2state", "c.f2state.tmp", "notes.txt"] {
            fs::write(dir.join(name), b"").unwrap();
        }
        fs::create_dir_all(dir.join("d.f2state")).unwrap();

        assert_eq!(
            list_snapshots_in(&dir).unwrap(),
            vec!["a.f2state".to_string(), "b.f2state".to_string()]
        );

        let target = dir.join("a.f2state");
        write_atomic(&target, &[1, 2, 3]).unwrap();
        assert_eq!(fs::read(&target).unwrap(), vec![1, 2, 3]);
        assert!(!dir.join("a.f2state.tmp").exists());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn failed_rename_leaves_no_temp_file() {
        let dir = std::env::temp_dir().join(format!("f2sim-rename-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        // A directory in the way of the final name makes the rename fail.
        let target = dir.join("finalb.f2state");
        fs::create_dir_all(target.join("occupied")).unwrap();

        assert!(matches!(
            write_atomic(&target, &[1, 2, 3]),
            Err(SimError::Io(_))
        ));
        assert!(!dir.join("finalb.f2state.tmp").exists());
        assert!(target.is_dir());

        fs::remove_dir_all(dir).unwrap();
    }
}
