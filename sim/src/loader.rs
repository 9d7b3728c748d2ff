//! ROM image loading.
//!
//! A logical ROM region is often split over several physical chips, each
//! holding every n-th byte. Loading each chip with the same stride and a
//! base offset one apart rebuilds the interleaved image.

use crate::byte_source::ByteSource;
use crate::config::RomLoad;
use crate::error::Result;
use crate::memory::Storage;

/// Copies `data` into `storage` at `base`, `base + stride`, ... with every
/// address folded into the capacity. A stride of 0 is treated as 1.
///
/// Returns the number of bytes written.
pub fn scatter(storage: &mut Storage, data: &[u8], base: u32, stride: u32) -> usize {
    let stride = stride.max(1) as usize;
    let base = base as usize;
    let mask = storage.mask();

    if let Some(last) = data.len().checked_sub(1) {
        let end = last.saturating_mul(stride).saturating_add(base);
        if end > mask {
            tracing::warn!(
                "Image of {} bytes at 0x{base:08X} stride {stride} wraps past capacity 0x{:X}",
                data.len(),
                storage.capacity()
            );
        }
    }

    let bytes = storage.as_bytes_mut();
    for (i, byte) in data.iter().enumerate() {
        bytes[base.wrapping_add(i.wrapping_mul(stride)) & mask] = *byte;
    }

    data.len()
}

/// Fetches `name` and scatters it with [`scatter`]. The storage is left
/// untouched when the name cannot be resolved.
pub fn load_strided(
    source: &mut dyn ByteSource,
    name: &str,
    storage: &mut Storage,
    base: u32,
    stride: u32,
) -> Result<usize> {
    let data = source.fetch(name)?;
    let written = scatter(storage, &data, base, stride);

    tracing::info!(
        "Loaded {written} bytes from {name} at offset 0x{base:08X} with stride {}",
        stride.max(1)
    );
    Ok(written)
}

/// Writes big-endian 16-bit source words in little-endian lane order.
///
/// Word `k` lands at `base + k * stride`; strides below 2 mean contiguous
/// words. A trailing odd byte is padded with zero. Returns the number of
/// bytes written, padding included.
pub fn scatter_swapped16(storage: &mut Storage, data: &[u8], base: u32, stride: u32) -> usize {
    let stride = stride.max(2) as usize;
    let base = base as usize;
    let mask = storage.mask();
    let bytes = storage.as_bytes_mut();

    let mut written = 0;
    for (k, pair) in data.chunks(2).enumerate() {
        let word = u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]);
        let addr = base.wrapping_add(k.wrapping_mul(stride));

        for (lane, byte) in word.to_le_bytes().into_iter().enumerate() {
            bytes[addr.wrapping_add(lane) & mask] = byte;
        }
        written += 2;
    }

    written
}

/// Reads back `words` values written by [`scatter_swapped16`].
#[must_use]
pub fn gather_swapped16(storage: &Storage, base: u32, stride: u32, words: usize) -> Vec<u16> {
    let stride = stride.max(2) as usize;
    let base = base as usize;
    let mask = storage.mask();
    let bytes = storage.as_bytes();

    (0..words)
        .map(|k| {
            let addr = base.wrapping_add(k.wrapping_mul(stride));
            u16::from_le_bytes([bytes[addr & mask], bytes[addr.wrapping_add(1) & mask]])
        })
        .collect()
}

pub fn load_swapped16(
    source: &mut dyn ByteSource,
    name: &str,
    storage: &mut Storage,
    base: u32,
    stride: u32,
) -> Result<usize> {
    let data = source.fetch(name)?;
    let written = scatter_swapped16(storage, &data, base, stride);

    tracing::info!("Loaded {written} bytes (16-bit swapped) from {name} at offset 0x{base:08X}");
    Ok(written)
}

/// Runs one entry of a ROM layout against `storage`.
pub fn load_rom(source: &mut dyn ByteSource, rom: &RomLoad, storage: &mut Storage) -> Result<usize> {
    if rom.swap16 {
        load_swapped16(source, &rom.name, storage, rom.base, rom.stride)
    } else {
        load_strided(source, &rom.name, storage, rom.base, rom.stride)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::byte_source::InMemorySource;
    use crate::error::SimError;
    use crate::memory::DeviceId;

    fn random_image(rng: &mut StdRng, len: usize) -> Vec<u8> {
        (0..len).map(|_| rng.random()).collect()
    }

    #[test]
    fn strided_round_trip() {
        let mut rng = StdRng::seed_from_u64(0xF2);

        for (len, base, stride) in [(1, 0, 1), (100, 3, 1), (64, 0x10, 2), (33, 0xFF0, 4), (17, 5, 0)] {
            let mut storage = Storage::new(0x1000, 8);
            let data = random_image(&mut rng, len);

            assert_eq!(scatter(&mut storage, &data, base, stride), len);

            let stride = stride.max(1) as usize;
            let back: Vec<u8> = (0..len)
                .map(|i| storage.as_bytes()[(base as usize + i * stride) & storage.mask()])
                .collect();
            assert_eq!(back, data);
        }
    }

    #[test]
    fn missing_image_leaves_storage_untouched() {
        let mut source = InMemorySource::new();
        let mut storage = Storage::new(0x100, 8);
        storage.write_range(0, &[7; 16]).unwrap();

        let err = load_strided(&mut source, "b82-09.ic23", &mut storage, 0, 2).unwrap_err();
        assert!(matches!(err, SimError::NotFound { .. }));
        assert_eq!(storage.read_range(0, 16).unwrap(), &[7; 16]);
        assert!(storage.as_bytes()[16..].iter().all(|b| *b == 0));
    }

    #[test]
    fn swapped16_round_trip_and_padding() {
        let mut storage = Storage::new(0x100, 8);
        let data = [0x12, 0x34, 0x56, 0x78, 0x9A];

        assert_eq!(scatter_swapped16(&mut storage, &data, 0x10, 2), 6);
        assert_eq!(
            storage.read_range(0x10, 6).unwrap(),
            &[0x34, 0x12, 0x78, 0x56, 0x00, 0x9A]
        );
        assert_eq!(
            gather_swapped16(&storage, 0x10, 2, 3),
            vec![0x1234, 0x5678, 0x9A00]
        );
    }

    #[test]
    fn swapped16_with_word_stride() {
        let mut storage = Storage::new(0x100, 8);
        scatter_swapped16(&mut storage, &[0xAA, 0xBB, 0xCC, 0xDD], 0, 4);

        assert_eq!(
            storage.read_range(0, 8).unwrap(),
            &[0xBB, 0xAA, 0, 0, 0xDD, 0xCC, 0, 0]
        );
        assert_eq!(gather_swapped16(&storage, 0, 4, 2), vec![0xAABB, 0xCCDD]);
    }

    #[test]
    fn interleaved_chip_pair_in_full_size_sdram() {
        const CHIP: usize = 512 * 1024;

        let mut rng = StdRng::seed_from_u64(0x5D2A);
        let chip_a = random_image(&mut rng, CHIP);
        let chip_b = random_image(&mut rng, CHIP);

        let mut source = InMemorySource::new()
            .with("b82-17.ic11", chip_a.clone())
            .with("b82-09.ic23", chip_b.clone());
        let mut storage = Storage::new(0x0800_0000, 8);

        for rom in [
            RomLoad::new("b82-17.ic11", DeviceId::Sdram, 0, 2),
            RomLoad::new("b82-09.ic23", DeviceId::Sdram, 1, 2),
        ] {
            assert_eq!(load_rom(&mut source, &rom, &mut storage).unwrap(), CHIP);
        }

        let image = storage.read_range(0, 2 * CHIP).unwrap();
        let even: Vec<u8> = image.iter().step_by(2).copied().collect();
        let odd: Vec<u8> = image.iter().skip(1).step_by(2).copied().collect();
        assert!(even == chip_a, "even bytes differ from chip A");
        assert!(odd == chip_b, "odd bytes differ from chip B");

        assert_eq!(storage.capacity(), 0x0800_0000);
        assert!(storage.as_bytes()[2 * CHIP..].iter().all(|b| *b == 0));
    }

    #[test]
    fn addresses_wrap_on_overflow() {
        let mut storage = Storage::new(16, 8);
        scatter(&mut storage, &[1, 2, 3, 4], 14, 1);

        assert_eq!(storage.read_range(14, 2).unwrap(), &[1, 2]);
        assert_eq!(storage.read_range(0, 2).unwrap(), &[3, 4]);
    }
}
