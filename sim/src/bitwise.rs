use std::fmt::Debug;
use std::mem::size_of;
use std::ops::RangeInclusive;

/// Helpers to look at bus words one bit or one byte lane at a time.
/// Bit and lane indices count from the lsb (right to left), so lane 0 is
/// the least significant byte whatever order the bytes have in memory.
pub trait Bits
where
    Self: Clone + Sized + Into<u128> + TryFrom<u128> + TryInto<u8> + From<u8>,
    <Self as TryFrom<u128>>::Error: Debug,
    <Self as TryInto<u8>>::Error: Debug,
{
    fn is_bit_on(&self, bit_idx: u8) -> bool {
        debug_assert!(bit_idx < (size_of::<Self>() * 8) as u8);
        let bitwise: u128 = <Self as Into<u128>>::into(self.clone());
        let mask: u128 = 0b1 << bit_idx;
        (bitwise & mask) != 0
    }

    fn get_bits(&self, bits_range: RangeInclusive<u8>) -> Self {
        let start = bits_range.start();
        let length = bits_range.len() as u32;

        // `length` ones, moved up to the first bit of the range.
        let mut mask = (2_u128.pow(length)) - 1;
        mask <<= start;

        let value: u128 = <Self as Into<u128>>::into(self.clone());

        <Self as TryFrom<u128>>::try_from((value & mask) >> start).unwrap()
    }

    /// Returns byte lane `byte_nth`: bits `byte_nth*8..=byte_nth*8+7`.
    fn get_byte(&self, byte_nth: u8) -> u8 {
        debug_assert!(byte_nth < size_of::<Self>() as u8);

        self.get_bits(byte_nth * 8..=byte_nth * 8 + 7)
            .try_into()
            .unwrap()
    }

    fn set_byte(&mut self, byte_nth: u8, value: u8) {
        debug_assert!(byte_nth < size_of::<Self>() as u8);

        let mut bitwise: u128 = <Self as Into<u128>>::into(self.clone());
        // Clears the lane, then ORs the new octet in place.
        let mask: u128 = !(0xFF << (8 * byte_nth));
        let shifted_value: u128 = u128::from(value) << (8 * byte_nth);

        bitwise = (bitwise & mask) | shifted_value;
        *self = <Self as TryFrom<u128>>::try_from(bitwise).unwrap();
    }
}

impl Bits for u64 {}
impl Bits for u32 {}
impl Bits for u16 {}
impl Bits for u8 {}
