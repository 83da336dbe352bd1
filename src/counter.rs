use std::fmt::Debug;

use crate::CounterWidth;

mod private {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
}

/// Fixed width unsigned counter stored in a [`CountingFilter`](crate::CountingFilter).
///
/// Increments and decrements saturate at `MAX` and `0` respectively instead of wrapping.
/// The trait is sealed, it's implemented for `u8` and `u16` only.
pub trait Counter: private::Sealed + Copy + Ord + Default + Debug + Send + Sync + 'static {
    /// Saturation ceiling, `2^W - 1`.
    const MAX: Self;
    /// Width tag used by snapshots.
    const WIDTH: CounterWidth;

    fn saturating_inc(self) -> Self;
    fn saturating_dec(self) -> Self;
    fn widen(self) -> u64;

    fn write_le(self, out: &mut Vec<u8>);
    /// Reads a counter from exactly `WIDTH.bytes()` little endian bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

impl Counter for u8 {
    const MAX: Self = u8::MAX;
    const WIDTH: CounterWidth = CounterWidth::Eight;

    #[inline]
    fn saturating_inc(self) -> Self {
        self.saturating_add(1)
    }

    #[inline]
    fn saturating_dec(self) -> Self {
        self.saturating_sub(1)
    }

    #[inline]
    fn widen(self) -> u64 {
        self as u64
    }

    #[inline]
    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self);
    }

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl Counter for u16 {
    const MAX: Self = u16::MAX;
    const WIDTH: CounterWidth = CounterWidth::Sixteen;

    #[inline]
    fn saturating_inc(self) -> Self {
        self.saturating_add(1)
    }

    #[inline]
    fn saturating_dec(self) -> Self {
        self.saturating_sub(1)
    }

    #[inline]
    fn widen(self) -> u64 {
        self as u64
    }

    #[inline]
    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
}
