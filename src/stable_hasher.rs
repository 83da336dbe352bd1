use std::iter::FusedIterator;

/// 64 bit digest of `value`, stable across platforms and process runs.
#[inline]
pub fn digest(value: &[u8]) -> u64 {
    xxhash_rust::xxh3::xxh3_64(value)
}

/// Iterator over the probe indices of a digest.
///
/// The digest is split into two 32 bit lanes and probe `i` is `(low + i * high) % counter_count`
/// (Kirsch-Mitzenmacher double hashing). A zero `high` lane makes every probe land on the same slot.
#[derive(Debug, Clone)]
pub struct Probes {
    low: u64,
    high: u64,
    counter_count: u64,
    next: u64,
    probe_count: u64,
}

impl Probes {
    /// Panics if `counter_count` is zero and `probe_count` isn't.
    #[inline]
    pub fn new(digest: u64, probe_count: u64, counter_count: u64) -> Self {
        assert!(
            counter_count != 0 || probe_count == 0,
            "probing an empty counter array"
        );
        Probes {
            low: digest >> 32,
            high: digest & 0xFFFF_FFFF,
            counter_count,
            next: 0,
            probe_count,
        }
    }
}

impl Iterator for Probes {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.next == self.probe_count {
            return None;
        }
        let i = self.next;
        self.next += 1;
        let index = self.low.wrapping_add(i.wrapping_mul(self.high)) % self.counter_count;
        Some(index as usize)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.probe_count - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Probes {}

impl FusedIterator for Probes {}
