//! Counting [Bloom filter](https://en.wikipedia.org/wiki/Bloom_filter#Counting_Bloom_filters)
//! with saturating 8 or 16 bit counters.
//!
//! Besides approximate membership testing it supports removals and approximate multiplicity
//! queries, without storing the values themselves. Memory use is fixed at construction and
//! independent of the number of distinct values inserted.
//!
//! All operations take `&self`, the counter array is guarded by a single
//! [`RwLock`](parking_lot::RwLock) so a filter can be shared between threads as is.
//!
//! ### Example
//!
//! ```rust
//! let f = cbfilter::Filter8::new(1000, 0.01).unwrap();
//! assert_eq!(f.add("hello"), 1);
//! assert_eq!(f.add("hello"), 2);
//! assert_eq!(f.count("hello"), 2);
//! assert_eq!(f.remove("hello"), 1);
//! f.reset("hello");
//! assert_eq!(f.count("hello"), 0);
//! ```
//!
//! ### Hasher
//!
//! Each value is hashed once with [xxhash3](https://crates.io/crates/xxhash-rust), which is
//! stable across platforms and process runs. The 64 bit digest is split into two 32 bit lanes
//! and the probe indices are derived from those with double hashing
//! (see [`Probes`]). Callers that already hold a 64 bit hash of their values can use the
//! `*_digest` methods and skip xxhash3 altogether.
//!
//! ### Saturation
//!
//! No operation fails once the filter is built. Counters stop at their maximum on
//! [`add`](CountingFilter::add) and at zero on [`remove`](CountingFilter::remove). Removing values
//! that were never added, or removing them more times than they were added, may cause false
//! negatives for values sharing the same counters.
//!
//! ### Sizing
//!
//! | Target error | Probes | Counters per expected item |
//! |:---:|:---:|:---:|
//! | 0.5 | 1 | 1.44 |
//! | 0.2 | 2 | 3.35 |
//! | 0.1 | 3 | 4.79 |
//! | 0.01 | 6 | 9.58 |
//! | 0.001 | 9 | 14.38 |
//! | 0.0001 | 13 | 19.17 |
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

use std::mem::size_of;

use parking_lot::RwLock;
#[cfg(feature = "jsonschema")]
use schemars::JsonSchema;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use counter::Counter;
pub use stable_hasher::{digest, Probes};

mod counter;
mod stable_hasher;

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The false positive rate is NaN or not positive
    InvalidFalsePositiveRate(f64),
    /// The filter would have no counters
    EmptyCounterArray,
    /// The counter array doesn't fit in memory
    CapacityTooLarge,
    /// The snapshot was taken from a filter with another counter width
    IncompatibleCounterWidth,
    /// The snapshot counter bytes don't match its counter width
    CorruptSnapshot,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for Error {}

/// Width of the counters of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "jsonschema", derive(JsonSchema))]
pub enum CounterWidth {
    /// `u8` counters, saturating at 255
    Eight,
    /// `u16` counters, saturating at 65535
    Sixteen,
}

impl CounterWidth {
    #[inline]
    pub const fn bits(self) -> u32 {
        match self {
            CounterWidth::Eight => 8,
            CounterWidth::Sixteen => 16,
        }
    }

    #[inline]
    pub const fn bytes(self) -> usize {
        self.bits() as usize / 8
    }

    #[inline]
    pub const fn max_value(self) -> u64 {
        (1 << self.bits()) - 1
    }
}

/// Returns the `(probe_count, counter_count)` of a filter holding `expected_insertions`
/// values with a false positive rate of `fp_rate`.
///
/// Both values are truncated toward zero and the inputs aren't validated, a `fp_rate` of
/// 0.5 or more yields 1 or 0 probes while `fp_rate >= 1.0` or `expected_insertions == 0` yield
/// no counters at all. Out of range floats saturate (NaN becomes 0).
pub fn optimal_params(expected_insertions: u64, fp_rate: f64) -> (u64, u64) {
    use std::f64::consts::LN_2;
    let log_fp = fp_rate.ln();
    let probe_count = -(log_fp / LN_2);
    let counter_count = -(expected_insertions as f64 * log_fp) / (LN_2 * LN_2);
    (probe_count as u64, counter_count as u64)
}

/// Counting Bloom filter generic over its [`Counter`] width.
///
/// See [`Filter8`] and [`Filter16`], or [`DynFilter`] to pick the width at runtime.
pub struct CountingFilter<C: Counter> {
    probe_count: u64,
    counter_count: u64,
    counters: RwLock<Box<[C]>>,
}

/// Counting filter with `u8` counters.
pub type Filter8 = CountingFilter<u8>;
/// Counting filter with `u16` counters.
pub type Filter16 = CountingFilter<u16>;

impl<C: Counter> CountingFilter<C> {
    /// Creates a new filter sized for `expected_insertions` values with a target
    /// false positive rate of `fp_rate`, see [`optimal_params`].
    ///
    /// Errors if `fp_rate` is NaN or not positive, if the parameters yield no counters
    /// (`fp_rate >= 1.0` or `expected_insertions == 0`) or if the counters don't fit in memory.
    /// A probe count of 0 is kept as is, such a filter reports every value at the maximum count.
    pub fn new(expected_insertions: u64, fp_rate: f64) -> Result<Self, Error> {
        if fp_rate.is_nan() || fp_rate <= 0.0 {
            return Err(Error::InvalidFalsePositiveRate(fp_rate));
        }
        let (probe_count, counter_count) = optimal_params(expected_insertions, fp_rate);
        Self::with_params(probe_count, counter_count)
    }

    /// Creates a new filter with exactly `probe_count` probes per value and `counter_count` counters.
    pub fn with_params(probe_count: u64, counter_count: u64) -> Result<Self, Error> {
        if counter_count == 0 {
            return Err(Error::EmptyCounterArray);
        }
        if counter_count > (isize::MAX as usize / size_of::<C>()) as u64 {
            return Err(Error::CapacityTooLarge);
        }
        #[cfg(feature = "trace")]
        tracing::debug!(
            probe_count,
            counter_count,
            width = C::WIDTH.bits(),
            "CountingFilter::with_params"
        );
        let counters = vec![C::default(); counter_count as usize].into_boxed_slice();
        Ok(Self {
            probe_count,
            counter_count,
            counters: RwLock::new(counters),
        })
    }

    /// Restores a filter from a [`Snapshot`] taken with the same counter width.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, Error> {
        if snapshot.width != C::WIDTH {
            return Err(Error::IncompatibleCounterWidth);
        }
        let width = C::WIDTH.bytes();
        if snapshot.counters.len() % width != 0 {
            return Err(Error::CorruptSnapshot);
        }
        let result = Self::with_params(snapshot.probe_count, snapshot.counter_count())?;
        {
            let mut counters = result.counters.write();
            for (counter, bytes) in counters.iter_mut().zip(snapshot.counters.chunks_exact(width)) {
                *counter = C::read_le(bytes);
            }
        }
        Ok(result)
    }

    /// Number of counters probed per value.
    #[inline]
    pub fn probe_count(&self) -> u64 {
        self.probe_count
    }

    /// Length of the counter array.
    #[inline]
    pub fn counter_count(&self) -> u64 {
        self.counter_count
    }

    /// Value at which counters saturate.
    #[inline]
    pub fn max_counter_value(&self) -> u64 {
        C::MAX.widen()
    }

    /// Adds `value` to the filter and returns its approximate count afterwards.
    pub fn add(&self, value: impl AsRef<[u8]>) -> u64 {
        self.add_digest(digest(value.as_ref()))
    }

    /// Removes `value` from the filter and returns its approximate count afterwards.
    pub fn remove(&self, value: impl AsRef<[u8]>) -> u64 {
        self.remove_digest(digest(value.as_ref()))
    }

    /// Returns the approximate number of times `value` was added to the filter.
    pub fn count(&self, value: impl AsRef<[u8]>) -> u64 {
        self.count_digest(digest(value.as_ref()))
    }

    /// Zeroes the counters probed by `value`.
    ///
    /// Other values sharing any of these counters lose (part of) their counts.
    pub fn reset(&self, value: impl AsRef<[u8]>) {
        self.reset_digest(digest(value.as_ref()))
    }

    /// Same as [`add`](Self::add) for a precomputed 64 bit digest.
    pub fn add_digest(&self, digest: u64) -> u64 {
        #[cfg(feature = "trace")]
        tracing::trace!(digest, "CountingFilter::add");
        self.update(digest, C::saturating_inc)
    }

    /// Same as [`remove`](Self::remove) for a precomputed 64 bit digest.
    pub fn remove_digest(&self, digest: u64) -> u64 {
        #[cfg(feature = "trace")]
        tracing::trace!(digest, "CountingFilter::remove");
        self.update(digest, C::saturating_dec)
    }

    /// Same as [`count`](Self::count) for a precomputed 64 bit digest.
    pub fn count_digest(&self, digest: u64) -> u64 {
        let probes = self.probes(digest);
        let counters = self.counters.read();
        Self::min_count(&counters, probes)
    }

    /// Same as [`reset`](Self::reset) for a precomputed 64 bit digest.
    pub fn reset_digest(&self, digest: u64) {
        #[cfg(feature = "trace")]
        tracing::trace!(digest, "CountingFilter::reset");
        let probes = self.probes(digest);
        let mut counters = self.counters.write();
        for i in probes {
            counters[i] = C::default();
        }
    }

    /// Zeroes every counter of the filter.
    pub fn clear(&self) {
        #[cfg(feature = "trace")]
        tracing::debug!("CountingFilter::clear");
        self.counters.write().fill(C::default());
    }

    /// Returns a consistent copy of the filter state.
    pub fn snapshot(&self) -> Snapshot {
        let counters = self.counters.read();
        let mut bytes = Vec::with_capacity(counters.len() * C::WIDTH.bytes());
        for &counter in counters.iter() {
            counter.write_le(&mut bytes);
        }
        Snapshot {
            width: C::WIDTH,
            probe_count: self.probe_count,
            counters: bytes.into_boxed_slice(),
        }
    }

    /// The probe indices are computed before the lock is taken.
    #[inline]
    fn probes(&self, digest: u64) -> Probes {
        Probes::new(digest, self.probe_count, self.counter_count)
    }

    /// Applies `op` to every probed counter (once per probe) and returns the minimum afterwards.
    #[inline]
    fn update(&self, digest: u64, op: impl Fn(C) -> C) -> u64 {
        let probes = self.probes(digest);
        let mut counters = self.counters.write();
        for i in probes.clone() {
            counters[i] = op(counters[i]);
        }
        Self::min_count(&counters, probes)
    }

    /// Minimum across the probed counters, the counter maximum if there are no probes.
    #[inline]
    fn min_count(counters: &[C], probes: Probes) -> u64 {
        probes
            .map(|i| counters[i])
            .fold(C::MAX, |min, c| min.min(c))
            .widen()
    }
}

impl<C: Counter> Clone for CountingFilter<C> {
    fn clone(&self) -> Self {
        Self {
            probe_count: self.probe_count,
            counter_count: self.counter_count,
            counters: RwLock::new(self.counters.read().clone()),
        }
    }
}

impl<C: Counter> std::fmt::Debug for CountingFilter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingFilter")
            .field("counters", &"[..]")
            .field("width", &C::WIDTH)
            .field("probe_count", &self.probe_count)
            .field("counter_count", &self.counter_count())
            .finish()
    }
}

/// Point in time copy of a filter, counters are stored as little endian bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "jsonschema", derive(JsonSchema))]
pub struct Snapshot {
    #[cfg_attr(feature = "serde", serde(rename = "w"))]
    width: CounterWidth,
    #[cfg_attr(feature = "serde", serde(rename = "k"))]
    probe_count: u64,
    #[cfg_attr(
        feature = "serde",
        serde(
            rename = "c",
            serialize_with = "serde_bytes::serialize",
            deserialize_with = "serde_bytes::deserialize"
        )
    )]
    counters: Box<[u8]>,
}

impl Snapshot {
    #[inline]
    pub fn width(&self) -> CounterWidth {
        self.width
    }

    #[inline]
    pub fn probe_count(&self) -> u64 {
        self.probe_count
    }

    #[inline]
    pub fn counter_count(&self) -> u64 {
        (self.counters.len() / self.width.bytes()) as u64
    }

    /// Counter values widened to `u64`.
    pub fn counters(&self) -> impl Iterator<Item = u64> + '_ {
        self.counters
            .chunks_exact(self.width.bytes())
            .map(move |bytes| match self.width {
                CounterWidth::Eight => u8::read_le(bytes).widen(),
                CounterWidth::Sixteen => u16::read_le(bytes).widen(),
            })
    }
}

/// Operations shared by every counting filter, usable as a trait object.
pub trait CountingBloom: Send + Sync {
    fn add(&self, value: &[u8]) -> u64;
    fn remove(&self, value: &[u8]) -> u64;
    fn count(&self, value: &[u8]) -> u64;
    fn reset(&self, value: &[u8]);
    fn clear(&self);
}

impl<C: Counter> CountingBloom for CountingFilter<C> {
    #[inline]
    fn add(&self, value: &[u8]) -> u64 {
        CountingFilter::add(self, value)
    }

    #[inline]
    fn remove(&self, value: &[u8]) -> u64 {
        CountingFilter::remove(self, value)
    }

    #[inline]
    fn count(&self, value: &[u8]) -> u64 {
        CountingFilter::count(self, value)
    }

    #[inline]
    fn reset(&self, value: &[u8]) {
        CountingFilter::reset(self, value)
    }

    #[inline]
    fn clear(&self) {
        CountingFilter::clear(self)
    }
}

/// Counting filter whose counter width is chosen at runtime.
#[derive(Debug, Clone)]
pub enum DynFilter {
    Eight(Filter8),
    Sixteen(Filter16),
}

macro_rules! dispatch {
    ($self:ident, $f:ident => $e:expr) => {
        match $self {
            DynFilter::Eight($f) => $e,
            DynFilter::Sixteen($f) => $e,
        }
    };
}

impl DynFilter {
    /// See [`CountingFilter::new`].
    pub fn new(expected_insertions: u64, fp_rate: f64, width: CounterWidth) -> Result<Self, Error> {
        Ok(match width {
            CounterWidth::Eight => DynFilter::Eight(Filter8::new(expected_insertions, fp_rate)?),
            CounterWidth::Sixteen => {
                DynFilter::Sixteen(Filter16::new(expected_insertions, fp_rate)?)
            }
        })
    }

    /// Restores a filter of the snapshot's width.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, Error> {
        Ok(match snapshot.width {
            CounterWidth::Eight => DynFilter::Eight(Filter8::from_snapshot(snapshot)?),
            CounterWidth::Sixteen => DynFilter::Sixteen(Filter16::from_snapshot(snapshot)?),
        })
    }

    #[inline]
    pub fn width(&self) -> CounterWidth {
        match self {
            DynFilter::Eight(_) => CounterWidth::Eight,
            DynFilter::Sixteen(_) => CounterWidth::Sixteen,
        }
    }

    pub fn probe_count(&self) -> u64 {
        dispatch!(self, f => f.probe_count())
    }

    pub fn counter_count(&self) -> u64 {
        dispatch!(self, f => f.counter_count())
    }

    pub fn max_counter_value(&self) -> u64 {
        self.width().max_value()
    }

    pub fn add(&self, value: impl AsRef<[u8]>) -> u64 {
        dispatch!(self, f => f.add(value))
    }

    pub fn remove(&self, value: impl AsRef<[u8]>) -> u64 {
        dispatch!(self, f => f.remove(value))
    }

    pub fn count(&self, value: impl AsRef<[u8]>) -> u64 {
        dispatch!(self, f => f.count(value))
    }

    pub fn reset(&self, value: impl AsRef<[u8]>) {
        dispatch!(self, f => f.reset(value))
    }

    pub fn clear(&self) {
        dispatch!(self, f => f.clear())
    }

    pub fn snapshot(&self) -> Snapshot {
        dispatch!(self, f => f.snapshot())
    }
}

impl CountingBloom for DynFilter {
    #[inline]
    fn add(&self, value: &[u8]) -> u64 {
        DynFilter::add(self, value)
    }

    #[inline]
    fn remove(&self, value: &[u8]) -> u64 {
        DynFilter::remove(self, value)
    }

    #[inline]
    fn count(&self, value: &[u8]) -> u64 {
        DynFilter::count(self, value)
    }

    #[inline]
    fn reset(&self, value: &[u8]) {
        DynFilter::reset(self, value)
    }

    #[inline]
    fn clear(&self) {
        DynFilter::clear(self)
    }
}
