//! Signal sets
//!
//! A `SigSet` is a bit vector over `[1, MAX_SIGNO]` where bit *i* stands for
//! signal *i*. Bit 0 is never set. All operations are pure bit manipulation
//! on a single word, so they are safe inside interrupt-disabled sections.

use core::fmt;

use super::constants::*;
use super::error::{SignalError, SignalResult};

/// All valid signal bits (1..=MAX_SIGNO)
const VALID_BITS: u64 = !1u64;

/// Bitmap of signal numbers
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SigSet {
    bits: u64,
}

impl SigSet {
    /// The empty set (`sigemptyset`)
    pub const fn empty() -> Self {
        SigSet { bits: 0 }
    }

    /// Every valid signal (`sigfillset`)
    pub const fn full() -> Self {
        SigSet { bits: VALID_BITS }
    }

    /// Build a set from raw bits, discarding the reserved bit 0
    pub const fn from_bits(bits: u64) -> Self {
        SigSet { bits: bits & VALID_BITS }
    }

    /// Build a set holding a single signal
    pub fn single(sig: u32) -> SignalResult<Self> {
        let mut set = SigSet::empty();
        set.add(sig)?;
        Ok(set)
    }

    /// Build a set from a list of signals; fails on the first invalid one
    pub fn from_signals(signals: &[u32]) -> SignalResult<Self> {
        let mut set = SigSet::empty();
        for &sig in signals {
            set.add(sig)?;
        }
        Ok(set)
    }

    /// Raw bit representation
    #[inline]
    pub const fn bits(&self) -> u64 {
        self.bits
    }

    /// Add a signal (`sigaddset`)
    pub fn add(&mut self, sig: u32) -> SignalResult<()> {
        let mask = checked_mask(sig)?;
        self.bits |= mask;
        Ok(())
    }

    /// Remove a signal (`sigdelset`)
    pub fn remove(&mut self, sig: u32) -> SignalResult<()> {
        let mask = checked_mask(sig)?;
        self.bits &= !mask;
        Ok(())
    }

    /// Membership test (`sigismember`)
    pub fn is_member(&self, sig: u32) -> SignalResult<bool> {
        let mask = checked_mask(sig)?;
        Ok(self.bits & mask != 0)
    }

    /// Membership test for callers that already validated `sig`
    #[inline]
    pub const fn contains(&self, sig: u32) -> bool {
        self.bits & sig_mask(sig) != 0
    }

    /// `sigisemptyset`
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// `sigorset`
    #[inline]
    pub const fn union(&self, other: &SigSet) -> SigSet {
        SigSet { bits: self.bits | other.bits }
    }

    /// `sigandset`
    #[inline]
    pub const fn intersect(&self, other: &SigSet) -> SigSet {
        SigSet { bits: self.bits & other.bits }
    }

    /// Signals in `self` that are not in `other`
    #[inline]
    pub const fn difference(&self, other: &SigSet) -> SigSet {
        SigSet { bits: self.bits & !other.bits }
    }

    /// Same set with SIGKILL and SIGSTOP removed
    #[inline]
    pub const fn without_uncatchable(&self) -> SigSet {
        SigSet { bits: self.bits & !UNCATCHABLE_SIGNALS }
    }

    /// Only the real-time members
    #[inline]
    pub const fn realtime(&self) -> SigSet {
        SigSet { bits: self.bits & !((1u64 << SIGRTMIN) - 1) }
    }

    /// Only the standard members
    #[inline]
    pub const fn standard(&self) -> SigSet {
        SigSet { bits: self.bits & ((1u64 << SIGRTMIN) - 1) }
    }

    /// Lowest-numbered member
    #[inline]
    pub const fn lowest(&self) -> Option<u32> {
        if self.bits == 0 {
            None
        } else {
            Some(self.bits.trailing_zeros())
        }
    }

    /// Number of members
    #[inline]
    pub const fn len(&self) -> u32 {
        self.bits.count_ones()
    }

    /// Members in ascending order
    pub fn iter(&self) -> SigSetIter {
        SigSetIter { bits: self.bits }
    }

    #[inline]
    pub(crate) fn insert_unchecked(&mut self, sig: u32) {
        self.bits |= sig_mask(sig);
    }

    #[inline]
    pub(crate) fn clear_unchecked(&mut self, sig: u32) {
        self.bits &= !sig_mask(sig);
    }
}

fn checked_mask(sig: u32) -> SignalResult<u64> {
    if is_valid_signal(sig) {
        Ok(sig_mask(sig))
    } else {
        Err(SignalError::InvalidSignal(sig))
    }
}

/// Iterator over the members of a [`SigSet`]
pub struct SigSetIter {
    bits: u64,
}

impl Iterator for SigSetIter {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.bits == 0 {
            return None;
        }
        let sig = self.bits.trailing_zeros();
        self.bits &= self.bits - 1;
        Some(sig)
    }
}

impl fmt::Debug for SigSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
