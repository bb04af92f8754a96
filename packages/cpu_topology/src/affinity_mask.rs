use std::iter;

use derive_more::derive::Display;

use crate::{ProcessorGroup, ProcessorNumber};

/// The set of logical processors, scoped to one processor group, that share a hardware
/// relationship (same core, same package or same NUMA node).
///
/// Bit `i` set in the mask means logical processor `i` of the group belongs to the relationship.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[display("{mask:#x} in group {group}")]
pub struct AffinityMask {
    // The platform uses a native word here, so on 32-bit targets only the low half is ever set.
    mask: u64,
    group: ProcessorGroup,
}

impl AffinityMask {
    /// Creates a mask from its raw components.
    #[must_use]
    pub const fn from_components(mask: u64, group: ProcessorGroup) -> Self {
        Self { mask, group }
    }

    /// The raw bitmask.
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.mask
    }

    /// The processor group the mask is scoped to.
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    #[must_use]
    pub const fn group(&self) -> ProcessorGroup {
        self.group
    }

    /// Whether the logical processor with the given number in the given group is in the mask.
    ///
    /// A processor in a different group is never contained, whatever its number.
    #[must_use]
    pub fn contains(&self, group: ProcessorGroup, number: ProcessorNumber) -> bool {
        self.group == group && self.contains_by_number_in_group(number)
    }

    /// Whether the bit for the given processor number is set, ignoring groups.
    ///
    /// Numbers beyond the width of the mask are never contained.
    #[must_use]
    pub fn contains_by_number_in_group(&self, number: ProcessorNumber) -> bool {
        1_u64
            .checked_shl(u32::from(number))
            .is_some_and(|bit| self.mask & bit != 0)
    }

    /// Number of logical processors in the mask.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.mask.count_ones() as usize
    }

    /// Whether the mask has no bits set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// The lowest processor number in the mask, if any.
    #[must_use]
    pub fn first(&self) -> Option<ProcessorNumber> {
        self.processor_numbers().next()
    }

    /// Iterates over the processor numbers in the mask, in ascending order.
    pub fn processor_numbers(&self) -> impl Iterator<Item = ProcessorNumber> + use<> {
        let mut remaining = self.mask;

        iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }

            let number = remaining.trailing_zeros();

            // Clears the lowest set bit.
            remaining &= remaining.wrapping_sub(1);

            // trailing_zeros() of a non-zero u64 is at most 63.
            ProcessorNumber::try_from(number).ok()
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn smoke_test() {
        let mask = AffinityMask::from_components((1 << 0) | (1 << 3) | (1 << 7), 2);

        assert_eq!(mask.value(), 0b1000_1001);
        assert_eq!(mask.group(), 2);
        assert_eq!(mask.len(), 3);
        assert!(!mask.is_empty());
        assert_eq!(mask.first(), Some(0));
    }

    #[test]
    fn contains_by_number_in_group() {
        let mask = AffinityMask::from_components((1 << 0) | (1 << 3) | (1 << 7), 0);

        assert!(mask.contains_by_number_in_group(0));
        assert!(mask.contains_by_number_in_group(3));
        assert!(mask.contains_by_number_in_group(7));

        assert!(!mask.contains_by_number_in_group(1));
        assert!(!mask.contains_by_number_in_group(2));
        assert!(!mask.contains_by_number_in_group(4));
        assert!(!mask.contains_by_number_in_group(8));

        // Beyond the width of the mask.
        assert!(!mask.contains_by_number_in_group(64));
        assert!(!mask.contains_by_number_in_group(200));
    }

    #[test]
    fn contains_requires_matching_group() {
        let mask = AffinityMask::from_components(0b11, 1);

        assert!(mask.contains(1, 0));
        assert!(mask.contains(1, 1));
        assert!(!mask.contains(0, 0));
        assert!(!mask.contains(2, 1));
    }

    #[test]
    fn processor_numbers_ascending() {
        let mask = AffinityMask::from_components((1 << 63) | (1 << 5) | (1 << 1), 0);

        assert_eq!(mask.processor_numbers().collect::<Vec<_>>(), vec![1, 5, 63]);
    }

    #[test]
    fn empty_mask() {
        let mask = AffinityMask::from_components(0, 0);

        assert!(mask.is_empty());
        assert_eq!(mask.len(), 0);
        assert_eq!(mask.first(), None);
        assert_eq!(mask.processor_numbers().count(), 0);
    }

    #[test]
    fn full_mask() {
        let mask = AffinityMask::from_components(u64::MAX, 0);

        assert_eq!(mask.len(), 64);
        assert_eq!(
            mask.processor_numbers().collect::<Vec<_>>(),
            (0..64_u8).collect::<Vec<_>>()
        );
    }

    #[test]
    fn display() {
        let mask = AffinityMask::from_components(0xf0, 3);

        assert_eq!(mask.to_string(), "0xf0 in group 3");
    }
}
