// This module encapsulates the bitflags API
// so that we don't leak details that may
// affect semver later on.

use bitflags::bitflags;

bitflags! {
    #[repr(transparent)]
    #[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
    struct NodeBitFlags: u32 {
        const IS_SAMPLE = 1;
        const IS_RECOMBINATION = 1 << 1;
        const IS_NON_COALESCING = 1 << 2;
    }
}

/// Flags stored in the node table.
///
/// A node with no flags set is an ordinary coalescence:
/// at least one of the intervals merged into it had
/// two contributing lineages.
#[repr(transparent)]
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeFlags(NodeBitFlags);

impl NodeFlags {
    pub fn sample() -> Self {
        Self(NodeBitFlags::IS_SAMPLE)
    }

    pub fn recombination() -> Self {
        Self(NodeBitFlags::IS_RECOMBINATION)
    }

    /// A common ancestor in which no interval was
    /// inherited by more than one child.
    pub fn non_coalescing() -> Self {
        Self(NodeBitFlags::IS_NON_COALESCING)
    }

    pub fn coalescence() -> Self {
        Self(NodeBitFlags::empty())
    }

    pub fn is_sample(&self) -> bool {
        self.0.contains(NodeBitFlags::IS_SAMPLE)
    }

    pub fn is_recombination(&self) -> bool {
        self.0.contains(NodeBitFlags::IS_RECOMBINATION)
    }

    pub fn is_non_coalescing(&self) -> bool {
        self.0.contains(NodeBitFlags::IS_NON_COALESCING)
    }

    pub fn is_coalescence(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw bit mask, as written to a node table.
    pub fn bits(&self) -> u32 {
        self.0.bits()
    }

    /// Returns `None` if any unknown bit is set.
    pub fn from_bits(bits: u32) -> Option<Self> {
        NodeBitFlags::from_bits(bits).map(Self)
    }
}
