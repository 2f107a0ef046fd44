//! Movement tags.
//!
//! A fixed-width bitmask replaces string-keyed gameplay tags. The core only
//! needs membership, "has all of" and "has any of".

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Set of movement tags stored as a 32-bit mask.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(u32);

impl TagSet {
    /// No tags.
    pub const EMPTY: Self = Self(0);

    /// Actor is using the sprint parameter set.
    pub const SPRINTING: Self = Self(1 << 0);

    /// Actor is crouched.
    pub const CROUCHING: Self = Self(1 << 1);

    /// Walking proposes zero speed while set.
    pub const STOP_MOVEMENT: Self = Self(1 << 2);

    /// Every mode and layered move proposes a zero move while set.
    pub const MOVEMENT_DISABLED: Self = Self(1 << 3);

    /// Jumps add the extra vertical impulse while set.
    pub const EXTRA_JUMP_IMPULSE: Self = Self(1 << 4);

    /// First bit free for host-defined tags.
    pub const FIRST_CUSTOM_BIT: u32 = 16;

    /// Creates a set from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Host-defined tag number `index` (0-based, above the built-ins).
    ///
    /// Returns `None` when the index does not fit in the mask.
    #[must_use]
    pub const fn custom(index: u32) -> Option<Self> {
        let bit = Self::FIRST_CUSTOM_BIT + index;
        if bit >= 32 {
            None
        } else {
            Some(Self(1 << bit))
        }
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when no tag is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every tag of `other` is present. An empty `other` always matches.
    #[must_use]
    pub const fn has_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when at least one tag of `other` is present. An empty `other` never matches.
    #[must_use]
    pub const fn has_any(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Alias of [`TagSet::has_all`] for single tags.
    #[must_use]
    pub const fn contains(self, tag: Self) -> bool {
        self.has_all(tag)
    }

    /// Tags in either set.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Tags in both sets.
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Adds `tag`.
    pub fn insert(&mut self, tag: Self) {
        self.0 |= tag.0;
    }

    /// Removes `tag`.
    pub fn remove(&mut self, tag: Self) {
        self.0 &= !tag.0;
    }

    /// Adds or removes `tag`.
    pub fn set(&mut self, tag: Self, enabled: bool) {
        if enabled {
            self.insert(tag);
        } else {
            self.remove(tag);
        }
    }

    /// Standard required/blocked gate: all of `required`, none of `blocked`.
    #[must_use]
    pub const fn passes(self, required: Self, blocked: Self) -> bool {
        self.has_all(required) && !self.has_any(blocked)
    }
}

impl std::ops::BitOr for TagSet {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership() {
        let tags = TagSet::SPRINTING | TagSet::CROUCHING;
        assert!(tags.contains(TagSet::SPRINTING));
        assert!(tags.has_all(TagSet::SPRINTING | TagSet::CROUCHING));
        assert!(!tags.has_all(TagSet::SPRINTING | TagSet::STOP_MOVEMENT));
        assert!(tags.has_any(TagSet::STOP_MOVEMENT | TagSet::CROUCHING));
        assert_eq!(tags.intersection(TagSet::CROUCHING), TagSet::CROUCHING);
    }

    #[test]
    fn test_empty_set_semantics() {
        let tags = TagSet::SPRINTING;
        assert!(tags.has_all(TagSet::EMPTY));
        assert!(!tags.has_any(TagSet::EMPTY));
        assert!(tags.passes(TagSet::EMPTY, TagSet::EMPTY));
        assert!(!tags.passes(TagSet::EMPTY, TagSet::SPRINTING));
    }

    #[test]
    fn test_insert_remove() {
        let mut tags = TagSet::EMPTY;
        tags.insert(TagSet::STOP_MOVEMENT);
        assert!(tags.contains(TagSet::STOP_MOVEMENT));
        tags.set(TagSet::STOP_MOVEMENT, false);
        assert!(tags.is_empty());
    }

    #[test]
    fn test_custom_tags() {
        let first = TagSet::custom(0).unwrap_or_default();
        assert_eq!(first.bits(), 1 << 16);
        assert!(TagSet::custom(15).is_some());
        assert!(TagSet::custom(16).is_none());
    }
}
