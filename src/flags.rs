use std::fmt;
use std::ops::BitOr;

/// Creation flags for a menu item.
///
/// Combine with `|`: `ItemFlags::CHECKABLE | ItemFlags::CHECKED`.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemFlags(u8);

impl ItemFlags {
    /// A plain, enabled, unchecked item.
    pub const NONE: ItemFlags = ItemFlags(0);
    /// The item is a decorative separator bar.
    pub const SEPARATOR: ItemFlags = ItemFlags(1 << 0);
    /// The item starts with a check mark. Requires `CHECKABLE`.
    pub const CHECKED: ItemFlags = ItemFlags(1 << 1);
    /// The item can carry a check mark.
    pub const CHECKABLE: ItemFlags = ItemFlags(1 << 2);
    /// The item starts grayed out and ignores clicks.
    pub const DISABLED: ItemFlags = ItemFlags(1 << 3);

    pub fn contains(self, other: ItemFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Resolves conflicting flag combinations: a separator drops every other
    /// flag, and `CHECKED` drops out unless `CHECKABLE` is present.
    pub(crate) fn normalized(self) -> ItemFlags {
        if self.contains(Self::SEPARATOR) {
            Self::SEPARATOR
        } else if !self.contains(Self::CHECKABLE) {
            ItemFlags(self.0 & !Self::CHECKED.0)
        } else {
            self
        }
    }
}

impl BitOr for ItemFlags {
    type Output = ItemFlags;

    fn bitor(self, rhs: ItemFlags) -> ItemFlags {
        ItemFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for ItemFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::SEPARATOR) {
            names.push("SEPARATOR");
        }
        if self.contains(Self::CHECKED) {
            names.push("CHECKED");
        }
        if self.contains(Self::CHECKABLE) {
            names.push("CHECKABLE");
        }
        if self.contains(Self::DISABLED) {
            names.push("DISABLED");
        }
        if names.is_empty() {
            names.push("NONE");
        }
        write!(f, "ItemFlags({})", names.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_drops_other_flags() {
        let flags = ItemFlags::SEPARATOR | ItemFlags::CHECKABLE | ItemFlags::CHECKED;
        let normalized = flags.normalized();
        assert_eq!(normalized, ItemFlags::SEPARATOR);
        assert!(!normalized.contains(ItemFlags::CHECKABLE));
        assert!(!normalized.contains(ItemFlags::CHECKED));
    }

    #[test]
    fn checked_requires_checkable() {
        let normalized = ItemFlags::CHECKED.normalized();
        assert!(!normalized.contains(ItemFlags::CHECKED));

        let normalized = (ItemFlags::CHECKABLE | ItemFlags::CHECKED).normalized();
        assert!(normalized.contains(ItemFlags::CHECKED));
    }

    #[test]
    fn disabled_survives_normalization() {
        let normalized = (ItemFlags::DISABLED | ItemFlags::CHECKED).normalized();
        assert!(normalized.contains(ItemFlags::DISABLED));
        assert!(!normalized.contains(ItemFlags::CHECKED));
    }
}
