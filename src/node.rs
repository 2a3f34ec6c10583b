const TERMINAL: u32 = 1 << 31;
const LINK: u32 = 1 << 31;
const MASK: u32 = 0x7FFF_FFFF;

/// Check value of free cells and of the root. No real parent has this index.
pub(crate) const NO_PARENT: u32 = MASK;

/// Largest number of cells a double array may hold.
pub(crate) const MAX_CELLS: usize = MASK as usize;

/// A cell in a double-array layer.
///
/// Each node is exactly 8 bytes (`#[repr(C)]`):
/// - `base`: 31-bit XOR offset for children | TERMINAL flag (MSB)
/// - `check`: 31-bit parent index | LINK flag (MSB)
///
/// A child of `p` reached by label code `c` lives at `p.base() ^ c` and is
/// valid iff its `check()` equals `p`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Node {
    base: u32,
    check: u32,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            base: 0,
            check: NO_PARENT,
        }
    }
}

impl Node {
    /// Returns the base value (XOR offset), masking out the TERMINAL flag.
    #[inline]
    pub fn base(&self) -> u32 {
        self.base & MASK
    }

    /// Returns the check value (parent index), masking out the LINK flag.
    #[inline]
    pub fn check(&self) -> u32 {
        self.check & MASK
    }

    /// Returns true if a key ends at this node.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.base & TERMINAL != 0
    }

    /// Returns true if the edge into this node continues in a link.
    #[inline]
    pub fn has_link(&self) -> bool {
        self.check & LINK != 0
    }

    /// Returns true if this cell is not a node (free cell).
    #[inline]
    pub fn is_free(&self) -> bool {
        self.check() == NO_PARENT
    }

    /// Rebuilds a cell from its two stored words, flags included.
    #[inline]
    pub(crate) fn from_raw(base: u32, check: u32) -> Self {
        Self { base, check }
    }

    /// The two stored words, flags included.
    #[inline]
    pub(crate) fn to_raw(self) -> (u32, u32) {
        (self.base, self.check)
    }

    #[inline]
    pub(crate) fn set_base(&mut self, base: u32) {
        debug_assert!(base & TERMINAL == 0, "base value must fit in 31 bits");
        self.base = (self.base & TERMINAL) | base;
    }

    #[inline]
    pub(crate) fn set_check(&mut self, check: u32) {
        debug_assert!(check & LINK == 0, "check value must fit in 31 bits");
        self.check = (self.check & LINK) | check;
    }

    #[inline]
    pub(crate) fn set_terminal(&mut self) {
        self.base |= TERMINAL;
    }

    #[inline]
    pub(crate) fn set_link(&mut self) {
        self.check |= LINK;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn node_size_is_8_bytes() {
        assert_eq!(mem::size_of::<Node>(), 8);
        assert_eq!(mem::align_of::<Node>(), 4);
    }

    #[test]
    fn default_node_is_free() {
        let n = Node::default();
        assert_eq!(n.base(), 0);
        assert_eq!(n.check(), NO_PARENT);
        assert!(n.is_free());
        assert!(!n.is_terminal());
        assert!(!n.has_link());
    }

    #[test]
    fn base_preserves_terminal_flag() {
        let mut n = Node::default();
        n.set_terminal();
        n.set_base(999);
        assert!(n.is_terminal());
        assert_eq!(n.base(), 999);
    }

    #[test]
    fn check_preserves_link_flag() {
        let mut n = Node::default();
        n.set_link();
        n.set_check(200);
        assert!(n.has_link());
        assert!(!n.is_free());
        assert_eq!(n.check(), 200);
    }

    #[test]
    fn flags_are_independent() {
        let mut n = Node::default();
        n.set_check(5);
        n.set_terminal();
        assert!(n.is_terminal());
        assert!(!n.has_link());
        n.set_link();
        assert!(n.is_terminal());
        assert!(n.has_link());
        assert_eq!(n.check(), 5);
    }

    #[test]
    fn max_values() {
        let mut n = Node::default();
        n.set_base(MASK);
        assert_eq!(n.base(), MASK);
        n.set_check(MASK - 1);
        assert_eq!(n.check(), MASK - 1);
    }
}
