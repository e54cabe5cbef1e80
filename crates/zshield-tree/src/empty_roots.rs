//! Roots of empty subtrees.

use incrementalmerkletree::{Hashable, Level};

/// Roots of maximally empty subtrees for levels `0..=depth`.
///
/// Entry 0 is the uncommitted leaf; entry `d` combines two copies of entry
/// `d - 1` at level `d - 1`. Concrete node types keep one table in a
/// `LazyLock` and answer [`Hashable::empty_root`] from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyRoots<H> {
    roots: Vec<H>,
}

impl<H: Hashable + Clone> EmptyRoots<H> {
    /// Compute the table for a tree of the given depth.
    #[must_use]
    pub fn new(depth: u8) -> Self {
        let mut roots = Vec::with_capacity(usize::from(depth).saturating_add(1));
        let mut current = H::empty_leaf();
        for level in 0..depth {
            let next = H::combine(Level::from(level), &current, &current);
            roots.push(current);
            current = next;
        }
        roots.push(current);
        Self { roots }
    }

    /// The depth this table was built for.
    #[must_use]
    pub fn depth(&self) -> u8 {
        u8::try_from(self.roots.len().saturating_sub(1)).unwrap_or(u8::MAX)
    }

    /// Root of an empty subtree of height `level`, if within the table.
    #[must_use]
    pub fn get(&self, level: u8) -> Option<&H> {
        self.roots.get(usize::from(level))
    }

    /// Root of an empty subtree of height `level`.
    ///
    /// Levels beyond the table are computed on the fly.
    #[must_use]
    pub fn root(&self, level: u8) -> H {
        self.get(level)
            .cloned()
            .unwrap_or_else(|| Self::new(level).top())
    }

    fn top(mut self) -> H {
        self.roots.pop().unwrap_or_else(H::empty_leaf)
    }
}
