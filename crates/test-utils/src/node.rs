use incrementalmerkletree::{Hashable, Level};
use sha2::{Digest as _, Sha256};
use zshield_tree::TreeNode;

/// A node whose parent is `SHA256(left || right || level)`.
///
/// The level is a single byte. The uncommitted leaf is all zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TestNode(pub [u8; 32]);

impl TestNode {
    /// `SHA256(data)` as a node.
    #[must_use]
    pub fn digest(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }
}

impl Hashable for TestNode {
    fn empty_leaf() -> Self {
        Self([0_u8; 32])
    }

    fn combine(level: Level, a: &Self, b: &Self) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(a.0);
        hasher.update(b.0);
        hasher.update([u8::from(level)]);
        Self(hasher.finalize().into())
    }
}

impl TreeNode for TestNode {
    fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    fn from_bytes(bytes: [u8; 32]) -> Option<Self> {
        Some(Self(bytes))
    }
}
