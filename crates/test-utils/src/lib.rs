//! Shared test utilities for the workspace.

mod dense;
mod keys;
mod node;

pub use dense::dense_root;
pub use keys::{TestAccount, test_note};
pub use node::TestNode;

/// Helper macro to create a leaf hash from a label.
///
/// Returns a [`TestNode`] holding `SHA256(label)`.
#[macro_export]
macro_rules! leaf {
    ($label:expr) => {{ $crate::TestNode::digest($label.as_bytes()) }};
}

/// Helper macro to create a vector of leaf hashes from labels.
#[macro_export]
macro_rules! leaves {
    ($($label:expr),* $(,)?) => {{
        vec![$( $crate::leaf!($label) ),*]
    }};
}
