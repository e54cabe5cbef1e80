use incrementalmerkletree::{Hashable, Level};

/// Root of a depth-`depth` tree holding `leaves`, computed level by level
/// over the whole tree with missing leaves set to the uncommitted value.
///
/// # Panics
/// If there are more than `2^depth` leaves.
#[must_use]
#[allow(
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing,
    reason = "Test oracle over a small, bounded tree"
)]
pub fn dense_root<H: Hashable + Copy>(leaves: &[H], depth: u8) -> H {
    let width = 1_usize << depth;
    assert!(leaves.len() <= width, "too many leaves for depth {depth}");

    let mut current = leaves.to_vec();
    current.resize(width, H::empty_leaf());

    for level in 0..depth {
        current = current
            .chunks_exact(2)
            .map(|pair| H::combine(Level::from(level), &pair[0], &pair[1]))
            .collect();
    }

    current[0]
}
