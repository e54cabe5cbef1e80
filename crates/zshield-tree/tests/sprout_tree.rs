#![allow(
    missing_docs,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing,
    reason = "Tests"
)]

use incrementalmerkletree::{Hashable, Level};
use zshield_tree::{SPROUT_TREE_DEPTH, Sha256Node, SproutTree, SproutWitness};

fn node(i: u8) -> Sha256Node {
    Sha256Node::new([i; 32])
}

#[test]
fn empty_sprout_root_hashes_zero_leaves_all_the_way_up() {
    let mut expected = Sha256Node::empty_leaf();
    for level in 0..SPROUT_TREE_DEPTH {
        expected = Sha256Node::combine(Level::from(level), &expected, &expected);
    }
    assert_eq!(SproutTree::new().root(), expected);
    assert_eq!(
        Sha256Node::empty_root(Level::from(SPROUT_TREE_DEPTH)),
        expected
    );
}

#[test]
fn single_leaf_root_pairs_with_empty_subtrees() {
    let mut tree = SproutTree::new();
    tree.append(node(1)).expect("tree has room");

    let mut expected = node(1);
    for level in 0..SPROUT_TREE_DEPTH {
        let empty = Sha256Node::empty_root(Level::from(level));
        expected = Sha256Node::combine(Level::from(level), &expected, &empty);
    }
    assert_eq!(tree.root(), expected);
}

#[test]
fn sprout_witness_follows_the_tree() {
    let mut tree = SproutTree::new();
    let mut witness: Option<SproutWitness> = None;

    for i in 0..11_u8 {
        tree.append(node(i)).expect("tree has room");
        if let Some(witness) = witness.as_mut() {
            witness.append(node(i)).expect("witness has room");
            assert_eq!(witness.root(), tree.root());
        }
        if i == 4 {
            witness = Some(tree.witness());
        }
    }

    let witness = witness.expect("witness taken");
    let path = witness.path().expect("non-empty");
    assert_eq!(path.depth(), SPROUT_TREE_DEPTH);
    assert_eq!(path.position(), 4);
    assert_eq!(path.root(node(4)), tree.root());

    let mut bytes = Vec::new();
    witness.write(&mut bytes).expect("write to vec");
    let decoded = SproutWitness::read(bytes.as_slice()).expect("valid witness");
    assert_eq!(decoded, witness);
}
