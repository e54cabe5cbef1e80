#![allow(
    missing_docs,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing,
    reason = "Tests"
)]

use incrementalmerkletree::{Hashable, Level};
use test_utils::TestAccount;
use zshield_tree::{SAPLING_TREE_DEPTH, SaplingNode, SaplingTree, SaplingWitness, TreeNode};

fn commitments(count: u8) -> Vec<SaplingNode> {
    let account = TestAccount::new(7);
    (0..count)
        .map(|i| {
            let note = account.note(1_000 * u64::from(i) + 1, i);
            SaplingNode::from_cmu(&note.cmu()).expect("cmu is a canonical scalar")
        })
        .collect()
}

#[test]
fn empty_sapling_root_matches_upstream() {
    let ours = SaplingTree::new().root();
    let upstream = sapling::Node::empty_root(Level::from(SAPLING_TREE_DEPTH));
    assert_eq!(ours.to_sapling(), Some(upstream));
}

#[test]
fn witness_path_converts_for_the_prover() {
    let leaves = commitments(6);
    let mut tree = SaplingTree::new();
    let mut witness: Option<SaplingWitness> = None;

    for (i, cmu) in leaves.iter().enumerate() {
        tree.append(*cmu).expect("tree has room");
        if let Some(witness) = witness.as_mut() {
            witness.append(*cmu).expect("witness has room");
        }
        if i == 2 {
            witness = Some(tree.witness());
        }
    }

    let witness = witness.expect("witness taken");
    assert_eq!(witness.root(), tree.root());

    let path = witness.path().expect("non-empty");
    let converted = path.to_sapling().expect("full depth path");
    assert_eq!(u64::from(converted.position()), 2);

    let leaf = leaves[2].to_sapling().expect("valid node");
    let anchor = tree.root().to_sapling().expect("valid node");
    assert_eq!(converted.root(leaf), anchor);
}

#[test]
fn sapling_witness_roundtrips() {
    let mut tree = SaplingTree::new();
    let leaves = commitments(3);
    tree.append(leaves[0]).expect("tree has room");
    let mut witness = tree.witness();
    for cmu in &leaves[1..] {
        tree.append(*cmu).expect("tree has room");
        witness.append(*cmu).expect("witness has room");
    }

    let mut bytes = Vec::new();
    witness.write(&mut bytes).expect("write to vec");
    let decoded = SaplingWitness::read(bytes.as_slice()).expect("valid witness");
    assert_eq!(decoded.root(), tree.root());
    assert_eq!(decoded.root().to_bytes(), tree.root().to_bytes());
}
