#![allow(
    missing_docs,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing,
    reason = "Tests"
)]

use test_utils::{TestNode, dense_root, leaf};
use zshield_tree::{IncrementalMerkleTree, IncrementalWitness, MerklePath, TreeError};

type ToyTree = IncrementalMerkleTree<TestNode, 4>;
type ToyWitness = IncrementalWitness<TestNode, 4>;

fn labelled_leaves(count: usize) -> Vec<TestNode> {
    (0..count).map(|i| leaf!(format!("leaf-{i}"))).collect()
}

#[test]
fn witness_follows_global_tree_for_every_position() {
    let all = labelled_leaves(16);

    for witnessed in 0..all.len() {
        let mut tree = ToyTree::new();
        for node in &all[..=witnessed] {
            tree.append(*node).expect("tree has room");
        }
        let mut witness = tree.witness();
        assert_eq!(witness.element().expect("non-empty"), all[witnessed]);

        for (appended, node) in all.iter().enumerate().skip(witnessed + 1) {
            tree.append(*node).expect("tree has room");
            witness.append(*node).expect("witness has room");

            let oracle = dense_root(&all[..=appended], 4);
            assert_eq!(tree.root(), oracle);
            assert_eq!(witness.root(), oracle, "witness {witnessed} after {appended}");

            let path = witness.path().expect("non-empty");
            assert_eq!(path.position(), u64::try_from(witnessed).expect("small"));
            assert_eq!(path.root(witness.element().expect("non-empty")), oracle);
        }
    }
}

#[test]
fn several_witnesses_fed_in_lockstep() {
    let all = labelled_leaves(12);
    let mut tree = ToyTree::new();
    let mut witnesses: Vec<ToyWitness> = Vec::new();

    for (i, node) in all.iter().enumerate() {
        tree.append(*node).expect("tree has room");
        for witness in &mut witnesses {
            witness.append(*node).expect("witness has room");
        }
        if i % 3 == 0 {
            witnesses.push(tree.witness());
        }
    }

    for witness in &witnesses {
        assert_eq!(witness.root(), tree.root());
        let position = witness.position().expect("non-empty");
        assert_eq!(witness.element().expect("non-empty"), all[usize::try_from(position).expect("small")]);
    }
}

#[test]
fn witness_roundtrips_mid_cursor() {
    let all = labelled_leaves(11);
    let mut tree = ToyTree::new();
    tree.append(all[0]).expect("tree has room");
    let mut witness = tree.witness();

    for node in &all[1..] {
        tree.append(*node).expect("tree has room");
        witness.append(*node).expect("witness has room");

        let mut bytes = Vec::new();
        witness.write(&mut bytes).expect("write to vec");
        let decoded = ToyWitness::read(bytes.as_slice()).expect("reachable state decodes");
        assert_eq!(decoded, witness);
        assert_eq!(decoded.cursor_depth(), witness.cursor_depth());
        assert_eq!(decoded.root(), tree.root());
    }
}

#[test]
fn path_bytes_roundtrip_and_verify() {
    let all = labelled_leaves(9);
    let mut tree = ToyTree::new();
    for node in &all[..6] {
        tree.append(*node).expect("tree has room");
    }
    let mut witness = tree.witness();
    for node in &all[6..] {
        tree.append(*node).expect("tree has room");
        witness.append(*node).expect("witness has room");
    }

    let path = witness.path().expect("non-empty");
    let bytes = path.to_bytes();
    // Position 5 over four levels packs into one byte.
    assert_eq!(bytes[bytes.len() - 1], 0b0101);

    let decoded = MerklePath::<TestNode>::from_bytes(&bytes).expect("valid path");
    assert_eq!(decoded, path);
    assert_eq!(decoded.root(all[5]), tree.root());
}

#[test]
fn witness_reports_capacity() {
    let all = labelled_leaves(16);
    let mut tree = ToyTree::new();
    for node in &all[..14] {
        tree.append(*node).expect("tree has room");
    }
    let mut witness = tree.witness();
    witness.append(all[14]).expect("witness has room");
    witness.append(all[15]).expect("witness has room");
    assert!(matches!(
        witness.append(leaf!("overflow")),
        Err(TreeError::CapacityExceeded { depth: 4 })
    ));
}
