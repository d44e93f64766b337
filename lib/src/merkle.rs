//! Fixed-depth Poseidon Merkle tree over identity commitments.
//!
//! The tree has `2^depth` leaf slots. Slots past the last commitment hold a
//! canonical zero leaf, and an empty subtree at level `i + 1` hashes to
//! `H(empty_i, empty_i)`. Only non-empty nodes are stored, so a registry of `n`
//! commitments costs `O(n * depth)` hashes to build, and [`MerkleTree::insert`] /
//! [`MerkleTree::update`] touch a single root path.

use ark_bn254::Fr;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::{field_to_hex, poseidon_hash, serde_field};
use crate::error::{Error, Result};

/// Tree depth used by the greeter circuit.
pub const DEFAULT_TREE_DEPTH: usize = 20;

/// Largest supported depth.
pub const MAX_TREE_DEPTH: usize = 32;

/// A Merkle inclusion proof for one leaf.
///
/// `path_indices[i]` is 0 when the running node is the left child at level `i`
/// and 1 when it is the right child; `path_elements[i]` is its sibling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProof {
    #[serde(with = "serde_field")]
    pub leaf: Fr,
    pub leaf_index: usize,
    #[serde(with = "serde_field::vec")]
    pub path_elements: Vec<Fr>,
    pub path_indices: Vec<u8>,
    #[serde(with = "serde_field")]
    pub root: Fr,
}

impl MerkleProof {
    pub fn depth(&self) -> usize {
        self.path_elements.len()
    }

    /// Recomputes the root from the leaf and the sibling path.
    pub fn recompute(&self) -> Result<Fr> {
        if self.path_elements.len() != self.path_indices.len() {
            return Err(Error::MerkleProofInconsistent(format!(
                "{} siblings but {} path indices",
                self.path_elements.len(),
                self.path_indices.len()
            )));
        }

        let mut current = self.leaf;
        for (level, (sibling, bit)) in self
            .path_elements
            .iter()
            .zip(&self.path_indices)
            .enumerate()
        {
            current = match bit {
                0 => poseidon_hash(current, *sibling)?,
                1 => poseidon_hash(*sibling, current)?,
                other => {
                    return Err(Error::MerkleProofInconsistent(format!(
                        "path index {other} at level {level} is not a bit"
                    )))
                }
            };
        }
        Ok(current)
    }

    /// Checks that the path reproduces `root`.
    ///
    /// # Errors
    /// Returns [`Error::MerkleProofInconsistent`] if the recomputed root differs.
    pub fn verify(&self) -> Result<()> {
        let recomputed = self.recompute()?;
        if recomputed != self.root {
            return Err(Error::MerkleProofInconsistent(format!(
                "path recomputes to {} but the proof claims root {}",
                field_to_hex(&recomputed),
                field_to_hex(&self.root)
            )));
        }
        Ok(())
    }
}

/// A binary Merkle tree of fixed depth.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    depth: usize,
    /// `zeros[i]` is the root of an empty subtree of height `i`.
    zeros: Vec<Fr>,
    /// `levels[0]` holds the leaves; `levels[i]` the non-empty nodes of level `i`.
    levels: Vec<Vec<Fr>>,
}

impl MerkleTree {
    /// Create an empty tree.
    ///
    /// # Arguments
    /// * `depth` - Number of levels below the root (1..=32)
    /// * `zero_leaf` - Value of unused leaf slots
    pub fn new(depth: usize, zero_leaf: Fr) -> Result<Self> {
        if depth == 0 || depth > MAX_TREE_DEPTH {
            return Err(Error::MerkleProofInconsistent(format!(
                "tree depth must be between 1 and {MAX_TREE_DEPTH}, got {depth}"
            )));
        }

        let mut zeros = Vec::with_capacity(depth + 1);
        zeros.push(zero_leaf);
        for level in 0..depth {
            let below = zeros[level];
            zeros.push(poseidon_hash(below, below)?);
        }

        Ok(Self {
            depth,
            zeros,
            levels: vec![Vec::new(); depth + 1],
        })
    }

    /// Build a tree from an ordered list of leaves in one pass.
    /// Leaf `i` of the input lands in slot `i`.
    pub fn from_leaves(depth: usize, zero_leaf: Fr, leaves: &[Fr]) -> Result<Self> {
        let mut tree = Self::new(depth, zero_leaf)?;
        tree.ensure_capacity(leaves.len())?;

        tree.levels[0] = leaves.to_vec();
        for level in 0..depth {
            let width = tree.levels[level].len().div_ceil(2);
            let mut parents = Vec::with_capacity(width);
            for index in 0..width {
                let left = tree.node(level, 2 * index);
                let right = tree.node(level, 2 * index + 1);
                parents.push(poseidon_hash(left, right)?);
            }
            tree.levels[level + 1] = parents;
        }

        debug!(depth, leaves = leaves.len(), "built merkle tree");
        Ok(tree)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of leaf slots.
    pub fn capacity(&self) -> usize {
        1usize << self.depth
    }

    /// Number of leaves inserted so far.
    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    pub fn leaves(&self) -> &[Fr] {
        &self.levels[0]
    }

    pub fn root(&self) -> Fr {
        self.node(self.depth, 0)
    }

    /// Append a leaf and return its index.
    pub fn insert(&mut self, leaf: Fr) -> Result<usize> {
        let index = self.len();
        self.ensure_capacity(index + 1)?;
        self.levels[0].push(leaf);
        self.refresh_path(index)?;
        Ok(index)
    }

    /// Replace the leaf at `index`.
    pub fn update(&mut self, index: usize, leaf: Fr) -> Result<()> {
        let slot = self.levels[0].get_mut(index).ok_or_else(|| {
            Error::MerkleProofInconsistent(format!("no leaf at index {index}"))
        })?;
        *slot = leaf;
        self.refresh_path(index)
    }

    /// Index of the first leaf equal to `leaf`.
    pub fn index_of(&self, leaf: &Fr) -> Option<usize> {
        self.levels[0].iter().position(|candidate| candidate == leaf)
    }

    /// Generate an inclusion proof for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Result<MerkleProof> {
        let leaf = *self.levels[0].get(index).ok_or_else(|| {
            Error::MerkleProofInconsistent(format!("no leaf at index {index}"))
        })?;

        let mut path_elements = Vec::with_capacity(self.depth);
        let mut path_indices = Vec::with_capacity(self.depth);
        let mut position = index;
        for level in 0..self.depth {
            path_elements.push(self.node(level, position ^ 1));
            path_indices.push((position & 1) as u8);
            position >>= 1;
        }

        Ok(MerkleProof {
            leaf,
            leaf_index: index,
            path_elements,
            path_indices,
            root: self.root(),
        })
    }

    fn node(&self, level: usize, index: usize) -> Fr {
        self.levels[level]
            .get(index)
            .copied()
            .unwrap_or(self.zeros[level])
    }

    fn ensure_capacity(&self, leaves: usize) -> Result<()> {
        if leaves > self.capacity() {
            return Err(Error::MerkleProofInconsistent(format!(
                "{leaves} leaves do not fit a tree of depth {} (capacity {})",
                self.depth,
                self.capacity()
            )));
        }
        Ok(())
    }

    /// Rehash the ancestors of leaf `index` after it changed.
    fn refresh_path(&mut self, index: usize) -> Result<()> {
        let mut position = index;
        for level in 0..self.depth {
            let left = self.node(level, position & !1);
            let right = self.node(level, position | 1);
            let parent = poseidon_hash(left, right)?;
            position >>= 1;

            let row = &mut self.levels[level + 1];
            if position < row.len() {
                row[position] = parent;
            } else {
                row.push(parent);
            }
        }
        Ok(())
    }
}

/// Build the inclusion proof of `target` in the tree holding `commitments`.
///
/// The first occurrence of `target` is proven if the registry contains duplicates.
///
/// # Errors
/// * [`Error::IdentityNotRegistered`] if `target` is absent
/// * [`Error::MerkleProofInconsistent`] if the registry exceeds `2^depth` leaves
pub fn build_merkle_proof(
    depth: usize,
    zero_leaf: Fr,
    commitments: &[Fr],
    target: Fr,
) -> Result<MerkleProof> {
    let index = commitments
        .iter()
        .position(|commitment| *commitment == target)
        .ok_or_else(|| Error::IdentityNotRegistered(field_to_hex(&target)))?;

    let tree = MerkleTree::from_leaves(depth, zero_leaf, commitments)?;
    tree.proof(index)
}
