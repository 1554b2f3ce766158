//! 256-bit hash type and the Merkle tree used to commit SCDB state.

use sha2::{Digest, Sha256};

pub type Hash256 = [u8; 32];

pub const NULL_HASH: Hash256 = [0u8; 32];

pub fn is_null(hash: &Hash256) -> bool {
    hash == &NULL_HASH
}

/// Double-SHA256, matching the host chain's hashing convention for commitments.
pub fn sha256d(data: &[u8]) -> Hash256 {
    let once = Sha256::digest(data);
    let twice = Sha256::digest(once);
    twice.into()
}

/// Computes a Merkle root over `leaves` using the host chain's transaction-Merkle-tree
/// convention: repeated double-SHA256 of adjacent pairs, duplicating the last leaf when
/// the level has an odd count.
///
/// An empty `leaves` yields the null hash, by the convention used elsewhere for "no
/// state to commit to".
pub fn compute_merkle_root(leaves: &[Hash256]) -> Hash256 {
    if leaves.is_empty() {
        return NULL_HASH;
    }
    let mut level: Vec<Hash256> = leaves.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = *level.last().unwrap();
            level.push(last);
        }
        level = level
            .chunks_exact(2)
            .map(|pair| {
                let mut buf = [0u8; 64];
                buf[..32].copy_from_slice(&pair[0]);
                buf[32..].copy_from_slice(&pair[1]);
                sha256d(&buf)
            })
            .collect();
    }
    level[0]
}
