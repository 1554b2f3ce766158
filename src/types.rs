//! Consensus data model: the records SCDB tracks and their canonical hashes.

use byteorder::{LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::hash::{sha256d, Hash256};

/// A BMM linking datum: one critical-hash commitment lifted from a coinbase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidechainLD {
    pub n_sidechain: u8,
    pub n_prev_block_ref: u16,
    pub hash_critical: Hash256,
}

impl SidechainLD {
    /// Canonical serialization: `n_sidechain || n_prev_block_ref (LE) || hash_critical`.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 2 + 32);
        buf.push(self.n_sidechain);
        buf.write_u16::<LittleEndian>(self.n_prev_block_ref)
            .expect("writing to a Vec cannot fail");
        buf.extend_from_slice(&self.hash_critical);
        buf
    }

    pub fn get_hash(&self) -> Hash256 {
        sha256d(&self.canonical_bytes())
    }
}

/// The work-score state of one WT^ (withdrawal bundle) within a sidechain's index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SidechainWTPrimeState {
    pub n_sidechain: u8,
    pub hash_wtprime: Hash256,
    pub n_workscore: u16,
    pub n_blocks_left: u16,
}

impl SidechainWTPrimeState {
    /// `IsNull`: every field is zero/empty.
    pub fn is_null(&self) -> bool {
        self.n_sidechain == 0
            && self.hash_wtprime == [0u8; 32]
            && self.n_workscore == 0
            && self.n_blocks_left == 0
    }

    /// Canonical serialization:
    /// `n_sidechain || hash_wtprime || n_workscore (LE) || n_blocks_left (LE)`.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 32 + 2 + 2);
        buf.push(self.n_sidechain);
        buf.extend_from_slice(&self.hash_wtprime);
        buf.write_u16::<LittleEndian>(self.n_workscore)
            .expect("writing to a Vec cannot fail");
        buf.write_u16::<LittleEndian>(self.n_blocks_left)
            .expect("writing to a Vec cannot fail");
        buf
    }

    pub fn get_hash(&self) -> Hash256 {
        sha256d(&self.canonical_bytes())
    }
}

/// A record of a host-chain output that burned coin into a sidechain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SidechainDeposit {
    pub n_sidechain: u8,
    pub key_id: [u8; 20],
    pub tx: bitcoin::Transaction,
    pub n: u32,
}

/// One sidechain's requested work-score change, as carried in a
/// [`SidechainUpdatePackage`] pushed by the network layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidechainUpdateMSG {
    pub n_sidechain: u8,
    pub hash_wtprime: Hash256,
    pub n_workscore: u16,
}

/// A pending, externally-supplied vote vector for a specific host height.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidechainUpdatePackage {
    pub n_height: i32,
    pub updates: Vec<SidechainUpdateMSG>,
}
