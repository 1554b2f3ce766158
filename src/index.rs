//! Per-sidechain WT^ index: the bounded set of withdrawal bundles a sidechain's miners
//! are currently voting work score onto.

use hashlink::LinkedHashMap;

use crate::hash::Hash256;
use crate::params::SIDECHAIN_MAX_WT;
use crate::types::SidechainWTPrimeState;

/// Insertion-ordered, capacity-bounded map from `hash_wtprime` to its work-score state.
///
/// Order is preserved across upserts: re-inserting a known `hash_wtprime` updates its
/// state in place without moving it to the back, matching the ratchet-like way the
/// source implementation's `std::map`-backed index keeps WT^ entries stable across
/// votes for the length of a verification period.
#[derive(Clone, Debug, Default)]
pub struct SCDBIndex {
    members: LinkedHashMap<Hash256, SidechainWTPrimeState>,
}

impl SCDBIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= SIDECHAIN_MAX_WT
    }

    pub fn is_populated(&self) -> bool {
        !self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get_member(&self, hash_wtprime: &Hash256) -> Option<&SidechainWTPrimeState> {
        self.members.get(hash_wtprime)
    }

    pub fn members(&self) -> impl Iterator<Item = &SidechainWTPrimeState> {
        self.members.values()
    }

    /// Upserts `state` by its `hash_wtprime`. Returns `false` without inserting if the
    /// index is full and `hash_wtprime` does not already name a tracked member.
    pub fn insert_member(&mut self, state: SidechainWTPrimeState) -> bool {
        if !self.members.contains_key(&state.hash_wtprime) && self.is_full() {
            return false;
        }
        if let Some(existing) = self.members.get_mut(&state.hash_wtprime) {
            *existing = state;
        } else {
            self.members.insert(state.hash_wtprime, state);
        }
        true
    }

    pub fn clear_members(&mut self) {
        self.members.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(hash_wtprime: Hash256, n_workscore: u16) -> SidechainWTPrimeState {
        SidechainWTPrimeState {
            n_sidechain: 0,
            hash_wtprime,
            n_workscore,
            n_blocks_left: 100,
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let mut index = SCDBIndex::new();
        assert!(index.insert_member(state([1u8; 32], 1)));
        assert_eq!(index.get_member(&[1u8; 32]).unwrap().n_workscore, 1);
    }

    #[test]
    fn upsert_updates_in_place_without_growing() {
        let mut index = SCDBIndex::new();
        index.insert_member(state([1u8; 32], 1));
        index.insert_member(state([1u8; 32], 2));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get_member(&[1u8; 32]).unwrap().n_workscore, 2);
    }

    #[test]
    fn rejects_new_member_once_full() {
        let mut index = SCDBIndex::new();
        for i in 0..SIDECHAIN_MAX_WT {
            assert!(index.insert_member(state([i as u8; 32], 0)));
        }
        assert!(index.is_full());
        assert!(!index.insert_member(state([0xffu8; 32], 0)));
    }

    #[test]
    fn full_index_still_accepts_upserts_of_existing_members() {
        let mut index = SCDBIndex::new();
        for i in 0..SIDECHAIN_MAX_WT {
            index.insert_member(state([i as u8; 32], 0));
        }
        assert!(index.insert_member(state([0u8; 32], 5)));
        assert_eq!(index.get_member(&[0u8; 32]).unwrap().n_workscore, 5);
    }

    #[test]
    fn clear_members_empties_the_index() {
        let mut index = SCDBIndex::new();
        index.insert_member(state([1u8; 32], 1));
        index.clear_members();
        assert!(!index.is_populated());
    }
}
