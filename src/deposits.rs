//! Deposit cache: recognizes and retains burn/payload output pairs that register a
//! coin burn into a sidechain.

use bitcoin::Transaction;

use crate::script::{recognize_script, ScriptClass};
use crate::types::SidechainDeposit;

/// Per-sidechain bounded history of recognized deposits, deduplicated by full equality
/// so a transaction re-seen across a reorg is never double-counted.
#[derive(Clone, Debug, Default)]
pub struct DepositCache {
    deposits: Vec<SidechainDeposit>,
}

impl DepositCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_deposits(&self, n_sidechain: u8) -> impl Iterator<Item = &SidechainDeposit> {
        self.deposits
            .iter()
            .filter(move |d| d.n_sidechain == n_sidechain)
    }

    /// Scans all of `tx`'s outputs, binding fields onto a single accumulator rather
    /// than requiring a burn output and its payload to be adjacent: a `DepositBurn`
    /// output sets the deposit's output index, and a `DepositPayload` output sets its
    /// sidechain and key id, wherever in the transaction either appears. A payload
    /// carrying the null (all-zero) key id is ignored, same as the source. The
    /// deposit is recorded only if some payload output was seen (binding `tx` onto
    /// the accumulator), and only if an equal one isn't already cached.
    pub fn add_deposits(&mut self, tx: &Transaction) {
        let mut n_sidechain = None;
        let mut key_id = None;
        let mut n = None;
        let mut bound_tx = None;

        for (i, output) in tx.output.iter().enumerate() {
            match recognize_script(output.script_pubkey.as_bytes()) {
                ScriptClass::DepositBurn => {
                    n = Some(i as u32);
                }
                ScriptClass::DepositPayload {
                    n_sidechain: sc,
                    key_id: kid,
                } => {
                    if kid != [0u8; 20] && verify_deposit_key_id(&kid) {
                        n_sidechain = Some(sc);
                        key_id = Some(kid);
                        bound_tx = Some(tx.clone());
                    }
                }
                _ => {}
            }
        }

        let (Some(n_sidechain), Some(key_id), Some(bound_tx)) = (n_sidechain, key_id, bound_tx) else {
            return;
        };
        let deposit = SidechainDeposit {
            n_sidechain,
            key_id,
            tx: bound_tx,
            n: n.unwrap_or_default(),
        };
        if !self.deposits.contains(&deposit) {
            self.deposits.push(deposit);
        }
    }

    pub fn reset(&mut self) {
        self.deposits.clear();
    }
}

/// Placeholder hook for validating a deposit's `key_id` against a sidechain's own
/// address format. The host chain cannot interpret sidechain-specific key encodings, so
/// this always accepts; a sidechain-aware caller may substitute real validation.
pub fn verify_deposit_key_id(_key_id: &[u8; 20]) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::test_scripts;
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, TxIn, TxOut, Witness};

    fn tx_with_outputs(scripts: Vec<Vec<u8>>) -> Transaction {
        Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: scripts
                .into_iter()
                .map(|script| TxOut {
                    value: Amount::ZERO,
                    script_pubkey: ScriptBuf::from_bytes(script),
                })
                .collect(),
        }
    }

    #[test]
    fn recognizes_burn_payload_pair() {
        let key_id = [3u8; 20];
        let tx = tx_with_outputs(vec![
            test_scripts::deposit_burn(1),
            test_scripts::deposit_payload(1, key_id),
        ]);
        let mut cache = DepositCache::new();
        cache.add_deposits(&tx);
        let found: Vec<_> = cache.get_deposits(1).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key_id, key_id);
    }

    #[test]
    fn ignores_burn_without_any_payload() {
        let tx = tx_with_outputs(vec![test_scripts::deposit_burn(1)]);
        let mut cache = DepositCache::new();
        cache.add_deposits(&tx);
        assert_eq!(cache.get_deposits(1).count(), 0);
    }

    #[test]
    fn burn_and_payload_need_not_be_adjacent() {
        let key_id = [4u8; 20];
        let tx = tx_with_outputs(vec![
            test_scripts::deposit_burn(1),
            vec![0x6a, 0xff], // unrelated OP_RETURN output in between
            test_scripts::deposit_payload(1, key_id),
        ]);
        let mut cache = DepositCache::new();
        cache.add_deposits(&tx);
        let found: Vec<_> = cache.get_deposits(1).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].n, 0, "burn output index is still recorded");
        assert_eq!(found[0].key_id, key_id);
    }

    #[test]
    fn ignores_payload_with_null_key_id() {
        let tx = tx_with_outputs(vec![
            test_scripts::deposit_burn(1),
            test_scripts::deposit_payload(1, [0u8; 20]),
        ]);
        let mut cache = DepositCache::new();
        cache.add_deposits(&tx);
        assert_eq!(cache.get_deposits(1).count(), 0);
    }

    #[test]
    fn reseeing_the_same_transaction_does_not_duplicate() {
        let tx = tx_with_outputs(vec![
            test_scripts::deposit_burn(2),
            test_scripts::deposit_payload(2, [9u8; 20]),
        ]);
        let mut cache = DepositCache::new();
        cache.add_deposits(&tx);
        cache.add_deposits(&tx);
        assert_eq!(cache.get_deposits(2).count(), 1);
    }

    #[test]
    fn reset_clears_all_sidechains() {
        let tx = tx_with_outputs(vec![
            test_scripts::deposit_burn(0),
            test_scripts::deposit_payload(0, [1u8; 20]),
        ]);
        let mut cache = DepositCache::new();
        cache.add_deposits(&tx);
        cache.reset();
        assert_eq!(cache.get_deposits(0).count(), 0);
    }
}
