//! Coinbase output script recognizers.
//!
//! Byte layouts here are consensus-critical and must be parsed without panicking:
//! malformed or truncated scripts simply fail to recognize, they never error.
//!
//! Per DESIGN.md, the five `Is*Commit` predicates described by the spec are kept as
//! thin callers over one tagged [`recognize_script`], rather than independent parse
//! passes over the same bytes.

use nom::{
    bytes::complete::{tag, take},
    number::complete::u8 as nom_u8,
    IResult,
};

use crate::hash::Hash256;
use crate::params::VALID_SIDECHAINS;

const OP_RETURN: u8 = 0x6a;

/// Header bytes preceding a BMM critical-hash commit's 32-byte hash.
const CRITICAL_HASH_COMMIT_HEADER: [u8; 6] = [OP_RETURN, 0xb5, 0x1d, 0x6a, 0xf4, 0x01];
/// Header bytes preceding a WT^ hash commit's pushdata opcode.
const WTPRIME_HASH_COMMIT_HEADER: [u8; 7] = [OP_RETURN, 0xd1, 0x61, 0x73, 0x68, 0x2e, 0x02];
/// Header bytes preceding an SCDB Merkle-root commit's pushdata opcode.
const SCDB_HASH_COMMIT_HEADER: [u8; 6] = [OP_RETURN, 0xd7, 0x7a, 0x0f, 0x9c, 0x03];
/// Prefix byte pair identifying a deposit-burn sentinel script, followed by the
/// sidechain number that owns the slot.
const DEPOSIT_BURN_PREFIX: [u8; 2] = [0xde, 0xb0];

/// The `CCriticalData` payload trailing a critical-hash commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CriticalData {
    pub hash_critical: Hash256,
    pub trailing: Vec<u8>,
}

impl CriticalData {
    /// `IsBMMRequest`: the trailing bytes decode as `{n_sidechain: u8, n_prev_block_ref: u16}`.
    pub fn is_bmm_request(&self) -> Option<(u8, u16)> {
        if self.trailing.len() != 3 {
            return None;
        }
        let n_sidechain = self.trailing[0];
        let n_prev_block_ref = u16::from_le_bytes([self.trailing[1], self.trailing[2]]);
        Some((n_sidechain, n_prev_block_ref))
    }
}

/// Tagged classification of a coinbase output script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptClass {
    BmmCommit(CriticalData),
    WtPrimeHashCommit { hash_wtprime: Hash256, n_sidechain: u8 },
    ScdbHashCommit { hash_merkle_root: Hash256 },
    DepositBurn,
    DepositPayload { n_sidechain: u8, key_id: [u8; 20] },
    Other,
}

fn fixed_push(input: &[u8], len: u8) -> IResult<&[u8], &[u8]> {
    let (input, _) = tag([len])(input)?;
    take(len as usize)(input)
}

/// Minimal `CScriptNum` decode: little-endian magnitude, sign in the high bit of the
/// last byte.
fn decode_cscriptnum(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }
    let mut result: i64 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        result |= (b as i64) << (8 * i);
    }
    let last = bytes.len() - 1;
    if bytes[last] & 0x80 != 0 {
        result &= !(0x80i64 << (8 * last));
        result = -result;
    }
    result
}

/// A `CScriptNum`-encoded push: a single length byte (1-4) followed by that many bytes.
fn cscriptnum_push(input: &[u8]) -> IResult<&[u8], i64> {
    let (input, len) = nom_u8(input)?;
    if !(1..=4).contains(&len) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    let (input, bytes) = take(len as usize)(input)?;
    Ok((input, decode_cscriptnum(bytes)))
}

fn parse_critical_hash_commit(script: &[u8]) -> Option<CriticalData> {
    if script.len() < 38 || script[0..6] != CRITICAL_HASH_COMMIT_HEADER[..] {
        return None;
    }
    let hash_critical: Hash256 = script[6..38].try_into().ok()?;
    Some(CriticalData {
        hash_critical,
        trailing: script[38..].to_vec(),
    })
}

/// The WT^ hash is pushed starting at offset 7; the sidechain-number push is then
/// read starting at offset 39, one byte short of where the 32-byte hash push ends.
/// This overlap is inherited unmodified from the source implementation (see
/// DESIGN.md) — it is not a transcription error.
fn parse_wtprime_hash_commit(script: &[u8]) -> Option<(Hash256, u8)> {
    if script.len() < 40 || script[0..7] != WTPRIME_HASH_COMMIT_HEADER[..] {
        return None;
    }
    let (_, hash_bytes) = fixed_push(&script[7..], 32).ok()?;
    let hash_wtprime: Hash256 = hash_bytes.try_into().ok()?;
    let (_, n) = cscriptnum_push(&script[39..]).ok()?;
    let n_sidechain = u8::try_from(n).ok()?;
    Some((hash_wtprime, n_sidechain))
}

fn parse_scdb_hash_commit(script: &[u8]) -> Option<Hash256> {
    if script.len() < 6 || script[0..6] != SCDB_HASH_COMMIT_HEADER[..] {
        return None;
    }
    let (_, hash_bytes) = fixed_push(&script[6..], 32).ok()?;
    hash_bytes.try_into().ok()
}

fn deposit_burn_script(n_sidechain: u8) -> [u8; 4] {
    [OP_RETURN, DEPOSIT_BURN_PREFIX[0], DEPOSIT_BURN_PREFIX[1], n_sidechain]
}

fn is_deposit_burn_script(script: &[u8]) -> bool {
    VALID_SIDECHAINS
        .iter()
        .any(|&n| script == deposit_burn_script(n)[..])
}

fn parse_deposit_payload(script: &[u8]) -> Option<(u8, [u8; 20])> {
    if script.len() != 23 || script[0] != OP_RETURN || script[2] != 20 {
        return None;
    }
    let n_sidechain = script[1];
    let key_id: [u8; 20] = script[3..23].try_into().ok()?;
    Some((n_sidechain, key_id))
}

/// Classifies a coinbase output script. Never panics; unrecognized or malformed
/// scripts fall through to [`ScriptClass::Other`].
pub fn recognize_script(script_pubkey: &[u8]) -> ScriptClass {
    if let Some(critical_data) = parse_critical_hash_commit(script_pubkey) {
        return ScriptClass::BmmCommit(critical_data);
    }
    if let Some((hash_wtprime, n_sidechain)) = parse_wtprime_hash_commit(script_pubkey) {
        return ScriptClass::WtPrimeHashCommit {
            hash_wtprime,
            n_sidechain,
        };
    }
    if let Some(hash_merkle_root) = parse_scdb_hash_commit(script_pubkey) {
        return ScriptClass::ScdbHashCommit { hash_merkle_root };
    }
    if is_deposit_burn_script(script_pubkey) {
        return ScriptClass::DepositBurn;
    }
    if let Some((n_sidechain, key_id)) = parse_deposit_payload(script_pubkey) {
        return ScriptClass::DepositPayload { n_sidechain, key_id };
    }
    ScriptClass::Other
}

pub fn is_critical_hash_commit(script_pubkey: &[u8]) -> bool {
    matches!(recognize_script(script_pubkey), ScriptClass::BmmCommit(_))
}

pub fn is_wtprime_hash_commit(script_pubkey: &[u8]) -> bool {
    matches!(
        recognize_script(script_pubkey),
        ScriptClass::WtPrimeHashCommit { .. }
    )
}

pub fn is_scdb_hash_merkle_root_commit(script_pubkey: &[u8]) -> bool {
    matches!(
        recognize_script(script_pubkey),
        ScriptClass::ScdbHashCommit { .. }
    )
}

#[cfg(test)]
pub(crate) mod test_scripts {
    use super::*;

    pub fn critical_hash_commit(hash_critical: Hash256, trailing: &[u8]) -> Vec<u8> {
        let mut script = CRITICAL_HASH_COMMIT_HEADER.to_vec();
        script.extend_from_slice(&hash_critical);
        script.extend_from_slice(trailing);
        script
    }

    pub fn bmm_request_commit(n_sidechain: u8, n_prev_block_ref: u16, hash_critical: Hash256) -> Vec<u8> {
        let mut trailing = vec![n_sidechain];
        trailing.extend_from_slice(&n_prev_block_ref.to_le_bytes());
        critical_hash_commit(hash_critical, &trailing)
    }

    pub fn wtprime_hash_commit(hash_wtprime: Hash256, n_sidechain: u8) -> Vec<u8> {
        let mut script = WTPRIME_HASH_COMMIT_HEADER.to_vec();
        script.push(32);
        script.extend_from_slice(&hash_wtprime);
        // overwrite the last hash byte's slot with the CScriptNum push length,
        // reproducing the offset-39 overlap.
        script.truncate(39);
        script.push(1);
        script.push(n_sidechain);
        script
    }

    pub fn scdb_hash_commit(hash_merkle_root: Hash256) -> Vec<u8> {
        let mut script = SCDB_HASH_COMMIT_HEADER.to_vec();
        script.push(32);
        script.extend_from_slice(&hash_merkle_root);
        script
    }

    pub fn deposit_burn(n_sidechain: u8) -> Vec<u8> {
        deposit_burn_script(n_sidechain).to_vec()
    }

    pub fn deposit_payload(n_sidechain: u8, key_id: [u8; 20]) -> Vec<u8> {
        let mut script = vec![OP_RETURN, n_sidechain, 20];
        script.extend_from_slice(&key_id);
        script
    }
}

#[cfg(test)]
mod tests {
    use super::test_scripts::*;
    use super::*;

    #[test]
    fn recognizes_bmm_request() {
        let hash = [7u8; 32];
        let script = bmm_request_commit(1, 42, hash);
        match recognize_script(&script) {
            ScriptClass::BmmCommit(data) => {
                assert_eq!(data.hash_critical, hash);
                assert_eq!(data.is_bmm_request(), Some((1, 42)));
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn non_bmm_critical_data_has_no_request() {
        let hash = [1u8; 32];
        let script = critical_hash_commit(hash, &[1, 2, 3, 4]);
        match recognize_script(&script) {
            ScriptClass::BmmCommit(data) => assert_eq!(data.is_bmm_request(), None),
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn recognizes_wtprime_hash_commit() {
        let hash = [9u8; 32];
        let script = wtprime_hash_commit(hash, 2);
        assert!(is_wtprime_hash_commit(&script));
        match recognize_script(&script) {
            ScriptClass::WtPrimeHashCommit {
                hash_wtprime,
                n_sidechain,
            } => {
                assert_eq!(n_sidechain, 2);
                // the last hash byte is reinterpreted as the CScriptNum push length,
                // so only the first 31 bytes of the original hash survive untouched.
                assert_eq!(&hash_wtprime[..31], &hash[..31]);
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn recognizes_scdb_hash_commit() {
        let root = [3u8; 32];
        let script = scdb_hash_commit(root);
        assert!(is_scdb_hash_merkle_root_commit(&script));
        assert_eq!(
            recognize_script(&script),
            ScriptClass::ScdbHashCommit {
                hash_merkle_root: root
            }
        );
    }

    #[test]
    fn recognizes_deposit_burn() {
        let script = deposit_burn(crate::params::SIDECHAIN_TEST);
        assert_eq!(recognize_script(&script), ScriptClass::DepositBurn);
    }

    #[test]
    fn recognizes_deposit_payload() {
        let key_id = [5u8; 20];
        let script = deposit_payload(1, key_id);
        assert_eq!(
            recognize_script(&script),
            ScriptClass::DepositPayload {
                n_sidechain: 1,
                key_id
            }
        );
    }

    #[test]
    fn truncated_scripts_never_panic() {
        for len in 0..45 {
            let script = vec![0u8; len];
            let _ = recognize_script(&script);
        }
    }

    #[test]
    fn is_critical_hash_commit_matches_recognizer() {
        let hash = [7u8; 32];
        let script = critical_hash_commit(hash, &[]);
        assert!(is_critical_hash_commit(&script));
        assert!(!is_wtprime_hash_commit(&script));
        assert!(!is_scdb_hash_merkle_root_commit(&script));
    }
}
