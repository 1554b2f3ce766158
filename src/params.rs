//! Network-fixed sentinels. Changing any of these forks the chain.

/// Sidechain slot reserved for integration testing.
pub const SIDECHAIN_TEST: u8 = 0;
/// Sidechain slot for the Hivemind prediction-market sidechain.
pub const SIDECHAIN_HIVEMIND: u8 = 1;
/// Sidechain slot for the Wimble sidechain.
pub const SIDECHAIN_WIMBLE: u8 = 2;

/// Immutable, process-wide registry of sidechain slots SCDB will track.
///
/// Built once, never mutated at runtime (see DESIGN.md: REDESIGN FLAGS).
pub const VALID_SIDECHAINS: [u8; 3] = [SIDECHAIN_TEST, SIDECHAIN_HIVEMIND, SIDECHAIN_WIMBLE];

pub const VALID_SIDECHAINS_COUNT: usize = VALID_SIDECHAINS.len();

/// Number of host blocks a WT^ has to accumulate work score before SCDB resets.
pub const SIDECHAIN_VERIFICATION_PERIOD: u16 = 26_300;
/// Shorter verification period used for the TEST sidechain slot.
pub const SIDECHAIN_TEST_VERIFICATION_PERIOD: u16 = 144;

/// Minimum work score (of `SIDECHAIN_VERIFICATION_PERIOD`) for a WT^ to be spendable.
pub const SIDECHAIN_MIN_WORKSCORE: u16 = 13_150;
/// Minimum work score for the TEST sidechain, scaled to its shorter period.
pub const SIDECHAIN_TEST_MIN_WORKSCORE: u16 = 72;

/// Maximum number of WT^(s) tracked concurrently per sidechain.
pub const SIDECHAIN_MAX_WT: usize = 3;

/// Maximum number of BMM linking-data entries retained per sidechain.
pub const BMM_MAX_LD: usize = 144;

/// `IsSidechainNumberValid`: true iff `n` names one of the fixed sidechain slots.
pub fn is_sidechain_number_valid(n: u8) -> bool {
    VALID_SIDECHAINS.contains(&n)
}

/// Work-score threshold to apply for a given sidechain slot.
pub fn min_workscore(n_sidechain: u8) -> u16 {
    if n_sidechain == SIDECHAIN_TEST {
        SIDECHAIN_TEST_MIN_WORKSCORE
    } else {
        SIDECHAIN_MIN_WORKSCORE
    }
}

/// The verification period that would apply if this sidechain's slot were reset in
/// isolation. Only the TEST slot uses the shortened period; freshly registered
/// WT^(s) still seed `n_blocks_left` from `SIDECHAIN_VERIFICATION_PERIOD` regardless
/// of sidechain (see DESIGN.md). A host block's actual period-reset check clears
/// every sidechain's index together whenever either period elapses (see
/// `Scdb::update`, and DESIGN.md's Open Question decisions) rather than consulting
/// this function per sidechain; it is kept as a documented per-slot accessor for
/// tooling and tests.
pub fn verification_period(n_sidechain: u8) -> u16 {
    if n_sidechain == SIDECHAIN_TEST {
        SIDECHAIN_TEST_VERIFICATION_PERIOD
    } else {
        SIDECHAIN_VERIFICATION_PERIOD
    }
}
