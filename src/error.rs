//! Typed errors for construction and tooling-level failures.
//!
//! Malformed coinbase scripts are not represented here: [`crate::script::recognize_script`]
//! and its callers treat those as routine and resolve them silently to `Option`/`bool`,
//! following the same split the source implementation draws between a standalone
//! `IsScript*` predicate and an actual validation failure.

use thiserror::Error;

/// Failures raised while applying a network-supplied update package to an [`crate::scdb::Scdb`].
#[derive(Debug, Error)]
pub enum UpdatePackageError {
    #[error("update package names unknown sidechain slot {n_sidechain}")]
    UnknownSidechain { n_sidechain: u8 },
}

/// Failures raised by the replay binary while loading and driving a fixture file.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read fixture file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse fixture file {path} as JSON")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid hex in {context}")]
    InvalidHex {
        context: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("{context} must be exactly 32 bytes")]
    WrongHashLength { context: String },

    #[error(transparent)]
    UpdatePackage(#[from] UpdatePackageError),
}
