//! A sidechain database (SCDB): the in-memory, single-threaded state machine that
//! tracks BMM linking data, WT^ work-score voting, and deposit registration for a
//! fixed set of sidechain slots on a host chain.
//!
//! This crate has no network, persistence, or UI surface of its own; [`Scdb::update`]
//! is the single entry point an embedding host-chain node drives one block at a time.
//! See `src/bin/replay.rs` for a minimal JSON-fixture-driven demonstration of that loop.

pub mod cli;
pub mod deposits;
pub mod error;
pub mod hash;
pub mod index;
pub mod params;
pub mod ratchet;
pub mod scdb;
pub mod script;
pub mod types;

pub use scdb::Scdb;
