//! Replays a JSON fixture of host blocks through an [`scdb::Scdb`] instance, printing
//! the resulting SCDB/BMM commitment hashes as it goes.
//!
//! This stands in for the host-chain block-connect loop a real embedding node would
//! drive; it has no RPC, ZMQ, or persistence layer of its own, matching the crate it
//! demonstrates.

use std::path::Path;

use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};
use clap::Parser;
use miette::IntoDiagnostic;
use serde::Deserialize;
use tracing::info;

use scdb::cli::Config;
use scdb::error::ReplayError;
use scdb::hash::Hash256;
use scdb::Scdb;

#[derive(Debug, Deserialize)]
struct Fixture {
    blocks: Vec<BlockFixture>,
}

#[derive(Debug, Deserialize)]
struct BlockFixture {
    height: i32,
    block_hash: String,
    #[serde(default)]
    coinbase_outputs: Vec<String>,
    #[serde(default)]
    deposit_txs: Vec<Vec<String>>,
}

fn tx_from_output_scripts(scripts: &[String]) -> Result<Transaction, ReplayError> {
    let output = scripts
        .iter()
        .map(|hex_script| {
            let bytes = hex::decode(hex_script).map_err(|source| ReplayError::InvalidHex {
                context: format!("output script {hex_script}"),
                source,
            })?;
            Ok(TxOut {
                value: Amount::ZERO,
                script_pubkey: ScriptBuf::from_bytes(bytes),
            })
        })
        .collect::<Result<Vec<_>, ReplayError>>()?;

    Ok(Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output,
    })
}

fn parse_block_hash(hex_hash: &str, height: i32) -> Result<Hash256, ReplayError> {
    let context = format!("block_hash at height {height}");
    let bytes = hex::decode(hex_hash).map_err(|source| ReplayError::InvalidHex {
        context: context.clone(),
        source,
    })?;
    bytes
        .try_into()
        .map_err(|_| ReplayError::WrongHashLength { context })
}

fn load_fixture(path: &Path) -> Result<Fixture, ReplayError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ReplayError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ReplayError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn run(config: &Config) -> Result<(), ReplayError> {
    let fixture = load_fixture(&config.fixture)?;
    let mut scdb = Scdb::new();

    for block in &fixture.blocks {
        let block_hash = parse_block_hash(&block.block_hash, block.height)?;
        let coinbase = tx_from_output_scripts(&block.coinbase_outputs)?;
        let deposit_txs = block
            .deposit_txs
            .iter()
            .map(|scripts| tx_from_output_scripts(scripts))
            .collect::<Result<Vec<_>, ReplayError>>()?;

        scdb.update(block.height, block_hash, &coinbase);
        scdb.add_deposits(&coinbase);
        for tx in &deposit_txs {
            scdb.add_deposits(tx);
        }

        info!(
            height = block.height,
            scdb_hash = %hex::encode(scdb.get_scdb_hash()),
            bmm_hash = %hex::encode(scdb.get_bmm_hash()),
            "applied block"
        );
        if config.trace_blocks {
            println!("{scdb}");
        }
    }

    println!("{scdb}");
    Ok(())
}

fn main() -> miette::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .with_target(false)
        .init();

    run(&config).into_diagnostic()
}
