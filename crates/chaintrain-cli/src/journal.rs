//! # Journal Subcommand
//!
//! Offline audit of a ledger journal file: every entry's sequence number,
//! predecessor link and digest are recomputed. Optionally looks up the entry
//! anchoring a given Merkle root.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use chaintrain_ledger::{verify_chain, LedgerEntry};

use crate::dataset::parse_root;
use crate::EXIT_MISMATCH;

/// Journal subcommand arguments.
#[derive(Args, Debug)]
pub struct JournalArgs {
    #[command(subcommand)]
    pub command: JournalCommand,
}

/// Available journal operations.
#[derive(Subcommand, Debug)]
pub enum JournalCommand {
    /// Verify the hash chain of a journal file.
    ///
    /// Exits with status 2 if the chain is broken or `--root` is not anchored.
    Check {
        /// Journal file (`DATA_DIR/ledger.jsonl`).
        path: PathBuf,

        /// Also report the entry anchoring this Merkle root.
        #[arg(long)]
        root: Option<String>,
    },
}

/// Execute the journal subcommand.
pub fn run_journal(args: &JournalArgs) -> Result<u8> {
    match &args.command {
        JournalCommand::Check { path, root } => run_check(path, root.as_deref()),
    }
}

/// Parse every non-blank line of a journal file.
pub fn read_entries(path: &Path) -> Result<Vec<LedgerEntry>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open journal {}", path.display()))?;
    let mut entries = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line)
            .with_context(|| format!("line {}: malformed journal entry", n + 1))?;
        entries.push(entry);
    }
    Ok(entries)
}

fn run_check(path: &Path, root: Option<&str>) -> Result<u8> {
    let root = root.map(parse_root).transpose()?;
    let entries = read_entries(path)?;

    if let Err(e) = verify_chain(&entries) {
        println!("BROKEN: {e}");
        return Ok(EXIT_MISMATCH);
    }
    println!("OK: {} entries, chain intact", entries.len());
    if let Some(last) = entries.last() {
        println!("  head: {} (sequence {})", last.tx_digest, last.sequence);
    }

    let Some(root) = root else {
        return Ok(0);
    };
    match entries.iter().find(|e| e.merkle_root == root) {
        Some(entry) => {
            println!("  root {root} anchored:");
            println!("    dataset:  {}", entry.dataset_id);
            println!("    tx:       {}", entry.tx_digest);
            println!("    sequence: {}", entry.sequence);
            Ok(0)
        }
        None => {
            println!("  root {root} is not anchored in this journal");
            Ok(EXIT_MISMATCH)
        }
    }
}
