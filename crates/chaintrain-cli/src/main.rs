//! # chaintrain CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chaintrain_cli::dataset::{run_dataset, DatasetArgs};
use chaintrain_cli::journal::{run_journal, JournalArgs};
use chaintrain_cli::keys::{run_keygen, KeygenArgs};
use chaintrain_cli::serve::{run_serve, ServeArgs};

/// ChainTrain: verifiable dataset registration.
///
/// Fingerprints datasets offline with the registry's chunking and Merkle
/// rules, audits ledger journals, and runs the HTTP API.
#[derive(Parser, Debug)]
#[command(name = "chaintrain", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fingerprint, prove and verify dataset files.
    Dataset(DatasetArgs),

    /// Generate an Ed25519 signing seed.
    Keygen(KeygenArgs),

    /// Audit a ledger journal file.
    Journal(JournalArgs),

    /// Run the HTTP API.
    Serve(ServeArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // `serve` keeps the server's default of info; offline commands stay quiet.
    let filter = match (cli.verbose, &cli.command) {
        (0, Commands::Serve(_)) => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info")),
        (0, _) => EnvFilter::new("warn"),
        (1, _) => EnvFilter::new("info"),
        (2, _) => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = match &cli.command {
        Commands::Dataset(args) => run_dataset(args),
        Commands::Keygen(args) => run_keygen(args),
        Commands::Journal(args) => run_journal(args),
        Commands::Serve(args) => run_serve(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaintrain_cli::dataset::DatasetCommand;
    use chaintrain_cli::journal::JournalCommand;
    use std::path::PathBuf;

    #[test]
    fn parse_fingerprint_defaults() {
        let cli = Cli::try_parse_from(["chaintrain", "dataset", "fingerprint", "d.csv"]).unwrap();
        let Commands::Dataset(args) = cli.command else {
            panic!("expected dataset command");
        };
        match args.command {
            DatasetCommand::Fingerprint {
                path,
                chunk_size,
                manifest,
            } => {
                assert_eq!(path, PathBuf::from("d.csv"));
                assert_eq!(chunk_size, chaintrain_crypto::DEFAULT_CHUNK_SIZE);
                assert!(!manifest);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_verify_requires_root() {
        assert!(Cli::try_parse_from(["chaintrain", "dataset", "verify", "d.csv"]).is_err());
        let cli = Cli::try_parse_from([
            "chaintrain",
            "dataset",
            "verify",
            "d.csv",
            "--root",
            "ab",
            "--chunk-size",
            "64",
        ])
        .unwrap();
        let Commands::Dataset(args) = cli.command else {
            panic!("expected dataset command");
        };
        assert!(matches!(
            args.command,
            DatasetCommand::Verify { chunk_size: 64, .. }
        ));
    }

    #[test]
    fn parse_prove_requires_index() {
        assert!(Cli::try_parse_from(["chaintrain", "dataset", "prove", "d.csv"]).is_err());
        assert!(Cli::try_parse_from(["chaintrain", "dataset", "prove", "d.csv", "--index", "2"]).is_ok());
    }

    #[test]
    fn parse_journal_check_and_verbosity() {
        let cli = Cli::try_parse_from(["chaintrain", "-vv", "journal", "check", "l.jsonl"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Journal(args) = cli.command else {
            panic!("expected journal command");
        };
        let JournalCommand::Check { path, root } = args.command;
        assert_eq!(path, PathBuf::from("l.jsonl"));
        assert!(root.is_none());
    }

    #[test]
    fn parse_serve_overrides() {
        let cli = Cli::try_parse_from(["chaintrain", "serve", "--port", "9100"]).unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve command");
        };
        assert_eq!(args.port, Some(9100));
        assert!(args.bind.is_none());
        assert!(Cli::try_parse_from(["chaintrain", "serve", "--port", "http"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
