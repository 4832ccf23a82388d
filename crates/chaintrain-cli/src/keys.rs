//! # Keygen Subcommand
//!
//! Generates an Ed25519 signing seed in the hex form `SIGNING_KEY_HEX`
//! expects, and prints the matching public key.

use anyhow::Result;
use clap::Args;
use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

use chaintrain_core::to_hex;
use chaintrain_crypto::Ed25519KeyPair;

/// Arguments for the keygen subcommand.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Print only the seed, for piping into an env file.
    #[arg(long)]
    pub seed_only: bool,
}

/// A freshly generated key. The seed is wiped on drop.
pub struct GeneratedKey {
    pub seed_hex: Zeroizing<String>,
    pub public_key_hex: String,
}

/// Generate a random seed and derive its public key.
pub fn generate() -> GeneratedKey {
    let mut seed = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(&mut seed[..]);
    let key = Ed25519KeyPair::from_seed(&seed);
    GeneratedKey {
        seed_hex: Zeroizing::new(to_hex(&seed[..])),
        public_key_hex: key.public_key().to_hex(),
    }
}

/// Execute the keygen subcommand.
pub fn run_keygen(args: &KeygenArgs) -> Result<u8> {
    let key = generate();
    if args.seed_only {
        println!("{}", key.seed_hex.as_str());
    } else {
        println!("SIGNING_KEY_HEX={}", key.seed_hex.as_str());
        println!("# public key: {}", key.public_key_hex);
    }
    Ok(0)
}
