//! # Serve Subcommand
//!
//! Runs the HTTP API. Configuration comes from the environment exactly as for
//! the standalone `chaintrain-api` binary; flags given here override it.

use std::net::IpAddr;

use anyhow::{Context, Result};
use clap::Args;

use chaintrain_api::config::AppConfig;

/// Arguments for the serve subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on (overrides `PORT`).
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to bind (overrides `BIND_ADDR`).
    #[arg(long)]
    pub bind: Option<IpAddr>,
}

impl ServeArgs {
    /// Apply command-line overrides on top of the environment config.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
    }
}

/// Execute the serve subcommand. Blocks until the server stops.
pub fn run_serve(args: &ServeArgs) -> Result<u8> {
    let mut config = AppConfig::from_env().context("invalid configuration")?;
    args.apply(&mut config);

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime
        .block_on(chaintrain_api::serve(config))
        .context("server failed")?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaintrain_blob::BlobStoreConfig;

    #[test]
    fn flags_override_environment() {
        let mut config = AppConfig::from_lookup(
            |k| (k == "PORT").then(|| "9000".to_string()),
            BlobStoreConfig::local_mock("http://127.0.0.1:9").unwrap(),
        )
        .unwrap();
        ServeArgs {
            port: None,
            bind: None,
        }
        .apply(&mut config);
        assert_eq!(config.port, 9000);

        ServeArgs {
            port: Some(7000),
            bind: Some("0.0.0.0".parse().unwrap()),
        }
        .apply(&mut config);
        assert_eq!(config.port, 7000);
        assert!(config.bind_addr.is_unspecified());
    }
}
