//! openvpn-pki - OpenVPN PKI directory manager
//!
//! Creates and maintains a self-contained PKI directory for one OpenVPN
//! deployment: certificate authority, server and client identities,
//! revocation list, rendered server configuration and packaged client bundles.
//!
//! ```bash
//! # New ECDSA directory, answering the remaining questions interactively
//! openvpn-pki --dir ./vpn init --algorithm ecdsa --server vpn.example.com
//!
//! # Package a client, then revoke it
//! openvpn-pki --dir ./vpn client alice
//! openvpn-pki --dir ./vpn revoke alice --regenerate
//! ```
//!
//! Log verbosity comes from `OPENVPN_PKI_LOG` or `RUST_LOG` (default `info`);
//! `--verbose` forces `debug`.

mod commands;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use commands::Command;
use openvpn_pki::crypto_backend::CryptoBackend;
use openvpn_pki::lifecycle::PkiManager;
use openvpn_pki::pki_generator::OpenSslBackend;
use openvpn_pki::ui::{Prompter, TerminalPrompter, Unattended};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "openvpn-pki", version, about = "OpenVPN PKI directory manager")]
struct Cli {
    /// PKI directory to operate on
    #[arg(short, long, global = true, default_value = ".")]
    dir: PathBuf,

    /// Never prompt; take the default answer for every question
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn init_tracing(verbose: bool) -> Result<()> {
    let filter = if verbose {
        "debug".to_string()
    } else {
        env::var("OPENVPN_PKI_LOG")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string())
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter)?)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))
}

fn dispatch<B: CryptoBackend, P: Prompter>(
    pki: &mut PkiManager<B, P>,
    command: &Command,
) -> Result<()> {
    match command {
        Command::Init(args) => commands::init::run(pki, args),
        Command::Server => commands::server::run(pki),
        Command::Client(args) => commands::client::run(pki, args),
        Command::Revoke(args) => commands::revoke::run(pki, args),
        Command::Dh => commands::dh::run(pki),
        Command::Status => commands::status::run(pki),
    }
}

fn run_with<P: Prompter>(cli: &Cli, prompter: P) -> Result<()> {
    let mut pki = PkiManager::open(&cli.dir, OpenSslBackend::new(), prompter)
        .with_context(|| format!("Failed to load config at {}", cli.dir.display()))?;
    dispatch(&mut pki, &cli.command)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    if cli.yes {
        run_with(&cli, Unattended)
    } else {
        run_with(&cli, TerminalPrompter::stdio())
    }
}
