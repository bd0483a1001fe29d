//! One handler per subcommand. Handlers print user-facing results to stdout;
//! diagnostics go through `tracing`.

pub mod client;
pub mod dh;
pub mod init;
pub mod revoke;
pub mod server;
pub mod status;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new PKI directory: configuration, CA, DH parameters (RSA) and server config
    Init(init::InitArgs),
    /// Regenerate the server configuration, issuing the server identity if needed
    Server,
    /// Issue a client identity and package it as clients/<name>.visz
    Client(client::ClientArgs),
    /// Revoke an issued identity and update the CRL
    Revoke(revoke::RevokeArgs),
    /// Generate Diffie-Hellman parameters (RSA directories only)
    Dh,
    /// Show the lifecycle state and issued identities of a PKI directory
    Status,
}
