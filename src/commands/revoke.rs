use anyhow::{Context, Result};
use clap::Args;
use openvpn_pki::crypto_backend::CryptoBackend;
use openvpn_pki::lifecycle::PkiManager;
use openvpn_pki::ui::Prompter;

#[derive(Args, Debug)]
pub struct RevokeArgs {
    /// Name of the identity to revoke
    pub name: String,

    /// Regenerate the server configuration without asking
    #[arg(long, conflicts_with = "no_regenerate")]
    pub regenerate: bool,

    /// Leave the server configuration untouched
    #[arg(long)]
    pub no_regenerate: bool,
}

pub fn run<B: CryptoBackend, P: Prompter>(
    pki: &mut PkiManager<B, P>,
    args: &RevokeArgs,
) -> Result<()> {
    let regenerate = match (args.regenerate, args.no_regenerate) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    let report = pki
        .revoke(&args.name, regenerate)
        .with_context(|| format!("Failed to revoke {}", args.name))?;

    for warning in &report.warnings {
        println!("WARNING: {}", warning);
    }
    println!("Revoked {}.", args.name);
    if report.regenerated {
        println!("Server configuration regenerated with the updated CRL.");
    }
    Ok(())
}
