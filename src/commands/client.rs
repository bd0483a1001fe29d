use anyhow::{Context, Result};
use clap::Args;
use openvpn_pki::crypto_backend::CryptoBackend;
use openvpn_pki::lifecycle::PkiManager;
use openvpn_pki::ui::{self, Prompter};

#[derive(Args, Debug)]
pub struct ClientArgs {
    /// Client common name; asked interactively when omitted
    pub name: Option<String>,

    /// Keep an existing identity for this name instead of issuing a new one
    #[arg(long)]
    pub reuse: bool,
}

pub fn run<B: CryptoBackend, P: Prompter>(
    pki: &mut PkiManager<B, P>,
    args: &ClientArgs,
) -> Result<()> {
    let name = match &args.name {
        Some(name) => name.trim().to_string(),
        None => ui::ask_client_name(pki.prompter_mut())?,
    };
    let bundle = pki
        .generate_client_bundle(&name, args.reuse)
        .with_context(|| format!("Failed to create client bundle for {}", name))?;
    println!("Successfully created client bundle at {}.", bundle.display());
    Ok(())
}
