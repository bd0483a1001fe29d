use anyhow::{Context, Result};
use openvpn_pki::crypto_backend::CryptoBackend;
use openvpn_pki::lifecycle::PkiManager;
use openvpn_pki::ui::Prompter;

pub fn run<B: CryptoBackend, P: Prompter>(pki: &mut PkiManager<B, P>) -> Result<()> {
    let server_conf = pki
        .generate_server_config()
        .context("Failed to generate server configuration")?;
    println!(
        "Successfully generated server configuration at {}.",
        server_conf.display()
    );
    Ok(())
}
