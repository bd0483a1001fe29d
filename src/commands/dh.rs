use anyhow::{Context, Result};
use openvpn_pki::crypto_backend::CryptoBackend;
use openvpn_pki::lifecycle::PkiManager;
use openvpn_pki::ui::Prompter;

pub fn run<B: CryptoBackend, P: Prompter>(pki: &mut PkiManager<B, P>) -> Result<()> {
    pki.create_dh().context("Failed to generate DH params")?;
    if pki.store().has_dh() {
        println!("DH parameters at {}.", pki.store().dh_path().display());
    } else {
        println!("This algorithm does not use DH parameters.");
    }
    Ok(())
}
