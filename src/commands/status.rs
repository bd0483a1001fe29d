use anyhow::Result;
use openvpn_pki::crypto_backend::CryptoBackend;
use openvpn_pki::lifecycle::PkiManager;
use openvpn_pki::ui::Prompter;

pub fn run<B: CryptoBackend, P: Prompter>(pki: &PkiManager<B, P>) -> Result<()> {
    let store = pki.store();
    println!("Directory:  {}", store.root().display());
    println!("State:      {}", pki.state());

    let Some(config) = pki.config() else {
        return Ok(());
    };
    println!("Algorithm:  {}", config.algorithm);
    match config.algorithm {
        openvpn_pki::configs::Algorithm::Rsa => println!("Key size:   {}", config.key_size),
        _ => println!("Curve:      {}", config.curve_name()),
    }
    println!("Next serial: {}", config.serial);
    println!(
        "Server:     {}:{} ({})",
        config.network.server, config.network.port, config.network.proto
    );
    println!("DH params:  {}", if store.has_dh() { "present" } else { "absent" });
    println!("CRL:        {}", if store.has_crl() { "present" } else { "absent" });

    let identities = store.list_identities()?;
    if identities.is_empty() {
        println!("Identities: none");
    } else {
        println!("Identities:");
        for name in identities {
            let bundle = if store.bundle_path(&name).is_file() {
                " (bundled)"
            } else {
                ""
            };
            println!("  {}{}", name, bundle);
        }
    }
    Ok(())
}
