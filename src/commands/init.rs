use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use openvpn_pki::configs::{Algorithm, Protocol, DEFAULT_KEY_SIZE, DEFAULT_VALID_DAYS};
use openvpn_pki::crypto_backend::CryptoBackend;
use openvpn_pki::lifecycle::{InitOptions, PkiManager};
use openvpn_pki::subject::Subject;
use openvpn_pki::ui::{self, Prompter};

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum AlgorithmArg {
    Rsa,
    Ecdsa,
    Eddsa,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(value: AlgorithmArg) -> Self {
        match value {
            AlgorithmArg::Rsa => Algorithm::Rsa,
            AlgorithmArg::Ecdsa => Algorithm::Ecdsa,
            AlgorithmArg::Eddsa => Algorithm::EdDsa,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ProtocolArg {
    Udp,
    Tcp,
}

impl From<ProtocolArg> for Protocol {
    fn from(value: ProtocolArg) -> Self {
        match value {
            ProtocolArg::Udp => Protocol::Udp,
            ProtocolArg::Tcp => Protocol::Tcp,
        }
    }
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Key algorithm for every identity in the directory
    #[arg(long, value_enum, default_value = "rsa")]
    pub algorithm: AlgorithmArg,

    /// RSA key size in bits (also the DH parameter size)
    #[arg(long, default_value_t = DEFAULT_KEY_SIZE)]
    pub key_size: u32,

    /// Named curve (ECDSA: secp384r1, prime256v1, secp521r1; EdDSA: ED25519, ED448)
    #[arg(long)]
    pub curve: Option<String>,

    /// Certificate and CRL validity in days
    #[arg(long, default_value_t = DEFAULT_VALID_DAYS)]
    pub valid_days: u32,

    /// Appended to generated server file names, e.g. "-office"
    #[arg(long, default_value = "")]
    pub suffix: String,

    /// Public server address clients connect to
    #[arg(long)]
    pub server: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long, value_enum)]
    pub proto: Option<ProtocolArg>,

    /// Do not push a redirect-gateway to clients
    #[arg(long)]
    pub no_redirect: bool,

    /// DNS servers pushed to clients, comma separated
    #[arg(long, value_delimiter = ',', conflicts_with = "no_dns")]
    pub dns: Option<Vec<String>>,

    /// Push no DNS servers
    #[arg(long)]
    pub no_dns: bool,

    /// Use a certificate subject holding only the server address
    #[arg(long, requires = "server")]
    pub anonymous: bool,
}

impl InitArgs {
    fn to_options(&self) -> Result<InitOptions> {
        if matches!(self.port, Some(0) | Some(u16::MAX)) {
            bail!("Port must be between 1 and 65534");
        }
        let dns = if self.no_dns {
            Some(Vec::new())
        } else {
            match &self.dns {
                Some(list) => Some(
                    ui::parse_dns_list(&list.join(",")).map_err(anyhow::Error::msg)?,
                ),
                None => None,
            }
        };
        let subject = if self.anonymous {
            self.server.as_deref().map(Subject::new)
        } else {
            None
        };

        Ok(InitOptions {
            algorithm: self.algorithm.into(),
            key_size: self.key_size,
            curve: self.curve.clone(),
            valid_days: self.valid_days,
            suffix: self.suffix.clone(),
            server: self.server.clone(),
            port: self.port,
            proto: self.proto.map(Protocol::from),
            redirect: self.no_redirect.then_some(false),
            dns,
            subject,
        })
    }
}

pub fn run<B: CryptoBackend, P: Prompter>(
    pki: &mut PkiManager<B, P>,
    args: &InitArgs,
) -> Result<()> {
    let options = args.to_options()?;
    let server_conf = pki
        .bootstrap(options)
        .context("Failed to initialize PKI directory")?;
    println!(
        "Successfully generated server configuration at {}.",
        server_conf.display()
    );
    Ok(())
}
