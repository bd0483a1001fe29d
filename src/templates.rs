//! OpenVPN configuration rendering.
//!
//! Pure functions: the same configuration always renders the same text.

use crate::configs::{Algorithm, PkiConfig};

const ECDSA_CIPHER: &str = "TLS-ECDHE-ECDSA-WITH-AES-256-GCM-SHA384";
const EDDSA_CIPHER: &str = "TLS_AES_256_GCM_SHA384";

/// File names used inside the generated server directory, qualified by the
/// configured suffix so several servers can share one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFileNames {
    pub config: String,
    pub ca: String,
    pub cert: String,
    pub key: String,
    pub dh: String,
    pub crl: String,
}

impl ServerFileNames {
    pub fn new(suffix: &str) -> Self {
        Self {
            config: format!("server{}.conf", suffix),
            ca: format!("ca{}.crt", suffix),
            cert: format!("server{}.crt", suffix),
            key: format!("server{}.key", suffix),
            dh: format!("dh{}.pem", suffix),
            crl: format!("crl{}.crt", suffix),
        }
    }
}

/// TLS floor and cipher pin shared by server and client configs.
fn tls_directives(algorithm: Algorithm) -> Option<(&'static str, &'static str)> {
    match algorithm {
        Algorithm::Rsa => None,
        Algorithm::Ecdsa => Some(("1.2", ECDSA_CIPHER)),
        Algorithm::EdDsa => Some(("1.3", EDDSA_CIPHER)),
    }
}

/// Render `server<suffix>.conf`. `crl_present` adds the `crl-verify` line.
pub fn render_server_config(config: &PkiConfig, crl_present: bool) -> String {
    let suffix = config.suffix.as_str();
    let names = ServerFileNames::new(suffix);
    let net = &config.network;

    let mut lines: Vec<String> = vec![
        "#-- Config auto generated by openvpn-pki --#".into(),
        "#--      Config for OpenVPN 2.4 Server     --#".into(),
        String::new(),
        format!("proto {}", net.proto.server_directive()),
        format!("ifconfig-pool-persist ipp{}.txt", suffix),
        "keepalive 10 120".into(),
        "user nobody".into(),
        "group nogroup".into(),
        "persist-key".into(),
        "persist-tun".into(),
        format!("status openvpn-status{}.log", suffix),
        "verb 3".into(),
        "mute 10".into(),
        format!("ca {}", names.ca),
        format!("cert {}", names.cert),
        format!("key {}", names.key),
    ];
    if crl_present {
        lines.push(format!("crl-verify {}", names.crl));
    }

    match config.algorithm {
        Algorithm::Rsa => lines.push(format!("dh {}", names.dh)),
        Algorithm::EdDsa => lines.extend([
            "tls-version-min 1.3".into(),
            "dh none".into(),
            "# Note this curve may not be supported yet; OpenVPN will fall back to another (secp384r1)"
                .into(),
            format!("ecdh-curve {}", config.curve_name()),
            format!("tls-cipher {}", EDDSA_CIPHER),
        ]),
        Algorithm::Ecdsa => lines.extend([
            "tls-version-min 1.2".into(),
            "dh none".into(),
            format!("ecdh-curve {}", config.curve_name()),
            format!("tls-cipher {}", ECDSA_CIPHER),
        ]),
    }

    lines.push(format!("port {}", net.port));
    lines.push("dev tun0".into());
    lines.push("server 10.8.0.0 255.255.255.0".into());
    lines.extend(
        net.dns
            .iter()
            .map(|dns| format!("push \"dhcp-option DNS {}\"", dns)),
    );
    if net.redirect {
        lines.push("push \"redirect-gateway def1\"".into());
    }
    lines.extend(
        [
            "#Uncomment the below to allow client to client communication",
            "#client-to-client",
            "#Uncomment the below and modify the command to allow access to your internal network",
            "#push \"route 192.168.0.0 255.255.255.0\"",
        ]
        .map(String::from),
    );
    finish(lines)
}

/// Render the client's `config.conf`, referencing files beside it in the bundle.
pub fn render_client_config(config: &PkiConfig, name: &str) -> String {
    let net = &config.network;

    let mut lines: Vec<String> = vec![
        "#-- Config auto generated by openvpn-pki --#".into(),
        String::new(),
        format!("#viscosity name {}@{}", name, net.server),
        format!(
            "remote {} {} {}",
            net.server,
            net.port,
            net.proto.client_directive()
        ),
        "dev tun".into(),
        "tls-client".into(),
        "ca ca.crt".into(),
        format!("cert {}.crt", name),
        format!("key {}.key", name),
        "persist-tun".into(),
        "persist-key".into(),
        "nobind".into(),
        "pull".into(),
    ];
    if let Some((floor, cipher)) = tls_directives(config.algorithm) {
        lines.push(format!("tls-version-min {}", floor));
        lines.push(format!("tls-cipher {}", cipher));
    }
    finish(lines)
}

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
