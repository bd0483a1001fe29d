//! End-to-end scenarios against a real PKI directory on disk.

use flate2::read::GzDecoder;
use openssl::x509::{X509Crl, X509};
use openvpn_pki::configs::{Algorithm, Protocol};
use openvpn_pki::error::PkiError;
use openvpn_pki::lifecycle::{InitOptions, PkiManager, PkiState};
use openvpn_pki::pki_generator::OpenSslBackend;
use openvpn_pki::storage::PkiStore;
use openvpn_pki::subject::Subject;
use openvpn_pki::ui::Unattended;
use std::fs;
use std::io::Read;
use tar::Archive;
use tempfile::TempDir;

type Manager = PkiManager<OpenSslBackend, Unattended>;

fn options(algorithm: Algorithm, curve: &str) -> InitOptions {
    InitOptions {
        algorithm,
        curve: Some(curve.to_string()),
        valid_days: 3650,
        server: Some("vpn.example.com".into()),
        port: Some(1194),
        proto: Some(Protocol::Udp),
        redirect: Some(true),
        dns: Some(vec!["1.1.1.1".into(), "1.0.0.1".into()]),
        subject: Some(Subject::new("vpn.example.com")),
        ..InitOptions::default()
    }
}

fn open(dir: &TempDir) -> Manager {
    PkiManager::open(dir.path(), OpenSslBackend::new(), Unattended).unwrap()
}

/// Initialized directory with a CA and server identity.
fn operational(dir: &TempDir, algorithm: Algorithm, curve: &str) -> Manager {
    let mut pki = open(dir);
    pki.initialize(options(algorithm, curve)).unwrap();
    pki.create_ca().unwrap();
    pki.issue_server_identity().unwrap();
    pki
}

fn cert_serial(store: &PkiStore, name: &str) -> u64 {
    let pem = fs::read(store.cert_path(name)).unwrap();
    let cert = X509::from_pem(&pem).unwrap();
    let hex = cert.serial_number().to_bn().unwrap().to_hex_str().unwrap();
    u64::from_str_radix(&hex, 16).unwrap()
}

fn revoked_count(store: &PkiStore) -> usize {
    let pem = fs::read(store.crl_path()).unwrap();
    let crl = X509Crl::from_pem(&pem).unwrap();
    crl.get_revoked().map(|r| r.len()).unwrap_or(0)
}

#[test]
fn ecdsa_directory_reaches_operational() {
    let dir = TempDir::new().unwrap();
    let mut pki = open(&dir);
    pki.initialize(options(Algorithm::Ecdsa, "secp384r1")).unwrap();

    pki.create_ca().unwrap();
    assert_eq!(pki.config().unwrap().serial, 1);

    assert!(pki.issue_server_identity().unwrap());
    assert_eq!(pki.config().unwrap().serial, 2);
    assert_eq!(pki.state(), PkiState::Operational);

    let conf_path = pki.generate_server_config().unwrap();
    let conf = fs::read_to_string(&conf_path).unwrap();
    assert!(conf.contains("tls-version-min 1.2\n"));
    assert!(conf.contains("ecdh-curve secp384r1\n"));
    assert!(conf.contains("dh none\n"));
    assert!(!conf.contains("dh dh"));
    assert!(!conf.contains("crl-verify"));

    let server_dir = pki.store().server_dir();
    for file in ["server.conf", "ca.crt", "server.crt", "server.key"] {
        assert!(server_dir.join(file).is_file(), "missing {}", file);
    }
    assert!(!server_dir.join("dh.pem").exists());

    // the saved serial survives a reopen
    assert_eq!(open(&dir).config().unwrap().serial, 2);
}

#[test]
fn revoked_serial_is_never_reused() {
    let dir = TempDir::new().unwrap();
    let mut pki = operational(&dir, Algorithm::Ecdsa, "prime256v1");
    assert_eq!(pki.config().unwrap().serial, 2);

    let bundle = pki.generate_client_bundle("alice", false).unwrap();
    assert_eq!(pki.config().unwrap().serial, 3);
    assert!(bundle.is_file());
    let alice_serial = cert_serial(pki.store(), "alice");
    assert_eq!(alice_serial, 2);

    let report = pki.revoke("alice", Some(false)).unwrap();
    assert!(report.warnings.is_empty());
    let store = pki.store().clone();
    assert!(store.has_crl());
    assert_eq!(revoked_count(&store), 1);
    assert!(!store.cert_path("alice").exists());
    assert!(!store.key_path("alice").exists());
    assert!(!store.bundle_path("alice").exists());

    pki.issue_client_identity("bob").unwrap();
    assert_eq!(pki.config().unwrap().serial, 4);
    assert!(cert_serial(&store, "bob") > alice_serial);
}

#[test]
fn revocation_list_accumulates() {
    let dir = TempDir::new().unwrap();
    let mut pki = operational(&dir, Algorithm::EdDsa, "ED25519");
    pki.issue_client_identity("alice").unwrap();
    pki.issue_client_identity("bob").unwrap();

    pki.revoke("alice", Some(false)).unwrap();
    pki.revoke("bob", Some(true)).unwrap();
    assert_eq!(revoked_count(pki.store()), 2);

    let conf = fs::read_to_string(pki.store().server_dir().join("server.conf")).unwrap();
    assert!(conf.contains("crl-verify crl.crt\n"));
    assert!(pki.store().server_dir().join("crl.crt").is_file());
}

#[test]
fn revoking_unknown_name_leaves_crl_untouched() {
    let dir = TempDir::new().unwrap();
    let mut pki = operational(&dir, Algorithm::Ecdsa, "prime256v1");
    pki.issue_client_identity("alice").unwrap();
    pki.revoke("alice", Some(false)).unwrap();
    let before = fs::read(pki.store().crl_path()).unwrap();

    let err = pki.revoke("mallory", Some(false)).unwrap_err();
    assert!(matches!(err, PkiError::MissingPrerequisite(_)));
    assert_eq!(fs::read(pki.store().crl_path()).unwrap(), before);
}

#[test]
fn revoking_unknown_name_creates_no_crl() {
    let dir = TempDir::new().unwrap();
    let mut pki = operational(&dir, Algorithm::Ecdsa, "prime256v1");
    assert!(pki.revoke("mallory", Some(false)).is_err());
    assert!(!pki.store().has_crl());
}

#[test]
fn ca_can_never_be_revoked() {
    let empty = TempDir::new().unwrap();
    assert!(matches!(
        open(&empty).revoke("ca", Some(false)),
        Err(PkiError::Validation(_))
    ));

    let dir = TempDir::new().unwrap();
    let mut pki = operational(&dir, Algorithm::Ecdsa, "prime256v1");
    assert!(matches!(
        pki.revoke("ca", Some(false)),
        Err(PkiError::Validation(_))
    ));
    assert!(pki.store().has_ca());
    assert!(!pki.store().has_crl());
}

#[test]
fn rsa_server_config_needs_dh() {
    let dir = TempDir::new().unwrap();
    let mut pki = open(&dir);
    pki.initialize(options(Algorithm::Rsa, "secp384r1")).unwrap();
    pki.create_ca().unwrap();

    let err = pki.generate_server_config().unwrap_err();
    assert!(matches!(err, PkiError::MissingPrerequisite(_)));
    assert!(!pki.store().server_dir().exists());

    // any file satisfies the guard; real parameters take minutes to generate
    fs::write(pki.store().dh_path(), "-----BEGIN DH PARAMETERS-----\n").unwrap();
    let conf = fs::read_to_string(pki.generate_server_config().unwrap()).unwrap();
    assert!(conf.contains("dh dh.pem\n"));
    assert!(!conf.contains("tls-cipher"));
    assert!(pki.store().server_dir().join("dh.pem").is_file());
}

#[test]
fn eddsa_server_config_needs_no_dh() {
    let dir = TempDir::new().unwrap();
    let mut pki = open(&dir);
    pki.initialize(options(Algorithm::EdDsa, "ED25519")).unwrap();
    pki.create_ca().unwrap();

    let conf = fs::read_to_string(pki.generate_server_config().unwrap()).unwrap();
    assert!(conf.contains("dh none\n"));
    assert!(conf.contains("ecdh-curve ED25519\n"));
    assert!(conf.contains("tls-version-min 1.3\n"));
    assert!(!pki.store().has_dh());
}

#[test]
fn server_directory_is_rebuilt_with_suffix() {
    let dir = TempDir::new().unwrap();
    let mut pki = open(&dir);
    let mut opts = options(Algorithm::Ecdsa, "prime256v1");
    opts.suffix = "-office".into();
    pki.initialize(opts).unwrap();
    pki.create_ca().unwrap();

    let server_dir = pki.store().server_dir();
    fs::create_dir_all(&server_dir).unwrap();
    fs::write(server_dir.join("stale.txt"), "old").unwrap();

    let conf_path = pki.generate_server_config().unwrap();
    assert_eq!(conf_path, server_dir.join("server-office.conf"));
    assert!(!server_dir.join("stale.txt").exists());
    for file in ["ca-office.crt", "server-office.crt", "server-office.key"] {
        assert!(server_dir.join(file).is_file(), "missing {}", file);
    }
}

#[test]
fn bundle_is_overwritten_on_repackaging() {
    let dir = TempDir::new().unwrap();
    let mut pki = operational(&dir, Algorithm::Ecdsa, "prime256v1");

    let first = pki.generate_client_bundle("carol", false).unwrap();
    let first_bytes = fs::read(&first).unwrap();
    let second = pki.generate_client_bundle("carol", false).unwrap();
    assert_eq!(first, second);
    assert_ne!(fs::read(&second).unwrap(), first_bytes);

    let clients: Vec<_> = fs::read_dir(pki.store().clients_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(clients, ["carol.visz"]);

    // no working directories are left behind
    let leftovers = fs::read_dir(dir.path())
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with(".bundle-")
        })
        .count();
    assert_eq!(leftovers, 0);

    let mut archive = Archive::new(GzDecoder::new(fs::File::open(&second).unwrap()));
    let mut names = Vec::new();
    let mut config = String::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let path = entry.path().unwrap().to_string_lossy().into_owned();
        if path.ends_with("config.conf") {
            entry.read_to_string(&mut config).unwrap();
        }
        if entry.header().entry_type().is_file() {
            names.push(path);
        }
    }
    names.sort();
    assert!(names.iter().all(|n| n.split('/').next() == Some("carol")));
    assert_eq!(
        names,
        [
            "carol/ca.crt",
            "carol/carol.crt",
            "carol/carol.key",
            "carol/config.conf",
        ]
    );
    assert!(config.contains("#viscosity name carol@vpn.example.com\n"));
    assert!(config.contains("remote vpn.example.com 1194 udp\n"));
    assert!(config.contains("cert carol.crt\n"));
}

#[test]
fn reserved_and_malformed_client_names_are_rejected() {
    let dir = TempDir::new().unwrap();
    let mut pki = operational(&dir, Algorithm::Ecdsa, "prime256v1");
    let serial = pki.config().unwrap().serial;

    for name in ["server", "ca", "crl", "dh", "", "../escape"] {
        assert!(matches!(
            pki.generate_client_bundle(name, false),
            Err(PkiError::Validation(_))
        ));
    }
    assert_eq!(pki.config().unwrap().serial, serial);
}

#[test]
fn client_named_crl_cannot_replace_revocation_list() {
    let dir = TempDir::new().unwrap();
    let mut pki = operational(&dir, Algorithm::Ecdsa, "prime256v1");
    pki.issue_client_identity("alice").unwrap();
    pki.revoke("alice", Some(false)).unwrap();
    let before = fs::read(pki.store().crl_path()).unwrap();

    assert!(matches!(
        pki.issue_client_identity("crl"),
        Err(PkiError::Validation(_))
    ));
    assert!(matches!(
        pki.generate_client_bundle("crl", false),
        Err(PkiError::Validation(_))
    ));
    assert_eq!(fs::read(pki.store().crl_path()).unwrap(), before);
    assert_eq!(revoked_count(pki.store()), 1);

    // the list is still usable for the next revocation
    pki.issue_client_identity("bob").unwrap();
    pki.revoke("bob", Some(false)).unwrap();
    assert_eq!(revoked_count(pki.store()), 2);
}

#[test]
fn serials_strictly_increase_across_mixed_operations() {
    let dir = TempDir::new().unwrap();
    let mut pki = operational(&dir, Algorithm::Ecdsa, "prime256v1");
    let store = pki.store().clone();

    let mut seen = vec![cert_serial(&store, "ca"), cert_serial(&store, "server")];
    for round in 0..3 {
        let name = format!("user{}", round);
        pki.issue_client_identity(&name).unwrap();
        seen.push(cert_serial(&store, &name));
        if round % 2 == 0 {
            pki.revoke(&name, Some(false)).unwrap();
        }
    }
    pki.issue_client_identity("user1").unwrap();
    seen.push(cert_serial(&store, "user1"));

    assert!(seen.windows(2).all(|w| w[0] < w[1]), "{:?}", seen);
}
