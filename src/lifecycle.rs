//! Lifecycle orchestration for one PKI directory.
//!
//! ```text
//! Uninitialized --initialize--> Configured --create_ca--> CaIssued
//!     --issue_server_identity / generate_server_config--> Operational
//! ```
//!
//! `Operational` loops on client issuance and revocation. Every operation
//! aborts on its first failure and leaves files written by earlier steps in
//! place; the serial counter is saved before the identity that uses it is
//! written, so a serial is never handed out twice.

use crate::configs::{
    Algorithm, NetworkSettings, PkiConfig, Protocol, DEFAULT_KEY_SIZE, DEFAULT_VALID_DAYS,
};
use crate::crypto_backend::{CryptoBackend, Identity, KeySpec, LeafRole};
use crate::error::{PkiError, Result};
use crate::key_archive;
use crate::storage::{PkiStore, CA_NAME, CRL_NAME, DH_NAME, SERVER_NAME};
use crate::subject::Subject;
use crate::templates::{render_client_config, render_server_config, ServerFileNames};
use crate::ui::{self, Prompter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where a PKI directory is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkiState {
    Uninitialized,
    Configured,
    CaIssued,
    /// CA and server identity present.
    Operational,
}

impl std::fmt::Display for PkiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PkiState::Uninitialized => "uninitialized",
            PkiState::Configured => "configured",
            PkiState::CaIssued => "CA issued",
            PkiState::Operational => "operational",
        })
    }
}

/// Parameters for [`PkiManager::initialize`]. Network and subject values left
/// as `None` are collected through the prompter.
#[derive(Debug, Clone)]
pub struct InitOptions {
    pub algorithm: Algorithm,
    pub key_size: u32,
    pub curve: Option<String>,
    pub valid_days: u32,
    pub suffix: String,
    pub server: Option<String>,
    pub port: Option<u16>,
    pub proto: Option<Protocol>,
    pub redirect: Option<bool>,
    pub dns: Option<Vec<String>>,
    pub subject: Option<Subject>,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            key_size: DEFAULT_KEY_SIZE,
            curve: None,
            valid_days: DEFAULT_VALID_DAYS,
            suffix: String::new(),
            server: None,
            port: None,
            proto: None,
            redirect: None,
            dns: None,
            subject: None,
        }
    }
}

/// Outcome of a revocation. The CRL update has always succeeded when a report
/// is returned; `warnings` lists cleanup steps that did not.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RevocationReport {
    pub warnings: Vec<String>,
    pub regenerated: bool,
}

/// Names whose files under `pki/` belong to something other than a client.
pub const RESERVED_NAMES: [&str; 4] = [CA_NAME, SERVER_NAME, CRL_NAME, DH_NAME];

/// Reject client names that cannot be used as a file stem or that collide with
/// the CA, server identity, CRL or DH parameter files.
pub fn validate_client_name(name: &str) -> Result<()> {
    check_name_shape(name)?;
    if RESERVED_NAMES.contains(&name) {
        return Err(PkiError::Validation(format!(
            "'{}' is reserved and cannot be used as a client name",
            name
        )));
    }
    Ok(())
}

fn check_name_shape(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PkiError::Validation("Common name cannot be blank".into()));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(PkiError::Validation(format!(
            "'{}' is not a valid identity name",
            name
        )));
    }
    Ok(())
}

fn not_initialized(store: &PkiStore) -> PkiError {
    PkiError::ConfigNotFound(store.config_path())
}

fn missing_ca() -> PkiError {
    PkiError::MissingPrerequisite("Missing CA. Please regenerate config".into())
}

fn key_spec(config: &PkiConfig) -> KeySpec<'_> {
    KeySpec {
        algorithm: config.algorithm,
        key_size: config.key_size,
        curve: config.curve_name(),
        valid_days: config.valid_days,
    }
}

fn copy_file(from: &Path, to: &Path, what: &str) -> Result<()> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| PkiError::io(format!("Failed to copy {}", what), e))
}

/// Drives every lifecycle operation against one PKI directory.
pub struct PkiManager<B, P> {
    store: PkiStore,
    backend: B,
    prompter: P,
    config: Option<PkiConfig>,
    issuer: Option<Identity>,
}

impl<B: CryptoBackend, P: Prompter> PkiManager<B, P> {
    /// Open a PKI directory, loading its configuration and CA when present.
    ///
    /// A missing configuration is not an error; the manager starts in
    /// [`PkiState::Uninitialized`]. A CA certificate that does not match its
    /// key is reported as [`PkiError::ConfigCorrupt`].
    pub fn open(dir: impl Into<PathBuf>, backend: B, prompter: P) -> Result<Self> {
        let store = PkiStore::new(dir);
        let config = store.load()?;
        let issuer = if config.is_some() && store.has_ca() {
            let (cert, key) = store.read_identity(CA_NAME)?;
            let ca = backend
                .load_identity(&cert, &key)
                .map_err(|e| PkiError::corrupt(store.cert_path(CA_NAME), e))?;
            debug!(subject = %ca.subject.common_name, "loaded CA identity");
            Some(ca)
        } else {
            None
        };
        Ok(Self {
            store,
            backend,
            prompter,
            config,
            issuer,
        })
    }

    pub fn store(&self) -> &PkiStore {
        &self.store
    }

    pub fn config(&self) -> Option<&PkiConfig> {
        self.config.as_ref()
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    pub fn prompter_mut(&mut self) -> &mut P {
        &mut self.prompter
    }

    pub fn state(&self) -> PkiState {
        if self.config.is_none() {
            PkiState::Uninitialized
        } else if !self.store.has_ca() {
            PkiState::Configured
        } else if !self.store.has_identity(SERVER_NAME) {
            PkiState::CaIssued
        } else {
            PkiState::Operational
        }
    }

    fn require_config(&self) -> Result<&PkiConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| not_initialized(&self.store))
    }

    fn require_ca(&self) -> Result<&Identity> {
        if !self.store.has_ca() {
            return Err(missing_ca());
        }
        self.issuer.as_ref().ok_or_else(missing_ca)
    }

    fn persist_identity(&self, name: &str, identity: &Identity) -> Result<()> {
        let cert_pem = self.backend.encode_cert_pem(identity)?;
        let key_pem = self.backend.encode_key_pem(identity)?;
        self.store.write_identity(name, &cert_pem, &key_pem)
    }

    // ---- Uninitialized -> Configured ----------------------------------------

    /// Create the configuration. Fails if the directory already has one.
    pub fn initialize(&mut self, options: InitOptions) -> Result<()> {
        if self.config.is_some() || self.store.config_exists() {
            return Err(PkiError::AlreadyInitialized(self.store.config_path()));
        }

        let algorithm = options.algorithm;
        let curve = options
            .curve
            .clone()
            .unwrap_or_else(|| algorithm.default_curve().to_string());
        if !algorithm.supports_curve(&curve) {
            return Err(PkiError::Validation(format!(
                "curve {} is not supported for {}",
                curve, algorithm
            )));
        }

        let prompter = &mut self.prompter;
        ui::print_intro(prompter);
        if algorithm == Algorithm::EdDsa {
            ui::confirm_eddsa(prompter)?;
        }

        let server = match options.server {
            Some(server) if !server.trim().is_empty() => server,
            _ => ui::ask_server_address(prompter)?,
        };
        let port = match options.port {
            Some(port) => port,
            None => ui::ask_port(prompter)?,
        };
        let proto = match options.proto {
            Some(proto) => proto,
            None => ui::ask_protocol(prompter)?,
        };
        let redirect = match options.redirect {
            Some(redirect) => redirect,
            None => ui::ask_redirect(prompter)?,
        };
        let dns = match options.dns {
            Some(dns) => dns,
            None => ui::ask_dns(prompter, redirect)?,
        };
        let subject = match options.subject {
            Some(subject) => subject,
            None => ui::ask_subject(prompter, &server)?,
        };

        let network = NetworkSettings {
            server,
            port,
            proto,
            redirect,
            dns,
        };
        let mut config = PkiConfig::new(algorithm, subject, network);
        config.key_size = options.key_size;
        config.valid_days = options.valid_days;
        config.suffix = options.suffix;
        config.ec_curve = Some(curve);

        fs::create_dir_all(self.store.root())
            .map_err(|e| PkiError::io("Failed to create PKI directory", e))?;
        self.store.save(&config)?;
        info!(
            dir = %self.store.root().display(),
            algorithm = %config.algorithm,
            "initialized PKI directory"
        );
        self.config = Some(config);
        Ok(())
    }

    // ---- Configured -> CaIssued ---------------------------------------------

    pub fn create_ca(&mut self) -> Result<()> {
        let config = self
            .config
            .as_mut()
            .ok_or_else(|| not_initialized(&self.store))?;
        if config.subject.common_name.trim().is_empty() {
            return Err(PkiError::MissingPrerequisite("No Subject available".into()));
        }

        let serial = config.next_serial();
        self.store.save(config)?;
        let ca = self
            .backend
            .create_ca(&config.subject, key_spec(config), serial)?;

        self.persist_identity(CA_NAME, &ca)?;
        info!(serial, "created certificate authority");
        self.issuer = Some(ca);
        Ok(())
    }

    /// Generate Diffie-Hellman parameters. Does nothing for ECDSA and EdDSA
    /// or when parameters already exist.
    pub fn create_dh(&mut self) -> Result<()> {
        let config = self.require_config()?;
        let (algorithm, key_size) = (config.algorithm, config.key_size);
        if !algorithm.needs_dh() {
            debug!(%algorithm, "no DH parameters needed");
            return Ok(());
        }
        if self.store.has_dh() {
            debug!("DH parameters already present");
            return Ok(());
        }

        self.prompter
            .say("Creating DH Params. This will take a while...");
        let pem = self.backend.create_dh_params(key_size)?;
        self.store.write_dh(&pem)?;
        info!(bits = key_size, "generated DH parameters");
        Ok(())
    }

    // ---- issuance -----------------------------------------------------------

    fn issue(&mut self, name: &str, role: LeafRole) -> Result<Identity> {
        if !self.store.has_ca() {
            return Err(missing_ca());
        }
        let issuer = self.issuer.as_ref().ok_or_else(missing_ca)?;
        let config = self
            .config
            .as_mut()
            .ok_or_else(|| not_initialized(&self.store))?;

        let serial = config.next_serial();
        self.store.save(config)?;
        let subject = config.subject.with_common_name(name);
        let identity =
            self.backend
                .issue_identity(&subject, issuer, key_spec(config), serial, role)?;

        self.persist_identity(name, &identity)?;
        info!(name, serial, ?role, "issued identity");
        Ok(identity)
    }

    /// Issue the server identity unless its files already exist. Returns
    /// whether a new identity was issued.
    pub fn issue_server_identity(&mut self) -> Result<bool> {
        self.require_config()?;
        self.require_ca()?;
        if self.store.has_identity(SERVER_NAME) {
            debug!("server identity already issued");
            return Ok(false);
        }
        self.issue(SERVER_NAME, LeafRole::Server)?;
        Ok(true)
    }

    /// Issue a client identity, replacing any existing one with the same name.
    pub fn issue_client_identity(&mut self, name: &str) -> Result<Identity> {
        validate_client_name(name)?;
        self.issue(name, LeafRole::Client)
    }

    // ---- revocation ---------------------------------------------------------

    /// Revoke `name`: add it to the CRL, then delete its files and bundle.
    ///
    /// `regenerate` decides whether the server configuration is rebuilt to
    /// pick up the new CRL; `None` asks. File deletion and regeneration
    /// failures are returned as warnings since the CRL is already written.
    pub fn revoke(&mut self, name: &str, regenerate: Option<bool>) -> Result<RevocationReport> {
        if name == CA_NAME {
            return Err(PkiError::Validation(
                "The certificate authority cannot be revoked".into(),
            ));
        }
        if name == CRL_NAME {
            return Err(PkiError::Validation(
                "The revocation list is not an identity".into(),
            ));
        }
        check_name_shape(name)?;
        let config = self.require_config()?;
        let issuer = self.require_ca()?;
        if !self.store.cert_path(name).is_file() {
            return Err(PkiError::MissingPrerequisite(format!(
                "Missing certificate for {}",
                name
            )));
        }

        let cert_pem = self.store.read_cert(name)?;
        let existing = self.store.read_crl()?;
        let crl = self.backend.update_crl(
            issuer,
            config.algorithm,
            existing.as_deref(),
            &cert_pem,
            config.valid_days,
        )?;
        self.store.write_crl(&crl)?;
        info!(name, "revoked identity");

        let mut report = RevocationReport {
            warnings: self.store.remove_identity(name),
            regenerated: false,
        };
        for warning in &report.warnings {
            warn!("{}", warning);
        }

        let regenerate = match regenerate {
            Some(choice) => choice,
            None => ui::ask_yes_no(
                &mut self.prompter,
                "Regenerate Server configuration? [Y/n]:",
            )?,
        };
        if regenerate {
            match self.generate_server_config() {
                Ok(_) => report.regenerated = true,
                Err(e) => {
                    let warning = format!("Failed to regenerate server configuration: {}", e);
                    warn!("{}", warning);
                    report.warnings.push(warning);
                }
            }
        }
        Ok(report)
    }

    // ---- rendered artifacts -------------------------------------------------

    /// Rebuild `server/` from scratch: the rendered config plus copies of the
    /// CA, server identity, DH parameters (RSA) and CRL (when present).
    pub fn generate_server_config(&mut self) -> Result<PathBuf> {
        let config = self.require_config()?;
        self.require_ca()?;
        if config.algorithm.needs_dh() && !self.store.has_dh() {
            return Err(PkiError::MissingPrerequisite(
                "Missing DH. Please regenerate config".into(),
            ));
        }

        self.issue_server_identity()?;

        let config = self.require_config()?;
        let server_dir = self.store.server_dir();
        match fs::remove_dir_all(&server_dir) {
            Ok(()) => debug!(path = %server_dir.display(), "removed previous server config"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(PkiError::io("Failed to clear server directory", e)),
        }
        fs::create_dir_all(&server_dir).map_err(|e| {
            PkiError::io("Failed to make directory for server configuration", e)
        })?;

        let names = ServerFileNames::new(&config.suffix);
        let crl_present = self.store.has_crl();
        let config_path = server_dir.join(&names.config);
        fs::write(&config_path, render_server_config(config, crl_present))
            .map_err(|e| PkiError::io("Failed to write server config", e))?;

        copy_file(&self.store.cert_path(CA_NAME), &server_dir.join(&names.ca), "CA")?;
        copy_file(
            &self.store.cert_path(SERVER_NAME),
            &server_dir.join(&names.cert),
            "Cert",
        )?;
        copy_file(
            &self.store.key_path(SERVER_NAME),
            &server_dir.join(&names.key),
            "Key",
        )?;
        if config.algorithm.needs_dh() {
            copy_file(&self.store.dh_path(), &server_dir.join(&names.dh), "DH")?;
        }
        if crl_present {
            copy_file(&self.store.crl_path(), &server_dir.join(&names.crl), "CRL")?;
        }

        info!(path = %server_dir.display(), "generated server configuration");
        Ok(config_path)
    }

    /// Package `name`'s identity, the CA and a rendered client config into
    /// `clients/<name>.visz`, overwriting any previous bundle.
    ///
    /// With `reuse` an existing identity is kept; otherwise a new one is
    /// issued.
    pub fn generate_client_bundle(&mut self, name: &str, reuse: bool) -> Result<PathBuf> {
        validate_client_name(name)?;
        self.require_config()?;
        self.require_ca()?;

        if reuse && self.store.has_identity(name) {
            debug!(name, "reusing existing client identity");
        } else {
            self.issue_client_identity(name)?;
        }

        let config = self.require_config()?;
        let work = tempfile::Builder::new()
            .prefix(".bundle-")
            .tempdir_in(self.store.root())
            .map_err(|e| PkiError::io("Failed to make client working directory", e))?;

        let packed = self.assemble_bundle(work.path(), config, name);
        if let Err(e) = work.close() {
            warn!("Failed to remove client working directory: {}", e);
        }
        let bytes = packed?;

        let path = self.store.write_bundle(name, &bytes)?;
        info!(name, path = %path.display(), "packaged client bundle");
        Ok(path)
    }

    fn assemble_bundle(&self, work: &Path, config: &PkiConfig, name: &str) -> Result<Vec<u8>> {
        let source = work.join(name);
        fs::create_dir_all(&source)
            .map_err(|e| PkiError::io("Failed to make client directory", e))?;

        copy_file(&self.store.cert_path(CA_NAME), &source.join("ca.crt"), "CA")?;
        copy_file(
            &self.store.cert_path(name),
            &source.join(format!("{}.crt", name)),
            "Cert",
        )?;
        copy_file(
            &self.store.key_path(name),
            &source.join(format!("{}.key", name)),
            "Key",
        )?;
        fs::write(source.join("config.conf"), render_client_config(config, name))
            .map_err(|e| PkiError::io("Failed to write client config", e))?;

        key_archive::pack_directory(&source, name)
            .map_err(|e| PkiError::io("Failed to package client bundle", io::Error::other(e)))
    }

    // ---- composite ----------------------------------------------------------

    /// Initialize, create the CA, create DH parameters (RSA) and generate the
    /// server configuration, stopping at the first failure.
    pub fn bootstrap(&mut self, options: InitOptions) -> Result<PathBuf> {
        self.initialize(options)?;
        self.create_ca()?;
        self.create_dh()?;
        self.generate_server_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki_generator::OpenSslBackend;
    use crate::ui::{ScriptedPrompter, Unattended};
    use tempfile::TempDir;

    fn options(algorithm: Algorithm, curve: &str) -> InitOptions {
        InitOptions {
            algorithm,
            curve: Some(curve.to_string()),
            server: Some("vpn.example.com".into()),
            port: Some(1194),
            proto: Some(Protocol::Udp),
            redirect: Some(true),
            dns: Some(vec!["1.1.1.1".into()]),
            subject: Some(Subject::new("vpn.example.com")),
            ..InitOptions::default()
        }
    }

    fn manager(dir: &TempDir) -> PkiManager<OpenSslBackend, Unattended> {
        PkiManager::open(dir.path(), OpenSslBackend::new(), Unattended).unwrap()
    }

    #[test]
    fn client_name_rules() {
        assert!(validate_client_name("alice").is_ok());
        for bad in ["", "  ", "ca", "server", "crl", "dh", "../x", "a/b", "a\\b", ".", ".."] {
            assert!(
                matches!(validate_client_name(bad), Err(PkiError::Validation(_))),
                "{:?} accepted",
                bad
            );
        }
    }

    #[test]
    fn state_progresses_through_lifecycle() {
        let dir = TempDir::new().unwrap();
        let mut pki = manager(&dir);
        assert_eq!(pki.state(), PkiState::Uninitialized);

        pki.initialize(options(Algorithm::Ecdsa, "prime256v1")).unwrap();
        assert_eq!(pki.state(), PkiState::Configured);
        assert_eq!(pki.config().unwrap().serial, 0);

        pki.create_ca().unwrap();
        assert_eq!(pki.state(), PkiState::CaIssued);
        assert_eq!(pki.config().unwrap().serial, 1);

        assert!(pki.issue_server_identity().unwrap());
        assert_eq!(pki.state(), PkiState::Operational);
        assert!(!pki.issue_server_identity().unwrap());
        assert_eq!(pki.config().unwrap().serial, 2);
    }

    #[test]
    fn initialize_refuses_existing_config() {
        let dir = TempDir::new().unwrap();
        manager(&dir)
            .initialize(options(Algorithm::Ecdsa, "prime256v1"))
            .unwrap();

        let mut again = manager(&dir);
        let err = again
            .initialize(options(Algorithm::Rsa, "secp384r1"))
            .unwrap_err();
        assert!(matches!(err, PkiError::AlreadyInitialized(_)));
    }

    #[test]
    fn initialize_rejects_curve_for_wrong_algorithm() {
        let dir = TempDir::new().unwrap();
        let err = manager(&dir)
            .initialize(options(Algorithm::EdDsa, "secp384r1"))
            .unwrap_err();
        assert!(matches!(err, PkiError::Validation(_)));
        assert!(!dir.path().join("config.conf").exists());
    }

    #[test]
    fn initialize_asks_for_missing_values() {
        let dir = TempDir::new().unwrap();
        let prompter = ScriptedPrompter::new(["vpn.example.com", "443", "2", "n", "", ""]);
        let mut pki = PkiManager::open(dir.path(), OpenSslBackend::new(), prompter).unwrap();
        pki.initialize(InitOptions {
            algorithm: Algorithm::Ecdsa,
            ..InitOptions::default()
        })
        .unwrap();

        let config = pki.config().unwrap();
        assert_eq!(config.network.server, "vpn.example.com");
        assert_eq!(config.network.port, 443);
        assert_eq!(config.network.proto, Protocol::Tcp);
        assert!(!config.network.redirect);
        assert_eq!(config.network.dns, ["10.8.0.1"]);
        assert_eq!(config.subject, Subject::new("vpn.example.com"));
        assert_eq!(config.curve_name(), "secp384r1");
        assert_eq!(pki.prompter().remaining(), 0);
    }

    #[test]
    fn declining_eddsa_leaves_directory_uninitialized() {
        let dir = TempDir::new().unwrap();
        let prompter = ScriptedPrompter::new(["n"]);
        let mut pki = PkiManager::open(dir.path(), OpenSslBackend::new(), prompter).unwrap();
        let err = pki
            .initialize(options(Algorithm::EdDsa, "ED25519"))
            .unwrap_err();
        assert!(matches!(err, PkiError::Validation(_)));
        assert_eq!(pki.state(), PkiState::Uninitialized);
    }

    #[test]
    fn reopen_loads_ca_and_serial() {
        let dir = TempDir::new().unwrap();
        {
            let mut pki = manager(&dir);
            pki.initialize(options(Algorithm::EdDsa, "ED25519")).unwrap();
            pki.create_ca().unwrap();
        }
        let mut pki = manager(&dir);
        assert_eq!(pki.state(), PkiState::CaIssued);
        pki.issue_client_identity("alice").unwrap();
        assert_eq!(pki.config().unwrap().serial, 2);
    }

    #[test]
    fn mismatched_ca_pair_is_corrupt() {
        let dir = TempDir::new().unwrap();
        {
            let mut pki = manager(&dir);
            pki.initialize(options(Algorithm::Ecdsa, "prime256v1")).unwrap();
            pki.create_ca().unwrap();
            pki.issue_client_identity("alice").unwrap();
        }
        let store = PkiStore::new(dir.path());
        fs::copy(store.key_path("alice"), store.key_path(CA_NAME)).unwrap();

        let result = PkiManager::open(dir.path(), OpenSslBackend::new(), Unattended);
        assert!(matches!(result, Err(PkiError::ConfigCorrupt { .. })));
    }

    #[test]
    fn issuing_without_ca_is_missing_prerequisite() {
        let dir = TempDir::new().unwrap();
        let mut pki = manager(&dir);
        pki.initialize(options(Algorithm::Ecdsa, "prime256v1")).unwrap();
        assert!(matches!(
            pki.issue_client_identity("alice"),
            Err(PkiError::MissingPrerequisite(_))
        ));
        assert!(matches!(
            pki.generate_client_bundle("alice", false),
            Err(PkiError::MissingPrerequisite(_))
        ));
        assert_eq!(pki.config().unwrap().serial, 0);
    }

    #[test]
    fn create_ca_needs_common_name() {
        let dir = TempDir::new().unwrap();
        manager(&dir)
            .initialize(options(Algorithm::Ecdsa, "prime256v1"))
            .unwrap();
        let store = PkiStore::new(dir.path());
        let mut json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.config_path()).unwrap()).unwrap();
        json["commonname"] = serde_json::json!("");
        fs::write(store.config_path(), json.to_string()).unwrap();

        let mut pki = manager(&dir);
        let err = pki.create_ca().unwrap_err();
        assert!(matches!(err, PkiError::MissingPrerequisite(ref m) if m == "No Subject available"));
        assert!(!pki.store().has_ca());
        assert_eq!(pki.config().unwrap().serial, 0);
    }

    #[test]
    fn create_dh_is_noop_for_elliptic_curves() {
        let dir = TempDir::new().unwrap();
        let mut pki = manager(&dir);
        pki.initialize(options(Algorithm::Ecdsa, "prime256v1")).unwrap();
        pki.create_dh().unwrap();
        assert!(!pki.store().has_dh());
    }

    #[test]
    fn revoke_asks_before_regenerating() {
        let dir = TempDir::new().unwrap();
        let prompter = ScriptedPrompter::new(["n"]);
        let mut pki = PkiManager::open(dir.path(), OpenSslBackend::new(), prompter).unwrap();
        pki.initialize(options(Algorithm::Ecdsa, "prime256v1")).unwrap();
        pki.create_ca().unwrap();
        pki.issue_client_identity("alice").unwrap();

        let report = pki.revoke("alice", None).unwrap();
        assert!(!report.regenerated);
        assert!(report.warnings.is_empty());
        assert!(pki
            .prompter()
            .transcript()
            .iter()
            .any(|l| l.starts_with("Regenerate Server configuration")));
    }

    #[test]
    fn failed_regeneration_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let mut pki = manager(&dir);
        pki.initialize(options(Algorithm::Rsa, "secp384r1")).unwrap();
        pki.create_ca().unwrap();
        pki.issue_client_identity("alice").unwrap();

        // no DH parameters, so regeneration fails after the CRL is written
        let report = pki.revoke("alice", Some(true)).unwrap();
        assert!(!report.regenerated);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("Missing DH"));
        assert!(pki.store().has_crl());
    }

    #[test]
    fn failed_cleanup_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let mut pki = manager(&dir);
        pki.initialize(options(Algorithm::Ecdsa, "prime256v1")).unwrap();
        pki.create_ca().unwrap();
        pki.issue_client_identity("alice").unwrap();

        // a non-empty directory where the bundle belongs cannot be unlinked
        let blocker = pki.store().bundle_path("alice");
        fs::create_dir_all(&blocker).unwrap();
        fs::write(blocker.join("keep"), "x").unwrap();

        let report = pki.revoke("alice", Some(false)).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("alice.visz"));
        assert!(pki.store().has_crl());
        assert!(!pki.store().cert_path("alice").exists());
        assert!(!pki.store().key_path("alice").exists());
    }

    #[test]
    fn revocation_list_cannot_be_revoked() {
        let dir = TempDir::new().unwrap();
        let mut pki = manager(&dir);
        pki.initialize(options(Algorithm::Ecdsa, "prime256v1")).unwrap();
        pki.create_ca().unwrap();
        pki.issue_client_identity("alice").unwrap();
        pki.revoke("alice", Some(false)).unwrap();
        let before = fs::read(pki.store().crl_path()).unwrap();

        assert!(matches!(
            pki.revoke(CRL_NAME, Some(false)),
            Err(PkiError::Validation(_))
        ));
        assert_eq!(fs::read(pki.store().crl_path()).unwrap(), before);
    }

    #[test]
    fn bundle_reuse_keeps_serial() {
        let dir = TempDir::new().unwrap();
        let mut pki = manager(&dir);
        pki.initialize(options(Algorithm::Ecdsa, "prime256v1")).unwrap();
        pki.create_ca().unwrap();

        pki.generate_client_bundle("carol", true).unwrap();
        let after_first = pki.config().unwrap().serial;
        pki.generate_client_bundle("carol", true).unwrap();
        assert_eq!(pki.config().unwrap().serial, after_first);
        pki.generate_client_bundle("carol", false).unwrap();
        assert_eq!(pki.config().unwrap().serial, after_first + 1);
    }
}
