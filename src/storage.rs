//! On-disk PKI state store.
//!
//! Layout relative to the PKI directory:
//!
//! ```text
//! <dir>/config.conf              configuration (JSON)
//! <dir>/pki/ca.{crt,key}         CA identity
//! <dir>/pki/<name>.{crt,key}     issued identities (server, clients)
//! <dir>/pki/dh.pem               Diffie-Hellman parameters (RSA only)
//! <dir>/pki/crl.crt              certificate revocation list
//! <dir>/server/                  generated server configuration
//! <dir>/clients/<name>.visz      packaged client bundles
//! ```

use crate::configs::PkiConfig;
use crate::error::{PkiError, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub const CONFIG_FILE: &str = "config.conf";
pub const PKI_DIR: &str = "pki";
pub const CLIENTS_DIR: &str = "clients";
pub const SERVER_DIR: &str = "server";
pub const CA_NAME: &str = "ca";
pub const SERVER_NAME: &str = "server";
pub const CRL_NAME: &str = "crl";
pub const DH_NAME: &str = "dh";
pub const BUNDLE_EXTENSION: &str = "visz";

/// Paths and persistence for one PKI directory.
#[derive(Debug, Clone)]
pub struct PkiStore {
    root: PathBuf,
}

impl PkiStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn pki_dir(&self) -> PathBuf {
        self.root.join(PKI_DIR)
    }

    pub fn clients_dir(&self) -> PathBuf {
        self.root.join(CLIENTS_DIR)
    }

    pub fn server_dir(&self) -> PathBuf {
        self.root.join(SERVER_DIR)
    }

    pub fn cert_path(&self, name: &str) -> PathBuf {
        self.pki_dir().join(format!("{}.crt", name))
    }

    pub fn key_path(&self, name: &str) -> PathBuf {
        self.pki_dir().join(format!("{}.key", name))
    }

    pub fn dh_path(&self) -> PathBuf {
        self.pki_dir().join(format!("{}.pem", DH_NAME))
    }

    pub fn crl_path(&self) -> PathBuf {
        self.pki_dir().join(format!("{}.crt", CRL_NAME))
    }

    pub fn bundle_path(&self, name: &str) -> PathBuf {
        self.clients_dir()
            .join(format!("{}.{}", name, BUNDLE_EXTENSION))
    }

    // ---- guards -------------------------------------------------------------

    pub fn config_exists(&self) -> bool {
        self.config_path().is_file()
    }

    pub fn has_ca(&self) -> bool {
        self.has_identity(CA_NAME)
    }

    /// An identity counts as issued when both its certificate and key exist.
    pub fn has_identity(&self, name: &str) -> bool {
        self.cert_path(name).is_file() && self.key_path(name).is_file()
    }

    pub fn has_dh(&self) -> bool {
        self.dh_path().is_file()
    }

    pub fn has_crl(&self) -> bool {
        self.crl_path().is_file()
    }

    // ---- configuration ------------------------------------------------------

    /// Load the configuration. `Ok(None)` means the directory is uninitialized.
    pub fn load(&self) -> Result<Option<PkiConfig>> {
        let path = self.config_path();
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PkiError::io(
                    format!("Failed to load config at {}", path.display()),
                    e,
                ))
            }
        };
        let config: PkiConfig =
            serde_json::from_str(&json).map_err(|e| PkiError::corrupt(&path, e))?;
        debug!(path = %path.display(), serial = config.serial, "loaded configuration");
        Ok(Some(config))
    }

    /// Write the full configuration, replacing the previous file atomically.
    pub fn save(&self, config: &PkiConfig) -> Result<()> {
        let json = serde_json::to_vec_pretty(config)
            .map_err(|e| PkiError::corrupt(self.config_path(), e))?;
        write_atomic(&self.config_path(), &json)?;
        debug!(serial = config.serial, "saved configuration");
        Ok(())
    }

    // ---- identities ---------------------------------------------------------

    pub fn write_identity(&self, name: &str, cert_pem: &str, key_pem: &str) -> Result<()> {
        fs::create_dir_all(self.pki_dir())
            .map_err(|e| PkiError::io("Failed to create PKI dir", e))?;
        write_atomic(&self.cert_path(name), cert_pem.as_bytes())?;
        write_atomic(&self.key_path(name), key_pem.as_bytes())?;
        restrict_permissions(&self.key_path(name))?;
        Ok(())
    }

    /// Read `(certificate PEM, key PEM)` for an issued identity.
    pub fn read_identity(&self, name: &str) -> Result<(String, String)> {
        let cert = self.read_cert(name)?;
        let key_path = self.key_path(name);
        let key = fs::read_to_string(&key_path).map_err(|e| {
            PkiError::io(format!("Failed to read key {}", key_path.display()), e)
        })?;
        Ok((cert, key))
    }

    pub fn read_cert(&self, name: &str) -> Result<String> {
        let path = self.cert_path(name);
        fs::read_to_string(&path)
            .map_err(|e| PkiError::io(format!("Failed to read certificate {}", path.display()), e))
    }

    /// Delete an identity's certificate, key and packaged bundle.
    ///
    /// Failures are collected and returned, not raised; a file that is
    /// already gone is not a failure.
    pub fn remove_identity(&self, name: &str) -> Vec<String> {
        let mut warnings = Vec::new();
        for path in [self.cert_path(name), self.key_path(name), self.bundle_path(name)] {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warnings.push(format!(
                    "Failed to remove revoked PKI data {}: {}",
                    path.display(),
                    e
                )),
            }
        }
        warnings
    }

    /// Names of every issued identity other than the CA, sorted.
    pub fn list_identities(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(self.pki_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PkiError::io("Failed to list PKI dir", e)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PkiError::io("Failed to list PKI dir", e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("crt") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if name != CA_NAME && name != CRL_NAME && self.has_identity(name) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    // ---- DH / CRL / bundles -------------------------------------------------

    pub fn write_dh(&self, pem: &str) -> Result<()> {
        fs::create_dir_all(self.pki_dir())
            .map_err(|e| PkiError::io("Failed to create PKI dir", e))?;
        write_atomic(&self.dh_path(), pem.as_bytes())
    }

    pub fn read_crl(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.crl_path()) {
            Ok(pem) => Ok(Some(pem)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PkiError::io("Failed to read CRL off disk", e)),
        }
    }

    pub fn write_crl(&self, pem: &str) -> Result<()> {
        write_atomic(&self.crl_path(), pem.as_bytes())
    }

    pub fn write_bundle(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(self.clients_dir())
            .map_err(|e| PkiError::io("Failed to make clients directory", e))?;
        let path = self.bundle_path(name);
        write_atomic(&path, bytes)?;
        Ok(path)
    }
}

/// Write to a sibling temp file, then rename over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let context = || format!("Failed to write {}", path.display());

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PkiError::io(context(), e))?;
    tmp.write_all(bytes).map_err(|e| PkiError::io(context(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| PkiError::io(context(), e))?;
    tmp.persist(path)
        .map_err(|e| PkiError::io(context(), e.error))?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| PkiError::io(format!("Failed to restrict {}", path.display()), e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
