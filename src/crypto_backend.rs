//! Contract between the lifecycle orchestrator and the cryptographic backend.

use crate::configs::Algorithm;
use crate::error::Result;
use crate::subject::Subject;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;

/// A certificate, its private key and the subject it was issued to.
pub struct Identity {
    pub subject: Subject,
    pub cert: X509,
    pub key: PKey<Private>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("subject", &self.subject)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Key parameters shared by every issuance in one PKI directory.
#[derive(Debug, Clone, Copy)]
pub struct KeySpec<'a> {
    pub algorithm: Algorithm,
    pub key_size: u32,
    pub curve: &'a str,
    pub valid_days: u32,
}

/// Role of a leaf certificate; drives its extended key usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafRole {
    Server,
    Client,
}

/// Cryptographic operations the orchestrator needs. Every failure is fatal to
/// the calling operation and is never retried.
pub trait CryptoBackend {
    fn create_ca(&self, subject: &Subject, spec: KeySpec<'_>, serial: u64) -> Result<Identity>;

    /// PEM-encoded Diffie-Hellman parameters of `key_size` bits.
    fn create_dh_params(&self, key_size: u32) -> Result<String>;

    fn issue_identity(
        &self,
        subject: &Subject,
        issuer: &Identity,
        spec: KeySpec<'_>,
        serial: u64,
        role: LeafRole,
    ) -> Result<Identity>;

    /// Re-issue the CRL: every entry of `existing_crl` plus `cert_to_revoke`.
    fn update_crl(
        &self,
        issuer: &Identity,
        algorithm: Algorithm,
        existing_crl: Option<&str>,
        cert_to_revoke: &str,
        valid_days: u32,
    ) -> Result<String>;

    fn encode_cert_pem(&self, identity: &Identity) -> Result<String>;

    fn encode_key_pem(&self, identity: &Identity) -> Result<String>;

    /// Parse a certificate/key pair; fails if either is malformed or they do
    /// not belong together.
    fn load_identity(&self, cert_pem: &str, key_pem: &str) -> Result<Identity>;
}
