//! OpenSSL implementation of the crypto backend.
//!
//! Certificate shapes:
//!
//! ```text
//! CA (self-signed)   BasicConstraints CA=true, keyCertSign | cRLSign | digitalSignature
//!   ├── server       CA=false, digitalSignature | keyEncipherment, EKU serverAuth
//!   └── client(s)    CA=false, digitalSignature, EKU clientAuth
//! ```
//!
//! All certificates carry the PKI serial handed out by the state store rather
//! than a random serial, so the CRL can reference them by that number.

use crate::configs::Algorithm;
use crate::crl;
use crate::crypto_backend::{CryptoBackend, Identity, KeySpec, LeafRole};
use crate::error::{PkiError, Result};
use crate::subject::Subject;
use anyhow::{anyhow, Context};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::dh::Dh;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, PKeyRef, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectKeyIdentifier,
};
use openssl::x509::{X509NameRef, X509};

const X509_VERSION_3: i32 = 2; // X509 version 3 is represented by 2
const DH_GENERATOR: u32 = 2;

/// Crypto backend built on the system OpenSSL library.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenSslBackend;

impl OpenSslBackend {
    pub fn new() -> Self {
        Self
    }
}

fn backend_error(e: anyhow::Error) -> PkiError {
    PkiError::Backend(format!("{:#}", e))
}

/// Map a configured curve name to its OpenSSL NID.
pub fn ec_curve_nid(curve: &str) -> anyhow::Result<Nid> {
    match curve.to_ascii_lowercase().as_str() {
        "secp384r1" => Ok(Nid::SECP384R1),
        "prime256v1" | "secp256r1" => Ok(Nid::X9_62_PRIME256V1),
        "secp521r1" => Ok(Nid::SECP521R1),
        other => Err(anyhow!("Unsupported EC curve {}", other)),
    }
}

pub fn generate_private_key(spec: KeySpec<'_>) -> anyhow::Result<PKey<Private>> {
    match spec.algorithm {
        Algorithm::Rsa => {
            let rsa = Rsa::generate(spec.key_size)
                .map_err(|e| anyhow!("Failed to generate RSA keypair: {}", e))?;
            PKey::from_rsa(rsa).map_err(|e| anyhow!("Failed to create private key: {}", e))
        }
        Algorithm::Ecdsa => {
            let group = EcGroup::from_curve_name(ec_curve_nid(spec.curve)?)
                .map_err(|e| anyhow!("Failed to load curve {}: {}", spec.curve, e))?;
            let ec = EcKey::generate(&group)
                .map_err(|e| anyhow!("Failed to generate EC keypair: {}", e))?;
            PKey::from_ec_key(ec).map_err(|e| anyhow!("Failed to create private key: {}", e))
        }
        Algorithm::EdDsa => match spec.curve.to_ascii_uppercase().as_str() {
            "ED25519" => PKey::generate_ed25519()
                .map_err(|e| anyhow!("Failed to generate Ed25519 keypair: {}", e)),
            "ED448" => PKey::generate_ed448()
                .map_err(|e| anyhow!("Failed to generate Ed448 keypair: {}", e)),
            other => Err(anyhow!("Unsupported EdDSA curve {}", other)),
        },
    }
}

/// EdDSA signs the message directly; everything else uses SHA-256.
pub(crate) fn signing_digest<T>(key: &PKeyRef<T>) -> MessageDigest {
    match key.id() {
        Id::ED25519 | Id::ED448 => MessageDigest::null(),
        _ => MessageDigest::sha256(),
    }
}

fn serial_to_bn(serial: u64) -> anyhow::Result<BigNum> {
    BigNum::from_slice(&serial.to_be_bytes()).context("Failed to encode serial number")
}

/// Build a certificate for `subject`. `issuer` is `None` for the self-signed CA.
fn build_certificate(
    subject: &Subject,
    private_key: &PKey<Private>,
    issuer: Option<&Identity>,
    spec: KeySpec<'_>,
    serial: u64,
    role: Option<LeafRole>,
) -> anyhow::Result<X509> {
    let mut builder =
        X509::builder().map_err(|e| anyhow!("Failed to create X509 builder: {}", e))?;
    builder
        .set_version(X509_VERSION_3)
        .map_err(|e| anyhow!("Failed to set version: {}", e))?;

    let asn1_serial = serial_to_bn(serial)?.to_asn1_integer()?;
    builder.set_serial_number(&asn1_serial)?;

    let name = subject.to_x509_name()?;
    builder
        .set_subject_name(&name)
        .map_err(|e| anyhow!("Failed to set subject: {}", e))?;
    match issuer {
        Some(ca) => builder
            .set_issuer_name(ca.cert.subject_name())
            .map_err(|e| anyhow!("Failed to set issuer from CA: {}", e))?,
        None => builder
            .set_issuer_name(&name)
            .map_err(|e| anyhow!("Failed to set issuer: {}", e))?,
    }

    let not_before = Asn1Time::days_from_now(0)
        .map_err(|e| anyhow!("Failed to create not_before: {}", e))?;
    builder
        .set_not_before(&not_before)
        .map_err(|e| anyhow!("Failed to set not_before: {}", e))?;
    let not_after = Asn1Time::days_from_now(spec.valid_days)
        .map_err(|e| anyhow!("Failed to create not_after: {}", e))?;
    builder
        .set_not_after(&not_after)
        .map_err(|e| anyhow!("Failed to set not_after: {}", e))?;

    builder
        .set_pubkey(private_key)
        .map_err(|e| anyhow!("Failed to set public key: {}", e))?;

    match role {
        None => {
            let bc = BasicConstraints::new()
                .critical()
                .ca()
                .build()
                .map_err(|e| anyhow!("Failed to build BasicConstraints: {}", e))?;
            builder.append_extension(bc)?;
            let mut ku = KeyUsage::new();
            ku.critical();
            ku.key_cert_sign();
            ku.crl_sign();
            ku.digital_signature();
            builder.append_extension(
                ku.build()
                    .map_err(|e| anyhow!("Failed to build KeyUsage: {}", e))?,
            )?;
        }
        Some(role) => {
            let bc = BasicConstraints::new()
                .critical()
                .build()
                .map_err(|e| anyhow!("Failed to build BasicConstraints: {}", e))?;
            builder.append_extension(bc)?;

            let mut ku = KeyUsage::new();
            ku.critical();
            ku.digital_signature();
            let mut eku = ExtendedKeyUsage::new();
            match role {
                LeafRole::Server => {
                    ku.key_encipherment();
                    eku.server_auth();
                }
                LeafRole::Client => {
                    eku.client_auth();
                }
            }
            builder.append_extension(
                ku.build()
                    .map_err(|e| anyhow!("Failed to build KeyUsage: {}", e))?,
            )?;
            builder.append_extension(
                eku.build()
                    .map_err(|e| anyhow!("Failed to build ExtendedKeyUsage: {}", e))?,
            )?;
        }
    }

    let ski = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(None, None))
        .map_err(|e| anyhow!("Failed to build SubjectKeyIdentifier: {}", e))?;
    builder.append_extension(ski)?;
    if let Some(ca) = issuer {
        let aki = AuthorityKeyIdentifier::new()
            .keyid(false)
            .build(&builder.x509v3_context(Some(&*ca.cert), None))
            .map_err(|e| anyhow!("Failed to build AuthorityKeyIdentifier: {}", e))?;
        builder.append_extension(aki)?;
    }

    let signing_key = issuer.map(|ca| &ca.key).unwrap_or(private_key);
    builder
        .sign(signing_key, signing_digest(signing_key))
        .map_err(|e| anyhow!("Failed to sign certificate: {}", e))?;
    Ok(builder.build())
}

/// Recover the subject fields from a parsed certificate name.
pub fn subject_from_name(name: &X509NameRef) -> Subject {
    let field = |nid: Nid| {
        name.entries_by_nid(nid)
            .next()
            .and_then(|entry| entry.data().as_utf8().ok())
            .map(|value| value.to_string())
    };
    Subject {
        common_name: field(Nid::COMMONNAME).unwrap_or_default(),
        country: field(Nid::COUNTRYNAME),
        state: field(Nid::STATEORPROVINCENAME),
        locality: field(Nid::LOCALITYNAME),
        organisation: field(Nid::ORGANIZATIONNAME),
        organisational_unit: field(Nid::ORGANIZATIONALUNITNAME),
        email: field(Nid::PKCS9_EMAILADDRESS),
    }
}

impl CryptoBackend for OpenSslBackend {
    fn create_ca(&self, subject: &Subject, spec: KeySpec<'_>, serial: u64) -> Result<Identity> {
        let key = generate_private_key(spec).map_err(backend_error)?;
        let cert =
            build_certificate(subject, &key, None, spec, serial, None).map_err(backend_error)?;
        Ok(Identity {
            subject: subject.clone(),
            cert,
            key,
        })
    }

    fn create_dh_params(&self, key_size: u32) -> Result<String> {
        let dh = Dh::generate_params(key_size, DH_GENERATOR)?;
        let pem = dh.params_to_pem()?;
        String::from_utf8(pem).map_err(|e| PkiError::Backend(e.to_string()))
    }

    fn issue_identity(
        &self,
        subject: &Subject,
        issuer: &Identity,
        spec: KeySpec<'_>,
        serial: u64,
        role: LeafRole,
    ) -> Result<Identity> {
        let key = generate_private_key(spec).map_err(backend_error)?;
        let cert = build_certificate(subject, &key, Some(issuer), spec, serial, Some(role))
            .map_err(backend_error)?;
        Ok(Identity {
            subject: subject.clone(),
            cert,
            key,
        })
    }

    fn update_crl(
        &self,
        issuer: &Identity,
        algorithm: Algorithm,
        existing_crl: Option<&str>,
        cert_to_revoke: &str,
        valid_days: u32,
    ) -> Result<String> {
        crl::reissue_crl(issuer, algorithm, existing_crl, cert_to_revoke, valid_days)
            .map_err(backend_error)
    }

    fn encode_cert_pem(&self, identity: &Identity) -> Result<String> {
        let pem = identity.cert.to_pem()?;
        String::from_utf8(pem).map_err(|e| PkiError::Backend(e.to_string()))
    }

    fn encode_key_pem(&self, identity: &Identity) -> Result<String> {
        let pem = identity.key.private_key_to_pem_pkcs8()?;
        String::from_utf8(pem).map_err(|e| PkiError::Backend(e.to_string()))
    }

    fn load_identity(&self, cert_pem: &str, key_pem: &str) -> Result<Identity> {
        let cert = X509::from_pem(cert_pem.as_bytes())
            .map_err(|e| PkiError::Backend(format!("Failed to parse certificate: {}", e)))?;
        let key = PKey::private_key_from_pem(key_pem.as_bytes())
            .map_err(|e| PkiError::Backend(format!("Failed to parse private key: {}", e)))?;
        let public = cert.public_key()?;
        if !public.public_eq(&key) {
            return Err(PkiError::Backend(
                "certificate and private key do not match".to_string(),
            ));
        }
        Ok(Identity {
            subject: subject_from_name(cert.subject_name()),
            cert,
            key,
        })
    }
}
