//! Certificate revocation list re-issuance.
//!
//! The CRL is never edited in place. Each revocation reads the previous list
//! (if any), keeps every entry with its original revocation date, adds the new
//! certificate, and signs a fresh v2 CRL with the CA key:
//!
//! ```text
//! CertificateList ::= SEQUENCE {
//!     tbsCertList          TBSCertList,
//!     signatureAlgorithm   AlgorithmIdentifier,
//!     signatureValue       BIT STRING }
//! ```

use crate::configs::Algorithm;
use crate::crypto_backend::Identity;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Datelike, Duration, Utc};
use openssl::asn1::Asn1Time;
use openssl::hash::MessageDigest;
use openssl::pkey::Id;
use openssl::sign::Signer;
use openssl::x509::{X509Crl, X509};
use pem::{EncodeConfig, LineEnding, Pem};
use yasna::models::{GeneralizedTime, ObjectIdentifier, UTCTime};
use yasna::{DERWriter, Tag};

const OID_SHA256_WITH_RSA: &[u64] = &[1, 2, 840, 113549, 1, 1, 11];
const OID_ECDSA_WITH_SHA256: &[u64] = &[1, 2, 840, 10045, 4, 3, 2];
const OID_ED25519: &[u64] = &[1, 3, 101, 112];
const OID_ED448: &[u64] = &[1, 3, 101, 113];
const OID_CRL_NUMBER: &[u64] = &[2, 5, 29, 20];

const CRL_V2: u64 = 1;
const PEM_TAG: &str = "X509 CRL";

#[derive(Debug, Clone, PartialEq, Eq)]
struct RevokedEntry {
    /// Big-endian serial magnitude.
    serial: Vec<u8>,
    revoked_at: DateTime<Utc>,
}

/// Produce a PEM CRL containing `existing_crl`'s entries plus `cert_to_revoke`.
pub fn reissue_crl(
    issuer: &Identity,
    algorithm: Algorithm,
    existing_crl: Option<&str>,
    cert_to_revoke: &str,
    valid_days: u32,
) -> Result<String> {
    check_issuer_algorithm(issuer, algorithm)?;

    let cert = X509::from_pem(cert_to_revoke.as_bytes())
        .context("Failed to parse certificate to revoke")?;
    let ca_public = issuer.cert.public_key()?;
    if !cert.verify(&ca_public)? {
        bail!("certificate was not issued by this CA");
    }

    let now = Utc::now();
    let mut entries = match existing_crl {
        Some(pem) => previous_entries(issuer, pem, now)?,
        None => Vec::new(),
    };
    let serial = cert.serial_number().to_bn()?.to_vec();
    if !entries.iter().any(|entry| entry.serial == serial) {
        entries.push(RevokedEntry {
            serial,
            revoked_at: now,
        });
    }

    let next_update = now + Duration::days(i64::from(valid_days));
    let signature_oid = signature_oid(issuer.key.id())?;
    let issuer_name = issuer.cert.subject_name().to_der()?;

    let der = yasna::try_construct_der(|writer| {
        writer.write_sequence(|writer| {
            let tbs_cert_list = yasna::try_construct_der(|writer| {
                write_tbs_cert_list(
                    writer,
                    &signature_oid,
                    &issuer_name,
                    &entries,
                    now,
                    next_update,
                )
            })?;
            writer.next().write_der(&tbs_cert_list);
            write_algorithm_identifier(writer.next(), &signature_oid);
            let signature = sign(issuer, &tbs_cert_list)?;
            writer
                .next()
                .write_bitvec_bytes(&signature, signature.len() * 8);
            Ok::<(), anyhow::Error>(())
        })
    })?;

    let config = EncodeConfig::new().set_line_ending(LineEnding::LF);
    Ok(pem::encode_config(&Pem::new(PEM_TAG, der), config))
}

fn check_issuer_algorithm(issuer: &Identity, algorithm: Algorithm) -> Result<()> {
    let id = issuer.key.id();
    let matches = match algorithm {
        Algorithm::Rsa => id == Id::RSA,
        Algorithm::Ecdsa => id == Id::EC,
        Algorithm::EdDsa => id == Id::ED25519 || id == Id::ED448,
    };
    if !matches {
        bail!("CA key does not match configured algorithm {}", algorithm);
    }
    Ok(())
}

fn previous_entries(
    issuer: &Identity,
    pem: &str,
    now: DateTime<Utc>,
) -> Result<Vec<RevokedEntry>> {
    let crl = X509Crl::from_pem(pem.as_bytes()).context("Failed to parse existing CRL")?;
    if !crl.verify(&issuer.key)? {
        bail!("existing CRL is not signed by this CA");
    }
    let Some(revoked) = crl.get_revoked() else {
        return Ok(Vec::new());
    };

    // Dates are recovered as offsets from a shared reference point.
    let reference = Asn1Time::from_unix(now.timestamp() as _)?;
    revoked
        .iter()
        .map(|entry| -> Result<RevokedEntry> {
            let serial = entry.serial_number().to_bn()?.to_vec();
            let diff = entry.revocation_date().diff(&reference)?;
            let offset = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
            Ok(RevokedEntry {
                serial,
                revoked_at: now - Duration::seconds(offset),
            })
        })
        .collect()
}

fn signature_oid(id: Id) -> Result<ObjectIdentifier> {
    let components = match id {
        Id::RSA => OID_SHA256_WITH_RSA,
        Id::EC => OID_ECDSA_WITH_SHA256,
        Id::ED25519 => OID_ED25519,
        Id::ED448 => OID_ED448,
        _ => return Err(anyhow!("unsupported CA key type for CRL signing")),
    };
    Ok(ObjectIdentifier::from_slice(components))
}

/// RSA carries an explicit NULL parameter, EC and Edwards keys carry none.
fn write_algorithm_identifier(writer: DERWriter, oid: &ObjectIdentifier) {
    writer.write_sequence(|writer| {
        writer.next().write_oid(oid);
        if oid.components().as_slice() == OID_SHA256_WITH_RSA {
            writer.next().write_null();
        }
    })
}

//  TBSCertList ::= SEQUENCE {
//       version                 INTEGER (v2),
//       signature               AlgorithmIdentifier,
//       issuer                  Name,
//       thisUpdate              Time,
//       nextUpdate              Time,
//       revokedCertificates     SEQUENCE OF SEQUENCE { serial, date } OPTIONAL,
//       crlExtensions       [0] EXPLICIT Extensions }
fn write_tbs_cert_list(
    writer: DERWriter,
    signature_oid: &ObjectIdentifier,
    issuer_name: &[u8],
    entries: &[RevokedEntry],
    this_update: DateTime<Utc>,
    next_update: DateTime<Utc>,
) -> Result<()> {
    writer.write_sequence(|writer| {
        writer.next().write_u64(CRL_V2);
        write_algorithm_identifier(writer.next(), signature_oid);
        writer.next().write_der(issuer_name);
        write_time(writer.next(), this_update)?;
        write_time(writer.next(), next_update)?;
        if !entries.is_empty() {
            writer.next().write_sequence(|writer| {
                for entry in entries {
                    writer.next().write_sequence(|writer| {
                        writer.next().write_bigint_bytes(&entry.serial, true);
                        write_time(writer.next(), entry.revoked_at)
                    })?;
                }
                Ok::<(), anyhow::Error>(())
            })?;
        }
        writer.next().write_tagged(Tag::context(0), |writer| {
            writer.write_sequence(|writer| {
                writer.next().write_sequence(|writer| {
                    writer
                        .next()
                        .write_oid(&ObjectIdentifier::from_slice(OID_CRL_NUMBER));
                    let number =
                        yasna::construct_der(|writer| writer.write_u64(entries.len() as u64));
                    writer.next().write_bytes(&number);
                })
            })
        });
        Ok(())
    })
}

/// UTCTime through 2049, GeneralizedTime after.
fn write_time(writer: DERWriter, at: DateTime<Utc>) -> Result<()> {
    if (1950..2050).contains(&at.year()) {
        let text = at.format("%y%m%d%H%M%SZ").to_string();
        let time = UTCTime::parse(text.as_bytes())
            .ok_or_else(|| anyhow!("Failed to encode time {}", text))?;
        writer.write_utctime(&time);
    } else {
        let text = at.format("%Y%m%d%H%M%SZ").to_string();
        let time = GeneralizedTime::parse(text.as_bytes())
            .ok_or_else(|| anyhow!("Failed to encode time {}", text))?;
        writer.write_generalized_time(&time);
    }
    Ok(())
}

fn sign(issuer: &Identity, tbs: &[u8]) -> Result<Vec<u8>> {
    let mut signer = match issuer.key.id() {
        Id::ED25519 | Id::ED448 => Signer::new_without_digest(&issuer.key)?,
        _ => Signer::new(MessageDigest::sha256(), &issuer.key)?,
    };
    signer
        .sign_oneshot_to_vec(tbs)
        .map_err(|e| anyhow!("Failed to sign CRL: {}", e))
}
