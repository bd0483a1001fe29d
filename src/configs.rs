//! PKI directory configuration record.
//!
//! Stored as JSON in `<dir>/config.conf`. The subject fields are flattened into
//! the top-level object; `algorithm` is an integer (0 = RSA, 1 = ECDSA,
//! 2 = EdDSA). Missing optional keys fall back to the defaults below.

use crate::subject::Subject;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_KEY_SIZE: u32 = 2048;
pub const DEFAULT_VALID_DAYS: u32 = 3650;
pub const DEFAULT_PORT: u16 = 1194;
pub const DEFAULT_EC_CURVE: &str = "secp384r1";
pub const DEFAULT_ED_CURVE: &str = "ED25519";

pub const EC_CURVES: &[&str] = &["secp384r1", "prime256v1", "secp256r1", "secp521r1"];
pub const ED_CURVES: &[&str] = &["ED25519", "ED448"];

/// Key algorithm for every identity in one PKI directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Algorithm {
    #[default]
    Rsa,
    Ecdsa,
    EdDsa,
}

impl Algorithm {
    pub fn default_curve(self) -> &'static str {
        match self {
            Algorithm::EdDsa => DEFAULT_ED_CURVE,
            _ => DEFAULT_EC_CURVE,
        }
    }

    /// Only RSA deployments need Diffie-Hellman parameters.
    pub fn needs_dh(self) -> bool {
        matches!(self, Algorithm::Rsa)
    }

    pub fn supports_curve(self, curve: &str) -> bool {
        match self {
            Algorithm::Rsa => true,
            Algorithm::Ecdsa => EC_CURVES.iter().any(|c| c.eq_ignore_ascii_case(curve)),
            Algorithm::EdDsa => ED_CURVES.iter().any(|c| c.eq_ignore_ascii_case(curve)),
        }
    }
}

impl TryFrom<u8> for Algorithm {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Algorithm::Rsa),
            1 => Ok(Algorithm::Ecdsa),
            2 => Ok(Algorithm::EdDsa),
            other => Err(format!("unknown algorithm {}", other)),
        }
    }
}

impl From<Algorithm> for u8 {
    fn from(value: Algorithm) -> Self {
        match value {
            Algorithm::Rsa => 0,
            Algorithm::Ecdsa => 1,
            Algorithm::EdDsa => 2,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Algorithm::Rsa => "RSA",
            Algorithm::Ecdsa => "ECDSA",
            Algorithm::EdDsa => "EdDSA",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Udp,
    Tcp,
}

impl Protocol {
    pub fn server_directive(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp-server",
            Protocol::Udp => "udp",
        }
    }

    pub fn client_directive(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp-client",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
        })
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(Protocol::Udp),
            "tcp" => Ok(Protocol::Tcp),
            other => Err(format!("unknown protocol {}", other)),
        }
    }
}

/// Single source of truth for one PKI directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PkiConfig {
    #[serde(default)]
    pub algorithm: Algorithm,
    #[serde(rename = "keysize", default = "default_key_size")]
    pub key_size: u32,
    #[serde(rename = "eccurve", default, skip_serializing_if = "Option::is_none")]
    pub ec_curve: Option<String>,
    #[serde(rename = "validdays", default = "default_valid_days")]
    pub valid_days: u32,
    /// Next serial to hand out.
    pub serial: u64,
    #[serde(default)]
    pub suffix: String,
    #[serde(flatten)]
    pub subject: Subject,
    #[serde(flatten)]
    pub network: NetworkSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Public address clients connect to.
    pub server: String,
    #[serde(default = "default_port", deserialize_with = "port_from_number_or_string")]
    pub port: u16,
    #[serde(default)]
    pub proto: Protocol,
    #[serde(default = "default_redirect")]
    pub redirect: bool,
    #[serde(default)]
    pub dns: Vec<String>,
}

impl NetworkSettings {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: DEFAULT_PORT,
            proto: Protocol::default(),
            redirect: true,
            dns: Vec::new(),
        }
    }
}

impl PkiConfig {
    /// Fresh configuration for a directory that has issued nothing yet.
    pub fn new(algorithm: Algorithm, subject: Subject, network: NetworkSettings) -> Self {
        Self {
            algorithm,
            key_size: DEFAULT_KEY_SIZE,
            ec_curve: None,
            valid_days: DEFAULT_VALID_DAYS,
            serial: 0,
            suffix: String::new(),
            subject,
            network,
        }
    }

    /// Configured curve, or the algorithm's default when unset.
    pub fn curve_name(&self) -> &str {
        self.ec_curve
            .as_deref()
            .unwrap_or_else(|| self.algorithm.default_curve())
    }

    /// Hand out the current serial and advance the in-memory counter.
    ///
    /// The value is not durable until the configuration is saved.
    pub fn next_serial(&mut self) -> u64 {
        let serial = self.serial;
        self.serial += 1;
        serial
    }
}

fn default_key_size() -> u32 {
    DEFAULT_KEY_SIZE
}

fn default_valid_days() -> u32 {
    DEFAULT_VALID_DAYS
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_redirect() -> bool {
    true
}

// Older configuration files store the port as a string.
fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(u16),
        Text(String),
    }

    match RawPort::deserialize(deserializer)? {
        RawPort::Number(port) => Ok(port),
        RawPort::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port {:?}", text))),
    }
}
