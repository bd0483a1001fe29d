//! Distinguished-name fields embedded in every issued certificate.

use anyhow::anyhow;
use openssl::nid::Nid;
use openssl::x509::{X509Name, X509NameBuilder};
use serde::{Deserialize, Serialize};

/// Certificate subject.
///
/// The PKI keeps one default subject in its configuration; each issuance clones
/// it and replaces the common name via [`Subject::with_common_name`]. Optional
/// fields left as `None` are omitted from the certificate (the `.` blank
/// sentinel at the prompt maps to `None`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(rename = "commonname")]
    pub common_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organisation: Option<String>,
    #[serde(
        default,
        rename = "organisationalunit",
        skip_serializing_if = "Option::is_none"
    )]
    pub organisational_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Subject {
    /// Anonymous subject: only a common name.
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            country: None,
            state: None,
            locality: None,
            organisation: None,
            organisational_unit: None,
            email: None,
        }
    }

    pub fn with_common_name(&self, common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            ..self.clone()
        }
    }

    /// Build the OpenSSL name in C, ST, L, O, OU, CN, emailAddress order.
    pub fn to_x509_name(&self) -> anyhow::Result<X509Name> {
        if self.common_name.trim().is_empty() {
            return Err(anyhow!("Subject common name must not be blank"));
        }
        let mut builder = X509NameBuilder::new()
            .map_err(|e| anyhow!("Failed to create name builder: {}", e))?;

        let entries = [
            (Nid::COUNTRYNAME, self.country.as_deref(), "country"),
            (Nid::STATEORPROVINCENAME, self.state.as_deref(), "state/province"),
            (Nid::LOCALITYNAME, self.locality.as_deref(), "locality"),
            (Nid::ORGANIZATIONNAME, self.organisation.as_deref(), "organisation"),
            (
                Nid::ORGANIZATIONALUNITNAME,
                self.organisational_unit.as_deref(),
                "organisational unit",
            ),
            (Nid::COMMONNAME, Some(self.common_name.as_str()), "CN"),
            (Nid::PKCS9_EMAILADDRESS, self.email.as_deref(), "email"),
        ];
        for (nid, value, label) in entries {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                builder
                    .append_entry_by_nid(nid, value)
                    .map_err(|e| anyhow!("Failed to set {}: {}", label, e))?;
            }
        }
        Ok(builder.build())
    }
}
