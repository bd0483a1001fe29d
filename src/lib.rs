//! openvpn-pki - PKI directory manager for OpenVPN deployments
//!
//! Maintains a self-contained Public Key Infrastructure directory for a single
//! OpenVPN server: one certificate authority, a server identity, any number of
//! client identities, a certificate revocation list, the rendered server
//! configuration and one distributable bundle per client.
//!
//! # Overview
//!
//! ```text
//! CA (self-signed, serial 0)
//!   ├── server   (serverAuth)
//!   └── <client> (clientAuth)   -> clients/<client>.visz
//! ```
//!
//! Every certificate in a directory uses the same key algorithm (RSA, ECDSA
//! or EdDSA) and the serials come from a single counter stored in the
//! configuration, so no serial is ever reused, even across revocations.
//!
//! # Directory layout
//!
//! ```text
//! <dir>/config.conf                    JSON configuration
//! <dir>/pki/{ca,server,<name>}.{crt,key}
//! <dir>/pki/dh.pem                     RSA only
//! <dir>/pki/crl.crt                    after the first revocation
//! <dir>/server/server<suffix>.conf     plus copies of the material it references
//! <dir>/clients/<name>.visz            gzip tar with one <name>/ directory
//! ```
//!
//! # Example
//!
//! ```no_run
//! use openvpn_pki::configs::Algorithm;
//! use openvpn_pki::lifecycle::{InitOptions, PkiManager};
//! use openvpn_pki::pki_generator::OpenSslBackend;
//! use openvpn_pki::ui::Unattended;
//!
//! let mut pki = PkiManager::open("./vpn", OpenSslBackend::new(), Unattended)?;
//! pki.bootstrap(InitOptions {
//!     algorithm: Algorithm::Ecdsa,
//!     server: Some("vpn.example.com".into()),
//!     ..InitOptions::default()
//! })?;
//! pki.generate_client_bundle("alice", false)?;
//! pki.revoke("alice", Some(true))?;
//! # Ok::<(), openvpn_pki::error::PkiError>(())
//! ```
//!
//! # Modules
//!
//! - [`lifecycle`]: the orchestrator; every operation a user can request.
//! - [`storage`]: paths, guards and persistence for one directory.
//! - [`configs`] / [`subject`]: the configuration record and certificate subject.
//! - [`crypto_backend`]: the trait the orchestrator issues certificates through,
//!   implemented with OpenSSL in [`pki_generator`] and [`crl`].
//! - [`templates`]: OpenVPN server and client config rendering.
//! - [`key_archive`]: client bundle packaging.
//! - [`ui`]: prompting and the initialization questionnaire.
//! - [`error`]: the error taxonomy shared by all of the above.

pub mod configs;
pub mod crl;
pub mod crypto_backend;
pub mod error;
pub mod key_archive;
pub mod lifecycle;
pub mod pki_generator;
pub mod storage;
pub mod subject;
pub mod templates;
pub mod ui;
