// Allow large error types - the Error enum includes OIDs inline for
// debugging convenience. Boxing them would add complexity and
// allocations for a marginal size reduction.
#![allow(clippy::result_large_err)]

//! # snmpkit
//!
//! Async SNMP client library for Rust with full SNMPv1, v2c, and v3
//! (USM) support.
//!
//! ## Features
//!
//! - BER codec hardened against malformed input
//! - SNMPv3 User-based Security Model: MD5/SHA-1/SHA-2 authentication,
//!   DES and AES-128/192/256 privacy with Reeder and Blumenthal key
//!   extensions, engine discovery, replay-resistant salt handling
//! - GETNEXT/GETBULK walk engine with strict lexicographic ordering
//!   enforcement and leaf-OID fallback
//! - Transport as a narrow seam: UDP included, mock for tests
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use snmpkit::{Auth, Client, oid};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), snmpkit::Error> {
//!     let client = Client::builder("192.168.1.1:161", Auth::v2c("public"))
//!         .timeout(Duration::from_secs(5))
//!         .connect()
//!         .await?;
//!
//!     let result = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await?;
//!     println!("sysDescr: {}", result.value);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## SNMPv3
//!
//! ```rust,no_run
//! use snmpkit::{Auth, Client, oid};
//! use snmpkit::v3::{AuthProtocol, PrivProtocol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), snmpkit::Error> {
//!     let client = Client::builder(
//!         "192.168.1.1:161",
//!         Auth::usm("admin")
//!             .auth(AuthProtocol::Sha256, "authpass123")
//!             .privacy(PrivProtocol::Aes128, "privpass123"),
//!     )
//!     .connect()
//!     .await?;
//!
//!     let result = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await?;
//!     println!("sysDescr: {}", result.value);
//!
//!     Ok(())
//! }
//! ```

pub mod ber;
pub mod client;
pub mod error;
pub mod message;
pub mod oid;
pub mod pdu;
pub mod transport;
pub mod v3;
pub mod value;
pub mod varbind;
pub mod version;

pub(crate) mod util;

// Re-exports for convenience
pub use client::{
    Auth, Client, ClientBuilder, ClientConfig, CommunityVersion, UsmAuth, UsmBuilder,
    V3SecurityConfig, Walk, WalkMode,
};
pub use error::{
    AuthErrorKind, CryptoErrorKind, DecodeErrorKind, EncodeErrorKind, Error, ErrorStatus,
    OidErrorKind, Result,
};
pub use message::SecurityLevel;
pub use oid::Oid;
pub use pdu::{GetBulkPdu, Pdu, PduType, TrapV1Pdu};
pub use transport::{Transport, UdpTransport};
pub use v3::{password_caching, AuthProtocol, LocalizedKey, ParseProtocolError, PrivProtocol};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;

/// Testing utilities: hex helpers shared with the integration suite.
pub mod testing {
    pub use crate::util::{decode_hex, encode_hex, HexDecodeError};
}
