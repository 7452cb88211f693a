//! Authentication key derivation and HMAC operations (RFC 3414, RFC 7860).
//!
//! Key derivation is the expensive part of USM: the passphrase is
//! expanded to exactly 1 MiB and hashed once ("password to key",
//! RFC 3414 A.2), then bound to the peer with
//! `KuL = H(Ku || engineID || Ku)` ("localization"). The Ku step is
//! cached process-wide keyed by (protocol, passphrase) so that sessions
//! sharing credentials pay for the expansion once; localization is cheap
//! and never cached because KuL is per-engine secret material.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use digest::Digest;
use hmac::{Hmac, Mac};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{AuthProtocol, PrivProtocol};
use crate::error::{Error, Result};

/// RFC 3414 A.2: the passphrase is repeated to exactly this many octets.
const EXPANSION_SIZE: usize = 1_048_576;

// ---------------------------------------------------------------------------
// Password-to-key cache
// ---------------------------------------------------------------------------

/// Cache key for the password-to-key map.
///
/// Including the protocol keeps an MD5-derived Ku from ever being served
/// for a SHA session with the same passphrase.
#[derive(Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    protocol: AuthProtocol,
    passphrase: Vec<u8>,
}

/// Process-wide Ku cache. `None` means the cache is currently dropped
/// (disabled); re-enabling installs a fresh empty map. The whole map is
/// swapped under the write lock so readers never observe a torn state.
static PASSWORD_KEY_CACHE: RwLock<Option<HashMap<CacheKey, Vec<u8>>>> = RwLock::new(None);
static PASSWORD_CACHE_DISABLED: AtomicBool = AtomicBool::new(false);

/// Enable or disable the process-wide password-to-key cache.
///
/// Caching is on by default. Disabling clears all cached keys;
/// re-enabling starts from an empty cache. Derived keys are identical
/// either way, only the cost of repeat derivations changes.
pub fn password_caching(enable: bool) {
    let mut cache = PASSWORD_KEY_CACHE
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if enable {
        if PASSWORD_CACHE_DISABLED.load(Ordering::Acquire) {
            *cache = Some(HashMap::new());
        }
    } else {
        *cache = None;
    }
    PASSWORD_CACHE_DISABLED.store(!enable, Ordering::Release);
}

/// Password-to-key with caching.
fn cached_password_to_key(protocol: AuthProtocol, password: &[u8]) -> Result<Vec<u8>> {
    if PASSWORD_CACHE_DISABLED.load(Ordering::Acquire) {
        return password_to_key(protocol, password);
    }

    let key = CacheKey {
        protocol,
        passphrase: password.to_vec(),
    };

    {
        let cache = PASSWORD_KEY_CACHE
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(map) = cache.as_ref() {
            if let Some(hit) = map.get(&key) {
                return Ok(hit.clone());
            }
        }
    }

    let hashed = password_to_key(protocol, password)?;

    if !PASSWORD_CACHE_DISABLED.load(Ordering::Acquire) {
        let mut cache = PASSWORD_KEY_CACHE
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache
            .get_or_insert_with(HashMap::new)
            .insert(key, hashed.clone());
    }

    Ok(hashed)
}

// ---------------------------------------------------------------------------
// Derivation primitives
// ---------------------------------------------------------------------------

/// Password-to-key transformation (RFC 3414 Section A.2).
///
/// The passphrase is cyclically repeated to 1 MiB and hashed once. The
/// expansion is written in 64-byte chunks so no megabyte buffer exists.
fn password_to_key(protocol: AuthProtocol, password: &[u8]) -> Result<Vec<u8>> {
    if password.is_empty() {
        return Err(Error::Config(
            "authentication or privacy passphrase must not be empty".into(),
        ));
    }

    match protocol {
        AuthProtocol::Md5 => Ok(password_to_key_impl::<md5::Md5>(password)),
        AuthProtocol::Sha1 => Ok(password_to_key_impl::<sha1::Sha1>(password)),
        AuthProtocol::Sha224 => Ok(password_to_key_impl::<sha2::Sha224>(password)),
        AuthProtocol::Sha256 => Ok(password_to_key_impl::<sha2::Sha256>(password)),
        AuthProtocol::Sha384 => Ok(password_to_key_impl::<sha2::Sha384>(password)),
        AuthProtocol::Sha512 => Ok(password_to_key_impl::<sha2::Sha512>(password)),
    }
}

fn password_to_key_impl<D: Digest>(password: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();

    let mut chunk = [0u8; 64];
    let mut password_index = 0;
    let mut written = 0;

    while written < EXPANSION_SIZE {
        for byte in &mut chunk {
            *byte = password[password_index];
            password_index = (password_index + 1) % password.len();
        }
        hasher.update(chunk);
        written += chunk.len();
    }

    hasher.finalize().to_vec()
}

/// Key localization (RFC 3414 Section A.2.2): `KuL = H(Ku || engineID || Ku)`.
fn localize(protocol: AuthProtocol, master_key: &[u8], engine_id: &[u8]) -> Vec<u8> {
    fn localize_impl<D: Digest>(master_key: &[u8], engine_id: &[u8]) -> Vec<u8> {
        let mut hasher = D::new();
        hasher.update(master_key);
        hasher.update(engine_id);
        hasher.update(master_key);
        hasher.finalize().to_vec()
    }

    match protocol {
        AuthProtocol::Md5 => localize_impl::<md5::Md5>(master_key, engine_id),
        AuthProtocol::Sha1 => localize_impl::<sha1::Sha1>(master_key, engine_id),
        AuthProtocol::Sha224 => localize_impl::<sha2::Sha224>(master_key, engine_id),
        AuthProtocol::Sha256 => localize_impl::<sha2::Sha256>(master_key, engine_id),
        AuthProtocol::Sha384 => localize_impl::<sha2::Sha384>(master_key, engine_id),
        AuthProtocol::Sha512 => localize_impl::<sha2::Sha512>(master_key, engine_id),
    }
}

/// Full derivation: expand the passphrase (cached) and localize to the
/// engine. This is `KuL`.
pub(crate) fn localized_key_bytes(
    protocol: AuthProtocol,
    password: &[u8],
    engine_id: &[u8],
) -> Result<Vec<u8>> {
    let ku = cached_password_to_key(protocol, password)?;
    Ok(localize(protocol, &ku, engine_id))
}

/// Reeder key extension (draft-reeder-snmpv3-usm-3desede).
///
/// `KuL || localize(password_to_key(KuL))`: the full derivation is run a
/// second time with the localized key as the passphrase. Cisco and other
/// vendors use this to stretch short localized keys for AES; net-snmp
/// and pysnmp implement the same.
fn extend_key_reeder(
    auth_protocol: AuthProtocol,
    password: &[u8],
    engine_id: &[u8],
) -> Result<Vec<u8>> {
    let key = localized_key_bytes(auth_protocol, password, engine_id)?;
    let extension = localized_key_bytes(auth_protocol, &key, engine_id)?;

    let mut extended = key;
    extended.extend_from_slice(&extension);
    Ok(extended)
}

/// Blumenthal key extension (draft-blumenthal-aes-usm-04):
/// `KuL || H(KuL)`.
fn extend_key_blumenthal(
    auth_protocol: AuthProtocol,
    password: &[u8],
    engine_id: &[u8],
) -> Result<Vec<u8>> {
    fn hash_once(protocol: AuthProtocol, data: &[u8]) -> Vec<u8> {
        match protocol {
            AuthProtocol::Md5 => md5::Md5::digest(data).to_vec(),
            AuthProtocol::Sha1 => sha1::Sha1::digest(data).to_vec(),
            AuthProtocol::Sha224 => sha2::Sha224::digest(data).to_vec(),
            AuthProtocol::Sha256 => sha2::Sha256::digest(data).to_vec(),
            AuthProtocol::Sha384 => sha2::Sha384::digest(data).to_vec(),
            AuthProtocol::Sha512 => sha2::Sha512::digest(data).to_vec(),
        }
    }

    let key = localized_key_bytes(auth_protocol, password, engine_id)?;
    let extension = hash_once(auth_protocol, &key);

    let mut extended = key;
    extended.extend_from_slice(&extension);
    Ok(extended)
}

/// Derive the localized privacy key for a protocol pairing, applying the
/// key extension the privacy protocol variant names and truncating to
/// the cipher key length.
pub(crate) fn localized_priv_key_bytes(
    priv_protocol: PrivProtocol,
    auth_protocol: AuthProtocol,
    password: &[u8],
    engine_id: &[u8],
) -> Result<Vec<u8>> {
    let key_len = priv_protocol.key_len();

    let mut key = match priv_protocol {
        PrivProtocol::Des => localized_key_bytes(auth_protocol, password, engine_id)?,
        PrivProtocol::Aes128 | PrivProtocol::Aes192Reeder | PrivProtocol::Aes256Reeder => {
            extend_key_reeder(auth_protocol, password, engine_id)?
        }
        PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
            extend_key_blumenthal(auth_protocol, password, engine_id)?
        }
    };

    if key.len() < key_len {
        return Err(Error::Config(format!(
            "privacy protocol {} needs {} key bytes but {} derivation produced {}",
            priv_protocol,
            key_len,
            auth_protocol,
            key.len()
        )));
    }

    key.truncate(key_len);
    Ok(key)
}

// ---------------------------------------------------------------------------
// Localized authentication key
// ---------------------------------------------------------------------------

/// Localized authentication key.
///
/// Derived from a passphrase and bound to one engine ID; used for HMAC
/// over messages to and from that engine. Key material is zeroed on drop
/// and redacted from Debug output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LocalizedKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl LocalizedKey {
    /// Derive a localized key from a passphrase and engine ID.
    ///
    /// Fails with [`Error::Config`] on an empty passphrase.
    pub fn from_password(
        protocol: AuthProtocol,
        password: &[u8],
        engine_id: &[u8],
    ) -> Result<Self> {
        let key = localized_key_bytes(protocol, password, engine_id)?;
        Ok(Self { key, protocol })
    }

    /// Wrap an already-localized key (e.g. from configuration).
    pub fn from_bytes(protocol: AuthProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    /// The protocol this key is for.
    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// The truncated MAC length for this key's protocol.
    pub fn mac_len(&self) -> usize {
        self.protocol.mac_len()
    }

    /// Compute the truncated HMAC over a message.
    pub fn compute_hmac(&self, data: &[u8]) -> Vec<u8> {
        compute_hmac(self.protocol, &self.key, data)
    }

    /// Verify a truncated HMAC in constant time.
    pub fn verify_hmac(&self, data: &[u8], expected: &[u8]) -> bool {
        let computed = self.compute_hmac(data);
        if computed.len() != expected.len() {
            return false;
        }
        computed.ct_eq(expected).into()
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Compute the HMAC and truncate per protocol (RFC 3414 6.3.1 for
/// MD5/SHA1, RFC 7860 4.2.1 for the SHA-2 family).
///
/// One monomorphic arm per algorithm: `Hmac<D>`'s bounds do not admit a
/// blanket `D: Digest` generic.
fn compute_hmac(protocol: AuthProtocol, key: &[u8], data: &[u8]) -> Vec<u8> {
    macro_rules! mac_impl {
        ($digest:ty) => {{
            let mut mac = <Hmac<$digest> as Mac>::new_from_slice(key)
                .expect("HMAC accepts keys of any size");
            mac.update(data);
            let result = mac.finalize().into_bytes();
            result[..protocol.mac_len()].to_vec()
        }};
    }

    match protocol {
        AuthProtocol::Md5 => mac_impl!(md5::Md5),
        AuthProtocol::Sha1 => mac_impl!(sha1::Sha1),
        AuthProtocol::Sha224 => mac_impl!(sha2::Sha224),
        AuthProtocol::Sha256 => mac_impl!(sha2::Sha256),
        AuthProtocol::Sha384 => mac_impl!(sha2::Sha384),
        AuthProtocol::Sha512 => mac_impl!(sha2::Sha512),
    }
}

// ---------------------------------------------------------------------------
// Whole-message authentication
// ---------------------------------------------------------------------------

/// Authenticate an outgoing message in place.
///
/// `message` must already carry the zeroed placeholder at
/// `auth_offset..auth_offset + auth_len`; the digest is computed over the
/// message as-is and then written over the placeholder.
pub fn authenticate_message(
    key: &LocalizedKey,
    message: &mut [u8],
    auth_offset: usize,
    auth_len: usize,
) {
    let mac = key.compute_hmac(message);
    message[auth_offset..auth_offset + auth_len].copy_from_slice(&mac);
}

/// Verify an inbound authenticated message.
///
/// Extracts the received MAC, zeroes its region, recomputes the digest
/// with the session key, and compares in constant time.
pub fn verify_message(
    key: &LocalizedKey,
    message: &[u8],
    auth_offset: usize,
    auth_len: usize,
) -> bool {
    let received_mac = &message[auth_offset..auth_offset + auth_len];

    let mut msg_copy = message.to_vec();
    msg_copy[auth_offset..auth_offset + auth_len].fill(0);

    key.verify_hmac(&msg_copy, received_mac)
}
