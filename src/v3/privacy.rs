//! Privacy (encryption) protocols for SNMPv3 (RFC 3414 Section 8,
//! RFC 3826).
//!
//! # Salt and IV construction
//!
//! DES-CBC:
//! - privParameters (wire salt): engineBoots (4 bytes BE) || 32-bit
//!   counter (4 bytes BE)
//! - IV: pre-IV XOR privParameters, where the pre-IV is the last 8 bytes
//!   of the 16-byte localized privacy key
//!
//! AES-CFB:
//! - privParameters (wire salt): 64-bit counter (8 bytes BE)
//! - IV: engineBoots (4 BE) || engineTime (4 BE) || privParameters
//!   (concatenation, not XOR)
//!
//! Both counters live in [`SaltCounters`], advance with an atomic
//! fetch-and-add per outgoing packet, and are seeded from the OS CSPRNG
//! at session setup so a restarted session never replays an IV within
//! the same (engineBoots, engineTime) window.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use bytes::Bytes;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{AuthProtocol, PrivProtocol};
use crate::error::{CryptoErrorKind, Error, Result};

/// DES block size in bytes.
const DES_BLOCK_SIZE: usize = 8;

/// Per-session privacy salt counters, one per cipher family.
pub struct SaltCounters {
    aes: AtomicU64,
    des: AtomicU32,
}

impl SaltCounters {
    /// Create counters seeded from cryptographic randomness.
    pub fn new() -> Self {
        let mut seed = [0u8; 12];
        getrandom::fill(&mut seed).expect("OS random source unavailable");
        Self {
            aes: AtomicU64::new(u64::from_be_bytes(seed[..8].try_into().unwrap())),
            des: AtomicU32::new(u32::from_be_bytes(seed[8..].try_into().unwrap())),
        }
    }

    /// Create counters with fixed seeds (tests only).
    pub fn from_seeds(aes: u64, des: u32) -> Self {
        Self {
            aes: AtomicU64::new(aes),
            des: AtomicU32::new(des),
        }
    }

    /// Allocate the next AES salt.
    ///
    /// Taken without any session lock so packet construction never
    /// serializes behind key mutation.
    pub fn next_aes(&self) -> u64 {
        self.aes.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Allocate the next DES salt.
    pub fn next_des(&self) -> u32 {
        self.des.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }
}

impl Default for SaltCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Localized privacy key for encryption and decryption.
///
/// Key material is zeroed on drop and redacted from Debug output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: PrivProtocol,
}

impl PrivKey {
    /// Derive a privacy key from a passphrase and engine ID.
    ///
    /// Applies the key extension named by the privacy protocol variant
    /// (Reeder for `Aes128`/`*Reeder`, Blumenthal for `Aes192`/`Aes256`)
    /// and truncates to the cipher key length.
    pub fn from_password(
        auth_protocol: AuthProtocol,
        priv_protocol: PrivProtocol,
        password: &[u8],
        engine_id: &[u8],
    ) -> Result<Self> {
        let key =
            super::auth::localized_priv_key_bytes(priv_protocol, auth_protocol, password, engine_id)?;
        Ok(Self {
            key,
            protocol: priv_protocol,
        })
    }

    /// Wrap an already-localized key.
    pub fn from_bytes(protocol: PrivProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    /// The privacy protocol.
    pub fn protocol(&self) -> PrivProtocol {
        self.protocol
    }

    /// The cipher key portion of the localized key.
    pub fn encryption_key(&self) -> &[u8] {
        match self.protocol {
            PrivProtocol::Des => &self.key[..8],
            _ => &self.key[..self.protocol.key_len()],
        }
    }

    /// Encrypt a serialized scoped PDU.
    ///
    /// Allocates a fresh salt from `salts` and returns
    /// `(ciphertext, privParameters)`.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salts: &SaltCounters,
    ) -> Result<(Bytes, Bytes)> {
        match self.protocol {
            PrivProtocol::Des => self.encrypt_des(plaintext, engine_boots, salts.next_des()),
            _ => self.encrypt_aes(plaintext, engine_boots, engine_time, salts.next_aes()),
        }
    }

    /// Decrypt a ciphertext using the privParameters from the message.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        if priv_params.len() != 8 {
            return Err(Error::decrypt(
                None,
                CryptoErrorKind::InvalidPrivParamsLength {
                    expected: 8,
                    actual: priv_params.len(),
                },
            ));
        }

        match self.protocol {
            PrivProtocol::Des => self.decrypt_des(ciphertext, priv_params),
            _ => self.decrypt_aes(ciphertext, engine_boots, engine_time, priv_params),
        }
    }

    /// DES-CBC encryption (RFC 3414 Section 8.1.1.1).
    fn encrypt_des(&self, plaintext: &[u8], engine_boots: u32, salt: u32) -> Result<(Bytes, Bytes)> {
        use cbc::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};
        type DesCbcEnc = cbc::Encryptor<des::Des>;

        if self.key.len() < 16 {
            return Err(Error::encrypt(None, CryptoErrorKind::InvalidKeyLength));
        }
        let key = &self.key[..8];
        let pre_iv = &self.key[8..16];

        // Wire salt: engineBoots BE || counter BE
        let mut salt_bytes = [0u8; 8];
        salt_bytes[..4].copy_from_slice(&engine_boots.to_be_bytes());
        salt_bytes[4..].copy_from_slice(&salt.to_be_bytes());

        let mut iv = [0u8; 8];
        for (i, b) in iv.iter_mut().enumerate() {
            *b = pre_iv[i] ^ salt_bytes[i];
        }

        // Zero-pad to the block size; an aligned plaintext still gets a
        // full padding block, matching net-snmp on the wire
        let pad_len = DES_BLOCK_SIZE - (plaintext.len() % DES_BLOCK_SIZE);
        let padded_len = plaintext.len() + pad_len;
        let mut buffer = vec![0u8; padded_len];
        buffer[..plaintext.len()].copy_from_slice(plaintext);

        let cipher = DesCbcEnc::new_from_slices(key, &iv)
            .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
        let ciphertext = cipher
            .encrypt_padded_mut::<NoPadding>(&mut buffer, padded_len)
            .map_err(|_| Error::encrypt(None, CryptoErrorKind::CipherError))?;

        Ok((
            Bytes::copy_from_slice(ciphertext),
            Bytes::copy_from_slice(&salt_bytes),
        ))
    }

    /// DES-CBC decryption.
    fn decrypt_des(&self, ciphertext: &[u8], priv_params: &[u8]) -> Result<Bytes> {
        use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
        type DesCbcDec = cbc::Decryptor<des::Des>;

        if ciphertext.len() % DES_BLOCK_SIZE != 0 {
            return Err(Error::decrypt(
                None,
                CryptoErrorKind::InvalidCiphertextLength {
                    length: ciphertext.len(),
                    block_size: DES_BLOCK_SIZE,
                },
            ));
        }
        if self.key.len() < 16 {
            return Err(Error::decrypt(None, CryptoErrorKind::InvalidKeyLength));
        }

        let key = &self.key[..8];
        let pre_iv = &self.key[8..16];

        let mut iv = [0u8; 8];
        for (i, b) in iv.iter_mut().enumerate() {
            *b = pre_iv[i] ^ priv_params[i];
        }

        let cipher = DesCbcDec::new_from_slices(key, &iv)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;

        let mut buffer = ciphertext.to_vec();
        let plaintext = cipher
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::CipherError))?;

        Ok(Bytes::copy_from_slice(plaintext))
    }

    /// AES-CFB encryption (RFC 3826 Section 3.1.3).
    fn encrypt_aes(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: u64,
    ) -> Result<(Bytes, Bytes)> {
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

        let salt_bytes = salt.to_be_bytes();
        let iv = aes_iv(engine_boots, engine_time, &salt_bytes);
        let key = self.aes_key()?;

        let mut buffer = plaintext.to_vec();
        match self.protocol.key_len() {
            16 => {
                type Aes128CfbEnc = cfb_mode::Encryptor<aes::Aes128>;
                let cipher = Aes128CfbEnc::new_from_slices(key, &iv)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.encrypt(&mut buffer);
            }
            24 => {
                type Aes192CfbEnc = cfb_mode::Encryptor<aes::Aes192>;
                let cipher = Aes192CfbEnc::new_from_slices(key, &iv)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.encrypt(&mut buffer);
            }
            _ => {
                type Aes256CfbEnc = cfb_mode::Encryptor<aes::Aes256>;
                let cipher = Aes256CfbEnc::new_from_slices(key, &iv)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.encrypt(&mut buffer);
            }
        }

        Ok((Bytes::from(buffer), Bytes::copy_from_slice(&salt_bytes)))
    }

    /// AES-CFB decryption (RFC 3826 Section 3.1.4).
    fn decrypt_aes(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

        let iv = aes_iv(engine_boots, engine_time, priv_params);
        let key = self.aes_key()?;

        let mut buffer = ciphertext.to_vec();
        match self.protocol.key_len() {
            16 => {
                type Aes128CfbDec = cfb_mode::Decryptor<aes::Aes128>;
                let cipher = Aes128CfbDec::new_from_slices(key, &iv)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.decrypt(&mut buffer);
            }
            24 => {
                type Aes192CfbDec = cfb_mode::Decryptor<aes::Aes192>;
                let cipher = Aes192CfbDec::new_from_slices(key, &iv)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.decrypt(&mut buffer);
            }
            _ => {
                type Aes256CfbDec = cfb_mode::Decryptor<aes::Aes256>;
                let cipher = Aes256CfbDec::new_from_slices(key, &iv)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                cipher.decrypt(&mut buffer);
            }
        }

        Ok(Bytes::from(buffer))
    }

    fn aes_key(&self) -> Result<&[u8]> {
        let key_len = self.protocol.key_len();
        if self.key.len() < key_len {
            return Err(Error::encrypt(
                None,
                CryptoErrorKind::InsufficientKeyMaterial {
                    required: key_len,
                    available: self.key.len(),
                },
            ));
        }
        Ok(&self.key[..key_len])
    }
}

/// AES IV: engineBoots BE || engineTime BE || salt.
fn aes_iv(engine_boots: u32, engine_time: u32, salt: &[u8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
    iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
    iv[8..].copy_from_slice(salt);
    iv
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_salts() -> SaltCounters {
        SaltCounters::from_seeds(0x1000, 0x20)
    }

    #[test]
    fn test_des_roundtrip() {
        let key = vec![
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, // DES key
            0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, // pre-IV
        ];
        let priv_key = PrivKey::from_bytes(PrivProtocol::Des, key);
        let salts = test_salts();

        let plaintext = b"Hello, SNMPv3 World!";
        let (ciphertext, priv_params) = priv_key.encrypt(plaintext, 100, 12345, &salts).unwrap();

        assert_ne!(&ciphertext[..plaintext.len().min(ciphertext.len())], plaintext.as_ref());
        assert_eq!(priv_params.len(), 8);
        // Wire salt carries the boots value up front
        assert_eq!(&priv_params[..4], &100u32.to_be_bytes());
        assert_eq!(ciphertext.len() % 8, 0);

        let decrypted = priv_key.decrypt(&ciphertext, 100, 12345, &priv_params).unwrap();
        // DES zero-pads, so the plaintext is a prefix
        assert_eq!(&decrypted[..plaintext.len()], plaintext);
    }

    #[test]
    fn test_des_pads_aligned_input_with_full_block() {
        let priv_key = PrivKey::from_bytes(PrivProtocol::Des, vec![0x42; 16]);
        let salts = test_salts();

        let plaintext = [0u8; 16]; // already block-aligned
        let (ciphertext, _) = priv_key.encrypt(&plaintext, 0, 0, &salts).unwrap();
        assert_eq!(ciphertext.len(), 24);
    }

    #[test]
    fn test_des_rejects_ragged_ciphertext() {
        let priv_key = PrivKey::from_bytes(PrivProtocol::Des, vec![0u8; 16]);

        let err = priv_key.decrypt(&[0u8; 9], 0, 0, &[0u8; 8]).unwrap_err();
        assert!(matches!(
            err,
            Error::DecryptionFailed {
                kind: CryptoErrorKind::InvalidCiphertextLength {
                    length: 9,
                    block_size: 8
                },
                ..
            }
        ));
    }

    #[test]
    fn test_priv_params_length_checked() {
        let priv_key = PrivKey::from_bytes(PrivProtocol::Aes128, vec![0u8; 16]);
        let err = priv_key.decrypt(&[0u8; 16], 0, 0, &[0u8; 4]).unwrap_err();
        assert!(matches!(
            err,
            Error::DecryptionFailed {
                kind: CryptoErrorKind::InvalidPrivParamsLength { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_aes128_roundtrip() {
        let priv_key = PrivKey::from_bytes(PrivProtocol::Aes128, (1u8..=16).collect::<Vec<_>>());
        let salts = test_salts();

        let plaintext = b"Hello, SNMPv3 AES World!";
        let (ciphertext, priv_params) = priv_key.encrypt(plaintext, 200, 54321, &salts).unwrap();

        assert_ne!(ciphertext.as_ref(), plaintext.as_ref());
        assert_eq!(priv_params.len(), 8);
        // CFB is a stream mode: no padding
        assert_eq!(ciphertext.len(), plaintext.len());

        let decrypted = priv_key.decrypt(&ciphertext, 200, 54321, &priv_params).unwrap();
        assert_eq!(decrypted.as_ref(), plaintext);
    }

    #[test]
    fn test_aes192_and_aes256_roundtrip() {
        for (protocol, key_len) in [
            (PrivProtocol::Aes192, 24),
            (PrivProtocol::Aes256, 32),
            (PrivProtocol::Aes192Reeder, 24),
            (PrivProtocol::Aes256Reeder, 32),
        ] {
            let priv_key = PrivKey::from_bytes(protocol, vec![0x5A; key_len]);
            let salts = test_salts();

            let plaintext = b"stream mode roundtrip";
            let (ciphertext, priv_params) = priv_key.encrypt(plaintext, 1, 2, &salts).unwrap();
            let decrypted = priv_key.decrypt(&ciphertext, 1, 2, &priv_params).unwrap();
            assert_eq!(decrypted.as_ref(), plaintext, "{:?}", protocol);
        }
    }

    #[test]
    fn test_salt_counters_strictly_increase() {
        let salts = SaltCounters::from_seeds(10, 20);
        assert_eq!(salts.next_aes(), 11);
        assert_eq!(salts.next_aes(), 12);
        assert_eq!(salts.next_des(), 21);
        assert_eq!(salts.next_des(), 22);
    }

    #[test]
    fn test_successive_encryptions_use_distinct_salts() {
        let priv_key = PrivKey::from_bytes(PrivProtocol::Aes128, vec![0u8; 16]);
        let salts = test_salts();

        let (_, salt1) = priv_key.encrypt(b"data", 0, 0, &salts).unwrap();
        let (_, salt2) = priv_key.encrypt(b"data", 0, 0, &salts).unwrap();

        let s1 = u64::from_be_bytes(salt1.as_ref().try_into().unwrap());
        let s2 = u64::from_be_bytes(salt2.as_ref().try_into().unwrap());
        assert!(s2 > s1);
    }

    #[test]
    fn test_aes_wrong_iv_material_produces_garbage() {
        let priv_key = PrivKey::from_bytes(PrivProtocol::Aes128, (1u8..=16).collect::<Vec<_>>());
        let salts = test_salts();

        let plaintext = b"AES test message";
        let (ciphertext, priv_params) = priv_key.encrypt(plaintext, 200, 54321, &salts).unwrap();

        // CFB fails open: wrong boots/time yield garbage, not an error.
        // The HMAC layer is what detects tampering (RFC 3414).
        let wrong_time = priv_key
            .decrypt(&ciphertext, 200, 54322, &priv_params)
            .unwrap();
        assert_ne!(wrong_time.as_ref(), plaintext.as_ref());

        let wrong_boots = priv_key
            .decrypt(&ciphertext, 201, 54321, &priv_params)
            .unwrap();
        assert_ne!(wrong_boots.as_ref(), plaintext.as_ref());
    }

    #[test]
    fn test_des_wrong_key_produces_garbage() {
        let correct = PrivKey::from_bytes(PrivProtocol::Des, (1u8..=16).collect::<Vec<_>>());
        let wrong = PrivKey::from_bytes(PrivProtocol::Des, (17u8..=32).collect::<Vec<_>>());
        let salts = test_salts();

        let plaintext = b"Secret SNMPv3 message data!";
        let (ciphertext, priv_params) = correct.encrypt(plaintext, 100, 0, &salts).unwrap();

        let garbled = wrong.decrypt(&ciphertext, 100, 0, &priv_params).unwrap();
        assert_ne!(&garbled[..plaintext.len()], plaintext.as_ref());

        let recovered = correct.decrypt(&ciphertext, 100, 0, &priv_params).unwrap();
        assert_eq!(&recovered[..plaintext.len()], plaintext.as_ref());
    }

    #[test]
    fn test_from_password_derivation() {
        let engine_id = crate::util::decode_hex("000000000000000000000002").unwrap();
        let priv_key = PrivKey::from_password(
            AuthProtocol::Sha1,
            PrivProtocol::Aes128,
            b"maplesyrup",
            &engine_id,
        )
        .unwrap();
        let salts = test_salts();

        let plaintext = b"derived key roundtrip";
        let (ciphertext, priv_params) = priv_key.encrypt(plaintext, 7, 8, &salts).unwrap();
        let decrypted = priv_key.decrypt(&ciphertext, 7, 8, &priv_params).unwrap();
        assert_eq!(decrypted.as_ref(), plaintext);
    }
}
