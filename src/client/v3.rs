//! SNMPv3 client path: security configuration, key derivation, engine
//! discovery, and the authenticated/encrypted exchange.

use bytes::Bytes;

use super::auth::UsmAuth;
use super::Client;
use crate::error::{AuthErrorKind, CryptoErrorKind, EncodeErrorKind, Error, ErrorStatus, Result};
use crate::message::{MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message, V3MessageData};
use crate::pdu::{Pdu, PduType};
use crate::transport::Transport;
use crate::util::Hex;
use crate::v3::auth::{authenticate_message, verify_message};
use crate::v3::{
    is_not_in_time_window_report, is_unknown_engine_id_report, parse_discovery_response,
    AuthProtocol, EngineState, LocalizedKey, PrivKey, PrivProtocol, UsmSecurityParams,
    DEFAULT_MSG_MAX_SIZE,
};
use crate::ber::Decoder;

/// SNMPv3 security configuration: credentials from which per-engine keys
/// are derived once the engine ID is known.
#[derive(Clone)]
pub struct V3SecurityConfig {
    /// User name
    pub username: Bytes,
    /// Authentication protocol and passphrase
    pub auth: Option<(AuthProtocol, Vec<u8>)>,
    /// Privacy protocol and passphrase
    pub privacy: Option<(PrivProtocol, Vec<u8>)>,
    /// Context name for the scoped PDU
    pub context_name: Bytes,
}

impl V3SecurityConfig {
    /// Validate and convert builder-level credentials.
    ///
    /// The security level implied by the flags must be backed by the
    /// matching credentials: a user name always, a passphrase for each
    /// declared protocol, and no privacy without authentication.
    pub fn from_auth(auth: UsmAuth) -> Result<Self> {
        if auth.username.is_empty() {
            return Err(Error::Config("USM user name is required".into()));
        }

        if auth.priv_protocol.is_some() && auth.auth_protocol.is_none() {
            return Err(Error::Config(
                "privacy requires authentication (authPriv needs an auth protocol)".into(),
            ));
        }

        let auth_pair = match (auth.auth_protocol, auth.auth_password) {
            (Some(protocol), Some(password)) if !password.is_empty() => {
                Some((protocol, password.into_bytes()))
            }
            (Some(protocol), _) => {
                return Err(Error::Config(format!(
                    "authentication protocol {} declared without a passphrase",
                    protocol
                )));
            }
            (None, _) => None,
        };

        let priv_pair = match (auth.priv_protocol, auth.priv_password) {
            (Some(protocol), Some(password)) if !password.is_empty() => {
                Some((protocol, password.into_bytes()))
            }
            (Some(protocol), _) => {
                return Err(Error::Config(format!(
                    "privacy protocol {} declared without a passphrase",
                    protocol
                )));
            }
            (None, _) => None,
        };

        Ok(Self {
            username: Bytes::from(auth.username.into_bytes()),
            auth: auth_pair,
            privacy: priv_pair,
            context_name: auth
                .context_name
                .map(|s| Bytes::from(s.into_bytes()))
                .unwrap_or_default(),
        })
    }

    /// The security level implied by the configured credentials.
    pub fn security_level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (None, _) => SecurityLevel::NoAuthNoPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
        }
    }

    /// Derive localized keys for an engine ID.
    ///
    /// Called at discovery and again whenever the engine identity
    /// changes; the password-to-key step is served from the process-wide
    /// cache.
    pub fn derive_keys(&self, engine_id: &[u8]) -> Result<V3DerivedKeys> {
        let auth_key = match &self.auth {
            Some((protocol, password)) => {
                Some(LocalizedKey::from_password(*protocol, password, engine_id)?)
            }
            None => None,
        };

        let priv_key = match (&self.auth, &self.privacy) {
            (Some((auth_protocol, _)), Some((priv_protocol, priv_password))) => Some(
                PrivKey::from_password(*auth_protocol, *priv_protocol, priv_password, engine_id)?,
            ),
            _ => None,
        };

        Ok(V3DerivedKeys { auth_key, priv_key })
    }
}

impl std::fmt::Debug for V3SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V3SecurityConfig")
            .field("username", &String::from_utf8_lossy(&self.username))
            .field("auth", &self.auth.as_ref().map(|(p, _)| p))
            .field("privacy", &self.privacy.as_ref().map(|(p, _)| p))
            .finish()
    }
}

/// Keys localized to one engine ID.
pub struct V3DerivedKeys {
    pub auth_key: Option<LocalizedKey>,
    pub priv_key: Option<PrivKey>,
}

impl<T: Transport> Client<T> {
    /// Ensure the authoritative engine has been discovered.
    ///
    /// Sends the reportable noAuthNoPriv discovery packet when the
    /// engine ID is unknown, absorbs the Report's engine identity, and
    /// derives localized keys before any further traffic.
    pub(super) async fn ensure_engine_discovered(&self) -> Result<()> {
        {
            let state = self.inner.engine_state.read().unwrap();
            if state.is_some() {
                return Ok(());
            }
        }

        tracing::debug!(target: "snmpkit::v3", peer = %self.peer_addr(), "performing engine discovery");

        let msg_id = self.next_request_id();
        let discovery = V3Message::discovery_request(msg_id).encode();

        self.inner.transport.send(&discovery).await?;
        let response_data = self
            .inner
            .transport
            .recv(msg_id, self.inner.config.timeout)
            .await?;

        let response = V3Message::decode(response_data)?;
        let engine_state = parse_discovery_response(&response.security_params)?;

        tracing::debug!(
            target: "snmpkit::v3",
            engine_id = %Hex(&engine_state.engine_id),
            engine_boots = engine_state.engine_boots,
            engine_time = engine_state.engine_time,
            "discovered engine"
        );

        self.adopt_engine(engine_state)?;
        Ok(())
    }

    /// Install engine state and rederive localized keys for it.
    fn adopt_engine(&self, engine_state: EngineState) -> Result<()> {
        if let Some(security) = &self.inner.config.v3_security {
            let keys = security.derive_keys(&engine_state.engine_id)?;
            *self.inner.derived_keys.write().unwrap() = Some(keys);
        }
        *self.inner.engine_state.write().unwrap() = Some(engine_state);
        Ok(())
    }

    /// Assemble and serialize an outgoing v3 message for `pdu`.
    ///
    /// Encrypts the scoped PDU when the session is authPriv, then
    /// locates the zeroed MAC placeholder in the serialized bytes and
    /// overwrites it with the digest.
    pub(super) fn build_v3_message(&self, pdu: &Pdu) -> Result<Vec<u8>> {
        let security = self
            .inner
            .config
            .v3_security
            .as_ref()
            .ok_or(Error::Encode {
                kind: EncodeErrorKind::NoSecurityConfig,
            })?;

        let (engine_id, engine_boots, engine_time) = {
            let state = self.inner.engine_state.read().unwrap();
            let state = state.as_ref().ok_or(Error::Encode {
                kind: EncodeErrorKind::EngineNotDiscovered,
            })?;
            (
                state.engine_id.clone(),
                state.engine_boots,
                state.estimated_time(),
            )
        };

        let security_level = security.security_level();
        // msgID mirrors the request-id; one in-flight exchange per call
        let msg_id = pdu.request_id;

        let scoped_pdu = ScopedPdu::new(
            engine_id.clone(),
            security.context_name.clone(),
            pdu.clone(),
        );

        let derived = self.inner.derived_keys.read().unwrap();

        let (msg_data, priv_params) = if security_level.requires_priv() {
            let keys = derived.as_ref().ok_or(Error::Encode {
                kind: EncodeErrorKind::KeysNotDerived,
            })?;
            let priv_key = keys.priv_key.as_ref().ok_or(Error::Encode {
                kind: EncodeErrorKind::NoPrivKey,
            })?;

            let plaintext = scoped_pdu.encode_to_bytes();
            let (ciphertext, salt) =
                priv_key.encrypt(&plaintext, engine_boots, engine_time, &self.inner.salts)?;

            tracing::trace!(
                target: "snmpkit::v3",
                plaintext_len = plaintext.len(),
                ciphertext_len = ciphertext.len(),
                "encrypted scoped PDU"
            );

            (V3MessageData::Encrypted(ciphertext), salt)
        } else {
            (V3MessageData::Plaintext(scoped_pdu), Bytes::new())
        };

        let mut usm_params = UsmSecurityParams::new(
            engine_id,
            engine_boots,
            engine_time,
            security.username.clone(),
        );

        let mac_len = if security_level.requires_auth() {
            let len = derived
                .as_ref()
                .and_then(|k| k.auth_key.as_ref())
                .map(|k| k.mac_len())
                .ok_or(Error::Encode {
                    kind: EncodeErrorKind::MissingAuthKey,
                })?;
            usm_params = usm_params.with_auth_placeholder(len);
            len
        } else {
            0
        };

        if security_level.requires_priv() {
            usm_params = usm_params.with_priv_params(priv_params);
        }

        let global_data = MsgGlobalData::new(
            msg_id,
            DEFAULT_MSG_MAX_SIZE as i32,
            MsgFlags::new(security_level, true),
        );

        let msg = match msg_data {
            V3MessageData::Plaintext(scoped) => V3Message::new(global_data, usm_params.encode(), scoped),
            V3MessageData::Encrypted(ciphertext) => {
                V3Message::new_encrypted(global_data, usm_params.encode(), ciphertext)
            }
        };

        let mut encoded = msg.encode().to_vec();

        if security_level.requires_auth() {
            let auth_key = derived
                .as_ref()
                .and_then(|k| k.auth_key.as_ref())
                .ok_or(Error::Encode {
                    kind: EncodeErrorKind::MissingAuthKey,
                })?;

            let (offset, len) = UsmSecurityParams::find_auth_params_offset(&encoded).ok_or(
                Error::Encode {
                    kind: EncodeErrorKind::MissingAuthParams,
                },
            )?;
            debug_assert_eq!(len, mac_len);
            authenticate_message(auth_key, &mut encoded, offset, len);
        }

        Ok(encoded)
    }

    /// One v3 exchange: send `pdu`, receive, verify, decrypt, and return
    /// the raw response PDU (error-status untouched).
    pub(super) async fn send_v3_raw(&self, pdu: Pdu) -> Result<Pdu> {
        self.ensure_engine_discovered().await?;

        let security = self
            .inner
            .config
            .v3_security
            .as_ref()
            .ok_or(Error::Encode {
                kind: EncodeErrorKind::NoSecurityConfig,
            })?;
        let security_level = security.security_level();

        let data = self.build_v3_message(&pdu)?;

        tracing::debug!(
            target: "snmpkit::v3",
            peer = %self.peer_addr(),
            pdu_type = %pdu.pdu_type,
            request_id = pdu.request_id,
            security_level = ?security_level,
            varbinds = pdu.varbinds.len(),
            "sending v3 request"
        );

        self.inner.transport.send(&data).await?;
        let response_data = self
            .inner
            .transport
            .recv(pdu.request_id, self.inner.config.timeout)
            .await?;

        let response = V3Message::decode(response_data.clone())?;
        let response_flags = response.global_data.msg_flags;
        let usm = UsmSecurityParams::decode(response.security_params.clone())?;

        // Engine identity drift mid-session: adopt the new identity and
        // rederive keys before anything is verified against them
        let drifted = {
            let state = self.inner.engine_state.read().unwrap();
            match state.as_ref() {
                Some(s) => !usm.engine_id.is_empty() && s.engine_id != usm.engine_id,
                None => false,
            }
        };
        if drifted {
            tracing::warn!(
                target: "snmpkit::v3",
                peer = %self.peer_addr(),
                engine_id = %Hex(&usm.engine_id),
                "authoritative engine ID changed, rederiving keys"
            );
            self.adopt_engine(EngineState::new(
                usm.engine_id.clone(),
                usm.engine_boots,
                usm.engine_time,
            ))?;
        }

        // Verify the digest when the response claims authentication
        if response_flags.security_level.requires_auth() {
            let derived = self.inner.derived_keys.read().unwrap();
            let auth_key = derived.as_ref().and_then(|k| k.auth_key.as_ref()).ok_or(
                Error::AuthenticationFailed {
                    target: Some(self.peer_addr()),
                    kind: AuthErrorKind::NoAuthKey,
                },
            )?;

            if usm.auth_params.len() != auth_key.mac_len() {
                return Err(Error::auth(
                    Some(self.peer_addr()),
                    AuthErrorKind::WrongMacLength {
                        expected: auth_key.mac_len(),
                        actual: usm.auth_params.len(),
                    },
                ));
            }

            let (offset, len) = UsmSecurityParams::find_auth_params_offset(&response_data)
                .ok_or(Error::AuthenticationFailed {
                    target: Some(self.peer_addr()),
                    kind: AuthErrorKind::AuthParamsNotFound,
                })?;
            if !verify_message(auth_key, &response_data, offset, len) {
                return Err(Error::auth(
                    Some(self.peer_addr()),
                    AuthErrorKind::HmacMismatch,
                ));
            }
        }

        // Unwrap the payload, decrypting if needed
        let scoped = match response.data {
            V3MessageData::Plaintext(scoped) => scoped,
            V3MessageData::Encrypted(ciphertext) => {
                let derived = self.inner.derived_keys.read().unwrap();
                let priv_key = derived.as_ref().and_then(|k| k.priv_key.as_ref()).ok_or(
                    Error::DecryptionFailed {
                        target: Some(self.peer_addr()),
                        kind: CryptoErrorKind::NoPrivKey,
                    },
                )?;

                let plaintext = priv_key.decrypt(
                    &ciphertext,
                    usm.engine_boots,
                    usm.engine_time,
                    &usm.priv_params,
                )?;

                let mut decoder = Decoder::new(plaintext);
                ScopedPdu::decode(&mut decoder)?
            }
        };
        let response_pdu = scoped.pdu;

        // Only Report PDUs may arrive below the session's security
        // level; anything else at a lower level is a downgrade
        if response_pdu.pdu_type != PduType::Report
            && response_flags.security_level < security_level
        {
            return Err(Error::auth(
                Some(self.peer_addr()),
                AuthErrorKind::DowngradedSecurityLevel,
            ));
        }

        // Report PDUs route to the discovery/resync paths
        if response_pdu.pdu_type == PduType::Report {
            if is_not_in_time_window_report(&response_pdu) {
                tracing::debug!(target: "snmpkit::v3", peer = %self.peer_addr(), "not in time window, absorbing engine clock");
                let mut state = self.inner.engine_state.write().unwrap();
                if let Some(s) = state.as_mut() {
                    s.update_time(usm.engine_boots, usm.engine_time);
                }
                return Err(Error::NotInTimeWindow {
                    target: Some(self.peer_addr()),
                });
            }
            if is_unknown_engine_id_report(&response_pdu) {
                return Err(Error::UnknownEngineId {
                    target: Some(self.peer_addr()),
                });
            }
            return Err(Error::Snmp {
                target: Some(self.peer_addr()),
                status: ErrorStatus::GenErr,
                index: 0,
                oid: response_pdu.varbinds.first().map(|vb| vb.oid.clone()),
            });
        }

        if response_pdu.request_id != pdu.request_id {
            return Err(Error::RequestIdMismatch {
                expected: pdu.request_id,
                actual: response_pdu.request_id,
            });
        }

        // Successful exchange: track the engine clock for future salts
        // and time-window checks
        {
            let mut state = self.inner.engine_state.write().unwrap();
            if let Some(s) = state.as_mut() {
                s.update_time(usm.engine_boots, usm.engine_time);
            }
        }

        tracing::debug!(
            target: "snmpkit::v3",
            peer = %self.peer_addr(),
            pdu_type = %response_pdu.pdu_type,
            varbinds = response_pdu.varbinds.len(),
            error_status = response_pdu.error_status,
            "received v3 response"
        );

        Ok(response_pdu)
    }
}
