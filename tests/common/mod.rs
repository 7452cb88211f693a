//! Shared test helpers: an in-process SNMPv3 agent scripted through the
//! mock transport.

#![allow(dead_code)]

use bytes::Bytes;

use snmpkit::ber::Decoder;
use snmpkit::message::{MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message, V3MessageData};
use snmpkit::pdu::{Pdu, PduType};
use snmpkit::v3::auth::{authenticate_message, verify_message};
use snmpkit::v3::{
    AuthProtocol, LocalizedKey, PrivKey, PrivProtocol, SaltCounters, UsmSecurityParams,
};
use snmpkit::{oid, Value, VarBind};

/// Install a tracing subscriber for the test binary, honoring
/// `RUST_LOG` so individual runs can surface the client/walk/usm
/// targets while debugging. Safe to call from every test; only the
/// first call wins.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A miniature authoritative engine driving the v3 side of the mock
/// transport. It answers discovery with a Report and regular requests
/// with authenticated/encrypted responses built from its own state.
pub struct TestAgent {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    pub engine_time: u32,
    pub username: Bytes,
    pub auth_key: Option<LocalizedKey>,
    pub priv_key: Option<PrivKey>,
    pub salts: SaltCounters,
}

impl TestAgent {
    /// An agent with no security (noAuthNoPriv sessions).
    pub fn no_auth(engine_id: &[u8], username: &[u8]) -> Self {
        Self {
            engine_id: Bytes::copy_from_slice(engine_id),
            engine_boots: 3,
            engine_time: 1234,
            username: Bytes::copy_from_slice(username),
            auth_key: None,
            priv_key: None,
            salts: SaltCounters::from_seeds(0x5000, 0x60),
        }
    }

    /// An agent sharing authPriv credentials with the client under test.
    pub fn auth_priv(
        engine_id: &[u8],
        username: &[u8],
        auth_protocol: AuthProtocol,
        auth_password: &[u8],
        priv_protocol: PrivProtocol,
        priv_password: &[u8],
    ) -> Self {
        let auth_key =
            LocalizedKey::from_password(auth_protocol, auth_password, engine_id).unwrap();
        let priv_key =
            PrivKey::from_password(auth_protocol, priv_protocol, priv_password, engine_id).unwrap();

        Self {
            engine_id: Bytes::copy_from_slice(engine_id),
            engine_boots: 3,
            engine_time: 1234,
            username: Bytes::copy_from_slice(username),
            auth_key: Some(auth_key),
            priv_key: Some(priv_key),
            salts: SaltCounters::from_seeds(0x5000, 0x60),
        }
    }

    fn security_level(&self) -> SecurityLevel {
        match (&self.auth_key, &self.priv_key) {
            (None, _) => SecurityLevel::NoAuthNoPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
        }
    }

    /// Answer a discovery request with the usmStatsUnknownEngineIDs
    /// Report carrying this agent's identity.
    pub fn discovery_report(&self, request: &[u8]) -> Bytes {
        let msg = V3Message::decode(Bytes::copy_from_slice(request)).unwrap();
        assert!(msg.global_data.msg_flags.reportable, "discovery must be reportable");

        let report = Pdu {
            pdu_type: PduType::Report,
            request_id: 0,
            error_status: 0,
            error_index: 0,
            varbinds: vec![VarBind::new(
                oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0),
                Value::Counter32(1),
            )],
        };

        let usm = UsmSecurityParams::new(
            self.engine_id.clone(),
            self.engine_boots,
            self.engine_time,
            Bytes::new(),
        );
        let global = MsgGlobalData::new(
            msg.msg_id(),
            65507,
            MsgFlags::new(SecurityLevel::NoAuthNoPriv, false),
        );

        V3Message::new(
            global,
            usm.encode(),
            ScopedPdu::new(self.engine_id.clone(), Bytes::new(), report),
        )
        .encode()
    }

    /// Decode (verifying and decrypting as configured) an inbound
    /// request and return its inner PDU.
    pub fn open_request(&self, request: &[u8]) -> Pdu {
        let msg = V3Message::decode(Bytes::copy_from_slice(request)).unwrap();
        let usm = UsmSecurityParams::decode(msg.security_params.clone()).unwrap();

        if let Some(auth_key) = &self.auth_key {
            let (offset, len) = UsmSecurityParams::find_auth_params_offset(request).unwrap();
            assert!(
                verify_message(auth_key, request, offset, len),
                "client request failed agent-side authentication"
            );
        }

        match msg.data {
            V3MessageData::Plaintext(scoped) => scoped.pdu,
            V3MessageData::Encrypted(ciphertext) => {
                let priv_key = self.priv_key.as_ref().expect("encrypted request without key");
                let plaintext = priv_key
                    .decrypt(
                        &ciphertext,
                        usm.engine_boots,
                        usm.engine_time,
                        &usm.priv_params,
                    )
                    .unwrap();
                let mut decoder = Decoder::new(plaintext);
                ScopedPdu::decode(&mut decoder).unwrap().pdu
            }
        }
    }

    /// Build a fully secured response for a request, answering with the
    /// given varbinds.
    pub fn respond(&self, request: &[u8], varbinds: Vec<VarBind>) -> Bytes {
        let request_msg = V3Message::decode(Bytes::copy_from_slice(request)).unwrap();
        let request_pdu = self.open_request(request);

        let response_pdu = Pdu {
            pdu_type: PduType::Response,
            request_id: request_pdu.request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        };

        self.build_message(request_msg.msg_id(), response_pdu)
    }

    /// Assemble, encrypt, and authenticate an outbound message.
    pub fn build_message(&self, msg_id: i32, pdu: Pdu) -> Bytes {
        let level = self.security_level();
        let scoped = ScopedPdu::new(self.engine_id.clone(), Bytes::new(), pdu);

        let (data, priv_params) = if let Some(priv_key) = &self.priv_key {
            let (ciphertext, salt) = priv_key
                .encrypt(
                    &scoped.encode_to_bytes(),
                    self.engine_boots,
                    self.engine_time,
                    &self.salts,
                )
                .unwrap();
            (V3MessageData::Encrypted(ciphertext), salt)
        } else {
            (V3MessageData::Plaintext(scoped), Bytes::new())
        };

        let mut usm = UsmSecurityParams::new(
            self.engine_id.clone(),
            self.engine_boots,
            self.engine_time,
            self.username.clone(),
        )
        .with_priv_params(priv_params);

        if let Some(auth_key) = &self.auth_key {
            usm = usm.with_auth_placeholder(auth_key.mac_len());
        }

        let global = MsgGlobalData::new(msg_id, 65507, MsgFlags::new(level, false));
        let msg = match data {
            V3MessageData::Plaintext(scoped) => V3Message::new(global, usm.encode(), scoped),
            V3MessageData::Encrypted(ciphertext) => {
                V3Message::new_encrypted(global, usm.encode(), ciphertext)
            }
        };

        let mut encoded = msg.encode().to_vec();
        if let Some(auth_key) = &self.auth_key {
            let (offset, len) = UsmSecurityParams::find_auth_params_offset(&encoded).unwrap();
            authenticate_message(auth_key, &mut encoded, offset, len);
        }

        Bytes::from(encoded)
    }
}
