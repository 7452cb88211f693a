//! SNMP client.
//!
//! [`Client`] owns one session: a transport, the negotiated security
//! state (engine identity and localized keys for v3), and a request-id
//! allocator. Every public operation performs exactly one transport
//! exchange; timeouts belong to the transport and retry policy belongs
//! to the caller.

mod auth;
mod builder;
mod v3;
mod walk;

pub use auth::{Auth, CommunityVersion, UsmAuth, UsmBuilder};
pub use builder::ClientBuilder;
pub use v3::{V3DerivedKeys, V3SecurityConfig};
pub use walk::{Walk, WalkMode};

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;

use crate::error::{DecodeErrorKind, Error, Result};
use crate::message::{CommunityMessage, Message};
use crate::oid::Oid;
use crate::pdu::{GetBulkPdu, Pdu, PduType, TrapV1Pdu};
use crate::transport::{Transport, UdpTransport};
use crate::v3::{EngineState, SaltCounters};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

use walk::RoundKind;

/// SNMP client, generic over its transport.
#[derive(Clone)]
pub struct Client<T: Transport = UdpTransport> {
    inner: Arc<ClientInner<T>>,
}

struct ClientInner<T: Transport> {
    transport: T,
    config: ClientConfig,
    /// Monotonic request-id allocator, random start, 31-bit range.
    request_id: AtomicU32,
    /// Discovered authoritative engine (v3).
    engine_state: RwLock<Option<EngineState>>,
    /// Keys localized to the discovered engine (v3).
    derived_keys: RwLock<Option<V3DerivedKeys>>,
    /// Privacy salt counters (v3), advanced without taking the locks.
    salts: SaltCounters,
}

/// Client configuration.
///
/// Usually produced by [`ClientBuilder`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// SNMP version
    pub version: Version,
    /// Community string (v1/v2c)
    pub community: Bytes,
    /// Per-exchange timeout handed to the transport
    pub timeout: Duration,
    /// Maximum OIDs per request before batching
    pub max_oids_per_request: usize,
    /// max-repetitions for GETBULK and bulk walks
    pub max_repetitions: i32,
    /// How walk() picks its request type
    pub walk_mode: WalkMode,
    /// Bound on varbinds a single walk may deliver
    pub max_walk_results: Option<usize>,
    /// Application options; `"c"` disables the walk OID-increasing check
    pub app_opts: HashSet<String>,
    /// SNMPv3 USM credentials
    pub v3_security: Option<V3SecurityConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: Version::V2c,
            community: Bytes::from_static(b"public"),
            timeout: Duration::from_secs(5),
            max_oids_per_request: 10,
            max_repetitions: 25,
            walk_mode: WalkMode::Auto,
            max_walk_results: None,
            app_opts: HashSet::new(),
            v3_security: None,
        }
    }
}

impl Client<UdpTransport> {
    /// Create a client builder.
    ///
    /// ```rust,no_run
    /// use snmpkit::{Auth, Client, oid};
    /// use std::time::Duration;
    ///
    /// # async fn example() -> snmpkit::Result<()> {
    /// let client = Client::builder("192.0.2.1:161", Auth::v2c("public"))
    ///     .timeout(Duration::from_secs(2))
    ///     .connect()
    ///     .await?;
    ///
    /// let sys_descr = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await?;
    /// println!("{}", sys_descr);
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder(target: impl Into<String>, auth: impl Into<Auth>) -> ClientBuilder {
        ClientBuilder::new(target, auth)
    }
}

impl<T: Transport> Client<T> {
    /// Create a client over an existing transport.
    pub fn new(transport: T, config: ClientConfig) -> Self {
        let mut seed = [0u8; 4];
        getrandom::fill(&mut seed).expect("OS random source unavailable");

        Self {
            inner: Arc::new(ClientInner {
                transport,
                config,
                request_id: AtomicU32::new(u32::from_be_bytes(seed)),
                engine_state: RwLock::new(None),
                derived_keys: RwLock::new(None),
                salts: SaltCounters::new(),
            }),
        }
    }

    /// The agent address this client talks to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.transport.peer_addr()
    }

    /// Allocate the next request ID: monotonic modulo 2^31 from a
    /// random start.
    pub(crate) fn next_request_id(&self) -> i32 {
        (self.inner.request_id.fetch_add(1, Ordering::SeqCst) & 0x7FFF_FFFF) as i32
    }

    fn is_v3(&self) -> bool {
        self.inner.config.version == Version::V3 && self.inner.config.v3_security.is_some()
    }

    /// One community (v1/v2c) exchange returning the raw response PDU.
    async fn exchange_community(&self, request_id: i32, data: &[u8]) -> Result<Pdu> {
        tracing::trace!(target: "snmpkit::client", bytes = data.len(), "sending request");
        self.inner.transport.send(data).await?;

        let response_data = self
            .inner
            .transport
            .recv(request_id, self.inner.config.timeout)
            .await?;
        tracing::trace!(target: "snmpkit::client", bytes = response_data.len(), "received response");

        let response = Message::decode(response_data)?;
        if response.version() != self.inner.config.version {
            tracing::warn!(
                target: "snmpkit::client",
                peer = %self.peer_addr(),
                expected = %self.inner.config.version,
                actual = %response.version(),
                "response version does not match session version"
            );
        }

        let pdu = response
            .try_into_pdu()
            .ok_or(Error::Decode {
                offset: 0,
                kind: DecodeErrorKind::MissingPdu,
            })?;

        if pdu.request_id != request_id {
            return Err(Error::RequestIdMismatch {
                expected: request_id,
                actual: pdu.request_id,
            });
        }

        Ok(pdu)
    }

    /// Send a PDU and return the raw response (error-status untouched).
    ///
    /// The walk engine uses this directly so it can map agent
    /// error-status values to clean termination instead of errors.
    pub(crate) async fn send_raw(&self, pdu: Pdu) -> Result<Pdu> {
        if self.is_v3() {
            return self.send_v3_raw(pdu).await;
        }

        tracing::debug!(
            target: "snmpkit::client",
            peer = %self.peer_addr(),
            pdu_type = %pdu.pdu_type,
            request_id = pdu.request_id,
            varbinds = pdu.varbinds.len(),
            "sending request"
        );

        let request_id = pdu.request_id;
        let message = CommunityMessage::new(
            self.inner.config.version,
            self.inner.config.community.clone(),
            pdu,
        );
        self.exchange_community(request_id, &message.encode()).await
    }

    /// Send a PDU and convert protocol-level failures to errors.
    async fn send_checked(&self, pdu: Pdu) -> Result<Pdu> {
        let response = self.send_raw(pdu).await?;

        if response.pdu_type != PduType::Response {
            return Err(Error::UnexpectedPduType {
                actual: response.pdu_type,
            });
        }

        if response.is_error() {
            let status = response.error_status_enum();
            // error_index is 1-based; 0 means the whole PDU
            let oid = (response.error_index as usize)
                .checked_sub(1)
                .and_then(|idx| response.varbinds.get(idx))
                .map(|vb| vb.oid.clone());

            return Err(Error::Snmp {
                target: Some(self.peer_addr()),
                status,
                index: response.error_index.max(0) as u32,
                oid,
            });
        }

        Ok(response)
    }

    /// Take exactly one varbind from a response.
    fn single_varbind(&self, response: Pdu) -> Result<VarBind> {
        response.varbinds.into_iter().next().ok_or(Error::Decode {
            offset: 0,
            kind: DecodeErrorKind::EmptyResponse,
        })
    }

    /// GET a single OID.
    pub async fn get(&self, oid: &Oid) -> Result<VarBind> {
        let request_id = self.next_request_id();
        let pdu = Pdu::get_request(request_id, std::slice::from_ref(oid));
        let response = self.send_checked(pdu).await?;
        self.single_varbind(response)
    }

    /// GET multiple OIDs, batching beyond `max_oids_per_request`.
    pub async fn get_many(&self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        self.batched(oids, |request_id, chunk| {
            Pdu::get_request(request_id, chunk)
        })
        .await
    }

    /// GETNEXT for a single OID.
    pub async fn get_next(&self, oid: &Oid) -> Result<VarBind> {
        let request_id = self.next_request_id();
        let pdu = Pdu::get_next_request(request_id, std::slice::from_ref(oid));
        let response = self.send_checked(pdu).await?;
        self.single_varbind(response)
    }

    /// GETNEXT for multiple OIDs, batching beyond
    /// `max_oids_per_request`.
    pub async fn get_next_many(&self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        self.batched(oids, |request_id, chunk| {
            Pdu::get_next_request(request_id, chunk)
        })
        .await
    }

    async fn batched(
        &self,
        oids: &[Oid],
        make_pdu: impl Fn(i32, &[Oid]) -> Pdu,
    ) -> Result<Vec<VarBind>> {
        if oids.is_empty() {
            return Ok(Vec::new());
        }

        let max = self.inner.config.max_oids_per_request;
        let mut results = Vec::with_capacity(oids.len());

        for chunk in oids.chunks(max) {
            let request_id = self.next_request_id();
            let response = self.send_checked(make_pdu(request_id, chunk)).await?;
            results.extend(response.varbinds);
        }

        Ok(results)
    }

    /// SET a single OID.
    pub async fn set(&self, oid: &Oid, value: Value) -> Result<VarBind> {
        let request_id = self.next_request_id();
        let pdu = Pdu::set_request(request_id, vec![VarBind::new(oid.clone(), value)]);
        let response = self.send_checked(pdu).await?;
        self.single_varbind(response)
    }

    /// SET multiple OIDs, batching beyond `max_oids_per_request`.
    pub async fn set_many(&self, varbinds: &[(Oid, Value)]) -> Result<Vec<VarBind>> {
        if varbinds.is_empty() {
            return Ok(Vec::new());
        }

        let max = self.inner.config.max_oids_per_request;
        let mut results = Vec::with_capacity(varbinds.len());

        for chunk in varbinds.chunks(max) {
            let request_id = self.next_request_id();
            let vbs = chunk
                .iter()
                .map(|(oid, value)| VarBind::new(oid.clone(), value.clone()))
                .collect();
            let response = self.send_checked(Pdu::set_request(request_id, vbs)).await?;
            results.extend(response.varbinds);
        }

        Ok(results)
    }

    /// GETBULK (SNMPv2c/v3 only).
    ///
    /// The first `non_repeaters` OIDs get one GETNEXT each; the rest are
    /// repeated up to `max_repetitions` times.
    pub async fn get_bulk(
        &self,
        oids: &[Oid],
        non_repeaters: i32,
        max_repetitions: i32,
    ) -> Result<Vec<VarBind>> {
        if self.inner.config.version == Version::V1 {
            return Err(Error::GetBulkNotSupportedInV1);
        }

        let request_id = self.next_request_id();
        let pdu = GetBulkPdu::new(request_id, non_repeaters, max_repetitions, oids).into_pdu();
        let response = self.send_checked(pdu).await?;
        Ok(response.varbinds)
    }

    /// Send an SNMPv2 trap (unconfirmed; no response is awaited).
    pub async fn trap(&self, varbinds: Vec<VarBind>) -> Result<()> {
        let request_id = self.next_request_id();
        let pdu = Pdu::trap_v2(request_id, varbinds);

        let data = if self.is_v3() {
            self.ensure_engine_discovered().await?;
            self.build_v3_message(&pdu)?
        } else {
            if self.inner.config.version == Version::V1 {
                return Err(Error::Config(
                    "SNMPv1 uses the trap_v1 operation, not v2 traps".into(),
                ));
            }
            CommunityMessage::new(
                self.inner.config.version,
                self.inner.config.community.clone(),
                pdu,
            )
            .encode()
            .to_vec()
        };

        self.inner.transport.send(&data).await
    }

    /// Send an SNMPv1 trap (unconfirmed; no response is awaited).
    pub async fn trap_v1(&self, trap: &TrapV1Pdu) -> Result<()> {
        if self.inner.config.version != Version::V1 {
            return Err(Error::Config(
                "v1 traps require an SNMPv1 session".into(),
            ));
        }

        let data = CommunityMessage::encode_trap_v1(self.inner.config.community.clone(), trap);
        self.inner.transport.send(&data).await
    }

    /// Send an InformRequest and await the confirmation.
    pub async fn inform(&self, varbinds: Vec<VarBind>) -> Result<Vec<VarBind>> {
        if self.inner.config.version == Version::V1 {
            return Err(Error::Config(
                "InformRequest is not available in SNMPv1".into(),
            ));
        }

        let request_id = self.next_request_id();
        let pdu = Pdu::inform(request_id, varbinds);
        let response = self.send_checked(pdu).await?;
        Ok(response.varbinds)
    }

    /// One walk round: the request type depends on where the traversal
    /// is (GETNEXT/GETBULK rounds, or the leaf-root fallback GET).
    pub(crate) async fn walk_round(&self, kind: RoundKind, oid: Oid) -> Result<Pdu> {
        let request_id = self.next_request_id();
        let pdu = match kind {
            RoundKind::Get => Pdu::get_request(request_id, std::slice::from_ref(&oid)),
            RoundKind::GetNext => Pdu::get_next_request(request_id, std::slice::from_ref(&oid)),
            RoundKind::GetBulk { max_repetitions } => {
                GetBulkPdu::new(request_id, 0, max_repetitions, std::slice::from_ref(&oid))
                    .into_pdu()
            }
        };
        self.send_raw(pdu).await
    }

    fn check_increasing(&self) -> bool {
        !self.inner.config.app_opts.contains("c")
    }

    /// Walk a subtree, auto-selecting GETNEXT or GETBULK per the
    /// configured [`WalkMode`] and session version.
    pub fn walk(&self, root: Oid) -> Result<Walk<T>>
    where
        T: 'static,
    {
        let use_bulk = match self.inner.config.walk_mode {
            WalkMode::Auto => self.inner.config.version != Version::V1,
            WalkMode::GetNext => false,
            WalkMode::GetBulk => {
                if self.inner.config.version == Version::V1 {
                    return Err(Error::GetBulkNotSupportedInV1);
                }
                true
            }
        };

        let kind = if use_bulk {
            RoundKind::GetBulk {
                max_repetitions: self.inner.config.max_repetitions,
            }
        } else {
            RoundKind::GetNext
        };

        Ok(Walk::new(
            self.clone(),
            root,
            kind,
            self.check_increasing(),
            self.inner.config.max_walk_results,
        ))
    }

    /// Walk a subtree with GETNEXT regardless of configuration.
    pub fn walk_getnext(&self, root: Oid) -> Walk<T>
    where
        T: 'static,
    {
        Walk::new(
            self.clone(),
            root,
            RoundKind::GetNext,
            self.check_increasing(),
            self.inner.config.max_walk_results,
        )
    }

    /// Walk a subtree with GETBULK at the given max-repetitions.
    pub fn bulk_walk(&self, root: Oid, max_repetitions: i32) -> Walk<T>
    where
        T: 'static,
    {
        Walk::new(
            self.clone(),
            root,
            RoundKind::GetBulk { max_repetitions },
            self.check_increasing(),
            self.inner.config.max_walk_results,
        )
    }

    /// Walk a subtree with GETBULK at the configured max-repetitions.
    pub fn bulk_walk_default(&self, root: Oid) -> Walk<T>
    where
        T: 'static,
    {
        self.bulk_walk(root, self.inner.config.max_repetitions)
    }

    /// Walk a subtree, handing each varbind to `visit`.
    ///
    /// A visitor failure halts the traversal and is surfaced unchanged.
    pub async fn walk_with<F>(&self, root: Oid, mut visit: F) -> Result<()>
    where
        T: 'static,
        F: FnMut(VarBind) -> Result<()>,
    {
        let mut walk = self.walk(root)?;
        while let Some(item) = walk.next().await {
            visit(item?)?;
        }
        Ok(())
    }
}
