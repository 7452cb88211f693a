//! Client construction.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;

use super::auth::{Auth, CommunityVersion};
use super::v3::V3SecurityConfig;
use super::walk::WalkMode;
use super::{Client, ClientConfig};
use crate::error::{Error, Result};
use crate::transport::{Transport, UdpTransport};
use crate::version::Version;

/// Default agent port.
pub const DEFAULT_PORT: u16 = 161;

/// Builder for [`Client`].
pub struct ClientBuilder {
    target: String,
    auth: Auth,
    timeout: Duration,
    max_oids_per_request: usize,
    max_repetitions: i32,
    walk_mode: WalkMode,
    max_walk_results: Option<usize>,
    app_opts: HashSet<String>,
}

impl ClientBuilder {
    /// Create a builder for the given target and authentication.
    ///
    /// `target` is `host:port` or a bare host (port 161 assumed).
    pub fn new(target: impl Into<String>, auth: impl Into<Auth>) -> Self {
        Self {
            target: target.into(),
            auth: auth.into(),
            timeout: Duration::from_secs(5),
            max_oids_per_request: 10,
            max_repetitions: 25,
            walk_mode: WalkMode::Auto,
            max_walk_results: None,
            app_opts: HashSet::new(),
        }
    }

    /// Set the per-exchange timeout handed to the transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum OIDs per GET/GETNEXT/SET request before batching.
    pub fn max_oids_per_request(mut self, max: usize) -> Self {
        self.max_oids_per_request = max.max(1);
        self
    }

    /// Set max-repetitions used by GETBULK and bulk walks.
    pub fn max_repetitions(mut self, max: i32) -> Self {
        self.max_repetitions = max;
        self
    }

    /// Set how [`Client::walk`](super::Client::walk) picks its request
    /// type.
    pub fn walk_mode(mut self, mode: WalkMode) -> Self {
        self.walk_mode = mode;
        self
    }

    /// Bound the number of varbinds a single walk may deliver.
    pub fn max_walk_results(mut self, max: usize) -> Self {
        self.max_walk_results = Some(max);
        self
    }

    /// Set an application option.
    ///
    /// The recognized option is `"c"`: do not abort a walk when the
    /// agent returns OIDs that fail the strictly-increasing check.
    /// Unknown options are carried but ignored.
    pub fn app_opt(mut self, opt: impl Into<String>) -> Self {
        self.app_opts.insert(opt.into());
        self
    }

    /// Resolve the configuration without a transport.
    fn into_config(self) -> Result<(String, ClientConfig)> {
        let (version, community, v3_security) = match self.auth {
            Auth::Community { version, community } => {
                let version = match version {
                    CommunityVersion::V1 => Version::V1,
                    CommunityVersion::V2c => Version::V2c,
                };
                (version, Bytes::from(community.into_bytes()), None)
            }
            Auth::Usm(usm) => {
                let security = V3SecurityConfig::from_auth(usm)?;
                (Version::V3, Bytes::new(), Some(security))
            }
        };

        let config = ClientConfig {
            version,
            community,
            timeout: self.timeout,
            max_oids_per_request: self.max_oids_per_request,
            max_repetitions: self.max_repetitions,
            walk_mode: self.walk_mode,
            max_walk_results: self.max_walk_results,
            app_opts: self.app_opts,
            v3_security,
        };

        Ok((self.target, config))
    }

    /// Connect over a dedicated UDP socket.
    pub async fn connect(self) -> Result<Client<UdpTransport>> {
        let (target, config) = self.into_config()?;
        let addr = resolve_target(&target)?;
        let transport = UdpTransport::connect(addr).await?;
        Ok(Client::new(transport, config))
    }

    /// Build over a caller-supplied transport (tests, custom sockets).
    pub fn build_with_transport<T: Transport>(self, transport: T) -> Result<Client<T>> {
        let (_, config) = self.into_config()?;
        Ok(Client::new(transport, config))
    }
}

/// Parse `host:port` or bare-host target syntax.
fn resolve_target(target: &str) -> Result<SocketAddr> {
    if let Ok(addr) = target.parse::<SocketAddr>() {
        return Ok(addr);
    }
    // Bare IP without a port
    if let Ok(ip) = target.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }
    Err(Error::Config(format!(
        "cannot parse target address {:?} (expected ip:port or ip)",
        target
    )))
}
