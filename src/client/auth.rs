//! Authentication configuration for the client.
//!
//! [`Auth`] selects between community-string authentication (v1/v2c)
//! and SNMPv3 USM credentials built through [`UsmBuilder`].

use crate::v3::{AuthProtocol, PrivProtocol};

/// SNMP version for community-based authentication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommunityVersion {
    /// SNMPv1
    V1,
    /// SNMPv2c
    #[default]
    V2c,
}

/// Authentication configuration.
#[derive(Debug, Clone)]
pub enum Auth {
    /// Community string authentication (SNMPv1 or v2c).
    Community {
        version: CommunityVersion,
        community: String,
    },
    /// User-based Security Model (SNMPv3).
    Usm(UsmAuth),
}

impl Default for Auth {
    fn default() -> Self {
        Auth::v2c("public")
    }
}

impl Auth {
    /// SNMPv1 community authentication.
    pub fn v1(community: impl Into<String>) -> Self {
        Auth::Community {
            version: CommunityVersion::V1,
            community: community.into(),
        }
    }

    /// SNMPv2c community authentication.
    pub fn v2c(community: impl Into<String>) -> Self {
        Auth::Community {
            version: CommunityVersion::V2c,
            community: community.into(),
        }
    }

    /// Start building SNMPv3 USM credentials.
    ///
    /// The three security levels fall out of what is configured:
    /// username only is noAuthNoPriv, adding [`UsmBuilder::auth`] gives
    /// authNoPriv, adding [`UsmBuilder::privacy`] on top gives authPriv.
    pub fn usm(username: impl Into<String>) -> UsmBuilder {
        UsmBuilder::new(username)
    }
}

/// SNMPv3 USM credentials.
#[derive(Debug, Clone)]
pub struct UsmAuth {
    /// User name
    pub username: String,
    /// Authentication protocol (None for noAuthNoPriv)
    pub auth_protocol: Option<AuthProtocol>,
    /// Authentication passphrase
    pub auth_password: Option<String>,
    /// Privacy protocol (None for no encryption)
    pub priv_protocol: Option<PrivProtocol>,
    /// Privacy passphrase
    pub priv_password: Option<String>,
    /// Context name; empty in almost every deployment
    pub context_name: Option<String>,
}

/// Builder for SNMPv3 USM credentials.
pub struct UsmBuilder {
    username: String,
    auth: Option<(AuthProtocol, String)>,
    privacy: Option<(PrivProtocol, String)>,
    context_name: Option<String>,
}

impl UsmBuilder {
    /// Create a builder for the given user.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            auth: None,
            privacy: None,
            context_name: None,
        }
    }

    /// Add authentication (authNoPriv, or authPriv with privacy).
    pub fn auth(mut self, protocol: AuthProtocol, password: impl Into<String>) -> Self {
        self.auth = Some((protocol, password.into()));
        self
    }

    /// Add privacy/encryption (authPriv; requires authentication too).
    pub fn privacy(mut self, protocol: PrivProtocol, password: impl Into<String>) -> Self {
        self.privacy = Some((protocol, password.into()));
        self
    }

    /// Set a non-default context name.
    pub fn context_name(mut self, name: impl Into<String>) -> Self {
        self.context_name = Some(name.into());
        self
    }

    /// Finish into [`UsmAuth`].
    pub fn build(self) -> UsmAuth {
        let (auth_protocol, auth_password) = match self.auth {
            Some((p, pw)) => (Some(p), Some(pw)),
            None => (None, None),
        };
        let (priv_protocol, priv_password) = match self.privacy {
            Some((p, pw)) => (Some(p), Some(pw)),
            None => (None, None),
        };

        UsmAuth {
            username: self.username,
            auth_protocol,
            auth_password,
            priv_protocol,
            priv_password,
            context_name: self.context_name,
        }
    }
}

impl From<UsmBuilder> for Auth {
    fn from(builder: UsmBuilder) -> Self {
        Auth::Usm(builder.build())
    }
}

impl From<UsmAuth> for Auth {
    fn from(auth: UsmAuth) -> Self {
        Auth::Usm(auth)
    }
}
