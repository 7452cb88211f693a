//! Engine discovery and time synchronization (RFC 3414 Sections 2.3, 4).
//!
//! Before any authenticated traffic the client must learn the
//! authoritative engine's ID, boots counter, and time:
//!
//! 1. Client sends a discovery request (reportable, noAuthNoPriv, empty
//!    engine ID, empty varbinds)
//! 2. Agent answers with a Report PDU carrying usmStatsUnknownEngineIDs
//! 3. The response's USM parameters hold engine ID / boots / time
//! 4. The session adopts them and derives localized keys
//!
//! Afterwards [`EngineState`] tracks time locally (`Instant`-based) and
//! enforces the 150 second window and boots latching from RFC 3414.

use std::time::Instant;

use bytes::Bytes;

use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::{Pdu, PduType};
use crate::v3::UsmSecurityParams;

/// Time window in seconds (RFC 3414 Section 2.2.3).
pub const TIME_WINDOW: u32 = 150;

/// Maximum snmpEngineTime / snmpEngineBoots value (RFC 3414 Section
/// 2.2.1): both are 31-bit quantities.
pub const MAX_ENGINE_TIME: u32 = 2147483647;

/// Default msgMaxSize (65535 - 20 IPv4 - 8 UDP).
pub const DEFAULT_MSG_MAX_SIZE: u32 = 65507;

/// usmStats OIDs carried by Report PDUs (RFC 3414 Section 5).
pub mod report_oids {
    use crate::oid;
    use crate::oid::Oid;

    /// usmStatsUnsupportedSecLevels
    pub fn unsupported_sec_levels() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 1, 0)
    }

    /// usmStatsNotInTimeWindows
    pub fn not_in_time_windows() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 2, 0)
    }

    /// usmStatsUnknownUserNames
    pub fn unknown_user_names() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 3, 0)
    }

    /// usmStatsUnknownEngineIDs
    pub fn unknown_engine_ids() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0)
    }

    /// usmStatsWrongDigests
    pub fn wrong_digests() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 5, 0)
    }

    /// usmStatsDecryptionErrors
    pub fn decryption_errors() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 6, 0)
    }
}

/// Discovered authoritative engine state.
#[derive(Debug, Clone)]
pub struct EngineState {
    /// Authoritative engine ID
    pub engine_id: Bytes,
    /// Engine boot count
    pub engine_boots: u32,
    /// Engine time at last sync
    pub engine_time: u32,
    /// Local instant when engine_time was received
    pub synced_at: Instant,
    /// Highest engine time seen (anti-replay, RFC 3414 Section 2.3)
    pub latest_received_engine_time: u32,
}

impl EngineState {
    /// Create engine state from a discovery response.
    pub fn new(engine_id: Bytes, engine_boots: u32, engine_time: u32) -> Self {
        Self {
            engine_id,
            engine_boots,
            engine_time,
            synced_at: Instant::now(),
            latest_received_engine_time: engine_time,
        }
    }

    /// Estimated current engine time: synced time plus local elapsed
    /// time, capped at the 31-bit maximum.
    pub fn estimated_time(&self) -> u32 {
        let elapsed = self.synced_at.elapsed().as_secs() as u32;
        self.engine_time
            .saturating_add(elapsed)
            .min(MAX_ENGINE_TIME)
    }

    /// Absorb boots/time from a response.
    ///
    /// Per RFC 3414 Section 3.2 Step 7b, only advance when the response
    /// opens a new boot cycle or carries a strictly newer time; anything
    /// else is a potential replay and is ignored.
    pub fn update_time(&mut self, response_boots: u32, response_time: u32) -> bool {
        if response_boots > self.engine_boots {
            self.engine_boots = response_boots;
            self.engine_time = response_time;
            self.synced_at = Instant::now();
            self.latest_received_engine_time = response_time;
            true
        } else if response_boots == self.engine_boots
            && response_time > self.latest_received_engine_time
        {
            self.engine_time = response_time;
            self.synced_at = Instant::now();
            self.latest_received_engine_time = response_time;
            true
        } else {
            false
        }
    }

    /// Check a message's boots/time against the RFC 3414 Section 2.2.3
    /// window: boots must match, must not be latched at the maximum, and
    /// the times must agree within 150 seconds.
    pub fn is_in_time_window(&self, msg_boots: u32, msg_time: u32) -> bool {
        if self.engine_boots == MAX_ENGINE_TIME {
            return false;
        }
        if msg_boots != self.engine_boots {
            return false;
        }
        msg_time.abs_diff(self.estimated_time()) <= TIME_WINDOW
    }
}

/// Extract engine state from a discovery response's USM security
/// parameters.
pub fn parse_discovery_response(security_params: &Bytes) -> Result<EngineState> {
    let usm = UsmSecurityParams::decode(security_params.clone())?;

    if usm.engine_id.is_empty() {
        tracing::debug!(
            target: "snmpkit::engine",
            "discovery response carried an empty engine ID"
        );
        return Err(Error::decode(0, DecodeErrorKind::EmptyEngineId));
    }

    Ok(EngineState::new(
        usm.engine_id,
        usm.engine_boots,
        usm.engine_time,
    ))
}

fn report_contains(pdu: &Pdu, oid: crate::oid::Oid) -> bool {
    pdu.pdu_type == PduType::Report && pdu.varbinds.iter().any(|vb| vb.oid == oid)
}

/// Check for usmStatsUnknownEngineIDs (the discovery response).
pub fn is_unknown_engine_id_report(pdu: &Pdu) -> bool {
    report_contains(pdu, report_oids::unknown_engine_ids())
}

/// Check for usmStatsNotInTimeWindows (resync needed).
pub fn is_not_in_time_window_report(pdu: &Pdu) -> bool {
    report_contains(pdu, report_oids::not_in_time_windows())
}

/// Check for usmStatsWrongDigests (authentication failed agent-side).
pub fn is_wrong_digest_report(pdu: &Pdu) -> bool {
    report_contains(pdu, report_oids::wrong_digests())
}

/// Check for usmStatsUnknownUserNames.
pub fn is_unknown_user_name_report(pdu: &Pdu) -> bool {
    report_contains(pdu, report_oids::unknown_user_names())
}

/// Check for usmStatsUnsupportedSecLevels.
pub fn is_unsupported_sec_level_report(pdu: &Pdu) -> bool {
    report_contains(pdu, report_oids::unsupported_sec_levels())
}

/// Check for usmStatsDecryptionErrors.
pub fn is_decryption_error_report(pdu: &Pdu) -> bool {
    report_contains(pdu, report_oids::decryption_errors())
}
