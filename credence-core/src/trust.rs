//! Trust data model - per-peer trust metrics and interaction histories

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::peer::{PeerId, PeerInfo};

/// Returns current time, the single clock used by the trust model
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// A single evaluated service interaction with a peer.
///
/// Appended once per evaluated interaction; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHistoryRecord {
    /// How satisfied we were with the interaction, `0 <= satisfaction <= 1`
    pub satisfaction: f64,
    /// How important the interaction was, `0 < weight <= 1`
    pub weight: f64,
    /// When the interaction happened
    pub timestamp: DateTime<Utc>,
}

/// A single evaluated recommendation received from a peer.
///
/// Satisfaction captures how close the peer's recommendation was to the
/// consensus of all responders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationHistoryRecord {
    /// How close the recommendation was to the consensus, `0 <= satisfaction <= 1`
    pub satisfaction: f64,
    /// Weight of the recommendation interaction, `0 < weight <= 1`
    pub weight: f64,
    /// When the recommendation was evaluated
    pub timestamp: DateTime<Utc>,
}

/// Trust data for a single peer.
///
/// One record per known peer, created on first encounter and then mutated in
/// place by the service and recommendation engines. Records are never deleted
/// during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerTrustData {
    /// Identity of the peer these metrics describe
    pub info: PeerInfo,

    /// If true, service trust and beliefs are pinned and never recomputed
    pub has_fixed_trust: bool,

    /// Trust in the peer's quality of service, `[0, 1]`
    pub service_trust: f64,

    /// Trust derived from recommendations (stranger trust), `[0, 1]`
    pub reputation: f64,

    /// Trust that this peer's recommendations are accurate, `[0, 1]`
    pub recommendation_trust: f64,

    /// Expected mean behavior over the service history, `[0, 1]`
    pub competence_belief: f64,

    /// Consistency of behavior over the service history, `[0, 1]`
    pub integrity_belief: f64,

    /// How many peers contributed to the last reputation estimate
    pub initial_reputation_provided_by_count: usize,

    /// Interaction history, oldest first, capped at the configured maximum
    pub service_history: Vec<ServiceHistoryRecord>,

    /// Recommendation history, oldest first, capped at the configured maximum
    pub recommendation_history: Vec<RecommendationHistoryRecord>,
}

impl PeerTrustData {
    /// Create a zeroed trust record for a newly encountered peer
    pub fn new(info: PeerInfo) -> Self {
        Self {
            info,
            has_fixed_trust: false,
            service_trust: 0.0,
            reputation: 0.0,
            recommendation_trust: 0.0,
            competence_belief: 0.0,
            integrity_belief: 0.0,
            initial_reputation_provided_by_count: 0,
            service_history: Vec::new(),
            recommendation_history: Vec::new(),
        }
    }

    /// Peer id this record belongs to
    pub fn peer_id(&self) -> &str {
        &self.info.id
    }

    /// Current size of the service history
    pub fn service_history_size(&self) -> usize {
        self.service_history.len()
    }

    /// Current size of the recommendation history
    pub fn recommendation_history_size(&self) -> usize {
        self.recommendation_history.len()
    }
}

/// Mapping from peer id to its trust data, the unit of batch updates between
/// protocol handlers and engines
pub type TrustMatrix = HashMap<PeerId, PeerTrustData>;
