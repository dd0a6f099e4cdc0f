//! Interaction taxonomy - satisfaction levels and interaction weights

use serde::{Deserialize, Serialize};

/// How satisfied the local node was with an interaction.
///
/// Evaluation strategies may also produce intermediate satisfaction values in
/// `[0, 1]`; this enum names the fixed levels used by the protocol handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Satisfaction {
    /// The interaction failed or the peer misbehaved
    Error,
    /// The interaction was inconclusive
    Unsure,
    /// The interaction went well
    Ok,
}

impl Satisfaction {
    /// Numeric satisfaction value in `[0, 1]`
    pub fn value(self) -> f64 {
        match self {
            Satisfaction::Error => 0.0,
            Satisfaction::Unsure => 0.5,
            Satisfaction::Ok => 1.0,
        }
    }
}

/// How important an interaction type is for the trust computation,
/// `0 < weight <= 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weight {
    /// First contact with a peer
    FirstEncounter,
    /// Keepalive exchange
    Ping,
    /// Peer answered an intelligence request with no data
    IntelligenceNoDataReport,
    /// Peer asked us for intelligence or a recommendation response was served
    IntelligenceRequest,
    /// Peer broadcast an alert
    Alert,
    /// Peer asked us for a recommendation
    RecommendationRequest,
    /// Peer answered an intelligence request with data
    IntelligenceDataReport,
    /// Peer answered a recommendation request
    RecommendationResponse,
    /// Peer caused a protocol error
    Error,
}

impl Weight {
    /// Numeric weight value in `(0, 1]`
    pub fn value(self) -> f64 {
        match self {
            Weight::FirstEncounter => 0.1,
            Weight::Ping => 0.2,
            Weight::IntelligenceNoDataReport => 0.3,
            Weight::IntelligenceRequest => 0.5,
            Weight::Alert => 0.7,
            Weight::RecommendationRequest => 0.7,
            Weight::IntelligenceDataReport => 1.0,
            Weight::RecommendationResponse => 1.0,
            Weight::Error => 1.0,
        }
    }
}
