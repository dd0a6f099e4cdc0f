//! Wire envelope and message payloads
//!
//! Every message between the trust layer and the network layer is a JSON
//! envelope `{"type", "version", "data"}`. Types prefixed `nl2tl_` flow from
//! the network layer in, types prefixed `tl2nl_` flow out.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use credence_core::{Alert, PeerId, PeerInfo, Recommendation, Target, ThreatIntelligence};

/// Envelope version understood by this build
pub const PROTOCOL_VERSION: u64 = 1;

/// Versioned wire envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type, e.g. `nl2tl_alert`
    #[serde(rename = "type")]
    pub message_type: String,
    /// Envelope version
    pub version: u64,
    /// Type-specific payload
    #[serde(default)]
    pub data: Value,
}

/// Errors raised while interpreting an envelope
#[derive(Error, Debug)]
pub enum WireError {
    #[error("Unsupported envelope version {0}")]
    UnsupportedVersion(u64),

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A peer's answer to a recommendation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRecommendationResponse {
    pub sender: PeerInfo,
    pub subject: PeerId,
    pub recommendation: Recommendation,
}

/// A peer's answer to an intelligence request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerIntelligenceResponse {
    pub sender: PeerInfo,
    pub target: Target,
    pub intelligence: ThreatIntelligence,
}

/// Parsed inbound message, one variant per `nl2tl_*` type
#[derive(Debug, Clone)]
pub enum InboundMessage {
    PeersList(Vec<PeerInfo>),
    RecommendationRequest {
        request_id: String,
        sender: PeerInfo,
        subject: PeerId,
    },
    RecommendationResponse(Vec<PeerRecommendationResponse>),
    Alert {
        sender: PeerInfo,
        alert: Alert,
    },
    IntelligenceRequest {
        request_id: String,
        sender: PeerInfo,
        target: Target,
    },
    IntelligenceResponse(Vec<PeerIntelligenceResponse>),
}

#[derive(Deserialize)]
struct RawPeersList {
    peers: Vec<PeerInfo>,
}

#[derive(Deserialize)]
struct RawRequest {
    request_id: String,
    sender: PeerInfo,
    payload: String,
}

#[derive(Deserialize)]
struct RawRecommendationResponse {
    sender: PeerInfo,
    payload: RawRecommendationPayload,
}

#[derive(Deserialize)]
struct RawRecommendationPayload {
    subject: PeerId,
    recommendation: Recommendation,
}

#[derive(Deserialize)]
struct RawAlert {
    sender: PeerInfo,
    payload: Alert,
}

#[derive(Deserialize)]
struct RawIntelligenceResponse {
    sender: PeerInfo,
    payload: RawIntelligencePayload,
}

#[derive(Deserialize)]
struct RawIntelligencePayload {
    target: Target,
    intelligence: ThreatIntelligence,
}

/// Interprets an envelope as one of the known inbound messages
pub fn parse_inbound(envelope: &Envelope) -> Result<InboundMessage, WireError> {
    if envelope.version != PROTOCOL_VERSION {
        return Err(WireError::UnsupportedVersion(envelope.version));
    }

    let data = envelope.data.clone();
    let message = match envelope.message_type.as_str() {
        "nl2tl_peers_list" => {
            let raw: RawPeersList = serde_json::from_value(data)?;
            InboundMessage::PeersList(raw.peers)
        }
        "nl2tl_recommendation_request" => {
            let raw: RawRequest = serde_json::from_value(data)?;
            InboundMessage::RecommendationRequest {
                request_id: raw.request_id,
                sender: raw.sender,
                subject: raw.payload,
            }
        }
        "nl2tl_recommendation_response" => {
            let raw: Vec<RawRecommendationResponse> = serde_json::from_value(data)?;
            InboundMessage::RecommendationResponse(
                raw.into_iter()
                    .map(|single| PeerRecommendationResponse {
                        sender: single.sender,
                        subject: single.payload.subject,
                        recommendation: single.payload.recommendation,
                    })
                    .collect(),
            )
        }
        "nl2tl_alert" => {
            let raw: RawAlert = serde_json::from_value(data)?;
            InboundMessage::Alert {
                sender: raw.sender,
                alert: raw.payload,
            }
        }
        "nl2tl_intelligence_request" => {
            let raw: RawRequest = serde_json::from_value(data)?;
            InboundMessage::IntelligenceRequest {
                request_id: raw.request_id,
                sender: raw.sender,
                target: raw.payload,
            }
        }
        "nl2tl_intelligence_response" => {
            let raw: Vec<RawIntelligenceResponse> = serde_json::from_value(data)?;
            InboundMessage::IntelligenceResponse(
                raw.into_iter()
                    .map(|single| PeerIntelligenceResponse {
                        sender: single.sender,
                        target: single.payload.target,
                        intelligence: single.payload.intelligence,
                    })
                    .collect(),
            )
        }
        unknown => return Err(WireError::UnknownType(unknown.to_string())),
    };

    Ok(message)
}
