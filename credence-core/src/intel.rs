//! Threat-intelligence model - opinions on network targets

use serde::{Deserialize, Serialize};

use crate::peer::Target;

/// A peer's opinion on a target (IP address or domain)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreatIntelligence {
    /// How malicious or benign the target is, `-1` malicious to `1` benign
    pub score: f64,
    /// How certain the peer is that the score is correct, `[0, 1]`
    pub confidence: f64,
}

impl ThreatIntelligence {
    /// Zero-valued intelligence, the answer when no data is available
    pub fn zero() -> Self {
        Self {
            score: 0.0,
            confidence: 0.0,
        }
    }
}

/// Threat intelligence bound to a concrete target, as produced for and
/// consumed by the host intrusion-detection system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetThreatIntelligence {
    /// See [`ThreatIntelligence::score`]
    pub score: f64,
    /// See [`ThreatIntelligence::confidence`]
    pub confidence: f64,
    /// Target of the intelligence
    pub target: Target,
    /// Confidentiality level if known, `[0, 1]`; gates which peers may
    /// receive this intelligence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidentiality: Option<f64>,
}

impl TargetThreatIntelligence {
    /// Bind plain intelligence to a target
    pub fn new(intelligence: ThreatIntelligence, target: &str) -> Self {
        Self {
            score: intelligence.score,
            confidence: intelligence.confidence,
            target: target.to_string(),
            confidentiality: None,
        }
    }

    /// Drop the target binding
    pub fn intelligence(&self) -> ThreatIntelligence {
        ThreatIntelligence {
            score: self.score,
            confidence: self.confidence,
        }
    }
}

/// Alert broadcast on the network about a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Target the alert is about
    pub target: Target,
    /// See [`ThreatIntelligence::score`]
    pub score: f64,
    /// See [`ThreatIntelligence::confidence`]
    pub confidence: f64,
}
