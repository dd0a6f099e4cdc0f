//! # CREDENCE Core
//!
//! Core data model and algorithms for the CREDENCE trust layer.
//!
//! CREDENCE computes and propagates peer trust in a decentralized network of
//! intrusion-detection nodes. Every node keeps a local, subjective view of how
//! much it trusts its peers, and uses that view to weight threat-intelligence
//! reports and alerts received from the network.
//!
//! ## Core Concepts
//!
//! - **Service trust**: trust in a peer's quality of service, from direct
//!   interaction history
//! - **Reputation**: trust in a stranger, estimated from recommendations
//! - **Recommendation trust**: trust that a peer's recommendations are accurate
//! - **Aggregation / evaluation strategies**: pluggable functions that combine
//!   peers' threat reports into one verdict and score how satisfying each
//!   report was
//!
//! ## Example
//!
//! ```rust
//! use credence_core::{PeerInfo, PeerTrustData, TrustConfig, Weight};
//! use credence_core::service::process_service_interaction;
//!
//! let config = TrustConfig::default();
//! let mut peer = PeerTrustData::new(PeerInfo::new("peer#1"));
//!
//! // Register a successful interaction and recompute service trust.
//! process_service_interaction(&config, &mut peer, 1.0, Weight::Ping);
//! assert!(peer.service_trust >= 0.0 && peer.service_trust <= 1.0);
//! ```

pub mod aggregation;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod intel;
pub mod interaction;
pub mod peer;
pub mod recommendation;
pub mod service;
pub mod trust;

pub use aggregation::{PeerReport, TiAggregation};
pub use config::{
    PrivacyLevel, PrivacyThreshold, RecommendationConfig, TrustConfig, TrustedEntity,
};
pub use error::{CredenceError, Result};
pub use evaluation::TiEvaluation;
pub use intel::{Alert, TargetThreatIntelligence, ThreatIntelligence};
pub use interaction::{Satisfaction, Weight};
pub use peer::{OrganisationId, PeerId, PeerInfo, Target};
pub use recommendation::Recommendation;
pub use trust::{
    PeerTrustData, RecommendationHistoryRecord, ServiceHistoryRecord, TrustMatrix,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lower bound for trust, belief and confidence values
pub const TRUST_MIN: f64 = 0.0;

/// Upper bound for trust, belief and confidence values
pub const TRUST_MAX: f64 = 1.0;

/// Lower bound for threat-intelligence scores (malicious)
pub const SCORE_MIN: f64 = -1.0;

/// Upper bound for threat-intelligence scores (benign)
pub const SCORE_MAX: f64 = 1.0;

/// Discount applied to the integrity belief when blending beliefs into trust.
///
/// Constant by the model definition, kept as a named value so future
/// time-decay schemes can replace it in one place.
pub const INTEGRITY_DISCOUNT: f64 = -0.5;

/// Clamp a trust/belief/confidence value into `[0, 1]`
pub fn clamp_unit(value: f64) -> f64 {
    value.clamp(TRUST_MIN, TRUST_MAX)
}

/// Clamp a threat-intelligence score into `[-1, 1]`
pub fn clamp_score(value: f64) -> f64 {
    value.clamp(SCORE_MIN, SCORE_MAX)
}
