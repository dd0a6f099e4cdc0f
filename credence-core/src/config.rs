//! Trust model configuration
//!
//! Immutable, externally loaded settings for the trust layer. Strategy
//! choices are part of the configuration - each strategy variant carries its
//! own explicit parameters and everything is validated up front.

use serde::{Deserialize, Serialize};

use crate::aggregation::TiAggregation;
use crate::evaluation::TiEvaluation;
use crate::peer::OrganisationId;

/// Named privacy level for labeling data sensitivity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivacyLevel {
    /// Name of the level
    pub name: String,
    /// Value used for comparison, `0 <= value <= 1`. A value above 1 means
    /// the data is never sent.
    pub value: f64,
}

/// Minimal trust required to receive data labeled at or above a level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrivacyThreshold {
    /// Confidentiality level this threshold applies to (and all levels above)
    pub level: f64,
    /// The trust required to obtain data with this level
    pub required_trust: f64,
}

/// Preconfigured peer or organisation with an assigned initial trust
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustedEntity {
    /// Unique identifier of the peer or organisation
    pub id: OrganisationId,
    /// Human-readable name
    pub name: String,
    /// Initial trust for the entity, `[0, 1]`
    pub trust: f64,
    /// If true, members of this entity keep the initial trust forever
    pub enforce_trust: bool,
    /// What level of data may be shared with this entity
    pub privacy_level: f64,
}

/// Settings for the recommendation protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Whether the recommendation protocol runs at all
    pub enabled: bool,
    /// If true, only preconfigured peers / organisations are asked
    pub only_preconfigured: bool,
    /// Minimal number of trusted connected peers required before asking
    pub required_trusted_peers_count: usize,
    /// Minimal recommendation trust for a peer to qualify as trusted
    pub trusted_peer_threshold: f64,
    /// Maximal count of peers asked for a recommendation (eta_max)
    pub peers_max_count: usize,
    /// Maximal size of the recommendation history (rh_max)
    pub history_max_size: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            only_preconfigured: false,
            required_trusted_peers_count: 1,
            trusted_peer_threshold: 0.5,
            peers_max_count: 10,
            history_max_size: 100,
        }
    }
}

/// Complete trust model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Privacy levels settings
    pub privacy_levels: Vec<PrivacyLevel>,
    /// Thresholds for data filtering
    pub privacy_thresholds: Vec<PrivacyThreshold>,
    /// Confidentiality level assumed for unlabeled data
    pub data_default_level: f64,
    /// Reputation assigned to every peer on first encounter
    pub initial_reputation: f64,
    /// Maximal size of the service history (sh_max)
    pub service_history_max_size: usize,
    /// Recommendation protocol settings
    pub recommendations: RecommendationConfig,
    /// How much to trust an alert sent by a peer we know nothing about
    pub alert_trust_from_unknown: f64,
    /// Preconfigured peers
    pub trusted_peers: Vec<TrustedEntity>,
    /// Preconfigured organisations
    pub trusted_organisations: Vec<TrustedEntity>,
    /// How long a cached network opinion stays valid, in seconds
    pub network_opinion_cache_valid_seconds: u64,
    /// Strategy combining peer reports into one verdict
    pub ti_aggregation: TiAggregation,
    /// Strategy scoring how satisfying each peer's report was
    pub ti_evaluation: TiEvaluation,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            privacy_levels: Vec::new(),
            privacy_thresholds: Vec::new(),
            data_default_level: 0.0,
            initial_reputation: 0.0,
            service_history_max_size: 100,
            recommendations: RecommendationConfig::default(),
            alert_trust_from_unknown: 0.5,
            trusted_peers: Vec::new(),
            trusted_organisations: Vec::new(),
            network_opinion_cache_valid_seconds: 3600,
            ti_aggregation: TiAggregation::default(),
            ti_evaluation: TiEvaluation::default(),
        }
    }
}

impl TrustConfig {
    /// Validates value ranges across the whole configuration.
    ///
    /// Returns a human-readable description of the first violation found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.service_history_max_size == 0 {
            return Err("service_history_max_size must be at least 1".to_string());
        }
        if self.recommendations.history_max_size == 0 {
            return Err("recommendations.history_max_size must be at least 1".to_string());
        }
        if self.recommendations.peers_max_count == 0 {
            return Err("recommendations.peers_max_count must be at least 1".to_string());
        }
        if !unit_range(self.recommendations.trusted_peer_threshold) {
            return Err("recommendations.trusted_peer_threshold must be in [0, 1]".to_string());
        }
        if !unit_range(self.data_default_level) {
            return Err("data_default_level must be in [0, 1]".to_string());
        }
        if !unit_range(self.initial_reputation) {
            return Err("initial_reputation must be in [0, 1]".to_string());
        }
        if !unit_range(self.alert_trust_from_unknown) {
            return Err("alert_trust_from_unknown must be in [0, 1]".to_string());
        }
        for threshold in &self.privacy_thresholds {
            if !unit_range(threshold.required_trust) {
                return Err(format!(
                    "privacy threshold for level {} has required_trust outside [0, 1]",
                    threshold.level
                ));
            }
        }
        for entity in self.trusted_peers.iter().chain(&self.trusted_organisations) {
            if !unit_range(entity.trust) {
                return Err(format!("trusted entity {} has trust outside [0, 1]", entity.id));
            }
        }
        if let TiEvaluation::Threshold { threshold } = self.ti_evaluation {
            if !unit_range(threshold) {
                return Err("ti_evaluation threshold must be in [0, 1]".to_string());
            }
        }
        Ok(())
    }

    /// Organisations from the configuration that the given peer belongs to
    pub fn organisations_for<'a>(
        &'a self,
        organisations: &'a [OrganisationId],
    ) -> impl Iterator<Item = &'a TrustedEntity> {
        self.trusted_organisations
            .iter()
            .filter(|org| organisations.contains(&org.id))
    }
}

fn unit_range(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}
