//! Trust protocol - initial trust for newly encountered peers

use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use credence_core::service::process_service_interaction;
use credence_core::{
    clamp_unit, PeerInfo, PeerTrustData, Satisfaction, TrustConfig, Weight,
};

use crate::protocols::RecommendationRequester;
use crate::storage::TrustStore;

/// Determines and persists the initial trust for peers on first encounter.
///
/// A peer moves from unknown to trust-seeded exactly once; afterwards the
/// stored record is authoritative and this protocol only looks it up.
pub struct TrustProtocol {
    store: Arc<dyn TrustStore>,
    config: Arc<TrustConfig>,
    recommendations: Arc<dyn RecommendationRequester>,
}

impl TrustProtocol {
    pub fn new(
        store: Arc<dyn TrustStore>,
        config: Arc<TrustConfig>,
        recommendations: Arc<dyn RecommendationRequester>,
    ) -> Self {
        Self {
            store,
            config,
            recommendations,
        }
    }

    /// Determines initial trust for the peer and stores it.
    ///
    /// Idempotent: an existing record is returned unchanged. For a new peer,
    /// reputation is seeded from preconfigured organisations when the peer
    /// belongs to any; with `get_recommendations`, peers that end up with
    /// zero reputation trigger the recommendation protocol.
    pub fn determine_and_store_initial_trust(
        &self,
        peer: &PeerInfo,
        get_recommendations: bool,
    ) -> PeerTrustData {
        if let Some(existing) = self.store.peer_trust(&peer.id) {
            debug!(
                peer = %peer.id,
                service_trust = existing.service_trust,
                "trust record already exists"
            );
            return existing;
        }

        let mut trust = PeerTrustData::new(peer.clone());
        trust.reputation = self.config.initial_reputation;

        let organisations: Vec<_> = self
            .config
            .organisations_for(&peer.organisations)
            .cloned()
            .collect();
        // organisation with the highest trust wins, ties broken by id
        let leading = organisations.iter().max_by(|a, b| {
            a.trust
                .partial_cmp(&b.trust)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.id.cmp(&a.id))
        });
        if let Some(leading) = leading {
            trust.initial_reputation_provided_by_count = organisations.len();
            debug!(peer = %peer.id, organisation = %leading.id, "seeding trust from organisation");

            trust.reputation = clamp_unit(trust.reputation.max(leading.trust));
            trust.recommendation_trust = trust.reputation;
            process_service_interaction(
                &self.config,
                &mut trust,
                Satisfaction::Ok.value(),
                Weight::FirstEncounter,
            );

            if leading.enforce_trust {
                trust.has_fixed_trust = true;
                trust.service_trust = trust.reputation;
                // every interaction with an enforced peer counts as satisfying
                trust.competence_belief = 1.0;
                trust.integrity_belief = 1.0;
                debug!(
                    peer = %peer.id,
                    service_trust = trust.service_trust,
                    "trust enforced by organisation"
                );
            }
        }

        if trust.reputation == 0.0 && get_recommendations {
            debug!(peer = %peer.id, "zero reputation, requesting recommendations");
            self.recommendations.request_recommendations(peer);
        }

        self.store.store_peer_trust(trust.clone());
        trust
    }
}
