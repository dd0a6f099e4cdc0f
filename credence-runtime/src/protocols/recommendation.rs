//! Recommendation protocol - asking for, answering and evaluating
//! recommendations about peers

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, warn};

use credence_core::recommendation::process_new_recommendations;
use credence_core::{
    CredenceError, PeerId, PeerInfo, Recommendation, Satisfaction, TrustConfig, Weight,
};

use crate::bridge::NetworkBridge;
use crate::protocols::{evaluate_interaction, evaluate_interactions, RecommendationRequester};
use crate::storage::TrustStore;
use crate::wire::PeerRecommendationResponse;

/// Handles both directions of the recommendation exchange
pub struct RecommendationProtocol {
    config: Arc<TrustConfig>,
    store: Arc<dyn TrustStore>,
    bridge: Arc<NetworkBridge>,
}

impl RecommendationProtocol {
    pub fn new(
        config: Arc<TrustConfig>,
        store: Arc<dyn TrustStore>,
        bridge: Arc<NetworkBridge>,
    ) -> Self {
        Self {
            config,
            store,
            bridge,
        }
    }

    /// Dispatches a recommendation request about the subject to suitable
    /// recipients.
    ///
    /// Recipients are connected peers whose recommendation trust passes the
    /// configured threshold; with `only_preconfigured`, membership in a
    /// preconfigured organisation replaces the trust requirements. When not
    /// enough qualifying peers are connected, no request is sent at all.
    pub fn send_recommendation_request(&self, subject: &PeerInfo) {
        let settings = &self.config.recommendations;
        if !settings.enabled {
            debug!("recommendation protocol disabled, not sending request");
            return;
        }

        let connected: Vec<PeerInfo> = self
            .store
            .connected_peers()
            .into_iter()
            .filter(|peer| peer.id != subject.id)
            .collect();
        let matrix = self
            .store
            .peers_trust(&connected.iter().map(|p| p.id.clone()).collect::<Vec<_>>());

        let (threshold, required_count) = if settings.only_preconfigured {
            (f64::NEG_INFINITY, 0)
        } else {
            (
                settings.trusted_peer_threshold,
                settings.required_trusted_peers_count,
            )
        };

        let mut candidates: Vec<(PeerId, f64)> = connected
            .iter()
            .filter(|peer| !settings.only_preconfigured || self.is_preconfigured(peer))
            .map(|peer| {
                let trust = matrix
                    .get(&peer.id)
                    .map(|data| data.recommendation_trust)
                    .unwrap_or(0.0);
                (peer.id.clone(), trust)
            })
            .filter(|(_, trust)| *trust >= threshold)
            .collect();

        if candidates.len() < required_count {
            debug!(
                subject = %subject.id,
                candidates = candidates.len(),
                required = required_count,
                "not enough trusted peers for a recommendation request"
            );
            return;
        }

        // highest recommendation trust first, ties broken by peer id
        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        candidates.truncate(settings.peers_max_count);

        let recipients: Vec<PeerId> = candidates.into_iter().map(|(peer_id, _)| peer_id).collect();
        self.bridge
            .send_recommendation_request(&recipients, &subject.id);
    }

    /// Answers a peer's request for a recommendation on the subject.
    ///
    /// Unknown subjects get an all-zero recommendation rather than silence.
    pub fn handle_recommendation_request(
        &self,
        request_id: &str,
        sender: &PeerInfo,
        subject: &str,
    ) {
        let sender_trust = self.store.peer_trust(&sender.id);

        let recommendation = match self.store.peer_trust(subject) {
            Some(trust) => Recommendation {
                competence_belief: trust.competence_belief,
                integrity_belief: trust.integrity_belief,
                service_history_size: trust.service_history_size(),
                recommendation: trust.reputation,
                initial_reputation_provided_by_count: trust.initial_reputation_provided_by_count,
            },
            None => Recommendation::zero(),
        };
        self.bridge
            .send_recommendation_response(request_id, &sender.id, subject, &recommendation);

        match sender_trust {
            Some(trust) => evaluate_interaction(
                &self.config,
                &self.store,
                &self.bridge,
                trust,
                Satisfaction::Ok.value(),
                Weight::IntelligenceRequest,
            ),
            None => debug!(sender = %sender.id, "request from unknown sender, interaction skipped"),
        }
    }

    /// Evaluates a batch of recommendation responses about one subject.
    ///
    /// The batch is rejected as a whole on any consistency violation; an
    /// all-zero-weight batch is skipped while keeping prior state.
    pub fn handle_recommendation_response(&self, responses: Vec<PeerRecommendationResponse>) {
        if responses.is_empty() {
            return;
        }

        let subjects: HashSet<&str> = responses.iter().map(|r| r.subject.as_str()).collect();
        if subjects.len() != 1 {
            let err = CredenceError::MixedSubjects(subjects.len());
            error!(%err, "recommendation batch dropped");
            return;
        }
        let subject_id = &responses[0].subject;
        let Some(subject) = self.store.peer_trust(subject_id) else {
            error!(subject = %subject_id, "no trust record for subject, batch dropped");
            return;
        };

        let recommendations: HashMap<PeerId, Recommendation> = responses
            .iter()
            .map(|r| (r.sender.id.clone(), r.recommendation.clone()))
            .collect();
        let matrix = self
            .store
            .peers_trust(&recommendations.keys().cloned().collect::<Vec<_>>());
        if matrix.len() != responses.len() || recommendations.len() != responses.len() {
            let err = CredenceError::MatrixInconsistency {
                expected: responses.len(),
                actual: matrix.len(),
            };
            error!(%err, "recommendation batch dropped");
            return;
        }

        let updated =
            match process_new_recommendations(&self.config, &subject, &matrix, &recommendations) {
                Ok(updated) => updated,
                Err(CredenceError::InsufficientTrust) => {
                    warn!(
                        subject = %subject_id,
                        "no trusted input among responders, keeping prior reputation"
                    );
                    return;
                }
                Err(err) => {
                    error!(%err, "recommendation batch failed consistency checks");
                    return;
                }
            };

        self.store.store_trust_matrix(updated.clone());
        self.bridge.send_peers_reliability(
            updated
                .values()
                .map(|peer| (peer.peer_id().to_string(), peer.service_trust)),
        );

        let interactions = recommendations
            .keys()
            .filter_map(|peer_id| updated.get(peer_id))
            .map(|peer| {
                (
                    peer.clone(),
                    Satisfaction::Ok.value(),
                    Weight::RecommendationResponse,
                )
            })
            .collect();
        evaluate_interactions(&self.config, &self.store, &self.bridge, interactions);
    }

    fn is_preconfigured(&self, peer: &PeerInfo) -> bool {
        let in_organisation = self
            .config
            .organisations_for(&peer.organisations)
            .next()
            .is_some();
        in_organisation
            || self
                .config
                .trusted_peers
                .iter()
                .any(|trusted| trusted.id == peer.id)
    }
}

impl RecommendationRequester for RecommendationProtocol {
    fn request_recommendations(&self, subject: &PeerInfo) {
        self.send_recommendation_request(subject);
    }
}
