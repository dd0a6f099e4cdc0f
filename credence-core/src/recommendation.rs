//! Recommendation Engine
//!
//! Estimates a stranger peer's reputation from third-party recommendations
//! and feeds the deviation between each recommender's answer and the
//! consensus back into that recommender's own recommendation trust.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::TrustConfig;
use crate::error::{CredenceError, Result};
use crate::interaction::Weight;
use crate::service::fading_factors;
use crate::trust::{now, PeerTrustData, RecommendationHistoryRecord, TrustMatrix};
use crate::peer::PeerId;
use crate::{clamp_unit, INTEGRITY_DISCOUNT};

/// Recommendation payload a peer sends about a third party
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Recommender's competence belief about the subject
    pub competence_belief: f64,
    /// Recommender's integrity belief about the subject
    pub integrity_belief: f64,
    /// Size of the recommender's service history with the subject
    pub service_history_size: usize,
    /// Recommender's reputation value for the subject
    pub recommendation: f64,
    /// How many peers contributed to the recommender's reputation estimate
    pub initial_reputation_provided_by_count: usize,
}

impl Recommendation {
    /// All-zero recommendation, the answer for an unknown subject
    pub fn zero() -> Self {
        Self {
            competence_belief: 0.0,
            integrity_belief: 0.0,
            service_history_size: 0,
            recommendation: 0.0,
            initial_reputation_provided_by_count: 0,
        }
    }
}

/// Evaluates received recommendations about `subject`.
///
/// Computes the subject's new reputation from the responses, then updates
/// every responder's recommendation history and recommendation trust based on
/// how far its answer was from the consensus. Returns a new matrix containing
/// only the peers that were updated (the subject plus all responders).
///
/// Fails with [`CredenceError::PeerNotInMatrix`] when a responder is missing
/// from the matrix (consistency violation, fatal for the batch) and with
/// [`CredenceError::InsufficientTrust`] when all responder weights are zero
/// (recoverable, the caller keeps prior state).
pub fn process_new_recommendations(
    config: &TrustConfig,
    subject: &PeerTrustData,
    matrix: &TrustMatrix,
    responses: &HashMap<PeerId, Recommendation>,
) -> Result<TrustMatrix> {
    for peer_id in responses.keys() {
        if !matrix.contains_key(peer_id) {
            return Err(CredenceError::PeerNotInMatrix(peer_id.clone()));
        }
    }

    let er = estimate_recommendation(matrix, responses)?;
    let (ecb, eib) = estimate_beliefs(matrix, responses)?;

    let history_mean = (responses
        .values()
        .map(|r| r.service_history_size as f64)
        .sum::<f64>()
        / responses.len() as f64)
        .round();
    let history_factor = (history_mean / config.service_history_max_size as f64).min(1.0);

    let own_experience = history_factor * (ecb + INTEGRITY_DISCOUNT * eib);
    let from_recommendations = (1.0 - history_factor) * er;
    let reputation = clamp_unit(own_experience + from_recommendations);

    let mut updated = TrustMatrix::new();

    let mut updated_subject = subject.clone();
    updated_subject.reputation = reputation;
    // we trust the subject the same with recommendations as with service
    updated_subject.recommendation_trust = reputation;
    updated_subject.initial_reputation_provided_by_count = responses.len();
    updated.insert(updated_subject.peer_id().to_string(), updated_subject);

    for (peer_id, recommendation) in responses {
        let mut peer = matrix[peer_id].clone();
        let satisfaction = consensus_satisfaction(recommendation, er, ecb, eib);

        peer.recommendation_history.push(RecommendationHistoryRecord {
            satisfaction,
            weight: Weight::RecommendationResponse.value(),
            timestamp: now(),
        });
        while peer.recommendation_history.len() > config.recommendations.history_max_size {
            peer.recommendation_history.remove(0);
        }

        update_recommendation_trust(config, &mut peer);
        updated.insert(peer.peer_id().to_string(), peer);
    }

    Ok(updated)
}

/// Recomputes a peer's recommendation trust from its recommendation history.
///
/// Same fading/weighting scheme as the service trust update, bounded by the
/// recommendation history maximum and blended with the peer's reputation.
pub fn update_recommendation_trust(config: &TrustConfig, peer: &mut PeerTrustData) {
    if peer.recommendation_history.is_empty() {
        return;
    }

    let history = &peer.recommendation_history;
    let n = history.len() as f64;
    let fading = fading_factors(history.len());

    let normalisation: f64 = history
        .iter()
        .zip(&fading)
        .map(|(record, f)| record.weight * f)
        .sum();
    let competence: f64 = history
        .iter()
        .zip(&fading)
        .map(|(record, f)| record.satisfaction * record.weight * f)
        .sum::<f64>()
        / normalisation;

    let weight_mean: f64 = history.iter().map(|r| r.weight).sum::<f64>() / n;
    let fading_mean: f64 = fading.iter().sum::<f64>() / n;
    let integrity = (history
        .iter()
        .map(|r| (r.satisfaction * weight_mean * fading_mean - competence).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();

    let history_factor =
        (n / config.recommendations.history_max_size as f64).min(1.0);

    let own_experience = history_factor * (competence + INTEGRITY_DISCOUNT * integrity);
    let from_reputation = (1.0 - history_factor) * peer.reputation;

    peer.recommendation_trust = clamp_unit(own_experience + from_reputation);
}

/// Estimated recommendation `er` - recommendations weighted by each
/// responder's recommendation trust and reputation source count
fn estimate_recommendation(
    matrix: &TrustMatrix,
    responses: &HashMap<PeerId, Recommendation>,
) -> Result<f64> {
    let normalisation: f64 = responses
        .iter()
        .map(|(peer_id, r)| {
            matrix[peer_id].recommendation_trust * r.initial_reputation_provided_by_count as f64
        })
        .sum();
    if normalisation <= 0.0 {
        return Err(CredenceError::InsufficientTrust);
    }

    let weighted: f64 = responses
        .iter()
        .map(|(peer_id, r)| {
            matrix[peer_id].recommendation_trust
                * r.initial_reputation_provided_by_count as f64
                * r.recommendation
        })
        .sum();

    Ok(weighted / normalisation)
}

/// Estimated competence and integrity beliefs `(ecb, eib)` - responder
/// beliefs weighted by recommendation trust and service history size
fn estimate_beliefs(
    matrix: &TrustMatrix,
    responses: &HashMap<PeerId, Recommendation>,
) -> Result<(f64, f64)> {
    let mut normalisation = 0.0;
    let mut competence = 0.0;
    let mut integrity = 0.0;

    for (peer_id, response) in responses {
        // rt_ik * sh_kj
        let trust_history_size =
            matrix[peer_id].recommendation_trust * response.service_history_size as f64;
        normalisation += trust_history_size;
        competence += trust_history_size * response.competence_belief;
        integrity += trust_history_size * response.integrity_belief;
    }

    if normalisation <= 0.0 {
        return Err(CredenceError::InsufficientTrust);
    }

    Ok((competence / normalisation, integrity / normalisation))
}

/// How close a responder's answer was to the consensus values, in `[0, 1]`
fn consensus_satisfaction(recommendation: &Recommendation, er: f64, ecb: f64, eib: f64) -> f64 {
    let deviation = ((recommendation.recommendation - er).abs()
        + (recommendation.competence_belief - ecb).abs()
        + (recommendation.integrity_belief - eib).abs())
        / 3.0;
    clamp_unit(1.0 - deviation)
}
