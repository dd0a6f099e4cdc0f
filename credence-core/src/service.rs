//! Service Trust Engine
//!
//! Converts a peer's interaction history into `service_trust`,
//! `competence_belief` and `integrity_belief`. The more history we have with
//! a peer, the more its own behavior outweighs the reputation that other
//! peers provided for it.

use tracing::debug;

use crate::config::TrustConfig;
use crate::error::{CredenceError, Result};
use crate::interaction::Weight;
use crate::trust::{now, PeerTrustData, ServiceHistoryRecord};
use crate::{clamp_unit, INTEGRITY_DISCOUNT};

/// Registers an evaluated interaction and recomputes the peer's service trust.
///
/// Appends a new history record (evicting the oldest one when the history is
/// at the configured maximum) and reruns the trust update. Peers with fixed
/// trust are left untouched, including their history.
pub fn process_service_interaction(
    config: &TrustConfig,
    peer: &mut PeerTrustData,
    satisfaction: f64,
    weight: Weight,
) {
    if peer.has_fixed_trust {
        debug!(peer = peer.peer_id(), "peer has fixed trust, not modifying");
        return;
    }

    peer.service_history.push(ServiceHistoryRecord {
        satisfaction: clamp_unit(satisfaction),
        weight: weight.value(),
        timestamp: now(),
    });
    while peer.service_history.len() > config.service_history_max_size {
        peer.service_history.remove(0);
    }

    // history is non-empty here, the update cannot fail
    let _ = update_service_trust(config, peer);
}

/// Recomputes `service_trust`, `competence_belief` and `integrity_belief`
/// from the peer's current service history.
///
/// No-op for fixed-trust peers. Fails with [`CredenceError::EmptyHistory`]
/// when the history is empty - there is nothing to derive beliefs from and
/// the trust protocol is responsible for seeding the initial values.
pub fn update_service_trust(config: &TrustConfig, peer: &mut PeerTrustData) -> Result<()> {
    if peer.has_fixed_trust {
        return Ok(());
    }
    if peer.service_history.is_empty() {
        return Err(CredenceError::EmptyHistory(peer.peer_id().to_string()));
    }

    let fading = fading_factors(peer.service_history.len());
    let competence = competence_belief(&peer.service_history, &fading);
    let integrity = integrity_belief(&peer.service_history, &fading, competence);

    let history_factor =
        (peer.service_history.len() as f64 / config.service_history_max_size as f64).min(1.0);

    // own experience: (sh / sh_max) * (cb + discount * ib)
    let own_experience = history_factor * (competence + INTEGRITY_DISCOUNT * integrity);
    // stranger part: (1 - sh / sh_max) * r
    let from_reputation = (1.0 - history_factor) * peer.reputation;

    peer.competence_belief = clamp_unit(competence);
    peer.integrity_belief = clamp_unit(integrity);
    peer.service_trust = clamp_unit(own_experience + from_reputation);

    Ok(())
}

/// Linear recency weights `k / n` for a history of size `n`, oldest first.
///
/// Index of each factor matches the record at the same position.
pub(crate) fn fading_factors(history_size: usize) -> Vec<f64> {
    (1..=history_size)
        .map(|k| k as f64 / history_size as f64)
        .collect()
}

/// Weighted mean satisfaction over the history - the expected behavior
pub(crate) fn competence_belief(history: &[ServiceHistoryRecord], fading: &[f64]) -> f64 {
    let normalisation: f64 = history
        .iter()
        .zip(fading)
        .map(|(record, f)| record.weight * f)
        .sum();
    let belief: f64 = history
        .iter()
        .zip(fading)
        .map(|(record, f)| record.satisfaction * record.weight * f)
        .sum();

    belief / normalisation
}

/// Dispersion of satisfaction around the competence belief.
///
/// Each sample is scaled by the mean weight and mean fading factor before the
/// deviation is taken. Not a textbook standard deviation - preserved exactly,
/// downstream thresholds are tuned against this computation.
pub(crate) fn integrity_belief(
    history: &[ServiceHistoryRecord],
    fading: &[f64],
    competence_belief: f64,
) -> f64 {
    let n = history.len() as f64;
    let weight_mean: f64 = history.iter().map(|r| r.weight).sum::<f64>() / n;
    let fading_mean: f64 = fading.iter().sum::<f64>() / n;

    let dispersion: f64 = history
        .iter()
        .map(|r| (r.satisfaction * weight_mean * fading_mean - competence_belief).powi(2))
        .sum();

    (dispersion / n).sqrt()
}
