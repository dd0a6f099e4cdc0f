//! Protocol handlers orchestrating the trust engines
//!
//! Each handler reads trust state from storage, invokes the relevant engine
//! or strategy, writes updated state back and emits outbound messages. Every
//! trust mutation ends with a reliability broadcast so the network layer
//! always knows the current service trust of the peers it talks to.

pub mod alert;
pub mod peer_list;
pub mod recommendation;
pub mod threat_intelligence;
pub mod trust;

pub use alert::AlertProtocol;
pub use peer_list::PeerListProtocol;
pub use recommendation::RecommendationProtocol;
pub use threat_intelligence::ThreatIntelligenceProtocol;
pub use trust::TrustProtocol;

use std::sync::Arc;

use credence_core::service::process_service_interaction;
use credence_core::{PeerInfo, PeerTrustData, TargetThreatIntelligence, TrustConfig, Weight};

use crate::bridge::NetworkBridge;
use crate::storage::TrustStore;

/// Callback into the host system delivering aggregated intelligence
pub type OpinionCallback = Arc<dyn Fn(TargetThreatIntelligence) + Send + Sync>;

/// Narrow interface for kicking off recommendation requests.
///
/// The trust protocol needs to trigger the recommendation protocol for
/// zero-reputation strangers; injecting this interface instead of the whole
/// protocol keeps the dependency one-directional.
pub trait RecommendationRequester: Send + Sync {
    /// Asks suitable peers for recommendations on the subject
    fn request_recommendations(&self, subject: &PeerInfo);
}

/// Registers one evaluated interaction: updates service trust, persists the
/// record and broadcasts the new reliability value.
pub(crate) fn evaluate_interaction(
    config: &TrustConfig,
    store: &Arc<dyn TrustStore>,
    bridge: &NetworkBridge,
    peer: PeerTrustData,
    satisfaction: f64,
    weight: Weight,
) {
    evaluate_interactions(config, store, bridge, vec![(peer, satisfaction, weight)]);
}

/// Registers a batch of evaluated interactions, persisting every update and
/// broadcasting one reliability message for the whole batch.
pub(crate) fn evaluate_interactions(
    config: &TrustConfig,
    store: &Arc<dyn TrustStore>,
    bridge: &NetworkBridge,
    batch: Vec<(PeerTrustData, f64, Weight)>,
) {
    if batch.is_empty() {
        return;
    }

    let mut reliability = Vec::with_capacity(batch.len());
    for (mut peer, satisfaction, weight) in batch {
        process_service_interaction(config, &mut peer, satisfaction, weight);
        reliability.push((peer.peer_id().to_string(), peer.service_trust));
        store.store_peer_trust(peer);
    }

    bridge.send_peers_reliability(reliability);
}
