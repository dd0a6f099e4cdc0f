//! Peer-list protocol - reacting to connected-peer changes from the
//! network layer

use std::sync::Arc;
use tracing::debug;

use credence_core::PeerInfo;

use crate::bridge::NetworkBridge;
use crate::protocols::{RecommendationRequester, TrustProtocol};
use crate::storage::TrustStore;

/// Keeps the stored peer list current and seeds trust for new peers
pub struct PeerListProtocol {
    store: Arc<dyn TrustStore>,
    bridge: Arc<NetworkBridge>,
    trust_protocol: Arc<TrustProtocol>,
    recommendations: Arc<dyn RecommendationRequester>,
}

impl PeerListProtocol {
    pub fn new(
        store: Arc<dyn TrustStore>,
        bridge: Arc<NetworkBridge>,
        trust_protocol: Arc<TrustProtocol>,
        recommendations: Arc<dyn RecommendationRequester>,
    ) -> Self {
        Self {
            store,
            bridge,
            trust_protocol,
            recommendations,
        }
    }

    /// Processes an updated list of connected peers.
    ///
    /// Peers seen for the first time get an initial trust record and a
    /// recommendation round; their fresh reliability values are pushed back
    /// to the network layer in one batch.
    pub fn handle_peer_list_updated(&self, peers: Vec<PeerInfo>) {
        self.store.store_connected_peers(peers.clone());

        let known = self
            .store
            .peers_trust(&peers.iter().map(|p| p.id.clone()).collect::<Vec<_>>());
        let new_peers: Vec<&PeerInfo> = peers.iter().filter(|p| !known.contains_key(&p.id)).collect();
        if new_peers.is_empty() {
            return;
        }
        debug!(count = new_peers.len(), "seeding trust for new peers");

        let mut seeded = Vec::with_capacity(new_peers.len());
        for peer in new_peers {
            // recommendations are requested separately; at this point the
            // stored peer list is already current
            let trust = self
                .trust_protocol
                .determine_and_store_initial_trust(peer, false);
            self.recommendations.request_recommendations(peer);
            seeded.push((trust.peer_id().to_string(), trust.service_trust));
        }

        self.bridge.send_peers_reliability(seeded);
    }
}
