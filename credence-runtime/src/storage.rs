//! Storage interfaces for trust data and local threat intelligence
//!
//! Persistence is external to the trust layer; handlers access it through
//! narrow traits as a simple read-modify-write per invocation. In-memory
//! implementations back the tests and the standalone binary.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use credence_core::{
    PeerId, PeerInfo, PeerTrustData, Target, TargetThreatIntelligence, TrustConfig, TrustMatrix,
};

/// Store for peer trust data, connected peers and cached network opinions
pub trait TrustStore: Send + Sync {
    /// Stores the trust model configuration
    fn store_config(&self, config: TrustConfig);

    /// Returns the stored trust model configuration, if any
    fn config(&self) -> Option<TrustConfig>;

    /// Stores the list of peers that are currently connected
    fn store_connected_peers(&self, peers: Vec<PeerInfo>);

    /// Returns the list of currently connected peers
    fn connected_peers(&self) -> Vec<PeerInfo>;

    /// Stores trust data for a peer, overwriting any previous record
    fn store_peer_trust(&self, trust: PeerTrustData);

    /// Stores every record of the matrix
    fn store_trust_matrix(&self, matrix: TrustMatrix) {
        for trust in matrix.into_values() {
            self.store_peer_trust(trust);
        }
    }

    /// Returns trust data for the peer, or None when the peer is unknown
    fn peer_trust(&self, peer_id: &str) -> Option<PeerTrustData>;

    /// Returns trust data for each requested peer. Unknown peers are simply
    /// absent from the result - partial matrices are allowed here, callers
    /// check consistency where it matters.
    fn peers_trust(&self, peer_ids: &[PeerId]) -> TrustMatrix {
        peer_ids
            .iter()
            .filter_map(|peer_id| {
                self.peer_trust(peer_id)
                    .map(|trust| (peer_id.clone(), trust))
            })
            .collect()
    }

    /// Caches the aggregated network opinion on a target
    fn cache_network_opinion(&self, opinion: TargetThreatIntelligence);

    /// Returns the cached opinion for the target unless it expired
    fn cached_network_opinion(&self, target: &str) -> Option<TargetThreatIntelligence>;
}

/// Store with the host system's own threat intelligence
pub trait ThreatIntelStore: Send + Sync {
    /// Returns local threat intelligence for the target, if any
    fn get_for(&self, target: &str) -> Option<TargetThreatIntelligence>;
}

#[derive(Default)]
struct TrustStoreState {
    config: Option<TrustConfig>,
    connected_peers: Vec<PeerInfo>,
    trust: HashMap<PeerId, PeerTrustData>,
    opinion_cache: HashMap<Target, (TargetThreatIntelligence, DateTime<Utc>)>,
}

/// In-memory [`TrustStore`] with a TTL'd opinion cache
pub struct MemoryTrustStore {
    state: RwLock<TrustStoreState>,
    cache_validity: Duration,
}

impl MemoryTrustStore {
    /// Create a store whose cached opinions expire after the given time
    pub fn new(cache_valid_seconds: u64) -> Self {
        Self {
            state: RwLock::new(TrustStoreState::default()),
            cache_validity: Duration::seconds(cache_valid_seconds as i64),
        }
    }
}

impl TrustStore for MemoryTrustStore {
    fn store_config(&self, config: TrustConfig) {
        self.state.write().unwrap().config = Some(config);
    }

    fn config(&self) -> Option<TrustConfig> {
        self.state.read().unwrap().config.clone()
    }

    fn store_connected_peers(&self, peers: Vec<PeerInfo>) {
        self.state.write().unwrap().connected_peers = peers;
    }

    fn connected_peers(&self) -> Vec<PeerInfo> {
        self.state.read().unwrap().connected_peers.clone()
    }

    fn store_peer_trust(&self, trust: PeerTrustData) {
        self.state
            .write()
            .unwrap()
            .trust
            .insert(trust.peer_id().to_string(), trust);
    }

    fn peer_trust(&self, peer_id: &str) -> Option<PeerTrustData> {
        self.state.read().unwrap().trust.get(peer_id).cloned()
    }

    fn cache_network_opinion(&self, opinion: TargetThreatIntelligence) {
        self.state
            .write()
            .unwrap()
            .opinion_cache
            .insert(opinion.target.clone(), (opinion, Utc::now()));
    }

    fn cached_network_opinion(&self, target: &str) -> Option<TargetThreatIntelligence> {
        let mut state = self.state.write().unwrap();
        let expired = match state.opinion_cache.get(target) {
            Some((_, cached_at)) => Utc::now() - *cached_at > self.cache_validity,
            None => return None,
        };
        if expired {
            state.opinion_cache.remove(target);
            return None;
        }
        state
            .opinion_cache
            .get(target)
            .map(|(opinion, _)| opinion.clone())
    }
}

/// In-memory [`ThreatIntelStore`]
#[derive(Default)]
pub struct MemoryThreatIntelStore {
    intelligence: RwLock<HashMap<Target, TargetThreatIntelligence>>,
}

impl MemoryThreatIntelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores intelligence for its target
    pub fn save(&self, intelligence: TargetThreatIntelligence) {
        self.intelligence
            .write()
            .unwrap()
            .insert(intelligence.target.clone(), intelligence);
    }
}

impl ThreatIntelStore for MemoryThreatIntelStore {
    fn get_for(&self, target: &str) -> Option<TargetThreatIntelligence> {
        self.intelligence.read().unwrap().get(target).cloned()
    }
}
