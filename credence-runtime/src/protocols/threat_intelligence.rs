//! Threat-intelligence protocol - requesting, answering and aggregating
//! network opinions on targets

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, warn};

use credence_core::aggregation::PeerReport;
use credence_core::{
    CredenceError, PeerId, PeerInfo, PeerTrustData, Satisfaction, TargetThreatIntelligence,
    ThreatIntelligence, TrustConfig, Weight,
};

use crate::bridge::NetworkBridge;
use crate::protocols::{evaluate_interaction, evaluate_interactions, OpinionCallback, TrustProtocol};
use crate::storage::{ThreatIntelStore, TrustStore};
use crate::wire::PeerIntelligenceResponse;

/// Handles intelligence requests and responses
pub struct ThreatIntelligenceProtocol {
    store: Arc<dyn TrustStore>,
    ti_store: Arc<dyn ThreatIntelStore>,
    bridge: Arc<NetworkBridge>,
    config: Arc<TrustConfig>,
    trust_protocol: Arc<TrustProtocol>,
    opinion_callback: OpinionCallback,
}

impl ThreatIntelligenceProtocol {
    pub fn new(
        store: Arc<dyn TrustStore>,
        ti_store: Arc<dyn ThreatIntelStore>,
        bridge: Arc<NetworkBridge>,
        config: Arc<TrustConfig>,
        trust_protocol: Arc<TrustProtocol>,
        opinion_callback: OpinionCallback,
    ) -> Self {
        Self {
            store,
            ti_store,
            bridge,
            config,
            trust_protocol,
            opinion_callback,
        }
    }

    /// Requests the network opinion on a target.
    ///
    /// Returns the cached opinion when a fresh one exists; otherwise sends a
    /// request and returns None - the answer arrives asynchronously through
    /// [`ThreatIntelligenceProtocol::handle_intelligence_response`].
    pub fn request_network_opinion(&self, target: &str) -> Option<TargetThreatIntelligence> {
        if let Some(cached) = self.store.cached_network_opinion(target) {
            debug!(target = %target, "serving cached network opinion");
            return Some(cached);
        }

        self.bridge.send_intelligence_request(target);
        None
    }

    /// Answers a peer's intelligence request about a target.
    ///
    /// Data more confidential than the peer is allowed to see is replaced by
    /// a zero opinion, as is a target we know nothing about.
    pub fn handle_intelligence_request(&self, request_id: &str, sender: &PeerInfo, target: &str) {
        let peer_trust = self.store.peer_trust(&sender.id).unwrap_or_else(|| {
            self.trust_protocol
                .determine_and_store_initial_trust(sender, false)
        });

        let intelligence = match self.ti_store.get_for(target) {
            Some(local) => {
                let confidentiality = local
                    .confidentiality
                    .unwrap_or(self.config.data_default_level);
                if confidentiality > self.allowed_level(&peer_trust) {
                    debug!(
                        target = %target,
                        sender = %sender.id,
                        "intelligence too confidential for peer, withholding"
                    );
                    ThreatIntelligence::zero()
                } else {
                    local.intelligence()
                }
            }
            None => ThreatIntelligence::zero(),
        };

        self.bridge
            .send_intelligence_response(request_id, target, &intelligence);

        let satisfaction = if intelligence.confidence > 0.0 {
            Satisfaction::Ok
        } else {
            Satisfaction::Unsure
        };
        evaluate_interaction(
            &self.config,
            &self.store,
            &self.bridge,
            peer_trust,
            satisfaction.value(),
            Weight::IntelligenceRequest,
        );
    }

    /// Aggregates a batch of intelligence responses about one target.
    ///
    /// On success the verdict is cached, every responder's interaction is
    /// evaluated against it and the host system is notified. Batches failing
    /// consistency checks are dropped whole; a batch with no trusted
    /// reporters is skipped without changing state.
    pub fn handle_intelligence_response(&self, responses: Vec<PeerIntelligenceResponse>) {
        if responses.is_empty() {
            return;
        }

        let targets: HashSet<&str> = responses.iter().map(|r| r.target.as_str()).collect();
        if targets.len() != 1 {
            let err = CredenceError::MixedTargets(targets.len());
            error!(%err, "intelligence batch dropped");
            return;
        }
        let target = responses[0].target.clone();

        let report_map: HashMap<PeerId, ThreatIntelligence> = responses
            .iter()
            .map(|r| (r.sender.id.clone(), r.intelligence))
            .collect();
        let matrix = self
            .store
            .peers_trust(&report_map.keys().cloned().collect::<Vec<_>>());
        if matrix.len() != responses.len() || report_map.len() != responses.len() {
            let err = CredenceError::MatrixInconsistency {
                expected: responses.len(),
                actual: matrix.len(),
            };
            error!(%err, "intelligence batch dropped");
            return;
        }

        let reports: Vec<PeerReport> = report_map
            .iter()
            .map(|(peer_id, report)| PeerReport {
                report: *report,
                reporter_trust: matrix[peer_id].service_trust,
            })
            .collect();

        let aggregated = match self.config.ti_aggregation.assemble_peer_opinion(&reports) {
            Ok(opinion) => opinion,
            Err(CredenceError::InsufficientTrust) => {
                warn!(target = %target, "no trusted reporters, skipping network opinion");
                return;
            }
            Err(err) => {
                error!(%err, "aggregation failed, batch dropped");
                return;
            }
        };

        let opinion = TargetThreatIntelligence::new(aggregated, &target);
        self.store.cache_network_opinion(opinion.clone());

        let local = self.ti_store.get_for(&target);
        match self
            .config
            .ti_evaluation
            .evaluate(&opinion, &report_map, &matrix, local.as_ref())
        {
            Ok(evaluated) => {
                let interactions: Vec<(PeerTrustData, f64, Weight)> = evaluated
                    .into_iter()
                    .filter_map(|(peer_id, satisfaction, weight)| {
                        matrix
                            .get(&peer_id)
                            .map(|peer| (peer.clone(), satisfaction, weight))
                    })
                    .collect();
                evaluate_interactions(&self.config, &self.store, &self.bridge, interactions);
            }
            Err(err) => {
                error!(%err, "evaluation failed, batch dropped");
                return;
            }
        }

        (self.opinion_callback)(opinion);
    }

    /// Highest confidentiality level this peer may receive: its own service
    /// trust or the best level granted to any of its organisations
    fn allowed_level(&self, peer_trust: &PeerTrustData) -> f64 {
        self.config
            .organisations_for(&peer_trust.info.organisations)
            .map(|organisation| organisation.privacy_level)
            .fold(peer_trust.service_trust, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::{RecommendationRequester, TrustProtocol};
    use crate::queue::ChannelQueue;
    use crate::storage::{MemoryThreatIntelStore, MemoryTrustStore};
    use crate::wire::Envelope;
    use credence_core::TrustedEntity;
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct NoRecommendations;

    impl RecommendationRequester for NoRecommendations {
        fn request_recommendations(&self, _subject: &PeerInfo) {}
    }

    struct Stack {
        protocol: ThreatIntelligenceProtocol,
        store: Arc<MemoryTrustStore>,
        ti_store: Arc<MemoryThreatIntelStore>,
        outbound_rx: UnboundedReceiver<String>,
        opinions: Arc<Mutex<Vec<TargetThreatIntelligence>>>,
    }

    fn setup(config: TrustConfig) -> Stack {
        let (queue, outbound_rx) = ChannelQueue::new();
        let config = Arc::new(config);
        let store = Arc::new(MemoryTrustStore::new(3600));
        let ti_store = Arc::new(MemoryThreatIntelStore::new());
        let bridge = Arc::new(NetworkBridge::new(Arc::new(queue)));
        let trust_protocol = Arc::new(TrustProtocol::new(
            store.clone() as Arc<dyn TrustStore>,
            config.clone(),
            Arc::new(NoRecommendations),
        ));
        let opinions = Arc::new(Mutex::new(Vec::new()));
        let opinions_sink = opinions.clone();

        let protocol = ThreatIntelligenceProtocol::new(
            store.clone() as Arc<dyn TrustStore>,
            ti_store.clone() as Arc<dyn ThreatIntelStore>,
            bridge,
            config,
            trust_protocol,
            Arc::new(move |opinion| opinions_sink.lock().unwrap().push(opinion)),
        );

        Stack {
            protocol,
            store,
            ti_store,
            outbound_rx,
            opinions,
        }
    }

    fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<Envelope> {
        let mut envelopes = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            envelopes.push(serde_json::from_str(&raw).unwrap());
        }
        envelopes
    }

    fn trusted_peer(store: &MemoryTrustStore, peer_id: &str, service_trust: f64) -> PeerInfo {
        let info = PeerInfo::new(peer_id);
        let mut trust = PeerTrustData::new(info.clone());
        trust.service_trust = service_trust;
        store.store_peer_trust(trust);
        info
    }

    fn local_intelligence(target: &str, confidentiality: Option<f64>) -> TargetThreatIntelligence {
        TargetThreatIntelligence {
            score: -0.8,
            confidence: 0.9,
            target: target.to_string(),
            confidentiality,
        }
    }

    #[test]
    fn test_request_without_local_data_answers_zero() {
        let mut stack = setup(TrustConfig::default());
        let sender = trusted_peer(&stack.store, "asker", 0.5);

        stack
            .protocol
            .handle_intelligence_request("req-1", &sender, "unknown.com");

        let envelopes = drain(&mut stack.outbound_rx);
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].message_type, "tl2nl_intelligence_response");
        assert_eq!(envelopes[0].data["payload"]["intelligence"]["score"], 0.0);
        assert_eq!(envelopes[0].data["payload"]["intelligence"]["confidence"], 0.0);
        assert_eq!(envelopes[1].message_type, "tl2nl_peers_reliability");
    }

    #[test]
    fn test_request_from_unknown_sender_seeds_trust() {
        let mut stack = setup(TrustConfig::default());

        stack
            .protocol
            .handle_intelligence_request("req-1", &PeerInfo::new("stranger"), "target.com");

        let seeded = stack.store.peer_trust("stranger").unwrap();
        // seeded and immediately evaluated for the request interaction
        assert_eq!(seeded.service_history_size(), 1);
        drain(&mut stack.outbound_rx);
    }

    #[test]
    fn test_confidential_data_withheld_from_untrusted_peer() {
        let mut stack = setup(TrustConfig::default());
        stack
            .ti_store
            .save(local_intelligence("secret.com", Some(0.8)));

        let sender = trusted_peer(&stack.store, "lowtrust", 0.2);
        stack
            .protocol
            .handle_intelligence_request("req-1", &sender, "secret.com");

        let envelopes = drain(&mut stack.outbound_rx);
        assert_eq!(envelopes[0].data["payload"]["intelligence"]["score"], 0.0);
        assert_eq!(envelopes[0].data["payload"]["intelligence"]["confidence"], 0.0);
    }

    #[test]
    fn test_organisation_membership_raises_allowed_level() {
        let mut config = TrustConfig::default();
        config.trusted_organisations.push(TrustedEntity {
            id: "org".to_string(),
            name: "Org".to_string(),
            trust: 0.0,
            enforce_trust: false,
            privacy_level: 0.9,
        });
        let mut stack = setup(config);
        stack
            .ti_store
            .save(local_intelligence("secret.com", Some(0.8)));

        let info = PeerInfo::with_organisations("member", vec!["org".to_string()]);
        let mut trust = PeerTrustData::new(info.clone());
        trust.service_trust = 0.1;
        stack.store.store_peer_trust(trust);

        stack
            .protocol
            .handle_intelligence_request("req-1", &info, "secret.com");

        let envelopes = drain(&mut stack.outbound_rx);
        assert_eq!(envelopes[0].data["payload"]["intelligence"]["score"], -0.8);
    }

    #[test]
    fn test_response_batch_aggregates_caches_and_notifies() {
        let mut stack = setup(TrustConfig::default());
        let reporter_a = trusted_peer(&stack.store, "a", 1.0);
        let reporter_b = trusted_peer(&stack.store, "b", 0.0);

        let responses = vec![
            PeerIntelligenceResponse {
                sender: reporter_a,
                target: "target.com".to_string(),
                intelligence: ThreatIntelligence {
                    score: 1.0,
                    confidence: 1.0,
                },
            },
            PeerIntelligenceResponse {
                sender: reporter_b,
                target: "target.com".to_string(),
                intelligence: ThreatIntelligence {
                    score: -1.0,
                    confidence: 1.0,
                },
            },
        ];
        stack.protocol.handle_intelligence_response(responses);

        let opinions = stack.opinions.lock().unwrap();
        assert_eq!(opinions.len(), 1);
        // zero-trust reporter contributes nothing to the score
        assert!((opinions[0].score - 1.0).abs() < 1e-9);
        assert!((opinions[0].confidence - 0.5).abs() < 1e-9);

        let cached = stack.store.cached_network_opinion("target.com").unwrap();
        assert_eq!(cached.score, opinions[0].score);

        // both reporters got their interaction registered
        assert_eq!(stack.store.peer_trust("a").unwrap().service_history_size(), 1);
        assert_eq!(stack.store.peer_trust("b").unwrap().service_history_size(), 1);
        let envelopes = drain(&mut stack.outbound_rx);
        assert!(envelopes
            .iter()
            .any(|e| e.message_type == "tl2nl_peers_reliability"));
    }

    #[test]
    fn test_cached_opinion_short_circuits_request() {
        let mut stack = setup(TrustConfig::default());
        let reporter = trusted_peer(&stack.store, "a", 1.0);

        stack.protocol.handle_intelligence_response(vec![PeerIntelligenceResponse {
            sender: reporter,
            target: "target.com".to_string(),
            intelligence: ThreatIntelligence {
                score: 0.5,
                confidence: 0.5,
            },
        }]);
        drain(&mut stack.outbound_rx);

        let cached = stack.protocol.request_network_opinion("target.com");
        assert!(cached.is_some());
        assert!(drain(&mut stack.outbound_rx).is_empty());

        let missing = stack.protocol.request_network_opinion("other.com");
        assert!(missing.is_none());
        let envelopes = drain(&mut stack.outbound_rx);
        assert_eq!(envelopes[0].message_type, "tl2nl_intelligence_request");
    }

    #[test]
    fn test_batch_with_unknown_reporter_is_dropped() {
        let mut stack = setup(TrustConfig::default());

        stack.protocol.handle_intelligence_response(vec![PeerIntelligenceResponse {
            sender: PeerInfo::new("ghost"),
            target: "target.com".to_string(),
            intelligence: ThreatIntelligence {
                score: 1.0,
                confidence: 1.0,
            },
        }]);

        assert!(stack.opinions.lock().unwrap().is_empty());
        assert!(stack.store.cached_network_opinion("target.com").is_none());
        assert!(drain(&mut stack.outbound_rx).is_empty());
    }

    #[test]
    fn test_batch_with_mixed_targets_is_dropped() {
        let mut stack = setup(TrustConfig::default());
        let reporter_a = trusted_peer(&stack.store, "a", 1.0);
        let reporter_b = trusted_peer(&stack.store, "b", 1.0);

        stack.protocol.handle_intelligence_response(vec![
            PeerIntelligenceResponse {
                sender: reporter_a,
                target: "one.com".to_string(),
                intelligence: ThreatIntelligence {
                    score: 1.0,
                    confidence: 1.0,
                },
            },
            PeerIntelligenceResponse {
                sender: reporter_b,
                target: "two.com".to_string(),
                intelligence: ThreatIntelligence {
                    score: 1.0,
                    confidence: 1.0,
                },
            },
        ]);

        assert!(stack.opinions.lock().unwrap().is_empty());
        assert!(drain(&mut stack.outbound_rx).is_empty());
    }

    #[test]
    fn test_all_zero_trust_reporters_skip_update() {
        let mut stack = setup(TrustConfig::default());
        let reporter = trusted_peer(&stack.store, "a", 0.0);

        stack.protocol.handle_intelligence_response(vec![PeerIntelligenceResponse {
            sender: reporter,
            target: "target.com".to_string(),
            intelligence: ThreatIntelligence {
                score: 1.0,
                confidence: 1.0,
            },
        }]);

        // fail closed: no verdict, no cache, no interactions registered
        assert!(stack.opinions.lock().unwrap().is_empty());
        assert!(stack.store.cached_network_opinion("target.com").is_none());
        assert_eq!(stack.store.peer_trust("a").unwrap().service_history_size(), 0);
    }
}
