//! Alert protocol - broadcasting and reacting to network alerts

use std::sync::Arc;

use credence_core::{
    clamp_unit, Alert, PeerInfo, Satisfaction, TargetThreatIntelligence, ThreatIntelligence,
    TrustConfig, Weight,
};

use crate::bridge::NetworkBridge;
use crate::protocols::{evaluate_interaction, OpinionCallback, TrustProtocol};
use crate::storage::TrustStore;

/// Dispatches alerts to the network and evaluates alerts received from it
pub struct AlertProtocol {
    store: Arc<dyn TrustStore>,
    bridge: Arc<NetworkBridge>,
    config: Arc<TrustConfig>,
    trust_protocol: Arc<TrustProtocol>,
    alert_callback: OpinionCallback,
}

impl AlertProtocol {
    pub fn new(
        store: Arc<dyn TrustStore>,
        bridge: Arc<NetworkBridge>,
        config: Arc<TrustConfig>,
        trust_protocol: Arc<TrustProtocol>,
        alert_callback: OpinionCallback,
    ) -> Self {
        Self {
            store,
            bridge,
            config,
            trust_protocol,
            alert_callback,
        }
    }

    /// Broadcasts an alert about the target to the network
    pub fn dispatch_alert(&self, target: &str, score: f64, confidence: f64) {
        self.bridge
            .send_alert(target, &ThreatIntelligence { score, confidence });
    }

    /// Handles an alert received from the network.
    ///
    /// The alert's confidence is scaled by how much we trust the sender;
    /// even a completely unknown sender gets the configured baseline, so
    /// alerts are never discarded outright.
    pub fn handle_alert(&self, sender: &PeerInfo, alert: &Alert) {
        let peer_trust = self.store.peer_trust(&sender.id).unwrap_or_else(|| {
            self.trust_protocol
                .determine_and_store_initial_trust(sender, false)
        });

        let alert_trust = self
            .config
            .alert_trust_from_unknown
            .max(peer_trust.service_trust);
        let opinion = TargetThreatIntelligence {
            score: alert.score,
            confidence: clamp_unit(alert.confidence * alert_trust),
            target: alert.target.clone(),
            confidentiality: None,
        };
        (self.alert_callback)(opinion);

        evaluate_interaction(
            &self.config,
            &self.store,
            &self.bridge,
            peer_trust,
            Satisfaction::Ok.value(),
            Weight::Alert,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::RecommendationRequester;
    use crate::queue::ChannelQueue;
    use crate::storage::MemoryTrustStore;
    use crate::wire::Envelope;
    use credence_core::PeerTrustData;
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct NoRecommendations;

    impl RecommendationRequester for NoRecommendations {
        fn request_recommendations(&self, _subject: &PeerInfo) {}
    }

    fn setup(
        config: TrustConfig,
    ) -> (
        AlertProtocol,
        Arc<MemoryTrustStore>,
        UnboundedReceiver<String>,
        Arc<Mutex<Vec<TargetThreatIntelligence>>>,
    ) {
        let (queue, outbound_rx) = ChannelQueue::new();
        let config = Arc::new(config);
        let store = Arc::new(MemoryTrustStore::new(3600));
        let bridge = Arc::new(NetworkBridge::new(Arc::new(queue)));
        let trust_protocol = Arc::new(TrustProtocol::new(
            store.clone() as Arc<dyn TrustStore>,
            config.clone(),
            Arc::new(NoRecommendations),
        ));
        let alerts = Arc::new(Mutex::new(Vec::new()));
        let alerts_sink = alerts.clone();

        let protocol = AlertProtocol::new(
            store.clone() as Arc<dyn TrustStore>,
            bridge,
            config,
            trust_protocol,
            Arc::new(move |opinion| alerts_sink.lock().unwrap().push(opinion)),
        );
        (protocol, store, outbound_rx, alerts)
    }

    fn alert(target: &str, score: f64, confidence: f64) -> Alert {
        Alert {
            target: target.to_string(),
            score,
            confidence,
        }
    }

    #[test]
    fn test_outbound_alert_is_broadcast() {
        let (protocol, _, mut outbound_rx, _) = setup(TrustConfig::default());

        protocol.dispatch_alert("victim.com", -1.0, 0.9);

        let envelope: Envelope =
            serde_json::from_str(&outbound_rx.try_recv().unwrap()).unwrap();
        assert_eq!(envelope.message_type, "tl2nl_alert");
        assert_eq!(envelope.data["payload"]["target"], "victim.com");
    }

    #[test]
    fn test_alert_from_unknown_sender_uses_baseline_trust() {
        let mut config = TrustConfig::default();
        config.alert_trust_from_unknown = 0.4;
        let (protocol, store, _outbound_rx, alerts) = setup(config);

        protocol.handle_alert(&PeerInfo::new("stranger"), &alert("victim.com", -1.0, 1.0));

        let delivered = alerts.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].score, -1.0);
        assert!((delivered[0].confidence - 0.4).abs() < 1e-9);
        // the sender was seeded and the alert interaction registered
        let seeded = store.peer_trust("stranger").unwrap();
        assert_eq!(seeded.service_history_size(), 1);
    }

    #[test]
    fn test_alert_from_trusted_sender_keeps_confidence() {
        let mut config = TrustConfig::default();
        config.alert_trust_from_unknown = 0.2;
        let (protocol, store, _outbound_rx, alerts) = setup(config);

        let info = PeerInfo::new("trusted");
        let mut trust = PeerTrustData::new(info.clone());
        trust.service_trust = 0.9;
        store.store_peer_trust(trust);

        protocol.handle_alert(&info, &alert("victim.com", -0.5, 0.8));

        let delivered = alerts.lock().unwrap();
        assert!((delivered[0].confidence - 0.72).abs() < 1e-9);
    }
}
