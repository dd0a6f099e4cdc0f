//! Network bridge - builds and sends outbound envelopes

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

use credence_core::{Alert, PeerId, Recommendation, ThreatIntelligence};

use crate::queue::MessageQueue;
use crate::wire::{Envelope, PROTOCOL_VERSION};

/// Sends `tl2nl_*` messages to the network layer through the queue.
///
/// Serialization or queue failures are logged and swallowed here; outbound
/// traffic is best-effort and must never take the dispatch loop down.
pub struct NetworkBridge {
    queue: Arc<dyn MessageQueue>,
}

impl NetworkBridge {
    pub fn new(queue: Arc<dyn MessageQueue>) -> Self {
        Self { queue }
    }

    /// Shares intelligence with the peer that requested it
    pub fn send_intelligence_response(
        &self,
        request_id: &str,
        target: &str,
        intelligence: &ThreatIntelligence,
    ) {
        self.dispatch(
            "tl2nl_intelligence_response",
            json!({
                "request_id": request_id,
                "payload": {"target": target, "intelligence": intelligence},
            }),
        );
    }

    /// Requests the network's opinion on a target
    pub fn send_intelligence_request(&self, target: &str) {
        self.dispatch("tl2nl_intelligence_request", json!({"payload": target}));
    }

    /// Broadcasts an alert about a target
    pub fn send_alert(&self, target: &str, intelligence: &ThreatIntelligence) {
        let alert = Alert {
            target: target.to_string(),
            score: intelligence.score,
            confidence: intelligence.confidence,
        };
        self.dispatch("tl2nl_alert", json!({"payload": alert}));
    }

    /// Answers a recommendation request about a subject
    pub fn send_recommendation_response(
        &self,
        request_id: &str,
        recipient: &str,
        subject: &str,
        recommendation: &Recommendation,
    ) {
        self.dispatch(
            "tl2nl_recommendation_response",
            json!({
                "request_id": request_id,
                "recipient_id": recipient,
                "payload": {"subject": subject, "recommendation": recommendation},
            }),
        );
    }

    /// Asks the recipients for recommendations on a peer
    pub fn send_recommendation_request(&self, recipients: &[PeerId], subject: &str) {
        self.dispatch(
            "tl2nl_recommendation_request",
            json!({"receiver_ids": recipients, "payload": subject}),
        );
    }

    /// Publishes fresh service-trust values to the network layer.
    ///
    /// This message is consumed by the network layer itself and is not
    /// forwarded to other peers.
    pub fn send_peers_reliability(&self, reliability: impl IntoIterator<Item = (PeerId, f64)>) {
        let data: Vec<_> = reliability
            .into_iter()
            .map(|(peer_id, value)| json!({"peer_id": peer_id, "reliability": value}))
            .collect();
        self.dispatch("tl2nl_peers_reliability", json!(data));
    }

    fn dispatch(&self, message_type: &str, data: serde_json::Value) {
        let envelope = Envelope {
            message_type: message_type.to_string(),
            version: PROTOCOL_VERSION,
            data,
        };

        match serde_json::to_string(&envelope) {
            Ok(serialized) => {
                debug!(message_type, "sending envelope");
                if let Err(err) = self.queue.send(&serialized) {
                    error!(message_type, %err, "failed to send envelope");
                }
            }
            Err(err) => error!(message_type, %err, "failed to serialize envelope"),
        }
    }
}
