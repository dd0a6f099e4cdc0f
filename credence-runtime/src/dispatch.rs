//! Message dispatch - routing inbound envelopes to protocol handlers
//!
//! The dispatcher drains the queue one message at a time: each envelope is
//! fully processed (state read, engines run, state written, outbound
//! messages emitted) before the next one is taken. That single consumer is
//! what serializes all trust-matrix mutations - handlers themselves take no
//! locks.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::protocols::{
    AlertProtocol, PeerListProtocol, RecommendationProtocol, ThreatIntelligenceProtocol,
};
use crate::wire::{parse_inbound, Envelope, InboundMessage, WireError};

/// Hook invoked for envelopes with an unknown type or version
pub type UnknownMessageHook = Box<dyn Fn(&Envelope) + Send + Sync>;

/// Hook invoked with the raw payload when a message cannot be parsed
pub type ParseErrorHook = Box<dyn Fn(&str) + Send + Sync>;

/// Parses inbound messages and routes each to its protocol handler.
///
/// Never panics on inbound data: malformed payloads go to the error hook,
/// unknown types and versions to the unknown-message hook.
pub struct MessageHandler {
    peer_list: Arc<PeerListProtocol>,
    recommendation: Arc<RecommendationProtocol>,
    intelligence: Arc<ThreatIntelligenceProtocol>,
    alert: Arc<AlertProtocol>,
    on_unknown: UnknownMessageHook,
    on_error: ParseErrorHook,
}

impl MessageHandler {
    pub fn new(
        peer_list: Arc<PeerListProtocol>,
        recommendation: Arc<RecommendationProtocol>,
        intelligence: Arc<ThreatIntelligenceProtocol>,
        alert: Arc<AlertProtocol>,
    ) -> Self {
        Self {
            peer_list,
            recommendation,
            intelligence,
            alert,
            on_unknown: Box::new(|envelope| {
                warn!(message_type = %envelope.message_type, "unknown message ignored");
            }),
            on_error: Box::new(|raw| {
                error!(payload = raw, "unparseable message ignored");
            }),
        }
    }

    /// Replaces the unknown-message hook
    pub fn with_unknown_hook(mut self, hook: UnknownMessageHook) -> Self {
        self.on_unknown = hook;
        self
    }

    /// Replaces the parse-error hook
    pub fn with_error_hook(mut self, hook: ParseErrorHook) -> Self {
        self.on_error = hook;
        self
    }

    /// Entry point for raw messages coming from the queue
    pub fn handle_raw(&self, raw: &str) {
        let envelope: Envelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%err, "failed to parse envelope");
                (self.on_error)(raw);
                return;
            }
        };

        debug!(message_type = %envelope.message_type, "message received");
        match parse_inbound(&envelope) {
            Ok(message) => self.dispatch(message),
            Err(WireError::UnsupportedVersion(version)) => {
                warn!(version, "unsupported envelope version");
                (self.on_unknown)(&envelope);
            }
            Err(WireError::UnknownType(message_type)) => {
                warn!(message_type = %message_type, "unrecognized message type");
                (self.on_unknown)(&envelope);
            }
            Err(WireError::Malformed(err)) => {
                warn!(%err, message_type = %envelope.message_type, "malformed payload");
                (self.on_error)(raw);
            }
        }
    }

    fn dispatch(&self, message: InboundMessage) {
        match message {
            InboundMessage::PeersList(peers) => self.peer_list.handle_peer_list_updated(peers),
            InboundMessage::RecommendationRequest {
                request_id,
                sender,
                subject,
            } => self
                .recommendation
                .handle_recommendation_request(&request_id, &sender, &subject),
            InboundMessage::RecommendationResponse(responses) => {
                self.recommendation.handle_recommendation_response(responses)
            }
            InboundMessage::Alert { sender, alert } => self.alert.handle_alert(&sender, &alert),
            InboundMessage::IntelligenceRequest {
                request_id,
                sender,
                target,
            } => self
                .intelligence
                .handle_intelligence_request(&request_id, &sender, &target),
            InboundMessage::IntelligenceResponse(responses) => {
                self.intelligence.handle_intelligence_response(responses)
            }
        }
    }
}

/// The dispatch loop - single consumer of the inbound queue
pub struct Dispatcher;

impl Dispatcher {
    /// Processes messages until the queue closes.
    ///
    /// Messages are handled strictly one after another; two messages
    /// touching the same peer can never interleave their read-modify-write
    /// cycles.
    pub async fn run(mut receiver: mpsc::UnboundedReceiver<String>, handler: MessageHandler) {
        info!("dispatch loop started");

        while let Some(raw) = receiver.recv().await {
            handler.handle_raw(&raw);
        }

        info!("queue closed, dispatch loop stopped");
    }
}
