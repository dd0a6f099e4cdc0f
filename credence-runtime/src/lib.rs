//! # CREDENCE Runtime
//!
//! Protocol handlers and message plumbing for the CREDENCE trust layer.
//!
//! The runtime connects the pure engines from `credence-core` to the outside
//! world: a message queue towards the network layer, a trust store, a local
//! threat-intelligence store and callbacks into the host intrusion-detection
//! system. Inbound messages are parsed from a versioned JSON envelope and
//! dispatched to one protocol handler each; every message is fully processed
//! before the next one is taken off the queue.

pub mod bridge;
pub mod dispatch;
pub mod protocols;
pub mod queue;
pub mod storage;
pub mod wire;

pub use bridge::NetworkBridge;
pub use dispatch::{Dispatcher, MessageHandler};
pub use protocols::{
    AlertProtocol, OpinionCallback, PeerListProtocol, RecommendationProtocol,
    RecommendationRequester, ThreatIntelligenceProtocol, TrustProtocol,
};
pub use queue::{ChannelQueue, MessageQueue, QueueError};
pub use storage::{MemoryThreatIntelStore, MemoryTrustStore, ThreatIntelStore, TrustStore};
pub use wire::{
    Envelope, InboundMessage, PeerIntelligenceResponse, PeerRecommendationResponse, WireError,
    PROTOCOL_VERSION,
};
