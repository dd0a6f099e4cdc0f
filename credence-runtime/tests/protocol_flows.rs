//! End-to-end protocol tests: raw envelopes in, outbound envelopes and
//! callbacks out

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;

use credence_core::{PeerInfo, PeerTrustData, TargetThreatIntelligence, TrustConfig};
use credence_runtime::{
    AlertProtocol, ChannelQueue, Dispatcher, Envelope, MemoryThreatIntelStore, MemoryTrustStore,
    MessageHandler, NetworkBridge, PeerListProtocol, RecommendationProtocol, ThreatIntelStore,
    ThreatIntelligenceProtocol, TrustProtocol, TrustStore,
};

struct Fixture {
    handler: MessageHandler,
    outbound_rx: UnboundedReceiver<String>,
    store: Arc<MemoryTrustStore>,
    trust: Arc<TrustProtocol>,
    opinions: Arc<Mutex<Vec<TargetThreatIntelligence>>>,
    unknown: Arc<Mutex<Vec<String>>>,
    errors: Arc<Mutex<Vec<String>>>,
}

fn fixture(config: TrustConfig) -> Fixture {
    let (queue, outbound_rx) = ChannelQueue::new();
    let config = Arc::new(config);
    let store = Arc::new(MemoryTrustStore::new(3600));
    let ti_store = Arc::new(MemoryThreatIntelStore::new());
    let bridge = Arc::new(NetworkBridge::new(Arc::new(queue)));

    let recommendation = Arc::new(RecommendationProtocol::new(
        config.clone(),
        store.clone() as Arc<dyn TrustStore>,
        bridge.clone(),
    ));
    let trust = Arc::new(TrustProtocol::new(
        store.clone() as Arc<dyn TrustStore>,
        config.clone(),
        recommendation.clone(),
    ));

    let opinions = Arc::new(Mutex::new(Vec::new()));
    let opinion_sink = opinions.clone();
    let intelligence = Arc::new(ThreatIntelligenceProtocol::new(
        store.clone() as Arc<dyn TrustStore>,
        ti_store as Arc<dyn ThreatIntelStore>,
        bridge.clone(),
        config.clone(),
        trust.clone(),
        Arc::new(move |opinion| opinion_sink.lock().unwrap().push(opinion)),
    ));

    let alert_sink = opinions.clone();
    let alert = Arc::new(AlertProtocol::new(
        store.clone() as Arc<dyn TrustStore>,
        bridge.clone(),
        config.clone(),
        trust.clone(),
        Arc::new(move |opinion| alert_sink.lock().unwrap().push(opinion)),
    ));

    let peer_list = Arc::new(PeerListProtocol::new(
        store.clone() as Arc<dyn TrustStore>,
        bridge,
        trust.clone(),
        recommendation.clone(),
    ));

    let unknown = Arc::new(Mutex::new(Vec::new()));
    let unknown_sink = unknown.clone();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let error_sink = errors.clone();

    let handler = MessageHandler::new(peer_list, recommendation, intelligence, alert)
        .with_unknown_hook(Box::new(move |envelope| {
            unknown_sink
                .lock()
                .unwrap()
                .push(envelope.message_type.clone());
        }))
        .with_error_hook(Box::new(move |raw| {
            error_sink.lock().unwrap().push(raw.to_string());
        }));

    Fixture {
        handler,
        outbound_rx,
        store,
        trust,
        opinions,
        unknown,
        errors,
    }
}

fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<Envelope> {
    let mut envelopes = Vec::new();
    while let Ok(raw) = rx.try_recv() {
        envelopes.push(serde_json::from_str(&raw).unwrap());
    }
    envelopes
}

#[test]
fn peers_list_seeds_trust_and_reports_reliability() {
    let mut f = fixture(TrustConfig::default());

    f.handler.handle_raw(
        r#"{"type": "nl2tl_peers_list", "version": 1,
            "data": {"peers": [{"id": "peer#1", "organisations": []},
                               {"id": "peer#2", "organisations": []}]}}"#,
    );

    let envelopes = drain(&mut f.outbound_rx);
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].message_type, "tl2nl_peers_reliability");

    let mut reported: Vec<String> = envelopes[0]
        .data
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["peer_id"].as_str().unwrap().to_string())
        .collect();
    reported.sort();
    assert_eq!(reported, vec!["peer#1".to_string(), "peer#2".to_string()]);
}

#[test]
fn recommendation_request_is_answered() {
    let mut f = fixture(TrustConfig::default());

    f.handler.handle_raw(
        r#"{"type": "nl2tl_recommendation_request", "version": 1,
            "data": {"request_id": "1234", "sender": {"id": "peer#asking", "organisations": []},
                     "payload": "peer#1"}}"#,
    );

    // unknown sender: response goes out, no interaction is registered
    let envelopes = drain(&mut f.outbound_rx);
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].message_type, "tl2nl_recommendation_response");
    assert_eq!(envelopes[0].data["recipient_id"], "peer#asking");
}

#[test]
fn recommendation_response_updates_subject_and_responder() {
    let mut f = fixture(TrustConfig::default());
    f.trust
        .determine_and_store_initial_trust(&PeerInfo::new("subject#1"), false);
    // responder needs some recommendation trust for its answer to count
    let mut responder = PeerTrustData::new(PeerInfo::new("sender#1"));
    responder.recommendation_trust = 0.7;
    f.store.store_peer_trust(responder);

    f.handler.handle_raw(
        r#"{"type": "nl2tl_recommendation_response", "version": 1,
            "data": [{"sender": {"id": "sender#1", "organisations": []},
                      "payload": {"subject": "subject#1",
                                  "recommendation": {"competence_belief": 0.8,
                                                     "integrity_belief": 0.1,
                                                     "service_history_size": 10,
                                                     "recommendation": 0.8,
                                                     "initial_reputation_provided_by_count": 2}}}]}"#,
    );

    let envelopes = drain(&mut f.outbound_rx);
    let reliability: Vec<_> = envelopes
        .iter()
        .filter(|e| e.message_type == "tl2nl_peers_reliability")
        .collect();
    assert_eq!(reliability.len(), 2);

    let subject = f.store.peer_trust("subject#1").unwrap();
    assert!(subject.reputation > 0.0);
    assert_eq!(subject.initial_reputation_provided_by_count, 1);
}

#[test]
fn alert_from_unknown_peer_reaches_the_host() {
    let mut config = TrustConfig::default();
    config.alert_trust_from_unknown = 0.25;
    let mut f = fixture(config);

    f.handler.handle_raw(
        r#"{"type": "nl2tl_alert", "version": 1,
            "data": {"sender": {"id": "sender#1", "organisations": []},
                     "payload": {"target": "target.com", "score": 0.1, "confidence": 0.2}}}"#,
    );

    let envelopes = drain(&mut f.outbound_rx);
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].message_type, "tl2nl_peers_reliability");

    let opinions = f.opinions.lock().unwrap();
    assert_eq!(opinions.len(), 1);
    assert_eq!(opinions[0].target, "target.com");
    assert!((opinions[0].confidence - 0.05).abs() < 1e-9);
}

#[test]
fn intelligence_request_is_answered_and_evaluated() {
    let mut f = fixture(TrustConfig::default());

    f.handler.handle_raw(
        r#"{"type": "nl2tl_intelligence_request", "version": 1,
            "data": {"request_id": "123", "sender": {"id": "peer#1", "organisations": []},
                     "payload": "example.com"}}"#,
    );

    let envelopes = drain(&mut f.outbound_rx);
    assert_eq!(envelopes.len(), 2);
    assert!(envelopes
        .iter()
        .any(|e| e.message_type == "tl2nl_intelligence_response"));
    assert!(envelopes
        .iter()
        .any(|e| e.message_type == "tl2nl_peers_reliability"));
}

#[test]
fn intelligence_response_aggregates_and_notifies() {
    let mut f = fixture(TrustConfig::default());
    for peer_id in ["sender#1", "sender#2"] {
        let mut trust = f
            .trust
            .determine_and_store_initial_trust(&PeerInfo::new(peer_id), false);
        trust.service_trust = 1.0;
        f.store.store_peer_trust(trust);
    }

    f.handler.handle_raw(
        r#"{"type": "nl2tl_intelligence_response", "version": 1,
            "data": [{"sender": {"id": "sender#1", "organisations": []},
                      "payload": {"target": "target.com",
                                  "intelligence": {"score": 0.4, "confidence": 0.6}}},
                     {"sender": {"id": "sender#2", "organisations": []},
                      "payload": {"target": "target.com",
                                  "intelligence": {"score": 1.0, "confidence": 1.0}}}]}"#,
    );

    let envelopes = drain(&mut f.outbound_rx);
    assert!(envelopes
        .iter()
        .any(|e| e.message_type == "tl2nl_peers_reliability"));

    let opinions = f.opinions.lock().unwrap();
    assert_eq!(opinions.len(), 1);
    assert_eq!(opinions[0].target, "target.com");
    assert!((opinions[0].score - 0.7).abs() < 1e-9);

    assert!(f.store.cached_network_opinion("target.com").is_some());
}

#[tokio::test]
async fn dispatcher_processes_messages_until_the_queue_closes() {
    let mut f = fixture(TrustConfig::default());
    let (inbound_tx, inbound_rx) = tokio::sync::mpsc::unbounded_channel();

    inbound_tx
        .send(
            r#"{"type": "nl2tl_peers_list", "version": 1,
                "data": {"peers": [{"id": "peer#1", "organisations": []}]}}"#
                .to_string(),
        )
        .unwrap();
    drop(inbound_tx);

    // the loop drains the pending message and ends once the channel closes
    Dispatcher::run(inbound_rx, f.handler).await;

    let envelopes = drain(&mut f.outbound_rx);
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].message_type, "tl2nl_peers_reliability");
    assert!(f.store.peer_trust("peer#1").is_some());
}

#[test]
fn unknown_and_malformed_messages_hit_their_hooks() {
    let mut f = fixture(TrustConfig::default());

    f.handler
        .handle_raw(r#"{"type": "nl2tl_gossip", "version": 1, "data": {}}"#);
    f.handler
        .handle_raw(r#"{"type": "nl2tl_alert", "version": 7, "data": {}}"#);
    f.handler.handle_raw("this is not json");
    f.handler
        .handle_raw(r#"{"type": "nl2tl_alert", "version": 1, "data": {"bogus": true}}"#);

    assert_eq!(
        f.unknown.lock().unwrap().as_slice(),
        ["nl2tl_gossip".to_string(), "nl2tl_alert".to_string()]
    );
    assert_eq!(f.errors.lock().unwrap().len(), 2);
    assert!(drain(&mut f.outbound_rx).is_empty());
}
