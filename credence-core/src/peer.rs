//! Peer identity model

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Unique identifier of a peer in the network
pub type PeerId = String;

/// Unique identifier of an organisation
pub type OrganisationId = String;

/// Target of threat intelligence - an IP address or a domain
pub type Target = String;

/// Identification data of a single peer in the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Unique identification of the peer
    pub id: PeerId,

    /// Organisations that signed this peer's public key.
    /// According to the protocol, these are organisations that trust the peer.
    #[serde(default)]
    pub organisations: Vec<OrganisationId>,

    /// IP address of the peer, if known. Peers behind NAT or connected
    /// through a TURN server have no address here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,
}

impl PeerInfo {
    /// Create peer info with no organisations and no address
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            organisations: Vec::new(),
            ip: None,
        }
    }

    /// Create peer info belonging to the given organisations
    pub fn with_organisations(id: &str, organisations: Vec<OrganisationId>) -> Self {
        Self {
            id: id.to_string(),
            organisations,
            ip: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_info_deserializes_without_optional_fields() {
        let info: PeerInfo = serde_json::from_str(r#"{"id": "peer#1"}"#).unwrap();
        assert_eq!(info.id, "peer#1");
        assert!(info.organisations.is_empty());
        assert!(info.ip.is_none());
    }

    #[test]
    fn test_peer_info_with_ip() {
        let info: PeerInfo =
            serde_json::from_str(r#"{"id": "peer#1", "organisations": ["org1"], "ip": "1.2.3.4"}"#)
                .unwrap();
        assert_eq!(info.organisations, vec!["org1".to_string()]);
        assert_eq!(info.ip.unwrap().to_string(), "1.2.3.4");
    }
}
