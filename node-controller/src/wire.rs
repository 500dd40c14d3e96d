use chrono::Utc;
use fabric_common::model::{Node, NodeStatus};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use uuid::Uuid;

/// Handshake request/response shape (§6 endpoint table): `node_uid, ip, port,
/// role`. Status and `last_ping` are local bookkeeping, not part of the
/// identity a peer presents or receives back.
#[derive(Debug, Serialize, Deserialize)]
pub struct HandshakeDto {
    pub node_uid: Uuid,
    pub ip: Ipv4Addr,
    pub port: u16,
    pub role: String,
}

impl HandshakeDto {
    pub fn into_node(self) -> anyhow::Result<Node> {
        Ok(Node {
            node_uid: self.node_uid,
            ipv4_address: self.ip,
            port: self.port,
            role: self.role.parse()?,
            status: NodeStatus::Unknown,
            last_ping: Utc::now(),
        })
    }

    pub fn from_node(node: &Node) -> Self {
        Self {
            node_uid: node.node_uid,
            ip: node.ipv4_address,
            port: node.port,
            role: node.role.as_str().to_string(),
        }
    }
}
