use crate::storage::Storage;
use chrono::Utc;
use fabric_common::model::{Node, NodeRole, NodeStatus};
use fabric_common::{FabricError, FabricResult};
use std::net::Ipv4Addr;
use uuid::Uuid;

/// This node's own identity, fixed for the lifetime of the process once
/// bootstrap has run.
#[derive(Debug, Clone)]
pub struct SelfIdentity {
    pub node_uid: Uuid,
    pub role: NodeRole,
    pub ipv4_address: Ipv4Addr,
    pub port: u16,
}

impl SelfIdentity {
    fn as_node(&self, status: NodeStatus) -> Node {
        Node {
            node_uid: self.node_uid,
            ipv4_address: self.ipv4_address,
            port: self.port,
            role: self.role,
            status,
            last_ping: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct NodeService {
    storage: Storage,
    identity: SelfIdentity,
}

impl NodeService {
    pub fn new(storage: Storage, identity: SelfIdentity) -> Self {
        Self { storage, identity }
    }

    pub fn identity(&self) -> &SelfIdentity {
        &self.identity
    }

    /// §4.1 `handshake`: upsert the caller as active, return our own
    /// identity. Idempotent — replaying the same handshake just refreshes
    /// `last_ping`.
    pub fn handshake(&self, mut peer: Node) -> FabricResult<Node> {
        peer.status = NodeStatus::Active;
        peer.last_ping = Utc::now();
        self.storage.upsert(&peer)?;
        Ok(self.identity.as_node(NodeStatus::Active))
    }

    pub fn active(&self) -> FabricResult<Vec<Node>> {
        Ok(self.storage.active()?)
    }

    /// §4.1 `exchange`: upsert every peer the caller offers, then hand back
    /// our full known set for the caller to upsert in turn.
    pub fn exchange(&self, peers: Vec<Node>) -> FabricResult<Vec<Node>> {
        for peer in peers {
            self.storage.upsert(&peer)?;
        }
        Ok(self.storage.all()?)
    }

    pub fn join(&self, ipv4_address: Ipv4Addr, port: u16, role: NodeRole) -> FabricResult<Node> {
        let node = Node {
            node_uid: Uuid::new_v4(),
            ipv4_address,
            port,
            role,
            status: NodeStatus::Active,
            last_ping: Utc::now(),
        };
        self.storage.upsert(&node)?;
        Ok(node)
    }

    pub fn leave(&self, node_uid: Uuid) -> FabricResult<()> {
        Ok(self.storage.remove(node_uid)?)
    }

    pub fn enable(&self, node_uid: Uuid, ipv4_address: Ipv4Addr, port: u16) -> FabricResult<Node> {
        let mut node = self
            .storage
            .get(node_uid)?
            .ok_or_else(|| FabricError::NotFound(format!("node {node_uid}")))?;
        node.ipv4_address = ipv4_address;
        node.port = port;
        node.status = NodeStatus::Active;
        node.last_ping = Utc::now();
        self.storage.upsert(&node)?;
        Ok(node)
    }

    pub fn disable(&self, node_uid: Uuid) -> FabricResult<Node> {
        let mut node = self
            .storage
            .get(node_uid)?
            .ok_or_else(|| FabricError::NotFound(format!("node {node_uid}")))?;
        node.status = NodeStatus::Inactive;
        self.storage.upsert(&node)?;
        Ok(node)
    }

    pub fn all(&self) -> FabricResult<Vec<Node>> {
        Ok(self.storage.all()?)
    }

    pub fn set_status(&self, node_uid: Uuid, status: NodeStatus) -> FabricResult<()> {
        if let Some(mut node) = self.storage.get(node_uid)? {
            node.status = status;
            self.storage.upsert(&node)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn service() -> NodeService {
        let conn = fabric_common::storage::open_in_memory().unwrap();
        let storage = Storage::new(conn).unwrap();
        let identity = SelfIdentity {
            node_uid: Uuid::new_v4(),
            role: NodeRole::Registry,
            ipv4_address: Ipv4Addr::new(1, 2, 3, 4),
            port: 8000,
        };
        NodeService::new(storage, identity)
    }

    fn peer() -> Node {
        Node {
            node_uid: Uuid::new_v4(),
            ipv4_address: Ipv4Addr::new(10, 0, 0, 5),
            port: 8003,
            role: NodeRole::Executor,
            status: NodeStatus::Unknown,
            last_ping: Utc::now(),
        }
    }

    #[test]
    fn handshake_is_idempotent() {
        let svc = service();
        let p = peer();
        let first = svc.handshake(p.clone()).unwrap();
        let second = svc.handshake(p.clone()).unwrap();
        assert_eq!(first.node_uid, second.node_uid);
        assert_eq!(svc.all().unwrap().len(), 1);
        assert_eq!(svc.active().unwrap()[0].node_uid, p.node_uid);
    }

    #[test]
    fn exchange_merges_and_returns_full_set() {
        let svc = service();
        let a = peer();
        let b = peer();
        svc.exchange(vec![a.clone()]).unwrap();
        let returned = svc.exchange(vec![b.clone()]).unwrap();
        assert_eq!(returned.len(), 2);
    }

    #[test]
    fn enable_requires_known_peer() {
        let svc = service();
        let unknown = Uuid::new_v4();
        assert!(svc.enable(unknown, Ipv4Addr::new(1, 1, 1, 1), 9000).is_err());
    }

    #[test]
    fn join_then_disable_then_leave() {
        let svc = service();
        let joined = svc.join(Ipv4Addr::new(10, 0, 0, 9), 8003, NodeRole::Executor).unwrap();
        assert_eq!(svc.disable(joined.node_uid).unwrap().status, NodeStatus::Inactive);
        svc.leave(joined.node_uid).unwrap();
        assert!(svc.disable(joined.node_uid).is_err());
    }
}
