use chrono::Utc;
use fabric_common::model::{Node, NodeRole, NodeStatus};
use node_controller::storage::Storage;
use std::net::Ipv4Addr;
use uuid::Uuid;

fn node(status: NodeStatus) -> Node {
    Node {
        node_uid: Uuid::new_v4(),
        ipv4_address: Ipv4Addr::new(10, 0, 0, 1),
        port: 8003,
        role: NodeRole::Executor,
        status,
        last_ping: Utc::now(),
    }
}

#[test]
fn node_upsert_round_trips_through_sqlite() {
    let conn = fabric_common::storage::open_in_memory().unwrap();
    let storage = Storage::new(conn).unwrap();
    let n = node(NodeStatus::Active);

    storage.upsert(&n).unwrap();
    let fetched = storage.get(n.node_uid).unwrap().unwrap();
    assert_eq!(fetched.status, NodeStatus::Active);
    assert_eq!(fetched.port, 8003);

    storage
        .upsert(&Node {
            status: NodeStatus::Inactive,
            ..n.clone()
        })
        .unwrap();
    assert_eq!(storage.get(n.node_uid).unwrap().unwrap().status, NodeStatus::Inactive);
}

#[test]
fn active_filters_by_status() {
    let conn = fabric_common::storage::open_in_memory().unwrap();
    let storage = Storage::new(conn).unwrap();
    let active_node = node(NodeStatus::Active);
    let inactive_node = node(NodeStatus::Inactive);
    storage.upsert(&active_node).unwrap();
    storage.upsert(&inactive_node).unwrap();

    let active = storage.active().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].node_uid, active_node.node_uid);
}

#[test]
fn remove_deletes_node() {
    let conn = fabric_common::storage::open_in_memory().unwrap();
    let storage = Storage::new(conn).unwrap();
    let n = node(NodeStatus::Active);
    storage.upsert(&n).unwrap();
    storage.remove(n.node_uid).unwrap();
    assert!(storage.get(n.node_uid).unwrap().is_none());
}
