use crate::service::NodeService;
use fabric_common::client::PeerClient;
use fabric_common::model::NodeStatus;
use futures::future::join_all;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

const LIVENESS_INTERVAL: Duration = Duration::from_secs(60);

/// §8 scenario E: a peer is marked inactive only after this many consecutive
/// failed probes, not on the first miss. The miss count is kept in memory
/// rather than persisted -- the `Node` row has no column for it and the
/// count only matters while this process is alive.
const INACTIVE_AFTER_MISSES: u32 = 3;

/// §4.1 liveness loop: once a minute, concurrently probe every known peer
/// and flip its status on change. This is the sole writer of `status` --
/// gossip (`exchange`) only ever upserts observed values and must not
/// clobber a more recent local observation (see DESIGN.md Open Question 1).
pub async fn run(service: NodeService) {
    let mut interval = tokio::time::interval(LIVENESS_INTERVAL);
    let mut misses: HashMap<Uuid, u32> = HashMap::new();
    loop {
        interval.tick().await;
        if let Err(e) = probe_round(&service, &mut misses).await {
            tracing::warn!(error = %e, "liveness round failed");
        }
    }
}

async fn probe_round(service: &NodeService, misses: &mut HashMap<Uuid, u32>) -> anyhow::Result<()> {
    let nodes = service.all()?;
    let self_uid = service.identity().node_uid;
    let probes = nodes.iter().filter(|n| n.node_uid != self_uid).map(|node| {
        let client = PeerClient::new(node.ipv4_address, node.port);
        let node_uid = node.node_uid;
        let was_active = node.status == NodeStatus::Active;
        async move {
            let reachable = client.get_json::<serde_json::Value>("/ping").await.is_ok();
            (node_uid, was_active, reachable)
        }
    });

    let known: std::collections::HashSet<Uuid> = nodes.iter().map(|n| n.node_uid).collect();
    misses.retain(|uid, _| known.contains(uid));

    for (node_uid, was_active, reachable) in join_all(probes).await {
        if let Some(new_status) = record_probe(misses, node_uid, was_active, reachable) {
            service.set_status(node_uid, new_status)?;
        }
    }
    Ok(())
}

/// Pure decision step of one probe result: updates the miss counter for
/// `node_uid` and returns the status transition to persist, if any.
fn record_probe(
    misses: &mut HashMap<Uuid, u32>,
    node_uid: Uuid,
    was_active: bool,
    reachable: bool,
) -> Option<NodeStatus> {
    if reachable {
        misses.remove(&node_uid);
        return (!was_active).then_some(NodeStatus::Active);
    }
    let count = misses.entry(node_uid).or_insert(0);
    *count += 1;
    (was_active && *count >= INACTIVE_AFTER_MISSES).then_some(NodeStatus::Inactive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_active_until_third_consecutive_miss() {
        let mut misses = HashMap::new();
        let uid = Uuid::new_v4();
        assert_eq!(record_probe(&mut misses, uid, true, false), None);
        assert_eq!(record_probe(&mut misses, uid, true, false), None);
        assert_eq!(
            record_probe(&mut misses, uid, true, false),
            Some(NodeStatus::Inactive)
        );
    }

    #[test]
    fn a_successful_probe_resets_the_counter() {
        let mut misses = HashMap::new();
        let uid = Uuid::new_v4();
        record_probe(&mut misses, uid, true, false);
        record_probe(&mut misses, uid, true, false);
        assert_eq!(record_probe(&mut misses, uid, true, true), Some(NodeStatus::Active));
        assert_eq!(misses.get(&uid), None);
        assert_eq!(record_probe(&mut misses, uid, true, false), None);
    }

    #[test]
    fn no_flip_to_inactive_when_already_inactive() {
        let mut misses = HashMap::new();
        let uid = Uuid::new_v4();
        for _ in 0..5 {
            assert_eq!(record_probe(&mut misses, uid, false, false), None);
        }
    }
}
