use crate::service::SelfIdentity;
use crate::storage::Storage;
use crate::wire::HandshakeDto;
use fabric_common::client::PeerClient;
use fabric_common::config::{BootstrapConfig, RegistryAddr};
use fabric_common::model::{Node, NodeStatus};
use network_service::NetworkService;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::path::Path;

pub struct Bootstrap {
    pub identity: SelfIdentity,
    pub network: Option<(NetworkService, u16)>,
}

/// §4.1 own-identity bootstrap, steps 1-4.
pub async fn run(working_dir: &Path, config: &mut BootstrapConfig, local_port: u16, storage: &Storage) -> anyhow::Result<Bootstrap> {
    let local_ip = local_ipv4()?;

    let network = if config.use_upnp {
        let (service, public_ip, public_port) =
            NetworkService::bootstrap(SocketAddrV4::new(local_ip, local_port)).await?;
        config.public_ip = Some(public_ip);
        config.public_port = Some(public_port);
        config.persist(working_dir)?;
        Some((service, public_port))
    } else {
        None
    };

    let public_ip = config.public_ip.unwrap_or(local_ip);
    let public_port = config.public_port.unwrap_or(local_port);

    let identity = SelfIdentity {
        node_uid: config.node_uid,
        role: config.role,
        ipv4_address: public_ip,
        port: public_port,
    };

    for registry in &config.bootstrap_registries {
        if let Err(e) = handshake_registry(&identity, registry, storage).await {
            tracing::warn!(registry = ?registry, error = %e, "bootstrap handshake failed");
        }
    }
    for node in storage.all()? {
        if node.role == fabric_common::model::NodeRole::Registry {
            if let Err(e) = enable_registry(&identity, &node).await {
                tracing::warn!(node_uid = %node.node_uid, error = %e, "bootstrap enable failed");
            }
        }
    }

    Ok(Bootstrap { identity, network })
}

async fn handshake_registry(identity: &SelfIdentity, registry: &RegistryAddr, storage: &Storage) -> anyhow::Result<()> {
    let client = PeerClient::new(registry.ipv4_address, registry.port);
    let self_dto = HandshakeDto {
        node_uid: identity.node_uid,
        ip: identity.ipv4_address,
        port: identity.port,
        role: identity.role.as_str().to_string(),
    };
    let reply: fabric_common::wire::Envelope<HandshakeDto> = client.post_json("/nodes/handshake", &self_dto).await?;
    let registry_node = Node {
        node_uid: reply.payload.node_uid,
        ipv4_address: reply.payload.ip,
        port: reply.payload.port,
        role: fabric_common::model::NodeRole::Registry,
        status: NodeStatus::Active,
        last_ping: chrono::Utc::now(),
    };
    storage.upsert(&registry_node)?;
    Ok(())
}

async fn enable_registry(identity: &SelfIdentity, registry: &Node) -> anyhow::Result<()> {
    let client = PeerClient::new(registry.ipv4_address, registry.port);
    #[derive(serde::Serialize)]
    struct EnableRequest {
        node_uid: uuid::Uuid,
        ip: Ipv4Addr,
        port: u16,
    }
    let _: fabric_common::wire::Envelope<serde_json::Value> = client
        .post_json(
            "/nodes/enable",
            &EnableRequest {
                node_uid: identity.node_uid,
                ip: identity.ipv4_address,
                port: identity.port,
            },
        )
        .await?;
    Ok(())
}

/// Determines the node's LAN-facing address the way `ifconfig.co`-style
/// tools do without a routable peer: connect a UDP socket (no packets are
/// actually sent) and read back the local endpoint the kernel would use.
fn local_ipv4() -> anyhow::Result<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    match socket.local_addr()?.ip() {
        std::net::IpAddr::V4(ip) => Ok(ip),
        std::net::IpAddr::V6(_) => anyhow::bail!("no IPv4 local address available"),
    }
}
