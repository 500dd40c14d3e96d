pub mod bootstrap;
pub mod http;
pub mod liveness;
pub mod service;
pub mod storage;
pub mod wire;

use fabric_common::config::BootstrapConfig;
use fabric_common::model::NodeRole;
use service::{NodeService, SelfIdentity};
use std::net::SocketAddr;
use std::path::PathBuf;

pub struct Settings {
    pub bind_address: SocketAddr,
    pub db_path: PathBuf,
    pub working_dir: PathBuf,
    pub role: NodeRole,
}

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let conn = fabric_common::storage::open(&settings.db_path)?;
    let storage = storage::Storage::new(conn)?;

    let mut config = BootstrapConfig::load_or_init(&settings.working_dir, settings.role)?;
    let bootstrap = bootstrap::run(&settings.working_dir, &mut config, settings.bind_address.port(), &storage).await?;

    let identity = SelfIdentity {
        node_uid: bootstrap.identity.node_uid,
        role: bootstrap.identity.role,
        ipv4_address: bootstrap.identity.ipv4_address,
        port: bootstrap.identity.port,
    };
    let service = NodeService::new(storage, identity);

    tokio::spawn(liveness::run(service.clone()));

    let routes = http::routes(service);
    let bind_address = settings.bind_address;
    tracing::info!(%bind_address, node_uid = %bootstrap.identity.node_uid, "node controller listening");

    let shutdown = async move {
        let _ = tokio::signal::ctrl_c().await;
        if let Some((network, public_port)) = &bootstrap.network {
            if let Err(e) = network.remove_mapping(*public_port).await {
                tracing::warn!(error = %e, "failed to remove UPnP mapping on shutdown");
            }
        }
    };
    let (_, server) = warp::serve(routes).bind_with_graceful_shutdown(bind_address, shutdown);
    server.await;
    Ok(())
}
