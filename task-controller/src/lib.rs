pub mod clients;
pub mod http;
pub mod service;
pub mod storage;

use clients::{DataClient, EnvironmentClient};
use fabric_common::config::BootstrapConfig;
use fabric_common::model::NodeRole;
use node_controller::service::SelfIdentity;
use service::TaskControllerService;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

pub struct Settings {
    pub bind_address: SocketAddr,
    pub db_path: PathBuf,
    pub node_db_path: PathBuf,
    pub working_dir: PathBuf,
    pub environment_controller_port: u16,
    pub data_controller_port: u16,
}

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let conn = fabric_common::storage::open(&settings.db_path)?;
    let storage = storage::Storage::new(conn)?;

    let node_conn = fabric_common::storage::open(&settings.node_db_path)?;
    let node_storage = node_controller::storage::Storage::new(node_conn)?;

    let mut config = BootstrapConfig::load_or_init(&settings.working_dir, NodeRole::Creator)?;
    let bootstrap = node_controller::bootstrap::run(
        &settings.working_dir,
        &mut config,
        settings.bind_address.port(),
        &node_storage,
    )
    .await?;

    let identity = SelfIdentity {
        node_uid: bootstrap.identity.node_uid,
        role: bootstrap.identity.role,
        ipv4_address: bootstrap.identity.ipv4_address,
        port: bootstrap.identity.port,
    };

    let environment = EnvironmentClient::new(Ipv4Addr::LOCALHOST, settings.environment_controller_port);
    let data = DataClient::new(Ipv4Addr::LOCALHOST, settings.data_controller_port);
    let service = TaskControllerService::new(storage, node_storage, identity, environment, data);

    let routes = http::routes(service);
    let bind_address = settings.bind_address;
    tracing::info!(%bind_address, node_uid = %bootstrap.identity.node_uid, "task controller listening");

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
