pub mod http;
pub mod service;
pub mod storage;
pub mod torrent;

use service::DatasetService;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use torrent::RqbitSwarmClient;

pub struct Settings {
    pub bind_address: SocketAddr,
    pub db_path: PathBuf,
    pub storage_root: PathBuf,
    pub torrents_dir: PathBuf,
    pub session_dir: PathBuf,
}

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let conn = fabric_common::storage::open(&settings.db_path)?;
    let storage = storage::Storage::new(conn)?;
    let swarm = Arc::new(RqbitSwarmClient::new(settings.session_dir).await?);

    let service = DatasetService::new(storage, swarm, settings.storage_root, settings.torrents_dir);

    let routes = http::routes(service);
    let bind_address = settings.bind_address;
    tracing::info!(%bind_address, "data controller listening");
    warp::serve(routes).run(bind_address).await;
    Ok(())
}
