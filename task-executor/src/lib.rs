pub mod clients;
pub mod http;
pub mod service;
pub mod storage;

use clients::{DataClient, EnvironmentClient};
use service::ExecutorService;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

pub struct Settings {
    pub bind_address: SocketAddr,
    pub db_path: PathBuf,
    pub subtasks_dir: PathBuf,
    pub environment_controller_port: u16,
    pub data_controller_port: u16,
}

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let conn = fabric_common::storage::open(&settings.db_path)?;
    let storage = storage::Storage::new(conn)?;

    let localhost = Ipv4Addr::LOCALHOST;
    let environment = EnvironmentClient::new(localhost, settings.environment_controller_port);
    let data = DataClient::new(localhost, settings.data_controller_port);

    let service = ExecutorService::new(storage, environment, data, settings.subtasks_dir);

    let routes = http::routes(service);
    let bind_address = settings.bind_address;
    tracing::info!(%bind_address, "task executor listening");
    warp::serve(routes).run(bind_address).await;
    Ok(())
}
