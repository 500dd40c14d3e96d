pub mod dirhash;
pub mod docker;
pub mod http;
pub mod model;
pub mod service;
pub mod storage;

use service::{ContainerService, ImageService};
use std::net::SocketAddr;
use std::path::PathBuf;

pub struct Settings {
    pub bind_address: SocketAddr,
    pub db_path: PathBuf,
    pub tasks_repo: PathBuf,
    pub runtime_dir: PathBuf,
}

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let conn = fabric_common::storage::open(&settings.db_path)?;
    let storage = storage::Storage::new(conn)?;
    let docker = docker::DockerService::connect()?;

    let image_service = ImageService::new(storage.clone(), docker.clone(), settings.tasks_repo);
    let container_service = ContainerService::new(storage, docker, settings.runtime_dir);

    let routes = http::routes(image_service, container_service);
    let bind_address = settings.bind_address;
    tracing::info!(%bind_address, "environment controller listening");
    warp::serve(routes).run(bind_address).await;
    Ok(())
}
