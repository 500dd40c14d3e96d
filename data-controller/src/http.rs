use crate::service::DatasetService;
use fabric_common::error::reject;
use fabric_common::wire::success;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;
use warp::{Filter, Rejection, Reply};

#[derive(Deserialize)]
struct PublishRequest {
    path: PathBuf,
}

#[derive(Deserialize)]
struct DownloadRequest {
    dataset_uid: Uuid,
    magnet_link: String,
}

#[derive(Deserialize)]
struct GetRequest {
    dataset_uid: Uuid,
}

#[derive(Serialize)]
struct DatasetUidResponse {
    dataset_uid: Uuid,
}

pub fn routes(service: DatasetService) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let publish = warp::path!("data" / "publish")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(publish_handler);

    let download = warp::path!("data" / "download")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(download_handler);

    let get = warp::path("data")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service))
        .and_then(get_handler);

    publish.or(download).or(get).recover(fabric_common::error::handle_rejection)
}

fn with_service(service: DatasetService) -> impl Filter<Extract = (DatasetService,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || service.clone())
}

async fn publish_handler(req: PublishRequest, service: DatasetService) -> Result<impl Reply, Rejection> {
    let dataset = service.publish(req.path).map_err(reject)?;
    Ok(warp::reply::json(&success(DatasetUidResponse {
        dataset_uid: dataset.dataset_uid,
    })))
}

async fn download_handler(req: DownloadRequest, service: DatasetService) -> Result<impl Reply, Rejection> {
    let dataset = service.download(req.dataset_uid, req.magnet_link).map_err(reject)?;
    Ok(warp::reply::json(&success(DatasetUidResponse {
        dataset_uid: dataset.dataset_uid,
    })))
}

async fn get_handler(req: GetRequest, service: DatasetService) -> Result<impl Reply, Rejection> {
    let dataset = service.get(req.dataset_uid).map_err(reject)?;
    Ok(warp::reply::json(&success(dataset)))
}
