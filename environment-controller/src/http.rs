use crate::service::{ContainerService, ImageService};
use fabric_common::error::reject;
use fabric_common::wire::success;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;
use warp::{Filter, Rejection, Reply};

#[derive(Deserialize)]
struct PushRequest {
    task_type: String,
    subtask_type: String,
}

#[derive(Deserialize)]
struct PullRequest {
    image_tag: String,
}

#[derive(Deserialize)]
struct StatusRequest {
    image_tag: String,
}

#[derive(Serialize)]
struct ImageResponse {
    image_tag: String,
    status: String,
}

#[derive(Deserialize)]
struct RunRequest {
    subtask_uid: Uuid,
    image_tag: String,
    input_files: Vec<PathBuf>,
}

#[derive(Serialize)]
struct ContainerResponse {
    subtask_uid: Uuid,
    status: String,
}

#[derive(Serialize)]
struct ResultResponse {
    result_file: PathBuf,
}

pub fn routes(
    image_service: ImageService,
    container_service: ContainerService,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let image_push = warp::path!("image" / "push")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_image(image_service.clone()))
        .and_then(push_handler);

    let image_pull = warp::path!("image" / "pull")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_image(image_service.clone()))
        .and_then(pull_handler);

    let image_status = warp::path!("image" / "status")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_image(image_service))
        .and_then(status_handler);

    let container_run = warp::path!("container" / "run")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_container(container_service.clone()))
        .and_then(run_handler);

    let container_status = warp::path!("container" / "status")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_container(container_service.clone()))
        .and_then(container_status_handler);

    let container_result = warp::path!("container" / "result")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_container(container_service))
        .and_then(result_handler);

    image_push
        .or(image_pull)
        .or(image_status)
        .or(container_run)
        .or(container_status)
        .or(container_result)
        .recover(fabric_common::error::handle_rejection)
}

fn with_image(
    service: ImageService,
) -> impl Filter<Extract = (ImageService,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || service.clone())
}

fn with_container(
    service: ContainerService,
) -> impl Filter<Extract = (ContainerService,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || service.clone())
}

async fn push_handler(req: PushRequest, service: ImageService) -> Result<impl Reply, Rejection> {
    let image = service.push(&req.task_type, &req.subtask_type).map_err(reject)?;
    Ok(warp::reply::json(&success(ImageResponse {
        image_tag: image.image_tag,
        status: image.status.to_string(),
    })))
}

async fn pull_handler(req: PullRequest, service: ImageService) -> Result<impl Reply, Rejection> {
    let image = service.pull(&req.image_tag).map_err(reject)?;
    Ok(warp::reply::json(&success(ImageResponse {
        image_tag: image.image_tag,
        status: image.status.to_string(),
    })))
}

async fn status_handler(req: StatusRequest, service: ImageService) -> Result<impl Reply, Rejection> {
    let image = service.status(&req.image_tag).map_err(reject)?;
    Ok(warp::reply::json(&success(ImageResponse {
        image_tag: image.image_tag,
        status: image.status.to_string(),
    })))
}

async fn run_handler(req: RunRequest, service: ContainerService) -> Result<impl Reply, Rejection> {
    let run = service
        .run(req.subtask_uid, req.image_tag, req.input_files)
        .map_err(reject)?;
    Ok(warp::reply::json(&success(ContainerResponse {
        subtask_uid: run.subtask_uid,
        status: run.status.as_str().to_string(),
    })))
}

async fn container_status_handler(req: RunStatusRequest, service: ContainerService) -> Result<impl Reply, Rejection> {
    let run = service.status(req.subtask_uid).map_err(reject)?;
    Ok(warp::reply::json(&success(ContainerResponse {
        subtask_uid: run.subtask_uid,
        status: run.status.as_str().to_string(),
    })))
}

async fn result_handler(req: RunStatusRequest, service: ContainerService) -> Result<impl Reply, Rejection> {
    let path = service.result_path(req.subtask_uid).map_err(reject)?;
    Ok(warp::reply::json(&success(ResultResponse { result_file: path })))
}

#[derive(Deserialize)]
struct RunStatusRequest {
    subtask_uid: Uuid,
}
