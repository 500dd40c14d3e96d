use crate::service::ExecutorService;
use fabric_common::error::reject;
use fabric_common::model::ExecutorSubtask;
use fabric_common::wire::success;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use warp::{Filter, Rejection, Reply};

#[derive(Deserialize)]
struct OfferRequest {
    subtask_uid: Uuid,
    creator_uid: Uuid,
}

#[derive(Serialize)]
struct OfferResponse {
    subtask_uid: Uuid,
    verdict: &'static str,
}

#[derive(Deserialize)]
struct StartRequest {
    subtask_uid: Uuid,
    image_tag: String,
    dataset_uid: Uuid,
    magnet_link: String,
    params: Value,
}

#[derive(Deserialize)]
struct SubtaskUidRequest {
    subtask_uid: Uuid,
}

#[derive(Serialize)]
struct SubtasksResponse {
    subtasks: Vec<ExecutorSubtask>,
}

#[derive(Serialize)]
struct ResultResponse {
    result: Value,
}

pub fn routes(service: ExecutorService) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let offer = warp::path!("subtask" / "offer")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(offer_handler);

    let start = warp::path!("subtask" / "start")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(start_handler);

    let get_result = warp::path!("subtask" / "result")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(result_handler);

    let get_subtasks = warp::path("subtasks")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_service(service.clone()))
        .and_then(subtasks_handler);

    let get_subtask = warp::path("subtask")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service))
        .and_then(get_handler);

    offer
        .or(start)
        .or(get_result)
        .or(get_subtasks)
        .or(get_subtask)
        .recover(fabric_common::error::handle_rejection)
}

fn with_service(service: ExecutorService) -> impl Filter<Extract = (ExecutorService,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || service.clone())
}

async fn offer_handler(req: OfferRequest, service: ExecutorService) -> Result<impl Reply, Rejection> {
    let subtask = service.offer(req.subtask_uid, req.creator_uid).map_err(reject)?;
    Ok(warp::reply::json(&success(OfferResponse {
        subtask_uid: subtask.subtask_uid,
        verdict: "accepted",
    })))
}

async fn start_handler(req: StartRequest, service: ExecutorService) -> Result<impl Reply, Rejection> {
    let subtask = service
        .start(req.subtask_uid, req.image_tag, req.dataset_uid, req.magnet_link, req.params)
        .map_err(reject)?;
    Ok(warp::reply::json(&success(subtask)))
}

async fn get_handler(req: SubtaskUidRequest, service: ExecutorService) -> Result<impl Reply, Rejection> {
    let subtask = service.get(req.subtask_uid).map_err(reject)?;
    Ok(warp::reply::json(&success(subtask)))
}

async fn subtasks_handler(service: ExecutorService) -> Result<impl Reply, Rejection> {
    let subtasks = service.get_subtasks().map_err(reject)?;
    Ok(warp::reply::json(&success(SubtasksResponse { subtasks })))
}

async fn result_handler(req: SubtaskUidRequest, service: ExecutorService) -> Result<impl Reply, Rejection> {
    let result = service
        .get_result(req.subtask_uid)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&success(ResultResponse { result })))
}
