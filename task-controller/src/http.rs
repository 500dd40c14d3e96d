use crate::service::TaskControllerService;
use fabric_common::error::reject;
use fabric_common::model::{Task, TaskType};
use fabric_common::wire::success;
use fabric_common::FabricError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use uuid::Uuid;
use warp::{Filter, Rejection, Reply};

#[derive(Deserialize)]
struct TaskCreateRequest {
    task_type: String,
    params: Value,
    dataset_path: PathBuf,
}

#[derive(Serialize)]
struct TaskCreateResponse {
    task_uid: Uuid,
}

#[derive(Deserialize)]
struct TaskUidRequest {
    task_uid: Uuid,
}

#[derive(Deserialize)]
struct SubtaskUidRequest {
    subtask_uid: Uuid,
}

#[derive(Serialize)]
struct TasksResponse {
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct TaskResultResponse {
    result: Option<Value>,
}

pub fn routes(service: TaskControllerService) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let create = warp::path!("task" / "create")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(create_handler);

    let tasks = warp::path("tasks")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_service(service.clone()))
        .and_then(tasks_handler);

    let task = warp::path("task")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(task_handler);

    let task_result = warp::path!("task" / "result")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(result_handler);

    let task_subtask = warp::path!("task" / "subtask")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service))
        .and_then(subtask_handler);

    create
        .or(tasks)
        .or(task)
        .or(task_result)
        .or(task_subtask)
        .recover(fabric_common::error::handle_rejection)
}

fn with_service(
    service: TaskControllerService,
) -> impl Filter<Extract = (TaskControllerService,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || service.clone())
}

async fn create_handler(req: TaskCreateRequest, service: TaskControllerService) -> Result<impl Reply, Rejection> {
    let task_type: TaskType = req
        .task_type
        .parse()
        .map_err(|e: anyhow::Error| reject(FabricError::Invalid(e.to_string())))?;
    let task = service
        .create_task(task_type, req.params, req.dataset_path)
        .map_err(reject)?;
    Ok(warp::reply::json(&success(TaskCreateResponse { task_uid: task.task_uid })))
}

async fn tasks_handler(service: TaskControllerService) -> Result<impl Reply, Rejection> {
    let tasks = service.get_tasks().map_err(reject)?;
    Ok(warp::reply::json(&success(TasksResponse { tasks })))
}

async fn task_handler(req: TaskUidRequest, service: TaskControllerService) -> Result<impl Reply, Rejection> {
    let task = service.get_task(req.task_uid).map_err(reject)?;
    Ok(warp::reply::json(&success(task)))
}

async fn result_handler(req: TaskUidRequest, service: TaskControllerService) -> Result<impl Reply, Rejection> {
    let result = service.get_task_result(req.task_uid).map_err(reject)?;
    Ok(warp::reply::json(&success(TaskResultResponse { result })))
}

async fn subtask_handler(req: SubtaskUidRequest, service: TaskControllerService) -> Result<impl Reply, Rejection> {
    let subtask = service.get_subtask(req.subtask_uid).map_err(reject)?;
    Ok(warp::reply::json(&success(subtask)))
}
