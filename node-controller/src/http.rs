use crate::service::NodeService;
use crate::wire::HandshakeDto;
use fabric_common::error::reject;
use fabric_common::model::Node;
use fabric_common::wire::success;
use fabric_common::FabricError;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use uuid::Uuid;
use warp::{Filter, Rejection, Reply};

#[derive(Serialize)]
struct PingResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct NodesResponse {
    nodes: Vec<Node>,
}

#[derive(Deserialize)]
struct ExchangeRequest {
    #[serde(default)]
    nodes: Vec<Node>,
}

#[derive(Deserialize)]
struct JoinRequest {
    ip: Ipv4Addr,
    port: u16,
    role: String,
}

#[derive(Deserialize)]
struct NodeUidRequest {
    node_uid: Uuid,
}

#[derive(Deserialize)]
struct EnableRequest {
    node_uid: Uuid,
    ip: Ipv4Addr,
    port: u16,
}

#[derive(Serialize)]
struct Ack {
    ack: bool,
}

pub fn routes(service: NodeService) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let ping = warp::path("ping")
        .and(warp::get())
        .map(|| warp::reply::json(&success(PingResponse { status: "ok" })));

    let active = warp::path!("nodes" / "active")
        .and(warp::post())
        .and(with_service(service.clone()))
        .and_then(active_handler);

    let handshake = warp::path!("nodes" / "handshake")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(handshake_handler);

    let exchange = warp::path!("nodes" / "exchange")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(exchange_handler);

    let join = warp::path!("nodes" / "join")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(join_handler);

    let leave = warp::path!("nodes" / "leave")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(leave_handler);

    let enable = warp::path!("nodes" / "enable")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(enable_handler);

    let disable = warp::path!("nodes" / "disable")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service))
        .and_then(disable_handler);

    ping.or(active)
        .or(handshake)
        .or(exchange)
        .or(join)
        .or(leave)
        .or(enable)
        .or(disable)
        .recover(fabric_common::error::handle_rejection)
}

fn with_service(service: NodeService) -> impl Filter<Extract = (NodeService,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || service.clone())
}

async fn active_handler(service: NodeService) -> Result<impl Reply, Rejection> {
    let nodes = service.active().map_err(reject)?;
    Ok(warp::reply::json(&success(NodesResponse { nodes })))
}

async fn handshake_handler(req: HandshakeDto, service: NodeService) -> Result<impl Reply, Rejection> {
    let peer: fabric_common::model::Node = req
        .into_node()
        .map_err(|e| reject(FabricError::Invalid(e.to_string())))?;
    let identity = service.handshake(peer).map_err(reject)?;
    Ok(warp::reply::json(&success(HandshakeDto::from_node(&identity))))
}

async fn exchange_handler(req: ExchangeRequest, service: NodeService) -> Result<impl Reply, Rejection> {
    let nodes = service.exchange(req.nodes).map_err(reject)?;
    Ok(warp::reply::json(&success(NodesResponse { nodes })))
}

async fn join_handler(req: JoinRequest, service: NodeService) -> Result<impl Reply, Rejection> {
    let role = req
        .role
        .parse()
        .map_err(|e: anyhow::Error| reject(FabricError::Invalid(e.to_string())))?;
    let node = service.join(req.ip, req.port, role).map_err(reject)?;
    Ok(warp::reply::json(&success(node)))
}

async fn leave_handler(req: NodeUidRequest, service: NodeService) -> Result<impl Reply, Rejection> {
    service.leave(req.node_uid).map_err(reject)?;
    Ok(warp::reply::json(&success(Ack { ack: true })))
}

async fn enable_handler(req: EnableRequest, service: NodeService) -> Result<impl Reply, Rejection> {
    let node = service.enable(req.node_uid, req.ip, req.port).map_err(reject)?;
    Ok(warp::reply::json(&success(node)))
}

async fn disable_handler(req: NodeUidRequest, service: NodeService) -> Result<impl Reply, Rejection> {
    let node = service.disable(req.node_uid).map_err(reject)?;
    Ok(warp::reply::json(&success(node)))
}

