use fabric_common::client::PeerClient;
use fabric_common::model::Node;
use fabric_common::wire::Envelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Talks to one known registry's Node Controller. Used only to refresh the
/// local node cache at the top of every `executors_searching` round.
#[derive(Clone)]
pub struct NodeClient {
    peer: PeerClient,
}

#[derive(Serialize)]
struct ExchangeRequest {
    nodes: Vec<Node>,
}

#[derive(Deserialize)]
struct NodesResponse {
    nodes: Vec<Node>,
}

impl NodeClient {
    pub fn new(ipv4_address: Ipv4Addr, port: u16) -> Self {
        Self {
            peer: PeerClient::new(ipv4_address, port),
        }
    }

    pub async fn exchange(&self, nodes: Vec<Node>) -> anyhow::Result<Vec<Node>> {
        let envelope: Envelope<NodesResponse> = self.peer.post_json("/nodes/exchange", &ExchangeRequest { nodes }).await?;
        Ok(envelope.payload.nodes)
    }
}

/// Client stubs mirroring Task Executor's wire contract
/// (`task-executor::http`).
#[derive(Clone)]
pub struct ExecutorClient {
    peer: PeerClient,
}

#[derive(Serialize)]
struct OfferRequest {
    subtask_uid: Uuid,
    creator_uid: Uuid,
}

#[derive(Deserialize)]
pub struct OfferResponse {
    #[allow(dead_code)]
    pub subtask_uid: Uuid,
    pub verdict: String,
}

#[derive(Serialize)]
struct StartRequest {
    subtask_uid: Uuid,
    image_tag: String,
    dataset_uid: Uuid,
    magnet_link: String,
    params: Value,
}

#[derive(Serialize)]
struct SubtaskUidRequest {
    subtask_uid: Uuid,
}

#[derive(Deserialize)]
pub struct ExecutorSubtaskResponse {
    #[allow(dead_code)]
    pub subtask_uid: Uuid,
    pub status: String,
}

#[derive(Deserialize)]
pub struct ExecutorResultResponse {
    pub result: Value,
}

impl ExecutorClient {
    pub fn new(ipv4_address: Ipv4Addr, port: u16) -> Self {
        Self {
            peer: PeerClient::new(ipv4_address, port),
        }
    }

    pub async fn offer(&self, subtask_uid: Uuid, creator_uid: Uuid) -> anyhow::Result<OfferResponse> {
        let envelope: Envelope<OfferResponse> = self
            .peer
            .post_json("/subtask/offer", &OfferRequest { subtask_uid, creator_uid })
            .await?;
        Ok(envelope.payload)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn start(
        &self,
        subtask_uid: Uuid,
        image_tag: String,
        dataset_uid: Uuid,
        magnet_link: String,
        params: Value,
    ) -> anyhow::Result<ExecutorSubtaskResponse> {
        let envelope: Envelope<ExecutorSubtaskResponse> = self
            .peer
            .post_json(
                "/subtask/start",
                &StartRequest {
                    subtask_uid,
                    image_tag,
                    dataset_uid,
                    magnet_link,
                    params,
                },
            )
            .await?;
        Ok(envelope.payload)
    }

    pub async fn get(&self, subtask_uid: Uuid) -> anyhow::Result<ExecutorSubtaskResponse> {
        let envelope: Envelope<ExecutorSubtaskResponse> =
            self.peer.post_json("/subtask", &SubtaskUidRequest { subtask_uid }).await?;
        Ok(envelope.payload)
    }

    pub async fn get_result(&self, subtask_uid: Uuid) -> anyhow::Result<Value> {
        let envelope: Envelope<ExecutorResultResponse> = self
            .peer
            .post_json("/subtask/result", &SubtaskUidRequest { subtask_uid })
            .await?;
        Ok(envelope.payload.result)
    }
}

/// Client stubs mirroring the Environment Controller's wire contract, always
/// pointed at the copy running on this same host.
#[derive(Clone)]
pub struct EnvironmentClient {
    peer: PeerClient,
}

#[derive(Serialize)]
struct PushRequest<'a> {
    task_type: &'a str,
    subtask_type: &'a str,
}

#[derive(Serialize)]
struct StatusRequest<'a> {
    image_tag: &'a str,
}

#[derive(Deserialize)]
pub struct ImageResponse {
    pub image_tag: String,
    pub status: String,
}

impl EnvironmentClient {
    pub fn new(ipv4_address: Ipv4Addr, port: u16) -> Self {
        Self {
            peer: PeerClient::new(ipv4_address, port),
        }
    }

    pub async fn push(&self, task_type: &str, subtask_type: &str) -> anyhow::Result<ImageResponse> {
        let envelope: Envelope<ImageResponse> = self
            .peer
            .post_json("/image/push", &PushRequest { task_type, subtask_type })
            .await?;
        Ok(envelope.payload)
    }

    pub async fn status(&self, image_tag: &str) -> anyhow::Result<ImageResponse> {
        let envelope: Envelope<ImageResponse> = self.peer.post_json("/image/status", &StatusRequest { image_tag }).await?;
        Ok(envelope.payload)
    }
}

/// Client stubs mirroring the Data Controller's wire contract, always
/// pointed at the copy running on this same host.
#[derive(Clone)]
pub struct DataClient {
    peer: PeerClient,
}

#[derive(Serialize)]
struct PublishRequest<'a> {
    path: &'a Path,
}

#[derive(Deserialize)]
struct DatasetUidResponse {
    dataset_uid: Uuid,
}

#[derive(Serialize)]
struct DatasetUidRequest {
    dataset_uid: Uuid,
}

#[derive(Deserialize)]
pub struct DatasetResponse {
    pub dataset_uid: Uuid,
    pub magnet_link: Option<String>,
    pub path: PathBuf,
    pub status: String,
}

impl DataClient {
    pub fn new(ipv4_address: Ipv4Addr, port: u16) -> Self {
        Self {
            peer: PeerClient::new(ipv4_address, port),
        }
    }

    pub async fn publish(&self, path: &Path) -> anyhow::Result<Uuid> {
        let envelope: Envelope<DatasetUidResponse> = self.peer.post_json("/data/publish", &PublishRequest { path }).await?;
        Ok(envelope.payload.dataset_uid)
    }

    pub async fn get(&self, dataset_uid: Uuid) -> anyhow::Result<DatasetResponse> {
        let envelope: Envelope<DatasetResponse> =
            self.peer.post_json("/data", &DatasetUidRequest { dataset_uid }).await?;
        Ok(envelope.payload)
    }
}
