use fabric_common::client::PeerClient;
use fabric_common::wire::Envelope;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use uuid::Uuid;

/// Client stubs mirroring the Environment Controller's wire contract
/// (`environment-controller::http`). The executor always talks to the copy
/// running on its own host.
#[derive(Clone)]
pub struct EnvironmentClient {
    peer: PeerClient,
}

#[derive(Serialize)]
struct PullRequest<'a> {
    image_tag: &'a str,
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

#[derive(Serialize)]
struct RunRequest {
    subtask_uid: Uuid,
    image_tag: String,
    input_files: Vec<PathBuf>,
}

#[derive(Serialize, Deserialize)]
struct SubtaskUidRequest {
    subtask_uid: Uuid,
}

#[derive(Deserialize)]
pub struct ContainerResponse {
    pub subtask_uid: Uuid,
    pub status: String,
}

#[derive(Deserialize)]
pub struct ResultResponse {
    pub result_file: PathBuf,
}

impl EnvironmentClient {
    pub fn new(ipv4_address: Ipv4Addr, port: u16) -> Self {
        Self {
            peer: PeerClient::new(ipv4_address, port),
        }
    }

    pub async fn pull(&self, image_tag: &str) -> anyhow::Result<ImageResponse> {
        let envelope: Envelope<ImageResponse> = self.peer.post_json("/image/pull", &PullRequest { image_tag }).await?;
        Ok(envelope.payload)
    }

    pub async fn image_status(&self, image_tag: &str) -> anyhow::Result<ImageResponse> {
        let envelope: Envelope<ImageResponse> = self
            .peer
            .post_json("/image/status", &StatusRequest { image_tag })
            .await?;
        Ok(envelope.payload)
    }

    pub async fn run(&self, subtask_uid: Uuid, image_tag: String, input_files: Vec<PathBuf>) -> anyhow::Result<ContainerResponse> {
        let envelope: Envelope<ContainerResponse> = self
            .peer
            .post_json(
                "/container/run",
                &RunRequest {
                    subtask_uid,
                    image_tag,
                    input_files,
                },
            )
            .await?;
        Ok(envelope.payload)
    }

    pub async fn container_status(&self, subtask_uid: Uuid) -> anyhow::Result<ContainerResponse> {
        let envelope: Envelope<ContainerResponse> = self
            .peer
            .post_json("/container/status", &SubtaskUidRequest { subtask_uid })
            .await?;
        Ok(envelope.payload)
    }

    pub async fn result(&self, subtask_uid: Uuid) -> anyhow::Result<ResultResponse> {
        let envelope: Envelope<ResultResponse> = self
            .peer
            .post_json("/container/result", &SubtaskUidRequest { subtask_uid })
            .await?;
        Ok(envelope.payload)
    }
}

/// Client stubs mirroring the Data Controller's wire contract
/// (`data-controller::http`).
#[derive(Clone)]
pub struct DataClient {
    peer: PeerClient,
}

#[derive(Serialize)]
struct DownloadRequest<'a> {
    dataset_uid: Uuid,
    magnet_link: &'a str,
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

    pub async fn download(&self, dataset_uid: Uuid, magnet_link: &str) -> anyhow::Result<()> {
        let _: Envelope<serde_json::Value> = self
            .peer
            .post_json("/data/download", &DownloadRequest { dataset_uid, magnet_link })
            .await?;
        Ok(())
    }

    pub async fn get(&self, dataset_uid: Uuid) -> anyhow::Result<DatasetResponse> {
        let envelope: Envelope<DatasetResponse> =
            self.peer.post_json("/data", &DatasetUidRequest { dataset_uid }).await?;
        Ok(envelope.payload)
    }
}
