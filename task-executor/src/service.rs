use crate::clients::{DataClient, EnvironmentClient};
use crate::storage::Storage;
use chrono::Utc;
use fabric_common::model::{ExecutorSubtask, ExecutorSubtaskStatus};
use fabric_common::{FabricError, FabricResult};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

const IMAGE_POLL_INTERVAL: Duration = Duration::from_millis(50);
const DATASET_POLL_INTERVAL: Duration = Duration::from_millis(100);
const CONTAINER_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Clone)]
pub struct ExecutorService {
    storage: Storage,
    environment: EnvironmentClient,
    data: DataClient,
    subtasks_dir: PathBuf,
}

impl ExecutorService {
    pub fn new(storage: Storage, environment: EnvironmentClient, data: DataClient, subtasks_dir: PathBuf) -> Self {
        Self {
            storage,
            environment,
            data,
            subtasks_dir,
        }
    }

    /// §4.4 offer: idempotent on `subtask_uid`, always accepts.
    pub fn offer(&self, subtask_uid: Uuid, creator_uid: Uuid) -> FabricResult<ExecutorSubtask> {
        if let Some(existing) = self.storage.get(subtask_uid)? {
            return Ok(existing);
        }
        let subtask = ExecutorSubtask {
            subtask_uid,
            creator_uid,
            dataset_uid: None,
            status: ExecutorSubtaskStatus::WaitingParams,
            created_at: None,
            finished_at: None,
        };
        self.storage.upsert(&subtask)?;
        Ok(subtask)
    }

    /// §4.4 start: requires the `waiting_params` row minted by `offer`,
    /// submits the dataset/image to the local collaborators, transitions to
    /// `creating` synchronously and drives the rest in the background.
    pub fn start(
        &self,
        subtask_uid: Uuid,
        image_tag: String,
        dataset_uid: Uuid,
        magnet_link: String,
        params: Value,
    ) -> FabricResult<ExecutorSubtask> {
        if !fabric_common::magnet::is_valid_magnet(&magnet_link) {
            return Err(FabricError::Invalid(format!("not a magnet link: {magnet_link}")));
        }

        let mut subtask = self
            .storage
            .get(subtask_uid)?
            .ok_or_else(|| FabricError::NotFound(format!("subtask {subtask_uid}")))?;
        if subtask.status != ExecutorSubtaskStatus::WaitingParams {
            return Err(FabricError::Conflict(format!(
                "subtask {subtask_uid} is not waiting for params (status={})",
                subtask.status
            )));
        }

        subtask.dataset_uid = Some(dataset_uid);
        subtask.status = ExecutorSubtaskStatus::Creating;
        self.storage.upsert(&subtask)?;

        let storage = self.storage.clone();
        let environment = self.environment.clone();
        let data = self.data.clone();
        let subtasks_dir = self.subtasks_dir.clone();
        tokio::spawn(async move {
            if let Err(e) = run_to_completion(
                &storage,
                &environment,
                &data,
                &subtasks_dir,
                subtask_uid,
                image_tag,
                dataset_uid,
                magnet_link,
                params,
            )
            .await
            {
                tracing::error!(%subtask_uid, error = %e, "subtask execution failed");
                let _ = storage.upsert(&ExecutorSubtask {
                    status: ExecutorSubtaskStatus::Error,
                    finished_at: Some(Utc::now()),
                    ..subtask
                });
            }
        });

        self.storage
            .get(subtask_uid)?
            .ok_or_else(|| FabricError::NotFound(format!("subtask {subtask_uid}")))
    }

    pub fn get(&self, subtask_uid: Uuid) -> FabricResult<ExecutorSubtask> {
        self.storage
            .get(subtask_uid)?
            .ok_or_else(|| FabricError::NotFound(format!("subtask {subtask_uid}")))
    }

    pub fn get_subtasks(&self) -> FabricResult<Vec<ExecutorSubtask>> {
        Ok(self.storage.all()?)
    }

    /// §4.4 get-result: delegates to the Environment Controller's result
    /// call and parses the JSON at the path it returns. Both processes run
    /// on the same host, so the path is directly readable.
    pub async fn get_result(&self, subtask_uid: Uuid) -> FabricResult<Value> {
        let response = self
            .environment
            .result(subtask_uid)
            .await
            .map_err(|e| FabricError::Upstream(e.to_string()))?;
        let text = tokio::fs::read_to_string(&response.result_file)
            .await
            .map_err(|e| FabricError::Internal(e.into()))?;
        serde_json::from_str(&text).map_err(|e| FabricError::Internal(e.into()))
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_to_completion(
    storage: &Storage,
    environment: &EnvironmentClient,
    data: &DataClient,
    subtasks_dir: &std::path::Path,
    subtask_uid: Uuid,
    image_tag: String,
    dataset_uid: Uuid,
    magnet_link: String,
    params: Value,
) -> anyhow::Result<()> {
    environment.pull(&image_tag).await?;
    data.download(dataset_uid, &magnet_link).await?;

    wait_for_image(environment, &image_tag).await?;
    wait_for_dataset(data, dataset_uid).await?;

    let config_path = subtasks_dir.join(subtask_uid.to_string()).join("config.json");
    if let Some(parent) = config_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&config_path, serde_json::to_vec_pretty(&params)?).await?;

    let dataset = data.get(dataset_uid).await?;
    let mut input_files = list_dir_files(&dataset.path).await?;
    input_files.push(config_path);

    environment.run(subtask_uid, image_tag, input_files).await?;

    let subtask = storage
        .get(subtask_uid)?
        .ok_or_else(|| anyhow::anyhow!("subtask {subtask_uid} vanished mid-run"))?;
    storage.upsert(&ExecutorSubtask {
        status: ExecutorSubtaskStatus::Running,
        created_at: Some(Utc::now()),
        ..subtask
    })?;

    let terminal_status = wait_for_container(environment, subtask_uid).await?;

    let subtask = storage
        .get(subtask_uid)?
        .ok_or_else(|| anyhow::anyhow!("subtask {subtask_uid} vanished mid-run"))?;
    storage.upsert(&ExecutorSubtask {
        status: terminal_status,
        finished_at: Some(Utc::now()),
        ..subtask
    })?;
    Ok(())
}

async fn wait_for_image(environment: &EnvironmentClient, image_tag: &str) -> anyhow::Result<()> {
    loop {
        let status = environment.image_status(image_tag).await?;
        match status.status.as_str() {
            "pulled" => return Ok(()),
            "pulling_error" => anyhow::bail!("image {image_tag} failed to pull"),
            _ => tokio::time::sleep(IMAGE_POLL_INTERVAL).await,
        }
    }
}

async fn wait_for_dataset(data: &DataClient, dataset_uid: Uuid) -> anyhow::Result<()> {
    loop {
        let dataset = data.get(dataset_uid).await?;
        if dataset.status == "available" {
            return Ok(());
        }
        tokio::time::sleep(DATASET_POLL_INTERVAL).await;
    }
}

async fn wait_for_container(environment: &EnvironmentClient, subtask_uid: Uuid) -> anyhow::Result<ExecutorSubtaskStatus> {
    loop {
        let status = environment.container_status(subtask_uid).await?;
        match status.status.as_str() {
            "success" => return Ok(ExecutorSubtaskStatus::Success),
            "error" => return Ok(ExecutorSubtaskStatus::Error),
            "timeout" => return Ok(ExecutorSubtaskStatus::Timeout),
            _ => tokio::time::sleep(CONTAINER_POLL_INTERVAL).await,
        }
    }
}

async fn list_dir_files(dir: &std::path::Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn service() -> ExecutorService {
        let conn = fabric_common::storage::open_in_memory().unwrap();
        let storage = Storage::new(conn).unwrap();
        let environment = EnvironmentClient::new(Ipv4Addr::LOCALHOST, 8001);
        let data = DataClient::new(Ipv4Addr::LOCALHOST, 8002);
        ExecutorService::new(storage, environment, data, PathBuf::from("/tmp/subtasks"))
    }

    #[test]
    fn offer_is_idempotent_on_subtask_uid() {
        let svc = service();
        let subtask_uid = Uuid::new_v4();
        let creator_uid = Uuid::new_v4();
        let first = svc.offer(subtask_uid, creator_uid).unwrap();
        let second = svc.offer(subtask_uid, creator_uid).unwrap();
        assert_eq!(first.subtask_uid, second.subtask_uid);
        assert_eq!(svc.get_subtasks().unwrap().len(), 1);
    }

    #[test]
    fn start_requires_waiting_params_row() {
        let svc = service();
        let subtask_uid = Uuid::new_v4();
        let result = svc.start(
            subtask_uid,
            "distfabric/grid_search:abc".to_string(),
            Uuid::new_v4(),
            "magnet:?xt=urn:btih:ABCDEF".to_string(),
            serde_json::json!({}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn start_rejects_malformed_magnet_link() {
        let svc = service();
        let subtask_uid = Uuid::new_v4();
        svc.offer(subtask_uid, Uuid::new_v4()).unwrap();
        let err = svc
            .start(
                subtask_uid,
                "distfabric/grid_search:abc".to_string(),
                Uuid::new_v4(),
                "http://not-a-magnet".to_string(),
                serde_json::json!({}),
            )
            .unwrap_err();
        assert_eq!(err.status_code(), warp::http::StatusCode::UNPROCESSABLE_ENTITY);
    }
}
