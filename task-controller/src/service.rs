use crate::clients::{DataClient, EnvironmentClient, ExecutorClient, NodeClient};
use crate::storage::Storage;
use chrono::Utc;
use fabric_common::model::{
    partition_atomics, CreatorSubtask, CreatorSubtaskStatus, Node, NodeRole, NodeStatus, SubtaskType, Task, TaskStatus,
    TaskType,
};
use fabric_common::{FabricError, FabricResult};
use futures::future::join_all;
use node_controller::service::SelfIdentity;
use node_controller::storage::Storage as NodeStorage;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

const EXECUTORS_ABSENCE_DELAY: Duration = Duration::from_secs(30);
const IMAGE_PUSHING_POLL: Duration = Duration::from_millis(50);
const DATASET_PUBLISHING_POLL: Duration = Duration::from_millis(100);
const SUBTASKS_RUNNING_POLL: Duration = Duration::from_millis(50);

#[derive(Clone)]
pub struct TaskControllerService {
    storage: Storage,
    node_storage: NodeStorage,
    identity: SelfIdentity,
    environment: EnvironmentClient,
    data: DataClient,
}

impl TaskControllerService {
    pub fn new(storage: Storage, node_storage: NodeStorage, identity: SelfIdentity, environment: EnvironmentClient, data: DataClient) -> Self {
        Self {
            storage,
            node_storage,
            identity,
            environment,
            data,
        }
    }

    /// `create_task`: stores the task in `creating` and spawns one
    /// background scheduling job, the linear state machine that carries it
    /// through to `success` or `error`.
    pub fn create_task(&self, task_type: TaskType, params: Value, dataset_path: PathBuf) -> FabricResult<Task> {
        let task = Task {
            task_uid: Uuid::new_v4(),
            task_type,
            creator_uid: self.identity.node_uid,
            status: TaskStatus::Creating,
            dataset_uid: None,
            created_at: None,
            finished_at: None,
            params,
            result: None,
            subtasks: Vec::new(),
        };
        self.storage.upsert_task(&task)?;

        let service = self.clone();
        let task_uid = task.task_uid;
        tokio::spawn(async move {
            if let Err(e) = service.run_scheduling_job(task_uid, task_type, dataset_path).await {
                tracing::error!(%task_uid, error = %e, "task scheduling job failed");
                if let Ok(Some(mut task)) = service.storage.get_task(task_uid) {
                    task.status = TaskStatus::Error;
                    task.finished_at = Some(Utc::now());
                    let _ = service.storage.upsert_task(&task);
                }
            }
        });

        Ok(task)
    }

    pub fn get_task(&self, task_uid: Uuid) -> FabricResult<Task> {
        self.storage
            .get_task(task_uid)?
            .ok_or_else(|| FabricError::NotFound(format!("task {task_uid}")))
    }

    pub fn get_tasks(&self) -> FabricResult<Vec<Task>> {
        Ok(self.storage.all_tasks()?)
    }

    pub fn get_task_result(&self, task_uid: Uuid) -> FabricResult<Option<Value>> {
        Ok(self.get_task(task_uid)?.result)
    }

    pub fn get_subtask(&self, subtask_uid: Uuid) -> FabricResult<CreatorSubtask> {
        self.find_subtask(subtask_uid)?
            .ok_or_else(|| FabricError::NotFound(format!("subtask {subtask_uid}")))
    }

    fn find_subtask(&self, subtask_uid: Uuid) -> FabricResult<Option<CreatorSubtask>> {
        for task in self.storage.all_tasks()? {
            if let Some(subtask) = task.subtasks.into_iter().find(|s| s.subtask_uid == subtask_uid) {
                return Ok(Some(subtask));
            }
        }
        Ok(None)
    }

    async fn run_scheduling_job(&self, task_uid: Uuid, task_type: TaskType, dataset_path: PathBuf) -> anyhow::Result<()> {
        let (executors, creator_subtasks) = self.executors_searching(task_uid, task_type).await?;
        let (image_tag, dataset_uid, magnet_link) = self.resources_publishing(task_uid, task_type, &dataset_path).await?;
        self.subtasks_sending(task_uid, &executors, &creator_subtasks, &image_tag, dataset_uid, &magnet_link)
            .await?;
        self.subtasks_polling(&executors, &creator_subtasks).await?;
        let merged = self.result_processing(task_uid, &executors, &creator_subtasks).await?;

        let reduced = reduce_result(&merged, task_type);
        let mut task = self
            .storage
            .get_task(task_uid)?
            .ok_or_else(|| anyhow::anyhow!("task {task_uid} vanished mid-run"))?;
        task.status = TaskStatus::Success;
        task.finished_at = Some(Utc::now());
        task.result = Some(serde_json::json!({ "result": reduced }));
        self.storage.upsert_task(&task)?;
        Ok(())
    }

    /// §4.5 step 1: loop until at least one executor accepts an offer.
    async fn executors_searching(&self, task_uid: Uuid, task_type: TaskType) -> anyhow::Result<(Vec<Node>, Vec<CreatorSubtask>)> {
        loop {
            let mut task = self
                .storage
                .get_task(task_uid)?
                .ok_or_else(|| anyhow::anyhow!("task {task_uid} vanished mid-run"))?;
            task.status = TaskStatus::ExecutorsSearching;
            self.storage.upsert_task(&task)?;

            self.refresh_node_view().await;

            let executors: Vec<Node> = self
                .node_storage
                .all()?
                .into_iter()
                .filter(|n| n.role == NodeRole::Executor && n.status == NodeStatus::Active)
                .collect();

            let offers = join_all(executors.iter().map(|executor| {
                let client = ExecutorClient::new(executor.ipv4_address, executor.port);
                let subtask_uid = Uuid::new_v4();
                let creator_uid = self.identity.node_uid;
                async move { (subtask_uid, client.offer(subtask_uid, creator_uid).await) }
            }))
            .await;

            let mut accepted_executors = Vec::new();
            let mut accepted_subtask_uids = Vec::new();
            for (executor, (subtask_uid, result)) in executors.into_iter().zip(offers) {
                match result {
                    Ok(resp) if resp.verdict == "accepted" => {
                        accepted_executors.push(executor);
                        accepted_subtask_uids.push(subtask_uid);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(node_uid = %executor.node_uid, error = %e, "offer failed, treating as declined"),
                }
            }

            if accepted_executors.is_empty() {
                tokio::time::sleep(EXECUTORS_ABSENCE_DELAY).await;
                continue;
            }

            let subtask_type = subtask_type_for(task_type);
            let params = task.params.clone();
            let buckets = partition_params(&params, accepted_executors.len())?;
            let creator_subtasks: Vec<CreatorSubtask> = accepted_executors
                .iter()
                .zip(accepted_subtask_uids.iter())
                .zip(buckets.into_iter())
                .map(|((executor, subtask_uid), subtask_params)| CreatorSubtask {
                    subtask_uid: *subtask_uid,
                    task_uid,
                    subtask_type,
                    executor_uid: Some(executor.node_uid),
                    status: CreatorSubtaskStatus::WaitingExecutorAssignment,
                    created_at: None,
                    finished_at: None,
                    params: subtask_params,
                    result: None,
                })
                .collect();
            for subtask in &creator_subtasks {
                self.storage.upsert_creator_subtask(subtask)?;
            }

            return Ok((accepted_executors, creator_subtasks));
        }
    }

    async fn refresh_node_view(&self) {
        let registries: Vec<Node> = match self.node_storage.all() {
            Ok(nodes) => nodes.into_iter().filter(|n| n.role == NodeRole::Registry).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read local node cache");
                return;
            }
        };
        let fetched = join_all(registries.iter().map(|registry| {
            let client = NodeClient::new(registry.ipv4_address, registry.port);
            async move { client.exchange(Vec::new()).await }
        }))
        .await;
        for result in fetched {
            match result {
                Ok(nodes) => {
                    for node in nodes {
                        if let Err(e) = self.node_storage.upsert(&node) {
                            tracing::warn!(error = %e, "failed to cache node");
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "registry exchange failed"),
            }
        }
    }

    /// §4.5 step 3: push the image and publish the dataset locally, then
    /// wait for both to become usable by the executors.
    async fn resources_publishing(&self, task_uid: Uuid, task_type: TaskType, dataset_path: &std::path::Path) -> anyhow::Result<(String, Uuid, String)> {
        let mut task = self
            .storage
            .get_task(task_uid)?
            .ok_or_else(|| anyhow::anyhow!("task {task_uid} vanished mid-run"))?;
        task.status = TaskStatus::ResourcesPublishing;
        self.storage.upsert_task(&task)?;

        let subtask_type = subtask_type_for(task_type);
        let image = self.environment.push(task_type.as_str(), subtask_type.as_str()).await?;
        let dataset_uid = self.data.publish(dataset_path).await?;

        task.dataset_uid = Some(dataset_uid);
        task.created_at = Some(Utc::now());
        self.storage.upsert_task(&task)?;

        tokio::try_join!(
            wait_for_image(&self.environment, &image.image_tag),
            wait_for_dataset(&self.data, dataset_uid),
        )?;

        let dataset = self.data.get(dataset_uid).await?;
        let magnet_link = dataset
            .magnet_link
            .ok_or_else(|| anyhow::anyhow!("dataset {dataset_uid} published without a magnet link"))?;
        Ok((image.image_tag, dataset_uid, magnet_link))
    }

    /// §4.5 step 4: hand each executor its slice and mark it running.
    async fn subtasks_sending(
        &self,
        task_uid: Uuid,
        executors: &[Node],
        creator_subtasks: &[CreatorSubtask],
        image_tag: &str,
        dataset_uid: Uuid,
        magnet_link: &str,
    ) -> anyhow::Result<()> {
        let mut task = self
            .storage
            .get_task(task_uid)?
            .ok_or_else(|| anyhow::anyhow!("task {task_uid} vanished mid-run"))?;
        task.status = TaskStatus::SubtasksSending;
        self.storage.upsert_task(&task)?;

        let results = join_all(executors.iter().zip(creator_subtasks.iter()).map(|(executor, subtask)| {
            let client = ExecutorClient::new(executor.ipv4_address, executor.port);
            async move {
                client
                    .start(
                        subtask.subtask_uid,
                        image_tag.to_string(),
                        dataset_uid,
                        magnet_link.to_string(),
                        subtask.params.clone(),
                    )
                    .await
            }
        }))
        .await;

        for (subtask, result) in creator_subtasks.iter().zip(results) {
            result?;
            let mut subtask = subtask.clone();
            subtask.status = CreatorSubtaskStatus::Running;
            self.storage.upsert_creator_subtask(&subtask)?;
        }
        Ok(())
    }

    /// §4.5 step 5: poll every executor until its subtask reaches a
    /// terminal status.
    async fn subtasks_polling(&self, executors: &[Node], creator_subtasks: &[CreatorSubtask]) -> anyhow::Result<()> {
        loop {
            let statuses = join_all(executors.iter().zip(creator_subtasks.iter()).map(|(executor, subtask)| {
                let client = ExecutorClient::new(executor.ipv4_address, executor.port);
                async move { client.get(subtask.subtask_uid).await }
            }))
            .await;

            let mut all_done = true;
            for status in statuses {
                let status = status?;
                if !matches!(status.status.as_str(), "success" | "cancelled" | "error" | "timeout") {
                    all_done = false;
                }
            }
            if all_done {
                return Ok(());
            }
            tokio::time::sleep(SUBTASKS_RUNNING_POLL).await;
        }
    }

    /// §4.5 step 6: collect every executor's result and flatten.
    async fn result_processing(&self, task_uid: Uuid, executors: &[Node], creator_subtasks: &[CreatorSubtask]) -> anyhow::Result<Vec<Value>> {
        let mut task = self
            .storage
            .get_task(task_uid)?
            .ok_or_else(|| anyhow::anyhow!("task {task_uid} vanished mid-run"))?;
        task.status = TaskStatus::ResultProcessing;
        self.storage.upsert_task(&task)?;

        let results = join_all(executors.iter().zip(creator_subtasks.iter()).map(|(executor, subtask)| {
            let client = ExecutorClient::new(executor.ipv4_address, executor.port);
            async move { client.get_result(subtask.subtask_uid).await }
        }))
        .await;

        let mut merged = Vec::new();
        for (subtask, payload) in creator_subtasks.iter().zip(results) {
            let payload = payload?;
            if let Some(items) = payload.get("result").and_then(Value::as_array) {
                merged.extend(items.clone());
            }
            let mut subtask = subtask.clone();
            subtask.status = CreatorSubtaskStatus::Success;
            subtask.finished_at = Some(Utc::now());
            subtask.result = Some(payload);
            self.storage.upsert_creator_subtask(&subtask)?;
        }
        Ok(merged)
    }
}

fn subtask_type_for(task_type: TaskType) -> SubtaskType {
    match task_type {
        TaskType::GridSearch => SubtaskType::GridSearch,
    }
}

/// §4.5 step 2: split `subtasks_params` into `k` order-preserving buckets
/// and graft the remaining top-level keys onto each.
fn partition_params(params: &Value, k: usize) -> anyhow::Result<Vec<Value>> {
    let object = params.as_object().ok_or_else(|| anyhow::anyhow!("params must be a JSON object"))?;
    let atomics = object
        .get("subtasks_params")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("params missing subtasks_params array"))?;
    let mut common = object.clone();
    common.remove("subtasks_params");

    let buckets = partition_atomics(atomics, k);
    Ok(buckets
        .into_iter()
        .map(|bucket| {
            let mut subtask_params = common.clone();
            subtask_params.insert("subtask_params".to_string(), Value::Array(bucket));
            Value::Object(subtask_params)
        })
        .collect())
}

async fn wait_for_image(environment: &EnvironmentClient, image_tag: &str) -> anyhow::Result<()> {
    loop {
        let status = environment.status(image_tag).await?;
        if status.status == "pushed" {
            return Ok(());
        }
        tokio::time::sleep(IMAGE_PUSHING_POLL).await;
    }
}

async fn wait_for_dataset(data: &DataClient, dataset_uid: Uuid) -> anyhow::Result<()> {
    loop {
        let dataset = data.get(dataset_uid).await?;
        if dataset.status == "available" {
            return Ok(());
        }
        tokio::time::sleep(DATASET_PUBLISHING_POLL).await;
    }
}

/// Reduces the flattened per-atomic results into one task result. `grid_search`
/// selects the maximal `f1_score`, ties resolved by first-seen.
fn reduce_result(merged: &[Value], task_type: TaskType) -> Option<Value> {
    match task_type {
        TaskType::GridSearch => merged.iter().fold(None::<(f64, &Value)>, |best, item| {
            let score = item.get("f1_score").and_then(Value::as_f64).unwrap_or(f64::NEG_INFINITY);
            match best {
                Some((best_score, _)) if score <= best_score => best,
                _ => Some((score, item)),
            }
        }),
    }
    .map(|(_, item)| item.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reduce_result_picks_max_f1_score_first_seen_on_ties() {
        let merged = vec![
            json!({"criterion": "gini", "f1_score": 0.7}),
            json!({"criterion": "entropy", "f1_score": 0.9}),
            json!({"criterion": "log_loss", "f1_score": 0.9}),
        ];
        let best = reduce_result(&merged, TaskType::GridSearch).unwrap();
        assert_eq!(best["criterion"], "entropy");
    }

    #[test]
    fn partition_params_splits_atomics_and_keeps_common_keys() {
        let params = json!({
            "model_type": "DecisionTreeClassifier",
            "subtasks_params": [
                {"criterion": "gini"},
                {"criterion": "entropy"},
                {"criterion": "log_loss"},
            ],
        });
        let buckets = partition_params(&params, 2).unwrap();
        assert_eq!(buckets.len(), 2);
        for bucket in &buckets {
            assert_eq!(bucket["model_type"], "DecisionTreeClassifier");
            assert!(bucket.get("subtasks_params").is_none());
            assert!(bucket["subtask_params"].is_array());
        }
        let total: usize = buckets.iter().map(|b| b["subtask_params"].as_array().unwrap().len()).sum();
        assert_eq!(total, 3);
    }
}
