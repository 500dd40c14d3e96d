use fabric_common::model::ImageStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Creating,
    FileCopying,
    Running,
    Success,
    Error,
    Timeout,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Creating => "creating",
            ContainerStatus::FileCopying => "file_copying",
            ContainerStatus::Running => "running",
            ContainerStatus::Success => "success",
            ContainerStatus::Error => "error",
            ContainerStatus::Timeout => "timeout",
        }
    }

    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "creating" => ContainerStatus::Creating,
            "file_copying" => ContainerStatus::FileCopying,
            "running" => ContainerStatus::Running,
            "success" => ContainerStatus::Success,
            "error" => ContainerStatus::Error,
            "timeout" => ContainerStatus::Timeout,
            other => anyhow::bail!("unknown container status: {other}"),
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ContainerStatus::Success | ContainerStatus::Error | ContainerStatus::Timeout)
    }
}

/// One container run, keyed by the subtask it was launched for. Distinct
/// from the executor's own `ExecutorSubtask` row: this is the environment
/// controller's local view of "did the container finish", the executor
/// polls it to learn when to advance its own state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRun {
    pub subtask_uid: Uuid,
    pub image_tag: String,
    pub status: ContainerStatus,
}

pub fn image_status_as_str(status: ImageStatus) -> &'static str {
    status.as_str()
}
