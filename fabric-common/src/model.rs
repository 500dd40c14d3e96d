use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    other => Err(anyhow::anyhow!("unknown {} variant: {}", stringify!($name), other)),
                }
            }
        }
    };
}

string_enum!(NodeRole {
    Executor => "executor",
    Creator => "creator",
    Registry => "registry",
});

string_enum!(NodeStatus {
    Unknown => "unknown",
    Active => "active",
    Inactive => "inactive",
});

/// Identity of a peer. `node_uid` is minted once and never changes; the
/// endpoint is refreshed on every successful handshake/enable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub node_uid: Uuid,
    pub ipv4_address: Ipv4Addr,
    pub port: u16,
    pub role: NodeRole,
    pub status: NodeStatus,
    pub last_ping: DateTime<Utc>,
}

string_enum!(ImageStatus {
    Creating => "creating",
    Building => "building",
    BuildingError => "building_error",
    Pushing => "pushing",
    PushingError => "pushing_error",
    Pushed => "pushed",
    Pulling => "pulling",
    PullingError => "pulling_error",
    Pulled => "pulled",
    Archived => "archived",
});

/// A container artifact. `image_tag` is a deterministic function of the
/// subtask source tree's content hash, so rebuilding from the same tree
/// yields the same tag and a push becomes a no-op at the registry level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub image_tag: String,
    pub image_id: Option<String>,
    pub status: ImageStatus,
}

string_enum!(DatasetStatus {
    Creating => "creating",
    Publishing => "publishing",
    Downloading => "downloading",
    Available => "available",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub dataset_uid: Uuid,
    pub magnet_link: Option<String>,
    pub path: PathBuf,
    pub status: DatasetStatus,
}

string_enum!(TaskType {
    GridSearch => "grid_search",
});

string_enum!(SubtaskType {
    GridSearch => "grid_search",
});

string_enum!(TaskStatus {
    Creating => "creating",
    ExecutorsSearching => "executors_searching",
    ResourcesPublishing => "resources_publishing",
    SubtasksSending => "subtasks_sending",
    SubtasksPolling => "subtasks_polling",
    ResultProcessing => "result_processing",
    Success => "success",
    Error => "error",
});

/// Creator-side job. `status` is monotonic along the path listed above;
/// `finished_at` is set iff `status` is `Success` or `Error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_uid: Uuid,
    pub task_type: TaskType,
    pub creator_uid: Uuid,
    pub status: TaskStatus,
    pub dataset_uid: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub params: serde_json::Value,
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub subtasks: Vec<CreatorSubtask>,
}

string_enum!(CreatorSubtaskStatus {
    WaitingExecutorAssignment => "waiting_executor_assignment",
    Creating => "creating",
    ResourcesDownloading => "resources_downloading",
    Running => "running",
    Success => "success",
    Error => "error",
    Timeout => "timeout",
});

/// Creator's projection of one executor's slice of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorSubtask {
    pub subtask_uid: Uuid,
    pub task_uid: Uuid,
    pub subtask_type: SubtaskType,
    pub executor_uid: Option<Uuid>,
    pub status: CreatorSubtaskStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub params: serde_json::Value,
    pub result: Option<serde_json::Value>,
}

string_enum!(ExecutorSubtaskStatus {
    WaitingParams => "waiting_params",
    Creating => "creating",
    FileCopying => "file_copying",
    Running => "running",
    Success => "success",
    Error => "error",
    Timeout => "timeout",
    Cancelled => "cancelled",
});

/// Executor's own projection of the same `subtask_uid`. The creator and
/// executor hold disjoint, eventually-consistent views of one subtask;
/// there is never a single shared row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSubtask {
    pub subtask_uid: Uuid,
    pub creator_uid: Uuid,
    pub dataset_uid: Option<Uuid>,
    pub status: ExecutorSubtaskStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// One hyperparameter-value dict to be evaluated once inside one container.
pub type AtomicConfig = serde_json::Value;

/// Splits `n` atomic configs across `k` buckets, deterministic and
/// order-preserving: atomic `i` lands in bucket `floor(i*k/n)`. Bucket sizes
/// differ by at most 1 (§8 invariant 3).
pub fn partition_atomics(atomics: &[AtomicConfig], k: usize) -> Vec<Vec<AtomicConfig>> {
    let mut buckets: Vec<Vec<AtomicConfig>> = vec![Vec::new(); k];
    let n = atomics.len();
    if n == 0 || k == 0 {
        return buckets;
    }
    for (i, atomic) in atomics.iter().enumerate() {
        let bucket = (i * k) / n;
        buckets[bucket.min(k - 1)].push(atomic.clone());
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_round_trips_and_rejects_unknown() {
        let s = TaskStatus::SubtasksPolling;
        let wire = serde_json::to_string(&s).unwrap();
        assert_eq!(wire, "\"subtasks_polling\"");
        let back: TaskStatus = serde_json::from_str(&wire).unwrap();
        assert_eq!(back, TaskStatus::SubtasksPolling);
        assert!(serde_json::from_str::<TaskStatus>("\"bogus\"").is_err());
    }

    #[test]
    fn partition_balanced_for_seven_over_three() {
        let atomics: Vec<_> = (0..7).map(|i| json!({ "i": i })).collect();
        let buckets = partition_atomics(&atomics, 3);
        let sizes: Vec<usize> = buckets.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 2, 2]);
    }

    #[test]
    fn partition_never_loses_or_duplicates() {
        let atomics: Vec<_> = (0..23).map(|i| json!({ "i": i })).collect();
        for k in 1..9usize {
            let buckets = partition_atomics(&atomics, k);
            let total: usize = buckets.iter().map(|b| b.len()).sum();
            assert_eq!(total, atomics.len());
            let max = buckets.iter().map(|b| b.len()).max().unwrap();
            let min = buckets.iter().map(|b| b.len()).min().unwrap();
            assert!(max - min <= 1);
        }
    }
}
