use crate::storage::Storage;
use crate::torrent::{build_torrent, SwarmClient};
use fabric_common::model::{Dataset, DatasetStatus};
use fabric_common::{FabricError, FabricResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Clone)]
pub struct DatasetService {
    storage: Storage,
    swarm: Arc<dyn SwarmClient>,
    storage_root: PathBuf,
    torrents_dir: PathBuf,
}

impl DatasetService {
    pub fn new(storage: Storage, swarm: Arc<dyn SwarmClient>, storage_root: PathBuf, torrents_dir: PathBuf) -> Self {
        Self {
            storage,
            swarm,
            storage_root,
            torrents_dir,
        }
    }

    /// Copies `source_path` into `<storage>/<dataset_uid>/`, builds a
    /// torrent over it, and seeds it. Polls until the swarm client reports
    /// complete progress or `PUBLISH_TIMEOUT` elapses.
    pub fn publish(&self, source_path: PathBuf) -> FabricResult<Dataset> {
        let dataset_uid = Uuid::new_v4();
        let dest = self.storage_root.join(dataset_uid.to_string());
        std::fs::create_dir_all(&dest).map_err(|e| FabricError::Internal(e.into()))?;
        let mut options = fs_extra::dir::CopyOptions::new();
        options.content_only = true;
        fs_extra::dir::copy(&source_path, &dest, &options).map_err(|e| FabricError::Internal(anyhow::anyhow!(e)))?;

        let dataset = Dataset {
            dataset_uid,
            magnet_link: None,
            path: dest.clone(),
            status: DatasetStatus::Creating,
        };
        self.storage.upsert(&dataset)?;

        let storage = self.storage.clone();
        let swarm = self.swarm.clone();
        let torrent_path = self.torrents_dir.join(format!("{dataset_uid}.torrent"));
        tokio::spawn(async move {
            if let Err(e) = publish_job(&storage, &swarm, dataset_uid, &dest, &torrent_path).await {
                tracing::error!(%dataset_uid, error = %e, "dataset publish failed");
            }
        });
        Ok(dataset)
    }

    /// Creates a dataset row in `downloading` status with the given magnet,
    /// submits it to the swarm client, and polls the same way.
    pub fn download(&self, dataset_uid: Uuid, magnet_link: String) -> FabricResult<Dataset> {
        if !crate::torrent::is_valid_magnet(&magnet_link) {
            return Err(FabricError::Invalid(format!("not a magnet link: {magnet_link}")));
        }
        let dest = self.storage_root.join(dataset_uid.to_string());
        let dataset = Dataset {
            dataset_uid,
            magnet_link: Some(magnet_link.clone()),
            path: dest.clone(),
            status: DatasetStatus::Downloading,
        };
        self.storage.upsert(&dataset)?;

        let storage = self.storage.clone();
        let swarm = self.swarm.clone();
        tokio::spawn(async move {
            if let Err(e) = download_job(&storage, &swarm, dataset_uid, &magnet_link, &dest).await {
                tracing::error!(%dataset_uid, error = %e, "dataset download failed");
            }
        });
        Ok(dataset)
    }

    pub fn get(&self, dataset_uid: Uuid) -> FabricResult<Dataset> {
        self.storage
            .get(dataset_uid)?
            .ok_or_else(|| FabricError::NotFound(format!("dataset {dataset_uid}")))
    }
}

async fn publish_job(
    storage: &Storage,
    swarm: &Arc<dyn SwarmClient>,
    dataset_uid: Uuid,
    dest: &Path,
    torrent_path: &Path,
) -> anyhow::Result<()> {
    storage.upsert(&Dataset {
        dataset_uid,
        magnet_link: None,
        path: dest.to_path_buf(),
        status: DatasetStatus::Publishing,
    })?;
    let magnet_link = build_torrent(dest, torrent_path)?;
    let handle = swarm.seed(torrent_path, dest.parent().unwrap_or(dest)).await?;
    wait_for_completion(swarm, &handle, PUBLISH_TIMEOUT).await?;
    storage.upsert(&Dataset {
        dataset_uid,
        magnet_link: Some(magnet_link),
        path: dest.to_path_buf(),
        status: DatasetStatus::Available,
    })?;
    Ok(())
}

async fn download_job(
    storage: &Storage,
    swarm: &Arc<dyn SwarmClient>,
    dataset_uid: Uuid,
    magnet_link: &str,
    dest: &Path,
) -> anyhow::Result<()> {
    let handle = swarm.leech(magnet_link, dest.parent().unwrap_or(dest)).await?;
    wait_for_completion(swarm, &handle, DOWNLOAD_TIMEOUT).await?;
    storage.upsert(&Dataset {
        dataset_uid,
        magnet_link: Some(magnet_link.to_string()),
        path: dest.to_path_buf(),
        status: DatasetStatus::Available,
    })?;
    Ok(())
}

async fn wait_for_completion(swarm: &Arc<dyn SwarmClient>, handle: &str, timeout: Duration) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let progress = swarm.progress(handle).await?;
        if progress.is_complete() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("swarm transfer timed out after {:?}", timeout);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
