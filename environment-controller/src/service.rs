use crate::docker::{subtask_input_dir, subtask_output_dir, DockerService, RunError};
use crate::dirhash::dirhash;
use crate::model::{ContainerRun, ContainerStatus};
use crate::storage::Storage;
use fabric_common::model::{Image, ImageStatus};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const NAMESPACE: &str = "distfabric";

#[derive(Clone)]
pub struct ImageService {
    storage: Storage,
    docker: DockerService,
    tasks_repo: PathBuf,
}

impl ImageService {
    pub fn new(storage: Storage, docker: DockerService, tasks_repo: PathBuf) -> Self {
        Self {
            storage,
            docker,
            tasks_repo,
        }
    }

    /// `image_tag` is a deterministic function of the subtask source tree's
    /// content, so a repeated push for an unchanged tree finds the existing
    /// `pushed` row and returns immediately without rebuilding (§8
    /// Scenario C).
    pub fn push(&self, task_kind: &str, subtask_kind: &str) -> fabric_common::FabricResult<Image> {
        let subtask_folder = self
            .tasks_repo
            .join(task_kind.to_lowercase())
            .join("subtasks")
            .join(subtask_kind.to_lowercase());
        if !subtask_folder.exists() {
            return Err(fabric_common::FabricError::Invalid(format!(
                "subtask folder {} does not exist",
                subtask_folder.display()
            )));
        }
        let checksum = dirhash(&subtask_folder).map_err(fabric_common::FabricError::Internal)?;
        let tag = format!("{NAMESPACE}/{}:{}", subtask_kind.to_lowercase(), checksum);

        if let Some(existing) = self.storage.get_image(&tag)? {
            if existing.status == ImageStatus::Pushed {
                tracing::info!(%tag, "image already pushed, build is a no-op");
                return Ok(existing);
            }
        }

        let image = Image {
            image_tag: tag.clone(),
            image_id: None,
            status: ImageStatus::Building,
        };
        self.storage.upsert_image(&image)?;

        let storage = self.storage.clone();
        let docker = self.docker.clone();
        tokio::spawn(async move {
            if let Err(e) = build_and_push(&storage, &docker, &subtask_folder, &tag).await {
                tracing::error!(%tag, error = %e, "image build/push failed");
            }
        });
        Ok(image)
    }

    pub fn pull(&self, image_tag: &str) -> fabric_common::FabricResult<Image> {
        let image = Image {
            image_tag: image_tag.to_string(),
            image_id: None,
            status: ImageStatus::Pulling,
        };
        self.storage.upsert_image(&image)?;

        let storage = self.storage.clone();
        let docker = self.docker.clone();
        let tag = image_tag.to_string();
        tokio::spawn(async move {
            let result = docker.pull(&tag).await;
            let status = match result {
                Ok(()) => ImageStatus::Pulled,
                Err(e) => {
                    tracing::error!(%tag, error = %e, "image pull failed");
                    ImageStatus::PullingError
                }
            };
            let _ = storage.upsert_image(&Image {
                image_tag: tag,
                image_id: None,
                status,
            });
        });
        Ok(image)
    }

    pub fn status(&self, image_tag: &str) -> fabric_common::FabricResult<Image> {
        self.storage
            .get_image(image_tag)?
            .ok_or_else(|| fabric_common::FabricError::NotFound(format!("image {image_tag}")))
    }
}

async fn build_and_push(
    storage: &Storage,
    docker: &DockerService,
    subtask_folder: &Path,
    tag: &str,
) -> anyhow::Result<()> {
    if let Err(e) = docker.build(subtask_folder, tag).await {
        storage.upsert_image(&Image {
            image_tag: tag.to_string(),
            image_id: None,
            status: ImageStatus::BuildingError,
        })?;
        return Err(e);
    }
    storage.upsert_image(&Image {
        image_tag: tag.to_string(),
        image_id: None,
        status: ImageStatus::Pushing,
    })?;
    if let Err(e) = docker.push(tag).await {
        storage.upsert_image(&Image {
            image_tag: tag.to_string(),
            image_id: None,
            status: ImageStatus::PushingError,
        })?;
        return Err(e);
    }
    storage.upsert_image(&Image {
        image_tag: tag.to_string(),
        image_id: None,
        status: ImageStatus::Pushed,
    })?;
    Ok(())
}

#[derive(Clone)]
pub struct ContainerService {
    storage: Storage,
    docker: DockerService,
    runtime_dir: PathBuf,
}

impl ContainerService {
    pub fn new(storage: Storage, docker: DockerService, runtime_dir: PathBuf) -> Self {
        Self {
            storage,
            docker,
            runtime_dir,
        }
    }

    /// Copies every input file into `<runtime>/<subtask_uid>/input/`, then
    /// launches the container in the background. Returns immediately with
    /// the run transitioned to `creating`.
    pub fn run(
        &self,
        subtask_uid: Uuid,
        image_tag: String,
        input_files: Vec<PathBuf>,
    ) -> fabric_common::FabricResult<ContainerRun> {
        let run = ContainerRun {
            subtask_uid,
            image_tag: image_tag.clone(),
            status: ContainerStatus::Creating,
        };
        self.storage.upsert_container_run(&run)?;

        let storage = self.storage.clone();
        let docker = self.docker.clone();
        let runtime_dir = self.runtime_dir.clone();
        tokio::spawn(async move {
            if let Err(e) = copy_and_run(&storage, &docker, &runtime_dir, subtask_uid, &image_tag, input_files).await
            {
                tracing::error!(%subtask_uid, error = %e, "container run failed");
                let _ = storage.upsert_container_run(&ContainerRun {
                    subtask_uid,
                    image_tag,
                    status: ContainerStatus::Error,
                });
            }
        });
        Ok(run)
    }

    pub fn status(&self, subtask_uid: Uuid) -> fabric_common::FabricResult<ContainerRun> {
        self.storage
            .get_container_run(subtask_uid)?
            .ok_or_else(|| fabric_common::FabricError::NotFound(format!("container run {subtask_uid}")))
    }

    /// Returns the path to `output/result.json` iff it exists.
    pub fn result_path(&self, subtask_uid: Uuid) -> fabric_common::FabricResult<PathBuf> {
        let output = subtask_output_dir(&self.runtime_dir, &subtask_uid.to_string());
        let result_file = output.join("result.json");
        if result_file.exists() {
            Ok(result_file)
        } else {
            Err(fabric_common::FabricError::NotFound(format!(
                "result for subtask {subtask_uid} not ready"
            )))
        }
    }
}

async fn copy_and_run(
    storage: &Storage,
    docker: &DockerService,
    runtime_dir: &Path,
    subtask_uid: Uuid,
    image_tag: &str,
    input_files: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let subtask_str = subtask_uid.to_string();
    let input_dir = subtask_input_dir(runtime_dir, &subtask_str);
    let output_dir = subtask_output_dir(runtime_dir, &subtask_str);

    storage.upsert_container_run(&ContainerRun {
        subtask_uid,
        image_tag: image_tag.to_string(),
        status: ContainerStatus::FileCopying,
    })?;
    tokio::fs::create_dir_all(&input_dir).await?;
    tokio::fs::create_dir_all(&output_dir).await?;
    for src in &input_files {
        let Some(name) = src.file_name() else { continue };
        tokio::fs::copy(src, input_dir.join(name)).await?;
    }

    storage.upsert_container_run(&ContainerRun {
        subtask_uid,
        image_tag: image_tag.to_string(),
        status: ContainerStatus::Running,
    })?;
    match docker.run(&subtask_str, image_tag, &input_dir, &output_dir).await {
        Ok(()) => {
            storage.upsert_container_run(&ContainerRun {
                subtask_uid,
                image_tag: image_tag.to_string(),
                status: ContainerStatus::Success,
            })?;
            Ok(())
        }
        Err(RunError::Timeout) => {
            storage.upsert_container_run(&ContainerRun {
                subtask_uid,
                image_tag: image_tag.to_string(),
                status: ContainerStatus::Timeout,
            })?;
            Ok(())
        }
        Err(RunError::Failed(e)) => Err(e),
    }
}
