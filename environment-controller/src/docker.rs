use bollard::container::{Config, CreateContainerOptions, StartContainerOptions, WaitContainerOptions};
use bollard::image::{BuildImageOptions, CreateImageOptions, PushImageOptions};
use bollard::service::HostConfig;
use bollard::Docker;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tar::Builder as TarBuilder;

const CONTAINER_RUN_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("container did not exit within {CONTAINER_RUN_TIMEOUT:?}")]
    Timeout,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Thin wrapper over the local Docker Engine API. This is the boundary to
/// the out-of-scope container engine collaborator: only build/push/pull/run
/// are exposed, matching the Environment Controller's operation set.
#[derive(Clone)]
pub struct DockerService {
    docker: Docker,
}

impl DockerService {
    pub fn connect() -> anyhow::Result<Self> {
        Ok(Self {
            docker: Docker::connect_with_local_defaults()?,
        })
    }

    pub async fn build(&self, context_dir: &Path, tag: &str) -> anyhow::Result<()> {
        let tar_bytes = tar_directory(context_dir)?;
        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: tag.to_string(),
            rm: true,
            ..Default::default()
        };
        let mut stream = self.docker.build_image(options, None, Some(tar_bytes.into()));
        while let Some(next) = stream.next().await {
            let info = next?;
            if let Some(error) = info.error {
                anyhow::bail!("docker build failed: {error}");
            }
        }
        Ok(())
    }

    pub async fn push(&self, tag: &str) -> anyhow::Result<()> {
        let (repository, push_tag) = split_tag(tag);
        let options = PushImageOptions { tag: push_tag };
        let mut stream = self.docker.push_image(&repository, Some(options), None);
        while let Some(next) = stream.next().await {
            let info = next?;
            if let Some(error) = info.error {
                anyhow::bail!("docker push failed: {error}");
            }
        }
        Ok(())
    }

    pub async fn pull(&self, tag: &str) -> anyhow::Result<()> {
        let options = CreateImageOptions {
            from_image: tag.to_string(),
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(next) = stream.next().await {
            let info = next?;
            if let Some(error) = info.error {
                anyhow::bail!("docker pull failed: {error}");
            }
        }
        Ok(())
    }

    /// Runs the container with a read-only bind of `input_path` onto
    /// `/usr/src/app/input` and a read-write bind of `output_path` onto
    /// `/usr/src/app/output`, then waits for it to exit.
    pub async fn run(&self, name: &str, tag: &str, input_path: &Path, output_path: &Path) -> Result<(), RunError> {
        let binds = vec![
            format!("{}:/usr/src/app/input:ro", input_path.display()),
            format!("{}:/usr/src/app/output:rw", output_path.display()),
        ];
        let config = Config {
            image: Some(tag.to_string()),
            host_config: Some(HostConfig {
                binds: Some(binds),
                ..Default::default()
            }),
            ..Default::default()
        };
        let created = self
            .docker
            .create_container(Some(CreateContainerOptions { name, platform: None }), config)
            .await
            .map_err(anyhow::Error::from)?;
        self.docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(anyhow::Error::from)?;

        let wait_for_exit = async {
            let mut wait = self.docker.wait_container(&created.id, None::<WaitContainerOptions<String>>);
            while let Some(next) = wait.next().await {
                let result = next.map_err(anyhow::Error::from)?;
                if result.status_code != 0 {
                    anyhow::bail!("container exited with status {}", result.status_code);
                }
            }
            Ok(())
        };
        match tokio::time::timeout(CONTAINER_RUN_TIMEOUT, wait_for_exit).await {
            Ok(result) => result.map_err(RunError::Failed),
            Err(_) => Err(RunError::Timeout),
        }
    }
}

fn tar_directory(dir: &Path) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    {
        let mut builder = TarBuilder::new(&mut bytes);
        builder.append_dir_all(".", dir)?;
        builder.finish()?;
    }
    Ok(bytes)
}

fn split_tag(tag: &str) -> (String, String) {
    match tag.rsplit_once(':') {
        Some((repo, t)) => (repo.to_string(), t.to_string()),
        None => (tag.to_string(), "latest".to_string()),
    }
}

pub fn subtask_input_dir(runtime_dir: &Path, subtask_uid: &str) -> PathBuf {
    runtime_dir.join(subtask_uid).join("input")
}

pub fn subtask_output_dir(runtime_dir: &Path, subtask_uid: &str) -> PathBuf {
    runtime_dir.join(subtask_uid).join("output")
}
