use async_trait::async_trait;
use lava_torrent::torrent::v1::TorrentBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use fabric_common::magnet::is_valid_magnet;

const PIECE_LENGTH: i64 = 256 * 1024;

/// Builds a `.torrent` file over `dir` and returns its path together with
/// the `urn:btih:<hex>` magnet link, matching the validation pattern in
/// the wire contract (`urn:btih:([A-F\d]+)`, case-insensitive).
pub fn build_torrent(dir: &Path, torrent_path: &Path) -> anyhow::Result<String> {
    let torrent = TorrentBuilder::new(dir, PIECE_LENGTH).build()?;
    if let Some(parent) = torrent_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    torrent.write_into_file(torrent_path)?;
    Ok(format!("magnet:?xt=urn:btih:{}", torrent.info_hash()))
}

/// Progress of one in-flight publish or download, as reported by the swarm
/// client daemon.
pub struct SwarmProgress {
    pub fraction: f32,
}

impl SwarmProgress {
    pub fn is_complete(&self) -> bool {
        self.fraction >= 1.0
    }
}

/// Everything the Data Controller needs from the BitTorrent client daemon.
/// The daemon itself (seeding, leeching, piece selection, peer discovery)
/// is the out-of-scope external collaborator; this trait is the only
/// surface the orchestration core consumes.
#[async_trait]
pub trait SwarmClient: Send + Sync {
    /// Starts seeding `torrent_path`, whose content lives under `save_path`.
    async fn seed(&self, torrent_path: &Path, save_path: &Path) -> anyhow::Result<String>;
    /// Starts leeching `magnet_link` into `save_path`.
    async fn leech(&self, magnet_link: &str, save_path: &Path) -> anyhow::Result<String>;
    /// Progress of a previously started transfer, by its handle.
    async fn progress(&self, handle: &str) -> anyhow::Result<SwarmProgress>;
}

/// `librqbit`-backed swarm client. One `librqbit::Session` per process,
/// shared across every dataset publish/download.
pub struct RqbitSwarmClient {
    session: Arc<librqbit::Session>,
}

impl RqbitSwarmClient {
    pub async fn new(session_dir: PathBuf) -> anyhow::Result<Self> {
        let session = librqbit::Session::new(session_dir).await?;
        Ok(Self { session })
    }
}

#[async_trait]
impl SwarmClient for RqbitSwarmClient {
    async fn seed(&self, torrent_path: &Path, save_path: &Path) -> anyhow::Result<String> {
        let bytes = tokio::fs::read(torrent_path).await?;
        let handle = self
            .session
            .add_torrent(
                librqbit::AddTorrent::from_bytes(bytes),
                Some(librqbit::AddTorrentOptions {
                    output_folder: Some(save_path.to_string_lossy().to_string()),
                    overwrite: true,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(handle.id().to_string())
    }

    async fn leech(&self, magnet_link: &str, save_path: &Path) -> anyhow::Result<String> {
        let handle = self
            .session
            .add_torrent(
                librqbit::AddTorrent::from_url(magnet_link),
                Some(librqbit::AddTorrentOptions {
                    output_folder: Some(save_path.to_string_lossy().to_string()),
                    overwrite: true,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(handle.id().to_string())
    }

    async fn progress(&self, handle: &str) -> anyhow::Result<SwarmProgress> {
        let id: usize = handle.parse()?;
        let stats = self.session.stats_snapshot(id)?;
        let fraction = if stats.total_bytes == 0 {
            1.0
        } else {
            stats.progress_bytes as f32 / stats.total_bytes as f32
        };
        Ok(SwarmProgress { fraction })
    }
}

