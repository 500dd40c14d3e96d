use crate::model::NodeRole;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One registry this node bootstraps its peer view from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryAddr {
    pub ipv4_address: Ipv4Addr,
    pub port: u16,
}

/// Own-identity bootstrap record, persisted at `config/config.json`.
/// Minted once on first startup (§4.1); `node_uid` never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub node_uid: Uuid,
    pub role: NodeRole,
    #[serde(default = "default_true")]
    pub use_upnp: bool,
    pub public_ip: Option<Ipv4Addr>,
    pub public_port: Option<u16>,
    #[serde(default)]
    pub bootstrap_registries: Vec<RegistryAddr>,
}

fn default_true() -> bool {
    true
}

impl BootstrapConfig {
    /// Loads `config/config.json` under `working_dir`, minting a fresh
    /// identity with a new `node_uid` on first run and persisting it.
    pub fn load_or_init(working_dir: &Path, role: NodeRole) -> anyhow::Result<Self> {
        let path = config_path(working_dir);
        if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&text)?)
        } else {
            let config = BootstrapConfig {
                node_uid: Uuid::new_v4(),
                role,
                use_upnp: true,
                public_ip: None,
                public_port: None,
                bootstrap_registries: Vec::new(),
            };
            config.persist(working_dir)?;
            Ok(config)
        }
    }

    pub fn persist(&self, working_dir: &Path) -> anyhow::Result<()> {
        let path = config_path(working_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

pub fn config_path(working_dir: &Path) -> PathBuf {
    working_dir.join("config").join("config.json")
}

pub fn db_path(working_dir: &Path, service: &str) -> PathBuf {
    working_dir.join("db").join(format!("{service}.sqlite"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn mints_and_persists_identity_once() {
        let dir = tempdir().unwrap();
        let first = BootstrapConfig::load_or_init(dir.path(), NodeRole::Executor).unwrap();
        let second = BootstrapConfig::load_or_init(dir.path(), NodeRole::Executor).unwrap();
        assert_eq!(first.node_uid, second.node_uid);
    }
}
