//! Wraps the local UPnP IGD device: discovery of the public endpoint and
//! installation/removal of a TCP port mapping. This is the "Network
//! Service" leaf of the orchestration plane — it has no HTTP surface of
//! its own (it does not appear in the ports table) and is linked directly
//! into `node-controller`'s own-identity bootstrap.

use igd::aio::Gateway;
use igd::{PortMappingProtocol, SearchOptions};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;
use thiserror::Error;

pub const MIN_PUBLIC_PORT: u16 = 50_000;
pub const MAX_PUBLIC_PORT: u16 = 51_000;
const LEASE_DURATION: Duration = Duration::from_secs(24 * 60 * 60);
const MAPPING_DESCRIPTION: &str = "distributed grid search fabric";

#[derive(Debug, Error)]
pub enum NetworkServiceError {
    #[error("no IGD gateway found on the local network")]
    NoGateway,
    #[error("no free public port in range [{MIN_PUBLIC_PORT}, {MAX_PUBLIC_PORT})")]
    NoFreePort,
    #[error("IGD request failed: {0}")]
    Igd(#[from] igd::Error),
    #[error("IGD search failed: {0}")]
    Search(#[from] igd::SearchError),
}

type Result<T> = std::result::Result<T, NetworkServiceError>;

pub struct NetworkService {
    gateway: Gateway,
}

impl NetworkService {
    /// Discovers the IGD gateway on the local network. Called once at
    /// startup when `use_upnp` is set in the node's bootstrap config.
    pub async fn discover() -> Result<Self> {
        let gateway = igd::aio::search_gateway(SearchOptions::default())
            .await
            .map_err(|_| NetworkServiceError::NoGateway)?;
        Ok(Self { gateway })
    }

    pub async fn public_ip(&self) -> Result<Ipv4Addr> {
        Ok(self.gateway.get_external_ip().await?)
    }

    /// Scans the device's existing mapping table and returns the first port
    /// in `[MIN_PUBLIC_PORT, MAX_PUBLIC_PORT)` that is not already mapped.
    pub async fn free_public_port(&self) -> Result<u16> {
        let mut mapped = std::collections::HashSet::new();
        let mut index = 0u32;
        loop {
            match self.gateway.get_generic_port_mapping_entry(index).await {
                Ok(entry) => {
                    mapped.insert(entry.external_port);
                    index += 1;
                }
                Err(_) => break,
            }
        }
        (MIN_PUBLIC_PORT..MAX_PUBLIC_PORT)
            .find(|p| !mapped.contains(p))
            .ok_or(NetworkServiceError::NoFreePort)
    }

    /// Installs a TCP mapping `local_addr -> external_port` with a 24h
    /// lease, as required by the own-identity bootstrap (§4.1 step 2).
    pub async fn add_mapping(&self, local_addr: SocketAddrV4, external_port: u16) -> Result<()> {
        self.gateway
            .add_port(
                PortMappingProtocol::TCP,
                external_port,
                local_addr,
                LEASE_DURATION.as_secs() as u32,
                MAPPING_DESCRIPTION,
            )
            .await?;
        Ok(())
    }

    /// Removes the mapping installed at startup. Called on shutdown.
    pub async fn remove_mapping(&self, external_port: u16) -> Result<()> {
        self.gateway.remove_port(PortMappingProtocol::TCP, external_port).await?;
        Ok(())
    }

    /// Discovers a gateway, claims a free external port, and maps it onto
    /// `local_addr`, returning `(public_ip, external_port)` for persistence
    /// in the node's bootstrap config.
    pub async fn bootstrap(local_addr: SocketAddrV4) -> Result<(Self, Ipv4Addr, u16)> {
        let service = Self::discover().await?;
        let public_ip = service.public_ip().await?;
        let external_port = service.free_public_port().await?;
        service.add_mapping(local_addr, external_port).await?;
        tracing::info!(
            local = %local_addr,
            public = %SocketAddrV4::new(public_ip, external_port),
            "installed UPnP port mapping"
        );
        Ok((service, public_ip, external_port))
    }
}
