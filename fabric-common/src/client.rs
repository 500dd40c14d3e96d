use std::net::Ipv4Addr;
use std::time::Duration;

/// 3-second timeout for liveness-sensitive peer calls (ping, handshake,
/// enable) per the concurrency model in §5.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(3);

/// Thin wrapper around a [`reqwest::Client`] pointed at one peer's base URL.
/// Every fan-out call site (offer, start, poll, exchange, handshake) builds
/// one of these per peer and drives them concurrently with
/// `futures::future::join_all`.
#[derive(Clone)]
pub struct PeerClient {
    client: reqwest::Client,
    base: String,
}

impl PeerClient {
    pub fn new(ipv4_address: Ipv4Addr, port: u16) -> Self {
        Self::with_timeout(ipv4_address, port, LIVENESS_TIMEOUT)
    }

    pub fn with_timeout(ipv4_address: Ipv4Addr, port: u16, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with static config");
        Self {
            client,
            base: format!("http://{ipv4_address}:{port}"),
        }
    }

    pub async fn post_json<Req: serde::Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> anyhow::Result<Resp> {
        let url = format!("{}/{}", self.base, path.trim_start_matches('/'));
        let resp = self.client.post(&url).json(body).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    pub async fn get_json<Resp: serde::de::DeserializeOwned>(&self, path: &str) -> anyhow::Result<Resp> {
        let url = format!("{}/{}", self.base, path.trim_start_matches('/'));
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }
}
