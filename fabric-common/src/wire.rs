use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Every response carries `{status: "success"|"failure", message?, ...payload}`.
/// Handlers build the payload as any `Serialize` struct and flatten it in
/// here rather than hand-rolling the envelope at each call site. Also
/// `Deserialize` so outbound peer clients can unwrap a collaborator's
/// response the same way.
#[derive(Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: T,
}

pub fn success<T: Serialize>(payload: T) -> Envelope<T> {
    Envelope {
        status: "success".to_string(),
        message: None,
        payload,
    }
}

pub fn failure(message: String) -> Envelope<Map<String, Value>> {
    Envelope {
        status: "failure".to_string(),
        message: Some(message),
        payload: Map::new(),
    }
}
