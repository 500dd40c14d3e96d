use warp::http::StatusCode;
use warp::{reject::Reject, Rejection};

/// Error taxonomy shared by every service in the fabric. Mirrors the
/// classification from the orchestration design: peer-unreachable failures
/// never reach this type (they are swallowed at the call site), everything
/// else funnels through here on its way to an HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum FabricError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("upstream call failed: {0}")]
    Upstream(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl FabricError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FabricError::NotFound(_) => StatusCode::NOT_FOUND,
            FabricError::Conflict(_) => StatusCode::CONFLICT,
            FabricError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            FabricError::Upstream(_) => StatusCode::BAD_GATEWAY,
            FabricError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Reject for FabricError {}

impl From<rusqlite::Error> for FabricError {
    fn from(e: rusqlite::Error) -> Self {
        FabricError::Internal(anyhow::Error::new(e))
    }
}

/// Turns a `FabricError` rejection into the `{status, message}` envelope
/// required by the transport contract. Registered once per service as the
/// tail of its filter tree via `.recover(handle_rejection)`.
pub async fn handle_rejection(err: Rejection) -> Result<impl warp::Reply, std::convert::Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(e) = err.find::<FabricError>() {
        (e.status_code(), e.to_string())
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        (StatusCode::BAD_REQUEST, "malformed request body".to_string())
    } else {
        tracing::error!(?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    };
    let body = crate::wire::failure(message);
    Ok(warp::reply::with_status(warp::reply::json(&body), code))
}

pub fn reject(err: FabricError) -> Rejection {
    warp::reject::custom(err)
}

pub type FabricResult<T> = Result<T, FabricError>;
