use thiserror::Error;

pub type Result<T, E = LookupRouterError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum LookupRouterError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build response: {0}")]
    ResponseBuild(#[from] http::Error),

    #[error("failed to serialize response body: {0}")]
    ResponseSerialization(#[from] serde_json::Error),
}
