//! Client construction errors.

/// Errors building an [`HttpService`](crate::HttpService).
///
/// Request failures are reported as [`tickbroker::ServiceError`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid service url: {0}")]
    InvalidUrl(String),

    #[error("failed to build http client: {0}")]
    Build(#[from] reqwest::Error),
}
