use thiserror::Error;

/// Failures at the external-service boundary (search, scrape, model).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not set")]
    MissingCredential(&'static str),

    #[error("request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned status {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} response could not be decoded: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("{service} reported failure: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned no content for {url}")]
    EmptyContent { service: &'static str, url: String },

    #[error("model call failed: {0}")]
    Model(String),

    #[error("model call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
