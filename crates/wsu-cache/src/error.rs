use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to (de)serialize cache state at {path}: {source}")]
    Serde {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
