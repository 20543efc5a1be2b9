use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store file is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot replace store file: {0}")]
    Persist(#[from] tempfile::PersistError),
}
