#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read series file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse series file: {0}")]
    Parse(#[from] serde_json::Error),
}
