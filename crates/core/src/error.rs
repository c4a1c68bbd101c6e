use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Dataset not found: {0}")]
    DatasetNotFound(Uuid),

    #[error("Rule not found: {0}")]
    RuleNotFound(Uuid),

    #[error("Rubric not found: {0}")]
    RubricNotFound(Uuid),

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("{0}")]
    Other(String),
}
