use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeadreachError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// The bulk lead write failed; the campaign run was aborted.
    #[error("Persistence error: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
