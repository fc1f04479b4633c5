use thiserror::Error;

/// Errors produced by model constructors and validation routines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid destination id {0:?}: expected \"platform:stream\"")]
    InvalidDestinationId(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
