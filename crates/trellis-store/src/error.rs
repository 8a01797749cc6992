use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Graph(#[from] trellis_graph::Error),

    #[error("invalid graph state: {message}")]
    InvalidState { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
