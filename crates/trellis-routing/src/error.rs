#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown router: {name}")]
    UnknownRouter { name: String },

    #[error("unknown connector: {name}")]
    UnknownConnector { name: String },

    #[error("unknown anchor: {name}")]
    UnknownAnchor { name: String },

    #[error("unknown connection point: {name}")]
    UnknownConnectionPoint { name: String },

    #[error("invalid options for `{name}`: {message}")]
    InvalidOption { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
